mod fixtures;

use cubeindex::index::locations;
use cubeindex::index::model::{LocationState, SourcesPolicy};
use fixtures::*;
use std::path::PathBuf;

const FIRST: &str = "/tmp/first/something.yaml";
const SECOND: &str = "/tmp/second/something.yaml";

#[test]
fn location_lifecycle_keeps_newest_first_order() {
    let cat = catalog();
    let product = telemetry_product(&cat.index);
    let datasets = cat.index.datasets();
    let first = file_uri(FIRST);
    let second = file_uri(SECOND);

    let ds = dataset(&product, telemetry_doc(), Some(&first));
    let stored = datasets.add(&ds, SourcesPolicy::Verify).expect("add");
    assert_eq!(stored.id, uuid(TELEMETRY_ID));
    assert_eq!(stored.product.id, product.id);
    assert_eq!(stored.metadata_type().name, "eo");
    assert_eq!(stored.local_path(), Some(PathBuf::from(FIRST)));

    // Ingesting again should have no effect.
    datasets.add(&ds, SourcesPolicy::Verify).expect("add again");
    assert_eq!(datasets.get_locations(&ds.id).expect("locations").len(), 1);

    assert!(datasets.remove_location(&ds.id, &first).expect("remove"));
    assert!(!datasets.remove_location(&ds.id, &first).expect("remove again"));
    assert!(datasets.get_locations(&ds.id).expect("locations").is_empty());

    assert!(datasets.add_location(&ds.id, &first).expect("re-add"));
    assert!(!datasets.add_location(&ds.id, &first).expect("re-add again"));
    assert_eq!(datasets.get_locations(&ds.id).expect("locations").len(), 1);

    assert!(datasets.archive_location(&ds.id, &first).expect("archive"));
    assert!(!datasets.archive_location(&ds.id, &first).expect("archive again"));
    assert!(datasets.get_locations(&ds.id).expect("locations").is_empty());
    assert_eq!(
        datasets.get_archived_locations(&ds.id).expect("archived"),
        vec![first.clone()]
    );
    assert_eq!(
        datasets
            .get_archived_location_times(&ds.id)
            .expect("archived times")
            .len(),
        1
    );

    assert!(datasets.restore_location(&ds.id, &first).expect("restore"));
    assert!(!datasets.restore_location(&ds.id, &first).expect("restore again"));
    assert_eq!(datasets.get_locations(&ds.id).expect("locations").len(), 1);
    assert!(datasets.get_archived_locations(&ds.id).expect("archived").is_empty());

    // Ingesting with a new path adds it as the newest location.
    let with_second = dataset(&product, telemetry_doc(), Some(&second));
    let stored = datasets.add(&with_second, SourcesPolicy::Verify).expect("add second");
    assert_eq!(
        datasets.get_locations(&ds.id).expect("locations"),
        vec![second.clone(), first.clone()]
    );
    assert_eq!(stored.local_path(), Some(PathBuf::from(SECOND)));

    // Ingesting without a location changes nothing.
    let bare = dataset(&product, telemetry_doc(), None);
    let stored = datasets.add(&bare, SourcesPolicy::Verify).expect("add bare");
    assert_eq!(stored.uris, vec![second.clone(), first.clone()]);
    assert_eq!(stored.local_path(), Some(PathBuf::from(SECOND)));

    // A later dataset elsewhere must not show up for the first path.
    datasets
        .add(
            &dataset(&product, telemetry_doc_with_id(OTHER_ID), Some(&second)),
            SourcesPolicy::Verify,
        )
        .expect("add other");
    let ids: Vec<_> = datasets
        .get_datasets_for_location(&first)
        .expect("reverse lookup")
        .into_iter()
        .map(|d| d.id)
        .collect();
    assert_eq!(ids, vec![ds.id]);
    assert_eq!(
        datasets
            .get_datasets_for_location(&second)
            .expect("reverse lookup")
            .len(),
        2
    );
}

#[test]
fn reverse_lookup_ignores_archived_and_removed_rows() {
    let cat = catalog();
    let product = telemetry_product(&cat.index);
    let datasets = cat.index.datasets();
    let first = file_uri(FIRST);

    let a = dataset(&product, telemetry_doc(), Some(&first));
    let b = dataset(&product, telemetry_doc_with_id(OTHER_ID), Some(&first));
    datasets.add(&a, SourcesPolicy::Verify).expect("add a");
    datasets.add(&b, SourcesPolicy::Verify).expect("add b");
    assert_eq!(datasets.get_datasets_for_location(&first).expect("lookup").len(), 2);

    datasets.archive_location(&a.id, &first).expect("archive a");
    datasets.remove_location(&b.id, &first).expect("remove b");
    assert!(datasets.get_datasets_for_location(&first).expect("lookup").is_empty());
    assert!(datasets.get_datasets_for_location("file:///nowhere").expect("lookup").is_empty());
}

#[test]
fn location_state_tracks_each_uri_independently_of_the_dataset() {
    let cat = catalog();
    let product = telemetry_product(&cat.index);
    let datasets = cat.index.datasets();
    let first = file_uri(FIRST);
    let second = file_uri(SECOND);
    let ds = dataset(&product, telemetry_doc(), Some(&first)).with_uri(&second);
    datasets.add(&ds, SourcesPolicy::Verify).expect("add");

    datasets.archive(&[ds.id]).expect("archive dataset");
    assert_eq!(datasets.get_locations(&ds.id).expect("locations").len(), 2);

    datasets.archive_location(&ds.id, &second).expect("archive location");
    let conn = cat.index.db().connect().expect("connect");
    assert_eq!(
        locations::location_state(&conn, &ds.id, &first).expect("state"),
        Some(LocationState::Active)
    );
    assert_eq!(
        locations::location_state(&conn, &ds.id, &second).expect("state"),
        Some(LocationState::Archived)
    );
    datasets.remove_location(&ds.id, &first).expect("remove");
    assert_eq!(locations::location_state(&conn, &ds.id, &first).expect("state"), None);
}

#[test]
fn locations_on_unknown_datasets_are_rejected() {
    let cat = catalog();
    let datasets = cat.index.datasets();
    let err = datasets
        .add_location(&uuid(MISSING_ID), &file_uri(FIRST))
        .expect_err("unknown dataset");
    assert!(err.is_missing(), "unexpected error: {err}");
    assert!(!datasets.remove_location(&uuid(MISSING_ID), &file_uri(FIRST)).expect("remove"));
    assert!(datasets.add_location(&uuid(MISSING_ID), "relative/path").is_err());
}
