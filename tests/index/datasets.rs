mod fixtures;

use cubeindex::core::error::CatalogError;
use cubeindex::index::model::{Predicate, SourcesPolicy};
use cubeindex::index::records;
use fixtures::*;
use serde_json::json;
use std::path::PathBuf;
use std::sync::{Arc, Barrier};
use std::thread;

#[test]
fn archive_and_restore_round_trip_through_search() {
    let cat = catalog();
    let product = telemetry_product(&cat.index);
    let id = uuid(TELEMETRY_ID);

    let tx = cat.index.db().begin().expect("begin");
    let inserted =
        records::insert_dataset(&tx, &telemetry_doc(), &id, &product).expect("insert");
    tx.commit().expect("commit");
    assert!(inserted);

    let datasets = cat.index.datasets();
    assert!(datasets.has(&id).expect("has"));
    assert_eq!(datasets.search_eager(&[]).expect("search").len(), 1);

    datasets.archive(&[id]).expect("archive");
    assert!(datasets.search_eager(&[]).expect("search").is_empty());
    assert!(datasets.get_archived_time(&id).expect("archived time").is_some());
    // Archiving twice is a no-op.
    datasets.archive(&[id]).expect("archive again");
    assert!(datasets.has(&id).expect("has"), "archived datasets still exist");

    datasets.restore(&[id]).expect("restore");
    assert_eq!(datasets.search_eager(&[]).expect("search").len(), 1);
    assert_eq!(datasets.count(&[]).expect("count"), 1);
    assert!(datasets.get_archived_time(&id).expect("archived time").is_none());
}

#[test]
fn identical_reinsert_is_a_noop_and_conflicting_insert_is_duplicate() {
    let cat = catalog();
    let product = telemetry_product(&cat.index);
    let id = uuid(TELEMETRY_ID);

    let conn = cat.index.db().connect().expect("connect");
    assert!(records::insert_dataset(&conn, &telemetry_doc(), &id, &product).expect("first"));
    assert!(!records::insert_dataset(&conn, &telemetry_doc(), &id, &product).expect("again"));

    let mut changed = telemetry_doc();
    changed["platform"] = json!({"code": "LANDSAT_9"});
    let err = records::insert_dataset(&conn, &changed, &id, &product)
        .expect_err("conflicting content must be rejected");
    assert!(err.is_duplicate(), "unexpected error: {err}");

    let stored = cat.index.datasets().get(&id).expect("get").expect("present");
    assert_eq!(stored.document["platform"]["code"], "LANDSAT_8");
}

#[test]
fn adding_the_same_dataset_twice_indexes_it_once() {
    let cat = catalog();
    let product = telemetry_product(&cat.index);
    let ds = dataset(&product, telemetry_doc(), None);
    let datasets = cat.index.datasets();

    let first = datasets.add(&ds, SourcesPolicy::Verify).expect("first add");
    let second = datasets.add(&ds, SourcesPolicy::Verify).expect("second add");
    assert_eq!(first.indexed_time, second.indexed_time);
    assert_eq!(datasets.count(&[]).expect("count"), 1);
    assert!(datasets.has(&ds.id).expect("has"));
}

#[test]
fn verify_rejects_changed_content_for_an_existing_dataset() {
    let cat = catalog();
    let product = telemetry_product(&cat.index);
    let datasets = cat.index.datasets();
    datasets
        .add(&dataset(&product, telemetry_doc(), None), SourcesPolicy::Verify)
        .expect("add");

    let mut changed = telemetry_doc();
    changed["ga_level"] = json!("P51");
    let err = datasets
        .add(&dataset(&product, changed.clone(), None), SourcesPolicy::Verify)
        .expect_err("verify must notice the change");
    assert!(err.is_mismatch(), "unexpected error: {err}");

    let err = datasets
        .add(&dataset(&product, changed, None), SourcesPolicy::Skip)
        .expect_err("stored content is immutable");
    assert!(err.is_duplicate(), "unexpected error: {err}");
}

#[test]
fn has_dataset_only_for_known_ids() {
    let cat = catalog();
    let product = telemetry_product(&cat.index);
    cat.index
        .datasets()
        .add(&dataset(&product, telemetry_doc(), None), SourcesPolicy::Verify)
        .expect("add");

    let datasets = cat.index.datasets();
    assert!(datasets.has(&uuid(TELEMETRY_ID)).expect("has"));
    assert!(!datasets.has(&uuid("f226a278-e422-11e6-b501-185e0f80a5c0")).expect("has"));
}

#[test]
fn rolled_back_transaction_leaves_no_trace() {
    let cat = catalog();
    let product = telemetry_product(&cat.index);
    let id = uuid(TELEMETRY_ID);
    let datasets = cat.index.datasets();

    let tx = cat.index.db().begin().expect("begin");
    assert!(records::insert_dataset(&tx, &telemetry_doc(), &id, &product).expect("insert"));
    assert!(records::contains_dataset(&tx, &id).expect("contains"));
    // Other connections cannot see uncommitted writes.
    assert!(!datasets.has(&id).expect("has"));
    tx.rollback().expect("rollback");

    assert!(!datasets.has(&id).expect("has"));
    assert!(datasets.get(&id).expect("get").is_none());
}

#[test]
fn dropped_transaction_is_never_committed() {
    let cat = catalog();
    let product = telemetry_product(&cat.index);
    let id = uuid(TELEMETRY_ID);
    {
        let tx = cat.index.db().begin().expect("begin");
        records::insert_dataset(&tx, &telemetry_doc(), &id, &product).expect("insert");
    }
    assert!(!cat.index.datasets().has(&id).expect("has"));
}

#[test]
fn unknown_ids_and_names_are_absent_not_errors() {
    let cat = catalog();
    let missing = uuid(MISSING_ID);
    let datasets = cat.index.datasets();

    assert!(datasets.get(&missing).expect("get").is_none());
    assert!(datasets.get_without_sources(&missing).expect("get").is_none());
    assert!(datasets.get_many(&[missing]).expect("get_many").is_empty());
    assert!(cat.index.metadata_types().get(i64::MAX).expect("get").is_none());
    assert!(cat.index.metadata_types().get_by_name("nope").expect("get").is_none());
    assert!(cat.index.products().get(i64::MAX).expect("get").is_none());
    assert!(cat.index.products().get_by_name("nope").expect("get").is_none());
    assert!(datasets.get_locations(&missing).expect("locations").is_empty());
}

#[test]
fn racing_inserts_of_one_id_leave_exactly_one_winner() {
    let cat = catalog();
    let product = telemetry_product(&cat.index);
    let barrier = Arc::new(Barrier::new(2));

    let handles: Vec<_> = ["P00", "P51"]
        .into_iter()
        .map(|level| {
            let datasets = cat.index.datasets();
            let barrier = Arc::clone(&barrier);
            let mut doc = telemetry_doc();
            doc["ga_level"] = json!(level);
            let ds = dataset(&product, doc, None);
            thread::spawn(move || {
                barrier.wait();
                datasets.add(&ds, SourcesPolicy::Ensure).map(|_| level)
            })
        })
        .collect();

    let results: Vec<Result<&str, CatalogError>> = handles
        .into_iter()
        .map(|h| h.join().expect("thread"))
        .collect();
    let winners: Vec<&str> = results.iter().filter_map(|r| r.as_ref().ok().copied()).collect();
    assert_eq!(winners.len(), 1, "results: {results:?}");
    assert!(
        results
            .iter()
            .any(|r| matches!(r, Err(CatalogError::DuplicateRecord { .. }))),
        "loser must see a duplicate: {results:?}"
    );

    let stored = cat
        .index
        .datasets()
        .get(&uuid(TELEMETRY_ID))
        .expect("get")
        .expect("present");
    assert_eq!(stored.document["ga_level"], winners[0]);
}

#[test]
fn search_eager_filters_on_builtin_and_metadata_fields() {
    let cat = catalog();
    let product = telemetry_product(&cat.index);
    let datasets = cat.index.datasets();
    datasets
        .add(&dataset(&product, telemetry_doc(), None), SourcesPolicy::Verify)
        .expect("add first");
    let mut small = telemetry_doc_with_id(OTHER_ID);
    small["size_bytes"] = json!(10);
    small["platform"] = json!({"code": "LANDSAT_7"});
    datasets
        .add(&dataset(&product, small, None), SourcesPolicy::Verify)
        .expect("add second");

    let search = |predicates: &[Predicate]| -> Vec<String> {
        datasets
            .search_eager(predicates)
            .expect("search")
            .into_iter()
            .map(|d| d.id.to_string())
            .collect()
    };
    assert_eq!(search(&[]).len(), 2);
    assert_eq!(search(&[Predicate::eq("platform", "LANDSAT_8")]), vec![TELEMETRY_ID]);
    assert_eq!(search(&[Predicate::eq("product", "ls8_telemetry")]).len(), 2);
    assert_eq!(search(&[Predicate::eq("metadata_type", "eo")]).len(), 2);
    assert_eq!(search(&[Predicate::eq("id", OTHER_ID)]), vec![OTHER_ID]);
    assert_eq!(
        search(&[Predicate::range("size_bytes", None, Some(json!(1000)))]),
        vec![OTHER_ID]
    );
    assert_eq!(
        search(&[
            Predicate::eq("product", "ls8_telemetry"),
            Predicate::range("size_bytes", Some(json!(1000)), None),
        ]),
        vec![TELEMETRY_ID]
    );
    assert!(search(&[Predicate::eq("product", "unknown")]).is_empty());
    assert_eq!(
        datasets
            .count(&[Predicate::parse("platform=LANDSAT_7").expect("parse")])
            .expect("count"),
        1
    );

    let err = datasets
        .search_eager(&[Predicate::eq("cloud_cover", 5)])
        .expect_err("unknown field");
    assert!(matches!(err, CatalogError::ValidationError(_)));
}

#[test]
fn failed_add_writes_nothing_including_locations() {
    let cat = catalog();
    let product = telemetry_product(&cat.index);
    let datasets = cat.index.datasets();

    let bad_uri = dataset(&product, telemetry_doc(), Some("file:///tmp/a.yaml")).with_uri("not a uri");
    let err = datasets
        .add(&bad_uri, SourcesPolicy::Verify)
        .expect_err("invalid uri");
    assert!(matches!(err, CatalogError::ValidationError(_)));

    let orphan = dataset(&product, telemetry_doc_with_id(CHILD_ID), Some("file:///tmp/child.yaml"))
        .with_source("source", dataset(&product, telemetry_doc(), None));
    let err = datasets
        .add(&orphan, SourcesPolicy::Skip)
        .expect_err("missing parent");
    assert!(err.is_missing(), "unexpected error: {err}");

    assert_eq!(datasets.count(&[]).expect("count"), 0);
    assert!(datasets.get_locations(&uuid(CHILD_ID)).expect("locations").is_empty());
    assert!(
        datasets
            .get_datasets_for_location("file:///tmp/child.yaml")
            .expect("reverse lookup")
            .is_empty()
    );
}

#[test]
fn several_initial_locations_are_stored_with_the_first_as_newest() {
    let cat = catalog();
    let product = telemetry_product(&cat.index);
    let ds = dataset(&product, telemetry_doc(), Some("file:///tmp/newest.yaml"))
        .with_uri("s3://bucket/older.yaml");
    let stored = cat
        .index
        .datasets()
        .add(&ds, SourcesPolicy::Verify)
        .expect("add");
    assert_eq!(
        stored.uris,
        vec!["file:///tmp/newest.yaml".to_string(), "s3://bucket/older.yaml".to_string()]
    );
    assert_eq!(stored.local_path(), Some(PathBuf::from("/tmp/newest.yaml")));
    assert!(stored.indexed_time.is_some());
    assert!(!stored.is_archived());
}
