mod fixtures;

use cubeindex::core::config::CatalogConfig;
use cubeindex::core::error::CatalogError;
use cubeindex::index::Index;
use fixtures::*;
use serde_json::json;
use tempfile::TempDir;

#[test]
fn default_metadata_types_are_installed_once() {
    let cat = catalog();
    let names: Vec<String> = cat
        .index
        .metadata_types()
        .list()
        .expect("list")
        .into_iter()
        .map(|mt| mt.name)
        .collect();
    assert_eq!(names, vec!["eo", "telemetry"]);

    // Initialising again is not a fresh creation and adds nothing.
    assert!(!cat.index.init_db(true).expect("re-init"));
    assert_eq!(cat.index.metadata_types().list().expect("list").len(), 2);

    let eo = cat
        .index
        .metadata_types()
        .get_by_name("eo")
        .expect("get")
        .expect("present");
    assert!(eo.search_field_names().contains(&"platform".to_string()));
    assert_eq!(
        cat.index.metadata_types().get(eo.id).expect("get by id"),
        Some(eo)
    );
}

#[test]
fn product_add_is_idempotent_and_rejects_conflicts() {
    let cat = catalog();
    let first = telemetry_product(&cat.index);
    let again = telemetry_product(&cat.index);
    assert_eq!(first, again);
    assert_eq!(first.metadata_type.name, "eo");
    assert_eq!(first.description(), Some("LS8 test"));
    assert_eq!(
        first.metadata().and_then(|m| m.get("product_type")),
        Some(&json!("satellite_telemetry_data"))
    );

    let mut changed = telemetry_product_doc();
    changed["description"] = json!("something else");
    let err = cat
        .index
        .products()
        .add_document(&changed)
        .expect_err("conflicting definition");
    assert!(err.is_mismatch(), "unexpected error: {err}");

    assert_eq!(cat.index.products().list().expect("list").len(), 1);
    assert_eq!(
        cat.index
            .products()
            .get_by_name("ls8_telemetry")
            .expect("get")
            .map(|p| p.id),
        Some(first.id)
    );
}

#[test]
fn product_needs_a_known_metadata_type() {
    let cat = catalog();
    let err = cat
        .index
        .products()
        .add_document(&json!({"name": "orphan", "metadata_type": "nope"}))
        .expect_err("unknown metadata type");
    assert!(err.is_missing(), "unexpected error: {err}");

    let err = cat
        .index
        .products()
        .add_document(&json!({"metadata_type": "eo"}))
        .expect_err("unnamed product");
    assert!(matches!(err, CatalogError::ValidationError(_)));
}

#[test]
fn custom_metadata_type_drives_offsets() {
    let cat = catalog();
    let mt = cat
        .index
        .metadata_types()
        .add(&json!({
            "name": "flat",
            "dataset": {
                "id": ["uuid"],
                "sources": ["parents"],
                "search_fields": {"site": {"offset": ["site"]}}
            }
        }))
        .expect("add metadata type");
    assert_eq!(mt.id_offset(), vec!["uuid"]);
    assert_eq!(mt.sources_offset(), vec!["parents"]);

    let err = cat
        .index
        .metadata_types()
        .add(&json!({"name": "broken", "dataset": []}))
        .expect_err("dataset must be an object");
    assert!(matches!(err, CatalogError::ValidationError(_)));
}

#[test]
fn connecting_requires_an_initialised_database() {
    let tmp = TempDir::new().expect("tempdir");
    let config = CatalogConfig::for_path(tmp.path().join("fresh.db"));
    assert!(matches!(
        Index::connect(config.clone()),
        Err(CatalogError::DatabaseInitializationError(_))
    ));

    let index = Index::new(config.clone());
    assert!(index.init_db(false).expect("init"));
    assert!(index.metadata_types().list().expect("list").is_empty());
    assert!(Index::connect(config).is_ok());
}
