//! Shared catalog fixtures for the index integration tests.

#![allow(dead_code)]

use cubeindex::core::config::CatalogConfig;
use cubeindex::index::Index;
use cubeindex::index::model::{Dataset, Product};
use serde_json::{Value, json};
use tempfile::TempDir;
use uuid::Uuid;

pub const TELEMETRY_ID: &str = "4ec8fe97-e8b9-11e4-87ff-1040f381a756";
pub const CHILD_ID: &str = "051a003f-5bba-43c7-b5f1-7f1da3ae9cfb";
pub const OTHER_ID: &str = "366f32d8-e1f8-11e6-94b4-185e0f80a5c0";
pub const MISSING_ID: &str = "18474b58-c8a6-11e6-a4b3-185e0f80a5c0";

/// An initialised index on a private temp database. Keep it alive for the
/// whole test; dropping it deletes the database.
pub struct Catalog {
    pub index: Index,
    _tmp: TempDir,
}

pub fn catalog() -> Catalog {
    let tmp = TempDir::new().expect("tempdir");
    let index = Index::new(CatalogConfig::for_path(tmp.path().join("catalog.db")));
    assert!(index.init_db(true).expect("init db"), "fresh database");
    Catalog { index, _tmp: tmp }
}

pub fn uuid(raw: &str) -> Uuid {
    Uuid::parse_str(raw).expect("uuid")
}

pub fn telemetry_product_doc() -> Value {
    json!({
        "name": "ls8_telemetry",
        "description": "LS8 test",
        "metadata": {
            "product_type": "satellite_telemetry_data",
            "platform": {"code": "LANDSAT_8"},
            "format": {"name": "MD"}
        },
        "metadata_type": "eo"
    })
}

pub fn telemetry_product(index: &Index) -> Product {
    index
        .products()
        .add_document(&telemetry_product_doc())
        .expect("add product")
}

pub fn telemetry_doc() -> Value {
    json!({
        "product_type": "satellite_telemetry_data",
        "checksum_path": "package.sha1",
        "id": TELEMETRY_ID,
        "ga_label": "LS8_OLITIRS_STD-MD_P00_LC81160740742015089ASA00_116_074_20150330T022553Z20150330T022657",
        "ga_level": "P00",
        "size_bytes": 637660782,
        "platform": {"code": "LANDSAT_8"},
        "extent": {
            "center_dt": "2014-07-26T23:49:00.343853",
            "coord": {
                "ll": {"lat": -31.33333, "lon": 149.78434},
                "lr": {"lat": -31.37116, "lon": 152.20094},
                "ul": {"lat": -29.23394, "lon": 149.85216},
                "ur": {"lat": -29.26873, "lon": 152.21782}
            }
        },
        "creation_dt": "2015-04-22T06:32:04",
        "instrument": {"name": "OLI_TIRS"},
        "format": {"name": "MD"},
        "lineage": {"source_datasets": {}}
    })
}

/// The telemetry document under another id.
pub fn telemetry_doc_with_id(id: &str) -> Value {
    let mut doc = telemetry_doc();
    doc["id"] = json!(id);
    doc
}

pub fn dataset(product: &Product, doc: Value, uri: Option<&str>) -> Dataset {
    Dataset::new(product.clone(), doc, uri).expect("dataset")
}

pub fn file_uri(path: &str) -> String {
    format!("file://{}", path)
}
