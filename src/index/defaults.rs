//! Built-in metadata types installed by `database init`.

use serde_json::{Value, json};

pub fn default_metadata_types() -> Vec<Value> {
    vec![eo(), telemetry()]
}

fn eo() -> Value {
    json!({
        "name": "eo",
        "description": "Earth Observation datasets. Expected metadata structure produced by the eodatasets library.",
        "dataset": {
            "id": ["id"],
            "creation_dt": ["creation_dt"],
            "label": ["ga_label"],
            "measurements": ["image", "bands"],
            "format": ["format", "name"],
            "sources": ["lineage", "source_datasets"],
            "search_fields": {
                "platform": {
                    "description": "Platform code",
                    "offset": ["platform", "code"]
                },
                "instrument": {
                    "description": "Instrument name",
                    "offset": ["instrument", "name"]
                },
                "product_type": {
                    "description": "Product code",
                    "offset": ["product_type"]
                },
                "format": {
                    "description": "File format (GeoTIFF, NetCDF)",
                    "offset": ["format", "name"]
                },
                "label": {
                    "description": "Label",
                    "offset": ["ga_label"]
                },
                "level": {
                    "description": "Processing level",
                    "offset": ["ga_level"]
                },
                "size_bytes": {
                    "description": "Size of the dataset in bytes",
                    "offset": ["size_bytes"]
                },
                "center_time": {
                    "description": "Centre of the acquisition",
                    "offset": ["extent", "center_dt"]
                },
                "creation_time": {
                    "description": "Time of dataset creation",
                    "offset": ["creation_dt"]
                }
            }
        }
    })
}

fn telemetry() -> Value {
    json!({
        "name": "telemetry",
        "description": "Raw satellite telemetry (downlink) datasets.",
        "dataset": {
            "id": ["id"],
            "creation_dt": ["creation_dt"],
            "label": ["ga_label"],
            "sources": ["lineage", "source_datasets"],
            "search_fields": {
                "platform": {
                    "description": "Platform code",
                    "offset": ["platform", "code"]
                },
                "instrument": {
                    "description": "Instrument name",
                    "offset": ["instrument", "name"]
                },
                "product_type": {
                    "description": "Product code",
                    "offset": ["product_type"]
                },
                "orbit": {
                    "description": "Orbit number",
                    "offset": ["acquisition", "platform_orbit"]
                },
                "gsi": {
                    "description": "Ground Station Identifier",
                    "offset": ["acquisition", "groundstation", "code"]
                },
                "sat_path": {
                    "description": "Landsat path",
                    "offset": ["image", "satellite_ref_point_start", "x"]
                },
                "sat_row": {
                    "description": "Landsat row",
                    "offset": ["image", "satellite_ref_point_start", "y"]
                }
            }
        }
    })
}
