#![allow(dead_code)]

use geodash::{DashboardConfig, MemorySource};
use serde_json::{Value, json};
use std::path::Path;

/// Two shape layers served from a file tree:
/// - `Sites` (discrete rule, features 1, 2, 3; feature 3 has no data document)
/// - `Snow` (continuous black -> white over 0..100, features 1 and `a`)
pub fn documents() -> Vec<(&'static str, Value)> {
    vec![
        (
            "sites/index.json",
            json!({
                "geoJSONUrl": "geo.json",
                "dataUrlTemplate": "data/{VARIABLE}/{GRANULARITY}/{ID}.json",
                "metadataUrlTemplate": "meta/{ID}.json",
                "minLatitude": 40.0, "maxLatitude": 42.0,
                "minLongitude": -112.0, "maxLongitude": -110.0
            }),
        ),
        (
            "sites/geo.json",
            json!({
                "type": "FeatureCollection",
                "features": [
                    {"type": "Feature", "properties": {"id": 1, "name": "One"}, "geometry": null},
                    {"type": "Feature", "properties": {"id": "2", "name": "Two"}, "geometry": null},
                    {"type": "Feature", "properties": {"id": 3}, "geometry": null}
                ]
            }),
        ),
        (
            "sites/data/na/monthly/1.json",
            json!({
                "2010": {"0": {"average": 10}, "1": {"average": 60}},
                "2011": {"0": {"average": 80}}
            }),
        ),
        (
            "sites/data/na/monthly/2.json",
            json!({"data": {"2010": {"0": {"average": 55, "min": 50, "max": 60}}}}),
        ),
        ("sites/meta/1.json", json!({"name": "Site One", "elevation": 2100})),
        ("sites/meta/2.json", json!({"name": "Site Two"})),
        ("sites/meta/3.json", json!({"name": "Site Three"})),
        (
            "snow/index.json",
            json!({
                "geoJSONUrl": "geo.json",
                "dataUrlTemplate": "data/{VARIABLE}/{GRANULARITY}/{ID}.json",
                "metadataUrlTemplate": "meta/{ID}.json"
            }),
        ),
        (
            "snow/geo.json",
            json!({
                "type": "FeatureCollection",
                "features": [
                    {"type": "Feature", "properties": {"id": "1"}, "geometry": null},
                    {"type": "Feature", "properties": {"id": "a"}, "geometry": null}
                ]
            }),
        ),
        (
            "snow/data/swe/monthly/1.json",
            json!({"2010": {"0": {"average": 0}}}),
        ),
        (
            "snow/data/swe/monthly/a.json",
            json!({"2010": {"0": {"average": 50}}, "2011": {"0": {"average": 150}}}),
        ),
        ("snow/meta/1.json", json!({})),
        ("snow/meta/a.json", json!({"basin": "A"})),
    ]
}

pub fn config_json() -> Value {
    json!({
        "baseLayers": ["Grayscale"],
        "overlayLayers": [
            {"name": "Sites", "dataIndexUrl": "sites/index.json", "variable": "na",
             "colorMap": [[-1000, 50, "#d8f3dc", "low"], [50, 1000, "#2d6a4f", "high"]]},
            {"name": "Snow", "dataIndexUrl": "snow/index.json", "variable": "swe",
             "valueColorPairs": [[0, "#000000"], [100, "#ffffff"]]},
            {"type": "matrix", "name": "Contour", "dataIndexUrl": "matrix/index.json",
             "plot": "contour", "thresholds": [245, 250]}
        ],
        "yearRange": [2010, 2011],
        "plugins": [
            {"name": "TimeControl"},
            {"name": "Legend", "variable": "na"},
            {"name": "Legend", "variable": "nope"},
            {"name": "Sidebar", "plugins": [
                {"name": "SidebarMetadata"},
                {"name": "SidebarLineChart", "title": "Trend", "variables": ["na", "swe"]}
            ]},
            {"name": "Longbar", "plugins": [
                {"name": "LongbarLineChart", "variables": ["na"]}
            ]}
        ]
    })
}

pub fn config() -> DashboardConfig {
    serde_json::from_value(config_json()).unwrap()
}

pub fn memory_source() -> MemorySource {
    documents()
        .into_iter()
        .fold(MemorySource::new(), |src, (path, doc)| src.with(path, doc))
}

/// Lay the same documents out on disk, plus `dashboard.json` at the root.
pub fn write_tree(root: &Path) {
    for (path, doc) in documents() {
        let full = root.join(path);
        std::fs::create_dir_all(full.parent().unwrap()).unwrap();
        std::fs::write(full, serde_json::to_string_pretty(&doc).unwrap()).unwrap();
    }
    std::fs::write(
        root.join("dashboard.json"),
        serde_json::to_string_pretty(&config_json()).unwrap(),
    )
    .unwrap();
}
