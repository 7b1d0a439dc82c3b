use crate::prelude::HashMap;
use serde::{Deserialize, Serialize};

/// Decoded geometry, serialized the way GeoJSON spells it.
///
/// Coordinates are `[lng, lat]` pairs rounded to the decoder's precision.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type")]
pub enum Geometry {
    Point { coordinates: [f64; 2] },
    LineString { coordinates: Vec<[f64; 2]> },
    Polygon { coordinates: Vec<Vec<[f64; 2]>> },
}

/// One record of the dataset, ready for rendering.
///
/// Features are never mutated after decoding; caches and loaders share them.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Feature {
    pub geometry: Geometry,
    pub properties: HashMap<String, serde_json::Value>,
}

impl Feature {
    pub fn new(geometry: Geometry, properties: HashMap<String, serde_json::Value>) -> Self {
        Self {
            geometry,
            properties,
        }
    }

    pub fn property(&self, key: &str) -> Option<&serde_json::Value> {
        self.properties.get(key)
    }

    pub fn property_str(&self, key: &str) -> Option<&str> {
        self.property(key).and_then(serde_json::Value::as_str)
    }
}

/// Wraps features into a GeoJSON `FeatureCollection` document
pub fn feature_collection(features: &[Feature]) -> serde_json::Value {
    let features: Vec<serde_json::Value> = features
        .iter()
        .map(|feature| {
            serde_json::json!({
                "type": "Feature",
                "geometry": feature.geometry,
                "properties": feature.properties,
            })
        })
        .collect();

    serde_json::json!({
        "type": "FeatureCollection",
        "features": features,
    })
}
