//! API record decoding
//!
//! Records arrive as loosely shaped JSON objects. Only the fields the map
//! needs are read; geometry goes through the [`GeometryDecoder`] and the
//! property set is projected according to the zoom policy's tier.

use crate::data::category::Category;
use crate::data::decoder::GeometryDecoder;
use crate::data::feature::Feature;
use crate::prelude::HashMap;
use crate::query::policy::{PropertyTier, ZoomPolicy};
use serde::Deserialize;
use serde_json::Value;
use std::collections::BTreeMap;

/// The subset of an API record the loader reads
#[derive(Debug, Clone, Default, Deserialize)]
#[serde(default)]
pub struct ApiRecord {
    #[serde(rename = "Id")]
    pub id: Option<Value>,
    #[serde(rename = "Type")]
    pub kind: Option<String>,
    #[serde(rename = "Code")]
    pub code: Option<Value>,
    #[serde(rename = "Active")]
    pub active: Option<bool>,
    #[serde(rename = "Shortname")]
    pub shortname: Option<String>,
    #[serde(rename = "Detail")]
    pub detail: BTreeMap<String, RecordDetail>,
    #[serde(rename = "Geo")]
    pub geo: Option<GeoField>,
    #[serde(rename = "Geometry")]
    pub geometry: Option<String>,
}

#[derive(Debug, Clone, Default, Deserialize)]
#[serde(default)]
pub struct RecordDetail {
    #[serde(rename = "Title")]
    pub title: Option<String>,
}

/// `Geo` comes either as a list or as a map keyed by an arbitrary name
#[derive(Debug, Clone, Deserialize)]
#[serde(untagged)]
pub enum GeoField {
    List(Vec<GeoEntry>),
    Map(BTreeMap<String, GeoEntry>),
}

#[derive(Debug, Clone, Default, Deserialize)]
#[serde(default)]
pub struct GeoEntry {
    #[serde(rename = "Geometry")]
    pub geometry: Option<String>,
    #[serde(rename = "Default")]
    pub default: bool,
}

/// Languages used for title lookup
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TitleLocales<'a> {
    pub requested: &'a str,
    pub fallback: &'a str,
}

impl ApiRecord {
    /// WKT of the record's preferred geometry.
    ///
    /// The entry flagged `Default` wins, otherwise the first entry carrying a
    /// geometry. A bare `Geometry` on the record is used when `Geo` is absent.
    pub fn raw_geometry(&self) -> Option<&str> {
        let entries: Vec<&GeoEntry> = match &self.geo {
            Some(GeoField::List(list)) => list.iter().collect(),
            Some(GeoField::Map(map)) => map.values().collect(),
            None => Vec::new(),
        };

        let chosen = entries
            .iter()
            .copied()
            .find(|entry| entry.default && entry.geometry.is_some())
            .or_else(|| entries.iter().copied().find(|entry| entry.geometry.is_some()));

        chosen
            .and_then(|entry| entry.geometry.as_deref())
            .or(self.geometry.as_deref())
    }

    /// Record id as text; numeric ids are stringified
    pub fn id_text(&self) -> Option<String> {
        match self.id.as_ref()? {
            Value::String(id) => Some(id.clone()),
            Value::Null => None,
            other => Some(other.to_string()),
        }
    }

    /// Localized title: requested locale, fallback locale, any locale, short
    /// name, then id
    pub fn title(&self, locales: &TitleLocales<'_>) -> Option<String> {
        let localized = |lang: &str| {
            self.detail
                .get(lang)
                .and_then(|detail| non_empty(detail.title.as_deref()))
        };

        localized(locales.requested)
            .or_else(|| localized(locales.fallback))
            .or_else(|| {
                self.detail
                    .values()
                    .find_map(|detail| non_empty(detail.title.as_deref()))
            })
            .or_else(|| non_empty(self.shortname.as_deref()))
            .map(str::to_string)
            .or_else(|| self.id_text())
    }

    fn is_active(&self) -> bool {
        self.active.unwrap_or(true)
    }

    /// Properties carried by the feature at the policy's tier
    pub fn properties(
        &self,
        category: Category,
        tier: PropertyTier,
        locales: &TitleLocales<'_>,
    ) -> HashMap<String, Value> {
        let mut properties = HashMap::default();
        properties.insert(
            "id".to_string(),
            self.id_text().map(Value::String).unwrap_or(Value::Null),
        );
        properties.insert(
            "category".to_string(),
            Value::String(category.code().to_string()),
        );
        properties.insert("code".to_string(), self.code.clone().unwrap_or(Value::Null));
        properties.insert("active".to_string(), Value::Bool(self.is_active()));

        if tier >= PropertyTier::Titled {
            properties.insert(
                "title".to_string(),
                self.title(locales).map(Value::String).unwrap_or(Value::Null),
            );
        }

        if tier >= PropertyTier::Full {
            properties.insert(
                "shortname".to_string(),
                self.shortname.clone().map(Value::String).unwrap_or(Value::Null),
            );
            let label = if self.is_active() { "Active" } else { "Inactive" };
            properties.insert("active_label".to_string(), Value::String(label.to_string()));
        }

        properties
    }
}

fn non_empty(text: Option<&str>) -> Option<&str> {
    text.map(str::trim).filter(|text| !text.is_empty())
}

/// Decode one JSON record into a feature.
///
/// Returns `None` for records that are not objects of the expected shape or
/// whose geometry cannot be decoded at this zoom.
pub fn decode_record(
    value: &Value,
    category: Category,
    policy: &ZoomPolicy,
    decoder: &GeometryDecoder,
    locales: &TitleLocales<'_>,
) -> Option<Feature> {
    let record = match ApiRecord::deserialize(value) {
        Ok(record) => record,
        Err(err) => {
            log::debug!("skipping malformed {} record: {}", category, err);
            return None;
        }
    };

    let geometry = decoder.decode(record.raw_geometry()?, policy)?;
    let properties = record.properties(category, policy.property_tier, locales);
    Some(Feature::new(geometry, properties))
}

/// Records carried by a page body: a bare array or an object with `Items`
pub fn page_records(body: Value) -> Option<Vec<Value>> {
    match body {
        Value::Array(records) => Some(records),
        Value::Object(mut map) => match map.remove("Items").or_else(|| map.remove("items")) {
            Some(Value::Array(records)) => Some(records),
            _ => None,
        },
        _ => None,
    }
}
