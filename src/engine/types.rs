use std::collections::HashMap;

use serde::{Deserialize, Deserializer, Serialize};
use serde_json::Value;

/// Locale key present on every localized field that has any localization.
pub const DEFAULT_LOCALE: &str = "default";

/// Language tag → text.
pub type Localized = HashMap<String, String>;

/// Null translations are dropped so lookups fall back to [`DEFAULT_LOCALE`].
fn localized_field<'de, D>(deserializer: D) -> Result<Option<Localized>, D::Error>
where
    D: Deserializer<'de>,
{
    let raw = Option::<HashMap<String, Option<String>>>::deserialize(deserializer)?;
    Ok(raw.map(|values| {
        values
            .into_iter()
            .filter_map(|(lang, text)| Some((lang, text?)))
            .collect()
    }))
}

/// WGS-84 position in degrees.
#[derive(Deserialize, Debug, Clone, Copy, PartialEq)]
pub struct Coordinate {
    pub lon: f64,
    pub lat: f64,
}

impl Coordinate {
    /// Planar distance over raw degree deltas.
    pub fn distance(&self, other: &Self) -> f64 {
        (self.lon - other.lon).hypot(self.lat - other.lat)
    }
}

/// A place record as stored in the index (`_source`).
#[derive(Deserialize, Debug, Clone)]
pub struct PlaceDocument {
    pub osm_id: Option<i64>,
    pub osm_type: Option<String>,
    pub category: Option<i64>,
    #[serde(default, deserialize_with = "localized_field")]
    pub name: Option<Localized>,
    #[serde(default, deserialize_with = "localized_field")]
    pub street: Option<Localized>,
    #[serde(default, deserialize_with = "localized_field")]
    pub city: Option<Localized>,
    #[serde(default, deserialize_with = "localized_field")]
    pub country: Option<Localized>,
    #[serde(default, deserialize_with = "localized_field")]
    pub state: Option<Localized>,
    pub housenumber: Option<String>,
    pub postcode: Option<String>,
    pub coordinate: Coordinate,
    /// Kept undecoded so a malformed envelope only costs the extent, not the hit.
    pub extent: Option<Value>,
}

impl PlaceDocument {
    pub fn default_name(&self) -> Option<&str> {
        self.name
            .as_ref()
            .and_then(|names| names.get(DEFAULT_LOCALE))
            .map(String::as_str)
    }
}

/// A ranked document. Position in the hit list is the engine's relevance order.
#[derive(Debug, Clone)]
pub struct SearchHit {
    pub score: Option<f64>,
    pub document: PlaceDocument,
}

/// Body of `POST /{index}/_search`.
#[derive(Debug, Serialize)]
pub struct SearchBody {
    pub query: Value,
    pub size: usize,
    pub timeout: String,
}

#[derive(Debug, Deserialize)]
pub struct SearchResponse {
    #[serde(default)]
    pub timed_out: bool,
    pub hits: Option<HitsEnvelope>,
}

#[derive(Debug, Deserialize)]
pub struct HitsEnvelope {
    #[serde(default)]
    pub hits: Vec<RawHit>,
}

#[derive(Debug, Deserialize)]
pub struct RawHit {
    #[serde(rename = "_id")]
    pub id: Option<String>,
    #[serde(rename = "_score")]
    pub score: Option<f64>,
    #[serde(rename = "_source")]
    pub source: Option<Value>,
}

/// Error payload. Older engines send a bare string, newer ones an object with `reason`.
#[derive(Debug, Deserialize)]
pub struct ErrorResponse {
    pub error: Option<Value>,
}

impl ErrorResponse {
    pub fn reason(&self) -> Option<String> {
        match self.error.as_ref()? {
            Value::String(s) => Some(s.clone()),
            Value::Object(obj) => obj
                .get("reason")
                .or_else(|| obj.get("type"))
                .and_then(Value::as_str)
                .map(str::to_string),
            _ => None,
        }
    }
}
