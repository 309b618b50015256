//! Conversion of deduplicated hits into the client-facing result shape.

pub mod id;

use serde::Serialize;
use serde_json::Value;
use tracing::warn;

use crate::engine::types::{DEFAULT_LOCALE, Localized};
use crate::engine::{PlaceDocument, SearchHit};
use crate::search::Language;

pub use id::{decode_id, encode_id};

#[derive(Serialize, Debug, Clone, Copy, PartialEq)]
pub struct Point {
    pub x: f64,
    pub y: f64,
}

#[derive(Serialize, Debug, Clone, Default, PartialEq)]
pub struct AddressEntry {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub housenumber: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub zipcode: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub street: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub city: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub country: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub state: Option<String>,
}

/// One entry of the response list.
#[derive(Serialize, Debug, Clone, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct FormattedResult {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub category: Option<i64>,
    #[serde(rename = "poi_id", skip_serializing_if = "Option::is_none")]
    pub poi_id: Option<String>,
    pub name: String,
    pub point: Point,
    /// `[sw, ne]`, corner-normalized.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub extent: Option<[Point; 2]>,
    pub address_entry: AddressEntry,
}

pub fn format_hits(hits: &[SearchHit], lang: &Language) -> Vec<FormattedResult> {
    hits.iter().map(|hit| format_hit(&hit.document, lang)).collect()
}

pub fn format_hit(doc: &PlaceDocument, lang: &Language) -> FormattedResult {
    FormattedResult {
        category: doc.category,
        poi_id: doc.osm_id.map(encode_id),
        name: build_caption(doc, lang),
        point: Point {
            x: doc.coordinate.lon,
            y: doc.coordinate.lat,
        },
        extent: build_extent(doc),
        address_entry: build_address_entry(doc, lang),
    }
}

/// Requested language first, then the default locale.
fn localized<'a>(field: Option<&'a Localized>, lang: &Language) -> Option<&'a str> {
    let values = field?;
    values
        .get(lang.as_str())
        .or_else(|| values.get(DEFAULT_LOCALE))
        .map(String::as_str)
}

fn build_caption(doc: &PlaceDocument, lang: &Language) -> String {
    let name = localized(doc.name.as_ref(), lang);
    let city = localized(doc.city.as_ref(), lang);

    let mut caption = match name.filter(|n| !n.is_empty()) {
        Some(name) => name.to_string(),
        None => lang.street_line(
            localized(doc.street.as_ref(), lang),
            doc.housenumber.as_deref(),
        ),
    };

    if let Some(city) = city.filter(|c| !c.is_empty())
        && name != Some(city)
    {
        caption.push_str(", ");
        caption.push_str(city);
    }

    caption
}

fn build_address_entry(doc: &PlaceDocument, lang: &Language) -> AddressEntry {
    let field = |values: &Option<Localized>| localized(values.as_ref(), lang).map(str::to_string);
    AddressEntry {
        housenumber: doc.housenumber.clone(),
        zipcode: doc.postcode.clone(),
        street: field(&doc.street),
        city: field(&doc.city),
        country: field(&doc.country),
        state: field(&doc.state),
    }
}

fn build_extent(doc: &PlaceDocument) -> Option<[Point; 2]> {
    let raw = doc.extent.as_ref()?;
    let Some([a, b]) = envelope_corners(raw) else {
        warn!(osm_id = ?doc.osm_id, extent = %raw, "omitting malformed extent");
        return None;
    };
    let sw = Point {
        x: a.x.min(b.x),
        y: a.y.min(b.y),
    };
    let ne = Point {
        x: a.x.max(b.x),
        y: a.y.max(b.y),
    };
    Some([sw, ne])
}

/// Reads `{"coordinates": [[x, y], [x, y]]}`; corners may come in any order.
fn envelope_corners(raw: &Value) -> Option<[Point; 2]> {
    let coordinates = raw.get("coordinates")?.as_array()?;
    let corner = |value: &Value| -> Option<Point> {
        let pair = value.as_array()?;
        let x = pair.first()?.as_f64()?;
        let y = pair.get(1)?.as_f64()?;
        (x.is_finite() && y.is_finite()).then_some(Point { x, y })
    };
    Some([corner(coordinates.first()?)?, corner(coordinates.get(1)?)?])
}
