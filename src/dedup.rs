//! Duplicate suppression over a ranked hit list.
//!
//! Two order-preserving stages run in sequence: exact entity duplicates keyed by
//! `(osm_id, category)`, then settlements that share a default name and lie close
//! together. The first hit of every duplicate group wins.

use std::collections::{HashMap, HashSet};

use tracing::debug;

use crate::engine::{Coordinate, PlaceDocument, SearchHit};

/// City and town classes.
pub const SETTLEMENT_CATEGORIES: [i64; 3] = [225, 228, 229];

/// Degree distance under which two equally named settlements are one place (about 50 km).
pub const SETTLEMENT_MERGE_DISTANCE: f64 = 0.7;

pub fn deduplicate(hits: Vec<SearchHit>) -> Vec<SearchHit> {
    dedup_settlements(dedup_entities(hits))
}

/// Drops repeated `(osm_id, category)` pairs. Hits missing either part are always kept.
pub fn dedup_entities(mut hits: Vec<SearchHit>) -> Vec<SearchHit> {
    let mut seen = HashSet::with_capacity(hits.len());
    hits.retain(|hit| {
        let doc = &hit.document;
        let (Some(osm_id), Some(category)) = (doc.osm_id, doc.category) else {
            return true;
        };
        let first = seen.insert((osm_id, category));
        if !first {
            debug!(osm_id, category, "dropping repeated entity");
        }
        first
    });
    hits
}

/// Drops a settlement when an already kept settlement with the same default name
/// lies within [`SETTLEMENT_MERGE_DISTANCE`]. A name can keep several far-apart places.
pub fn dedup_settlements(mut hits: Vec<SearchHit>) -> Vec<SearchHit> {
    let mut kept: HashMap<String, Vec<Coordinate>> = HashMap::new();
    hits.retain(|hit| {
        let doc = &hit.document;
        if !is_settlement(doc) {
            return true;
        }
        let Some(name) = doc.default_name() else {
            return true;
        };

        let places = kept.entry(name.to_string()).or_default();
        if places
            .iter()
            .any(|c| c.distance(&doc.coordinate) < SETTLEMENT_MERGE_DISTANCE)
        {
            debug!(place = %name, osm_id = ?doc.osm_id, osm_type = ?doc.osm_type, "dropping nearby settlement");
            return false;
        }
        places.push(doc.coordinate);
        true
    });
    hits
}

fn is_settlement(doc: &PlaceDocument) -> bool {
    doc.category
        .is_some_and(|c| SETTLEMENT_CATEGORIES.contains(&c))
}
