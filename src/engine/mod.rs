//! Document search engine access: wire types and the HTTP client.

pub mod client;
pub mod types;

pub use client::{ElasticClient, EngineError, PlaceIndex};
pub use types::{Coordinate, PlaceDocument, SearchHit};
