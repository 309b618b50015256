//! Request handling: parameter normalization, language rules and the two-pass search flow.

mod lang;
pub(crate) mod params;
pub(crate) mod service;

pub use lang::Language;
pub use params::{SearchParams, ValidationError};
pub use service::{SearchService, ServiceError};
