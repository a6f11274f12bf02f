//! Domain layer: pure models, errors, and boundary traits.

pub mod errors;
pub mod models;
pub mod ports;

pub use errors::{DomainError, DomainResult};
