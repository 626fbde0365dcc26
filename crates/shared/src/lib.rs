//! Shared types for the pet admin data-access layer.
//!
//! Everything in here is pure: canonical records, the error envelope and the
//! normalizer that turns raw backend JSON into canonical records.

pub mod error;
pub mod models;
pub mod normalize;

pub use error::*;
pub use models::*;
pub use normalize::{normalize, normalize_listing};
