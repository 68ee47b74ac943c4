//! Data models for the hierarchy engine.
//!
//! [`NodeRecord`] is the flat row every operation works over and
//! [`TreeSchema`] is the column-name configuration both the storage layer
//! and the engine derive their SQL from.

pub mod record;
pub mod schema;

pub use record::{NodeKind, NodeRecord};
pub use schema::{ScopeFilter, TreeSchema};
