//! Nested Set Hierarchy Engine
//!
//! This crate manages trees of records stored flat in a single table under
//! the nested set model: every node carries an integer interval and the
//! intervals alone encode ancestry, sibling order and subtree size.
//!
//! # Architecture
//!
//! - **Interval encoding**: subtree reads are single range queries, no
//!   recursion and no link chasing
//! - **Bulk surgery**: attach, detach and prune are a handful of bulk
//!   interval shifts inside one transaction
//! - **libsql/Turso**: embedded SQLite-compatible storage behind the
//!   [`db::NodeStore`] abstraction
//! - **Configured schema**: table and column names come from a
//!   [`models::TreeSchema`] value, one per engine
//!
//! # Modules
//!
//! - [`models`] - Data structures (NodeRecord, TreeSchema)
//! - [`services`] - The hierarchy engine and its error type
//! - [`db`] - Storage layer with libsql integration
//! - [`tree`] - In-memory tree views (Envelope)

pub mod db;
pub mod models;
pub mod services;
pub mod tree;

// Re-export commonly used types
pub use db::{DatabaseService, NodeStore, StoreError, TursoStore};
pub use models::{NodeKind, NodeRecord, ScopeFilter, TreeSchema};
pub use services::{HierarchyEngine, HierarchyError};
pub use tree::{Envelope, NodeIndex};
