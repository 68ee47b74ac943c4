//! Storage Layer
//!
//! This module handles all database interactions using libsql/Turso:
//!
//! - Database initialization and connection management
//! - Schema DDL derived from the configured [`TreeSchema`](crate::models::TreeSchema)
//! - The [`NodeStore`] abstraction the engine is written against
//! - Parameterized SQL fragment builders shared by engine and store
//!
//! # Architecture
//!
//! The engine never touches SQL directly: it builds [`SqlFragment`]
//! predicates from the schema and hands them to a [`NodeStore`]. The
//! bundled [`TursoStore`] binds those fragments over one pinned libsql
//! connection so transactions and row operations share state.

pub mod conditions;
mod database;
mod error;
mod node_store;
mod turso_store;

pub use conditions::SqlFragment;
pub use database::DatabaseService;
pub use error::StoreError;
pub use node_store::NodeStore;
pub use turso_store::TursoStore;
