//! NodeStore Trait - Storage Abstraction Layer
//!
//! This module defines the `NodeStore` trait that abstracts row persistence
//! for the hierarchy engine. The trait enables multiple backend
//! implementations without changing the structural logic in
//! `HierarchyEngine`.
//!
//! # Architecture
//!
//! - **Abstraction point**: Between HierarchyEngine (structural logic) and
//!   the database implementation
//! - **Async-first**: All methods are async to support both embedded and
//!   network backends
//! - **Fragment-driven**: Bulk operations take [`SqlFragment`] predicates
//!   built by the engine, so the store never interprets tree structure
//!
//! # Examples
//!
//! ```rust,no_run
//! use nestedset_core::db::{DatabaseService, NodeStore, TursoStore};
//! use nestedset_core::models::{NodeRecord, TreeSchema};
//! use std::sync::Arc;
//!
//! #[tokio::main]
//! async fn main() -> anyhow::Result<()> {
//!     let db = Arc::new(DatabaseService::new_in_memory(TreeSchema::default()).await?);
//!     let store: Arc<dyn NodeStore> = Arc::new(TursoStore::new(db).await?);
//!
//!     let id = store.create(&NodeRecord::singleton(None)).await?;
//!     let record = store.get(id).await?;
//!     assert!(record.is_some());
//!     Ok(())
//! }
//! ```

use crate::db::conditions::SqlFragment;
use crate::db::error::StoreError;
use crate::models::NodeRecord;
use async_trait::async_trait;

/// Abstraction layer for hierarchy row persistence
///
/// The engine drives every structural mutation through this trait: single
/// rows via `get`/`create`/`save`/`reload`, whole regions via
/// `bulk_update`/`bulk_delete` with engine-built predicates, and atomicity
/// via `begin`/`commit`/`rollback`.
///
/// # Thread Safety
///
/// Implementations must be `Send + Sync` to allow usage in async contexts
/// where futures may be moved between threads.
///
/// # Transactions
///
/// A store serves one transaction at a time. `begin` opens it, `commit` or
/// `rollback` closes it; all row operations between the two run inside it.
/// The engine serializes its mutating operations, so nested transactions
/// never occur.
#[async_trait]
pub trait NodeStore: Send + Sync {
    //
    // SINGLE-ROW OPERATIONS
    //

    /// Fetch one record by id, `None` if no such row exists.
    async fn get(&self, id: i64) -> Result<Option<NodeRecord>, StoreError>;

    /// Insert a new row and return the assigned id.
    ///
    /// The record's `id` field is ignored; storage assigns the identifier.
    async fn create(&self, record: &NodeRecord) -> Result<i64, StoreError>;

    /// Persist all fields of an already-created record.
    ///
    /// # Errors
    ///
    /// Returns [`StoreError::MissingId`] if the record was never created.
    async fn save(&self, record: &NodeRecord) -> Result<(), StoreError>;

    /// Refresh the record's fields from storage.
    ///
    /// # Errors
    ///
    /// Returns [`StoreError::MissingId`] for unpersisted records and
    /// [`StoreError::MissingRow`] if the row has disappeared.
    async fn reload(&self, record: &mut NodeRecord) -> Result<(), StoreError>;

    //
    // BULK OPERATIONS
    //

    /// Apply a SET fragment to every row matching the predicate.
    ///
    /// Returns the number of rows updated.
    async fn bulk_update(
        &self,
        set: SqlFragment,
        predicate: SqlFragment,
    ) -> Result<u64, StoreError>;

    /// Delete every row matching the predicate. Returns the number of rows
    /// removed.
    async fn bulk_delete(&self, predicate: SqlFragment) -> Result<u64, StoreError>;

    /// Fetch every row matching the predicate, ordered by ascending left
    /// boundary (preorder).
    async fn query(&self, predicate: SqlFragment) -> Result<Vec<NodeRecord>, StoreError>;

    //
    // TRANSACTION BOUNDARY
    //

    /// Open a write transaction.
    async fn begin(&self) -> Result<(), StoreError>;

    /// Commit the open transaction.
    async fn commit(&self) -> Result<(), StoreError>;

    /// Roll the open transaction back, discarding its writes.
    async fn rollback(&self) -> Result<(), StoreError>;
}
