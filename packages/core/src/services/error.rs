//! Service Layer Error Types
//!
//! This module defines the single error type for all structural operations,
//! with detailed context and proper error chaining.

use crate::db::StoreError;
use thiserror::Error;

/// Hierarchy operation errors
///
/// Every fallible operation of the engine and the envelope returns this
/// type. Storage failures pass through via [`HierarchyError::Store`];
/// everything else describes a structural precondition or invariant that
/// did not hold.
#[derive(Error, Debug)]
pub enum HierarchyError {
    /// Operation requires a persisted record
    #[error("Record has not been persisted yet")]
    NotPersisted,

    /// Referenced node does not exist in storage
    #[error("Node not found: {id}")]
    NotFound { id: i64 },

    /// Prospective parent has neither root nor child shape
    #[error("Node {id} cannot act as a parent: fields match no known shape")]
    UnknownParent { id: i64 },

    /// Prospective child has neither root nor child shape
    #[error("Node {id} cannot be attached: fields match no known shape")]
    UnknownChild { id: i64 },

    /// Attach requires the child to be the root of its own tree
    #[error("Node {id} is not a tree root")]
    NotARoot { id: i64 },

    /// Attach within one tree would corrupt the interval arithmetic
    #[error("Node {child_id} already belongs to the tree of node {parent_id}")]
    SameTree { parent_id: i64, child_id: i64 },

    /// A structural invariant did not hold after a mutation step
    #[error("Hierarchy invariant violated: {context}")]
    InvariantViolated { context: String },

    /// Preorder sequence cannot be assembled into a tree
    #[error("Record {id} does not continue a valid preorder sequence")]
    BrokenPreorder { id: i64 },

    /// Envelope construction requires at least one record
    #[error("Cannot build an envelope from an empty sequence")]
    EmptyEnvelope,

    /// The envelope root cannot be unlinked from itself
    #[error("Cannot unlink the envelope root")]
    UnlinkRoot,

    /// Node already has a parent inside the envelope
    #[error("Node {id} already has a parent")]
    AlreadyParented { id: i64 },

    /// Storage operation failed
    #[error("Storage operation failed: {0}")]
    Store(#[from] StoreError),
}

impl HierarchyError {
    /// Create an invariant violation error with context
    pub fn invariant(context: impl Into<String>) -> Self {
        Self::InvariantViolated {
            context: context.into(),
        }
    }
}
