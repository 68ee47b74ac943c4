//! Structural Services
//!
//! This module contains the structural logic of the crate:
//!
//! - `HierarchyEngine` - node lifecycle, tree surgery, preorder queries
//! - `HierarchyError` - the single error type of all structural operations
//!
//! The engine coordinates between the storage layer and the interval
//! arithmetic of the nested set model, enforcing its invariants across
//! every mutation.

pub mod error;
pub mod hierarchy_engine;

pub use error::HierarchyError;
pub use hierarchy_engine::HierarchyEngine;
