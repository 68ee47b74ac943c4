//! In-Memory Tree Layer
//!
//! Materialized tree views over preorder record sequences. See
//! [`Envelope`] for the arena representation and its operations.

mod envelope;

pub use envelope::{Envelope, NodeIndex};
