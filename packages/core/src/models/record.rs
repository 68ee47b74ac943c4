//! Node Record Model
//!
//! The flat row representation of a tree node under the nested set model.
//! Every node carries an integer interval `[lft, rgt]`; ancestry is interval
//! containment and sibling order is interval ordering, so subtree reads never
//! recurse.
//!
//! # Invariants (for every committed row)
//!
//! 1. `lft < rgt`.
//! 2. Within one `(root_id, scope)` partition, intervals are disjoint or
//!    strictly nested, never partially overlapping.
//! 3. A parent's direct children tile the open interval `(lft+1, rgt-1)`
//!    contiguously, ordered by ascending `lft`.
//! 4. `depth(root) = 0`, `depth(child) = depth(parent) + 1`.
//! 5. Exactly one node per partition has no parent and `lft = 1`.
//! 6. A node is a leaf iff `rgt = lft + 1`; subtree size is
//!    `(rgt - lft + 1) / 2`.
//!
//! All boundary, depth and root fields are owned by
//! [`HierarchyEngine`](crate::services::HierarchyEngine); mutating them
//! directly risks violating the invariants above.

use serde::{Deserialize, Serialize};

/// Structural classification of a [`NodeRecord`].
///
/// `Singleton` and `Leaf` are refinements: a singleton is a one-node root,
/// a leaf is a childless child. Operations that require "a root" accept
/// `Root` and `Singleton`; operations that require "a child" accept `Child`
/// and `Leaf`. `Unknown` means the fields match neither shape (mid-mutation
/// or corrupted).
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum NodeKind {
    /// Root of a multi-node tree: no parent, `lft = 1`, `rgt > 2`.
    Root,
    /// Interior child: has a parent, `lft > 1`, children exist.
    Child,
    /// One-node tree: no parent, `lft = 1`, `rgt = 2`.
    Singleton,
    /// Childless child: has a parent, `rgt = lft + 1`.
    Leaf,
    /// Fields consistent with neither root nor child shape.
    Unknown,
}

/// One row of the hierarchy table.
///
/// `id` is `None` until the storage layer assigns a rowid; most engine
/// operations reject unpersisted records. `root_id` equals the node's own id
/// iff the node is a tree root; the transient `0` written during creation
/// never survives a committed engine call.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct NodeRecord {
    /// Storage-assigned identifier, `None` while pending creation.
    pub id: Option<i64>,

    /// Identifier of the root of the tree this node belongs to.
    pub root_id: i64,

    /// Direct parent, `None` for roots.
    pub parent_id: Option<i64>,

    /// Left interval boundary.
    pub lft: i64,

    /// Right interval boundary.
    pub rgt: i64,

    /// Distance from the tree root (root = 0).
    pub depth: i64,

    /// Optional partition discriminator. Rows with differing scopes belong
    /// to independent forests even when their intervals coincide.
    pub scope: Option<String>,
}

impl NodeRecord {
    /// Create a fresh one-node tree, not yet persisted.
    ///
    /// Matches the creation lifecycle: `lft = 1`, `rgt = 2`, `depth = 0`,
    /// no parent. `root_id` stays `0` until the engine persists the record
    /// and can point it at its own assigned id.
    pub fn singleton(scope: Option<String>) -> Self {
        Self {
            id: None,
            root_id: 0,
            parent_id: None,
            lft: 1,
            rgt: 2,
            depth: 0,
            scope,
        }
    }

    /// Whether storage has assigned this record an id.
    pub fn is_persisted(&self) -> bool {
        self.id.is_some()
    }

    /// Whether this record has root shape: no parent, `lft = 1`, and a
    /// well-formed interval.
    pub fn is_root(&self) -> bool {
        self.parent_id.is_none() && self.lft == 1 && self.rgt > self.lft
    }

    /// Whether this record has child shape: a parent, `lft > 1`, and a
    /// well-formed interval.
    pub fn is_child(&self) -> bool {
        self.parent_id.is_some() && self.lft > 1 && self.rgt > self.lft
    }

    /// Whether this record represents a one-node tree.
    pub fn is_singleton(&self) -> bool {
        self.lft == 1 && self.rgt == 2
    }

    /// Whether this record has no children.
    pub fn is_leaf(&self) -> bool {
        self.rgt == self.lft + 1
    }

    /// Whether the fields are consistent with neither root nor child shape.
    pub fn is_unknown(&self) -> bool {
        !self.is_root() && !self.is_child()
    }

    /// Classify this record. See [`NodeKind`] for precedence.
    pub fn classify(&self) -> NodeKind {
        if self.is_unknown() {
            NodeKind::Unknown
        } else if self.is_root() {
            if self.is_singleton() {
                NodeKind::Singleton
            } else {
                NodeKind::Root
            }
        } else if self.is_leaf() {
            NodeKind::Leaf
        } else {
            NodeKind::Child
        }
    }

    /// Number of interval units spanned by this node's subtree,
    /// `rgt - lft + 1`. Always twice the node count for a valid subtree.
    pub fn mark_count(&self) -> i64 {
        self.rgt - self.lft + 1
    }

    /// Number of nodes in this subtree, self included.
    ///
    /// An [`Unknown`](NodeKind::Unknown) record counts as 1: its interval
    /// cannot be trusted.
    pub fn size(&self) -> i64 {
        if self.is_unknown() {
            1
        } else {
            self.mark_count() / 2
        }
    }

    /// Number of descendants, i.e. `size() - 1`.
    pub fn children_count(&self) -> i64 {
        self.size() - 1
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn record(parent: Option<i64>, lft: i64, rgt: i64) -> NodeRecord {
        NodeRecord {
            id: Some(1),
            root_id: 1,
            parent_id: parent,
            lft,
            rgt,
            depth: 0,
            scope: None,
        }
    }

    #[test]
    fn test_singleton_shape() {
        let node = NodeRecord::singleton(None);
        assert!(!node.is_persisted());
        assert!(node.is_root());
        assert!(node.is_singleton());
        assert!(node.is_leaf());
        assert_eq!(node.classify(), NodeKind::Singleton);
        assert_eq!(node.size(), 1);
        assert_eq!(node.children_count(), 0);
    }

    #[test]
    fn test_classify_root_and_child() {
        assert_eq!(record(None, 1, 6).classify(), NodeKind::Root);
        assert_eq!(record(Some(9), 2, 5).classify(), NodeKind::Child);
        assert_eq!(record(Some(9), 2, 3).classify(), NodeKind::Leaf);
    }

    #[test]
    fn test_classify_unknown() {
        // Parent set but lft = 1: neither root nor child shape.
        assert_eq!(record(Some(9), 1, 4).classify(), NodeKind::Unknown);
        // No parent but lft > 1.
        assert_eq!(record(None, 3, 6).classify(), NodeKind::Unknown);
        // Degenerate interval.
        assert_eq!(record(None, 1, 1).classify(), NodeKind::Unknown);
    }

    #[test]
    fn test_serializes_with_stable_field_names() {
        let json = serde_json::to_value(record(Some(9), 2, 5)).unwrap();
        assert_eq!(json["parent_id"], 9);
        assert_eq!(json["lft"], 2);
        assert_eq!(json["rgt"], 5);
        assert!(json["scope"].is_null());
    }

    #[test]
    fn test_size_arithmetic() {
        let node = record(None, 1, 6);
        assert_eq!(node.mark_count(), 6);
        assert_eq!(node.size(), 3);
        assert_eq!(node.children_count(), 2);

        // Unknown records report themselves alone.
        assert_eq!(record(None, 1, 1).size(), 1);
    }
}
