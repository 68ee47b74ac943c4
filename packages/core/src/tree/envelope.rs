//! Envelope - In-Memory Tree View
//!
//! An `Envelope` materializes a preorder sequence of records into a real
//! tree for in-memory inspection and rearrangement: sorting siblings,
//! flattening back to preorder, rendering, structural comparison.
//!
//! # Representation
//!
//! Nodes live in a flat arena (`Vec`) and refer to each other by index.
//! Wrappers are never deallocated individually; an unlinked subtree simply
//! becomes unreachable from the root and drops out of every traversal.
//! [`NodeIndex`] values therefore stay valid for the life of the envelope.
//!
//! An envelope is a view, not a mutation path: rearranging it never writes
//! anything back to storage. `reload` goes the other way and refreshes the
//! wrapped records from a store.

use crate::db::NodeStore;
use crate::models::NodeRecord;
use crate::services::HierarchyError;
use std::fmt;

/// Handle to one node inside an [`Envelope`]'s arena.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct NodeIndex(usize);

#[derive(Debug)]
struct EnvelopeNode {
    record: NodeRecord,
    parent: Option<usize>,
    children: Vec<usize>,
}

/// In-memory tree over a preorder sequence of records.
#[derive(Debug)]
pub struct Envelope {
    arena: Vec<EnvelopeNode>,
    root: usize,
}

impl Envelope {
    /// Assemble a tree from a preorder sequence of records.
    ///
    /// The sequence is consumed as given. The first record becomes the
    /// root; every later record is hung on the nearest open ancestor whose
    /// id equals its declared `parent_id`, closing ancestors that cannot be
    /// its parent along the way. Parent links decide placement, the
    /// boundary values are carried along untouched.
    ///
    /// # Errors
    ///
    /// - [`HierarchyError::EmptyEnvelope`] for an empty sequence
    /// - [`HierarchyError::BrokenPreorder`] when no open ancestor matches a
    ///   record's declared parent (a child ahead of its parent, a second
    ///   root, or rows from two trees)
    pub fn build(records: Vec<NodeRecord>) -> Result<Self, HierarchyError> {
        let mut iter = records.into_iter();
        let root_record = iter.next().ok_or(HierarchyError::EmptyEnvelope)?;

        let mut arena = vec![EnvelopeNode {
            record: root_record,
            parent: None,
            children: Vec::new(),
        }];
        // Stack of open ancestors, innermost on top.
        let mut stack = vec![0usize];

        for record in iter {
            let id = record.id.unwrap_or(0);
            let parent = loop {
                let &top = stack.last().ok_or(HierarchyError::BrokenPreorder { id })?;
                if record.parent_id.is_some() && arena[top].record.id == record.parent_id {
                    break top;
                }
                stack.pop();
            };

            let idx = arena.len();
            arena.push(EnvelopeNode {
                record,
                parent: Some(parent),
                children: Vec::new(),
            });
            arena[parent].children.push(idx);
            stack.push(idx);
        }

        Ok(Self { arena, root: 0 })
    }

    /// The root of the envelope.
    pub fn root(&self) -> NodeIndex {
        NodeIndex(self.root)
    }

    /// The record wrapped at `idx`.
    pub fn record(&self, idx: NodeIndex) -> &NodeRecord {
        &self.arena[idx.0].record
    }

    /// The parent of `idx`, `None` for the root and for unlinked nodes.
    pub fn parent(&self, idx: NodeIndex) -> Option<NodeIndex> {
        self.arena[idx.0].parent.map(NodeIndex)
    }

    /// The children of `idx` in their current order.
    pub fn children(&self, idx: NodeIndex) -> Vec<NodeIndex> {
        self.arena[idx.0].children.iter().copied().map(NodeIndex).collect()
    }

    /// Number of nodes reachable from the root.
    pub fn node_count(&self) -> usize {
        self.preorder_indices().len()
    }

    /// Find the reachable node wrapping the record with `id`.
    ///
    /// Unlinked subtrees are not searched.
    pub fn find(&self, id: i64) -> Option<NodeIndex> {
        self.preorder_indices()
            .into_iter()
            .find(|&i| self.arena[i].record.id == Some(id))
            .map(NodeIndex)
    }

    /// Like [`find`](Self::find) but failing with
    /// [`HierarchyError::NotFound`].
    pub fn require(&self, id: i64) -> Result<NodeIndex, HierarchyError> {
        self.find(id).ok_or(HierarchyError::NotFound { id })
    }

    /// Sort every node's children with the given comparator over their
    /// records.
    pub fn sort_children<F>(&mut self, mut cmp: F)
    where
        F: FnMut(&NodeRecord, &NodeRecord) -> std::cmp::Ordering,
    {
        for i in 0..self.arena.len() {
            let mut order = std::mem::take(&mut self.arena[i].children);
            order.sort_by(|&a, &b| cmp(&self.arena[a].record, &self.arena[b].record));
            self.arena[i].children = order;
        }
    }

    /// Reverse the child order at every node.
    pub fn reverse(&mut self) {
        for node in &mut self.arena {
            node.children.reverse();
        }
    }

    /// Flatten the reachable tree back to a preorder record sequence.
    pub fn to_flat_list(&self) -> Vec<NodeRecord> {
        self.preorder_indices()
            .into_iter()
            .map(|i| self.arena[i].record.clone())
            .collect()
    }

    /// Wrap a record as a detached node and return its handle.
    ///
    /// The node is unreachable until linked with
    /// [`add_child`](Self::add_child).
    pub fn wrap(&mut self, record: NodeRecord) -> NodeIndex {
        let idx = self.arena.len();
        self.arena.push(EnvelopeNode {
            record,
            parent: None,
            children: Vec::new(),
        });
        NodeIndex(idx)
    }

    /// Link `child` as the last child of `parent`.
    ///
    /// # Errors
    ///
    /// - [`HierarchyError::AlreadyParented`] if `child` is linked somewhere
    /// - [`HierarchyError::InvariantViolated`] when `child` is the root
    pub fn add_child(&mut self, parent: NodeIndex, child: NodeIndex) -> Result<(), HierarchyError> {
        if child.0 == self.root {
            return Err(HierarchyError::invariant(
                "the envelope root cannot become a child",
            ));
        }
        if self.arena[child.0].parent.is_some() {
            return Err(HierarchyError::AlreadyParented {
                id: self.arena[child.0].record.id.unwrap_or(0),
            });
        }
        self.arena[child.0].parent = Some(parent.0);
        self.arena[parent.0].children.push(child.0);
        Ok(())
    }

    /// Unlink `idx` from its parent, making its subtree unreachable.
    ///
    /// The wrapper stays valid and can be relinked later.
    ///
    /// # Errors
    ///
    /// Returns [`HierarchyError::UnlinkRoot`] for the root.
    pub fn unlink(&mut self, idx: NodeIndex) -> Result<(), HierarchyError> {
        if idx.0 == self.root {
            return Err(HierarchyError::UnlinkRoot);
        }
        if let Some(parent) = self.arena[idx.0].parent.take() {
            self.arena[parent].children.retain(|&c| c != idx.0);
        }
        Ok(())
    }

    /// Refresh every reachable record from the store.
    ///
    /// Structure is kept; only the wrapped field values change.
    pub async fn reload(&mut self, store: &dyn NodeStore) -> Result<(), HierarchyError> {
        for i in self.preorder_indices() {
            store.reload(&mut self.arena[i].record).await?;
        }
        Ok(())
    }

    /// Whether two envelopes have the same shape.
    ///
    /// Compares child counts recursively, position by position; record
    /// content (ids, boundaries) is ignored. Two trees built from disjoint
    /// record sets compare equal as long as their branching matches.
    pub fn structurally_equal(&self, other: &Envelope) -> bool {
        fn eq(a: &Envelope, ai: usize, b: &Envelope, bi: usize) -> bool {
            let ac = &a.arena[ai].children;
            let bc = &b.arena[bi].children;
            ac.len() == bc.len()
                && ac.iter().zip(bc.iter()).all(|(&x, &y)| eq(a, x, b, y))
        }
        eq(self, self.root, other, other.root)
    }

    /// Verify the wrapped boundary values against the linked shape.
    ///
    /// For every reachable node: the interval is well formed, each child
    /// nests strictly inside its parent, siblings tile the parent's open
    /// interval contiguously, and depths increase by one per level.
    pub fn check_marks(&self) -> Result<(), HierarchyError> {
        for i in self.preorder_indices() {
            let node = &self.arena[i];
            let r = &node.record;
            if r.lft >= r.rgt {
                return Err(HierarchyError::invariant(format!(
                    "node {:?} has interval [{}, {}]",
                    r.id, r.lft, r.rgt
                )));
            }
            let mut cursor = r.lft + 1;
            for &c in &node.children {
                let child = &self.arena[c].record;
                if child.lft != cursor {
                    return Err(HierarchyError::invariant(format!(
                        "node {:?} expected child at {} but found [{}, {}]",
                        r.id, cursor, child.lft, child.rgt
                    )));
                }
                if child.depth != r.depth + 1 {
                    return Err(HierarchyError::invariant(format!(
                        "node {:?} at depth {} has child at depth {}",
                        r.id, r.depth, child.depth
                    )));
                }
                cursor = child.rgt + 1;
            }
            if cursor != r.rgt {
                return Err(HierarchyError::invariant(format!(
                    "node {:?} children end at {} but interval closes at {}",
                    r.id, cursor, r.rgt
                )));
            }
        }
        Ok(())
    }

    /// Reachable arena indices in preorder.
    fn preorder_indices(&self) -> Vec<usize> {
        let mut out = Vec::new();
        let mut stack = vec![self.root];
        while let Some(i) = stack.pop() {
            out.push(i);
            // Reversed push so children come off the stack left to right.
            for &c in self.arena[i].children.iter().rev() {
                stack.push(c);
            }
        }
        out
    }
}

impl fmt::Display for Envelope {
    /// Indented one-node-per-line rendering, preorder.
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        fn render(
            env: &Envelope,
            idx: usize,
            level: usize,
            f: &mut fmt::Formatter<'_>,
        ) -> fmt::Result {
            let r = &env.arena[idx].record;
            match r.id {
                Some(id) => writeln!(f, "{}{} [{}, {}]", "  ".repeat(level), id, r.lft, r.rgt)?,
                None => writeln!(f, "{}* [{}, {}]", "  ".repeat(level), r.lft, r.rgt)?,
            }
            for &c in &env.arena[idx].children {
                render(env, c, level + 1, f)?;
            }
            Ok(())
        }
        render(self, self.root, 0, f)
    }
}
