//! Hierarchy Engine - Core Structural Operations
//!
//! This module provides the main structural logic layer for the nested set
//! hierarchy:
//!
//! - Node lifecycle (create as singleton, optionally attach on creation)
//! - Tree surgery (attach, detach, prune) as bulk interval arithmetic
//! - Preorder queries (subtree, descendants, children, parent, root)
//!
//! # Mutation Protocol
//!
//! Every mutating operation:
//!
//! 1. takes the engine-wide write lock, so mutations are serialized,
//! 2. opens a storage transaction (`BEGIN IMMEDIATE`),
//! 3. re-reads every involved record from storage before any boundary
//!    arithmetic, so stale caller copies can never skew the offsets,
//! 4. commits on success or rolls back on the first error.
//!
//! Reads take neither the lock nor a transaction; a single `SELECT`
//! observes a consistent snapshot under WAL.
//!
//! # Interval Arithmetic
//!
//! All surgery is expressed as bulk shifts over interval regions. Attaching
//! a tree of width `w` under a parent first widens the parent's tree by `w`
//! at the parent's right boundary, then translates the incoming tree into
//! the opened gap. Detaching reverses this. No mutation ever walks the
//! tree node by node.

use crate::db::NodeStore;
use crate::models::{NodeKind, NodeRecord, TreeSchema};
use crate::services::error::HierarchyError;
use crate::tree::Envelope;
use std::sync::Arc;
use tokio::sync::Mutex;

/// Structural operations over one hierarchy table
///
/// Holds the storage handle, the column configuration every predicate is
/// derived from, and the write lock that serializes mutations.
pub struct HierarchyEngine {
    store: Arc<dyn NodeStore>,
    schema: TreeSchema,
    write_lock: Mutex<()>,
}

impl HierarchyEngine {
    /// Create an engine over the given store and column configuration.
    ///
    /// The schema must match the one the store's table was created from.
    pub fn new(store: Arc<dyn NodeStore>, schema: TreeSchema) -> Self {
        Self {
            store,
            schema,
            write_lock: Mutex::new(()),
        }
    }

    /// The column configuration this engine derives its predicates from.
    pub fn schema(&self) -> &TreeSchema {
        &self.schema
    }

    //
    // NODE LIFECYCLE
    //

    /// Create a new node, optionally attached under `parent`.
    ///
    /// The node is inserted as a singleton tree and pointed at itself as
    /// root in the same transaction, so the transient unrooted row is never
    /// visible outside it. When `parent` is given the new singleton is
    /// attached under it before the transaction commits.
    ///
    /// Returns the freshly persisted record.
    ///
    /// # Errors
    ///
    /// Returns [`HierarchyError::NotPersisted`] if `parent` is given but has
    /// no id, plus any attach precondition failure.
    pub async fn create_node(
        &self,
        parent: Option<&NodeRecord>,
        scope: Option<String>,
    ) -> Result<NodeRecord, HierarchyError> {
        let parent_id = match parent {
            Some(p) => Some(p.id.ok_or(HierarchyError::NotPersisted)?),
            None => None,
        };

        let _guard = self.write_lock.lock().await;
        self.store.begin().await?;

        let result = self.create_node_inner(parent_id, scope).await;
        self.finish(result).await
    }

    async fn create_node_inner(
        &self,
        parent_id: Option<i64>,
        scope: Option<String>,
    ) -> Result<NodeRecord, HierarchyError> {
        let mut record = NodeRecord::singleton(scope);
        let id = self.store.create(&record).await?;
        record.id = Some(id);
        record.root_id = id;
        self.store.save(&record).await?;
        tracing::debug!("Created singleton node {}", id);

        match parent_id {
            Some(parent_id) => self.attach_inner(parent_id, id).await,
            None => Ok(record),
        }
    }

    //
    // TREE SURGERY
    //

    /// Attach the tree rooted at `child` as the last child of `parent`.
    ///
    /// `child` must be the root of its own tree; the whole incoming tree is
    /// repositioned, re-deepened and re-rooted in one transaction. Both
    /// records are re-read from storage inside the transaction, so the
    /// caller's copies may be stale.
    ///
    /// Returns the updated child record.
    ///
    /// # Errors
    ///
    /// - [`HierarchyError::NotPersisted`] if either record has no id
    /// - [`HierarchyError::NotFound`] if either row no longer exists
    /// - [`HierarchyError::UnknownParent`] / [`HierarchyError::UnknownChild`]
    ///   for malformed shapes
    /// - [`HierarchyError::NotARoot`] if `child` is not a tree root
    /// - [`HierarchyError::SameTree`] if both records share a tree
    pub async fn attach(
        &self,
        parent: &NodeRecord,
        child: &NodeRecord,
    ) -> Result<NodeRecord, HierarchyError> {
        let parent_id = parent.id.ok_or(HierarchyError::NotPersisted)?;
        let child_id = child.id.ok_or(HierarchyError::NotPersisted)?;

        let _guard = self.write_lock.lock().await;
        self.store.begin().await?;

        let result = self.attach_inner(parent_id, child_id).await;
        self.finish(result).await
    }

    async fn attach_inner(
        &self,
        parent_id: i64,
        child_id: i64,
    ) -> Result<NodeRecord, HierarchyError> {
        // Fresh in-transaction reads; all arithmetic below uses these.
        let parent = self.require_fresh(parent_id).await?;
        let mut child = self.require_fresh(child_id).await?;

        if parent.is_unknown() {
            return Err(HierarchyError::UnknownParent { id: parent_id });
        }
        match child.classify() {
            NodeKind::Unknown => return Err(HierarchyError::UnknownChild { id: child_id }),
            NodeKind::Child | NodeKind::Leaf => {
                return Err(HierarchyError::NotARoot { id: child_id })
            }
            NodeKind::Root | NodeKind::Singleton => {}
        }
        if parent.root_id == child.root_id {
            return Err(HierarchyError::SameTree {
                parent_id,
                child_id,
            });
        }
        // Trees never span partitions.
        if parent.scope != child.scope {
            return Err(HierarchyError::invariant(format!(
                "nodes {} and {} belong to different partitions",
                parent_id, child_id
            )));
        }

        let width = child.mark_count();
        let boundary = parent.rgt;
        tracing::debug!(
            "Attaching tree {} (width {}) under node {} at boundary {}",
            child_id,
            width,
            parent_id,
            boundary
        );

        // Make room: widen the parent's tree by the incoming width at the
        // parent's right boundary. The parent's own rgt moves too.
        self.store
            .bulk_update(
                self.schema.shift_left(width),
                self.schema.right_part_lft_condition(&parent, boundary),
            )
            .await?;
        self.store
            .bulk_update(
                self.schema.shift_right(width),
                self.schema.right_part_rgt_condition(&parent, boundary),
            )
            .await?;

        // Deepen the incoming tree under its new ancestor.
        self.store
            .bulk_update(
                self.schema.shift_depth(parent.depth + 1),
                self.schema.tree_condition(&child),
            )
            .await?;

        // Translate the incoming tree into the opened gap. The child's lft
        // is 1, so the offset lands it exactly at the old boundary.
        self.store
            .bulk_update(
                self.schema.shift_marks(boundary - 1),
                self.schema.tree_condition(&child),
            )
            .await?;

        // The re-rooting predicate needs the translated boundaries together
        // with the not-yet-changed root id, so refresh first.
        self.store.reload(&mut child).await?;
        self.store
            .bulk_update(
                self.schema.assign_root(parent.root_id),
                self.schema.subtree_condition(&child),
            )
            .await?;

        self.store.reload(&mut child).await?;
        if child.root_id != parent.root_id {
            return Err(HierarchyError::invariant(format!(
                "node {} still roots at {} after attach under {}",
                child_id, child.root_id, parent_id
            )));
        }

        child.parent_id = Some(parent_id);
        self.store.save(&child).await?;
        Ok(child)
    }

    /// Detach the subtree rooted at `node` into a tree of its own.
    ///
    /// The subtree keeps its internal structure; its boundaries are
    /// renumbered to start at 1 and its depths rebased to 0. The gap left
    /// in the residual tree is closed. Detaching a node that already is a
    /// tree root leaves the forest unchanged.
    ///
    /// Returns the updated record, now a root.
    pub async fn detach(&self, node: &NodeRecord) -> Result<NodeRecord, HierarchyError> {
        let id = node.id.ok_or(HierarchyError::NotPersisted)?;

        let _guard = self.write_lock.lock().await;
        self.store.begin().await?;

        let result = self.detach_inner(id).await;
        self.finish(result).await
    }

    async fn detach_inner(&self, id: i64) -> Result<NodeRecord, HierarchyError> {
        // Persistence is the only precondition; any shape is accepted.
        let mut node = self.require_fresh(id).await?;

        // Snapshot of the position inside the old tree; every predicate
        // below is built from this.
        let old = node.clone();
        let width = old.mark_count();
        let was_root = old.root_id == id;
        tracing::debug!(
            "Detaching tree {} (width {}) from tree {}",
            id,
            width,
            old.root_id
        );

        // Claim the subtree as a tree of its own. After this the subtree's
        // rows no longer match the old tree's predicates.
        self.store
            .bulk_update(
                self.schema.assign_root(id),
                self.schema.subtree_condition(&old),
            )
            .await?;

        // Close the gap in the residual tree. When the node already was the
        // root there is no residual tree and nothing to close.
        if !was_root {
            self.store
                .bulk_update(
                    self.schema.shift_left(-width),
                    self.schema.right_part_lft_condition(&old, old.rgt),
                )
                .await?;
            self.store
                .bulk_update(
                    self.schema.shift_right(-width),
                    self.schema.right_part_rgt_condition(&old, old.rgt),
                )
                .await?;
        }

        self.store.reload(&mut node).await?;
        if node.root_id != id {
            return Err(HierarchyError::invariant(format!(
                "node {} still roots at {} after detach",
                id, node.root_id
            )));
        }

        node.parent_id = None;
        self.store.save(&node).await?;

        // Rebase the new tree to depth 0 and left boundary 1.
        if old.depth != 0 {
            self.store
                .bulk_update(
                    self.schema.shift_depth(-old.depth),
                    self.schema.tree_condition(&node),
                )
                .await?;
        }
        if old.lft != 1 {
            self.store
                .bulk_update(
                    self.schema.shift_marks(-(old.lft - 1)),
                    self.schema.tree_condition(&node),
                )
                .await?;
        }

        self.store.reload(&mut node).await?;
        Ok(node)
    }

    /// Delete the subtree rooted at `node` and close the gap it leaves.
    ///
    /// Returns the number of rows removed.
    pub async fn prune(&self, node: &NodeRecord) -> Result<u64, HierarchyError> {
        let id = node.id.ok_or(HierarchyError::NotPersisted)?;

        let _guard = self.write_lock.lock().await;
        self.store.begin().await?;

        let result = self.prune_inner(id).await;
        self.finish(result).await
    }

    async fn prune_inner(&self, id: i64) -> Result<u64, HierarchyError> {
        let node = self.require_fresh(id).await?;

        let width = node.mark_count();
        let was_root = node.root_id == id;

        let removed = self
            .store
            .bulk_delete(self.schema.subtree_condition(&node))
            .await?;
        tracing::debug!("Pruned {} node(s) under node {}", removed, id);

        // A pruned root takes its whole tree with it; otherwise shrink the
        // residual tree around the hole.
        if !was_root {
            self.store
                .bulk_update(
                    self.schema.shift_left(-width),
                    self.schema.right_part_lft_condition(&node, node.rgt),
                )
                .await?;
            self.store
                .bulk_update(
                    self.schema.shift_right(-width),
                    self.schema.right_part_rgt_condition(&node, node.rgt),
                )
                .await?;
        }

        Ok(removed)
    }

    //
    // PREORDER QUERIES
    //

    /// The full subtree of `node` in preorder, `node` included.
    pub async fn subtree_of(&self, node: &NodeRecord) -> Result<Vec<NodeRecord>, HierarchyError> {
        let fresh = self.require_current(node).await?;
        let rows = self
            .store
            .query(self.schema.subtree_condition(&fresh))
            .await?;
        Ok(rows)
    }

    /// Every strict descendant of `node` in preorder.
    pub async fn descendants_of(
        &self,
        node: &NodeRecord,
    ) -> Result<Vec<NodeRecord>, HierarchyError> {
        let fresh = self.require_current(node).await?;
        let rows = self
            .store
            .query(self.schema.descendants_condition(&fresh))
            .await?;
        Ok(rows)
    }

    /// The direct children of `node`, ordered left to right.
    pub async fn children_of(&self, node: &NodeRecord) -> Result<Vec<NodeRecord>, HierarchyError> {
        let fresh = self.require_current(node).await?;
        let rows = self
            .store
            .query(self.schema.children_condition(&fresh))
            .await?;
        Ok(rows)
    }

    /// The direct parent of `node`, `None` for roots.
    pub async fn parent_of(
        &self,
        node: &NodeRecord,
    ) -> Result<Option<NodeRecord>, HierarchyError> {
        let fresh = self.require_current(node).await?;
        match fresh.parent_id {
            Some(parent_id) => {
                let parent = self
                    .store
                    .get(parent_id)
                    .await?
                    .ok_or(HierarchyError::NotFound { id: parent_id })?;
                Ok(Some(parent))
            }
            None => Ok(None),
        }
    }

    /// The root of the tree `node` belongs to.
    pub async fn root_of(&self, node: &NodeRecord) -> Result<NodeRecord, HierarchyError> {
        let fresh = self.require_current(node).await?;
        self.store
            .get(fresh.root_id)
            .await?
            .ok_or(HierarchyError::NotFound { id: fresh.root_id })
    }

    /// Build an in-memory [`Envelope`] of the subtree rooted at `node`.
    pub async fn envelope_of(&self, node: &NodeRecord) -> Result<Envelope, HierarchyError> {
        let rows = self.subtree_of(node).await?;
        Envelope::build(rows)
    }

    /// Render the subtree rooted at `node` as indented text, one node per
    /// line. Intended for diagnostics and tests.
    pub async fn to_ascii(&self, node: &NodeRecord) -> Result<String, HierarchyError> {
        let envelope = self.envelope_of(node).await?;
        Ok(envelope.to_string())
    }

    //
    // INTERNAL HELPERS
    //

    /// Commit on success, roll back on failure. A rollback failure is
    /// logged but the original error is what the caller sees.
    async fn finish<T>(
        &self,
        result: Result<T, HierarchyError>,
    ) -> Result<T, HierarchyError> {
        match result {
            Ok(value) => {
                self.store.commit().await?;
                Ok(value)
            }
            Err(e) => {
                if let Err(rb) = self.store.rollback().await {
                    tracing::warn!("Rollback failed after {}: {}", e, rb);
                }
                Err(e)
            }
        }
    }

    /// Re-read a record by id, mapping a vanished row to `NotFound`.
    async fn require_fresh(&self, id: i64) -> Result<NodeRecord, HierarchyError> {
        self.store
            .get(id)
            .await?
            .ok_or(HierarchyError::NotFound { id })
    }

    /// Fresh copy of a caller-held record for read paths.
    async fn require_current(&self, node: &NodeRecord) -> Result<NodeRecord, HierarchyError> {
        let id = node.id.ok_or(HierarchyError::NotPersisted)?;
        self.require_fresh(id).await
    }
}

impl std::fmt::Debug for HierarchyEngine {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("HierarchyEngine")
            .field("schema", &self.schema)
            .finish_non_exhaustive()
    }
}

// Comprehensive tests in separate module
#[cfg(test)]
#[path = "hierarchy_engine_test.rs"]
mod hierarchy_engine_test;
