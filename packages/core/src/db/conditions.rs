//! SQL Fragment Builders
//!
//! Parameterized WHERE and SET fragments derived from a [`TreeSchema`].
//! Every structural query and bulk mutation in the engine is assembled from
//! these builders, so column names appear in exactly one place and all node
//! values travel as bound parameters rather than interpolated text.
//!
//! WHERE fragments always embed the tree predicate (root id plus scope), so
//! a bulk update can never leak across partitions.

use libsql::Value;

use crate::models::{NodeRecord, ScopeFilter, TreeSchema};

/// A piece of SQL with its bound parameters, positional (`?`).
#[derive(Debug, Clone)]
pub struct SqlFragment {
    pub sql: String,
    pub params: Vec<Value>,
}

impl SqlFragment {
    pub fn new(sql: impl Into<String>, params: Vec<Value>) -> Self {
        Self {
            sql: sql.into(),
            params,
        }
    }

    /// Conjunction of two fragments. Parameters keep their relative order.
    pub fn and(self, other: SqlFragment) -> SqlFragment {
        let mut params = self.params;
        params.extend(other.params);
        SqlFragment {
            sql: format!("({}) AND ({})", self.sql, other.sql),
            params,
        }
    }
}

fn scope_value(record: &NodeRecord) -> Value {
    match &record.scope {
        Some(s) => Value::Text(s.clone()),
        None => Value::Null,
    }
}

impl TreeSchema {
    /// Predicate selecting the record's partition.
    ///
    /// Unscoped schemas yield the fixed condition `1 = 1` so callers can
    /// conjoin it unconditionally.
    pub fn scope_condition(&self, record: &NodeRecord) -> SqlFragment {
        match &self.scope {
            ScopeFilter::All => SqlFragment::new("1 = 1", vec![]),
            ScopeFilter::Column(col) => match &record.scope {
                Some(_) => SqlFragment::new(format!("{col} = ?"), vec![scope_value(record)]),
                None => SqlFragment::new(format!("{col} IS NULL"), vec![]),
            },
        }
    }

    /// Predicate selecting every node of the record's tree.
    pub fn tree_condition(&self, record: &NodeRecord) -> SqlFragment {
        let root = SqlFragment::new(
            format!("{} = ?", self.root_col),
            vec![Value::Integer(record.root_id)],
        );
        root.and(self.scope_condition(record))
    }

    /// Predicate selecting the record's full subtree, itself included.
    pub fn subtree_condition(&self, record: &NodeRecord) -> SqlFragment {
        self.tree_condition(record).and(SqlFragment::new(
            format!("{} >= ? AND {} <= ?", self.left_col, self.right_col),
            vec![Value::Integer(record.lft), Value::Integer(record.rgt)],
        ))
    }

    /// Predicate selecting every strict descendant of the record.
    pub fn descendants_condition(&self, record: &NodeRecord) -> SqlFragment {
        self.tree_condition(record).and(SqlFragment::new(
            format!("{} > ? AND {} < ?", self.left_col, self.right_col),
            vec![Value::Integer(record.lft), Value::Integer(record.rgt)],
        ))
    }

    /// Predicate selecting the record's direct children.
    pub fn children_condition(&self, record: &NodeRecord) -> SqlFragment {
        let parent = SqlFragment::new(
            format!("{} = ?", self.parent_col),
            vec![Value::Integer(record.id.unwrap_or(0))],
        );
        parent.and(self.scope_condition(record))
    }

    /// Nodes of the record's tree whose left boundary is at or past
    /// `boundary`. Used to make or close room when a subtree moves.
    pub fn right_part_lft_condition(&self, record: &NodeRecord, boundary: i64) -> SqlFragment {
        self.tree_condition(record).and(SqlFragment::new(
            format!("{} >= ?", self.left_col),
            vec![Value::Integer(boundary)],
        ))
    }

    /// Nodes of the record's tree whose right boundary is at or past
    /// `boundary`.
    pub fn right_part_rgt_condition(&self, record: &NodeRecord, boundary: i64) -> SqlFragment {
        self.tree_condition(record).and(SqlFragment::new(
            format!("{} >= ?", self.right_col),
            vec![Value::Integer(boundary)],
        ))
    }

    /// SET fragment shifting the left boundary by `delta`.
    pub fn shift_left(&self, delta: i64) -> SqlFragment {
        SqlFragment::new(
            format!("{col} = {col} + ?", col = self.left_col),
            vec![Value::Integer(delta)],
        )
    }

    /// SET fragment shifting the right boundary by `delta`.
    pub fn shift_right(&self, delta: i64) -> SqlFragment {
        SqlFragment::new(
            format!("{col} = {col} + ?", col = self.right_col),
            vec![Value::Integer(delta)],
        )
    }

    /// SET fragment shifting both boundaries by `delta`.
    pub fn shift_marks(&self, delta: i64) -> SqlFragment {
        SqlFragment::new(
            format!(
                "{l} = {l} + ?, {r} = {r} + ?",
                l = self.left_col,
                r = self.right_col
            ),
            vec![Value::Integer(delta), Value::Integer(delta)],
        )
    }

    /// SET fragment shifting depth by `delta`.
    pub fn shift_depth(&self, delta: i64) -> SqlFragment {
        SqlFragment::new(
            format!("{col} = {col} + ?", col = self.depth_col),
            vec![Value::Integer(delta)],
        )
    }

    /// SET fragment repointing the owning-root column.
    pub fn assign_root(&self, root_id: i64) -> SqlFragment {
        SqlFragment::new(
            format!("{} = ?", self.root_col),
            vec![Value::Integer(root_id)],
        )
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn node(root_id: i64, lft: i64, rgt: i64) -> NodeRecord {
        NodeRecord {
            id: Some(7),
            root_id,
            parent_id: None,
            lft,
            rgt,
            depth: 0,
            scope: None,
        }
    }

    #[test]
    fn test_tree_condition_unscoped() {
        let schema = TreeSchema::default();
        let frag = schema.tree_condition(&node(3, 1, 6));
        assert_eq!(frag.sql, "(root_id = ?) AND (1 = 1)");
        assert_eq!(frag.params.len(), 1);
    }

    #[test]
    fn test_scope_condition_column() {
        let schema = TreeSchema::scoped_by("forum_id");
        let mut rec = node(3, 1, 6);
        rec.scope = Some("general".to_string());
        let frag = schema.scope_condition(&rec);
        assert_eq!(frag.sql, "forum_id = ?");

        rec.scope = None;
        let frag = schema.scope_condition(&rec);
        assert_eq!(frag.sql, "forum_id IS NULL");
        assert!(frag.params.is_empty());
    }

    #[test]
    fn test_subtree_includes_self_descendants_exclude() {
        let schema = TreeSchema::default();
        let rec = node(3, 2, 5);
        let subtree = schema.subtree_condition(&rec);
        assert!(subtree.sql.contains("lft >= ? AND rgt <= ?"));
        let desc = schema.descendants_condition(&rec);
        assert!(desc.sql.contains("lft > ? AND rgt < ?"));
    }

    #[test]
    fn test_shift_marks_binds_delta_twice() {
        let schema = TreeSchema::default();
        let frag = schema.shift_marks(4);
        assert_eq!(frag.sql, "lft = lft + ?, rgt = rgt + ?");
        assert_eq!(
            frag.params,
            vec![Value::Integer(4), Value::Integer(4)]
        );
    }

    #[test]
    fn test_and_preserves_param_order() {
        let a = SqlFragment::new("x = ?", vec![Value::Integer(1)]);
        let b = SqlFragment::new("y = ?", vec![Value::Integer(2)]);
        let c = a.and(b);
        assert_eq!(c.sql, "(x = ?) AND (y = ?)");
        assert_eq!(c.params, vec![Value::Integer(1), Value::Integer(2)]);
    }
}
