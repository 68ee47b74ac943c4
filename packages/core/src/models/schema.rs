//! Tree Schema Configuration
//!
//! An immutable description of how one node type maps onto its table: the
//! table name, the column carrying each of the six logical fields, and how
//! rows are partitioned into independent forests. One `TreeSchema` value is
//! supplied at construction to both the storage layer (which derives DDL
//! from it) and the engine (which derives every predicate from it); nothing
//! is generated at runtime.

use serde::{Deserialize, Serialize};

/// How the table is partitioned into independent forests.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub enum ScopeFilter {
    /// No partitioning: every predicate uses the fixed condition `1 = 1`.
    All,
    /// Partition by equality against the named column. A record without a
    /// scope value matches rows where the column `IS NULL`.
    Column(String),
}

/// Column-name and scope configuration for one hierarchy table.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct TreeSchema {
    /// Table holding the nodes.
    pub table: String,
    /// Primary identifier column.
    pub id_col: String,
    /// Column carrying the owning tree's root identifier.
    pub root_col: String,
    /// Column carrying the direct parent identifier.
    pub parent_col: String,
    /// Left boundary column.
    pub left_col: String,
    /// Right boundary column.
    pub right_col: String,
    /// Depth column.
    pub depth_col: String,
    /// Forest partitioning.
    pub scope: ScopeFilter,
}

impl Default for TreeSchema {
    fn default() -> Self {
        Self {
            table: "nodes".to_string(),
            id_col: "id".to_string(),
            root_col: "root_id".to_string(),
            parent_col: "parent_id".to_string(),
            left_col: "lft".to_string(),
            right_col: "rgt".to_string(),
            depth_col: "depth".to_string(),
            scope: ScopeFilter::All,
        }
    }
}

impl TreeSchema {
    /// Default column names with equality partitioning on `column`.
    pub fn scoped_by(column: impl Into<String>) -> Self {
        Self {
            scope: ScopeFilter::Column(column.into()),
            ..Self::default()
        }
    }

    /// The scope column name, if the schema partitions by column.
    pub fn scope_col(&self) -> Option<&str> {
        match &self.scope {
            ScopeFilter::All => None,
            ScopeFilter::Column(col) => Some(col.as_str()),
        }
    }
}
