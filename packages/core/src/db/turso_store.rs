//! TursoStore - NodeStore Implementation for the Turso/libsql Backend
//!
//! This module implements the `NodeStore` trait over libsql. It holds one
//! pinned connection for the store's whole lifetime so the transaction
//! statements (`BEGIN IMMEDIATE` / `COMMIT` / `ROLLBACK`) and the row
//! operations issued between them share connection state.
//!
//! # Design Principles
//!
//! 1. **No structural knowledge**: predicates and SET fragments arrive
//!    pre-built; the store only binds them into statements
//! 2. **Row conversion**: `row_to_record` is the central libsql::Row to
//!    [`NodeRecord`] conversion point for all query operations
//! 3. **One transaction at a time**: the engine serializes mutations, so
//!    the single pinned connection is never contended
//!
//! # Examples
//!
//! ```rust,no_run
//! use nestedset_core::db::{DatabaseService, NodeStore, TursoStore};
//! use nestedset_core::models::TreeSchema;
//! use std::path::PathBuf;
//! use std::sync::Arc;
//!
//! #[tokio::main]
//! async fn main() -> anyhow::Result<()> {
//!     let db = Arc::new(
//!         DatabaseService::new(PathBuf::from("./data/test.db"), TreeSchema::default()).await?,
//!     );
//!     let store: Arc<dyn NodeStore> = Arc::new(TursoStore::new(db).await?);
//!
//!     let record = store.get(42).await?;
//!     Ok(())
//! }
//! ```

use crate::db::conditions::SqlFragment;
use crate::db::error::StoreError;
use crate::db::node_store::NodeStore;
use crate::db::DatabaseService;
use crate::models::{NodeRecord, TreeSchema};
use async_trait::async_trait;
use libsql::{params_from_iter, Row, Value};
use std::sync::Arc;

/// NodeStore implementation backed by Turso/libsql
pub struct TursoStore {
    /// Underlying database service (schema initialization, configuration)
    db: Arc<DatabaseService>,

    /// Pinned connection shared by transaction statements and row
    /// operations
    conn: libsql::Connection,
}

impl TursoStore {
    /// Create a new TursoStore over an initialized database
    ///
    /// Pins a single connection with the busy timeout configured.
    pub async fn new(db: Arc<DatabaseService>) -> Result<Self, StoreError> {
        let conn = db.connect_with_timeout().await?;
        Ok(Self { db, conn })
    }

    fn schema(&self) -> &TreeSchema {
        &self.db.schema
    }

    /// Comma-separated column list for SELECT statements.
    ///
    /// The fixed order here is what `row_to_record` decodes by index.
    fn select_columns(&self) -> String {
        let s = self.schema();
        let mut cols = format!(
            "{}, {}, {}, {}, {}, {}",
            s.id_col, s.root_col, s.parent_col, s.left_col, s.right_col, s.depth_col
        );
        if let Some(scope) = s.scope_col() {
            cols.push_str(", ");
            cols.push_str(scope);
        }
        cols
    }

    /// Convert a libsql::Row to a NodeRecord
    ///
    /// Expects the column order produced by `select_columns`.
    fn row_to_record(&self, row: &Row) -> Result<NodeRecord, StoreError> {
        let id: i64 = row
            .get(0)
            .map_err(|e| StoreError::row_decode(format!("id column: {}", e)))?;
        let root_id: i64 = row
            .get(1)
            .map_err(|e| StoreError::row_decode(format!("root column: {}", e)))?;
        let parent_id: Option<i64> = row
            .get(2)
            .map_err(|e| StoreError::row_decode(format!("parent column: {}", e)))?;
        let lft: i64 = row
            .get(3)
            .map_err(|e| StoreError::row_decode(format!("left column: {}", e)))?;
        let rgt: i64 = row
            .get(4)
            .map_err(|e| StoreError::row_decode(format!("right column: {}", e)))?;
        let depth: i64 = row
            .get(5)
            .map_err(|e| StoreError::row_decode(format!("depth column: {}", e)))?;
        let scope: Option<String> = if self.schema().scope_col().is_some() {
            row.get(6)
                .map_err(|e| StoreError::row_decode(format!("scope column: {}", e)))?
        } else {
            None
        };

        Ok(NodeRecord {
            id: Some(id),
            root_id,
            parent_id,
            lft,
            rgt,
            depth,
            scope,
        })
    }

    fn parent_value(record: &NodeRecord) -> Value {
        match record.parent_id {
            Some(p) => Value::Integer(p),
            None => Value::Null,
        }
    }

    fn scope_value(record: &NodeRecord) -> Value {
        match &record.scope {
            Some(s) => Value::Text(s.clone()),
            None => Value::Null,
        }
    }
}

#[async_trait]
impl NodeStore for TursoStore {
    async fn get(&self, id: i64) -> Result<Option<NodeRecord>, StoreError> {
        let s = self.schema();
        let sql = format!(
            "SELECT {} FROM {} WHERE {} = ?",
            self.select_columns(),
            s.table,
            s.id_col
        );
        let mut stmt = self.conn.prepare(&sql).await?;
        let mut rows = stmt.query([id]).await?;
        match rows.next().await? {
            Some(row) => Ok(Some(self.row_to_record(&row)?)),
            None => Ok(None),
        }
    }

    async fn create(&self, record: &NodeRecord) -> Result<i64, StoreError> {
        let s = self.schema();
        let mut columns = format!(
            "{}, {}, {}, {}, {}",
            s.root_col, s.parent_col, s.left_col, s.right_col, s.depth_col
        );
        let mut placeholders = "?, ?, ?, ?, ?".to_string();
        let mut params = vec![
            Value::Integer(record.root_id),
            Self::parent_value(record),
            Value::Integer(record.lft),
            Value::Integer(record.rgt),
            Value::Integer(record.depth),
        ];
        if let Some(scope_col) = s.scope_col() {
            columns.push_str(", ");
            columns.push_str(scope_col);
            placeholders.push_str(", ?");
            params.push(Self::scope_value(record));
        }

        let sql = format!(
            "INSERT INTO {} ({}) VALUES ({})",
            s.table, columns, placeholders
        );
        self.conn
            .execute(&sql, params_from_iter(params))
            .await
            .map_err(|e| StoreError::sql_execution(format!("Failed to insert row: {}", e)))?;

        Ok(self.conn.last_insert_rowid())
    }

    async fn save(&self, record: &NodeRecord) -> Result<(), StoreError> {
        let id = record.id.ok_or(StoreError::MissingId)?;
        let s = self.schema();

        let mut assignments = format!(
            "{} = ?, {} = ?, {} = ?, {} = ?, {} = ?",
            s.root_col, s.parent_col, s.left_col, s.right_col, s.depth_col
        );
        let mut params = vec![
            Value::Integer(record.root_id),
            Self::parent_value(record),
            Value::Integer(record.lft),
            Value::Integer(record.rgt),
            Value::Integer(record.depth),
        ];
        if let Some(scope_col) = s.scope_col() {
            assignments.push_str(&format!(", {} = ?", scope_col));
            params.push(Self::scope_value(record));
        }
        params.push(Value::Integer(id));

        let sql = format!(
            "UPDATE {} SET {} WHERE {} = ?",
            s.table, assignments, s.id_col
        );
        let affected = self
            .conn
            .execute(&sql, params_from_iter(params))
            .await
            .map_err(|e| StoreError::sql_execution(format!("Failed to save row {}: {}", id, e)))?;

        if affected == 0 {
            return Err(StoreError::MissingRow { id });
        }
        Ok(())
    }

    async fn reload(&self, record: &mut NodeRecord) -> Result<(), StoreError> {
        let id = record.id.ok_or(StoreError::MissingId)?;
        match self.get(id).await? {
            Some(fresh) => {
                *record = fresh;
                Ok(())
            }
            None => Err(StoreError::MissingRow { id }),
        }
    }

    async fn bulk_update(
        &self,
        set: SqlFragment,
        predicate: SqlFragment,
    ) -> Result<u64, StoreError> {
        let sql = format!(
            "UPDATE {} SET {} WHERE {}",
            self.schema().table,
            set.sql,
            predicate.sql
        );
        let mut params = set.params;
        params.extend(predicate.params);
        self.conn
            .execute(&sql, params_from_iter(params))
            .await
            .map_err(|e| StoreError::sql_execution(format!("Bulk update failed: {}", e)))
    }

    async fn bulk_delete(&self, predicate: SqlFragment) -> Result<u64, StoreError> {
        let sql = format!(
            "DELETE FROM {} WHERE {}",
            self.schema().table,
            predicate.sql
        );
        self.conn
            .execute(&sql, params_from_iter(predicate.params))
            .await
            .map_err(|e| StoreError::sql_execution(format!("Bulk delete failed: {}", e)))
    }

    async fn query(&self, predicate: SqlFragment) -> Result<Vec<NodeRecord>, StoreError> {
        let s = self.schema();
        let sql = format!(
            "SELECT {} FROM {} WHERE {} ORDER BY {} ASC",
            self.select_columns(),
            s.table,
            predicate.sql,
            s.left_col
        );
        let mut stmt = self.conn.prepare(&sql).await?;
        let mut rows = stmt.query(params_from_iter(predicate.params)).await?;

        let mut records = Vec::new();
        while let Some(row) = rows.next().await? {
            records.push(self.row_to_record(&row)?);
        }
        Ok(records)
    }

    async fn begin(&self) -> Result<(), StoreError> {
        // IMMEDIATE takes the write lock up front so a concurrent writer
        // fails at begin rather than mid-mutation.
        self.conn
            .execute("BEGIN IMMEDIATE", ())
            .await
            .map_err(|e| StoreError::sql_execution(format!("Failed to begin transaction: {}", e)))?;
        Ok(())
    }

    async fn commit(&self) -> Result<(), StoreError> {
        self.conn
            .execute("COMMIT", ())
            .await
            .map_err(|e| StoreError::sql_execution(format!("Failed to commit: {}", e)))?;
        Ok(())
    }

    async fn rollback(&self) -> Result<(), StoreError> {
        self.conn
            .execute("ROLLBACK", ())
            .await
            .map_err(|e| StoreError::sql_execution(format!("Failed to rollback: {}", e)))?;
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    async fn test_store() -> (TempDir, TursoStore) {
        let temp = TempDir::new().unwrap();
        let db = Arc::new(
            DatabaseService::new(temp.path().join("store.db"), TreeSchema::default())
                .await
                .unwrap(),
        );
        let store = TursoStore::new(db).await.unwrap();
        (temp, store)
    }

    #[tokio::test]
    async fn test_create_assigns_id_and_get_round_trips() {
        let (_temp, store) = test_store().await;

        let record = NodeRecord::singleton(None);
        let id = store.create(&record).await.unwrap();
        assert!(id > 0);

        let fetched = store.get(id).await.unwrap().unwrap();
        assert_eq!(fetched.id, Some(id));
        assert_eq!(fetched.lft, 1);
        assert_eq!(fetched.rgt, 2);
        assert_eq!(fetched.depth, 0);
        assert_eq!(fetched.parent_id, None);
    }

    #[tokio::test]
    async fn test_get_missing_returns_none() {
        let (_temp, store) = test_store().await;
        assert!(store.get(999).await.unwrap().is_none());
    }

    #[tokio::test]
    async fn test_save_requires_id() {
        let (_temp, store) = test_store().await;
        let record = NodeRecord::singleton(None);
        let err = store.save(&record).await.unwrap_err();
        assert!(matches!(err, StoreError::MissingId));
    }

    #[tokio::test]
    async fn test_save_and_reload() {
        let (_temp, store) = test_store().await;

        let mut record = NodeRecord::singleton(None);
        let id = store.create(&record).await.unwrap();
        record.id = Some(id);
        record.root_id = id;
        record.rgt = 4;
        store.save(&record).await.unwrap();

        let mut reloaded = NodeRecord::singleton(None);
        reloaded.id = Some(id);
        store.reload(&mut reloaded).await.unwrap();
        assert_eq!(reloaded.root_id, id);
        assert_eq!(reloaded.rgt, 4);
    }

    #[tokio::test]
    async fn test_bulk_update_scoped_by_predicate() {
        let (_temp, store) = test_store().await;
        let schema = TreeSchema::default();

        let mut a = NodeRecord::singleton(None);
        let a_id = store.create(&a).await.unwrap();
        a.id = Some(a_id);
        a.root_id = a_id;
        store.save(&a).await.unwrap();

        let mut b = NodeRecord::singleton(None);
        let b_id = store.create(&b).await.unwrap();
        b.id = Some(b_id);
        b.root_id = b_id;
        store.save(&b).await.unwrap();

        // Shift only tree A; tree B keeps its marks.
        let updated = store
            .bulk_update(schema.shift_marks(10), schema.tree_condition(&a))
            .await
            .unwrap();
        assert_eq!(updated, 1);

        store.reload(&mut a).await.unwrap();
        store.reload(&mut b).await.unwrap();
        assert_eq!((a.lft, a.rgt), (11, 12));
        assert_eq!((b.lft, b.rgt), (1, 2));
    }

    #[tokio::test]
    async fn test_rollback_discards_writes() {
        let (_temp, store) = test_store().await;

        store.begin().await.unwrap();
        let id = store.create(&NodeRecord::singleton(None)).await.unwrap();
        store.rollback().await.unwrap();

        assert!(store.get(id).await.unwrap().is_none());
    }

    #[tokio::test]
    async fn test_query_orders_by_left_boundary() {
        let (_temp, store) = test_store().await;
        let schema = TreeSchema::default();

        // Two rows of one tree inserted out of preorder.
        let root_id = store.create(&NodeRecord::singleton(None)).await.unwrap();
        let mut root = store.get(root_id).await.unwrap().unwrap();
        root.root_id = root_id;
        root.rgt = 6;
        store.save(&root).await.unwrap();

        let late = NodeRecord {
            id: None,
            root_id,
            parent_id: Some(root_id),
            lft: 4,
            rgt: 5,
            depth: 1,
            scope: None,
        };
        store.create(&late).await.unwrap();
        let early = NodeRecord {
            id: None,
            root_id,
            parent_id: Some(root_id),
            lft: 2,
            rgt: 3,
            depth: 1,
            scope: None,
        };
        store.create(&early).await.unwrap();

        let rows = store.query(schema.tree_condition(&root)).await.unwrap();
        let lefts: Vec<i64> = rows.iter().map(|r| r.lft).collect();
        assert_eq!(lefts, vec![1, 2, 4]);
    }

    #[tokio::test]
    async fn test_scoped_store_round_trips_scope() {
        let temp = TempDir::new().unwrap();
        let db = Arc::new(
            DatabaseService::new(temp.path().join("scoped.db"), TreeSchema::scoped_by("forum_id"))
                .await
                .unwrap(),
        );
        let store = TursoStore::new(db).await.unwrap();

        let record = NodeRecord::singleton(Some("general".to_string()));
        let id = store.create(&record).await.unwrap();
        let fetched = store.get(id).await.unwrap().unwrap();
        assert_eq!(fetched.scope.as_deref(), Some("general"));
    }
}
