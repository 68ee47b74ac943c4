//! Database Connection Management
//!
//! This module provides the core database connection and initialization
//! functionality using libsql/Turso for the hierarchy table.
//!
//! # Architecture
//!
//! - **Path-agnostic**: Accepts any valid PathBuf
//! - **Schema from configuration**: DDL is derived from the [`TreeSchema`]
//!   supplied at construction, so column names live in one place
//! - **WAL mode**: Write-Ahead Logging for better concurrency
//!
//! # Database Connection Patterns
//!
//! **Always use `connect_with_timeout()` in async functions** to avoid SQLite
//! thread-safety violations when the Tokio runtime moves futures between
//! threads. The 5-second busy timeout allows concurrent operations to wait
//! and retry instead of failing immediately with `SQLITE_BUSY` errors.

use crate::db::error::StoreError;
use crate::models::TreeSchema;
use libsql::{Builder, Database};
use std::path::PathBuf;
use std::sync::Arc;

/// Database service for managing the libsql connection and schema
///
/// # Examples
///
/// ```no_run
/// use nestedset_core::db::DatabaseService;
/// use nestedset_core::models::TreeSchema;
/// use std::path::PathBuf;
///
/// #[tokio::main]
/// async fn main() -> Result<(), Box<dyn std::error::Error>> {
///     let db_path = PathBuf::from("/path/to/hierarchy.db");
///     let db_service = DatabaseService::new(db_path, TreeSchema::default()).await?;
///     Ok(())
/// }
/// ```
#[derive(Debug, Clone)]
pub struct DatabaseService {
    /// libsql database connection (wrapped in Arc for sharing)
    pub db: Arc<Database>,

    /// Path to the database file
    pub db_path: PathBuf,

    /// Column configuration the table was created from
    pub schema: TreeSchema,
}

impl DatabaseService {
    /// Create a new DatabaseService with the specified database path
    ///
    /// This will:
    /// 1. Ensure the parent directory exists (create if needed)
    /// 2. Open/create the database file
    /// 3. Initialize the schema (CREATE TABLE IF NOT EXISTS)
    /// 4. Enable SQLite features (WAL mode, busy timeout, foreign keys)
    ///
    /// # Errors
    ///
    /// Returns `StoreError` if:
    /// - Parent directory cannot be created
    /// - Database connection fails
    /// - Schema initialization fails
    pub async fn new(db_path: PathBuf, schema: TreeSchema) -> Result<Self, StoreError> {
        // Only new database files need the WAL checkpoint after initialization.
        let is_new_database = !db_path.exists();

        // Ensure parent directory exists
        if let Some(parent) = db_path.parent() {
            if !parent.exists() {
                std::fs::create_dir_all(parent).map_err(StoreError::DirectoryCreationFailed)?;
            }
        }

        // Open database connection using Builder pattern
        let db = Builder::new_local(&db_path)
            .build()
            .await
            .map_err(|e| StoreError::connection_failed(db_path.clone(), e))?;

        let service = Self {
            db: Arc::new(db),
            db_path,
            schema,
        };

        service.initialize_schema(is_new_database).await?;

        Ok(service)
    }

    /// Create a DatabaseService backed by an in-memory database
    ///
    /// Intended for tests and short-lived tooling; the data does not
    /// survive the process.
    pub async fn new_in_memory(schema: TreeSchema) -> Result<Self, StoreError> {
        let db_path = PathBuf::from(":memory:");
        let db = Builder::new_local(&db_path)
            .build()
            .await
            .map_err(|e| StoreError::connection_failed(db_path.clone(), e))?;

        let service = Self {
            db: Arc::new(db),
            db_path,
            schema,
        };

        service.initialize_schema(true).await?;

        Ok(service)
    }

    /// Execute a PRAGMA statement
    ///
    /// PRAGMA statements return rows, so we must use query() instead of
    /// execute(). This helper encapsulates that pattern.
    async fn execute_pragma(
        &self,
        conn: &libsql::Connection,
        pragma: &str,
    ) -> Result<(), StoreError> {
        let mut stmt = conn.prepare(pragma).await.map_err(|e| {
            StoreError::sql_execution(format!("Failed to execute '{}': {}", pragma, e))
        })?;
        let _ = stmt.query(()).await.map_err(|e| {
            StoreError::sql_execution(format!("Failed to execute '{}': {}", pragma, e))
        })?;
        Ok(())
    }

    /// Initialize database schema and configuration
    ///
    /// Creates the hierarchy table and indexes using CREATE TABLE IF NOT
    /// EXISTS, ensuring idempotent initialization (safe to call multiple
    /// times). Table and column names come from the configured
    /// [`TreeSchema`].
    async fn initialize_schema(&self, is_new_database: bool) -> Result<(), StoreError> {
        // Must use connect_with_timeout() in async functions to prevent
        // SQLite thread-safety violations when Tokio moves futures between
        // threads.
        let conn = self.connect_with_timeout().await?;

        // Enable WAL mode for better concurrency
        self.execute_pragma(&conn, "PRAGMA journal_mode = WAL")
            .await?;

        // Wait up to 5s instead of failing immediately on lock
        self.execute_pragma(&conn, "PRAGMA busy_timeout = 5000")
            .await?;

        // Enable foreign key constraints
        self.execute_pragma(&conn, "PRAGMA foreign_keys = ON")
            .await?;

        let s = &self.schema;
        let scope_column = match s.scope_col() {
            Some(col) => format!("{col} TEXT,\n                "),
            None => String::new(),
        };

        conn.execute(
            &format!(
                "CREATE TABLE IF NOT EXISTS {table} (
                {id} INTEGER PRIMARY KEY AUTOINCREMENT,
                {root} INTEGER NOT NULL DEFAULT 0,
                {parent} INTEGER,
                {lft} INTEGER NOT NULL,
                {rgt} INTEGER NOT NULL,
                {depth} INTEGER NOT NULL DEFAULT 0,
                {scope_column}FOREIGN KEY ({parent}) REFERENCES {table}({id}) ON DELETE SET NULL
            )",
                table = s.table,
                id = s.id_col,
                root = s.root_col,
                parent = s.parent_col,
                lft = s.left_col,
                rgt = s.right_col,
                depth = s.depth_col,
                scope_column = scope_column,
            ),
            (),
        )
        .await
        .map_err(|e| {
            StoreError::sql_execution(format!("Failed to create table '{}': {}", s.table, e))
        })?;

        self.create_core_indexes(&conn).await?;

        // Force WAL checkpoint only for newly created databases. This
        // prevents race conditions where rapid database swaps in tests cause
        // "no such table" errors due to WAL entries not being flushed.
        if is_new_database {
            self.execute_pragma(&conn, "PRAGMA wal_checkpoint(TRUNCATE)")
                .await?;
        }

        Ok(())
    }

    /// Create core indexes for the hierarchy table
    ///
    /// Every structural query filters by tree and orders by the left
    /// boundary, so a composite (root, lft) index carries nearly all reads.
    async fn create_core_indexes(&self, conn: &libsql::Connection) -> Result<(), StoreError> {
        let s = &self.schema;

        // Composite index on (root, lft): preorder reads within one tree
        conn.execute(
            &format!(
                "CREATE INDEX IF NOT EXISTS idx_{table}_root_lft ON {table}({root}, {lft})",
                table = s.table,
                root = s.root_col,
                lft = s.left_col,
            ),
            (),
        )
        .await
        .map_err(|e| StoreError::sql_execution(format!("Failed to create root index: {}", e)))?;

        // Index on parent (direct-children queries)
        conn.execute(
            &format!(
                "CREATE INDEX IF NOT EXISTS idx_{table}_parent ON {table}({parent})",
                table = s.table,
                parent = s.parent_col,
            ),
            (),
        )
        .await
        .map_err(|e| StoreError::sql_execution(format!("Failed to create parent index: {}", e)))?;

        // Index on the scope column when the schema partitions by it
        if let Some(col) = s.scope_col() {
            conn.execute(
                &format!(
                    "CREATE INDEX IF NOT EXISTS idx_{table}_{col} ON {table}({col})",
                    table = s.table,
                    col = col,
                ),
                (),
            )
            .await
            .map_err(|e| {
                StoreError::sql_execution(format!("Failed to create scope index: {}", e))
            })?;
        }

        Ok(())
    }

    /// Get a synchronous connection handle
    ///
    /// Use only in single-threaded, synchronous contexts where the
    /// connection will not be used across await points.
    pub fn connect(&self) -> Result<libsql::Connection, StoreError> {
        self.db.connect().map_err(StoreError::Libsql)
    }

    /// Get an async connection with busy timeout configured
    ///
    /// This is the safe default for async contexts. Sets a 5-second busy
    /// timeout so concurrent operations wait and retry instead of failing
    /// immediately when the database is locked.
    pub async fn connect_with_timeout(&self) -> Result<libsql::Connection, StoreError> {
        // The synchronous connect() call is safe here because it only
        // creates the connection handle.
        let conn = self.connect()?;

        self.execute_pragma(&conn, "PRAGMA busy_timeout = 5000")
            .await?;

        Ok(conn)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    #[tokio::test]
    async fn test_creates_database_file_and_table() {
        let temp = TempDir::new().unwrap();
        let path = temp.path().join("hierarchy.db");
        let service = DatabaseService::new(path.clone(), TreeSchema::default())
            .await
            .unwrap();
        assert!(path.exists());

        let conn = service.connect_with_timeout().await.unwrap();
        let mut stmt = conn
            .prepare("SELECT COUNT(*) FROM nodes")
            .await
            .unwrap();
        let mut rows = stmt.query(()).await.unwrap();
        let row = rows.next().await.unwrap().unwrap();
        assert_eq!(row.get::<i64>(0).unwrap(), 0);
    }

    #[tokio::test]
    async fn test_initialization_is_idempotent() {
        let temp = TempDir::new().unwrap();
        let path = temp.path().join("hierarchy.db");
        DatabaseService::new(path.clone(), TreeSchema::default())
            .await
            .unwrap();
        // Reopening the same file must not fail or clobber the schema.
        DatabaseService::new(path, TreeSchema::default())
            .await
            .unwrap();
    }

    #[tokio::test]
    async fn test_scoped_schema_creates_scope_column() {
        let temp = TempDir::new().unwrap();
        let path = temp.path().join("scoped.db");
        let service = DatabaseService::new(path, TreeSchema::scoped_by("forum_id"))
            .await
            .unwrap();

        let conn = service.connect_with_timeout().await.unwrap();
        conn.execute(
            "INSERT INTO nodes (root_id, parent_id, lft, rgt, depth, forum_id) \
             VALUES (0, NULL, 1, 2, 0, 'general')",
            (),
        )
        .await
        .unwrap();
    }
}
