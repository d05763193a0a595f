//! Database capability set consumed by the loader
//!
//! The loader never talks to a driver directly. Everything it needs (reads,
//! single, bulk and batched writes, table lifecycle) goes through
//! `DatabaseInterface`, so other backends can be dropped in without touching
//! extraction or upsert logic. `SqliteDatabase` is the default backend.

pub mod error;
pub mod sqlite;

#[cfg(test)]
pub(crate) mod testing;

pub use error::DbError;
pub use sqlite::SqliteDatabase;

use crate::query::quote_identifier;
use crate::schema::Schema;
use crate::value::{Record, SqlValue};

/// Operations a backend must provide to be loaded into
pub trait DatabaseInterface {
    fn database_name(&self) -> &str;

    fn database_type(&self) -> &str;

    /// Run a query and return its rows as records keyed by result column name
    fn execute_read_query(&mut self, query: &str, params: &[SqlValue]) -> Result<Vec<Record>, DbError>;

    /// Run one statement.
    ///
    /// With `check_affected_rows`, a statement that changes nothing returns
    /// `DbError::NoRowsAffected` instead of `Ok`.
    fn execute_write_query(
        &mut self,
        query: &str,
        params: &[SqlValue],
        check_affected_rows: bool,
    ) -> Result<(), DbError>;

    /// Run one statement once per row as a single unit of work
    fn execute_write_bulk_query(&mut self, query: &str, rows: &[Vec<SqlValue>]) -> Result<(), DbError>;

    /// Like the bulk call, but committed in chunks of `batch_size` rows
    fn execute_write_batch_query(
        &mut self,
        query: &str,
        rows: &[Vec<SqlValue>],
        batch_size: usize,
    ) -> Result<(), DbError>;

    fn table_exists(&mut self, table: &str) -> bool;

    /// Whether the table holds at least one row; unreadable tables count as empty
    fn table_has_rows(&mut self, table: &str) -> bool {
        let query = format!("SELECT 1 FROM {} LIMIT 1", quote_identifier(table));
        self.execute_read_query(&query, &[])
            .map(|rows| !rows.is_empty())
            .unwrap_or(false)
    }

    /// Create the table unless it already exists.
    ///
    /// `keys` describe the logical key only; backends must not turn them into
    /// constraints. Returns false when nothing was created.
    fn create_table(&mut self, table: &str, schema: &Schema, keys: Option<&[String]>) -> bool;

    fn truncate_table(&mut self, table: &str) -> bool;

    fn drop_table(&mut self, table: &str) -> bool;
}
