use crate::db::{DatabaseInterface, DbError};
use crate::schema::Schema;
use crate::value::{Record, SqlValue};
use std::collections::VecDeque;

/// One call made against the recording backend
#[derive(Debug, Clone, PartialEq)]
pub enum Call {
    Write {
        query: String,
        params: Vec<SqlValue>,
        check: bool,
    },
    Bulk {
        query: String,
        rows: usize,
    },
    Create(String),
    Truncate(String),
    Drop(String),
}

/// In-memory backend recording every call, with scripted write outcomes
#[derive(Default)]
pub struct RecordingDatabase {
    pub calls: Vec<Call>,
    pub exists: bool,
    pub has_rows: bool,
    pub write_results: VecDeque<Result<(), DbError>>,
    pub bulk_results: VecDeque<Result<(), DbError>>,
}

impl RecordingDatabase {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn writes(&self) -> Vec<&Call> {
        self.calls
            .iter()
            .filter(|call| matches!(call, Call::Write { .. }))
            .collect()
    }

    pub fn bulks(&self) -> Vec<&Call> {
        self.calls
            .iter()
            .filter(|call| matches!(call, Call::Bulk { .. }))
            .collect()
    }
}

impl DatabaseInterface for RecordingDatabase {
    fn database_name(&self) -> &str {
        "recording"
    }

    fn database_type(&self) -> &str {
        "test"
    }

    fn execute_read_query(&mut self, _query: &str, _params: &[SqlValue]) -> Result<Vec<Record>, DbError> {
        Ok(vec![])
    }

    fn execute_write_query(
        &mut self,
        query: &str,
        params: &[SqlValue],
        check_affected_rows: bool,
    ) -> Result<(), DbError> {
        self.calls.push(Call::Write {
            query: query.to_string(),
            params: params.to_vec(),
            check: check_affected_rows,
        });
        self.write_results.pop_front().unwrap_or(Ok(()))
    }

    fn execute_write_bulk_query(&mut self, query: &str, rows: &[Vec<SqlValue>]) -> Result<(), DbError> {
        self.calls.push(Call::Bulk {
            query: query.to_string(),
            rows: rows.len(),
        });
        self.bulk_results.pop_front().unwrap_or(Ok(()))
    }

    fn execute_write_batch_query(
        &mut self,
        query: &str,
        rows: &[Vec<SqlValue>],
        batch_size: usize,
    ) -> Result<(), DbError> {
        for chunk in rows.chunks(batch_size.max(1)) {
            self.execute_write_bulk_query(query, chunk)?;
        }
        Ok(())
    }

    fn table_exists(&mut self, _table: &str) -> bool {
        self.exists
    }

    fn table_has_rows(&mut self, _table: &str) -> bool {
        self.has_rows
    }

    fn create_table(&mut self, table: &str, _schema: &Schema, _keys: Option<&[String]>) -> bool {
        self.calls.push(Call::Create(table.to_string()));
        self.exists = true;
        true
    }

    fn truncate_table(&mut self, table: &str) -> bool {
        self.calls.push(Call::Truncate(table.to_string()));
        self.has_rows = false;
        true
    }

    fn drop_table(&mut self, table: &str) -> bool {
        self.calls.push(Call::Drop(table.to_string()));
        self.exists = false;
        self.has_rows = false;
        true
    }
}
