//! Synchronize a dataset into a destination table
//!
//! The engine decides between plain inserts and keyed update-or-insert, runs
//! the write as one bulk call and, when the backend runs out of resources,
//! retries row by row in dataset order. Row-level failures during that retry
//! are logged and skipped; the run always completes.

pub mod decision;
pub mod prepare;

pub use decision::{choose_path, SyncPath, TablePreparation};
pub use prepare::{prepare_rows, prepare_value};

use crate::db::{DatabaseInterface, DbError};
use crate::query::{build_insert, UpsertStatements};
use crate::schema::Schema;
use crate::types::{Dataset, EtlConfig};
use crate::value::SqlValue;
use indicatif::{ProgressBar, ProgressStyle};
use serde::Serialize;
use tracing::{debug, error, info, info_span, warn};

/// Everything one synchronization needs to know about the destination
#[derive(Debug, Clone, Copy)]
pub struct SyncRequest<'a> {
    pub table: &'a str,
    pub dataset: &'a Dataset,
    pub schema: &'a Schema,
    /// Key columns, in WHERE clause order; `None` or empty means plain inserts
    pub keys: Option<&'a [String]>,
    pub truncate: bool,
    pub recreate: bool,
    pub table_exists: bool,
    pub table_has_rows: bool,
}

/// What a synchronization did
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct SyncReport {
    pub path: SyncPath,
    pub rows_written: usize,
    pub rows_skipped: usize,
    /// True when the bulk call was replaced by row-by-row writes
    pub row_fallback: bool,
    /// True when a bulk UPDATE committed, even if inserting the missing rows
    /// afterwards failed and every row is counted as skipped
    pub bulk_updated: bool,
}

/// Inputs the engine refuses to work with
#[derive(Debug, thiserror::Error)]
pub enum SyncError {
    #[error("Key column '{key}' is not a column of the data for table '{table}'")]
    UnknownKey { table: String, key: String },

    #[error("No columns to load into table '{0}'")]
    EmptySchema(String),
}

#[derive(Debug, Default)]
struct WriteOutcome {
    written: usize,
    skipped: usize,
    row_fallback: bool,
    bulk_updated: bool,
}

impl WriteOutcome {
    fn bulk(rows: usize) -> Self {
        WriteOutcome {
            written: rows,
            ..Default::default()
        }
    }

    fn failed(rows: usize) -> Self {
        WriteOutcome {
            skipped: rows,
            ..Default::default()
        }
    }
}

/// Runs synchronizations against one backend
pub struct UpsertEngine<'a> {
    db: &'a mut dyn DatabaseInterface,
    config: &'a EtlConfig,
}

impl<'a> UpsertEngine<'a> {
    pub fn new(db: &'a mut dyn DatabaseInterface, config: &'a EtlConfig) -> Self {
        UpsertEngine { db, config }
    }

    pub fn synchronize(&mut self, request: &SyncRequest<'_>) -> Result<SyncReport, SyncError> {
        let span = info_span!("synchronize", table = request.table);
        let _guard = span.enter();

        if request.schema.is_empty() {
            return Err(SyncError::EmptySchema(request.table.to_string()));
        }

        let keys = request.keys.unwrap_or(&[]);
        if let Some(key) = keys.iter().find(|key| !request.dataset.has_column(key)) {
            return Err(SyncError::UnknownKey {
                table: request.table.to_string(),
                key: key.clone(),
            });
        }

        let path = choose_path(
            !keys.is_empty(),
            request.table_exists,
            request.table_has_rows,
            request.truncate,
            request.recreate,
        );
        info!(?path, rows = request.dataset.len(), "Synchronizing table");

        let outcome = match path {
            SyncPath::Insert(preparation) => {
                self.prepare_table(request, preparation);
                self.insert_rows(request.table, request.dataset)
            }
            SyncPath::UpdateOrInsert => self.upsert_rows(request.table, request.dataset, keys),
        };

        if outcome.skipped > 0 {
            warn!(written = outcome.written, skipped = outcome.skipped, "Table synchronized with skipped rows");
        } else {
            info!(written = outcome.written, "Table synchronized");
        }

        Ok(SyncReport {
            path,
            rows_written: outcome.written,
            rows_skipped: outcome.skipped,
            row_fallback: outcome.row_fallback,
            bulk_updated: outcome.bulk_updated,
        })
    }

    fn prepare_table(&mut self, request: &SyncRequest<'_>, preparation: TablePreparation) {
        let table = request.table;
        let keys = request.keys.filter(|keys| !keys.is_empty());

        let prepared = match preparation {
            TablePreparation::None => true,
            TablePreparation::Create => self.db.create_table(table, request.schema, keys),
            TablePreparation::Recreate => {
                if !self.db.drop_table(table) {
                    warn!("Unable to drop table before recreating it");
                }
                self.db.create_table(table, request.schema, keys)
            }
            TablePreparation::Truncate => self.db.truncate_table(table),
        };

        if !prepared {
            warn!(?preparation, "Table preparation did not happen");
        }
    }

    fn insert_rows(&mut self, table: &str, dataset: &Dataset) -> WriteOutcome {
        let columns = dataset.columns();
        let query = build_insert(table, columns);
        let rows = prepare_rows(dataset, columns);

        if self.config.bulk_execute {
            match self.db.execute_write_bulk_query(&query, &rows) {
                Ok(()) => return WriteOutcome::bulk(rows.len()),
                Err(err) if err.is_resource_exhausted() => {
                    warn!(error = %err, "Bulk insert exceeded resource limits, inserting row by row");
                }
                Err(err) => {
                    error!(error = %err, "Bulk insert failed");
                    return WriteOutcome::failed(rows.len());
                }
            }
        }

        let bar = self.progress_bar(rows.len(), "Inserting rows");
        let mut outcome = WriteOutcome {
            row_fallback: true,
            ..Default::default()
        };

        for (idx, row) in rows.iter().enumerate() {
            match self.db.execute_write_query(&query, row, false) {
                Ok(()) => outcome.written += 1,
                Err(err) => {
                    warn!(row = idx, error = %err, "Skipping row");
                    outcome.skipped += 1;
                }
            }
            bar.inc(1);
        }

        bar.finish_and_clear();
        outcome
    }

    fn upsert_rows(&mut self, table: &str, dataset: &Dataset, keys: &[String]) -> WriteOutcome {
        let statements = UpsertStatements::new(table, dataset.columns(), keys);
        let rows = prepare_rows(dataset, &statements.parameter_order());
        let absent_rows: Vec<Vec<SqlValue>> = rows.iter().map(|row| with_key_suffix(row, keys.len())).collect();

        let update = statements.update();
        let insert = statements.insert();
        let insert_if_absent = statements.insert_if_absent();

        if !statements.has_assignments() {
            debug!("Every column is a key, only inserting missing rows");
        }

        let mut bulk_updated = false;
        if self.config.bulk_execute {
            let updated = if statements.has_assignments() {
                self.db.execute_write_bulk_query(&update, &rows)
            } else {
                Ok(())
            };

            match updated {
                Ok(()) => {
                    bulk_updated = statements.has_assignments();
                    match self.db.execute_write_bulk_query(&insert_if_absent, &absent_rows) {
                        Ok(()) => {
                            return WriteOutcome {
                                bulk_updated,
                                ..WriteOutcome::bulk(rows.len())
                            };
                        }
                        Err(err) if err.is_resource_exhausted() => {
                            warn!(error = %err, "Bulk insert of missing rows exceeded resource limits, upserting row by row");
                        }
                        Err(err) => {
                            if bulk_updated {
                                error!(error = %err, "Bulk insert of missing rows failed, existing rows were updated");
                            } else {
                                error!(error = %err, "Bulk insert of missing rows failed");
                            }
                            return WriteOutcome {
                                bulk_updated,
                                ..WriteOutcome::failed(rows.len())
                            };
                        }
                    }
                }
                Err(err) if err.is_resource_exhausted() => {
                    warn!(error = %err, "Bulk update exceeded resource limits, upserting row by row");
                }
                Err(err) => {
                    error!(error = %err, "Bulk update failed");
                    return WriteOutcome::failed(rows.len());
                }
            }
        }

        let bar = self.progress_bar(rows.len(), "Upserting rows");
        let mut outcome = WriteOutcome {
            row_fallback: true,
            bulk_updated,
            ..Default::default()
        };

        for (idx, (row, absent_row)) in rows.iter().zip(&absent_rows).enumerate() {
            let result = if statements.has_assignments() {
                match self.db.execute_write_query(&update, row, true) {
                    Err(DbError::NoRowsAffected) => {
                        debug!(row = idx, "No row to update, inserting");
                        self.db.execute_write_query(&insert, row, true)
                    }
                    other => other,
                }
            } else {
                self.db.execute_write_query(&insert_if_absent, absent_row, false)
            };

            match result {
                Ok(()) => outcome.written += 1,
                Err(err) => {
                    warn!(row = idx, error = %err, "Skipping row");
                    outcome.skipped += 1;
                }
            }
            bar.inc(1);
        }

        bar.finish_and_clear();
        outcome
    }

    fn progress_bar(&self, len: usize, prefix: &str) -> ProgressBar {
        if !self.config.show_progress {
            return ProgressBar::hidden();
        }

        let bar = ProgressBar::new(len as u64);
        if let Ok(style) = ProgressStyle::with_template("{prefix:20} {pos:>5}/{len:<5} [{bar:67}] {percent:>3}%") {
            bar.set_style(style.progress_chars("█ "));
        }
        bar.set_prefix(prefix.to_string());
        bar
    }
}

/// The update tuple followed by its trailing key values again
fn with_key_suffix(row: &[SqlValue], key_count: usize) -> Vec<SqlValue> {
    let mut extended = row.to_vec();
    extended.extend_from_slice(&row[row.len() - key_count..]);
    extended
}
