use serde::Serialize;

/// What happens to the destination table before rows are inserted
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum TablePreparation {
    None,
    Create,
    Recreate,
    Truncate,
}

/// Write strategy chosen for one synchronization
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum SyncPath {
    Insert(TablePreparation),
    UpdateOrInsert,
}

/// Pick the write strategy; the first matching rule wins.
///
/// Keyed updates are only attempted against an existing, non-empty table the
/// caller did not ask to reset. Everything else inserts.
pub fn choose_path(keys_provided: bool, exists: bool, has_rows: bool, truncate: bool, recreate: bool) -> SyncPath {
    if !exists {
        return SyncPath::Insert(TablePreparation::Create);
    }
    if recreate {
        return SyncPath::Insert(TablePreparation::Recreate);
    }
    if truncate {
        return SyncPath::Insert(TablePreparation::Truncate);
    }
    if !keys_provided || !has_rows {
        return SyncPath::Insert(TablePreparation::None);
    }
    SyncPath::UpdateOrInsert
}
