use crate::schema::Schema;

/// Wrap an identifier in double quotes, doubling any embedded quote
pub fn quote_identifier(name: &str) -> String {
    format!("\"{}\"", name.replace('"', "\"\""))
}

fn quoted_list<S: AsRef<str>>(names: &[S]) -> String {
    names
        .iter()
        .map(|name| quote_identifier(name.as_ref()))
        .collect::<Vec<_>>()
        .join(", ")
}

fn placeholders(count: usize) -> String {
    vec!["?"; count].join(", ")
}

fn conditions<S: AsRef<str>>(names: &[S]) -> String {
    names
        .iter()
        .map(|name| format!("{} = ?", quote_identifier(name.as_ref())))
        .collect::<Vec<_>>()
        .join(" AND ")
}

/// `CREATE TABLE "t" ("a" INTEGER, ...)`, without key or uniqueness constraints
pub fn build_create_table(table: &str, schema: &Schema) -> String {
    let definitions = schema
        .iter()
        .map(|(column, column_type)| format!("{} {}", quote_identifier(column), column_type.sql_name()))
        .collect::<Vec<_>>()
        .join(", ");

    format!("CREATE TABLE {} ({})", quote_identifier(table), definitions)
}

/// `INSERT INTO "t" ("a", "b") VALUES (?, ?)` in the given column order
pub fn build_insert<S: AsRef<str>>(table: &str, columns: &[S]) -> String {
    format!(
        "INSERT INTO {} ({}) VALUES ({})",
        quote_identifier(table),
        quoted_list(columns),
        placeholders(columns.len())
    )
}

/// `UPDATE "t" SET "a" = ?, ... WHERE "k" = ? AND ...`
///
/// SET lists the non-key columns in dataset order and WHERE lists the keys in
/// the caller's order. Parameters must follow that same order.
pub fn build_update<S: AsRef<str>, K: AsRef<str>>(table: &str, columns: &[S], keys: &[K]) -> String {
    let set_columns = non_key_columns(columns, keys);
    format!(
        "UPDATE {} SET {} WHERE {}",
        quote_identifier(table),
        set_columns
            .iter()
            .map(|column| format!("{} = ?", quote_identifier(column)))
            .collect::<Vec<_>>()
            .join(", "),
        conditions(keys)
    )
}

/// Insert rows only where no row with the same key exists yet.
///
/// Columns are listed in update order (non-keys, then keys); the parameters
/// are that tuple followed by the key values once more for the subquery.
pub fn build_insert_if_absent<S: AsRef<str>, K: AsRef<str>>(
    table: &str,
    columns: &[S],
    keys: &[K],
) -> String {
    let ordered = update_order(columns, keys);
    format!(
        "INSERT INTO {table} ({}) SELECT {} WHERE NOT EXISTS (SELECT 1 FROM {table} WHERE {})",
        quoted_list(&ordered[..]),
        placeholders(ordered.len()),
        conditions(keys),
        table = quote_identifier(table),
    )
}

fn non_key_columns<S: AsRef<str>, K: AsRef<str>>(columns: &[S], keys: &[K]) -> Vec<String> {
    columns
        .iter()
        .map(|c| c.as_ref())
        .filter(|c| !keys.iter().any(|k| k.as_ref() == *c))
        .map(str::to_string)
        .collect()
}

/// Non-key columns in dataset order, then the keys in key order
pub fn update_order<S: AsRef<str>, K: AsRef<str>>(columns: &[S], keys: &[K]) -> Vec<String> {
    let mut ordered = non_key_columns(columns, keys);
    ordered.extend(keys.iter().map(|k| k.as_ref().to_string()));
    ordered
}

/// UPDATE, INSERT and INSERT-IF-ABSENT rendered from one column/key layout
///
/// All three statements take the same parameter tuple (the insert-if-absent
/// one appends the keys again), so a row prepared once can go through any of
/// them.
#[derive(Debug, Clone)]
pub struct UpsertStatements {
    table: String,
    columns: Vec<String>,
    keys: Vec<String>,
}

impl UpsertStatements {
    pub fn new<S: AsRef<str>, K: AsRef<str>>(table: &str, columns: &[S], keys: &[K]) -> Self {
        UpsertStatements {
            table: table.to_string(),
            columns: columns.iter().map(|c| c.as_ref().to_string()).collect(),
            keys: keys.iter().map(|k| k.as_ref().to_string()).collect(),
        }
    }

    pub fn keys(&self) -> &[String] {
        &self.keys
    }

    /// Column order of every parameter tuple
    pub fn parameter_order(&self) -> Vec<String> {
        update_order(&self.columns[..], &self.keys[..])
    }

    /// False when every column is a key, leaving nothing to SET
    pub fn has_assignments(&self) -> bool {
        self.columns
            .iter()
            .any(|c| !self.keys.iter().any(|k| k == c))
    }

    pub fn update(&self) -> String {
        build_update(&self.table, &self.columns[..], &self.keys[..])
    }

    pub fn insert(&self) -> String {
        build_insert(&self.table, &self.parameter_order()[..])
    }

    pub fn insert_if_absent(&self) -> String {
        build_insert_if_absent(&self.table, &self.columns[..], &self.keys[..])
    }
}
