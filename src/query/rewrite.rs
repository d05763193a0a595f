//! Text-level rewrite of a rendered UPDATE into the matching INSERT
//!
//! Works on statements shaped like the ones `build_update` produces:
//! double-quoted identifiers, one `=` per clause and `AND`-only conditions.
//! Other shapes give a wrong statement rather than an error.

use once_cell::sync::Lazy;
use regex::{Match, Regex};

// Each pattern matches a quoted identifier first so keywords inside one are skipped
static QUOTED: Lazy<Regex> = Lazy::new(|| Regex::new(r#""(?:[^"]|"")*""#).unwrap());

static SET_KEYWORD: Lazy<Regex> = Lazy::new(|| Regex::new(r#""(?:[^"]|"")*"|\bSET\b"#).unwrap());

static WHERE_KEYWORD: Lazy<Regex> = Lazy::new(|| Regex::new(r#""(?:[^"]|"")*"|\bWHERE\b"#).unwrap());

static AND_KEYWORD: Lazy<Regex> = Lazy::new(|| Regex::new(r#""(?:[^"]|"")*"|\s+AND\s+"#).unwrap());

static COMMA: Lazy<Regex> = Lazy::new(|| Regex::new(r#""(?:[^"]|"")*"|,"#).unwrap());

static EQUALS: Lazy<Regex> = Lazy::new(|| Regex::new(r#""(?:[^"]|"")*"|="#).unwrap());

/// Derive `INSERT INTO "t" (<set cols>, <where cols>) VALUES (<placeholders>)`
/// from `UPDATE "t" SET <col> = ?, ... WHERE <col> = ? AND ...`.
///
/// Columns and placeholders keep their statement order, SET clauses first, so
/// the INSERT accepts the same parameter tuple as the UPDATE.
pub fn update_to_insert(update_statement: &str) -> String {
    let table = QUOTED
        .find(update_statement)
        .map_or("", |m| &update_statement[m.start() + 1..m.end() - 1]);

    let set_start = find_unquoted(&SET_KEYWORD, update_statement, 0).map_or(update_statement.len(), |m| m.end());
    let (set_section, where_section) = match find_unquoted(&WHERE_KEYWORD, update_statement, set_start) {
        Some(m) => (&update_statement[set_start..m.start()], &update_statement[m.end()..]),
        None => (&update_statement[set_start..], ""),
    };

    let mut columns = Vec::new();
    let mut placeholders = Vec::new();

    let set_clauses = split_unquoted(&COMMA, set_section);
    let where_clauses = split_unquoted(&AND_KEYWORD, where_section);

    for clause in set_clauses.into_iter().chain(where_clauses) {
        if let Some((column, placeholder)) = split_assignment(clause) {
            columns.push(column);
            placeholders.push(placeholder);
        }
    }

    format!(
        "INSERT INTO \"{}\" ({}) VALUES ({})",
        table,
        columns.join(", "),
        placeholders.join(", ")
    )
}

/// First match of `pattern` at or after `start` that is not a quoted identifier
fn find_unquoted<'t>(pattern: &Regex, text: &'t str, start: usize) -> Option<Match<'t>> {
    let mut at = start;
    while let Some(m) = pattern.find_at(text, at) {
        if !m.as_str().starts_with('"') {
            return Some(m);
        }
        at = m.end();
    }
    None
}

fn split_unquoted<'t>(pattern: &Regex, text: &'t str) -> Vec<&'t str> {
    let mut pieces = Vec::new();
    let mut piece_start = 0;
    let mut at = 0;

    while let Some(m) = find_unquoted(pattern, text, at) {
        pieces.push(&text[piece_start..m.start()]);
        piece_start = m.end();
        at = m.end();
    }
    pieces.push(&text[piece_start..]);
    pieces
}

/// `"col" = ?` into (`"col"`, `?`)
fn split_assignment(clause: &str) -> Option<(&str, &str)> {
    let equals = find_unquoted(&EQUALS, clause, 0)?;
    let column = clause[..equals.start()].trim();
    let placeholder = clause[equals.end()..].trim();

    if column.is_empty() || placeholder.is_empty() {
        return None;
    }

    Some((column, placeholder))
}
