//! SQL text generation
//!
//! Pure functions rendering DDL and DML for one dialect: `?` placeholders and
//! double-quoted identifiers. Nothing here touches a database.

pub mod builder;
pub mod rewrite;

pub use builder::{
    build_create_table, build_insert, build_insert_if_absent, build_update, quote_identifier,
    update_order, UpsertStatements,
};
pub use rewrite::update_to_insert;
