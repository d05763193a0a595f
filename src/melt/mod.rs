//! JSON melting - flatten nested documents into relational rows
//!
//! Nested mappings are joined into their parent row with a separator, and
//! list-valued fields are split out into child tables pooled across the whole
//! dataset. Datasets can then be written out as CSV, one file per table.

pub mod extractor;
pub mod writer;

pub use extractor::{flatten_record, JsonMelter};
pub use writer::{write_csv, DatasetWriter};
