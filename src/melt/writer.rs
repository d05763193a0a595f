use crate::types::Dataset;
use crate::value::field;
use anyhow::{Context, Result};
use std::fs::File;
use std::io::Write;
use std::path::{Path, PathBuf};

/// Writes datasets to CSV files in one directory, one file per table
pub struct DatasetWriter {
    output_dir: PathBuf,
}

impl DatasetWriter {
    /// Create a writer for a directory, creating the directory if needed
    pub fn new<P: AsRef<Path>>(output_dir: P) -> Result<Self> {
        std::fs::create_dir_all(&output_dir).context("Failed to create output directory")?;

        Ok(DatasetWriter {
            output_dir: output_dir.as_ref().to_path_buf(),
        })
    }

    pub fn output_dir(&self) -> &Path {
        &self.output_dir
    }

    /// Write `dataset` to `<output_dir>/<name>.csv`, replacing any existing file
    pub fn write_table(&self, name: &str, dataset: &Dataset) -> Result<PathBuf> {
        let path = self.output_dir.join(format!("{}.csv", name));
        let file = File::create(&path)
            .with_context(|| format!("Failed to open file: {}", path.display()))?;
        write_csv(file, dataset)?;
        Ok(path)
    }
}

/// Write a dataset as CSV with a header row in column order
pub fn write_csv<W: Write>(writer: W, dataset: &Dataset) -> Result<()> {
    let mut writer = csv::Writer::from_writer(writer);

    writer
        .write_record(dataset.columns())
        .context("Failed to write CSV header")?;

    for row in dataset.rows() {
        let fields = dataset.columns().iter().map(|c| field(row, c).to_field());
        writer
            .write_record(fields)
            .context("Failed to write CSV row")?;
    }

    writer.flush().context("Failed to flush writer")
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_write_csv_fills_missing_cells() {
        let dataset = Dataset::from_json(vec![
            json!({"name": "Alice", "tags": ["a", "b"]}),
            json!({"name": "Bob", "age": 30}),
        ]);

        let mut buffer = Vec::new();
        write_csv(&mut buffer, &dataset).unwrap();

        let output = String::from_utf8(buffer).unwrap();
        let lines: Vec<&str> = output.lines().collect();
        assert_eq!(lines[0], "name,tags,age");
        assert_eq!(lines[1], r#"Alice,"[""a"",""b""]","#);
        assert_eq!(lines[2], "Bob,,30");
    }

    #[test]
    fn test_write_table_creates_file() {
        let dir = tempfile::tempdir().unwrap();
        let writer = DatasetWriter::new(dir.path().join("out")).unwrap();
        let dataset = Dataset::from_json(vec![json!({"id": 1})]);

        let path = writer.write_table("users", &dataset).unwrap();

        assert!(path.ends_with("out/users.csv"));
        let text = std::fs::read_to_string(path).unwrap();
        assert_eq!(text.lines().collect::<Vec<_>>(), vec!["id", "1"]);
    }
}
