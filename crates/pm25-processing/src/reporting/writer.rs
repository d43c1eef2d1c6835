//! Artifact persistence.

use crate::error::{Result, ResultExt};
use polars::prelude::*;
use serde::Serialize;
use std::fs::{self, File};
use std::io::Write;
use std::path::{Path, PathBuf};
use tracing::info;

/// Writes a run's artifacts as `<name>_<stage>.csv` / `<name>_report.json`
/// under one processing directory.
#[derive(Debug, Clone)]
pub struct ArtifactWriter {
    output_dir: PathBuf,
    name: String,
}

impl ArtifactWriter {
    pub fn new(output_dir: impl Into<PathBuf>, name: impl Into<String>) -> Self {
        Self {
            output_dir: output_dir.into(),
            name: name.into(),
        }
    }

    pub fn output_dir(&self) -> &Path {
        &self.output_dir
    }

    /// Path an artifact for `stage` is written to.
    pub fn path_for(&self, stage: &str, extension: &str) -> PathBuf {
        self.output_dir
            .join(format!("{}_{}.{}", self.name, stage, extension))
    }

    /// Write a DataFrame as CSV with a header row.
    pub fn write_csv(&self, stage: &str, df: &mut DataFrame) -> Result<PathBuf> {
        fs::create_dir_all(&self.output_dir)
            .context(format!("Creating {}", self.output_dir.display()))?;
        let path = self.path_for(stage, "csv");
        let mut file = File::create(&path).context(format!("Creating {}", path.display()))?;

        CsvWriter::new(&mut file)
            .include_header(true)
            .with_separator(b',')
            .with_quote_char(b'"')
            .finish(df)
            .context(format!("Writing {}", path.display()))?;

        info!("Saved {} rows to {}", df.height(), path.display());
        Ok(path)
    }

    /// Write any serializable value as pretty JSON.
    pub fn write_json<T: Serialize>(&self, stage: &str, value: &T) -> Result<PathBuf> {
        fs::create_dir_all(&self.output_dir)
            .context(format!("Creating {}", self.output_dir.display()))?;
        let path = self.path_for(stage, "json");
        let mut file = File::create(&path).context(format!("Creating {}", path.display()))?;
        file.write_all(serde_json::to_string_pretty(value)?.as_bytes())
            .context(format!("Writing {}", path.display()))?;

        info!("Report saved: {}", path.display());
        Ok(path)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn temp_dir(name: &str) -> PathBuf {
        let dir = std::env::temp_dir().join(format!("pm25_writer_{}_{}", name, std::process::id()));
        let _ = fs::remove_dir_all(&dir);
        dir
    }

    #[test]
    fn test_path_for() {
        let writer = ArtifactWriter::new("data/processed", "who");
        assert_eq!(
            writer.path_for("cleaned", "csv"),
            PathBuf::from("data/processed/who_cleaned.csv")
        );
    }

    #[test]
    fn test_write_csv_creates_directory() {
        let dir = temp_dir("csv");
        let writer = ArtifactWriter::new(dir.join("nested"), "t");
        let mut df = df!["a" => [1i32, 2], "b" => ["x, y", "z"]].unwrap();

        let path = writer.write_csv("raw", &mut df).unwrap();

        let content = fs::read_to_string(&path).unwrap();
        assert_eq!(content.lines().next(), Some("a,b"));
        assert!(content.contains("\"x, y\""));
        fs::remove_dir_all(&dir).ok();
    }

    #[test]
    fn test_write_json() {
        let dir = temp_dir("json");
        let writer = ArtifactWriter::new(&dir, "t");
        let path = writer
            .write_json("report", &serde_json::json!({"rows": 3}))
            .unwrap();
        assert!(path.ends_with("t_report.json"));
        let content = fs::read_to_string(&path).unwrap();
        assert!(content.contains("\"rows\": 3"));
        fs::remove_dir_all(&dir).ok();
    }
}
