//! Source loading and schema validation.
//!
//! A source is a local CSV or JSON file, or (with the `remote` feature) an
//! `http(s)` URL. Every source is read into a [`RawTable`], its headers are
//! resolved against the [`ColumnSchema`] once, and each row is validated
//! into a [`Record`].
//!
//! # Example
//!
//! ```rust,ignore
//! use pm25_processing::loader::DataLoader;
//!
//! let loaded = DataLoader::load("data/raw/WHO_PM25_urban_2022.csv")?;
//! println!("{} records, {} missing pm25", loaded.dataset.len(),
//!     loaded.dataset.missing_pm25_count());
//! ```

mod schema;
mod table;

pub use schema::{ColumnSchema, Field, normalize_header};
pub use table::RawTable;

use crate::error::{PipelineError, Result};
use crate::types::{Dataset, ImputationStatus, Record};
use crate::utils::{ParsedCell, parse_numeric_cell, parse_text_cell, parse_year_cell};
use polars::io::csv::read::CsvReadOptions;
use polars::prelude::*;
use serde::{Deserialize, Serialize};
use std::collections::HashSet;
use std::io::Cursor;
use std::path::{Path, PathBuf};
use tracing::{debug, info, warn};

/// Format of a source, decided by its extension.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum SourceFormat {
    Csv,
    Json,
}

impl SourceFormat {
    /// `.json` sources are JSON; everything else is read as CSV.
    pub fn detect(source: &str) -> Self {
        let path = source.split(['?', '#']).next().unwrap_or(source);
        if path.to_ascii_lowercase().ends_with(".json") {
            Self::Json
        } else {
            Self::Csv
        }
    }
}

/// What happened while turning the raw table into records.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct LoadReport {
    pub source: String,
    pub format: SourceFormat,
    pub rows_read: usize,
    pub columns: Vec<String>,
    pub schema: ColumnSchema,
    /// Negative pm25 readings, treated as absent.
    pub negative_pm25: usize,
    /// Rows dropped because their (series, year) pair was already seen.
    pub duplicate_keys_dropped: usize,
}

/// Output of [`DataLoader::load`].
#[derive(Debug, Clone)]
pub struct LoadedData {
    pub table: RawTable,
    pub dataset: Dataset,
    pub report: LoadReport,
}

pub fn is_remote(source: &str) -> bool {
    let lower = source.to_ascii_lowercase();
    lower.starts_with("http://") || lower.starts_with("https://")
}

/// Reads sources into [`Dataset`]s.
pub struct DataLoader;

impl DataLoader {
    /// Load and validate a source.
    ///
    /// # Errors
    ///
    /// [`PipelineError::Load`] when the source is unreachable or malformed,
    /// [`PipelineError::Schema`] when a required column is missing.
    pub fn load(source: &str) -> Result<LoadedData> {
        let format = SourceFormat::detect(source);
        info!("Loading {:?} source: {}", format, source);

        let table = Self::read_table(source, format)?;
        let (dataset, report) = Self::to_dataset(&table, source, format)?;

        info!(
            "Loaded {} records from {} rows ({} columns)",
            dataset.len(),
            report.rows_read,
            report.columns.len()
        );
        Ok(LoadedData {
            table,
            dataset,
            report,
        })
    }

    /// Read a source into a [`RawTable`] without validating it.
    pub fn read_table(source: &str, format: SourceFormat) -> Result<RawTable> {
        if is_remote(source) {
            let bytes = Self::fetch_remote(source)?;
            return Self::parse_bytes(bytes, source, format);
        }

        let path = Path::new(source);
        if !path.exists() {
            return Err(PipelineError::load(source, "file not found"));
        }
        match format {
            SourceFormat::Csv => Self::read_csv_path(path),
            SourceFormat::Json => {
                let content = std::fs::read_to_string(path)
                    .map_err(|e| PipelineError::load(source, e.to_string()))?;
                RawTable::from_json_str(&content, source)
            }
        }
    }

    /// Parse an in-memory source body.
    pub fn parse_bytes(bytes: Vec<u8>, source: &str, format: SourceFormat) -> Result<RawTable> {
        match format {
            SourceFormat::Csv => {
                let df = CsvReadOptions::default()
                    .with_has_header(true)
                    .with_infer_schema_length(Some(0))
                    .into_reader_with_file_handle(Cursor::new(bytes))
                    .finish()
                    .map_err(|e| PipelineError::load(source, e.to_string()))?;
                RawTable::from_dataframe(&df)
            }
            SourceFormat::Json => {
                let content = String::from_utf8(bytes)
                    .map_err(|e| PipelineError::load(source, e.to_string()))?;
                RawTable::from_json_str(&content, source)
            }
        }
    }

    fn read_csv_path(path: &Path) -> Result<RawTable> {
        let source = path.display().to_string();
        // All columns are read as text; typing happens against the schema.
        let df = CsvReadOptions::default()
            .with_has_header(true)
            .with_infer_schema_length(Some(0))
            .try_into_reader_with_file_path(Some(PathBuf::from(path)))
            .and_then(|reader| reader.finish())
            .map_err(|e| PipelineError::load(&source, e.to_string()))?;
        debug!("CSV parsed: {:?}", df.shape());
        RawTable::from_dataframe(&df)
    }

    #[cfg(feature = "remote")]
    fn fetch_remote(url: &str) -> Result<Vec<u8>> {
        let fetch = || -> Result<Vec<u8>> {
            let response = reqwest::blocking::get(url)?.error_for_status()?;
            Ok(response.bytes()?.to_vec())
        };
        let bytes = fetch().map_err(|e| PipelineError::load(url, e.to_string()))?;
        info!("Fetched {} bytes from {}", bytes.len(), url);
        Ok(bytes)
    }

    #[cfg(not(feature = "remote"))]
    fn fetch_remote(url: &str) -> Result<Vec<u8>> {
        Err(PipelineError::load(
            url,
            "remote sources require the `remote` feature",
        ))
    }

    /// Validate a raw table into records.
    ///
    /// Rows with an empty country or unparseable year, and numeric cells
    /// that are neither numbers nor missing markers, make the whole source
    /// malformed. Negative pm25 readings are kept as absent values.
    pub fn to_dataset(
        table: &RawTable,
        source: &str,
        format: SourceFormat,
    ) -> Result<(Dataset, LoadReport)> {
        let schema = ColumnSchema::resolve(table.columns())?;

        let countries = field_cells(table, &schema, Field::Country);
        let years = field_cells(table, &schema, Field::Year);
        let populations = field_cells(table, &schema, Field::UrbanPopulation);
        let pm25s = field_cells(table, &schema, Field::Pm25);
        let regions = field_cells(table, &schema, Field::Region);
        let settlements = field_cells(table, &schema, Field::Settlement);

        let mut records = Vec::with_capacity(table.height());
        let mut seen: HashSet<(String, i32)> = HashSet::with_capacity(table.height());
        let mut negative_pm25 = 0;
        let mut duplicate_keys_dropped = 0;

        for row in 0..table.height() {
            let line = row + 1;
            let malformed =
                |what: String| PipelineError::load(source, format!("row {}: {}", line, what));

            let country = parse_text_cell(cell(countries, row))
                .ok_or_else(|| malformed("empty country".to_string()))?;

            let year = match parse_year_cell(cell(years, row)) {
                ParsedCell::Value(y) => y,
                _ => {
                    return Err(malformed(format!(
                        "invalid year {:?}",
                        cell(years, row).unwrap_or("")
                    )));
                }
            };

            let urban_population = match parse_numeric_cell(cell(populations, row)) {
                ParsedCell::Value(v) if v >= 0.0 => Some(v),
                ParsedCell::Missing => None,
                _ => {
                    return Err(malformed(format!(
                        "invalid urban population {:?}",
                        cell(populations, row).unwrap_or("")
                    )));
                }
            };

            let pm25 = match parse_numeric_cell(cell(pm25s, row)) {
                ParsedCell::Value(v) if v < 0.0 => {
                    negative_pm25 += 1;
                    None
                }
                ParsedCell::Value(v) => Some(v),
                ParsedCell::Missing => None,
                ParsedCell::Invalid => {
                    return Err(malformed(format!(
                        "invalid pm25 {:?}",
                        cell(pm25s, row).unwrap_or("")
                    )));
                }
            };

            let mut record = Record::new(country, year)
                .with_pm25(pm25)
                .with_urban_population(urban_population);
            record.region = parse_text_cell(cell(regions, row));
            record.settlement = parse_text_cell(cell(settlements, row));

            if !seen.insert((record.series_key(), year)) {
                duplicate_keys_dropped += 1;
                continue;
            }

            record.missing.pm25 = pm25.is_none();
            record.missing.urban_population = urban_population.is_none();
            if record.missing.pm25 {
                record.pm25_status = ImputationStatus::Unresolved;
            }
            if record.missing.urban_population {
                record.urban_population_status = ImputationStatus::Unresolved;
            }
            records.push(record);
        }

        if negative_pm25 > 0 {
            warn!("{} negative pm25 readings treated as missing", negative_pm25);
        }
        if duplicate_keys_dropped > 0 {
            warn!(
                "{} rows dropped with a duplicate (series, year) key",
                duplicate_keys_dropped
            );
        }

        let report = LoadReport {
            source: source.to_string(),
            format,
            rows_read: table.height(),
            columns: table.columns().to_vec(),
            schema,
            negative_pm25,
            duplicate_keys_dropped,
        };
        Ok((Dataset::new(records), report))
    }
}

fn field_cells<'a>(
    table: &'a RawTable,
    schema: &ColumnSchema,
    field: Field,
) -> Option<&'a [Option<String>]> {
    schema.column(field).and_then(|name| table.column(name))
}

fn cell(cells: Option<&[Option<String>]>, row: usize) -> Option<&str> {
    cells.and_then(|c| c[row].as_deref())
}

#[cfg(test)]
mod tests {
    use super::*;

    fn table(csv: &str) -> RawTable {
        DataLoader::parse_bytes(csv.as_bytes().to_vec(), "inline.csv", SourceFormat::Csv)
            .unwrap()
    }

    #[test]
    fn test_detect_format() {
        assert_eq!(SourceFormat::detect("data/pm25.json"), SourceFormat::Json);
        assert_eq!(SourceFormat::detect("data/pm25.CSV"), SourceFormat::Csv);
        assert_eq!(
            SourceFormat::detect("https://host/api/pm25.json?x=1"),
            SourceFormat::Json
        );
        assert_eq!(SourceFormat::detect("no_extension"), SourceFormat::Csv);
    }

    #[test]
    fn test_to_dataset_builds_records_and_mask() {
        let table = table(
            "country,year,urban_population,pm25\n\
             CountryA,2010,1000,\n\
             CountryA,2011,1010,20\n\
             CountryA,2012,,22\n",
        );
        let (dataset, report) =
            DataLoader::to_dataset(&table, "inline.csv", SourceFormat::Csv).unwrap();

        assert_eq!(dataset.len(), 3);
        assert_eq!(report.rows_read, 3);
        let first = &dataset.records[0];
        assert_eq!(first.pm25, None);
        assert!(first.missing.pm25);
        assert_eq!(first.pm25_status, ImputationStatus::Unresolved);
        assert!(!first.missing.urban_population);
        assert!(dataset.records[2].missing.urban_population);
        assert_eq!(dataset.records[1].pm25, Some(20.0));
    }

    #[test]
    fn test_to_dataset_missing_column_is_schema_error() {
        let table = table("country,year,pm25\nA,2010,1\n");
        let err = DataLoader::to_dataset(&table, "inline.csv", SourceFormat::Csv).unwrap_err();
        assert_eq!(err.error_code(), "SCHEMA_ERROR");
        assert!(err.to_string().contains("urban_population"));
    }

    #[test]
    fn test_to_dataset_malformed_year_is_load_error() {
        let table = table("country,year,urban_population,pm25\nA,twenty,1,1\n");
        let err = DataLoader::to_dataset(&table, "inline.csv", SourceFormat::Csv).unwrap_err();
        assert_eq!(err.error_code(), "LOAD_ERROR");
        assert!(err.to_string().contains("row 1"));
    }

    #[test]
    fn test_to_dataset_negative_pm25_becomes_missing() {
        let table = table("country,year,urban_population,pm25\nA,2010,1,-4\n");
        let (dataset, report) =
            DataLoader::to_dataset(&table, "inline.csv", SourceFormat::Csv).unwrap();
        assert_eq!(report.negative_pm25, 1);
        assert_eq!(dataset.records[0].pm25, None);
        assert!(dataset.records[0].missing.pm25);
    }

    #[test]
    fn test_to_dataset_drops_duplicate_keys() {
        let table = table(
            "country,year,urban_population,pm25\n\
             A,2010,1,10\n\
             A,2010,1,99\n",
        );
        let (dataset, report) =
            DataLoader::to_dataset(&table, "inline.csv", SourceFormat::Csv).unwrap();
        assert_eq!(dataset.len(), 1);
        assert_eq!(dataset.records[0].pm25, Some(10.0));
        assert_eq!(report.duplicate_keys_dropped, 1);
    }

    #[test]
    fn test_settlement_distinguishes_series() {
        let table = table(
            "Location,Period,Dim1,Population,FactValueNumeric\n\
             Chad,2010,Urban,5,40\n\
             Chad,2010,Total,9,35\n",
        );
        let (dataset, report) =
            DataLoader::to_dataset(&table, "who.csv", SourceFormat::Csv).unwrap();
        assert_eq!(dataset.len(), 2);
        assert_eq!(report.duplicate_keys_dropped, 0);
        assert_eq!(dataset.records[0].settlement.as_deref(), Some("Urban"));
    }

    #[test]
    fn test_load_missing_file() {
        let err = DataLoader::load("definitely/not/here.csv").unwrap_err();
        assert_eq!(err.error_code(), "LOAD_ERROR");
    }
}
