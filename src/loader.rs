//! Bulk loading of GeoNames tab-delimited dumps into the reference store.
//!
//! Files have no header and no quoting. Every line is checked against the
//! record descriptor before parsing; the first bad line aborts the file.
//! Rows are appended in batches without a surrounding transaction, so rows
//! from batches that were already written remain after a failure.

use serde::Serialize;
use std::fs::File;
use std::io::Read;
use std::path::Path;
use std::time::Instant;

use crate::store::schema::{place_table_name, ADMIN_CODES_TABLE, ALTERNATE_NAMES_TABLE};
use crate::store::{
    AdminRegionLabel, AlternateName, FieldError, Place, Record, ReferenceStore, SqlValue,
    StoreError,
};

#[derive(Debug, thiserror::Error)]
pub enum LoadError {
    #[error("io error: {0}")]
    Io(#[from] std::io::Error),

    #[error("malformed input: {0}")]
    Csv(#[from] csv::Error),

    #[error("line {line}: expected {expected} columns for {schema}, found {found}")]
    ColumnCount {
        line: u64,
        schema: &'static str,
        expected: usize,
        found: usize,
    },

    #[error("line {line}: {source}")]
    InvalidValue {
        line: u64,
        #[source]
        source: FieldError,
    },

    #[error("cannot derive a table name from {0}")]
    TableName(String),

    #[error("store error: {0}")]
    Store(#[from] StoreError),
}

/// Summary of one completed load.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct LoadReport {
    pub table: String,
    pub rows: u64,
}

pub struct Loader<'a> {
    store: &'a dyn ReferenceStore,
    batch_size: usize,
    admin_table: String,
}

impl<'a> Loader<'a> {
    pub fn new(store: &'a dyn ReferenceStore, batch_size: usize) -> Self {
        Self {
            store,
            batch_size: batch_size.max(1),
            admin_table: ADMIN_CODES_TABLE.to_string(),
        }
    }

    /// Write admin labels to `table` instead of `admin_codes`.
    pub fn with_admin_table(mut self, table: impl Into<String>) -> Self {
        self.admin_table = table.into();
        self
    }

    /// Load a place dump into `geoname_<file stem>`.
    pub fn load_places(&self, path: &Path) -> Result<LoadReport, LoadError> {
        let stem = path
            .file_stem()
            .and_then(|s| s.to_str())
            .ok_or_else(|| LoadError::TableName(path.display().to_string()))?;
        let table = place_table_name(stem)?;

        self.load_file::<Place>(path, &table)
    }

    /// Load `admin1CodesASCII.txt`-shaped labels into the admin table
    /// (`admin_codes` unless overridden).
    pub fn load_admin_codes(&self, path: &Path) -> Result<LoadReport, LoadError> {
        self.load_file::<AdminRegionLabel>(path, &self.admin_table)
    }

    /// Load an alternate-names dump into `alternate_names`.
    pub fn load_alternate_names(&self, path: &Path) -> Result<LoadReport, LoadError> {
        self.load_file::<AlternateName>(path, ALTERNATE_NAMES_TABLE)
    }

    fn load_file<R: Record>(&self, path: &Path, table: &str) -> Result<LoadReport, LoadError> {
        log::info!("Loading {} into {table}", path.display());
        let file = File::open(path)?;
        let report = self.load_reader::<R, _>(file, table)?;
        Ok(report)
    }

    /// Load records of type `R` from any reader into `table`.
    pub fn load_reader<R: Record, T: Read>(
        &self,
        reader: T,
        table: &str,
    ) -> Result<LoadReport, LoadError> {
        let now = Instant::now();
        let schema = R::schema();
        self.store.ensure_table(schema, table)?;

        let mut csv_reader = csv::ReaderBuilder::new()
            .delimiter(b'\t')
            .has_headers(false)
            .quoting(false)
            .flexible(true)
            .from_reader(reader);

        let mut batch: Vec<Vec<SqlValue>> = Vec::with_capacity(self.batch_size);
        let mut written = 0;
        let mut record = csv::StringRecord::new();
        let mut line = 0;

        while csv_reader.read_record(&mut record)? {
            line += 1;

            // Blank trailing lines are common in hand-edited dumps.
            if record.len() == 1 && record.get(0).is_some_and(|f| f.trim().is_empty()) {
                continue;
            }

            if !schema.accepts(record.len()) {
                return Err(LoadError::ColumnCount {
                    line,
                    schema: schema.name,
                    expected: schema.width(),
                    found: record.len(),
                });
            }

            let fields: Vec<&str> = record.iter().collect();
            let parsed =
                R::parse(&fields).map_err(|source| LoadError::InvalidValue { line, source })?;
            batch.push(parsed.values());

            if batch.len() >= self.batch_size {
                written += self.store.append(schema, table, &batch)?;
                log::debug!("{table}: {written} rows appended");
                batch.clear();
            }
        }

        if !batch.is_empty() {
            written += self.store.append(schema, table, &batch)?;
        }

        log::info!(
            "Loaded {written} rows into {table} in {:?}",
            now.elapsed()
        );

        Ok(LoadReport {
            table: table.to_string(),
            rows: written,
        })
    }
}
