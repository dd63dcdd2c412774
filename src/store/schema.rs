//! Record descriptors and table DDL for the reference store.
//!
//! GeoNames dumps are headerless and positional, so every file shape gets an
//! explicit descriptor. The loader checks each line against it before any
//! value is parsed.

use regex::Regex;
use std::sync::OnceLock;

use super::StoreError;

/// Table receiving administrative-division labels.
pub const ADMIN_CODES_TABLE: &str = "admin_codes";

/// Table receiving multilingual alternate names.
pub const ALTERNATE_NAMES_TABLE: &str = "alternate_names";

/// Prefix for place tables derived from the source file name.
pub const PLACE_TABLE_PREFIX: &str = "geoname_";

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ColumnType {
    Integer,
    Float,
    Text,
    /// GeoNames flag column: `1` is true, empty or `0` is false.
    Flag,
}

impl ColumnType {
    fn sql(&self) -> &'static str {
        match self {
            ColumnType::Integer => "BIGINT",
            ColumnType::Float => "DOUBLE PRECISION",
            ColumnType::Text => "TEXT",
            ColumnType::Flag => "BOOLEAN",
        }
    }
}

#[derive(Debug, Clone, Copy)]
pub struct Column {
    pub name: &'static str,
    pub kind: ColumnType,
    pub required: bool,
}

impl Column {
    pub const fn required(name: &'static str, kind: ColumnType) -> Self {
        Self {
            name,
            kind,
            required: true,
        }
    }

    pub const fn new(name: &'static str, kind: ColumnType) -> Self {
        Self {
            name,
            kind,
            required: false,
        }
    }
}

/// Positional layout of one source file shape.
#[derive(Debug)]
pub struct RecordSchema {
    pub name: &'static str,
    pub version: u16,
    pub columns: &'static [Column],
    /// Shorter lines accepted for legacy dumps; trailing columns default.
    pub min_columns: usize,
}

impl RecordSchema {
    pub fn width(&self) -> usize {
        self.columns.len()
    }

    pub fn accepts(&self, found: usize) -> bool {
        found >= self.min_columns && found <= self.width()
    }

    pub fn column_names(&self) -> Vec<&'static str> {
        self.columns.iter().map(|c| c.name).collect()
    }

    pub fn create_table_sql(&self, table: &str) -> String {
        let columns = self
            .columns
            .iter()
            .map(|c| {
                if c.required {
                    format!("{} {} NOT NULL", c.name, c.kind.sql())
                } else {
                    format!("{} {}", c.name, c.kind.sql())
                }
            })
            .collect::<Vec<_>>()
            .join(", ");

        format!("CREATE TABLE IF NOT EXISTS {table} ({columns})")
    }

    /// Multi-row `INSERT` with `$n` placeholders for `rows` records.
    pub fn insert_sql(&self, table: &str, rows: usize) -> String {
        let width = self.width();
        let values = (0..rows)
            .map(|row| {
                let params = (1..=width)
                    .map(|col| format!("${}", row * width + col))
                    .collect::<Vec<_>>()
                    .join(", ");
                format!("({params})")
            })
            .collect::<Vec<_>>()
            .join(", ");

        format!(
            "INSERT INTO {table} ({}) VALUES {values}",
            self.column_names().join(", ")
        )
    }
}

pub static PLACE_SCHEMA: RecordSchema = RecordSchema {
    name: "geoname",
    version: 1,
    columns: &[
        Column::required("geonameid", ColumnType::Integer),
        Column::new("name", ColumnType::Text),
        Column::new("asciiname", ColumnType::Text),
        Column::new("alternatenames", ColumnType::Text),
        Column::new("latitude", ColumnType::Float),
        Column::new("longitude", ColumnType::Float),
        Column::new("feature_class", ColumnType::Text),
        Column::new("feature_code", ColumnType::Text),
        Column::new("country_code", ColumnType::Text),
        Column::new("cc2", ColumnType::Text),
        Column::new("admin1_code", ColumnType::Text),
        Column::new("admin2_code", ColumnType::Text),
        Column::new("admin3_code", ColumnType::Text),
        Column::new("admin4_code", ColumnType::Text),
        Column::new("population", ColumnType::Integer),
        Column::new("elevation", ColumnType::Integer),
        Column::new("dem", ColumnType::Text),
        Column::new("timezone", ColumnType::Text),
        Column::new("modification_date", ColumnType::Text),
    ],
    min_columns: 19,
};

pub static ADMIN_LABEL_SCHEMA: RecordSchema = RecordSchema {
    name: "admin_code",
    version: 1,
    columns: &[
        Column::required("concat_codes", ColumnType::Text),
        Column::new("name", ColumnType::Text),
        Column::new("asciiname", ColumnType::Text),
        Column::new("geonameid", ColumnType::Integer),
    ],
    min_columns: 4,
};

pub static ALTERNATE_NAME_SCHEMA: RecordSchema = RecordSchema {
    name: "alternate_name",
    version: 2,
    columns: &[
        Column::required("alternate_name_id", ColumnType::Integer),
        Column::required("geonameid", ColumnType::Integer),
        Column::new("isolanguage", ColumnType::Text),
        Column::new("alternate_name", ColumnType::Text),
        Column::new("is_preferred_name", ColumnType::Flag),
        Column::new("is_short_name", ColumnType::Flag),
        Column::new("is_colloquial", ColumnType::Flag),
        Column::new("is_historic", ColumnType::Flag),
        Column::new("valid_from", ColumnType::Text),
        Column::new("valid_to", ColumnType::Text),
    ],
    min_columns: 4,
};

fn identifier_pattern() -> &'static Regex {
    static PATTERN: OnceLock<Regex> = OnceLock::new();
    PATTERN.get_or_init(|| {
        Regex::new(r"^[a-z_][a-z0-9_]{0,62}$").expect("identifier pattern is valid")
    })
}

/// Table names are interpolated into SQL, so only plain lowercase identifiers pass.
pub fn validate_identifier(name: &str) -> Result<&str, StoreError> {
    if identifier_pattern().is_match(name) {
        Ok(name)
    } else {
        Err(StoreError::InvalidIdentifier(name.to_string()))
    }
}

/// Derive the place table name from a source file stem,
/// e.g. `cities15000` becomes `geoname_cities15000`.
pub fn place_table_name(file_stem: &str) -> Result<String, StoreError> {
    let stem: String = file_stem
        .to_lowercase()
        .chars()
        .map(|c| if c.is_ascii_alphanumeric() { c } else { '_' })
        .collect();

    let table = format!("{PLACE_TABLE_PREFIX}{stem}");
    validate_identifier(&table)?;
    Ok(table)
}
