//! Typed records for the three GeoNames file shapes.

use serde::{Deserialize, Serialize};

use super::schema::{
    RecordSchema, ADMIN_LABEL_SCHEMA, ALTERNATE_NAME_SCHEMA, PLACE_SCHEMA,
};

/// A single bindable SQL value. Empty source fields become `None`.
#[derive(Debug, Clone, PartialEq)]
pub enum SqlValue {
    Int(Option<i64>),
    Float(Option<f64>),
    Text(Option<String>),
    Flag(bool),
}

/// A field that could not be converted to its column type.
#[derive(Debug, thiserror::Error)]
#[error("column '{column}' has invalid value {value:?}: {reason}")]
pub struct FieldError {
    pub column: &'static str,
    pub value: String,
    pub reason: String,
}

/// A record with a fixed positional layout.
pub trait Record: Sized {
    fn schema() -> &'static RecordSchema;

    /// Build the record from the raw fields of one line.
    /// The caller has already checked the field count against the schema.
    fn parse(fields: &[&str]) -> Result<Self, FieldError>;

    /// Values in schema column order.
    fn values(&self) -> Vec<SqlValue>;
}

/// Positional field reader with per-column error context.
struct Fields<'a> {
    schema: &'static RecordSchema,
    fields: &'a [&'a str],
}

impl<'a> Fields<'a> {
    fn new(schema: &'static RecordSchema, fields: &'a [&'a str]) -> Self {
        Self { schema, fields }
    }

    /// Field as it appears in the file. Text columns are kept byte-exact.
    fn raw(&self, idx: usize) -> &'a str {
        self.fields.get(idx).copied().unwrap_or("")
    }

    /// Numeric and flag columns tolerate surrounding whitespace.
    fn trimmed(&self, idx: usize) -> &'a str {
        self.raw(idx).trim()
    }

    fn error(&self, idx: usize, reason: impl Into<String>) -> FieldError {
        FieldError {
            column: self.schema.columns[idx].name,
            value: self.raw(idx).to_string(),
            reason: reason.into(),
        }
    }

    fn text(&self, idx: usize) -> Option<String> {
        let raw = self.raw(idx);
        (!raw.is_empty()).then(|| raw.to_string())
    }

    fn required_text(&self, idx: usize) -> Result<String, FieldError> {
        self.text(idx).ok_or_else(|| self.error(idx, "value is required"))
    }

    fn int(&self, idx: usize) -> Result<Option<i64>, FieldError> {
        let raw = self.trimmed(idx);
        if raw.is_empty() {
            return Ok(None);
        }
        raw.parse::<i64>()
            .map(Some)
            .map_err(|e| self.error(idx, e.to_string()))
    }

    fn required_int(&self, idx: usize) -> Result<i64, FieldError> {
        self.int(idx)?
            .ok_or_else(|| self.error(idx, "value is required"))
    }

    fn float(&self, idx: usize) -> Result<Option<f64>, FieldError> {
        let raw = self.trimmed(idx);
        if raw.is_empty() {
            return Ok(None);
        }
        raw.parse::<f64>()
            .map(Some)
            .map_err(|e| self.error(idx, e.to_string()))
    }

    fn flag(&self, idx: usize) -> Result<bool, FieldError> {
        match self.trimmed(idx) {
            "" | "0" => Ok(false),
            "1" => Ok(true),
            _ => Err(self.error(idx, "expected '1', '0' or empty")),
        }
    }
}

/// One line of a GeoNames place dump (`cities15000.txt`, `RU.txt`, ...).
#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize)]
pub struct Place {
    pub geonameid: i64,
    pub name: Option<String>,
    pub asciiname: Option<String>,
    pub alternatenames: Option<String>,
    pub latitude: Option<f64>,
    pub longitude: Option<f64>,
    pub feature_class: Option<String>,
    pub feature_code: Option<String>,
    pub country_code: Option<String>,
    pub cc2: Option<String>,
    pub admin1_code: Option<String>,
    pub admin2_code: Option<String>,
    pub admin3_code: Option<String>,
    pub admin4_code: Option<String>,
    pub population: Option<i64>,
    pub elevation: Option<i64>,
    pub dem: Option<String>,
    pub timezone: Option<String>,
    pub modification_date: Option<String>,
}

impl Record for Place {
    fn schema() -> &'static RecordSchema {
        &PLACE_SCHEMA
    }

    fn parse(fields: &[&str]) -> Result<Self, FieldError> {
        let f = Fields::new(Self::schema(), fields);

        Ok(Place {
            geonameid: f.required_int(0)?,
            name: f.text(1),
            asciiname: f.text(2),
            alternatenames: f.text(3),
            latitude: f.float(4)?,
            longitude: f.float(5)?,
            feature_class: f.text(6),
            feature_code: f.text(7),
            country_code: f.text(8),
            cc2: f.text(9),
            admin1_code: f.text(10),
            admin2_code: f.text(11),
            admin3_code: f.text(12),
            admin4_code: f.text(13),
            population: f.int(14)?,
            elevation: f.int(15)?,
            dem: f.text(16),
            timezone: f.text(17),
            modification_date: f.text(18),
        })
    }

    fn values(&self) -> Vec<SqlValue> {
        vec![
            SqlValue::Int(Some(self.geonameid)),
            SqlValue::Text(self.name.clone()),
            SqlValue::Text(self.asciiname.clone()),
            SqlValue::Text(self.alternatenames.clone()),
            SqlValue::Float(self.latitude),
            SqlValue::Float(self.longitude),
            SqlValue::Text(self.feature_class.clone()),
            SqlValue::Text(self.feature_code.clone()),
            SqlValue::Text(self.country_code.clone()),
            SqlValue::Text(self.cc2.clone()),
            SqlValue::Text(self.admin1_code.clone()),
            SqlValue::Text(self.admin2_code.clone()),
            SqlValue::Text(self.admin3_code.clone()),
            SqlValue::Text(self.admin4_code.clone()),
            SqlValue::Int(self.population),
            SqlValue::Int(self.elevation),
            SqlValue::Text(self.dem.clone()),
            SqlValue::Text(self.timezone.clone()),
            SqlValue::Text(self.modification_date.clone()),
        ]
    }
}

/// One line of `admin1CodesASCII.txt`.
#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize)]
pub struct AdminRegionLabel {
    pub concat_codes: String,
    pub name: Option<String>,
    pub asciiname: Option<String>,
    pub geonameid: Option<i64>,
}

impl Record for AdminRegionLabel {
    fn schema() -> &'static RecordSchema {
        &ADMIN_LABEL_SCHEMA
    }

    fn parse(fields: &[&str]) -> Result<Self, FieldError> {
        let f = Fields::new(Self::schema(), fields);

        Ok(AdminRegionLabel {
            concat_codes: f.required_text(0)?,
            name: f.text(1),
            asciiname: f.text(2),
            geonameid: f.int(3)?,
        })
    }

    fn values(&self) -> Vec<SqlValue> {
        vec![
            SqlValue::Text(Some(self.concat_codes.clone())),
            SqlValue::Text(self.name.clone()),
            SqlValue::Text(self.asciiname.clone()),
            SqlValue::Int(self.geonameid),
        ]
    }
}

/// One line of `alternateNamesV2.txt`.
#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize)]
pub struct AlternateName {
    pub alternate_name_id: i64,
    pub geonameid: i64,
    /// ISO 639 code, optionally with a variant (`zh-CN`), or a pseudo code
    /// such as `post`, `iata`, `link`, `wkdt`.
    pub isolanguage: Option<String>,
    pub alternate_name: Option<String>,
    pub is_preferred_name: bool,
    pub is_short_name: bool,
    pub is_colloquial: bool,
    pub is_historic: bool,
    pub valid_from: Option<String>,
    pub valid_to: Option<String>,
}

impl Record for AlternateName {
    fn schema() -> &'static RecordSchema {
        &ALTERNATE_NAME_SCHEMA
    }

    fn parse(fields: &[&str]) -> Result<Self, FieldError> {
        let f = Fields::new(Self::schema(), fields);

        Ok(AlternateName {
            alternate_name_id: f.required_int(0)?,
            geonameid: f.required_int(1)?,
            isolanguage: f.text(2),
            alternate_name: f.text(3),
            is_preferred_name: f.flag(4)?,
            is_short_name: f.flag(5)?,
            is_colloquial: f.flag(6)?,
            is_historic: f.flag(7)?,
            valid_from: f.text(8),
            valid_to: f.text(9),
        })
    }

    fn values(&self) -> Vec<SqlValue> {
        vec![
            SqlValue::Int(Some(self.alternate_name_id)),
            SqlValue::Int(Some(self.geonameid)),
            SqlValue::Text(self.isolanguage.clone()),
            SqlValue::Text(self.alternate_name.clone()),
            SqlValue::Flag(self.is_preferred_name),
            SqlValue::Flag(self.is_short_name),
            SqlValue::Flag(self.is_colloquial),
            SqlValue::Flag(self.is_historic),
            SqlValue::Text(self.valid_from.clone()),
            SqlValue::Text(self.valid_to.clone()),
        ]
    }
}

/// One populous city joined with its first-level region label.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ResolvedCityRow {
    pub geonameid: i64,
    /// ASCII name of the city.
    pub name: String,
    /// ASCII name of the admin1 region, `None` when no label matches.
    pub region: Option<String>,
    pub country_code: String,
    /// Raw comma-joined alternate names, empty when the source had none.
    pub alternatenames: String,
}
