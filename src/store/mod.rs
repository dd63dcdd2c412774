//! Relational reference store for GeoNames data.
//!
//! - `schema`: positional record descriptors and DDL
//! - `records`: typed rows for places, admin labels and alternate names
//! - `sql`: `ReferenceStore` over sqlx's `Any` driver (PostgreSQL, SQLite)

mod records;
pub mod schema;
mod sql;

pub use records::{
    AdminRegionLabel, AlternateName, FieldError, Place, Record, ResolvedCityRow, SqlValue,
};
pub use schema::RecordSchema;
pub use sql::SqlStore;

/// Errors raised by the reference store.
#[derive(Debug, thiserror::Error)]
pub enum StoreError {
    #[error("failed to connect to {url}: {source}")]
    Connect {
        url: String,
        #[source]
        source: sqlx::Error,
    },

    #[error("invalid connection settings: {0}")]
    Config(#[from] crate::config::ConfigError),

    #[error("query failed: {0}")]
    Query(#[from] sqlx::Error),

    #[error("invalid table name: {0:?}")]
    InvalidIdentifier(String),

    #[error("row has {found} values, table layout {schema} expects {expected}")]
    RowWidth {
        schema: &'static str,
        expected: usize,
        found: usize,
    },

    #[error("failed to start database runtime: {0}")]
    Runtime(#[from] std::io::Error),
}

/// Storage seam between loaders, the consolidation query and the resolver.
///
/// Every call blocks until the store answers. There is no retry; connection
/// loss surfaces as an error for the caller to handle.
pub trait ReferenceStore: Send + Sync {
    /// Create the table for `schema` under `table` if it does not exist.
    fn ensure_table(&self, schema: &RecordSchema, table: &str) -> Result<(), StoreError>;

    /// Append rows to `table`. Never upserts: re-appending duplicates rows.
    /// Returns the number of rows written.
    fn append(
        &self,
        schema: &RecordSchema,
        table: &str,
        rows: &[Vec<SqlValue>],
    ) -> Result<u64, StoreError>;

    /// Populous cities left-joined with their admin1 labels, ordered by geonameid.
    fn resolved_cities(&self) -> Result<Vec<ResolvedCityRow>, StoreError>;

    /// Number of rows currently in `table`.
    fn count(&self, table: &str) -> Result<u64, StoreError>;
}
