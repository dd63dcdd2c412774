//! `ReferenceStore` backed by sqlx's `Any` driver.
//!
//! The store owns a small tokio runtime and blocks on every query, so callers
//! see a plain synchronous API. PostgreSQL is the production target; SQLite
//! serves local runs and tests.

use sqlx::any::{AnyArguments, AnyPoolOptions, AnyRow};
use sqlx::query::Query;
use sqlx::{Any, AnyPool, Row};
use std::time::Instant;

use super::records::{ResolvedCityRow, SqlValue};
use super::schema::{validate_identifier, RecordSchema};
use super::{ReferenceStore, StoreError};
use crate::config::{CityViewConfig, DbConfig};

/// Keeps a single INSERT under both PostgreSQL's and SQLite's bind limits.
const MAX_BIND_PARAMS: usize = 32_000;

pub struct SqlStore {
    pool: AnyPool,
    view: CityViewConfig,
    runtime: tokio::runtime::Runtime,
}

impl SqlStore {
    /// Connect to the store described by `db`.
    ///
    /// `view` names the tables behind the consolidated city view; both names
    /// are validated here because they end up inside SQL text.
    pub fn connect(db: &DbConfig, view: CityViewConfig) -> Result<Self, StoreError> {
        validate_identifier(&view.place_table)?;
        validate_identifier(&view.admin_table)?;

        sqlx::any::install_default_drivers();

        let runtime = tokio::runtime::Builder::new_multi_thread()
            .worker_threads(1)
            .enable_all()
            .build()?;

        let url = db.url()?;
        log::info!("Connecting to reference store at {}", db.redacted_url());

        // An in-memory SQLite database lives and dies with its connection.
        let mut options = AnyPoolOptions::new().max_connections(db.max_connections);
        if url.starts_with("sqlite::memory:") {
            options = options.idle_timeout(None).max_lifetime(None);
        }

        let pool = runtime
            .block_on(options.connect(&url))
            .map_err(|source| StoreError::Connect {
                url: db.redacted_url(),
                source,
            })?;

        Ok(Self {
            pool,
            view,
            runtime,
        })
    }

    fn consolidation_sql(&self) -> String {
        let population_filter = match self.view.min_population {
            Some(_) => "WHERE p.population >= $1",
            None => "",
        };

        format!(
            r#"
            SELECT
              p.geonameid AS geonameid,
              p.asciiname AS name,
              r.asciiname AS region,
              p.country_code AS country_code,
              p.alternatenames AS alternatenames
            FROM {place} p
            LEFT JOIN (
              SELECT concat_codes, MIN(asciiname) AS asciiname
              FROM {admin}
              GROUP BY concat_codes
            ) r ON r.concat_codes = p.country_code || '.' || p.admin1_code
            {population_filter}
            ORDER BY p.geonameid
            "#,
            place = self.view.place_table,
            admin = self.view.admin_table,
        )
    }
}

impl Drop for SqlStore {
    fn drop(&mut self) {
        self.runtime.block_on(self.pool.close());
    }
}

fn bind_value<'q>(
    query: Query<'q, Any, AnyArguments<'q>>,
    value: &SqlValue,
) -> Query<'q, Any, AnyArguments<'q>> {
    match value {
        SqlValue::Int(v) => query.bind(*v),
        SqlValue::Float(v) => query.bind(*v),
        SqlValue::Text(v) => query.bind(v.clone()),
        SqlValue::Flag(v) => query.bind(*v),
    }
}

fn city_from_row(row: &AnyRow) -> Result<ResolvedCityRow, sqlx::Error> {
    Ok(ResolvedCityRow {
        geonameid: row.try_get("geonameid")?,
        name: row
            .try_get::<Option<String>, _>("name")?
            .unwrap_or_default(),
        region: row.try_get("region")?,
        country_code: row
            .try_get::<Option<String>, _>("country_code")?
            .unwrap_or_default(),
        alternatenames: row
            .try_get::<Option<String>, _>("alternatenames")?
            .unwrap_or_default(),
    })
}

impl ReferenceStore for SqlStore {
    fn ensure_table(&self, schema: &RecordSchema, table: &str) -> Result<(), StoreError> {
        let table = validate_identifier(table)?;
        let sql = schema.create_table_sql(table);

        self.runtime
            .block_on(sqlx::query(&sql).execute(&self.pool))?;

        log::debug!("Ensured table {table} (layout {} v{})", schema.name, schema.version);
        Ok(())
    }

    fn append(
        &self,
        schema: &RecordSchema,
        table: &str,
        rows: &[Vec<SqlValue>],
    ) -> Result<u64, StoreError> {
        let table = validate_identifier(table)?;
        let width = schema.width();

        if let Some(bad) = rows.iter().find(|row| row.len() != width) {
            return Err(StoreError::RowWidth {
                schema: schema.name,
                expected: width,
                found: bad.len(),
            });
        }

        let rows_per_statement = (MAX_BIND_PARAMS / width).max(1);
        let mut written = 0;

        // No surrounding transaction: chunks already written stay if a later one fails.
        for chunk in rows.chunks(rows_per_statement) {
            let sql = schema.insert_sql(table, chunk.len());
            let mut query = sqlx::query(&sql);
            for value in chunk.iter().flatten() {
                query = bind_value(query, value);
            }

            let result = self.runtime.block_on(query.execute(&self.pool))?;
            written += result.rows_affected();
        }

        Ok(written)
    }

    fn resolved_cities(&self) -> Result<Vec<ResolvedCityRow>, StoreError> {
        let now = Instant::now();
        let sql = self.consolidation_sql();

        let mut query = sqlx::query(&sql);
        if let Some(min_population) = self.view.min_population {
            query = query.bind(min_population);
        }

        let rows = self.runtime.block_on(query.fetch_all(&self.pool))?;
        let cities = rows
            .iter()
            .map(city_from_row)
            .collect::<Result<Vec<_>, _>>()?;

        log::info!(
            "Consolidated {} cities from {} in {:?}",
            cities.len(),
            self.view.place_table,
            now.elapsed()
        );

        Ok(cities)
    }

    fn count(&self, table: &str) -> Result<u64, StoreError> {
        let table = validate_identifier(table)?;
        let sql = format!("SELECT COUNT(*) AS total FROM {table}");

        let row = self
            .runtime
            .block_on(sqlx::query(&sql).fetch_one(&self.pool))?;
        let total: i64 = row.try_get("total")?;

        Ok(total.max(0) as u64)
    }
}
