//! Shared fixtures: a deterministic stub embedder, a static store and
//! GeoNames-shaped sample lines.

use std::path::{Path, PathBuf};
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};

use crate::config::{CityViewConfig, DbConfig};
use crate::semantic::{Embedder, EmbeddingError};
use crate::store::{
    RecordSchema, ReferenceStore, ResolvedCityRow, SqlStore, SqlValue, StoreError,
};

/// Character-trigram hashing embedder.
///
/// Strings sharing trigrams point in similar directions, strings with no
/// trigrams in common are (almost always) orthogonal. Deterministic.
pub struct TrigramEmbedder {
    dimensions: usize,
    calls: AtomicUsize,
}

impl TrigramEmbedder {
    pub fn new(dimensions: usize) -> Self {
        Self {
            dimensions,
            calls: AtomicUsize::new(0),
        }
    }

    /// Number of embed / embed_batch calls so far.
    pub fn calls(&self) -> usize {
        self.calls.load(Ordering::SeqCst)
    }

    fn fnv1a(bytes: &[u8]) -> u64 {
        bytes.iter().fold(0xcbf29ce484222325, |hash, b| {
            (hash ^ *b as u64).wrapping_mul(0x100000001b3)
        })
    }

    fn vectorize(&self, text: &str) -> Vec<f32> {
        let padded: Vec<char> = format!("  {}  ", text.to_lowercase()).chars().collect();
        let mut vector = vec![0.0; self.dimensions];

        for window in padded.windows(3) {
            let trigram: String = window.iter().collect();
            let bucket = Self::fnv1a(trigram.as_bytes()) as usize % self.dimensions;
            vector[bucket] += 1.0;
        }

        vector
    }
}

impl Default for TrigramEmbedder {
    fn default() -> Self {
        Self::new(1024)
    }
}

impl Embedder for TrigramEmbedder {
    fn name(&self) -> &str {
        "trigram-stub"
    }

    fn dimensions(&self) -> usize {
        self.dimensions
    }

    fn embed(&self, text: &str) -> Result<Vec<f32>, EmbeddingError> {
        self.calls.fetch_add(1, Ordering::SeqCst);
        Ok(self.vectorize(text))
    }

    fn embed_batch(&self, texts: &[String]) -> Result<Vec<Vec<f32>>, EmbeddingError> {
        self.calls.fetch_add(1, Ordering::SeqCst);
        Ok(texts.iter().map(|t| self.vectorize(t)).collect())
    }
}

/// Store serving a fixed, replaceable set of consolidated rows.
#[derive(Default)]
pub struct StaticStore {
    rows: Mutex<Vec<ResolvedCityRow>>,
    fail: Mutex<bool>,
}

impl StaticStore {
    pub fn new(rows: Vec<ResolvedCityRow>) -> Self {
        Self {
            rows: Mutex::new(rows),
            fail: Mutex::new(false),
        }
    }

    pub fn replace_rows(&self, rows: Vec<ResolvedCityRow>) {
        *self.rows.lock().unwrap() = rows;
    }

    pub fn set_failing(&self, fail: bool) {
        *self.fail.lock().unwrap() = fail;
    }
}

impl ReferenceStore for StaticStore {
    fn ensure_table(&self, _: &RecordSchema, _: &str) -> Result<(), StoreError> {
        Ok(())
    }

    fn append(&self, _: &RecordSchema, _: &str, rows: &[Vec<SqlValue>]) -> Result<u64, StoreError> {
        Ok(rows.len() as u64)
    }

    fn resolved_cities(&self) -> Result<Vec<ResolvedCityRow>, StoreError> {
        if *self.fail.lock().unwrap() {
            return Err(StoreError::Query(sqlx::Error::PoolClosed));
        }
        Ok(self.rows.lock().unwrap().clone())
    }

    fn count(&self, _: &str) -> Result<u64, StoreError> {
        Ok(self.rows.lock().unwrap().len() as u64)
    }
}

pub fn city(
    geonameid: i64,
    name: &str,
    region: Option<&str>,
    country_code: &str,
    alternatenames: &str,
) -> ResolvedCityRow {
    ResolvedCityRow {
        geonameid,
        name: name.to_string(),
        region: region.map(str::to_string),
        country_code: country_code.to_string(),
        alternatenames: alternatenames.to_string(),
    }
}

pub fn sample_cities() -> Vec<ResolvedCityRow> {
    vec![
        city(
            524901,
            "Moscow",
            Some("Moscow"),
            "RU",
            "Moscow,Moskau,Moskva,Москва",
        ),
        city(
            498817,
            "Saint Petersburg",
            Some("St.-Petersburg"),
            "RU",
            "Saint Petersburg,Sankt-Peterburg,Санкт-Петербург",
        ),
        city(
            5128581,
            "New York City",
            Some("New York"),
            "US",
            "New York City,NYC,Big Apple",
        ),
        city(2643743, "London", Some("England"), "GB", "London,Londres,Лондон"),
    ]
}

/// Tab-joined place line with the 19 GeoNames columns.
pub fn place_line(
    geonameid: i64,
    name: &str,
    alternatenames: &str,
    country_code: &str,
    admin1_code: &str,
    population: i64,
) -> String {
    [
        geonameid.to_string(),
        name.to_string(),
        name.to_string(),
        alternatenames.to_string(),
        "40.71427".to_string(),
        "-74.00597".to_string(),
        "P".to_string(),
        "PPL".to_string(),
        country_code.to_string(),
        String::new(),
        admin1_code.to_string(),
        String::new(),
        String::new(),
        String::new(),
        population.to_string(),
        String::new(),
        "10".to_string(),
        "UTC".to_string(),
        "2024-01-01".to_string(),
    ]
    .join("\t")
}

pub fn write_file(dir: &Path, name: &str, lines: &[String]) -> PathBuf {
    let path = dir.join(name);
    let mut content = lines.join("\n");
    content.push('\n');
    std::fs::write(&path, content).unwrap();
    path
}

pub fn sqlite_store() -> SqlStore {
    SqlStore::connect(&DbConfig::sqlite_memory(), CityViewConfig::default()).unwrap()
}

pub fn shared(store: SqlStore) -> Arc<dyn ReferenceStore> {
    Arc::new(store)
}
