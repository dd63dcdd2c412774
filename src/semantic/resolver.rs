//! Fuzzy multilingual city-name resolution.
//!
//! `CitySearch` owns the consolidated city rows and the embedding index built
//! from their alternate names. The lifecycle is explicit:
//! - `new` creates an unbuilt resolver; `resolve` fails until `build` runs
//! - `build` / `rebuild` reload rows from the store and re-encode everything
//! - between rebuilds rows and index are read-only, so `resolve(&self)` can be
//!   called from several threads

use chrono::{DateTime, Utc};
use serde::Serialize;
use std::collections::{HashMap, HashSet};
use std::sync::Arc;
use std::time::{Duration, Instant};

use crate::config::SearchConfig;
use crate::semantic::embeddings::{Embedder, EmbeddingError};
use crate::semantic::index::{distinct_texts, EmbeddingIndex, IndexError};
use crate::store::{ReferenceStore, ResolvedCityRow, StoreError};

/// Errors that can occur during city resolution.
#[derive(Debug, thiserror::Error)]
pub enum ResolveError {
    #[error("Index not initialized: build the index before resolving")]
    NotInitialized,

    #[error("Index is empty: no cities were available when it was built")]
    EmptyIndex,

    #[error("Invalid input: {0}")]
    InvalidInput(String),

    #[error("Embedding error: {0}")]
    Embedding(#[from] EmbeddingError),

    #[error("Index error: {0}")]
    Index(#[from] IndexError),

    #[error("Store error: {0}")]
    Store(#[from] StoreError),
}

/// One resolved city, ready for presentation.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct CityMatch {
    pub geonameid: i64,
    pub name: String,
    pub region: Option<String>,
    pub country: String,
    /// Cosine similarity rounded to two decimals
    pub score: f32,
}

/// Size and provenance of the current index.
#[derive(Debug, Clone, Serialize)]
pub struct IndexStats {
    pub model: String,
    pub rows: usize,
    pub entries: usize,
    pub dimensions: usize,
    pub max_entries: Option<usize>,
    pub built_at: DateTime<Utc>,
    pub build_time_ms: u128,
}

/// Build settings for the resolver.
#[derive(Debug, Clone)]
pub struct ResolverOptions {
    pub batch_size: usize,
    pub max_entries: Option<usize>,
    pub show_progress: bool,
}

impl Default for ResolverOptions {
    fn default() -> Self {
        Self::from(&SearchConfig::default())
    }
}

impl From<&SearchConfig> for ResolverOptions {
    fn from(config: &SearchConfig) -> Self {
        Self {
            batch_size: config.batch_size,
            max_entries: config.max_index_entries,
            show_progress: config.show_progress,
        }
    }
}

struct ResolverState {
    rows: Vec<ResolvedCityRow>,
    index: EmbeddingIndex,
    /// Index position -> rows sharing that embedding text
    rows_by_entry: Vec<Vec<usize>>,
    built_at: DateTime<Utc>,
    build_time: Duration,
}

pub struct CitySearch {
    store: Arc<dyn ReferenceStore>,
    embedder: Arc<dyn Embedder>,
    options: ResolverOptions,
    state: Option<ResolverState>,
}

/// Text a row is indexed under: its alternate names, or its own name when it has none.
fn embedding_text(row: &ResolvedCityRow) -> &str {
    if row.alternatenames.is_empty() {
        row.name.as_str()
    } else {
        row.alternatenames.as_str()
    }
}

fn round_score(score: f32) -> f32 {
    (score * 100.0).round() / 100.0
}

impl CitySearch {
    /// Create an unbuilt resolver. Call [`CitySearch::build`] before resolving.
    pub fn new(
        store: Arc<dyn ReferenceStore>,
        embedder: Arc<dyn Embedder>,
        options: ResolverOptions,
    ) -> Self {
        Self {
            store,
            embedder,
            options,
            state: None,
        }
    }

    /// Create a resolver and build its index immediately.
    pub fn open(
        store: Arc<dyn ReferenceStore>,
        embedder: Arc<dyn Embedder>,
        options: ResolverOptions,
    ) -> Result<Self, ResolveError> {
        let mut search = Self::new(store, embedder, options);
        search.build()?;
        Ok(search)
    }

    /// Load the consolidated rows and encode their distinct alternate names.
    ///
    /// A no-op if the index is already built; use [`CitySearch::rebuild`] to refresh.
    pub fn build(&mut self) -> Result<(), ResolveError> {
        if self.state.is_some() {
            return Ok(());
        }
        self.state = Some(self.do_build()?);
        Ok(())
    }

    /// Discard the current rows and index and build both from scratch.
    ///
    /// On failure the resolver is left unbuilt.
    pub fn rebuild(&mut self) -> Result<(), ResolveError> {
        self.state = None;
        self.build()
    }

    pub fn is_initialized(&self) -> bool {
        self.state.is_some()
    }

    /// Index statistics, `None` before the first build.
    pub fn stats(&self) -> Option<IndexStats> {
        self.state.as_ref().map(|state| IndexStats {
            model: self.embedder.name().to_string(),
            rows: state.rows.len(),
            entries: state.index.len(),
            dimensions: state.index.dimensions(),
            max_entries: state.index.max_entries(),
            built_at: state.built_at,
            build_time_ms: state.build_time.as_millis(),
        })
    }

    /// Consolidated rows behind the current index.
    pub fn rows(&self) -> Result<&[ResolvedCityRow], ResolveError> {
        self.state
            .as_ref()
            .map(|state| state.rows.as_slice())
            .ok_or(ResolveError::NotInitialized)
    }

    /// Find the cities whose names best match `query_name`.
    ///
    /// Takes the `top_k` nearest index entries, expands each to every city
    /// sharing that entry, drops repeated (geonameid, name) pairs and keeps at
    /// most `top_k` results. Dropping happens after the nearest-entry cut, so
    /// fewer than `top_k` results can come back.
    pub fn resolve(&self, query_name: &str, top_k: usize) -> Result<Vec<CityMatch>, ResolveError> {
        let state = self.state.as_ref().ok_or(ResolveError::NotInitialized)?;

        let query = query_name.trim();
        if query.is_empty() {
            return Err(ResolveError::InvalidInput(
                "query name must not be empty".to_string(),
            ));
        }
        if top_k == 0 {
            return Err(ResolveError::InvalidInput(
                "top_k must be greater than 0".to_string(),
            ));
        }
        if state.index.is_empty() {
            return Err(ResolveError::EmptyIndex);
        }

        let query_embedding = self.embedder.embed(query)?;
        let hits = state.index.search(&query_embedding, top_k)?;
        if let Some(best) = hits.first() {
            log::debug!(
                "{query:?}: nearest name {:?} scored {:.3}",
                state.index.text(best.position).unwrap_or_default(),
                best.score
            );
        }

        let mut seen: HashSet<(i64, &str)> = HashSet::new();
        let mut matches = Vec::with_capacity(top_k);

        for hit in hits {
            for &row_idx in &state.rows_by_entry[hit.position] {
                let row = &state.rows[row_idx];
                if !seen.insert((row.geonameid, row.name.as_str())) {
                    continue;
                }

                matches.push(CityMatch {
                    geonameid: row.geonameid,
                    name: row.name.clone(),
                    region: row.region.clone(),
                    country: row.country_code.clone(),
                    score: round_score(hit.score),
                });
            }
        }

        matches.truncate(top_k);
        log::debug!("resolved {query:?} to {} matches", matches.len());

        Ok(matches)
    }

    fn do_build(&self) -> Result<ResolverState, ResolveError> {
        let _span = tracing::info_span!("build_index", model = self.embedder.name()).entered();
        let now = Instant::now();
        let rows: Vec<ResolvedCityRow> = self
            .store
            .resolved_cities()?
            .into_iter()
            .filter(|row| !embedding_text(row).is_empty())
            .collect();

        let keys: Vec<&str> = rows.iter().map(embedding_text).collect();
        let texts = distinct_texts(keys.iter().copied());

        let rows_by_entry = {
            let positions: HashMap<&str, usize> = texts
                .iter()
                .enumerate()
                .map(|(position, text)| (text.as_str(), position))
                .collect();

            let mut rows_by_entry = vec![Vec::new(); texts.len()];
            for (row_idx, key) in keys.iter().enumerate() {
                if let Some(&position) = positions.get(key) {
                    rows_by_entry[position].push(row_idx);
                }
            }
            rows_by_entry
        };

        log::info!(
            "Building embedding index: {} cities, {} distinct names, model '{}'",
            rows.len(),
            texts.len(),
            self.embedder.name()
        );

        let index = EmbeddingIndex::build(
            texts,
            self.embedder.as_ref(),
            self.options.batch_size,
            self.options.max_entries,
            self.options.show_progress,
        )?;

        let build_time = now.elapsed();
        log::info!("Embedding index ready in {:?}", build_time);

        Ok(ResolverState {
            rows,
            index,
            rows_by_entry,
            built_at: Utc::now(),
            build_time,
        })
    }
}
