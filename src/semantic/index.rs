//! In-memory embedding index with cosine similarity search.
//!
//! Entries are addressed by position. Position `i` always refers to the
//! `i`-th distinct text handed to `build`, for as long as the index lives.
//! There is no incremental update: new data means building a new index.

use indicatif::{ProgressBar, ProgressStyle};
use std::collections::HashSet;

use super::embeddings::{Embedder, EmbeddingError};

/// Search result from the embedding index.
#[derive(Debug, Clone, PartialEq)]
pub struct SearchHit {
    /// Position of the matched entry
    pub position: usize,
    /// Cosine similarity score, within [-1.0, 1.0]
    pub score: f32,
}

/// Errors that can occur during index operations.
#[derive(Debug, thiserror::Error)]
pub enum IndexError {
    #[error("Dimension mismatch: expected {expected}, got {got}")]
    DimensionMismatch { expected: usize, got: usize },

    #[error("Cannot store or search with zero-norm vector")]
    ZeroNormVector,

    #[error("Index capacity exceeded: limit {limit}, requested {requested}")]
    CapacityExceeded { limit: usize, requested: usize },

    #[error("Embedder returned {got} vectors for {expected} texts")]
    BatchSizeMismatch { expected: usize, got: usize },

    #[error("Embedding error: {0}")]
    Embedding(#[from] EmbeddingError),
}

/// Positional table of distinct texts and their embeddings.
#[derive(Debug)]
pub struct EmbeddingIndex {
    texts: Vec<String>,
    vectors: Vec<Vec<f32>>,
    norms: Vec<f32>,
    dimensions: usize,
    max_entries: Option<usize>,
}

/// Remove exact duplicates, keeping the first occurrence of each string.
pub fn distinct_texts<'a, I>(texts: I) -> Vec<String>
where
    I: IntoIterator<Item = &'a str>,
{
    let mut seen = HashSet::new();
    texts
        .into_iter()
        .filter(|text| seen.insert(*text))
        .map(str::to_string)
        .collect()
}

impl EmbeddingIndex {
    /// Create an empty index for vectors of `dimensions` length.
    pub fn new(dimensions: usize, max_entries: Option<usize>) -> Self {
        Self {
            texts: Vec::new(),
            vectors: Vec::new(),
            norms: Vec::new(),
            dimensions,
            max_entries,
        }
    }

    /// Encode every distinct text with `embedder` and index it.
    ///
    /// `texts` must already be de-duplicated; see [`distinct_texts`].
    pub fn build(
        texts: Vec<String>,
        embedder: &dyn Embedder,
        batch_size: usize,
        max_entries: Option<usize>,
        show_progress: bool,
    ) -> Result<Self, IndexError> {
        if let Some(limit) = max_entries {
            if texts.len() > limit {
                return Err(IndexError::CapacityExceeded {
                    limit,
                    requested: texts.len(),
                });
            }
        }

        let mut index = Self::new(embedder.dimensions(), max_entries);
        index.texts.reserve(texts.len());
        index.vectors.reserve(texts.len());
        index.norms.reserve(texts.len());

        let progress = if show_progress {
            let bar = ProgressBar::new(texts.len() as u64);
            if let Ok(style) =
                ProgressStyle::with_template("{msg} [{bar:40}] {pos}/{len} ({eta})")
            {
                bar.set_style(style.progress_chars("=> "));
            }
            bar.set_message("Embedding names");
            bar
        } else {
            ProgressBar::hidden()
        };

        for chunk in texts.chunks(batch_size.max(1)) {
            let embeddings = embedder.embed_batch(chunk)?;
            if embeddings.len() != chunk.len() {
                return Err(IndexError::BatchSizeMismatch {
                    expected: chunk.len(),
                    got: embeddings.len(),
                });
            }

            for (text, embedding) in chunk.iter().zip(embeddings) {
                index.push(text.clone(), embedding)?;
            }
            progress.inc(chunk.len() as u64);
        }

        progress.finish_and_clear();
        Ok(index)
    }

    /// Append one entry and return its position.
    pub fn push(&mut self, text: String, embedding: Vec<f32>) -> Result<usize, IndexError> {
        if embedding.len() != self.dimensions {
            return Err(IndexError::DimensionMismatch {
                expected: self.dimensions,
                got: embedding.len(),
            });
        }

        if let Some(limit) = self.max_entries {
            if self.texts.len() >= limit {
                return Err(IndexError::CapacityExceeded {
                    limit,
                    requested: self.texts.len() + 1,
                });
            }
        }

        let norm = Self::l2_norm(&embedding);
        if norm < f32::EPSILON {
            return Err(IndexError::ZeroNormVector);
        }

        self.texts.push(text);
        self.vectors.push(embedding);
        self.norms.push(norm);

        Ok(self.texts.len() - 1)
    }

    /// Get the expected embedding dimensions.
    pub fn dimensions(&self) -> usize {
        self.dimensions
    }

    /// Get the number of entries in the index.
    pub fn len(&self) -> usize {
        self.texts.len()
    }

    /// Check if the index is empty.
    pub fn is_empty(&self) -> bool {
        self.texts.is_empty()
    }

    pub fn max_entries(&self) -> Option<usize> {
        self.max_entries
    }

    /// Text stored at `position`.
    pub fn text(&self, position: usize) -> Option<&str> {
        self.texts.get(position).map(String::as_str)
    }

    /// Embedding stored at `position`.
    #[cfg(test)]
    pub(crate) fn vector(&self, position: usize) -> Option<&[f32]> {
        self.vectors.get(position).map(Vec::as_slice)
    }

    /// Return the `limit` entries most similar to `query`, highest score first.
    ///
    /// Equal scores keep index order.
    pub fn search(&self, query: &[f32], limit: usize) -> Result<Vec<SearchHit>, IndexError> {
        if query.len() != self.dimensions {
            return Err(IndexError::DimensionMismatch {
                expected: self.dimensions,
                got: query.len(),
            });
        }

        let query_norm = Self::l2_norm(query);
        if query_norm < f32::EPSILON {
            return Err(IndexError::ZeroNormVector);
        }

        let mut hits: Vec<SearchHit> = self
            .vectors
            .iter()
            .zip(self.norms.iter())
            .enumerate()
            .map(|(position, (vector, norm))| SearchHit {
                position,
                score: Self::cosine_similarity(query, vector, query_norm, *norm),
            })
            .collect();

        // Sort by score descending
        hits.sort_by(|a, b| {
            b.score
                .partial_cmp(&a.score)
                .unwrap_or(std::cmp::Ordering::Equal)
        });
        hits.truncate(limit);

        Ok(hits)
    }

    /// Compute L2 norm of a vector.
    fn l2_norm(v: &[f32]) -> f32 {
        v.iter().map(|x| x * x).sum::<f32>().sqrt()
    }

    /// Cosine similarity with precomputed norms, clamped against rounding drift.
    fn cosine_similarity(query: &[f32], target: &[f32], query_norm: f32, target_norm: f32) -> f32 {
        let dot_product: f32 = query.iter().zip(target.iter()).map(|(a, b)| a * b).sum();
        (dot_product / (query_norm * target_norm)).clamp(-1.0, 1.0)
    }
}
