//! Semantic city-name search.
//!
//! This module resolves free-text city names to GeoNames places using
//! multilingual embeddings from fastembed-rs and an in-memory cosine index.
//!
//! # Architecture
//!
//! - `embeddings`: `Embedder` seam and the fastembed-backed model
//! - `index`: positional embedding index with top-K cosine search
//! - `resolver`: consolidated rows + index, query resolution

pub mod embeddings;
mod index;
mod resolver;

pub use embeddings::{Embedder, EmbeddingError, EmbeddingModel};
pub use index::{distinct_texts, EmbeddingIndex, IndexError, SearchHit};
pub use resolver::{CityMatch, CitySearch, IndexStats, ResolveError, ResolverOptions};
