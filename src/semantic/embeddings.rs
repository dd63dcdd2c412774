//! Multilingual sentence embeddings through fastembed.
//!
//! Place names arrive in any script, so only multilingual models are
//! accepted. Model files are downloaded into `<cache_dir>/models` on first use.

use fastembed::{InitOptions, TextEmbedding};
use std::path::PathBuf;
use std::sync::{Mutex, MutexGuard};

/// Accepted model names, with their fastembed variants.
const MULTILINGUAL_MODELS: &[(&str, fastembed::EmbeddingModel)] = &[
    (
        "paraphrase-multilingual-minilm-l12-v2",
        fastembed::EmbeddingModel::ParaphraseMLMiniLML12V2,
    ),
    (
        "paraphrase-multilingual-minilm-l12-v2-q",
        fastembed::EmbeddingModel::ParaphraseMLMiniLML12V2Q,
    ),
    (
        "paraphrase-multilingual-mpnet-base-v2",
        fastembed::EmbeddingModel::ParaphraseMLMpnetBaseV2,
    ),
    (
        "multilingual-e5-small",
        fastembed::EmbeddingModel::MultilingualE5Small,
    ),
    (
        "multilingual-e5-base",
        fastembed::EmbeddingModel::MultilingualE5Base,
    ),
    (
        "multilingual-e5-large",
        fastembed::EmbeddingModel::MultilingualE5Large,
    ),
];

/// Anything that turns text into fixed-length vectors.
///
/// The index and every query must go through the same embedder; mixing
/// models produces meaningless scores and is not detected.
pub trait Embedder: Send + Sync {
    fn name(&self) -> &str;

    fn dimensions(&self) -> usize;

    fn embed(&self, text: &str) -> Result<Vec<f32>, EmbeddingError>;

    fn embed_batch(&self, texts: &[String]) -> Result<Vec<Vec<f32>>, EmbeddingError>;
}

#[derive(Debug, thiserror::Error)]
pub enum EmbeddingError {
    #[error("failed to load embedding model: {0}")]
    ModelLoad(String),

    #[error("failed to encode text: {0}")]
    Encode(String),

    #[error("unknown embedding model '{name}', expected one of: {supported}")]
    UnknownModel { name: String, supported: String },
}

/// fastembed model behind a lock; encoding needs `&mut TextEmbedding`.
pub struct EmbeddingModel {
    model: Mutex<TextEmbedding>,
    model_name: String,
    dimensions: usize,
    batch_size: usize,
}

impl EmbeddingModel {
    pub fn new(
        model_name: &str,
        cache_dir: PathBuf,
        batch_size: usize,
        show_progress: bool,
    ) -> Result<Self, EmbeddingError> {
        let variant = Self::parse_model_name(model_name)?;

        let models_dir = cache_dir.join("models");
        std::fs::create_dir_all(&models_dir).map_err(|e| {
            EmbeddingError::ModelLoad(format!("cannot create {}: {e}", models_dir.display()))
        })?;

        log::info!("Loading embedding model '{model_name}' from {}", models_dir.display());

        let mut model = TextEmbedding::try_new(
            InitOptions::new(variant)
                .with_cache_dir(models_dir)
                .with_show_download_progress(show_progress),
        )
        .map_err(|e| EmbeddingError::ModelLoad(e.to_string()))?;

        let dimensions = model
            .embed(vec!["Moscow"], None)
            .map_err(|e| EmbeddingError::ModelLoad(e.to_string()))?
            .first()
            .map(Vec::len)
            .ok_or_else(|| EmbeddingError::ModelLoad("model produced no vector".to_string()))?;

        log::debug!("'{model_name}' produces {dimensions}-dimensional vectors");

        Ok(Self {
            model: Mutex::new(model),
            model_name: model_name.to_string(),
            dimensions,
            batch_size: batch_size.max(1),
        })
    }

    /// Case-insensitive lookup in [`MULTILINGUAL_MODELS`].
    fn parse_model_name(name: &str) -> Result<fastembed::EmbeddingModel, EmbeddingError> {
        let wanted = name.to_lowercase();
        MULTILINGUAL_MODELS
            .iter()
            .find(|(known, _)| *known == wanted)
            .map(|(_, variant)| variant.clone())
            .ok_or_else(|| EmbeddingError::UnknownModel {
                name: name.to_string(),
                supported: MULTILINGUAL_MODELS
                    .iter()
                    .map(|(known, _)| *known)
                    .collect::<Vec<_>>()
                    .join(", "),
            })
    }

    fn lock(&self) -> Result<MutexGuard<'_, TextEmbedding>, EmbeddingError> {
        self.model
            .lock()
            .map_err(|_| EmbeddingError::Encode("model lock poisoned".to_string()))
    }
}

impl Embedder for EmbeddingModel {
    fn name(&self) -> &str {
        &self.model_name
    }

    fn dimensions(&self) -> usize {
        self.dimensions
    }

    fn embed(&self, text: &str) -> Result<Vec<f32>, EmbeddingError> {
        self.lock()?
            .embed(vec![text], None)
            .map_err(|e| EmbeddingError::Encode(e.to_string()))?
            .pop()
            .ok_or_else(|| EmbeddingError::Encode(format!("no vector for {text:?}")))
    }

    fn embed_batch(&self, texts: &[String]) -> Result<Vec<Vec<f32>>, EmbeddingError> {
        if texts.is_empty() {
            return Ok(Vec::new());
        }

        self.lock()?
            .embed(texts.to_vec(), Some(self.batch_size))
            .map_err(|e| EmbeddingError::Encode(e.to_string()))
    }
}
