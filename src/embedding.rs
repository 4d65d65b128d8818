//! Text embedding backend (C6 dependency).
//!
//! Trait-based so production code embeds with fastembed-rs while tests use
//! a deterministic mock. Grounded on the teacher's
//! `adapter::embedding::Embedder` trait and `FastEmbedEmbedder`.

use std::fmt;

#[derive(Debug)]
pub enum EmbeddingError {
    EmptyResult,
    ModelError(String),
}

impl fmt::Display for EmbeddingError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            EmbeddingError::EmptyResult => write!(f, "embedding returned no results"),
            EmbeddingError::ModelError(msg) => write!(f, "embedding model error: {msg}"),
        }
    }
}

impl std::error::Error for EmbeddingError {}

/// Embeds a batch of texts, one vector per text.
pub trait Embedder: Send + Sync {
    fn embed_batch(&self, texts: &[&str]) -> Result<Vec<Vec<f32>>, EmbeddingError>;

    /// The model identifier stamped onto `thought_units.embedding_model`.
    fn model_name(&self) -> &str;
}

/// Deterministic hash-based embedder for tests: same text always yields the
/// same vector, unrelated text yields near-orthogonal vectors.
pub struct MockEmbedder {
    dimensions: usize,
}

impl MockEmbedder {
    pub fn new(dimensions: usize) -> Self {
        Self { dimensions }
    }
}

impl Default for MockEmbedder {
    fn default() -> Self {
        Self::new(32)
    }
}

impl Embedder for MockEmbedder {
    fn embed_batch(&self, texts: &[&str]) -> Result<Vec<Vec<f32>>, EmbeddingError> {
        if texts.is_empty() {
            return Ok(Vec::new());
        }
        Ok(texts.iter().map(|t| hash_embed(t, self.dimensions)).collect())
    }

    fn model_name(&self) -> &str {
        "mock-hash-embedder"
    }
}

fn hash_embed(text: &str, dims: usize) -> Vec<f32> {
    use std::collections::hash_map::DefaultHasher;
    use std::hash::{Hash, Hasher};

    let mut v = vec![0f32; dims];
    for (i, word) in text.split_whitespace().enumerate() {
        let mut hasher = DefaultHasher::new();
        word.hash(&mut hasher);
        (i as u64).hash(&mut hasher);
        let h = hasher.finish();
        let slot = (h as usize) % dims;
        v[slot] += 1.0;
    }
    let norm: f32 = v.iter().map(|x| x * x).sum::<f32>().sqrt();
    if norm > 0.0 {
        for x in v.iter_mut() {
            *x /= norm;
        }
    }
    v
}

#[cfg(feature = "embeddings")]
mod fastembed_impl {
    use super::{Embedder, EmbeddingError};
    use fastembed::{EmbeddingModel, InitOptions, TextEmbedding};
    use std::sync::Mutex;

    /// Production embedder backed by fastembed (ONNX Runtime).
    ///
    /// Wraps `TextEmbedding` in a `Mutex` since its `embed` call needs
    /// `&mut self` while `Embedder` exposes `&self`.
    pub struct FastEmbedEmbedder {
        model: Mutex<TextEmbedding>,
        model_name: String,
    }

    impl FastEmbedEmbedder {
        pub fn new(model: EmbeddingModel) -> Result<Self, EmbeddingError> {
            let name = format!("{model:?}");
            let options = InitOptions::new(model).with_show_download_progress(false);
            let embedding = TextEmbedding::try_new(options)
                .map_err(|e| EmbeddingError::ModelError(e.to_string()))?;
            Ok(Self {
                model: Mutex::new(embedding),
                model_name: name,
            })
        }

        pub fn default_model() -> Result<Self, EmbeddingError> {
            Self::new(EmbeddingModel::NomicEmbedTextV15)
        }
    }

    impl Embedder for FastEmbedEmbedder {
        fn embed_batch(&self, texts: &[&str]) -> Result<Vec<Vec<f32>>, EmbeddingError> {
            if texts.is_empty() {
                return Ok(Vec::new());
            }
            let mut model = self.model.lock().unwrap();
            let embeddings = model
                .embed(texts.to_vec(), None)
                .map_err(|e| EmbeddingError::ModelError(e.to_string()))?;
            if embeddings.is_empty() {
                return Err(EmbeddingError::EmptyResult);
            }
            Ok(embeddings)
        }

        fn model_name(&self) -> &str {
            &self.model_name
        }
    }
}

#[cfg(feature = "embeddings")]
pub use fastembed_impl::FastEmbedEmbedder;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn mock_embedder_is_deterministic() {
        let e = MockEmbedder::new(16);
        let a = e.embed_batch(&["hello world"]).unwrap();
        let b = e.embed_batch(&["hello world"]).unwrap();
        assert_eq!(a, b);
    }

    #[test]
    fn mock_embedder_distinguishes_unrelated_text() {
        let e = MockEmbedder::new(16);
        let vecs = e
            .embed_batch(&["gardening and soil composition", "quantum field theory"])
            .unwrap();
        assert_ne!(vecs[0], vecs[1]);
    }
}
