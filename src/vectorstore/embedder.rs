//! Text embedders.

use std::hash::{DefaultHasher, Hash, Hasher};

use unicode_segmentation::UnicodeSegmentation;

use crate::error::ConfigError;

/// Default embedding width for [`HashEmbedder`].
pub const DEFAULT_DIMENSIONS: usize = 256;

/// Maps text to a fixed-width vector.
pub trait Embedder: Send + Sync {
    /// Embedding width.
    fn dimensions(&self) -> usize;

    /// Embeds one text. The result has [`Embedder::dimensions`] entries.
    fn embed(&self, text: &str) -> Vec<f32>;
}

/// Feature-hashing bag-of-words embedder.
///
/// Each lowercased word is hashed into a bucket with a hash-derived sign,
/// then the vector is L2-normalized. Deterministic within a build.
#[derive(Debug, Clone, Copy)]
pub struct HashEmbedder {
    dimensions: usize,
}

impl HashEmbedder {
    /// Creates an embedder with the given width (minimum 1).
    #[must_use]
    pub fn new(dimensions: usize) -> Self {
        Self {
            dimensions: dimensions.max(1),
        }
    }
}

impl Default for HashEmbedder {
    fn default() -> Self {
        Self::new(DEFAULT_DIMENSIONS)
    }
}

impl Embedder for HashEmbedder {
    fn dimensions(&self) -> usize {
        self.dimensions
    }

    #[allow(clippy::cast_possible_truncation)]
    fn embed(&self, text: &str) -> Vec<f32> {
        let mut v = vec![0.0f32; self.dimensions];
        for word in text.unicode_words() {
            let word = word.to_lowercase();
            let mut hasher = DefaultHasher::new();
            word.hash(&mut hasher);
            let h = hasher.finish();
            let bucket = (h % self.dimensions as u64) as usize;
            let sign = if h >> 63 == 0 { 1.0 } else { -1.0 };
            v[bucket] += sign;
        }
        let norm = v.iter().map(|x| x * x).sum::<f32>().sqrt();
        if norm > 0.0 {
            for x in &mut v {
                *x /= norm;
            }
        }
        v
    }
}

/// Cosine similarity of two equal-length vectors. Returns `0.0` for
/// mismatched lengths or zero vectors.
#[must_use]
pub fn cosine(a: &[f32], b: &[f32]) -> f32 {
    if a.len() != b.len() {
        return 0.0;
    }
    let dot: f32 = a.iter().zip(b).map(|(x, y)| x * y).sum();
    let na = a.iter().map(|x| x * x).sum::<f32>().sqrt();
    let nb = b.iter().map(|x| x * x).sum::<f32>().sqrt();
    if na == 0.0 || nb == 0.0 { 0.0 } else { dot / (na * nb) }
}

/// Creates the embedder named by the `embedding_provider` option.
///
/// # Errors
///
/// Returns [`ConfigError::InvalidOption`] for unknown providers.
pub fn create_embedder(provider: &str) -> Result<Box<dyn Embedder>, ConfigError> {
    match provider.trim().to_lowercase().as_str() {
        "" | "hash" | "local" => Ok(Box::new(HashEmbedder::default())),
        other => Err(ConfigError::invalid(
            "embedding_provider",
            other,
            "supported embedding providers: hash",
        )),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_embedding_is_normalized() {
        let e = HashEmbedder::new(64);
        let v = e.embed("rust async runtime");
        assert_eq!(v.len(), 64);
        let norm: f32 = v.iter().map(|x| x * x).sum::<f32>().sqrt();
        assert!((norm - 1.0).abs() < 1e-5);
    }

    #[test]
    fn test_empty_text_is_zero_vector() {
        let v = HashEmbedder::default().embed("");
        assert!(v.iter().all(|x| *x == 0.0));
    }

    #[test]
    fn test_similar_texts_score_higher() {
        let e = HashEmbedder::default();
        let q = e.embed("solar panel efficiency");
        let near = e.embed("efficiency of solar panel cells");
        let far = e.embed("medieval castle architecture");
        assert!(cosine(&q, &near) > cosine(&q, &far));
    }

    #[test]
    fn test_case_insensitive() {
        let e = HashEmbedder::default();
        assert_eq!(e.embed("Rust"), e.embed("rust"));
    }

    #[test]
    fn test_create_embedder_rejects_unknown() {
        assert!(create_embedder("hash").is_ok());
        assert!(create_embedder("openai").is_err());
    }
}
