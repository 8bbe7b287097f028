//! Deterministic bag-of-hashed-tokens embedding.
//!
//! Cheap enough to compute on every retrieval call and stable across processes,
//! which is all the retrieval scorer needs. Swap in a hosted embedder by storing its
//! vectors under a different model id.

use super::util::l2_norm;

pub const DEFAULT_DIM: usize = 64;
pub const LOCAL_MODEL_ID: &str = "local-hash-v1";

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct LocalEmbedding {
    dim: usize,
}

impl Default for LocalEmbedding {
    fn default() -> Self {
        Self { dim: DEFAULT_DIM }
    }
}

impl LocalEmbedding {
    pub fn new(dim: usize) -> Self {
        Self { dim: dim.max(1) }
    }

    pub fn dim(&self) -> usize {
        self.dim
    }

    /// Vectors of different dimensionality must never be compared, so the
    /// dimension is part of the id whenever it differs from the default.
    pub fn model_id(&self) -> String {
        if self.dim == DEFAULT_DIM {
            LOCAL_MODEL_ID.to_string()
        } else {
            format!("{}-d{}", LOCAL_MODEL_ID, self.dim)
        }
    }

    /// L2-normalized bucket counts, or the zero vector when no token survives.
    pub fn embed(&self, text: &str) -> Vec<f64> {
        let mut vector = vec![0.0f64; self.dim];
        let tokens = tokenize(text);
        if tokens.is_empty() {
            return vector;
        }

        for token in &tokens {
            let idx = (djb2(token).unsigned_abs() as usize) % self.dim;
            vector[idx] += 1.0;
        }

        let norm = l2_norm(&vector);
        if norm > 0.0 {
            for v in vector.iter_mut() {
                *v /= norm;
            }
        }
        vector
    }
}

/// Lowercase, split on anything outside `[a-z0-9_]`, drop tokens shorter than 2.
pub fn tokenize(text: &str) -> Vec<String> {
    text.to_lowercase()
        .split(|c: char| !(c.is_ascii_lowercase() || c.is_ascii_digit() || c == '_'))
        .filter(|t| t.len() >= 2)
        .map(str::to_string)
        .collect()
}

fn djb2(s: &str) -> i32 {
    let mut h: i32 = 5381;
    for unit in s.encode_utf16() {
        h = h.wrapping_shl(5).wrapping_add(h).wrapping_add(unit as i32);
    }
    h
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::embeddings::util::cosine_similarity;

    #[test]
    fn tokenize_strips_punctuation_and_short_tokens() {
        assert_eq!(
            tokenize("How many Film_Actors? a b 42!"),
            vec!["how", "many", "film_actors", "42"]
        );
    }

    #[test]
    fn embedding_is_unit_length() {
        let e = LocalEmbedding::default();
        for text in ["customer payments by month", "rental", "a a a film film"] {
            let v = e.embed(text);
            assert_eq!(v.len(), DEFAULT_DIM);
            assert!((l2_norm(&v) - 1.0).abs() < 1e-9, "{}", text);
        }
    }

    #[test]
    fn no_tokens_gives_zero_vector() {
        let v = LocalEmbedding::new(8).embed("? ! a");
        assert_eq!(v, vec![0.0; 8]);
    }

    #[test]
    fn token_order_does_not_matter() {
        let e = LocalEmbedding::default();
        assert_eq!(e.embed("film actor"), e.embed("actor film"));
    }

    #[test]
    fn self_similarity_is_one() {
        let e = LocalEmbedding::default();
        let v = e.embed("total payments per customer");
        assert!((cosine_similarity(&v, &v) - 1.0).abs() < 1e-9);
    }

    #[test]
    fn model_id_tracks_dimension() {
        assert_eq!(LocalEmbedding::default().model_id(), "local-hash-v1");
        assert_eq!(LocalEmbedding::new(128).model_id(), "local-hash-v1-d128");
    }
}
