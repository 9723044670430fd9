use crate::domain::error::DomainError;
use crate::domain::ports::embedding_port::{EmbeddingProvider, InputType};

pub const DEFAULT_HASHED_DIMENSION: usize = 256;

/// Offline bag-of-words embedder using signed feature hashing.
///
/// ASCII alphanumeric runs are lower-cased words; every other alphabetic
/// character (CJK in particular) is its own token. Vectors are L2-normalised,
/// so texts sharing tokens have a cosine distance below 1.
pub struct HashedProvider {
    dimension: usize,
}

impl HashedProvider {
    pub fn new(dimension: usize) -> Self {
        Self {
            dimension: dimension.max(1),
        }
    }

    fn tokens(text: &str) -> Vec<String> {
        let mut tokens = Vec::new();
        let mut word = String::new();
        for c in text.chars() {
            if c.is_ascii_alphanumeric() {
                word.push(c.to_ascii_lowercase());
                continue;
            }
            if !word.is_empty() {
                tokens.push(std::mem::take(&mut word));
            }
            if c.is_alphanumeric() {
                tokens.push(c.to_string());
            }
        }
        if !word.is_empty() {
            tokens.push(word);
        }
        tokens
    }

    // FNV-1a, stable across builds and platforms.
    fn hash(token: &str) -> u64 {
        token.bytes().fold(0xcbf2_9ce4_8422_2325_u64, |h, b| {
            (h ^ b as u64).wrapping_mul(0x0000_0100_0000_01b3)
        })
    }

    pub fn embed_text(&self, text: &str) -> Vec<f32> {
        let mut v = vec![0.0_f32; self.dimension];
        for token in Self::tokens(text) {
            let h = Self::hash(&token);
            let bucket = (h % self.dimension as u64) as usize;
            let sign = if h >> 63 == 0 { 1.0 } else { -1.0 };
            v[bucket] += sign;
        }
        let norm = v.iter().map(|x| x * x).sum::<f32>().sqrt();
        if norm > 0.0 {
            v.iter_mut().for_each(|x| *x /= norm);
        }
        v
    }
}

impl Default for HashedProvider {
    fn default() -> Self {
        Self::new(DEFAULT_HASHED_DIMENSION)
    }
}

#[async_trait::async_trait]
impl EmbeddingProvider for HashedProvider {
    async fn embed(&self, texts: &[String], _input_type: InputType) -> Result<Vec<Vec<f32>>, DomainError> {
        Ok(texts.iter().map(|t| self.embed_text(t)).collect())
    }

    fn dimension_hint(&self) -> Option<usize> {
        Some(self.dimension)
    }

    fn name(&self) -> &str {
        "hashed"
    }
}
