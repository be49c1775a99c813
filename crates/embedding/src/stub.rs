use async_trait::async_trait;
use fxhash::hash64;

use crate::normalize::l2_normalize_in_place;
use crate::{EmbeddingError, EmbeddingOutput, EmbeddingProvider, EmbeddingUsage};

/// Deterministic offline provider.
///
/// Tokens (lowercased alphanumeric runs) are feature-hashed into a fixed
/// number of buckets with a hash-derived sign, so texts sharing vocabulary
/// land close together under cosine similarity.
#[derive(Debug, Clone)]
pub struct StubEmbeddingProvider {
    model: String,
    dimension: usize,
    normalize: bool,
}

impl StubEmbeddingProvider {
    pub fn new(model: impl Into<String>, dimension: usize, normalize: bool) -> Self {
        Self {
            model: model.into(),
            dimension: dimension.max(1),
            normalize,
        }
    }

    pub fn embed_text(&self, text: &str) -> Vec<f32> {
        let mut v = vec![0f32; self.dimension];
        for token in tokenize(text) {
            let h = hash64(token.as_bytes());
            let idx = (h % self.dimension as u64) as usize;
            let sign = if (h >> 63) & 1 == 1 { -1.0 } else { 1.0 };
            v[idx] += sign;
        }
        if self.normalize {
            l2_normalize_in_place(&mut v);
        }
        v
    }
}

fn tokenize(text: &str) -> impl Iterator<Item = String> + '_ {
    text.split(|c: char| !c.is_alphanumeric())
        .filter(|t| !t.is_empty())
        .map(str::to_lowercase)
}

#[async_trait]
impl EmbeddingProvider for StubEmbeddingProvider {
    async fn embed(&self, text: &str) -> Result<EmbeddingOutput, EmbeddingError> {
        if text.trim().is_empty() {
            return Err(EmbeddingError::EmptyInput);
        }
        let tokens = tokenize(text).count() as u32;
        Ok(EmbeddingOutput {
            vector: self.embed_text(text),
            model: self.model.clone(),
            usage: EmbeddingUsage {
                prompt_tokens: tokens,
                total_tokens: tokens,
            },
        })
    }

    fn model_name(&self) -> &str {
        &self.model
    }

    fn dimension(&self) -> Option<usize> {
        Some(self.dimension)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn cosine(a: &[f32], b: &[f32]) -> f32 {
        a.iter().zip(b).map(|(x, y)| x * y).sum()
    }

    #[tokio::test]
    async fn deterministic_and_sized() {
        let p = StubEmbeddingProvider::new("stub", 128, true);
        let a = p.embed("Rust backend engineer").await.unwrap();
        let b = p.embed("Rust backend engineer").await.unwrap();
        assert_eq!(a.vector, b.vector);
        assert_eq!(a.dimension(), 128);
        assert_eq!(a.usage.prompt_tokens, 3);
    }

    #[tokio::test]
    async fn case_and_punctuation_insensitive() {
        let p = StubEmbeddingProvider::new("stub", 64, true);
        let a = p.embed("rust, tokio").await.unwrap();
        let b = p.embed("Rust Tokio").await.unwrap();
        assert_eq!(a.vector, b.vector);
    }

    #[tokio::test]
    async fn shared_vocabulary_is_closer() {
        let p = StubEmbeddingProvider::new("stub", 512, true);
        let base = p.embed_text("senior rust engineer tokio distributed systems");
        let near = p.embed_text("rust engineer tokio systems");
        let far = p.embed_text("pastry chef croissant bakery");
        assert!(cosine(&base, &near) > cosine(&base, &far));
    }

    #[tokio::test]
    async fn rejects_blank_text() {
        let p = StubEmbeddingProvider::new("stub", 8, true);
        assert_eq!(p.embed("   ").await, Err(EmbeddingError::EmptyInput));
    }
}
