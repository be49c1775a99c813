use serde::{Deserialize, Serialize};

/// Token accounting reported by the provider, zero when the provider omits it.
#[derive(Debug, Clone, Copy, Default, Serialize, Deserialize, PartialEq, Eq)]
pub struct EmbeddingUsage {
    #[serde(default)]
    pub prompt_tokens: u32,
    #[serde(default)]
    pub total_tokens: u32,
}

/// One embedding call's output.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct EmbeddingOutput {
    /// Embedding values, L2-normalised when the provider is configured to.
    pub vector: Vec<f32>,
    /// Model that produced the vector.
    pub model: String,
    #[serde(default)]
    pub usage: EmbeddingUsage,
}

impl EmbeddingOutput {
    pub fn dimension(&self) -> usize {
        self.vector.len()
    }
}
