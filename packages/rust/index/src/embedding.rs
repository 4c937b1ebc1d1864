//! Embedding service seam.

use async_trait::async_trait;

use rfpcheck_shared::{Result, RfpCheckError};

/// Maps text to fixed-length vectors.
///
/// The same provider must embed both the indexed chunks and the queries;
/// vectors from different models are not comparable.
#[async_trait]
pub trait EmbeddingProvider: Send + Sync {
    /// Embed a batch of inputs, returning one vector per input in order.
    async fn embed_batch(&self, inputs: &[String]) -> Result<Vec<Vec<f32>>>;

    /// Embed a single query string.
    async fn embed_query(&self, text: &str) -> Result<Vec<f32>> {
        self.embed_batch(&[text.to_string()])
            .await?
            .pop()
            .ok_or_else(|| RfpCheckError::Service("embedding service returned no vector".into()))
    }

    /// Model identifier, for logs.
    fn model(&self) -> &str;
}
