//! In-memory vector index and similarity retriever.

use std::cmp::Ordering;
use std::sync::Arc;

use tracing::{debug, info};

use rfpcheck_shared::{Chunk, Result, RfpCheckError};

use crate::embedding::EmbeddingProvider;

/// A chunk paired with its similarity to the query.
#[derive(Debug, Clone, PartialEq)]
pub struct ScoredChunk {
    pub chunk: Chunk,
    pub score: f32,
}

/// Chunks and their embeddings, aligned by position.
#[derive(Debug, Clone)]
pub struct VectorIndex {
    chunks: Vec<Chunk>,
    vectors: Vec<Vec<f32>>,
    dimensions: usize,
}

impl VectorIndex {
    /// Embed every chunk in batches of `batch_size` and store the vectors.
    pub async fn build(
        chunks: Vec<Chunk>,
        embedder: &dyn EmbeddingProvider,
        batch_size: usize,
    ) -> Result<Self> {
        if chunks.is_empty() {
            return Err(RfpCheckError::EmptyCorpus);
        }
        let batch_size = batch_size.max(1);

        let mut vectors = Vec::with_capacity(chunks.len());
        for (batch_no, batch) in chunks.chunks(batch_size).enumerate() {
            let inputs: Vec<String> = batch.iter().map(|c| c.text.clone()).collect();
            let embedded = embedder.embed_batch(&inputs).await?;
            if embedded.len() != inputs.len() {
                return Err(RfpCheckError::index(format!(
                    "batch {batch_no}: expected {} vectors, got {}",
                    inputs.len(),
                    embedded.len()
                )));
            }
            debug!(batch = batch_no, size = inputs.len(), "embedded batch");
            vectors.extend(embedded);
        }

        let dimensions = vectors.first().map(Vec::len).unwrap_or(0);
        if dimensions == 0 {
            return Err(RfpCheckError::index("embedding service returned empty vectors"));
        }
        if let Some(pos) = vectors.iter().position(|v| v.len() != dimensions) {
            return Err(RfpCheckError::index(format!(
                "vector {pos} has {} dimensions, expected {dimensions}",
                vectors[pos].len()
            )));
        }

        info!(
            chunks = chunks.len(),
            dimensions,
            model = embedder.model(),
            "vector index built"
        );

        Ok(Self {
            chunks,
            vectors,
            dimensions,
        })
    }

    pub fn len(&self) -> usize {
        self.chunks.len()
    }

    pub fn is_empty(&self) -> bool {
        self.chunks.is_empty()
    }

    pub fn dimensions(&self) -> usize {
        self.dimensions
    }

    /// Return up to `k` chunks most similar to `query`, best first.
    ///
    /// Equal scores keep index order.
    pub fn search(&self, query: &[f32], k: usize) -> Result<Vec<ScoredChunk>> {
        if self.is_empty() {
            return Err(RfpCheckError::index("search on an empty index"));
        }
        if k == 0 {
            return Err(RfpCheckError::index("top_k must be at least 1"));
        }
        if query.len() != self.dimensions {
            return Err(RfpCheckError::index(format!(
                "query has {} dimensions, index has {}",
                query.len(),
                self.dimensions
            )));
        }

        let mut scored: Vec<(usize, f32)> = self
            .vectors
            .iter()
            .enumerate()
            .map(|(i, v)| (i, cosine_similarity(query, v)))
            .collect();
        scored.sort_by(|a, b| descending(a.1, b.1));
        scored.truncate(k);

        Ok(scored
            .into_iter()
            .map(|(i, score)| ScoredChunk {
                chunk: self.chunks[i].clone(),
                score,
            })
            .collect())
    }
}

fn descending(a: f32, b: f32) -> Ordering {
    b.total_cmp(&a)
}

/// Cosine similarity of two equal-length vectors. Zero when either has no magnitude.
pub fn cosine_similarity(a: &[f32], b: &[f32]) -> f32 {
    let dot: f32 = a.iter().zip(b).map(|(x, y)| x * y).sum();
    let norm_a: f32 = a.iter().map(|x| x * x).sum::<f32>().sqrt();
    let norm_b: f32 = b.iter().map(|x| x * x).sum::<f32>().sqrt();
    if norm_a == 0.0 || norm_b == 0.0 {
        return 0.0;
    }
    dot / (norm_a * norm_b)
}

// ---------------------------------------------------------------------------
// Retriever
// ---------------------------------------------------------------------------

/// Embeds a query and looks it up in a [`VectorIndex`].
#[derive(Clone)]
pub struct Retriever {
    index: Arc<VectorIndex>,
    embedder: Arc<dyn EmbeddingProvider>,
    top_k: usize,
}

impl Retriever {
    pub fn new(index: VectorIndex, embedder: Arc<dyn EmbeddingProvider>, top_k: usize) -> Self {
        Self {
            index: Arc::new(index),
            embedder,
            top_k: top_k.max(1),
        }
    }

    /// The `top_k` chunks most relevant to `query`.
    pub async fn retrieve(&self, query: &str) -> Result<Vec<ScoredChunk>> {
        let vector = self.embedder.embed_query(query).await?;
        let hits = self.index.search(&vector, self.top_k)?;
        debug!(
            hits = hits.len(),
            best = hits.first().map(|h| h.score).unwrap_or_default(),
            "retrieved context"
        );
        Ok(hits)
    }
}

impl std::fmt::Debug for Retriever {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Retriever")
            .field("chunks", &self.index.len())
            .field("model", &self.embedder.model())
            .field("top_k", &self.top_k)
            .finish()
    }
}
