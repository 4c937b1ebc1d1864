//! Embedding providers and the in-memory similarity index.
//!
//! - [`EmbeddingProvider`] — text to vector, used for chunks and queries alike
//! - [`OpenAiEmbedder`] — OpenAI-compatible `/embeddings` client
//! - [`VectorIndex`] — cosine-similarity index over embedded chunks
//! - [`Retriever`] — embeds a query and returns the top-k chunks

pub mod embedding;
pub mod openai;
pub mod store;

pub use embedding::EmbeddingProvider;
pub use openai::OpenAiEmbedder;
pub use store::{Retriever, ScoredChunk, VectorIndex, cosine_similarity};
