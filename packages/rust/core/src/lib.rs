//! Pipeline orchestration and answer generation for RfpCheck.
//!
//! This crate ties together session replay, page acquisition, chunking and
//! vector retrieval into a queryable pipeline (see [`pipeline::build_pipeline`]),
//! and submits grounded prompts to a language model.

pub mod answer;
pub mod llm;
pub mod pipeline;

pub use answer::{AnswerAssembler, PROMPT_TEMPLATE, assemble_prompt};
pub use llm::{CompletionProvider, OpenAiChat};
pub use pipeline::{
    BuildStats, LazyPipeline, Pipeline, PipelineConfig, ProgressReporter, Services,
    SilentProgress, build_pipeline,
};
