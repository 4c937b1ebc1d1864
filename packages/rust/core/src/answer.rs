//! Grounded prompt assembly for compliance demands.

use std::sync::Arc;

use tracing::{debug, instrument};

use rfpcheck_index::ScoredChunk;
use rfpcheck_shared::Result;

use crate::llm::CompletionProvider;

const CONTEXT_SLOT: &str = "{context}";
const DEMAND_SLOT: &str = "{demand}";

/// Instructs the model to judge the demand against the context only.
pub const PROMPT_TEMPLATE: &str = "\
Based solely on the CONTEXT from the provided knowledge base, answer whether the company meets the following DEMAND or not.
Add a comment justifying your answer based on the context.
Your answer must be one of the three options: 'YES', 'NO', or 'PARTIALLY'.

CONTEXT:
{context}

DEMAND:
{demand}

ANSWER (YES/NO/PARTIALLY) and COMMENT:
";

/// Fill the template with the retrieved chunks (in order, blank-line separated)
/// and the demand verbatim.
pub fn assemble_prompt(results: &[ScoredChunk], demand: &str) -> String {
    let context = results
        .iter()
        .map(|r| r.chunk.text.as_str())
        .collect::<Vec<_>>()
        .join("\n\n");

    // Split once around the context slot so text inside the chunks is never
    // scanned for placeholders.
    let (head, tail) = PROMPT_TEMPLATE
        .split_once(CONTEXT_SLOT)
        .unwrap_or((PROMPT_TEMPLATE, ""));
    let tail = tail.replacen(DEMAND_SLOT, demand, 1);

    let mut prompt = String::with_capacity(head.len() + context.len() + tail.len());
    prompt.push_str(head);
    prompt.push_str(&context);
    prompt.push_str(&tail);
    prompt
}

/// Sends assembled prompts to a [`CompletionProvider`].
#[derive(Clone)]
pub struct AnswerAssembler {
    llm: Arc<dyn CompletionProvider>,
}

impl AnswerAssembler {
    pub fn new(llm: Arc<dyn CompletionProvider>) -> Self {
        Self { llm }
    }

    /// Ask the model about `demand` given `results`. The reply is returned as-is.
    #[instrument(skip_all, fields(chunks = results.len(), model = self.llm.model()))]
    pub async fn answer(&self, results: &[ScoredChunk], demand: &str) -> Result<String> {
        let prompt = assemble_prompt(results, demand);
        debug!(prompt_chars = prompt.chars().count(), "prompt assembled");
        self.llm.complete(&prompt).await
    }
}

impl std::fmt::Debug for AnswerAssembler {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("AnswerAssembler")
            .field("model", &self.llm.model())
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use async_trait::async_trait;
    use rfpcheck_shared::{Chunk, ChunkMetadata, RfpCheckError};
    use std::sync::Mutex;
    use url::Url;

    struct RecordingLlm {
        reply: String,
        prompts: Mutex<Vec<String>>,
    }

    #[async_trait]
    impl CompletionProvider for RecordingLlm {
        async fn complete(&self, prompt: &str) -> Result<String> {
            self.prompts.lock().unwrap().push(prompt.to_string());
            Ok(self.reply.clone())
        }

        fn model(&self) -> &str {
            "recording"
        }
    }

    struct FailingLlm;

    #[async_trait]
    impl CompletionProvider for FailingLlm {
        async fn complete(&self, _prompt: &str) -> Result<String> {
            Err(RfpCheckError::Service("quota exceeded".into()))
        }

        fn model(&self) -> &str {
            "failing"
        }
    }

    fn scored(text: &str, score: f32) -> ScoredChunk {
        ScoredChunk {
            chunk: Chunk {
                text: text.to_string(),
                metadata: ChunkMetadata {
                    source: Url::parse("https://help.example.com/a").unwrap(),
                    chunk_index: 0,
                    start_char: 0,
                },
            },
            score,
        }
    }

    #[test]
    fn prompt_joins_context_in_retrieved_order() {
        let results = vec![scored("second best", 0.5), scored("best", 0.9)];
        let prompt = assemble_prompt(&results, "Do you support SSO?");

        assert!(prompt.contains("CONTEXT:\nsecond best\n\nbest\n\nDEMAND:\nDo you support SSO?\n"));
        assert!(prompt.starts_with("Based solely on the CONTEXT"));
        assert!(prompt.ends_with("ANSWER (YES/NO/PARTIALLY) and COMMENT:\n"));
        assert!(prompt.contains("'YES', 'NO', or 'PARTIALLY'"));
    }

    #[test]
    fn placeholders_inside_context_are_left_alone() {
        let results = vec![scored("literal {demand} token", 1.0)];
        let prompt = assemble_prompt(&results, "Q");
        assert!(prompt.contains("literal {demand} token"));
        assert!(prompt.contains("DEMAND:\nQ\n"));
    }

    #[test]
    fn empty_results_leave_empty_context() {
        let prompt = assemble_prompt(&[], "Q");
        assert!(prompt.contains("CONTEXT:\n\n\nDEMAND:"));
    }

    #[tokio::test]
    async fn reply_is_returned_unmodified() {
        let llm = Arc::new(RecordingLlm {
            reply: "  MAYBE?? not a verdict token  \n".into(),
            prompts: Mutex::new(Vec::new()),
        });
        let assembler = AnswerAssembler::new(llm.clone());

        let reply = assembler
            .answer(&[scored("Feature X is supported.", 1.0)], "Feature X?")
            .await
            .unwrap();

        assert_eq!(reply, "  MAYBE?? not a verdict token  \n");
        let prompts = llm.prompts.lock().unwrap();
        assert_eq!(prompts.len(), 1);
        assert!(prompts[0].contains("Feature X is supported."));
    }

    #[tokio::test]
    async fn service_failure_propagates() {
        let assembler = AnswerAssembler::new(Arc::new(FailingLlm));
        let err = assembler.answer(&[], "Q").await.unwrap_err();
        assert!(matches!(err, RfpCheckError::Service(_)));
    }
}
