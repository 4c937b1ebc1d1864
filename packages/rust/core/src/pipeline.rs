//! End-to-end build: cookies → browser → extract → chunk → index, then answer.

use std::sync::Arc;
use std::time::{Duration, Instant};

use tokio::sync::OnceCell;
use tracing::{info, instrument, warn};
use uuid::Uuid;

use rfpcheck_chunker::TextSplitter;
use rfpcheck_crawler::{BrowserLauncher, ContentExtractor, PageAcquirer, build_credentials};
use rfpcheck_index::{EmbeddingProvider, Retriever, ScoredChunk, VectorIndex};
use rfpcheck_shared::{
    AppConfig, BrowserConfig, ChunkingConfig, ExtractionConfig, Result, RetrievalConfig,
    RfpCheckError, SourceConfig,
};

use crate::answer::AnswerAssembler;
use crate::llm::CompletionProvider;

/// Everything the build needs besides the external services.
#[derive(Debug, Clone)]
pub struct PipelineConfig {
    pub source: SourceConfig,
    pub browser: BrowserConfig,
    pub extraction: ExtractionConfig,
    pub chunking: ChunkingConfig,
    pub retrieval: RetrievalConfig,
}

impl PipelineConfig {
    /// Combine the file config with the source resolved from the environment.
    pub fn new(app: &AppConfig, source: SourceConfig) -> Self {
        Self {
            source,
            browser: app.browser.clone(),
            extraction: app.extraction.clone(),
            chunking: app.chunking,
            retrieval: app.retrieval,
        }
    }
}

/// External capabilities the pipeline drives.
#[derive(Clone)]
pub struct Services {
    pub launcher: Arc<dyn BrowserLauncher>,
    pub embedder: Arc<dyn EmbeddingProvider>,
    pub llm: Arc<dyn CompletionProvider>,
}

/// Summary of a completed build.
#[derive(Debug, Clone)]
pub struct BuildStats {
    pub build_id: Uuid,
    pub documents: usize,
    pub failed_urls: usize,
    pub extraction_failures: usize,
    pub chunks: usize,
    pub elapsed: Duration,
}

/// Progress callback for reporting build status.
pub trait ProgressReporter: Send + Sync {
    /// Called when entering a new phase.
    fn phase(&self, name: &str);
    /// Called before each page navigation.
    fn page_fetched(&self, url: &str, current: usize, total: usize);
    /// Called when the pipeline is ready.
    fn done(&self, stats: &BuildStats);
}

/// No-op progress reporter for headless/test usage.
pub struct SilentProgress;

impl ProgressReporter for SilentProgress {
    fn phase(&self, _name: &str) {}
    fn page_fetched(&self, _url: &str, _current: usize, _total: usize) {}
    fn done(&self, _stats: &BuildStats) {}
}

// ---------------------------------------------------------------------------
// Pipeline
// ---------------------------------------------------------------------------

/// A ready-to-query knowledge base.
#[derive(Debug)]
pub struct Pipeline {
    retriever: Retriever,
    assembler: AnswerAssembler,
    stats: BuildStats,
}

impl Pipeline {
    pub fn stats(&self) -> &BuildStats {
        &self.stats
    }

    /// The chunks that would be used as context for `question`.
    pub async fn retrieve(&self, question: &str) -> Result<Vec<ScoredChunk>> {
        self.retriever.retrieve(question).await
    }

    /// Judge `question` against the indexed articles and return the raw reply.
    #[instrument(skip_all, fields(build_id = %self.stats.build_id))]
    pub async fn answer(&self, question: &str) -> Result<String> {
        ensure_question(question)?;
        let context = self.retriever.retrieve(question).await?;
        self.assembler.answer(&context, question).await
    }
}

fn ensure_question(question: &str) -> Result<()> {
    if question.trim().is_empty() {
        return Err(RfpCheckError::validation("question must not be blank"));
    }
    Ok(())
}

/// Run the full build.
///
/// 1. Session credentials from the cookie string
/// 2. Page acquisition in a headless browser
/// 3. Recursive chunking
/// 4. Embedding and indexing
#[instrument(skip_all, fields(urls = config.source.urls.len()))]
pub async fn build_pipeline(
    config: &PipelineConfig,
    services: &Services,
    progress: &dyn ProgressReporter,
) -> Result<Pipeline> {
    let start = Instant::now();
    let build_id = Uuid::now_v7();
    info!(%build_id, "starting pipeline build");

    // --- Phase 1: Validate inputs ---
    let credentials = build_credentials(
        config.source.cookie_string.as_deref(),
        config.source.domain.as_deref(),
    )?;
    let extractor = ContentExtractor::new(&config.extraction)?;
    let splitter = TextSplitter::from_config(&config.chunking)?;

    if config.source.urls.is_empty() {
        warn!("no article URLs configured");
        return Err(RfpCheckError::EmptyCorpus);
    }

    // --- Phase 2: Acquire pages ---
    progress.phase("Loading articles");
    let acquirer = PageAcquirer::new(
        services.launcher.clone(),
        extractor,
        Duration::from_secs(config.browser.navigation_timeout_secs),
    );
    let on_page = |url: &url::Url, current: usize, total: usize| {
        progress.page_fetched(url.as_str(), current, total);
    };
    let acquisition = acquirer
        .acquire(&config.source.urls, &credentials, &on_page)
        .await?;

    for failure in &acquisition.failures {
        warn!(url = %failure.url, error = %failure.message, "article skipped");
    }
    if acquisition.documents.is_empty() {
        return Err(RfpCheckError::EmptyCorpus);
    }

    // --- Phase 3: Chunk ---
    progress.phase("Splitting articles");
    let chunks = splitter.split_documents(&acquisition.documents);
    if chunks.is_empty() {
        return Err(RfpCheckError::EmptyCorpus);
    }
    let chunk_count = chunks.len();

    // --- Phase 4: Index ---
    progress.phase("Embedding chunks");
    let index = VectorIndex::build(
        chunks,
        services.embedder.as_ref(),
        config.retrieval.embedding_batch_size,
    )
    .await?;
    let retriever = Retriever::new(index, services.embedder.clone(), config.retrieval.top_k);

    let stats = BuildStats {
        build_id,
        documents: acquisition.documents.len(),
        failed_urls: acquisition.failures.len(),
        extraction_failures: acquisition.extraction_failures,
        chunks: chunk_count,
        elapsed: start.elapsed(),
    };

    info!(
        %build_id,
        documents = stats.documents,
        failed_urls = stats.failed_urls,
        chunks = stats.chunks,
        elapsed_ms = stats.elapsed.as_millis(),
        "pipeline ready"
    );
    progress.done(&stats);

    Ok(Pipeline {
        retriever,
        assembler: AnswerAssembler::new(services.llm.clone()),
        stats,
    })
}

// ---------------------------------------------------------------------------
// LazyPipeline
// ---------------------------------------------------------------------------

/// Builds the pipeline on first use and reuses it afterwards.
///
/// Concurrent first callers share one build. A failed build leaves the
/// handle empty so the next call tries again.
pub struct LazyPipeline {
    config: PipelineConfig,
    services: Services,
    progress: Arc<dyn ProgressReporter>,
    cell: OnceCell<Pipeline>,
}

impl LazyPipeline {
    pub fn new(
        config: PipelineConfig,
        services: Services,
        progress: Arc<dyn ProgressReporter>,
    ) -> Self {
        Self {
            config,
            services,
            progress,
            cell: OnceCell::new(),
        }
    }

    pub fn is_built(&self) -> bool {
        self.cell.initialized()
    }

    /// The built pipeline, building it now if needed.
    pub async fn get(&self) -> Result<&Pipeline> {
        self.cell
            .get_or_try_init(|| build_pipeline(&self.config, &self.services, self.progress.as_ref()))
            .await
    }

    /// Answer `question`, building the pipeline first if this is the first call.
    pub async fn answer(&self, question: &str) -> Result<String> {
        ensure_question(question)?;
        self.get().await?.answer(question).await
    }
}
