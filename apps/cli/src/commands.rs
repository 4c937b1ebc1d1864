//! CLI command definitions, routing, and tracing setup.

use std::sync::{Arc, Mutex};
use std::time::Duration;

use clap::{Parser, Subcommand};
use color_eyre::eyre::{Result, eyre};
use indicatif::{ProgressBar, ProgressStyle};
use tokio::io::{AsyncBufReadExt, AsyncWriteExt, BufReader};
use tracing::{info, warn};

use rfpcheck_core::{
    BuildStats, LazyPipeline, OpenAiChat, PipelineConfig, ProgressReporter, Services,
};
use rfpcheck_crawler::ChromiumLauncher;
use rfpcheck_index::OpenAiEmbedder;
use rfpcheck_shared::{AppConfig, init_config, load_config, validate_api_key};

// ---------------------------------------------------------------------------
// CLI structure
// ---------------------------------------------------------------------------

/// RfpCheck — validate RFP demands against your help-center articles.
#[derive(Parser)]
#[command(
    name = "rfpcheck",
    version,
    about = "Answer RFP compliance demands from an authenticated knowledge base.",
    long_about = None,
)]
pub(crate) struct Cli {
    /// Log format: text (default) or json.
    #[arg(long, default_value = "text", global = true)]
    pub log_format: LogFormat,

    /// Verbosity level (-v, -vv).
    #[arg(short, long, action = clap::ArgAction::Count, global = true)]
    pub verbose: u8,

    #[command(subcommand)]
    pub command: Command,
}

/// Log output format.
#[derive(Clone, Debug, clap::ValueEnum)]
pub(crate) enum LogFormat {
    Text,
    Json,
}

/// Top-level CLI subcommands.
#[derive(Subcommand)]
pub(crate) enum Command {
    /// Build the knowledge base and validate a single demand.
    Ask {
        /// The RFP requirement to check.
        demand: String,
    },

    /// Validate demands read line by line from stdin.
    Chat,

    /// Configuration management.
    Config {
        /// Config subcommand.
        #[command(subcommand)]
        action: ConfigAction,
    },
}

/// Config subcommands.
#[derive(Subcommand)]
pub(crate) enum ConfigAction {
    /// Initialize config file with defaults.
    Init,
    /// Show resolved configuration.
    Show,
}

// ---------------------------------------------------------------------------
// Tracing setup
// ---------------------------------------------------------------------------

/// Initialize tracing based on CLI flags.
pub(crate) fn init_tracing(cli: &Cli) {
    use tracing_subscriber::{EnvFilter, fmt};

    let filter = match cli.verbose {
        0 => "rfpcheck=info",
        1 => "rfpcheck=debug",
        _ => "rfpcheck=trace",
    };

    let env_filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(filter));

    match cli.log_format {
        LogFormat::Text => {
            fmt()
                .with_env_filter(env_filter)
                .with_target(false)
                .with_writer(std::io::stderr)
                .init();
        }
        LogFormat::Json => {
            fmt()
                .json()
                .with_env_filter(env_filter)
                .with_writer(std::io::stderr)
                .init();
        }
    }
}

// ---------------------------------------------------------------------------
// Command dispatch
// ---------------------------------------------------------------------------

/// Run the CLI command.
pub(crate) async fn run(cli: Cli) -> Result<()> {
    match cli.command {
        Command::Ask { demand } => cmd_ask(&demand).await,
        Command::Chat => cmd_chat().await,
        Command::Config { action } => match action {
            ConfigAction::Init => cmd_config_init().await,
            ConfigAction::Show => cmd_config_show().await,
        },
    }
}

/// Resolve config, environment and services into a not-yet-built pipeline.
fn prepare(progress: Arc<CliProgress>) -> Result<LazyPipeline> {
    let config = load_config()?;
    // Resolving the source loads `.env`, which may also carry the API key.
    let source = config.source.from_env();
    let api_key = validate_api_key(&config)?;

    info!(
        urls = source.urls.len(),
        domain = source.domain.as_deref().unwrap_or("<unset>"),
        "source resolved"
    );

    let services = build_services(&config, &api_key)?;
    Ok(LazyPipeline::new(
        PipelineConfig::new(&config, source),
        services,
        progress,
    ))
}

fn build_services(config: &AppConfig, api_key: &str) -> Result<Services> {
    let embedder = OpenAiEmbedder::new(
        api_key,
        &config.openai.base_url,
        &config.openai.embedding_model,
        Duration::from_secs(config.openai.request_timeout_secs),
    )?;
    let llm = OpenAiChat::from_config(&config.openai, api_key)?;

    Ok(Services {
        launcher: Arc::new(ChromiumLauncher::new(config.browser.clone())),
        embedder: Arc::new(embedder),
        llm: Arc::new(llm),
    })
}

async fn cmd_ask(demand: &str) -> Result<()> {
    if demand.trim().is_empty() {
        return Err(eyre!("please provide the text of a demand to validate"));
    }

    let progress = Arc::new(CliProgress::new());
    let pipeline = prepare(progress.clone())?;

    let reply = answer_with_spinner(&pipeline, &progress, demand).await?;
    print_verdict(&reply);
    Ok(())
}

async fn cmd_chat() -> Result<()> {
    let progress = Arc::new(CliProgress::new());
    let pipeline = prepare(progress.clone())?;

    let mut lines = BufReader::new(tokio::io::stdin()).lines();
    let mut stdout = tokio::io::stdout();

    loop {
        stdout.write_all(b"demand> ").await?;
        stdout.flush().await?;

        let Some(line) = lines.next_line().await? else {
            break;
        };
        let demand = line.trim();
        if demand.is_empty() {
            warn!("please enter the text of a demand to validate");
            continue;
        }

        match answer_with_spinner(&pipeline, &progress, demand).await {
            Ok(reply) => print_verdict(&reply),
            Err(e) if pipeline.is_built() => eprintln!("error: {e:#}"),
            // Build failures are fatal for the session.
            Err(e) => return Err(e),
        }
    }

    println!();
    Ok(())
}

async fn answer_with_spinner(
    pipeline: &LazyPipeline,
    progress: &CliProgress,
    demand: &str,
) -> Result<String> {
    if !pipeline.is_built() {
        progress.phase("Preparing knowledge base");
    }
    let result = match pipeline.get().await {
        Ok(_) => {
            progress.phase("Analyzing demand");
            pipeline.answer(demand).await
        }
        Err(e) => Err(e),
    };
    progress.clear();
    Ok(result?)
}

fn print_verdict(reply: &str) {
    println!();
    println!("  Validation result:");
    println!();
    for line in reply.lines() {
        println!("  {line}");
    }
    println!();
}

// ---------------------------------------------------------------------------
// CLI progress reporter
// ---------------------------------------------------------------------------

/// CLI progress reporter using an indicatif spinner.
struct CliProgress {
    spinner: Mutex<Option<ProgressBar>>,
}

impl CliProgress {
    fn new() -> Self {
        Self {
            spinner: Mutex::new(None),
        }
    }

    fn with_spinner(&self, f: impl FnOnce(&ProgressBar)) {
        let Ok(mut guard) = self.spinner.lock() else {
            return;
        };
        let spinner = guard.get_or_insert_with(|| {
            let spinner = ProgressBar::new_spinner();
            spinner.set_style(
                ProgressStyle::with_template("{spinner:.cyan} {msg}")
                    .unwrap_or_else(|_| ProgressStyle::default_spinner()),
            );
            spinner.enable_steady_tick(Duration::from_millis(80));
            spinner
        });
        f(spinner);
    }

    fn clear(&self) {
        if let Ok(mut guard) = self.spinner.lock() {
            if let Some(spinner) = guard.take() {
                spinner.finish_and_clear();
            }
        }
    }
}

impl ProgressReporter for CliProgress {
    fn phase(&self, name: &str) {
        self.with_spinner(|s| s.set_message(name.to_string()));
    }

    fn page_fetched(&self, url: &str, current: usize, total: usize) {
        self.with_spinner(|s| s.set_message(format!("Loading [{current}/{total}] {url}")));
    }

    fn done(&self, stats: &BuildStats) {
        self.clear();
        println!(
            "  Knowledge base ready: {} articles, {} chunks ({} skipped) in {:.1}s",
            stats.documents,
            stats.chunks,
            stats.failed_urls,
            stats.elapsed.as_secs_f64()
        );
    }
}

async fn cmd_config_init() -> Result<()> {
    let path = init_config()?;
    println!("Config initialized at: {}", path.display());
    Ok(())
}

async fn cmd_config_show() -> Result<()> {
    let config = load_config()?;
    let toml_str = toml::to_string_pretty(&config)?;
    println!("{toml_str}");
    Ok(())
}
