#![allow(clippy::uninlined_format_args)]

use anyhow::{anyhow, Context, Result};
use clap::{CommandFactory, Parser, Subcommand, ValueEnum};
use clap_complete::{generate, Shell};
use indicatif::{ProgressBar, ProgressStyle};
use log::{error, info, warn, Level, LevelFilter, Log, Metadata, Record, SetLoggerError};
use std::io::Write;
use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::watch;
use walkdir::WalkDir;

use doctran::app_config::{Config, LogLevel};
use doctran::chunking::{ChunkOverrides, ChunkingService, Tier};
use doctran::database::JobStatus;
use doctran::queue::extraction::{is_plain_text_path, PlainTextExtractor, TextExtractor};
use doctran::queue::{JobQueue, JobStatusView, JobSubmission, WorkerPool};
use doctran::translation::TranslationOrchestrator;

/// How often `translate` refreshes its progress bar
const PROGRESS_POLL: Duration = Duration::from_millis(200);

/// Jobs listed by `status` without an id
const RECENT_JOBS: usize = 20;

/// CLI Wrapper for Tier to implement ValueEnum
#[derive(Debug, Clone, Copy, ValueEnum)]
enum CliTier {
    Basic,
    Standard,
    Premium,
}

impl From<CliTier> for Tier {
    fn from(cli_tier: CliTier) -> Self {
        match cli_tier {
            CliTier::Basic => Tier::Basic,
            CliTier::Standard => Tier::Standard,
            CliTier::Premium => Tier::Premium,
        }
    }
}

/// CLI Wrapper for LogLevel to implement ValueEnum
#[derive(Debug, Clone, Copy, ValueEnum)]
enum CliLogLevel {
    Error,
    Warn,
    Info,
    Debug,
    Trace,
}

impl From<CliLogLevel> for LogLevel {
    fn from(cli_level: CliLogLevel) -> Self {
        match cli_level {
            CliLogLevel::Error => LogLevel::Error,
            CliLogLevel::Warn => LogLevel::Warn,
            CliLogLevel::Info => LogLevel::Info,
            CliLogLevel::Debug => LogLevel::Debug,
            CliLogLevel::Trace => LogLevel::Trace,
        }
    }
}

#[derive(Subcommand, Debug)]
enum Commands {
    /// Estimate a document's size and recommend a tier
    Analyze {
        #[arg(value_name = "FILE")]
        file: PathBuf,
    },

    /// Split a document into chunks without translating it
    Chunk {
        #[arg(value_name = "FILE")]
        file: PathBuf,

        #[arg(short, long, value_enum, default_value = "standard")]
        tier: CliTier,

        /// Override the tier's chunk token budget
        #[arg(long)]
        max_tokens: Option<usize>,

        /// Override the tier's overlap in tokens
        #[arg(long)]
        overlap: Option<usize>,

        /// Compute chunk DNA regardless of tier
        #[arg(long)]
        dna: bool,

        /// Print the full result as JSON
        #[arg(long)]
        json: bool,
    },

    /// Queue a file, or every text file under a directory
    Submit {
        #[arg(value_name = "PATH")]
        path: PathBuf,

        #[command(flatten)]
        job: JobArgs,
    },

    /// Show one job, or the most recent ones
    Status {
        #[arg(value_name = "JOB_ID")]
        job_id: Option<String>,
    },

    /// Run the worker pool until Ctrl-C
    Worker {
        /// Number of concurrent workers
        #[arg(short, long)]
        workers: Option<usize>,
    },

    /// Translate one file now: submit it and drain the queue
    Translate {
        #[arg(value_name = "FILE")]
        file: PathBuf,

        #[command(flatten)]
        job: JobArgs,

        /// Write the translation here instead of stdout
        #[arg(short, long)]
        output: Option<PathBuf>,
    },

    /// Job counts per status
    Stats,

    /// Requeue a failed job
    Retry {
        #[arg(value_name = "JOB_ID")]
        job_id: String,
    },

    /// Delete all failed jobs
    Clean,

    /// Generate shell completions for doctran
    Completions {
        /// Shell to generate completions for
        #[arg(value_enum)]
        shell: Shell,
    },
}

#[derive(clap::Args, Debug)]
struct JobArgs {
    /// Target language code (e.g., 'fr', 'de', 'ja'); defaults to the configured one
    #[arg(short = 'l', long)]
    target_language: Option<String>,

    /// Source language code; detected per chunk when absent
    #[arg(short, long)]
    source_language: Option<String>,

    #[arg(short, long, value_enum, default_value = "standard")]
    tier: CliTier,

    /// Translate text only, without asking the model to keep markup
    #[arg(long)]
    no_preserve_formatting: bool,
}

impl JobArgs {
    fn submission(&self, path: &Path, config: &Config) -> JobSubmission {
        let target = self
            .target_language
            .clone()
            .unwrap_or_else(|| config.target_language.clone());
        let mut submission = JobSubmission::file(path, target, self.tier.into())
            .with_preserve_formatting(!self.no_preserve_formatting);
        if let Some(source) = self.source_language.clone().or_else(|| config.source_language.clone()) {
            submission = submission.with_source_language(source);
        }
        submission
    }
}

/// doctran - tiered document translation with LLMs
#[derive(Parser, Debug)]
#[command(name = "doctran")]
#[command(version)]
#[command(about = "Chunk, queue and translate long documents with LLM backends")]
#[command(long_about = "doctran splits documents into token-bounded chunks and translates them through a persistent job queue.

EXAMPLES:
    doctran analyze report.md                        # Estimate tokens and pick a tier
    doctran chunk report.md --tier premium --json    # Inspect chunks and their DNA
    doctran submit docs/ -l de --tier basic          # Queue every .txt/.md file under docs/
    doctran worker --workers 4                       # Process the queue until Ctrl-C
    doctran translate notes.md -l fr -o notes.fr.md  # One-shot translation with progress
    doctran completions bash > doctran.bash          # Generate bash completions

CONFIGURATION:
    Configuration is stored in conf.json by default. If the file does not
    exist, a default one is created. Each tier selects its provider, model,
    chunk sizes, concurrency and pacing.")]
struct CommandLineOptions {
    #[command(subcommand)]
    command: Commands,

    /// Configuration file path
    #[arg(short, long, global = true, default_value = "conf.json")]
    config: PathBuf,

    /// Job database path (defaults to the platform data directory)
    #[arg(long, global = true, env = "DOCTRAN_DATABASE")]
    database: Option<PathBuf>,

    /// Set logging level
    #[arg(long, global = true, value_enum)]
    log_level: Option<CliLogLevel>,
}

// @struct: Custom logger implementation
struct CustomLogger {
    level: LevelFilter,
}

impl CustomLogger {
    fn init(level: LevelFilter) -> Result<(), SetLoggerError> {
        log::set_boxed_logger(Box::new(CustomLogger { level: LevelFilter::Trace }))?;
        log::set_max_level(level);
        Ok(())
    }

    fn style_for_level(level: Level) -> (&'static str, &'static str) {
        match level {
            Level::Error => ("\x1B[1;31m", "❌ "),
            Level::Warn => ("\x1B[1;33m", "🚧 "),
            Level::Info => ("\x1B[1;32m", " "),
            Level::Debug => ("\x1B[1;36m", "🔍 "),
            Level::Trace => ("\x1B[1;35m", "📋 "),
        }
    }
}

impl Log for CustomLogger {
    fn enabled(&self, metadata: &Metadata) -> bool {
        metadata.level() <= self.level && metadata.level() <= log::max_level()
    }

    fn log(&self, record: &Record) {
        if self.enabled(record.metadata()) {
            let now = chrono::Local::now().format("%H:%M:%S.%3f");
            let (colour, emoji) = Self::style_for_level(record.level());
            let _ = writeln!(std::io::stderr(), "{}{} {} {}\x1B[0m", colour, now, emoji, record.args());
        }
    }

    fn flush(&self) {
        let _ = std::io::stderr().flush();
    }
}

#[tokio::main]
async fn main() -> Result<()> {
    CustomLogger::init(LevelFilter::Info)?;

    let cli = CommandLineOptions::parse();

    if let Commands::Completions { shell } = &cli.command {
        let mut cmd = CommandLineOptions::command();
        generate(*shell, &mut cmd, "doctran", &mut std::io::stdout());
        return Ok(());
    }

    if let Some(level) = cli.log_level {
        log::set_max_level(LogLevel::from(level).to_level_filter());
    }

    if !cli.config.exists() {
        warn!("Config file not found at '{}', creating default config.", cli.config.display());
    }
    let mut config = Config::load_or_create(&cli.config)?;
    if let Some(level) = cli.log_level {
        config.log_level = level.into();
    }
    config.validate().context("Configuration validation failed")?;
    log::set_max_level(config.log_level.to_level_filter());

    let database = cli.database.as_deref();

    match cli.command {
        Commands::Analyze { file } => run_analyze(&file).await,
        Commands::Chunk {
            file,
            tier,
            max_tokens,
            overlap,
            dna,
            json,
        } => {
            let overrides = ChunkOverrides {
                max_tokens,
                overlap,
                preserve_structure: None,
                generate_dna: dna.then_some(true),
            };
            run_chunk(&config, &file, tier.into(), &overrides, json).await
        }
        Commands::Submit { path, job } => run_submit(&config, database, &path, &job).await,
        Commands::Status { job_id } => run_status(&config, database, job_id.as_deref()).await,
        Commands::Worker { workers } => run_worker(config, database, workers).await,
        Commands::Translate { file, job, output } => {
            run_translate(&config, database, &file, &job, output.as_deref()).await
        }
        Commands::Stats => {
            let queue = JobQueue::open(&config, database)?;
            println!("{}", queue.stats().await?);
            Ok(())
        }
        Commands::Retry { job_id } => {
            let queue = JobQueue::open(&config, database)?;
            queue.retry(&job_id).await?;
            println!("Job {} requeued", job_id);
            Ok(())
        }
        Commands::Clean => {
            let queue = JobQueue::open(&config, database)?;
            let removed = queue.clean_failed().await?;
            println!("Removed {} failed job(s)", removed);
            Ok(())
        }
        Commands::Completions { .. } => Ok(()),
    }
}

async fn read_document(file: &Path) -> Result<String> {
    let extracted = PlainTextExtractor
        .extract(&doctran::database::JobInput::File(file.to_path_buf()))
        .await
        .with_context(|| format!("Failed to read {}", file.display()))?;
    Ok(extracted.text)
}

async fn run_analyze(file: &Path) -> Result<()> {
    let text = read_document(file).await?;
    let analysis = doctran::chunking::service::analyze_document(&text);

    println!("Characters:       {}", analysis.document_length);
    println!("Estimated tokens: {}", analysis.estimated_tokens);
    println!("Recommended tier: {}", analysis.recommended_tier);
    Ok(())
}

async fn run_chunk(config: &Config, file: &Path, tier: Tier, overrides: &ChunkOverrides, json: bool) -> Result<()> {
    let text = read_document(file).await?;
    let service = ChunkingService::new(&config.chunking)?;
    let overrides = (!overrides.is_empty()).then_some(overrides);
    let result = service.chunk_document(&text, tier, overrides).await?;

    if json {
        println!("{}", serde_json::to_string_pretty(&result)?);
        return Ok(());
    }

    println!(
        "{} chunks, {} tokens, {} tier, {}ms",
        result.len(),
        result.total_tokens,
        result.strategy_used,
        result.processing_time_ms
    );
    for chunk in &result.chunks {
        let language = chunk.dna.as_ref().map(|d| d.language.as_str()).unwrap_or("-");
        println!(
            "  [{}.{}] {:>5} tokens  bytes {}..{}  lang {}",
            chunk.section_index, chunk.local_index, chunk.token_count, chunk.start_offset, chunk.end_offset, language
        );
    }
    Ok(())
}

async fn run_submit(config: &Config, database: Option<&Path>, path: &Path, job: &JobArgs) -> Result<()> {
    let queue = JobQueue::open(config, database)?;

    let files: Vec<PathBuf> = if path.is_dir() {
        WalkDir::new(path)
            .into_iter()
            .filter_map(|e| e.ok())
            .map(|e| e.into_path())
            .filter(|p| p.is_file() && is_plain_text_path(p))
            .collect()
    } else if path.is_file() {
        vec![path.to_path_buf()]
    } else {
        return Err(anyhow!("Input path does not exist: {:?}", path));
    };

    if files.is_empty() {
        warn!("No .txt or .md files found under {:?}", path);
        return Ok(());
    }

    for file in files {
        match queue.submit(job.submission(&file, config)).await {
            Ok(id) => println!("{}  {}", id, file.display()),
            Err(e) => error!("Could not queue {}: {}", file.display(), e),
        }
    }
    Ok(())
}

fn print_status(view: &JobStatusView) {
    println!(
        "{}  {:<9} {:>3}%  {} -> {}  attempts {}/{}",
        view.id, view.status, view.progress, view.tier, view.target_language, view.attempts, view.max_attempts
    );
    if let Some(reason) = &view.failure_reason {
        println!("    last failure: {}", reason);
    }
}

async fn run_status(config: &Config, database: Option<&Path>, job_id: Option<&str>) -> Result<()> {
    let queue = JobQueue::open(config, database)?;

    match job_id {
        Some(id) => {
            let view = queue
                .get_status(id)
                .await?
                .ok_or_else(|| anyhow!("Job not found: {}", id))?;
            print_status(&view);
            if let Some(result) = &view.result {
                println!(
                    "    {} chunks, {} tokens, {}ms",
                    result.metadata.total_chunks, result.metadata.total_tokens, result.metadata.processing_time_ms
                );
            }
        }
        None => {
            for view in queue.recent(RECENT_JOBS).await? {
                print_status(&view);
            }
        }
    }
    Ok(())
}

fn build_pool(config: &Config, queue: Arc<JobQueue>, workers: Option<usize>) -> Result<WorkerPool> {
    let orchestrator = Arc::new(TranslationOrchestrator::from_config(config)?);
    let extractor: Arc<dyn TextExtractor> = Arc::new(PlainTextExtractor);

    let mut settings = config.queue.clone();
    if let Some(workers) = workers {
        settings.workers = workers;
    }
    Ok(WorkerPool::new(queue, orchestrator, extractor, &settings))
}

async fn run_worker(config: Config, database: Option<&Path>, workers: Option<usize>) -> Result<()> {
    let queue = Arc::new(JobQueue::open(&config, database)?);
    let pool = build_pool(&config, queue, workers)?;

    let (shutdown_tx, shutdown_rx) = watch::channel(false);
    tokio::spawn(async move {
        if tokio::signal::ctrl_c().await.is_ok() {
            info!("Shutting down after the current jobs");
            let _ = shutdown_tx.send(true);
        }
    });

    pool.run(shutdown_rx).await;
    Ok(())
}

async fn run_translate(
    config: &Config,
    database: Option<&Path>,
    file: &Path,
    job: &JobArgs,
    output: Option<&Path>,
) -> Result<()> {
    let queue = Arc::new(JobQueue::open(config, database)?);
    let id = queue.submit(job.submission(file, config)).await?;
    let pool = build_pool(config, queue.clone(), None)?;

    let progress_bar = ProgressBar::new(100);
    let style = ProgressStyle::default_bar()
        .template("{spinner:.green} [{elapsed_precise}] [{bar:40.cyan/blue}] {pos}% {msg}")
        .unwrap_or_else(|_| ProgressStyle::default_bar());
    progress_bar.set_style(style.progress_chars("█▓▒░"));
    progress_bar.set_message(file.display().to_string());

    let drain = pool.run_until(&id);
    tokio::pin!(drain);
    loop {
        tokio::select! {
            result = &mut drain => {
                result?;
                break;
            }
            _ = tokio::time::sleep(PROGRESS_POLL) => {
                if let Some(view) = queue.get_status(&id).await? {
                    progress_bar.set_position(view.progress as u64);
                }
            }
        }
    }

    let view = queue
        .get_status(&id)
        .await?
        .ok_or_else(|| anyhow!("Job {} disappeared from the queue", id))?;

    match (view.status, view.result) {
        (JobStatus::Completed, Some(translation)) => {
            progress_bar.finish_with_message("done");
            match output {
                Some(path) => {
                    std::fs::write(path, &translation.translated_text)
                        .with_context(|| format!("Failed to write {}", path.display()))?;
                    info!("Success: {:?}", path);
                }
                None => println!("{}", translation.translated_text),
            }
            Ok(())
        }
        (status, _) => {
            progress_bar.abandon_with_message("failed");
            Err(anyhow!(
                "Job {} ended {}: {}",
                id,
                status,
                view.failure_reason.as_deref().unwrap_or("no reason recorded")
            ))
        }
    }
}
