//! Serendipity CLI — runs the mining pipeline stages against a SQLite store.
//!
//! Usage:
//!   serendipity import
//!   serendipity extract-thoughts
//!   serendipity build-distance-table
//!   serendipity mine --strategy p10-p40
//!   serendipity score --max-candidates 200
//!   serendipity recommend --limit 10

use clap::{Parser, Subcommand};
use std::path::PathBuf;
use std::sync::Arc;
use tracing_subscriber::EnvFilter;

use serendipity::config::{ConfigError, Settings};
use serendipity::distance::DistanceEngine;
use serendipity::embedding::Embedder;
use serendipity::llm::HttpLlmClient;
use serendipity::mining::CandidateMiner;
use serendipity::model::ThresholdStrategy;
use serendipity::notesource::HttpNoteSource;
use serendipity::recommend::RecommendationEngine;
use serendipity::scoring::BatchEvaluationWorker;
use serendipity::store::SqliteStore;
use serendipity::thoughts::ThoughtExtractor;

#[derive(Parser)]
#[command(name = "serendipity", version, about = "Conceptual-pair mining engine")]
struct Cli {
    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Import pages from the configured note source.
    Import,
    /// Extract thought units from notes pending extraction.
    ExtractThoughts,
    /// Build the full pair-distance table from scratch.
    BuildDistanceTable,
    /// Mine pair candidates from a similarity band.
    Mine {
        #[arg(long, default_value = "p10-p40")]
        strategy: String,
    },
    /// Score pending candidates through the LLM.
    Score {
        #[arg(long, default_value_t = 100)]
        max_candidates: u32,
    },
    /// Print tier-prioritized, diversity-blended essay recommendations.
    Recommend {
        #[arg(long, default_value_t = 10)]
        limit: u32,
    },
}

fn main() {
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")))
        .init();

    let settings = match Settings::from_env() {
        Ok(settings) => settings,
        Err(e) => {
            eprintln!("error: {e}");
            std::process::exit(fatal_config_exit_code(&e));
        }
    };

    let runtime = tokio::runtime::Runtime::new().expect("failed to start tokio runtime");
    let code = runtime.block_on(run(settings));
    std::process::exit(code);
}

fn fatal_config_exit_code(_e: &ConfigError) -> i32 {
    2
}

async fn run(settings: Settings) -> i32 {
    let cli = Cli::parse();

    let store = match SqliteStore::open(&settings.store_path) {
        Ok(store) => Arc::new(store),
        Err(e) => {
            eprintln!("error opening store: {e}");
            return 1;
        }
    };

    let result = match cli.command {
        Commands::Import => run_import(&settings, store).await,
        Commands::ExtractThoughts => run_extract_thoughts(&settings, store).await,
        Commands::BuildDistanceTable => run_build_distance_table(store).await,
        Commands::Mine { strategy } => run_mine(store, &strategy).await,
        Commands::Score { max_candidates } => run_score(&settings, store, max_candidates).await,
        Commands::Recommend { limit } => run_recommend(store, limit).await,
    };

    match result {
        Ok(()) => 0,
        Err(e) => {
            eprintln!("error: {e}");
            1
        }
    }
}

async fn run_import(settings: &Settings, store: Arc<SqliteStore>) -> serendipity::SerendipityResult<()> {
    let note_source = Arc::new(HttpNoteSource::new(
        "https://api.notion.com",
        settings.notesource_api_token.clone(),
        settings.fetch_target.clone(),
    ));
    let pipeline = serendipity::ingest::IngestPipeline::new(note_source, store);
    let job_id = uuid::Uuid::new_v4();
    let fetch_mode = match settings.fetch_target {
        serendipity::config::FetchTarget::Database { .. } => serendipity::model::FetchMode::Database,
        serendipity::config::FetchTarget::ParentPage { .. } => serendipity::model::FetchMode::ParentPage,
    };
    let config = serendipity::model::ImportJobConfig {
        fetch_mode,
        page_size: 100,
        fetch_all: true,
    };
    pipeline.run(job_id, config).await
}

async fn run_extract_thoughts(settings: &Settings, store: Arc<SqliteStore>) -> serendipity::SerendipityResult<()> {
    let llm = Arc::new(HttpLlmClient::new(
        "https://api.anthropic.com",
        settings.chat_provider_key.clone(),
        "claude-3-5-sonnet-latest",
    ));
    let embedder: Arc<dyn Embedder> = embedder_for(settings)?;
    let extractor = ThoughtExtractor::new(llm, embedder, store);
    extractor.process_pending_notes().await?;
    Ok(())
}

#[cfg(feature = "embeddings")]
fn embedder_for(_settings: &Settings) -> serendipity::SerendipityResult<Arc<dyn Embedder>> {
    let embedder = serendipity::embedding::FastEmbedEmbedder::default_model()
        .map_err(|e| serendipity::SerendipityError::ValidationFailure(e.to_string()))?;
    Ok(Arc::new(embedder))
}

#[cfg(not(feature = "embeddings"))]
fn embedder_for(_settings: &Settings) -> serendipity::SerendipityResult<Arc<dyn Embedder>> {
    Ok(Arc::new(serendipity::embedding::MockEmbedder::new(768)))
}

async fn run_build_distance_table(store: Arc<SqliteStore>) -> serendipity::SerendipityResult<()> {
    let engine = DistanceEngine::new(store);
    let inserted = engine.build_full().await?;
    println!("inserted {inserted} distance rows");
    Ok(())
}

async fn run_mine(store: Arc<SqliteStore>, strategy: &str) -> serendipity::SerendipityResult<()> {
    let strategy = parse_strategy(strategy);
    let engine = DistanceEngine::new(store.clone());
    let distribution = engine
        .distribution()
        .await?
        .ok_or_else(|| serendipity::SerendipityError::NotFound("no similarity distribution available yet".to_string()))?;
    let (min_sim, max_sim) = engine.resolve_threshold(strategy, &distribution.percentiles);

    let miner = CandidateMiner::new(store);
    let inserted = miner.mine(min_sim, max_sim).await?;
    println!("mined {inserted} candidates in band [{min_sim}, {max_sim}]");
    Ok(())
}

fn parse_strategy(raw: &str) -> ThresholdStrategy {
    match raw {
        "p10-p40" => ThresholdStrategy::P10P40,
        "p30-p60" => ThresholdStrategy::P30P60,
        "p0-p30" => ThresholdStrategy::P0P30,
        _ => ThresholdStrategy::P10P40,
    }
}

async fn run_score(settings: &Settings, store: Arc<SqliteStore>, max_candidates: u32) -> serendipity::SerendipityResult<()> {
    let llm = Arc::new(HttpLlmClient::new(
        "https://api.anthropic.com",
        settings.chat_provider_key.clone(),
        "claude-3-5-sonnet-latest",
    ));
    let worker = BatchEvaluationWorker::new(llm, store);
    let summary = worker.run_once(None, None, max_candidates).await?;
    println!(
        "evaluated {} migrated {} failed {}",
        summary.evaluated, summary.migrated, summary.failed
    );
    Ok(())
}

async fn run_recommend(store: Arc<SqliteStore>, limit: u32) -> serendipity::SerendipityResult<()> {
    let engine = RecommendationEngine::new(store);
    let recs = engine.recommend(limit).await?;
    for pair in recs {
        println!(
            "{:?} score={} tier={}",
            pair.pair, pair.claude_score, pair.quality_tier
        );
    }
    Ok(())
}
