mod reports;
mod research;

use std::path::PathBuf;
use std::sync::Arc;

use clap::{Parser, Subcommand};
use compintel_client::{ExchangeRateClient, OpenAiExtractionService, SearchClient};
use compintel_core::AppConfig;
use compintel_db::PgStore;
use compintel_pipeline::{Pipeline, PipelineDeps};
use tracing_subscriber::EnvFilter;

use crate::reports::ReportsCommands;

#[derive(Debug, Parser)]
#[command(name = "compintel-cli")]
#[command(about = "Competitor product intelligence command line interface")]
struct Cli {
    #[command(subcommand)]
    command: Option<Commands>,
}

#[derive(Debug, Subcommand)]
enum Commands {
    /// Database maintenance
    Db {
        #[command(subcommand)]
        command: DbCommands,
    },
    /// Manage the subject catalog
    Subjects {
        #[command(subcommand)]
        command: SubjectsCommands,
    },
    /// Run the whole research pipeline for one subject
    Research {
        /// Subject identifier from the catalog
        subject_id: String,
        /// Analyze the first N candidate URLs
        #[arg(long, default_value = "5")]
        select: usize,
        /// Analyze exactly these URLs instead of the top candidates
        #[arg(long = "url")]
        urls: Vec<String>,
        /// Bypass the search cache and the cooldown
        #[arg(long)]
        force_refresh: bool,
    },
    /// Inspect, cancel, or delete reports
    Reports {
        #[command(subcommand)]
        command: ReportsCommands,
    },
    /// Show today's API credit usage
    Usage,
    /// Response cache maintenance
    Cache {
        #[command(subcommand)]
        command: CacheCommands,
    },
}

#[derive(Debug, Subcommand)]
enum DbCommands {
    /// Check database connectivity
    Ping,
    /// Apply pending migrations
    Migrate,
}

#[derive(Debug, Subcommand)]
enum SubjectsCommands {
    /// Upsert subjects from a YAML catalog file
    Load {
        #[arg(default_value = "config/subjects.yaml")]
        path: PathBuf,
    },
}

#[derive(Debug, Subcommand)]
enum CacheCommands {
    /// Delete expired cache entries
    Purge,
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    dotenvy::dotenv().ok();
    let cli = Cli::parse();

    let Some(command) = cli.command else {
        println!("compintel-cli ready; run with --help for commands");
        return Ok(());
    };

    let config = Arc::new(compintel_core::load_app_config()?);
    let env_filter = EnvFilter::try_from_default_env()
        .or_else(|_| EnvFilter::try_new(config.log_level.clone()))?;
    tracing_subscriber::fmt()
        .with_env_filter(env_filter)
        .with_writer(std::io::stderr)
        .init();

    let pool_config = compintel_db::PoolConfig::from_app_config(&config);
    let pool = compintel_db::connect_pool(&config.database_url, pool_config).await?;

    match command {
        Commands::Db {
            command: DbCommands::Ping,
        } => {
            compintel_db::health_check(&pool).await?;
            println!("database ok");
        }
        Commands::Db {
            command: DbCommands::Migrate,
        } => {
            let applied = compintel_db::run_migrations(&pool).await?;
            println!("applied {applied} migration(s)");
        }
        Commands::Subjects {
            command: SubjectsCommands::Load { path },
        } => {
            let file = compintel_core::load_subjects(&path)?;
            let count = compintel_db::upsert_subjects(&pool, &file.subjects).await?;
            println!("upserted {count} subject(s) from {}", path.display());
        }
        Commands::Research {
            subject_id,
            select,
            urls,
            force_refresh,
        } => {
            let store = PgStore::new(pool);
            let pipeline = build_pipeline(&config, store.clone())?;
            let options = research::ResearchOptions {
                select,
                urls,
                force_refresh,
            };
            research::run_research(&pipeline, &store, &subject_id, &options).await?;
        }
        Commands::Reports { command } => {
            reports::run_reports_command(&config, PgStore::new(pool), command).await?;
        }
        Commands::Usage => {
            reports::run_usage(&pool, config.daily_credit_budget).await?;
        }
        Commands::Cache {
            command: CacheCommands::Purge,
        } => {
            let purged = compintel_db::purge_expired_cache_entries(&pool).await?;
            println!("purged {purged} expired cache entries");
        }
    }

    Ok(())
}

pub(crate) fn build_pipeline(config: &Arc<AppConfig>, store: PgStore) -> anyhow::Result<Pipeline> {
    let store = Arc::new(store);
    let search = SearchClient::from_config(config)?.with_ledger(store.clone());
    let rates = ExchangeRateClient::from_config(config)?;
    let extraction = OpenAiExtractionService::from_config(config)?;

    Ok(Pipeline::new(PipelineDeps {
        reports: store.clone(),
        subjects: store.clone(),
        cache: store.clone(),
        ledger: store,
        config: config.clone(),
        search: Arc::new(search),
        rates: Arc::new(rates),
        extraction: Arc::new(extraction),
    }))
}
