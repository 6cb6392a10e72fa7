mod api;
mod middleware;
mod scheduler;

use std::sync::Arc;

use compintel_client::{ExchangeRateClient, OpenAiExtractionService, SearchClient};
use compintel_core::AppConfig;
use compintel_db::PgStore;
use compintel_pipeline::{Pipeline, PipelineDeps};
use tracing_subscriber::EnvFilter;

use crate::{
    api::{build_app, default_rate_limit_state, AppState},
    middleware::AuthState,
};

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    dotenvy::dotenv().ok();
    let config = Arc::new(compintel_core::load_app_config()?);
    let env_filter = EnvFilter::try_from_default_env()
        .or_else(|_| EnvFilter::try_new(config.log_level.clone()))?;
    tracing_subscriber::fmt().with_env_filter(env_filter).init();

    let pool_config = compintel_db::PoolConfig::from_app_config(&config);
    let pool = compintel_db::connect_pool(&config.database_url, pool_config).await?;
    let applied = compintel_db::run_migrations(&pool).await?;
    tracing::info!(applied, "migrations up to date");

    let _scheduler = scheduler::build_scheduler(pool.clone()).await?;

    let pipeline = build_pipeline(&config, PgStore::new(pool.clone()))?;
    let auth = AuthState::from_env(matches!(
        config.env,
        compintel_core::Environment::Development
    ))?;
    let app = build_app(
        AppState {
            pipeline: Arc::new(pipeline),
            pool: Some(pool),
        },
        auth,
        default_rate_limit_state(),
    );

    let listener = tokio::net::TcpListener::bind(config.bind_addr).await?;
    tracing::info!(addr = %config.bind_addr, env = %config.env, "compintel-server listening");
    axum::serve(listener, app)
        .with_graceful_shutdown(shutdown_signal())
        .await?;
    Ok(())
}

fn build_pipeline(config: &Arc<AppConfig>, store: PgStore) -> anyhow::Result<Pipeline> {
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

async fn shutdown_signal() {
    let ctrl_c = async {
        if let Err(e) = tokio::signal::ctrl_c().await {
            tracing::error!(error = %e, "failed to listen for ctrl-c");
            std::future::pending::<()>().await;
        }
    };

    #[cfg(unix)]
    let terminate = async {
        match tokio::signal::unix::signal(tokio::signal::unix::SignalKind::terminate()) {
            Ok(mut signal) => {
                signal.recv().await;
            }
            Err(e) => {
                tracing::error!(error = %e, "failed to install SIGTERM handler");
                std::future::pending::<()>().await;
            }
        }
    };

    #[cfg(not(unix))]
    let terminate = std::future::pending::<()>();

    tokio::select! {
        () = ctrl_c => {},
        () = terminate => {},
    }

    tracing::info!("received shutdown signal, starting graceful shutdown");
}
