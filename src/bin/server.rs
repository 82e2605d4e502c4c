use std::sync::Arc;

use anyhow::Context;
use clap::Parser;
use meritsim::{config, create_app, db, explain, run_migrations, AppState};
use tracing::{info, warn};
use tracing_appender::non_blocking::WorkerGuard;
use tracing_subscriber::layer::SubscriberExt;
use tracing_subscriber::util::SubscriberInitExt;
use tracing_subscriber::EnvFilter;

/// Installs stdout logging, plus daily JSON log files when `log_dir` is set
///
/// The returned guard flushes the file writer on drop and must live as long
/// as the server.
fn init_tracing(log_dir: Option<&std::path::Path>, debug: bool) -> anyhow::Result<Option<WorkerGuard>> {
    let default_level = if debug { "debug" } else { "info" };
    let filter = EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| EnvFilter::new(format!("meritsim={default_level},tower_http={default_level}")));

    let (file_layer, guard) = match log_dir {
        Some(dir) => {
            let appender = tracing_appender::rolling::daily(dir, "meritsim.log");
            let (writer, guard) = tracing_appender::non_blocking(appender);
            let layer = tracing_subscriber::fmt::layer()
                .json()
                .with_writer(writer);
            (Some(layer), Some(guard))
        }
        None => (None, None),
    };

    tracing_subscriber::registry()
        .with(filter)
        .with(tracing_subscriber::fmt::layer())
        .with(file_layer)
        .try_init()?;

    Ok(guard)
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    // Load environment variables
    dotenv::dotenv().ok();

    let args = config::CliArgs::parse();
    let debug = args.debug;
    let config = config::get_config(args);
    let _guard = init_tracing(config.log_dir.as_deref(), debug)?;

    info!("Starting MeritSim with {:?}", config);
    if config.uses_default_secret() {
        warn!("SECRET_KEY is not set; access tokens are signed with the default secret");
    }

    // Initialize the database pool
    let pool = db::init_pool(&config.database_url)
        .with_context(|| format!("failed to open database {}", config.database_url))?;
    {
        let mut conn = pool.get()?;
        run_migrations(&mut conn)?;
    }

    let explainer = explain::provider_from_config(&config)?;
    info!("Explanations served by {}", explainer.name());

    let state = AppState::new(Arc::new(pool), &config, explainer);
    let app = create_app(state);

    let listener = tokio::net::TcpListener::bind(&config.bind_address)
        .await
        .with_context(|| format!("failed to bind {}", config.bind_address))?;
    info!("Listening on {}", listener.local_addr()?);

    axum::serve(listener, app).await?;
    Ok(())
}
