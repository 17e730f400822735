use anyhow::Result;
use souq_api::run as run_api;
use souq_core::{Config, SouqContext};
use tracing_subscriber::EnvFilter;

fn init_tracing() {
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info"));
    let builder = tracing_subscriber::fmt().with_env_filter(filter);

    // LOG_FORMAT=json for log shippers, human-readable otherwise
    if std::env::var("LOG_FORMAT").map(|v| v == "json").unwrap_or(false) {
        builder.json().init();
    } else {
        builder.init();
    }
}

#[tokio::main]
async fn main() -> Result<()> {
    init_tracing();

    tracing::info!("Starting Souq marketplace server");

    let config = Config::from_env();
    let ctx = SouqContext::new(config).await?;

    tracing::info!("Souq context initialized ({:?} store)", ctx.config.store.backend);

    if ctx.config.store.rebuild_indexes_on_start {
        let rebuilt = ctx.users().rebuild_indexes().await?;
        tracing::info!("User indexes rebuilt for {} users", rebuilt);
    }

    run_api(ctx).await?;

    Ok(())
}
