use anyhow::Context;
use clap::Parser; // for cli
use std::net::SocketAddr;
use std::sync::Arc;
use tracing_subscriber::EnvFilter;

use rag_gateway::config::Args;
use rag_gateway::rate_limit::run_evictor;
use rag_gateway::{AppState, build_router};

fn init_tracing() {
    let filter = EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| EnvFilter::new("info,rag_gateway=debug"));
    tracing_subscriber::fmt().with_env_filter(filter).init();
}

// this is main async function with tokio
#[tokio::main]
async fn main() -> anyhow::Result<()> {
    init_tracing();

    // parse cli arguments
    let args = Args::parse();

    if args.openai_api_key.is_none() {
        tracing::warn!("OPENAI_API_KEY not set, upstream calls will be unauthenticated");
    }

    let state = Arc::new(AppState::from_args(&args).context("invalid configuration")?);

    let restored = state.restore_index().await.context("failed to load index snapshot")?;
    if let Some(path) = &state.index_path {
        tracing::info!(restored, path = %path.display(), "vector index loaded");
    }

    // spawn the quota evictor
    tokio::spawn(run_evictor(
        Arc::clone(&state.quota),
        args.eviction_interval(),
    ));

    let app = build_router(Arc::clone(&state));

    let addr = format!("{}:{}", args.host, args.port);
    let listener = tokio::net::TcpListener::bind(&addr)
        .await
        .with_context(|| format!("failed to bind {}", addr))?;

    tracing::info!("Gateway running on http://{}", addr);
    tracing::info!("Forwarding to LLM API at {}", state.llm.base_url());
    tracing::info!(
        "Quota: {} requests per {:?} on paths under {}",
        state.quota.daily_limit(),
        state.quota.window(),
        state.quota.guarded_prefix()
    );

    axum::serve(
        listener,
        app.into_make_service_with_connect_info::<SocketAddr>(),
    )
    .await
    .context("server error")?;

    Ok(())
}
