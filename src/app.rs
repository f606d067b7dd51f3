/*
 * Responsibility
 * - Config読み込み → 依存生成 → Router 組み立て
 * - Middleware の適用 (credential bridge → limits → CORS → request-id/trace, inside out)
 * - axum::serve() で起動、SIGINT/SIGTERM で graceful shutdown
 */
use std::{panic, process, sync::Arc};

use anyhow::{Context, Result};
use axum::{Router, routing::get};
use tokio::signal;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

use crate::api;
use crate::config::Config;
use crate::middleware;
use crate::services::{
    auth::{CacheIdentityStore, IdentityStore},
    cache::{MemoryCache, ValkeyClient},
    gate::Gate,
    origin::OriginAllowlist,
    upstream::Forwarder,
};
use crate::state::AppState;

fn init_tracing() {
    // RUST_LOG=info,fleet_gateway=debug,tower_http=debug cargo run
    let filter = tracing_subscriber::EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new("info,tower_http=info"));

    tracing_subscriber::registry()
        .with(filter)
        .with(tracing_subscriber::fmt::layer())
        .init();
}

fn init_panic_hook(abort_on_panic: bool) {
    let default_hook = panic::take_hook();

    panic::set_hook(Box::new(move |info| {
        tracing::error!(?info, "panic");

        // Development: crash loudly. Production: default hook, keep serving.
        if abort_on_panic {
            process::abort();
        } else {
            default_hook(info);
        }
    }))
}

pub async fn run() -> Result<()> {
    init_tracing();

    let config = Config::from_env()?;
    init_panic_hook(!config.app_env.is_production());

    tracing::info!(
        "starting gateway in {:?} mode on {} → {}",
        config.app_env,
        config.addr,
        config.upstream_base_url
    );
    let state = build_state(config).await?;
    let addr = state.config.addr;
    let app = build_router(state);

    let listener = tokio::net::TcpListener::bind(addr)
        .await
        .with_context(|| format!("failed to bind {addr}"))?;
    axum::serve(listener, app)
        .with_graceful_shutdown(shutdown_signal())
        .await?;

    tracing::info!("gateway stopped");
    Ok(())
}

async fn build_state(config: Config) -> Result<AppState> {
    let identity: Arc<dyn IdentityStore> = match &config.valkey_url {
        Some(url) => {
            let client = ValkeyClient::new(url)
                .await
                .context("failed to connect to valkey")?;
            let store = CacheIdentityStore::new(client);
            tracing::info!(backend = store.backend_name(), "identity store ready");
            Arc::new(store)
        }
        None => {
            tracing::warn!("VALKEY_URL not set; sessions and tokens live in process memory");
            Arc::new(CacheIdentityStore::new(MemoryCache::new()))
        }
    };

    let forwarder = Forwarder::new(&config).context("failed to build upstream client")?;
    let origins = Arc::new(OriginAllowlist::from_config(&config));
    if origins.allows_any() {
        tracing::warn!("CORS_ALLOW_ALL_ORIGINS is on: every well-formed origin is admitted");
    }

    Ok(AppState::new(
        Arc::new(config),
        origins,
        Arc::new(Gate::with_default_policies()),
        identity,
        forwarder,
    ))
}

pub fn build_router(state: AppState) -> Router {
    let v1 = middleware::auth::credential::apply(api::v1::routes(), state.clone());

    let router = Router::new()
        .route("/health", get(api::v1::handlers::health::health))
        .nest("/api/v1", v1)
        .merge(api::proxy::routes())
        .with_state(state.clone());

    let router = middleware::http::apply_limits(router, &state.config);
    let router = middleware::cors::apply(router, Arc::clone(&state.origins));
    middleware::http::apply(router)
}

async fn shutdown_signal() {
    let ctrl_c = async {
        if let Err(err) = signal::ctrl_c().await {
            tracing::warn!(error = %err, "failed to listen for Ctrl+C");
            std::future::pending::<()>().await;
        }
    };

    #[cfg(unix)]
    let terminate = async {
        match signal::unix::signal(signal::unix::SignalKind::terminate()) {
            Ok(mut sigterm) => {
                sigterm.recv().await;
            }
            Err(err) => {
                tracing::warn!(error = %err, "failed to listen for SIGTERM");
                std::future::pending::<()>().await;
            }
        }
    };

    #[cfg(not(unix))]
    let terminate = std::future::pending::<()>();

    tokio::select! {
        _ = ctrl_c => {},
        _ = terminate => {},
    }

    tracing::info!("shutdown signal received, draining connections");
}
