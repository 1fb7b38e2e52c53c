use std::sync::Arc;
use std::time::Duration;

use tokio_util::sync::CancellationToken;

use messenger_api::{MessageStore, StoreFactory};
use messenger_api_server::ApiState;
use messenger_engine::{Coordinator, LiveChannel};
use messenger_storage_file::FileStoreFactory;
use messenger_storage_memory::MemoryStoreFactory;

use crate::config::{ServeArgs, ServerConfig};
use crate::error::ServerError;

/// How long in-flight requests get to finish after Ctrl+C.
const DRAIN_TIMEOUT: Duration = Duration::from_secs(5);

/// Resolve a store backend by name.
fn store_factory(name: &str) -> Result<&'static dyn StoreFactory, ServerError> {
    match name {
        "memory" => Ok(&MemoryStoreFactory),
        "file" => Ok(&FileStoreFactory),
        other => Err(ServerError::UnknownStorage(other.to_string())),
    }
}

pub async fn run(args: ServeArgs) -> Result<(), ServerError> {
    tracing::info!("messenger-server starting");

    // --- Load config ---
    let config = ServerConfig::load(&args.config)?;
    config.engine.validate()?;
    tracing::info!(config = %args.config, "loaded config");

    // --- Store ---
    let config_json = config.storage_config_json()?;
    let store: Arc<dyn MessageStore> = store_factory(&config.storage)?
        .create(&config_json)
        .map_err(|e| ServerError::Config { context: "storage_config", detail: e.to_string() })?;

    // --- Engine ---
    let channel = Arc::new(LiveChannel::new());
    let coordinator = Arc::new(Coordinator::new(store, channel.clone(), &config.engine));
    coordinator.init().await?;
    tracing::info!(
        storage = %config.storage,
        max_content_len = config.engine.max_content_len,
        store_timeout_ms = config.engine.store_timeout_ms,
        "message store ready"
    );

    // --- API server (HTTP + WS) ---
    let token = CancellationToken::new();
    let state = ApiState::new(
        coordinator.clone(),
        channel,
        config.ws_buffer,
        config.ws_overflow,
    );
    let api_token = token.clone();
    let api_port = config.api_port;
    let mut api_handle = tokio::spawn(async move {
        if let Err(e) = messenger_api_server::run(api_port, state, api_token).await {
            tracing::error!(error = %e, "api server error");
        }
    });

    tracing::info!("server ready");

    // --- Wait for Ctrl+C ---
    tokio::select! {
        res = tokio::signal::ctrl_c() => res?,
        _ = &mut api_handle => {
            tracing::warn!("api server exited early");
        }
    }
    tracing::info!("shutting down...");

    token.cancel();
    if !api_handle.is_finished()
        && tokio::time::timeout(DRAIN_TIMEOUT, &mut api_handle).await.is_err()
    {
        tracing::warn!("api server did not drain in time, aborting");
        api_handle.abort();
    }

    if let Err(e) = coordinator.flush().await {
        tracing::error!(error = %e, "store flush error");
    }

    tracing::info!("shutdown complete");
    Ok(())
}
