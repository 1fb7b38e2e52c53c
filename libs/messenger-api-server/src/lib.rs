mod http;
mod ws;

use std::sync::Arc;

use axum::Router;
use axum::routing::get;
use tokio_util::sync::CancellationToken;

use messenger_api::{MessageSubscriber, OverflowPolicy};
use messenger_engine::Coordinator;

pub use ws::{LiveEnvelope, RECEIVE_EVENT};

/// Shared handler state.
#[derive(Clone)]
pub struct ApiState {
    coordinator: Arc<Coordinator>,
    subscriber: Arc<dyn MessageSubscriber>,
    ws_buffer: usize,
    ws_overflow: OverflowPolicy,
}

impl ApiState {
    pub fn new(
        coordinator: Arc<Coordinator>,
        subscriber: Arc<dyn MessageSubscriber>,
        ws_buffer: usize,
        ws_overflow: OverflowPolicy,
    ) -> Self {
        Self {
            coordinator,
            subscriber,
            ws_buffer,
            ws_overflow,
        }
    }
}

/// HTTP routes plus the `/ws` live feed.
pub fn router(state: ApiState) -> Router {
    Router::new()
        .route(
            "/api/messages",
            get(http::handle_list_messages).post(http::handle_send_message),
        )
        .route("/ws", get(ws::handle_ws))
        .with_state(state)
}

/// Serve the API on `0.0.0.0:{port}` until `shutdown` fires.
pub async fn run(port: u16, state: ApiState, shutdown: CancellationToken) -> std::io::Result<()> {
    let listener = tokio::net::TcpListener::bind(format!("0.0.0.0:{port}")).await?;
    tracing::info!(port, "api server (http+ws) listening");

    axum::serve(listener, router(state))
        .with_graceful_shutdown(shutdown.cancelled_owned())
        .await
}
