use std::collections::BTreeMap;
use std::time::Duration;

use axum::Json;
use axum::extract::{Query, State};
use axum::http::StatusCode;
use axum::response::{IntoResponse, Response};
use serde::Deserialize;

use messenger_api::{MessageCandidate, StoreError, SubmitError, ValidationError};

use super::ApiState;

/// Window used by `GET /api/messages` when no bound is given.
const DEFAULT_WINDOW_MINUTES: u64 = 60;

// ═══════════════════════════════════════════════════════════════
//  REST: POST /api/messages
// ═══════════════════════════════════════════════════════════════

pub(crate) async fn handle_send_message(
    State(state): State<ApiState>,
    Json(candidate): Json<MessageCandidate>,
) -> Response {
    let violations = state.coordinator.policy().validate_all(&candidate);
    if !violations.is_empty() {
        return validation_response(&violations);
    }

    match state.coordinator.submit(candidate).await {
        Ok(message) => Json(message).into_response(),
        Err(SubmitError::Validation(e)) => validation_response(&[e]),
        Err(SubmitError::Store(e)) => store_error_response(&e),
    }
}

// ═══════════════════════════════════════════════════════════════
//  REST: GET /api/messages?sent-after=<ms> | ?within-minutes=<n>
// ═══════════════════════════════════════════════════════════════

#[derive(Deserialize)]
pub(crate) struct ListParams {
    #[serde(rename = "sent-after")]
    sent_after: Option<i64>,
    #[serde(rename = "within-minutes")]
    within_minutes: Option<u64>,
}

pub(crate) async fn handle_list_messages(
    State(state): State<ApiState>,
    Query(params): Query<ListParams>,
) -> Response {
    let result = match (params.sent_after, params.within_minutes) {
        (Some(_), Some(_)) => {
            return error_response(
                StatusCode::BAD_REQUEST,
                "use either sent-after or within-minutes, not both",
            );
        }
        (Some(since), None) => state.coordinator.get_since(since).await,
        (None, minutes) => {
            let minutes = minutes.unwrap_or(DEFAULT_WINDOW_MINUTES);
            let window = Duration::from_secs(minutes.saturating_mul(60));
            state.coordinator.get_within_last(window).await
        }
    };

    match result {
        Ok(messages) => Json(messages).into_response(),
        Err(e) => store_error_response(&e),
    }
}

// ═══════════════════════════════════════════════════════════════
//  Error mapping
// ═══════════════════════════════════════════════════════════════

/// 400 with `{"errors": {field: [reason, ...]}}`.
fn validation_response(errors: &[ValidationError]) -> Response {
    let mut by_field: BTreeMap<&'static str, Vec<&str>> = BTreeMap::new();
    for e in errors {
        by_field.entry(e.field.as_str()).or_default().push(&e.reason);
    }
    (
        StatusCode::BAD_REQUEST,
        Json(serde_json::json!({ "errors": by_field })),
    )
        .into_response()
}

fn store_error_response(e: &StoreError) -> Response {
    let status = match e {
        StoreError::Unavailable(_) => StatusCode::SERVICE_UNAVAILABLE,
        StoreError::Conflict(_) => StatusCode::INTERNAL_SERVER_ERROR,
    };
    error_response(status, &e.to_string())
}

fn error_response(status: StatusCode, msg: &str) -> Response {
    (status, Json(serde_json::json!({ "error": msg }))).into_response()
}
