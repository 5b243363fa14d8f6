//! HTTP route handlers.

use std::sync::Arc;

use axum::{
    extract::State,
    http::StatusCode,
    response::Json,
    routing::{get, post},
    Router,
};
use serde_json::json;
use tower_http::cors::CorsLayer;
use tower_http::trace::TraceLayer;

use crate::backend::{asana::AsanaBackend, linear::LinearBackend, trello::TrelloBackend, Backend};
use crate::config::{clean_credential, AsanaConfig, Config, LinearConfig, TrelloConfig};
use crate::ops::signature::DedupFilter;
use crate::pipeline;

use super::types::*;

/// Shared application state.
pub struct AppState {
    pub config: Config,
}

/// Start the HTTP server.
pub async fn serve(config: Config) -> anyhow::Result<()> {
    let addr = format!("{}:{}", config.host, config.port);
    let state = Arc::new(AppState { config });

    let app = Router::new()
        .route("/api/health", get(health))
        .route("/api/operations", post(apply_operations))
        .layer(CorsLayer::permissive())
        .layer(TraceLayer::new_for_http())
        .with_state(state);

    let listener = tokio::net::TcpListener::bind(&addr).await?;
    tracing::info!("Server listening on {}", addr);
    axum::serve(listener, app).await?;
    Ok(())
}

async fn health() -> Json<serde_json::Value> {
    Json(json!({ "status": "ok" }))
}

/// Pick credentials for the requested platform, request values first,
/// server environment second.
fn build_backend(
    state: &AppState,
    request: &OperationsRequest,
) -> Result<Box<dyn Backend>, String> {
    match request.platform.to_lowercase().as_str() {
        "trello" => {
            let env = state.config.trello.as_ref();
            let api_key = clean_credential(request.api_key.as_deref())
                .or_else(|| env.map(|c| c.api_key.clone()));
            let token = clean_credential(request.token.as_deref())
                .or_else(|| env.map(|c| c.token.clone()));
            let board_id = clean_credential(request.board_id.as_deref())
                .or_else(|| env.map(|c| c.board_id.clone()));
            match (api_key, token, board_id) {
                (Some(api_key), Some(token), Some(board_id)) => {
                    Ok(Box::new(TrelloBackend::live(&TrelloConfig {
                        api_key,
                        token,
                        board_id,
                    })))
                }
                _ => Err("Trello requires api_key, token, and board_id".to_string()),
            }
        }
        "linear" => {
            let env = state.config.linear.as_ref();
            let api_key = clean_credential(request.linear_api_key.as_deref())
                .or_else(|| env.map(|c| c.api_key.clone()));
            let team_id = clean_credential(request.linear_team_id.as_deref())
                .or_else(|| env.and_then(|c| c.team_id.clone()));
            match api_key {
                Some(api_key) => Ok(Box::new(LinearBackend::live(&LinearConfig {
                    api_key,
                    team_id,
                }))),
                None => Err("Linear requires an API key".to_string()),
            }
        }
        "asana" => {
            let env = state.config.asana.as_ref();
            let token = clean_credential(request.asana_token.as_deref())
                .or_else(|| env.map(|c| c.token.clone()));
            let project_id = clean_credential(request.asana_project_id.as_deref())
                .or_else(|| env.map(|c| c.project_id.clone()));
            match (token, project_id) {
                (Some(token), Some(project_id)) => {
                    Ok(Box::new(AsanaBackend::live(&AsanaConfig { token, project_id })))
                }
                _ => Err("Asana requires a token and project_id".to_string()),
            }
        }
        other => Err(format!("unknown platform '{other}'")),
    }
}

async fn apply_operations(
    State(state): State<Arc<AppState>>,
    Json(request): Json<OperationsRequest>,
) -> Result<Json<OperationsResponse>, (StatusCode, Json<ErrorResponse>)> {
    let backend = build_backend(&state, &request).map_err(|error| {
        (
            StatusCode::BAD_REQUEST,
            Json(ErrorResponse { error }),
        )
    })?;

    let snapshot = backend.fetch_snapshot().await.map_err(|e| {
        tracing::error!(platform = %request.platform, error = %e, "snapshot fetch failed");
        (
            StatusCode::BAD_GATEWAY,
            Json(ErrorResponse {
                error: format!("failed to fetch workspace state: {e}"),
            }),
        )
    })?;

    let mut dedup = DedupFilter::with_processed(request.processed_signatures.iter().cloned());
    let outcome = pipeline::run_batch(
        &request.operations,
        request.transcript.as_deref(),
        backend.as_ref(),
        &snapshot,
        &mut dedup,
    )
    .await;

    let mut processed_signatures: Vec<String> =
        dedup.into_processed().into_iter().collect();
    processed_signatures.sort();

    Ok(Json(OperationsResponse {
        success: outcome.success,
        results: outcome.results,
        summary: outcome.summary,
        processed_signatures,
    }))
}
