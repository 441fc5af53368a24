// SPDX-License-Identifier: MIT

//! HTTP surface over a compiled graph

use axum::{
    extract::{Path, State},
    http::StatusCode,
    response::sse::{Event, KeepAlive, Sse},
    routing::{get, post},
    Json, Router,
};
use futures::stream::Stream;
use serde::Deserialize;
use serde_json::{json, Value};
use std::convert::Infallible;
use std::net::SocketAddr;
use std::sync::Arc;
use std::time::Duration;
use tokio_stream::StreamExt;
use tower_http::{cors::CorsLayer, trace::TraceLayer};

use crate::assistant;
use crate::error::GraphError;
use crate::graph::{CompiledGraph, RunConfig, StateUpdate};

#[derive(Clone)]
pub struct AppState {
    graph: Arc<CompiledGraph>,
}

impl AppState {
    pub fn new(graph: Arc<CompiledGraph>) -> Self {
        Self { graph }
    }
}

type ApiError = (StatusCode, Json<Value>);

/// Routes served for `state`
pub fn router(state: AppState) -> Router {
    Router::new()
        .route("/api/health", get(health_check))
        .route("/api/runs", post(create_run))
        .route("/api/runs/stream", post(stream_run))
        .route("/api/assistants/{id}/rules", get(get_rules))
        .layer(TraceLayer::new_for_http())
        .layer(CorsLayer::permissive())
        .with_state(state)
}

pub async fn serve(
    port: u16,
    graph: Arc<CompiledGraph>,
) -> Result<(), Box<dyn std::error::Error + Send + Sync>> {
    let app = router(AppState::new(graph));

    let addr = SocketAddr::from(([127, 0, 0, 1], port));
    log::info!("Listening on http://{}", addr);

    let listener = tokio::net::TcpListener::bind(addr).await?;
    axum::serve(listener, app).await?;

    Ok(())
}

async fn health_check(State(state): State<AppState>) -> Json<Value> {
    Json(json!({ "status": "ok", "graph": state.graph.name() }))
}

#[derive(Debug, Deserialize)]
struct RunRequest {
    #[serde(default)]
    input: StateUpdate,
    #[serde(default)]
    config: RunConfig,
}

async fn create_run(
    State(state): State<AppState>,
    Json(payload): Json<RunRequest>,
) -> Result<Json<Value>, ApiError> {
    match state.graph.invoke(payload.input, &payload.config).await {
        Ok(result) => Ok(Json(json!({ "status": "completed", "state": result.to_json() }))),
        Err(e) => Err(graph_error(e)),
    }
}

async fn stream_run(
    State(state): State<AppState>,
    Json(payload): Json<RunRequest>,
) -> Sse<impl Stream<Item = Result<Event, Infallible>>> {
    log::info!("Starting streaming run of graph '{}'", state.graph.name());

    let stream = state
        .graph
        .stream(payload.input, payload.config)
        .map(|event| {
            let event = Event::default()
                .json_data(&event)
                .unwrap_or_else(|e| Event::default().event("error").data(e.to_string()));
            Ok::<_, Infallible>(event)
        });

    Sse::new(stream).keep_alive(KeepAlive::new().interval(Duration::from_secs(1)))
}

async fn get_rules(
    State(state): State<AppState>,
    Path(id): Path<String>,
) -> Result<Json<Value>, ApiError> {
    match assistant::load_rules(state.graph.store().as_ref(), &id).await {
        Ok(rules) => Ok(Json(json!({ "assistant_id": id, "rules": rules }))),
        Err(e) => Err(graph_error(e.into())),
    }
}

fn status_for(err: &GraphError) -> StatusCode {
    match err {
        GraphError::UnknownField { .. } | GraphError::MissingPartitionKey { .. } => {
            StatusCode::BAD_REQUEST
        }
        _ => StatusCode::INTERNAL_SERVER_ERROR,
    }
}

fn graph_error(err: GraphError) -> ApiError {
    let status = status_for(&err);
    if status.is_server_error() {
        log::error!("Run failed: {}", err);
    }
    (status, Json(json!({ "error": err.to_string() })))
}
