use std::{net::SocketAddr, sync::Arc, time::Duration};

use anyhow::Context;
use axum::{
    Json, Router,
    extract::{Path, Query, State, rejection::JsonRejection},
    response::IntoResponse,
    routing::{get, post},
};
use ragapi_core::{
    DocumentId, RagPipeline, RequestContext, ScoredDocument, VectorStore, bootstrap,
};
use serde::{Deserialize, Serialize};
use serde_json::json;
use tokio_util::sync::CancellationToken;
use tower_http::trace::TraceLayer;
use tracing::{info, warn};

use crate::error::ApiError;
use crate::settings::Settings;

#[derive(Clone)]
pub struct AppState {
    pub pipeline: Arc<RagPipeline>,
    /// Budget for each request, covering every pipeline stage.
    pub request_timeout: Duration,
    /// Cancelled on shutdown; every request context is a child of it.
    pub shutdown: CancellationToken,
}

impl AppState {
    pub fn new(pipeline: Arc<RagPipeline>, request_timeout: Duration) -> Self {
        Self { pipeline, request_timeout, shutdown: CancellationToken::new() }
    }

    /// Tie in-flight requests to `token`, so cancelling it ends them.
    pub fn with_shutdown(mut self, token: CancellationToken) -> Self {
        self.shutdown = token;
        self
    }

    fn request_context(&self) -> RequestContext {
        RequestContext::with_timeout(self.request_timeout)
            .with_cancellation(self.shutdown.child_token())
    }

    fn tag_or_default<'a>(&'a self, tag: &'a Option<String>) -> &'a str {
        tag.as_deref().unwrap_or(&self.pipeline.config().source_tag)
    }
}

#[derive(Debug, Deserialize)]
pub struct DataRequest {
    pub data: String,
    #[serde(default)]
    pub tag: Option<String>,
}

#[derive(Debug, Serialize, Deserialize)]
pub struct DataResponse {
    pub message: String,
    pub id: DocumentId,
}

#[derive(Debug, Default, Deserialize)]
pub struct SearchParams {
    #[serde(default)]
    pub tag: Option<String>,
}

#[derive(Debug, Serialize, Deserialize)]
pub struct Source {
    pub id: DocumentId,
    pub content: String,
    pub source_tag: String,
    pub score: f32,
}

impl From<ScoredDocument> for Source {
    fn from(scored: ScoredDocument) -> Self {
        Self {
            id: scored.document.id,
            content: scored.document.content,
            source_tag: scored.document.source_tag,
            score: scored.score,
        }
    }
}

#[derive(Debug, Serialize, Deserialize)]
pub struct SearchResponse {
    pub query: String,
    pub response: String,
    pub grounded: bool,
    pub sources: Vec<Source>,
}

pub fn app_router(state: AppState) -> Router {
    Router::new()
        .route("/ping", get(ping))
        .route("/health", get(health))
        .route("/data", post(insert_data))
        .route("/search/{query}", get(search))
        .with_state(state)
        .layer(TraceLayer::new_for_http())
}

/// Wire providers and store from `settings` into a pipeline.
pub async fn build_pipeline(settings: &Settings) -> anyhow::Result<RagPipeline> {
    let embedding_provider = bootstrap::embedding_provider(&settings.embedding)
        .context("failed to create embedding provider")?;
    let generation_provider = bootstrap::generation_provider(&settings.generation)
        .context("failed to create generation provider")?;
    let vector_store = bootstrap::vector_store(&settings.store, settings.embedding.dimensions)
        .await
        .context("failed to open vector store")?;

    RagPipeline::builder()
        .config(settings.rag.clone())
        .embedding_provider(embedding_provider)
        .generation_provider(generation_provider)
        .vector_store(vector_store)
        .build()
        .context("failed to assemble pipeline")
}

pub async fn run_server(settings: Settings) -> anyhow::Result<()> {
    let pipeline = build_pipeline(&settings).await?;
    let shutdown = CancellationToken::new();
    let state = AppState::new(Arc::new(pipeline), settings.request_timeout)
        .with_shutdown(shutdown.clone());
    let app = app_router(state);
    let addr: SocketAddr = format!("{}:{}", settings.host, settings.port)
        .parse()
        .with_context(|| "invalid host/port for ragapi server")?;

    let listener = tokio::net::TcpListener::bind(addr).await?;
    info!("ragapi listening on http://{}", addr);
    axum::serve(listener, app).with_graceful_shutdown(shutdown_signal(shutdown)).await?;
    info!("ragapi stopped");
    Ok(())
}

async fn shutdown_signal(shutdown: CancellationToken) {
    match tokio::signal::ctrl_c().await {
        Ok(()) => info!("shutdown requested; cancelling in-flight requests"),
        Err(e) => warn!(error = %e, "failed to listen for ctrl-c; shutting down"),
    }
    shutdown.cancel();
}

async fn ping() -> impl IntoResponse {
    Json(json!({ "message": "pong" }))
}

async fn health(State(state): State<AppState>) -> Result<impl IntoResponse, ApiError> {
    let store = state.pipeline.vector_store();
    let documents = store.count().await?;
    Ok(Json(json!({
        "status": "ok",
        "documents": documents,
        "dimensions": store.dimensions(),
    })))
}

async fn insert_data(
    State(state): State<AppState>,
    payload: Result<Json<DataRequest>, JsonRejection>,
) -> Result<Json<DataResponse>, ApiError> {
    let Json(request) = payload.map_err(|rejection| {
        warn!(error = %rejection, "rejected /data body");
        ApiError::InvalidBody
    })?;

    let ctx = state.request_context();
    let tag = state.tag_or_default(&request.tag);
    let id = state.pipeline.ingest_with_tag(&ctx, &request.data, tag).await?;

    Ok(Json(DataResponse { message: "Data inserted successfully".to_string(), id }))
}

async fn search(
    Path(query): Path<String>,
    Query(params): Query<SearchParams>,
    State(state): State<AppState>,
) -> Result<Json<SearchResponse>, ApiError> {
    let ctx = state.request_context();
    let tag = state.tag_or_default(&params.tag);
    let answer = state.pipeline.query(&ctx, &query, tag).await?;

    Ok(Json(SearchResponse {
        query: answer.query,
        response: answer.response,
        grounded: answer.grounded,
        sources: answer.context.into_iter().map(Source::from).collect(),
    }))
}
