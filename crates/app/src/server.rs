//! HTTP surface for ingestion triggers and questions.
//!
//! | Method | Path | Description |
//! |--------|------|-------------|
//! | `POST` | `/`, `/ingest` | Upload notification, direct or enveloped |
//! | `POST` | `/ask` | `{query}` → `{answer}` |
//! | `GET`  | `/health` | Liveness check |
//!
//! CORS permits any origin so a browser frontend can call `/ask` directly.

use axum::{
    body::Bytes,
    extract::State,
    http::StatusCode,
    response::{IntoResponse, Response},
    routing::{get, post},
    Json, Router,
};
use pdf_qa_core::{
    normalize_trigger, IngestError, IngestStatus, Ingestor, LocalBucketSource, QueryError,
    QuestionAnswerer, SqliteChunkStore,
};
use serde::{Deserialize, Serialize};
use serde_json::Value;
use std::sync::Arc;
use tower_http::cors::{Any, CorsLayer};
use tracing::{info, warn};
use uuid::Uuid;

pub type BucketIngestor = Ingestor<LocalBucketSource, SqliteChunkStore>;
pub type StoreAnswerer = QuestionAnswerer<SqliteChunkStore>;

#[derive(Clone)]
pub struct AppState {
    pub ingestor: Arc<BucketIngestor>,
    pub answerer: Arc<StoreAnswerer>,
}

pub fn router(state: AppState) -> Router {
    let cors = CorsLayer::new()
        .allow_origin(Any)
        .allow_methods(Any)
        .allow_headers(Any);

    Router::new()
        .route("/", post(handle_ingest))
        .route("/ingest", post(handle_ingest))
        .route("/ask", post(handle_ask))
        .route("/health", get(handle_health))
        .layer(cors)
        .with_state(state)
}

pub async fn run_server(bind_addr: &str, state: AppState) -> anyhow::Result<()> {
    let listener = tokio::net::TcpListener::bind(bind_addr).await?;
    info!(bind = bind_addr, "http server listening");
    axum::serve(listener, router(state)).await?;
    Ok(())
}

// ============ Errors ============

#[derive(Serialize)]
struct ErrorBody {
    error: String,
}

struct AppError {
    status: StatusCode,
    message: String,
}

impl AppError {
    fn bad_request(message: impl Into<String>) -> Self {
        Self {
            status: StatusCode::BAD_REQUEST,
            message: message.into(),
        }
    }
}

impl IntoResponse for AppError {
    fn into_response(self) -> Response {
        (
            self.status,
            Json(ErrorBody {
                error: self.message,
            }),
        )
            .into_response()
    }
}

impl From<QueryError> for AppError {
    fn from(err: QueryError) -> Self {
        match err {
            QueryError::EmptyQuery => AppError::bad_request(err.to_string()),
        }
    }
}

// ============ POST /ingest ============

#[derive(Debug, Serialize)]
pub struct IngestResponse {
    pub status: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub file: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub pages: Option<usize>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub chunks: Option<usize>,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub failed_pages: Vec<u32>,
}

impl IngestResponse {
    fn status_only(status: &str) -> Self {
        Self {
            status: status.to_string(),
            file: None,
            pages: None,
            chunks: None,
            failed_pages: Vec::new(),
        }
    }
}

async fn handle_ingest(
    State(state): State<AppState>,
    body: Bytes,
) -> Result<Json<IngestResponse>, (StatusCode, Json<IngestResponse>)> {
    let request_id = Uuid::new_v4();
    let no_event_data = || Ok(Json(IngestResponse::status_only("No event data")));

    if body.iter().all(u8::is_ascii_whitespace) {
        return no_event_data();
    }

    let unknown_format = || {
        warn!(%request_id, "unknown event format");
        (
            StatusCode::BAD_REQUEST,
            Json(IngestResponse::status_only("Unknown event format")),
        )
    };

    let event: Value = serde_json::from_slice(&body).map_err(|_| unknown_format())?;
    if is_empty_event(&event) {
        info!(%request_id, "empty event, nothing to ingest");
        return no_event_data();
    }
    let object = match normalize_trigger(event) {
        Ok(object) => object,
        Err(IngestError::InvalidTrigger(_)) => return Err(unknown_format()),
        Err(err) => {
            warn!(%request_id, error = %err, "rejecting trigger");
            return Err(unknown_format());
        }
    };

    info!(%request_id, bucket = %object.bucket, file = %object.object_name, "ingestion trigger");
    let report = state.ingestor.ingest(&object).await;

    let response = match report.status {
        IngestStatus::Skipped => IngestResponse::status_only(report.status_message()),
        IngestStatus::Processed | IngestStatus::Failed => IngestResponse {
            status: report.status_message().to_string(),
            file: Some(report.document_name.clone()),
            pages: Some(report.pages_extracted),
            chunks: Some(report.chunks_written),
            failed_pages: report
                .page_failures
                .iter()
                .map(|failure| failure.page_number)
                .collect(),
        },
    };

    Ok(Json(response))
}

/// `null`, `false`, zero and empty strings, arrays or objects carry no event.
fn is_empty_event(event: &Value) -> bool {
    match event {
        Value::Null => true,
        Value::Bool(flag) => !flag,
        Value::Number(number) => number.as_f64() == Some(0.0),
        Value::String(text) => text.is_empty(),
        Value::Array(items) => items.is_empty(),
        Value::Object(fields) => fields.is_empty(),
    }
}

// ============ POST /ask ============

#[derive(Debug, Deserialize)]
pub struct AskRequest {
    #[serde(default)]
    pub query: Option<String>,
}

#[derive(Debug, Serialize)]
pub struct AskResponse {
    pub answer: String,
}

async fn handle_ask(
    State(state): State<AppState>,
    Json(request): Json<AskRequest>,
) -> Result<Json<AskResponse>, AppError> {
    let query = request.query.unwrap_or_default();
    let outcome = state.answerer.ask(&query).await?;
    Ok(Json(AskResponse {
        answer: outcome.into_message(),
    }))
}

// ============ GET /health ============

#[derive(Serialize)]
struct HealthResponse {
    status: &'static str,
}

async fn handle_health() -> Json<HealthResponse> {
    Json(HealthResponse { status: "ok" })
}
