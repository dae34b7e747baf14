//! Axum route handlers for the vocab API.

use crate::dashboard;
use crate::db::{Db, MatchMode, VocabFilter, VocabOrder};
use crate::schedule::{self, DEFAULT_DUE_LIMIT, PracticeError, Scheduler};
use crate::transfer::{self, TransferError};
use axum::Router;
use axum::extract::{Path, Query, State};
use axum::http::{StatusCode, header};
use axum::response::{IntoResponse, Json, Response};
use axum::routing::{delete, get, post};
use serde::{Deserialize, Serialize};
use std::sync::Arc;
use std::time::Instant;
use vocab_types::*;

const DEFAULT_PAGE_SIZE: i64 = 10;
const MAX_PAGE_SIZE: i64 = 50;

pub struct AppState {
    pub db: Arc<Db>,
    pub start_time: Instant,
}

type ApiResponse<T> = (StatusCode, Json<RpcResponse<T>>);

pub fn router(state: Arc<AppState>) -> Router {
    let cors = tower_http::cors::CorsLayer::permissive();

    Router::new()
        .route("/", get(dashboard::dashboard))
        .route("/api/vocab", get(list_vocab).post(create_vocab))
        .route("/api/vocab/:id", delete(delete_vocab))
        .route("/api/practice", get(practice_due).post(practice_submit))
        .route("/api/practice/count", get(practice_count))
        .route("/api/export", get(export_csv))
        .route("/api/import", post(import_csv))
        .route("/api/status", get(status))
        .with_state(state)
        .layer(cors)
}

fn ok<T: Serialize>(data: T) -> ApiResponse<T> {
    (StatusCode::OK, Json(RpcResponse::ok(data)))
}

fn fail<T: Serialize>(status: StatusCode, msg: impl Into<String>) -> ApiResponse<T> {
    (status, Json(RpcResponse::err(msg)))
}

/// Logs the store error and answers with a generic 500.
fn internal<T: Serialize>(context: &str, err: impl std::fmt::Display) -> ApiResponse<T> {
    log::error!("{}: {}", context, err);
    fail(StatusCode::INTERNAL_SERVER_ERROR, "Internal server error")
}

/// Query params are kept as strings; values that do not parse fall back to
/// their defaults instead of rejecting the request.
#[derive(Debug, Default, Deserialize)]
pub struct ListParams {
    pub term: Option<String>,
    pub translation: Option<String>,
    pub mode: Option<String>,
    pub order_by: Option<String>,
    pub skip: Option<String>,
    pub take: Option<String>,
}

fn int_param(value: Option<&str>, fallback: i64) -> i64 {
    value.and_then(|s| s.parse().ok()).unwrap_or(fallback)
}

// =====================================================
// Vocab Endpoints
// =====================================================

// GET /api/vocab
pub async fn list_vocab(
    State(state): State<Arc<AppState>>,
    Query(params): Query<ListParams>,
) -> ApiResponse<VocabPage> {
    let filter = VocabFilter {
        term: params.term,
        translation: params.translation,
        mode: match params.mode.as_deref() {
            Some("or") => MatchMode::Any,
            _ => MatchMode::All,
        },
        due_before: None,
    };
    let order = VocabOrder::from_param(params.order_by.as_deref().unwrap_or(""));
    let skip = int_param(params.skip.as_deref(), 0);
    let take = int_param(params.take.as_deref(), DEFAULT_PAGE_SIZE).min(MAX_PAGE_SIZE);

    match state.db.find_all(&filter, order, skip, take) {
        Ok((items, count)) => ok(VocabPage { count, items }),
        Err(e) => internal("Failed to list vocab", e),
    }
}

// POST /api/vocab
pub async fn create_vocab(
    State(state): State<Arc<AppState>>,
    Json(req): Json<CreateVocabRequest>,
) -> ApiResponse<CreatedResponse> {
    let term = req.term.unwrap_or_default();
    if term.is_empty() {
        return fail(StatusCode::BAD_REQUEST, "term is required");
    }
    let translation = req.translation.unwrap_or_default();
    if translation.is_empty() {
        return fail(StatusCode::BAD_REQUEST, "translation is required");
    }

    let vocab = NewVocab {
        term,
        translation,
        knowledge_level: 0,
        practice_at: schedule::today(),
    };
    match state.db.create(&vocab) {
        Ok(id) => {
            log::info!("Added vocab #{} ({})", id, vocab.term);
            ok(CreatedResponse { id })
        }
        Err(e) => internal("Failed to create vocab", e),
    }
}

// DELETE /api/vocab/:id
pub async fn delete_vocab(
    State(state): State<Arc<AppState>>,
    Path(id): Path<i64>,
) -> ApiResponse<bool> {
    match state.db.delete_by_id(id) {
        Ok(true) => ok(true),
        Ok(false) => fail(StatusCode::NOT_FOUND, format!("Vocab #{} not found", id)),
        Err(e) => internal("Failed to delete vocab", e),
    }
}

// =====================================================
// Practice Endpoints
// =====================================================

// GET /api/practice
pub async fn practice_due(State(state): State<Arc<AppState>>) -> ApiResponse<Vec<VocabEntry>> {
    match Scheduler::new(&state.db).list_due(DEFAULT_DUE_LIMIT) {
        Ok(items) => ok(items),
        Err(e) => internal("Failed to list due vocab", e),
    }
}

// GET /api/practice/count
pub async fn practice_count(State(state): State<Arc<AppState>>) -> ApiResponse<CountResponse> {
    match Scheduler::new(&state.db).count_due() {
        Ok(count) => ok(CountResponse { count }),
        Err(e) => internal("Failed to count due vocab", e),
    }
}

// POST /api/practice
pub async fn practice_submit(
    State(state): State<Arc<AppState>>,
    Json(outcomes): Json<Vec<PracticeOutcome>>,
) -> ApiResponse<usize> {
    match Scheduler::new(&state.db).apply_outcomes(&outcomes) {
        Ok(applied) => ok(applied),
        Err(PracticeError::NotFound(id)) => {
            log::warn!("Practice batch stopped at unknown vocab #{}", id);
            fail(StatusCode::NOT_FOUND, format!("Vocab #{} not found", id))
        }
        Err(e) => internal("Failed to apply practice outcomes", e),
    }
}

// =====================================================
// CSV Endpoints
// =====================================================

// GET /api/export
pub async fn export_csv(State(state): State<Arc<AppState>>) -> Response {
    let mut buf = Vec::new();
    match transfer::export(&state.db, &mut buf) {
        Ok(_) => (
            StatusCode::OK,
            [
                (header::CONTENT_TYPE, "text/csv; charset=utf-8"),
                (header::CONTENT_DISPOSITION, "attachment; filename=\"vocab.csv\""),
            ],
            buf,
        )
            .into_response(),
        Err(e) => internal::<()>("Failed to export vocab", e).into_response(),
    }
}

#[derive(Debug, Default, Deserialize)]
pub struct ImportParams {
    #[serde(default)]
    pub clean: bool,
}

// POST /api/import?clean=true
pub async fn import_csv(
    State(state): State<Arc<AppState>>,
    Query(params): Query<ImportParams>,
    body: String,
) -> ApiResponse<ImportSummary> {
    let result = if params.clean {
        transfer::import_clean(&state.db, body.as_bytes())
    } else {
        transfer::import(&state.db, body.as_bytes())
    };

    match result {
        Ok(imported) => ok(ImportSummary {
            imported,
            clean: params.clean,
        }),
        Err(
            e @ (TransferError::MissingColumn { .. }
            | TransferError::InvalidRow { .. }
            | TransferError::Csv(_)),
        ) => {
            log::warn!("Rejected CSV import: {}", e);
            fail(StatusCode::BAD_REQUEST, e.to_string())
        }
        Err(e) => internal("Failed to import vocab", e),
    }
}

// =====================================================
// Service
// =====================================================

// GET /api/status
pub async fn status(State(state): State<Arc<AppState>>) -> ApiResponse<ServiceStatus> {
    let total = state.db.count(&VocabFilter::default()).ok();
    let due = Scheduler::new(&state.db).count_due().ok();
    ok(ServiceStatus {
        running: true,
        uptime_secs: state.start_time.elapsed().as_secs(),
        total_entries: total.unwrap_or(0),
        due_count: due.unwrap_or(0),
    })
}
