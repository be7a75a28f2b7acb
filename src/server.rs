//! HTTP surface.
//!
//! | Method | Path | Response |
//! |--------|------|----------|
//! | GET | `/scrape` | [`ScrapeReport`]: 200 when every record persisted, 207 otherwise |
//! | GET | `/articles` | all articles |
//! | GET | `/articles/:id` | one article with its note populated |
//! | POST | `/articles/:id` | form body becomes a note; returns the updated user |
//!
//! Errors are rendered as `{"error": kind, "message": text}` with the status
//! chosen by [`ScrapeError`].

use crate::error::ScrapeError;
use crate::extract::ExtractRules;
use crate::fetch::PageSource;
use crate::models::{Article, ArticleWithNote, ScrapeReport, User};
use crate::pipeline::run_scrape;
use crate::store::{ArticleStore, Store};
use axum::extract::rejection::FormRejection;
use axum::extract::{Path, State};
use axum::http::StatusCode;
use axum::response::{IntoResponse, Response};
use axum::routing::get;
use axum::{Form, Json, Router};
use serde_json::{Map, Value, json};
use std::collections::BTreeMap;
use std::sync::Arc;
use tower_http::trace::TraceLayer;
use tracing::{error, info, instrument, warn};
use uuid::Uuid;

/// Everything a request handler needs, shared across requests.
///
/// `articles` and `store` are normally the same sled handle; scrapes and
/// article reads go through the [`ArticleStore`] contract, note attachment
/// needs the transactional [`Store`] itself.
pub struct AppState {
    pub articles: Arc<dyn ArticleStore>,
    pub store: Store,
    pub fetcher: Arc<dyn PageSource>,
    pub rules: ExtractRules,
    pub source_url: String,
    pub store_concurrency: usize,
}

pub fn router(state: Arc<AppState>) -> Router {
    Router::new()
        .route("/scrape", get(scrape))
        .route("/articles", get(list_articles))
        .route("/articles/:id", get(get_article).post(add_note))
        .layer(TraceLayer::new_for_http())
        .with_state(state)
}

impl IntoResponse for ScrapeError {
    fn into_response(self) -> Response {
        let status = match &self {
            ScrapeError::Network(_) | ScrapeError::Parse(_) => StatusCode::BAD_GATEWAY,
            ScrapeError::NotFound(_) => StatusCode::NOT_FOUND,
            ScrapeError::InvalidId(_) | ScrapeError::InvalidBody(_) => StatusCode::BAD_REQUEST,
            ScrapeError::Persistence(_) | ScrapeError::Config(_) => {
                StatusCode::INTERNAL_SERVER_ERROR
            }
        };
        if status.is_server_error() {
            error!(%status, error = %self, "Request failed");
        }
        let body = json!({ "error": self.kind(), "message": self.to_string() });
        (status, Json(body)).into_response()
    }
}

/// 200 for a clean run, 207 Multi-Status when some records were not stored.
fn report_status(report: &ScrapeReport) -> StatusCode {
    if report.is_complete() {
        StatusCode::OK
    } else {
        StatusCode::MULTI_STATUS
    }
}

#[instrument(level = "info", skip_all)]
async fn scrape(State(state): State<Arc<AppState>>) -> Result<Response, ScrapeError> {
    let report = run_scrape(
        state.fetcher.as_ref(),
        &state.rules,
        state.articles.as_ref(),
        &state.source_url,
        state.store_concurrency,
    )
    .await?;
    if !report.is_complete() {
        warn!(failed = report.errors.len(), "Scrape partially persisted");
    }
    Ok((report_status(&report), Json(report)).into_response())
}

async fn list_articles(
    State(state): State<Arc<AppState>>,
) -> Result<Json<Vec<Article>>, ScrapeError> {
    Ok(Json(state.articles.find_all().await?))
}

async fn get_article(
    State(state): State<Arc<AppState>>,
    Path(id): Path<String>,
) -> Result<Json<ArticleWithNote>, ScrapeError> {
    let id = Uuid::parse_str(&id)?;
    Ok(Json(state.articles.find_by_id(id).await?))
}

#[instrument(level = "info", skip(state, form))]
async fn add_note(
    State(state): State<Arc<AppState>>,
    Path(id): Path<String>,
    form: Result<Form<BTreeMap<String, String>>, FormRejection>,
) -> Result<Json<User>, ScrapeError> {
    let article_id = Uuid::parse_str(&id)?;
    let Form(fields) = form.map_err(|e| ScrapeError::InvalidBody(e.body_text()))?;
    let payload: Map<String, Value> = fields
        .into_iter()
        .map(|(k, v)| (k, Value::String(v)))
        .collect();
    let user = state.store.attach_note(article_id, payload).await?;
    info!(notes = user.notes.len(), "Note saved");
    Ok(Json(user))
}
