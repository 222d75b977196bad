//! HTTP routes.
//!
//! A thin surface over the generation use cases. Every session gets a fresh
//! `GameState`; nothing is stored between requests.

use std::convert::Infallible;
use std::sync::Arc;

use axum::{
    body::Body,
    extract::{Path, State},
    http::{header, StatusCode},
    response::{IntoResponse, Response},
    routing::{get, post},
    Json, Router,
};
use futures_util::stream;
use roguegen_domain::{
    Area, Boss, EditOperation, GameState, GameStateEvent, Item, Monster, Validate,
};
use serde::{Deserialize, Serialize};
use tokio::sync::mpsc;
use tracing::Instrument;
use uuid::Uuid;

use crate::app::App;
use crate::use_cases::generation::{
    is_pregen, CompletionOutcome, CompletionStatus, ContentGenerator, CraftRequest,
    GenerationError, SEED_INSTRUCTION,
};

/// Create all HTTP routes.
pub fn routes() -> Router<Arc<App>> {
    Router::new()
        .route("/", get(health))
        .route("/api/health", get(health))
        .route("/generate", post(generate))
        .route("/generate/stream", post(generate_stream))
        .route("/setting/{theme}", post(setting))
        .route("/areas", post(areas))
        .route("/monsters", post(monsters))
        .route("/items", post(items))
        .route("/boss", post(boss))
        .route("/craft", post(craft))
}

async fn health() -> &'static str {
    "OK"
}

// =============================================================================
// Full generation
// =============================================================================

#[derive(Debug, Deserialize)]
struct GenerateRequest {
    theme: String,
    /// Free-form seed instruction
    #[serde(default)]
    ask: Option<String>,
    /// Partial game to continue from
    #[serde(default)]
    state: Option<GameState>,
}

impl GenerateRequest {
    /// The starting game and the seed instruction, if any.
    ///
    /// A blank game without an explicit ask is seeded with "Generate
    /// everything"; a partial game without one goes straight to gap filling.
    fn into_session(self) -> Result<(GameState, Option<String>), ApiError> {
        let state = match self.state {
            Some(state) if state.theme() != self.theme => {
                return Err(ApiError::BadRequest(format!(
                    "state theme '{}' does not match request theme '{}'",
                    state.theme(),
                    self.theme
                )));
            }
            Some(state) => state,
            None => GameState::new(self.theme),
        };

        let seed = self
            .ask
            .filter(|ask| !ask.trim().is_empty())
            .or_else(|| state.is_blank().then(|| SEED_INSTRUCTION.to_string()));

        state
            .validate()
            .map_err(|e| ApiError::BadRequest(e.to_string()))?;
        Ok((state, seed))
    }
}

#[derive(Debug, Serialize)]
struct GenerateResponse {
    #[serde(flatten)]
    state: GameState,
    status: CompletionStatus,
    remaining: Vec<String>,
    iterations: u32,
}

impl From<CompletionOutcome> for GenerateResponse {
    fn from(outcome: CompletionOutcome) -> Self {
        Self {
            remaining: outcome.remaining.iter().map(ToString::to_string).collect(),
            state: outcome.state,
            status: outcome.status,
            iterations: outcome.iterations,
        }
    }
}

fn session_span(route: &'static str, theme: &str) -> tracing::Span {
    let session = Uuid::new_v4();
    tracing::info_span!("generation", %session, route, theme)
}

async fn generate(
    State(app): State<Arc<App>>,
    Json(request): Json<GenerateRequest>,
) -> Result<Json<GenerateResponse>, ApiError> {
    if is_pregen(&request.theme) {
        return Ok(Json(GenerateResponse {
            state: app.fixtures.pregen().clone(),
            status: CompletionStatus::Converged,
            remaining: Vec::new(),
            iterations: 0,
        }));
    }

    let (state, seed) = request.into_session()?;
    let span = session_span("generate", state.theme());
    let outcome = app
        .use_cases
        .generation
        .content
        .complete(state, seed.as_deref())
        .instrument(span)
        .await?;

    Ok(Json(outcome.into()))
}

fn ndjson_line(value: &impl Serialize) -> String {
    let mut line = serde_json::to_string(value).unwrap_or_default();
    line.push('\n');
    line
}

fn error_line(error: &GenerationError) -> String {
    ndjson_line(&serde_json::json!({ "error": error.to_string() }))
}

/// Stream the seed edits as they arrive, then the gap-filling edits.
async fn stream_session(
    generation: &ContentGenerator,
    mut state: GameState,
    seed: Option<String>,
    tx: &mpsc::UnboundedSender<String>,
) -> Result<(), GenerationError> {
    if let Some(seed) = seed {
        let mut edits = generation.stream_seed(state, &seed).await?;
        while let Some(next) = edits.next_edit().await {
            let (edit, _) = next?;
            // A closed channel is handled by the caller's select.
            let _ = tx.send(ndjson_line(&edit));
        }
        state = edits.into_state();
    }

    let outcome = generation
        .complete_with_observer(
            state,
            None,
            &mut |edit: &EditOperation, _: &[GameStateEvent]| {
                let _ = tx.send(ndjson_line(edit));
            },
        )
        .await?;

    tracing::info!(
        status = ?outcome.status,
        iterations = outcome.iterations,
        remaining = outcome.remaining.len(),
        "Streamed session finished"
    );
    Ok(())
}

async fn generate_stream(
    State(app): State<Arc<App>>,
    Json(request): Json<GenerateRequest>,
) -> Result<Response, ApiError> {
    let (tx, mut rx) = mpsc::unbounded_channel::<String>();

    if is_pregen(&request.theme) {
        for edit in app.fixtures.pregen().to_edits() {
            let _ = tx.send(ndjson_line(&edit));
        }
        drop(tx);
    } else {
        let (state, seed) = request.into_session()?;
        let span = session_span("generate_stream", state.theme());
        let generation = Arc::clone(&app.use_cases.generation.content);

        tokio::spawn(
            async move {
                tokio::select! {
                    _ = tx.closed() => {
                        tracing::info!("Client disconnected, cancelling session");
                    }
                    result = stream_session(&generation, state, seed, &tx) => {
                        if let Err(error) = result {
                            tracing::error!(%error, "Streamed session failed");
                            let _ = tx.send(error_line(&error));
                        }
                    }
                }
            }
            .instrument(span),
        );
    }

    let lines = stream::poll_fn(move |cx| {
        rx.poll_recv(cx)
            .map(|line| line.map(Ok::<_, Infallible>))
    });

    Ok((
        [(header::CONTENT_TYPE, "application/x-ndjson")],
        Body::from_stream(lines),
    )
        .into_response())
}

// =============================================================================
// Targeted generators
// =============================================================================

#[derive(Debug, Deserialize)]
struct ThemedRequest {
    theme: String,
    #[serde(default)]
    setting: String,
}

#[derive(Debug, Deserialize)]
struct NamesRequest {
    theme: String,
    #[serde(default)]
    setting: String,
    names: Vec<String>,
}

async fn setting(
    State(app): State<Arc<App>>,
    Path(theme): Path<String>,
) -> Result<Json<String>, ApiError> {
    let text = app
        .use_cases
        .generation
        .targeted
        .setting_description(&theme)
        .await?;
    Ok(Json(text))
}

async fn areas(
    State(app): State<Arc<App>>,
    Json(request): Json<ThemedRequest>,
) -> Result<Json<Vec<Area>>, ApiError> {
    let areas = app
        .use_cases
        .generation
        .targeted
        .areas(&request.theme, &request.setting)
        .await?;
    Ok(Json(areas))
}

async fn monsters(
    State(app): State<Arc<App>>,
    Json(request): Json<NamesRequest>,
) -> Result<Json<Vec<Monster>>, ApiError> {
    let monsters = app
        .use_cases
        .generation
        .targeted
        .monsters(&request.theme, &request.setting, &request.names)
        .await?;
    Ok(Json(monsters))
}

async fn items(
    State(app): State<Arc<App>>,
    Json(request): Json<NamesRequest>,
) -> Result<Json<Vec<Item>>, ApiError> {
    let items = app
        .use_cases
        .generation
        .targeted
        .items(&request.theme, &request.setting, &request.names)
        .await?;
    Ok(Json(items))
}

async fn boss(
    State(app): State<Arc<App>>,
    Json(request): Json<ThemedRequest>,
) -> Result<Json<Boss>, ApiError> {
    let boss = app
        .use_cases
        .generation
        .targeted
        .boss(&request.theme, &request.setting)
        .await?;
    Ok(Json(boss))
}

async fn craft(
    State(app): State<Arc<App>>,
    Json(request): Json<CraftRequest>,
) -> Result<Json<Item>, ApiError> {
    let item = app.use_cases.generation.targeted.craft(&request).await?;
    Ok(Json(item))
}

// =============================================================================
// Errors
// =============================================================================

#[derive(Debug)]
pub enum ApiError {
    BadRequest(String),
    /// Content blocked by the backend's safety filter; shown to the user as is
    Safety(String),
    /// The model backend failed or produced nothing usable
    Upstream(String),
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        let (status, message) = match self {
            ApiError::BadRequest(msg) => (StatusCode::BAD_REQUEST, msg),
            ApiError::Safety(msg) => (StatusCode::INTERNAL_SERVER_ERROR, msg),
            ApiError::Upstream(msg) => (StatusCode::BAD_GATEWAY, msg),
        };
        (status, Json(serde_json::json!({ "error": message }))).into_response()
    }
}

impl From<GenerationError> for ApiError {
    fn from(e: GenerationError) -> Self {
        match e {
            GenerationError::InvalidState(_) => ApiError::BadRequest(e.to_string()),
            _ if e.is_safety_rejection() => ApiError::Safety(e.to_string()),
            _ => {
                tracing::error!(error = %e, "Generation failed");
                ApiError::Upstream(e.to_string())
            }
        }
    }
}
