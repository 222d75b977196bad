//! Roguegen Engine - Main entry point.

use std::net::SocketAddr;
use std::sync::Arc;

use axum::http::{header, HeaderValue, Method};
use tower_http::cors::{Any, CorsLayer};
use tower_http::trace::TraceLayer;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

use roguegen_engine::api;
use roguegen_engine::config::{BackendConfig, EngineConfig};
use roguegen_engine::infrastructure::{
    fixtures::FixtureRepository,
    gemini::GeminiClient,
    ollama::OllamaClient,
    ports::LlmPort,
    resilient_llm::ResilientLlmClient,
    safety::SafetyCategoryMap,
};
use roguegen_engine::App;

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    // Load environment from repo root (the engine is usually run from `crates/engine`).
    load_dotenv_from_repo_root();

    tracing_subscriber::registry()
        .with(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| "roguegen_engine=debug,tower_http=debug".into()),
        )
        .with(tracing_subscriber::fmt::layer())
        .init();

    tracing::info!("Starting Roguegen Engine");

    let config = EngineConfig::from_env()?;

    let backend: Arc<dyn LlmPort> = match &config.backend {
        BackendConfig::Gemini(gemini) => {
            tracing::info!(model = %gemini.model, fallback = %gemini.fallback_model, "Using Gemini");
            Arc::new(
                GeminiClient::with_timeout(
                    &gemini.base_url,
                    &gemini.api_key,
                    &gemini.model,
                    config.llm_timeout_secs,
                )
                .with_fallback_model(&gemini.fallback_model)
                .with_safety_map(SafetyCategoryMap::gemini()),
            )
        }
        BackendConfig::Ollama(ollama) => {
            tracing::info!(url = %ollama.base_url, model = %ollama.model, "Using Ollama");
            Arc::new(
                OllamaClient::with_timeout(&ollama.base_url, &ollama.model, config.llm_timeout_secs)
                    .with_fallback_model(&ollama.fallback_model),
            )
        }
    };

    tracing::info!(
        max_retries = config.retry.max_retries,
        base_delay_ms = config.retry.base_delay_ms,
        "LLM client configured with retry"
    );
    let llm = Arc::new(ResilientLlmClient::new(backend, config.retry.clone()));

    let fixtures = Arc::new(FixtureRepository::load(&config.fixtures_dir)?);
    let app = Arc::new(App::new(llm, fixtures, config.convergence.clone()));

    let mut router = api::http::routes()
        .with_state(app)
        .layer(TraceLayer::new_for_http());

    if let Some(cors) = config.cors_allowed_origins.as_deref().and_then(build_cors_layer) {
        router = router.layer(cors);
    }

    let addr: SocketAddr = format!("{}:{}", config.server_host, config.server_port).parse()?;
    tracing::info!("Listening on {}", addr);

    let listener = tokio::net::TcpListener::bind(addr).await?;
    axum::serve(listener, router).await?;

    Ok(())
}

fn load_dotenv_from_repo_root() {
    let repo_root = std::path::Path::new(env!("CARGO_MANIFEST_DIR"))
        .join("..")
        .join("..");

    // Prefer local overrides.
    for filename in [".env.local", ".env"] {
        let path = repo_root.join(filename);
        if path.exists() {
            let _ = dotenvy::from_path(path);
        }
    }
}

fn build_cors_layer(allowed_origins: &str) -> Option<CorsLayer> {
    let cors = CorsLayer::new()
        .allow_methods([Method::GET, Method::POST, Method::OPTIONS])
        .allow_headers([header::CONTENT_TYPE]);

    if allowed_origins == "*" {
        return Some(cors.allow_origin(Any));
    }

    let origins: Vec<HeaderValue> = allowed_origins
        .split(',')
        .map(str::trim)
        .filter(|s| !s.is_empty())
        .filter_map(|s| HeaderValue::from_str(s).ok())
        .collect();

    if origins.is_empty() {
        return None;
    }

    Some(cors.allow_origin(origins))
}
