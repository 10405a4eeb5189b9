//! Server assembly for the moot forum.
//!
//! The API crate is transport-complete but unconfigured; this crate turns a
//! [`ServerConfig`] into a running service: SQLite store, in-process cache
//! with a periodic purge task, CORS and request tracing, GitHub sign-in
//! routes, and a notification gateway (log lines by default, an outbound
//! webhook when configured).

use std::{path::PathBuf, sync::Arc, time::Duration};

use anyhow::Context as _;
use axum::{
  Json, Router,
  http::{HeaderValue, Method, header},
  routing::get,
};
use moot_api::{AppState, TokenIssuer, api_router};
use moot_cache::MemoryCache;
use moot_core::notify::NotificationGateway;
use moot_store_sqlite::SqliteStore;
use serde::Deserialize;
use serde_json::{Value, json};
use tokio::{net::TcpListener, signal};
use tower_http::{
  cors::{Any, CorsLayer},
  trace::TraceLayer,
};
use tracing::info;

pub mod notify;
pub mod oauth;

pub use notify::{LogNotifier, WebhookNotifier};

/// The production state: SQLite store, in-process cache.
pub type ServerState = AppState<SqliteStore, MemoryCache>;

// ─── Configuration ───────────────────────────────────────────────────────────

/// Development-only signing secret, used when none is configured.
const DEV_JWT_SECRET: &str = "dev-secret-change-me-before-production";

/// Runtime configuration, read from `config.toml` and `MOOT_`-prefixed
/// environment variables. Every field has a development default; production
/// overrides the signing secret and the origin list at minimum.
#[derive(Deserialize, Clone)]
pub struct ServerConfig {
  #[serde(default = "default_host")]
  pub host:                 String,
  #[serde(default = "default_port")]
  pub port:                 u16,
  #[serde(default = "default_database_path")]
  pub database_path:        PathBuf,
  /// HS256 signing secret for bearer tokens.
  #[serde(default = "default_jwt_secret")]
  pub jwt_secret:           String,
  /// Bearer token lifetime, in seconds.
  #[serde(default = "default_token_ttl_secs")]
  pub token_ttl_secs:       i64,
  /// Exact origins allowed by CORS; empty allows any origin.
  #[serde(default)]
  pub allowed_origins:      Vec<String>,
  /// Seconds between cache purge sweeps.
  #[serde(default = "default_cache_purge_secs")]
  pub cache_purge_secs:     u64,
  /// Where OAuth sign-ins land when they finish.
  #[serde(default = "default_frontend_url")]
  pub frontend_url:         String,
  #[serde(default)]
  pub github_client_id:     String,
  #[serde(default)]
  pub github_client_secret: String,
  #[serde(default)]
  pub github_redirect_uri:  String,
  /// When set, notifications POST here as JSON instead of logging.
  #[serde(default)]
  pub notify_webhook_url:   Option<String>,
}

impl ServerConfig {
  /// True while the development signing secret is in place.
  pub fn using_default_secret(&self) -> bool {
    self.jwt_secret == DEV_JWT_SECRET
  }

  fn github(&self) -> oauth::OauthConfig {
    oauth::OauthConfig {
      client_id:     self.github_client_id.clone(),
      client_secret: self.github_client_secret.clone(),
      redirect_uri:  self.github_redirect_uri.clone(),
      frontend_url:  self.frontend_url.clone(),
    }
  }
}

fn default_host() -> String {
  "0.0.0.0".into()
}

fn default_port() -> u16 {
  8080
}

fn default_database_path() -> PathBuf {
  "moot.db".into()
}

fn default_jwt_secret() -> String {
  DEV_JWT_SECRET.into()
}

fn default_token_ttl_secs() -> i64 {
  30 * 60
}

fn default_cache_purge_secs() -> u64 {
  60
}

fn default_frontend_url() -> String {
  "http://localhost:3000".into()
}

// ─── Router assembly ─────────────────────────────────────────────────────────

/// Assemble the complete HTTP surface: the JSON API plus GitHub sign-in under
/// `/api/v1`, a liveness probe at `/health`, CORS and request tracing over
/// everything.
pub fn app_router(state: ServerState, config: &ServerConfig) -> Router {
  let api =
    api_router(state.clone()).merge(oauth::router(state, config.github()));
  Router::new()
    .route("/health", get(health))
    .nest("/api/v1", api)
    .layer(TraceLayer::new_for_http())
    .layer(cors_layer(config))
}

/// Liveness probe. The store is not consulted; this answers whenever the
/// process is up.
async fn health() -> Json<Value> {
  Json(json!({ "status": "ok", "service": "moot" }))
}

/// Wide open when no origins are configured (development), explicit
/// otherwise.
fn cors_layer(config: &ServerConfig) -> CorsLayer {
  let cors = CorsLayer::new()
    .allow_methods([
      Method::GET,
      Method::POST,
      Method::PUT,
      Method::DELETE,
      Method::OPTIONS,
    ])
    .allow_headers([header::AUTHORIZATION, header::CONTENT_TYPE, header::ACCEPT])
    .max_age(Duration::from_secs(60 * 60));

  if config.allowed_origins.is_empty() {
    cors.allow_origin(Any)
  } else {
    let origins: Vec<HeaderValue> = config
      .allowed_origins
      .iter()
      .filter_map(|origin| origin.parse().ok())
      .collect();
    cors.allow_origin(origins)
  }
}

// ─── Lifecycle ───────────────────────────────────────────────────────────────

/// Open the store, assemble the router, and run until ctrl-c or SIGTERM.
pub async fn serve(config: ServerConfig) -> anyhow::Result<()> {
  let store = SqliteStore::open(&config.database_path)
    .await
    .with_context(|| {
      format!("failed to open database at {:?}", config.database_path)
    })?;

  let cache = Arc::new(MemoryCache::new());
  spawn_purge_task(
    Arc::clone(&cache),
    Duration::from_secs(config.cache_purge_secs),
  );

  let state = AppState {
    store: Arc::new(store),
    cache,
    tokens: Arc::new(TokenIssuer::new(
      &config.jwt_secret,
      config.token_ttl_secs,
    )),
    notifier: notifier(&config),
  };
  let app = app_router(state, &config);

  let address = format!("{}:{}", config.host, config.port);
  let listener = TcpListener::bind(&address)
    .await
    .with_context(|| format!("failed to bind {address}"))?;
  info!("listening on http://{address}");

  axum::serve(listener, app)
    .with_graceful_shutdown(shutdown_signal())
    .await
    .context("server error")?;

  info!("shut down cleanly");
  Ok(())
}

fn notifier(config: &ServerConfig) -> Arc<dyn NotificationGateway> {
  match &config.notify_webhook_url {
    Some(url) if !url.is_empty() => Arc::new(WebhookNotifier::new(url.clone())),
    _ => Arc::new(LogNotifier),
  }
}

/// Expired cache entries are also skipped on read; the periodic sweep just
/// returns the memory.
fn spawn_purge_task(cache: Arc<MemoryCache>, every: Duration) {
  // tokio intervals reject a zero period
  let every = every.max(Duration::from_secs(1));
  tokio::spawn(async move {
    let mut tick = tokio::time::interval(every);
    loop {
      tick.tick().await;
      cache.purge_expired();
    }
  });
}

/// Resolves on ctrl-c or SIGTERM.
async fn shutdown_signal() {
  let ctrl_c = async {
    if signal::ctrl_c().await.is_err() {
      // no handler means no clean-shutdown path; wait for the process
      // manager instead
      std::future::pending::<()>().await;
    }
  };

  #[cfg(unix)]
  let terminate = async {
    match signal::unix::signal(signal::unix::SignalKind::terminate()) {
      Ok(mut stream) => {
        stream.recv().await;
      }
      Err(_) => std::future::pending::<()>().await,
    }
  };

  #[cfg(not(unix))]
  let terminate = std::future::pending::<()>();

  tokio::select! {
    _ = ctrl_c => info!("received ctrl-c, shutting down"),
    _ = terminate => info!("received terminate signal, shutting down"),
  }
}

// ─── Tests ───────────────────────────────────────────────────────────────────
