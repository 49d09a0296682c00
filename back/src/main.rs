mod config;
mod db;
mod error;
mod frontend;
mod seed;
mod store;
mod templates;
mod v1;

#[cfg(test)]
mod test_support;

use std::{
    path::{Path, PathBuf},
    sync::Arc,
};

use axum::{http::HeaderValue, Router};
use axum_server::tls_rustls::RustlsConfig;
use clap::{Parser, Subcommand};
use sqlx::SqlitePool;
use tower_http::{
    cors::{AllowHeaders, AllowMethods, CorsLayer},
    services::ServeDir,
    trace::TraceLayer,
};
use tracing::{info, warn};
use tracing_subscriber::EnvFilter;

use crate::{
    config::{Config, DEFAULT_CONFIG},
    templates::Templates,
};

#[derive(Parser)]
#[command(version, about = "Todo list with tags, served over HTTP")]
struct Cli {
    /// RON config file; defaults to `config.ron` when present
    #[arg(long, short)]
    config: Option<PathBuf>,

    #[command(subcommand)]
    command: Option<Command>,
}

#[derive(Subcommand)]
enum Command {
    /// Run the HTTP server (default)
    Serve,
    /// Load tags and todos from a RON seed file
    Seed { file: PathBuf },
}

#[tokio::main]
async fn main() -> eyre::Result<()> {
    color_eyre::install()?;
    dotenvy::dotenv().ok();

    let cli = Cli::parse();
    let config = match cli.config {
        Some(path) => Config::load(&path, true)?,
        None => Config::load(Path::new(DEFAULT_CONFIG), false)?,
    };

    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::try_new(&config.log_filter)?)
        .init();

    let db = db::connect(&config.database_url).await?;

    match cli.command.unwrap_or(Command::Serve) {
        Command::Serve => serve(config, db).await,
        Command::Seed { file } => seed::run(&db, &file).await,
    }
}

async fn serve(config: Config, db: SqlitePool) -> eyre::Result<()> {
    let listen = config.listen;
    let tls = config.tls.clone();
    let app = app(Arc::new(AppState::new(config, db)));

    info!(%listen, tls = tls.is_some(), "listening");

    match tls {
        Some(tls) => {
            let rustls = RustlsConfig::from_pem_file(tls.cert, tls.key).await?;
            axum_server::bind_rustls(listen, rustls)
                .serve(app.into_make_service())
                .await?;
        }
        None => {
            axum_server::bind(listen)
                .serve(app.into_make_service())
                .await?;
        }
    }

    Ok(())
}

pub fn app(state: Arc<AppState>) -> Router {
    let config = &state.config;

    let mut router = Router::new().merge(frontend::router());
    router = if config.api_prefix.is_empty() {
        router.merge(v1::router())
    } else {
        router.nest(&config.api_prefix, v1::router())
    };

    let mut router = router
        .nest_service("/static", ServeDir::new(&config.static_dir))
        .layer(TraceLayer::new_for_http());

    if let Some(cors) = cors_layer(&config.cors_origins) {
        router = router.layer(cors);
    }

    router.with_state(state)
}

fn cors_layer(origins: &[String]) -> Option<CorsLayer> {
    let origins: Vec<HeaderValue> = origins
        .iter()
        .filter_map(|origin| match HeaderValue::from_str(origin) {
            Ok(value) => Some(value),
            Err(_) => {
                warn!(%origin, "ignoring invalid CORS origin");
                None
            }
        })
        .collect();

    if origins.is_empty() {
        return None;
    }

    Some(
        CorsLayer::new()
            .allow_origin(origins)
            .allow_credentials(true)
            .allow_methods(AllowMethods::mirror_request())
            .allow_headers(AllowHeaders::mirror_request()),
    )
}

#[derive(Debug)]
pub struct AppState {
    pub db: SqlitePool,
    pub templates: Templates,
    pub config: Config,
}

impl AppState {
    pub fn new(config: Config, db: SqlitePool) -> Self {
        Self {
            db,
            templates: Templates::new(),
            config,
        }
    }
}

#[cfg(test)]
mod tests {
    use axum::http::{Method, StatusCode};
    use serde_json::json;

    use super::*;
    use crate::test_support::{self, send};

    #[test]
    fn cors_needs_valid_origins() {
        assert!(cors_layer(&[]).is_none());
        assert!(cors_layer(&[String::from("bad\norigin")]).is_none());
        assert!(cors_layer(&[String::from("http://localhost:3000")]).is_some());
    }

    #[tokio::test]
    async fn api_mounts_under_custom_prefix() {
        let config = Config {
            api_prefix: String::from("/api/v2"),
            ..Config::default()
        };
        let app = app(Arc::new(AppState::new(config, test_support::pool().await)));

        let (status, todos) = send(&app, Method::GET, "/api/v2/todo", None).await;
        assert_eq!(status, StatusCode::OK);
        assert_eq!(todos, json!([]));

        let (status, _) = send(&app, Method::GET, "/v1/todo", None).await;
        assert_eq!(status, StatusCode::NOT_FOUND);
    }

    #[tokio::test]
    async fn empty_prefix_mounts_api_at_root() {
        let config = Config {
            api_prefix: String::new(),
            ..Config::default()
        };
        let app = app(Arc::new(AppState::new(config, test_support::pool().await)));

        let (status, todo) = send(&app, Method::POST, "/todo", Some(json!({ "content": "root" }))).await;
        assert_eq!(status, StatusCode::OK);
        assert_eq!(todo["content"], "root");
    }

    #[tokio::test]
    async fn cors_preflight_echoes_allowed_origin() {
        let config = Config {
            cors_origins: vec![String::from("http://localhost:3000")],
            ..Config::default()
        };
        let app = app(Arc::new(AppState::new(config, test_support::pool().await)));

        let request = axum::http::Request::builder()
            .method(Method::OPTIONS)
            .uri("/v1/todo")
            .header("origin", "http://localhost:3000")
            .header("access-control-request-method", "POST")
            .body(axum::body::Body::empty())
            .unwrap();
        let response = tower::ServiceExt::oneshot(app, request).await.unwrap();

        assert_eq!(
            response.headers().get("access-control-allow-origin").unwrap(),
            "http://localhost:3000"
        );
        assert_eq!(
            response.headers().get("access-control-allow-credentials").unwrap(),
            "true"
        );
    }
}
