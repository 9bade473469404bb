use anyhow::Context;
use axum::http::{self, HeaderValue, Method};
use dotenvy::dotenv;
use tower_http::cors::{Any, CorsLayer};
use tower_http::trace::TraceLayer;
use tracing_subscriber::EnvFilter;

use mafia_server::{app, models::config::GameConfig, state::AppState, utils::config::CONFIG};

// ログ設定
fn init_tracing() {
    let filter = EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| EnvFilter::new("info,tower_http=debug"));
    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_target(true)
        .init();
}

fn cors_layer() -> anyhow::Result<CorsLayer> {
    let cors = CorsLayer::new()
        .allow_methods([Method::GET, Method::POST])
        .allow_headers([http::header::CONTENT_TYPE]);
    Ok(match &CONFIG.allowed_origin {
        Some(origin) => cors.allow_origin(
            origin
                .parse::<HeaderValue>()
                .with_context(|| format!("invalid MAFIA_ALLOWED_ORIGIN: {}", origin))?,
        ),
        None => cors.allow_origin(Any),
    })
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    // 環境変数をロード
    if let Err(e) = dotenv() {
        eprintln!("Warning: failed to load .env: {}", e);
    }
    init_tracing();

    let game_config = GameConfig::from_env();
    tracing::info!(?game_config, server_config = ?*CONFIG, "configuration loaded");

    let state = AppState::new((*CONFIG).clone(), game_config);
    // 保存済みのゲームを再開
    state.manager.restore_saved_sessions().await;
    let app = app::create_app(state).layer(cors_layer()?).layer(
        TraceLayer::new_for_http().make_span_with(|request: &http::Request<_>| {
            tracing::info_span!(
                "HTTP request",
                method = %request.method(),
                uri = %request.uri(),
            )
        }),
    );

    let listener = tokio::net::TcpListener::bind(CONFIG.bind_addr)
        .await
        .with_context(|| format!("failed to bind {}", CONFIG.bind_addr))?;
    tracing::info!(addr = %CONFIG.bind_addr, "server listening");
    axum::serve(listener, app).await?;
    Ok(())
}
