use std::net::SocketAddr;
use std::sync::Arc;

use anyhow::Result;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

use mailai_backend::auth::{JwtVerifier, RemoteVerifier, TokenVerifier};
use mailai_backend::config::{AppConfig, AuthMode};
use mailai_backend::llm::DeepSeekClient;
use mailai_backend::mail::ImapFetcher;
use mailai_backend::store::PgStore;
use mailai_backend::{build_cors_layer, build_router, db, AppState};

#[tokio::main]
async fn main() -> Result<()> {
    tracing_subscriber::registry()
        .with(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| "mailai_backend=debug,tower_http=debug".into()),
        )
        .with(tracing_subscriber::fmt::layer())
        .init();

    dotenvy::dotenv().ok();
    let config = AppConfig::from_env()?;

    tracing::info!("Starting mail assistant backend");

    let pool = db::establish_connection_pool(&config.database_url, config.db_max_connections)?;
    let store = Arc::new(PgStore::new(pool));
    tracing::info!("Database connection pool initialized");

    let verifier: Arc<dyn TokenVerifier> = match config.auth_mode()? {
        AuthMode::LocalJwt { secret } => {
            tracing::info!("Verifying bearer tokens locally");
            Arc::new(JwtVerifier::new(&secret))
        }
        AuthMode::Remote { base_url, api_key } => {
            tracing::info!("Verifying bearer tokens against {}", base_url);
            Arc::new(RemoteVerifier::new(&base_url, api_key))
        }
    };
    let llm = Arc::new(DeepSeekClient::from_config(&config));

    let state = AppState {
        accounts: store.clone(),
        todos: store,
        verifier,
        mail: Arc::new(ImapFetcher::from_config(&config)),
        tasks: llm.clone(),
        chat: llm,
    };
    let app = build_router(state, build_cors_layer(config.cors_allowed_origins.as_deref()));

    let addr = SocketAddr::from(([0, 0, 0, 0], config.port));
    tracing::info!("Server listening on {}", addr);

    let listener = tokio::net::TcpListener::bind(addr).await?;
    axum::serve(listener, app).await?;

    Ok(())
}
