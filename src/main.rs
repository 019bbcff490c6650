//! Auth Service Server
//!
//! Wires configuration, storage, mail transport, and the OAuth clients
//! into the HTTP router and serves it.

use std::sync::Arc;

use dotenv::dotenv;
use tower::ServiceBuilder;
use tower_http::cors::{Any, CorsLayer};
use tower_http::trace::TraceLayer;

use auth_service::{
    api::{create_routes, AppState},
    config::AppConfig,
    database::DatabaseConfig,
    service::{
        email::{EmailSender, LogSender, SmtpSender},
        AuthService, LoginExchangeCache, Mailer, OAuthService, SessionService, TokenCodec,
    },
    storage::{PgAccountStore, PgSessionStore},
};

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    dotenv().ok();
    env_logger::init();

    log::info!("Starting auth-service v{}", auth_service::VERSION);

    let config = AppConfig::from_env()?;
    config.validate()?;

    let db_config = DatabaseConfig::from_env()?;
    let pool = db_config.create_pool().await?;

    log::info!("Running database migrations");
    sqlx::migrate!("./migrations").run(&pool).await?;

    let account_store = Arc::new(PgAccountStore::new(pool.clone()));
    let session_store = Arc::new(PgSessionStore::new(pool));

    let codec = TokenCodec::new(&config.jwt);
    let session_service = SessionService::new(
        session_store,
        account_store.clone(),
        codec,
        config.jwt.refresh_token_days,
    );

    let sender: Arc<dyn EmailSender> = match &config.email {
        Some(email_config) => Arc::new(SmtpSender::new(email_config)?),
        None => {
            log::warn!("SMTP not configured; emails will be logged instead of delivered");
            Arc::new(LogSender)
        }
    };
    let mailer = Arc::new(Mailer::new(sender, config.jwt.app_name.clone())?);

    let auth_service = Arc::new(AuthService::new(
        account_store.clone(),
        session_service.clone(),
        mailer,
        config.security.clone(),
    ));

    let exchange_cache = Arc::new(LoginExchangeCache::new(
        config.security.login_code_ttl_seconds,
    ));
    exchange_cache.start_sweeper(std::time::Duration::from_secs(60));

    let oauth_service = match &config.oauth {
        Some(oauth_config) => {
            let service = OAuthService::new(
                oauth_config,
                account_store,
                session_service,
                exchange_cache.clone(),
            )?;
            log::info!("OAuth providers configured");
            Some(Arc::new(service))
        }
        None => {
            log::warn!("OAuth not configured; federated login disabled");
            None
        }
    };

    let state = AppState {
        auth_service,
        oauth_service,
    };

    let app = create_routes(state).layer(
        ServiceBuilder::new()
            .layer(TraceLayer::new_for_http())
            .layer(
                CorsLayer::new()
                    .allow_origin(Any)
                    .allow_methods(Any)
                    .allow_headers(Any),
            ),
    );

    let bind_addr = format!("{}:{}", config.server.host, config.server.port);
    log::info!("Listening on {}", bind_addr);

    let listener = tokio::net::TcpListener::bind(&bind_addr).await?;
    axum::serve(listener, app).await?;

    exchange_cache.stop_sweeper();
    Ok(())
}
