use otp_gate::config::{init_db, Config};
use otp_gate::modules::auth::{
    crud::MySqlUserStore, memory::InMemoryUserStore, AuthService, UserStore,
};
use otp_gate::services::clock::SystemClock;
use otp_gate::services::email::{HttpEmailNotifier, LogNotifier, Notifier};
use otp_gate::services::jwt::JwtService;
use otp_gate::services::metrics::MetricsRegistry;
use otp_gate::{create_app, AppSettings, AppState};
use std::net::SocketAddr;
use std::sync::Arc;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    dotenvy::dotenv().ok();

    tracing_subscriber::registry()
        .with(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| "otp_gate=debug,tower_http=debug".into()),
        )
        .with(tracing_subscriber::fmt::layer())
        .init();

    // Load configuration
    let config = Config::from_env()?;

    let store: Arc<dyn UserStore> = match &config.database_url {
        Some(url) => {
            let db = init_db(url).await?;
            tracing::info!("Connected to MySQL");
            Arc::new(MySqlUserStore::new(db))
        }
        None => {
            tracing::warn!("DATABASE_URL not set, users are kept in memory only");
            Arc::new(InMemoryUserStore::new())
        }
    };

    let notifier: Arc<dyn Notifier> = match config.email_config() {
        Some(email) => {
            tracing::info!(api_url = %email.api_url, "Sending mail through HTTP API");
            Arc::new(HttpEmailNotifier::new(email))
        }
        None => {
            tracing::warn!("EMAIL_API_URL not set, one-time codes are written to the log");
            Arc::new(LogNotifier)
        }
    };

    let jwt_service = Arc::new(JwtService::new(&config.token_config()));
    let metrics = MetricsRegistry::new()?;

    let auth = AuthService::new(
        store,
        notifier,
        jwt_service.clone(),
        config.otp_config(),
        Arc::new(SystemClock),
    );

    let app = create_app(AppState {
        auth,
        jwt_service,
        metrics,
        settings: AppSettings::from_config(&config),
    });

    let listener = tokio::net::TcpListener::bind(&config.bind_addr).await?;
    tracing::info!("Server running on http://{}", config.bind_addr);
    axum::serve(listener, app.into_make_service_with_connect_info::<SocketAddr>()).await?;

    Ok(())
}
