pub mod config;
pub mod modules;
pub mod services;

use axum::{
    middleware,
    response::{IntoResponse, Response},
    routing::get,
    Router,
};
use std::any::Any;
use std::sync::Arc;
use tower_http::{
    catch_panic::CatchPanicLayer, cors::CorsLayer, limit::RequestBodyLimitLayer,
    trace::TraceLayer,
};

use config::Config;
use modules::auth::{admin_routes, auth_routes, AuthError, AuthService};
use modules::metrics::metrics_routes;
use services::authorization::authenticate;
use services::jwt::JwtService;
use services::metrics::{metrics_middleware, MetricsRegistry};
use services::security::security_headers;

/// HTTP-level knobs that do not belong to any service.
#[derive(Debug, Clone)]
pub struct AppSettings {
    pub refresh_cookie_secure: bool,
    pub otp_rate_limit_burst: u32,
    pub otp_rate_limit_per_minute: u32,
}

impl AppSettings {
    pub fn from_config(config: &Config) -> Self {
        Self {
            refresh_cookie_secure: config.refresh_cookie_secure,
            otp_rate_limit_burst: config.otp_rate_limit_burst,
            otp_rate_limit_per_minute: config.otp_rate_limit_per_minute,
        }
    }
}

impl Default for AppSettings {
    fn default() -> Self {
        Self {
            refresh_cookie_secure: true,
            otp_rate_limit_burst: 10,
            otp_rate_limit_per_minute: 1,
        }
    }
}

pub struct AppState {
    pub auth: AuthService,
    pub jwt_service: Arc<JwtService>,
    pub metrics: Arc<MetricsRegistry>,
    pub settings: AppSettings,
}

pub fn create_app(state: AppState) -> Router {
    let jwt_service = state.jwt_service.clone();
    let metrics = state.metrics.clone();
    let auth = auth_routes(
        state.settings.otp_rate_limit_burst,
        state.settings.otp_rate_limit_per_minute,
    );
    let state = Arc::new(state);

    let router = Router::new()
        .route("/", get(root))
        .nest("/auth", auth)
        .nest("/admin", admin_routes())
        .merge(metrics_routes(metrics.clone()));

    with_middleware(router, jwt_service, metrics).with_state(state)
}

/// Shared middleware stack. Panics from `authenticate` or any handler become
/// a generic 500 that still carries security headers and is counted.
fn with_middleware<S>(
    router: Router<S>,
    jwt_service: Arc<JwtService>,
    metrics: Arc<MetricsRegistry>,
) -> Router<S>
where
    S: Clone + Send + Sync + 'static,
{
    router
        .layer(middleware::from_fn_with_state(jwt_service, authenticate))
        .layer(CatchPanicLayer::custom(handle_panic))
        .layer(RequestBodyLimitLayer::new(1024 * 100)) // 100KB max body
        .layer(middleware::from_fn(security_headers))
        .layer(middleware::from_fn_with_state(metrics, metrics_middleware))
        .layer(TraceLayer::new_for_http())
        .layer(CorsLayer::permissive())
}

async fn root() -> &'static str {
    "OTP Gate Auth API"
}

fn handle_panic(_: Box<dyn Any + Send + 'static>) -> Response {
    AuthError::Internal("request handler panicked".to_string()).into_response()
}
