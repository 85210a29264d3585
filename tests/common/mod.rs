use async_trait::async_trait;
use axum::http::{header, StatusCode};
use axum_test::{TestResponse, TestServer};
use serde_json::json;
use std::sync::{Arc, Mutex};

use otp_gate::modules::auth::{
    memory::InMemoryUserStore,
    model::{Role, UserRecord, UserUpdate},
    AuthService, UserStore,
};
use otp_gate::services::clock::ManualClock;
use otp_gate::services::email::{Notifier, NotifyError};
use otp_gate::services::jwt::{JwtService, TokenConfig};
use otp_gate::services::metrics::MetricsRegistry;
use otp_gate::services::otp::OtpConfig;
use otp_gate::{create_app, AppSettings, AppState};

pub const TEST_SECRET: &str = "test-secret-key-for-testing-only";

#[allow(dead_code)]
#[derive(Debug, Clone)]
pub struct SentMail {
    pub to: String,
    pub subject: String,
    pub body: String,
}

/// Notifier that keeps every message instead of sending it.
#[derive(Default)]
pub struct RecordingNotifier {
    sent: Mutex<Vec<SentMail>>,
    failing: Mutex<bool>,
}

#[allow(dead_code)]
impl RecordingNotifier {
    pub fn sent(&self) -> Vec<SentMail> {
        self.sent.lock().unwrap().clone()
    }

    pub fn sent_to(&self, to: &str) -> Vec<SentMail> {
        self.sent().into_iter().filter(|mail| mail.to == to).collect()
    }

    pub fn fail_deliveries(&self, failing: bool) {
        *self.failing.lock().unwrap() = failing;
    }
}

#[async_trait]
impl Notifier for RecordingNotifier {
    async fn send(&self, to: &str, subject: &str, body_html: &str) -> Result<(), NotifyError> {
        if *self.failing.lock().unwrap() {
            return Err(NotifyError::Rejected {
                status: 503,
                body: "mail provider unavailable".to_string(),
            });
        }

        self.sent.lock().unwrap().push(SentMail {
            to: to.to_string(),
            subject: subject.to_string(),
            body: body_html.to_string(),
        });
        Ok(())
    }
}

// Allow dead_code for utilities used by other test files
#[allow(dead_code)]
pub struct TestContext {
    pub server: TestServer,
    pub store: Arc<InMemoryUserStore>,
    pub outbox: Arc<RecordingNotifier>,
    pub clock: Arc<ManualClock>,
    pub jwt: Arc<JwtService>,
}

#[allow(dead_code)]
impl TestContext {
    pub fn new() -> Self {
        Self::with_settings(AppSettings {
            refresh_cookie_secure: true,
            otp_rate_limit_burst: 1000,
            otp_rate_limit_per_minute: 1000,
        })
    }

    pub fn with_settings(settings: AppSettings) -> Self {
        let store = Arc::new(InMemoryUserStore::new());
        let outbox = Arc::new(RecordingNotifier::default());
        let clock = Arc::new(ManualClock::default());
        let jwt = Arc::new(JwtService::new(&TokenConfig::new(TEST_SECRET)));
        let metrics = MetricsRegistry::new().expect("Failed to create metrics registry");

        let auth = AuthService::new(
            store.clone(),
            outbox.clone(),
            jwt.clone(),
            OtpConfig::default(),
            clock.clone(),
        );

        let app = create_app(AppState {
            auth,
            jwt_service: jwt.clone(),
            metrics,
            settings,
        });
        let server = TestServer::new(app).expect("Failed to create test server");

        Self {
            server,
            store,
            outbox,
            clock,
            jwt,
        }
    }

    pub async fn user(&self, email: &str) -> UserRecord {
        self.store
            .find_by_email(email)
            .await
            .expect("store lookup failed")
            .expect("user should exist")
    }

    /// Current code in the user's OTP slot.
    pub async fn otp(&self, email: &str) -> String {
        self.user(email).await.otp.expect("OTP should be pending").code
    }

    pub async fn reset_code(&self, email: &str) -> String {
        self.user(email)
            .await
            .reset
            .expect("reset code should be pending")
            .code
    }

    pub async fn signup(&self, email: &str) {
        self.server
            .post("/auth/signup")
            .json(&json!({
                "email": email,
                "password": test_password(),
                "full_name": "Test User"
            }))
            .await
            .assert_status(StatusCode::CREATED);
    }

    pub async fn verified_user(&self, email: &str) {
        self.signup(email).await;
        let code = self.otp(email).await;

        self.server
            .post("/auth/signup/verify")
            .json(&json!({ "email": email, "otp": code }))
            .await
            .assert_status_ok();
    }

    pub async fn grant_role(&self, email: &str, role: Role) {
        let user = self.user(email).await;
        let mut roles = user.roles.clone();
        roles.insert(role);

        self.store
            .update(&user.id, &UserUpdate::new().roles(roles))
            .await
            .expect("role update failed");
    }

    /// Password step only; leaves a login code pending.
    pub async fn start_login(&self, email: &str, role: &str) {
        self.server
            .post("/auth/login")
            .json(&json!({
                "email": email,
                "password": test_password(),
                "type": role
            }))
            .await
            .assert_status(StatusCode::ACCEPTED);
    }

    /// Runs both login steps and returns the response of the second.
    pub async fn login(&self, email: &str, role: &str) -> TestResponse {
        self.start_login(email, role).await;

        let code = self.otp(email).await;

        self.server
            .post("/auth/login/verify")
            .json(&json!({ "email": email, "otp": code, "type": role }))
            .await
    }

    pub async fn access_token(&self, email: &str, role: &str) -> String {
        let response = self.login(email, role).await;
        response.assert_status_ok();

        let body: serde_json::Value = response.json();
        body["access_token"]
            .as_str()
            .expect("access_token should be a string")
            .to_string()
    }
}

// Helper to generate unique test email
#[allow(dead_code)]
pub fn test_email() -> String {
    format!("test_{}@example.com", uuid::Uuid::new_v4())
}

// Helper to generate test password
#[allow(dead_code)]
pub fn test_password() -> &'static str {
    "TestPassword123!"
}

/// Value of the `refreshToken` cookie from a `Set-Cookie` header.
#[allow(dead_code)]
pub fn refresh_cookie_value(response: &TestResponse) -> String {
    let set_cookie = response.header(header::SET_COOKIE);
    let set_cookie = set_cookie.to_str().expect("Set-Cookie should be ASCII");

    set_cookie
        .split(';')
        .next()
        .and_then(|pair| pair.strip_prefix("refreshToken="))
        .expect("Set-Cookie should carry refreshToken")
        .to_string()
}
