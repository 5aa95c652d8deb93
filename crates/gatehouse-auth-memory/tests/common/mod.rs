//! Shared fixture for the scenario tests.

#![allow(dead_code)]

use std::sync::Arc;
use std::time::{SystemTime, UNIX_EPOCH};

use gatehouse_auth::observability::init_test_tracing;
use gatehouse_auth::storage::User;
use gatehouse_auth::{AuthConfig, AuthService, RegisterRequest};
use gatehouse_auth_memory::InMemoryAuthStorage;

pub const SECRET: &str = "integration-test-secret-0123456789abcdef";
pub const PASSWORD: &str = "correct-horse-1";

pub struct Fixture {
    pub storage: Arc<InMemoryAuthStorage>,
    pub service: AuthService,
    pub config: AuthConfig,
}

pub fn config() -> AuthConfig {
    let mut config = AuthConfig::default();
    config.token.secret = SECRET.to_string();
    config
}

pub async fn fixture() -> Fixture {
    fixture_with(config()).await
}

pub async fn fixture_with(config: AuthConfig) -> Fixture {
    init_test_tracing();

    let storage = Arc::new(InMemoryAuthStorage::seeded().await.unwrap());
    let service = AuthService::new(&config, storage.clone(), storage.clone()).unwrap();
    Fixture {
        storage,
        service,
        config,
    }
}

impl Fixture {
    /// Registers `email` with [`PASSWORD`] and returns the stored account.
    pub async fn register(&self, email: &str) -> User {
        let outcome = self
            .service
            .register(RegisterRequest {
                email: email.to_string(),
                password: PASSWORD.to_string(),
                name: None,
            })
            .await
            .unwrap();
        self.user(outcome.user.id).await
    }

    pub async fn user(&self, id: uuid::Uuid) -> User {
        use gatehouse_auth::UserStorage;
        self.storage.find_by_id(id).await.unwrap().unwrap()
    }

    /// Enrolls and confirms the second factor; returns the secret.
    pub async fn enable_second_factor(&self, user: &User) -> String {
        let enrollment = self
            .service
            .begin_second_factor_enrollment(user.id)
            .await
            .unwrap();
        let code = self.code(&enrollment.secret);
        self.service
            .confirm_second_factor(user.id, &code)
            .await
            .unwrap();
        enrollment.secret
    }

    /// The code for `secret` at the current step.
    pub fn code(&self, secret: &str) -> String {
        self.service.totp().code_at(secret, now()).unwrap()
    }

    /// A well-formed code accepted by no step in the skew window.
    pub fn wrong_code(&self, secret: &str) -> String {
        let step = self.service.totp().step();
        let now = now();
        let accepted: Vec<String> = [now - step, now, now + step]
            .iter()
            .map(|t| self.service.totp().code_at(secret, *t).unwrap())
            .collect();
        (0..10u32)
            .map(|d| d.to_string().repeat(6))
            .find(|candidate| !accepted.contains(candidate))
            .unwrap()
    }
}

pub fn now() -> u64 {
    SystemTime::now()
        .duration_since(UNIX_EPOCH)
        .unwrap()
        .as_secs()
}

pub fn bearer(token: &str) -> String {
    format!("Bearer {token}")
}
