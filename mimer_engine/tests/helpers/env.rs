//! Helper functions for reading live-database settings in tests

use mimer_engine::test_helpers::{load_dotenv, TEST_DSN_ENV, TEST_PASSWORD_ENV, TEST_USER_ENV};
use mimer_engine::ConnectOptions;

pub struct TestCredentials {
    pub dsn: String,
    pub user: String,
    pub password: String,
}

impl TestCredentials {
    pub fn options(&self) -> ConnectOptions {
        ConnectOptions::new(&self.dsn, &self.user, &self.password)
    }
}

/// Live database settings from the environment or `.env`.
/// Returns None when MIMER_TEST_DSN is not set (live tests skip in that case)
pub fn get_test_credentials() -> Option<TestCredentials> {
    load_dotenv();
    let dsn = std::env::var(TEST_DSN_ENV).ok().filter(|s| !s.is_empty())?;
    let user = std::env::var(TEST_USER_ENV).unwrap_or_else(|_| "SYSADM".to_string());
    let password = std::env::var(TEST_PASSWORD_ENV).unwrap_or_default();
    Some(TestCredentials { dsn, user, password })
}
