//! Test support: an in-memory implementation of the native library and
//! `.env` loading for live-database tests.

pub mod mock;
pub(crate) mod mock_sql;

pub use mock::MockMimer;

/// DSN of a live Mimer SQL database for the ignored live tests.
pub const TEST_DSN_ENV: &str = "MIMER_TEST_DSN";
pub const TEST_USER_ENV: &str = "MIMER_TEST_USER";
pub const TEST_PASSWORD_ENV: &str = "MIMER_TEST_PASSWORD";

/// Loads `.env` from the working directory or a parent, if there is one.
pub fn load_dotenv() {
    if let Err(e) = dotenvy::dotenv() {
        if !e.not_found() {
            log::warn!("Failed to load .env: {}", e);
        }
    }
}
