pub mod env;
pub mod mock;

#[allow(unused_imports)]
pub use env::{get_test_credentials, TestCredentials};
#[allow(unused_imports)]
pub use mock::{connect, connect_with, init_logging, mock_env};
