use mimer_engine::test_helpers::MockMimer;
use mimer_engine::{ConnectOptions, Connection, MimerEnvironment};
use std::sync::Arc;

pub const DSN: &str = "testdb";
pub const USER: &str = "MIMERPY";
pub const PASSWORD: &str = "PySecret";

#[allow(dead_code)]
pub fn init_logging() {
    let _ = env_logger::builder().is_test(true).try_init();
}

/// A fresh in-memory database and an environment bound to it.
pub fn mock_env() -> (Arc<MockMimer>, MimerEnvironment) {
    init_logging();
    let mock = Arc::new(MockMimer::new());
    let env = MimerEnvironment::with_api(mock.clone()).expect("Failed to create environment");
    (mock, env)
}

#[allow(dead_code)]
pub fn options() -> ConnectOptions {
    ConnectOptions::new(DSN, USER, PASSWORD)
}

#[allow(dead_code)]
pub fn connect(env: &MimerEnvironment) -> Connection {
    connect_with(env, options())
}

#[allow(dead_code)]
pub fn connect_with(env: &MimerEnvironment, options: ConnectOptions) -> Connection {
    env.connect(&options).expect("Failed to connect")
}
