/// Session log records, captured through a process-wide `log::Log`
use mimer_engine::test_helpers::MockMimer;
use mimer_engine::{ConnectOptions, EnvironmentConfig, MimerEnvironment};
use std::sync::{Arc, Mutex};

static RECORDS: Mutex<Vec<String>> = Mutex::new(Vec::new());

struct CaptureLogger;

impl log::Log for CaptureLogger {
    fn enabled(&self, _metadata: &log::Metadata) -> bool {
        true
    }

    fn log(&self, record: &log::Record) {
        if record.target().starts_with("mimer_engine") {
            RECORDS.lock().expect("records").push(record.args().to_string());
        }
    }

    fn flush(&self) {}
}

static LOGGER: CaptureLogger = CaptureLogger;

fn session_records() -> Vec<String> {
    let mut records = RECORDS.lock().expect("records");
    let sessions = records
        .iter()
        .filter(|r| r.starts_with("Session "))
        .cloned()
        .collect();
    records.clear();
    sessions
}

#[test]
fn test_session_open_is_logged_only_after_login_succeeds() {
    log::set_logger(&LOGGER).expect("logger");
    log::set_max_level(log::LevelFilter::Trace);

    let mock = Arc::new(MockMimer::new().with_login("MIMERPY", "PySecret"));
    let config = EnvironmentConfig::default().with_trace_api(true);
    let env = MimerEnvironment::with_api_and_config(mock.clone(), &config).expect("env");
    session_records();

    let rejected = ConnectOptions::new("testdb", "MIMERPY", "wrong");
    assert!(env.connect(&rejected).is_err());
    assert_eq!(
        session_records(),
        vec!["Session connect: dsn=testdb, user=MIMERPY".to_string()]
    );

    let conn = env
        .connect(&ConnectOptions::new("testdb", "MIMERPY", "PySecret"))
        .expect("login");
    assert_eq!(
        session_records(),
        vec![
            "Session connect: dsn=testdb, user=MIMERPY".to_string(),
            "Session open: dsn=testdb, user=MIMERPY".to_string(),
        ]
    );
    conn.close().expect("close");
}
