/// Status code to error taxonomy mapping through the public API
use mimer_engine::error::codes;
use mimer_engine::{ErrorCategory, ErrorKind, ErrorSource, HandlerAction, MimerError};
use std::sync::{Arc, Mutex};

mod helpers;
use helpers::mock::options;
use helpers::{connect, connect_with, mock_env};

#[test]
fn test_native_failure_carries_library_message() {
    let (mock, env) = mock_env();
    let conn = connect(&env);
    mock.fail_with("MimerBeginStatement8", -18001, "Databank is full");

    let mut cur = conn.cursor().expect("cursor");
    let err = cur
        .execute("select m from system.onerow", ())
        .err()
        .expect("injected");
    assert_eq!(err.code(), -18001);
    assert_eq!(err.kind(), Some(ErrorKind::DatabaseError));
    assert_eq!(err.message(), "Databank is full");
    assert_eq!(err.error_category(), ErrorCategory::Fatal);
    assert_eq!(cur.messages(), vec![err]);

    mock.clear_failures();
    cur.execute("select m from system.onerow", ()).expect("recovered");
    assert!(cur.messages().is_empty());
}

#[test]
fn test_classification_of_injected_codes() {
    let cases = [
        ("MimerOpenCursor", -11001, ErrorKind::OperationalError),
        ("MimerOpenCursor", -19042, ErrorKind::InternalError),
        ("MimerFetch", -21002, ErrorKind::IntegrityError),
        ("MimerFetch", -27003, ErrorKind::DataError),
        ("MimerOpenCursor", -26100, ErrorKind::InterfaceError),
    ];
    for (entry, code, kind) in cases {
        let (mock, env) = mock_env();
        let conn = connect(&env);
        let mut cur = conn.cursor().expect("cursor");
        mock.fail_with(entry, code, "injected");

        let err = cur
            .execute("select m from system.onerow", ())
            .and_then(|_| cur.fetchone().map(|_| ()))
            .err()
            .expect("injected failure");
        assert_eq!(err.code(), code, "{}", entry);
        assert_eq!(err.kind(), Some(kind), "{}", code);
    }
}

#[test]
fn test_interface_errors_mean_connection_lost() {
    let (mock, env) = mock_env();
    let conn = connect(&env);
    mock.fail_with("MimerBeginStatement8", -26100, "Communication failure");
    let err = conn
        .execute("select m from system.onerow", ())
        .err()
        .expect("lost");
    assert!(err.is_connection_error());
    assert!(!err.is_a(ErrorKind::DatabaseError));
    assert_eq!(err.error_category(), ErrorCategory::ConnectionLost);
}

#[test]
fn test_sql_errors_are_validation_errors() {
    let (_mock, env) = mock_env();
    let conn = connect(&env);
    let err = conn
        .execute("select * from no_such_table", ())
        .err()
        .expect("missing table");
    assert_eq!(err.code(), -12200);
    assert!(err.is_a(ErrorKind::ProgrammingError));
    assert!(err.is_a(ErrorKind::DatabaseError));
    assert_eq!(err.error_category(), ErrorCategory::Validation);
    assert!(!err.is_retryable());
}

#[test]
fn test_local_errors_never_ask_the_library() {
    let (mock, env) = mock_env();
    let conn = connect(&env);
    let mut cur = conn.cursor().expect("cursor");
    mock.reset_calls();

    let err = cur.fetchone().err().expect("nothing executed");
    assert_eq!(err.code(), codes::NO_RESULT_SET);
    assert_eq!(mock.calls("MimerGetError8"), 0);
    assert_eq!(
        err.to_string(),
        format!("ProgrammingError: {} ({})", err.message(), codes::NO_RESULT_SET)
    );
}

#[test]
fn test_commit_failure_reaches_connection_handler() {
    let (mock, env) = mock_env();
    let seen: Arc<Mutex<Vec<(ErrorSource, i32)>>> = Arc::default();
    let sink = seen.clone();
    let conn = connect_with(
        &env,
        options().with_error_handler(move |source, err: &MimerError| {
            sink.lock().expect("sink").push((source, err.code()));
            HandlerAction::Raise
        }),
    );
    conn.execute("create table t(c1 int)", ()).expect("create");
    conn.execute("insert into t values (?)", 1).expect("insert");
    mock.fail_with("MimerEndTransaction", -10003, "Transaction aborted");

    let err = conn.commit().err().expect("aborted");
    assert!(err.is_a(ErrorKind::TransactionAbortError));
    assert_eq!(err.error_category(), ErrorCategory::Transient);
    assert_eq!(
        *seen.lock().expect("seen"),
        vec![(ErrorSource::Connection, -10003)]
    );
}
