/// Tests against a real Mimer SQL server.
/// Run with `cargo test -- --ignored`; each test skips unless MIMER_TEST_DSN
/// is set (directly or in `.env`) and the client library can be loaded.
use mimer_engine::{EnvironmentConfig, ErrorKind, MimerEnvironment, MimerPool, PoolOptions, Value};

mod helpers;
use helpers::{get_test_credentials, init_logging, TestCredentials};

fn live() -> Option<(MimerEnvironment, TestCredentials)> {
    init_logging();
    let Some(credentials) = get_test_credentials() else {
        eprintln!("⚠️  Skipping live test: MIMER_TEST_DSN not set");
        return None;
    };
    match MimerEnvironment::new(&EnvironmentConfig::default()) {
        Ok(env) => Some((env, credentials)),
        Err(e) => {
            eprintln!("⚠️  Skipping live test: {}", e);
            None
        }
    }
}

#[test]
#[ignore = "needs a Mimer SQL server"]
fn test_live_connect_and_onerow() {
    let Some((env, credentials)) = live() else {
        return;
    };
    println!("Client library API version {}", env.api_version());
    let conn = env.connect(&credentials.options()).expect("Failed to connect");
    let mut cur = conn
        .execute("select m from system.onerow", ())
        .expect("Failed to query");
    assert_eq!(cur.fetchall().expect("rows"), vec![vec![Value::from("X")]]);
    conn.close().expect("Failed to close");
}

#[test]
#[ignore = "needs a Mimer SQL server"]
fn test_live_round_trip_and_rollback() {
    let Some((env, credentials)) = live() else {
        return;
    };
    let conn = env.connect(&credentials.options()).expect("Failed to connect");
    let mut cur = conn.cursor().expect("cursor");
    let _ = cur.execute("drop table mimer_engine_live", ());
    conn.commit().expect("commit");

    cur.execute(
        "create table mimer_engine_live(id integer, name nvarchar(40), data blob(1M))",
        (),
    )
    .expect("create");
    conn.commit().expect("commit");
    cur.executemany(
        "insert into mimer_engine_live values (?, ?, ?)",
        (0..10).map(|i| (i, format!("näme {}", i), vec![i as u8; 1000])),
    )
    .expect("insert");
    assert_eq!(cur.rowcount(), 10);

    cur.execute("select id, name, data from mimer_engine_live where id = ?", 7)
        .expect("select");
    assert_eq!(
        cur.fetchone().expect("row"),
        vec![Value::from(7), Value::from("näme 7"), Value::from(vec![7u8; 1000])]
    );
    conn.rollback().expect("rollback");

    cur.execute("select count(*) from mimer_engine_live", ())
        .expect("count");
    assert_eq!(cur.fetchone().expect("count")[0], Value::from(0));
    conn.commit().expect("commit");
    cur.execute("drop table mimer_engine_live", ()).expect("drop");
    conn.commit().expect("commit");
}

#[test]
#[ignore = "needs a Mimer SQL server"]
fn test_live_syntax_error_is_programming_error() {
    let Some((env, credentials)) = live() else {
        return;
    };
    let conn = env.connect(&credentials.options()).expect("Failed to connect");
    let err = conn.execute("selct 1", ()).err().expect("syntax error");
    println!("Server said: {}", err);
    assert!(err.is_a(ErrorKind::ProgrammingError));
}

#[test]
#[ignore = "needs a Mimer SQL server"]
fn test_live_pool() {
    let Some((env, credentials)) = live() else {
        return;
    };
    let pool = MimerPool::new(
        env,
        PoolOptions::new(credentials.options())
            .with_initial_connections(1)
            .with_max_connections(2)
            .with_deep_health_check(true),
    )
    .expect("Failed to create pool");
    let a = pool.get_connection().expect("first");
    let b = pool.get_connection().expect("second");
    assert!(pool.get_connection().is_err());
    a.close().expect("hand back");
    b.close().expect("hand back");
    assert_eq!(pool.used_connections(), 0);
    pool.close().expect("close pool");
}
