/// Connection pool tests against the in-memory Mimer API
use mimer_engine::{
    MimerConnectionManager, MimerError, MimerPool, PoolOptions, Value,
};
use serial_test::serial;
use std::sync::mpsc;
use std::sync::Arc;
use std::thread;
use std::time::Duration;

mod helpers;
use helpers::mock::options;
use helpers::mock_env;

fn pool_options() -> PoolOptions {
    PoolOptions::new(options())
}

#[test]
fn test_cache_and_use_counts() {
    let (mock, env) = mock_env();
    let pool = MimerPool::new(
        env,
        pool_options()
            .with_initial_connections(1)
            .with_max_unused(2)
            .with_max_connections(3),
    )
    .expect("pool");
    assert_eq!(pool.cached_connections(), 1);

    let con = pool.get_connection().expect("get");
    con.close().expect("hand back");
    let db = pool.get_connection().expect("db");
    assert_eq!((pool.cached_connections(), pool.used_connections()), (0, 1));
    let db2 = pool.get_connection().expect("db2");
    let db3 = pool.get_connection().expect("db3");
    assert_eq!((pool.cached_connections(), pool.used_connections()), (0, 3));

    db.autocommit(true).expect("autocommit");
    let mut cur = db.execute("select * from system.onerow", ()).expect("query");
    assert_eq!(cur.fetchone().expect("row"), vec![Value::from("X")]);
    cur.close().expect("close cursor");

    db.close().expect("db back");
    assert_eq!((pool.cached_connections(), pool.used_connections()), (1, 2));
    db2.close().expect("db2 back");
    assert_eq!((pool.cached_connections(), pool.used_connections()), (2, 1));
    db3.close().expect("db3 back");
    assert_eq!((pool.cached_connections(), pool.used_connections()), (2, 0));
    assert_eq!(mock.open_sessions(), 2);

    let _db = pool.get_connection().expect("again");
    assert_eq!((pool.cached_connections(), pool.used_connections()), (1, 1));
    pool.close().expect("close pool");
    assert_eq!((pool.cached_connections(), pool.used_connections()), (0, 0));
    assert_eq!(mock.open_sessions(), 0);
}

#[test]
fn test_unbounded_cache_keeps_everything() {
    let (_mock, env) = mock_env();
    let pool = MimerPool::new(
        env,
        pool_options()
            .with_initial_connections(1)
            .with_max_connections(3),
    )
    .expect("pool");
    let conns: Vec<_> = (0..3).map(|_| pool.get_connection().expect("get")).collect();
    for conn in conns {
        conn.close().expect("back");
    }
    assert_eq!((pool.cached_connections(), pool.used_connections()), (3, 0));
}

#[test]
fn test_hand_back_does_not_open_sessions() {
    let (mock, env) = mock_env();
    let pool = MimerPool::new(env, pool_options().with_initial_connections(2)).expect("pool");
    let opened = mock.calls("MimerBeginSession8");

    let conn = pool.get_connection().expect("get");
    let (cached, used) = (pool.cached_connections(), pool.used_connections());
    conn.close().expect("back");
    assert_eq!(pool.cached_connections(), cached + 1);
    assert_eq!(pool.used_connections(), used - 1);
    assert_eq!(mock.calls("MimerBeginSession8"), opened);
}

#[test]
fn test_non_blocking_pool_is_bounded() {
    let (_mock, env) = mock_env();
    let pool = MimerPool::new(env, pool_options().with_max_connections(3)).expect("pool");
    let mut held: Vec<_> = (0..3).map(|_| pool.get_connection().expect("get")).collect();

    let err = pool.get_connection().err().expect("exhausted");
    assert!(matches!(err, MimerError::PoolExhausted { max_connections: 3 }));
    assert!(err.is_retryable());

    held.pop().expect("one").close().expect("back");
    let again = pool.get_connection().expect("slot freed");
    assert!(pool.get_connection().is_err());
    drop(again);
}

#[test]
fn test_dropping_pooled_connection_returns_it() {
    let (_mock, env) = mock_env();
    let pool = MimerPool::new(env, pool_options()).expect("pool");
    {
        let conn = pool.get_connection().expect("get");
        assert!(conn.is_open());
        assert_eq!(pool.used_connections(), 1);
    }
    assert_eq!((pool.cached_connections(), pool.used_connections()), (1, 0));
}

#[test]
fn test_hand_back_rolls_back_and_restores_autocommit() {
    let (mock, env) = mock_env();
    let pool = MimerPool::new(env, pool_options()).expect("pool");

    let conn = pool.get_connection().expect("get");
    conn.execute("create table t(c1 int)", ()).expect("create");
    let cur = conn.execute("insert into t values (?)", 1).expect("insert");
    conn.autocommit(false).expect("manual");
    assert!(conn.in_transaction());
    drop(cur);
    conn.close().expect("back");
    assert_eq!(mock.committed_rows("t"), Some(0));

    let conn = pool.get_connection().expect("reused");
    assert!(!conn.in_transaction());
    assert!(!conn.is_autocommit());
    assert_eq!(conn.open_cursors(), 0);
}

#[test]
fn test_broken_cached_connection_is_replaced() {
    let (mock, env) = mock_env();
    let pool = MimerPool::new(env, pool_options().with_initial_connections(1)).expect("pool");
    let conn = pool.get_connection().expect("get");
    let handles = conn.handles();
    conn.close().expect("back");

    mimer_engine::handles::lock_handles(&handles)
        .expect("lock")
        .shutdown()
        .expect("kill session");
    let before = mock.calls("MimerBeginSession8");

    let conn = pool.get_connection().expect("replacement");
    assert!(conn.is_open());
    assert_eq!(mock.calls("MimerBeginSession8"), before + 1);
}

#[test]
#[serial]
fn test_deep_health_check_runs_probe_query() {
    std::env::remove_var("MIMERPY_POOL_DEEP_HEALTH_CHECK");
    let (mock, env) = mock_env();
    let pool = MimerPool::new(
        env,
        pool_options()
            .with_initial_connections(1)
            .with_deep_health_check(true),
    )
    .expect("pool");
    assert!(pool.config().deep_health_check);
    mock.reset_calls();

    let conn = pool.get_connection().expect("get");
    assert!(conn.is_open());
    assert_eq!(mock.calls("MimerOpenCursor"), 1);
    assert_eq!(mock.calls("MimerFetch"), 1);
    assert_eq!(mock.calls("MimerEndTransaction"), 1);
}

#[test]
#[serial]
fn test_env_overrides_deep_health_check() {
    std::env::set_var("MIMERPY_POOL_DEEP_HEALTH_CHECK", "off");
    let (_mock, env) = mock_env();
    let pool = MimerPool::new(env, pool_options().with_deep_health_check(true)).expect("pool");
    std::env::remove_var("MIMERPY_POOL_DEEP_HEALTH_CHECK");
    assert!(!pool.config().deep_health_check);
}

#[test]
fn test_blocking_pool_waits_for_hand_back() {
    let (_mock, env) = mock_env();
    let pool = Arc::new(
        MimerPool::new(
            env,
            pool_options().with_max_connections(1).with_block(true),
        )
        .expect("pool"),
    );
    let first = pool.get_connection().expect("first");

    let (tx, rx) = mpsc::channel();
    let waiter = {
        let pool = Arc::clone(&pool);
        thread::spawn(move || {
            let conn = pool.get_connection().expect("after wait");
            tx.send(conn.is_open()).expect("send");
        })
    };

    assert!(rx.recv_timeout(Duration::from_millis(100)).is_err());
    first.close().expect("back");
    assert_eq!(rx.recv_timeout(Duration::from_secs(5)), Ok(true));
    waiter.join().expect("join");
    assert_eq!(pool.used_connections(), 0);
}

#[test]
fn test_closed_pool_refuses_checkout() {
    let (_mock, env) = mock_env();
    let pool = MimerPool::new(env, pool_options()).expect("pool");
    pool.close().expect("close");
    assert!(pool.is_closed());
    assert!(matches!(pool.get_connection(), Err(MimerError::Pool(_))));
}

#[test]
fn test_r2d2_manager() {
    let (mock, env) = mock_env();
    let manager = MimerConnectionManager::new(env, options());
    let pool = r2d2::Pool::builder()
        .max_size(2)
        .test_on_check_out(true)
        .build(manager)
        .expect("r2d2 pool");

    let conn = pool.get().expect("checkout");
    let mut cur = conn
        .execute("select m from system.onerow", ())
        .expect("query");
    assert_eq!(cur.fetchone().expect("row"), vec![Value::from("X")]);
    drop(cur);
    drop(conn);
    assert!(mock.open_sessions() <= 2);
}
