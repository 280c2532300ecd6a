use criterion::{black_box, criterion_group, criterion_main, Criterion};
use mimer_engine::test_helpers::MockMimer;
use mimer_engine::{ConnectOptions, Connection, MimerEnvironment, Value};
use std::sync::Arc;

fn connection() -> Connection {
    let env = MimerEnvironment::with_api(Arc::new(MockMimer::new())).expect("env");
    env.connect(&ConnectOptions::new("benchdb", "SYSADM", "secret"))
        .expect("connect")
}

fn filled(rows: i32) -> Connection {
    let conn = connection();
    conn.execute("create table bench(id int, name varchar(32))", ())
        .expect("create");
    conn.executemany(
        "insert into bench values (?, ?)",
        (0..rows).map(|i| (i, format!("user_{}", i))),
    )
    .expect("fill");
    conn.commit().expect("commit");
    conn
}

fn benchmark_fetchone_onerow(c: &mut Criterion) {
    let conn = connection();
    c.bench_function("execute_fetchone_onerow", |b| {
        b.iter(|| {
            let mut cur = conn
                .execute(black_box("select m from system.onerow"), ())
                .expect("execute");
            black_box(cur.fetchone().expect("fetch"))
        });
    });
}

fn benchmark_fetchall_1000_rows(c: &mut Criterion) {
    let conn = filled(1000);
    let mut cur = conn.cursor().expect("cursor");
    c.bench_function("fetchall_1000_rows", |b| {
        b.iter(|| {
            cur.execute("select * from bench", ()).expect("execute");
            black_box(cur.fetchall().expect("fetch").len())
        });
    });
}

fn benchmark_scroll_cursor_1000_rows(c: &mut Criterion) {
    let conn = filled(1000);
    let mut cur = conn.scroll_cursor().expect("cursor");
    c.bench_function("scroll_cursor_materialize_1000_rows", |b| {
        b.iter(|| {
            cur.execute("select * from bench", ()).expect("execute");
            black_box(cur.rowcount())
        });
    });
}

fn benchmark_executemany_100_rows(c: &mut Criterion) {
    let conn = connection();
    conn.execute("create table sink(id int, payload varchar(64))", ())
        .expect("create");
    let rows: Vec<Vec<Value>> = (0..100)
        .map(|i| vec![Value::from(i), Value::from(format!("payload_{}", i))])
        .collect();
    let mut cur = conn.cursor().expect("cursor");
    c.bench_function("executemany_100_rows", |b| {
        b.iter(|| {
            cur.executemany("insert into sink values (?, ?)", rows.iter().cloned())
                .expect("insert");
            conn.rollback().expect("rollback");
        });
    });
}

criterion_group!(
    benches,
    benchmark_fetchone_onerow,
    benchmark_fetchall_1000_rows,
    benchmark_scroll_cursor_1000_rows,
    benchmark_executemany_100_rows
);
criterion_main!(benches);
