/// Scrollable cursor tests
use mimer_engine::error::codes;
use mimer_engine::{Connection, Cursor, ErrorKind, MimerError, ScrollMode, Value};

mod helpers;
use helpers::{connect, mock_env};

fn ten_rows(conn: &Connection) -> Cursor {
    let mut cur = conn.scroll_cursor().expect("scroll cursor");
    cur.execute("create table s(c1 int, c2 varchar(10))", ())
        .expect("create");
    cur.executemany(
        "insert into s values (?, ?)",
        (1..=10).map(|i| (i, format!("row{}", i))),
    )
    .expect("fill");
    cur.execute("select * from s", ()).expect("select");
    cur
}

#[test]
fn test_scroll_bounds() {
    let (_mock, env) = mock_env();
    let conn = connect(&env);
    let mut cur = ten_rows(&conn);
    assert!(cur.is_scrollable());
    assert_eq!(cur.rowcount(), 10);

    let err = cur.scroll(10, ScrollMode::Absolute).err().expect("out of range");
    assert!(matches!(
        err,
        MimerError::ScrollOutOfRange {
            position: 10,
            rows: 10
        }
    ));

    cur.scroll(9, ScrollMode::Absolute).expect("last row");
    assert_eq!(
        cur.fetchone().expect("10th"),
        vec![Value::Int(10), Value::from("row10")]
    );
    assert!(cur.fetchone().expect("end").is_empty());
}

#[test]
fn test_relative_scroll_and_rownumber() {
    let (_mock, env) = mock_env();
    let conn = connect(&env);
    let mut cur = ten_rows(&conn);
    assert_eq!(cur.rownumber(), Some(0));

    cur.fetchmany(Some(3)).expect("three");
    assert_eq!(cur.rownumber(), Some(3));
    cur.scroll(2, ScrollMode::Relative).expect("forward");
    assert_eq!(cur.fetchone().expect("row")[0], Value::Int(6));
    cur.scroll(-6, ScrollMode::default()).expect("back to start");
    assert_eq!(cur.fetchone().expect("row")[0], Value::Int(1));

    let err = cur.scroll(-5, ScrollMode::Relative).err().expect("before start");
    assert!(matches!(err, MimerError::ScrollOutOfRange { position: -4, .. }));
    assert_eq!(cur.rownumber(), Some(1));
}

#[test]
fn test_fetchall_from_position() {
    let (_mock, env) = mock_env();
    let conn = connect(&env);
    let mut cur = ten_rows(&conn);
    cur.scroll(7, ScrollMode::Absolute).expect("row 8");
    let rest = cur.fetchall().expect("rest");
    assert_eq!(rest.len(), 3);
    assert_eq!(rest[0][0], Value::Int(8));
    assert!(cur.fetchall().expect("none").is_empty());
    assert!(cur.fetchmany(Some(4)).expect("none").is_empty());
}

#[test]
fn test_result_set_is_read_on_execute() {
    let (mock, env) = mock_env();
    let conn = connect(&env);
    let mut cur = ten_rows(&conn);
    mock.reset_calls();

    let rows = cur.fetchall().expect("rows");
    assert_eq!(rows.len(), 10);
    assert_eq!(mock.calls("MimerFetch"), 0);

    cur.execute("select * from s", ()).expect("again");
    assert_eq!(mock.calls("MimerFetch"), 11);
    assert_eq!(mock.calls("MimerCloseCursor"), 1);
}

#[test]
fn test_scroll_mode_strings() {
    assert_eq!("absolute".parse::<ScrollMode>().ok(), Some(ScrollMode::Absolute));
    let err = "forward".parse::<ScrollMode>().err().expect("illegal");
    assert_eq!(err.code(), codes::ILLEGAL_SCROLL_MODE);
    assert!(err.is_a(ErrorKind::ProgrammingError));
}

#[test]
fn test_scroll_needs_result_set() {
    let (_mock, env) = mock_env();
    let conn = connect(&env);

    let mut scrollable = conn.scroll_cursor().expect("scroll cursor");
    let err = scrollable.scroll(0, ScrollMode::Absolute).err().expect("no rows yet");
    assert_eq!(err.code(), codes::NO_RESULT_SET);

    let mut forward = conn.cursor().expect("cursor");
    forward.execute("select m from system.onerow", ()).expect("select");
    let err = forward.scroll(0, ScrollMode::Absolute).err().expect("forward only");
    assert_eq!(err.code(), codes::UNSUPPORTED_METHOD);
    assert!(forward.rownumber().is_none());
}
