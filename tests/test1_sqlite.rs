#![cfg(feature = "sqlite")]

use chrono::NaiveDate;
use rust_decimal::Decimal;
use sql_portal::prelude::*;
use tempfile::TempDir;

fn sqlite_url(dir: &TempDir, name: &str) -> String {
    format!("sqlite:{}", dir.path().join(name).display())
}

#[test]
fn insert_then_select_row() -> Result<(), DbError> {
    let conn = connect("sqlite::memory:")?;
    conn.execute("create table t(a integer, b text)")?;

    let insert = conn.prepare("insert into t(a,b) values(:a,:b)")?;
    insert.bind("a", 42)?.bind("b", "hi")?;
    assert_eq!(insert.execute()?, 1);

    let row = conn.select_row("select b from t where a=42")?;
    assert_eq!(row.value(0)?.get_string()?, "hi");
    Ok(())
}

#[test]
fn dropped_transaction_leaves_no_rows() -> Result<(), DbError> {
    let dir = TempDir::new().map_err(|e| DbError::Other(e.to_string()))?;
    let url = sqlite_url(&dir, "raii.db");

    let conn = connect(&url)?;
    conn.execute("create table t(a integer, b text)")?;
    {
        let _tx = conn.transaction()?;
        let insert = conn.prepare("insert into t(a,b) values(:a,:b)")?;
        insert.bind("a", 1)?.bind("b", "one")?.execute()?;
        insert.bind("a", 2)?.bind("b", "two")?.execute()?;
        assert_eq!(conn.select_value("select count(*) from t")?.get_i64()?, 2);
    }

    // a second connection sees the committed state of the file
    let other = connect(&url)?;
    assert_eq!(other.select_value("select count(*) from t")?.get_i64()?, 0);
    Ok(())
}

#[test]
fn committed_transaction_persists() -> Result<(), DbError> {
    let dir = TempDir::new().map_err(|e| DbError::Other(e.to_string()))?;
    let url = sqlite_url(&dir, "commit.db");

    let conn = connect(&url)?;
    conn.execute("create table t(a integer)")?;
    let mut tx = conn.transaction()?;
    conn.execute("insert into t values (7)")?;
    tx.commit()?;
    assert!(!tx.is_active());
    drop(tx);

    let other = connect(&url)?;
    assert_eq!(other.select_value("select a from t")?.get_i32()?, 7);
    Ok(())
}

#[test]
fn repeated_and_unbound_host_variables() -> Result<(), DbError> {
    let conn = connect("sqlite::memory:")?;
    let stmt = conn.prepare("select :x + :x, :missing is null, ':x'")?;
    stmt.bind("x", 5)?;
    let row = stmt.select_row()?;
    assert_eq!(row.get::<i64>(0)?, 10);
    assert!(row.get::<bool>(1)?);
    assert_eq!(row.get::<String>(2)?, ":x");
    Ok(())
}

#[test]
fn select_row_without_rows_is_not_found() -> Result<(), DbError> {
    let conn = connect("sqlite::memory:")?;
    conn.execute("create table t(a integer)")?;
    assert!(matches!(
        conn.select_row("select a from t"),
        Err(DbError::NotFound)
    ));
    let stmt = conn.prepare("select a from t where a = :a")?;
    stmt.bind("a", 1)?;
    assert!(matches!(stmt.select_value(), Err(DbError::NotFound)));
    Ok(())
}

#[test]
fn engine_errors_carry_the_sql() -> Result<(), DbError> {
    let conn = connect("sqlite::memory:")?;
    match conn.prepare("selec nothing") {
        Err(DbError::Sql { sql, .. }) => assert_eq!(sql, "selec nothing"),
        other => panic!("expected Sql error, got {other:?}"),
    }
    Ok(())
}

#[test]
fn typed_values_round_trip() -> Result<(), DbError> {
    let conn = connect("sqlite::memory:")?;
    conn.execute("create table t(d text, m text, f real, raw blob, n integer)")?;

    let day = NaiveDate::from_ymd_opt(2024, 2, 29).ok_or(DbError::Other("date".into()))?;
    let price: Decimal = "12.50".parse().map_err(|_| DbError::Other("decimal".into()))?;
    let raw = Blob::from_slice(&[0, 1, 2, 255]);

    conn.prepare("insert into t values(:d, :m, :f, :raw, :n)")?
        .set_date("d", day)?
        .set_decimal("m", price)?
        .set_f64("f", 1.5)?
        .set_blob("raw", &raw)?
        .set_null("n")?
        .execute()?;

    let row = conn.select_row("select d, m, f, raw, n from t")?;
    assert_eq!(row.get::<NaiveDate>(0)?, day);
    assert_eq!(row.get::<Decimal>(1)?, price);
    assert!((row.get::<f64>(2)? - 1.5).abs() < f64::EPSILON);
    assert_eq!(row.get::<Blob>(3)?, raw);
    assert_eq!(row.get::<Option<i64>>(4)?, None);
    assert!(matches!(row.get::<i64>(4), Err(DbError::NullValue)));
    Ok(())
}

#[test]
fn cursor_and_pagination() -> Result<(), DbError> {
    let conn = connect("sqlite::memory:")?;
    conn.execute("create table t(a integer)")?;
    let insert = conn.prepare("insert into t values(:a)")?;
    for a in 0..10 {
        insert.bind("a", a)?.execute()?;
    }
    assert_eq!(conn.last_insert_id("")?, 10);

    let page = conn.prepare_with_limit("select a from t order by a", "limit", "offset")?;
    page.bind("limit", 3)?.bind("offset", 4)?;
    let values = page
        .cursor(2)?
        .map(|row| row?.get::<i64>(0))
        .collect::<Result<Vec<_>, _>>()?;
    assert_eq!(values, vec![4, 5, 6]);

    let mut cursor = conn.prepare("select a from t where a > 8")?.cursor(100)?;
    assert_eq!(cursor.fetch()?.get::<i64>(0)?, 9);
    assert!(cursor.fetch()?.is_null());
    assert!(cursor.is_closed());
    Ok(())
}

#[test]
fn column_lookup_by_name() -> Result<(), DbError> {
    let conn = connect("sqlite::memory:")?;
    let row = conn.select_row("select 1 as Id, 'x' as Label")?;
    assert_eq!(row.column_names()?, vec!["Id", "Label"]);
    assert_eq!(row.get_by_name::<i64>("Id")?, 1);
    assert!(matches!(row.value_by_name("id"), Err(DbError::FieldNotFound(_))));
    assert_eq!(row.value_by_name_ci("label")?.get_string()?, "x");
    Ok(())
}

#[test]
fn pooled_sqlite_connection_is_reused() -> Result<(), DbError> {
    let dir = TempDir::new().map_err(|e| DbError::Other(e.to_string()))?;
    let pools = ConnectionPools::new(sql_portal::driver_registry());
    let url = sqlite_url(&dir, "pooled.db");

    let conn = pools.connect(&url)?;
    conn.execute("create table t(a integer)")?;
    assert!(conn.ping());
    drop(conn);

    let pool = pools.pool(&url);
    assert_eq!(pool.idle_count(), 1);
    let again = pools.connect(&url)?;
    assert_eq!(pool.current_size(), 1);
    assert_eq!(again.select_value("select count(*) from t")?.get_i64()?, 0);
    Ok(())
}

#[test]
fn cursor_steps_the_query_on_demand() -> Result<(), DbError> {
    let conn = connect("sqlite::memory:")?;
    conn.execute("create table t(a integer)")?;
    let insert = conn.prepare("insert into t values(:a)")?;
    for a in 1..=5 {
        insert.bind("a", a)?.execute()?;
    }

    // only the fifth row overflows; nothing fails before it is stepped
    let stmt = conn.prepare(
        "select case when a = 5 then abs(a - 5 - 9223372036854775807 - 1) else a end \
         from t order by a",
    )?;
    let mut cursor = stmt.cursor(1)?;
    for expected in 1..=4 {
        assert_eq!(cursor.fetch()?.get::<i64>(0)?, expected);
    }
    match cursor.fetch() {
        Err(DbError::Sql { message, .. }) => assert!(message.contains("overflow")),
        other => panic!("expected an overflow on the fifth row, got {other:?}"),
    }
    assert!(cursor.is_closed());
    Ok(())
}

#[test]
fn connection_stays_usable_while_cursors_are_open() -> Result<(), DbError> {
    let conn = connect("sqlite::memory:")?;
    conn.execute("create table src(a integer)")?;
    conn.execute("create table dst(a integer)")?;
    conn.execute("insert into src values (1), (2), (3)")?;

    let copy = conn.prepare("insert into dst values(:a)")?;
    let mut outer = conn.prepare("select a from src order by a")?.cursor(1)?;
    let first = outer.fetch()?.get::<i64>(0)?;
    copy.bind("a", first)?.execute()?;

    // fetching the outer cursor while an inner one is half read
    let mut inner = conn.prepare("select a from src order by a desc")?.cursor(1)?;
    assert_eq!(inner.fetch()?.get::<i64>(0)?, 3);
    assert_eq!(outer.fetch()?.get::<i64>(0)?, 2);
    assert_eq!(inner.fetch()?.get::<i64>(0)?, 2);
    assert_eq!(outer.fetch()?.get::<i64>(0)?, 3);
    assert!(outer.fetch()?.is_null());
    assert_eq!(inner.fetch()?.get::<i64>(0)?, 1);
    assert!(inner.fetch()?.is_null());

    assert_eq!(conn.select_value("select count(*) from dst")?.get_i64()?, 1);
    Ok(())
}

#[test]
fn dropped_cursor_releases_its_statement() -> Result<(), DbError> {
    let conn = connect("sqlite::memory:")?;
    conn.execute("create table t(a integer)")?;
    conn.execute("insert into t values (1), (2)")?;
    {
        let mut cursor = conn.prepare("select a from t")?.cursor(1)?;
        assert!(!cursor.fetch()?.is_null());
    }
    // a half-read statement would keep the table locked against the drop
    conn.execute("drop table t")?;
    Ok(())
}

#[test]
fn pooled_connection_comes_back_without_open_transaction() -> Result<(), DbError> {
    let dir = TempDir::new().map_err(|e| DbError::Other(e.to_string()))?;
    let pools = ConnectionPools::with_options(
        sql_portal::driver_registry(),
        PoolOptions::new().max_size(1),
    );
    let url = sqlite_url(&dir, "reset.db");

    let conn = pools.connect(&url)?;
    conn.execute("create table t(a integer)")?;
    conn.begin_transaction()?;
    conn.execute("insert into t values (1)")?;
    drop(conn);

    let next = pools.connect(&url)?;
    assert_eq!(pools.pool(&url).current_size(), 1);
    assert_eq!(next.select_value("select count(*) from t")?.get_i64()?, 0);
    let mut tx = next.transaction()?;
    next.execute("insert into t values (2)")?;
    tx.commit()?;
    drop(tx);

    // a transaction opened with plain SQL is found by the driver
    next.execute("begin")?;
    next.execute("insert into t values (3)")?;
    drop(next);

    let last = pools.connect(&url)?;
    assert_eq!(last.select_value("select count(*) from t")?.get_i64()?, 1);
    Ok(())
}
