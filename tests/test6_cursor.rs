use sql_portal::test_utils::{MockManager, mock_registry};
use sql_portal::{Connection, DbError};

fn mock_connection() -> Result<(MockManager, Connection), DbError> {
    let manager = MockManager::new();
    let conn = mock_registry(&manager).connect("mock:cursor")?;
    Ok((manager, conn))
}

#[test]
fn cursor_fetches_one_row_at_a_time() -> Result<(), DbError> {
    let (manager, conn) = mock_connection()?;
    let stmt = conn.prepare("select n from big")?;
    stmt.bind("rows", 1000)?;

    let mut cursor = stmt.cursor(10)?;
    for expected in 0..3 {
        let row = cursor.fetch()?;
        assert_eq!(row.get_by_name::<i64>("n")?, expected);
    }
    assert_eq!(manager.stats().fetches(), 3);

    cursor.close();
    assert!(cursor.is_closed());
    assert!(cursor.fetch()?.is_null());
    assert_eq!(manager.stats().fetches(), 3);
    Ok(())
}

#[test]
fn exhausted_cursor_yields_null_row_not_error() -> Result<(), DbError> {
    let (_manager, conn) = mock_connection()?;
    let stmt = conn.prepare("select n from small")?;
    stmt.bind("rows", 2)?;

    let mut cursor = stmt.cursor(1)?;
    assert!(!cursor.fetch()?.is_null());
    assert!(!cursor.fetch()?.is_null());
    let end = cursor.fetch()?;
    assert!(end.is_null());
    assert!(matches!(end.value(0), Err(DbError::NullHandle(_))));
    assert!(cursor.is_closed());
    Ok(())
}

#[test]
fn cursor_iterates_and_outlives_its_statement_handle() -> Result<(), DbError> {
    let (manager, conn) = mock_connection()?;
    let cursor = {
        let stmt = conn.prepare("select n, sql from t")?;
        stmt.bind("rows", 4)?;
        stmt.cursor(2)?
    };
    drop(conn);

    let rows = cursor.collect::<Result<Vec<_>, _>>()?;
    assert_eq!(rows.len(), 4);
    assert_eq!(rows[3].get::<i64>(0)?, 3);
    assert_eq!(rows[0].get::<String>(1)?, "select n, sql from t");
    assert_eq!(manager.stats().closes(), 1);
    Ok(())
}

#[test]
fn select_row_takes_the_first_of_many() -> Result<(), DbError> {
    let (_manager, conn) = mock_connection()?;
    let stmt = conn.prepare("select n from t")?;
    stmt.bind("rows", 5)?;
    assert_eq!(stmt.select()?.len(), 5);
    assert_eq!(stmt.select_value()?.get_i64()?, 0);

    stmt.bind("rows", 0)?;
    assert!(matches!(stmt.select_row(), Err(DbError::NotFound)));
    Ok(())
}
