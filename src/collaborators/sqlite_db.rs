use super::{QueryExecutor, SchemaProvider};
use crate::errors::CollaboratorError;
use crate::util::truncate;
use async_trait::async_trait;
use rusqlite::types::ValueRef;
use rusqlite::{Connection, OpenFlags};
use std::path::Path;
use std::sync::{Arc, Mutex};

/// Text values longer than this are cut before rendering.
const MAX_VALUE_CHARS: usize = 300;

/// SQLite database used as both schema provider and query executor.
///
/// The connection sits behind `Arc<Mutex>` and every access runs on tokio's
/// blocking pool via `spawn_blocking`, so synchronous SQLite I/O never ties
/// up async worker threads.
#[derive(Clone)]
pub struct SqliteDatabase {
    conn: Arc<Mutex<Connection>>,
    sample_rows: usize,
}

impl SqliteDatabase {
    /// Open an existing database file. Missing files are an error rather than
    /// silently creating an empty database.
    pub fn open(path: &Path, read_only: bool, sample_rows: usize) -> Result<Self, CollaboratorError> {
        if !path.exists() {
            return Err(CollaboratorError::Config(format!(
                "database file not found: {}",
                path.display()
            )));
        }
        let flags = if read_only {
            OpenFlags::SQLITE_OPEN_READ_ONLY
        } else {
            OpenFlags::SQLITE_OPEN_READ_WRITE
        };
        let conn = Connection::open_with_flags(path, flags)?;
        Ok(Self::from_connection(conn, sample_rows))
    }

    pub fn from_connection(conn: Connection, sample_rows: usize) -> Self {
        Self {
            conn: Arc::new(Mutex::new(conn)),
            sample_rows,
        }
    }

    /// Run a closure with the connection on a blocking thread.
    async fn call<F, R>(&self, f: F) -> Result<R, CollaboratorError>
    where
        F: FnOnce(&Connection) -> Result<R, CollaboratorError> + Send + 'static,
        R: Send + 'static,
    {
        let conn = self.conn.clone();
        tokio::task::spawn_blocking(move || {
            let guard = conn
                .lock()
                .map_err(|e| CollaboratorError::Task(format!("DB lock poisoned: {}", e)))?;
            f(&guard)
        })
        .await
        .map_err(|e| CollaboratorError::Task(format!("DB task panicked: {}", e)))?
    }
}

#[async_trait]
impl SchemaProvider for SqliteDatabase {
    async fn table_info(&self) -> Result<String, CollaboratorError> {
        let sample_rows = self.sample_rows;
        self.call(move |conn| describe_tables(conn, sample_rows)).await
    }

    fn dialect(&self) -> String {
        "sqlite".to_string()
    }
}

#[async_trait]
impl QueryExecutor for SqliteDatabase {
    async fn execute(&self, sql: &str) -> Result<String, CollaboratorError> {
        let sql = sql.to_string();
        self.call(move |conn| run_query(conn, &sql)).await
    }
}

/// `CREATE` statement of every user table, each followed by a few sample rows.
fn describe_tables(conn: &Connection, sample_rows: usize) -> Result<String, CollaboratorError> {
    let mut stmt = conn.prepare(
        "SELECT name, sql FROM sqlite_master
         WHERE type = 'table' AND name NOT LIKE 'sqlite_%'
         ORDER BY name",
    )?;
    let tables = stmt
        .query_map([], |row| {
            Ok((row.get::<_, String>(0)?, row.get::<_, Option<String>>(1)?))
        })?
        .collect::<Result<Vec<_>, _>>()?;

    if tables.is_empty() {
        return Ok("(no tables)".to_string());
    }

    let mut sections = Vec::with_capacity(tables.len());
    for (name, create_sql) in tables {
        let mut section = create_sql.unwrap_or_else(|| format!("CREATE TABLE {} (...)", name));
        if sample_rows > 0 {
            section.push_str("\n\n");
            section.push_str(&sample_block(conn, &name, sample_rows)?);
        }
        sections.push(section);
    }
    Ok(sections.join("\n\n"))
}

fn sample_block(conn: &Connection, table: &str, limit: usize) -> Result<String, CollaboratorError> {
    let sql = format!("SELECT * FROM {} LIMIT {}", quote_ident(table), limit);
    let mut stmt = conn.prepare(&sql)?;
    let columns: Vec<String> = stmt.column_names().iter().map(|c| c.to_string()).collect();
    let column_count = columns.len();

    let mut lines = vec![
        format!("{} rows from {} table:", limit, table),
        columns.join("\t"),
    ];
    let mut rows = stmt.query([])?;
    while let Some(row) = rows.next()? {
        let values = (0..column_count)
            .map(|i| row.get_ref(i).map(render_plain))
            .collect::<Result<Vec<_>, _>>()?;
        lines.push(values.join("\t"));
    }
    Ok(format!("/*\n{}\n*/", lines.join("\n")))
}

/// Execute `sql` and render the result.
///
/// Row-returning statements render as a list of tuples, e.g.
/// `[(1, 'Alice'), (2, None)]`; other statements report the affected row count.
fn run_query(conn: &Connection, sql: &str) -> Result<String, CollaboratorError> {
    let mut stmt = conn.prepare(sql)?;
    let column_count = stmt.column_count();

    if column_count == 0 {
        let affected = stmt.execute([])?;
        return Ok(format!("OK ({} rows affected)", affected));
    }

    let mut rendered = Vec::new();
    let mut rows = stmt.query([])?;
    while let Some(row) = rows.next()? {
        let values = (0..column_count)
            .map(|i| row.get_ref(i).map(render_literal))
            .collect::<Result<Vec<_>, _>>()?;
        rendered.push(tuple(&values));
    }
    Ok(format!("[{}]", rendered.join(", ")))
}

fn tuple(values: &[String]) -> String {
    if values.len() == 1 {
        format!("({},)", values[0])
    } else {
        format!("({})", values.join(", "))
    }
}

fn render_literal(value: ValueRef<'_>) -> String {
    match value {
        ValueRef::Null => "None".to_string(),
        ValueRef::Integer(i) => i.to_string(),
        ValueRef::Real(f) => format!("{:?}", f),
        ValueRef::Text(bytes) => {
            let text = truncate(&String::from_utf8_lossy(bytes), MAX_VALUE_CHARS);
            format!("'{}'", text.replace('\\', "\\\\").replace('\'', "\\'"))
        }
        ValueRef::Blob(bytes) => format!("<blob {} bytes>", bytes.len()),
    }
}

fn render_plain(value: ValueRef<'_>) -> String {
    match value {
        ValueRef::Text(bytes) => truncate(&String::from_utf8_lossy(bytes), MAX_VALUE_CHARS),
        other => render_literal(other),
    }
}

fn quote_ident(name: &str) -> String {
    format!("\"{}\"", name.replace('"', "\"\""))
}

#[cfg(test)]
mod tests {
    use super::*;

    fn sample_db() -> SqliteDatabase {
        let conn = Connection::open_in_memory().unwrap();
        conn.execute_batch(
            "
            CREATE TABLE customers (id INTEGER PRIMARY KEY, name TEXT, balance REAL);
            INSERT INTO customers (id, name, balance) VALUES (1, 'Alice', 10.5);
            INSERT INTO customers (id, name, balance) VALUES (2, NULL, 0.0);
            INSERT INTO customers (id, name, balance) VALUES (3, 'O''Brien', 3.25);
            CREATE TABLE orders (id INTEGER PRIMARY KEY, customer_id INTEGER);
            ",
        )
        .unwrap();
        SqliteDatabase::from_connection(conn, 2)
    }

    #[tokio::test]
    async fn test_table_info_lists_tables_with_samples() {
        let db = sample_db();
        let info = db.table_info().await.unwrap();

        assert!(info.contains("CREATE TABLE customers"));
        assert!(info.contains("CREATE TABLE orders"));
        assert!(info.contains("2 rows from customers table:"));
        assert!(info.contains("id\tname\tbalance"));
        assert!(info.contains("1\tAlice\t10.5"));
        assert!(!info.contains("O'Brien"), "sample limited to 2 rows");
        assert!(info.find("customers").unwrap() < info.find("orders").unwrap());
        assert_eq!(db.dialect(), "sqlite");
    }

    #[tokio::test]
    async fn test_table_info_empty_database() {
        let db = SqliteDatabase::from_connection(Connection::open_in_memory().unwrap(), 3);
        assert_eq!(db.table_info().await.unwrap(), "(no tables)");
    }

    #[tokio::test]
    async fn test_execute_renders_rows_as_tuples() {
        let db = sample_db();
        let result = db
            .execute("SELECT id, name FROM customers ORDER BY id")
            .await
            .unwrap();
        assert_eq!(result, r"[(1, 'Alice'), (2, None), (3, 'O\'Brien')]");

        let count = db.execute("SELECT COUNT(*) FROM customers").await.unwrap();
        assert_eq!(count, "[(3,)]");

        let real = db.execute("SELECT balance FROM customers WHERE id = 2").await.unwrap();
        assert_eq!(real, "[(0.0,)]");
    }

    #[tokio::test]
    async fn test_execute_truncates_long_text_values() {
        let db = sample_db();
        let result = db
            .execute("SELECT substr(hex(zeroblob(500)), 1, 1000)")
            .await
            .unwrap();
        assert_eq!(result, format!("[('{}…',)]", "0".repeat(MAX_VALUE_CHARS - 1)));
    }

    #[tokio::test]
    async fn test_execute_empty_result_and_statement() {
        let db = sample_db();
        assert_eq!(db.execute("SELECT * FROM orders").await.unwrap(), "[]");
        assert_eq!(
            db.execute("INSERT INTO orders (customer_id) VALUES (1)").await.unwrap(),
            "OK (1 rows affected)"
        );
    }

    #[tokio::test]
    async fn test_execute_invalid_sql_is_error() {
        let db = sample_db();
        let err = db.execute("SELEC nonsense").await.unwrap_err();
        assert!(matches!(err, CollaboratorError::Database(_)));
    }

    #[tokio::test]
    async fn test_open_missing_file_and_read_only() {
        let dir = tempfile::tempdir().unwrap();
        let missing = dir.path().join("missing.db");
        assert!(matches!(
            SqliteDatabase::open(&missing, false, 3),
            Err(CollaboratorError::Config(_))
        ));

        let path = dir.path().join("shop.db");
        Connection::open(&path)
            .unwrap()
            .execute_batch("CREATE TABLE t (x INTEGER); INSERT INTO t VALUES (7);")
            .unwrap();

        let db = SqliteDatabase::open(&path, true, 3).unwrap();
        assert_eq!(db.execute("SELECT x FROM t").await.unwrap(), "[(7,)]");
        assert!(db.execute("INSERT INTO t VALUES (8)").await.is_err());
    }
}
