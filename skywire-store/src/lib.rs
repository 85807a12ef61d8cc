//! SQLite sink for JSON documents pulled from the API.
//!
//! Everything lives in one table:
//!
//! ```sql
//! bluesky(id INTEGER PRIMARY KEY AUTOINCREMENT, name TEXT,
//!         data TEXT NOT NULL CHECK(json_valid(data)),
//!         created_at TIMESTAMP DEFAULT CURRENT_TIMESTAMP)
//! ```
//!
//! `name` tags a batch of imported lines so it can be queried back later.
use std::path::Path;
use std::str::FromStr;

use anyhow::{Context, Result};
use serde_json::{Map, Value};
use sqlx::sqlite::{SqliteConnectOptions, SqlitePoolOptions, SqliteRow};
use sqlx::{Column, Row, SqlitePool, TypeInfo, ValueRef};
use tokio::io::{AsyncBufReadExt, BufReader};
use tracing::{debug, info};

pub const TABLE: &str = "bluesky";

const CREATE_TABLE: &str = r#"
    CREATE TABLE IF NOT EXISTS bluesky (
      id         INTEGER PRIMARY KEY AUTOINCREMENT,
      name       TEXT,
      data       TEXT NOT NULL CHECK (json_valid(data)),
      created_at TIMESTAMP DEFAULT CURRENT_TIMESTAMP
    )"#;

#[derive(Clone)]
pub struct Store {
    pool: SqlitePool,
}

impl Store {
    /// Open (creating if needed) the database at `url`, e.g. `sqlite://skywire.db`.
    pub async fn connect(url: &str) -> Result<Self> {
        let opts = SqliteConnectOptions::from_str(url)
            .with_context(|| format!("invalid database url {url}"))?
            .create_if_missing(true);
        // One connection: the CLI never runs queries in parallel, and
        // `sqlite::memory:` databases are per-connection.
        let pool = SqlitePoolOptions::new()
            .max_connections(1)
            .connect_with(opts)
            .await
            .with_context(|| format!("failed to open {url}"))?;
        debug!(url, "store.connect");
        Ok(Self { pool })
    }


    pub async fn list_tables(&self) -> Result<Vec<String>> {
        let rows = sqlx::query(
            r#"SELECT name FROM sqlite_master
               WHERE type = 'table' AND name NOT LIKE 'sqlite_%'
               ORDER BY name"#,
        )
        .fetch_all(&self.pool)
        .await?;
        rows.iter()
            .map(|r| r.try_get::<String, _>("name").map_err(Into::into))
            .collect()
    }

    pub async fn create_table(&self) -> Result<()> {
        sqlx::query(CREATE_TABLE).execute(&self.pool).await?;
        info!(table = TABLE, "store.create_table");
        Ok(())
    }

    pub async fn drop_table(&self) -> Result<()> {
        sqlx::query("DROP TABLE IF EXISTS bluesky")
            .execute(&self.pool)
            .await?;
        info!(table = TABLE, "store.drop_table");
        Ok(())
    }

    /// Insert every non-blank line of a JSON Lines file under `name`.
    ///
    /// All-or-nothing: the first line that is not valid JSON aborts the import
    /// and nothing from the file is kept. Creates the table if it is missing.
    pub async fn import_json_lines(&self, path: &Path, name: &str) -> Result<u64> {
        let file = tokio::fs::File::open(path)
            .await
            .with_context(|| format!("failed to open {}", path.display()))?;
        let mut lines = BufReader::new(file).lines();

        self.create_table().await?;
        let mut tx = self.pool.begin().await?;
        let mut lineno = 0usize;
        let mut inserted = 0u64;

        while let Some(line) = lines
            .next_line()
            .await
            .with_context(|| format!("failed to read {}", path.display()))?
        {
            lineno += 1;
            let line = line.trim();
            if line.is_empty() {
                continue;
            }
            serde_json::from_str::<Value>(line)
                .with_context(|| format!("{}:{lineno}: invalid JSON", path.display()))?;
            let res = sqlx::query("INSERT INTO bluesky (name, data) VALUES (?1, ?2)")
                .bind(name)
                .bind(line)
                .execute(&mut *tx)
                .await
                .with_context(|| format!("{}:{lineno}: insert failed", path.display()))?;
            inserted += res.rows_affected();
        }

        tx.commit().await?;
        info!(
            path = %path.display(),
            name,
            lines = lineno,
            rows = inserted,
            "store.import.done"
        );
        Ok(inserted)
    }

    /// `handle` of every document imported under `name`, in import order.
    /// Documents without a handle are skipped.
    pub async fn query_handles(&self, name: &str) -> Result<Vec<String>> {
        let rows = sqlx::query(
            r#"SELECT json_extract(data, '$.handle') AS handle
               FROM bluesky
               WHERE name = ?1
               ORDER BY id"#,
        )
        .bind(name)
        .fetch_all(&self.pool)
        .await?;
        info!(name, rows = rows.len(), "store.query_handles");
        // Documents without a handle are skipped; a handle that is not text is an error.
        rows.iter()
            .filter_map(|r| r.try_get::<Option<String>, _>("handle").transpose())
            .collect::<Result<Vec<_>, _>>()
            .with_context(|| format!("rows named '{name}' hold a non-text handle"))
    }

    /// Run arbitrary SQL and return each row as a JSON object keyed by column.
    pub async fn query_rows(&self, sql: &str) -> Result<Vec<Value>> {
        let rows = sqlx::query(sql).fetch_all(&self.pool).await?;
        debug!(rows = rows.len(), "store.query");
        rows.iter()
            .map(|r| row_to_object(r).map(Value::Object))
            .collect()
    }

    /// Like [`Store::query_rows`], but a row with a `data` column yields that
    /// document itself instead of the row wrapper.
    pub async fn query_data(&self, sql: &str) -> Result<Vec<Value>> {
        let rows = sqlx::query(sql).fetch_all(&self.pool).await?;
        debug!(rows = rows.len(), "store.query_data");
        rows.iter()
            .map(|r| -> Result<Value> {
                let mut obj = row_to_object(r)?;
                Ok(match obj.remove("data") {
                    Some(Value::String(s)) => serde_json::from_str(&s).unwrap_or(Value::String(s)),
                    Some(Value::Null) | None => Value::Object(obj),
                    Some(other) => other,
                })
            })
            .collect()
    }
}

/// Convert by the value's storage class; SQLite columns are dynamically typed.
fn row_to_object(row: &SqliteRow) -> Result<Map<String, Value>> {
    let mut obj = Map::new();
    for (i, col) in row.columns().iter().enumerate() {
        let raw = row.try_get_raw(i)?;
        let v = if raw.is_null() {
            Value::Null
        } else {
            let kind = raw.type_info().name().to_string();
            match kind.as_str() {
                "INTEGER" => Value::from(row.try_get::<i64, _>(i)?),
                "REAL" => Value::from(row.try_get::<f64, _>(i)?),
                "BOOLEAN" => Value::from(row.try_get::<bool, _>(i)?),
                "BLOB" => {
                    let bytes: Vec<u8> = row.try_get(i)?;
                    Value::String(String::from_utf8_lossy(&bytes).into_owned())
                }
                _ => Value::String(row.try_get::<String, _>(i)?),
            }
        };
        obj.insert(col.name().to_string(), v);
    }
    Ok(obj)
}
