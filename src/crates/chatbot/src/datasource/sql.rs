//! SQL project data source over a SQLite pool.

use super::SqlClientError;
use once_cell::sync::Lazy;
use parking_lot::RwLock;
use regex::Regex;
use serde::{Deserialize, Serialize};
use serde_json::{json, Map, Value};
use sqlx::sqlite::{SqliteConnectOptions, SqlitePool, SqlitePoolOptions, SqliteRow};
use sqlx::{Column, Row, TypeInfo, ValueRef};
use std::str::FromStr;
use std::sync::Arc;
use tracing::{debug, warn};

pub const DEFAULT_SAMPLE_LIMIT: usize = 5;

// Matches whole words only, so `updated_at` passes while `;DELETE` and
// `(drop` do not.
static UNSAFE_KEYWORD: Lazy<Regex> = Lazy::new(|| {
    Regex::new(
        r"(?i)\b(drop|delete|update|insert|alter|truncate|create|replace|attach|detach|pragma|vacuum)\b",
    )
    .unwrap()
});

static IDENTIFIER: Lazy<Regex> = Lazy::new(|| Regex::new(r"^[A-Za-z_][A-Za-z0-9_]*$").unwrap());

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ColumnInfo {
    pub name: String,
    #[serde(rename = "type")]
    pub data_type: String,
    pub nullable: bool,
    pub default: Option<String>,
    pub primary_key: bool,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ForeignKey {
    pub columns: Vec<String>,
    pub referenced_table: String,
    pub referenced_columns: Vec<String>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TableSchema {
    pub table_name: String,
    pub columns: Vec<ColumnInfo>,
    pub primary_keys: Vec<String>,
    pub foreign_keys: Vec<ForeignKey>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Relationship {
    pub from_table: String,
    pub from_columns: Vec<String>,
    pub to_table: String,
    pub to_columns: Vec<String>,
}

/// Every table's schema plus the foreign-key relationships between them.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct DatabaseInfo {
    pub tables: Vec<TableSchema>,
    pub relationships: Vec<Relationship>,
}

/// Column names and dynamically decoded rows of a query.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct QueryResult {
    pub columns: Vec<String>,
    pub rows: Vec<Vec<Value>>,
}

impl QueryResult {
    pub fn is_empty(&self) -> bool {
        self.rows.is_empty()
    }

    /// Rows as column-keyed objects.
    pub fn records(&self) -> Vec<Map<String, Value>> {
        self.rows
            .iter()
            .map(|row| {
                self.columns
                    .iter()
                    .cloned()
                    .zip(row.iter().cloned())
                    .collect()
            })
            .collect()
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ColumnStats {
    pub name: String,
    pub distinct_count: i64,
    pub null_count: i64,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TableAnalysis {
    pub table_name: String,
    pub row_count: i64,
    pub schema: TableSchema,
    pub columns: Vec<ColumnStats>,
    pub sample_data: Vec<Map<String, Value>>,
}

/// Whether `sql` is a single statement free of data-modifying keywords.
///
/// One trailing `;` is allowed; any other semicolon means a second
/// statement and is rejected, even inside a string literal.
pub fn is_safe_query(sql: &str) -> bool {
    let trimmed = sql.trim();
    let body = trimmed.strip_suffix(';').unwrap_or(trimmed);
    !body.contains(';') && !UNSAFE_KEYWORD.is_match(body)
}

fn pool_options(url: &str) -> SqlitePoolOptions {
    if url.contains(":memory:") {
        // Every connection to an in-memory database is a separate database.
        SqlitePoolOptions::new()
            .max_connections(1)
            .idle_timeout(None)
            .max_lifetime(None)
    } else {
        SqlitePoolOptions::new().max_connections(5)
    }
}

fn quote_identifier(name: &str) -> Result<String, SqlClientError> {
    if IDENTIFIER.is_match(name) {
        Ok(format!("\"{}\"", name))
    } else {
        Err(SqlClientError::InvalidIdentifier(name.to_string()))
    }
}

fn decode_cell(row: &SqliteRow, index: usize) -> Result<Value, sqlx::Error> {
    let raw = row.try_get_raw(index)?;
    if raw.is_null() {
        return Ok(Value::Null);
    }
    let type_name = raw.type_info().name().to_uppercase();
    Ok(match type_name.as_str() {
        "INTEGER" | "INT" | "INT8" | "BIGINT" => json!(row.try_get_unchecked::<i64, _>(index)?),
        "REAL" | "FLOAT" | "DOUBLE" | "NUMERIC" => json!(row.try_get_unchecked::<f64, _>(index)?),
        "BOOLEAN" => json!(row.try_get_unchecked::<bool, _>(index)?),
        "BLOB" => {
            let bytes: Vec<u8> = row.try_get_unchecked(index)?;
            json!(format!("<{} bytes>", bytes.len()))
        }
        _ => json!(row.try_get_unchecked::<String, _>(index)?),
    })
}

/// Read-only access to a relational project database.
#[derive(Clone)]
pub struct SqlDatabaseClient {
    pool: SqlitePool,
    tables: Arc<RwLock<Option<Vec<String>>>>,
}

impl SqlDatabaseClient {
    pub async fn connect(url: &str) -> Result<Self, SqlClientError> {
        let pool = pool_options(url).connect(url).await?;
        Ok(Self::from_pool(pool))
    }

    /// Connect with SQLite itself refusing writes, so a statement that gets
    /// past the keyword check still cannot modify the database.
    pub async fn connect_read_only(url: &str) -> Result<Self, SqlClientError> {
        let options = SqliteConnectOptions::from_str(url)?.read_only(true);
        let pool = pool_options(url).connect_with(options).await?;
        debug!("Opened read-only SQL data source");
        Ok(Self::from_pool(pool))
    }

    pub fn from_pool(pool: SqlitePool) -> Self {
        Self {
            pool,
            tables: Arc::new(RwLock::new(None)),
        }
    }

    /// User tables, cached after the first successful lookup.
    pub async fn get_tables(&self) -> Result<Vec<String>, SqlClientError> {
        if let Some(tables) = self.tables.read().as_ref() {
            return Ok(tables.clone());
        }

        let tables: Vec<String> = sqlx::query_scalar(
            "SELECT name FROM sqlite_master \
             WHERE type = 'table' AND name NOT LIKE 'sqlite_%' AND name != '_sqlx_migrations' \
             ORDER BY name",
        )
        .fetch_all(&self.pool)
        .await?;

        debug!(count = tables.len(), "Loaded table list");
        *self.tables.write() = Some(tables.clone());
        Ok(tables)
    }

    pub fn reset_table_cache(&self) {
        *self.tables.write() = None;
    }

    async fn checked_table(&self, table: &str) -> Result<String, SqlClientError> {
        let quoted = quote_identifier(table)?;
        if !self.get_tables().await?.iter().any(|t| t == table) {
            return Err(SqlClientError::TableNotFound(table.to_string()));
        }
        Ok(quoted)
    }

    pub async fn get_table_schema(&self, table: &str) -> Result<TableSchema, SqlClientError> {
        let quoted = self.checked_table(table).await?;

        let column_rows = sqlx::query(&format!("PRAGMA table_info({})", quoted))
            .fetch_all(&self.pool)
            .await?;
        let mut columns = Vec::with_capacity(column_rows.len());
        let mut pk_order = Vec::new();
        for row in &column_rows {
            let name: String = row.try_get("name")?;
            let pk: i64 = row.try_get("pk")?;
            if pk > 0 {
                pk_order.push((pk, name.clone()));
            }
            columns.push(ColumnInfo {
                name,
                data_type: row.try_get("type")?,
                nullable: row.try_get::<i64, _>("notnull")? == 0,
                default: row.try_get("dflt_value")?,
                primary_key: pk > 0,
            });
        }
        pk_order.sort();

        let fk_rows = sqlx::query(&format!("PRAGMA foreign_key_list({})", quoted))
            .fetch_all(&self.pool)
            .await?;
        let mut foreign_keys: Vec<(i64, ForeignKey)> = Vec::new();
        for row in &fk_rows {
            let id: i64 = row.try_get("id")?;
            let from: String = row.try_get("from")?;
            let to: Option<String> = row.try_get("to")?;
            let referenced_table: String = row.try_get("table")?;
            match foreign_keys.iter_mut().find(|(fk_id, _)| *fk_id == id) {
                Some((_, fk)) => {
                    fk.columns.push(from);
                    fk.referenced_columns.extend(to);
                }
                None => foreign_keys.push((
                    id,
                    ForeignKey {
                        columns: vec![from],
                        referenced_table,
                        referenced_columns: to.into_iter().collect(),
                    },
                )),
            }
        }

        Ok(TableSchema {
            table_name: table.to_string(),
            columns,
            primary_keys: pk_order.into_iter().map(|(_, name)| name).collect(),
            foreign_keys: foreign_keys.into_iter().map(|(_, fk)| fk).collect(),
        })
    }

    /// Run `sql`. In safe mode anything but a single statement without
    /// data-modifying keywords is rejected before reaching the database.
    pub async fn execute_query(&self, sql: &str, safe_mode: bool) -> Result<QueryResult, SqlClientError> {
        if safe_mode && !is_safe_query(sql) {
            warn!(query = %sql, "Blocked unsafe query");
            return Err(SqlClientError::UnsafeQuery);
        }

        let rows = sqlx::query(sql).fetch_all(&self.pool).await?;
        let columns = rows
            .first()
            .map(|row| row.columns().iter().map(|c| c.name().to_string()).collect())
            .unwrap_or_default();

        let rows = rows
            .iter()
            .map(|row| {
                (0..row.len())
                    .map(|i| decode_cell(row, i))
                    .collect::<Result<Vec<_>, _>>()
            })
            .collect::<Result<Vec<_>, _>>()?;

        debug!(rows = rows.len(), "Executed query");
        Ok(QueryResult { columns, rows })
    }

    /// Schemas of every table plus their relationships. Tables whose
    /// schema cannot be read are skipped.
    pub async fn get_database_info(&self) -> Result<DatabaseInfo, SqlClientError> {
        let mut info = DatabaseInfo::default();
        for table in self.get_tables().await? {
            let schema = match self.get_table_schema(&table).await {
                Ok(schema) => schema,
                Err(e) => {
                    warn!(table = %table, error = %e, "Skipping table schema");
                    continue;
                }
            };
            for fk in &schema.foreign_keys {
                info.relationships.push(Relationship {
                    from_table: table.clone(),
                    from_columns: fk.columns.clone(),
                    to_table: fk.referenced_table.clone(),
                    to_columns: fk.referenced_columns.clone(),
                });
            }
            info.tables.push(schema);
        }
        Ok(info)
    }

    pub async fn get_sample_data(&self, table: &str, limit: usize) -> Result<QueryResult, SqlClientError> {
        let quoted = self.checked_table(table).await?;
        self.execute_query(&format!("SELECT * FROM {} LIMIT {}", quoted, limit), true)
            .await
    }

    /// Row count, per-column distinct and null counts, and a sample.
    pub async fn analyze_table(&self, table: &str) -> Result<TableAnalysis, SqlClientError> {
        let quoted = self.checked_table(table).await?;
        let schema = self.get_table_schema(table).await?;

        let row_count: i64 = sqlx::query_scalar(&format!("SELECT COUNT(*) FROM {}", quoted))
            .fetch_one(&self.pool)
            .await?;

        let mut columns = Vec::with_capacity(schema.columns.len());
        for column in &schema.columns {
            let col = quote_identifier(&column.name)?;
            let row = sqlx::query(&format!(
                "SELECT COUNT(DISTINCT {col}) AS distinct_count, \
                 SUM(CASE WHEN {col} IS NULL THEN 1 ELSE 0 END) AS null_count FROM {quoted}"
            ))
            .fetch_one(&self.pool)
            .await?;
            columns.push(ColumnStats {
                name: column.name.clone(),
                distinct_count: row.try_get("distinct_count")?,
                null_count: row.try_get::<Option<i64>, _>("null_count")?.unwrap_or(0),
            });
        }

        let sample_data = self.get_sample_data(table, DEFAULT_SAMPLE_LIMIT).await?.records();

        Ok(TableAnalysis {
            table_name: table.to_string(),
            row_count,
            schema,
            columns,
            sample_data,
        })
    }
}
