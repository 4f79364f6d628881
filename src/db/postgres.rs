//! PostgreSQL database client implementation.
//!
//! Provides the `PostgresClient` struct that implements the `DatabaseClient` trait
//! over a single sqlx connection. Queries run through the simple query
//! protocol, so the server returns every value in its text form and cells
//! are rendered exactly as PostgreSQL prints them.

use crate::config::ProbeSettings;
use crate::db::{Cell, ColumnInfo, Connector, DatabaseClient, DriverInfo, QueryResult, Row};
use crate::error::{ProbeError, Result};
use crate::target::ConnectionTarget;
use async_trait::async_trait;
use futures::TryStreamExt;
use sqlx::postgres::{PgConnectOptions, PgConnection, PgRow, PgValueFormat};
use sqlx::{Column as SqlxColumn, ConnectOptions, Connection, Either, Executor, Row as SqlxRow};
use sqlx::{Statement, TypeInfo, ValueRef};
use std::fmt::Write as _;
use std::str::FromStr;
use std::time::Instant;
use tracing::debug;

/// Driver name reported in the metadata lines.
pub const DRIVER_NAME: &str = "sqlx-postgres";

/// Driver version reported in the metadata lines (tracks the sqlx requirement).
pub const DRIVER_VERSION: &str = "0.8";

/// Opens [`PostgresClient`] connections.
#[derive(Debug, Clone, Copy, Default)]
pub struct PostgresConnector;

#[async_trait]
impl Connector for PostgresConnector {
    async fn connect(
        &self,
        target: &ConnectionTarget,
        settings: &ProbeSettings,
    ) -> Result<Box<dyn DatabaseClient>> {
        let client = PostgresClient::connect(target, &settings.user, &settings.password).await?;
        Ok(Box::new(client))
    }
}

/// PostgreSQL database client holding one connection.
#[derive(Debug)]
pub struct PostgresClient {
    conn: Option<PgConnection>,
}

impl PostgresClient {
    /// Opens a connection to the target. Credentials override any in the URL.
    pub async fn connect(target: &ConnectionTarget, user: &str, password: &str) -> Result<Self> {
        let options = PgConnectOptions::from_str(&target.driver_url)
            .map_err(|e| ProbeError::connection(format!("Invalid connection URL: {e}")))?
            .username(user)
            .password(password);

        debug!("Connecting to {} as {}", target.socket_string(), user);
        let conn = options
            .connect()
            .await
            .map_err(|e| map_connection_error(e, target, user))?;
        debug!("Successfully connected to database");

        Ok(Self { conn: Some(conn) })
    }

    fn conn(&mut self) -> Result<&mut PgConnection> {
        self.conn
            .as_mut()
            .ok_or_else(|| ProbeError::connection("Connection is already closed"))
    }
}

#[async_trait]
impl DatabaseClient for PostgresClient {
    async fn execute_query(&mut self, sql: &str) -> Result<QueryResult> {
        let conn = self.conn()?;
        let start = Instant::now();

        let rows = fetch_single_result_set(conn, sql).await?;

        let execution_time = start.elapsed();
        debug!("Query returned {} rows in {:?}", rows.len(), execution_time);

        let columns = match rows.first() {
            Some(first_row) => column_info(first_row.columns()),
            // No rows to read labels from; ask the server to describe the statement.
            None => describe_columns(conn, sql).await,
        };

        let rows: Vec<Row> = rows.iter().map(convert_row).collect();

        Ok(QueryResult::with_data(columns, rows).with_execution_time(execution_time))
    }

    async fn driver_info(&mut self) -> Result<DriverInfo> {
        let conn = self.conn()?;
        let row = (&mut *conn)
            .fetch_one(sqlx::raw_sql("SHOW server_version"))
            .await
            .map_err(|e| ProbeError::query(format_query_error(e)))?;

        Ok(DriverInfo {
            product_name: "PostgreSQL".to_string(),
            product_version: render_cell(&row, 0).unwrap_or_else(|| "unknown".to_string()),
            driver_name: DRIVER_NAME.to_string(),
            driver_version: DRIVER_VERSION.to_string(),
        })
    }

    async fn close(&mut self) -> Result<()> {
        if let Some(conn) = self.conn.take() {
            conn.close()
                .await
                .map_err(|e| ProbeError::connection(e.to_string()))?;
            debug!("Connection closed");
        }
        Ok(())
    }
}

/// Runs `sql` and returns the rows of the one statement that produced rows.
///
/// A `;`-separated script whose statements return rows more than once is
/// rejected, since the rows could not be printed under one set of labels.
async fn fetch_single_result_set(conn: &mut PgConnection, sql: &str) -> Result<Vec<PgRow>> {
    let mut stream = (&mut *conn).fetch_many(sqlx::raw_sql(sql));
    let mut rows = Vec::new();
    let mut result_sets = 0;
    let mut in_result_set = false;

    while let Some(item) = stream
        .try_next()
        .await
        .map_err(|e| ProbeError::query(format_query_error(e)))?
    {
        match item {
            Either::Left(_) => in_result_set = false,
            Either::Right(row) => {
                if !in_result_set {
                    in_result_set = true;
                    result_sets += 1;
                }
                rows.push(row);
            }
        }
    }

    if result_sets > 1 {
        return Err(ProbeError::query(format!(
            "Multiple result sets were returned by the query ({result_sets}). \
             Put one row-returning statement in sql.query."
        )));
    }
    Ok(rows)
}

fn column_info(columns: &[sqlx::postgres::PgColumn]) -> Vec<ColumnInfo> {
    columns
        .iter()
        .map(|col| ColumnInfo::new(col.name(), col.type_info().name()))
        .collect()
}

/// Best-effort column labels for a statement that returned no rows.
async fn describe_columns(conn: &mut PgConnection, sql: &str) -> Vec<ColumnInfo> {
    match Executor::prepare(&mut *conn, sql).await {
        Ok(statement) => column_info(statement.columns()),
        Err(e) => {
            debug!("Cannot describe statement: {}", e);
            Vec::new()
        }
    }
}

/// Converts a sqlx PgRow to our Row type.
fn convert_row(row: &PgRow) -> Row {
    (0..row.len()).map(|i| render_cell(row, i)).collect()
}

/// Renders one value as text. Binary values (not expected from the simple
/// protocol) fall back to PostgreSQL's `\x` hex notation.
fn render_cell(row: &PgRow, index: usize) -> Cell {
    let value = row.try_get_raw(index).ok()?;
    if value.is_null() {
        return None;
    }
    match value.format() {
        PgValueFormat::Text => value.as_str().ok().map(String::from),
        PgValueFormat::Binary => value.as_bytes().ok().map(hex_bytes),
    }
}

fn hex_bytes(bytes: &[u8]) -> String {
    let mut out = String::with_capacity(2 + bytes.len() * 2);
    out.push_str("\\x");
    for b in bytes {
        let _ = write!(out, "{b:02x}");
    }
    out
}

/// Maps sqlx connection errors to operator-friendly messages.
fn map_connection_error(error: sqlx::Error, target: &ConnectionTarget, user: &str) -> ProbeError {
    let host = &target.host;
    let port = target.port;
    let database = if target.database.is_empty() {
        user
    } else {
        target.database.as_str()
    };

    let error_str = error.to_string().to_lowercase();

    if error_str.contains("connection refused") || error_str.contains("could not connect") {
        ProbeError::connection(format!(
            "Cannot connect to {host}:{port}. Check that PostgreSQL is listening there."
        ))
    } else if error_str.contains("password authentication failed")
        || error_str.contains("authentication failed")
    {
        ProbeError::connection(format!(
            "Authentication failed for user '{user}'. Check db.user and db.password."
        ))
    } else if error_str.contains("does not exist") && error_str.contains("database") {
        ProbeError::connection(format!("Database '{database}' does not exist."))
    } else if error_str.contains("ssl") || error_str.contains("tls") {
        ProbeError::connection(
            "Server requires SSL. Add '?sslmode=require' to db.url.".to_string(),
        )
    } else if error_str.contains("timed out") || error_str.contains("timeout") {
        ProbeError::connection(format!(
            "Connection to {host}:{port} timed out during the PostgreSQL handshake. \
             A listener that is not PostgreSQL still passes the port probe."
        ))
    } else {
        ProbeError::connection(error.to_string())
    }
}

/// Formats a query error on one line, with DETAIL and HINT when present.
fn format_query_error(error: sqlx::Error) -> String {
    let Some(db_error) = error.as_database_error() else {
        return error.to_string();
    };

    let mut result = format!("ERROR: {}", db_error.message());

    if let Some(pg_error) = db_error.try_downcast_ref::<sqlx::postgres::PgDatabaseError>() {
        if let Some(detail) = pg_error.detail() {
            result.push_str(" DETAIL: ");
            result.push_str(detail);
        }
        if let Some(hint) = pg_error.hint() {
            result.push_str(" HINT: ");
            result.push_str(hint);
        }
    }

    result
}
