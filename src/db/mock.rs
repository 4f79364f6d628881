//! Mock database client for testing.
//!
//! Results are scripted per SQL text, and every interaction is recorded in a
//! shared [`MockLog`] that tests can inspect after the client has been
//! handed off and closed.

use super::{ColumnInfo, Connector, DatabaseClient, DriverInfo, QueryResult};
use crate::config::ProbeSettings;
use crate::error::{ProbeError, Result};
use crate::target::ConnectionTarget;
use async_trait::async_trait;
use std::collections::HashMap;
use std::sync::{Arc, Mutex, MutexGuard};
use std::time::Duration;

/// Record of what the code under test did with the mock.
#[derive(Debug, Default)]
pub struct MockLog {
    pub connect_attempts: usize,
    pub executed: Vec<String>,
    pub close_calls: usize,
}

/// A mock database client that returns predefined results.
#[derive(Debug, Clone, Default)]
pub struct MockDatabaseClient {
    results: HashMap<String, std::result::Result<QueryResult, String>>,
    close_error: Option<String>,
    log: Arc<Mutex<MockLog>>,
}

impl MockDatabaseClient {
    /// Creates a new mock database client with no scripted queries.
    pub fn new() -> Self {
        Self::default()
    }

    /// Scripts the result for a query.
    pub fn with_result(mut self, sql: impl Into<String>, result: QueryResult) -> Self {
        self.results.insert(sql.into(), Ok(result));
        self
    }

    /// Scripts a failure for a query.
    pub fn with_query_error(mut self, sql: impl Into<String>, message: impl Into<String>) -> Self {
        self.results.insert(sql.into(), Err(message.into()));
        self
    }

    /// Makes `close` fail with the given message.
    pub fn with_close_error(mut self, message: impl Into<String>) -> Self {
        self.close_error = Some(message.into());
        self
    }

    /// Returns the shared interaction log.
    pub fn log(&self) -> Arc<Mutex<MockLog>> {
        Arc::clone(&self.log)
    }

    fn lock(&self) -> MutexGuard<'_, MockLog> {
        // A test that panicked while holding the lock already failed.
        self.log.lock().unwrap_or_else(|poisoned| poisoned.into_inner())
    }
}

#[async_trait]
impl DatabaseClient for MockDatabaseClient {
    async fn execute_query(&mut self, sql: &str) -> Result<QueryResult> {
        self.lock().executed.push(sql.to_string());

        match self.results.get(sql) {
            Some(Ok(result)) => Ok(result.clone()),
            Some(Err(message)) => Err(ProbeError::query(message.clone())),
            None => Ok(QueryResult::with_data(
                vec![ColumnInfo::new("result", "TEXT")],
                vec![vec![Some(format!("Mock result for: {sql}"))]],
            )
            .with_execution_time(Duration::from_millis(1))),
        }
    }

    async fn driver_info(&mut self) -> Result<DriverInfo> {
        Ok(DriverInfo {
            product_name: "PostgreSQL".to_string(),
            product_version: "16.0 (mock)".to_string(),
            driver_name: "mock".to_string(),
            driver_version: "0.0".to_string(),
        })
    }

    async fn close(&mut self) -> Result<()> {
        self.lock().close_calls += 1;
        match &self.close_error {
            Some(message) => Err(ProbeError::connection(message.clone())),
            None => Ok(()),
        }
    }
}

/// Connector handing out clones of a [`MockDatabaseClient`], or failing.
#[derive(Debug, Clone)]
pub struct MockConnector {
    client: MockDatabaseClient,
    connect_error: Option<String>,
}

impl MockConnector {
    pub fn new(client: MockDatabaseClient) -> Self {
        Self {
            client,
            connect_error: None,
        }
    }

    /// A connector whose every connect attempt fails.
    pub fn failing(message: impl Into<String>) -> Self {
        Self {
            client: MockDatabaseClient::new(),
            connect_error: Some(message.into()),
        }
    }

    /// Returns the interaction log shared with handed-out clients.
    pub fn log(&self) -> Arc<Mutex<MockLog>> {
        self.client.log()
    }
}

#[async_trait]
impl Connector for MockConnector {
    async fn connect(
        &self,
        _target: &ConnectionTarget,
        _settings: &ProbeSettings,
    ) -> Result<Box<dyn DatabaseClient>> {
        self.client.lock().connect_attempts += 1;
        match &self.connect_error {
            Some(message) => Err(ProbeError::connection(message.clone())),
            None => Ok(Box::new(self.client.clone())),
        }
    }
}
