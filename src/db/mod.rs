//! Database abstraction layer for pgprobe.
//!
//! The orchestrator talks to the database through [`Connector`] and
//! [`DatabaseClient`] so the whole run can be exercised against the mocks.

mod mock;
mod postgres;
mod types;

pub use mock::{MockConnector, MockDatabaseClient, MockLog};
pub use postgres::{PostgresClient, PostgresConnector, DRIVER_NAME, DRIVER_VERSION};
pub use types::{Cell, ColumnInfo, DriverInfo, QueryResult, Row};

use crate::config::ProbeSettings;
use crate::error::Result;
use crate::target::ConnectionTarget;
use async_trait::async_trait;

/// Opens database connections.
#[async_trait]
pub trait Connector: Send + Sync {
    /// Opens a single connection to the target with the configured credentials.
    async fn connect(
        &self,
        target: &ConnectionTarget,
        settings: &ProbeSettings,
    ) -> Result<Box<dyn DatabaseClient>>;
}

/// Trait defining the interface for an open database connection.
///
/// All operations are async and return Results with ProbeError.
#[async_trait]
pub trait DatabaseClient: Send {
    /// Executes a SQL query and returns the materialized results.
    async fn execute_query(&mut self, sql: &str) -> Result<QueryResult>;

    /// Reports server product and driver metadata.
    async fn driver_info(&mut self) -> Result<DriverInfo>;

    /// Closes the database connection. Closing twice is a no-op.
    async fn close(&mut self) -> Result<()>;
}
