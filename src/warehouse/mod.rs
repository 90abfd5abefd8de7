//! Warehouse abstraction layer for snow-sheets.
//!
//! Provides a trait-based interface for the SQL warehouse so the pipeline can
//! run against Snowflake in production and an in-memory double in tests.

mod credentials;
mod mock;
pub mod snowflake;
mod types;

pub use credentials::WarehouseCredentials;
pub use mock::{MockConnector, MockWarehouseClient};
pub use snowflake::{SnowflakeConnector, SnowflakeWarehouse};
pub use types::{ColumnInfo, QueryResult, Row, Value};

use crate::error::Result;
use async_trait::async_trait;

/// An authenticated warehouse session.
///
/// One session is opened per run and passed by reference to every query.
#[async_trait]
pub trait WarehouseClient: Send + Sync {
    /// Login name the session was opened for.
    fn user(&self) -> &str;

    /// Executes a SQL statement and materializes the full result set.
    async fn execute_query(&self, sql: &str) -> Result<QueryResult>;

    /// Closes the session.
    async fn close(&self) -> Result<()>;
}

/// Opens warehouse sessions.
///
/// Kept separate from [`WarehouseClient`] so login retries can be driven
/// against a scripted connector.
#[async_trait]
pub trait Connector: Send + Sync {
    /// Attempts a single login, with an MFA passcode when one was collected.
    async fn connect(
        &self,
        credentials: &WarehouseCredentials,
        passcode: Option<&str>,
    ) -> Result<Box<dyn WarehouseClient>>;
}
