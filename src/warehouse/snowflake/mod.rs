//! Snowflake warehouse client.
//!
//! Speaks the same REST endpoints as the official drivers: a login request
//! that yields a session token, query requests that return a JSON rowset, and
//! pre-signed chunk URLs for results too large to inline.

mod auth;
mod client;
mod decode;
mod query;

use crate::error::Result;
use crate::warehouse::{Connector, QueryResult, WarehouseClient, WarehouseCredentials};
use async_trait::async_trait;
use auth::Session;
use client::SnowflakeClient;
use query::Query;
use std::sync::atomic::{AtomicU64, Ordering};
use std::time::Instant;
use tracing::{debug, info};

/// An open Snowflake session.
pub struct SnowflakeWarehouse {
    client: SnowflakeClient,
    session: Session,
    user: String,
    sequence: AtomicU64,
}

impl SnowflakeWarehouse {
    /// Logs in with the given credentials and optional MFA passcode.
    pub async fn login(
        credentials: &WarehouseCredentials,
        passcode: Option<&str>,
    ) -> Result<Self> {
        let client = SnowflakeClient::for_account(&credentials.account)?;
        let session = auth::login(&client, credentials, passcode).await?;
        info!("Logged in to Snowflake as {}", credentials.user);

        Ok(Self {
            client,
            session,
            user: credentials.user.clone(),
            sequence: AtomicU64::new(0),
        })
    }
}

#[async_trait]
impl WarehouseClient for SnowflakeWarehouse {
    fn user(&self) -> &str {
        &self.user
    }

    async fn execute_query(&self, sql: &str) -> Result<QueryResult> {
        let start = Instant::now();
        let sequence_id = self.sequence.fetch_add(1, Ordering::Relaxed) + 1;

        let fetched = Query { sql, sequence_id }
            .run(&self.client, &self.session)
            .await?;

        let elapsed = start.elapsed();
        debug!("Statement {} returned {} rows in {:?}", sequence_id, fetched.rows.len(), elapsed);

        Ok(QueryResult::with_data(fetched.columns, fetched.rows).with_execution_time(elapsed))
    }

    async fn close(&self) -> Result<()> {
        self.session.close(&self.client).await
    }
}

/// Connector that opens [`SnowflakeWarehouse`] sessions.
#[derive(Debug, Default, Clone, Copy)]
pub struct SnowflakeConnector;

#[async_trait]
impl Connector for SnowflakeConnector {
    async fn connect(
        &self,
        credentials: &WarehouseCredentials,
        passcode: Option<&str>,
    ) -> Result<Box<dyn WarehouseClient>> {
        let warehouse = SnowflakeWarehouse::login(credentials, passcode).await?;
        Ok(Box::new(warehouse))
    }
}
