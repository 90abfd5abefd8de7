//! snow-sheets - loads Snowflake query results into Google Sheets.
//!
//! This library exposes the core modules for use in integration tests.

pub mod cli;
pub mod config;
pub mod error;
pub mod logging;
pub mod login;
pub mod normalize;
pub mod notify;
pub mod pipeline;
pub mod query;
pub mod sheets;
pub mod warehouse;
