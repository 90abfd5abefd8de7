//! Integration tests for snow-sheets.

pub mod config_test;
pub mod pipeline_test;
pub mod snowflake_test;
