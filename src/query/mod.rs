//! SQL file execution for snow-sheets.
//!
//! Separates statement preparation (placeholders and trailing conditions)
//! from execution on the warehouse session.

pub mod runner;
pub mod template;

pub use runner::QueryRunner;
pub use template::{apply_condition, build_statement, SqlTemplate};
