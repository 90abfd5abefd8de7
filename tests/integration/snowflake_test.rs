//! Live Snowflake tests.
//!
//! These tests log in with the credential file named by SNOWFLAKE_CREDENTIALS
//! and are skipped when it is not set.

use std::path::PathBuf;

use snow_sheets::login::LoginRetrier;
use snow_sheets::warehouse::{SnowflakeConnector, Value, WarehouseCredentials};

/// Helper to get the credential file from the environment.
fn get_test_credentials() -> Option<WarehouseCredentials> {
    let path = PathBuf::from(std::env::var("SNOWFLAKE_CREDENTIALS").ok()?);
    WarehouseCredentials::load_from_file(&path).ok()
}

#[tokio::test]
async fn test_login_and_select() {
    let Some(credentials) = get_test_credentials() else {
        eprintln!("Skipping test: SNOWFLAKE_CREDENTIALS not set");
        return;
    };

    let connector = SnowflakeConnector;
    let outcome = LoginRetrier::new(&connector, &credentials).login().await;
    assert!(outcome.is_connected());
    assert_eq!(outcome.attempts, 1);
    let session = outcome.session.unwrap();

    let result = session
        .execute_query("SELECT 1 AS num, 'hello' AS greeting, 12.50::NUMBER(10,2) AS amount")
        .await
        .unwrap();

    assert_eq!(result.column_names(), vec!["NUM", "GREETING", "AMOUNT"]);
    assert_eq!(result.row_count(), 1);
    assert_eq!(result.rows[0][0], Value::Int(1));
    assert_eq!(result.rows[0][1], Value::from("hello"));

    session.close().await.unwrap();
}

#[tokio::test]
async fn test_bad_password_fails_once() {
    let Some(mut credentials) = get_test_credentials() else {
        eprintln!("Skipping test: SNOWFLAKE_CREDENTIALS not set");
        return;
    };
    credentials.password = "definitely-wrong".to_string();

    let connector = SnowflakeConnector;
    let outcome = LoginRetrier::new(&connector, &credentials).login().await;
    assert!(!outcome.is_connected());
    assert_eq!(outcome.attempts, 1);
}
