//! Connection integration tests.
//!
//! Tests database connectivity and error handling.

use super::common::test_database;
use pgprobe::db::{DatabaseClient, PostgresClient};
use pgprobe::error::ProbeError;
use pgprobe::target::ConnectionTarget;

/// Helper to create a test client.
async fn get_test_client() -> Option<PostgresClient> {
    let db = test_database()?;
    PostgresClient::connect(&db.target, &db.user, &db.password)
        .await
        .ok()
}

#[tokio::test]
async fn test_connect_with_valid_credentials() {
    let Some(mut client) = get_test_client().await else {
        eprintln!("Skipping test: DATABASE_URL not set");
        return;
    };

    // Connection succeeded if we got here
    client.close().await.unwrap();
}

#[tokio::test]
async fn test_connect_with_wrong_password() {
    let Some(db) = test_database() else {
        eprintln!("Skipping test: DATABASE_URL not set");
        return;
    };

    let result =
        PostgresClient::connect(&db.target, &db.user, "definitely-not-the-password").await;

    // Servers configured for trust authentication accept any password.
    if let Err(error) = result {
        assert!(matches!(error, ProbeError::Connection(_)));
    }
}

#[tokio::test]
async fn test_connect_to_unknown_database() {
    let Some(db) = test_database() else {
        eprintln!("Skipping test: DATABASE_URL not set");
        return;
    };

    let url = format!(
        "postgres://{}/pgprobe_no_such_database_xyz",
        db.target.socket_string()
    );
    let target = ConnectionTarget::parse(&url).unwrap();

    let error = PostgresClient::connect(&target, &db.user, &db.password)
        .await
        .unwrap_err();
    assert!(
        error.to_string().contains("pgprobe_no_such_database_xyz"),
        "unexpected error: {error}"
    );
}

#[tokio::test(flavor = "current_thread")]
async fn test_connect_with_invalid_port() {
    let listener = std::net::TcpListener::bind("127.0.0.1:0").unwrap();
    let port = listener.local_addr().unwrap().port();
    drop(listener);

    let target = ConnectionTarget::parse(&format!("postgres://127.0.0.1:{port}/testdb")).unwrap();
    let result = PostgresClient::connect(&target, "testuser", "testpass").await;

    let error = result.unwrap_err();
    assert!(matches!(error, ProbeError::Connection(_)));
    assert!(
        error.to_string().contains(&port.to_string()),
        "Expected port in error, got: {error}"
    );
}

#[tokio::test]
async fn test_typed_values_render_as_text() {
    let Some(mut client) = get_test_client().await else {
        eprintln!("Skipping test: DATABASE_URL not set");
        return;
    };

    let result = client
        .execute_query(
            "SELECT true AS flag, 2.50::numeric AS price, '\\x0102'::bytea AS raw, \
             DATE '2026-10-15' AS day, ARRAY[1,2] AS list",
        )
        .await
        .unwrap();

    let labels: Vec<&str> = result.columns.iter().map(|c| c.name.as_str()).collect();
    assert_eq!(labels, vec!["flag", "price", "raw", "day", "list"]);
    assert_eq!(
        result.rows[0],
        vec![
            Some("t".to_string()),
            Some("2.50".to_string()),
            Some("\\x0102".to_string()),
            Some("2026-10-15".to_string()),
            Some("{1,2}".to_string()),
        ]
    );

    client.close().await.unwrap();
}

#[tokio::test]
async fn test_multiple_rows_with_nulls() {
    let Some(mut client) = get_test_client().await else {
        eprintln!("Skipping test: DATABASE_URL not set");
        return;
    };

    let result = client
        .execute_query("SELECT * FROM (VALUES (1, 'a'), (2, NULL)) AS t(id, label) ORDER BY id")
        .await
        .unwrap();

    assert_eq!(result.row_count(), 2);
    assert_eq!(result.rows[1], vec![Some("2".to_string()), None]);

    client.close().await.unwrap();
}

#[tokio::test]
async fn test_script_with_two_result_sets_is_rejected() {
    let Some(mut client) = get_test_client().await else {
        eprintln!("Skipping test: DATABASE_URL not set");
        return;
    };

    let error = client
        .execute_query("SELECT 1 AS a; SELECT 2 AS b, 3 AS c")
        .await
        .unwrap_err();
    assert!(matches!(error, ProbeError::Query(_)));
    assert!(
        error.to_string().contains("Multiple result sets"),
        "unexpected error: {error}"
    );

    // The connection is still usable after the rejected script.
    let result = client.execute_query("SELECT 4 AS d").await.unwrap();
    assert_eq!(result.rows, vec![vec![Some("4".to_string())]]);

    client.close().await.unwrap();
}
