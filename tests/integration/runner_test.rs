//! End-to-end probe runs.
//!
//! These drive `Runner` with the real network prober. The database side is
//! mocked unless DATABASE_URL is set.

use super::common::{properties_file, test_database};
use pgprobe::db::{MockConnector, MockDatabaseClient, PostgresConnector};
use pgprobe::error::ProbeError;
use pgprobe::network::NetworkProber;
use pgprobe::runner::{Runner, BANNER, SUCCESS_MESSAGE};
use pretty_assertions::assert_eq;
use std::time::Duration;

fn fast_prober() -> NetworkProber {
    NetworkProber::new().with_timeout(Duration::from_millis(500))
}

#[tokio::test]
async fn test_closed_port_aborts_before_connecting() {
    let listener = std::net::TcpListener::bind("127.0.0.1:0").unwrap();
    let port = listener.local_addr().unwrap().port();
    drop(listener);

    let connector = MockConnector::new(MockDatabaseClient::new());
    let log = connector.log();
    let runner = Runner::new(fast_prober(), connector);
    let config = properties_file(
        &format!("jdbc:postgresql://127.0.0.1:{port}/test"),
        "postgres",
        "secret",
        "",
    );

    let mut out = Vec::new();
    let mut err = Vec::new();
    let outcome = runner.run(config.path(), &mut out, &mut err).await;

    assert!(matches!(outcome, Err(ProbeError::Network(_))));
    assert_eq!(
        String::from_utf8(err).unwrap(),
        format!("Error: Port {port} on host 127.0.0.1 is not open.\n")
    );
    assert_eq!(log.lock().unwrap().connect_attempts, 0);
}

#[tokio::test]
async fn test_open_port_reaches_the_database_stage() {
    let listener = tokio::net::TcpListener::bind("127.0.0.1:0").await.unwrap();
    let port = listener.local_addr().unwrap().port();

    let connector = MockConnector::new(MockDatabaseClient::new());
    let log = connector.log();
    let runner = Runner::new(fast_prober(), connector);
    let config = properties_file(
        &format!("jdbc:postgresql://127.0.0.1:{port}/test"),
        "postgres",
        "secret",
        "probe.report_metadata=false\n",
    );

    let mut out = Vec::new();
    let mut err = Vec::new();
    let outcome = runner.run(config.path(), &mut out, &mut err).await;

    assert!(outcome.is_ok(), "unexpected failure: {outcome:?}");
    assert!(err.is_empty());
    assert!(String::from_utf8(out).unwrap().ends_with(&format!("{BANNER}\n{SUCCESS_MESSAGE}\n")));
    assert_eq!(log.lock().unwrap().close_calls, 1);
}

#[tokio::test]
async fn test_unresolvable_host() {
    let connector = MockConnector::new(MockDatabaseClient::new());
    let log = connector.log();
    let runner = Runner::new(fast_prober(), connector);
    let config = properties_file(
        "jdbc:postgresql://badhost.invalid:5432/test",
        "postgres",
        "secret",
        "",
    );

    let mut out = Vec::new();
    let mut err = Vec::new();
    let outcome = runner.run(config.path(), &mut out, &mut err).await;

    assert!(matches!(outcome, Err(ProbeError::Network(_))));
    let out = String::from_utf8(out).unwrap();
    assert!(out.ends_with("Host: badhost.invalid\nPort: 5432\n"));
    assert_eq!(
        String::from_utf8(err).unwrap(),
        "Error: Host badhost.invalid is not reachable.\n"
    );
    assert_eq!(log.lock().unwrap().connect_attempts, 0);
}

#[tokio::test]
async fn test_live_select_one() {
    let Some(db) = test_database() else {
        eprintln!("Skipping test: DATABASE_URL not set");
        return;
    };

    let runner = Runner::new(NetworkProber::new(), PostgresConnector);
    let config = properties_file(
        &db.url,
        &db.user,
        &db.password,
        "sql.query2=SELECT now()\nprobe.check_reachability=false\n",
    );

    let mut out = Vec::new();
    let mut err = Vec::new();
    let outcome = runner.run(config.path(), &mut out, &mut err).await;

    assert!(outcome.is_ok(), "probe failed: {}", String::from_utf8_lossy(&err));
    let out = String::from_utf8(out).unwrap();
    let port_line = format!("Port: {}\n", db.target.port);
    let after_port = out.split_once(&port_line).map(|(_, rest)| rest).unwrap();
    assert!(after_port.starts_with("1 \nDatabase timestamp: "));
    assert!(out.contains("Database: PostgreSQL "));
    assert!(out.ends_with(&format!("{SUCCESS_MESSAGE}\n")));
}

#[tokio::test]
async fn test_live_query_error_reported() {
    let Some(db) = test_database() else {
        eprintln!("Skipping test: DATABASE_URL not set");
        return;
    };

    let runner = Runner::new(NetworkProber::new(), PostgresConnector);
    let config = properties_file(
        &db.url,
        &db.user,
        &db.password,
        "sql.query2=SELECT * FROM pgprobe_missing_table\nprobe.check_reachability=false\n",
    );

    let mut out = Vec::new();
    let mut err = Vec::new();
    let outcome = runner.run(config.path(), &mut out, &mut err).await;

    assert!(matches!(outcome, Err(ProbeError::Query(_))));
    let err = String::from_utf8(err).unwrap();
    assert!(err.starts_with("Error: Query error: ERROR: "));
    assert!(err.contains("pgprobe_missing_table"));
    assert_eq!(err.lines().count(), 1);
}
