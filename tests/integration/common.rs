//! Shared helpers for integration tests.

use pgprobe::target::ConnectionTarget;
use std::io::Write;
use tempfile::NamedTempFile;
use url::Url;

/// Live database coordinates taken from DATABASE_URL.
pub struct TestDatabase {
    pub url: String,
    pub target: ConnectionTarget,
    pub user: String,
    pub password: String,
}

/// Returns the test database, or None when DATABASE_URL is not set.
pub fn test_database() -> Option<TestDatabase> {
    let url = std::env::var("DATABASE_URL").ok()?;
    let target = ConnectionTarget::parse(&url).ok()?;
    let parsed = Url::parse(&target.driver_url).ok()?;

    Some(TestDatabase {
        user: parsed.username().to_string(),
        password: parsed.password().unwrap_or_default().to_string(),
        url,
        target,
    })
}

/// Writes a properties file for a probe run.
pub fn properties_file(url: &str, user: &str, password: &str, extra: &str) -> NamedTempFile {
    let mut file = tempfile::Builder::new()
        .suffix(".properties")
        .tempfile()
        .expect("create temp config");
    write!(
        file,
        "db.url={url}\ndb.user={user}\ndb.password={password}\nsql.query=SELECT 1 AS n\n{extra}"
    )
    .expect("write temp config");
    file
}
