//! Connection-string parsing and validation.
//!
//! Extracts the host and port to probe from `db.url`. Accepted shapes:
//!
//! ```text
//! jdbc:postgresql://host[:port]/database[?params]
//! postgresql://[user[:password]@]host[:port]/database[?params]
//! postgres://[user[:password]@]host[:port]/database[?params]
//! ```

use crate::error::{ProbeError, Result};
use regex::Regex;
use std::sync::OnceLock;
use url::Url;

/// Port used when the URL has no explicit port.
pub const DEFAULT_PORT: u16 = 5432;

const JDBC_PREFIX: &str = "jdbc:";

fn url_pattern() -> &'static Regex {
    static PATTERN: OnceLock<Regex> = OnceLock::new();
    PATTERN.get_or_init(|| {
        Regex::new(
            r"^(?:jdbc:postgresql|postgresql|postgres)://(?:[^@/?#]*@)?(?P<host>\[[0-9A-Fa-f:.]+\]|[^:/?#@\[\]\s]+)(?::(?P<port>\d+))?/(?P<database>[^?#]*)",
        )
        .expect("connection URL pattern is valid")
    })
}

/// Host and port extracted from a connection URL.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ConnectionTarget {
    /// Host name or IP address, without IPv6 brackets.
    pub host: String,
    pub port: u16,
    /// Database name from the URL path (may be empty).
    pub database: String,
    /// The URL in the form the driver accepts (`jdbc:` prefix removed).
    pub driver_url: String,
}

impl ConnectionTarget {
    /// Parses and validates a connection URL.
    pub fn parse(url: &str) -> Result<Self> {
        let url = url.trim();
        let captures = url_pattern().captures(url).ok_or_else(|| {
            ProbeError::url_parse(format!(
                "'{}' does not match scheme://host[:port]/database",
                mask_password(url)
            ))
        })?;

        let host = captures["host"]
            .trim_start_matches('[')
            .trim_end_matches(']')
            .to_string();

        let port = match captures.name("port") {
            Some(raw) => parse_port(raw.as_str())?,
            None => DEFAULT_PORT,
        };

        Ok(Self {
            host,
            port,
            database: captures["database"].to_string(),
            driver_url: url.strip_prefix(JDBC_PREFIX).unwrap_or(url).to_string(),
        })
    }

    /// Returns `host:port` with IPv6 addresses bracketed.
    pub fn socket_string(&self) -> String {
        if self.host.contains(':') {
            format!("[{}]:{}", self.host, self.port)
        } else {
            format!("{}:{}", self.host, self.port)
        }
    }
}

/// Validates an explicit port. Digits too long for any integer are out of range too.
fn parse_port(raw: &str) -> Result<u16> {
    match raw.parse::<u32>() {
        Ok(port) if (1..=65535).contains(&port) => Ok(port as u16),
        _ => Err(ProbeError::port_range(raw)),
    }
}

/// Returns the URL with any embedded password replaced by `***`.
///
/// Both `user:password@` userinfo and a `password` query parameter are masked.
/// Strings that do not parse as URLs are returned unchanged.
pub fn mask_password(raw: &str) -> String {
    let (prefix, rest) = match raw.strip_prefix(JDBC_PREFIX) {
        Some(rest) => (JDBC_PREFIX, rest),
        None => ("", raw),
    };

    let Ok(mut url) = Url::parse(rest) else {
        return raw.to_string();
    };

    let mut changed = false;
    if url.password().is_some() && url.set_password(Some("***")).is_ok() {
        changed = true;
    }

    if url
        .query_pairs()
        .any(|(key, _)| key.eq_ignore_ascii_case("password"))
    {
        let pairs: Vec<(String, String)> = url
            .query_pairs()
            .map(|(key, value)| {
                if key.eq_ignore_ascii_case("password") {
                    (key.into_owned(), "***".to_string())
                } else {
                    (key.into_owned(), value.into_owned())
                }
            })
            .collect();
        url.query_pairs_mut().clear().extend_pairs(pairs);
        changed = true;
    }

    if changed {
        format!("{prefix}{url}")
    } else {
        raw.to_string()
    }
}
