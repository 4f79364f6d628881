//! Configuration management for pgprobe.
//!
//! Loads the key/value configuration the probe runs from. Two file formats
//! are understood: Java-style `.properties` files (the default
//! `database.properties`) and TOML files, whose nested tables are flattened
//! into dotted keys so both formats expose the same `db.url`-style keys.

use crate::error::{ProbeError, Result};
use std::collections::HashMap;
use std::path::{Path, PathBuf};

/// Default configuration file, relative to the working directory.
pub const DEFAULT_CONFIG_FILE: &str = "database.properties";

pub const KEY_URL: &str = "db.url";
pub const KEY_USER: &str = "db.user";
pub const KEY_PASSWORD: &str = "db.password";
pub const KEY_QUERY: &str = "sql.query";
pub const KEY_QUERY2: &str = "sql.query2";
pub const KEY_CHECK_REACHABILITY: &str = "probe.check_reachability";
pub const KEY_REPORT_METADATA: &str = "probe.report_metadata";

/// Whitespace as understood by the properties format.
const PROPERTIES_WHITESPACE: &[char] = &[' ', '\t', '\x0c'];

/// Raw configuration: string keys to string values, immutable once loaded.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Config {
    values: HashMap<String, String>,
}

/// The validated settings a probe run needs.
#[derive(Clone, PartialEq, Eq)]
pub struct ProbeSettings {
    /// Connection URL, e.g. `jdbc:postgresql://localhost:5432/test`.
    pub url: String,
    pub user: String,
    pub password: String,
    /// Primary query, printed as a table.
    pub query: String,
    /// Secondary query whose first value is printed as the database timestamp.
    pub query2: Option<String>,
}

impl std::fmt::Debug for ProbeSettings {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ProbeSettings")
            .field("url", &self.url)
            .field("user", &self.user)
            .field("password", &"***")
            .field("query", &self.query)
            .field("query2", &self.query2)
            .finish()
    }
}

/// Optional stages of a probe run.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RunOptions {
    /// Probe the host and port before connecting.
    pub check_reachability: bool,
    /// Print product, driver and OS metadata after the queries.
    pub report_metadata: bool,
}

impl Default for RunOptions {
    fn default() -> Self {
        Self {
            check_reachability: true,
            report_metadata: true,
        }
    }
}

impl Config {
    /// Returns the default config file path.
    pub fn default_path() -> PathBuf {
        PathBuf::from(DEFAULT_CONFIG_FILE)
    }

    /// Loads configuration from a file, choosing the format by extension.
    pub fn load_from_file(path: &Path) -> Result<Self> {
        let content = std::fs::read_to_string(path)
            .map_err(|e| ProbeError::config_io(path.display().to_string(), e.to_string()))?;

        let is_toml = path
            .extension()
            .is_some_and(|ext| ext.eq_ignore_ascii_case("toml"));

        if is_toml {
            Self::parse_toml(&content, path)
        } else {
            Self::parse_properties(&content)
        }
    }

    /// Parses a Java-style properties document.
    pub fn parse_properties(content: &str) -> Result<Self> {
        let mut values = HashMap::new();
        for line in logical_lines(content) {
            let (raw_key, raw_value) = split_key_value(&line);
            values.insert(unescape(raw_key)?, unescape(raw_value)?);
        }
        Ok(Self { values })
    }

    /// Parses a TOML document, flattening nested tables into dotted keys.
    fn parse_toml(content: &str, path: &Path) -> Result<Self> {
        let table: toml::Table = toml::from_str(content)
            .map_err(|e| ProbeError::config(toml_error_line(path, content, &e)))?;

        let mut values = HashMap::new();
        flatten_toml("", &table, &mut values)?;
        Ok(Self { values })
    }

    /// Builds a configuration from key/value pairs.
    pub fn from_pairs<K, V>(pairs: impl IntoIterator<Item = (K, V)>) -> Self
    where
        K: Into<String>,
        V: Into<String>,
    {
        Self {
            values: pairs
                .into_iter()
                .map(|(k, v)| (k.into(), v.into()))
                .collect(),
        }
    }

    /// Returns the raw value for a key.
    pub fn get(&self, key: &str) -> Option<&str> {
        self.values.get(key).map(String::as_str)
    }

    /// Returns the value for a key, failing when it is absent or blank.
    pub fn require(&self, key: &str) -> Result<&str> {
        match self.get(key) {
            Some(value) if !value.trim().is_empty() => Ok(value),
            _ => Err(ProbeError::config(format!(
                "Missing required configuration key '{key}'"
            ))),
        }
    }

    /// Extracts and validates the settings for a probe run.
    ///
    /// `db.password` must be present but may be empty (trust authentication).
    pub fn settings(&self) -> Result<ProbeSettings> {
        let url = self.require(KEY_URL)?.trim().to_string();
        let user = self.require(KEY_USER)?.to_string();
        let password = self
            .get(KEY_PASSWORD)
            .ok_or_else(|| {
                ProbeError::config(format!(
                    "Missing required configuration key '{KEY_PASSWORD}'"
                ))
            })?
            .to_string();
        let query = self.require(KEY_QUERY)?.to_string();
        let query2 = self
            .get(KEY_QUERY2)
            .filter(|q| !q.trim().is_empty())
            .map(String::from);

        Ok(ProbeSettings {
            url,
            user,
            password,
            query,
            query2,
        })
    }

    /// Reads the `probe.*` switches, defaulting each to enabled.
    pub fn run_options(&self) -> Result<RunOptions> {
        let defaults = RunOptions::default();
        Ok(RunOptions {
            check_reachability: self
                .bool_option(KEY_CHECK_REACHABILITY)?
                .unwrap_or(defaults.check_reachability),
            report_metadata: self
                .bool_option(KEY_REPORT_METADATA)?
                .unwrap_or(defaults.report_metadata),
        })
    }

    fn bool_option(&self, key: &str) -> Result<Option<bool>> {
        let Some(raw) = self.get(key) else {
            return Ok(None);
        };
        match raw.trim().to_lowercase().as_str() {
            "true" | "yes" | "on" | "1" => Ok(Some(true)),
            "false" | "no" | "off" | "0" => Ok(Some(false)),
            _ => Err(ProbeError::config(format!(
                "Invalid boolean '{raw}' for configuration key '{key}'"
            ))),
        }
    }
}

/// Joins continuation lines and drops blanks and comments.
fn logical_lines(content: &str) -> Vec<String> {
    let mut lines = Vec::new();
    let mut pending: Option<String> = None;

    for raw in content.lines() {
        let trimmed = raw.trim_start_matches(PROPERTIES_WHITESPACE);
        let mut line = match pending.take() {
            Some(mut acc) => {
                acc.push_str(trimmed);
                acc
            }
            None => {
                if trimmed.is_empty() || trimmed.starts_with('#') || trimmed.starts_with('!') {
                    continue;
                }
                trimmed.to_string()
            }
        };

        if continues(&line) {
            line.pop();
            pending = Some(line);
        } else {
            lines.push(line);
        }
    }

    if let Some(line) = pending {
        lines.push(line);
    }
    lines
}

/// A line continues when it ends in an odd number of backslashes.
fn continues(line: &str) -> bool {
    line.chars().rev().take_while(|&c| c == '\\').count() % 2 == 1
}

/// Splits a logical line at the first unescaped `=`, `:` or whitespace.
fn split_key_value(line: &str) -> (&str, &str) {
    let mut escaped = false;
    for (i, c) in line.char_indices() {
        if escaped {
            escaped = false;
            continue;
        }
        match c {
            '\\' => escaped = true,
            '=' | ':' => {
                return (
                    &line[..i],
                    line[i + 1..].trim_start_matches(PROPERTIES_WHITESPACE),
                );
            }
            ' ' | '\t' | '\x0c' => {
                let rest = line[i..].trim_start_matches(PROPERTIES_WHITESPACE);
                let rest = rest
                    .strip_prefix(|c: char| c == '=' || c == ':')
                    .map(|r| r.trim_start_matches(PROPERTIES_WHITESPACE))
                    .unwrap_or(rest);
                return (&line[..i], rest);
            }
            _ => {}
        }
    }
    (line, "")
}

/// Resolves properties escape sequences.
fn unescape(raw: &str) -> Result<String> {
    let mut out = String::with_capacity(raw.len());
    let mut chars = raw.chars();

    while let Some(c) = chars.next() {
        if c != '\\' {
            out.push(c);
            continue;
        }
        match chars.next() {
            Some('t') => out.push('\t'),
            Some('n') => out.push('\n'),
            Some('r') => out.push('\r'),
            Some('f') => out.push('\x0c'),
            Some('u') => {
                let hex: String = chars.by_ref().take(4).collect();
                let decoded = u32::from_str_radix(&hex, 16)
                    .ok()
                    .filter(|_| hex.len() == 4)
                    .and_then(char::from_u32)
                    .ok_or_else(|| {
                        ProbeError::config(format!("Malformed \\uxxxx encoding: \\u{hex}"))
                    })?;
                out.push(decoded);
            }
            Some(other) => out.push(other),
            None => {}
        }
    }
    Ok(out)
}

/// One-line description of a TOML error, positioned by line and column.
fn toml_error_line(path: &Path, content: &str, error: &toml::de::Error) -> String {
    let message = error.message().split_whitespace().collect::<Vec<_>>().join(" ");
    match error.span() {
        Some(span) => {
            let before = content.get(..span.start).unwrap_or(content);
            let line = before.matches('\n').count() + 1;
            let column = before.rsplit('\n').next().map_or(0, |l| l.chars().count()) + 1;
            format!(
                "Configuration error in {} at line {line}, column {column}: {message}",
                path.display()
            )
        }
        None => format!("Configuration error in {}: {message}", path.display()),
    }
}

fn flatten_toml(prefix: &str, table: &toml::Table, out: &mut HashMap<String, String>) -> Result<()> {
    for (key, value) in table {
        let full_key = if prefix.is_empty() {
            key.clone()
        } else {
            format!("{prefix}.{key}")
        };
        match value {
            toml::Value::Table(nested) => flatten_toml(&full_key, nested, out)?,
            toml::Value::String(s) => {
                out.insert(full_key, s.clone());
            }
            toml::Value::Array(_) => {
                return Err(ProbeError::config(format!(
                    "Configuration key '{full_key}' must be a single value, not an array"
                )));
            }
            other => {
                out.insert(full_key, other.to_string());
            }
        }
    }
    Ok(())
}
