//! The probe run: load config, check the network path, connect, query, report.
//!
//! Output and error sinks are passed in, so a whole run can be captured in
//! memory. Whatever stage fails, an opened connection is closed before
//! [`Runner::run`] returns.

use crate::config::{Config, RunOptions};
use crate::db::{Connector, DatabaseClient, QueryResult};
use crate::error::{ProbeError, Result};
use crate::network::Prober;
use crate::output::write_table;
use crate::target::{mask_password, ConnectionTarget};
use chrono::Local;
use std::io::Write;
use std::path::Path;
use tracing::{debug, info};

/// Separator printed between report sections.
pub const BANNER: &str = "---------------------------------------------------";

/// `yyyy/MM/dd HH:mm:ss`
pub const TIMESTAMP_FORMAT: &str = "%Y/%m/%d %H:%M:%S";

/// Final line of a successful run.
pub const SUCCESS_MESSAGE: &str = "Database connection established successfully.";

/// Command-line overrides for the `probe.*` configuration switches.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct OptionOverrides {
    pub check_reachability: Option<bool>,
    pub report_metadata: Option<bool>,
}

impl OptionOverrides {
    /// Applies the overrides on top of the options read from the file.
    pub fn apply(&self, options: RunOptions) -> RunOptions {
        RunOptions {
            check_reachability: self
                .check_reachability
                .unwrap_or(options.check_reachability),
            report_metadata: self.report_metadata.unwrap_or(options.report_metadata),
        }
    }
}

/// Runs one probe against the configured database.
pub struct Runner<P, C> {
    prober: P,
    connector: C,
    overrides: OptionOverrides,
}

impl<P: Prober, C: Connector> Runner<P, C> {
    pub fn new(prober: P, connector: C) -> Self {
        Self {
            prober,
            connector,
            overrides: OptionOverrides::default(),
        }
    }

    /// Sets command-line overrides for the configured run options.
    pub fn with_overrides(mut self, overrides: OptionOverrides) -> Self {
        self.overrides = overrides;
        self
    }

    /// Runs the probe, writing the report to `out` and failures to `err`.
    ///
    /// A failing stage is reported once as `Error: <message>` and returned.
    /// A failure while closing the connection is reported but not returned.
    pub async fn run<W, E>(&self, config_path: &Path, out: &mut W, err: &mut E) -> Result<()>
    where
        W: Write + ?Sized,
        E: Write + ?Sized,
    {
        let mut client: Option<Box<dyn DatabaseClient>> = None;
        let outcome = self.probe(config_path, out, &mut client).await;

        if let Err(e) = &outcome {
            debug!("{}: {}", e.category(), e);
            let _ = writeln!(err, "Error: {e}");
        }

        if let Some(mut client) = client.take() {
            match client.close().await {
                Ok(()) => debug!("Connection released"),
                Err(e) => {
                    debug!("Close failed: {}", e);
                    let _ = writeln!(err, "Error while closing connection: {e}");
                }
            }
        }

        let _ = out.flush();
        outcome
    }

    async fn probe<W>(
        &self,
        config_path: &Path,
        out: &mut W,
        client: &mut Option<Box<dyn DatabaseClient>>,
    ) -> Result<()>
    where
        W: Write + ?Sized,
    {
        let started = Local::now();
        writeln!(out, "{BANNER}")?;
        writeln!(out, "Recording start time: {}", started.format(TIMESTAMP_FORMAT))?;

        info!("Loading config from: {}", config_path.display());
        let config = Config::load_from_file(config_path)?;
        let settings = config.settings()?;
        let options = self.overrides.apply(config.run_options()?);
        debug!("Run options: {:?}", options);

        writeln!(out, "{BANNER}")?;
        writeln!(out, "url: {}", mask_password(&settings.url))?;

        let target = ConnectionTarget::parse(&settings.url)?;
        writeln!(out, "Host: {}", target.host)?;
        writeln!(out, "Port: {}", target.port)?;

        if options.check_reachability {
            self.check_reachability(&target).await?;
        } else {
            info!("Skipping reachability checks");
        }

        info!("Connecting to {}", target.socket_string());
        let conn = client.insert(self.connector.connect(&target, &settings).await?);

        let result = conn.execute_query(&settings.query).await?;
        info!(
            "Primary query returned {} rows in {:?}",
            result.row_count(),
            result.execution_time
        );
        write_table(out, &result)?;

        if let Some(query2) = &settings.query2 {
            let result = conn.execute_query(query2).await?;
            writeln!(out, "Database timestamp: {}", first_value_text(&result))?;
        }

        if options.report_metadata {
            let driver = conn.driver_info().await?;
            writeln!(out, "{BANNER}")?;
            writeln!(
                out,
                "Database: {} {}",
                driver.product_name, driver.product_version
            )?;
            writeln!(
                out,
                "Driver: {} {}",
                driver.driver_name, driver.driver_version
            )?;
            writeln!(out, "OS: {}", os_description())?;
        }

        writeln!(out, "{BANNER}")?;
        writeln!(out, "{SUCCESS_MESSAGE}")?;
        Ok(())
    }

    async fn check_reachability(&self, target: &ConnectionTarget) -> Result<()> {
        if !self.prober.is_host_reachable(&target.host).await {
            return Err(ProbeError::network(format!(
                "Host {} is not reachable.",
                target.host
            )));
        }

        if !self.prober.is_port_open(&target.host, target.port).await {
            return Err(ProbeError::network(format!(
                "Port {} on host {} is not open.",
                target.port, target.host
            )));
        }

        debug!("{} is reachable", target.socket_string());
        Ok(())
    }
}

fn first_value_text(result: &QueryResult) -> &str {
    match result.first_value() {
        Some(Some(value)) => value.as_str(),
        Some(None) => "NULL",
        None => "(no rows)",
    }
}

/// OS name and version, e.g. `Ubuntu 24.04 (x86_64)`.
fn os_description() -> String {
    let name = sysinfo::System::name().unwrap_or_else(|| std::env::consts::OS.to_string());
    let version = sysinfo::System::os_version().unwrap_or_else(|| "unknown".to_string());
    format!("{name} {version} ({})", std::env::consts::ARCH)
}
