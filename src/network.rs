//! Network reachability probes run before the database connection.
//!
//! Both probes are best-effort: passing them does not guarantee the database
//! will accept the connection, they only turn a raw driver failure into a
//! clearer diagnostic.

use async_trait::async_trait;
use std::io::ErrorKind;
use std::net::SocketAddr;
use std::sync::{Arc, Mutex};
use std::time::Duration;
use tokio::net::{lookup_host, TcpStream};
use tracing::{debug, warn};

/// Budget for each probe, DNS resolution included.
pub const PROBE_TIMEOUT: Duration = Duration::from_millis(2000);

/// TCP echo port, used in place of ICMP which needs raw-socket privileges.
pub const ECHO_PORT: u16 = 7;

/// Pre-flight network checks.
#[async_trait]
pub trait Prober: Send + Sync {
    /// Returns true if the host resolves and answers.
    async fn is_host_reachable(&self, host: &str) -> bool;

    /// Returns true if a TCP connection to `host:port` can be opened.
    async fn is_port_open(&self, host: &str, port: u16) -> bool;
}

/// Prober backed by real sockets.
#[derive(Debug, Clone)]
pub struct NetworkProber {
    timeout: Duration,
    echo_port: u16,
}

impl NetworkProber {
    pub fn new() -> Self {
        Self {
            timeout: PROBE_TIMEOUT,
            echo_port: ECHO_PORT,
        }
    }

    /// Overrides the probe timeout.
    pub fn with_timeout(mut self, timeout: Duration) -> Self {
        self.timeout = timeout;
        self
    }

    /// Overrides the port the host probe knocks on.
    pub fn with_echo_port(mut self, port: u16) -> Self {
        self.echo_port = port;
        self
    }

    async fn resolve(host: &str, port: u16) -> Option<Vec<SocketAddr>> {
        match lookup_host((host, port)).await {
            Ok(addrs) => {
                let addrs: Vec<SocketAddr> = addrs.collect();
                debug!("Resolved {} to {:?}", host, addrs);
                (!addrs.is_empty()).then_some(addrs)
            }
            Err(e) => {
                warn!("Cannot resolve host {}: {}", host, e);
                None
            }
        }
    }
}

impl Default for NetworkProber {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait]
impl Prober for NetworkProber {
    async fn is_host_reachable(&self, host: &str) -> bool {
        let probe = async {
            let Some(addrs) = Self::resolve(host, self.echo_port).await else {
                return false;
            };

            for addr in addrs {
                match TcpStream::connect(addr).await {
                    Ok(_) => return true,
                    // A reset or refusal still proves the host answered.
                    Err(e) if e.kind() == ErrorKind::ConnectionRefused => return true,
                    Err(e) if e.kind() == ErrorKind::ConnectionReset => return true,
                    Err(e) => debug!("Echo probe to {} failed: {}", addr, e),
                }
            }
            false
        };

        match tokio::time::timeout(self.timeout, probe).await {
            Ok(reachable) => reachable,
            Err(_) => {
                warn!("Host {} did not answer within {:?}", host, self.timeout);
                false
            }
        }
    }

    async fn is_port_open(&self, host: &str, port: u16) -> bool {
        let probe = async {
            let Some(addrs) = Self::resolve(host, port).await else {
                return false;
            };

            for addr in addrs {
                match TcpStream::connect(addr).await {
                    Ok(stream) => {
                        drop(stream);
                        return true;
                    }
                    Err(e) => debug!("Port probe to {} failed: {}", addr, e),
                }
            }
            false
        };

        match tokio::time::timeout(self.timeout, probe).await {
            Ok(open) => open,
            Err(_) => {
                warn!(
                    "Port {} on {} did not accept a connection within {:?}",
                    port, host, self.timeout
                );
                false
            }
        }
    }
}

/// Prober with fixed answers that records every probe it receives.
#[derive(Debug, Clone, Default)]
pub struct MockProber {
    host_reachable: bool,
    port_open: bool,
    calls: Arc<Mutex<Vec<String>>>,
}

impl MockProber {
    pub fn new(host_reachable: bool, port_open: bool) -> Self {
        Self {
            host_reachable,
            port_open,
            calls: Arc::default(),
        }
    }

    /// A prober for which every host and port is reachable.
    pub fn reachable() -> Self {
        Self::new(true, true)
    }

    /// Probes received so far, as `host <name>` or `port <name>:<port>`.
    pub fn calls(&self) -> Vec<String> {
        self.calls
            .lock()
            .map(|calls| calls.clone())
            .unwrap_or_default()
    }

    fn record(&self, call: String) {
        if let Ok(mut calls) = self.calls.lock() {
            calls.push(call);
        }
    }
}

#[async_trait]
impl Prober for MockProber {
    async fn is_host_reachable(&self, host: &str) -> bool {
        self.record(format!("host {host}"));
        self.host_reachable
    }

    async fn is_port_open(&self, host: &str, port: u16) -> bool {
        self.record(format!("port {host}:{port}"));
        self.port_open
    }
}
