use std::collections::{HashMap, HashSet};
use std::time::Duration;

use futures::StreamExt;
use log::{debug, warn};
use tokio::io::{AsyncRead, AsyncWrite};

use crate::caching::ArpCache;
use crate::constants::{DEFAULT_PROBE_INTERVAL, DEFAULT_PROBE_TIMEOUT};
use crate::descriptor::DeviceDescriptor;
use crate::error::Result;
use crate::probe::{EchoProbe, ProbeOutcome, ProbeSource};
use crate::session::{Connector, Session, TcpConnector};
use crate::system::SystemInfo;

/// One outcome per requested address, keyed by the address as it was given.
pub type ProbeReport = HashMap<String, ProbeOutcome>;

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ProberConfig {
    /// Bounds each ping, independently of the session timeout.
    pub probe_timeout: Duration,
    pub probe_interval: Duration,
    /// Pings in flight at once over the shared session.
    pub probe_concurrency: usize,
    /// Extra attempts for hosts whose ping timed out or failed.
    pub probe_retries: usize,
}

impl Default for ProberConfig {
    fn default() -> Self {
        Self {
            probe_timeout: DEFAULT_PROBE_TIMEOUT,
            probe_interval: DEFAULT_PROBE_INTERVAL,
            probe_concurrency: 1,
            probe_retries: 0,
        }
    }
}

impl ProberConfig {
    /// Pings never outlive the session timeout they run under.
    fn echo_probe(&self, session_timeout: Duration) -> EchoProbe {
        EchoProbe::new(
            self.probe_timeout.min(session_timeout),
            self.probe_interval,
            self.probe_retries,
        )
    }
}

#[derive(Debug, Clone, Default)]
pub struct ProberConfigBuilder {
    config: ProberConfig,
}

impl ProberConfigBuilder {
    pub fn new() -> Self {
        Self::default()
    }

    /// Should be tighter than the descriptor's session timeout; longer values
    /// are cut down to it when probing.
    pub fn with_probe_timeout(mut self, timeout: Duration) -> Self {
        self.config.probe_timeout = timeout;
        self
    }

    pub fn with_probe_interval(mut self, interval: Duration) -> Self {
        self.config.probe_interval = interval;
        self
    }

    /// Values below one are treated as one.
    pub fn with_probe_concurrency(mut self, concurrency: usize) -> Self {
        self.config.probe_concurrency = concurrency.max(1);
        self
    }

    pub fn with_probe_retries(mut self, retries: usize) -> Self {
        self.config.probe_retries = retries;
        self
    }

    pub fn build(self) -> ProberConfig {
        self.config
    }
}

/// Determines which hosts behind a managed router are online.
///
/// Every call opens its own session to the router, reads the router's ARP
/// table once and pings only the hosts missing from it. The session is closed
/// before the call returns and is never shared between calls.
///
/// # Example
/// ```no_run
/// use routeros_reach::{DeviceDescriptorBuilder, Prober, ProberConfig};
///
/// let descriptor = DeviceDescriptorBuilder::new("192.168.88.1")
///     .with_credentials("admin", "secret")
///     .build()
///     .expect("Failed to build descriptor");
/// tokio_test::block_on(async {
///     let prober = Prober::new(ProberConfig::default());
///     let report = prober.probe_group(&descriptor, &["192.168.88.10", "192.168.88.11"]).await;
///     for (address, outcome) in &report {
///         println!("{address}: {outcome:?}");
///     }
/// })
/// ```
#[derive(Debug, Clone)]
pub struct Prober<C = TcpConnector> {
    config: ProberConfig,
    connector: C,
}

impl Prober {
    pub fn new(config: ProberConfig) -> Self {
        Self::with_connector(config, TcpConnector)
    }
}

impl<C: Connector> Prober<C> {
    pub fn with_connector(config: ProberConfig, connector: C) -> Self {
        Self { config, connector }
    }

    pub fn config(&self) -> &ProberConfig {
        &self.config
    }

    /// Reports every requested address exactly once. Failures never escape:
    /// if no session can be opened every address is reported with
    /// [`ProbeSource::ConnectionError`], and a failing ping only affects its
    /// own host.
    pub async fn probe_group<A: AsRef<str>>(
        &self,
        descriptor: &DeviceDescriptor,
        addresses: &[A],
    ) -> ProbeReport {
        let mut seen = HashSet::new();
        let addresses: Vec<&str> = addresses
            .iter()
            .map(AsRef::<str>::as_ref)
            .filter(|address| seen.insert(*address))
            .collect();
        if addresses.is_empty() {
            return ProbeReport::new();
        }

        let mut session = match Session::open(&self.connector, descriptor).await {
            Ok(session) => session,
            Err(err) => {
                warn!(
                    "failed to open session to {}:{}, reason: {}",
                    descriptor.host, descriptor.port, err
                );
                return addresses
                    .iter()
                    .map(|address| {
                        let outcome =
                            ProbeOutcome::unreachable(address, ProbeSource::ConnectionError);
                        (address.to_string(), outcome)
                    })
                    .collect();
            }
        };
        let report = self.resolve(&session, &addresses).await;
        session.close().await;
        report
    }

    async fn resolve<S>(&self, session: &Session<S>, addresses: &[&str]) -> ProbeReport
    where
        S: AsyncRead + AsyncWrite + Send + Unpin + 'static,
    {
        let cache = ArpCache::fetch(session).await;

        let mut report = ProbeReport::with_capacity(addresses.len());
        let mut misses = Vec::new();
        for &address in addresses {
            match cache.get(address) {
                Some(mac) => {
                    report.insert(address.to_string(), ProbeOutcome::cached(address, mac));
                }
                None => misses.push(address),
            }
        }
        debug!(
            "{} hosts answered from arp table, probing {}",
            report.len(),
            misses.len()
        );

        let probe = self.config.echo_probe(session.timeout());
        let probed: Vec<ProbeOutcome> = futures::stream::iter(misses)
            .map(|address| probe.probe(session, address))
            .buffer_unordered(self.config.probe_concurrency.max(1))
            .collect()
            .await;
        report.extend(
            probed
                .into_iter()
                .map(|outcome| (outcome.address.clone(), outcome)),
        );
        report
    }

    /// Reads the router's identity and resource usage.
    ///
    /// # Errors
    /// Returns an error if the session cannot be opened or either read fails.
    pub async fn system_info(&self, descriptor: &DeviceDescriptor) -> Result<SystemInfo> {
        let mut session = Session::open(&self.connector, descriptor).await?;
        let info = SystemInfo::read(&session).await;
        session.close().await;
        info
    }
}
