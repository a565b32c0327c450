use std::time::Duration;

use log::{debug, warn};
use pnet::util::MacAddr;
use serde::{Serialize, Serializer};
use tokio::io::{AsyncRead, AsyncWrite};

use crate::constants::{NOMINAL_LATENCY, PROBE_COUNT};
use crate::error::Error;
use crate::request::Command;
use crate::response::Attributes;
use crate::session::Session;

/// Where a verdict came from.
#[derive(Copy, Clone, Eq, PartialEq, Ord, PartialOrd, Hash, Debug, Serialize)]
#[serde(rename_all = "kebab-case")]
pub enum ProbeSource {
    /// The address was present in the device's ARP table.
    Cache,
    /// The device answered a ping, positively or negatively.
    Probe,
    /// No answer to the ping before the probe timeout.
    ProbeTimeout,
    /// The ping command itself failed.
    ProbeError,
    /// No session to the device could be opened.
    ConnectionError,
}

#[derive(Clone, Eq, PartialEq, Hash, Debug, Serialize)]
pub struct ProbeOutcome {
    /// The address exactly as it was requested.
    #[serde(skip)]
    pub address: String,
    pub reachable: bool,
    /// Round trip as reported by the device, e.g. `12ms`.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub latency: Option<String>,
    pub source: ProbeSource,
    #[serde(
        rename = "mac",
        serialize_with = "serialize_mac",
        skip_serializing_if = "Option::is_none"
    )]
    pub mac: Option<MacAddr>,
}

impl ProbeOutcome {
    pub fn cached(address: &str, mac: MacAddr) -> Self {
        Self {
            address: address.into(),
            reachable: true,
            latency: None,
            source: ProbeSource::Cache,
            mac: Some(mac),
        }
    }

    pub fn reachable(address: &str, latency: String) -> Self {
        Self {
            address: address.into(),
            reachable: true,
            latency: Some(latency),
            source: ProbeSource::Probe,
            mac: None,
        }
    }

    pub fn unreachable(address: &str, source: ProbeSource) -> Self {
        Self {
            address: address.into(),
            reachable: false,
            latency: None,
            source,
            mac: None,
        }
    }
}

/// Renders the address in the router's own upper-case colon notation, so a
/// table that reports `aa:bb:cc:dd:ee:ff` comes out as `AA:BB:CC:DD:EE:FF`.
fn serialize_mac<S: Serializer>(mac: &Option<MacAddr>, serializer: S) -> Result<S::Ok, S::Error> {
    match mac {
        Some(mac) => serializer.serialize_str(&mac.to_string().to_uppercase()),
        None => serializer.serialize_none(),
    }
}

/// Pings one host through the device, bounded by its own timeout.
#[derive(Copy, Clone, Eq, PartialEq, Debug)]
pub(super) struct EchoProbe {
    timeout: Duration,
    interval: Duration,
    retries: usize,
}

impl EchoProbe {
    pub(super) fn new(timeout: Duration, interval: Duration, retries: usize) -> Self {
        Self {
            timeout,
            interval,
            retries,
        }
    }

    /// Never fails: command faults and timeouts become unreachable outcomes.
    /// Only timed out or failed attempts are retried.
    pub(super) async fn probe<S>(&self, session: &Session<S>, address: &str) -> ProbeOutcome
    where
        S: AsyncRead + AsyncWrite + Send + Unpin + 'static,
    {
        let mut outcome = self.attempt(session, address).await;
        for _ in 0..self.retries {
            if !matches!(
                outcome.source,
                ProbeSource::ProbeTimeout | ProbeSource::ProbeError
            ) {
                break;
            }
            outcome = self.attempt(session, address).await;
        }
        outcome
    }

    async fn attempt<S>(&self, session: &Session<S>, address: &str) -> ProbeOutcome
    where
        S: AsyncRead + AsyncWrite + Send + Unpin + 'static,
    {
        let target = address.trim();
        let command = Command::new("/ping")
            .with_attribute("address", target)
            .with_attribute("count", PROBE_COUNT.to_string())
            .with_attribute("interval", format!("{}ms", self.interval.as_millis()));

        match session.execute(&command, self.timeout).await {
            Ok(response) => classify(address, &response.rows),
            Err(Error::ResponseTimeout) => {
                debug!("no echo from {} within {:?}", target, self.timeout);
                ProbeOutcome::unreachable(address, ProbeSource::ProbeTimeout)
            }
            Err(err) => {
                warn!("failed to probe {}, reason: {}", target, err);
                ProbeOutcome::unreachable(address, ProbeSource::ProbeError)
            }
        }
    }
}

/// A row proves liveness when it counts at least one received echo or, as
/// older firmware does, reports a round-trip time without a counter.
pub(super) fn classify(address: &str, rows: &[Attributes]) -> ProbeOutcome {
    if rows.is_empty() {
        return ProbeOutcome::unreachable(address, ProbeSource::ProbeTimeout);
    }
    match rows.iter().find(|row| is_echo(row)) {
        Some(row) => ProbeOutcome::reachable(address, latency_of(row)),
        None => ProbeOutcome::unreachable(address, ProbeSource::Probe),
    }
}

fn is_echo(row: &Attributes) -> bool {
    let received = row
        .get("received")
        .and_then(|received| received.trim().parse::<u32>().ok())
        .unwrap_or(0);
    received >= 1 || field(row, "time").is_some()
}

fn latency_of(row: &Attributes) -> String {
    field(row, "time")
        .or_else(|| field(row, "avg-rtt"))
        .unwrap_or(NOMINAL_LATENCY)
        .to_string()
}

fn field<'a>(row: &'a Attributes, key: &str) -> Option<&'a str> {
    row.get(key)
        .map(|value| value.trim())
        .filter(|value| !value.is_empty())
}
