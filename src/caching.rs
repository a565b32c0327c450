use std::collections::HashMap;

use log::{debug, warn};
use pnet::util::MacAddr;
use tokio::io::{AsyncRead, AsyncWrite};

use crate::request::Command;
use crate::response::Attributes;
use crate::session::Session;

/// Snapshot of the device's ARP table, keyed by trimmed IP address.
#[derive(Clone, Debug, Default, PartialEq, Eq)]
pub(super) struct ArpCache {
    entries: HashMap<String, MacAddr>,
}

impl ArpCache {
    /// Reads the whole table with a single command. A failed read yields an
    /// empty cache so that every address falls through to active probing.
    pub(super) async fn fetch<S>(session: &Session<S>) -> Self
    where
        S: AsyncRead + AsyncWrite + Send + Unpin + 'static,
    {
        let command = Command::new("/ip/arp/print")
            .with_proplist(&["address", "mac-address"]);
        match session.execute(&command, session.timeout()).await {
            Ok(response) => {
                let cache = Self::from_rows(&response.rows);
                debug!(
                    "arp table holds {} usable entries out of {} rows",
                    cache.len(),
                    response.rows.len()
                );
                cache
            }
            Err(err) => {
                warn!("failed to read arp table, reason: {}", err);
                Self::default()
            }
        }
    }

    /// Rows missing an address or a parsable hardware address are skipped.
    pub(super) fn from_rows(rows: &[Attributes]) -> Self {
        let entries = rows
            .iter()
            .filter_map(|row| {
                let address = row.get("address")?.trim();
                let mac = row.get("mac-address")?.trim().parse::<MacAddr>().ok()?;
                (!address.is_empty()).then(|| (address.to_string(), mac))
            })
            .collect();
        Self { entries }
    }

    pub(super) fn get(&self, address: &str) -> Option<MacAddr> {
        self.entries.get(address.trim()).copied()
    }

    pub(super) fn len(&self) -> usize {
        self.entries.len()
    }
}
