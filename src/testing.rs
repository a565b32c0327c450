//! A scripted RouterOS device served over in-memory pipes.

use std::{
    collections::HashMap,
    io,
    sync::{Arc, Mutex},
    time::Duration,
};

use futures::{SinkExt, StreamExt};
use tokio::io::DuplexStream;
use tokio_util::codec::Framed;

use crate::codec::SentenceCodec;
use crate::descriptor::{DeviceDescriptor, DeviceDescriptorBuilder};
use crate::session::Connector;

pub(crate) const USERNAME: &str = "admin";
pub(crate) const PASSWORD: &str = "secret";

pub(crate) fn descriptor() -> DeviceDescriptor {
    DeviceDescriptorBuilder::new("192.0.2.1")
        .with_credentials(USERNAME, PASSWORD)
        .with_timeout(Duration::from_secs(1))
        .build()
        .unwrap()
}

/// Polls `condition` for up to a second.
pub(crate) async fn eventually(mut condition: impl FnMut() -> bool) -> bool {
    for _ in 0..100 {
        if condition() {
            return true;
        }
        tokio::time::sleep(Duration::from_millis(10)).await;
    }
    condition()
}

type Row = Vec<(&'static str, &'static str)>;

#[derive(Clone, Debug)]
pub(crate) enum PingScript {
    Rows(Vec<Row>),
    Trap(&'static str),
    /// Never answers until the command is cancelled.
    Silent,
    /// Kills the session.
    Fatal,
    /// Stops reading from the connection without closing it.
    Stall,
}

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
enum Availability {
    Accepting,
    Refusing,
    Hanging,
}

#[derive(Debug, Default)]
struct Journal {
    connections: usize,
    disconnects: usize,
    quits: usize,
    commands: Vec<String>,
    pings: Vec<String>,
}

#[derive(Clone, Debug)]
pub(crate) struct FakeDevice {
    availability: Availability,
    identity: &'static str,
    arp: Vec<Row>,
    arp_trap: bool,
    pings: HashMap<String, PingScript>,
    buffer: usize,
    journal: Arc<Mutex<Journal>>,
}

impl FakeDevice {
    pub(crate) fn new() -> Self {
        Self {
            availability: Availability::Accepting,
            identity: "MikroTik",
            arp: Vec::new(),
            arp_trap: false,
            pings: HashMap::new(),
            buffer: 64 * 1024,
            journal: Arc::default(),
        }
    }

    pub(crate) fn refusing(mut self) -> Self {
        self.availability = Availability::Refusing;
        self
    }

    pub(crate) fn hanging(mut self) -> Self {
        self.availability = Availability::Hanging;
        self
    }

    /// Bytes the pipe holds in each direction before writes block.
    pub(crate) fn with_buffer(mut self, buffer: usize) -> Self {
        self.buffer = buffer;
        self
    }

    pub(crate) fn with_identity(mut self, identity: &'static str) -> Self {
        self.identity = identity;
        self
    }

    pub(crate) fn with_arp_entry(self, address: &'static str, mac: &'static str) -> Self {
        self.with_arp_row(vec![("address", address), ("mac-address", mac)])
    }

    pub(crate) fn with_arp_row(mut self, row: Row) -> Self {
        self.arp.push(row);
        self
    }

    pub(crate) fn with_failing_arp(mut self) -> Self {
        self.arp_trap = true;
        self
    }

    pub(crate) fn with_ping(mut self, address: &str, script: PingScript) -> Self {
        self.pings.insert(address.into(), script);
        self
    }

    pub(crate) fn connections(&self) -> usize {
        self.journal.lock().unwrap().connections
    }

    /// Connections the device has seen end, for whatever reason.
    pub(crate) fn disconnects(&self) -> usize {
        self.journal.lock().unwrap().disconnects
    }

    pub(crate) fn quits(&self) -> usize {
        self.journal.lock().unwrap().quits
    }

    pub(crate) fn commands(&self) -> Vec<String> {
        self.journal.lock().unwrap().commands.clone()
    }

    pub(crate) fn pings(&self) -> Vec<String> {
        self.journal.lock().unwrap().pings.clone()
    }

    async fn serve(self, stream: DuplexStream) {
        self.converse(stream).await;
        self.journal.lock().unwrap().disconnects += 1;
    }

    async fn converse(&self, stream: DuplexStream) {
        let mut framed = Framed::new(stream, SentenceCodec);
        let mut authenticated = false;
        let mut silent: Vec<Option<String>> = Vec::new();

        while let Some(Ok(words)) = framed.next().await {
            let Some(path) = words.first().cloned() else {
                continue;
            };
            let (tag, attributes) = split_words(&words[1..]);
            let tag = tag.as_deref();
            self.journal.lock().unwrap().commands.push(path.clone());

            let replies: Vec<Vec<String>> = match path.as_str() {
                "/login" => {
                    authenticated = attributes.get("name").map(String::as_str) == Some(USERNAME)
                        && attributes.get("password").map(String::as_str) == Some(PASSWORD);
                    if authenticated {
                        vec![sentence("!done", tag, &[])]
                    } else {
                        trap(tag, "invalid user name or password (6)")
                    }
                }
                "/quit" => {
                    self.journal.lock().unwrap().quits += 1;
                    let _ = framed.send(fatal("session terminated on request")).await;
                    return;
                }
                _ if !authenticated => trap(tag, "not logged in"),
                "/ip/arp/print" if self.arp_trap => trap(tag, "no such command prefix"),
                "/ip/arp/print" => self
                    .arp
                    .iter()
                    .map(|row| sentence("!re", tag, row))
                    .chain(std::iter::once(sentence("!done", tag, &[])))
                    .collect(),
                "/ping" => {
                    let address = attributes.get("address").cloned().unwrap_or_default();
                    self.journal.lock().unwrap().pings.push(address.clone());
                    match self.pings.get(&address) {
                        Some(PingScript::Rows(rows)) => rows
                            .iter()
                            .map(|row| sentence("!re", tag, row))
                            .chain(std::iter::once(sentence("!done", tag, &[])))
                            .collect(),
                        Some(PingScript::Trap(message)) => trap(tag, message),
                        Some(PingScript::Silent) => {
                            silent.push(tag.map(str::to_string));
                            Vec::new()
                        }
                        Some(PingScript::Fatal) => {
                            let _ = framed.send(fatal("out of memory")).await;
                            return;
                        }
                        Some(PingScript::Stall) => {
                            std::future::pending::<()>().await;
                            return;
                        }
                        None => vec![
                            sentence(
                                "!re",
                                tag,
                                &[
                                    ("host", address.as_str()),
                                    ("status", "timeout"),
                                    ("sent", "1"),
                                    ("received", "0"),
                                    ("packet-loss", "100"),
                                ],
                            ),
                            sentence("!done", tag, &[]),
                        ],
                    }
                }
                "/cancel" => {
                    let target = attributes.get("tag").cloned();
                    let mut replies = Vec::new();
                    if let Some(position) = silent.iter().position(|pending| *pending == target) {
                        silent.remove(position);
                        let target = target.as_deref();
                        replies.push(sentence(
                            "!trap",
                            target,
                            &[("category", "2"), ("message", "interrupted")],
                        ));
                        replies.push(sentence("!done", target, &[]));
                    }
                    replies.push(sentence("!done", tag, &[]));
                    replies
                }
                "/system/identity/print" => vec![
                    sentence("!re", tag, &[("name", self.identity)]),
                    sentence("!done", tag, &[]),
                ],
                "/system/resource/print" => vec![
                    sentence(
                        "!re",
                        tag,
                        &[
                            ("uptime", "3d4h12m"),
                            ("version", "7.14.3 (stable)"),
                            ("board-name", "hAP ac^2"),
                            ("cpu-load", "7"),
                            ("free-memory", "134217728"),
                            ("total-memory", "268435456"),
                        ],
                    ),
                    sentence("!done", tag, &[]),
                ],
                _ => trap(tag, "no such command"),
            };

            for reply in replies {
                if framed.send(reply).await.is_err() {
                    return;
                }
            }
        }
    }
}

impl Connector for FakeDevice {
    type Stream = DuplexStream;

    async fn connect(&self, _host: &str, _port: u16) -> io::Result<DuplexStream> {
        match self.availability {
            Availability::Refusing => {
                return Err(io::Error::new(
                    io::ErrorKind::ConnectionRefused,
                    "connection refused",
                ))
            }
            Availability::Hanging => std::future::pending::<()>().await,
            Availability::Accepting => {}
        }
        self.journal.lock().unwrap().connections += 1;
        let (client, server) = tokio::io::duplex(self.buffer);
        tokio::spawn(self.clone().serve(server));
        Ok(client)
    }
}

fn split_words(words: &[String]) -> (Option<String>, HashMap<String, String>) {
    let mut tag = None;
    let mut attributes = HashMap::new();
    for word in words {
        if let Some(value) = word.strip_prefix(".tag=") {
            tag = Some(value.to_string());
        } else if let Some((key, value)) = word.strip_prefix('=').and_then(|w| w.split_once('=')) {
            attributes.insert(key.to_string(), value.to_string());
        }
    }
    (tag, attributes)
}

fn sentence(kind: &str, tag: Option<&str>, attributes: &[(&str, &str)]) -> Vec<String> {
    let mut words = vec![kind.to_string()];
    words.extend(
        attributes
            .iter()
            .map(|(key, value)| format!("={key}={value}")),
    );
    if let Some(tag) = tag {
        words.push(format!(".tag={tag}"));
    }
    words
}

fn trap(tag: Option<&str>, message: &str) -> Vec<Vec<String>> {
    vec![
        sentence("!trap", tag, &[("message", message)]),
        sentence("!done", tag, &[]),
    ]
}

fn fatal(message: &str) -> Vec<String> {
    vec!["!fatal".to_string(), message.to_string()]
}
