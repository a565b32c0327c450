//! Reachability of hosts behind a RouterOS-managed router.
//!
//! [`Prober::probe_group`] opens one API session to the router, reads its ARP
//! table once and pings, through the router, only the hosts missing from that
//! table. It always answers with one [`ProbeOutcome`] per requested address:
//! unreachable devices, rejected logins and failing pings degrade to
//! negative outcomes tagged with their [`ProbeSource`] instead of errors.
//!
//! ## Example
//! Following example probes a list of hosts (or a whole subnet) behind a router and prints the report as JSON.
//! ```no_run
#![doc = include_str!("../demos/probe_group.rs")]
//! ```
//! The underlying [`session::Session`] can also be used directly to run other API commands.

pub mod client;
pub mod descriptor;
pub mod error;
pub mod input;
pub mod probe;
pub mod request;
pub mod response;
pub mod session;
pub mod system;

pub(crate) mod caching;
pub(crate) mod codec;
pub(crate) mod constants;
pub(crate) mod notification;

#[cfg(test)]
pub(crate) mod testing;

pub use client::{ProbeReport, Prober, ProberConfig, ProberConfigBuilder};
pub use descriptor::{Credentials, DeviceDescriptor, DeviceDescriptorBuilder};
pub use error::{Error, InputBuildError, Result};
pub use input::TargetList;
pub use probe::{ProbeOutcome, ProbeSource};
pub use request::Command;
pub use session::{Connector, Session, TcpConnector};
pub use system::SystemInfo;
