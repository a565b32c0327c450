use std::{fmt, time::Duration};

use crate::constants::{DEFAULT_API_PORT, DEFAULT_SESSION_TIMEOUT};
use crate::error::InputBuildError;

#[derive(Clone, Eq, PartialEq, Hash)]
pub struct Credentials {
    pub username: String,
    pub password: String,
}

impl fmt::Debug for Credentials {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Credentials")
            .field("username", &self.username)
            .field("password", &"<redacted>")
            .finish()
    }
}

/// Where and how to reach the management API of one device. Supplied fresh
/// for every request and never stored.
#[derive(Clone, Debug, Eq, PartialEq, Hash)]
pub struct DeviceDescriptor {
    pub host: String,
    pub port: u16,
    pub credentials: Credentials,
    /// Bounds opening the session and every command that does not carry a
    /// tighter timeout of its own.
    pub timeout: Duration,
}

#[derive(Clone, Debug, Default)]
pub struct DeviceDescriptorBuilder {
    host: Option<String>,
    port: Option<u16>,
    username: Option<String>,
    password: String,
    timeout: Option<Duration>,
}

impl DeviceDescriptorBuilder {
    pub fn new(host: &str) -> Self {
        Self {
            host: Some(host.trim().to_string()).filter(|host| !host.is_empty()),
            ..Self::default()
        }
    }

    pub fn with_port(mut self, port: u16) -> Self {
        self.port = Some(port).filter(|port| *port != 0);
        self
    }

    /// Accepts a port as it is usually stored next to device records: leading
    /// digits are used, anything else falls back to the API default.
    pub fn with_port_str(mut self, port: &str) -> Self {
        self.port = parse_port(port);
        self
    }

    pub fn with_credentials(mut self, username: &str, password: &str) -> Self {
        self.username = Some(username.to_string()).filter(|username| !username.is_empty());
        self.password = password.into();
        self
    }

    pub fn with_timeout(mut self, timeout: Duration) -> Self {
        self.timeout = Some(timeout);
        self
    }

    pub fn build(self) -> Result<DeviceDescriptor, InputBuildError> {
        Ok(DeviceDescriptor {
            host: self.host.ok_or(InputBuildError::MissingHost)?,
            port: self.port.unwrap_or(DEFAULT_API_PORT),
            credentials: Credentials {
                username: self.username.ok_or(InputBuildError::MissingUsername)?,
                password: self.password,
            },
            timeout: self.timeout.unwrap_or(DEFAULT_SESSION_TIMEOUT),
        })
    }
}

fn parse_port(raw: &str) -> Option<u16> {
    let raw = raw.trim();
    let digits = raw
        .find(|c: char| !c.is_ascii_digit())
        .map_or(raw, |end| &raw[..end]);
    digits.parse::<u16>().ok().filter(|port| *port != 0)
}
