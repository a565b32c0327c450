use std::str::FromStr;

use serde::Serialize;
use tokio::io::{AsyncRead, AsyncWrite};

use crate::error::{Error, Result};
use crate::request::Command;
use crate::response::Attributes;
use crate::session::Session;

/// Identity and load of the managed device.
#[derive(Clone, Debug, Default, PartialEq, Eq, Serialize)]
pub struct SystemInfo {
    pub identity: String,
    pub board_name: Option<String>,
    pub version: Option<String>,
    pub uptime: Option<String>,
    /// Percent.
    pub cpu_load: Option<u8>,
    pub free_memory: Option<u64>,
    pub total_memory: Option<u64>,
}

impl SystemInfo {
    pub(super) async fn read<S>(session: &Session<S>) -> Result<Self>
    where
        S: AsyncRead + AsyncWrite + Send + Unpin + 'static,
    {
        let identity = session
            .execute(&Command::new("/system/identity/print"), session.timeout())
            .await?;
        let resource = session
            .execute(&Command::new("/system/resource/print"), session.timeout())
            .await?;
        Self::from_rows(first_row(&identity.rows)?, first_row(&resource.rows)?)
    }

    fn from_rows(identity: &Attributes, resource: &Attributes) -> Result<Self> {
        let name = identity
            .get("name")
            .ok_or_else(|| Error::MalformedReply("identity without a name".into()))?;
        let text = |key: &str| resource.get(key).cloned();
        Ok(Self {
            identity: name.clone(),
            board_name: text("board-name"),
            version: text("version"),
            uptime: text("uptime"),
            cpu_load: parse_field(resource, "cpu-load"),
            free_memory: parse_field(resource, "free-memory"),
            total_memory: parse_field(resource, "total-memory"),
        })
    }
}

fn parse_field<T: FromStr>(row: &Attributes, key: &str) -> Option<T> {
    row.get(key).and_then(|value| value.trim().parse().ok())
}

fn first_row(rows: &[Attributes]) -> Result<&Attributes> {
    rows.first()
        .ok_or_else(|| Error::MalformedReply("expected one row, got none".into()))
}
