use thiserror::Error as ThisError;

pub type OpaqueError = Box<dyn std::error::Error + Send + Sync + 'static>;

#[derive(ThisError, Debug)]
pub enum Error {
    #[error("failed to connect to device: {0}")]
    Connection(OpaqueError),
    #[error("device rejected credentials: {0}")]
    Authentication(String),
    #[error("command {command} failed: {message}")]
    Command { command: String, message: String },
    #[error("Response timeout")]
    ResponseTimeout,
    #[error("session is no longer usable: {0}")]
    SessionFault(String),
    #[error("malformed reply: {0}")]
    MalformedReply(String),
    #[error("invalid target list: {0}")]
    InvalidTargets(String),
    #[error("{0}")]
    Opaque(#[from] OpaqueError),
}

pub type Result<T> = std::result::Result<T, Error>;

#[allow(clippy::enum_variant_names)]
#[derive(ThisError, Debug, PartialEq, Eq)]
#[non_exhaustive]
pub enum InputBuildError {
    #[error("device host is required")]
    MissingHost,
    #[error("device username is required")]
    MissingUsername,
}
