use std::fmt;

use thiserror::Error;

use inkrelay_shared::WireError;

#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub enum RequestKind {
    Clear,
    DisplayName,
}

impl RequestKind {
    fn timeout_message(self) -> &'static str {
        match self {
            RequestKind::Clear => "Clear request timed out.",
            RequestKind::DisplayName => "Request timed out.",
        }
    }
}

impl fmt::Display for RequestKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            RequestKind::Clear => f.write_str("clear"),
            RequestKind::DisplayName => f.write_str("display name"),
        }
    }
}

#[derive(Debug, Error)]
pub enum TransportError {
    #[error("transport is closed")]
    Closed,
    #[error("invalid url: {0}")]
    InvalidUrl(String),
    #[error(transparent)]
    Wire(#[from] WireError),
}

#[derive(Clone, Debug, Error, PartialEq, Eq)]
pub enum ChannelError {
    #[error("Not connected.")]
    NotConnected,
    #[error("Connection lost.")]
    ConnectionLost,
    #[error("{}", .0.timeout_message())]
    Timeout(RequestKind),
    #[error("Another update is in progress.")]
    Superseded,
    #[error("{0}")]
    Rejected(String),
    #[error("transport: {0}")]
    Transport(String),
}

impl From<TransportError> for ChannelError {
    fn from(err: TransportError) -> Self {
        ChannelError::Transport(err.to_string())
    }
}

#[derive(Clone, Debug, Error, PartialEq, Eq)]
pub enum ClearError {
    #[error("a clear request is already pending")]
    InProgress,
    #[error(transparent)]
    Channel(#[from] ChannelError),
}

#[derive(Clone, Debug, Error, PartialEq, Eq)]
pub enum NameError {
    #[error("display name must be at least {0} characters")]
    TooShort(usize),
    #[error("display name is unchanged")]
    Unchanged,
    #[error(transparent)]
    Channel(#[from] ChannelError),
}

#[derive(Debug, Error)]
pub enum ExportError {
    #[error("surfaces are not configured")]
    NotConfigured,
    #[error("surface of {width}x{height} pixels cannot be rasterized")]
    InvalidSize { width: u32, height: u32 },
    #[error(transparent)]
    Image(#[from] image::ImageError),
}
