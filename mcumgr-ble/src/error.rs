use std::time::Duration;

use mcumgr_proto::ProtocolError;
use mcumgr_proto::catalog::rc_name;

#[derive(Debug, thiserror::Error)]
pub enum Error {
    /// Link establishment, subscription or teardown failed, or the session
    /// is already disconnected
    #[error("connection error: {0}")]
    Connection(String),
    #[error("protocol error: {0}")]
    Protocol(#[from] ProtocolError),
    #[error("no response within {0:?}")]
    Timeout(Duration),
    /// The BLE stack reported a failed write or lost the notification stream
    #[error("transport error: {0}")]
    Transport(String),
    #[error("device returned rc={rc} ({})", rc_name(*.rc))]
    Device { rc: i64 },
    #[error("invalid input: {0}")]
    InvalidInput(String),
}

impl Error {
    /// Process exit code for this error category
    pub fn exit_code(&self) -> i32 {
        match self {
            Error::Connection(_) => 3,
            Error::Protocol(_) => 4,
            Error::Timeout(_) => 5,
            Error::Transport(_) => 6,
            Error::Device { .. } => 7,
            Error::InvalidInput(_) => 8,
        }
    }
}
