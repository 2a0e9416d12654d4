//! SMP (mcumgr) wire protocol - header, framing and command catalog
//!
//! Nothing in here does I/O. A transport hands received bytes to a
//! [`Reassembler`] and writes the bytes of [`Message::to_bytes`].

pub mod ble;
pub mod catalog;
pub mod codec;
mod header;
mod message;

pub use catalog::{Command, FromMap};
pub use header::{HEADER_LEN, Header, Op};
pub use message::{Message, Parse, Reassembler};

#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum ProtocolError {
    #[error("header too short: {len} bytes")]
    HeaderTooShort { len: usize },
    #[error("unknown opcode {0}")]
    UnknownOp(u8),
    #[error("payload of {len} bytes does not fit the 16 bit length field")]
    PayloadTooLarge { len: usize },
    #[error("header declares {declared} payload bytes, {available} available")]
    LengthMismatch { declared: usize, available: usize },
    #[error(
        "response is for group {group} id {id}, expected group {expected_group} id {expected_id}"
    )]
    ResponseMismatch {
        expected_group: u16,
        expected_id: u8,
        group: u16,
        id: u8,
    },
    #[error("expected {expected:?} response, got {got:?}")]
    UnexpectedOp { expected: Op, got: Op },
    #[error("payload codec: {0}")]
    Codec(String),
    #[error("response field `{0}` missing")]
    MissingField(&'static str),
    #[error("response field `{0}` has the wrong type")]
    InvalidField(&'static str),
}
