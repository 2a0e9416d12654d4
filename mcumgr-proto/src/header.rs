//! The fixed 8-byte SMP header.
//!
//! ```text
//! ┌──────┬───────┬────────────┬────────────┬──────┬──────┐
//! │  op  │ flags │   length   │   group    │ seq  │  id  │
//! │ (1B) │ (1B)  │ (2B, BE)   │ (2B, BE)   │ (1B) │ (1B) │
//! └──────┴───────┴────────────┴────────────┴──────┴──────┘
//! ```

use crate::ProtocolError;

/// Size of the encoded header in bytes
pub const HEADER_LEN: usize = 8;

/// Management operation carried in the first header byte
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
#[repr(u8)]
pub enum Op {
    Read = 0,
    ReadRsp = 1,
    Write = 2,
    WriteRsp = 3,
}

impl Op {
    /// The op a well-behaved device answers this op with.
    pub fn response(self) -> Op {
        match self {
            Op::Read | Op::ReadRsp => Op::ReadRsp,
            Op::Write | Op::WriteRsp => Op::WriteRsp,
        }
    }
}

impl TryFrom<u8> for Op {
    type Error = ProtocolError;

    fn try_from(value: u8) -> Result<Self, Self::Error> {
        match value {
            0 => Ok(Op::Read),
            1 => Ok(Op::ReadRsp),
            2 => Ok(Op::Write),
            3 => Ok(Op::WriteRsp),
            other => Err(ProtocolError::UnknownOp(other)),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Header {
    pub op: Op,
    pub flags: u8,
    /// Payload length; always the exact number of bytes after the header
    pub length: u16,
    pub group: u16,
    pub seq: u8,
    pub id: u8,
}

impl Header {
    pub fn new(op: Op, group: u16, id: u8) -> Self {
        Self {
            op,
            flags: 0,
            length: 0,
            group,
            seq: 0,
            id,
        }
    }

    pub fn with_seq(mut self, seq: u8) -> Self {
        self.seq = seq;
        self
    }

    pub fn to_bytes(&self) -> [u8; HEADER_LEN] {
        let length = self.length.to_be_bytes();
        let group = self.group.to_be_bytes();
        [
            self.op as u8,
            self.flags,
            length[0],
            length[1],
            group[0],
            group[1],
            self.seq,
            self.id,
        ]
    }

    /// Decode a header from the first [`HEADER_LEN`] bytes of `data`.
    /// Anything after the header is left alone.
    pub fn from_bytes(data: &[u8]) -> Result<Self, ProtocolError> {
        if data.len() < HEADER_LEN {
            return Err(ProtocolError::HeaderTooShort { len: data.len() });
        }

        Ok(Self {
            op: Op::try_from(data[0])?,
            flags: data[1],
            length: u16::from_be_bytes([data[2], data[3]]),
            group: u16::from_be_bytes([data[4], data[5]]),
            seq: data[6],
            id: data[7],
        })
    }

    /// Check that `response` answers the request described by `self`:
    /// same group and command id, and the RSP variant of our op.
    pub fn check_response(&self, response: &Header) -> Result<(), ProtocolError> {
        if response.group != self.group || response.id != self.id {
            return Err(ProtocolError::ResponseMismatch {
                expected_group: self.group,
                expected_id: self.id,
                group: response.group,
                id: response.id,
            });
        }

        let expected = self.op.response();
        if response.op != expected {
            return Err(ProtocolError::UnexpectedOp {
                expected,
                got: response.op,
            });
        }

        Ok(())
    }
}
