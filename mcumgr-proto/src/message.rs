//! Message framing and reassembly of fragmented responses

use crate::ProtocolError;
use crate::header::{HEADER_LEN, Header};

/// Header plus encoded payload
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Message {
    pub header: Header,
    pub payload: Vec<u8>,
}

/// Outcome of [`Message::parse`]
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Parse {
    /// A full message, and how many bytes of the buffer it used
    Complete { message: Message, consumed: usize },
    /// The buffer does not yet hold the header or the declared payload
    NeedsMoreData,
}

impl Message {
    /// Build a message, fixing `header.length` to the payload size.
    pub fn new(mut header: Header, payload: Vec<u8>) -> Result<Self, ProtocolError> {
        header.length = u16::try_from(payload.len())
            .map_err(|_| ProtocolError::PayloadTooLarge { len: payload.len() })?;
        Ok(Self { header, payload })
    }

    /// Serialized size: header plus payload
    pub fn encoded_len(&self) -> usize {
        HEADER_LEN + self.payload.len()
    }

    pub fn to_bytes(&self) -> Vec<u8> {
        let mut buf = Vec::with_capacity(self.encoded_len());
        buf.extend_from_slice(&self.header.to_bytes());
        buf.extend_from_slice(&self.payload);
        buf
    }

    /// Try to take one message off the front of `buf`.
    ///
    /// Bytes after the declared payload are ignored; `consumed` tells the
    /// caller where the message ended.
    pub fn parse(buf: &[u8]) -> Result<Parse, ProtocolError> {
        if buf.len() < HEADER_LEN {
            return Ok(Parse::NeedsMoreData);
        }

        let header = Header::from_bytes(buf)?;
        let end = HEADER_LEN + header.length as usize;
        if buf.len() < end {
            return Ok(Parse::NeedsMoreData);
        }

        Ok(Parse::Complete {
            message: Message {
                header,
                payload: buf[HEADER_LEN..end].to_vec(),
            },
            consumed: end,
        })
    }

    /// Decode a buffer that is expected to hold a whole message.
    pub fn from_bytes(buf: &[u8]) -> Result<Self, ProtocolError> {
        match Self::parse(buf)? {
            Parse::Complete { message, .. } => Ok(message),
            Parse::NeedsMoreData => {
                let header = Header::from_bytes(buf)?;
                Err(ProtocolError::LengthMismatch {
                    declared: header.length as usize,
                    available: buf.len() - HEADER_LEN,
                })
            }
        }
    }
}

/// Accumulates notification fragments until one message is complete.
#[derive(Debug, Default)]
pub struct Reassembler {
    buf: Vec<u8>,
}

impl Reassembler {
    pub fn new() -> Self {
        Self::default()
    }

    /// Append a fragment. Returns the message once the declared length has
    /// arrived, leaving the reassembler empty for the next one.
    ///
    /// On error the partial buffer is dropped.
    pub fn push(&mut self, fragment: &[u8]) -> Result<Option<Message>, ProtocolError> {
        self.buf.extend_from_slice(fragment);

        match Message::parse(&self.buf) {
            Ok(Parse::NeedsMoreData) => Ok(None),
            Ok(Parse::Complete { message, consumed }) => {
                if consumed < self.buf.len() {
                    log::debug!(
                        "ignoring {} bytes after end of message",
                        self.buf.len() - consumed
                    );
                }
                self.buf.clear();
                Ok(Some(message))
            }
            Err(e) => {
                self.buf.clear();
                Err(e)
            }
        }
    }

    /// Number of bytes waiting for the rest of their message
    pub fn buffered(&self) -> usize {
        self.buf.len()
    }

    pub fn reset(&mut self) {
        self.buf.clear();
    }
}
