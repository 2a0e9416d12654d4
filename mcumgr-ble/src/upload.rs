//! Firmware image upload, one IMAGE/UPLOAD request per chunk.

use sha2::{Digest, Sha256};

use mcumgr_proto::HEADER_LEN;
use mcumgr_proto::ble::ATT_HEADER_LEN;
use mcumgr_proto::catalog::{ImageUpload, UPLOAD_ENCODING_OVERHEAD};

use crate::link::Link;
use crate::session::Session;
use crate::Error;

/// Chunk size used when the link MTU is unknown
pub const DEFAULT_CHUNK_SIZE: usize = 165;

/// Largest chunk whose UPLOAD request still fits in one write on a link
/// with the given ATT MTU. An MTU too small to carry the request overhead
/// falls back to [`DEFAULT_CHUNK_SIZE`], leaving the stack to split writes.
pub fn chunk_size_for_mtu(mtu: Option<usize>) -> usize {
    let overhead = ATT_HEADER_LEN + HEADER_LEN + UPLOAD_ENCODING_OVERHEAD;
    match mtu {
        Some(mtu) if mtu > overhead => mtu - overhead,
        Some(mtu) => {
            log::warn!("MTU {mtu} cannot fit the {overhead} byte upload overhead");
            DEFAULT_CHUNK_SIZE
        }
        None => DEFAULT_CHUNK_SIZE,
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Progress {
    /// Bytes acknowledged by the device so far
    pub sent: usize,
    pub total: usize,
}

/// State of one upload: the image, its digest and where we are in it.
pub struct Upload<'a> {
    image: &'a [u8],
    sha: [u8; 32],
    chunk_size: usize,
    offset: usize,
}

impl<'a> Upload<'a> {
    pub fn new(image: &'a [u8], chunk_size: usize) -> Result<Self, Error> {
        if image.is_empty() {
            return Err(Error::InvalidInput("image is empty".to_string()));
        }
        if chunk_size == 0 {
            return Err(Error::InvalidInput("chunk size must be positive".to_string()));
        }

        Ok(Self {
            image,
            sha: Sha256::digest(image).into(),
            chunk_size,
            offset: 0,
        })
    }

    pub fn sha(&self) -> &[u8; 32] {
        &self.sha
    }

    pub fn is_complete(&self) -> bool {
        self.offset >= self.image.len()
    }

    /// Request for the chunk at the current offset, or `None` once done.
    pub fn next_request(&self) -> Option<ImageUpload> {
        if self.is_complete() {
            return None;
        }

        let end = (self.offset + self.chunk_size).min(self.image.len());
        Some(ImageUpload {
            data: self.image[self.offset..end].to_vec(),
            off: self.offset as u64,
            len: self.image.len() as u64,
            sha: self.sha,
        })
    }

    /// Move past the chunk returned by [`Upload::next_request`].
    pub fn advance(&mut self) -> Progress {
        self.offset = (self.offset + self.chunk_size).min(self.image.len());
        Progress {
            sent: self.offset,
            total: self.image.len(),
        }
    }
}

/// Upload `image` chunk by chunk, waiting for each response before sending
/// the next. The first failure aborts the upload; nothing is retried.
pub async fn upload<L, F>(
    session: &mut Session<L>,
    image: &[u8],
    chunk_size: usize,
    mut progress: F,
) -> Result<(), Error>
where
    L: Link,
    F: FnMut(Progress),
{
    let mut upload = Upload::new(image, chunk_size)?;
    log::debug!("sha256: {:02x?}", upload.sha());
    log::debug!("chunk size: {chunk_size}");

    while let Some(request) = upload.next_request() {
        let response = session.call(&request).await?;
        let step = upload.advance();

        match response.off {
            Some(off) if off != step.sent as i64 => {
                log::warn!("device expects offset {off}, sent {}", step.sent);
            }
            _ => {}
        }

        progress(step);
    }

    Ok(())
}
