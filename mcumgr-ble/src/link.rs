//! The seam between the SMP session and a BLE stack.

use std::time::Duration;

use async_trait::async_trait;
use tokio::sync::mpsc;

use crate::Error;

/// Where a subscribed link delivers notification payloads, in the order the
/// stack emits them.
pub type Inbound = mpsc::UnboundedSender<Vec<u8>>;

/// An open connection to the SMP characteristic of one device.
#[async_trait]
pub trait Link: Send {
    /// Write `data` to the characteristic. With `ack` the call returns once
    /// the peer acknowledged the write.
    async fn write(&mut self, data: &[u8], ack: bool) -> Result<(), Error>;

    /// Start forwarding notifications to `inbound`. Failures are
    /// [`Error::Connection`].
    async fn subscribe(&mut self, inbound: Inbound) -> Result<(), Error>;

    async fn unsubscribe(&mut self) -> Result<(), Error>;

    async fn disconnect(&mut self) -> Result<(), Error>;

    /// ATT MTU of the link, if the stack can report it.
    fn mtu(&self) -> Option<usize> {
        None
    }
}

/// Opens [`Link`]s by device address.
#[async_trait]
pub trait Connector: Sync {
    type Link: Link;

    /// Fails with [`Error::Connection`] if the link is not up within
    /// `timeout`.
    async fn connect(&self, address: &str, timeout: Duration) -> Result<Self::Link, Error>;
}
