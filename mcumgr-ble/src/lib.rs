//! SMP (mcumgr) client over BLE
//!
//! Talks to devices running the mcumgr SMP server through the SMP GATT
//! characteristic: one request at a time, responses reassembled from
//! notifications.
//!
//! # Example
//!
//! ```ignore
//! use std::time::Duration;
//! use mcumgr_ble::{BtleConnector, Session, SessionConfig};
//! use mcumgr_proto::catalog::Echo;
//!
//! #[tokio::main]
//! async fn main() -> Result<(), mcumgr_ble::Error> {
//!     let mut session = Session::connect(
//!         &BtleConnector,
//!         "C0:FF:EE:00:11:22",
//!         Duration::from_secs(10),
//!         SessionConfig::default(),
//!     )
//!     .await?;
//!
//!     let reply = session.call(&Echo { d: "hello".into() }).await?;
//!     println!("{}", reply.d);
//!
//!     // Upload a firmware image
//!     let image = std::fs::read("zephyr.signed.bin").unwrap();
//!     mcumgr_ble::upload(&mut session, &image, 165, |p| {
//!         println!("{}/{}", p.sent, p.total)
//!     })
//!     .await?;
//!
//!     session.disconnect().await
//! }
//! ```

mod btle;
mod error;
#[cfg(test)]
mod fake;
mod link;
mod session;
mod upload;

pub use btle::{BtleConnector, BtleLink, ScannedDevice, get_adapter, scan};
pub use error::Error;
pub use link::{Connector, Inbound, Link};
pub use session::{Session, SessionConfig, State};
pub use upload::{DEFAULT_CHUNK_SIZE, Progress, Upload, chunk_size_for_mtu, upload};
