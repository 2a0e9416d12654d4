//! btleplug backed [`Link`] and device scan.

use std::time::Duration;

use async_trait::async_trait;
use btleplug::api::{Central, Characteristic, Manager as _, Peripheral as _, ScanFilter, WriteType};
use btleplug::platform::{Adapter, Manager, Peripheral};
use futures::StreamExt;
use tokio::task::JoinHandle;
use tokio::time::Instant;
use uuid::Uuid;

use mcumgr_proto::ble::{CHARACTERISTIC_UUID, SERVICE_UUID};

use crate::link::{Connector, Inbound, Link};
use crate::Error;

const SMP_SERVICE: Uuid = Uuid::from_u128(SERVICE_UUID);
const SMP_CHARACTERISTIC: Uuid = Uuid::from_u128(CHARACTERISTIC_UUID);

/// How often the peripheral list is checked while looking for a device
const SCAN_POLL: Duration = Duration::from_millis(250);

/// A device seen during [`scan`]
#[derive(Debug, Clone)]
pub struct ScannedDevice {
    pub name: String,
    pub address: String,
    pub rssi: Option<i16>,
    /// Advertises the SMP service
    pub is_smp: bool,
}

fn connection(e: btleplug::Error) -> Error {
    Error::Connection(e.to_string())
}

/// Get the default Bluetooth adapter
pub async fn get_adapter() -> Result<Adapter, Error> {
    let manager = Manager::new().await.map_err(connection)?;
    let adapters = manager.adapters().await.map_err(connection)?;
    adapters
        .into_iter()
        .next()
        .ok_or_else(|| Error::Connection("no Bluetooth adapter found".to_string()))
}

/// Scan for BLE devices for `duration`
pub async fn scan(duration: Duration) -> Result<Vec<ScannedDevice>, Error> {
    let adapter = get_adapter().await?;

    adapter
        .start_scan(ScanFilter::default())
        .await
        .map_err(connection)?;
    tokio::time::sleep(duration).await;

    let peripherals = adapter.peripherals().await.map_err(connection)?;
    let mut devices = Vec::new();

    for peripheral in peripherals {
        if let Some(props) = peripheral.properties().await.map_err(connection)? {
            devices.push(ScannedDevice {
                name: props.local_name.unwrap_or_else(|| "Unknown".to_string()),
                address: peripheral.address().to_string(),
                rssi: props.rssi,
                is_smp: props.services.contains(&SMP_SERVICE),
            });
        }
    }

    adapter.stop_scan().await.map_err(connection)?;
    Ok(devices)
}

fn matches_address(peripheral: &Peripheral, address: &str) -> bool {
    peripheral.address().to_string().eq_ignore_ascii_case(address)
        || peripheral.id().to_string().eq_ignore_ascii_case(address)
}

/// Scan until a peripheral with `address` shows up. On macOS the platform
/// id stands in for the address.
async fn find_peripheral(
    adapter: &Adapter,
    address: &str,
    deadline: Instant,
) -> Result<Peripheral, Error> {
    adapter
        .start_scan(ScanFilter::default())
        .await
        .map_err(connection)?;

    let found = loop {
        let peripherals = adapter.peripherals().await.map_err(connection)?;
        if let Some(p) = peripherals.into_iter().find(|p| matches_address(p, address)) {
            break Some(p);
        }
        if Instant::now() + SCAN_POLL > deadline {
            break None;
        }
        tokio::time::sleep(SCAN_POLL).await;
    };

    adapter.stop_scan().await.map_err(connection)?;
    found.ok_or_else(|| Error::Connection(format!("device {address} not found")))
}

/// Connect, discover services and locate the SMP characteristic.
async fn open(peripheral: &Peripheral) -> Result<Characteristic, Error> {
    if !peripheral.is_connected().await.map_err(connection)? {
        peripheral.connect().await.map_err(connection)?;
    }
    peripheral.discover_services().await.map_err(connection)?;

    peripheral
        .characteristics()
        .into_iter()
        .find(|c| c.uuid == SMP_CHARACTERISTIC)
        .ok_or_else(|| Error::Connection("SMP characteristic not found".to_string()))
}

/// Opens [`BtleLink`]s through the first Bluetooth adapter.
///
/// btleplug does not report the negotiated MTU, so links leave
/// [`Link::mtu`] unanswered and the MTU comes from `SessionConfig::mtu`.
#[derive(Debug, Clone, Copy, Default)]
pub struct BtleConnector;

#[async_trait]
impl Connector for BtleConnector {
    type Link = BtleLink;

    async fn connect(&self, address: &str, timeout: Duration) -> Result<BtleLink, Error> {
        let deadline = Instant::now() + timeout;
        let adapter = get_adapter().await?;
        let peripheral = find_peripheral(&adapter, address, deadline).await?;

        let characteristic = match tokio::time::timeout_at(deadline, open(&peripheral)).await {
            Ok(Ok(c)) => c,
            Ok(Err(e)) => {
                let _ = peripheral.disconnect().await;
                return Err(e);
            }
            Err(_) => {
                let _ = peripheral.disconnect().await;
                return Err(Error::Connection(format!(
                    "timed out connecting to {address} after {timeout:?}"
                )));
            }
        };

        log::info!("connected to {address}");
        Ok(BtleLink {
            peripheral,
            characteristic,
            forwarder: None,
        })
    }
}

pub struct BtleLink {
    peripheral: Peripheral,
    characteristic: Characteristic,
    forwarder: Option<JoinHandle<()>>,
}

#[async_trait]
impl Link for BtleLink {
    async fn write(&mut self, data: &[u8], ack: bool) -> Result<(), Error> {
        let write_type = if ack {
            WriteType::WithResponse
        } else {
            WriteType::WithoutResponse
        };
        self.peripheral
            .write(&self.characteristic, data, write_type)
            .await
            .map_err(|e| Error::Transport(e.to_string()))
    }

    async fn subscribe(&mut self, inbound: Inbound) -> Result<(), Error> {
        let mut notifications = self.peripheral.notifications().await.map_err(connection)?;
        self.peripheral
            .subscribe(&self.characteristic)
            .await
            .map_err(connection)?;

        let uuid = self.characteristic.uuid;
        self.forwarder = Some(tokio::spawn(async move {
            while let Some(notification) = notifications.next().await {
                if notification.uuid != uuid {
                    continue;
                }
                log::debug!(
                    "RX ({}): {:02x?}",
                    notification.value.len(),
                    notification.value
                );
                if inbound.send(notification.value).is_err() {
                    break;
                }
            }
        }));

        Ok(())
    }

    async fn unsubscribe(&mut self) -> Result<(), Error> {
        if let Some(forwarder) = self.forwarder.take() {
            forwarder.abort();
        }
        self.peripheral
            .unsubscribe(&self.characteristic)
            .await
            .map_err(connection)
    }

    async fn disconnect(&mut self) -> Result<(), Error> {
        if let Some(forwarder) = self.forwarder.take() {
            forwarder.abort();
        }
        self.peripheral.disconnect().await.map_err(connection)?;
        log::info!("disconnected from {}", self.peripheral.address());
        Ok(())
    }
}
