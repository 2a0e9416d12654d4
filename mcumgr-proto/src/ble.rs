//! BLE GATT identifiers of the SMP service
//!
//! A single characteristic carries both directions: requests are written to
//! it (with response) and responses come back as notifications on it.

/// SMP Service UUID: 8d53dc1d-1db7-4cd3-868b-8a527460aa84
pub const SERVICE_UUID: u128 = 0x8d53dc1d_1db7_4cd3_868b_8a527460aa84;

/// SMP Characteristic UUID (write with response, notify)
pub const CHARACTERISTIC_UUID: u128 = 0xda2e7828_fbce_4e01_ae9e_261174997c48;

/// ATT overhead on every write and notification
pub const ATT_HEADER_LEN: usize = 3;
