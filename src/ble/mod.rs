//! Bluetooth Low Energy link to the paired tag.
//!
//! The embedded [`link`] task drives the Nordic SoftDevice S140 in
//! **Central** role:
//!
//! 1. **Search** - scans for the tag's address and reads its advertised
//!    TX power, which calibrates the distance estimate.
//! 2. **Connect** - opens a connection to that address only and enables
//!    RSSI reporting on it.
//! 3. **Monitor** - publishes the connection RSSI every few hundred
//!    milliseconds and reports link up/down to the control task.
//!
//! While the bracelet is off the link is suspended: no scanning, no
//! connection.

pub mod adv_parser;
#[cfg(feature = "embedded")]
pub mod link;

/// Latest link reading published by the BLE task.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub struct LinkReading {
    /// Connection RSSI (dBm).
    pub rssi: i8,
    /// Expected RSSI at 1 m (dBm).
    pub measured_power: i8,
    /// Bumped (wrapping) for every RSSI the link task samples, so a reader
    /// can tell a fresh reading from one it has already consumed.
    pub seq: u32,
}

/// Commands the control task can send to the BLE task.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub enum LinkCommand {
    /// Drop the connection and stop searching.
    Suspend,
    /// Search for the tag again.
    Resume,
}

/// Lightweight error tag for logs (no dynamic alloc).
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub enum BleErrorTag {
    ScanFailed,
    TagNotFound,
    ConnectFailed,
}
