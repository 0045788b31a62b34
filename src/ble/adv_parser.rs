use heapless::String;

use crate::config::{BLE_SCAN_RSP_WAIT_REPORTS, TX_POWER_TO_1M_LOSS_DB};

/// AD type: Shortened Local Name.
const AD_SHORT_NAME: u8 = 0x08;
/// AD type: Complete Local Name.
const AD_COMPLETE_NAME: u8 = 0x09;
/// AD type: TX Power Level.
const AD_TX_POWER: u8 = 0x0A;

/// Walk the AD structures in raw advertisement data.
///
/// Yields `(ad_type, payload)` pairs and stops at the first zero-length or
/// truncated structure.
pub fn ad_structures<'a>(data: &'a [u8]) -> impl Iterator<Item = (u8, &'a [u8])> + 'a {
    let mut i = 0;
    core::iter::from_fn(move || {
        let len = *data.get(i)? as usize;
        if len == 0 || i + len >= data.len() {
            return None;
        }
        let ad_type = data[i + 1];
        let payload = &data[i + 2..i + 1 + len];
        i += len + 1;
        Some((ad_type, payload))
    })
}

/// Payload of the first AD structure of type `ad_type`.
pub fn find_ad(data: &[u8], ad_type: u8) -> Option<&[u8]> {
    ad_structures(data).find_map(|(t, p)| (t == ad_type).then_some(p))
}

/// Advertised TX Power Level (dBm), if present.
pub fn tx_power_level(data: &[u8]) -> Option<i8> {
    match find_ad(data, AD_TX_POWER)? {
        [level] => Some(*level as i8),
        _ => None,
    }
}

/// Expected RSSI at 1 m for a tag advertising `data`.
///
/// Derived from the TX Power Level when advertised, else `default`.
pub fn measured_power(data: &[u8], default: i8) -> i8 {
    tx_power_level(data)
        .map(|tx| tx.saturating_sub(TX_POWER_TO_1M_LOSS_DB))
        .unwrap_or(default)
}

/// Complete or shortened local name, if advertised.
pub fn local_name(data: &[u8]) -> Option<String<32>> {
    let bytes = ad_structures(data)
        .find_map(|(t, p)| matches!(t, AD_SHORT_NAME | AD_COMPLETE_NAME).then_some(p))?;
    let mut name = String::new();
    for &b in bytes {
        if name.push(b as char).is_err() {
            break;
        }
    }
    Some(name)
}

/// Extract complete/shortened local name from advertisement data.
pub fn extract_device_name(data: &[u8]) -> String<32> {
    local_name(data).unwrap_or_else(|| {
        let mut name = String::new();
        let _ = name.push_str("Unknown");
        name
    })
}

/// Where a tag's 1 m power came from.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub enum PowerSource {
    /// TX Power Level AD structure.
    Advertised,
    /// Tag advertises no TX power; configured default.
    Default,
}

/// What the search learned about the tag.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct TagProfile {
    pub measured_power: i8,
    pub source: PowerSource,
    pub name: String<32>,
}

/// Folds the target's advertising reports until its TX power is settled.
///
/// The TX Power Level often rides only in the scan response, so a primary
/// advertisement without it is not conclusive. The search settles on the
/// first report carrying the level, on a scan response without it, or
/// after `BLE_SCAN_RSP_WAIT_REPORTS` primaries from a tag that never
/// answers scan requests.
#[derive(Clone, Debug)]
pub struct TagSearch {
    default_measured_power: i8,
    name: Option<String<32>>,
    primaries: u8,
}

impl TagSearch {
    pub fn new(default_measured_power: i8) -> Self {
        Self {
            default_measured_power,
            name: None,
            primaries: 0,
        }
    }

    /// Feed one report from the target; `Some` once the profile is known.
    pub fn observe(&mut self, data: &[u8], scan_response: bool) -> Option<TagProfile> {
        if let Some(name) = local_name(data) {
            self.name = Some(name);
        }

        if tx_power_level(data).is_some() {
            let power = measured_power(data, self.default_measured_power);
            return Some(self.profile(power, PowerSource::Advertised));
        }

        if !scan_response {
            self.primaries = self.primaries.saturating_add(1);
        }
        if scan_response || self.primaries >= BLE_SCAN_RSP_WAIT_REPORTS {
            return Some(self.profile(self.default_measured_power, PowerSource::Default));
        }
        None
    }

    fn profile(&mut self, measured_power: i8, source: PowerSource) -> TagProfile {
        TagProfile {
            measured_power,
            source,
            name: self.name.take().unwrap_or_else(|| extract_device_name(&[])),
        }
    }
}

// ═══════════════════════════════════════════════════════════════════════════
// Unit Tests (run on host, not embedded)
// ═══════════════════════════════════════════════════════════════════════════
