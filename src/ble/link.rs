//! BLE link task - finds the tag, holds the connection, samples RSSI.

use core::cell::Cell;

use defmt::{info, warn};
use embassy_futures::select::{select, Either};
use embassy_sync::blocking_mutex::raw::CriticalSectionRawMutex;
use embassy_sync::blocking_mutex::Mutex;
use embassy_sync::channel::{Receiver, Sender};
use embassy_time::{Duration, Ticker, Timer};
use nrf_softdevice::ble::{central, Address, AddressType};
use nrf_softdevice::raw;
use nrf_softdevice::Softdevice;

use crate::ble::adv_parser::{TagProfile, TagSearch};
use crate::ble::{BleErrorTag, LinkCommand, LinkReading};
use crate::config;
use crate::proximity::ConnectionEvent;

/// Most recent reading; `None` while disconnected.
pub type LatestReading = Mutex<CriticalSectionRawMutex, Cell<Option<LinkReading>>>;

pub async fn link_task(
    sd: &'static Softdevice,
    default_measured_power: i8,
    cmd_rx: &Receiver<'static, CriticalSectionRawMutex, LinkCommand, 2>,
    event_tx: &Sender<'static, CriticalSectionRawMutex, ConnectionEvent, 4>,
    latest: &'static LatestReading,
) -> ! {
    let target = Address::new(AddressType::RandomStatic, config::PERIPHERAL_ADDRESS);
    let mut suspended = false;
    let mut seq = 0u32;

    loop {
        if suspended {
            if cmd_rx.receive().await == LinkCommand::Resume {
                info!("BLE link resumed");
                suspended = false;
            }
            continue;
        }

        let session = run_session(sd, &target, default_measured_power, &mut seq, event_tx, latest);
        match select(cmd_rx.receive(), session).await {
            Either::First(LinkCommand::Suspend) => {
                info!("BLE link suspended");
                suspended = true;
                // Dropping the session closes any open connection.
                latest.lock(|c| c.set(None));
                event_tx.send(ConnectionEvent::Lost).await;
            }
            Either::First(LinkCommand::Resume) => {}
            Either::Second(Ok(())) => {}
            Either::Second(Err(tag)) => {
                warn!("BLE session ended: {}", tag);
                Timer::after(Duration::from_millis(config::BLE_RETRY_MS)).await;
            }
        }
    }
}

/// Search, connect and monitor until the link drops.
async fn run_session(
    sd: &'static Softdevice,
    target: &Address,
    default_measured_power: i8,
    seq: &mut u32,
    event_tx: &Sender<'static, CriticalSectionRawMutex, ConnectionEvent, 4>,
    latest: &LatestReading,
) -> Result<(), BleErrorTag> {
    let tag = search(sd, target, default_measured_power).await?;
    let measured_power = tag.measured_power;

    let whitelist = [target];
    let conn_cfg = central::ConnectConfig {
        scan_config: central::ScanConfig {
            whitelist: Some(&whitelist),
            ..Default::default()
        },
        conn_params: raw::ble_gap_conn_params_t {
            min_conn_interval: config::BLE_CONN_INTERVAL_MIN,
            max_conn_interval: config::BLE_CONN_INTERVAL_MAX,
            slave_latency: config::BLE_SLAVE_LATENCY,
            conn_sup_timeout: config::BLE_SUP_TIMEOUT,
        },
        ..Default::default()
    };

    let conn = central::connect(sd, &conn_cfg)
        .await
        .map_err(|_| BleErrorTag::ConnectFailed)?;
    conn.start_rssi();
    info!("tag \"{}\" connected", tag.name.as_str());
    event_tx.send(ConnectionEvent::Established).await;

    let mut ticker = Ticker::every(Duration::from_millis(config::BLE_RSSI_POLL_MS));
    while conn.is_connected() {
        if let Some(rssi) = conn.rssi() {
            *seq = seq.wrapping_add(1);
            let reading = LinkReading {
                rssi,
                measured_power,
                seq: *seq,
            };
            latest.lock(|c| c.set(Some(reading)));
        }
        ticker.next().await;
    }

    latest.lock(|c| c.set(None));
    event_tx.send(ConnectionEvent::Lost).await;
    info!("tag link lost");
    Ok(())
}

/// Wait for the target's advertising (and scan response) and derive its
/// 1 m power.
async fn search(
    sd: &Softdevice,
    target: &Address,
    default_measured_power: i8,
) -> Result<TagProfile, BleErrorTag> {
    let scan_cfg = central::ScanConfig {
        // Active scan to retrieve scan-response data (TX power may live there).
        active: true,
        // 10 ms units.
        timeout: (config::BLE_SCAN_TIMEOUT_SECS * 100) as u16,
        ..Default::default()
    };

    let mut tag = TagSearch::new(default_measured_power);
    let profile = central::scan(sd, &scan_cfg, |params| {
        if Address::from_raw(params.peer_addr).bytes() != target.bytes() {
            return None;
        }
        let data =
            unsafe { core::slice::from_raw_parts(params.data.p_data, params.data.len as usize) };
        tag.observe(data, params.type_.scan_response() != 0)
    })
    .await
    .map_err(|e| match e {
        central::ScanError::Timeout => BleErrorTag::TagNotFound,
        _ => BleErrorTag::ScanFailed,
    })?;

    info!(
        "tag \"{}\" found, measured power {} dBm ({})",
        profile.name.as_str(),
        profile.measured_power,
        profile.source
    );
    Ok(profile)
}
