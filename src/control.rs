//! Control tick - samples, steps the state machine, publishes commands.
//!
//! Runs once per `TICK_MS`, or early when a button event arrives so a
//! press feels immediate. Everything that decides is in `control_logic`;
//! this task only gathers readings and fans the result out:
//!
//! - the level command goes to the [`CommandCell`]
//! - cues go to the actuator task's [`Signal`]
//! - entering / leaving Off suspends / resumes the BLE link

use defmt::{info, warn};
use embassy_futures::select::{select, Either};
use embassy_sync::blocking_mutex::raw::CriticalSectionRawMutex;
use embassy_sync::channel::{Receiver, Sender};
use embassy_sync::signal::Signal;
use embassy_time::{Duration, Instant, Ticker};
use nrf_softdevice::ble::get_address;
use nrf_softdevice::{raw, Softdevice};

use crate::actuator::cell::{CommandCell, FaultCell};
use crate::actuator::Cue;
use crate::ble::link::LatestReading;
use crate::ble::LinkCommand;
use crate::config::TICK_MS;
use crate::control_logic::{ControlLoop, DeviceInfo, RawTick};
use crate::power::BatteryMonitor;
use crate::proximity::{BraceletState, ConnectionEvent, Transition};
use crate::ui::ButtonEvent;

/// The bracelet's own identity, read once at boot.
#[derive(Clone, Copy)]
pub struct Board {
    /// FICR device ID.
    pub serial: u64,
    /// Own BLE address, least-significant byte first.
    pub address: [u8; 6],
}

impl Board {
    pub fn read(sd: &Softdevice) -> Self {
        let lo = embassy_nrf::pac::FICR.deviceid(0).read() as u64;
        let hi = embassy_nrf::pac::FICR.deviceid(1).read() as u64;
        Self {
            serial: (hi << 32) | lo,
            address: get_address(sd).bytes(),
        }
    }
}

/// Die temperature (°C). TEMP belongs to the SoftDevice while it is
/// enabled, so the reading goes through it.
fn die_temperature() -> Option<f32> {
    let mut quarter_degrees: i32 = 0;
    let rc = unsafe { raw::sd_temp_get(&mut quarter_degrees) };
    (rc == raw::NRF_SUCCESS).then(|| quarter_degrees as f32 / 4.0)
}

/// Where the control task publishes its decisions.
pub struct Outputs {
    pub commands: &'static CommandCell,
    pub cues: &'static Signal<CriticalSectionRawMutex, Cue>,
    pub faults: &'static FaultCell,
    pub link_tx: Sender<'static, CriticalSectionRawMutex, LinkCommand, 2>,
}

pub async fn control_task(
    mut control: ControlLoop,
    boot: Transition,
    board: Board,
    mut battery: BatteryMonitor,
    button_rx: &Receiver<'static, CriticalSectionRawMutex, ButtonEvent, 4>,
    conn_rx: &Receiver<'static, CriticalSectionRawMutex, ConnectionEvent, 4>,
    latest: &'static LatestReading,
    out: Outputs,
) -> ! {
    info!("Bracelet booted");
    publish(&boot, &out).await;
    report(&board, &control.device_info(Instant::now().as_millis(), out.faults.load()));

    let mut ticker = Ticker::every(Duration::from_millis(TICK_MS));
    loop {
        let button = match select(ticker.next(), button_rx.receive()).await {
            Either::First(()) => button_rx.try_receive().unwrap_or_default(),
            Either::Second(event) => event,
        };

        let now = Instant::now().as_millis();
        let voltage = match battery.read_volts().await {
            Ok(v) => Some(v),
            Err(e) => {
                warn!("Battery read failed: {}", e);
                None
            }
        };
        let raw = RawTick {
            now_ms: now,
            button,
            connection: conn_rx.try_receive().ok(),
            link: latest.lock(|c| c.get()),
            voltage,
        };

        let transition = control.tick(raw);
        if transition.changed() {
            info!(
                "State: {} -> {} ({})",
                transition.from.label(),
                transition.to.label(),
                transition.trigger
            );
        }
        publish(&transition, &out).await;

        if transition.report_info {
            report(&board, &control.device_info(now, out.faults.load()));
        }
    }
}

async fn publish(t: &Transition, out: &Outputs) {
    out.commands.store(t.command);
    if let Some(cue) = t.cue {
        out.cues.signal(cue);
    }

    let was_off = t.from == BraceletState::Off;
    let is_off = t.to == BraceletState::Off;
    if is_off && !was_off {
        out.link_tx.send(LinkCommand::Suspend).await;
    } else if was_off && !is_off {
        out.link_tx.send(LinkCommand::Resume).await;
    }
}

/// Device-info report, one log line per field group.
fn report(board: &Board, info: &DeviceInfo) {
    info!("---- device info ----");
    info!("serial: {=u64:016x} address: {=[u8]:02x}", board.serial, &board.address[..]);
    match die_temperature() {
        Some(c) => info!("temperature: {} C", c),
        None => warn!("temperature: unavailable"),
    }
    info!("state: {} muted: {}", info.state.label(), info.muted);
    info!("link: {} rssi: {} mean: {}", info.connection, info.rssi, info.rssi_mean);
    info!("rssi history: {}", info.rssi_history.as_slice());
    info!(
        "measured power: {} distance: {} m (threshold {} m, rssi {})",
        info.measured_power, info.distance_m, info.threshold_m, info.threshold_rssi
    );
    info!("battery: {} V ({})", info.voltage, info.battery);
    info!("uptime: {} s", info.uptime_ms / 1_000);
    info!(
        "faults: sensor={} led={} haptic={} last sensor fault: {}",
        info.sensor_faults,
        info.actuator_faults.led,
        info.actuator_faults.haptic,
        info.last_sensor_fault
    );
}
