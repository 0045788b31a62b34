//! tetherband firmware entry point (nRF52840 + SoftDevice S140).
//!
//! Task layout:
//!
//! ```text
//!   softdevice  - SoftDevice event pump
//!   link        - scan / connect / RSSI  ──ConnectionEvent──▶ ┐
//!   button      - debounced action button ──ButtonEvent─────▶ ├ control (1 s)
//!   battery     - SAADC, read inline by the control tick       ┘    │
//!                                                  CommandCell + cue ▼
//!   actuator    - LED blink / haptic pulse frames (20 ms) ◀──────────┘
//! ```

#![no_std]
#![no_main]

use core::cell::Cell;

use defmt::{error, info, warn};
use embassy_executor::Spawner;
use embassy_nrf::gpio::{AnyPin, Level, Output, OutputDrive, Pin as _};
use embassy_nrf::interrupt::{self, InterruptExt, Priority};
use embassy_nrf::saadc::{self, Saadc};
use embassy_nrf::twim::{self, Twim};
use embassy_nrf::{bind_interrupts, peripherals};
use embassy_sync::blocking_mutex::raw::CriticalSectionRawMutex;
use embassy_sync::blocking_mutex::Mutex;
use embassy_sync::channel::Channel;
use embassy_sync::signal::Signal;
use embassy_time::Instant;
use nrf_softdevice::{raw, Softdevice};
use {defmt_rtt as _, panic_probe as _};

use tetherband::actuator::cell::{CommandCell, FaultCell};
use tetherband::actuator::drv2605::Drv2605;
use tetherband::actuator::led::RgbLed;
use tetherband::actuator::{ActuatorDriver, Cue};
use tetherband::ble::link::LatestReading;
use tetherband::ble::LinkCommand;
use tetherband::config::{Config, DRV2605_ADDRESS};
use tetherband::control::{Board, Outputs};
use tetherband::power::BatteryMonitor;
use tetherband::proximity::{ConnectionEvent, Transition};
use tetherband::ui::ButtonEvent;
use tetherband::ControlLoop;

bind_interrupts!(struct Irqs {
    SAADC => saadc::InterruptHandler;
    SPIM0_SPIS0_TWIM0_TWIS0_SPI0_TWI0 => twim::InterruptHandler<peripherals::TWISPI0>;
});

// ═══════════════════════════════════════════════════════════════════════════
// Inter-task plumbing
// ═══════════════════════════════════════════════════════════════════════════

static BUTTON_EVENTS: Channel<CriticalSectionRawMutex, ButtonEvent, 4> = Channel::new();
static CONNECTION_EVENTS: Channel<CriticalSectionRawMutex, ConnectionEvent, 4> = Channel::new();
static LINK_COMMANDS: Channel<CriticalSectionRawMutex, LinkCommand, 2> = Channel::new();
static LATEST_READING: LatestReading = Mutex::new(Cell::new(None));
static COMMANDS: CommandCell = CommandCell::new();
static FAULTS: FaultCell = FaultCell::new();
static CUES: Signal<CriticalSectionRawMutex, Cue> = Signal::new();

type Led = RgbLed<Output<'static>, Output<'static>, Output<'static>>;
type Haptic = Drv2605<Twim<'static, peripherals::TWISPI0>>;

// ═══════════════════════════════════════════════════════════════════════════
// Tasks
// ═══════════════════════════════════════════════════════════════════════════

#[embassy_executor::task]
async fn softdevice_task(sd: &'static Softdevice) -> ! {
    sd.run().await
}

#[embassy_executor::task]
async fn link_task(sd: &'static Softdevice, default_measured_power: i8) -> ! {
    tetherband::ble::link::link_task(
        sd,
        default_measured_power,
        &LINK_COMMANDS.receiver(),
        &CONNECTION_EVENTS.sender(),
        &LATEST_READING,
    )
    .await
}

#[embassy_executor::task]
async fn button_task(pin: AnyPin) -> ! {
    tetherband::ui::buttons::button_task(pin, &BUTTON_EVENTS.sender()).await
}

#[embassy_executor::task]
async fn control_task(
    control: ControlLoop,
    boot: Transition,
    board: Board,
    battery: BatteryMonitor,
) -> ! {
    let outputs = Outputs {
        commands: &COMMANDS,
        cues: &CUES,
        faults: &FAULTS,
        link_tx: LINK_COMMANDS.sender(),
    };
    tetherband::control::control_task(
        control,
        boot,
        board,
        battery,
        &BUTTON_EVENTS.receiver(),
        &CONNECTION_EVENTS.receiver(),
        &LATEST_READING,
        outputs,
    )
    .await
}

#[embassy_executor::task]
async fn actuator_task(driver: ActuatorDriver<Led, Haptic>) -> ! {
    tetherband::actuator::task::actuator_task(driver, &COMMANDS, &CUES, &FAULTS).await
}

// ═══════════════════════════════════════════════════════════════════════════
// Entry
// ═══════════════════════════════════════════════════════════════════════════

#[embassy_executor::main]
async fn main(spawner: Spawner) {
    info!("tetherband starting");

    // Priorities 0, 1 and 4 belong to the SoftDevice.
    let mut nrf_config = embassy_nrf::config::Config::default();
    nrf_config.gpiote_interrupt_priority = Priority::P2;
    nrf_config.time_interrupt_priority = Priority::P2;
    let p = embassy_nrf::init(nrf_config);
    interrupt::SAADC.set_priority(Priority::P3);
    interrupt::SPIM0_SPIS0_TWIM0_TWIS0_SPI0_TWI0.set_priority(Priority::P3);

    let config = Config::DEFAULT;
    let (control, boot) = match ControlLoop::new(config, Instant::now().as_millis()) {
        Ok(booted) => booted,
        Err(e) => {
            error!("Invalid configuration, not starting: {}", e);
            return;
        }
    };

    let sd_config = nrf_softdevice::Config {
        clock: Some(raw::nrf_clock_lf_cfg_t {
            source: raw::NRF_CLOCK_LF_SRC_RC as u8,
            rc_ctiv: 16,
            rc_temp_ctiv: 2,
            accuracy: raw::NRF_CLOCK_LF_ACCURACY_500_PPM as u8,
        }),
        conn_gap: Some(raw::ble_gap_conn_cfg_t {
            conn_count: 1,
            event_length: 24,
        }),
        gap_role_count: Some(raw::ble_gap_cfg_role_count_t {
            adv_set_count: 1,
            periph_role_count: 0,
            central_role_count: 1,
            central_sec_count: 0,
            _bitfield_1: raw::ble_gap_cfg_role_count_t::new_bitfield_1(0),
        }),
        ..Default::default()
    };
    let sd: &'static Softdevice = Softdevice::enable(&sd_config);
    spawner.must_spawn(softdevice_task(sd));
    let board = Board::read(sd);
    info!("serial {=u64:016x}", board.serial);

    // Haptic driver. A missing chip is not fatal: its writes fail and are
    // counted while the LED keeps working.
    let twim = Twim::new(p.TWISPI0, Irqs, p.P0_12, p.P0_11, twim::Config::default());
    let mut haptic = Drv2605::new(twim, DRV2605_ADDRESS);
    match haptic.init() {
        Ok(status) => info!("DRV2605 ready (status {=u8:#x})", status),
        Err(e) => warn!("DRV2605 init failed: {}", e),
    }

    // Common-anode LED: High is dark.
    let led = RgbLed::new(
        Output::new(p.P0_13, Level::High, OutputDrive::Standard),
        Output::new(p.P0_14, Level::High, OutputDrive::Standard),
        Output::new(p.P0_15, Level::High, OutputDrive::Standard),
        true,
    );

    let adc = Saadc::new(
        p.SAADC,
        Irqs,
        saadc::Config::default(),
        [saadc::ChannelConfig::single_ended(p.P0_29)],
    );
    let battery = BatteryMonitor::new(adc).await;

    spawner.must_spawn(actuator_task(ActuatorDriver::new(led, haptic)));
    spawner.must_spawn(control_task(control, boot, board, battery));
    spawner.must_spawn(button_task(p.P1_02.degrade()));
    spawner.must_spawn(link_task(sd, config.default_measured_power));
}
