//! scale-link firmware - nRF52840 BLE central for the Decent Scale.
//!
//! Tasks:
//! - `softdevice_task` - runs the S140 event loop
//! - `ble_task`        - owns the scale link and binds it to the SoftDevice
//! - `display_task`    - redraws weight, timer and status every 100 ms
//! - `timer_task`      - advances the brew timer once per second
//! - `button_task` ×3  - debounced TARE / TIMER / RESET inputs
//! - `ui_task`         - turns button presses into scale commands

#![no_std]
#![no_main]

mod driver;
mod ui;

use core::cell::RefCell;

use defmt::{info, unwrap, warn};
use defmt_rtt as _;
use embassy_executor::Spawner;
use embassy_nrf::gpio::{AnyPin, Pin};
use embassy_nrf::interrupt::{self, InterruptExt, Priority};
use embassy_nrf::peripherals::TWISPI0;
use embassy_nrf::twim::{self, Twim};
use embassy_nrf::{bind_interrupts, peripherals};
use embassy_sync::blocking_mutex::raw::CriticalSectionRawMutex;
use embassy_sync::blocking_mutex::Mutex;
use embassy_sync::channel::Channel;
use embassy_time::{Duration, Ticker};
use nrf_softdevice::{raw, Softdevice};
use panic_probe as _;
use static_cell::StaticCell;

use scale_link::config::{BLE_ATT_MTU, LINK_REQUEST_DEPTH, TIMER_TICK_MS, WEIGHT_POLL_INTERVAL_MS};
use scale_link::timer::BrewTimer;
use scale_link::{Grams, LinkRequest, ScaleClient, ScaleLink, ScaleState};

use ui::display::{self, Display};
use ui::{ButtonEvent, Client, SharedTimer};

bind_interrupts!(struct Irqs {
    SPIM0_SPIS0_TWIM0_TWIS0_SPI0_TWI0 => twim::InterruptHandler<peripherals::TWISPI0>;
});

// Shared state

static SCALE_STATE: ScaleState<CriticalSectionRawMutex> = ScaleState::new();

static LINK_REQUESTS: Channel<CriticalSectionRawMutex, LinkRequest, LINK_REQUEST_DEPTH> =
    Channel::new();

static BUTTON_EVENTS: Channel<CriticalSectionRawMutex, ButtonEvent, 4> = Channel::new();

static BREW_TIMER: SharedTimer = Mutex::new(RefCell::new(BrewTimer::new()));

fn client() -> Client {
    ScaleClient::new(&SCALE_STATE, LINK_REQUESTS.sender())
}

fn softdevice_config() -> nrf_softdevice::Config {
    nrf_softdevice::Config {
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
        conn_gatt: Some(raw::ble_gatt_conn_cfg_t {
            att_mtu: BLE_ATT_MTU,
        }),
        gap_role_count: Some(raw::ble_gap_cfg_role_count_t {
            adv_set_count: 0,
            periph_role_count: 0,
            central_role_count: 1,
            central_sec_count: 0,
            _bitfield_1: raw::ble_gap_cfg_role_count_t::new_bitfield_1(0),
        }),
        ..Default::default()
    }
}

// Tasks

#[embassy_executor::task]
async fn softdevice_task(sd: &'static Softdevice) -> ! {
    sd.run().await
}

#[embassy_executor::task]
async fn ble_task(sd: &'static Softdevice) -> ! {
    static LINK: StaticCell<ScaleLink<'static, CriticalSectionRawMutex>> = StaticCell::new();
    let link = LINK.init(ScaleLink::new(&SCALE_STATE));
    driver::ble_task(sd, link, LINK_REQUESTS.receiver()).await
}

#[embassy_executor::task]
async fn display_task(mut display: Display<Twim<'static, TWISPI0>>) -> ! {
    let mut ticker = Ticker::every(Duration::from_millis(WEIGHT_POLL_INTERVAL_MS));
    loop {
        let seconds = BREW_TIMER.lock(|t| t.borrow().seconds());
        let weight = Grams(SCALE_STATE.get_weight());
        if let Err(e) = display::draw_scale(&mut display, SCALE_STATE.is_ready(), weight, seconds) {
            warn!("display update failed: {}", e);
        }
        ticker.next().await;
    }
}

#[embassy_executor::task]
async fn timer_task() -> ! {
    let mut ticker = Ticker::every(Duration::from_millis(TIMER_TICK_MS));
    loop {
        ticker.next().await;
        BREW_TIMER.lock(|t| t.borrow_mut().tick(SCALE_STATE.is_ready()));
    }
}

#[embassy_executor::task(pool_size = 3)]
async fn button_task(pin: AnyPin, event: ButtonEvent, long_press: Option<ButtonEvent>) -> ! {
    ui::buttons::button_task(pin, event, long_press, &BUTTON_EVENTS.sender()).await
}

#[embassy_executor::task]
async fn ui_task() -> ! {
    let client = client();
    loop {
        let event = BUTTON_EVENTS.receive().await;
        ui::handle_button(event, &client, &BREW_TIMER);
    }
}

#[embassy_executor::main]
async fn main(spawner: Spawner) {
    info!("scale-link starting");

    // The SoftDevice reserves interrupt priorities 0, 1 and 4.
    let mut config = embassy_nrf::config::Config::default();
    config.gpiote_interrupt_priority = Priority::P2;
    config.time_interrupt_priority = Priority::P2;
    let p = embassy_nrf::init(config);
    interrupt::SPIM0_SPIS0_TWIM0_TWIS0_SPI0_TWI0.set_priority(Priority::P3);

    let sd: &'static Softdevice = Softdevice::enable(&softdevice_config());
    unwrap!(spawner.spawn(softdevice_task(sd)));
    unwrap!(spawner.spawn(ble_task(sd)));

    let i2c = Twim::new(p.TWISPI0, Irqs, p.P0_26, p.P0_27, twim::Config::default());
    match display::init(i2c) {
        Ok(display) => unwrap!(spawner.spawn(display_task(display))),
        Err(e) => warn!("display unavailable: {}", e),
    }

    unwrap!(spawner.spawn(timer_task()));
    unwrap!(spawner.spawn(ui_task()));
    unwrap!(spawner.spawn(button_task(p.P0_11.degrade(), ButtonEvent::Tare, None)));
    unwrap!(spawner.spawn(button_task(p.P0_12.degrade(), ButtonEvent::Timer, None)));
    unwrap!(spawner.spawn(button_task(
        p.P0_24.degrade(),
        ButtonEvent::Reset,
        Some(ButtonEvent::PowerOff),
    )));

    // Scan right away; the link reconnects on its own after this.
    client().connect();
}
