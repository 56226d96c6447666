//! Application-wide constants and compile-time configuration.
//!
//! All hardware pin assignments, timing parameters, and protocol
//! constants live here so they can be tuned in one place.

// Scale link

/// Exact advertised local name of the target scale.
pub const TARGET_DEVICE_NAME: &str = "Decent Scale";

/// Delay between the writes of the priming sequence (ms).
///
/// The scale drops commands that arrive back to back right after
/// subscription.
pub const PRIMING_STEP_DELAY_MS: u32 = 100;

/// Upper bound on any single step between `Connecting` and `Ready` (ms).
pub const DISCOVERY_STEP_TIMEOUT_MS: u32 = 5_000;

/// Interval at which the display task samples the last weight (ms).
pub const WEIGHT_POLL_INTERVAL_MS: u64 = 100;

/// Brew timer resolution (ms).
pub const TIMER_TICK_MS: u64 = 1_000;

/// Depth of the consumer → radio request channel.
pub const LINK_REQUEST_DEPTH: usize = 4;

// BLE

/// ATT MTU requested from the scale.
pub const BLE_ATT_MTU: u16 = 247;

/// Timeout for a single connection attempt (10 ms units). 300 = 3 s.
pub const BLE_CONNECT_TIMEOUT: u16 = 300;

/// BLE connection interval range (in 1.25 ms units).
/// 24..40 = 30..50 ms, plenty for a 10 Hz weight stream.
pub const BLE_CONN_INTERVAL_MIN: u16 = 24;
pub const BLE_CONN_INTERVAL_MAX: u16 = 40;

/// BLE slave latency (number of connection events the peripheral can skip).
pub const BLE_SLAVE_LATENCY: u16 = 0;

/// BLE supervision timeout (in 10 ms units). 400 = 4 s.
pub const BLE_SUP_TIMEOUT: u16 = 400;

// GPIO pin assignments (nRF52840-DK defaults)
//
// These are logical names; actual `embassy_nrf::peripherals::*` types are
// selected in `main.rs`.  Adjust for your custom PCB.
//
//   Button TARE    → P0.11
//   Button TIMER   → P0.12
//   Button RESET   → P0.24
//   I²C SDA        → P0.26
//   I²C SCL        → P0.27

/// Button debounce time (ms).
pub const BUTTON_DEBOUNCE_MS: u64 = 50;

/// Hold time on RESET that powers the scale off instead (ms).
pub const BUTTON_LONG_PRESS_MS: u64 = 1_500;
