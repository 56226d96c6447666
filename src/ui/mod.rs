//! User interface subsystem - OLED display + physical buttons.
//!
//! The UI is a thin shell over the scale client: it renders the last
//! weight, the brew timer and the link status, and maps button presses
//! onto scale commands.
//!
//! ## Components
//!
//! - **Display**: SSD1306 128×64 OLED via I²C
//! - **Buttons**: 3 tactile switches with debouncing (TARE, TIMER, RESET)

pub mod buttons;
pub mod display;

use core::cell::RefCell;

use defmt::{info, Format};
use embassy_sync::blocking_mutex::raw::CriticalSectionRawMutex;
use embassy_sync::blocking_mutex::Mutex;

use scale_link::config::LINK_REQUEST_DEPTH;
use scale_link::timer::BrewTimer;
use scale_link::ScaleClient;

pub type Client = ScaleClient<'static, CriticalSectionRawMutex, LINK_REQUEST_DEPTH>;
pub type SharedTimer = Mutex<CriticalSectionRawMutex, RefCell<BrewTimer>>;

/// Physical button events (after debouncing).
#[derive(Clone, Copy, PartialEq, Eq, Format)]
pub enum ButtonEvent {
    Tare,
    /// Start or stop the brew timer.
    Timer,
    /// Zero the brew timer (only while stopped).
    Reset,
    /// RESET held past the long-press threshold.
    PowerOff,
}

/// Apply a button press to the scale and the brew timer.
pub fn handle_button(event: ButtonEvent, client: &Client, timer: &SharedTimer) {
    match event {
        ButtonEvent::Tare => client.tare(),
        ButtonEvent::Timer => {
            if !client.is_ready() {
                info!("Timer ignored, scale not ready");
                return;
            }
            let cmd = timer.lock(|t| t.borrow_mut().start_stop());
            client.command(cmd);
        }
        ButtonEvent::Reset => {
            if let Some(cmds) = timer.lock(|t| t.borrow_mut().reset()) {
                for cmd in cmds {
                    client.command(cmd);
                }
            }
        }
        ButtonEvent::PowerOff => client.power_off(),
    }
}
