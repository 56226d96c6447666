//! GPIO button input with async debouncing.
//!
//! Three physical buttons (active-low with internal pull-up):
//!   - TARE  - zero the scale
//!   - TIMER - start / stop the brew timer
//!   - RESET - reset the brew timer; hold to power the scale off
//!
//! Each button is handled by an async task that waits for a GPIO edge,
//! debounces it, and sends a `ButtonEvent` to the UI channel.

use defmt::info;
use embassy_futures::select::{select, Either};
use embassy_nrf::gpio::{AnyPin, Input, Pull};
use embassy_sync::blocking_mutex::raw::CriticalSectionRawMutex;
use embassy_sync::channel::Sender;
use embassy_time::{Duration, Timer};

use crate::ui::ButtonEvent;
use scale_link::config::{BUTTON_DEBOUNCE_MS, BUTTON_LONG_PRESS_MS};

pub type ButtonSender = Sender<'static, CriticalSectionRawMutex, ButtonEvent, 4>;

/// Run a single button polling loop.
///
/// Waits for the pin to go low (pressed), debounces, then reports `event`
/// on release. With `long_press` set, holding past `BUTTON_LONG_PRESS_MS`
/// reports that event instead.
pub async fn button_task(
    pin: AnyPin,
    event: ButtonEvent,
    long_press: Option<ButtonEvent>,
    tx: &ButtonSender,
) -> ! {
    let mut btn = Input::new(pin, Pull::Up);

    loop {
        // Wait for falling edge (button press, active-low).
        btn.wait_for_falling_edge().await;

        // Debounce: wait and re-check.
        Timer::after(Duration::from_millis(BUTTON_DEBOUNCE_MS)).await;
        if !btn.is_low() {
            continue;
        }

        let pressed = match long_press {
            Some(held) => {
                let hold = Timer::after(Duration::from_millis(
                    BUTTON_LONG_PRESS_MS - BUTTON_DEBOUNCE_MS,
                ));
                match select(btn.wait_for_rising_edge(), hold).await {
                    Either::First(()) => event,
                    Either::Second(()) => {
                        btn.wait_for_rising_edge().await;
                        held
                    }
                }
            }
            None => {
                btn.wait_for_rising_edge().await;
                event
            }
        };

        info!("Button: {}", pressed);
        tx.send(pressed).await;

        // Debounce the release as well.
        Timer::after(Duration::from_millis(BUTTON_DEBOUNCE_MS)).await;
    }
}
