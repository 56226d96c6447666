//! Decent Scale application layer.
//!
//! - **protocol** - command frame builder and notification decoder.
//! - **measurement** - last weight sample shared between the radio
//!   context and the display/polling context.
//! - **client** - the consumer-facing handle used by buttons and
//!   periodic tasks.

pub mod client;
pub mod measurement;
pub mod protocol;

use protocol::CommandFrame;

/// Display unit selected on the scale's LED.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub enum Unit {
    #[default]
    Gram,
    Ounce,
}

/// Commands the scale accepts over the write characteristic.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub enum ScaleCommand {
    Tare,
    LedOn(Unit),
    LedOff,
    PowerOff,
    TimerOn,
    TimerOff,
    TimerReset,
}

impl ScaleCommand {
    /// Wire frame for this command.
    pub const fn frame(self) -> CommandFrame {
        match self {
            ScaleCommand::Tare => protocol::TARE,
            ScaleCommand::LedOn(Unit::Gram) => protocol::LED_ON_GRAM,
            ScaleCommand::LedOn(Unit::Ounce) => protocol::LED_ON_OUNCE,
            ScaleCommand::LedOff => protocol::LED_OFF,
            ScaleCommand::PowerOff => protocol::POWER_OFF,
            ScaleCommand::TimerOn => protocol::TIMER_ON,
            ScaleCommand::TimerOff => protocol::TIMER_OFF,
            ScaleCommand::TimerReset => protocol::TIMER_RESET,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn commands_map_to_their_frames() {
        assert_eq!(ScaleCommand::Tare.frame().opcode(), protocol::opcode::TARE);
        assert_eq!(ScaleCommand::LedOn(Unit::Gram).frame(), protocol::LED_ON_GRAM);
        assert_eq!(ScaleCommand::LedOn(Unit::Ounce).frame(), protocol::LED_ON_OUNCE);
        assert_eq!(ScaleCommand::PowerOff.frame().checksum(), 0x0B);
        assert_eq!(ScaleCommand::TimerReset.frame().checksum(), 0x0A);
    }

    #[test]
    fn led_off_and_tare_share_payload_but_not_opcode() {
        let led_off = ScaleCommand::LedOff.frame();
        let tare = ScaleCommand::Tare.frame();
        assert_eq!(led_off.as_bytes()[2..6], tare.as_bytes()[2..6]);
        assert_ne!(led_off.opcode(), tare.opcode());
    }
}
