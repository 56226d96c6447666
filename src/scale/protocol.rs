//! Decent Scale wire protocol - command frames and weight notifications.
//!
//! Command frame layout (7 bytes, written with response):
//! ```text
//! Byte 0:   Protocol id (always 0x03)
//! Byte 1:   Opcode
//! Byte 2-5: Payload (unused bytes are 0x00)
//! Byte 6:   Checksum = XOR of bytes 0..=5
//! ```
//!
//! Notification layout (variable length, at least 4 bytes to be useful):
//! ```text
//! Byte 0:   Protocol id
//! Byte 1:   Frame kind - 0xAA marks a button/timer echo, anything else is weight
//! Byte 2-3: Weight in tenths of a gram, signed big-endian
//! ```

/// Command frame size in bytes.
pub const COMMAND_FRAME_SIZE: usize = 7;

/// First byte of every frame.
pub const PROTOCOL_ID: u8 = 0x03;

/// Frame-kind byte of notifications that do not carry a weight.
pub const NON_WEIGHT_MARKER: u8 = 0xAA;

/// Opcodes understood by the scale.
pub mod opcode {
    pub const TARE: u8 = 0x0F;
    pub const LED: u8 = 0x0A;
    pub const TIMER: u8 = 0x0B;
}

/// Fixed payloads for each supported command.
pub mod payload {
    pub const TARE: [u8; 4] = [0x00, 0x00, 0x00, 0x00];
    pub const LED_ON_GRAM: [u8; 4] = [0x01, 0x01, 0x00, 0x00];
    pub const LED_ON_OUNCE: [u8; 4] = [0x01, 0x01, 0x01, 0x00];
    pub const LED_OFF: [u8; 4] = [0x00, 0x00, 0x00, 0x00];
    pub const POWER_OFF: [u8; 4] = [0x02, 0x00, 0x00, 0x00];
    pub const TIMER_ON: [u8; 4] = [0x03, 0x00, 0x00, 0x00];
    pub const TIMER_OFF: [u8; 4] = [0x00, 0x00, 0x00, 0x00];
    pub const TIMER_RESET: [u8; 4] = [0x02, 0x00, 0x00, 0x00];
}

/// An immutable, checksummed command frame.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub struct CommandFrame([u8; COMMAND_FRAME_SIZE]);

impl CommandFrame {
    /// Raw bytes as written to the write characteristic.
    pub const fn as_bytes(&self) -> &[u8; COMMAND_FRAME_SIZE] {
        &self.0
    }

    pub const fn opcode(&self) -> u8 {
        self.0[1]
    }

    pub const fn checksum(&self) -> u8 {
        self.0[COMMAND_FRAME_SIZE - 1]
    }
}

impl AsRef<[u8]> for CommandFrame {
    fn as_ref(&self) -> &[u8] {
        &self.0
    }
}

/// XOR of every byte in `bytes`.
pub const fn xor_checksum(bytes: &[u8]) -> u8 {
    let mut acc = 0u8;
    let mut i = 0;
    while i < bytes.len() {
        acc ^= bytes[i];
        i += 1;
    }
    acc
}

/// Build a command frame for `opcode` with a 4-byte payload.
pub const fn build_command(opcode: u8, payload: [u8; 4]) -> CommandFrame {
    let mut frame = [
        PROTOCOL_ID,
        opcode,
        payload[0],
        payload[1],
        payload[2],
        payload[3],
        0,
    ];
    let (body, _) = frame.split_at(COMMAND_FRAME_SIZE - 1);
    let checksum = xor_checksum(body);
    frame[COMMAND_FRAME_SIZE - 1] = checksum;
    CommandFrame(frame)
}

/// Extract the weight (tenths of a gram) from a notification.
///
/// Returns `None` for frames of 3 bytes or fewer and for non-weight frames.
pub fn decode_notification(data: &[u8]) -> Option<i16> {
    if data.len() <= 3 || data[1] == NON_WEIGHT_MARKER {
        return None;
    }
    Some(i16::from_be_bytes([data[2], data[3]]))
}

pub const TARE: CommandFrame = build_command(opcode::TARE, payload::TARE);
pub const LED_ON_GRAM: CommandFrame = build_command(opcode::LED, payload::LED_ON_GRAM);
pub const LED_ON_OUNCE: CommandFrame = build_command(opcode::LED, payload::LED_ON_OUNCE);
pub const LED_OFF: CommandFrame = build_command(opcode::LED, payload::LED_OFF);
pub const POWER_OFF: CommandFrame = build_command(opcode::LED, payload::POWER_OFF);
pub const TIMER_ON: CommandFrame = build_command(opcode::TIMER, payload::TIMER_ON);
pub const TIMER_OFF: CommandFrame = build_command(opcode::TIMER, payload::TIMER_OFF);
pub const TIMER_RESET: CommandFrame = build_command(opcode::TIMER, payload::TIMER_RESET);

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn command_frames_match_wire_table() {
        assert_eq!(TARE.as_bytes(), &[0x03, 0x0F, 0x00, 0x00, 0x00, 0x00, 0x0C]);
        assert_eq!(LED_ON_GRAM.as_bytes(), &[0x03, 0x0A, 0x01, 0x01, 0x00, 0x00, 0x09]);
        assert_eq!(LED_ON_OUNCE.as_bytes(), &[0x03, 0x0A, 0x01, 0x01, 0x01, 0x00, 0x08]);
        assert_eq!(LED_OFF.as_bytes(), &[0x03, 0x0A, 0x00, 0x00, 0x00, 0x00, 0x09]);
        assert_eq!(POWER_OFF.as_bytes(), &[0x03, 0x0A, 0x02, 0x00, 0x00, 0x00, 0x0B]);
        assert_eq!(TIMER_ON.as_bytes(), &[0x03, 0x0B, 0x03, 0x00, 0x00, 0x00, 0x0B]);
        assert_eq!(TIMER_OFF.as_bytes(), &[0x03, 0x0B, 0x00, 0x00, 0x00, 0x00, 0x08]);
        assert_eq!(TIMER_RESET.as_bytes(), &[0x03, 0x0B, 0x02, 0x00, 0x00, 0x00, 0x0A]);
    }

    #[test]
    fn checksum_is_xor_of_first_six_bytes() {
        for frame in [
            TARE,
            LED_ON_GRAM,
            LED_ON_OUNCE,
            LED_OFF,
            POWER_OFF,
            TIMER_ON,
            TIMER_OFF,
            TIMER_RESET,
        ] {
            let bytes = frame.as_bytes();
            assert_eq!(frame.checksum(), xor_checksum(&bytes[..6]));
            assert_eq!(bytes[0], PROTOCOL_ID);
        }
    }

    #[test]
    fn build_command_is_deterministic() {
        let a = build_command(0x42, [1, 2, 3, 4]);
        let b = build_command(0x42, [1, 2, 3, 4]);
        assert_eq!(a, b);
        assert_eq!(a.opcode(), 0x42);
        assert_eq!(a.checksum(), 0x03 ^ 0x42 ^ 1 ^ 2 ^ 3 ^ 4);
    }

    #[test]
    fn built_checksum_matches_xor_of_body() {
        for (opcode, payload) in [(0x0F, [0, 0, 0, 0]), (0xFF, [0xFF, 0x00, 0x80, 0x7F])] {
            let frame = build_command(opcode, payload);
            let bytes = frame.as_bytes();
            assert_eq!(frame.checksum(), xor_checksum(&bytes[..COMMAND_FRAME_SIZE - 1]));
        }
    }

    #[test]
    fn decode_positive_weight() {
        assert_eq!(decode_notification(&[0x03, 0x00, 0x00, 0x64]), Some(100));
    }

    #[test]
    fn decode_negative_weight() {
        assert_eq!(decode_notification(&[0x03, 0x00, 0xFF, 0x9C]), Some(-100));
    }

    #[test]
    fn decode_full_length_weight_frame() {
        // Real frames carry a timestamp and XOR byte after the weight.
        let data = [0x03, 0xCE, 0x01, 0xF4, 0x00, 0x00, 0x38];
        assert_eq!(decode_notification(&data), Some(500));
    }

    #[test]
    fn non_weight_frames_are_ignored() {
        assert_eq!(decode_notification(&[0x03, 0xAA, 0x01, 0x02]), None);
        assert_eq!(decode_notification(&[0x03, 0xAA, 0x00, 0x64, 0x00, 0x00, 0x00]), None);
    }

    #[test]
    fn short_frames_are_ignored() {
        assert_eq!(decode_notification(&[]), None);
        assert_eq!(decode_notification(&[0x03]), None);
        assert_eq!(decode_notification(&[0x03, 0x00]), None);
        assert_eq!(decode_notification(&[0x03, 0x00, 0x64]), None);
    }
}
