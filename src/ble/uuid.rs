//! GATT UUIDs for the Decent Scale profile.
//!
//! The scale's UUIDs all live on the Bluetooth base UUID, so stacks may
//! report them either as 16-bit aliases or as full 128-bit values.
//! [`Uuid`] compares equal across both forms.

/// Bluetooth base UUID `00000000-0000-1000-8000-00805f9b34fb`.
pub const BASE_UUID: u128 = 0x0000_0000_0000_1000_8000_0080_5f9b_34fb;

#[derive(Clone, Copy, Debug, Eq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub enum Uuid {
    Uuid16(u16),
    Uuid128(u128),
}

impl Uuid {
    /// Full 128-bit value.
    pub const fn as_u128(self) -> u128 {
        match self {
            Uuid::Uuid16(short) => BASE_UUID | ((short as u128) << 96),
            Uuid::Uuid128(full) => full,
        }
    }

    /// 16-bit alias, if the UUID lives on the Bluetooth base UUID.
    pub const fn as_short(self) -> Option<u16> {
        let full = self.as_u128();
        if full & !(0xFFFF << 96) == BASE_UUID {
            Some((full >> 96) as u16)
        } else {
            None
        }
    }

    /// Little-endian byte order, as stored on the air and by the SoftDevice.
    pub const fn to_le_bytes(self) -> [u8; 16] {
        self.as_u128().to_le_bytes()
    }

    pub const fn from_le_bytes(bytes: [u8; 16]) -> Self {
        Uuid::Uuid128(u128::from_le_bytes(bytes))
    }
}

impl PartialEq for Uuid {
    fn eq(&self, other: &Self) -> bool {
        self.as_u128() == other.as_u128()
    }
}

/// Scale service `0000fff0-0000-1000-8000-00805f9b34fb`.
pub const SCALE_SERVICE: Uuid = Uuid::Uuid128(0x0000_fff0_0000_1000_8000_0080_5f9b_34fb);

/// Command (write) characteristic `000036f5-0000-1000-8000-00805f9b34fb`.
pub const WRITE_CHARACTERISTIC: Uuid = Uuid::Uuid128(0x0000_36f5_0000_1000_8000_0080_5f9b_34fb);

/// Weight (notify) characteristic `0000fff4-0000-1000-8000-00805f9b34fb`.
pub const NOTIFY_CHARACTERISTIC: Uuid = Uuid::Uuid128(0x0000_fff4_0000_1000_8000_0080_5f9b_34fb);

/// Client Characteristic Configuration Descriptor.
pub const CCCD: Uuid = Uuid::Uuid16(0x2902);

/// CCCD value enabling notifications (little-endian `0x0001`).
pub const CCCD_ENABLE_NOTIFICATIONS: [u8; 2] = [0x01, 0x00];

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn short_alias_equals_full_uuid() {
        assert_eq!(Uuid::Uuid16(0xFFF0), SCALE_SERVICE);
        assert_eq!(Uuid::Uuid16(0x36F5), WRITE_CHARACTERISTIC);
        assert_eq!(Uuid::Uuid16(0xFFF4), NOTIFY_CHARACTERISTIC);
        assert_ne!(Uuid::Uuid16(0xFFF5), NOTIFY_CHARACTERISTIC);
    }

    #[test]
    fn cccd_expands_on_base_uuid() {
        assert_eq!(CCCD.as_u128(), 0x0000_2902_0000_1000_8000_0080_5f9b_34fb);
    }

    #[test]
    fn base_uuids_shorten_to_their_alias() {
        assert_eq!(SCALE_SERVICE.as_short(), Some(0xFFF0));
        assert_eq!(WRITE_CHARACTERISTIC.as_short(), Some(0x36F5));
        assert_eq!(NOTIFY_CHARACTERISTIC.as_short(), Some(0xFFF4));
        assert_eq!(CCCD.as_short(), Some(0x2902));
    }

    #[test]
    fn vendor_uuids_have_no_alias() {
        // Nordic UART service.
        let nus = Uuid::Uuid128(0x6e40_0001_b5a3_f393_e0a9_e50e_24dc_ca9e);
        assert_eq!(nus.as_short(), None);
        // Base UUID with a non-zero upper half is not an alias either.
        let wide = Uuid::Uuid128(0x0001_fff0_0000_1000_8000_0080_5f9b_34fb);
        assert_eq!(wide.as_short(), None);
    }

    #[test]
    fn le_bytes_match_softdevice_layout() {
        let bytes = SCALE_SERVICE.to_le_bytes();
        assert_eq!(bytes[0], 0xFB);
        assert_eq!(bytes[12], 0xF0);
        assert_eq!(bytes[13], 0xFF);
        assert_eq!(Uuid::from_le_bytes(bytes), SCALE_SERVICE);
    }
}
