//! GATT client for the scale service.
//!
//! `gatt_client::discover` walks the service and its characteristics in
//! one procedure. This client records what the link cares about so the
//! driver can replay it step by step: the write and notify value handles,
//! the notify CCCD, and the handle span the service covers.

use defmt::debug;
use heapless::Vec;
use nrf_softdevice::ble::gatt_client::{self, Characteristic, Descriptor, DiscoverError, HvxType};
use nrf_softdevice::ble::{Connection, Uuid as SdUuid};

use scale_link::ble::peer::HandleRange;
use scale_link::ble::uuid::{self, Uuid};

/// Largest notification we keep. Weight frames are 7 bytes.
pub const MAX_NOTIFICATION_LEN: usize = 20;

pub struct WeightNotification {
    pub handle: u16,
    pub data: Vec<u8, MAX_NOTIFICATION_LEN>,
}

/// Base-UUID values go to the stack as 16-bit SIG UUIDs; only vendor
/// UUIDs are registered as 128-bit.
fn sd_uuid(uuid: Uuid) -> SdUuid {
    match uuid.as_short() {
        Some(short) => SdUuid::new_16(short),
        None => SdUuid::new_128(&uuid.to_le_bytes()),
    }
}

pub struct ScaleGattClient {
    write_uuid: SdUuid,
    notify_uuid: SdUuid,
    cccd_uuid: SdUuid,
    pub write_handle: Option<u16>,
    pub notify_handle: Option<u16>,
    pub cccd_handle: Option<u16>,
    first_handle: u16,
    last_handle: u16,
    /// Value handle whose notifications are forwarded; set on subscribe.
    pub subscribed: Option<u16>,
}

impl ScaleGattClient {
    /// Span of attribute handles seen inside the service.
    ///
    /// The service declaration sits one handle before the first
    /// characteristic declaration.
    pub fn range(&self) -> Option<HandleRange> {
        if self.first_handle > self.last_handle {
            return None;
        }
        Some(HandleRange {
            start: self.first_handle.saturating_sub(1),
            end: self.last_handle,
        })
    }

    fn widen(&mut self, handle: u16) {
        self.first_handle = self.first_handle.min(handle);
        self.last_handle = self.last_handle.max(handle);
    }
}

impl gatt_client::Client for ScaleGattClient {
    type Event = WeightNotification;

    fn uuid() -> SdUuid {
        sd_uuid(uuid::SCALE_SERVICE)
    }

    fn new_undiscovered(_conn: Connection) -> Self {
        Self {
            write_uuid: sd_uuid(uuid::WRITE_CHARACTERISTIC),
            notify_uuid: sd_uuid(uuid::NOTIFY_CHARACTERISTIC),
            cccd_uuid: sd_uuid(uuid::CCCD),
            write_handle: None,
            notify_handle: None,
            cccd_handle: None,
            first_handle: u16::MAX,
            last_handle: 0,
            subscribed: None,
        }
    }

    fn discovered_characteristic(
        &mut self,
        characteristic: &Characteristic,
        descriptors: &[Descriptor],
    ) {
        self.widen(characteristic.handle_decl);
        self.widen(characteristic.handle_value);
        for desc in descriptors {
            self.widen(desc.handle);
        }

        if characteristic.uuid == Some(self.write_uuid) {
            debug!("write characteristic at {}", characteristic.handle_value);
            self.write_handle = Some(characteristic.handle_value);
        } else if characteristic.uuid == Some(self.notify_uuid) {
            debug!("notify characteristic at {}", characteristic.handle_value);
            self.notify_handle = Some(characteristic.handle_value);
            self.cccd_handle = descriptors
                .iter()
                .find(|d| d.uuid == Some(self.cccd_uuid))
                .map(|d| d.handle);
        }
    }

    fn discovery_complete(&mut self) -> Result<(), DiscoverError> {
        // Missing characteristics are the link's call, not discovery's.
        Ok(())
    }

    fn on_hvx(
        &self,
        _conn: &Connection,
        type_: HvxType,
        handle: u16,
        data: &[u8],
    ) -> Option<Self::Event> {
        if type_ != HvxType::Notification || self.subscribed != Some(handle) {
            return None;
        }
        let data = Vec::from_slice(&data[..data.len().min(MAX_NOTIFICATION_LEN)]).ok()?;
        Some(WeightNotification { handle, data })
    }
}
