//! Radio seam between the link state machine and the BLE stack.
//!
//! [`ScaleLink`](crate::ble::link::ScaleLink) never talks to the stack
//! directly. It issues non-blocking requests through [`Radio`] and reacts
//! to the [`RadioEvent`]s the stack delivers later. The firmware binds this
//! to the SoftDevice; tests bind it to a recording mock.

use crate::ble::peer::{HandleRange, PeerAddress};
use crate::ble::uuid::Uuid;
use crate::error::RadioError;

/// Connection handle assigned by the stack.
pub type ConnHandle = u16;

/// Scan configuration for the scale search.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub struct ScanParams {
    /// Report every advertisement, not just the first per address.
    pub filter_duplicates: bool,
    /// Request scan responses so the local name is seen.
    pub active: bool,
}

impl ScanParams {
    pub const SCALE_SEARCH: Self = Self {
        filter_duplicates: false,
        active: true,
    };
}

/// One-shot timers owned by the link.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub enum LinkTimer {
    /// Spacing between priming writes.
    Priming,
    /// Upper bound on a single connection/discovery step.
    StepGuard,
}

/// Requests the link issues to the BLE stack.
///
/// Every request returns as soon as it is queued. `Err` means the stack
/// refused it outright; the outcome otherwise arrives as a [`RadioEvent`].
pub trait Radio {
    fn start_scan(&mut self, params: &ScanParams) -> Result<(), RadioError>;
    fn stop_scan(&mut self) -> Result<(), RadioError>;

    fn connect(&mut self, peer: &PeerAddress) -> Result<(), RadioError>;
    fn cancel_connect(&mut self) -> Result<(), RadioError>;

    fn exchange_mtu(&mut self, conn: ConnHandle) -> Result<(), RadioError>;

    fn discover_services(&mut self, conn: ConnHandle) -> Result<(), RadioError>;
    fn discover_characteristics(
        &mut self,
        conn: ConnHandle,
        range: HandleRange,
    ) -> Result<(), RadioError>;
    fn discover_descriptors(
        &mut self,
        conn: ConnHandle,
        range: HandleRange,
    ) -> Result<(), RadioError>;

    /// Route notifications for `value_handle` to the link.
    fn subscribe(&mut self, conn: ConnHandle, value_handle: u16) -> Result<(), RadioError>;
    fn write_descriptor(
        &mut self,
        conn: ConnHandle,
        handle: u16,
        value: &[u8],
    ) -> Result<(), RadioError>;
    fn write_with_response(
        &mut self,
        conn: ConnHandle,
        handle: u16,
        value: &[u8],
    ) -> Result<(), RadioError>;

    fn terminate(&mut self, conn: ConnHandle) -> Result<(), RadioError>;

    fn start_timer(&mut self, timer: LinkTimer, ms: u32) -> Result<(), RadioError>;
    fn cancel_timer(&mut self, timer: LinkTimer);
}

/// Events the BLE stack delivers to the link.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub enum RadioEvent<'a> {
    Advertisement {
        address: PeerAddress,
        data: &'a [u8],
    },
    /// The scan stopped on its own (timeout or stack restart).
    ScanComplete,
    ConnectFailed {
        status: u32,
    },
    Connected {
        conn: ConnHandle,
    },
    MtuExchanged {
        conn: ConnHandle,
        result: Result<u16, RadioError>,
    },
    ServiceDiscovered {
        conn: ConnHandle,
        uuid: Uuid,
        range: HandleRange,
    },
    ServiceDiscoveryComplete {
        conn: ConnHandle,
        result: Result<(), RadioError>,
    },
    CharacteristicDiscovered {
        conn: ConnHandle,
        uuid: Uuid,
        value_handle: u16,
    },
    CharacteristicDiscoveryComplete {
        conn: ConnHandle,
        result: Result<(), RadioError>,
    },
    DescriptorDiscovered {
        conn: ConnHandle,
        uuid: Uuid,
        handle: u16,
    },
    DescriptorDiscoveryComplete {
        conn: ConnHandle,
        result: Result<(), RadioError>,
    },
    NotifyRegistered {
        conn: ConnHandle,
        result: Result<(), RadioError>,
    },
    DescriptorWritten {
        conn: ConnHandle,
        result: Result<(), RadioError>,
    },
    WriteComplete {
        conn: ConnHandle,
        result: Result<(), RadioError>,
    },
    TimerExpired(LinkTimer),
    Notification {
        conn: ConnHandle,
        handle: u16,
        data: &'a [u8],
    },
    Disconnected {
        conn: ConnHandle,
        reason: u8,
    },
}
