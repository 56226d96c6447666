//! Peer registry - the single scale the link is bound to.
//!
//! Exactly one [`PeerRecord`] is live at a time. Its attribute handles are
//! filled in step by step during discovery and wiped whenever the link
//! falls back to scanning or idle.

use crate::ble::radio::ConnHandle;
use crate::ble::uuid::{Uuid, CCCD, NOTIFY_CHARACTERISTIC, WRITE_CHARACTERISTIC};

/// BLE address type, as reported in the advertisement.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub enum AddressKind {
    Public,
    RandomStatic,
    RandomPrivateResolvable,
    RandomPrivateNonResolvable,
}

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub struct PeerAddress {
    /// Little-endian, as delivered by the controller.
    pub bytes: [u8; 6],
    pub kind: AddressKind,
}

/// Inclusive attribute-handle range of a GATT service.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub struct HandleRange {
    pub start: u16,
    pub end: u16,
}

impl HandleRange {
    pub const fn contains(&self, handle: u16) -> bool {
        self.start <= handle && handle <= self.end
    }

    /// Handles strictly after `handle`, up to the end of the range.
    pub fn after(&self, handle: u16) -> Option<HandleRange> {
        if handle >= self.end || !self.contains(handle) {
            return None;
        }
        Some(HandleRange {
            start: handle + 1,
            end: self.end,
        })
    }
}

#[derive(Clone, Debug, PartialEq, Eq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub struct PeerRecord {
    pub address: PeerAddress,
    pub conn: Option<ConnHandle>,
    pub service: Option<HandleRange>,
    pub write_char: Option<u16>,
    pub notify_char: Option<u16>,
    pub notify_cccd: Option<u16>,
}

impl PeerRecord {
    pub const fn new(address: PeerAddress) -> Self {
        Self {
            address,
            conn: None,
            service: None,
            write_char: None,
            notify_char: None,
            notify_cccd: None,
        }
    }

    fn clear_handles(&mut self) {
        self.conn = None;
        self.service = None;
        self.write_char = None;
        self.notify_char = None;
        self.notify_cccd = None;
    }
}

/// Owner of the one live [`PeerRecord`].
#[derive(Debug, Default)]
pub struct PeerRegistry {
    peer: Option<PeerRecord>,
}

impl PeerRegistry {
    pub const fn new() -> Self {
        Self { peer: None }
    }

    pub fn peer(&self) -> Option<&PeerRecord> {
        self.peer.as_ref()
    }

    /// Bind to a newly seen scale, replacing any previous record.
    pub fn adopt(&mut self, address: PeerAddress) {
        self.peer = Some(PeerRecord::new(address));
    }

    /// Drop the record entirely.
    pub fn forget(&mut self) {
        self.peer = None;
    }

    /// Clear the connection and every discovered handle, keeping the address.
    pub fn clear_handles(&mut self) {
        if let Some(peer) = self.peer.as_mut() {
            peer.clear_handles();
        }
    }

    pub fn set_connected(&mut self, conn: ConnHandle) {
        if let Some(peer) = self.peer.as_mut() {
            peer.conn = Some(conn);
        }
    }

    pub fn conn(&self) -> Option<ConnHandle> {
        self.peer.as_ref().and_then(|p| p.conn)
    }

    /// True when `conn` is the link this registry is bound to.
    pub fn is_current(&self, conn: ConnHandle) -> bool {
        self.conn() == Some(conn)
    }

    pub fn set_service(&mut self, range: HandleRange) {
        if let Some(peer) = self.peer.as_mut() {
            peer.service = Some(range);
        }
    }

    pub fn service(&self) -> Option<HandleRange> {
        self.peer.as_ref().and_then(|p| p.service)
    }

    /// Record a discovered characteristic value handle if it is one of ours
    /// and lies inside the service range. Returns whether it was kept.
    pub fn record_characteristic(&mut self, uuid: Uuid, value_handle: u16) -> bool {
        let Some(peer) = self.peer.as_mut() else {
            return false;
        };
        let Some(range) = peer.service else {
            return false;
        };
        if !range.contains(value_handle) {
            return false;
        }
        if uuid == WRITE_CHARACTERISTIC && peer.write_char.is_none() {
            peer.write_char = Some(value_handle);
            true
        } else if uuid == NOTIFY_CHARACTERISTIC && peer.notify_char.is_none() {
            peer.notify_char = Some(value_handle);
            true
        } else {
            false
        }
    }

    /// Record the notify characteristic's CCCD. Only the first CCCD after
    /// the notify value handle belongs to it.
    pub fn record_descriptor(&mut self, uuid: Uuid, handle: u16) -> bool {
        let Some(peer) = self.peer.as_mut() else {
            return false;
        };
        let (Some(range), Some(notify)) = (peer.service, peer.notify_char) else {
            return false;
        };
        if uuid != CCCD || peer.notify_cccd.is_some() || handle <= notify || !range.contains(handle)
        {
            return false;
        }
        peer.notify_cccd = Some(handle);
        true
    }

    pub fn characteristics_resolved(&self) -> bool {
        self.peer
            .as_ref()
            .is_some_and(|p| p.write_char.is_some() && p.notify_char.is_some())
    }

    /// Range to search for the notify characteristic's descriptors.
    pub fn descriptor_range(&self) -> Option<HandleRange> {
        let peer = self.peer.as_ref()?;
        peer.service?.after(peer.notify_char?)
    }

    pub fn notify_char(&self) -> Option<u16> {
        self.peer.as_ref().and_then(|p| p.notify_char)
    }

    pub fn notify_cccd(&self) -> Option<u16> {
        self.peer.as_ref().and_then(|p| p.notify_cccd)
    }

    /// Connection and write handle, when both are known.
    pub fn write_target(&self) -> Option<(ConnHandle, u16)> {
        let peer = self.peer.as_ref()?;
        Some((peer.conn?, peer.write_char?))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    const ADDR: PeerAddress = PeerAddress {
        bytes: [0x11, 0x22, 0x33, 0x44, 0x55, 0x66],
        kind: AddressKind::Public,
    };

    fn discovered() -> PeerRegistry {
        let mut reg = PeerRegistry::new();
        reg.adopt(ADDR);
        reg.set_connected(1);
        reg.set_service(HandleRange { start: 0x10, end: 0x20 });
        reg
    }

    #[test]
    fn handle_range_bounds() {
        let range = HandleRange { start: 0x10, end: 0x20 };
        assert!(range.contains(0x10));
        assert!(range.contains(0x20));
        assert!(!range.contains(0x21));
        assert_eq!(range.after(0x14), Some(HandleRange { start: 0x15, end: 0x20 }));
        assert_eq!(range.after(0x20), None);
        assert_eq!(range.after(0x05), None);
    }

    #[test]
    fn characteristics_outside_range_are_rejected() {
        let mut reg = discovered();
        assert!(!reg.record_characteristic(WRITE_CHARACTERISTIC, 0x30));
        assert!(reg.record_characteristic(WRITE_CHARACTERISTIC, 0x12));
        assert!(!reg.characteristics_resolved());
        assert!(reg.record_characteristic(NOTIFY_CHARACTERISTIC, 0x15));
        assert!(reg.characteristics_resolved());
        assert_eq!(reg.write_target(), Some((1, 0x12)));
    }

    #[test]
    fn unknown_characteristic_is_ignored() {
        let mut reg = discovered();
        assert!(!reg.record_characteristic(Uuid::Uuid16(0x2A19), 0x12));
        assert_eq!(reg.write_target(), None);
    }

    #[test]
    fn cccd_must_follow_notify_value() {
        let mut reg = discovered();
        reg.record_characteristic(NOTIFY_CHARACTERISTIC, 0x15);
        assert!(!reg.record_descriptor(CCCD, 0x14));
        assert!(!reg.record_descriptor(Uuid::Uuid16(0x2901), 0x16));
        assert!(reg.record_descriptor(CCCD, 0x16));
        assert!(!reg.record_descriptor(CCCD, 0x17));
        assert_eq!(reg.notify_cccd(), Some(0x16));
        assert_eq!(reg.descriptor_range(), Some(HandleRange { start: 0x16, end: 0x20 }));
    }

    #[test]
    fn clear_handles_keeps_address() {
        let mut reg = discovered();
        reg.record_characteristic(WRITE_CHARACTERISTIC, 0x12);
        reg.clear_handles();
        let peer = reg.peer().unwrap();
        assert_eq!(peer.address, ADDR);
        assert_eq!(peer.conn, None);
        assert_eq!(peer.write_char, None);
        assert_eq!(reg.write_target(), None);
    }

    #[test]
    fn stale_connection_is_not_current() {
        let reg = discovered();
        assert!(reg.is_current(1));
        assert!(!reg.is_current(2));
    }
}
