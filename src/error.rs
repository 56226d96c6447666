//! Unified error types for scale-link.
//!
//! We avoid `alloc` - all error variants carry only fixed-size data.
//! Implements `defmt::Format` (behind the `defmt` feature) for efficient
//! on-target logging.

/// Error returned by a [`Radio`](crate::ble::radio::Radio) request, or
/// carried in the matching completion event.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub enum RadioError {
    /// GAP / GATT raw error code from the radio stack.
    Raw(u32),
    /// GATT discovery failed.
    DiscoveryFailed,
    /// Characteristic or descriptor write was not acknowledged.
    WriteFailed,
    /// Notification registration failed.
    NotifyFailed,
    /// The request referred to a link that no longer exists.
    NotConnected,
    /// The stack is busy with another procedure.
    Busy,
}

/// Error from the firmware shell outside the radio path.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub enum Error {
    /// I²C transaction to the display failed.
    Display,

    /// Buffer too small for the requested operation.
    BufferOverflow,
}
