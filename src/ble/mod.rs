//! Bluetooth Low Energy subsystem.
//!
//! This module drives the scale link in **Central** role:
//!
//! 1. **Advertisement parser** - picks the scale out of the scan by its
//!    exact local name.
//! 2. **Peer registry** - the one scale we are bound to and the GATT
//!    handles discovered on it.
//! 3. **Link** - the connection/discovery state machine, written against
//!    the [`radio::Radio`] seam so it runs unchanged on the SoftDevice and
//!    on the host.

pub mod adv_parser;
pub mod link;
pub mod peer;
pub mod radio;
pub mod uuid;
