//! Link-layer client for the Decent Scale.
//!
//! Every piece of protocol logic lives here and builds for the host, so
//! the whole connection flow is tested without hardware:
//!
//! - [`scale::protocol`] - command frames and weight notifications
//! - [`ble::link`] - scan / connect / discover / subscribe / prime state
//!   machine, driven through the [`ble::radio::Radio`] seam
//! - [`scale::measurement`] - weight and readiness shared with the UI
//! - [`scale::client`] - consumer handle for buttons and periodic tasks
//! - [`timer`] - brew timer kept in step with the scale
//!
//! Usage: `cargo test` on the host.
//!
//! Note: The firmware binary (`main.rs`, `embedded` feature) binds the
//! radio seam to the S140 SoftDevice and adds the display and buttons.

#![cfg_attr(not(test), no_std)]

#[macro_use]
mod fmt;

pub mod ble;
pub mod config;
pub mod error;
pub mod scale;
pub mod timer;

pub use ble::link::{ConnectionPhase, LinkRequest, ScaleLink};
pub use error::{Error, RadioError};
pub use scale::client::ScaleClient;
pub use scale::measurement::{Grams, ScaleState};
pub use scale::{ScaleCommand, Unit};
