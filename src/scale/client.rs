//! Consumer-side handle to the scale link.
//!
//! Buttons and periodic tasks never touch the radio. They read the
//! shared [`ScaleState`] and post [`LinkRequest`]s to the radio context,
//! which owns the [`ScaleLink`](crate::ble::link::ScaleLink) and re-checks
//! the phase before anything goes on air.

use embassy_sync::blocking_mutex::raw::RawMutex;
use embassy_sync::channel::Sender;

use crate::ble::link::LinkRequest;
use crate::scale::measurement::ScaleState;
use crate::scale::{ScaleCommand, Unit};

pub struct ScaleClient<'a, M: RawMutex, const N: usize> {
    state: &'a ScaleState<M>,
    requests: Sender<'a, M, LinkRequest, N>,
}

impl<M: RawMutex, const N: usize> Clone for ScaleClient<'_, M, N> {
    fn clone(&self) -> Self {
        Self {
            state: self.state,
            requests: self.requests,
        }
    }
}

impl<'a, M: RawMutex, const N: usize> ScaleClient<'a, M, N> {
    pub fn new(state: &'a ScaleState<M>, requests: Sender<'a, M, LinkRequest, N>) -> Self {
        Self { state, requests }
    }

    /// Start scanning for the scale. Reconnects are automatic after this.
    pub fn connect(&self) {
        self.post(LinkRequest::Connect);
    }

    pub fn disconnect(&self) {
        self.post(LinkRequest::Disconnect);
    }

    pub fn is_ready(&self) -> bool {
        self.state.is_ready()
    }

    /// Last weight in tenths of a gram.
    pub fn get_weight(&self) -> i16 {
        self.state.get_weight()
    }

    pub fn tare(&self) {
        self.command(ScaleCommand::Tare);
    }

    pub fn led_on_gram(&self) {
        self.command(ScaleCommand::LedOn(Unit::Gram));
    }

    pub fn led_on_ounce(&self) {
        self.command(ScaleCommand::LedOn(Unit::Ounce));
    }

    pub fn led_off(&self) {
        self.command(ScaleCommand::LedOff);
    }

    pub fn power_off(&self) {
        self.command(ScaleCommand::PowerOff);
    }

    pub fn timer_on(&self) {
        self.command(ScaleCommand::TimerOn);
    }

    pub fn timer_off(&self) {
        self.command(ScaleCommand::TimerOff);
    }

    pub fn timer_reset(&self) {
        self.command(ScaleCommand::TimerReset);
    }

    /// Switch the scale's display unit.
    pub fn set_unit(&self, unit: Unit) {
        self.command(ScaleCommand::LedOn(unit));
    }

    /// Post a command if the link is up. Dropped otherwise, never queued.
    pub fn command(&self, cmd: ScaleCommand) {
        if !self.state.is_ready() {
            debug!("{} dropped, scale not ready", cmd);
            return;
        }
        self.post(LinkRequest::Command(cmd));
    }

    fn post(&self, request: LinkRequest) {
        if self.requests.try_send(request).is_err() {
            warn!("link request queue full, dropped {}", request);
        }
    }
}
