//! Scale link state machine.
//!
//! Drives one scale from scan to a primed, subscribed connection:
//!
//! ```text
//! Idle -> Scanning -> Connecting -> NegotiatingMtu -> DiscoveringService
//!      -> DiscoveringCharacteristics -> SubscribingNotify -> PrimingScale
//!      -> Ready
//! ```
//!
//! Any disconnect or failed step falls back to `Scanning`; an explicit
//! disconnect goes through `Disconnecting` to `Idle`. Every phase from
//! `Connecting` to `PrimingScale` is bounded by the step guard timer.
//!
//! The machine owns no I/O. Requests go out through [`Radio`], outcomes
//! come back as [`RadioEvent`]s, and all of it runs in the radio context.

use embassy_sync::blocking_mutex::raw::RawMutex;

use crate::ble::adv_parser;
use crate::ble::peer::{PeerAddress, PeerRecord, PeerRegistry};
use crate::ble::radio::{ConnHandle, LinkTimer, Radio, RadioEvent, ScanParams};
use crate::ble::uuid::{CCCD_ENABLE_NOTIFICATIONS, SCALE_SERVICE};
use crate::config::{DISCOVERY_STEP_TIMEOUT_MS, PRIMING_STEP_DELAY_MS, TARGET_DEVICE_NAME};
use crate::error::RadioError;
use crate::scale::measurement::ScaleState;
use crate::scale::protocol::{self, CommandFrame};
use crate::scale::{ScaleCommand, Unit};

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub enum ConnectionPhase {
    Idle,
    Scanning,
    Connecting,
    NegotiatingMtu,
    DiscoveringService,
    DiscoveringCharacteristics,
    SubscribingNotify,
    PrimingScale,
    Ready,
    Disconnecting,
}

impl ConnectionPhase {
    /// Phases bounded by the step guard.
    const fn is_guarded(self) -> bool {
        matches!(
            self,
            ConnectionPhase::Connecting
                | ConnectionPhase::NegotiatingMtu
                | ConnectionPhase::DiscoveringService
                | ConnectionPhase::DiscoveringCharacteristics
                | ConnectionPhase::SubscribingNotify
                | ConnectionPhase::PrimingScale
        )
    }

    /// Phases in which a link to the scale exists.
    const fn is_connected(self) -> bool {
        matches!(
            self,
            ConnectionPhase::NegotiatingMtu
                | ConnectionPhase::DiscoveringService
                | ConnectionPhase::DiscoveringCharacteristics
                | ConnectionPhase::SubscribingNotify
                | ConnectionPhase::PrimingScale
                | ConnectionPhase::Ready
        )
    }
}

/// Message from the consumer side to the radio context.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub enum LinkRequest {
    Connect,
    Disconnect,
    Command(ScaleCommand),
}

/// Sub-step while in `DiscoveringCharacteristics`.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
enum LookupStep {
    Characteristics,
    Descriptors,
}

/// Sub-step while in `SubscribingNotify`.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
enum SubscribeStep {
    Registering,
    WritingCccd,
}

/// Next write of the priming sequence, sent when the priming timer fires.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
enum PrimingStep {
    LedOn,
    SecondTare,
}

pub struct ScaleLink<'a, M: RawMutex> {
    state: &'a ScaleState<M>,
    registry: PeerRegistry,
    phase: ConnectionPhase,
    lookup: LookupStep,
    subscribe: SubscribeStep,
    priming: PrimingStep,
}

impl<'a, M: RawMutex> ScaleLink<'a, M> {
    pub const fn new(state: &'a ScaleState<M>) -> Self {
        Self {
            state,
            registry: PeerRegistry::new(),
            phase: ConnectionPhase::Idle,
            lookup: LookupStep::Characteristics,
            subscribe: SubscribeStep::Registering,
            priming: PrimingStep::LedOn,
        }
    }

    pub fn phase(&self) -> ConnectionPhase {
        self.phase
    }

    pub fn is_ready(&self) -> bool {
        self.phase == ConnectionPhase::Ready
    }

    pub fn peer(&self) -> Option<&PeerRecord> {
        self.registry.peer()
    }

    // Requests

    /// Start looking for the scale. No-op unless `Idle`.
    pub fn connect<R: Radio>(&mut self, radio: &mut R) {
        if self.phase != ConnectionPhase::Idle {
            debug!("connect ignored in {}", self.phase);
            return;
        }
        info!("Scanning for \"{}\"", TARGET_DEVICE_NAME);
        self.start_scanning(radio);
    }

    /// Tear the link down and stay `Idle` until the next [`connect`](Self::connect).
    pub fn disconnect<R: Radio>(&mut self, radio: &mut R) {
        radio.cancel_timer(LinkTimer::Priming);
        match self.phase {
            ConnectionPhase::Idle | ConnectionPhase::Disconnecting => {}
            ConnectionPhase::Scanning => {
                if let Err(e) = radio.stop_scan() {
                    warn!("stop scan failed: {}", e);
                }
                self.go_idle(radio);
            }
            ConnectionPhase::Connecting => {
                if let Err(e) = radio.cancel_connect() {
                    warn!("cancel connect failed: {}", e);
                }
                self.go_idle(radio);
            }
            _ => match self.registry.conn() {
                Some(conn) => match radio.terminate(conn) {
                    Ok(()) => {
                        info!("Disconnecting from scale");
                        self.enter(ConnectionPhase::Disconnecting, radio);
                    }
                    Err(e) => {
                        warn!("terminate failed: {}", e);
                        self.go_idle(radio);
                    }
                },
                None => self.go_idle(radio),
            },
        }
    }

    /// Send a scale command. Silently dropped unless `Ready`.
    pub fn dispatch<R: Radio>(&mut self, cmd: ScaleCommand, radio: &mut R) {
        if self.phase != ConnectionPhase::Ready {
            debug!("{} dropped in {}", cmd, self.phase);
            return;
        }
        self.write_frame(&cmd.frame(), radio);
    }

    pub fn handle_request<R: Radio>(&mut self, request: LinkRequest, radio: &mut R) {
        match request {
            LinkRequest::Connect => self.connect(radio),
            LinkRequest::Disconnect => self.disconnect(radio),
            LinkRequest::Command(cmd) => self.dispatch(cmd, radio),
        }
    }

    // Events

    pub fn handle_event<R: Radio>(&mut self, event: RadioEvent<'_>, radio: &mut R) {
        use ConnectionPhase as P;

        match (self.phase, event) {
            (P::Scanning, RadioEvent::Advertisement { address, data }) => {
                if adv_parser::advertises_name(data, TARGET_DEVICE_NAME) {
                    self.start_connecting(address, radio);
                }
            }
            (P::Scanning, RadioEvent::ScanComplete) => {
                debug!("scan ended, restarting");
                self.start_scanning(radio);
            }

            (P::Connecting, RadioEvent::ConnectFailed { status }) => {
                warn!("Connection failed (status {})", status);
                self.resume_scanning(radio);
            }
            (P::Connecting, RadioEvent::Connected { conn }) => {
                info!("Connected to scale (conn {})", conn);
                self.registry.set_connected(conn);
                self.enter(P::NegotiatingMtu, radio);
                if let Err(e) = radio.exchange_mtu(conn) {
                    warn!("MTU exchange refused: {}", e);
                    self.start_service_discovery(conn, radio);
                }
            }

            (_, RadioEvent::Disconnected { conn, reason }) => {
                self.on_disconnected(conn, reason, radio);
            }

            (P::NegotiatingMtu, RadioEvent::MtuExchanged { conn, result })
                if self.registry.is_current(conn) =>
            {
                match result {
                    Ok(mtu) => debug!("ATT MTU {}", mtu),
                    Err(e) => warn!("MTU exchange failed: {}", e),
                }
                self.start_service_discovery(conn, radio);
            }

            (P::DiscoveringService, RadioEvent::ServiceDiscovered { conn, uuid, range })
                if self.registry.is_current(conn) =>
            {
                if uuid == SCALE_SERVICE && self.registry.service().is_none() {
                    debug!("scale service at {}..={}", range.start, range.end);
                    self.registry.set_service(range);
                }
            }
            (P::DiscoveringService, RadioEvent::ServiceDiscoveryComplete { conn, result })
                if self.registry.is_current(conn) =>
            {
                self.on_services_complete(conn, result, radio);
            }

            (
                P::DiscoveringCharacteristics,
                RadioEvent::CharacteristicDiscovered {
                    conn,
                    uuid,
                    value_handle,
                },
            ) if self.registry.is_current(conn) && self.lookup == LookupStep::Characteristics => {
                self.registry.record_characteristic(uuid, value_handle);
            }
            (
                P::DiscoveringCharacteristics,
                RadioEvent::CharacteristicDiscoveryComplete { conn, result },
            ) if self.registry.is_current(conn) && self.lookup == LookupStep::Characteristics => {
                self.on_characteristics_complete(conn, result, radio);
            }
            (P::DiscoveringCharacteristics, RadioEvent::DescriptorDiscovered { conn, uuid, handle })
                if self.registry.is_current(conn) && self.lookup == LookupStep::Descriptors =>
            {
                self.registry.record_descriptor(uuid, handle);
            }
            (
                P::DiscoveringCharacteristics,
                RadioEvent::DescriptorDiscoveryComplete { conn, result },
            ) if self.registry.is_current(conn) && self.lookup == LookupStep::Descriptors => {
                self.on_descriptors_complete(conn, result, radio);
            }

            (P::SubscribingNotify, RadioEvent::NotifyRegistered { conn, result })
                if self.registry.is_current(conn) && self.subscribe == SubscribeStep::Registering =>
            {
                self.on_notify_registered(conn, result, radio);
            }
            (P::SubscribingNotify, RadioEvent::DescriptorWritten { conn, result })
                if self.registry.is_current(conn) && self.subscribe == SubscribeStep::WritingCccd =>
            {
                match result {
                    Ok(()) => self.start_priming(radio),
                    Err(e) => {
                        warn!("CCCD write failed: {}", e);
                        self.abort(radio);
                    }
                }
            }

            (P::PrimingScale, RadioEvent::TimerExpired(LinkTimer::Priming)) => {
                self.on_priming_timer(radio);
            }
            (phase, RadioEvent::TimerExpired(LinkTimer::StepGuard)) if phase.is_guarded() => {
                warn!("{} timed out", phase);
                self.abort(radio);
            }

            (P::PrimingScale | P::Ready, RadioEvent::Notification { conn, handle, data })
                if self.registry.is_current(conn) && self.registry.notify_char() == Some(handle) =>
            {
                if let Some(sample) = protocol::decode_notification(data) {
                    self.state.set_weight(sample);
                }
            }

            (P::PrimingScale | P::Ready, RadioEvent::WriteComplete { conn, result })
                if self.registry.is_current(conn) =>
            {
                if let Err(e) = result {
                    warn!("command write failed: {}", e);
                }
            }

            (phase, _event) => {
                debug!("ignored {} in {}", _event, phase);
            }
        }
    }

    // Transitions

    fn enter<R: Radio>(&mut self, phase: ConnectionPhase, radio: &mut R) {
        if phase != self.phase {
            debug!("{} -> {}", self.phase, phase);
        }
        self.phase = phase;
        self.state.set_ready(phase == ConnectionPhase::Ready);

        if phase.is_guarded() {
            self.arm_step_guard(radio);
        } else {
            radio.cancel_timer(LinkTimer::StepGuard);
        }
    }

    fn arm_step_guard<R: Radio>(&mut self, radio: &mut R) {
        radio.cancel_timer(LinkTimer::StepGuard);
        if let Err(e) = radio.start_timer(LinkTimer::StepGuard, DISCOVERY_STEP_TIMEOUT_MS) {
            warn!("step guard not armed: {}", e);
        }
    }

    fn start_scanning<R: Radio>(&mut self, radio: &mut R) {
        match radio.start_scan(&ScanParams::SCALE_SEARCH) {
            Ok(()) => self.enter(ConnectionPhase::Scanning, radio),
            Err(e) => {
                error!("scan refused: {}", e);
                self.go_idle(radio);
            }
        }
    }

    /// Clear the peer's handles and go back to scanning.
    fn resume_scanning<R: Radio>(&mut self, radio: &mut R) {
        radio.cancel_timer(LinkTimer::Priming);
        self.registry.clear_handles();
        self.start_scanning(radio);
    }

    fn go_idle<R: Radio>(&mut self, radio: &mut R) {
        radio.cancel_timer(LinkTimer::Priming);
        self.registry.forget();
        self.enter(ConnectionPhase::Idle, radio);
    }

    /// Give up on the current attempt, dropping any link, and rescan.
    fn abort<R: Radio>(&mut self, radio: &mut R) {
        if self.phase == ConnectionPhase::Connecting {
            if let Err(e) = radio.cancel_connect() {
                warn!("cancel connect failed: {}", e);
            }
        } else if let Some(conn) = self.registry.conn() {
            if let Err(e) = radio.terminate(conn) {
                warn!("terminate failed: {}", e);
            }
        }
        self.resume_scanning(radio);
    }

    fn start_connecting<R: Radio>(&mut self, address: PeerAddress, radio: &mut R) {
        info!("Found \"{}\", connecting", TARGET_DEVICE_NAME);
        if let Err(e) = radio.stop_scan() {
            warn!("stop scan failed: {}", e);
        }
        self.registry.adopt(address);
        match radio.connect(&address) {
            Ok(()) => self.enter(ConnectionPhase::Connecting, radio),
            Err(e) => {
                warn!("connect refused: {}", e);
                self.resume_scanning(radio);
            }
        }
    }

    fn on_disconnected<R: Radio>(&mut self, conn: ConnHandle, reason: u8, radio: &mut R) {
        if !self.registry.is_current(conn) {
            debug!("disconnect for stale conn {}", conn);
            return;
        }
        if self.phase == ConnectionPhase::Disconnecting {
            info!("Disconnected from scale");
            self.go_idle(radio);
        } else if self.phase.is_connected() {
            warn!("Scale disconnected (reason {:#x}), rescanning", reason);
            self.resume_scanning(radio);
        }
    }

    fn start_service_discovery<R: Radio>(&mut self, conn: ConnHandle, radio: &mut R) {
        self.enter(ConnectionPhase::DiscoveringService, radio);
        if let Err(e) = radio.discover_services(conn) {
            warn!("service discovery refused: {}", e);
            self.abort(radio);
        }
    }

    fn on_services_complete<R: Radio>(
        &mut self,
        conn: ConnHandle,
        result: Result<(), RadioError>,
        radio: &mut R,
    ) {
        let range = match (result, self.registry.service()) {
            (Ok(()), Some(range)) => range,
            (Err(e), _) => {
                warn!("service discovery failed: {}", e);
                return self.abort(radio);
            }
            (Ok(()), None) => {
                warn!("scale service not found");
                return self.abort(radio);
            }
        };
        self.lookup = LookupStep::Characteristics;
        self.enter(ConnectionPhase::DiscoveringCharacteristics, radio);
        if let Err(e) = radio.discover_characteristics(conn, range) {
            warn!("characteristic discovery refused: {}", e);
            self.abort(radio);
        }
    }

    fn on_characteristics_complete<R: Radio>(
        &mut self,
        conn: ConnHandle,
        result: Result<(), RadioError>,
        radio: &mut R,
    ) {
        if let Err(e) = result {
            warn!("characteristic discovery failed: {}", e);
            return self.abort(radio);
        }
        if !self.registry.characteristics_resolved() {
            warn!("scale characteristics missing");
            return self.abort(radio);
        }
        let Some(range) = self.registry.descriptor_range() else {
            warn!("no room for the notify descriptor");
            return self.abort(radio);
        };
        self.lookup = LookupStep::Descriptors;
        self.arm_step_guard(radio);
        if let Err(e) = radio.discover_descriptors(conn, range) {
            warn!("descriptor discovery refused: {}", e);
            self.abort(radio);
        }
    }

    fn on_descriptors_complete<R: Radio>(
        &mut self,
        conn: ConnHandle,
        result: Result<(), RadioError>,
        radio: &mut R,
    ) {
        if let Err(e) = result {
            warn!("descriptor discovery failed: {}", e);
            return self.abort(radio);
        }
        let Some(notify) = self.registry.notify_char() else {
            return self.abort(radio);
        };
        if self.registry.notify_cccd().is_none() {
            warn!("notify descriptor missing");
            return self.abort(radio);
        }
        self.subscribe = SubscribeStep::Registering;
        self.enter(ConnectionPhase::SubscribingNotify, radio);
        if let Err(e) = radio.subscribe(conn, notify) {
            warn!("notify registration refused: {}", e);
            self.abort(radio);
        }
    }

    fn on_notify_registered<R: Radio>(
        &mut self,
        conn: ConnHandle,
        result: Result<(), RadioError>,
        radio: &mut R,
    ) {
        if let Err(e) = result {
            warn!("notify registration failed: {}", e);
            return self.abort(radio);
        }
        let Some(cccd) = self.registry.notify_cccd() else {
            return self.abort(radio);
        };
        self.subscribe = SubscribeStep::WritingCccd;
        self.arm_step_guard(radio);
        if let Err(e) = radio.write_descriptor(conn, cccd, &CCCD_ENABLE_NOTIFICATIONS) {
            warn!("CCCD write refused: {}", e);
            self.abort(radio);
        }
    }

    /// tare, wait, LED on (grams), wait, tare.
    fn start_priming<R: Radio>(&mut self, radio: &mut R) {
        info!("Subscribed, priming scale");
        self.enter(ConnectionPhase::PrimingScale, radio);
        self.write_frame(&protocol::TARE, radio);
        self.priming = PrimingStep::LedOn;
        self.schedule_priming(radio);
    }

    fn on_priming_timer<R: Radio>(&mut self, radio: &mut R) {
        match self.priming {
            PrimingStep::LedOn => {
                self.write_frame(&ScaleCommand::LedOn(Unit::Gram).frame(), radio);
                self.priming = PrimingStep::SecondTare;
                self.schedule_priming(radio);
            }
            PrimingStep::SecondTare => {
                self.write_frame(&protocol::TARE, radio);
                info!("Scale ready");
                self.enter(ConnectionPhase::Ready, radio);
            }
        }
    }

    fn schedule_priming<R: Radio>(&mut self, radio: &mut R) {
        if let Err(e) = radio.start_timer(LinkTimer::Priming, PRIMING_STEP_DELAY_MS) {
            // Left to the step guard.
            warn!("priming timer refused: {}", e);
        }
    }

    fn write_frame<R: Radio>(&mut self, frame: &CommandFrame, radio: &mut R) {
        let Some((conn, handle)) = self.registry.write_target() else {
            warn!("no write handle");
            return;
        };
        if let Err(e) = radio.write_with_response(conn, handle, frame.as_bytes()) {
            warn!("write refused: {}", e);
        }
    }
}
