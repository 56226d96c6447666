//! SoftDevice binding of the radio seam.
//!
//! [`SoftdeviceRadio`] only queues what the link asks for. [`ble_task`]
//! drains that queue against the S140 async API, turns each outcome
//! back into a [`RadioEvent`], and in between waits on whichever of
//! scan, connect or notification stream the link currently needs,
//! together with consumer requests and the link's timers.

pub mod gatt;

use defmt::{debug, info, warn};
use embassy_futures::select::{select, select3, Either, Either3};
use embassy_sync::blocking_mutex::raw::CriticalSectionRawMutex;
use embassy_sync::channel::Receiver;
use embassy_time::{Duration, Instant, Timer};
use heapless::{Deque, Vec};
use nrf_softdevice::ble::gatt_client::{self, DiscoverError};
use nrf_softdevice::ble::{central, Address, AddressType, Connection};
use nrf_softdevice::{raw, RawError, Softdevice};

use scale_link::ble::link::{ConnectionPhase, LinkRequest, ScaleLink};
use scale_link::ble::peer::{AddressKind, HandleRange, PeerAddress};
use scale_link::ble::radio::{ConnHandle, LinkTimer, Radio, RadioEvent, ScanParams};
use scale_link::ble::uuid::{CCCD, NOTIFY_CHARACTERISTIC, SCALE_SERVICE, WRITE_CHARACTERISTIC};
use scale_link::config::{
    BLE_ATT_MTU, BLE_CONNECT_TIMEOUT, BLE_CONN_INTERVAL_MAX, BLE_CONN_INTERVAL_MIN,
    BLE_SLAVE_LATENCY, BLE_SUP_TIMEOUT, LINK_REQUEST_DEPTH,
};
use scale_link::error::RadioError;
use scale_link::scale::protocol::COMMAND_FRAME_SIZE;

use gatt::{ScaleGattClient, WeightNotification};

pub type LinkReceiver = Receiver<'static, CriticalSectionRawMutex, LinkRequest, LINK_REQUEST_DEPTH>;

const REQUEST_QUEUE_DEPTH: usize = 8;

/// Pause before reporting a failed scan, so a persistent fault cannot spin.
const SCAN_RETRY_MS: u64 = 500;

/// HCI "connection terminated by local host".
const LOCAL_HOST_TERMINATED: u8 = 0x16;

#[derive(defmt::Format)]
enum Request {
    StartScan(ScanParams),
    StopScan,
    Connect(PeerAddress),
    CancelConnect,
    ExchangeMtu,
    DiscoverServices,
    DiscoverCharacteristics,
    DiscoverDescriptors(HandleRange),
    Subscribe(u16),
    WriteDescriptor(u16, Vec<u8, 2>),
    Write(u16, Vec<u8, COMMAND_FRAME_SIZE>),
    Terminate,
}

/// [`Radio`] implementation that defers every request to [`ble_task`].
pub struct SoftdeviceRadio {
    queue: Deque<Request, REQUEST_QUEUE_DEPTH>,
    priming_at: Option<Instant>,
    guard_at: Option<Instant>,
}

impl SoftdeviceRadio {
    pub const fn new() -> Self {
        Self {
            queue: Deque::new(),
            priming_at: None,
            guard_at: None,
        }
    }

    fn push(&mut self, request: Request) -> Result<(), RadioError> {
        self.queue.push_back(request).map_err(|_| RadioError::Busy)
    }

    fn next_deadline(&self) -> Instant {
        [self.priming_at, self.guard_at]
            .into_iter()
            .flatten()
            .min()
            .unwrap_or(Instant::MAX)
    }

    fn take_expired(&mut self, now: Instant) -> Option<LinkTimer> {
        if self.priming_at.is_some_and(|at| at <= now) {
            self.priming_at = None;
            return Some(LinkTimer::Priming);
        }
        if self.guard_at.is_some_and(|at| at <= now) {
            self.guard_at = None;
            return Some(LinkTimer::StepGuard);
        }
        None
    }
}

impl Radio for SoftdeviceRadio {
    fn start_scan(&mut self, params: &ScanParams) -> Result<(), RadioError> {
        self.push(Request::StartScan(*params))
    }

    fn stop_scan(&mut self) -> Result<(), RadioError> {
        self.push(Request::StopScan)
    }

    fn connect(&mut self, peer: &PeerAddress) -> Result<(), RadioError> {
        self.push(Request::Connect(*peer))
    }

    fn cancel_connect(&mut self) -> Result<(), RadioError> {
        self.push(Request::CancelConnect)
    }

    fn exchange_mtu(&mut self, _conn: ConnHandle) -> Result<(), RadioError> {
        self.push(Request::ExchangeMtu)
    }

    fn discover_services(&mut self, _conn: ConnHandle) -> Result<(), RadioError> {
        self.push(Request::DiscoverServices)
    }

    fn discover_characteristics(
        &mut self,
        _conn: ConnHandle,
        _range: HandleRange,
    ) -> Result<(), RadioError> {
        self.push(Request::DiscoverCharacteristics)
    }

    fn discover_descriptors(
        &mut self,
        _conn: ConnHandle,
        range: HandleRange,
    ) -> Result<(), RadioError> {
        self.push(Request::DiscoverDescriptors(range))
    }

    fn subscribe(&mut self, _conn: ConnHandle, value_handle: u16) -> Result<(), RadioError> {
        self.push(Request::Subscribe(value_handle))
    }

    fn write_descriptor(
        &mut self,
        _conn: ConnHandle,
        handle: u16,
        value: &[u8],
    ) -> Result<(), RadioError> {
        let value = Vec::from_slice(value).map_err(|_| RadioError::WriteFailed)?;
        self.push(Request::WriteDescriptor(handle, value))
    }

    fn write_with_response(
        &mut self,
        _conn: ConnHandle,
        handle: u16,
        value: &[u8],
    ) -> Result<(), RadioError> {
        let value = Vec::from_slice(value).map_err(|_| RadioError::WriteFailed)?;
        self.push(Request::Write(handle, value))
    }

    fn terminate(&mut self, _conn: ConnHandle) -> Result<(), RadioError> {
        self.push(Request::Terminate)
    }

    fn start_timer(&mut self, timer: LinkTimer, ms: u32) -> Result<(), RadioError> {
        let at = Instant::now() + Duration::from_millis(ms as u64);
        match timer {
            LinkTimer::Priming => self.priming_at = Some(at),
            LinkTimer::StepGuard => self.guard_at = Some(at),
        }
        Ok(())
    }

    fn cancel_timer(&mut self, timer: LinkTimer) {
        match timer {
            LinkTimer::Priming => self.priming_at = None,
            LinkTimer::StepGuard => self.guard_at = None,
        }
    }
}

fn raw_code(raw: RawError) -> u32 {
    raw as u32
}

fn peer_address(raw_addr: &raw::ble_gap_addr_t) -> PeerAddress {
    let address = Address::from_raw(*raw_addr);
    let kind = match address.address_type() {
        AddressType::Public => AddressKind::Public,
        AddressType::RandomStatic => AddressKind::RandomStatic,
        AddressType::RandomPrivateResolvable => AddressKind::RandomPrivateResolvable,
        _ => AddressKind::RandomPrivateNonResolvable,
    };
    PeerAddress {
        bytes: address.bytes(),
        kind,
    }
}

fn sd_address(peer: &PeerAddress) -> Address {
    let kind = match peer.kind {
        AddressKind::Public => AddressType::Public,
        AddressKind::RandomStatic => AddressType::RandomStatic,
        AddressKind::RandomPrivateResolvable => AddressType::RandomPrivateResolvable,
        AddressKind::RandomPrivateNonResolvable => AddressType::RandomPrivateNonResolvable,
    };
    Address::new(kind, peer.bytes)
}

type Link = ScaleLink<'static, CriticalSectionRawMutex>;

/// Stack-side state: what is currently running on the SoftDevice.
struct Stack {
    sd: &'static Softdevice,
    scan: Option<ScanParams>,
    connect_to: Option<PeerAddress>,
    conn: Option<Connection>,
    conn_handle: ConnHandle,
    client: Option<ScaleGattClient>,
}

impl Stack {
    fn new(sd: &'static Softdevice) -> Self {
        Self {
            sd,
            scan: None,
            connect_to: None,
            conn: None,
            conn_handle: 0,
            client: None,
        }
    }

    async fn execute(&mut self, request: Request, link: &mut Link, radio: &mut SoftdeviceRadio) {
        debug!("radio: {}", request);
        let conn_handle = self.conn_handle;
        match request {
            Request::StartScan(params) => self.scan = Some(params),
            Request::StopScan => self.scan = None,
            Request::Connect(peer) => self.connect_to = Some(peer),
            Request::CancelConnect => self.connect_to = None,

            Request::ExchangeMtu => {
                // The exchange already ran inside the connect procedure
                // (`ConnectConfig::att_mtu`).
                let result = if self.conn.is_some() {
                    Ok(BLE_ATT_MTU)
                } else {
                    Err(RadioError::NotConnected)
                };
                link.handle_event(
                    RadioEvent::MtuExchanged {
                        conn: conn_handle,
                        result,
                    },
                    radio,
                );
            }

            Request::DiscoverServices => {
                let result = match self.conn.as_ref() {
                    Some(conn) => match gatt_client::discover::<ScaleGattClient>(conn).await {
                        Ok(client) => {
                            if let Some(range) = client.range() {
                                link.handle_event(
                                    RadioEvent::ServiceDiscovered {
                                        conn: conn_handle,
                                        uuid: SCALE_SERVICE,
                                        range,
                                    },
                                    radio,
                                );
                            }
                            self.client = Some(client);
                            Ok(())
                        }
                        // Discovery finished without a match; the link decides.
                        Err(DiscoverError::ServiceNotFound) => Ok(()),
                        Err(e) => {
                            warn!("GATT discovery error: {}", e);
                            Err(RadioError::DiscoveryFailed)
                        }
                    },
                    None => Err(RadioError::NotConnected),
                };
                link.handle_event(
                    RadioEvent::ServiceDiscoveryComplete {
                        conn: conn_handle,
                        result,
                    },
                    radio,
                );
            }

            Request::DiscoverCharacteristics => {
                let found = self.client.as_ref().map(|c| (c.write_handle, c.notify_handle));
                let result = match found {
                    Some((write, notify)) => {
                        for (uuid, handle) in [(WRITE_CHARACTERISTIC, write), (NOTIFY_CHARACTERISTIC, notify)] {
                            if let Some(value_handle) = handle {
                                link.handle_event(
                                    RadioEvent::CharacteristicDiscovered {
                                        conn: conn_handle,
                                        uuid,
                                        value_handle,
                                    },
                                    radio,
                                );
                            }
                        }
                        Ok(())
                    }
                    None => Err(RadioError::DiscoveryFailed),
                };
                link.handle_event(
                    RadioEvent::CharacteristicDiscoveryComplete {
                        conn: conn_handle,
                        result,
                    },
                    radio,
                );
            }

            Request::DiscoverDescriptors(range) => {
                let result = match self.client.as_ref() {
                    Some(client) => {
                        if let Some(handle) = client.cccd_handle.filter(|h| range.contains(*h)) {
                            link.handle_event(
                                RadioEvent::DescriptorDiscovered {
                                    conn: conn_handle,
                                    uuid: CCCD,
                                    handle,
                                },
                                radio,
                            );
                        }
                        Ok(())
                    }
                    None => Err(RadioError::DiscoveryFailed),
                };
                link.handle_event(
                    RadioEvent::DescriptorDiscoveryComplete {
                        conn: conn_handle,
                        result,
                    },
                    radio,
                );
            }

            Request::Subscribe(value_handle) => {
                let result = match self.client.as_mut() {
                    Some(client) => {
                        client.subscribed = Some(value_handle);
                        Ok(())
                    }
                    None => Err(RadioError::NotifyFailed),
                };
                link.handle_event(
                    RadioEvent::NotifyRegistered {
                        conn: conn_handle,
                        result,
                    },
                    radio,
                );
            }

            Request::WriteDescriptor(handle, value) => {
                let result = self.write(handle, &value).await;
                link.handle_event(
                    RadioEvent::DescriptorWritten {
                        conn: conn_handle,
                        result,
                    },
                    radio,
                );
            }

            Request::Write(handle, value) => {
                let result = self.write(handle, &value).await;
                link.handle_event(
                    RadioEvent::WriteComplete {
                        conn: conn_handle,
                        result,
                    },
                    radio,
                );
            }

            Request::Terminate => {
                if let Some(conn) = self.conn.take() {
                    if conn.disconnect().is_err() {
                        debug!("link already down");
                    }
                    self.client = None;
                    link.handle_event(
                        RadioEvent::Disconnected {
                            conn: conn_handle,
                            reason: LOCAL_HOST_TERMINATED,
                        },
                        radio,
                    );
                }
            }
        }
    }

    async fn write(&self, handle: u16, value: &[u8]) -> Result<(), RadioError> {
        let conn = self.conn.as_ref().ok_or(RadioError::NotConnected)?;
        gatt_client::write(conn, handle, value).await.map_err(|e| {
            warn!("GATT write to {} failed: {}", handle, e);
            match e {
                gatt_client::WriteError::Raw(raw) => RadioError::Raw(raw_code(raw)),
                _ => RadioError::WriteFailed,
            }
        })
    }

    /// Wait for the next thing that needs the link's attention.
    async fn wait(&mut self, link: &mut Link, radio: &mut SoftdeviceRadio, requests: &LinkReceiver) {
        let deadline = radio.next_deadline();

        if let (Some(conn), Some(client)) = (self.conn.as_ref(), self.client.as_ref()) {
            let conn_handle = self.conn_handle;
            let outcome = select3(
                requests.receive(),
                Timer::at(deadline),
                gatt_client::run(conn, client, |n: WeightNotification| {
                    link.handle_event(
                        RadioEvent::Notification {
                            conn: conn_handle,
                            handle: n.handle,
                            data: &n.data,
                        },
                        radio,
                    );
                }),
            )
            .await;
            match outcome {
                Either3::First(request) => link.handle_request(request, radio),
                Either3::Second(()) => fire_timers(link, radio),
                Either3::Third(_) => {
                    self.conn = None;
                    self.client = None;
                    // `run` only reports that the link is gone, not why.
                    link.handle_event(
                        RadioEvent::Disconnected {
                            conn: conn_handle,
                            reason: 0,
                        },
                        radio,
                    );
                }
            }
            return;
        }

        if let Some(peer) = self.connect_to {
            let address = sd_address(&peer);
            let whitelist = [&address];
            let mut config = central::ConnectConfig::default();
            config.scan_config.whitelist = Some(&whitelist);
            config.scan_config.timeout = BLE_CONNECT_TIMEOUT;
            config.conn_params = raw::ble_gap_conn_params_t {
                min_conn_interval: BLE_CONN_INTERVAL_MIN,
                max_conn_interval: BLE_CONN_INTERVAL_MAX,
                slave_latency: BLE_SLAVE_LATENCY,
                conn_sup_timeout: BLE_SUP_TIMEOUT,
            };
            config.att_mtu = Some(BLE_ATT_MTU);

            let outcome = select3(
                requests.receive(),
                Timer::at(deadline),
                central::connect(self.sd, &config),
            )
            .await;
            match outcome {
                Either3::First(request) => link.handle_request(request, radio),
                Either3::Second(()) => fire_timers(link, radio),
                Either3::Third(Ok(conn)) => {
                    self.connect_to = None;
                    self.conn_handle = conn.handle().unwrap_or_default();
                    self.conn = Some(conn);
                    link.handle_event(
                        RadioEvent::Connected {
                            conn: self.conn_handle,
                        },
                        radio,
                    );
                }
                Either3::Third(Err(e)) => {
                    warn!("connect error: {}", e);
                    self.connect_to = None;
                    // Timeouts and a full connection table carry no stack code.
                    let status = match e {
                        central::ConnectError::Raw(raw) => raw_code(raw),
                        _ => 0,
                    };
                    link.handle_event(RadioEvent::ConnectFailed { status }, radio);
                }
            }
            return;
        }

        if let Some(params) = self.scan {
            // The SoftDevice reports every advertising event unless told
            // otherwise, which is what `filter_duplicates: false` asks for.
            let config = central::ScanConfig {
                active: params.active,
                ..Default::default()
            };
            let outcome = select3(
                requests.receive(),
                Timer::at(deadline),
                central::scan(self.sd, &config, |report| {
                    let data = unsafe {
                        core::slice::from_raw_parts(report.data.p_data, report.data.len as usize)
                    };
                    link.handle_event(
                        RadioEvent::Advertisement {
                            address: peer_address(&report.peer_addr),
                            data,
                        },
                        radio,
                    );
                    (link.phase() != ConnectionPhase::Scanning).then_some(())
                }),
            )
            .await;
            match outcome {
                Either3::First(request) => link.handle_request(request, radio),
                Either3::Second(()) => fire_timers(link, radio),
                Either3::Third(Ok(())) => {}
                Either3::Third(Err(e)) => {
                    warn!("scan error: {}", e);
                    self.scan = None;
                    Timer::after_millis(SCAN_RETRY_MS).await;
                    link.handle_event(RadioEvent::ScanComplete, radio);
                }
            }
            return;
        }

        match select(requests.receive(), Timer::at(deadline)).await {
            Either::First(request) => link.handle_request(request, radio),
            Either::Second(()) => fire_timers(link, radio),
        }
    }
}

fn fire_timers(link: &mut Link, radio: &mut SoftdeviceRadio) {
    let now = Instant::now();
    while let Some(timer) = radio.take_expired(now) {
        link.handle_event(RadioEvent::TimerExpired(timer), radio);
    }
}

/// Run the scale link on the SoftDevice. Never returns.
pub async fn ble_task(sd: &'static Softdevice, link: &mut Link, requests: LinkReceiver) -> ! {
    info!("BLE task started");
    let mut radio = SoftdeviceRadio::new();
    let mut stack = Stack::new(sd);

    loop {
        while let Some(request) = radio.queue.pop_front() {
            stack.execute(request, link, &mut radio).await;
        }
        stack.wait(link, &mut radio, &requests).await;
    }
}
