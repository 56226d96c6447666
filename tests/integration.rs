//! Integration tests for scale-link host-testable logic.

use std::sync::atomic::{AtomicBool, Ordering};
use std::thread;

use embassy_sync::blocking_mutex::raw::CriticalSectionRawMutex;
use embassy_sync::channel::Channel;

use scale_link::ble::peer::{AddressKind, HandleRange, PeerAddress};
use scale_link::ble::radio::{ConnHandle, LinkTimer, Radio, RadioEvent, ScanParams};
use scale_link::ble::uuid::{CCCD, NOTIFY_CHARACTERISTIC, SCALE_SERVICE, WRITE_CHARACTERISTIC};
use scale_link::scale::protocol;
use scale_link::timer::BrewTimer;
use scale_link::{ConnectionPhase, LinkRequest, RadioError, ScaleClient, ScaleLink, ScaleState};

/// Radio that accepts everything and keeps the characteristic writes.
#[derive(Default)]
struct Recorder {
    writes: Vec<(u16, Vec<u8>)>,
    scans: usize,
}

impl Radio for Recorder {
    fn start_scan(&mut self, _params: &ScanParams) -> Result<(), RadioError> {
        self.scans += 1;
        Ok(())
    }
    fn stop_scan(&mut self) -> Result<(), RadioError> {
        Ok(())
    }
    fn connect(&mut self, _peer: &PeerAddress) -> Result<(), RadioError> {
        Ok(())
    }
    fn cancel_connect(&mut self) -> Result<(), RadioError> {
        Ok(())
    }
    fn exchange_mtu(&mut self, _conn: ConnHandle) -> Result<(), RadioError> {
        Ok(())
    }
    fn discover_services(&mut self, _conn: ConnHandle) -> Result<(), RadioError> {
        Ok(())
    }
    fn discover_characteristics(&mut self, _: ConnHandle, _: HandleRange) -> Result<(), RadioError> {
        Ok(())
    }
    fn discover_descriptors(&mut self, _: ConnHandle, _: HandleRange) -> Result<(), RadioError> {
        Ok(())
    }
    fn subscribe(&mut self, _conn: ConnHandle, _value_handle: u16) -> Result<(), RadioError> {
        Ok(())
    }
    fn write_descriptor(&mut self, _: ConnHandle, _: u16, _: &[u8]) -> Result<(), RadioError> {
        Ok(())
    }
    fn write_with_response(
        &mut self,
        _conn: ConnHandle,
        handle: u16,
        value: &[u8],
    ) -> Result<(), RadioError> {
        self.writes.push((handle, value.to_vec()));
        Ok(())
    }
    fn terminate(&mut self, _conn: ConnHandle) -> Result<(), RadioError> {
        Ok(())
    }
    fn start_timer(&mut self, _timer: LinkTimer, _ms: u32) -> Result<(), RadioError> {
        Ok(())
    }
    fn cancel_timer(&mut self, _timer: LinkTimer) {}
}

const CONN: ConnHandle = 3;
const WRITE: u16 = 0x0025;
const NOTIFY: u16 = 0x0028;

/// Feed the stack's side of a successful bring-up.
fn bring_up<M>(link: &mut ScaleLink<'_, M>, radio: &mut Recorder)
where
    M: embassy_sync::blocking_mutex::raw::RawMutex,
{
    let range = HandleRange {
        start: 0x0020,
        end: 0x002F,
    };
    let adv = [
        0x02, 0x01, 0x06, 0x0D, 0x09, b'D', b'e', b'c', b'e', b'n', b't', b' ', b'S', b'c', b'a',
        b'l', b'e',
    ];
    let events = [
        RadioEvent::Advertisement {
            address: PeerAddress {
                bytes: [1, 2, 3, 4, 5, 6],
                kind: AddressKind::Public,
            },
            data: &adv,
        },
        RadioEvent::Connected { conn: CONN },
        RadioEvent::MtuExchanged {
            conn: CONN,
            result: Ok(247),
        },
        RadioEvent::ServiceDiscovered {
            conn: CONN,
            uuid: SCALE_SERVICE,
            range,
        },
        RadioEvent::ServiceDiscoveryComplete {
            conn: CONN,
            result: Ok(()),
        },
        RadioEvent::CharacteristicDiscovered {
            conn: CONN,
            uuid: WRITE_CHARACTERISTIC,
            value_handle: WRITE,
        },
        RadioEvent::CharacteristicDiscovered {
            conn: CONN,
            uuid: NOTIFY_CHARACTERISTIC,
            value_handle: NOTIFY,
        },
        RadioEvent::CharacteristicDiscoveryComplete {
            conn: CONN,
            result: Ok(()),
        },
        RadioEvent::DescriptorDiscovered {
            conn: CONN,
            uuid: CCCD,
            handle: NOTIFY + 1,
        },
        RadioEvent::DescriptorDiscoveryComplete {
            conn: CONN,
            result: Ok(()),
        },
        RadioEvent::NotifyRegistered {
            conn: CONN,
            result: Ok(()),
        },
        RadioEvent::DescriptorWritten {
            conn: CONN,
            result: Ok(()),
        },
        RadioEvent::TimerExpired(LinkTimer::Priming),
        RadioEvent::TimerExpired(LinkTimer::Priming),
    ];
    for event in events {
        link.handle_event(event, radio);
    }
}

#[test]
fn client_requests_drive_the_link_end_to_end() {
    let state = ScaleState::<CriticalSectionRawMutex>::new();
    let requests = Channel::<CriticalSectionRawMutex, LinkRequest, 4>::new();
    let client = ScaleClient::new(&state, requests.sender());
    let mut link = ScaleLink::new(&state);
    let mut radio = Recorder::default();

    // Not ready yet: commands are dropped on the consumer side.
    client.tare();
    client.connect();
    while let Ok(request) = requests.try_receive() {
        link.handle_request(request, &mut radio);
    }
    assert_eq!(link.phase(), ConnectionPhase::Scanning);
    assert_eq!(radio.scans, 1);

    bring_up(&mut link, &mut radio);
    assert!(client.is_ready());
    let priming_writes = radio.writes.len();
    assert_eq!(priming_writes, 3);

    link.handle_event(
        RadioEvent::Notification {
            conn: CONN,
            handle: NOTIFY,
            data: &[0x03, 0xCE, 0x01, 0xF4, 0x00, 0x00, 0x38],
        },
        &mut radio,
    );
    assert_eq!(client.get_weight(), 500);

    client.tare();
    client.led_on_ounce();
    while let Ok(request) = requests.try_receive() {
        link.handle_request(request, &mut radio);
    }
    assert_eq!(
        &radio.writes[priming_writes..],
        &[
            (WRITE, protocol::TARE.as_bytes().to_vec()),
            (WRITE, protocol::LED_ON_OUNCE.as_bytes().to_vec()),
        ]
    );
}

#[test]
fn lost_link_blocks_commands_until_rescanned() {
    let state = ScaleState::<CriticalSectionRawMutex>::new();
    let requests = Channel::<CriticalSectionRawMutex, LinkRequest, 4>::new();
    let client = ScaleClient::new(&state, requests.sender());
    let mut link = ScaleLink::new(&state);
    let mut radio = Recorder::default();

    link.connect(&mut radio);
    bring_up(&mut link, &mut radio);
    link.handle_event(
        RadioEvent::Disconnected {
            conn: CONN,
            reason: 0x08,
        },
        &mut radio,
    );
    assert_eq!(link.phase(), ConnectionPhase::Scanning);
    assert_eq!(radio.scans, 2);
    assert!(!client.is_ready());

    client.power_off();
    assert!(requests.try_receive().is_err());

    // A request that raced the disconnect is re-checked on the radio side.
    let before = radio.writes.len();
    link.handle_request(
        LinkRequest::Command(scale_link::ScaleCommand::PowerOff),
        &mut radio,
    );
    assert_eq!(radio.writes.len(), before);
}

#[test]
fn brew_timer_follows_link_readiness() {
    let state = ScaleState::<CriticalSectionRawMutex>::new();
    let mut link = ScaleLink::new(&state);
    let mut radio = Recorder::default();
    let mut timer = BrewTimer::new();

    timer.start_stop();
    assert_eq!(timer.tick(state.is_ready()), 0);

    link.connect(&mut radio);
    bring_up(&mut link, &mut radio);
    assert_eq!(timer.tick(state.is_ready()), 1);
    assert_eq!(timer.tick(state.is_ready()), 2);
}

static SHARED: ScaleState<CriticalSectionRawMutex> = ScaleState::new();

#[test]
fn concurrent_weight_access_never_tears() {
    // Two patterns that differ in both bytes; any mix would be a torn read.
    const A: i16 = 0x7F00;
    const B: i16 = 0x00FF;
    static DONE: AtomicBool = AtomicBool::new(false);

    let writer = thread::spawn(|| {
        for i in 0..100_000 {
            SHARED.set_weight(if i % 2 == 0 { A } else { B });
        }
        DONE.store(true, Ordering::Release);
    });

    let reader = thread::spawn(|| {
        let mut reads = 0u64;
        while !DONE.load(Ordering::Acquire) || reads == 0 {
            let w = SHARED.get_weight();
            assert!(w == 0 || w == A || w == B, "torn read: {:#06x}", w);
            reads += 1;
        }
    });

    writer.join().unwrap();
    reader.join().unwrap();
    assert!(matches!(SHARED.get_weight(), A | B));
}
