// crates/thread-mac-rs/src/mac/tests.rs
use super::*;
use crate::config::MacConfig;
use crate::frame::{BeaconPayload, Frame, FrameType, deserialize_frame};
use crate::hal::{MacError, RadioCaps, RadioDriver, RxFrame, TxDone, TxRequest};
use crate::neighbor::{Neighbor, NeighborList, NeighborRole, NeighborTable};
use crate::security::{AesCcmCipher, KeyTable};
use crate::types::{Channel, ChannelMask, ExtAddress, MacAddress, PanId, ShortAddress};
use alloc::boxed::Box;
use alloc::collections::BTreeMap;
use alloc::rc::Rc;
use alloc::vec;
use alloc::vec::Vec;
use core::cell::RefCell;

mod test_utils {
    use super::*;

    pub const OWN_EXT: ExtAddress = ExtAddress([0xaa, 0, 0, 0, 0, 0, 0, 0x01]);
    pub const OWN_SHORT: ShortAddress = ShortAddress(0x0400);
    pub const PEER_SHORT: ShortAddress = ShortAddress(0x0800);
    pub const PAN: PanId = PanId(0xface);

    #[derive(Debug, Clone, PartialEq)]
    pub struct Transmission {
        pub psdu: Vec<u8>,
        pub channel: Channel,
        pub cca: bool,
        pub tx_at_us: Option<u64>,
    }

    impl Transmission {
        pub fn frame(&self) -> Frame {
            deserialize_frame(&self.psdu).unwrap()
        }
    }

    #[derive(Debug, Default)]
    pub struct MockRadio {
        pub caps: RadioCaps,
        pub transmissions: Vec<Transmission>,
        pub listening_on: Option<Channel>,
        pub rssi: Vec<i8>,
        pub energy_scans: Vec<Channel>,
    }

    impl RadioDriver for MockRadio {
        fn capabilities(&self) -> RadioCaps {
            self.caps
        }
        fn ext_address(&self) -> ExtAddress {
            OWN_EXT
        }
        fn receive(&mut self, channel: Channel) -> Result<(), MacError> {
            self.listening_on = Some(channel);
            Ok(())
        }
        fn sleep(&mut self) -> Result<(), MacError> {
            self.listening_on = None;
            Ok(())
        }
        fn transmit(&mut self, request: &TxRequest<'_>) -> Result<(), MacError> {
            self.transmissions.push(Transmission {
                psdu: request.psdu.to_vec(),
                channel: request.channel,
                cca: request.cca,
                tx_at_us: request.tx_at_us,
            });
            Ok(())
        }
        fn energy_scan(&mut self, channel: Channel, _duration_ms: u16) -> Result<(), MacError> {
            self.energy_scans.push(channel);
            Ok(())
        }
        fn rssi(&mut self) -> Option<i8> {
            if self.rssi.is_empty() { None } else { Some(self.rssi.remove(0)) }
        }
    }

    /// Always draws the largest backoff.
    pub struct MaxRng;

    impl rand_core::RngCore for MaxRng {
        fn next_u32(&mut self) -> u32 {
            u32::MAX
        }
        fn next_u64(&mut self) -> u64 {
            u64::MAX
        }
        fn fill_bytes(&mut self, dest: &mut [u8]) {
            dest.fill(0xff);
        }
        fn try_fill_bytes(&mut self, dest: &mut [u8]) -> Result<(), rand_core::Error> {
            dest.fill(0xff);
            Ok(())
        }
    }

    #[derive(Default)]
    pub struct TestClient {
        pub frames: BTreeMap<SenderId, Frame>,
        pub sent: Vec<(SenderId, Result<(), MacError>)>,
        pub received: Vec<Frame>,
        pub poll_timeouts: u32,
        pub data_requests: Vec<MacAddress>,
        /// Frames still to be supplied through `SendMore`, per sender.
        pub follow_ons: BTreeMap<SenderId, u8>,
    }

    impl TestClient {
        pub fn with_frame(mut self, sender: SenderId, frame: Frame) -> Self {
            self.frames.insert(sender, frame);
            self
        }
    }

    impl MacClient for TestClient {
        fn handle_frame_request(
            &mut self,
            sender: SenderId,
            frame: &mut Frame,
            _neighbors: &mut dyn NeighborTable,
        ) -> Result<(), MacError> {
            *frame = self.frames.get(&sender).cloned().ok_or(MacError::NotFound)?;
            Ok(())
        }

        fn handle_sent_frame(
            &mut self,
            sender: SenderId,
            _frame: &Frame,
            result: Result<(), MacError>,
            _neighbors: &mut dyn NeighborTable,
        ) -> SendDisposition {
            self.sent.push((sender, result));
            match self.follow_ons.get_mut(&sender) {
                Some(left) if *left > 0 => {
                    *left -= 1;
                    SendDisposition::SendMore
                }
                _ => SendDisposition::Done,
            }
        }

        fn handle_received_frame(
            &mut self,
            _receiver: ReceiverId,
            frame: &Frame,
            _neighbors: &mut dyn NeighborTable,
        ) -> bool {
            self.received.push(frame.clone());
            true
        }

        fn handle_data_poll_timeout(&mut self, _receiver: ReceiverId) {
            self.poll_timeouts += 1;
        }

        fn handle_data_request(&mut self, src: &MacAddress, _neighbors: &mut dyn NeighborTable) {
            self.data_requests.push(*src);
        }
    }

    pub type TestMac = MacScheduler<MockRadio, MaxRng, KeyTable, AesCcmCipher>;

    pub fn mac_with_caps(caps: RadioCaps) -> TestMac {
        let radio = MockRadio { caps, ..MockRadio::default() };
        let mut mac = MacScheduler::new(radio, MaxRng, KeyTable::new(0), AesCcmCipher, MacConfig::default());
        mac.set_pan_id(PAN);
        mac.set_short_address(OWN_SHORT);
        mac.start();
        mac
    }

    pub fn unicast_frame() -> Frame {
        Frame::new_data(PAN, MacAddress::Short(PEER_SHORT), MacAddress::Short(OWN_SHORT))
    }

    pub fn neighbors() -> NeighborList {
        let mut list = NeighborList::new(2, 2);
        list.add_router(Neighbor::new(ExtAddress([0xbb; 8]), PEER_SHORT, NeighborRole::Router))
            .unwrap();
        list
    }

    /// Ticks at every deadline until the radio has `count` transmissions.
    pub fn run_until_transmissions(
        mac: &mut TestMac,
        now: &mut u64,
        count: usize,
        client: &mut TestClient,
        neighbors: &mut NeighborList,
    ) {
        for _ in 0..64 {
            if mac.radio().transmissions.len() >= count {
                return;
            }
            let deadline = mac.next_deadline().expect("no deadline pending");
            *now = (*now).max(deadline);
            mac.tick(*now, client, neighbors);
        }
        panic!("radio never reached {} transmissions", count);
    }
}

use test_utils::*;

#[test]
fn test_duplicate_send_request_is_rejected() {
    let mut mac = mac_with_caps(RadioCaps::empty());
    let mut client = TestClient::default()
        .with_frame(SenderId(1), unicast_frame())
        .with_frame(SenderId(2), unicast_frame());
    let mut nbrs = neighbors();

    mac.send_frame_request(0, SenderId(1), &mut client, &mut nbrs).unwrap();
    assert_eq!(mac.operation(), Operation::TransmitData);
    // In flight.
    assert_eq!(
        mac.send_frame_request(0, SenderId(1), &mut client, &mut nbrs),
        Err(MacError::Already)
    );

    mac.send_frame_request(0, SenderId(2), &mut client, &mut nbrs).unwrap();
    assert_eq!(mac.queued_sender_count(), 1);
    assert_eq!(
        mac.send_frame_request(0, SenderId(2), &mut client, &mut nbrs),
        Err(MacError::Already)
    );
    assert_eq!(mac.queued_sender_count(), 1);
}

#[test]
fn test_send_request_requires_enabled_mac() {
    let mut mac = mac_with_caps(RadioCaps::empty());
    mac.stop();
    let mut client = TestClient::default().with_frame(SenderId(1), unicast_frame());
    assert_eq!(
        mac.send_frame_request(0, SenderId(1), &mut client, &mut neighbors()),
        Err(MacError::InvalidState)
    );
    assert_eq!(mac.queued_sender_count(), 0);
}

#[test]
fn test_csma_backoff_exponent_and_channel_access_failure() {
    let mut mac = mac_with_caps(RadioCaps::ACK_TIMEOUT);
    let mut client = TestClient::default().with_frame(SenderId(1), unicast_frame());
    let mut nbrs = neighbors();
    let mut now = 1_000;

    mac.send_frame_request(now, SenderId(1), &mut client, &mut nbrs).unwrap();
    // BE = min(3 + k, 5); the RNG draws the top of the window.
    let expected_be = [3u32, 4, 5, 5, 5];
    for (k, be) in expected_be.iter().enumerate() {
        let deadline = mac.next_deadline().unwrap();
        assert_eq!(deadline - now, ((1u64 << be) - 1) * 320, "attempt {}", k);
        now = deadline;
        mac.tick(now, &mut client, &mut nbrs);
        assert_eq!(mac.radio().transmissions.len(), k + 1);
        mac.handle_transmit_done(now, Err(MacError::ChannelAccessFailure), &mut client, &mut nbrs);
    }

    assert_eq!(client.sent, vec![(SenderId(1), Err(MacError::ChannelAccessFailure))]);
    assert_eq!(mac.operation(), Operation::Idle);
    assert_eq!(mac.next_deadline(), None);
    assert_eq!(mac.radio().transmissions.len(), 5);
    assert_eq!(mac.counters().tx_err_cca, 1);
    assert_eq!(mac.cca_failure_rate(), counters::C_MAX_RATE);
}

#[test]
fn test_software_ack_timeout_retries_then_fails() {
    let mut mac = mac_with_caps(RadioCaps::empty());
    let mut client = TestClient::default().with_frame(SenderId(1), unicast_frame());
    let mut nbrs = neighbors();
    let mut now = 0;

    mac.send_frame_request(now, SenderId(1), &mut client, &mut nbrs).unwrap();
    for attempt in 1..=4 {
        run_until_transmissions(&mut mac, &mut now, attempt, &mut client, &mut nbrs);
        mac.handle_transmit_done(now, Ok(TxDone::default()), &mut client, &mut nbrs);
        // Waiting for the ack.
        assert_eq!(mac.next_deadline(), Some(now + 16_000));
        now += 16_000;
        mac.tick(now, &mut client, &mut nbrs);
    }

    assert_eq!(client.sent, vec![(SenderId(1), Err(MacError::NoAck))]);
    assert_eq!(mac.radio().transmissions.len(), 4);
    assert_eq!(mac.counters().tx_retry, 3);
    // Retries resend the identical frame.
    let psdus: Vec<_> = mac.radio().transmissions.iter().map(|t| t.psdu.clone()).collect();
    assert!(psdus.windows(2).all(|w| w[0] == w[1]));
    let peer = nbrs.find(&MacAddress::Short(PEER_SHORT)).unwrap();
    assert_eq!(peer.link_failures, 1);
}

#[test]
fn test_ack_with_frame_pending_arms_data_poll_timeout() {
    let mut mac = mac_with_caps(RadioCaps::empty());
    mac.register_receiver(ReceiverId(0)).unwrap();
    let mut client = TestClient::default().with_frame(SenderId(1), unicast_frame());
    let mut nbrs = neighbors();
    let mut now = 0;

    mac.send_frame_request(now, SenderId(1), &mut client, &mut nbrs).unwrap();
    run_until_transmissions(&mut mac, &mut now, 1, &mut client, &mut nbrs);
    mac.handle_transmit_done(now, Ok(TxDone::default()), &mut client, &mut nbrs);

    let seq = mac.radio().transmissions[0].frame().sequence;
    let ack = Frame::new_ack(seq, true).to_psdu().unwrap();
    now += 500;
    let rx = RxFrame { psdu: &ack, rssi: -40, channel: mac.channel() };
    mac.handle_receive_done(now, Ok(rx), &mut client, &mut nbrs);

    assert_eq!(client.sent, vec![(SenderId(1), Ok(()))]);
    // The radio keeps listening for the pending data.
    assert_eq!(mac.radio().listening_on, Some(mac.channel()));
    assert_eq!(mac.next_deadline(), Some(now + 100_000));

    mac.tick(now + 100_000, &mut client, &mut nbrs);
    assert_eq!(client.poll_timeouts, 1);
    assert_eq!(mac.radio().listening_on, None);
}

#[test]
fn test_follow_on_frame_runs_before_pending_scan() {
    let mut mac = mac_with_caps(RadioCaps::ACK_TIMEOUT);
    let mut client = TestClient::default().with_frame(SenderId(1), unicast_frame());
    client.follow_ons.insert(SenderId(1), 1);
    let mut nbrs = neighbors();
    let mut now = 0;

    mac.send_frame_request(now, SenderId(1), &mut client, &mut nbrs).unwrap();
    mac.active_scan(now, ChannelMask(1 << 15), 10, ScanHandler::None, &mut client, &mut nbrs)
        .unwrap();
    assert!(mac.is_active_scan_in_progress());
    assert_eq!(mac.operation(), Operation::TransmitData);

    run_until_transmissions(&mut mac, &mut now, 1, &mut client, &mut nbrs);
    mac.handle_transmit_done(now, Ok(TxDone::default()), &mut client, &mut nbrs);
    // The second fragment goes out before the scan starts.
    assert_eq!(mac.operation(), Operation::TransmitData);

    run_until_transmissions(&mut mac, &mut now, 2, &mut client, &mut nbrs);
    mac.handle_transmit_done(now, Ok(TxDone::default()), &mut client, &mut nbrs);
    assert_eq!(mac.operation(), Operation::ActiveScan);
    assert_eq!(client.sent.len(), 2);
}

#[test]
fn test_pending_scan_runs_before_queued_data() {
    let mut mac = mac_with_caps(RadioCaps::ACK_TIMEOUT);
    let mut client = TestClient::default()
        .with_frame(SenderId(1), unicast_frame())
        .with_frame(SenderId(2), unicast_frame());
    let mut nbrs = neighbors();
    let mut now = 0;

    mac.send_frame_request(now, SenderId(1), &mut client, &mut nbrs).unwrap();
    mac.send_frame_request(now, SenderId(2), &mut client, &mut nbrs).unwrap();
    mac.energy_scan(now, ChannelMask(1 << 20), 5, ScanHandler::None, &mut client, &mut nbrs)
        .unwrap();

    run_until_transmissions(&mut mac, &mut now, 1, &mut client, &mut nbrs);
    mac.handle_transmit_done(now, Ok(TxDone::default()), &mut client, &mut nbrs);

    assert_eq!(mac.operation(), Operation::EnergyScan);
    assert_eq!(mac.queued_sender_count(), 1);
}

#[test]
fn test_scan_requests_fail_when_busy_or_disabled() {
    let mut mac = mac_with_caps(RadioCaps::ACK_TIMEOUT);
    let mut client = TestClient::default();
    let mut nbrs = neighbors();

    mac.energy_scan(0, ChannelMask(1 << 11), 5, ScanHandler::None, &mut client, &mut nbrs)
        .unwrap();
    assert_eq!(
        mac.active_scan(0, ChannelMask(1 << 11), 5, ScanHandler::None, &mut client, &mut nbrs),
        Err(MacError::Busy)
    );

    let mut disabled = mac_with_caps(RadioCaps::ACK_TIMEOUT);
    disabled.stop();
    assert_eq!(
        disabled.active_scan(0, ChannelMask(0), 0, ScanHandler::None, &mut client, &mut nbrs),
        Err(MacError::InvalidState)
    );
}

#[test]
fn test_active_scan_dwells_on_each_masked_channel() {
    let mut mac = mac_with_caps(RadioCaps::ACK_TIMEOUT | RadioCaps::CSMA_BACKOFF);
    mac.register_receiver(ReceiverId(0)).unwrap();
    let mut client = TestClient::default();
    let mut nbrs = neighbors();

    let results: Rc<RefCell<Vec<Option<ActiveScanResult>>>> = Rc::default();
    let sink = results.clone();
    let handler = ScanHandler::Active(Box::new(move |r: Option<&ActiveScanResult>| {
        sink.borrow_mut().push(r.cloned())
    }));
    let mut now = 10_000;
    mac.active_scan(now, ChannelMask(0b101), 100, handler, &mut client, &mut nbrs).unwrap();

    // Channel 0: beacon request, then one beacon heard.
    assert_eq!(mac.radio().transmissions.len(), 1);
    let request = mac.radio().transmissions[0].clone();
    assert_eq!(request.channel, Channel(0));
    assert_eq!(request.frame().command_id(), Some(crate::frame::CommandId::BeaconRequest));
    mac.handle_transmit_done(now, Ok(TxDone::default()), &mut client, &mut nbrs);
    assert_eq!(mac.next_deadline(), Some(now + 100_000));

    let beacon = Frame {
        frame_type: FrameType::Beacon,
        version: crate::frame::FrameVersion::V2003,
        src_pan_id: Some(PanId(0x1234)),
        src: MacAddress::Extended(ExtAddress([0xcc; 8])),
        payload: BeaconPayload::new("OpenThread", [0xde; 8]).to_frame_payload(),
        ..Frame::default()
    };
    let psdu = beacon.to_psdu().unwrap();
    mac.handle_receive_done(
        now + 20_000,
        Ok(RxFrame { psdu: &psdu, rssi: -60, channel: Channel(0) }),
        &mut client,
        &mut nbrs,
    );

    // Channel 2.
    now += 100_000;
    mac.tick(now, &mut client, &mut nbrs);
    assert_eq!(mac.radio().transmissions[1].channel, Channel(2));
    mac.handle_transmit_done(now, Ok(TxDone::default()), &mut client, &mut nbrs);
    now += 100_000;
    mac.tick(now, &mut client, &mut nbrs);

    let results = results.borrow();
    assert_eq!(results.len(), 2);
    let first = results[0].as_ref().unwrap();
    assert_eq!(first.channel, Channel(0));
    assert_eq!(first.pan_id, PanId(0x1234));
    assert_eq!(
        first.beacon.as_ref().and_then(|b| b.network_name_str()),
        Some("OpenThread")
    );
    assert!(results[1].is_none());
    assert!(client.received.is_empty());
    assert_eq!(mac.operation(), Operation::Idle);
    assert!(!mac.is_active_scan_in_progress());
}

#[test]
fn test_software_energy_scan_reports_max_rssi() {
    let mut mac = mac_with_caps(RadioCaps::ACK_TIMEOUT);
    mac.radio_mut().rssi = vec![-90, -70, -85, -95];
    let mut client = TestClient::default();
    let mut nbrs = neighbors();

    let results: Rc<RefCell<Vec<Option<EnergyScanResult>>>> = Rc::default();
    let sink = results.clone();
    let handler = ScanHandler::Energy(Box::new(move |r: Option<&EnergyScanResult>| {
        sink.borrow_mut().push(r.copied())
    }));
    let mut now = 0;
    mac.energy_scan(now, ChannelMask(1 << 25), 3, handler, &mut client, &mut nbrs).unwrap();
    while let Some(deadline) = mac.next_deadline() {
        now = deadline;
        mac.tick(now, &mut client, &mut nbrs);
    }

    assert_eq!(
        *results.borrow(),
        vec![Some(EnergyScanResult { channel: Channel(25), max_rssi: -70 }), None]
    );
    assert_eq!(now, 3_000);
}

#[test]
fn test_hardware_energy_scan_waits_for_radio() {
    let mut mac = mac_with_caps(RadioCaps::ACK_TIMEOUT | RadioCaps::ENERGY_SCAN);
    let mut client = TestClient::default();
    let mut nbrs = neighbors();
    let count = Rc::new(RefCell::new(0));
    let seen = count.clone();
    let handler = ScanHandler::Energy(Box::new(move |_r: Option<&EnergyScanResult>| *seen.borrow_mut() += 1));

    mac.energy_scan(0, ChannelMask(0b11 << 11), 5, handler, &mut client, &mut nbrs).unwrap();
    assert_eq!(mac.radio().energy_scans, vec![Channel(11)]);
    mac.handle_energy_scan_done(5_000, -80, &mut client, &mut nbrs);
    assert_eq!(mac.radio().energy_scans, vec![Channel(11), Channel(12)]);
    mac.handle_energy_scan_done(10_000, -82, &mut client, &mut nbrs);

    assert_eq!(*count.borrow(), 3);
    assert!(!mac.is_energy_scan_in_progress());
}

#[test]
fn test_beacon_request_triggers_beacon_and_is_not_delivered() {
    let mut mac = mac_with_caps(RadioCaps::ACK_TIMEOUT);
    mac.register_receiver(ReceiverId(0)).unwrap();
    mac.set_beacon_enabled(true);
    mac.set_beacon_payload(BeaconPayload::new("thread-mac", [1; 8]));
    let mut client = TestClient::default();
    let mut nbrs = neighbors();
    let mut now = 0;

    let request = Frame::new_beacon_request(9).to_psdu().unwrap();
    mac.handle_receive_done(
        now,
        Ok(RxFrame { psdu: &request, rssi: -50, channel: mac.channel() }),
        &mut client,
        &mut nbrs,
    );
    assert_eq!(mac.operation(), Operation::TransmitBeacon);
    run_until_transmissions(&mut mac, &mut now, 1, &mut client, &mut nbrs);

    let beacon = mac.radio().transmissions[0].frame();
    assert_eq!(beacon.frame_type, FrameType::Beacon);
    assert_eq!(beacon.src, MacAddress::Extended(OWN_EXT));
    let payload = BeaconPayload::from_frame_payload(&beacon.payload).unwrap().unwrap();
    assert_eq!(payload.network_name_str(), Some("thread-mac"));
    assert!(client.received.is_empty());
    assert_eq!(mac.counters().rx_beacon_request, 1);
}

#[test]
fn test_data_request_is_routed_to_client() {
    let mut mac = mac_with_caps(RadioCaps::ACK_TIMEOUT);
    mac.register_receiver(ReceiverId(0)).unwrap();
    let mut client = TestClient::default();
    let mut nbrs = neighbors();

    let poll = Frame::new_command(
        crate::frame::CommandId::DataRequest,
        PAN,
        MacAddress::Short(OWN_SHORT),
        MacAddress::Short(PEER_SHORT),
    );
    let psdu = poll.to_psdu().unwrap();
    mac.handle_receive_done(
        0,
        Ok(RxFrame { psdu: &psdu, rssi: -50, channel: mac.channel() }),
        &mut client,
        &mut nbrs,
    );
    assert_eq!(client.data_requests, vec![MacAddress::Short(PEER_SHORT)]);
    assert!(client.received.is_empty());
}

#[test]
fn test_frames_for_other_destinations_are_filtered() {
    let mut mac = mac_with_caps(RadioCaps::ACK_TIMEOUT);
    mac.register_receiver(ReceiverId(0)).unwrap();
    let mut client = TestClient::default();
    let mut nbrs = neighbors();

    let mut frame = Frame::new_data(PAN, MacAddress::Short(ShortAddress(0x0c00)), MacAddress::Short(PEER_SHORT));
    frame.payload = vec![1, 2, 3];
    let psdu = frame.to_psdu().unwrap();
    let rx = || RxFrame { psdu: &psdu, rssi: -50, channel: Channel(11) };

    mac.handle_receive_done(0, Ok(rx()), &mut client, &mut nbrs);
    assert!(client.received.is_empty());
    assert_eq!(mac.counters().rx_dest_addr_filtered, 1);

    mac.set_promiscuous(true);
    mac.handle_receive_done(0, Ok(rx()), &mut client, &mut nbrs);
    assert_eq!(client.received.len(), 1);
    let peer = nbrs.find(&MacAddress::Short(PEER_SHORT)).unwrap();
    assert_eq!(peer.link_info.last_rssi(), Some(-50));
}

#[test]
fn test_purge_outcomes() {
    let mut mac = mac_with_caps(RadioCaps::ACK_TIMEOUT);
    let mut client = TestClient::default()
        .with_frame(SenderId(1), unicast_frame())
        .with_frame(SenderId(2), unicast_frame());
    let mut nbrs = neighbors();
    let mut now = 0;

    mac.send_frame_request(now, SenderId(1), &mut client, &mut nbrs).unwrap();
    mac.send_frame_request(now, SenderId(2), &mut client, &mut nbrs).unwrap();
    assert_eq!(mac.purge_frame_request(SenderId(2)), Ok(PurgeOutcome::Removed));
    assert_eq!(mac.purge_frame_request(SenderId(1)), Ok(PurgeOutcome::Aborted));
    assert_eq!(mac.operation(), Operation::Idle);
    // The aborted frame counts like any other failed transmission.
    assert_eq!(mac.counters().tx_total, 1);
    assert_eq!(mac.counters().tx_err_abort, 1);
    assert_eq!(mac.counters().tx_data, 1);
    assert_eq!(mac.purge_frame_request(SenderId(3)), Err(MacError::Already));

    mac.send_frame_request(now, SenderId(1), &mut client, &mut nbrs).unwrap();
    run_until_transmissions(&mut mac, &mut now, 1, &mut client, &mut nbrs);
    assert_eq!(mac.purge_frame_request(SenderId(1)), Err(MacError::Already));
    assert!(client.sent.is_empty());
}

#[test]
fn test_wakeup_frame_transmission_rules() {
    let mut mac = mac_with_caps(RadioCaps::ACK_TIMEOUT);
    let mut client = TestClient::default().with_frame(SenderId(1), unicast_frame());
    let mut nbrs = neighbors();
    let wakeup = Frame::new_data(PAN, MacAddress::Short(PEER_SHORT), MacAddress::Short(OWN_SHORT));

    mac.transmit_wakeup_frame(0, &wakeup, 5_000).unwrap();
    assert_eq!(mac.operation(), Operation::TransmitWakeup);
    let tx = mac.radio().transmissions[0].clone();
    assert_eq!(tx.tx_at_us, Some(5_000));
    assert!(!tx.cca);

    // Later frames of the burst queue up behind the one not yet on air.
    mac.transmit_wakeup_frame(1_000, &wakeup, 6_000).unwrap();
    mac.transmit_wakeup_frame(2_000, &wakeup, 7_000).unwrap();
    mac.transmit_wakeup_frame(3_000, &wakeup, 8_000).unwrap();
    assert_eq!(mac.transmit_wakeup_frame(3_000, &wakeup, 9_000), Err(MacError::Busy));
    assert_eq!(mac.radio().transmissions.len(), C_MAX_QUEUED_WAKEUP_FRAMES as usize);

    for (i, done_at) in [5_400, 6_400, 7_400].into_iter().enumerate() {
        mac.handle_transmit_done(done_at, Ok(TxDone::default()), &mut client, &mut nbrs);
        assert_eq!(mac.counters().tx_wakeup, i as u32 + 1);
        assert_eq!(mac.operation(), Operation::TransmitWakeup);
    }
    mac.handle_transmit_done(8_400, Ok(TxDone::default()), &mut client, &mut nbrs);
    assert_eq!(mac.counters().tx_wakeup, 4);
    assert_eq!(mac.operation(), Operation::Idle);

    mac.send_frame_request(5_000, SenderId(1), &mut client, &mut nbrs).unwrap();
    assert_eq!(mac.transmit_wakeup_frame(5_000, &wakeup, 7_000), Err(MacError::Busy));

    let mut disabled = mac_with_caps(RadioCaps::ACK_TIMEOUT);
    disabled.stop();
    assert_eq!(disabled.transmit_wakeup_frame(0, &wakeup, 1_000), Err(MacError::InvalidState));
}
