// crates/thread-mac-rs/tests/simulator/mod.rs
pub mod radio;

pub use radio::{SimulatedRadio, Transmission, XorShiftRng};

use std::collections::{HashMap, VecDeque};
use thread_mac_rs::frame::{CommandId, deserialize_frame};
use thread_mac_rs::hal::{RxFrame, TxDone};
use thread_mac_rs::indirect::Ipv6Dispatch;
use thread_mac_rs::neighbor::NeighborList;
use thread_mac_rs::node::link::{LinkEvent, LinkNode};
use thread_mac_rs::node::Node;
use thread_mac_rs::security::{AesCcmCipher, KeyTable, MacKey};
use thread_mac_rs::types::{Channel, ExtAddress, PanId, ShortAddress};
use thread_mac_rs::LinkConfig;

pub const NETWORK_KEY: [u8; 16] = [
    0x00, 0x11, 0x22, 0x33, 0x44, 0x55, 0x66, 0x77, 0x88, 0x99, 0xaa, 0xbb, 0xcc, 0xdd, 0xee, 0xff,
];
pub const PAN: PanId = PanId(0xface);
/// Time a timed frame spends on the air before its transmit-done report.
pub const C_TIMED_FRAME_AIRTIME_US: u64 = 400;

pub type SimNode = LinkNode<SimulatedRadio, XorShiftRng, KeyTable, AesCcmCipher>;

/// Routes all log output of a test through the test harness.
pub fn init_logging() {
    let _ = env_logger::Builder::new()
        .is_test(true)
        .filter_level(log::LevelFilter::Trace)
        .format_timestamp_micros()
        .try_init();
}

/// A frame on the virtual air.
#[derive(Debug, Clone)]
pub struct Packet {
    pub data: Vec<u8>,
    pub channel: Channel,
    pub src_node_id: u8,
    pub transmit_time_us: u64,
}

/// A single-channel air medium that manages time and frame delivery.
pub struct VirtualNetwork {
    current_time_us: u64,
    inboxes: HashMap<u8, VecDeque<Packet>>,
    /// Every frame sent, for assertions.
    pub packet_history: Vec<Packet>,
}

impl VirtualNetwork {
    pub fn new() -> Self {
        Self {
            current_time_us: 0,
            inboxes: HashMap::new(),
            packet_history: Vec::new(),
        }
    }

    pub fn tick(&mut self, duration_us: u64) {
        self.current_time_us += duration_us;
    }

    pub fn current_time(&self) -> u64 {
        self.current_time_us
    }

    pub fn register_node(&mut self, node_id: u8) {
        self.inboxes.entry(node_id).or_default();
    }

    /// Every other registered node hears the frame.
    pub fn transmit(&mut self, packet: Packet) {
        self.packet_history.push(packet.clone());
        for (node_id, inbox) in self.inboxes.iter_mut() {
            if *node_id != packet.src_node_id {
                inbox.push_back(packet.clone());
            }
        }
    }

    pub fn receive(&mut self, node_id: u8) -> Option<Packet> {
        self.inboxes.entry(node_id).or_default().pop_front()
    }
}

/// Wraps a `LinkNode` and the events it raised for the test harness.
pub struct NodeHarness {
    pub node: SimNode,
    pub node_id: u8,
    pub events: Vec<LinkEvent>,
    /// Report times of timed frames still queued in the radio.
    timed_done_at: VecDeque<u64>,
}

impl NodeHarness {
    /// A started node with the network key installed.
    pub fn new(node_id: u8, short_address: ShortAddress, neighbors: NeighborList) -> Self {
        let ext_address = ext_address(node_id);
        let mut keys = KeyTable::new(0);
        keys.install_key(0, MacKey::new(NETWORK_KEY));
        let mut node = LinkNode::new(
            SimulatedRadio::new(ext_address),
            XorShiftRng(0x9e37_79b9_7f4a_7c15 ^ node_id as u64),
            keys,
            AesCcmCipher,
            LinkConfig::default(),
            neighbors,
            Box::new(Ipv6Dispatch),
        )
        .unwrap();
        node.set_pan_id(PAN);
        node.set_short_address(short_address);
        node.start(0);
        Self {
            node,
            node_id,
            events: Vec::new(),
            timed_done_at: VecDeque::new(),
        }
    }

    /// Runs a single cycle: deliver heard frames, fire due timers, put
    /// transmissions on the air.
    pub fn run_cycle(&mut self, network: &mut VirtualNetwork) {
        let now = network.current_time();

        // 1. Frames on the air reach the node only while its receiver is on.
        while let Some(packet) = network.receive(self.node_id) {
            if self.node.mac().radio().listening_on() != Some(packet.channel) {
                continue;
            }
            let rx = RxFrame {
                psdu: &packet.data,
                rssi: -60,
                channel: packet.channel,
            };
            self.node.process_radio_frame(now, Ok(rx));
        }

        // 2. Timed frames that have left the air, oldest first
        while self.timed_done_at.front().is_some_and(|&at| at <= now) {
            if let Some(done_at) = self.timed_done_at.pop_front() {
                self.node.process_transmit_done(done_at, Ok(TxDone::default()));
            }
        }

        // 3. Timers
        if self.node.next_deadline().is_some_and(|deadline| deadline <= now) {
            self.node.tick(now);
        }

        // 4. Transmissions, including follow-on frames started by completions
        self.flush_transmissions(network);

        while let Some(event) = self.node.poll_event() {
            self.events.push(event);
        }
    }

    pub fn flush_transmissions(&mut self, network: &mut VirtualNetwork) {
        let now = network.current_time();
        loop {
            let frames = self.node.mac_mut().radio_mut().take_tx_frames();
            if frames.is_empty() {
                return;
            }
            for transmission in frames {
                let is_poll = deserialize_frame(&transmission.psdu)
                    .ok()
                    .and_then(|frame| frame.command_id())
                    == Some(CommandId::DataRequest);
                network.transmit(Packet {
                    channel: transmission.channel,
                    src_node_id: self.node_id,
                    transmit_time_us: transmission.tx_at_us.unwrap_or(now),
                    data: transmission.psdu,
                });
                if let Some(tx_at_us) = transmission.tx_at_us {
                    self.timed_done_at.push_back(tx_at_us + C_TIMED_FRAME_AIRTIME_US);
                    continue;
                }
                let done = TxDone {
                    ack_frame_pending: is_poll && self.node.mac().radio().ack_poll_pending,
                };
                self.node.process_transmit_done(now, Ok(done));
            }
        }
    }
}

pub fn ext_address(node_id: u8) -> ExtAddress {
    ExtAddress([0x02, 0, 0, 0, 0, 0, 0, node_id])
}
