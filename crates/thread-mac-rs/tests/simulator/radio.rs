// crates/thread-mac-rs/tests/simulator/radio.rs
use std::collections::VecDeque;
use thread_mac_rs::hal::{MacError, RadioCaps, RadioDriver, TxRequest};
use thread_mac_rs::types::{Channel, ExtAddress};

/// A frame handed to the simulated radio.
#[derive(Debug, Clone)]
pub struct Transmission {
    pub psdu: Vec<u8>,
    pub channel: Channel,
    pub tx_at_us: Option<u64>,
}

/// A radio that acknowledges and backs off in "hardware" and buffers its
/// transmissions in memory.
pub struct SimulatedRadio {
    ext_address: ExtAddress,
    listening_on: Option<Channel>,
    tx_queue: VecDeque<Transmission>,
    /// Frame-pending bit the parent reports in the ack of a data poll.
    pub ack_poll_pending: bool,
}

impl SimulatedRadio {
    pub fn new(ext_address: ExtAddress) -> Self {
        Self {
            ext_address,
            listening_on: None,
            tx_queue: VecDeque::new(),
            ack_poll_pending: false,
        }
    }

    /// Extracts all pending transmissions.
    pub fn take_tx_frames(&mut self) -> Vec<Transmission> {
        self.tx_queue.drain(..).collect()
    }

    pub fn listening_on(&self) -> Option<Channel> {
        self.listening_on
    }
}

impl RadioDriver for SimulatedRadio {
    fn capabilities(&self) -> RadioCaps {
        RadioCaps::ACK_TIMEOUT | RadioCaps::CSMA_BACKOFF
    }

    fn ext_address(&self) -> ExtAddress {
        self.ext_address
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
        self.tx_queue.push_back(Transmission {
            psdu: request.psdu.to_vec(),
            channel: request.channel,
            tx_at_us: request.tx_at_us,
        });
        Ok(())
    }

    fn rssi(&mut self) -> Option<i8> {
        Some(-90)
    }
}

/// Deterministic xorshift generator for backoffs and sequence numbers.
pub struct XorShiftRng(pub u64);

impl rand_core::RngCore for XorShiftRng {
    fn next_u32(&mut self) -> u32 {
        (self.next_u64() >> 32) as u32
    }

    fn next_u64(&mut self) -> u64 {
        let mut x = self.0;
        x ^= x << 13;
        x ^= x >> 7;
        x ^= x << 17;
        self.0 = x;
        x
    }

    fn fill_bytes(&mut self, dest: &mut [u8]) {
        for chunk in dest.chunks_mut(8) {
            let bytes = self.next_u64().to_le_bytes();
            chunk.copy_from_slice(&bytes[..chunk.len()]);
        }
    }

    fn try_fill_bytes(&mut self, dest: &mut [u8]) -> Result<(), rand_core::Error> {
        self.fill_bytes(dest);
        Ok(())
    }
}
