// crates/thread-mac-rs/src/mac/client.rs
use super::registry::{ReceiverId, SenderId};
use crate::frame::Frame;
use crate::hal::MacError;
use crate::neighbor::NeighborTable;
use crate::types::MacAddress;

/// What a sender wants after one of its frames completed.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SendDisposition {
    Done,
    /// Supply another frame right away, before any other operation.
    SendMore,
}

/// Result of `MacScheduler::purge_frame_request`.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PurgeOutcome {
    /// The sender was still queued and never got a frame request.
    Removed,
    /// The sender's frame was waiting in CSMA backoff and has been dropped.
    /// Equivalent to an `Abort` completion, but no callback is made.
    Aborted,
}

/// Work that must re-enter the MAC scheduler, raised by a component while it
/// is being called back from it.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum MacRequest {
    SendFrameRequest(SenderId),
    Purge(SenderId),
}

/// Callbacks through which the MAC scheduler talks to the senders and
/// receivers registered with it.
///
/// Callbacks run synchronously inside a scheduler call and must not call back
/// into the scheduler; follow-up work is expressed as a `MacRequest`.
pub trait MacClient {
    /// Fills `frame` with the next frame of `sender`. The scheduler assigns
    /// the sequence number (unless `is_retransmission` is set) and applies
    /// security.
    fn handle_frame_request(
        &mut self,
        sender: SenderId,
        frame: &mut Frame,
        neighbors: &mut dyn NeighborTable,
    ) -> Result<(), MacError>;

    /// Reports the final outcome of a frame of `sender`, exactly once.
    fn handle_sent_frame(
        &mut self,
        sender: SenderId,
        frame: &Frame,
        result: Result<(), MacError>,
        neighbors: &mut dyn NeighborTable,
    ) -> SendDisposition;

    /// Offers a received, verified frame. Returns true if it was consumed.
    fn handle_received_frame(
        &mut self,
        receiver: ReceiverId,
        frame: &Frame,
        neighbors: &mut dyn NeighborTable,
    ) -> bool;

    /// An ack announced pending data that did not arrive in time.
    fn handle_data_poll_timeout(&mut self, _receiver: ReceiverId) {}

    /// A child polled for queued data.
    fn handle_data_request(&mut self, _src: &MacAddress, _neighbors: &mut dyn NeighborTable) {}
}

/// Entry point for precisely timed wake-up frames.
pub trait WakeupFrameSink {
    /// Transmits `frame` at `tx_time_us` without CSMA, ack or security.
    fn transmit_wakeup_frame(
        &mut self,
        current_time_us: u64,
        frame: &Frame,
        tx_time_us: u64,
    ) -> Result<(), MacError>;
}
