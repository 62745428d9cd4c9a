pub mod link;

use crate::hal::{MacError, RxFrame, TxDone};

/// Represents the possible actions the owner of a node must take after an
/// event or a tick.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum NodeAction {
    /// Call `tick()` once the caller-supplied clock reaches this time, in
    /// microseconds.
    SetTimer(u64),
    /// No timer is pending.
    NoAction,
}

impl NodeAction {
    pub(crate) fn from_deadline(deadline_us: Option<u64>) -> Self {
        match deadline_us {
            Some(deadline) => NodeAction::SetTimer(deadline),
            None => NodeAction::NoAction,
        }
    }
}

/// The interface through which a platform drives a link-layer node.
///
/// Every call takes the current time of the platform clock. None of them
/// blocks on the radio.
pub trait Node {
    /// Processes a frame, or a receive error, reported by the radio.
    fn process_radio_frame(
        &mut self,
        current_time_us: u64,
        result: Result<RxFrame<'_>, MacError>,
    ) -> NodeAction;

    /// Processes the completion of a transmission the node started.
    fn process_transmit_done(
        &mut self,
        current_time_us: u64,
        result: Result<TxDone, MacError>,
    ) -> NodeAction;

    /// Called when the timer requested through `NodeAction::SetTimer` expires.
    fn tick(&mut self, current_time_us: u64) -> NodeAction;

    /// The earliest time at which `tick` must be called.
    fn next_deadline(&self) -> Option<u64>;
}
