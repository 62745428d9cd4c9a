use crate::types::{Channel, ChannelError, ExtAddress};
use core::array::TryFromSliceError;
use core::fmt;
use core::ops::BitOr;

/// Defines a portable, descriptive Error type for the link layer.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum MacError {
    /// The radio or a scan is busy with an operation that cannot be pre-empted.
    Busy,
    /// The sender, receiver or child is already registered, queued or bound.
    Already,
    /// A fixed-capacity pool or queue is exhausted.
    NoBufs,
    /// The operation is not allowed in the current state (e.g., MAC disabled).
    InvalidState,
    /// CSMA/CA exhausted its backoff budget without finding a clear channel.
    ChannelAccessFailure,
    /// No acknowledgment was received within the retry budget.
    NoAck,
    /// The transmission was aborted.
    Abort,
    /// Frame security processing failed (unknown key, bad MIC, unsupported level).
    Security,
    /// A received frame counter was stale.
    Replay,
    /// A received frame is malformed.
    Parse,
    /// A datagram could not be routed and was dropped.
    Drop,
    /// No matching entry was found.
    NotFound,
    /// An argument is out of range.
    InvalidArgs,
    /// The frame check sequence did not match.
    FcsError,
    /// The provided buffer is too small for the operation.
    BufferTooShort,
    /// The frame size exceeds the maximum PHY packet size.
    FrameTooLarge,
}

impl fmt::Display for MacError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Busy => write!(f, "Radio or scan is busy"),
            Self::Already => write!(f, "Already registered or in progress"),
            Self::NoBufs => write!(f, "Insufficient buffers or slots"),
            Self::InvalidState => write!(f, "Invalid state for the operation"),
            Self::ChannelAccessFailure => write!(f, "Channel access failure"),
            Self::NoAck => write!(f, "No acknowledgment received"),
            Self::Abort => write!(f, "Transmission aborted"),
            Self::Security => write!(f, "Frame security processing failed"),
            Self::Replay => write!(f, "Stale frame counter"),
            Self::Parse => write!(f, "Malformed frame"),
            Self::Drop => write!(f, "Datagram dropped"),
            Self::NotFound => write!(f, "No matching entry found"),
            Self::InvalidArgs => write!(f, "Invalid arguments"),
            Self::FcsError => write!(f, "Frame check sequence mismatch"),
            Self::BufferTooShort => write!(f, "Buffer is too short for the frame"),
            Self::FrameTooLarge => write!(f, "Frame size exceeds maximum PHY packet size"),
        }
    }
}

#[cfg(feature = "std")]
impl std::error::Error for MacError {}

// --- From Implementations for Error Conversion ---

impl From<TryFromSliceError> for MacError {
    fn from(_: TryFromSliceError) -> Self {
        MacError::BufferTooShort
    }
}

impl From<ChannelError> for MacError {
    fn from(_: ChannelError) -> Self {
        MacError::InvalidArgs
    }
}

/// Radio features implemented in hardware or by the radio driver.
///
/// A missing capability is provided in software by the MAC scheduler.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct RadioCaps(pub u8);

impl RadioCaps {
    // --- Flag Constants ---
    /// The radio waits for the acknowledgment and reports `NoAck` itself.
    pub const ACK_TIMEOUT: Self = Self(1 << 0);
    /// The radio performs CSMA/CA backoff before transmitting.
    pub const CSMA_BACKOFF: Self = Self(1 << 1);
    /// The radio retransmits unacknowledged frames.
    pub const RETRANSMIT: Self = Self(1 << 2);
    /// The radio performs energy scans and reports the maximum RSSI.
    pub const ENERGY_SCAN: Self = Self(1 << 3);

    // --- Methods ---

    /// Checks if all of the specified flags are set.
    pub fn contains(&self, other: Self) -> bool {
        (self.0 & other.0) == other.0
    }

    pub fn empty() -> Self {
        Self(0)
    }
}

impl BitOr for RadioCaps {
    type Output = Self;

    fn bitor(self, rhs: Self) -> Self::Output {
        Self(self.0 | rhs.0)
    }
}

/// A single transmission handed to the radio.
#[derive(Debug, Clone, Copy)]
pub struct TxRequest<'a> {
    /// The complete PSDU including the FCS.
    pub psdu: &'a [u8],
    pub channel: Channel,
    /// Perform a clear channel assessment before transmitting.
    pub cca: bool,
    /// Whether the frame requests an acknowledgment.
    pub ack_request: bool,
    /// Transmit at this exact time instead of immediately.
    pub tx_at_us: Option<u64>,
}

/// Successful completion of a transmission.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct TxDone {
    /// For radios with `ACK_TIMEOUT`, the frame-pending bit of the received ack.
    pub ack_frame_pending: bool,
}

/// A frame delivered by the radio.
#[derive(Debug, Clone, Copy)]
pub struct RxFrame<'a> {
    /// The complete PSDU including the FCS.
    pub psdu: &'a [u8],
    pub rssi: i8,
    pub channel: Channel,
}

/// Hardware Abstraction Layer (HAL) for an IEEE 802.15.4 radio.
///
/// All calls return immediately. Completions are reported back to the MAC
/// scheduler through `handle_transmit_done`, `handle_receive_done` and
/// `handle_energy_scan_done`.
pub trait RadioDriver {
    /// Returns the features the radio implements itself.
    fn capabilities(&self) -> RadioCaps;

    /// Returns the factory-assigned extended address of the radio.
    fn ext_address(&self) -> ExtAddress;

    /// Switches the radio to receive on the given channel.
    fn receive(&mut self, channel: Channel) -> Result<(), MacError>;

    /// Puts the radio to sleep.
    fn sleep(&mut self) -> Result<(), MacError>;

    /// Starts a transmission.
    fn transmit(&mut self, request: &TxRequest<'_>) -> Result<(), MacError>;

    /// Starts a hardware energy scan. Only called when `ENERGY_SCAN` is reported.
    fn energy_scan(&mut self, _channel: Channel, _duration_ms: u16) -> Result<(), MacError> {
        Err(MacError::InvalidState)
    }

    /// Samples the current RSSI on the receive channel.
    fn rssi(&mut self) -> Option<i8>;
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_bitor_implementation() {
        let caps = RadioCaps::ACK_TIMEOUT | RadioCaps::ENERGY_SCAN;

        assert_eq!(caps.0, 0b0000_1001);
        assert!(caps.contains(RadioCaps::ACK_TIMEOUT));
        assert!(caps.contains(RadioCaps::ENERGY_SCAN));
        assert!(!caps.contains(RadioCaps::CSMA_BACKOFF));
        assert!(RadioCaps::empty().contains(RadioCaps::empty()));
    }

    #[test]
    fn test_channel_error_converts_to_invalid_args() {
        let err: MacError = Channel::try_from(40).unwrap_err().into();
        assert_eq!(err, MacError::InvalidArgs);
    }
}
