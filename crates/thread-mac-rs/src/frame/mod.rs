pub mod beacon;
pub mod codec;
pub mod ie;
pub mod security;

pub use beacon::{BeaconPayload, C_NETWORK_NAME_SIZE};
pub use codec::{Codec, crc16, deserialize_frame};
pub use security::{AuxSecurityHeader, KeyId, Nonce, SecurityLevel};

use crate::hal::MacError;
use crate::types::{C_FCS_SIZE, C_MAX_PHY_PACKET_SIZE, MacAddress, PanId, ShortAddress};
use alloc::vec;
use alloc::vec::Vec;
use core::convert::TryFrom;

/// IEEE 802.15.4 frame types (Frame Control bits 0-2).
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[repr(u8)]
pub enum FrameType {
    Beacon = 0,
    Data = 1,
    Ack = 2,
    Command = 3,
    Multipurpose = 5,
}

impl TryFrom<u8> for FrameType {
    type Error = MacError;

    fn try_from(value: u8) -> Result<Self, Self::Error> {
        match value {
            0 => Ok(FrameType::Beacon),
            1 => Ok(FrameType::Data),
            2 => Ok(FrameType::Ack),
            3 => Ok(FrameType::Command),
            5 => Ok(FrameType::Multipurpose),
            _ => Err(MacError::Parse),
        }
    }
}

/// Frame version (Frame Control bits 12-13).
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord)]
#[repr(u8)]
pub enum FrameVersion {
    V2003 = 0,
    V2006 = 1,
    V2015 = 2,
}

impl TryFrom<u8> for FrameVersion {
    type Error = MacError;

    fn try_from(value: u8) -> Result<Self, Self::Error> {
        match value {
            0 => Ok(FrameVersion::V2003),
            1 => Ok(FrameVersion::V2006),
            2 => Ok(FrameVersion::V2015),
            _ => Err(MacError::Parse),
        }
    }
}

/// MAC command identifiers the link layer handles itself.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[repr(u8)]
pub enum CommandId {
    DataRequest = 0x04,
    BeaconRequest = 0x07,
}

impl TryFrom<u8> for CommandId {
    type Error = MacError;

    fn try_from(value: u8) -> Result<Self, Self::Error> {
        match value {
            0x04 => Ok(CommandId::DataRequest),
            0x07 => Ok(CommandId::BeaconRequest),
            _ => Err(MacError::Parse),
        }
    }
}

/// One IEEE 802.15.4 frame.
///
/// Over-the-air fields come first. The trailing fields are transmit
/// bookkeeping owned by the MAC scheduler while the frame is in flight and
/// are never serialized.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Frame {
    pub frame_type: FrameType,
    pub version: FrameVersion,
    pub sequence: u8,
    pub frame_pending: bool,
    pub ack_request: bool,
    pub dst_pan_id: Option<PanId>,
    pub dst: MacAddress,
    pub src_pan_id: Option<PanId>,
    pub src: MacAddress,
    pub security: Option<AuxSecurityHeader>,
    /// Encoded header IEs, without a termination IE.
    pub header_ies: Vec<u8>,
    /// MAC payload. For command frames the first byte is the command identifier.
    pub payload: Vec<u8>,
    /// Message integrity code; empty until security processing fills it.
    pub mic: Vec<u8>,

    /// Header bytes exactly as received, used as authentication data.
    pub(crate) rx_header: Vec<u8>,
    /// Sent to a sleepy child in response to a poll.
    pub indirect: bool,
    /// Sequence number and security fields are already set and must be reused.
    pub is_retransmission: bool,
    pub csma_attempts: u8,
    pub tx_attempts: u8,
}

impl Default for Frame {
    fn default() -> Self {
        Self {
            frame_type: FrameType::Data,
            version: FrameVersion::V2006,
            sequence: 0,
            frame_pending: false,
            ack_request: false,
            dst_pan_id: None,
            dst: MacAddress::None,
            src_pan_id: None,
            src: MacAddress::None,
            security: None,
            header_ies: Vec::new(),
            payload: Vec::new(),
            mic: Vec::new(),
            rx_header: Vec::new(),
            indirect: false,
            is_retransmission: false,
            csma_attempts: 0,
            tx_attempts: 0,
        }
    }
}

impl Frame {
    /// A data frame within one PAN.
    pub fn new_data(pan_id: PanId, dst: MacAddress, src: MacAddress) -> Self {
        Self {
            frame_type: FrameType::Data,
            dst_pan_id: Some(pan_id),
            dst,
            src_pan_id: Some(pan_id),
            src,
            ack_request: !dst.is_none() && !dst.is_broadcast(),
            ..Self::default()
        }
    }

    /// An immediate acknowledgment.
    pub fn new_ack(sequence: u8, frame_pending: bool) -> Self {
        Self {
            frame_type: FrameType::Ack,
            version: FrameVersion::V2003,
            sequence,
            frame_pending,
            ..Self::default()
        }
    }

    /// A MAC command frame carrying only its command identifier.
    pub fn new_command(command: CommandId, pan_id: PanId, dst: MacAddress, src: MacAddress) -> Self {
        Self {
            frame_type: FrameType::Command,
            dst_pan_id: Some(pan_id),
            dst,
            src_pan_id: if src.is_none() { None } else { Some(pan_id) },
            src,
            ack_request: !dst.is_none() && !dst.is_broadcast(),
            payload: vec![command as u8],
            ..Self::default()
        }
    }

    /// A broadcast beacon request as sent during an active scan.
    pub fn new_beacon_request(sequence: u8) -> Self {
        Self {
            version: FrameVersion::V2003,
            sequence,
            ..Self::new_command(
                CommandId::BeaconRequest,
                PanId::BROADCAST,
                MacAddress::Short(ShortAddress::BROADCAST),
                MacAddress::None,
            )
        }
    }

    /// Returns the command identifier of a command frame.
    pub fn command_id(&self) -> Option<CommandId> {
        if self.frame_type != FrameType::Command {
            return None;
        }
        self.payload.first().and_then(|&id| CommandId::try_from(id).ok())
    }

    pub fn is_secured(&self) -> bool {
        self.security.is_some()
    }

    /// Number of leading payload bytes that are authenticated but never encrypted.
    pub fn open_payload_len(&self) -> usize {
        match self.frame_type {
            FrameType::Command => 1.min(self.payload.len()),
            _ => 0,
        }
    }

    /// Size of the MIC and FCS.
    pub fn footer_len(&self) -> usize {
        let mic = self.security.map(|sec| sec.level.mic_len()).unwrap_or(0);
        mic + C_FCS_SIZE
    }

    /// Largest payload that fits into one PSDU with the current header.
    pub fn max_payload_len(&self) -> usize {
        C_MAX_PHY_PACKET_SIZE.saturating_sub(self.header_len() + self.footer_len())
    }

    /// Serializes the frame into a freshly allocated PSDU.
    pub fn to_psdu(&self) -> Result<Vec<u8>, MacError> {
        let mut buffer = vec![0u8; C_MAX_PHY_PACKET_SIZE];
        let len = self.serialize(&mut buffer)?;
        buffer.truncate(len);
        Ok(buffer)
    }
}
