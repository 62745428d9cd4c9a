// crates/thread-mac-rs/src/frame/beacon.rs
use crate::hal::MacError;
use alloc::vec::Vec;

/// Superframe specification of a Thread beacon: beacon order and superframe
/// order 15 (non-beacon-enabled), final CAP slot 15, PAN coordinator.
pub const C_BEACON_SUPERFRAME_SPEC: [u8; 2] = [0xff, 0x0f];

pub const C_BEACON_PROTOCOL_ID: u8 = 3;
pub const C_BEACON_PROTOCOL_VERSION: u8 = 1;
pub const C_NETWORK_NAME_SIZE: usize = 16;
pub const C_EXTENDED_PAN_ID_SIZE: usize = 8;

const VERSION_OFFSET: u8 = 4;
const FLAG_NATIVE: u8 = 1 << 3;
const FLAG_JOINING: u8 = 1 << 0;

/// Superframe (2) + GTS (1) + pending addresses (1).
const MAC_BEACON_FIELDS_LEN: usize = 4;
const THREAD_BEACON_LEN: usize = 2 + C_NETWORK_NAME_SIZE + C_EXTENDED_PAN_ID_SIZE;

/// The Thread beacon payload advertised by routers in response to beacon requests.
#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub struct BeaconPayload {
    pub protocol_version: u8,
    pub joining_permitted: bool,
    pub native_commissioner: bool,
    /// Network name, NUL-padded.
    pub network_name: [u8; C_NETWORK_NAME_SIZE],
    pub extended_pan_id: [u8; C_EXTENDED_PAN_ID_SIZE],
}

impl BeaconPayload {
    pub fn new(network_name: &str, extended_pan_id: [u8; C_EXTENDED_PAN_ID_SIZE]) -> Self {
        let mut name = [0u8; C_NETWORK_NAME_SIZE];
        let bytes = network_name.as_bytes();
        let len = bytes.len().min(C_NETWORK_NAME_SIZE);
        name[..len].copy_from_slice(&bytes[..len]);
        Self {
            protocol_version: C_BEACON_PROTOCOL_VERSION,
            joining_permitted: false,
            native_commissioner: false,
            network_name: name,
            extended_pan_id,
        }
    }

    /// Network name without padding, if it is valid UTF-8.
    pub fn network_name_str(&self) -> Option<&str> {
        let len = self
            .network_name
            .iter()
            .position(|&b| b == 0)
            .unwrap_or(C_NETWORK_NAME_SIZE);
        core::str::from_utf8(&self.network_name[..len]).ok()
    }

    /// Encodes the MAC beacon fields followed by the Thread beacon payload.
    pub fn to_frame_payload(&self) -> Vec<u8> {
        let mut payload = Vec::with_capacity(MAC_BEACON_FIELDS_LEN + THREAD_BEACON_LEN);
        payload.extend_from_slice(&C_BEACON_SUPERFRAME_SPEC);
        payload.push(0); // GTS
        payload.push(0); // Pending addresses
        payload.push(C_BEACON_PROTOCOL_ID);
        let mut flags = self.protocol_version << VERSION_OFFSET;
        if self.native_commissioner {
            flags |= FLAG_NATIVE;
        }
        if self.joining_permitted {
            flags |= FLAG_JOINING;
        }
        payload.push(flags);
        payload.extend_from_slice(&self.network_name);
        payload.extend_from_slice(&self.extended_pan_id);
        payload
    }

    /// Parses the payload of a beacon frame.
    ///
    /// Returns `Ok(None)` for a well-formed 802.15.4 beacon that carries no
    /// Thread beacon payload.
    pub fn from_frame_payload(payload: &[u8]) -> Result<Option<Self>, MacError> {
        if payload.len() < MAC_BEACON_FIELDS_LEN {
            return Err(MacError::Parse);
        }
        let thread = &payload[MAC_BEACON_FIELDS_LEN..];
        let is_thread_beacon = payload[0..2] == C_BEACON_SUPERFRAME_SPEC
            && payload[2] == 0
            && payload[3] == 0
            && thread.len() >= THREAD_BEACON_LEN
            && thread[0] == C_BEACON_PROTOCOL_ID;
        if !is_thread_beacon {
            return Ok(None);
        }
        let flags = thread[1];
        let mut network_name = [0u8; C_NETWORK_NAME_SIZE];
        network_name.copy_from_slice(&thread[2..2 + C_NETWORK_NAME_SIZE]);
        let mut extended_pan_id = [0u8; C_EXTENDED_PAN_ID_SIZE];
        extended_pan_id.copy_from_slice(&thread[2 + C_NETWORK_NAME_SIZE..THREAD_BEACON_LEN]);
        Ok(Some(Self {
            protocol_version: flags >> VERSION_OFFSET,
            joining_permitted: flags & FLAG_JOINING != 0,
            native_commissioner: flags & FLAG_NATIVE != 0,
            network_name,
            extended_pan_id,
        }))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_beacon_payload_layout() {
        let mut beacon = BeaconPayload::new("OpenThread", [0xde, 0xad, 0x00, 0xbe, 0xef, 0x00, 0xca, 0xfe]);
        beacon.joining_permitted = true;
        let bytes = beacon.to_frame_payload();

        assert_eq!(bytes.len(), 4 + 2 + 16 + 8);
        assert_eq!(&bytes[0..4], &[0xff, 0x0f, 0x00, 0x00]);
        assert_eq!(bytes[4], 3);
        assert_eq!(bytes[5], 0x11);
        assert_eq!(&bytes[6..16], b"OpenThread");

        let parsed = BeaconPayload::from_frame_payload(&bytes).unwrap().unwrap();
        assert_eq!(parsed, beacon);
        assert_eq!(parsed.network_name_str(), Some("OpenThread"));
    }

    #[test]
    fn test_non_thread_beacon_is_ignored() {
        let bytes = [0xff, 0x0f, 0x00, 0x00, 0x01];
        assert_eq!(BeaconPayload::from_frame_payload(&bytes), Ok(None));
        assert_eq!(BeaconPayload::from_frame_payload(&[0xff]), Err(MacError::Parse));
    }
}
