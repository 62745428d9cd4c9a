//! Header Information Elements carried by wake-up frames.

use crate::hal::MacError;
use crate::types::C_PHY_US_PER_SYMBOL;
use alloc::vec::Vec;

/// Header IE element identifier of the Rendezvous Time IE.
pub const C_IE_RENDEZVOUS_TIME: u8 = 0x1d;
/// Header IE element identifier of a vendor-specific IE.
pub const C_IE_VENDOR: u8 = 0x00;
/// Thread Group OUI, as carried on air.
pub const C_THREAD_OUI: [u8; 3] = [0x9b, 0xb8, 0xea];
/// Thread vendor IE subtype of the Connection IE.
pub const C_CONNECTION_IE_SUBTYPE: u8 = 0x01;

/// Rendezvous time and wake-up interval are expressed in 10-symbol units.
const TIME_UNIT_US: u64 = 10 * C_PHY_US_PER_SYMBOL;

/// Length of both wake-up IEs including their descriptors.
pub const C_WAKEUP_IES_LEN: usize = (2 + 4) + (2 + 5);

fn descriptor(element_id: u8, len: usize) -> [u8; 2] {
    (((element_id as u16) << 7) | (len as u16 & 0x7f)).to_le_bytes()
}

/// Time until the receiver should listen, and the spacing of wake-up frames.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RendezvousTimeIe {
    pub rendezvous_time_us: u64,
    pub wakeup_interval_us: u64,
}

/// How a woken device retries connecting to the sender.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ConnectionIe {
    /// Retry spacing in wake-up intervals (4 bits).
    pub retry_interval: u8,
    /// Number of retries (4 bits).
    pub retry_count: u8,
}

/// Encodes the two IEs of a wake-up frame.
pub fn write_wakeup_ies(rendezvous: &RendezvousTimeIe, connection: &ConnectionIe) -> Vec<u8> {
    let mut ies = Vec::with_capacity(C_WAKEUP_IES_LEN);
    let rendezvous_units = (rendezvous.rendezvous_time_us / TIME_UNIT_US).min(u16::MAX as u64) as u16;
    let interval_units = (rendezvous.wakeup_interval_us / TIME_UNIT_US).min(u16::MAX as u64) as u16;
    ies.extend_from_slice(&descriptor(C_IE_RENDEZVOUS_TIME, 4));
    ies.extend_from_slice(&rendezvous_units.to_le_bytes());
    ies.extend_from_slice(&interval_units.to_le_bytes());

    ies.extend_from_slice(&descriptor(C_IE_VENDOR, 5));
    ies.extend_from_slice(&C_THREAD_OUI);
    ies.push(C_CONNECTION_IE_SUBTYPE);
    ies.push(((connection.retry_interval & 0x0f) << 4) | (connection.retry_count & 0x0f));
    ies
}

/// Decodes the IEs written by `write_wakeup_ies`.
pub fn read_wakeup_ies(ies: &[u8]) -> Result<(RendezvousTimeIe, ConnectionIe), MacError> {
    let mut rendezvous = None;
    let mut connection = None;
    let mut offset = 0;
    while offset + 2 <= ies.len() {
        let raw = u16::from_le_bytes(ies[offset..offset + 2].try_into()?);
        let element_id = ((raw >> 7) & 0xff) as u8;
        let len = (raw & 0x7f) as usize;
        offset += 2;
        let content = ies.get(offset..offset + len).ok_or(MacError::Parse)?;
        offset += len;
        match element_id {
            C_IE_RENDEZVOUS_TIME if len == 4 => {
                let time = u16::from_le_bytes(content[0..2].try_into()?) as u64;
                let interval = u16::from_le_bytes(content[2..4].try_into()?) as u64;
                rendezvous = Some(RendezvousTimeIe {
                    rendezvous_time_us: time * TIME_UNIT_US,
                    wakeup_interval_us: interval * TIME_UNIT_US,
                });
            }
            C_IE_VENDOR if len == 5 && content[0..3] == C_THREAD_OUI && content[3] == C_CONNECTION_IE_SUBTYPE => {
                connection = Some(ConnectionIe {
                    retry_interval: content[4] >> 4,
                    retry_count: content[4] & 0x0f,
                });
            }
            _ => {}
        }
    }
    match (rendezvous, connection) {
        (Some(r), Some(c)) => Ok((r, c)),
        _ => Err(MacError::Parse),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_wakeup_ies_have_fixed_length() {
        let short = write_wakeup_ies(
            &RendezvousTimeIe { rendezvous_time_us: 0, wakeup_interval_us: 1_000 },
            &ConnectionIe { retry_interval: 1, retry_count: 12 },
        );
        let long = write_wakeup_ies(
            &RendezvousTimeIe { rendezvous_time_us: 9_000_000, wakeup_interval_us: 1_000 },
            &ConnectionIe { retry_interval: 1, retry_count: 12 },
        );
        assert_eq!(short.len(), C_WAKEUP_IES_LEN);
        assert_eq!(long.len(), C_WAKEUP_IES_LEN);
    }

    #[test]
    fn test_wakeup_ies_decode() {
        let ies = write_wakeup_ies(
            &RendezvousTimeIe { rendezvous_time_us: 4_800, wakeup_interval_us: 1_120 },
            &ConnectionIe { retry_interval: 1, retry_count: 12 },
        );
        let (rendezvous, connection) = read_wakeup_ies(&ies).unwrap();
        assert_eq!(rendezvous.rendezvous_time_us, 4_800);
        assert_eq!(rendezvous.wakeup_interval_us, 1_120);
        assert_eq!(connection, ConnectionIe { retry_interval: 1, retry_count: 12 });
    }

    #[test]
    fn test_missing_connection_ie_is_a_parse_error() {
        let ies = write_wakeup_ies(
            &RendezvousTimeIe { rendezvous_time_us: 160, wakeup_interval_us: 160 },
            &ConnectionIe { retry_interval: 1, retry_count: 1 },
        );
        assert_eq!(read_wakeup_ies(&ies[..6]), Err(MacError::Parse));
    }
}
