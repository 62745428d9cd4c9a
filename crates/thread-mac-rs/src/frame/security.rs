use crate::hal::MacError;
use crate::types::{C_NONCE_SIZE, ExtAddress};
use core::convert::TryFrom;

/// Security levels of the auxiliary security header.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[repr(u8)]
pub enum SecurityLevel {
    None = 0,
    Mic32 = 1,
    Mic64 = 2,
    Mic128 = 3,
    Enc = 4,
    EncMic32 = 5,
    EncMic64 = 6,
    EncMic128 = 7,
}

impl SecurityLevel {
    pub fn mic_len(&self) -> usize {
        match (*self as u8) & 0x03 {
            0 => 0,
            1 => 4,
            2 => 8,
            _ => 16,
        }
    }

    pub fn encrypts(&self) -> bool {
        (*self as u8) & 0x04 != 0
    }
}

impl TryFrom<u8> for SecurityLevel {
    type Error = MacError;

    fn try_from(value: u8) -> Result<Self, Self::Error> {
        Ok(match value & 0x07 {
            0 => SecurityLevel::None,
            1 => SecurityLevel::Mic32,
            2 => SecurityLevel::Mic64,
            3 => SecurityLevel::Mic128,
            4 => SecurityLevel::Enc,
            5 => SecurityLevel::EncMic32,
            6 => SecurityLevel::EncMic64,
            _ => SecurityLevel::EncMic128,
        })
    }
}

/// Key identifier field, one variant per key identifier mode.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum KeyId {
    /// Key determined implicitly (the key-encryption key in Thread).
    Mode0,
    /// Key index derived from the key sequence.
    Mode1 { key_index: u8 },
    /// 4-byte key source (the key sequence, big-endian) and key index.
    Mode2 { key_source: u32, key_index: u8 },
    Mode3 { key_source: [u8; 8], key_index: u8 },
}

impl KeyId {
    pub fn mode(&self) -> u8 {
        match self {
            KeyId::Mode0 => 0,
            KeyId::Mode1 { .. } => 1,
            KeyId::Mode2 { .. } => 2,
            KeyId::Mode3 { .. } => 3,
        }
    }

    pub fn wire_len(&self) -> usize {
        match self {
            KeyId::Mode0 => 0,
            KeyId::Mode1 { .. } => 1,
            KeyId::Mode2 { .. } => 5,
            KeyId::Mode3 { .. } => 9,
        }
    }

    pub fn key_index(&self) -> Option<u8> {
        match self {
            KeyId::Mode0 => None,
            KeyId::Mode1 { key_index }
            | KeyId::Mode2 { key_index, .. }
            | KeyId::Mode3 { key_index, .. } => Some(*key_index),
        }
    }

    /// Key index carried in mode 1 frames for a given key sequence.
    pub fn index_for_sequence(key_sequence: u32) -> u8 {
        ((key_sequence & 0x7f) + 1) as u8
    }
}

/// The auxiliary security header.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct AuxSecurityHeader {
    pub level: SecurityLevel,
    pub key_id: KeyId,
    pub frame_counter: u32,
}

impl AuxSecurityHeader {
    /// Security control, frame counter and key identifier.
    pub fn wire_len(&self) -> usize {
        1 + 4 + self.key_id.wire_len()
    }

    pub fn write(&self, buffer: &mut [u8]) -> Result<usize, MacError> {
        let len = self.wire_len();
        if buffer.len() < len {
            return Err(MacError::BufferTooShort);
        }
        buffer[0] = (self.level as u8) | (self.key_id.mode() << 3);
        buffer[1..5].copy_from_slice(&self.frame_counter.to_le_bytes());
        match self.key_id {
            KeyId::Mode0 => {}
            KeyId::Mode1 { key_index } => buffer[5] = key_index,
            KeyId::Mode2 { key_source, key_index } => {
                buffer[5..9].copy_from_slice(&key_source.to_be_bytes());
                buffer[9] = key_index;
            }
            KeyId::Mode3 { key_source, key_index } => {
                buffer[5..13].copy_from_slice(&key_source);
                buffer[13] = key_index;
            }
        }
        Ok(len)
    }

    pub fn read(buffer: &[u8]) -> Result<(Self, usize), MacError> {
        if buffer.len() < 5 {
            return Err(MacError::Parse);
        }
        let control = buffer[0];
        let level = SecurityLevel::try_from(control)?;
        let frame_counter = u32::from_le_bytes(buffer[1..5].try_into()?);
        let key_id = match (control >> 3) & 0x03 {
            0 => KeyId::Mode0,
            1 => KeyId::Mode1 {
                key_index: *buffer.get(5).ok_or(MacError::Parse)?,
            },
            2 => {
                let bytes = buffer.get(5..10).ok_or(MacError::Parse)?;
                KeyId::Mode2 {
                    key_source: u32::from_be_bytes(bytes[0..4].try_into()?),
                    key_index: bytes[4],
                }
            }
            _ => {
                let bytes = buffer.get(5..14).ok_or(MacError::Parse)?;
                KeyId::Mode3 {
                    key_source: bytes[0..8].try_into()?,
                    key_index: bytes[8],
                }
            }
        };
        let header = Self {
            level,
            key_id,
            frame_counter,
        };
        Ok((header, header.wire_len()))
    }
}

/// The 13-byte AES-CCM* nonce:
/// extended address (8) || frame counter (4, big-endian) || security level (1).
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Nonce(pub [u8; C_NONCE_SIZE]);

impl Nonce {
    pub fn new(ext_address: &ExtAddress, frame_counter: u32, level: SecurityLevel) -> Self {
        let mut bytes = [0u8; C_NONCE_SIZE];
        bytes[0..8].copy_from_slice(&ext_address.0);
        bytes[8..12].copy_from_slice(&frame_counter.to_be_bytes());
        bytes[12] = level as u8;
        Self(bytes)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_nonce_layout() {
        let ext = ExtAddress([1, 2, 3, 4, 5, 6, 7, 8]);
        let nonce = Nonce::new(&ext, 0x0a0b_0c0d, SecurityLevel::EncMic32);
        assert_eq!(
            nonce.0,
            [1, 2, 3, 4, 5, 6, 7, 8, 0x0a, 0x0b, 0x0c, 0x0d, 5]
        );
    }

    #[test]
    fn test_mic_lengths() {
        assert_eq!(SecurityLevel::None.mic_len(), 0);
        assert_eq!(SecurityLevel::EncMic32.mic_len(), 4);
        assert_eq!(SecurityLevel::Mic64.mic_len(), 8);
        assert_eq!(SecurityLevel::EncMic128.mic_len(), 16);
        assert!(SecurityLevel::Enc.encrypts());
        assert!(!SecurityLevel::Mic128.encrypts());
    }

    #[test]
    fn test_aux_header_mode2_wire_format() {
        let header = AuxSecurityHeader {
            level: SecurityLevel::EncMic32,
            key_id: KeyId::Mode2 {
                key_source: 0xffff_ffff,
                key_index: 0xff,
            },
            frame_counter: 0x0000_0102,
        };
        let mut buf = [0u8; 16];
        let len = header.write(&mut buf).unwrap();
        assert_eq!(len, 10);
        assert_eq!(&buf[..len], &[0x15, 0x02, 0x01, 0, 0, 0xff, 0xff, 0xff, 0xff, 0xff]);

        let (parsed, parsed_len) = AuxSecurityHeader::read(&buf[..len]).unwrap();
        assert_eq!(parsed_len, 10);
        assert_eq!(parsed, header);
    }

    #[test]
    fn test_key_index_wraps_every_128_sequences() {
        assert_eq!(KeyId::index_for_sequence(0), 1);
        assert_eq!(KeyId::index_for_sequence(127), 128);
        assert_eq!(KeyId::index_for_sequence(128), 1);
    }

    #[test]
    fn test_truncated_aux_header_is_rejected() {
        assert_eq!(AuxSecurityHeader::read(&[0x0d, 0, 0]), Err(MacError::Parse));
        // Mode 1 without the key index byte.
        assert_eq!(
            AuxSecurityHeader::read(&[0x0d, 0, 0, 0, 0]),
            Err(MacError::Parse)
        );
    }
}
