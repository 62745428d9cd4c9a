//! MAC frame security: key material, the AES-CCM* cipher seam, and the
//! transmit/receive processing of the auxiliary security header.
//!
//! Outgoing frames take their frame counter from the key provider's
//! monotonic MAC counter. Incoming frames are accepted only when the frame
//! counter is at or above the sender's next expected counter for the same key
//! sequence; the expected counter then advances past the accepted value.

pub mod cipher;
pub mod keys;

pub use cipher::{AesCcmCipher, FrameCipher};
pub use keys::{KeyProvider, KeyTable, MacKey};

use crate::frame::codec::{received_header, transmit_header};
use crate::frame::{Frame, KeyId, Nonce, SecurityLevel};
use crate::hal::MacError;
use crate::neighbor::Neighbor;
use crate::types::ExtAddress;
use alloc::vec::Vec;
use log::debug;

/// Fixed key used by key identifier mode 2 (Thread MLE discovery and announce).
pub const C_MODE2_KEY: [u8; 16] = [
    0x78, 0x58, 0x16, 0x86, 0xfd, 0xb4, 0x58, 0x0f, 0xb0, 0x92, 0x54, 0x6a, 0xec, 0xbd, 0x15, 0x66,
];

/// Extended address placed in the nonce of mode 2 frames.
pub const C_MODE2_EXT_ADDRESS: ExtAddress =
    ExtAddress([0x35, 0x06, 0xfe, 0xb8, 0x23, 0xd4, 0x87, 0x12]);

pub const C_MODE2_KEY_SOURCE: u32 = 0xffff_ffff;
pub const C_MODE2_KEY_INDEX: u8 = 0xff;

/// Resolves a mode 1 key index to the key sequence it designates: the
/// current, previous or next sequence.
fn key_sequence_for_index<K: KeyProvider + ?Sized>(keys: &K, key_index: u8) -> Option<u32> {
    let current = keys.current_key_sequence();
    [current, current.wrapping_sub(1), current.wrapping_add(1)]
        .into_iter()
        .find(|&seq| KeyId::index_for_sequence(seq) == key_index)
}

/// Splits the payload into the authenticated-only prefix and the rest, and
/// builds the authentication data for the chosen level.
fn split_for_level(
    frame: &mut Frame,
    mut aad: Vec<u8>,
    level: SecurityLevel,
) -> (Vec<u8>, &mut [u8]) {
    let open = frame.open_payload_len();
    aad.extend_from_slice(&frame.payload[..open]);
    if level.encrypts() {
        (aad, &mut frame.payload[open..])
    } else {
        aad.extend_from_slice(&frame.payload[open..]);
        (aad, &mut [])
    }
}

/// Applies security to an outgoing frame whose `security` field selects the
/// level and key identifier mode.
///
/// Retransmissions keep the frame counter and key identifier already in the
/// frame.
pub fn secure_outgoing<K, C>(
    frame: &mut Frame,
    own_ext_address: &ExtAddress,
    keys: &mut K,
    cipher: &mut C,
) -> Result<(), MacError>
where
    K: KeyProvider + ?Sized,
    C: FrameCipher + ?Sized,
{
    let Some(mut security) = frame.security else {
        return Ok(());
    };
    if security.level == SecurityLevel::None {
        return Ok(());
    }
    if security.level == SecurityLevel::Enc {
        return Err(MacError::Security);
    }

    let (key, nonce_address) = match security.key_id {
        KeyId::Mode0 => (keys.kek().ok_or(MacError::Security)?, *own_ext_address),
        KeyId::Mode1 { .. } => {
            let sequence = if frame.is_retransmission {
                let index = security.key_id.key_index().ok_or(MacError::Security)?;
                key_sequence_for_index(keys, index).ok_or(MacError::Security)?
            } else {
                let sequence = keys.current_key_sequence();
                security.key_id = KeyId::Mode1 {
                    key_index: KeyId::index_for_sequence(sequence),
                };
                sequence
            };
            (keys.mac_key(sequence).ok_or(MacError::Security)?, *own_ext_address)
        }
        KeyId::Mode2 { .. } => {
            security.key_id = KeyId::Mode2 {
                key_source: C_MODE2_KEY_SOURCE,
                key_index: C_MODE2_KEY_INDEX,
            };
            (MacKey::new(C_MODE2_KEY), C_MODE2_EXT_ADDRESS)
        }
        KeyId::Mode3 { .. } => return Err(MacError::Security),
    };

    if !frame.is_retransmission {
        security.frame_counter = keys.mac_frame_counter();
        keys.increment_mac_frame_counter();
    }
    frame.security = Some(security);

    let nonce = Nonce::new(&nonce_address, security.frame_counter, security.level);
    let header = transmit_header(frame)?;
    let (aad, buffer) = split_for_level(frame, header, security.level);
    let mic = cipher.encrypt(&key, &nonce, &aad, buffer, security.level.mic_len())?;
    frame.mic = mic;
    Ok(())
}

/// Verifies and decrypts an incoming frame in place.
///
/// `src_ext_address` is the sender's extended address, from the frame or
/// resolved through the neighbor table. `neighbor` is required for key
/// identifier mode 1 and has its frame counter and key sequence advanced on
/// success.
pub fn verify_incoming<K, C>(
    frame: &mut Frame,
    src_ext_address: Option<ExtAddress>,
    neighbor: Option<&mut Neighbor>,
    keys: &mut K,
    cipher: &mut C,
) -> Result<(), MacError>
where
    K: KeyProvider + ?Sized,
    C: FrameCipher + ?Sized,
{
    let Some(security) = frame.security else {
        return Ok(());
    };
    let level = security.level;
    if level == SecurityLevel::None {
        return Ok(());
    }
    if level == SecurityLevel::Enc || frame.mic.len() != level.mic_len() {
        return Err(MacError::Security);
    }

    let mut accepted_sequence = None;
    let (key, nonce_address) = match security.key_id {
        KeyId::Mode0 => (
            keys.kek().ok_or(MacError::Security)?,
            src_ext_address.ok_or(MacError::Security)?,
        ),
        KeyId::Mode1 { key_index } => {
            let neighbor = neighbor.as_deref().ok_or(MacError::Security)?;
            let sequence = key_sequence_for_index(keys, key_index).ok_or(MacError::Security)?;
            if sequence < neighbor.key_sequence {
                debug!("[MAC] Frame uses retired key sequence {}", sequence);
                return Err(MacError::Security);
            }
            if sequence == neighbor.key_sequence && security.frame_counter < neighbor.link_frame_counter {
                debug!(
                    "[MAC] Replayed frame counter {} from {} (expected >= {})",
                    security.frame_counter, neighbor.ext_address, neighbor.link_frame_counter
                );
                return Err(MacError::Replay);
            }
            accepted_sequence = Some(sequence);
            (
                keys.mac_key(sequence).ok_or(MacError::Security)?,
                src_ext_address.unwrap_or(neighbor.ext_address),
            )
        }
        KeyId::Mode2 { key_source, key_index } => {
            if key_source != C_MODE2_KEY_SOURCE || key_index != C_MODE2_KEY_INDEX {
                return Err(MacError::Security);
            }
            (MacKey::new(C_MODE2_KEY), C_MODE2_EXT_ADDRESS)
        }
        KeyId::Mode3 { .. } => return Err(MacError::Security),
    };

    let nonce = Nonce::new(&nonce_address, security.frame_counter, level);
    let header = received_header(frame).to_vec();
    let mic = core::mem::take(&mut frame.mic);
    let (aad, buffer) = split_for_level(frame, header, level);
    if let Err(e) = cipher.decrypt(&key, &nonce, &aad, buffer, &mic) {
        frame.mic = mic;
        return Err(e);
    }

    if let (Some(sequence), Some(neighbor)) = (accepted_sequence, neighbor) {
        neighbor.key_sequence = sequence;
        neighbor.link_frame_counter = security.frame_counter.wrapping_add(1);
        if sequence > keys.current_key_sequence() {
            debug!("[MAC] Key sequence advanced to {} by {}", sequence, neighbor.ext_address);
            keys.set_current_key_sequence(sequence);
        }
    }
    Ok(())
}
