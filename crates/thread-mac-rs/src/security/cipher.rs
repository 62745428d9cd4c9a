// crates/thread-mac-rs/src/security/cipher.rs
use super::keys::MacKey;
use crate::frame::Nonce;
use crate::hal::MacError;
use aes::Aes128;
use alloc::vec::Vec;
use ccm::Ccm;
use ccm::aead::consts::{U4, U8, U13, U16};
use ccm::aead::generic_array::GenericArray;
use ccm::aead::{AeadInPlace, KeyInit};

type Ccm32 = Ccm<Aes128, U4, U13>;
type Ccm64 = Ccm<Aes128, U8, U13>;
type Ccm128 = Ccm<Aes128, U16, U13>;

/// The AES-CCM* primitive used to secure MAC frames.
///
/// `buffer` is the part of the payload that is encrypted in place; it is empty
/// for levels that only authenticate.
pub trait FrameCipher {
    /// Encrypts `buffer` in place and returns a MIC of `mic_len` bytes.
    fn encrypt(
        &mut self,
        key: &MacKey,
        nonce: &Nonce,
        aad: &[u8],
        buffer: &mut [u8],
        mic_len: usize,
    ) -> Result<Vec<u8>, MacError>;

    /// Verifies `mic` and decrypts `buffer` in place.
    fn decrypt(
        &mut self,
        key: &MacKey,
        nonce: &Nonce,
        aad: &[u8],
        buffer: &mut [u8],
        mic: &[u8],
    ) -> Result<(), MacError>;
}

/// Software AES-CCM* on top of the RustCrypto `ccm` and `aes` crates.
#[derive(Debug, Clone, Copy, Default)]
pub struct AesCcmCipher;

fn seal_with<C: KeyInit + AeadInPlace>(
    key: &MacKey,
    nonce: &Nonce,
    aad: &[u8],
    buffer: &mut [u8],
) -> Result<Vec<u8>, MacError> {
    let cipher = C::new_from_slice(key.as_bytes()).map_err(|_| MacError::Security)?;
    let tag = cipher
        .encrypt_in_place_detached(GenericArray::from_slice(&nonce.0), aad, buffer)
        .map_err(|_| MacError::Security)?;
    Ok(tag.to_vec())
}

fn open_with<C: KeyInit + AeadInPlace>(
    key: &MacKey,
    nonce: &Nonce,
    aad: &[u8],
    buffer: &mut [u8],
    mic: &[u8],
) -> Result<(), MacError> {
    let cipher = C::new_from_slice(key.as_bytes()).map_err(|_| MacError::Security)?;
    cipher
        .decrypt_in_place_detached(GenericArray::from_slice(&nonce.0), aad, buffer, GenericArray::from_slice(mic))
        .map_err(|_| MacError::Security)
}

impl FrameCipher for AesCcmCipher {
    fn encrypt(
        &mut self,
        key: &MacKey,
        nonce: &Nonce,
        aad: &[u8],
        buffer: &mut [u8],
        mic_len: usize,
    ) -> Result<Vec<u8>, MacError> {
        match mic_len {
            4 => seal_with::<Ccm32>(key, nonce, aad, buffer),
            8 => seal_with::<Ccm64>(key, nonce, aad, buffer),
            16 => seal_with::<Ccm128>(key, nonce, aad, buffer),
            _ => Err(MacError::Security),
        }
    }

    fn decrypt(
        &mut self,
        key: &MacKey,
        nonce: &Nonce,
        aad: &[u8],
        buffer: &mut [u8],
        mic: &[u8],
    ) -> Result<(), MacError> {
        match mic.len() {
            4 => open_with::<Ccm32>(key, nonce, aad, buffer, mic),
            8 => open_with::<Ccm64>(key, nonce, aad, buffer, mic),
            16 => open_with::<Ccm128>(key, nonce, aad, buffer, mic),
            _ => Err(MacError::Security),
        }
    }
}
