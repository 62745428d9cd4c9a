// crates/thread-mac-rs/src/security/keys.rs
use alloc::collections::BTreeMap;
use core::fmt;
use zeroize::{Zeroize, ZeroizeOnDrop};

/// A 128-bit MAC key. Wiped from memory when dropped.
#[derive(Clone, PartialEq, Eq, Zeroize, ZeroizeOnDrop)]
pub struct MacKey([u8; 16]);

impl MacKey {
    pub fn new(bytes: [u8; 16]) -> Self {
        Self(bytes)
    }

    pub fn as_bytes(&self) -> &[u8; 16] {
        &self.0
    }
}

impl fmt::Debug for MacKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str("MacKey(..)")
    }
}

/// Source of key material and of the outgoing MAC frame counter.
///
/// Implemented by the key manager of the network layer.
pub trait KeyProvider {
    fn current_key_sequence(&self) -> u32;

    /// Called when a neighbor is first heard using a newer key sequence.
    fn set_current_key_sequence(&mut self, key_sequence: u32);

    /// Returns the MAC key of a key sequence, deriving it if necessary.
    fn mac_key(&mut self, key_sequence: u32) -> Option<MacKey>;

    /// Key-encryption key used by key identifier mode 0.
    fn kek(&self) -> Option<MacKey>;

    fn mac_frame_counter(&self) -> u32;

    fn increment_mac_frame_counter(&mut self);
}

/// A `KeyProvider` over explicitly installed keys.
#[derive(Debug, Clone, Default)]
pub struct KeyTable {
    keys: BTreeMap<u32, MacKey>,
    current_key_sequence: u32,
    mac_frame_counter: u32,
    kek: Option<MacKey>,
}

impl KeyTable {
    pub fn new(current_key_sequence: u32) -> Self {
        Self {
            current_key_sequence,
            ..Self::default()
        }
    }

    pub fn install_key(&mut self, key_sequence: u32, key: MacKey) {
        self.keys.insert(key_sequence, key);
    }

    pub fn remove_key(&mut self, key_sequence: u32) -> Option<MacKey> {
        self.keys.remove(&key_sequence)
    }

    pub fn set_kek(&mut self, kek: MacKey) {
        self.kek = Some(kek);
    }

    pub fn set_mac_frame_counter(&mut self, counter: u32) {
        self.mac_frame_counter = counter;
    }
}

impl KeyProvider for KeyTable {
    fn current_key_sequence(&self) -> u32 {
        self.current_key_sequence
    }

    fn set_current_key_sequence(&mut self, key_sequence: u32) {
        self.current_key_sequence = key_sequence;
    }

    fn mac_key(&mut self, key_sequence: u32) -> Option<MacKey> {
        self.keys.get(&key_sequence).cloned()
    }

    fn kek(&self) -> Option<MacKey> {
        self.kek.clone()
    }

    fn mac_frame_counter(&self) -> u32 {
        self.mac_frame_counter
    }

    fn increment_mac_frame_counter(&mut self) {
        self.mac_frame_counter = self.mac_frame_counter.wrapping_add(1);
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use alloc::format;

    #[test]
    fn test_key_debug_is_redacted() {
        let key = MacKey::new([0xab; 16]);
        assert_eq!(format!("{:?}", key), "MacKey(..)");
    }

    #[test]
    fn test_key_table_lookup() {
        let mut table = KeyTable::new(3);
        table.install_key(3, MacKey::new([3; 16]));
        assert_eq!(table.mac_key(3), Some(MacKey::new([3; 16])));
        assert!(table.mac_key(4).is_none());
        assert!(table.kek().is_none());

        table.increment_mac_frame_counter();
        table.increment_mac_frame_counter();
        assert_eq!(table.mac_frame_counter(), 2);
    }
}
