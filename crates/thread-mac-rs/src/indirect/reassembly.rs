// crates/thread-mac-rs/src/indirect/reassembly.rs
use super::lowpan::{FragmentHeader, HeaderCompressor};
use crate::hal::MacError;
use crate::types::MacAddress;
use alloc::vec::Vec;
use log::{debug, trace};

/// Datagrams whose fragments have not all arrived are dropped after this long.
pub const C_REASSEMBLY_TIMEOUT_US: u64 = 5_000_000;

#[derive(Debug, Clone)]
struct PartialDatagram {
    source: MacAddress,
    tag: u16,
    size: usize,
    link_security: bool,
    data: Vec<u8>,
    expires_at_us: u64,
}

/// Rebuilds datagrams from in-order RFC 4944 fragments.
#[derive(Debug, Clone)]
pub struct Reassembler {
    entries: Vec<PartialDatagram>,
    capacity: usize,
    timeout_us: u64,
    /// On a sleepy device a new secure first fragment replaces any partial
    /// datagram.
    sleepy: bool,
    dropped: u32,
}

impl Reassembler {
    pub fn new(capacity: usize, timeout_us: u64) -> Self {
        Self {
            entries: Vec::with_capacity(capacity),
            capacity: capacity.max(1),
            timeout_us,
            sleepy: false,
            dropped: 0,
        }
    }

    pub fn set_sleepy(&mut self, sleepy: bool) {
        self.sleepy = sleepy;
    }

    /// Processes one frame payload starting at a fragment header.
    ///
    /// Returns the datagram once its last fragment arrived. Fragments that
    /// match no partial datagram are dropped silently.
    #[allow(clippy::too_many_arguments)]
    pub fn handle_fragment(
        &mut self,
        current_time_us: u64,
        payload: &[u8],
        src: &MacAddress,
        dst: &MacAddress,
        link_security: bool,
        compressor: &dyn HeaderCompressor,
    ) -> Result<Option<Vec<u8>>, MacError> {
        let (header, header_len) = FragmentHeader::parse(payload)?;
        // Timed-out datagrams must not complete even if no tick ran since.
        self.tick(current_time_us);
        let body = &payload[header_len..];
        let size = header.datagram_size as usize;

        let index = if header.offset == 0 {
            if self.sleepy && link_security && !self.entries.is_empty() {
                debug!("[Indirect] New secure datagram, dropping {} partial", self.entries.len());
                self.dropped += self.entries.len() as u32;
                self.entries.clear();
            }
            // A repeated first fragment restarts its datagram.
            self.entries.retain(|e| !(e.source == *src && e.tag == header.datagram_tag));
            if self.entries.len() >= self.capacity {
                self.entries.remove(0);
                self.dropped += 1;
            }

            let mut data = Vec::with_capacity(size);
            let consumed = compressor.decompress(body, src, dst, &mut data)?;
            data.extend_from_slice(body.get(consumed..).ok_or(MacError::Parse)?);
            self.entries.push(PartialDatagram {
                source: *src,
                tag: header.datagram_tag,
                size,
                link_security,
                data,
                expires_at_us: current_time_us.saturating_add(self.timeout_us),
            });
            self.entries.len() - 1
        } else {
            let found = self.entries.iter().position(|e| {
                e.source == *src
                    && e.tag == header.datagram_tag
                    && e.size == size
                    && e.data.len() == header.offset as usize
                    && e.link_security == link_security
            });
            let Some(index) = found else {
                trace!(
                    "[Indirect] No partial datagram for tag {} offset {} from {}",
                    header.datagram_tag, header.offset, src
                );
                return Ok(None);
            };
            self.entries[index].data.extend_from_slice(body);
            index
        };

        let entry = &self.entries[index];
        if entry.data.len() < entry.size {
            return Ok(None);
        }
        let entry = self.entries.remove(index);
        if entry.data.len() > entry.size {
            debug!("[Indirect] Datagram tag {} overran its size", entry.tag);
            self.dropped += 1;
            return Err(MacError::Parse);
        }
        trace!("[Indirect] Reassembled {} bytes from {}", entry.size, src);
        Ok(Some(entry.data))
    }

    /// Drops partial datagrams whose timeout has passed.
    pub fn tick(&mut self, current_time_us: u64) {
        let before = self.entries.len();
        self.entries.retain(|e| e.expires_at_us > current_time_us);
        let expired = before - self.entries.len();
        if expired > 0 {
            debug!("[Indirect] Reassembly timeout, dropped {} datagram(s)", expired);
            self.dropped += expired as u32;
        }
    }

    pub fn next_deadline(&self) -> Option<u64> {
        self.entries.iter().map(|e| e.expires_at_us).min()
    }

    pub fn pending_count(&self) -> usize {
        self.entries.len()
    }

    /// Partial datagrams discarded so far.
    pub fn dropped_count(&self) -> u32 {
        self.dropped
    }
}
