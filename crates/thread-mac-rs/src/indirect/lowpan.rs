// crates/thread-mac-rs/src/indirect/lowpan.rs
//! 6LoWPAN framing of datagrams: dispatch, mesh header and RFC 4944
//! fragmentation.
//!
//! Header compression itself is supplied through [`HeaderCompressor`]. The
//! provided [`Ipv6Dispatch`] carries the IPv6 header inline.

use crate::hal::MacError;
use crate::types::{MacAddress, ShortAddress};
use alloc::vec::Vec;

/// Dispatch of an uncompressed IPv6 header.
pub const C_DISPATCH_IPV6: u8 = 0x41;
pub const C_FRAG1_HEADER_SIZE: usize = 4;
pub const C_FRAGN_HEADER_SIZE: usize = 5;
/// Mesh header with short originator and final addresses.
pub const C_MESH_HEADER_SIZE: usize = 5;
pub const C_MESH_HOPS_LEFT: u8 = 14;
/// Largest datagram the 11-bit size field can describe.
pub const C_MAX_DATAGRAM_SIZE: usize = 0x7ff;

const C_FRAG1_DISPATCH: u8 = 0xc0;
const C_FRAGN_DISPATCH: u8 = 0xe0;

pub fn is_mesh_header(first_byte: u8) -> bool {
    first_byte & 0xc0 == 0x80
}

pub fn is_fragment_header(first_byte: u8) -> bool {
    first_byte & 0xd8 == 0xc0
}

/// Compresses and decompresses the IPv6 headers of a datagram.
pub trait HeaderCompressor {
    /// Appends the compressed headers of `datagram` to `out`.
    ///
    /// Returns the number of leading datagram bytes the compressed form
    /// replaces; the caller sends the rest verbatim.
    fn compress(
        &self,
        datagram: &[u8],
        src: &MacAddress,
        dst: &MacAddress,
        out: &mut Vec<u8>,
    ) -> Result<usize, MacError>;

    /// Appends the uncompressed headers found at the start of `payload` to
    /// `out` and returns the number of payload bytes consumed.
    fn decompress(
        &self,
        payload: &[u8],
        src: &MacAddress,
        dst: &MacAddress,
        out: &mut Vec<u8>,
    ) -> Result<usize, MacError>;
}

/// Sends the IPv6 header uncompressed behind the IPv6 dispatch byte.
#[derive(Debug, Clone, Copy, Default)]
pub struct Ipv6Dispatch;

impl HeaderCompressor for Ipv6Dispatch {
    fn compress(
        &self,
        _datagram: &[u8],
        _src: &MacAddress,
        _dst: &MacAddress,
        out: &mut Vec<u8>,
    ) -> Result<usize, MacError> {
        out.push(C_DISPATCH_IPV6);
        Ok(0)
    }

    fn decompress(
        &self,
        payload: &[u8],
        _src: &MacAddress,
        _dst: &MacAddress,
        _out: &mut Vec<u8>,
    ) -> Result<usize, MacError> {
        match payload.first() {
            Some(&C_DISPATCH_IPV6) => Ok(1),
            _ => Err(MacError::Parse),
        }
    }
}

/// RFC 4944 mesh addressing header with short addresses.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct MeshHeader {
    pub hops_left: u8,
    pub source: ShortAddress,
    pub destination: ShortAddress,
}

impl MeshHeader {
    pub fn new(source: ShortAddress, destination: ShortAddress) -> Self {
        Self {
            hops_left: C_MESH_HOPS_LEFT,
            source,
            destination,
        }
    }

    pub fn write(&self, out: &mut Vec<u8>) {
        // 10 V F HopsLeft, both addresses short.
        out.push(0x80 | 0x20 | 0x10 | (self.hops_left & 0x0f));
        out.extend_from_slice(&self.source.0.to_be_bytes());
        out.extend_from_slice(&self.destination.0.to_be_bytes());
    }

    /// Parses a mesh header, returning it with its length.
    pub fn parse(buffer: &[u8]) -> Result<(Self, usize), MacError> {
        let first = *buffer.first().ok_or(MacError::Parse)?;
        if !is_mesh_header(first) || first & 0x30 != 0x30 || first & 0x0f == 0x0f {
            return Err(MacError::Parse);
        }
        if buffer.len() < C_MESH_HEADER_SIZE {
            return Err(MacError::Parse);
        }
        let header = Self {
            hops_left: first & 0x0f,
            source: ShortAddress(u16::from_be_bytes(buffer[1..3].try_into()?)),
            destination: ShortAddress(u16::from_be_bytes(buffer[3..5].try_into()?)),
        };
        Ok((header, C_MESH_HEADER_SIZE))
    }
}

/// FRAG1 (offset 0) or FRAGN header.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct FragmentHeader {
    pub datagram_size: u16,
    pub datagram_tag: u16,
    /// Offset into the uncompressed datagram in bytes, a multiple of 8.
    pub offset: u16,
}

impl FragmentHeader {
    pub fn header_len(&self) -> usize {
        if self.offset == 0 { C_FRAG1_HEADER_SIZE } else { C_FRAGN_HEADER_SIZE }
    }

    pub fn write(&self, out: &mut Vec<u8>) {
        let dispatch = if self.offset == 0 { C_FRAG1_DISPATCH } else { C_FRAGN_DISPATCH };
        let size = self.datagram_size & 0x07ff;
        out.push(dispatch | (size >> 8) as u8);
        out.push(size as u8);
        out.extend_from_slice(&self.datagram_tag.to_be_bytes());
        if self.offset != 0 {
            out.push((self.offset / 8) as u8);
        }
    }

    /// Parses a fragment header, returning it with its length.
    pub fn parse(buffer: &[u8]) -> Result<(Self, usize), MacError> {
        if buffer.len() < C_FRAG1_HEADER_SIZE || !is_fragment_header(buffer[0]) {
            return Err(MacError::Parse);
        }
        let datagram_size = u16::from_be_bytes([buffer[0] & 0x07, buffer[1]]);
        let datagram_tag = u16::from_be_bytes([buffer[2], buffer[3]]);
        if buffer[0] & 0xf8 == C_FRAG1_DISPATCH {
            return Ok((Self { datagram_size, datagram_tag, offset: 0 }, C_FRAG1_HEADER_SIZE));
        }
        let offset = *buffer.get(4).ok_or(MacError::Parse)? as u16 * 8;
        Ok((Self { datagram_size, datagram_tag, offset }, C_FRAGN_HEADER_SIZE))
    }
}

/// Uncompressed datagram bytes carried by the first fragment, after
/// `header_len` bytes of mesh and compressed headers standing for the first
/// `consumed` datagram bytes. The fragment ends on a multiple of 8 of the
/// datagram, where the next fragment's offset starts.
pub fn first_fragment_len(max_payload: usize, header_len: usize, consumed: usize) -> usize {
    let room = max_payload.saturating_sub(header_len + C_FRAG1_HEADER_SIZE);
    ((consumed + room) & !7).saturating_sub(consumed)
}

/// Datagram bytes carried by a subsequent fragment behind `header_len` bytes
/// of mesh header.
pub fn next_fragment_len(max_payload: usize, header_len: usize) -> usize {
    max_payload.saturating_sub(header_len + C_FRAGN_HEADER_SIZE) & !7
}

/// Fragment tags for outgoing datagrams. Never yields 0.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct TagGenerator {
    next: u16,
}

impl TagGenerator {
    pub fn new(seed: u16) -> Self {
        Self { next: seed.max(1) }
    }

    pub fn next_tag(&mut self) -> u16 {
        let tag = self.next;
        self.next = self.next.wrapping_add(1).max(1);
        tag
    }
}

/// One encoded frame payload of a datagram.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct EncodedFragment {
    pub payload: Vec<u8>,
    /// Datagram offset where the next fragment starts; the datagram length
    /// once complete.
    pub next_offset: usize,
}

/// Encodes the part of `datagram` starting at `offset` into one frame
/// payload of at most `max_payload` bytes.
///
/// `tag` holds the datagram tag; it is drawn from `tags` when the first
/// fragment turns out to need fragmentation.
#[allow(clippy::too_many_arguments)]
pub fn encode_fragment(
    compressor: &dyn HeaderCompressor,
    datagram: &[u8],
    mesh: Option<&MeshHeader>,
    src: &MacAddress,
    dst: &MacAddress,
    offset: usize,
    max_payload: usize,
    tag: &mut u16,
    tags: &mut TagGenerator,
) -> Result<EncodedFragment, MacError> {
    if datagram.len() > C_MAX_DATAGRAM_SIZE {
        return Err(MacError::FrameTooLarge);
    }
    let mut payload = Vec::with_capacity(max_payload);
    if let Some(mesh) = mesh {
        mesh.write(&mut payload);
    }
    let mesh_len = payload.len();

    if offset == 0 {
        let mut compressed = Vec::new();
        let consumed = compressor.compress(datagram, src, dst, &mut compressed)?;
        let header_len = mesh_len + compressed.len();
        let remaining = datagram.len().saturating_sub(consumed);

        if header_len + remaining <= max_payload {
            payload.extend_from_slice(&compressed);
            payload.extend_from_slice(&datagram[consumed..]);
            return Ok(EncodedFragment { payload, next_offset: datagram.len() });
        }

        let len = first_fragment_len(max_payload, header_len, consumed);
        if len == 0 {
            return Err(MacError::FrameTooLarge);
        }
        if *tag == 0 {
            *tag = tags.next_tag();
        }
        FragmentHeader {
            datagram_size: datagram.len() as u16,
            datagram_tag: *tag,
            offset: 0,
        }
        .write(&mut payload);
        payload.extend_from_slice(&compressed);
        payload.extend_from_slice(&datagram[consumed..consumed + len]);
        return Ok(EncodedFragment { payload, next_offset: consumed + len });
    }

    if offset % 8 != 0 || offset >= datagram.len() {
        return Err(MacError::InvalidArgs);
    }
    let len = next_fragment_len(max_payload, mesh_len).min(datagram.len() - offset);
    if len == 0 {
        return Err(MacError::FrameTooLarge);
    }
    FragmentHeader {
        datagram_size: datagram.len() as u16,
        datagram_tag: *tag,
        offset: offset as u16,
    }
    .write(&mut payload);
    payload.extend_from_slice(&datagram[offset..offset + len]);
    Ok(EncodedFragment { payload, next_offset: offset + len })
}

/// Decodes an unfragmented frame payload (mesh header already removed) into
/// the datagram.
pub fn decode_datagram(
    compressor: &dyn HeaderCompressor,
    payload: &[u8],
    src: &MacAddress,
    dst: &MacAddress,
) -> Result<Vec<u8>, MacError> {
    let mut datagram = Vec::with_capacity(payload.len() + 40);
    let consumed = compressor.decompress(payload, src, dst, &mut datagram)?;
    datagram.extend_from_slice(payload.get(consumed..).ok_or(MacError::Parse)?);
    Ok(datagram)
}
