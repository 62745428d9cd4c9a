use crate::frame::{AuxSecurityHeader, Frame, FrameType, FrameVersion};
use crate::hal::MacError;
use crate::types::{C_FCS_SIZE, C_MAX_PHY_PACKET_SIZE, ExtAddress, MacAddress, PanId, ShortAddress};
use alloc::vec::Vec;
use core::convert::TryFrom;
use log::trace;

/// A trait for objects that can be serialized into and deserialized from a PSDU.
pub trait Codec: Sized {
    /// Serializes the object, including the FCS, into the provided buffer.
    /// Returns the number of bytes written.
    fn serialize(&self, buffer: &mut [u8]) -> Result<usize, MacError>;

    /// Deserializes an object from a complete PSDU, verifying the FCS.
    fn deserialize(buffer: &[u8]) -> Result<Self, MacError>;
}

// --- Frame Control Field layout ---
const FCF_SECURITY: u16 = 1 << 3;
const FCF_FRAME_PENDING: u16 = 1 << 4;
const FCF_ACK_REQUEST: u16 = 1 << 5;
const FCF_PAN_ID_COMPRESSION: u16 = 1 << 6;
const FCF_IE_PRESENT: u16 = 1 << 9;
const FCF_DST_MODE_SHIFT: u16 = 10;
const FCF_VERSION_SHIFT: u16 = 12;
const FCF_SRC_MODE_SHIFT: u16 = 14;

const ADDR_MODE_NONE: u16 = 0;
const ADDR_MODE_SHORT: u16 = 2;
const ADDR_MODE_EXT: u16 = 3;

/// Header termination IE placed between header IEs and a payload.
const IE_HEADER_TERMINATION_2: u16 = 0x7f << 7;
const IE_ID_HEADER_TERMINATION_1: u16 = 0x7e;
const IE_ID_HEADER_TERMINATION_2: u16 = 0x7f;

fn addr_mode(address: &MacAddress) -> u16 {
    match address {
        MacAddress::None => ADDR_MODE_NONE,
        MacAddress::Short(_) => ADDR_MODE_SHORT,
        MacAddress::Extended(_) => ADDR_MODE_EXT,
    }
}

/// Returns which PAN identifiers are present on air as (destination, source).
fn pan_id_presence(version: FrameVersion, dst_mode: u16, src_mode: u16, compression: bool) -> (bool, bool) {
    let dst = dst_mode != ADDR_MODE_NONE;
    let src = src_mode != ADDR_MODE_NONE;
    if version < FrameVersion::V2015 {
        return match (dst, src) {
            (true, true) => (true, !compression),
            (true, false) => (true, false),
            (false, true) => (false, true),
            (false, false) => (false, false),
        };
    }
    match (dst, src, compression) {
        (false, false, c) => (c, false),
        (true, false, c) => (!c, false),
        (false, true, c) => (false, !c),
        (true, true, true) => (dst_mode != ADDR_MODE_EXT || src_mode != ADDR_MODE_EXT, false),
        (true, true, false) if dst_mode == ADDR_MODE_EXT && src_mode == ADDR_MODE_EXT => (true, false),
        (true, true, false) => (true, true),
    }
}

/// Picks the PAN ID compression bit that represents the frame's PAN identifiers.
fn pan_id_compression(frame: &Frame) -> bool {
    let dst_mode = addr_mode(&frame.dst);
    let src_mode = addr_mode(&frame.src);
    let want_dst = frame.dst_pan_id.is_some() && dst_mode != ADDR_MODE_NONE
        || frame.dst_pan_id.is_some() && src_mode == ADDR_MODE_NONE;
    let want_src = match (frame.src_pan_id, want_dst) {
        (Some(src), true) => frame.dst_pan_id != Some(src),
        (Some(_), false) => true,
        (None, _) => false,
    };
    [false, true]
        .into_iter()
        .find(|&c| pan_id_presence(frame.version, dst_mode, src_mode, c) == (want_dst, want_src))
        .unwrap_or(false)
}

fn write_address(address: &MacAddress, buffer: &mut [u8]) -> usize {
    match address {
        MacAddress::None => 0,
        MacAddress::Short(short) => {
            buffer[0..2].copy_from_slice(&short.0.to_le_bytes());
            2
        }
        MacAddress::Extended(ext) => {
            buffer[0..8].copy_from_slice(&ext.to_wire());
            8
        }
    }
}

fn read_address(mode: u16, buffer: &[u8]) -> Result<(MacAddress, usize), MacError> {
    match mode {
        ADDR_MODE_NONE => Ok((MacAddress::None, 0)),
        ADDR_MODE_SHORT => {
            let bytes = buffer.get(0..2).ok_or(MacError::Parse)?;
            Ok((MacAddress::Short(ShortAddress(u16::from_le_bytes(bytes.try_into()?))), 2))
        }
        ADDR_MODE_EXT => {
            let bytes = buffer.get(0..8).ok_or(MacError::Parse)?;
            Ok((MacAddress::Extended(ExtAddress::from_wire(bytes.try_into()?)), 8))
        }
        _ => Err(MacError::Parse),
    }
}

fn read_pan_id(buffer: &[u8]) -> Result<PanId, MacError> {
    let bytes = buffer.get(0..2).ok_or(MacError::Parse)?;
    Ok(PanId(u16::from_le_bytes(bytes.try_into()?)))
}

/// Computes the IEEE 802.15.4 FCS (CRC-16/ITU-T, reflected, initial value 0).
pub fn crc16(data: &[u8]) -> u16 {
    let mut crc: u16 = 0;
    for &byte in data {
        crc ^= byte as u16;
        for _ in 0..8 {
            if crc & 1 != 0 {
                crc = (crc >> 1) ^ 0x8408;
            } else {
                crc >>= 1;
            }
        }
    }
    crc
}

impl Frame {
    /// Length of the MAC header: everything before the payload, including
    /// the auxiliary security header and header IEs.
    pub fn header_len(&self) -> usize {
        let compression = pan_id_compression(self);
        let (dst_pan, src_pan) =
            pan_id_presence(self.version, addr_mode(&self.dst), addr_mode(&self.src), compression);
        let mut len = 3;
        len += if dst_pan { 2 } else { 0 } + self.dst.wire_len();
        len += if src_pan { 2 } else { 0 } + self.src.wire_len();
        len += self.security.map(|sec| sec.wire_len()).unwrap_or(0);
        if !self.header_ies.is_empty() {
            len += self.header_ies.len();
            if !self.payload.is_empty() {
                len += 2;
            }
        }
        len
    }

    /// Writes the MAC header into `buffer` and returns its length.
    pub fn write_header(&self, buffer: &mut [u8]) -> Result<usize, MacError> {
        let header_len = self.header_len();
        if buffer.len() < header_len {
            return Err(MacError::BufferTooShort);
        }
        let dst_mode = addr_mode(&self.dst);
        let src_mode = addr_mode(&self.src);
        let compression = pan_id_compression(self);
        let (dst_pan, src_pan) = pan_id_presence(self.version, dst_mode, src_mode, compression);

        let mut fcf = self.frame_type as u16;
        if self.security.is_some() {
            fcf |= FCF_SECURITY;
        }
        if self.frame_pending {
            fcf |= FCF_FRAME_PENDING;
        }
        if self.ack_request {
            fcf |= FCF_ACK_REQUEST;
        }
        if compression {
            fcf |= FCF_PAN_ID_COMPRESSION;
        }
        if !self.header_ies.is_empty() {
            fcf |= FCF_IE_PRESENT;
        }
        fcf |= dst_mode << FCF_DST_MODE_SHIFT;
        fcf |= (self.version as u16) << FCF_VERSION_SHIFT;
        fcf |= src_mode << FCF_SRC_MODE_SHIFT;

        buffer[0..2].copy_from_slice(&fcf.to_le_bytes());
        buffer[2] = self.sequence;
        let mut offset = 3;

        if dst_pan {
            let pan = self.dst_pan_id.unwrap_or(PanId::BROADCAST);
            buffer[offset..offset + 2].copy_from_slice(&pan.0.to_le_bytes());
            offset += 2;
        }
        offset += write_address(&self.dst, &mut buffer[offset..]);
        if src_pan {
            let pan = self.src_pan_id.or(self.dst_pan_id).unwrap_or(PanId::BROADCAST);
            buffer[offset..offset + 2].copy_from_slice(&pan.0.to_le_bytes());
            offset += 2;
        }
        offset += write_address(&self.src, &mut buffer[offset..]);

        if let Some(security) = &self.security {
            offset += security.write(&mut buffer[offset..])?;
        }
        if !self.header_ies.is_empty() {
            buffer[offset..offset + self.header_ies.len()].copy_from_slice(&self.header_ies);
            offset += self.header_ies.len();
            if !self.payload.is_empty() {
                buffer[offset..offset + 2].copy_from_slice(&IE_HEADER_TERMINATION_2.to_le_bytes());
                offset += 2;
            }
        }
        Ok(offset)
    }
}

impl Codec for Frame {
    fn serialize(&self, buffer: &mut [u8]) -> Result<usize, MacError> {
        let total = self.header_len() + self.payload.len() + self.mic.len() + C_FCS_SIZE;
        if total > C_MAX_PHY_PACKET_SIZE {
            return Err(MacError::FrameTooLarge);
        }
        if buffer.len() < total {
            return Err(MacError::BufferTooShort);
        }
        let mut offset = self.write_header(buffer)?;
        buffer[offset..offset + self.payload.len()].copy_from_slice(&self.payload);
        offset += self.payload.len();
        buffer[offset..offset + self.mic.len()].copy_from_slice(&self.mic);
        offset += self.mic.len();
        let fcs = crc16(&buffer[..offset]);
        buffer[offset..offset + C_FCS_SIZE].copy_from_slice(&fcs.to_le_bytes());
        Ok(offset + C_FCS_SIZE)
    }

    fn deserialize(buffer: &[u8]) -> Result<Self, MacError> {
        if buffer.len() < 3 + C_FCS_SIZE {
            return Err(MacError::Parse);
        }
        if buffer.len() > C_MAX_PHY_PACKET_SIZE {
            return Err(MacError::FrameTooLarge);
        }
        let body_len = buffer.len() - C_FCS_SIZE;
        let received_fcs = u16::from_le_bytes(buffer[body_len..].try_into()?);
        if crc16(&buffer[..body_len]) != received_fcs {
            return Err(MacError::FcsError);
        }
        let body = &buffer[..body_len];

        let fcf = u16::from_le_bytes(body[0..2].try_into()?);
        let frame_type = FrameType::try_from((fcf & 0x07) as u8)?;
        let version = FrameVersion::try_from(((fcf >> FCF_VERSION_SHIFT) & 0x03) as u8)?;
        let dst_mode = (fcf >> FCF_DST_MODE_SHIFT) & 0x03;
        let src_mode = (fcf >> FCF_SRC_MODE_SHIFT) & 0x03;
        let compression = fcf & FCF_PAN_ID_COMPRESSION != 0;

        let mut frame = Frame {
            frame_type,
            version,
            sequence: body[2],
            frame_pending: fcf & FCF_FRAME_PENDING != 0,
            ack_request: fcf & FCF_ACK_REQUEST != 0,
            ..Frame::default()
        };

        let (dst_pan, src_pan) = pan_id_presence(version, dst_mode, src_mode, compression);
        let mut offset = 3;
        if dst_pan {
            frame.dst_pan_id = Some(read_pan_id(&body[offset..])?);
            offset += 2;
        }
        let (dst, len) = read_address(dst_mode, &body[offset..])?;
        frame.dst = dst;
        offset += len;
        if src_pan {
            frame.src_pan_id = Some(read_pan_id(&body[offset..])?);
            offset += 2;
        } else if src_mode != ADDR_MODE_NONE {
            frame.src_pan_id = frame.dst_pan_id;
        }
        let (src, len) = read_address(src_mode, &body[offset..])?;
        frame.src = src;
        offset += len;

        let mut mic_len = 0;
        if fcf & FCF_SECURITY != 0 {
            let (security, len) = AuxSecurityHeader::read(&body[offset..])?;
            mic_len = security.level.mic_len();
            frame.security = Some(security);
            offset += len;
        }

        if fcf & FCF_IE_PRESENT != 0 {
            let ie_start = offset;
            let ie_limit = body.len().saturating_sub(mic_len);
            let mut ie_end = offset;
            while offset + 2 <= ie_limit {
                let descriptor = u16::from_le_bytes(body[offset..offset + 2].try_into()?);
                let element_id = (descriptor >> 7) & 0xff;
                let content_len = (descriptor & 0x7f) as usize;
                offset += 2;
                if element_id == IE_ID_HEADER_TERMINATION_1 || element_id == IE_ID_HEADER_TERMINATION_2 {
                    break;
                }
                if offset + content_len > ie_limit {
                    return Err(MacError::Parse);
                }
                offset += content_len;
                ie_end = offset;
            }
            frame.header_ies = body[ie_start..ie_end].to_vec();
        }

        if body.len() < offset + mic_len {
            return Err(MacError::Parse);
        }
        frame.rx_header = body[..offset].to_vec();
        let payload_end = body.len() - mic_len;
        frame.payload = body[offset..payload_end].to_vec();
        frame.mic = body[payload_end..].to_vec();
        Ok(frame)
    }
}

/// Parses a complete PSDU into a `Frame`.
pub fn deserialize_frame(psdu: &[u8]) -> Result<Frame, MacError> {
    let result = Frame::deserialize(psdu);
    if let Ok(frame) = &result {
        trace!(
            "[MAC] Parsed {:?} frame seq={} dst={} src={}",
            frame.frame_type,
            frame.sequence,
            frame.dst,
            frame.src
        );
    }
    result
}

/// Returns the raw header bytes of a received frame.
pub(crate) fn received_header(frame: &Frame) -> &[u8] {
    &frame.rx_header
}

/// Builds the authenticated data of a frame about to be secured.
pub(crate) fn transmit_header(frame: &Frame) -> Result<Vec<u8>, MacError> {
    let mut header = alloc::vec![0u8; frame.header_len()];
    frame.write_header(&mut header)?;
    Ok(header)
}
