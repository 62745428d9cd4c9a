use core::convert::TryFrom;
use core::fmt;

// --- PHY / MAC Constants (IEEE 802.15.4-2015) ---

/// Maximum PSDU size in bytes (aMaxPhyPacketSize).
pub const C_MAX_PHY_PACKET_SIZE: usize = 127;

/// Size of the frame check sequence in bytes.
pub const C_FCS_SIZE: usize = 2;

/// Duration of one O-QPSK symbol at 2.4 GHz in microseconds.
pub const C_PHY_US_PER_SYMBOL: u64 = 16;

/// Number of symbols forming one CSMA/CA backoff period (aUnitBackoffPeriod).
pub const C_UNIT_BACKOFF_PERIOD: u64 = 20;

/// Minimum backoff exponent (macMinBE).
pub const C_MAC_MIN_BE: u8 = 3;

/// Maximum backoff exponent (macMaxBE).
pub const C_MAC_MAX_BE: u8 = 5;

/// Maximum number of CSMA backoffs before declaring channel access failure (macMaxCSMABackoffs).
pub const C_MAX_CSMA_BACKOFFS: u8 = 4;

/// Maximum number of retransmissions for a direct frame (macMaxFrameRetries).
pub const C_MAX_FRAME_RETRIES: u8 = 3;

/// Time to wait for an acknowledgment before counting a no-ack, in microseconds.
pub const C_ACK_TIMEOUT_US: u64 = 16_000;

/// Time to wait for a data frame after an ack with the frame-pending bit, in microseconds.
pub const C_DATA_POLL_TIMEOUT_US: u64 = 100_000;

/// Per-channel scan dwell used when a scan is requested with a zero duration.
pub const C_SCAN_DURATION_DEFAULT_MS: u16 = 300;

/// Size of the AES-CCM* nonce in bytes.
pub const C_NONCE_SIZE: usize = 13;

/// Lowest channel number on channel page 0.
pub const C_CHANNEL_MIN: u8 = 0;

/// Highest channel number on channel page 0.
pub const C_CHANNEL_MAX: u8 = 26;

/// Broadcast short address and PAN identifier.
pub const C_BROADCAST: u16 = 0xffff;

/// Short address value meaning "no short address assigned".
pub const C_SHORT_ADDRESS_NONE: u16 = 0xfffe;

// --- Addresses ---

/// An IEEE 802.15.4 extended (EUI-64) address, stored in natural byte order.
///
/// Frames carry this address byte-reversed on air; the codec handles the
/// reversal so the rest of the stack never sees the wire order.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Default)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub struct ExtAddress(pub [u8; 8]);

impl ExtAddress {
    /// Returns the address in over-the-air (little-endian) order.
    pub fn to_wire(&self) -> [u8; 8] {
        let mut bytes = self.0;
        bytes.reverse();
        bytes
    }

    /// Builds an address from over-the-air (little-endian) order.
    pub fn from_wire(bytes: [u8; 8]) -> Self {
        let mut natural = bytes;
        natural.reverse();
        Self(natural)
    }
}

impl fmt::Display for ExtAddress {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        for byte in self.0 {
            write!(f, "{byte:02x}")?;
        }
        Ok(())
    }
}

/// An IEEE 802.15.4 short address (RLOC16 in Thread).
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub struct ShortAddress(pub u16);

impl ShortAddress {
    pub const BROADCAST: Self = Self(C_BROADCAST);
    pub const NONE: Self = Self(C_SHORT_ADDRESS_NONE);

    pub fn is_broadcast(&self) -> bool {
        self.0 == C_BROADCAST
    }

    /// A short address is usable as a source or unicast destination.
    pub fn is_valid(&self) -> bool {
        self.0 != C_BROADCAST && self.0 != C_SHORT_ADDRESS_NONE
    }
}

impl Default for ShortAddress {
    fn default() -> Self {
        Self::NONE
    }
}

impl fmt::Display for ShortAddress {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{:#06x}", self.0)
    }
}

/// An IEEE 802.15.4 PAN identifier.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct PanId(pub u16);

impl PanId {
    pub const BROADCAST: Self = Self(C_BROADCAST);
}

impl Default for PanId {
    fn default() -> Self {
        Self::BROADCAST
    }
}

/// A MAC address as carried in a frame's addressing fields.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default)]
pub enum MacAddress {
    #[default]
    None,
    Short(ShortAddress),
    Extended(ExtAddress),
}

impl MacAddress {
    pub fn is_none(&self) -> bool {
        matches!(self, MacAddress::None)
    }

    pub fn is_broadcast(&self) -> bool {
        matches!(self, MacAddress::Short(short) if short.is_broadcast())
    }

    /// Size of the address on air.
    pub fn wire_len(&self) -> usize {
        match self {
            MacAddress::None => 0,
            MacAddress::Short(_) => 2,
            MacAddress::Extended(_) => 8,
        }
    }
}

impl From<ShortAddress> for MacAddress {
    fn from(short: ShortAddress) -> Self {
        MacAddress::Short(short)
    }
}

impl From<ExtAddress> for MacAddress {
    fn from(ext: ExtAddress) -> Self {
        MacAddress::Extended(ext)
    }
}

impl fmt::Display for MacAddress {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            MacAddress::None => write!(f, "none"),
            MacAddress::Short(short) => write!(f, "{short}"),
            MacAddress::Extended(ext) => write!(f, "{ext}"),
        }
    }
}

// --- Channels ---

/// A channel number on channel page 0, wrapping a `u8` to ensure it is in range.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct Channel(pub u8);

/// Error type for invalid channel creation.
#[derive(Debug, PartialEq, Eq)]
pub enum ChannelError {
    /// Channel is outside the valid range (0-26).
    InvalidRange(u8),
}

impl fmt::Display for ChannelError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ChannelError::InvalidRange(value) => write!(
                f,
                "Invalid channel value: {}. Valid range is {}-{}.",
                value, C_CHANNEL_MIN, C_CHANNEL_MAX
            ),
        }
    }
}

#[cfg(feature = "std")]
impl std::error::Error for ChannelError {}

impl TryFrom<u8> for Channel {
    type Error = ChannelError;

    fn try_from(value: u8) -> Result<Self, Self::Error> {
        match value {
            C_CHANNEL_MIN..=C_CHANNEL_MAX => Ok(Channel(value)),
            _ => Err(ChannelError::InvalidRange(value)),
        }
    }
}

impl From<Channel> for u8 {
    fn from(channel: Channel) -> Self {
        channel.0
    }
}

/// A set of channels where bit `i` selects channel `i`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct ChannelMask(pub u32);

impl ChannelMask {
    /// Every channel in the 2.4 GHz band (11-26).
    pub const ALL_2_4_GHZ: Self = Self(0x07ff_f800);

    /// Bits that correspond to a channel on page 0.
    const VALID_BITS: u32 = (1 << (C_CHANNEL_MAX as u32 + 1)) - 1;

    pub fn contains(&self, channel: Channel) -> bool {
        channel.0 <= C_CHANNEL_MAX && self.0 & (1 << channel.0) != 0
    }

    pub fn is_empty(&self) -> bool {
        self.0 & Self::VALID_BITS == 0
    }

    /// Selects `channel`. Channels outside page 0 are ignored.
    pub fn insert(&mut self, channel: Channel) {
        if channel.0 <= C_CHANNEL_MAX {
            self.0 |= 1 << channel.0;
        }
    }

    /// Returns the lowest selected channel strictly above `after`, or the lowest
    /// selected channel overall when `after` is `None`.
    pub fn next_channel(&self, after: Option<Channel>) -> Option<Channel> {
        let start = match after {
            Some(channel) => channel.0 + 1,
            None => C_CHANNEL_MIN,
        };
        (start..=C_CHANNEL_MAX)
            .find(|&ch| self.0 & (1 << ch) != 0)
            .map(Channel)
    }

    /// Number of selected channels.
    pub fn count(&self) -> u32 {
        (self.0 & Self::VALID_BITS).count_ones()
    }
}
