// crates/thread-mac-rs/src/mac/operation.rs
use core::fmt;
use core::ops::BitOr;

/// The single activity currently occupying the radio.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
#[cfg_attr(feature = "serde", derive(serde::Serialize))]
pub enum Operation {
    #[default]
    Idle,
    ActiveScan,
    EnergyScan,
    TransmitBeacon,
    TransmitData,
    TransmitWakeup,
}

impl fmt::Display for Operation {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            Operation::Idle => "Idle",
            Operation::ActiveScan => "ActiveScan",
            Operation::EnergyScan => "EnergyScan",
            Operation::TransmitBeacon => "TransmitBeacon",
            Operation::TransmitData => "TransmitData",
            Operation::TransmitWakeup => "TransmitWakeup",
        };
        f.write_str(name)
    }
}

/// Operations requested while the radio was busy.
///
/// Drained in priority order when the radio returns to idle:
/// active scan, energy scan, beacon, data.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct PendingOperations(pub u8);

impl PendingOperations {
    // --- Flag Constants ---
    pub const ACTIVE_SCAN: Self = Self(1 << 0);
    pub const ENERGY_SCAN: Self = Self(1 << 1);
    pub const TRANSMIT_BEACON: Self = Self(1 << 2);
    pub const TRANSMIT_DATA: Self = Self(1 << 3);

    // --- Methods ---

    pub fn empty() -> Self {
        Self(0)
    }

    pub fn is_empty(&self) -> bool {
        self.0 == 0
    }

    /// Checks if all of the specified flags are set.
    pub fn contains(&self, other: Self) -> bool {
        (self.0 & other.0) == other.0
    }

    pub fn insert(&mut self, other: Self) {
        self.0 |= other.0;
    }

    pub fn remove(&mut self, other: Self) {
        self.0 &= !other.0;
    }

    /// Removes and returns the highest-priority pending operation.
    pub fn take_next(&mut self) -> Option<Operation> {
        const ORDER: [(PendingOperations, Operation); 4] = [
            (PendingOperations::ACTIVE_SCAN, Operation::ActiveScan),
            (PendingOperations::ENERGY_SCAN, Operation::EnergyScan),
            (PendingOperations::TRANSMIT_BEACON, Operation::TransmitBeacon),
            (PendingOperations::TRANSMIT_DATA, Operation::TransmitData),
        ];
        let (flag, operation) = ORDER.into_iter().find(|(flag, _)| self.contains(*flag))?;
        self.remove(flag);
        Some(operation)
    }
}

impl BitOr for PendingOperations {
    type Output = Self;

    fn bitor(self, rhs: Self) -> Self::Output {
        Self(self.0 | rhs.0)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_bitor_implementation() {
        let flags = PendingOperations::ACTIVE_SCAN | PendingOperations::TRANSMIT_DATA;
        assert_eq!(flags.0, 0b0000_1001);
        assert!(flags.contains(PendingOperations::TRANSMIT_DATA));
        assert!(!flags.contains(PendingOperations::ENERGY_SCAN));
    }

    #[test]
    fn test_scan_is_drained_before_data() {
        let mut pending = PendingOperations::TRANSMIT_DATA
            | PendingOperations::TRANSMIT_BEACON
            | PendingOperations::ENERGY_SCAN;
        assert_eq!(pending.take_next(), Some(Operation::EnergyScan));
        assert_eq!(pending.take_next(), Some(Operation::TransmitBeacon));
        assert_eq!(pending.take_next(), Some(Operation::TransmitData));
        assert_eq!(pending.take_next(), None);
        assert!(pending.is_empty());
    }
}
