pub mod link_quality;

pub use link_quality::{LinkQualityInfo, RssAverager};

use crate::hal::MacError;
use crate::types::{ExtAddress, MacAddress, ShortAddress};
use alloc::vec::Vec;

/// Consecutive failed transmissions after which a router neighbor is dropped.
pub const C_FAILED_ROUTER_TRANSMISSIONS: u8 = 4;

/// Index of a child in the child table. Stable while the child is attached.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct ChildIndex(pub u8);

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum NeighborRole {
    Router,
    Child,
}

/// Per-child state of the indirect transmission path.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct IndirectState {
    /// Number of queued messages still addressed to this child.
    pub message_count: u16,
    /// A data poll arrived and has not been answered yet.
    pub data_request_pending: bool,
    /// Consecutive poll-triggered attempts of the current message.
    pub tx_attempts: u8,
    /// The next frame must repeat the last failed attempt.
    pub retransmit: bool,
    /// Sequence number, frame counter and key index of the last attempt,
    /// reused for an identical retransmission on the next poll.
    pub sequence: u8,
    pub frame_counter: u32,
    pub key_id: u8,
}

/// A neighbor record as seen by the link layer.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Neighbor {
    pub ext_address: ExtAddress,
    pub short_address: ShortAddress,
    pub role: NeighborRole,
    pub rx_on_when_idle: bool,
    /// Next acceptable frame counter for the neighbor's key sequence.
    pub link_frame_counter: u32,
    pub key_sequence: u32,
    pub link_failures: u8,
    pub link_info: LinkQualityInfo,
    pub last_heard_us: u64,
    pub indirect: IndirectState,
}

impl Neighbor {
    pub fn new(ext_address: ExtAddress, short_address: ShortAddress, role: NeighborRole) -> Self {
        Self {
            ext_address,
            short_address,
            role,
            rx_on_when_idle: role == NeighborRole::Router,
            link_frame_counter: 0,
            key_sequence: 0,
            link_failures: 0,
            link_info: LinkQualityInfo::default(),
            last_heard_us: 0,
            indirect: IndirectState::default(),
        }
    }

    pub fn matches(&self, address: &MacAddress) -> bool {
        match address {
            MacAddress::None => false,
            MacAddress::Short(short) => short.is_valid() && *short == self.short_address,
            MacAddress::Extended(ext) => *ext == self.ext_address,
        }
    }

    /// The address used to reach this neighbor: short when assigned, extended otherwise.
    pub fn mac_address(&self) -> MacAddress {
        if self.short_address.is_valid() {
            MacAddress::Short(self.short_address)
        } else {
            MacAddress::Extended(self.ext_address)
        }
    }

    pub fn is_sleepy_child(&self) -> bool {
        self.role == NeighborRole::Child && !self.rx_on_when_idle
    }
}

/// Storage of neighbors consulted and updated by the link layer.
pub trait NeighborTable {
    fn find(&self, address: &MacAddress) -> Option<&Neighbor>;
    fn find_mut(&mut self, address: &MacAddress) -> Option<&mut Neighbor>;
    fn child(&self, index: ChildIndex) -> Option<&Neighbor>;
    fn child_mut(&mut self, index: ChildIndex) -> Option<&mut Neighbor>;
    fn child_index(&self, address: &MacAddress) -> Option<ChildIndex>;
    /// Drops a neighbor, e.g. after repeated link failures.
    fn remove(&mut self, address: &MacAddress) -> Option<Neighbor>;
}

/// A fixed-capacity neighbor table with stable child indices.
#[derive(Debug, Clone)]
pub struct NeighborList {
    children: Vec<Option<Neighbor>>,
    routers: Vec<Neighbor>,
    max_routers: usize,
}

impl NeighborList {
    pub fn new(max_children: usize, max_routers: usize) -> Self {
        Self {
            children: (0..max_children).map(|_| None).collect(),
            routers: Vec::with_capacity(max_routers),
            max_routers,
        }
    }

    /// Attaches a child in the first free slot.
    pub fn add_child(&mut self, child: Neighbor) -> Result<ChildIndex, MacError> {
        if self.child_index(&MacAddress::Extended(child.ext_address)).is_some() {
            return Err(MacError::Already);
        }
        let slot = self
            .children
            .iter()
            .position(Option::is_none)
            .ok_or(MacError::NoBufs)?;
        self.children[slot] = Some(Neighbor {
            role: NeighborRole::Child,
            ..child
        });
        Ok(ChildIndex(slot as u8))
    }

    pub fn add_router(&mut self, router: Neighbor) -> Result<(), MacError> {
        if self.routers.iter().any(|r| r.ext_address == router.ext_address) {
            return Err(MacError::Already);
        }
        if self.routers.len() >= self.max_routers {
            return Err(MacError::NoBufs);
        }
        self.routers.push(Neighbor {
            role: NeighborRole::Router,
            ..router
        });
        Ok(())
    }

    pub fn children(&self) -> impl Iterator<Item = (ChildIndex, &Neighbor)> {
        self.children
            .iter()
            .enumerate()
            .filter_map(|(i, c)| c.as_ref().map(|c| (ChildIndex(i as u8), c)))
    }

    pub fn child_capacity(&self) -> usize {
        self.children.len()
    }
}

impl NeighborTable for NeighborList {
    fn find(&self, address: &MacAddress) -> Option<&Neighbor> {
        self.children
            .iter()
            .flatten()
            .chain(self.routers.iter())
            .find(|n| n.matches(address))
    }

    fn find_mut(&mut self, address: &MacAddress) -> Option<&mut Neighbor> {
        self.children
            .iter_mut()
            .flatten()
            .chain(self.routers.iter_mut())
            .find(|n| n.matches(address))
    }

    fn child(&self, index: ChildIndex) -> Option<&Neighbor> {
        self.children.get(index.0 as usize).and_then(Option::as_ref)
    }

    fn child_mut(&mut self, index: ChildIndex) -> Option<&mut Neighbor> {
        self.children.get_mut(index.0 as usize).and_then(Option::as_mut)
    }

    fn child_index(&self, address: &MacAddress) -> Option<ChildIndex> {
        self.children
            .iter()
            .position(|c| c.as_ref().is_some_and(|c| c.matches(address)))
            .map(|i| ChildIndex(i as u8))
    }

    fn remove(&mut self, address: &MacAddress) -> Option<Neighbor> {
        if let Some(index) = self.child_index(address) {
            return self.children[index.0 as usize].take();
        }
        let position = self.routers.iter().position(|r| r.matches(address))?;
        Some(self.routers.remove(position))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn ext(last: u8) -> ExtAddress {
        ExtAddress([0x12, 0x34, 0, 0, 0, 0, 0, last])
    }

    #[test]
    fn test_child_indices_are_stable() {
        let mut table = NeighborList::new(2, 1);
        let a = table
            .add_child(Neighbor::new(ext(1), ShortAddress(0x0401), NeighborRole::Child))
            .unwrap();
        let b = table
            .add_child(Neighbor::new(ext(2), ShortAddress(0x0402), NeighborRole::Child))
            .unwrap();
        assert_eq!((a, b), (ChildIndex(0), ChildIndex(1)));
        assert_eq!(
            table.add_child(Neighbor::new(ext(3), ShortAddress(0x0403), NeighborRole::Child)),
            Err(MacError::NoBufs)
        );

        table.remove(&MacAddress::Short(ShortAddress(0x0401)));
        assert!(table.child(ChildIndex(0)).is_none());
        assert_eq!(table.child_index(&ext(2).into()), Some(ChildIndex(1)));
    }

    #[test]
    fn test_lookup_by_short_or_extended() {
        let mut table = NeighborList::new(1, 1);
        table
            .add_router(Neighbor::new(ext(9), ShortAddress(0x0800), NeighborRole::Router))
            .unwrap();
        assert!(table.find(&MacAddress::Short(ShortAddress(0x0800))).is_some());
        assert!(table.find(&ext(9).into()).is_some());
        assert!(table.find(&MacAddress::Short(ShortAddress::BROADCAST)).is_none());
        assert!(table.child_index(&ext(9).into()).is_none());
    }

    #[test]
    fn test_sleepy_child() {
        let mut child = Neighbor::new(ext(1), ShortAddress(0x0401), NeighborRole::Child);
        assert!(child.is_sleepy_child());
        child.rx_on_when_idle = true;
        assert!(!child.is_sleepy_child());
        assert_eq!(child.mac_address(), MacAddress::Short(ShortAddress(0x0401)));
    }
}
