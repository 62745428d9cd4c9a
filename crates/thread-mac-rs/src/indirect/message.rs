// crates/thread-mac-rs/src/indirect/message.rs
use crate::neighbor::ChildIndex;
use crate::types::{MacAddress, ShortAddress};
use alloc::vec::Vec;
use core::fmt;

/// Largest child index a message can be queued for.
pub const C_MAX_CHILD_INDEX: u8 = 63;

/// Handle of a queued message, unique for the lifetime of the manager.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct MessageId(pub u32);

impl fmt::Display for MessageId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "msg#{}", self.0)
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum MessageType {
    /// An IPv6 datagram, header compressed on the way out.
    Ip6,
    /// An empty keep-alive frame for a sleepy child.
    Supervision,
    /// An already compressed 6LoWPAN payload being forwarded.
    Lowpan,
}

/// Finer classification used to remove specific messages for a child.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum MessageSubType {
    /// Matches every message in `remove_messages`.
    #[default]
    None,
    MleGeneral,
    MleDataResponse,
    MleChildUpdateRequest,
    MleDiscover,
}

/// Queue priority. Higher priorities are sent first.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Default)]
#[cfg_attr(feature = "serde", derive(serde::Serialize))]
pub enum Priority {
    Low,
    #[default]
    Normal,
    High,
    /// Network control traffic.
    Net,
}

/// Mesh addressing for a datagram forwarded over multiple hops.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct MeshRoute {
    pub source: ShortAddress,
    pub destination: ShortAddress,
    pub next_hop: ShortAddress,
}

/// The set of children a message is still queued for, one bit per child index.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct ChildMask(pub u64);

impl ChildMask {
    pub fn empty() -> Self {
        Self(0)
    }

    pub fn is_empty(&self) -> bool {
        self.0 == 0
    }

    pub fn contains(&self, child: ChildIndex) -> bool {
        child.0 <= C_MAX_CHILD_INDEX && self.0 & (1 << child.0) != 0
    }

    pub fn insert(&mut self, child: ChildIndex) {
        if child.0 <= C_MAX_CHILD_INDEX {
            self.0 |= 1 << child.0;
        }
    }

    /// Clears the bit of `child`, returning whether it was set.
    pub fn remove(&mut self, child: ChildIndex) -> bool {
        let was_set = self.contains(child);
        if was_set {
            self.0 &= !(1 << child.0);
        }
        was_set
    }

    pub fn iter(&self) -> impl Iterator<Item = ChildIndex> + '_ {
        (0..=C_MAX_CHILD_INDEX)
            .filter(|&i| self.0 & (1 << i) != 0)
            .map(ChildIndex)
    }
}

/// A datagram waiting in the send queue.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Message {
    pub msg_type: MessageType,
    pub sub_type: MessageSubType,
    pub priority: Priority,
    /// Link-layer destination, or the final destination when `mesh` is set.
    pub destination: MacAddress,
    pub mesh: Option<MeshRoute>,
    /// Request link-layer security for every frame of the message.
    pub link_security: bool,
    /// The IPv6 datagram, or the 6LoWPAN payload for `Lowpan` messages.
    pub payload: Vec<u8>,

    // --- Bookkeeping owned by the manager ---
    pub(crate) id: MessageId,
    /// Still to be sent to a neighbor that is always listening.
    pub(crate) direct_tx: bool,
    pub(crate) child_mask: ChildMask,
    /// Fragmentation tag, 0 until the message is first fragmented.
    pub(crate) datagram_tag: u16,
    /// Cleared as soon as one delivery attempt fails for good.
    pub(crate) tx_success: bool,
}

impl Message {
    fn with_type(msg_type: MessageType, destination: MacAddress, payload: Vec<u8>) -> Self {
        Self {
            msg_type,
            sub_type: MessageSubType::None,
            priority: Priority::Normal,
            destination,
            mesh: None,
            link_security: true,
            payload,
            id: MessageId(0),
            direct_tx: false,
            child_mask: ChildMask::empty(),
            datagram_tag: 0,
            tx_success: true,
        }
    }

    /// An IPv6 datagram for a one-hop neighbor or a broadcast.
    pub fn ip6(destination: MacAddress, datagram: Vec<u8>) -> Self {
        Self::with_type(MessageType::Ip6, destination, datagram)
    }

    /// A 6LoWPAN payload forwarded along a mesh route.
    pub fn lowpan(route: MeshRoute, payload: Vec<u8>) -> Self {
        Self {
            mesh: Some(route),
            ..Self::with_type(MessageType::Lowpan, MacAddress::Short(route.destination), payload)
        }
    }

    /// An empty frame keeping a sleepy child's attachment alive.
    pub fn supervision(child: MacAddress) -> Self {
        Self {
            priority: Priority::High,
            ..Self::with_type(MessageType::Supervision, child, Vec::new())
        }
    }

    pub fn with_priority(mut self, priority: Priority) -> Self {
        self.priority = priority;
        self
    }

    pub fn with_sub_type(mut self, sub_type: MessageSubType) -> Self {
        self.sub_type = sub_type;
        self
    }

    pub fn with_mesh_route(mut self, route: MeshRoute) -> Self {
        self.mesh = Some(route);
        self
    }

    pub fn with_link_security(mut self, enabled: bool) -> Self {
        self.link_security = enabled;
        self
    }

    pub fn id(&self) -> MessageId {
        self.id
    }

    pub fn len(&self) -> usize {
        self.payload.len()
    }

    pub fn is_empty(&self) -> bool {
        self.payload.is_empty()
    }

    pub fn is_direct_pending(&self) -> bool {
        self.direct_tx
    }

    /// True while at least one sleepy child still has to receive the message.
    pub fn is_child_pending(&self) -> bool {
        !self.child_mask.is_empty()
    }

    pub fn is_pending_for(&self, child: ChildIndex) -> bool {
        self.child_mask.contains(child)
    }

    pub fn datagram_tag(&self) -> u16 {
        self.datagram_tag
    }
}
