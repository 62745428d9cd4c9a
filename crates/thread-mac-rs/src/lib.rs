#![cfg_attr(not(feature = "std"), no_std)]

// 'alloc' is used for dynamic allocation (e.g., Vec<u8> in frames and queues)
extern crate alloc;

// --- Foundation Modules ---
pub mod types;
pub mod hal;
pub mod common;
pub mod config;
mod log;

// --- Node Abstraction ---
pub mod node;

// --- MAC Layer ---
pub mod frame;
pub mod neighbor;
pub mod security;
pub mod mac;

// --- Link Layer Services ---
pub mod indirect;
pub mod wakeup;

// --- Top-level Exports ---
pub use types::{Channel, ChannelMask, ExtAddress, MacAddress, PanId, ShortAddress};
pub use hal::{MacError, RadioCaps, RadioDriver, RxFrame, TxDone, TxRequest};
pub use config::{IndirectConfig, LinkConfig, MacConfig, WakeupConfig};
pub use frame::{Frame, FrameType, deserialize_frame};
pub use mac::{MacClient, MacScheduler, ReceiverId, ScanHandler, SenderId};
pub use indirect::{IndirectTxManager, Message, MessageId};
pub use wakeup::WakeupTxScheduler;
pub use neighbor::{NeighborList, NeighborTable};
pub use security::{AesCcmCipher, KeyProvider, KeyTable};
pub use node::{Node, NodeAction};
pub use node::link::{LinkEvent, LinkNode};
