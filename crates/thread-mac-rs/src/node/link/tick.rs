// crates/thread-mac-rs/src/node/link/tick.rs
//! Time-based processing of the link node: MAC timers, wake-up frames and
//! reassembly timeouts.

use super::main::LinkNode;
use crate::hal::RadioDriver;
use crate::node::NodeAction;
use crate::security::{FrameCipher, KeyProvider};
use rand_core::RngCore;

pub(super) fn process_tick<R, G, K, C>(node: &mut LinkNode<R, G, K, C>, current_time_us: u64) -> NodeAction
where
    R: RadioDriver,
    G: RngCore,
    K: KeyProvider,
    C: FrameCipher,
{
    node.context.now_us = current_time_us;

    // --- 1. MAC timers and pending operations ---
    node.mac.tick(current_time_us, &mut node.context, &mut node.neighbors);
    node.process_mac_requests(current_time_us);

    // --- 2. Wake-up frames, once the MAC had a chance to go idle ---
    node.wakeup.tick(current_time_us, &mut node.mac);

    // --- 3. Partial datagrams past their timeout ---
    node.context.reassembler.tick(current_time_us);

    node.after_mac_call(current_time_us)
}
