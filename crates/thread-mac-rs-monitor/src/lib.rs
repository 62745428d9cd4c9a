// crates/thread-mac-rs-monitor/src/lib.rs

pub mod model;
mod server;

pub use model::{ChildInfo, LinkSnapshot, WakeupInfo};

#[cfg(feature = "in-process")]
use crossbeam_channel::{Receiver, Sender, TrySendError};
#[cfg(feature = "in-process")]
use log::{info, trace};
#[cfg(feature = "in-process")]
use std::net::SocketAddr;
#[cfg(feature = "in-process")]
use tokio::sync::broadcast;

/// Snapshots buffered between the node loop and the web clients.
pub const C_SNAPSHOT_QUEUE: usize = 16;

/// Creates the channel the node loop publishes snapshots into.
#[cfg(feature = "in-process")]
pub fn snapshot_channel() -> (Sender<LinkSnapshot>, Receiver<LinkSnapshot>) {
    crossbeam_channel::bounded(C_SNAPSHOT_QUEUE)
}

/// Hands a snapshot to the monitor without blocking the node loop.
///
/// Returns false when the snapshot was dropped because the monitor is
/// behind or gone.
#[cfg(feature = "in-process")]
pub fn publish_snapshot(sender: &Sender<LinkSnapshot>, snapshot: LinkSnapshot) -> bool {
    match sender.try_send(snapshot) {
        Ok(()) => true,
        Err(TrySendError::Full(_)) => {
            trace!("Monitor queue full, dropping snapshot.");
            false
        }
        Err(TrySendError::Disconnected(_)) => false,
    }
}

/// Starts the web monitor in "in-process" mode.
///
/// Runs in a thread separate from the node loop, which publishes through
/// `publish_snapshot`. Serves the monitor page on `/` and the snapshot
/// stream on `/ws`.
#[cfg(feature = "in-process")]
pub async fn start_in_process_monitor(
    addr: SocketAddr,
    receiver: Receiver<LinkSnapshot>,
) -> Result<(), Box<dyn std::error::Error + Send + Sync>> {
    let (snapshot_tx, _) = broadcast::channel(C_SNAPSHOT_QUEUE);
    let bridge = spawn_bridge(receiver, snapshot_tx.clone());
    let served = server::start_web_server(addr, snapshot_tx).await;
    drop(bridge);
    served?;
    Ok(())
}

/// Moves snapshots from the blocking channel onto the broadcast channel of
/// the async side. Ends when every publisher is gone.
#[cfg(feature = "in-process")]
fn spawn_bridge(
    receiver: Receiver<LinkSnapshot>,
    snapshot_tx: broadcast::Sender<LinkSnapshot>,
) -> tokio::task::JoinHandle<()> {
    tokio::task::spawn_blocking(move || {
        while let Ok(snapshot) = receiver.recv() {
            // No subscribers is fine: nobody is watching.
            let _ = snapshot_tx.send(snapshot);
        }
        info!("Snapshot publishers gone, monitor bridge stopped.");
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use thread_mac_rs::hal::{MacError, RadioCaps, RadioDriver, TxRequest};
    use thread_mac_rs::indirect::{Ipv6Dispatch, Message};
    use thread_mac_rs::neighbor::{Neighbor, NeighborList, NeighborRole};
    use thread_mac_rs::node::link::LinkNode;
    use thread_mac_rs::security::{AesCcmCipher, KeyTable};
    use thread_mac_rs::types::{Channel, ExtAddress, MacAddress, PanId, ShortAddress};
    use thread_mac_rs::LinkConfig;

    struct IdleRadio;

    impl RadioDriver for IdleRadio {
        fn capabilities(&self) -> RadioCaps {
            RadioCaps::ACK_TIMEOUT | RadioCaps::CSMA_BACKOFF
        }
        fn ext_address(&self) -> ExtAddress {
            ExtAddress([0x10, 0, 0, 0, 0, 0, 0, 0x01])
        }
        fn receive(&mut self, _channel: Channel) -> Result<(), MacError> {
            Ok(())
        }
        fn sleep(&mut self) -> Result<(), MacError> {
            Ok(())
        }
        fn transmit(&mut self, _request: &TxRequest<'_>) -> Result<(), MacError> {
            Ok(())
        }
        fn rssi(&mut self) -> Option<i8> {
            None
        }
    }

    struct CountingRng(u64);

    impl rand_core::RngCore for CountingRng {
        fn next_u32(&mut self) -> u32 {
            self.next_u64() as u32
        }
        fn next_u64(&mut self) -> u64 {
            self.0 = self.0.wrapping_add(1);
            self.0
        }
        fn fill_bytes(&mut self, dest: &mut [u8]) {
            dest.iter_mut().for_each(|b| *b = self.next_u64() as u8);
        }
        fn try_fill_bytes(&mut self, dest: &mut [u8]) -> Result<(), rand_core::Error> {
            self.fill_bytes(dest);
            Ok(())
        }
    }

    fn snapshot() -> LinkSnapshot {
        let mut neighbors = NeighborList::new(2, 0);
        neighbors
            .add_child(Neighbor::new(ExtAddress([0x11; 8]), ShortAddress(0x0401), NeighborRole::Child))
            .unwrap();
        let mut node = LinkNode::new(
            IdleRadio,
            CountingRng(0),
            KeyTable::new(0),
            AesCcmCipher,
            LinkConfig::default(),
            neighbors,
            Box::new(Ipv6Dispatch),
        )
        .unwrap();
        node.set_pan_id(PanId(0xface));
        node.set_short_address(ShortAddress(0x0400));
        node.start(0);
        node.send_message(0, Message::ip6(MacAddress::Short(ShortAddress(0x0401)), vec![0x60; 20]))
            .unwrap();
        LinkSnapshot::capture(&node, 1_234)
    }

    #[test]
    fn test_snapshot_reports_children_and_queue() {
        let snapshot = snapshot();
        assert_eq!(snapshot.timestamp_us, 1_234);
        assert_eq!(snapshot.pan_id, "0xface");
        assert_eq!(snapshot.queued_messages, 1);
        assert_eq!(snapshot.children.len(), 1);
        assert_eq!(snapshot.children[0].queued_messages, 1);
        assert!(snapshot.children[0].sleepy);
        assert!(!snapshot.wakeup.running);
    }

    #[test]
    fn test_snapshot_serializes_counters_as_json() {
        let json = serde_json::to_value(snapshot()).unwrap();
        assert_eq!(json["children"][0]["queued_messages"], 1);
        assert_eq!(json["mac_counters"]["tx_total"], 0);
        assert_eq!(json["indirect_counters"]["dropped"], 0);
        assert_eq!(json["wakeup"]["sent_frames"], 0);
    }

    #[test]
    fn test_publish_drops_when_queue_is_full() {
        let (sender, receiver) = snapshot_channel();
        let snapshot = snapshot();
        for _ in 0..C_SNAPSHOT_QUEUE {
            assert!(publish_snapshot(&sender, snapshot.clone()));
        }
        assert!(!publish_snapshot(&sender, snapshot.clone()));
        drop(receiver);
        assert!(!publish_snapshot(&sender, snapshot));
    }

    #[tokio::test]
    async fn test_bridge_forwards_snapshots_to_subscribers() {
        let (sender, receiver) = snapshot_channel();
        let (snapshot_tx, mut snapshot_rx) = broadcast::channel(C_SNAPSHOT_QUEUE);
        let bridge = spawn_bridge(receiver, snapshot_tx);

        assert!(publish_snapshot(&sender, snapshot()));
        let forwarded = snapshot_rx.recv().await.unwrap();
        assert_eq!(forwarded.timestamp_us, 1_234);

        drop(sender);
        bridge.await.unwrap();
    }
}
