// crates/thread-mac-rs/tests/link_delivery_test.rs

#[cfg(feature = "std")]
mod simulator;

#[cfg(feature = "std")]
mod tests {
    use super::simulator::{NodeHarness, VirtualNetwork, ext_address, init_logging};

    use thread_mac_rs::frame::{FrameType, deserialize_frame};
    use thread_mac_rs::indirect::Message;
    use thread_mac_rs::neighbor::{Neighbor, NeighborList, NeighborRole, NeighborTable};
    use thread_mac_rs::node::link::LinkEvent;
    use thread_mac_rs::types::{MacAddress, ShortAddress};

    const PARENT_ID: u8 = 1;
    const CHILD_ID: u8 = 2;
    const PARENT_SHORT: ShortAddress = ShortAddress(0x0400);
    const CHILD_SHORT: ShortAddress = ShortAddress(0x0401);

    fn datagram(len: usize) -> Vec<u8> {
        let mut data: Vec<u8> = (0..len).map(|i| (i * 7) as u8).collect();
        data[0] = 0x60;
        data
    }

    /// A router parent and its sleepy child, each knowing the other.
    fn parent_and_child() -> (NodeHarness, NodeHarness) {
        let mut parent_table = NeighborList::new(4, 4);
        parent_table
            .add_child(Neighbor::new(ext_address(CHILD_ID), CHILD_SHORT, NeighborRole::Child))
            .unwrap();
        let mut parent = NodeHarness::new(PARENT_ID, PARENT_SHORT, parent_table);
        parent.node.set_rx_on_when_idle(true);

        let mut child_table = NeighborList::new(0, 1);
        child_table
            .add_router(Neighbor::new(ext_address(PARENT_ID), PARENT_SHORT, NeighborRole::Router))
            .unwrap();
        let mut child = NodeHarness::new(CHILD_ID, CHILD_SHORT, child_table);
        child.node.set_rx_on_when_idle(false);
        child.node.mac_mut().radio_mut().ack_poll_pending = true;
        (parent, child)
    }

    #[test]
    fn test_sleepy_child_receives_fragmented_datagram_after_poll() {
        init_logging();
        let mut network = VirtualNetwork::new();
        network.register_node(PARENT_ID);
        network.register_node(CHILD_ID);
        let (mut parent, mut child) = parent_and_child();

        let child_index = parent
            .node
            .neighbors()
            .child_index(&MacAddress::Short(CHILD_SHORT))
            .unwrap();
        parent.node.allocate_sed_slot(child_index).unwrap();

        let original = datagram(250);
        let now = network.current_time();
        let id = parent
            .node
            .send_message(now, Message::ip6(MacAddress::Short(CHILD_SHORT), original.clone()))
            .unwrap();

        let dt = 1_000;
        let max_time = 500_000;
        let poll_at = 20_000;
        let mut polled = false;

        while network.current_time() < max_time {
            if !polled && network.current_time() >= poll_at {
                let now = network.current_time();
                child
                    .node
                    .send_data_poll(now, MacAddress::Short(PARENT_SHORT))
                    .unwrap();
                child.flush_transmissions(&mut network);
                polled = true;
            }
            parent.run_cycle(&mut network);
            child.run_cycle(&mut network);

            if !child.events.is_empty() {
                break;
            }
            network.tick(dt);
        }

        assert_eq!(
            child.events,
            vec![LinkEvent::DatagramReceived {
                src: MacAddress::Short(PARENT_SHORT),
                dst: MacAddress::Short(CHILD_SHORT),
                datagram: original,
                link_security: true,
            }]
        );
        assert_eq!(parent.events, vec![LinkEvent::MessageSent { id, success: true }]);
        assert_eq!(parent.node.indirect().queue_len(), 0);
        // Nothing left for the child, so its receiver is off again.
        assert_eq!(child.node.mac().radio().listening_on(), None);
    }

    #[test]
    fn test_message_for_sleepy_child_waits_for_a_poll() {
        init_logging();
        let mut network = VirtualNetwork::new();
        network.register_node(PARENT_ID);
        network.register_node(CHILD_ID);
        let (mut parent, mut child) = parent_and_child();

        // Without a slot or poll the message to a sleepy child just waits.
        let now = network.current_time();
        parent
            .node
            .send_message(now, Message::ip6(MacAddress::Short(CHILD_SHORT), datagram(40)))
            .unwrap();
        for _ in 0..50 {
            parent.run_cycle(&mut network);
            child.run_cycle(&mut network);
            network.tick(1_000);
        }
        assert!(network.packet_history.is_empty());
        assert!(child.events.is_empty());
        assert_eq!(parent.node.indirect().queue_len(), 1);
    }

    #[test]
    fn test_wake_up_burst_is_spaced_by_the_interval() {
        init_logging();
        let mut network = VirtualNetwork::new();
        network.register_node(PARENT_ID);
        network.register_node(CHILD_ID);
        let (mut parent, _child) = parent_and_child();

        let now = network.current_time();
        parent
            .node
            .wake_up(now, ext_address(CHILD_ID), 1_000, 20)
            .unwrap();

        // Transmit-done reports arrive at air time, behind later requests.
        while (parent.node.wakeup().is_running() || parent.node.mac().is_in_transmit_state())
            && network.current_time() < 100_000
        {
            parent.run_cycle(&mut network);
            network.tick(500);
        }

        let bursts: Vec<_> = network
            .packet_history
            .iter()
            .filter(|p| deserialize_frame(&p.data).unwrap().frame_type == FrameType::Multipurpose)
            .map(|p| p.transmit_time_us)
            .collect();
        assert_eq!(bursts.len(), 20);
        assert!(bursts.windows(2).all(|w| w[1] - w[0] == 1_000));
        assert_eq!(parent.node.wakeup().skipped_frames(), 0);
        assert_eq!(parent.node.mac().counters().tx_wakeup, 20);
        let frame = deserialize_frame(&network.packet_history[0].data).unwrap();
        assert_eq!(frame.dst, MacAddress::Extended(ext_address(CHILD_ID)));
    }

    #[test]
    fn test_broadcast_reaches_every_listening_neighbor() {
        init_logging();
        let mut network = VirtualNetwork::new();
        let ids = [1u8, 2, 3];
        for id in ids {
            network.register_node(id);
        }
        let shorts = [ShortAddress(0x0400), ShortAddress(0x0800), ShortAddress(0x0c00)];
        let mut nodes: Vec<NodeHarness> = ids
            .iter()
            .zip(shorts)
            .map(|(&id, short)| {
                let mut table = NeighborList::new(0, 4);
                for (&other, other_short) in ids.iter().zip(shorts) {
                    if other != id {
                        table
                            .add_router(Neighbor::new(ext_address(other), other_short, NeighborRole::Router))
                            .unwrap();
                    }
                }
                let mut harness = NodeHarness::new(id, short, table);
                harness.node.set_rx_on_when_idle(true);
                harness
            })
            .collect();

        let message = Message::ip6(MacAddress::Short(ShortAddress::BROADCAST), datagram(60));
        let now = network.current_time();
        nodes[0].node.send_message(now, message).unwrap();
        for _ in 0..5 {
            for node in nodes.iter_mut() {
                node.run_cycle(&mut network);
            }
            network.tick(1_000);
        }

        assert_eq!(network.packet_history.len(), 1);
        for node in &nodes[1..] {
            assert_eq!(
                node.events,
                vec![LinkEvent::DatagramReceived {
                    src: MacAddress::Short(shorts[0]),
                    dst: MacAddress::Short(ShortAddress::BROADCAST),
                    datagram: datagram(60),
                    link_security: true,
                }]
            );
        }
        assert!(matches!(nodes[0].events.as_slice(), [LinkEvent::MessageSent { success: true, .. }]));
    }
}
