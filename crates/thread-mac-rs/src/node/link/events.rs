// crates/thread-mac-rs/src/node/link/events.rs
use super::main::C_DATA_POLL_SENDER;
use super::state::LinkContext;
use crate::frame::{AuxSecurityHeader, CommandId, Frame, FrameType, KeyId, SecurityLevel};
use crate::hal::MacError;
use crate::indirect::MessageId;
use crate::indirect::lowpan::{MeshHeader, decode_datagram, is_fragment_header, is_mesh_header};
use crate::log::{my_debug, my_trace};
use crate::mac::{MacClient, ReceiverId, SendDisposition, SenderId};
use crate::neighbor::NeighborTable;
use crate::types::MacAddress;
use alloc::vec::Vec;

/// Something the upper layer must learn about.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum LinkEvent {
    /// A complete datagram arrived. For mesh frames the addresses are those
    /// of the mesh header.
    DatagramReceived {
        src: MacAddress,
        dst: MacAddress,
        datagram: Vec<u8>,
        link_security: bool,
    },
    /// A queued message left the queue.
    MessageSent { id: MessageId, success: bool },
    /// An ack announced pending data that never arrived.
    DataPollTimeout,
}

impl MacClient for LinkContext {
    fn handle_frame_request(
        &mut self,
        sender: SenderId,
        frame: &mut Frame,
        neighbors: &mut dyn NeighborTable,
    ) -> Result<(), MacError> {
        if sender == C_DATA_POLL_SENDER {
            return self.build_data_poll(frame);
        }
        if !self.indirect.owns_sender(sender) {
            return Err(MacError::NotFound);
        }
        self.indirect.handle_frame_request(sender, frame, neighbors)
    }

    fn handle_sent_frame(
        &mut self,
        sender: SenderId,
        frame: &Frame,
        result: Result<(), MacError>,
        neighbors: &mut dyn NeighborTable,
    ) -> SendDisposition {
        if sender == C_DATA_POLL_SENDER {
            if let Err(e) = result {
                my_debug!(self.log_context("poll"), "Data poll to {} failed: {}", frame.dst, e);
            }
            return SendDisposition::Done;
        }
        let disposition = self.indirect.handle_sent_frame(sender, frame, result, neighbors);
        while let Some(sent) = self.indirect.take_sent_message() {
            self.events.push_back(LinkEvent::MessageSent {
                id: sent.id,
                success: sent.success,
            });
        }
        disposition
    }

    fn handle_received_frame(
        &mut self,
        _receiver: ReceiverId,
        frame: &Frame,
        _neighbors: &mut dyn NeighborTable,
    ) -> bool {
        if frame.frame_type != FrameType::Data {
            return false;
        }
        if let Err(e) = self.process_data_frame(frame) {
            my_debug!(self.log_context("rx"), "Dropping data frame from {}: {}", frame.src, e);
        }
        true
    }

    fn handle_data_poll_timeout(&mut self, _receiver: ReceiverId) {
        self.events.push_back(LinkEvent::DataPollTimeout);
    }

    fn handle_data_request(&mut self, src: &MacAddress, neighbors: &mut dyn NeighborTable) {
        self.indirect.handle_data_request(src, neighbors);
    }
}

impl LinkContext {
    /// A secured data request to the parent recorded by `send_data_poll`.
    fn build_data_poll(&mut self, frame: &mut Frame) -> Result<(), MacError> {
        let parent = self.poll_parent.take().ok_or(MacError::NotFound)?;
        let src = if self.short_address.is_valid() {
            MacAddress::Short(self.short_address)
        } else {
            MacAddress::Extended(self.ext_address)
        };
        *frame = Frame::new_command(CommandId::DataRequest, self.pan_id, parent, src);
        frame.security = Some(AuxSecurityHeader {
            level: SecurityLevel::EncMic32,
            key_id: KeyId::Mode1 { key_index: 0 },
            frame_counter: 0,
        });
        Ok(())
    }

    /// Turns a data frame into a datagram: mesh header removed, fragments
    /// reassembled, headers decompressed.
    fn process_data_frame(&mut self, frame: &Frame) -> Result<(), MacError> {
        let link_security = frame.security.is_some();
        let mut payload = frame.payload.as_slice();
        let (mut src, mut dst) = (frame.src, frame.dst);

        let Some(&first) = payload.first() else {
            my_trace!("[Indirect] Empty data frame from {}", frame.src);
            return Ok(());
        };
        if is_mesh_header(first) {
            let (mesh, len) = MeshHeader::parse(payload)?;
            if mesh.destination != self.short_address {
                my_trace!("[Indirect] Mesh frame for {} not addressed to us", mesh.destination);
                return Ok(());
            }
            src = MacAddress::Short(mesh.source);
            dst = MacAddress::Short(mesh.destination);
            payload = &payload[len..];
        }

        let compressor = self.indirect.compressor();
        let datagram = if payload.first().is_some_and(|&b| is_fragment_header(b)) {
            let reassembled =
                self.reassembler
                    .handle_fragment(self.now_us, payload, &src, &dst, link_security, compressor)?;
            match reassembled {
                Some(datagram) => datagram,
                None => return Ok(()),
            }
        } else {
            decode_datagram(compressor, payload, &src, &dst)?
        };

        my_trace!("[Indirect] Received {} byte datagram from {}", datagram.len(), src);
        self.events.push_back(LinkEvent::DatagramReceived {
            src,
            dst,
            datagram,
            link_security,
        });
        Ok(())
    }
}
