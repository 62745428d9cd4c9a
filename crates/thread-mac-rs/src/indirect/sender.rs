// crates/thread-mac-rs/src/indirect/sender.rs
use super::message::MessageId;
use crate::hal::MacError;
use crate::mac::SenderId;
use crate::neighbor::ChildIndex;
use alloc::vec::Vec;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SenderKind {
    /// Sends to neighbors that keep their receiver on.
    Direct,
    /// Bound to one sleepy child from attach to detach.
    Dedicated,
    /// Claimed by a child without a dedicated slot for one message.
    Floating,
}

/// One MAC sender owned by the indirect manager.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct SenderSlot {
    pub id: SenderId,
    pub kind: SenderKind,
    /// The bound or claiming child.
    pub child: Option<ChildIndex>,
    pub message: Option<MessageId>,
    /// Datagram offset of the next frame.
    pub next_offset: usize,
    /// Datagram offset following the frame handed to the MAC.
    pub frame_end_offset: usize,
    /// A frame request is queued or in flight at the MAC.
    pub in_use: bool,
}

impl SenderSlot {
    fn new(id: SenderId, kind: SenderKind) -> Self {
        Self {
            id,
            kind,
            child: None,
            message: None,
            next_offset: 0,
            frame_end_offset: 0,
            in_use: false,
        }
    }

    /// Forgets the message in progress.
    pub fn reset_message(&mut self) {
        self.message = None;
        self.next_offset = 0;
        self.frame_end_offset = 0;
        self.in_use = false;
    }

    fn reset(&mut self) {
        self.reset_message();
        self.child = None;
    }
}

/// The direct sender, the dedicated SED slots and the floating senders.
///
/// Sender ids are assigned consecutively from `first_id` in that order.
#[derive(Debug, Clone)]
pub struct SenderPool {
    slots: Vec<SenderSlot>,
}

impl SenderPool {
    pub fn new(first_id: u8, sed_slots: usize, floating: usize) -> Self {
        let kinds = core::iter::once(SenderKind::Direct)
            .chain(core::iter::repeat_n(SenderKind::Dedicated, sed_slots))
            .chain(core::iter::repeat_n(SenderKind::Floating, floating));
        let slots = kinds
            .enumerate()
            .map(|(i, kind)| SenderSlot::new(SenderId(first_id.wrapping_add(i as u8)), kind))
            .collect();
        Self { slots }
    }

    pub fn get(&self, id: SenderId) -> Option<&SenderSlot> {
        self.slots.iter().find(|s| s.id == id)
    }

    pub fn get_mut(&mut self, id: SenderId) -> Option<&mut SenderSlot> {
        self.slots.iter_mut().find(|s| s.id == id)
    }

    pub fn direct(&self) -> &SenderSlot {
        &self.slots[0]
    }

    pub fn direct_mut(&mut self) -> &mut SenderSlot {
        &mut self.slots[0]
    }

    pub fn iter(&self) -> impl Iterator<Item = &SenderSlot> {
        self.slots.iter()
    }

    pub fn iter_mut(&mut self) -> impl Iterator<Item = &mut SenderSlot> {
        self.slots.iter_mut()
    }

    fn of_kind(&self, kind: SenderKind) -> impl Iterator<Item = &SenderSlot> {
        self.slots.iter().filter(move |s| s.kind == kind)
    }

    /// Binds a dedicated slot to `child`. A child already bound keeps its slot.
    pub fn allocate_sed_slot(&mut self, child: ChildIndex) -> Result<SenderId, MacError> {
        if let Some(slot) = self.of_kind(SenderKind::Dedicated).find(|s| s.child == Some(child)) {
            return Ok(slot.id);
        }
        let slot = self
            .slots
            .iter_mut()
            .find(|s| s.kind == SenderKind::Dedicated && s.child.is_none())
            .ok_or(MacError::NoBufs)?;
        slot.child = Some(child);
        Ok(slot.id)
    }

    /// Unbinds the dedicated slot of `child`, returning its state before the
    /// reset.
    pub fn deallocate_sed_slot(&mut self, child: ChildIndex) -> Option<SenderSlot> {
        let slot = self
            .slots
            .iter_mut()
            .find(|s| s.kind == SenderKind::Dedicated && s.child == Some(child))?;
        let before = *slot;
        slot.reset();
        Some(before)
    }

    pub fn remaining_sed_slot_count(&self) -> usize {
        self.of_kind(SenderKind::Dedicated).filter(|s| s.child.is_none()).count()
    }

    pub fn bound_sed_slot_count(&self) -> usize {
        self.of_kind(SenderKind::Dedicated).filter(|s| s.child.is_some()).count()
    }

    /// The dedicated slot of `child`, or the floating sender it claimed.
    pub fn sender_for_child(&self, child: ChildIndex) -> Option<SenderId> {
        self.slots
            .iter()
            .find(|s| s.kind != SenderKind::Direct && s.child == Some(child))
            .map(|s| s.id)
    }

    /// Claims an idle floating sender for `child`. A child keeps an existing
    /// claim.
    pub fn claim_floating_sender(&mut self, child: ChildIndex) -> Result<SenderId, MacError> {
        if let Some(slot) = self.of_kind(SenderKind::Floating).find(|s| s.child == Some(child)) {
            return Ok(slot.id);
        }
        let slot = self
            .slots
            .iter_mut()
            .find(|s| s.kind == SenderKind::Floating && s.child.is_none())
            .ok_or(MacError::NoBufs)?;
        slot.child = Some(child);
        Ok(slot.id)
    }

    /// Releases every floating sender claimed by `child`, returning those
    /// that had a MAC request outstanding.
    pub fn release_floating_senders(&mut self, child: ChildIndex) -> Vec<SenderId> {
        let mut busy = Vec::new();
        for slot in self
            .slots
            .iter_mut()
            .filter(|s| s.kind == SenderKind::Floating && s.child == Some(child))
        {
            if slot.in_use {
                busy.push(slot.id);
            }
            slot.reset();
        }
        busy
    }

    /// Releases one floating sender once its message is complete.
    pub fn release(&mut self, id: SenderId) {
        if let Some(slot) = self.get_mut(id) {
            if slot.kind == SenderKind::Floating {
                slot.reset();
            }
        }
    }
}
