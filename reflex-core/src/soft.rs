//! Software stand-ins for the hardware traits
//!
//! Enough behaviour to check charge values, barrier ordering and chain
//! contents on the host.

extern crate std;

use core::cell::Cell;
use std::vec::Vec;

use heapless::Deque;
use reflex_hal::{
    GroupControl, InstructionStore, MicroOp, QueueTarget, Sequencer, SequencerBank, StoreFull,
    TransferChannel, TransferDescriptor, WordSource, BANK_SIZE,
};

use crate::chain::ChainPlan;

/// Transmit queue depth of a soft sequencer
pub const SOFT_QUEUE_DEPTH: usize = 4;

/// Soft instruction memory size in instructions
pub const SOFT_STORE_CAPACITY: usize = 32;

/// Registers of one sequencer
#[derive(Debug, Default)]
pub struct SoftSequencer {
    pub x: u32,
    pub y: u32,
    pub isr: u32,
    pub osr: u32,
    /// A pull found the queue empty
    pub starved: bool,
    pub held: bool,
    queue: Deque<u32, SOFT_QUEUE_DEPTH>,
}

impl SoftSequencer {
    pub fn new() -> Self {
        Self::default()
    }
}

impl Sequencer for SoftSequencer {
    fn hold(&mut self) {
        *self = Self {
            held: true,
            ..Self::default()
        };
    }

    fn push(&mut self, word: u32) -> bool {
        self.queue.push_back(word).is_ok()
    }

    fn exec(&mut self, op: MicroOp) {
        match op {
            MicroOp::Pull => match self.queue.pop_front() {
                Some(word) => self.osr = word,
                // Non-blocking pull on an empty queue copies X
                None => {
                    self.osr = self.x;
                    self.starved = true;
                }
            },
            MicroOp::OutIsr => self.isr = core::mem::take(&mut self.osr),
            MicroOp::OutY => self.y = core::mem::take(&mut self.osr),
            MicroOp::MovXOsr => self.x = self.osr,
            MicroOp::MovXIsr => self.x = self.isr,
        }
    }

    fn queued(&self) -> usize {
        self.queue.len()
    }
}

/// Block-wide operation seen by a soft group
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum GroupEvent {
    Disable(u8),
    ClearFlags(u8),
    Restart(u8),
    Force(u8),
}

/// Records block-wide operations in order
#[derive(Debug, Default)]
pub struct SoftGroup {
    pub events: Vec<GroupEvent>,
    pub enabled: u8,
    pub flags: u8,
}

impl GroupControl for SoftGroup {
    fn clear_flags(&mut self, mask: u8) {
        self.flags &= !mask;
        self.events.push(GroupEvent::ClearFlags(mask));
    }

    fn restart_group(&mut self, mask: u8) {
        self.enabled |= mask;
        self.events.push(GroupEvent::Restart(mask));
    }

    fn disable(&mut self, mask: u8) {
        self.enabled &= !mask;
        self.events.push(GroupEvent::Disable(mask));
    }

    fn force_flag(&mut self, flag: u8) {
        self.flags |= 1 << flag;
        self.events.push(GroupEvent::Force(flag));
    }
}

/// Three soft sequencers on lanes 0..3 of one block
#[derive(Debug, Default)]
pub struct SoftBank {
    pub members: [SoftSequencer; BANK_SIZE],
    pub group: SoftGroup,
    pub binds: u32,
    block: u8,
}

impl SoftBank {
    pub fn new(block: u8) -> Self {
        Self {
            block,
            ..Self::default()
        }
    }
}

impl SequencerBank for SoftBank {
    fn split(&mut self) -> ([&mut dyn Sequencer; BANK_SIZE], &mut dyn GroupControl) {
        let [a, b, c] = &mut self.members;
        ([a, b, c], &mut self.group)
    }

    fn target(&self, member: usize) -> QueueTarget {
        QueueTarget {
            block: self.block,
            lane: member as u8,
        }
    }

    fn bind_pins(&mut self) {
        self.binds += 1;
    }
}

/// First-fit instruction memory with no reuse
#[derive(Debug, Default)]
pub struct SoftInstructionMemory {
    used: usize,
}

impl SoftInstructionMemory {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn used(&self) -> usize {
        self.used
    }
}

impl InstructionStore for SoftInstructionMemory {
    type Program = [u16];
    type Handle = u8;

    fn load(&mut self, program: &[u16]) -> Result<u8, StoreFull> {
        if self.used + program.len() > SOFT_STORE_CAPACITY {
            return Err(StoreFull);
        }
        let origin = self.used as u8;
        self.used += program.len();
        Ok(origin)
    }

    fn origin(handle: &u8) -> u8 {
        *handle
    }
}

std::thread_local! {
    static CONFIGURE_SEQUENCE: Cell<u32> = const { Cell::new(0) };
}

/// What a soft channel was last programmed with
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ChannelRecord {
    pub words: u32,
    pub target: QueueTarget,
    pub chain_to: Option<u8>,
    pub started: bool,
    /// Order of this configure among all soft channels on the thread
    pub sequence: u32,
}

/// A transfer channel that drains after a set number of polls
#[derive(Debug)]
pub struct SoftChannel {
    id: u8,
    pub record: Option<ChannelRecord>,
    busy_polls: Cell<u32>,
}

impl SoftChannel {
    pub fn new(id: u8) -> Self {
        Self {
            id,
            record: None,
            busy_polls: Cell::new(0),
        }
    }

    /// Report busy for the next `polls` calls to `is_busy`
    pub fn set_busy_polls(&self, polls: u32) {
        self.busy_polls.set(polls);
    }
}

impl TransferChannel for SoftChannel {
    fn id(&self) -> u8 {
        self.id
    }

    fn configure(&mut self, desc: &TransferDescriptor<'_>, chain_to: Option<u8>, start: bool) {
        let sequence = CONFIGURE_SEQUENCE.with(|seq| {
            let n = seq.get();
            seq.set(n + 1);
            n
        });
        self.record = Some(ChannelRecord {
            words: desc.words,
            target: desc.target,
            chain_to,
            started: start,
            sequence,
        });
    }

    fn is_busy(&self) -> bool {
        let polls = self.busy_polls.get();
        if polls == 0 {
            return false;
        }
        self.busy_polls.set(polls - 1);
        true
    }
}

fn link_word(source: &WordSource<'_>, index: usize) -> u32 {
    match source {
        WordSource::Buffer(bytes) => {
            let at = index * 4;
            u32::from_le_bytes([bytes[at], bytes[at + 1], bytes[at + 2], bytes[at + 3]])
        }
        WordSource::Words(words) => words[index],
        WordSource::Zeros => 0,
    }
}

/// Replay a plan word by word, heads in push order, following each chain
pub fn run_chain(plan: &ChainPlan<'_>, sink: &mut dyn FnMut(QueueTarget, u32)) {
    let links = plan.links();
    for head in (0..links.len()).filter(|&i| !plan.is_chained(i)) {
        let mut next = Some(head);
        while let Some(i) = next {
            let link = &links[i];
            for word in 0..link.words as usize {
                sink(link.target, link_word(&link.source, word));
            }
            next = link.chain_to;
        }
    }
}
