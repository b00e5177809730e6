//! Two-slot frame exchange between the link core and the render core
//!
//! The producer stages an incoming frame in its own buffer. Only once the
//! frame is complete does it copy it into the slot that is not marked
//! newest, flip the newest index and ring the doorbell. A second frame
//! completed before pickup simply replaces the first: latest wins, nothing
//! queues, and a frame still arriving never displaces a finished one.
//!
//! All cross-core state lives in one byte:
//!
//! ```text
//! bit 0     newest slot index
//! bit 1     doorbell (a published frame is waiting)
//! bits 2-3  slot under read by the consumer, 0 = none, 1 + index otherwise
//! ```
//!
//! The reading marker closes the one gap the alternating discipline leaves
//! open: a consumer still decoding slot A while the producer has published B
//! and completes a third frame. The only free slot is then B, so the producer
//! retracts B (clears the doorbell) before overwriting it with the newer one.

#![allow(unsafe_code)]

use core::cell::UnsafeCell;

use portable_atomic::{AtomicU8, Ordering};

const NEWEST: u8 = 0b0001;
const DOORBELL: u8 = 0b0010;
const READING_SHIFT: u8 = 2;
const READING_MASK: u8 = 0b1100;

/// Frame exchange error
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub enum FrameError {
    /// Declared length exceeds the slot capacity
    Oversized { len: u32, capacity: usize },
}

struct Slot<const N: usize> {
    len: usize,
    bytes: [u8; N],
}

impl<const N: usize> Slot<N> {
    const fn new() -> Self {
        Self { len: 0, bytes: [0; N] }
    }
}

/// Two compressed-frame slots, the producer's staging buffer and the
/// shared state
pub struct FrameExchange<const N: usize> {
    slots: [UnsafeCell<Slot<N>>; 2],
    staging: UnsafeCell<Slot<N>>,
    state: AtomicU8,
}

// SAFETY: slot access is partitioned by `state`. The producer only writes a
// slot inside `publish`, and only one that is neither under read nor
// pending. The consumer only reads the slot recorded in the reading marker.
// The staging buffer is touched by the producer half alone.
unsafe impl<const N: usize> Sync for FrameExchange<N> {}

impl<const N: usize> Default for FrameExchange<N> {
    fn default() -> Self {
        Self::new()
    }
}

fn reading(state: u8) -> Option<usize> {
    match (state & READING_MASK) >> READING_SHIFT {
        0 => None,
        marker => Some(marker as usize - 1),
    }
}

impl<const N: usize> FrameExchange<N> {
    /// Empty exchange, slot 1 marked newest so slot 0 is written first
    pub const fn new() -> Self {
        Self {
            slots: [UnsafeCell::new(Slot::new()), UnsafeCell::new(Slot::new())],
            staging: UnsafeCell::new(Slot::new()),
            state: AtomicU8::new(NEWEST),
        }
    }

    /// Capacity of one slot in bytes
    pub const fn capacity(&self) -> usize {
        N
    }

    /// Split into the two halves, one per core
    pub fn split(&mut self) -> (FrameWriter<'_, N>, FrameReader<'_, N>) {
        let this: &Self = self;
        (
            FrameWriter {
                exchange: this,
                in_frame: false,
                declared: 0,
            },
            FrameReader { exchange: this },
        )
    }

    /// True while a published frame awaits pickup
    pub fn doorbell(&self) -> bool {
        self.state.load(Ordering::Acquire) & DOORBELL != 0
    }
}

/// Producer half
pub struct FrameWriter<'a, const N: usize> {
    exchange: &'a FrameExchange<N>,
    in_frame: bool,
    declared: usize,
}

impl<'a, const N: usize> FrameWriter<'a, N> {
    fn staging(&mut self) -> &mut Slot<N> {
        // SAFETY: only the single producer half ever reaches the staging
        // buffer, and `&mut self` makes this borrow exclusive
        unsafe { &mut *self.exchange.staging.get() }
    }

    /// Start staging a frame of `len` bytes
    ///
    /// Abandons any frame begun but not published. Published frames are
    /// left alone.
    pub fn begin_frame(&mut self, len: u32) -> Result<(), FrameError> {
        self.in_frame = false;
        if len as usize > N {
            return Err(FrameError::Oversized { len, capacity: N });
        }
        self.staging().len = 0;
        self.in_frame = true;
        self.declared = len as usize;
        Ok(())
    }

    /// Append payload bytes to the staged frame
    ///
    /// Bytes past the declared length are ignored. Returns the bytes taken.
    pub fn extend(&mut self, data: &[u8]) -> usize {
        if !self.in_frame {
            return 0;
        }
        let declared = self.declared;
        let staging = self.staging();
        let take = data.len().min(declared - staging.len);
        staging.bytes[staging.len..staging.len + take].copy_from_slice(&data[..take]);
        staging.len += take;
        take
    }

    /// Bytes staged so far
    pub fn written(&self) -> usize {
        if !self.in_frame {
            return 0;
        }
        // SAFETY: producer-owned buffer, read only by this half
        unsafe { (*self.exchange.staging.get()).len }
    }

    /// True while a frame is being staged
    pub fn in_frame(&self) -> bool {
        self.in_frame
    }

    /// Copy the staged frame into a free slot, mark it newest and ring the
    /// doorbell
    ///
    /// Returns `false` if no frame was begun.
    pub fn publish(&mut self) -> bool {
        if !self.in_frame {
            return false;
        }
        self.in_frame = false;

        let state = &self.exchange.state;
        let mut current = state.load(Ordering::Acquire);
        let target = loop {
            let newest = (current & NEWEST) as usize;
            let free = newest ^ 1;
            if reading(current) != Some(free) {
                break free;
            }
            // The consumer holds the other slot; take back the pending one
            match state.compare_exchange_weak(
                current,
                current & !DOORBELL,
                Ordering::AcqRel,
                Ordering::Acquire,
            ) {
                Ok(_) => break newest,
                Err(actual) => current = actual,
            }
        };

        // SAFETY: `target` is neither under read nor pending (see above), and
        // the staging buffer belongs to this half
        let (slot, staging) = unsafe {
            (
                &mut *self.exchange.slots[target].get(),
                &*self.exchange.staging.get(),
            )
        };
        slot.bytes[..staging.len].copy_from_slice(&staging.bytes[..staging.len]);
        slot.len = staging.len;

        let mut current = state.load(Ordering::Acquire);
        loop {
            let next = (current & READING_MASK) | target as u8 | DOORBELL;
            match state.compare_exchange_weak(current, next, Ordering::AcqRel, Ordering::Acquire) {
                Ok(_) => return true,
                Err(actual) => current = actual,
            }
        }
    }
}

/// Consumer half
pub struct FrameReader<'a, const N: usize> {
    exchange: &'a FrameExchange<N>,
}

impl<'a, const N: usize> FrameReader<'a, N> {
    /// True while a published frame awaits pickup
    pub fn doorbell(&self) -> bool {
        self.exchange.doorbell()
    }

    /// Take the newest frame if the doorbell is set
    ///
    /// Clears the doorbell and pins the slot until the returned guard is
    /// dropped. Returns `None` while a previous guard is still alive.
    pub fn pickup(&mut self) -> Option<FrameRef<'a, N>> {
        let state = &self.exchange.state;
        let mut current = state.load(Ordering::Acquire);
        loop {
            if current & DOORBELL == 0 || reading(current).is_some() {
                return None;
            }
            let newest = current & NEWEST;
            let next = (current & !DOORBELL) | ((newest + 1) << READING_SHIFT);
            match state.compare_exchange_weak(current, next, Ordering::AcqRel, Ordering::Acquire) {
                Ok(_) => {
                    return Some(FrameRef {
                        exchange: self.exchange,
                        slot: newest as usize,
                    })
                }
                Err(actual) => current = actual,
            }
        }
    }
}

/// A picked-up frame; the slot is released on drop
pub struct FrameRef<'a, const N: usize> {
    exchange: &'a FrameExchange<N>,
    slot: usize,
}

impl<const N: usize> FrameRef<'_, N> {
    /// The compressed frame bytes
    pub fn bytes(&self) -> &[u8] {
        // SAFETY: the reading marker keeps the producer out of this slot
        let slot = unsafe { &*self.exchange.slots[self.slot].get() };
        &slot.bytes[..slot.len]
    }

    /// Slot index, for diagnostics
    pub fn slot(&self) -> usize {
        self.slot
    }
}

impl<const N: usize> Drop for FrameRef<'_, N> {
    fn drop(&mut self) {
        self.exchange
            .state
            .fetch_and(!READING_MASK, Ordering::Release);
    }
}
