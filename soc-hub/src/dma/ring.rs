//! Fixed-capacity DMA descriptor ring.
//!
//! Each slot carries up to [`DMA_SLOT_BYTES`] bytes and moves through
//! exactly one cycle of states:
//!
//! ```text
//!          fill()             start()               complete()
//! Empty ──────────► Filled ──────────► InFlight ──────────────► Empty
//!   ▲ head                   ▲ tail
//! ```
//!
//! On a receive ring the application's [`drain()`](DmaRingBuf::drain) is
//! `start()` and `complete()` back to back.
//!
//! The producer fills at `head`, the consumer drains at `tail`; both advance
//! modulo `N`. A slot is only ever written by the side that owns its current
//! state, so the ring never needs to copy under contention. The ring itself
//! is not synchronized: the hub wraps it in an
//! [`IrqMutex`](crate::irq::IrqMutex).
//!
//! A full ring refuses further fills (backpressure) and an empty ring
//! refuses drains. Both report this as a zero length, never as an error.

use heapless::Vec;

use crate::constants::DMA_SLOT_BYTES;

/// Which way data flows through a ring, seen from the application.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Direction {
    /// Device → application. The hub fills, the application drains.
    Rx,
    /// Application → device. The application fills, the hub drains.
    Tx,
}

/// Ownership state of one descriptor.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SlotState {
    /// Free for the producer.
    Empty,
    /// Holds data the consumer has not taken yet.
    Filled,
    /// Taken by the consumer, transfer not yet complete.
    InFlight,
}

struct Slot {
    state: SlotState,
    data: Vec<u8, DMA_SLOT_BYTES>,
}

impl Slot {
    const EMPTY: Slot = Slot {
        state: SlotState::Empty,
        data: Vec::new(),
    };
}

/// A ring of `N` DMA descriptors.
pub struct DmaRingBuf<const N: usize> {
    direction: Direction,
    slots: [Slot; N],
    /// Next slot to fill.
    head: usize,
    /// Next slot to drain.
    tail: usize,
}

impl<const N: usize> DmaRingBuf<N> {
    /// Create a ring with every slot `Empty`.
    ///
    /// # Panics
    ///
    /// Compile-time assertion: `N` must be at least 1.
    pub const fn new(direction: Direction) -> Self {
        assert!(N >= 1, "DMA ring needs at least one slot");
        DmaRingBuf {
            direction,
            slots: [Slot::EMPTY; N],
            head: 0,
            tail: 0,
        }
    }

    /// Direction this ring was created for.
    pub fn direction(&self) -> Direction {
        self.direction
    }

    /// Number of descriptors.
    pub const fn capacity(&self) -> usize {
        N
    }

    /// Number of slots that are not `Empty`.
    pub fn len(&self) -> usize {
        self.slots
            .iter()
            .filter(|s| s.state != SlotState::Empty)
            .count()
    }

    /// `true` when every slot is `Empty`.
    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// State of slot `index`, or `None` if out of range.
    pub fn state(&self, index: usize) -> Option<SlotState> {
        self.slots.get(index).map(|s| s.state)
    }

    /// Slot the producer fills next.
    pub fn head(&self) -> usize {
        self.head
    }

    /// Slot the consumer drains next.
    pub fn tail(&self) -> usize {
        self.tail
    }

    /// `true` if the producer can fill the head slot.
    pub fn is_ready(&self) -> bool {
        self.slots[self.head].state == SlotState::Empty
    }

    /// `true` if the consumer has a `Filled` slot waiting at the tail.
    pub fn has_filled(&self) -> bool {
        self.slots[self.tail].state == SlotState::Filled
    }

    /// Copy `data` into the head slot (`Empty → Filled`).
    ///
    /// Stores at most [`DMA_SLOT_BYTES`] bytes and returns how many were
    /// stored. Returns 0 without touching the ring if the head slot is not
    /// `Empty` or `data` is empty.
    pub fn fill(&mut self, data: &[u8]) -> usize {
        if data.is_empty() || !self.is_ready() {
            return 0;
        }
        let n = data.len().min(DMA_SLOT_BYTES);
        let slot = &mut self.slots[self.head];
        slot.data.clear();
        // Cannot fail: n is bounded by the slot capacity.
        let _ = slot.data.extend_from_slice(&data[..n]);
        slot.state = SlotState::Filled;
        self.head = (self.head + 1) % N;
        n
    }

    /// Copy up to `max_length` bytes out of the tail slot into `out`.
    ///
    /// A slot drained completely goes through `InFlight` and back to
    /// `Empty` under the same borrow, and the tail advances. If the slot
    /// holds more than fits, the remainder stays in the slot (still
    /// `Filled`) for the next drain. Returns 0 without touching the ring if
    /// the tail slot is not `Filled`.
    pub fn drain(&mut self, out: &mut [u8], max_length: usize) -> usize {
        if !self.has_filled() {
            return 0;
        }
        let len = self.slots[self.tail].data.len();
        let n = len.min(max_length).min(out.len());
        if n == 0 {
            return 0;
        }
        if n < len {
            let slot = &mut self.slots[self.tail];
            out[..n].copy_from_slice(&slot.data[..n]);
            slot.data.copy_within(n.., 0);
            slot.data.truncate(len - n);
            return n;
        }
        match self.start() {
            Some(data) => out[..n].copy_from_slice(data),
            None => return 0,
        }
        self.complete().unwrap_or(0)
    }

    /// Direction-aware transfer used by the application side.
    ///
    /// - [`Direction::Tx`]: fill the head slot from `data[..max_length]`.
    /// - [`Direction::Rx`]: drain the tail slot into `data`.
    ///
    /// Returns the number of bytes moved; 0 means "try again".
    pub fn transfer(&mut self, data: &mut [u8], max_length: usize) -> usize {
        match self.direction {
            Direction::Tx => {
                let n = max_length.min(data.len());
                self.fill(&data[..n])
            }
            Direction::Rx => self.drain(data, max_length),
        }
    }

    /// Hand the tail slot to the DMA engine (`Filled → InFlight`).
    ///
    /// Returns the slot contents, or `None` if the tail slot is not
    /// `Filled` (empty ring, or a transfer already in flight).
    pub fn start(&mut self) -> Option<&[u8]> {
        if !self.has_filled() {
            return None;
        }
        let slot = &mut self.slots[self.tail];
        slot.state = SlotState::InFlight;
        Some(slot.data.as_slice())
    }

    /// Retire the in-flight tail slot (`InFlight → Empty`).
    ///
    /// Returns the number of bytes the slot carried, or `None` if no
    /// transfer was in flight.
    pub fn complete(&mut self) -> Option<usize> {
        let slot = &mut self.slots[self.tail];
        if slot.state != SlotState::InFlight {
            return None;
        }
        let n = slot.data.len();
        slot.data.clear();
        slot.state = SlotState::Empty;
        self.tail = (self.tail + 1) % N;
        Some(n)
    }

    /// Drop all contents and return every slot to `Empty`.
    pub fn reset(&mut self) {
        for slot in self.slots.iter_mut() {
            slot.data.clear();
            slot.state = SlotState::Empty;
        }
        self.head = 0;
        self.tail = 0;
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn states<const N: usize>(ring: &DmaRingBuf<N>) -> [SlotState; N] {
        core::array::from_fn(|i| ring.state(i).unwrap())
    }

    #[test]
    fn new_ring_is_empty() {
        let ring: DmaRingBuf<4> = DmaRingBuf::new(Direction::Rx);
        assert!(ring.is_empty());
        assert!(ring.is_ready());
        assert!(!ring.has_filled());
        assert_eq!(ring.capacity(), 4);
        assert_eq!(states(&ring), [SlotState::Empty; 4]);
    }

    #[test]
    fn transfer_on_empty_ring_returns_zero() {
        let mut ring: DmaRingBuf<4> = DmaRingBuf::new(Direction::Rx);
        let mut data = [0u8; 16];
        assert_eq!(ring.transfer(&mut data, 10), 0);
        assert_eq!(states(&ring), [SlotState::Empty; 4]);
        assert_eq!((ring.head(), ring.tail()), (0, 0));
    }

    #[test]
    fn fifo_order() {
        let mut ring: DmaRingBuf<4> = DmaRingBuf::new(Direction::Rx);
        assert_eq!(ring.fill(b"one"), 3);
        assert_eq!(ring.fill(b"two!"), 4);
        assert_eq!(ring.fill(b"3"), 1);

        let mut out = [0u8; 8];
        let n = ring.drain(&mut out, 8);
        assert_eq!(&out[..n], b"one");
        let n = ring.drain(&mut out, 8);
        assert_eq!(&out[..n], b"two!");
        let n = ring.drain(&mut out, 8);
        assert_eq!(&out[..n], b"3");
        assert_eq!(ring.drain(&mut out, 8), 0);
    }

    #[test]
    fn full_ring_refuses_fill() {
        let mut ring: DmaRingBuf<4> = DmaRingBuf::new(Direction::Rx);
        for i in 0..4u8 {
            assert_eq!(ring.fill(&[i]), 1);
        }
        assert!(!ring.is_ready());
        assert_eq!(ring.len(), 4);
        assert_eq!(ring.fill(&[99]), 0, "full ring must not overwrite");

        let mut out = [0u8; 1];
        ring.drain(&mut out, 1);
        assert_eq!(out[0], 0, "oldest data survives backpressure");
        assert!(ring.is_ready());
    }

    #[test]
    fn single_slot_handoff() {
        let mut ring: DmaRingBuf<1> = DmaRingBuf::new(Direction::Tx);
        assert_eq!(ring.fill(b"a"), 1);
        assert_eq!(ring.fill(b"b"), 0);

        assert_eq!(ring.start(), Some(&b"a"[..]));
        assert_eq!(ring.fill(b"b"), 0, "in-flight slot still owned by DMA");
        assert_eq!(ring.complete(), Some(1));

        assert_eq!(ring.fill(b"b"), 1);
        assert_eq!(ring.start(), Some(&b"b"[..]));
    }

    #[test]
    fn start_and_complete_walk_states() {
        let mut ring: DmaRingBuf<2> = DmaRingBuf::new(Direction::Tx);
        ring.fill(b"xy");
        assert_eq!(states(&ring), [SlotState::Filled, SlotState::Empty]);

        assert!(ring.start().is_some());
        assert_eq!(states(&ring), [SlotState::InFlight, SlotState::Empty]);
        assert!(ring.start().is_none(), "only one transfer in flight");

        assert_eq!(ring.complete(), Some(2));
        assert_eq!(states(&ring), [SlotState::Empty; 2]);
        assert_eq!(ring.complete(), None);
    }

    #[test]
    fn partial_drain_keeps_remainder() {
        let mut ring: DmaRingBuf<2> = DmaRingBuf::new(Direction::Rx);
        ring.fill(b"abcdef");

        let mut out = [0u8; 8];
        assert_eq!(ring.drain(&mut out, 4), 4);
        assert_eq!(&out[..4], b"abcd");
        assert_eq!(ring.state(0), Some(SlotState::Filled));

        assert_eq!(ring.drain(&mut out, 4), 2);
        assert_eq!(&out[..2], b"ef");
        assert_eq!(ring.state(0), Some(SlotState::Empty));
        assert_eq!(ring.tail(), 1);
    }

    #[test]
    fn drain_leaves_in_flight_slot_alone() {
        let mut ring: DmaRingBuf<2> = DmaRingBuf::new(Direction::Rx);
        ring.fill(b"ab");
        ring.fill(b"cd");
        assert!(ring.start().is_some());

        let mut out = [0u8; 4];
        assert_eq!(ring.drain(&mut out, 4), 0);
        assert_eq!(states(&ring), [SlotState::InFlight, SlotState::Filled]);

        assert_eq!(ring.complete(), Some(2));
        assert_eq!(ring.drain(&mut out, 4), 2);
        assert_eq!(&out[..2], b"cd");
        assert_eq!(states(&ring), [SlotState::Empty; 2]);
        assert_eq!(ring.complete(), None, "full drain already retired its slot");
    }

    #[test]
    fn tx_transfer_fills_head() {
        let mut ring: DmaRingBuf<2> = DmaRingBuf::new(Direction::Tx);
        let mut data = *b"hello world";
        assert_eq!(ring.transfer(&mut data, 5), 5);
        assert_eq!(ring.start(), Some(&b"hello"[..]));
    }

    #[test]
    fn oversized_fill_is_truncated_to_slot() {
        let mut ring: DmaRingBuf<1> = DmaRingBuf::new(Direction::Rx);
        let big = [7u8; DMA_SLOT_BYTES + 10];
        assert_eq!(ring.fill(&big), DMA_SLOT_BYTES);
    }

    #[test]
    fn empty_fill_is_noop() {
        let mut ring: DmaRingBuf<2> = DmaRingBuf::new(Direction::Tx);
        assert_eq!(ring.fill(&[]), 0);
        assert!(ring.is_empty());
    }

    #[test]
    fn wraparound() {
        let mut ring: DmaRingBuf<3> = DmaRingBuf::new(Direction::Rx);
        let mut out = [0u8; 1];
        for round in 0..10u8 {
            assert_eq!(ring.fill(&[round]), 1);
            assert_eq!(ring.fill(&[round + 100]), 1);
            assert_eq!(ring.drain(&mut out, 1), 1);
            assert_eq!(out[0], round);
            assert_eq!(ring.drain(&mut out, 1), 1);
            assert_eq!(out[0], round + 100);
            assert!(ring.is_empty());
        }
    }

    #[test]
    fn reset_clears_everything() {
        let mut ring: DmaRingBuf<3> = DmaRingBuf::new(Direction::Tx);
        ring.fill(b"a");
        ring.fill(b"b");
        ring.start();
        ring.reset();
        assert_eq!(states(&ring), [SlotState::Empty; 3]);
        assert_eq!((ring.head(), ring.tail()), (0, 0));
    }
}
