//! Application-side view of one DMA ring.

use log::trace;

use super::channel::Doorbell;
use super::registry::Ring;
use crate::dma::Direction;
use crate::error::ProtocolError;
use crate::irq::Platform;
use crate::peripheral::PeripheralHandle;

/// Borrowed access to a receive or transmit ring.
///
/// "Ready" means there is something for the application to do: a `Filled`
/// slot to drain on a receive ring, an `Empty` slot to fill on a transmit
/// ring. Every change made through this view wakes the dispatch loop.
pub struct RingRef<'a> {
    pub(crate) handle: PeripheralHandle,
    pub(crate) ring: &'a Ring,
    pub(crate) platform: &'a dyn Platform,
    pub(crate) bell: &'a Doorbell,
}

impl RingRef<'_> {
    /// Direction of the underlying ring.
    pub fn direction(&self) -> Direction {
        self.ring.lock(self.platform, |r| r.direction())
    }

    /// `true` if a transfer would move data right now.
    pub fn try_ready(&self) -> bool {
        self.ring.lock(self.platform, |r| match r.direction() {
            Direction::Rx => r.has_filled(),
            Direction::Tx => r.is_ready(),
        })
    }

    /// Wait until [`try_ready()`](Self::try_ready) holds.
    ///
    /// Only the calling context is suspended. Not allowed from an
    /// interrupt callback.
    pub fn ready(&self) -> Result<(), ProtocolError> {
        if self.platform.isr_running() {
            return Err(ProtocolError::BlockingInIsr);
        }
        loop {
            let seen = self.bell.seq();
            if self.try_ready() {
                return Ok(());
            }
            self.bell.wait_past(seen);
        }
    }

    /// Move up to `max_length` bytes between `data` and the ring.
    ///
    /// Transmit rings fill the head slot from `data`; receive rings drain
    /// the tail slot into `data`. Returns 0, with no state change, when no
    /// suitable slot exists.
    pub fn transfer(&self, data: &mut [u8], max_length: usize) -> usize {
        let n = self
            .ring
            .lock(self.platform, |r| r.transfer(data, max_length));
        if n > 0 {
            trace!("{}: application moved {n} bytes", self.handle);
            self.bell.ring();
        }
        n
    }

    /// Slots not currently `Empty`.
    pub fn len(&self) -> usize {
        self.ring.lock(self.platform, |r| r.len())
    }

    /// `true` when every slot is `Empty`.
    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Number of slots.
    pub fn capacity(&self) -> usize {
        self.ring.lock(self.platform, |r| r.capacity())
    }

    /// Drop all contents of the ring.
    pub fn reset(&self) {
        self.ring.lock(self.platform, |r| r.reset());
        self.bell.ring();
    }
}
