//! Direct transfers for devices that share a core group with the hub.
//!
//! Such a device can skip the channel handshake and move one slot
//! synchronously. Both calls return 0 at once when there is nothing to do,
//! whether because no peripheral is attached or because the ring is not
//! ready; the two cases are only told apart in the log.

use log::trace;

use super::PeripheralHub;
use crate::constants::DMA_SLOT_BYTES;
use crate::peripheral::{IrqStatus, PeripheralHandle};

/// Result of one direct transfer attempt.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub(crate) enum DirectOutcome {
    /// No peripheral (or no ring in that direction) is attached.
    Detached,
    /// The ring had no suitable slot.
    NotReady,
    /// This many bytes moved.
    Moved(usize),
}

impl DirectOutcome {
    fn bytes(self) -> usize {
        match self {
            DirectOutcome::Moved(n) => n,
            DirectOutcome::Detached => {
                trace!("direct transfer with no peripheral attached");
                0
            }
            DirectOutcome::NotReady => 0,
        }
    }
}

impl<C> PeripheralHub<C> {
    /// Store `data` in the receive ring of `peripheral` without a channel
    /// round trip. Returns the bytes stored, or 0.
    pub fn direct_rx_xfer(&self, peripheral: Option<PeripheralHandle>, data: &[u8]) -> usize {
        self.try_direct_rx(peripheral, data).bytes()
    }

    /// Take the oldest transmit slot of `peripheral` into `buf` without a
    /// channel round trip. Returns the slot length, or 0.
    pub fn direct_tx_xfer(
        &self,
        peripheral: Option<PeripheralHandle>,
        buf: &mut [u8; DMA_SLOT_BYTES],
    ) -> usize {
        self.try_direct_tx(peripheral, buf).bytes()
    }

    pub(crate) fn try_direct_rx(
        &self,
        peripheral: Option<PeripheralHandle>,
        data: &[u8],
    ) -> DirectOutcome {
        let Some(p) = peripheral.and_then(|h| self.peripheral(h)) else {
            return DirectOutcome::Detached;
        };
        let Some(ring) = &p.rx else {
            return DirectOutcome::Detached;
        };
        let n = ring.lock(&*self.platform, |r| r.fill(data));
        if n == 0 {
            return DirectOutcome::NotReady;
        }
        p.counters.record_rx(n);
        self.deliver_to(p, IrqStatus::RX_DONE);
        self.bell.ring();
        DirectOutcome::Moved(n)
    }

    pub(crate) fn try_direct_tx(
        &self,
        peripheral: Option<PeripheralHandle>,
        buf: &mut [u8; DMA_SLOT_BYTES],
    ) -> DirectOutcome {
        let Some(p) = peripheral.and_then(|h| self.peripheral(h)) else {
            return DirectOutcome::Detached;
        };
        let Some(ring) = &p.tx else {
            return DirectOutcome::Detached;
        };
        let moved = ring.lock(&*self.platform, |r| {
            let n = {
                let data = r.start()?;
                buf[..data.len()].copy_from_slice(data);
                data.len()
            };
            r.complete();
            Some(n)
        });
        let Some(n) = moved else {
            return DirectOutcome::NotReady;
        };
        p.counters.record_tx(n);
        self.deliver_to(p, IrqStatus::TX_DONE);
        self.bell.ring();
        DirectOutcome::Moved(n)
    }
}
