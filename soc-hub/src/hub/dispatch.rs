//! The dispatch loop.
//!
//! Each pass walks every peripheral and every channel of its triplet, in
//! channel-index order, and services whatever is posted. A request that
//! cannot be honoured yet stays parked on its lane and marks the peripheral
//! `ReceivePending` or `TransmitPending`; it is looked at again on every
//! later pass. Peripherals share nothing but the doorbell, so one that never
//! drains only ever stalls itself.

use core::sync::atomic::Ordering;
use std::sync::Arc;
use std::thread::JoinHandle;

use log::{debug, trace, warn};

use super::channel::Service;
use super::protocol::{frame_from, HubControl, RxReply, RxRequest, TxReply, Wait};
use super::registry::{Peripheral, PENDING_RECEIVE, PENDING_TRANSMIT};
use super::PeripheralHub;
use crate::constants::{
    SOC_PERIPHERAL_CHANNEL_COUNT, SOC_PERIPHERAL_CONTROL_CH, SOC_PERIPHERAL_FROM_DMA_CH,
    SOC_PERIPHERAL_TO_DMA_CH,
};
use crate::error::SpawnError;
use crate::irq::sim::spawn_on;
use crate::irq::CoreId;
use crate::peripheral::IrqStatus;

impl<C> PeripheralHub<C> {
    /// Service every channel once. Returns how many requests were answered
    /// or transfers retired; 0 means every lane is idle or parked.
    pub fn poll_once(&self) -> usize {
        self.peripherals
            .iter()
            .map(|p| {
                (0..SOC_PERIPHERAL_CHANNEL_COUNT)
                    .map(|ch| match ch {
                        SOC_PERIPHERAL_FROM_DMA_CH => self.service_rx(p),
                        SOC_PERIPHERAL_TO_DMA_CH => self.service_tx(p),
                        SOC_PERIPHERAL_CONTROL_CH => self.service_control(p),
                        _ => 0,
                    })
                    .sum::<usize>()
            })
            .sum()
    }

    /// Run the dispatch loop on the calling thread, forever.
    pub fn run(&self) -> ! {
        loop {
            let seen = self.bell.seq();
            if self.poll_once() == 0 {
                self.bell.wait_past(seen);
            }
        }
    }

    fn service_rx(&self, p: &Peripheral<C>) -> usize {
        let mask = &*self.platform;
        let service = p.channels.rx.serve(|req| {
            let Some(ring) = &p.rx else {
                return Some(match req {
                    RxRequest::Ready(_) => RxReply::NotReady,
                    RxRequest::Xfer { .. } => RxReply::Stored(0),
                });
            };
            match req {
                RxRequest::Ready(wait) => {
                    if ring.lock(mask, |r| r.is_ready()) {
                        Some(RxReply::Ready)
                    } else {
                        (*wait == Wait::Poll).then_some(RxReply::NotReady)
                    }
                }
                RxRequest::Xfer { data, wait } => {
                    let n = ring.lock(mask, |r| r.fill(data));
                    if n > 0 {
                        trace!("{}: stored {n} bytes in receive ring", p.handle);
                        p.counters.record_rx(n);
                        self.deliver_to(p, IrqStatus::RX_DONE);
                        self.bell.ring();
                        Some(RxReply::Stored(n))
                    } else {
                        (*wait == Wait::Poll).then_some(RxReply::Stored(0))
                    }
                }
            }
        });
        self.settle(p, PENDING_RECEIVE, service)
    }

    fn service_tx(&self, p: &Peripheral<C>) -> usize {
        let mut done = usize::from(self.retire_tx(p));
        let service = p.channels.tx.serve(|req| {
            let Some(ring) = &p.tx else {
                return Some(TxReply::Empty);
            };
            // The caller's previous answer may have been collected after
            // the check above; retire it before starting the next slot.
            if self.retire_tx(p) {
                done += 1;
            }
            let frame = ring.lock(&*self.platform, |r| r.start().map(frame_from));
            match frame {
                Some(frame) => {
                    trace!("{}: handing {} bytes to device", p.handle, frame.len());
                    Some(TxReply::Frame(frame))
                }
                None => (req.wait == Wait::Poll).then_some(TxReply::Empty),
            }
        });
        done + self.settle(p, PENDING_TRANSMIT, service)
    }

    /// Complete the in-flight transmit slot once the device has collected
    /// it.
    fn retire_tx(&self, p: &Peripheral<C>) -> bool {
        if !p.channels.tx.take_completed() {
            return false;
        }
        let Some(ring) = &p.tx else {
            return false;
        };
        match ring.lock(&*self.platform, |r| r.complete()) {
            Some(n) => {
                p.counters.record_tx(n);
                self.deliver_to(p, IrqStatus::TX_DONE);
                self.bell.ring();
                true
            }
            None => false,
        }
    }

    fn service_control(&self, p: &Peripheral<C>) -> usize {
        let service = p.channels.to_hub.serve(|req| {
            match *req {
                HubControl::Raise(bits) => self.deliver_to(p, bits),
                HubControl::Reset => {
                    for ring in [&p.rx, &p.tx].into_iter().flatten() {
                        ring.lock(&*self.platform, |r| r.reset());
                    }
                    trace!("{}: rings reset", p.handle);
                    self.bell.ring();
                }
            }
            Some(())
        });
        usize::from(service == Service::Answered)
    }

    /// Track the pending state of one direction after a serve pass.
    fn settle(&self, p: &Peripheral<C>, bit: u8, service: Service) -> usize {
        match service {
            Service::Answered => {
                p.pending.fetch_and(!bit, Ordering::AcqRel);
                1
            }
            Service::Parked => {
                let before = p.pending.fetch_or(bit, Ordering::AcqRel);
                if before & bit == 0 {
                    if bit == PENDING_RECEIVE {
                        p.counters.record_rx_stall();
                        warn!("{}: receive ring full, device waiting", p.handle);
                    } else {
                        p.counters.record_tx_stall();
                        warn!("{}: transmit ring empty, device waiting", p.handle);
                    }
                }
                0
            }
            Service::Idle => 0,
        }
    }
}

impl<C: Send + Sync + 'static> PeripheralHub<C> {
    /// Start the dispatch loop on its own thread, bound to `core`.
    ///
    /// Fails without starting anything if `core` does not exist on the
    /// platform.
    pub fn spawn(self: &Arc<Self>, core: CoreId) -> Result<JoinHandle<()>, SpawnError> {
        core.check(self.platform.core_count())?;
        let hub = Arc::clone(self);
        let handle = spawn_on(core, "hub", move || hub.run())?;
        debug!("dispatch loop started on {core}");
        Ok(handle)
    }
}
