//! The peripheral hub: registration, DMA transfer protocol and interrupt
//! dispatch on a hosted multicore platform.
//!
//! ```text
//!  device task (any core)          hub task (one core)            application
//!  ─────────────────────           ───────────────────            ───────────
//!  RxEndpoint::xfer ──rx lane──►   fill rx ring ─┐                RingRef::transfer (drain)
//!  TxEndpoint::xfer ◄─tx lane───   start tx ring │                RingRef::transfer (fill)
//!  DeviceControl    ──control──►   raise / reset │
//!                                                └─ deliver ──► callback on assigned core
//! ```
//!
//! Wiring happens once at startup through a [`Registry`]; the resulting
//! [`PeripheralHub`] is shared behind an `Arc` and never changes shape
//! again.

mod channel;
mod direct;
mod dispatch;
mod endpoint;
mod interrupt;
mod protocol;
mod registry;
mod ring_ref;


use core::sync::atomic::Ordering;
use std::sync::Arc;

pub use endpoint::{ControlEndpoint, DeviceControl, DeviceEndpoints, RxEndpoint, TxEndpoint};
pub use interrupt::{IsrContext, IsrFn};
pub use protocol::{ControlReply, ControlRequest, Wait};
pub use registry::Registry;
pub use ring_ref::RingRef;

use channel::Doorbell;
use registry::{Peripheral, Ring, PENDING_RECEIVE, PENDING_TRANSMIT};

use crate::constants::SOC_PERIPHERAL_COUNT;
use crate::irq::Platform;
use crate::peripheral::{CounterSnapshot, IrqStatus, PendingState, PeripheralHandle};

/// The frozen peripheral table plus everything needed to drive it.
pub struct PeripheralHub<C> {
    pub(crate) platform: Arc<dyn Platform>,
    pub(crate) bell: Arc<Doorbell>,
    pub(crate) peripherals: heapless::Vec<Peripheral<C>, SOC_PERIPHERAL_COUNT>,
}

impl<C> PeripheralHub<C> {
    pub(crate) fn peripheral(&self, handle: PeripheralHandle) -> Option<&Peripheral<C>> {
        self.peripherals.get(handle.index())
    }

    pub(crate) fn ring_ref<'a>(
        &'a self,
        p: &Peripheral<C>,
        ring: Option<&'a Ring>,
    ) -> Option<RingRef<'a>> {
        ring.map(|ring| RingRef {
            handle: p.handle,
            ring,
            platform: &*self.platform,
            bell: &self.bell,
        })
    }

    /// Number of registered peripherals.
    pub fn len(&self) -> usize {
        self.peripherals.len()
    }

    /// `true` if no peripheral was registered.
    pub fn is_empty(&self) -> bool {
        self.peripherals.is_empty()
    }

    /// Context passed to [`Registry::set_handler`], if a handler was set.
    pub fn app_context(&self, handle: PeripheralHandle) -> Option<&C> {
        self.peripheral(handle)?
            .handler
            .as_ref()
            .map(|h| &h.context)
    }

    /// Receive ring, absent if `handle` was registered without one.
    pub fn rx_ring(&self, handle: PeripheralHandle) -> Option<RingRef<'_>> {
        let p = self.peripheral(handle)?;
        self.ring_ref(p, p.rx.as_ref())
    }

    /// Transmit ring, absent if `handle` was registered without one.
    pub fn tx_ring(&self, handle: PeripheralHandle) -> Option<RingRef<'_>> {
        let p = self.peripheral(handle)?;
        self.ring_ref(p, p.tx.as_ref())
    }

    /// Endpoint for configuration requests to `handle`'s device.
    pub fn control_endpoint(&self, handle: PeripheralHandle) -> Option<ControlEndpoint> {
        let p = self.peripheral(handle)?;
        Some(ControlEndpoint::new(
            Arc::clone(&p.channels),
            Arc::clone(&self.platform),
        ))
    }

    /// Read and clear `handle`'s interrupt-status word.
    pub fn interrupt_status(&self, handle: PeripheralHandle) -> IrqStatus {
        match self.peripheral(handle) {
            Some(p) => p.status.take(&*self.platform),
            None => IrqStatus::empty(),
        }
    }

    /// Directions of `handle` with a device request parked in the hub.
    pub fn pending(&self, handle: PeripheralHandle) -> PendingState {
        let bits = self
            .peripheral(handle)
            .map_or(0, |p| p.pending.load(Ordering::Acquire));
        PendingState {
            receive: bits & PENDING_RECEIVE != 0,
            transmit: bits & PENDING_TRANSMIT != 0,
        }
    }

    /// Diagnostic counters of `handle`. All zero for an unknown handle.
    pub fn counters(&self, handle: PeripheralHandle) -> CounterSnapshot {
        self.peripheral(handle)
            .map(|p| p.counters.snapshot())
            .unwrap_or_default()
    }

    /// Wake the dispatch loop.
    ///
    /// Ring operations through [`RingRef`] do this on their own; call it
    /// after changing state the hub cannot observe.
    pub fn dma_request(&self) {
        self.bell.ring();
    }
}
