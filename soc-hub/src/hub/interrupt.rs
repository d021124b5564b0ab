//! Interrupt delivery.
//!
//! [`PeripheralHub::deliver`] ORs status bits into the peripheral's status
//! word and raises the peripheral's line on its assigned core. The core's
//! interrupt-service loop later calls [`PeripheralHub::service_interrupts`],
//! which enters the core's interrupt context once and runs the callback of
//! every peripheral whose line was raised.
//!
//! A callback gets an [`IsrContext`], not the hub, so it has no way to
//! deliver or service interrupts itself. Entry into an interrupt context that
//! is already occupied is refused; the lines stay queued.

use log::{debug, trace};

use super::registry::Peripheral;
use super::ring_ref::RingRef;
use super::PeripheralHub;
use crate::error::ProtocolError;
use crate::irq::{CoreId, IsrScope};
use crate::peripheral::{CounterSnapshot, IrqStatus, PeripheralHandle};

/// Interrupt callback of a peripheral.
pub type IsrFn<C> = fn(&IsrContext<'_, C>);

/// What an interrupt callback may touch.
pub struct IsrContext<'a, C> {
    hub: &'a PeripheralHub<C>,
    peripheral: &'a Peripheral<C>,
    core: CoreId,
    context: &'a C,
}

impl<'a, C> IsrContext<'a, C> {
    /// Peripheral whose line was raised.
    pub fn handle(&self) -> PeripheralHandle {
        self.peripheral.handle
    }

    /// Core the callback runs on.
    pub fn core(&self) -> CoreId {
        self.core
    }

    /// Context registered with the handler.
    pub fn app_context(&self) -> &'a C {
        self.context
    }

    /// Read and clear the peripheral's status word.
    pub fn take_status(&self) -> IrqStatus {
        self.peripheral.status.take(&*self.hub.platform)
    }

    /// Receive ring of the peripheral, if it has one.
    ///
    /// [`RingRef::ready`] refuses to wait here; use
    /// [`RingRef::try_ready`] and [`RingRef::transfer`].
    pub fn rx_ring(&self) -> Option<RingRef<'a>> {
        self.hub.ring_ref(self.peripheral, self.peripheral.rx.as_ref())
    }

    /// Transmit ring of the peripheral, if it has one.
    pub fn tx_ring(&self) -> Option<RingRef<'a>> {
        self.hub.ring_ref(self.peripheral, self.peripheral.tx.as_ref())
    }

    /// Snapshot of the peripheral's diagnostic counters.
    pub fn counters(&self) -> CounterSnapshot {
        self.peripheral.counters.snapshot()
    }
}

impl<C> PeripheralHub<C> {
    /// OR `bits` into `handle`'s status word and signal its callback.
    ///
    /// Without a registered handler the bits are only recorded, for the
    /// application to poll with
    /// [`interrupt_status()`](Self::interrupt_status).
    pub fn deliver(&self, handle: PeripheralHandle, bits: IrqStatus) {
        if let Some(p) = self.peripheral(handle) {
            self.deliver_to(p, bits);
        }
    }

    pub(crate) fn deliver_to(&self, p: &Peripheral<C>, bits: IrqStatus) {
        let word = p.status.raise(&*self.platform, bits);
        p.counters.record_interrupt();
        trace!("{}: status now {:#x}", p.handle, word.bits());
        if let Some(handler) = &p.handler {
            self.platform.post(handler.core, p.handle.line());
        }
    }

    /// Run the callbacks of every peripheral in `lines` that is bound to
    /// `core`, inside the interrupt context of `core`.
    ///
    /// Fails with [`ProtocolError::Reentrant`] if that interrupt context is
    /// already occupied; no callback runs and the caller should queue
    /// `lines` again.
    pub fn service_interrupts(&self, core: CoreId, lines: u32) -> Result<(), ProtocolError> {
        let raised = || {
            self.peripherals
                .iter()
                .filter(move |p| lines & p.handle.line() != 0)
        };

        let _scope = match IsrScope::enter(&*self.platform, core) {
            Ok(scope) => scope,
            Err(err) => {
                for p in raised() {
                    p.counters.record_isr_deferred();
                }
                debug!("{core}: delivery of lines {lines:#x} refused: {err}");
                return Err(err);
            }
        };

        for p in raised() {
            let Some(handler) = &p.handler else {
                continue;
            };
            if handler.core != core {
                continue;
            }
            let ctx = IsrContext {
                hub: self,
                peripheral: p,
                core,
                context: &handler.context,
            };
            trace!("{core}: running callback of {}", p.handle);
            (handler.isr)(&ctx);
            p.counters.record_isr_run();
        }
        Ok(())
    }
}
