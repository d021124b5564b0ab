//! Startup-time peripheral registration.
//!
//! ```ignore
//! let mut registry = Registry::new(platform);
//! let (uart, uart_dev) = registry.register(DmaDirections::BOTH)?;
//! registry.set_handler(uart, CoreId(1), UartState::new(), uart_isr)?;
//! let hub = Arc::new(registry.build());
//! ```
//!
//! The table is fixed-size ([`SOC_PERIPHERAL_COUNT`] entries) and becomes
//! read-only once [`Registry::build`] freezes it into a
//! [`PeripheralHub`](super::PeripheralHub).

use core::sync::atomic::AtomicU8;
use std::sync::Arc;

use log::debug;

use super::channel::Doorbell;
use super::endpoint::{DeviceControl, DeviceEndpoints, RxEndpoint, TxEndpoint};
use super::interrupt::IsrFn;
use super::protocol::PeripheralChannels;
use super::PeripheralHub;
use crate::constants::{DMA_RING_SLOTS, SOC_PERIPHERAL_COUNT};
use crate::dma::{Direction, DmaRingBuf};
use crate::error::ConfigError;
use crate::irq::{CoreId, IrqMutex, Platform};
use crate::peripheral::{DmaDirections, InterruptStatus, PeripheralCounters, PeripheralHandle};

pub(crate) type Ring = IrqMutex<DmaRingBuf<DMA_RING_SLOTS>>;

/// Interrupt delivery target of a peripheral.
pub(crate) struct Handler<C> {
    pub(crate) core: CoreId,
    pub(crate) context: C,
    pub(crate) isr: IsrFn<C>,
}

/// Authoritative state of one registered peripheral.
pub(crate) struct Peripheral<C> {
    pub(crate) handle: PeripheralHandle,
    pub(crate) channels: Arc<PeripheralChannels>,
    pub(crate) rx: Option<Ring>,
    pub(crate) tx: Option<Ring>,
    pub(crate) status: InterruptStatus,
    pub(crate) handler: Option<Handler<C>>,
    pub(crate) counters: PeripheralCounters,
    /// `PENDING_*` bits.
    pub(crate) pending: AtomicU8,
}

pub(crate) const PENDING_RECEIVE: u8 = 0x01;
pub(crate) const PENDING_TRANSMIT: u8 = 0x02;

/// Mutable startup view of the peripheral table.
pub struct Registry<C> {
    platform: Arc<dyn Platform>,
    bell: Arc<Doorbell>,
    peripherals: heapless::Vec<Peripheral<C>, SOC_PERIPHERAL_COUNT>,
}

impl<C> Registry<C> {
    /// Start an empty table for `platform`.
    pub fn new(platform: Arc<dyn Platform>) -> Self {
        Registry {
            platform,
            bell: Arc::new(Doorbell::new()),
            peripherals: heapless::Vec::new(),
        }
    }

    /// Allocate the next table entry and its channel triplet.
    ///
    /// Returns the handle and the device-side endpoints; only the
    /// directions in `directions` get a ring and an endpoint.
    pub fn register(
        &mut self,
        directions: DmaDirections,
    ) -> Result<(PeripheralHandle, DeviceEndpoints), ConfigError> {
        let index = self.peripherals.len();
        if index == SOC_PERIPHERAL_COUNT {
            return Err(ConfigError::TableExhausted {
                capacity: SOC_PERIPHERAL_COUNT,
            });
        }
        let handle = PeripheralHandle::new(index as u8);
        let channels = Arc::new(PeripheralChannels::new(&self.bell));

        let ring = |dir: DmaDirections, direction: Direction| {
            directions
                .contains(dir)
                .then(|| IrqMutex::new(DmaRingBuf::new(direction)))
        };
        let peripheral = Peripheral {
            handle,
            channels: Arc::clone(&channels),
            rx: ring(DmaDirections::RX, Direction::Rx),
            tx: ring(DmaDirections::TX, Direction::Tx),
            status: InterruptStatus::new(),
            handler: None,
            counters: PeripheralCounters::new(),
            pending: AtomicU8::new(0),
        };
        if self.peripherals.push(peripheral).is_err() {
            return Err(ConfigError::TableExhausted {
                capacity: SOC_PERIPHERAL_COUNT,
            });
        }

        let endpoints = DeviceEndpoints {
            rx: directions
                .contains(DmaDirections::RX)
                .then(|| RxEndpoint::new(Arc::clone(&channels))),
            tx: directions
                .contains(DmaDirections::TX)
                .then(|| TxEndpoint::new(Arc::clone(&channels))),
            control: DeviceControl::new(channels),
        };
        debug!("registered {handle} with {directions:?}");
        Ok((handle, endpoints))
    }

    /// Bind where and how `handle`'s interrupts are delivered.
    ///
    /// A second call for the same handle replaces the first.
    pub fn set_handler(
        &mut self,
        handle: PeripheralHandle,
        core: CoreId,
        context: C,
        isr: IsrFn<C>,
    ) -> Result<(), ConfigError> {
        core.check(self.platform.core_count())?;
        let peripheral = self
            .peripherals
            .get_mut(handle.index())
            .ok_or(ConfigError::UnknownPeripheral(handle.index() as u8))?;
        if peripheral.handler.is_some() {
            debug!("{handle}: replacing interrupt handler");
        }
        peripheral.handler = Some(Handler { core, context, isr });
        debug!("{handle}: interrupts delivered on {core}");
        Ok(())
    }

    /// Number of registered peripherals.
    pub fn len(&self) -> usize {
        self.peripherals.len()
    }

    /// `true` before the first [`register()`](Self::register).
    pub fn is_empty(&self) -> bool {
        self.peripherals.is_empty()
    }

    /// Freeze the table.
    pub fn build(self) -> PeripheralHub<C> {
        debug!("hub built with {} peripherals", self.peripherals.len());
        PeripheralHub {
            platform: self.platform,
            bell: self.bell,
            peripherals: self.peripherals,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::hub::IsrContext;
    use crate::irq::sim::SimPlatform;

    fn nop(_: &IsrContext<'_, u32>) {}

    fn registry() -> Registry<u32> {
        Registry::new(Arc::new(SimPlatform::new(2)))
    }

    #[test]
    fn handles_follow_registration_order() {
        let mut r = registry();
        let (a, _) = r.register(DmaDirections::BOTH).unwrap();
        let (b, _) = r.register(DmaDirections::RX).unwrap();
        assert_eq!(a.index(), 0);
        assert_eq!(b.index(), 1);
        assert_eq!(r.len(), 2);
    }

    #[test]
    fn endpoints_follow_directions() {
        let mut r = registry();
        let (_, rx_only) = r.register(DmaDirections::RX).unwrap();
        assert!(rx_only.rx.is_some());
        assert!(rx_only.tx.is_none());
        let (_, tx_only) = r.register(DmaDirections::TX).unwrap();
        assert!(tx_only.rx.is_none());
        assert!(tx_only.tx.is_some());
    }

    #[test]
    fn table_exhaustion_is_reported() {
        let mut r = registry();
        for _ in 0..SOC_PERIPHERAL_COUNT {
            r.register(DmaDirections::RX).unwrap();
        }
        assert_eq!(
            r.register(DmaDirections::RX).err(),
            Some(ConfigError::TableExhausted {
                capacity: SOC_PERIPHERAL_COUNT
            })
        );
    }

    #[test]
    fn handler_core_is_validated() {
        let mut r = registry();
        let (h, _) = r.register(DmaDirections::RX).unwrap();
        assert_eq!(
            r.set_handler(h, CoreId(2), 0, nop),
            Err(ConfigError::CoreOutOfRange {
                core: CoreId(2),
                cores: 2
            })
        );
        assert!(r.set_handler(h, CoreId(1), 0, nop).is_ok());
    }

    #[test]
    fn unknown_handle_is_rejected() {
        let mut r = registry();
        let stray = PeripheralHandle::new(3);
        assert_eq!(
            r.set_handler(stray, CoreId(0), 0, nop),
            Err(ConfigError::UnknownPeripheral(3))
        );
    }

    #[test]
    fn last_handler_wins() {
        let mut r = registry();
        let (h, _) = r.register(DmaDirections::TX).unwrap();
        r.set_handler(h, CoreId(0), 1, nop).unwrap();
        r.set_handler(h, CoreId(1), 2, nop).unwrap();
        let hub = r.build();
        assert_eq!(hub.app_context(h), Some(&2));
    }

    #[test]
    fn app_context_absent_before_handler() {
        let mut r = registry();
        let (h, _) = r.register(DmaDirections::TX).unwrap();
        let hub = r.build();
        assert_eq!(hub.app_context(h), None);
    }
}
