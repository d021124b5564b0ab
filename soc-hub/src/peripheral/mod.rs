//! Per-peripheral building blocks shared by the hub and its clients.
//!
//! | Type | Purpose |
//! |------|---------|
//! | [`PeripheralHandle`] | Opaque identity returned by registration |
//! | [`IrqStatus`] | Interrupt-status bits (receive-done, transmit-done, device) |
//! | [`DmaDirections`] | Which DMA rings a peripheral is registered with |
//! | [`InterruptStatus`] | Read-and-clear status word guarded by masking |
//! | [`PeripheralCounters`] | Diagnostic counters |

pub mod counters;
pub mod status;

use core::fmt;

use crate::constants::{SOC_PERIPHERAL_ISR_DMA_RX_DONE_BM, SOC_PERIPHERAL_ISR_DMA_TX_DONE_BM};

pub use counters::{CounterSnapshot, PeripheralCounters};
pub use status::InterruptStatus;

/// Opaque identity of a registered peripheral.
///
/// Handles are only minted by the registry, in registration order.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct PeripheralHandle(u8);

impl PeripheralHandle {
    pub(crate) const fn new(index: u8) -> Self {
        PeripheralHandle(index)
    }

    /// Position in the peripheral table.
    pub const fn index(self) -> usize {
        self.0 as usize
    }

    /// Interrupt line of this peripheral (one bit per table entry).
    pub const fn line(self) -> u32 {
        1 << self.0
    }
}

impl fmt::Display for PeripheralHandle {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "periph{}", self.0)
    }
}

bitflags::bitflags! {
    /// Interrupt-status bits of a peripheral.
    ///
    /// Bits above [`TX_DONE`](Self::TX_DONE) are free for device-specific
    /// events raised over the control channel.
    #[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default)]
    pub struct IrqStatus: u32 {
        /// A receive transfer landed in the receive ring.
        const RX_DONE = SOC_PERIPHERAL_ISR_DMA_RX_DONE_BM;
        /// A transmit slot was handed to the device.
        const TX_DONE = SOC_PERIPHERAL_ISR_DMA_TX_DONE_BM;
        /// First device-specific event bit.
        const DEVICE = 0x0000_0004;

        const _ = !0;
    }
}

bitflags::bitflags! {
    /// DMA directions a peripheral is registered with.
    #[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
    pub struct DmaDirections: u8 {
        /// Device → application ring.
        const RX = 0x01;
        /// Application → device ring.
        const TX = 0x02;
        /// Both rings.
        const BOTH = Self::RX.bits() | Self::TX.bits();
    }
}

/// Which directions of a peripheral have a driver blocked in the hub.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct PendingState {
    /// A receive-ready or receive-transfer request is parked.
    pub receive: bool,
    /// A transmit-transfer request is parked.
    pub transmit: bool,
}

impl PendingState {
    /// Neither direction is blocked.
    pub fn is_idle(&self) -> bool {
        !self.receive && !self.transmit
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn status_bits_match_wire_masks() {
        assert_eq!(IrqStatus::RX_DONE.bits(), 0b01);
        assert_eq!(IrqStatus::TX_DONE.bits(), 0b10);
        assert_eq!((IrqStatus::RX_DONE | IrqStatus::TX_DONE).bits(), 0b11);
    }

    #[test]
    fn device_bits_are_retained() {
        let s = IrqStatus::from_bits_retain(0x80 | 0x1);
        assert!(s.contains(IrqStatus::RX_DONE));
        assert_eq!(s.bits(), 0x81);
    }

    #[test]
    fn handle_line_is_one_hot() {
        assert_eq!(PeripheralHandle::new(0).line(), 1);
        assert_eq!(PeripheralHandle::new(5).line(), 1 << 5);
        assert_eq!(PeripheralHandle::new(5).index(), 5);
    }

    #[test]
    fn pending_state_idle() {
        assert!(PendingState::default().is_idle());
        let p = PendingState {
            receive: true,
            transmit: false,
        };
        assert!(!p.is_idle());
    }
}
