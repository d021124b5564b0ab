//! Diagnostic counters.
//!
//! The data path reports "try again" as a zero length, so there is no error
//! trail to inspect afterwards. These counters are the substitute: cheap
//! relaxed atomics bumped by the hub and read as a [`CounterSnapshot`].

use core::sync::atomic::{AtomicU32, Ordering};

/// Live counters of one peripheral.
#[derive(Default)]
pub struct PeripheralCounters {
    rx_bytes: AtomicU32,
    tx_bytes: AtomicU32,
    rx_transfers: AtomicU32,
    tx_transfers: AtomicU32,
    rx_stalls: AtomicU32,
    tx_stalls: AtomicU32,
    interrupts_raised: AtomicU32,
    isr_runs: AtomicU32,
    isr_deferred: AtomicU32,
}

/// Point-in-time copy of [`PeripheralCounters`].
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct CounterSnapshot {
    /// Bytes stored into the receive ring.
    pub rx_bytes: u32,
    /// Bytes handed to the device from the transmit ring.
    pub tx_bytes: u32,
    /// Receive slots filled.
    pub rx_transfers: u32,
    /// Transmit slots handed over.
    pub tx_transfers: u32,
    /// Times a receive request had to wait for a free slot.
    pub rx_stalls: u32,
    /// Times a transmit request had to wait for a filled slot.
    pub tx_stalls: u32,
    /// Calls to deliver status bits.
    pub interrupts_raised: u32,
    /// Callback invocations.
    pub isr_runs: u32,
    /// Deliveries refused because the interrupt context was busy.
    pub isr_deferred: u32,
}

impl PeripheralCounters {
    /// All counters at zero.
    pub const fn new() -> Self {
        PeripheralCounters {
            rx_bytes: AtomicU32::new(0),
            tx_bytes: AtomicU32::new(0),
            rx_transfers: AtomicU32::new(0),
            tx_transfers: AtomicU32::new(0),
            rx_stalls: AtomicU32::new(0),
            tx_stalls: AtomicU32::new(0),
            interrupts_raised: AtomicU32::new(0),
            isr_runs: AtomicU32::new(0),
            isr_deferred: AtomicU32::new(0),
        }
    }

    pub(crate) fn record_rx(&self, bytes: usize) {
        self.rx_bytes.fetch_add(bytes as u32, Ordering::Relaxed);
        self.rx_transfers.fetch_add(1, Ordering::Relaxed);
    }

    pub(crate) fn record_tx(&self, bytes: usize) {
        self.tx_bytes.fetch_add(bytes as u32, Ordering::Relaxed);
        self.tx_transfers.fetch_add(1, Ordering::Relaxed);
    }

    pub(crate) fn record_rx_stall(&self) {
        self.rx_stalls.fetch_add(1, Ordering::Relaxed);
    }

    pub(crate) fn record_tx_stall(&self) {
        self.tx_stalls.fetch_add(1, Ordering::Relaxed);
    }

    pub(crate) fn record_interrupt(&self) {
        self.interrupts_raised.fetch_add(1, Ordering::Relaxed);
    }

    pub(crate) fn record_isr_run(&self) {
        self.isr_runs.fetch_add(1, Ordering::Relaxed);
    }

    pub(crate) fn record_isr_deferred(&self) {
        self.isr_deferred.fetch_add(1, Ordering::Relaxed);
    }

    /// Copy every counter.
    pub fn snapshot(&self) -> CounterSnapshot {
        CounterSnapshot {
            rx_bytes: self.rx_bytes.load(Ordering::Relaxed),
            tx_bytes: self.tx_bytes.load(Ordering::Relaxed),
            rx_transfers: self.rx_transfers.load(Ordering::Relaxed),
            tx_transfers: self.tx_transfers.load(Ordering::Relaxed),
            rx_stalls: self.rx_stalls.load(Ordering::Relaxed),
            tx_stalls: self.tx_stalls.load(Ordering::Relaxed),
            interrupts_raised: self.interrupts_raised.load(Ordering::Relaxed),
            isr_runs: self.isr_runs.load(Ordering::Relaxed),
            isr_deferred: self.isr_deferred.load(Ordering::Relaxed),
        }
    }
}
