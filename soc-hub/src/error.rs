//! Error types.
//!
//! Only startup and protocol failures are errors. Absence of data on the
//! DMA path is reported structurally (a zero length or a "not ready"
//! indication) and never surfaces here.

use thiserror::Error;

use crate::irq::CoreId;

/// Startup wiring mistakes. None of these are recoverable at runtime: the
/// peripheral set is fixed at build time, so the board bring-up code is
/// expected to halt on any of them.
#[derive(Debug, Error, Clone, Copy, PartialEq, Eq)]
pub enum ConfigError {
    /// More peripherals were registered than the table holds.
    #[error("peripheral table exhausted ({capacity} entries)")]
    TableExhausted { capacity: usize },
    /// The handle does not name a registered peripheral.
    #[error("peripheral {0} is not registered")]
    UnknownPeripheral(u8),
    /// The requested delivery core does not exist on this platform.
    #[error("{core} out of range, platform has {cores} cores")]
    CoreOutOfRange { core: CoreId, cores: usize },
}

/// Failure to start a hub or interrupt-service thread.
#[cfg(feature = "std")]
#[derive(Debug, Error)]
pub enum SpawnError {
    /// The thread was asked to run on a core that does not exist.
    #[error(transparent)]
    Config(#[from] ConfigError),
    /// The OS refused to create the thread.
    #[error("thread spawn failed: {0}")]
    Io(#[from] std::io::Error),
}

/// Violations of the interrupt-context discipline that are caught at runtime.
#[derive(Debug, Error, Clone, Copy, PartialEq, Eq)]
pub enum ProtocolError {
    /// Interrupt entry was attempted while the core's interrupt context was
    /// already occupied.
    #[error("re-entrant interrupt entry on {0}")]
    Reentrant(CoreId),
    /// A rendezvous or blocking wait was attempted from interrupt context.
    #[error("blocking call from interrupt context")]
    BlockingInIsr,
}
