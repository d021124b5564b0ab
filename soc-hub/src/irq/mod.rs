//! Interrupt masking and interrupt-context discipline.
//!
//! The hub never touches a status register directly. Everything it needs
//! from the hardware is expressed by two capability traits:
//!
//! - [`InterruptMask`]: get/set/mask/unmask of the *calling* core's
//!   interrupt enable, plus "am I running in interrupt context?".
//! - [`Platform`]: the number of cores, raising interrupt lines on a core,
//!   and entering/leaving the core's interrupt context.
//!
//! ## Rules
//!
//! - A mask value of zero means interrupts are disabled, anything else means
//!   enabled. [`InterruptMask::mask_set`] only ever *unmasks*; restoring a
//!   zero mask is a no-op, so nested critical sections compose.
//! - The interrupt context of a core is **not re-entrant**. A callback must
//!   never unmask interrupts and must never block. [`IsrScope`] refuses a
//!   second entry on the same core with [`ProtocolError::Reentrant`].
//!
//! ```ignore
//! let saved = mask.mask_all();
//! // ... touch state shared with the interrupt callback ...
//! mask.mask_set(saved);
//! ```

pub mod lock;

#[cfg(feature = "std")]
pub mod sim;

use core::fmt;

use crate::error::{ConfigError, ProtocolError};

pub use lock::IrqMutex;

/// Identity of a logical execution core.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Default)]
pub struct CoreId(pub u8);

impl CoreId {
    /// Index of the core, for table lookups.
    pub const fn index(self) -> usize {
        self.0 as usize
    }

    /// Fail unless this core exists on a platform with `cores` cores.
    pub fn check(self, cores: usize) -> Result<Self, ConfigError> {
        if self.index() < cores {
            Ok(self)
        } else {
            Err(ConfigError::CoreOutOfRange { core: self, cores })
        }
    }
}

impl fmt::Display for CoreId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "core{}", self.0)
    }
}

/// Interrupt-enable state of the calling core.
///
/// Implementations must make every method atomic with respect to the
/// interrupts of the calling core.
pub trait InterruptMask {
    /// Current mask. Non-zero means interrupts are enabled.
    fn mask_get(&self) -> u32;

    /// Disable interrupts on the calling core and return the previous mask.
    fn mask_all(&self) -> u32;

    /// Enable interrupts on the calling core.
    ///
    /// Calling this from interrupt context is a protocol violation.
    fn unmask_all(&self);

    /// Restore a mask previously returned by [`mask_all()`](Self::mask_all).
    fn mask_set(&self, mask: u32) {
        if mask != 0 {
            self.unmask_all();
        }
    }

    /// `true` while the calling code runs as an interrupt callback.
    fn isr_running(&self) -> bool;
}

impl<T: InterruptMask + ?Sized> InterruptMask for &T {
    fn mask_get(&self) -> u32 {
        (**self).mask_get()
    }

    fn mask_all(&self) -> u32 {
        (**self).mask_all()
    }

    fn unmask_all(&self) {
        (**self).unmask_all()
    }

    fn mask_set(&self, mask: u32) {
        (**self).mask_set(mask)
    }

    fn isr_running(&self) -> bool {
        (**self).isr_running()
    }
}

/// Per-core interrupt plumbing used by the dispatcher.
pub trait Platform: InterruptMask + Send + Sync {
    /// Number of logical cores.
    fn core_count(&self) -> usize;

    /// Raise interrupt `lines` (one bit per peripheral) on `core`.
    ///
    /// Lines stay pending until the core enters interrupt context to
    /// service them.
    fn post(&self, core: CoreId, lines: u32);

    /// Enter the interrupt context of `core` on the calling thread.
    ///
    /// Waits while the core has interrupts masked by mainline code.
    /// Fails if the interrupt context of `core` is already occupied.
    fn enter_isr(&self, core: CoreId) -> Result<(), ProtocolError>;

    /// Leave the interrupt context entered by [`enter_isr()`](Self::enter_isr).
    fn exit_isr(&self, core: CoreId);
}

/// Run `f` with interrupts masked on the calling core, then restore the
/// previous mask.
///
/// Safe to nest and safe to call from interrupt context (where interrupts
/// are already masked and the restore is a no-op).
pub fn critical_section<M, R>(mask: &M, f: impl FnOnce() -> R) -> R
where
    M: InterruptMask + ?Sized,
{
    let saved = mask.mask_all();
    let result = f();
    mask.mask_set(saved);
    result
}

/// RAII interrupt-permitting entry: the holder runs in the interrupt context
/// of one core until the scope is dropped.
pub struct IsrScope<'a, P: Platform + ?Sized> {
    platform: &'a P,
    core: CoreId,
}

impl<'a, P: Platform + ?Sized> IsrScope<'a, P> {
    /// Enter the interrupt context of `core`.
    pub fn enter(platform: &'a P, core: CoreId) -> Result<Self, ProtocolError> {
        platform.enter_isr(core)?;
        Ok(IsrScope { platform, core })
    }

    /// The core whose interrupt context is held.
    pub fn core(&self) -> CoreId {
        self.core
    }
}

impl<P: Platform + ?Sized> Drop for IsrScope<'_, P> {
    fn drop(&mut self) {
        self.platform.exit_isr(self.core);
    }
}

#[cfg(test)]
pub(crate) mod testing {
    use core::sync::atomic::{AtomicBool, AtomicU32, Ordering};

    use super::InterruptMask;

    /// Single-core mask that only records state. No preemption happens.
    pub struct FlagMask {
        pub enabled: AtomicU32,
        pub in_isr: AtomicBool,
        pub unmask_calls: AtomicU32,
    }

    impl FlagMask {
        pub const fn new() -> Self {
            FlagMask {
                enabled: AtomicU32::new(1),
                in_isr: AtomicBool::new(false),
                unmask_calls: AtomicU32::new(0),
            }
        }
    }

    impl InterruptMask for FlagMask {
        fn mask_get(&self) -> u32 {
            self.enabled.load(Ordering::Acquire)
        }

        fn mask_all(&self) -> u32 {
            self.enabled.swap(0, Ordering::AcqRel)
        }

        fn unmask_all(&self) {
            self.unmask_calls.fetch_add(1, Ordering::Relaxed);
            self.enabled.store(1, Ordering::Release);
        }

        fn isr_running(&self) -> bool {
            self.in_isr.load(Ordering::Acquire)
        }
    }
}
