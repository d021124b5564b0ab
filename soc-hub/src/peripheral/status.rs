//! Read-and-clear interrupt-status word.
//!
//! The hub ORs bits in on delivery; the application (or its callback) reads
//! and clears them. Every mutation happens inside an [`IrqMutex`], i.e. with
//! interrupts masked on the calling core *and* the word locked against other
//! cores.
//!
//! With `debug_assertions` or the `instrumented` feature, each mutation also
//! passes through a probe that panics if two mutations ever overlap. The
//! probe can only fire if the locking above is broken.

#[cfg(any(debug_assertions, feature = "instrumented"))]
use core::sync::atomic::{AtomicBool, Ordering};

use super::IrqStatus;
use crate::irq::{InterruptMask, IrqMutex};

/// Interrupt-status bitmap of one peripheral.
pub struct InterruptStatus {
    word: IrqMutex<u32>,
    #[cfg(any(debug_assertions, feature = "instrumented"))]
    probe: AtomicBool,
}

impl InterruptStatus {
    /// A cleared status word.
    pub const fn new() -> Self {
        InterruptStatus {
            word: IrqMutex::new(0),
            #[cfg(any(debug_assertions, feature = "instrumented"))]
            probe: AtomicBool::new(false),
        }
    }

    /// OR `bits` into the word. Returns the word after the update.
    pub fn raise<M: InterruptMask + ?Sized>(&self, mask: &M, bits: IrqStatus) -> IrqStatus {
        self.word.lock(mask, |word| {
            self.probed(|| {
                *word |= bits.bits();
                IrqStatus::from_bits_retain(*word)
            })
        })
    }

    /// Read and clear the word.
    pub fn take<M: InterruptMask + ?Sized>(&self, mask: &M) -> IrqStatus {
        self.word.lock(mask, |word| {
            self.probed(|| IrqStatus::from_bits_retain(core::mem::take(word)))
        })
    }

    /// Read the word without clearing it.
    pub fn peek<M: InterruptMask + ?Sized>(&self, mask: &M) -> IrqStatus {
        self.word.lock(mask, |word| IrqStatus::from_bits_retain(*word))
    }

    #[cfg(any(debug_assertions, feature = "instrumented"))]
    fn probed<R>(&self, f: impl FnOnce() -> R) -> R {
        if self.probe.swap(true, Ordering::AcqRel) {
            panic!("concurrent interrupt-status mutation");
        }
        let result = f();
        self.probe.store(false, Ordering::Release);
        result
    }

    #[cfg(not(any(debug_assertions, feature = "instrumented")))]
    #[inline(always)]
    fn probed<R>(&self, f: impl FnOnce() -> R) -> R {
        f()
    }
}

impl Default for InterruptStatus {
    fn default() -> Self {
        Self::new()
    }
}
