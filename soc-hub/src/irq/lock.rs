//! Interrupt-safe spin lock.
//!
//! [`IrqMutex`] masks interrupts on the calling core *before* spinning on the
//! lock, and restores the mask after releasing it. Masking alone only
//! excludes the local interrupt context; the spin lock excludes other cores.
//! Taking both in that order means an interrupt callback can never spin on a
//! lock held by the mainline code it preempted.

use core::sync::atomic::{AtomicU32, Ordering};

use super::{critical_section, InterruptMask};

/// Spin lock whose critical sections also run with local interrupts masked.
pub struct IrqMutex<T> {
    inner: spin::Mutex<T>,
    /// Number of acquisitions that found the lock already held.
    contended: AtomicU32,
}

impl<T> IrqMutex<T> {
    /// Create a new unlocked mutex.
    pub const fn new(value: T) -> Self {
        IrqMutex {
            inner: spin::Mutex::new(value),
            contended: AtomicU32::new(0),
        }
    }

    /// Run `f` with exclusive access to the protected value.
    ///
    /// Keep `f` short: other cores spin while it runs.
    pub fn lock<M, R>(&self, mask: &M, f: impl FnOnce(&mut T) -> R) -> R
    where
        M: InterruptMask + ?Sized,
    {
        critical_section(mask, || {
            let mut guard = match self.inner.try_lock() {
                Some(guard) => guard,
                None => {
                    self.contended.fetch_add(1, Ordering::Relaxed);
                    self.inner.lock()
                }
            };
            f(&mut guard)
        })
    }

    /// How many acquisitions had to spin.
    pub fn contended(&self) -> u32 {
        self.contended.load(Ordering::Relaxed)
    }

    /// Exclusive access without locking, for the owner during startup.
    pub fn get_mut(&mut self) -> &mut T {
        self.inner.get_mut()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::irq::testing::FlagMask;

    #[test]
    fn lock_runs_masked() {
        let mask = FlagMask::new();
        let m = IrqMutex::new(5u32);
        let seen = m.lock(&mask, |v| {
            *v += 1;
            mask.mask_get()
        });
        assert_eq!(seen, 0, "interrupts must be masked inside the lock");
        assert_ne!(mask.mask_get(), 0, "mask restored afterwards");
        assert_eq!(m.lock(&mask, |v| *v), 6);
    }

    #[test]
    fn lock_from_isr_does_not_unmask() {
        let mask = FlagMask::new();
        mask.mask_all();
        mask.in_isr.store(true, Ordering::Release);
        let m = IrqMutex::new(());
        m.lock(&mask, |_| {});
        assert_eq!(mask.mask_get(), 0);
        assert_eq!(mask.unmask_calls.load(Ordering::Relaxed), 0);
    }

    #[test]
    fn get_mut_bypasses_lock() {
        let mut m = IrqMutex::new([0u8; 4]);
        m.get_mut()[2] = 9;
        let mask = FlagMask::new();
        assert_eq!(m.lock(&mask, |v| v[2]), 9);
        assert_eq!(m.contended(), 0);
    }
}
