//! Hosted multicore platform.
//!
//! [`SimPlatform`] implements [`Platform`] on top of OS threads so the hub can
//! run and be tested off-target. Each logical core has:
//!
//! - the set of threads bound to it that currently hold it masked;
//!   interrupts are enabled only while that set is empty,
//! - a set of posted interrupt lines,
//! - an interrupt context that at most one thread occupies at a time.
//!
//! A thread is bound to a core with [`bind_current`] or by starting it with
//! [`spawn_on`]. Unbound threads run on core 0.
//!
//! Preemption is modelled at mask boundaries: mainline code that masks a core
//! waits for a running callback on that core to finish, and a callback waits
//! to enter while any mainline thread holds the core masked. Each thread
//! owns its own mask, so one thread restoring its mask never unmasks a core
//! another thread is still masking.

use std::cell::Cell;
use std::io;
use std::sync::Arc;
use std::thread::{self, JoinHandle, ThreadId};

use log::{error, trace};
use parking_lot::{Condvar, Mutex};

use super::{CoreId, InterruptMask, Platform};
use crate::constants::MAX_CORES;
use crate::error::{ProtocolError, SpawnError};

thread_local! {
    static CURRENT_CORE: Cell<CoreId> = const { Cell::new(CoreId(0)) };
    static IN_ISR: Cell<bool> = const { Cell::new(false) };
    static MAINLINE_CORE: Cell<CoreId> = const { Cell::new(CoreId(0)) };
}

/// Bind the calling thread to `core`.
pub fn bind_current(core: CoreId) {
    CURRENT_CORE.with(|c| c.set(core));
}

/// The core the calling thread runs on.
pub fn current_core() -> CoreId {
    CURRENT_CORE.with(|c| c.get())
}

/// Start a named thread bound to `core`.
pub fn spawn_on<F, T>(core: CoreId, name: &str, f: F) -> io::Result<JoinHandle<T>>
where
    F: FnOnce() -> T + Send + 'static,
    T: Send + 'static,
{
    thread::Builder::new()
        .name(format!("{name}@{core}"))
        .spawn(move || {
            bind_current(core);
            f()
        })
}

#[derive(Debug)]
struct CoreState {
    /// Mainline threads holding the core masked.
    maskers: Vec<ThreadId>,
    in_isr: bool,
    posted: u32,
}

struct SimCore {
    state: Mutex<CoreState>,
    changed: Condvar,
}

impl SimCore {
    fn new() -> Self {
        SimCore {
            state: Mutex::new(CoreState {
                maskers: Vec::new(),
                in_isr: false,
                posted: 0,
            }),
            changed: Condvar::new(),
        }
    }
}

/// Thread-backed implementation of [`Platform`].
pub struct SimPlatform {
    cores: Vec<SimCore>,
}

impl SimPlatform {
    /// Create a platform with `cores` logical cores, all with interrupts
    /// enabled.
    ///
    /// # Panics
    ///
    /// If `cores` is zero or larger than [`MAX_CORES`].
    pub fn new(cores: usize) -> Self {
        assert!(
            (1..=MAX_CORES).contains(&cores),
            "platform needs between 1 and {MAX_CORES} cores"
        );
        SimPlatform {
            cores: (0..cores).map(|_| SimCore::new()).collect(),
        }
    }

    fn core(&self, core: CoreId) -> &SimCore {
        match self.cores.get(core.index()) {
            Some(c) => c,
            None => panic!("{core} does not exist on a {}-core platform", self.cores.len()),
        }
    }

    /// Block until at least one line is posted on `core`, then take all
    /// posted lines.
    pub fn wait_posted(&self, core: CoreId) -> u32 {
        let c = self.core(core);
        let mut state = c.state.lock();
        while state.posted == 0 {
            c.changed.wait(&mut state);
        }
        std::mem::take(&mut state.posted)
    }

    /// Lines posted on `core` that have not been taken yet.
    pub fn posted(&self, core: CoreId) -> u32 {
        self.core(core).state.lock().posted
    }

    /// Start the interrupt-service thread of `core`.
    ///
    /// The thread takes posted lines and hands them to `service`, which runs
    /// with the calling thread bound to `core`. Refused entries are
    /// re-posted. Fails without starting anything if `core` does not exist.
    pub fn spawn_interrupt_core<F>(
        self: &Arc<Self>,
        core: CoreId,
        mut service: F,
    ) -> Result<JoinHandle<()>, SpawnError>
    where
        F: FnMut(CoreId, u32) -> Result<(), ProtocolError> + Send + 'static,
    {
        core.check(self.cores.len())?;
        let platform = Arc::clone(self);
        let handle = spawn_on(core, "irq", move || loop {
            let lines = platform.wait_posted(core);
            trace!("{core}: servicing lines {lines:#x}");
            if let Err(err) = service(core, lines) {
                error!("{core}: {err}, re-queueing lines {lines:#x}");
                platform.post(core, lines);
                thread::yield_now();
            }
        })?;
        Ok(handle)
    }
}

impl InterruptMask for SimPlatform {
    fn mask_get(&self) -> u32 {
        if IN_ISR.with(|f| f.get()) {
            return 0;
        }
        let me = thread::current().id();
        let state = self.core(current_core()).state.lock();
        u32::from(!state.maskers.contains(&me))
    }

    fn mask_all(&self) -> u32 {
        if IN_ISR.with(|f| f.get()) {
            return 0;
        }
        let me = thread::current().id();
        let c = self.core(current_core());
        let mut state = c.state.lock();
        if state.maskers.contains(&me) {
            return 0;
        }
        // A callback running on this core has preempted us: mainline code
        // cannot observe the core until it returns.
        while state.in_isr {
            c.changed.wait(&mut state);
        }
        state.maskers.push(me);
        1
    }

    fn unmask_all(&self) {
        let core = current_core();
        if IN_ISR.with(|f| f.get()) {
            panic!("interrupts unmasked from interrupt context on {core}");
        }
        let me = thread::current().id();
        let c = self.core(core);
        c.state.lock().maskers.retain(|t| *t != me);
        c.changed.notify_all();
    }

    fn isr_running(&self) -> bool {
        IN_ISR.with(|f| f.get())
    }
}

impl Platform for SimPlatform {
    fn core_count(&self) -> usize {
        self.cores.len()
    }

    fn post(&self, core: CoreId, lines: u32) {
        let c = self.core(core);
        c.state.lock().posted |= lines;
        c.changed.notify_all();
    }

    fn enter_isr(&self, core: CoreId) -> Result<(), ProtocolError> {
        if IN_ISR.with(|f| f.get()) {
            return Err(ProtocolError::Reentrant(current_core()));
        }
        let c = self.core(core);
        let mut state = c.state.lock();
        if state.in_isr {
            return Err(ProtocolError::Reentrant(core));
        }
        while !state.maskers.is_empty() {
            c.changed.wait(&mut state);
            if state.in_isr {
                return Err(ProtocolError::Reentrant(core));
            }
        }
        state.in_isr = true;
        drop(state);

        MAINLINE_CORE.with(|m| m.set(current_core()));
        bind_current(core);
        IN_ISR.with(|f| f.set(true));
        Ok(())
    }

    fn exit_isr(&self, core: CoreId) {
        IN_ISR.with(|f| f.set(false));
        bind_current(MAINLINE_CORE.with(|m| m.get()));

        let c = self.core(core);
        c.state.lock().in_isr = false;
        c.changed.notify_all();
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::ConfigError;
    use crate::irq::{critical_section, IsrScope};
    use std::sync::mpsc;
    use std::time::Duration;

    #[test]
    fn mask_all_returns_previous_state() {
        let p = SimPlatform::new(2);
        bind_current(CoreId(1));
        assert_eq!(p.mask_get(), 1);
        assert_eq!(p.mask_all(), 1);
        assert_eq!(p.mask_all(), 0);
        p.mask_set(1);
        assert_eq!(p.mask_get(), 1);
    }

    #[test]
    fn masks_are_per_core() {
        let p = SimPlatform::new(2);
        bind_current(CoreId(0));
        p.mask_all();
        bind_current(CoreId(1));
        assert_eq!(p.mask_get(), 1);
        bind_current(CoreId(0));
        assert_eq!(p.mask_get(), 0);
        p.unmask_all();
    }

    #[test]
    fn isr_scope_sets_context_and_core() {
        let p = SimPlatform::new(2);
        bind_current(CoreId(0));
        {
            let scope = IsrScope::enter(&p, CoreId(1)).unwrap();
            assert_eq!(scope.core(), CoreId(1));
            assert!(p.isr_running());
            assert_eq!(current_core(), CoreId(1));
            assert_eq!(p.mask_get(), 0);
            // Masking inside the interrupt context is a no-op save/restore.
            critical_section(&p, || {});
        }
        assert!(!p.isr_running());
        assert_eq!(current_core(), CoreId(0));
    }

    #[test]
    fn second_entry_is_refused() {
        let p = SimPlatform::new(1);
        let _scope = IsrScope::enter(&p, CoreId(0)).unwrap();
        assert_eq!(
            IsrScope::enter(&p, CoreId(0)).err(),
            Some(ProtocolError::Reentrant(CoreId(0)))
        );
    }

    #[test]
    #[should_panic(expected = "interrupts unmasked from interrupt context")]
    fn unmask_inside_isr_is_fatal() {
        let p = SimPlatform::new(1);
        let _scope = IsrScope::enter(&p, CoreId(0)).unwrap();
        p.unmask_all();
    }

    #[test]
    fn posted_lines_accumulate() {
        let p = SimPlatform::new(1);
        p.post(CoreId(0), 0b01);
        p.post(CoreId(0), 0b10);
        assert_eq!(p.posted(CoreId(0)), 0b11);
        assert_eq!(p.wait_posted(CoreId(0)), 0b11);
        assert_eq!(p.posted(CoreId(0)), 0);
    }

    #[test]
    fn interrupt_waits_for_unmask() {
        let p = Arc::new(SimPlatform::new(2));
        bind_current(CoreId(1));
        p.mask_all();

        let (tx, rx) = mpsc::channel();
        let p2 = Arc::clone(&p);
        let handle = spawn_on(CoreId(0), "isr", move || {
            let _scope = IsrScope::enter(&*p2, CoreId(1)).unwrap();
            tx.send(()).unwrap();
        })
        .unwrap();

        assert!(rx.recv_timeout(Duration::from_millis(100)).is_err());
        p.unmask_all();
        rx.recv_timeout(Duration::from_secs(5)).unwrap();
        handle.join().unwrap();
    }

    #[test]
    fn spawned_thread_is_bound() {
        let core = spawn_on(CoreId(3), "probe", current_core)
            .unwrap()
            .join()
            .unwrap();
        assert_eq!(core, CoreId(3));
    }

    #[test]
    fn overlapping_masks_on_one_core_keep_it_masked() {
        let p = Arc::new(SimPlatform::new(2));
        let (a_masked_tx, a_masked_rx) = mpsc::channel();
        let (a_restore_tx, a_restore_rx) = mpsc::channel::<()>();
        let (b_inside_tx, b_inside_rx) = mpsc::channel();
        let (b_leave_tx, b_leave_rx) = mpsc::channel::<()>();
        let (entered_tx, entered_rx) = mpsc::channel();

        let pa = Arc::clone(&p);
        let a = spawn_on(CoreId(1), "a", move || {
            let saved = pa.mask_all();
            a_masked_tx.send(()).unwrap();
            a_restore_rx.recv().unwrap();
            pa.mask_set(saved);
        })
        .unwrap();
        a_masked_rx.recv().unwrap();

        let pb = Arc::clone(&p);
        let b = spawn_on(CoreId(1), "b", move || {
            critical_section(&*pb, || {
                b_inside_tx.send(()).unwrap();
                b_leave_rx.recv().unwrap();
            });
        })
        .unwrap();
        b_inside_rx.recv().unwrap();

        a_restore_tx.send(()).unwrap();
        a.join().unwrap();

        let pi = Arc::clone(&p);
        let isr = spawn_on(CoreId(0), "isr", move || {
            let _scope = IsrScope::enter(&*pi, CoreId(1)).unwrap();
            entered_tx.send(()).unwrap();
        })
        .unwrap();

        assert!(
            entered_rx.recv_timeout(Duration::from_millis(100)).is_err(),
            "interrupt entered core1 inside another thread's critical section"
        );
        b_leave_tx.send(()).unwrap();
        b.join().unwrap();
        entered_rx.recv_timeout(Duration::from_secs(5)).unwrap();
        isr.join().unwrap();
    }

    #[test]
    fn mask_is_owned_per_thread() {
        let p = Arc::new(SimPlatform::new(1));
        assert_eq!(p.mask_all(), 1);
        let p2 = Arc::clone(&p);
        let other = spawn_on(CoreId(0), "other", move || p2.mask_get())
            .unwrap()
            .join()
            .unwrap();
        assert_eq!(other, 1);
        assert_eq!(p.mask_get(), 0);
        p.unmask_all();
        assert_eq!(p.mask_get(), 1);
    }

    #[test]
    fn interrupt_core_must_exist() {
        let p = Arc::new(SimPlatform::new(2));
        let err = p.spawn_interrupt_core(CoreId(5), |_, _| Ok(())).unwrap_err();
        assert!(matches!(
            err,
            SpawnError::Config(ConfigError::CoreOutOfRange {
                core: CoreId(5),
                cores: 2
            })
        ));
    }
}
