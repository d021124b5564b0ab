//! Rendezvous lanes and the hub doorbell.
//!
//! A [`Lane`] is a synchronous, single-slot channel: the caller posts one
//! request and blocks until the server answers it. The server never blocks
//! on a lane. It inspects the posted request and either answers or leaves
//! it parked, to be looked at again on the next pass.
//!
//! Every lane change rings a shared [`Doorbell`]. The dispatch loop sleeps on
//! the doorbell, which gives one wait over all lanes of all peripherals.

use core::mem;
use core::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;

use parking_lot::{Condvar, Mutex};

/// Wake-up counter shared by all lanes feeding one dispatch loop.
pub(crate) struct Doorbell {
    seq: Mutex<u64>,
    rung: Condvar,
}

impl Doorbell {
    pub(crate) fn new() -> Self {
        Doorbell {
            seq: Mutex::new(0),
            rung: Condvar::new(),
        }
    }

    pub(crate) fn ring(&self) {
        *self.seq.lock() += 1;
        self.rung.notify_all();
    }

    /// Current sequence number. Read it *before* checking for work, then
    /// hand it to [`wait_past()`](Self::wait_past).
    pub(crate) fn seq(&self) -> u64 {
        *self.seq.lock()
    }

    /// Block until the bell has rung since `seen` was read.
    pub(crate) fn wait_past(&self, seen: u64) -> u64 {
        let mut seq = self.seq.lock();
        while *seq == seen {
            self.rung.wait(&mut seq);
        }
        *seq
    }
}

enum LaneState<Req, Resp> {
    Idle,
    Requested(Req),
    Answered(Resp),
}

/// Outcome of one [`Lane::serve`] pass.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub(crate) enum Service {
    /// Nothing was posted.
    Idle,
    /// A request is posted but could not be answered yet.
    Parked,
    /// A request was answered.
    Answered,
}

pub(crate) struct Lane<Req, Resp> {
    state: Mutex<LaneState<Req, Resp>>,
    changed: Condvar,
    bell: Arc<Doorbell>,
    /// Set when a caller collects its answer.
    completed: AtomicBool,
}

impl<Req, Resp> Lane<Req, Resp> {
    pub(crate) fn new(bell: Arc<Doorbell>) -> Self {
        Lane {
            state: Mutex::new(LaneState::Idle),
            changed: Condvar::new(),
            bell,
            completed: AtomicBool::new(false),
        }
    }

    /// Post `req` and block until it is answered.
    ///
    /// Concurrent callers queue up: the lane carries one request at a time.
    pub(crate) fn call(&self, req: Req) -> Resp {
        {
            let mut state = self.state.lock();
            while !matches!(*state, LaneState::Idle) {
                self.changed.wait(&mut state);
            }
            *state = LaneState::Requested(req);
        }
        self.changed.notify_all();
        self.bell.ring();

        let resp = {
            let mut state = self.state.lock();
            loop {
                match mem::replace(&mut *state, LaneState::Idle) {
                    LaneState::Answered(resp) => {
                        // Published under the lock, so a server that sees
                        // the next request also sees this collection.
                        self.completed.store(true, Ordering::Release);
                        break resp;
                    }
                    other => {
                        *state = other;
                        self.changed.wait(&mut state);
                    }
                }
            }
        };
        self.changed.notify_all();
        self.bell.ring();
        resp
    }

    /// Look at the posted request, if any. `f` answers it by returning
    /// `Some`, or parks it by returning `None`.
    pub(crate) fn serve(&self, f: impl FnOnce(&mut Req) -> Option<Resp>) -> Service {
        let mut state = self.state.lock();
        let LaneState::Requested(req) = &mut *state else {
            return Service::Idle;
        };
        match f(req) {
            Some(resp) => {
                *state = LaneState::Answered(resp);
                drop(state);
                self.changed.notify_all();
                Service::Answered
            }
            None => Service::Parked,
        }
    }

    /// Block until a request is posted, then answer it with `f`.
    pub(crate) fn serve_blocking(&self, f: impl FnOnce(&Req) -> Resp) {
        let mut state = self.state.lock();
        loop {
            if let LaneState::Requested(req) = &*state {
                let resp = f(req);
                *state = LaneState::Answered(resp);
                break;
            }
            self.changed.wait(&mut state);
        }
        drop(state);
        self.changed.notify_all();
    }

    /// `true` once after each collected answer.
    pub(crate) fn take_completed(&self) -> bool {
        self.completed.swap(false, Ordering::AcqRel)
    }

    #[cfg(test)]
    pub(crate) fn is_idle(&self) -> bool {
        matches!(*self.state.lock(), LaneState::Idle)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::mpsc;
    use std::thread;
    use std::time::Duration;

    #[test]
    fn serve_on_idle_lane() {
        let lane: Lane<u8, u8> = Lane::new(Arc::new(Doorbell::new()));
        assert_eq!(lane.serve(|_| Some(0)), Service::Idle);
        assert!(lane.is_idle());
    }

    #[test]
    fn call_is_answered() {
        let bell = Arc::new(Doorbell::new());
        let lane = Arc::new(Lane::<u32, u32>::new(Arc::clone(&bell)));

        let caller = {
            let lane = Arc::clone(&lane);
            thread::spawn(move || lane.call(20))
        };

        let mut seen = 0;
        loop {
            match lane.serve(|req| Some(*req + 1)) {
                Service::Answered => break,
                _ => seen = bell.wait_past(seen),
            }
        }
        assert_eq!(caller.join().unwrap(), 21);
        assert!(lane.take_completed());
        assert!(!lane.take_completed());
        assert!(lane.is_idle());
    }

    #[test]
    fn parked_request_keeps_caller_blocked() {
        let lane = Arc::new(Lane::<u8, u8>::new(Arc::new(Doorbell::new())));
        let (tx, rx) = mpsc::channel();
        {
            let lane = Arc::clone(&lane);
            thread::spawn(move || tx.send(lane.call(1)).unwrap());
        }
        while lane.is_idle() {
            thread::yield_now();
        }
        assert_eq!(lane.serve(|_| None), Service::Parked);
        assert!(rx.recv_timeout(Duration::from_millis(50)).is_err());

        assert_eq!(lane.serve(|req| Some(*req * 10)), Service::Answered);
        assert_eq!(rx.recv_timeout(Duration::from_secs(5)).unwrap(), 10);
    }

    #[test]
    fn serve_blocking_waits_for_request() {
        let lane = Arc::new(Lane::<u8, u8>::new(Arc::new(Doorbell::new())));
        let server = {
            let lane = Arc::clone(&lane);
            thread::spawn(move || lane.serve_blocking(|req| req + 1))
        };
        assert_eq!(lane.call(4), 5);
        server.join().unwrap();
    }

    #[test]
    fn doorbell_wakes_waiter() {
        let bell = Arc::new(Doorbell::new());
        let seen = bell.seq();
        let waiter = {
            let bell = Arc::clone(&bell);
            thread::spawn(move || bell.wait_past(seen))
        };
        bell.ring();
        assert!(waiter.join().unwrap() > seen);
    }
}
