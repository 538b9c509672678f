//! Reduction maintenance: periodically snapshot the live state so restore
//! only replays a bounded log suffix.
//!
//! Due-ness is a monotonic wall-clock predicate ("last snapshot older than
//! the interval") kept under its own mutex, so concurrent ticks cannot store
//! redundant snapshots. Correctness never depends on the snapshot frequency.

use std::sync::{Arc, Mutex};
use std::thread::JoinHandle;
use std::time::{Duration, Instant};

use crossbeam::channel::{Sender, bounded};
use tracing::{debug, warn};

use crate::process::supervisor::PersistentProcess;

pub const DEFAULT_REDUCTION_INTERVAL: Duration = Duration::from_secs(600);

const TICK: Duration = Duration::from_secs(1);

pub struct ReductionMaintainer {
    interval: Duration,
    last_stored: Mutex<Option<Instant>>,
}

impl ReductionMaintainer {
    pub fn new(interval: Duration) -> Self {
        Self {
            interval,
            last_stored: Mutex::new(None),
        }
    }

    /// Claim a due snapshot slot. Returns `false` while the previous snapshot
    /// is younger than the interval; at most one caller per interval gets
    /// `true`.
    pub fn claim_due(&self, now: Instant) -> bool {
        let Ok(mut last) = self.last_stored.lock() else {
            return false;
        };
        let due = match *last {
            Some(stored_at) => now.duration_since(stored_at) >= self.interval,
            None => true,
        };
        if due {
            *last = Some(now);
        }
        due
    }
}

/// Handle for the background snapshot thread; dropping it stops the thread.
pub struct SnapshotHandle {
    shutdown: Sender<()>,
    thread: Option<JoinHandle<()>>,
}

impl SnapshotHandle {
    /// Run reduction maintenance for a process on a background thread.
    pub fn spawn(process: Arc<PersistentProcess>, interval: Duration) -> Self {
        let (shutdown, ticker) = bounded::<()>(1);
        let maintainer = ReductionMaintainer::new(interval);
        let thread = std::thread::spawn(move || {
            loop {
                match ticker.recv_timeout(TICK) {
                    Ok(()) | Err(crossbeam::channel::RecvTimeoutError::Disconnected) => return,
                    Err(crossbeam::channel::RecvTimeoutError::Timeout) => {}
                }
                if !maintainer.claim_due(Instant::now()) {
                    continue;
                }
                match process.store_reduction_record_for_current_state() {
                    Ok(reduction) => {
                        debug!(record = %reduction.reduced_composition_hash_base16, "snapshot stored")
                    }
                    Err(e) => warn!("snapshot skipped: {e}"),
                }
            }
        });
        Self {
            shutdown,
            thread: Some(thread),
        }
    }
}

impl Drop for SnapshotHandle {
    fn drop(&mut self) {
        let _ = self.shutdown.send(());
        if let Some(thread) = self.thread.take() {
            let _ = thread.join();
        }
    }
}
