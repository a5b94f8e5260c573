//! Background garbage collector.
//!
//! A dedicated thread sweeps the pool at a fixed interval, releasing any
//! in-use block whose reference count has dropped to zero or below, and
//! compacts the pool on every Nth cycle. The sweep never removes table
//! entries; that is left to compaction.

use crate::config::GcConfig;
use rmem_core::MemoryPool;
use std::sync::Arc;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::mpsc::{self, RecvTimeoutError};
use std::thread::{self, JoinHandle};

/// Counters describing the collector's work so far.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct GcStats {
    /// Completed sweep cycles.
    pub cycles: u64,
    /// Blocks released by sweeps.
    pub released: u64,
    /// Compaction passes run.
    pub compactions: u64,
}

#[derive(Debug, Default)]
struct Counters {
    cycles: AtomicU64,
    released: AtomicU64,
    compactions: AtomicU64,
}

impl Counters {
    fn snapshot(&self) -> GcStats {
        GcStats {
            cycles: self.cycles.load(Ordering::Relaxed),
            released: self.released.load(Ordering::Relaxed),
            compactions: self.compactions.load(Ordering::Relaxed),
        }
    }
}

/// Handle to the running collector thread.
///
/// Dropping the handle stops the thread and waits for it to exit.
pub struct GarbageCollector {
    stop_tx: Option<mpsc::Sender<()>>,
    handle: Option<JoinHandle<()>>,
    counters: Arc<Counters>,
}

impl GarbageCollector {
    /// Start collecting on a new thread.
    pub fn start(pool: Arc<MemoryPool>, config: GcConfig) -> std::io::Result<Self> {
        let (stop_tx, stop_rx) = mpsc::channel();
        let counters = Arc::new(Counters::default());
        let thread_counters = Arc::clone(&counters);

        let handle = thread::Builder::new()
            .name("rmem-gc".to_string())
            .spawn(move || run_loop(&pool, config, &stop_rx, &thread_counters))?;

        tracing::info!(
            interval_ms = config.interval.as_millis() as u64,
            compact_every = config.compact_every,
            "Garbage collector started"
        );

        Ok(Self {
            stop_tx: Some(stop_tx),
            handle: Some(handle),
            counters,
        })
    }

    /// Counters so far.
    pub fn stats(&self) -> GcStats {
        self.counters.snapshot()
    }

    /// Whether the collector thread is still running.
    pub fn is_running(&self) -> bool {
        self.handle.as_ref().is_some_and(|h| !h.is_finished())
    }

    /// Stop the thread and wait for the current cycle to finish.
    pub fn stop(&mut self) {
        // Dropping the sender wakes the thread out of its wait.
        self.stop_tx.take();

        if let Some(handle) = self.handle.take() {
            if handle.join().is_err() {
                tracing::error!("Garbage collector thread panicked");
            } else {
                tracing::info!("Garbage collector stopped");
            }
        }
    }
}

impl Drop for GarbageCollector {
    fn drop(&mut self) {
        self.stop();
    }
}

fn run_loop(pool: &MemoryPool, config: GcConfig, stop_rx: &mpsc::Receiver<()>, counters: &Counters) {
    let mut cycle: u64 = 0;

    loop {
        cycle += 1;
        run_cycle(pool, cycle, config.compact_every, counters);

        match stop_rx.recv_timeout(config.interval) {
            Err(RecvTimeoutError::Timeout) => continue,
            Ok(()) | Err(RecvTimeoutError::Disconnected) => break,
        }
    }
}

fn run_cycle(pool: &MemoryPool, cycle: u64, compact_every: u32, counters: &Counters) {
    let released = pool.mark_unreferenced();
    if released > 0 {
        tracing::debug!(released, cycle, "Sweep released unreferenced blocks");
        counters.released.fetch_add(released as u64, Ordering::Relaxed);
    }

    if cycle % u64::from(compact_every.max(1)) == 0 {
        let result = pool.compact();
        counters.compactions.fetch_add(1, Ordering::Relaxed);
        if result.removed > 0 {
            tracing::debug!(
                removed = result.removed,
                bytes_reclaimed = result.bytes_reclaimed,
                "Periodic compaction reclaimed blocks"
            );
        }
    }

    counters.cycles.fetch_add(1, Ordering::Relaxed);
}
