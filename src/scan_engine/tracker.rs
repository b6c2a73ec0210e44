// Shared scan progress state. The running flag is the single-scan gate;
// everything else lives behind one mutex and is read via snapshots.

use crate::models::{LastResults, ScanLogEntry, ScanStatus};
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, Mutex};
use std::time::Instant;

const LOG_CAPACITY: usize = 100;

#[derive(Default)]
struct TrackerState {
    scanned: u64,
    total: u64,
    started_at: Option<Instant>,
    logs: Vec<ScanLogEntry>,
    last_results: LastResults,
}

#[derive(Clone)]
pub struct ScanTracker {
    running: Arc<AtomicBool>,
    stop_requested: Arc<AtomicBool>,
    state: Arc<Mutex<TrackerState>>,
}

impl Default for ScanTracker {
    fn default() -> Self {
        Self::new()
    }
}

impl ScanTracker {
    pub fn new() -> Self {
        Self {
            running: Arc::new(AtomicBool::new(false)),
            stop_requested: Arc::new(AtomicBool::new(false)),
            state: Arc::new(Mutex::new(TrackerState::default())),
        }
    }

    /// Claims the scan gate. Exactly one caller wins until finish().
    pub fn try_begin(&self) -> bool {
        if self
            .running
            .compare_exchange(false, true, Ordering::SeqCst, Ordering::SeqCst)
            .is_err()
        {
            return false;
        }
        self.stop_requested.store(false, Ordering::SeqCst);
        let mut state = self.state.lock().unwrap();
        state.scanned = 0;
        state.total = 0;
        state.started_at = Some(Instant::now());
        state.logs.clear();
        true
    }

    /// Releases the gate. running transitions to false exactly once per scan.
    pub fn finish(&self) {
        self.running.store(false, Ordering::SeqCst);
        self.stop_requested.store(false, Ordering::SeqCst);
    }

    pub fn is_running(&self) -> bool {
        self.running.load(Ordering::SeqCst)
    }

    pub fn request_stop(&self) {
        self.stop_requested.store(true, Ordering::SeqCst);
    }

    pub fn stop_requested(&self) -> bool {
        self.stop_requested.load(Ordering::SeqCst)
    }

    pub fn set_total(&self, total: u64) {
        self.state.lock().unwrap().total = total;
    }

    pub fn host_done(&self) {
        self.state.lock().unwrap().scanned += 1;
    }

    pub fn record_results(&self, added: u64, updated: u64) {
        let mut state = self.state.lock().unwrap();
        state.last_results = LastResults {
            added,
            updated,
            total_found: state.total,
        };
    }

    /// Appends a log line, keeping only the newest entries.
    pub fn log(&self, msg: &str) {
        let entry = ScanLogEntry {
            msg: msg.to_string(),
            time: chrono::Local::now().format("%H:%M:%S").to_string(),
        };
        let mut state = self.state.lock().unwrap();
        state.logs.push(entry);
        if state.logs.len() > LOG_CAPACITY {
            let excess = state.logs.len() - LOG_CAPACITY;
            state.logs.drain(..excess);
        }
    }

    pub fn snapshot(&self) -> ScanStatus {
        let state = self.state.lock().unwrap();
        ScanStatus {
            running: self.is_running(),
            scanned: state.scanned,
            total: state.total,
            etr: estimate_remaining(&state, self.is_running()),
            logs: state.logs.clone(),
            last_results: state.last_results,
        }
    }
}

/// Linear extrapolation from per-host throughput so far.
fn estimate_remaining(state: &TrackerState, running: bool) -> String {
    if !running || state.total == 0 {
        return "--".to_string();
    }
    let Some(started_at) = state.started_at else {
        return "--".to_string();
    };
    if state.scanned == 0 {
        return "calculating".to_string();
    }
    let elapsed = started_at.elapsed().as_secs_f64();
    let per_host = elapsed / state.scanned as f64;
    let remaining = (per_host * state.total.saturating_sub(state.scanned) as f64) as u64;
    format!("{}m {:02}s", remaining / 60, remaining % 60)
}
