//! Progress reporting and cooperative cancellation.
//!
//! Long operations report a phase label plus a counter against a known
//! total. All three live under one mutex so a reader never sees a counter
//! from one phase paired with another phase's label. When a sink is
//! attached, every change is also pushed as a [`ProgressEvent`]; the CLI
//! drains that channel on a printer thread.
//!
//! Cancellation is a shared flag polled by the engines at the top of each
//! unit of work. A cancelled operation returns a distinct error value.

use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::mpsc::Sender;
use std::sync::{Arc, Mutex, PoisonError};

pub const OPTIMIZING_BOUNDS: &str = "Optimizing bounds";
pub const CALCULATING_BOUNDS: &str = "Calculating bounds";
pub const DETECTING_ISSUES: &str = "Detecting issues";
pub const RESOLVING_RESIN_TRAPS: &str = "Resolving resin traps";
pub const DRAWINGS: &str = "Drawings";
pub const SAVING: &str = "Saving";

/// Shared cancellation flag. Clones observe the same flag.
#[derive(Debug, Clone, Default)]
pub struct CancellationToken(Arc<AtomicBool>);

impl CancellationToken {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn cancel(&self) {
        self.0.store(true, Ordering::Relaxed);
    }

    pub fn is_cancelled(&self) -> bool {
        self.0.load(Ordering::Relaxed)
    }
}

/// A progress change pushed to the sink.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ProgressEvent {
    pub phase: String,
    pub processed: u32,
    pub total: u32,
}

#[derive(Debug, Default)]
struct State {
    phase: String,
    processed: u32,
    total: u32,
    sink: Option<Sender<ProgressEvent>>,
}

impl State {
    fn event(&self) -> ProgressEvent {
        ProgressEvent {
            phase: self.phase.clone(),
            processed: self.processed,
            total: self.total,
        }
    }

    fn push(&self) {
        if let Some(sink) = &self.sink {
            // A dropped receiver only means nobody is watching
            let _ = sink.send(self.event());
        }
    }
}

/// Phase label, counter and total, plus the cancellation token.
#[derive(Debug, Default)]
pub struct Progress {
    state: Mutex<State>,
    token: CancellationToken,
}

impl Progress {
    pub fn new() -> Self {
        Self::default()
    }

    /// Push every change to `sink`.
    pub fn with_sink(self, sink: Sender<ProgressEvent>) -> Self {
        self.lock().sink = Some(sink);
        self
    }

    /// Observe an externally owned cancellation token.
    pub fn with_token(mut self, token: CancellationToken) -> Self {
        self.token = token;
        self
    }

    fn lock(&self) -> std::sync::MutexGuard<'_, State> {
        self.state.lock().unwrap_or_else(PoisonError::into_inner)
    }

    /// Start a new phase with the counter at zero.
    pub fn reset(&self, phase: &str, total: u32) {
        let mut state = self.lock();
        state.phase.clear();
        state.phase.push_str(phase);
        state.processed = 0;
        state.total = total;
        state.push();
    }

    /// Count one unit of work. Safe to call from any worker thread.
    pub fn lock_and_increment(&self) {
        let mut state = self.lock();
        state.processed = state.processed.saturating_add(1);
        state.push();
    }

    pub fn snapshot(&self) -> ProgressEvent {
        self.lock().event()
    }

    pub fn token(&self) -> &CancellationToken {
        &self.token
    }

    pub fn is_cancelled(&self) -> bool {
        self.token.is_cancelled()
    }
}
