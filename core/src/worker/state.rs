//! Worker lifecycle state

use std::sync::atomic::{AtomicBool, AtomicU8, Ordering};

/// Lifecycle state of a request worker
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum WorkerState {
    /// Idle, no request in flight
    Waiting,
    /// Request in flight
    Working,
    /// Loop not running. Terminal until the worker is started again.
    Stopped,
}

impl WorkerState {
    fn to_u8(self) -> u8 {
        match self {
            WorkerState::Waiting => 0,
            WorkerState::Working => 1,
            WorkerState::Stopped => 2,
        }
    }

    fn from_u8(value: u8) -> Self {
        match value {
            0 => WorkerState::Waiting,
            1 => WorkerState::Working,
            _ => WorkerState::Stopped,
        }
    }
}

impl std::fmt::Display for WorkerState {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            WorkerState::Waiting => write!(f, "Waiting"),
            WorkerState::Working => write!(f, "Working"),
            WorkerState::Stopped => write!(f, "Stopped"),
        }
    }
}

/// State shared between a worker handle and its loop task
#[derive(Debug)]
pub(crate) struct SharedState {
    state: AtomicU8,
    stop_requested: AtomicBool,
    poisoned: AtomicBool,
}

impl SharedState {
    pub(crate) fn new() -> Self {
        Self {
            state: AtomicU8::new(WorkerState::Stopped.to_u8()),
            stop_requested: AtomicBool::new(false),
            poisoned: AtomicBool::new(false),
        }
    }

    pub(crate) fn get(&self) -> WorkerState {
        WorkerState::from_u8(self.state.load(Ordering::SeqCst))
    }

    pub(crate) fn set(&self, state: WorkerState) {
        self.state.store(state.to_u8(), Ordering::SeqCst);
    }

    /// Move between Waiting and Working unless the loop already stopped
    pub(crate) fn transition(&self, from: WorkerState, to: WorkerState) {
        let _ = self.state.compare_exchange(
            from.to_u8(),
            to.to_u8(),
            Ordering::SeqCst,
            Ordering::SeqCst,
        );
    }

    pub(crate) fn request_stop(&self) {
        self.stop_requested.store(true, Ordering::SeqCst);
    }

    pub(crate) fn clear_stop(&self) {
        self.stop_requested.store(false, Ordering::SeqCst);
    }

    pub(crate) fn stop_requested(&self) -> bool {
        self.stop_requested.load(Ordering::SeqCst)
    }

    pub(crate) fn poison(&self) {
        self.poisoned.store(true, Ordering::SeqCst);
    }

    pub(crate) fn is_poisoned(&self) -> bool {
        self.poisoned.load(Ordering::SeqCst)
    }
}
