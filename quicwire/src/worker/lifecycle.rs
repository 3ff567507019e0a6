//! Worker lifecycle state machine.
//!
//! ```text
//! New ──> Active ──> Stopped
//!  │        │
//!  │        └──────> Error
//!  └──> Stopped / Error
//! ```
//!
//! `Stopped` and `Error` are terminal. Every transition goes through
//! [`WorkerLifecycle::transition`] and is published to the listener
//! registered at construction.

use crossbeam_channel::Sender;
use tracing::{error, info};

use super::error::PipelineError;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum WorkerState {
    New,
    Active,
    /// Terminal: the worker failed (queue offer timeout, source failure).
    Error,
    /// Terminal: clean stop (shutdown, exhausted source, hung-up peer).
    Stopped,
}

impl WorkerState {
    pub fn is_terminal(self) -> bool {
        matches!(self, WorkerState::Error | WorkerState::Stopped)
    }

    pub fn can_transition_to(self, next: WorkerState) -> bool {
        use WorkerState::*;
        matches!(
            (self, next),
            (New, Active) | (New, Error) | (New, Stopped) | (Active, Error) | (Active, Stopped)
        )
    }
}

/// Which worker a state change belongs to.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum WorkerKind {
    Receive,
    Parse,
}

impl std::fmt::Display for WorkerKind {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            WorkerKind::Receive => write!(f, "receive"),
            WorkerKind::Parse => write!(f, "parse"),
        }
    }
}

/// Published on every transition.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct StateChange {
    pub worker: WorkerKind,
    pub from: WorkerState,
    pub to: WorkerState,
}

#[derive(Debug)]
pub struct WorkerLifecycle {
    worker: WorkerKind,
    state: WorkerState,
    listener: Option<Sender<StateChange>>,
}

impl WorkerLifecycle {
    pub fn new(worker: WorkerKind, listener: Option<Sender<StateChange>>) -> Self {
        Self {
            worker,
            state: WorkerState::New,
            listener,
        }
    }

    pub fn state(&self) -> WorkerState {
        self.state
    }

    pub fn worker(&self) -> WorkerKind {
        self.worker
    }

    pub fn transition(&mut self, to: WorkerState) -> Result<(), PipelineError> {
        let from = self.state;
        if !from.can_transition_to(to) {
            return Err(PipelineError::InvalidTransition { from, to });
        }
        self.state = to;

        match to {
            WorkerState::Error => error!(worker = %self.worker, ?from, "Worker failed"),
            _ => info!(worker = %self.worker, ?from, ?to, "Worker state changed"),
        }

        if let Some(listener) = &self.listener {
            // a dropped listener only means nobody is watching
            let _ = listener.send(StateChange {
                worker: self.worker,
                from,
                to,
            });
        }
        Ok(())
    }

    /// Move to a terminal state according to how the worker loop ended.
    ///
    /// Disconnected queues count as a clean stop.
    pub(crate) fn finish(&mut self, outcome: Result<(), PipelineError>) -> WorkerState {
        let target = match outcome {
            Ok(()) | Err(PipelineError::Disconnected { .. }) => WorkerState::Stopped,
            Err(e) => {
                error!(worker = %self.worker, error = %e, "Worker loop ended with error");
                WorkerState::Error
            }
        };
        if self.transition(target).is_err() {
            // already terminal
            return self.state;
        }
        target
    }
}
