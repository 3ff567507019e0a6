use std::io;
use std::time::Duration;
use thiserror::Error;

use super::lifecycle::WorkerState;

/// Pipeline failures.
#[derive(Debug, Error)]
pub enum PipelineError {
    #[error("{queue} queue full for {timeout:?}")]
    OfferTimeout {
        queue: &'static str,
        timeout: Duration,
    },

    #[error("{queue} queue disconnected")]
    Disconnected { queue: &'static str },

    #[error("invalid worker transition {from:?} -> {to:?}")]
    InvalidTransition { from: WorkerState, to: WorkerState },

    #[error("datagram source failed")]
    Source(#[source] io::Error),

    #[error("failed to spawn {name} thread")]
    Spawn {
        name: &'static str,
        #[source]
        source: io::Error,
    },
}
