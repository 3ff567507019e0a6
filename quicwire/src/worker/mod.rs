//! Worker thread orchestration module.
//!
//! The receive path runs on two native OS threads joined by bounded queues:
//!
//! ```text
//! DatagramSource -> ReceiveWorker -> [ingress] -> ParsingWorker -> [egress] -> consumer
//!                                        ^               |
//!                                        └── re-queue ───┘  (keys missing)
//! ```
//!
//! - Producers block on a full queue for at most the configured offer
//!   timeout; a timeout moves the worker to `Error`
//! - A shared stop flag is checked on every loop iteration; stopping always
//!   ends in `Stopped`
//! - State changes are published on a listener channel

pub mod error;
pub mod lifecycle;
pub mod parse;
pub mod receive;


pub use error::PipelineError;
pub use lifecycle::{StateChange, WorkerKind, WorkerLifecycle, WorkerState};
pub use parse::{ParseSettings, ParseStats, ParsedPacket, ParsingWorker};
pub use receive::ReceiveWorker;

use crossbeam_channel::{bounded, unbounded, Receiver, SendTimeoutError, Sender};
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::thread::{self, JoinHandle};
use std::time::Duration;
use tracing::{debug, error, info};

use quicwire_core::packet::{ContextUpdate, EndpointContext};

use crate::config::AppConfig;
use crate::netio::{DatagramBufferPool, DatagramSource};

/// Offer `item` to a bounded queue, waiting at most `timeout`.
pub(crate) fn offer<T>(
    tx: &Sender<T>,
    item: T,
    timeout: Duration,
    queue: &'static str,
) -> Result<(), PipelineError> {
    tx.send_timeout(item, timeout).map_err(|e| match e {
        SendTimeoutError::Timeout(_) => PipelineError::OfferTimeout { queue, timeout },
        SendTimeoutError::Disconnected(_) => PipelineError::Disconnected { queue },
    })
}

/// A full queue during shutdown is part of stopping, not a failure.
pub(crate) fn settle(outcome: Result<(), PipelineError>, stop: &AtomicBool) -> Result<(), PipelineError> {
    match outcome {
        Err(PipelineError::OfferTimeout { .. }) if stop.load(Ordering::Acquire) => Ok(()),
        other => other,
    }
}

/// Terminal states of both workers.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct PipelineReport {
    pub receive: WorkerState,
    pub parse: WorkerState,
}

impl PipelineReport {
    pub fn is_clean(&self) -> bool {
        self.receive == WorkerState::Stopped && self.parse == WorkerState::Stopped
    }
}

/// Handle to a running receive pipeline.
pub struct Pipeline {
    packets: Receiver<ParsedPacket>,
    updates: Sender<ContextUpdate>,
    states: Receiver<StateChange>,
    pool: DatagramBufferPool,
    stop: Arc<AtomicBool>,
    receive: Option<JoinHandle<WorkerState>>,
    parse: Option<JoinHandle<WorkerState>>,
}

impl Pipeline {
    /// Spawn both workers with a parse context built from `config.wire`.
    pub fn spawn<S>(config: &AppConfig, source: S) -> Result<Self, PipelineError>
    where
        S: DatagramSource + 'static,
    {
        Self::spawn_with_context(config, config.wire.endpoint_context(), source)
    }

    /// Spawn both workers around an already prepared parse context.
    pub fn spawn_with_context<S>(
        config: &AppConfig,
        context: EndpointContext,
        source: S,
    ) -> Result<Self, PipelineError>
    where
        S: DatagramSource + 'static,
    {
        info!(
            side = ?config.wire.side,
            local_cid_len = config.wire.local_cid_len,
            ingress_capacity = config.pipeline.ingress_capacity,
            egress_capacity = config.pipeline.egress_capacity,
            max_retries = config.wire.max_retries,
            "Starting receive pipeline"
        );

        let (ingress_tx, ingress_rx) = bounded(config.pipeline.ingress_capacity);
        let (egress_tx, egress_rx) = bounded(config.pipeline.egress_capacity);
        let (updates_tx, updates_rx) = unbounded();
        let (states_tx, states_rx) = unbounded();

        let pool = DatagramBufferPool::new(&config.buffer_pool);
        let stop = Arc::new(AtomicBool::new(false));
        let upstream_closed = Arc::new(AtomicBool::new(false));

        let parser = ParsingWorker::new(
            context,
            ingress_rx,
            ingress_tx.clone(),
            egress_tx,
            updates_rx,
            ParseSettings {
                max_retries: config.wire.max_retries,
                retry_timeout: config.wire.retry_timeout(),
                offer_timeout: config.pipeline.offer_timeout(),
                poll_interval: config.pipeline.poll_interval(),
            },
            Arc::clone(&stop),
            Arc::clone(&upstream_closed),
            WorkerLifecycle::new(WorkerKind::Parse, Some(states_tx.clone())),
        );

        let receiver = ReceiveWorker::new(
            source,
            pool.clone(),
            ingress_tx,
            config.pipeline.offer_timeout(),
            Arc::clone(&stop),
            upstream_closed,
            WorkerLifecycle::new(WorkerKind::Receive, Some(states_tx)),
        );

        let parse = thread::Builder::new()
            .name("quicwire-parse".to_string())
            .spawn(move || parser.run())
            .map_err(|source| PipelineError::Spawn {
                name: "parse",
                source,
            })?;

        let receive = match thread::Builder::new()
            .name("quicwire-recv".to_string())
            .spawn(move || receiver.run())
        {
            Ok(handle) => handle,
            Err(source) => {
                stop.store(true, Ordering::Release);
                let _ = parse.join();
                return Err(PipelineError::Spawn {
                    name: "receive",
                    source,
                });
            }
        };

        Ok(Self {
            packets: egress_rx,
            updates: updates_tx,
            states: states_rx,
            pool,
            stop,
            receive: Some(receive),
            parse: Some(parse),
        })
    }

    /// Decoded packets, in datagram order.
    ///
    /// Iterating ends once the parsing worker has exited and the queue is
    /// drained.
    pub fn packets(&self) -> &Receiver<ParsedPacket> {
        &self.packets
    }

    /// Sender for key installs and discards, applied between datagrams.
    pub fn updates(&self) -> Sender<ContextUpdate> {
        self.updates.clone()
    }

    /// Worker state changes.
    pub fn states(&self) -> &Receiver<StateChange> {
        &self.states
    }

    pub fn buffer_pool(&self) -> &DatagramBufferPool {
        &self.pool
    }

    /// Signal both workers to stop and wait for them.
    pub fn shutdown(mut self) -> PipelineReport {
        info!("Shutting down receive pipeline");
        self.stop.store(true, Ordering::Release);
        self.join_workers()
    }

    /// Wait for both workers to finish on their own (source exhausted and
    /// queue drained, or a failure).
    pub fn join(mut self) -> PipelineReport {
        self.join_workers()
    }

    fn join_workers(&mut self) -> PipelineReport {
        let receive = join_worker(WorkerKind::Receive, self.receive.take());
        let parse = join_worker(WorkerKind::Parse, self.parse.take());
        let report = PipelineReport { receive, parse };
        info!(?report, "Receive pipeline stopped");
        report
    }
}

fn join_worker(kind: WorkerKind, handle: Option<JoinHandle<WorkerState>>) -> WorkerState {
    match handle.map(JoinHandle::join) {
        Some(Ok(state)) => {
            debug!(worker = %kind, ?state, "Worker thread exited");
            state
        }
        Some(Err(e)) => {
            error!(worker = %kind, error = ?e, "Worker thread panicked");
            WorkerState::Error
        }
        None => WorkerState::Stopped,
    }
}

impl Drop for Pipeline {
    fn drop(&mut self) {
        debug!("Pipeline dropped, signaling shutdown");
        self.stop.store(true, Ordering::Release);
        // threads are not joined here; call shutdown() or join() to wait
    }
}
