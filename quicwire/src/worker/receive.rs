//! Receive worker: source -> ingress queue.

use crossbeam_channel::Sender;
use std::io;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::time::Duration;
use tracing::{debug, trace, warn};

use super::error::PipelineError;
use super::lifecycle::{WorkerLifecycle, WorkerState};
use super::{offer, settle};
use crate::netio::{Datagram, DatagramBufferPool, DatagramSource};

pub struct ReceiveWorker<S> {
    source: S,
    pool: DatagramBufferPool,
    ingress: Sender<Datagram>,
    offer_timeout: Duration,
    stop: Arc<AtomicBool>,
    /// Raised on exit so the parser knows no more fresh datagrams arrive.
    upstream_closed: Arc<AtomicBool>,
    lifecycle: WorkerLifecycle,
    next_sequence: u64,
}

impl<S: DatagramSource> ReceiveWorker<S> {
    pub fn new(
        source: S,
        pool: DatagramBufferPool,
        ingress: Sender<Datagram>,
        offer_timeout: Duration,
        stop: Arc<AtomicBool>,
        upstream_closed: Arc<AtomicBool>,
        lifecycle: WorkerLifecycle,
    ) -> Self {
        Self {
            source,
            pool,
            ingress,
            offer_timeout,
            stop,
            upstream_closed,
            lifecycle,
            next_sequence: 0,
        }
    }

    /// Run until the source ends, the stop flag is raised or a queue fails.
    pub fn run(mut self) -> WorkerState {
        if let Err(e) = self.lifecycle.transition(WorkerState::Active) {
            warn!(error = %e, "receive worker not started");
            self.upstream_closed.store(true, Ordering::Release);
            return self.lifecycle.state();
        }

        let outcome = settle(self.run_loop(), &self.stop);
        let state = self.lifecycle.finish(outcome);
        debug!(received = self.next_sequence, ?state, "Receive worker exiting");
        self.upstream_closed.store(true, Ordering::Release);
        state
    }

    fn run_loop(&mut self) -> Result<(), PipelineError> {
        let max_size = self.pool.datagram_size();

        loop {
            if self.stop.load(Ordering::Acquire) {
                return Ok(());
            }

            let mut buf = self.pool.acquire();
            let len = match self.source.recv(&mut buf) {
                Ok(Some(len)) => len,
                Ok(None) => {
                    self.pool.release(buf);
                    debug!("Datagram source exhausted");
                    return Ok(());
                }
                Err(e)
                    if matches!(
                        e.kind(),
                        io::ErrorKind::WouldBlock
                            | io::ErrorKind::TimedOut
                            | io::ErrorKind::Interrupted
                    ) =>
                {
                    self.pool.release(buf);
                    continue;
                }
                Err(e) => {
                    self.pool.release(buf);
                    return Err(PipelineError::Source(e));
                }
            };

            if len > max_size {
                warn!(len, max_size, "Dropping oversized datagram");
                self.pool.release(buf);
                continue;
            }

            let sequence = self.next_sequence;
            self.next_sequence += 1;
            let datagram = Datagram::new(buf.split().freeze(), sequence);
            self.pool.release(buf);

            trace!(sequence, len, "Datagram received");
            offer(&self.ingress, datagram, self.offer_timeout, "ingress")?;
        }
    }
}
