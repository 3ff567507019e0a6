//! Parsing worker: ingress queue -> decoder -> egress queue.
//!
//! The worker owns the [`EndpointContext`]. Key installs and discards
//! arrive as [`ContextUpdate`]s on a control channel and are applied
//! between datagrams, never while one is being decoded.
//!
//! Missing keys are the only retry path: the whole datagram goes back on
//! the ingress queue and is decoded again from its first byte, after
//! waiting up to one poll interval for a context update. Packets
//! decoded before the failing one are withheld meanwhile, and released
//! only when the datagram is finally given up.

use crossbeam_channel::{Receiver, RecvTimeoutError, Sender};
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::time::{Duration, Instant};
use tracing::{debug, trace, warn};

use quicwire_core::error::ParseError;
use quicwire_core::packet::{decode_datagram, ContextUpdate, DatagramOutcome, EndpointContext, Packet};

use super::error::PipelineError;
use super::lifecycle::{WorkerLifecycle, WorkerState};
use super::{offer, settle};
use crate::netio::Datagram;

/// A decoded packet and the datagram it came from.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ParsedPacket {
    pub datagram_sequence: u64,
    pub received_at: Instant,
    pub packet: Packet,
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct ParseStats {
    pub datagrams: u64,
    pub packets: u64,
    pub requeued: u64,
    /// Datagrams that lost at least one packet.
    pub dropped: u64,
}

/// Retry policy and queue timing for the parser.
#[derive(Debug, Clone, Copy)]
pub struct ParseSettings {
    pub max_retries: u8,
    pub retry_timeout: Duration,
    pub offer_timeout: Duration,
    pub poll_interval: Duration,
}

pub struct ParsingWorker {
    context: EndpointContext,
    ingress: Receiver<Datagram>,
    requeue: Sender<Datagram>,
    egress: Sender<ParsedPacket>,
    updates: Receiver<ContextUpdate>,
    settings: ParseSettings,
    stop: Arc<AtomicBool>,
    upstream_closed: Arc<AtomicBool>,
    lifecycle: WorkerLifecycle,
    stats: ParseStats,
}

impl ParsingWorker {
    /// `requeue` must feed the same queue `ingress` drains.
    #[allow(clippy::too_many_arguments)]
    pub fn new(
        context: EndpointContext,
        ingress: Receiver<Datagram>,
        requeue: Sender<Datagram>,
        egress: Sender<ParsedPacket>,
        updates: Receiver<ContextUpdate>,
        settings: ParseSettings,
        stop: Arc<AtomicBool>,
        upstream_closed: Arc<AtomicBool>,
        lifecycle: WorkerLifecycle,
    ) -> Self {
        Self {
            context,
            ingress,
            requeue,
            egress,
            updates,
            settings,
            stop,
            upstream_closed,
            lifecycle,
            stats: ParseStats::default(),
        }
    }

    pub fn stats(&self) -> ParseStats {
        self.stats
    }

    pub fn context(&self) -> &EndpointContext {
        &self.context
    }

    /// Run until shutdown, upstream end, or an egress failure.
    pub fn run(mut self) -> WorkerState {
        if let Err(e) = self.lifecycle.transition(WorkerState::Active) {
            warn!(error = %e, "parsing worker not started");
            return self.lifecycle.state();
        }

        let outcome = settle(self.run_loop(), &self.stop);
        let state = self.lifecycle.finish(outcome);
        debug!(stats = ?self.stats, ?state, "Parsing worker exiting");
        state
    }

    fn run_loop(&mut self) -> Result<(), PipelineError> {
        loop {
            if self.stop.load(Ordering::Acquire) {
                return Ok(());
            }

            match self.ingress.recv_timeout(self.settings.poll_interval) {
                Ok(datagram) => self.handle_datagram(datagram)?,
                Err(RecvTimeoutError::Timeout) => {
                    if self.upstream_closed.load(Ordering::Acquire) && self.ingress.is_empty() {
                        debug!("Ingress drained after upstream closed");
                        return Ok(());
                    }
                }
                Err(RecvTimeoutError::Disconnected) => return Ok(()),
            }
        }
    }

    /// Apply every pending context update.
    pub fn apply_updates(&mut self) {
        for update in self.updates.try_iter() {
            self.context.apply(update);
        }
    }

    /// Block up to `poll_interval` for a context update, then apply the
    /// rest of what is pending.
    fn wait_for_update(&mut self) {
        match self.updates.recv_timeout(self.settings.poll_interval) {
            Ok(update) => {
                self.context.apply(update);
                self.apply_updates();
            }
            Err(RecvTimeoutError::Timeout) | Err(RecvTimeoutError::Disconnected) => {}
        }
    }

    /// Decode one datagram and forward its packets.
    pub fn handle_datagram(&mut self, datagram: Datagram) -> Result<(), PipelineError> {
        // a re-queued datagram only decodes differently once keys change
        if datagram.retries > 0 && self.updates.is_empty() {
            self.wait_for_update();
        } else {
            self.apply_updates();
        }
        self.stats.datagrams += 1;

        let packets = match decode_datagram(datagram.data.clone(), &self.context) {
            DatagramOutcome::Complete(packets) => packets,
            DatagramOutcome::KeysUnavailable { parsed, error } => {
                if self.requeue(&datagram, &error) {
                    return Ok(());
                }
                self.stats.dropped += 1;
                parsed
            }
            DatagramOutcome::Dropped { parsed, error } => {
                debug!(
                    sequence = datagram.sequence,
                    kept = parsed.len(),
                    packet_index = error.packet_index,
                    offset = error.offset,
                    error = %error.error,
                    "Dropping rest of datagram"
                );
                self.stats.dropped += 1;
                parsed
            }
        };

        self.emit(&datagram, packets)
    }

    /// Put the datagram back for another attempt. `false` means give up.
    fn requeue(&mut self, datagram: &Datagram, error: &ParseError) -> bool {
        if datagram.retries >= self.settings.max_retries {
            warn!(
                sequence = datagram.sequence,
                retries = datagram.retries,
                packet_index = error.packet_index,
                error = %error.error,
                "Keys still unavailable, giving up on datagram"
            );
            return false;
        }

        match self
            .requeue
            .send_timeout(datagram.clone().retried(), self.settings.retry_timeout)
        {
            Ok(()) => {
                self.stats.requeued += 1;
                trace!(
                    sequence = datagram.sequence,
                    retries = datagram.retries + 1,
                    error = %error.error,
                    "Datagram re-queued waiting for keys"
                );
                true
            }
            Err(_) => {
                debug!(
                    sequence = datagram.sequence,
                    "Ingress queue full, dropping datagram waiting for keys"
                );
                false
            }
        }
    }

    fn emit(&mut self, datagram: &Datagram, packets: Vec<Packet>) -> Result<(), PipelineError> {
        for packet in packets {
            trace!(
                sequence = datagram.sequence,
                packet_type = ?packet.packet_type(),
                packet_number = ?packet.packet_number(),
                frames = packet.frames().len(),
                "Packet decoded"
            );

            if let (Some(space), Some(pn)) = (packet.space(), packet.packet_number()) {
                self.context.record_packet(packet.dcid(), space, pn);
            }

            self.stats.packets += 1;
            offer(
                &self.egress,
                ParsedPacket {
                    datagram_sequence: datagram.sequence,
                    received_at: datagram.received_at,
                    packet,
                },
                self.settings.offer_timeout,
                "egress",
            )?;
        }
        Ok(())
    }
}
