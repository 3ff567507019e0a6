//! Datagram buffer pool.
//!
//! Receive buffers are `BytesMut` values of the configured datagram size.
//! A received datagram is split off and frozen into `Bytes`, so packets and
//! frames keep pointing into it; the remainder goes back to the pool, where
//! `reserve` reclaims the allocation once every frozen view has been dropped.
//!
//! The free list is a bounded crossbeam channel: cloning the pool shares it
//! between the threads that acquire and the threads that release.

use bytes::BytesMut;
use crossbeam_channel::{bounded, Receiver, Sender, TrySendError};
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;
use tracing::trace;

use super::config::BufferPoolConfig;

#[derive(Debug, Default)]
struct PoolStats {
    allocated: AtomicU64,
    reused: AtomicU64,
    discarded: AtomicU64,
}

/// Shared pool of datagram-sized receive buffers.
#[derive(Debug, Clone)]
pub struct DatagramBufferPool {
    free_tx: Sender<BytesMut>,
    free_rx: Receiver<BytesMut>,
    datagram_size: usize,
    stats: Arc<PoolStats>,
}

impl DatagramBufferPool {
    pub fn new(config: &BufferPoolConfig) -> Self {
        let (free_tx, free_rx) = bounded(config.max_buffers.max(1));
        Self {
            free_tx,
            free_rx,
            datagram_size: config.datagram_size,
            stats: Arc::new(PoolStats::default()),
        }
    }

    pub fn datagram_size(&self) -> usize {
        self.datagram_size
    }

    /// Take an empty buffer with room for one full datagram.
    ///
    /// Never blocks: when the free list is empty a new buffer is allocated.
    pub fn acquire(&self) -> BytesMut {
        match self.free_rx.try_recv() {
            Ok(mut buf) => {
                buf.clear();
                buf.reserve(self.datagram_size);
                self.stats.reused.fetch_add(1, Ordering::Relaxed);
                buf
            }
            Err(_) => {
                self.stats.allocated.fetch_add(1, Ordering::Relaxed);
                BytesMut::with_capacity(self.datagram_size)
            }
        }
    }

    /// Hand a buffer back. Dropped if the free list is already full.
    pub fn release(&self, mut buf: BytesMut) {
        buf.clear();
        match self.free_tx.try_send(buf) {
            Ok(()) => {}
            Err(TrySendError::Full(_)) | Err(TrySendError::Disconnected(_)) => {
                self.stats.discarded.fetch_add(1, Ordering::Relaxed);
                trace!("buffer pool full, freeing buffer");
            }
        }
    }

    /// Buffers currently idle on the free list.
    pub fn available(&self) -> usize {
        self.free_rx.len()
    }

    pub fn allocated(&self) -> u64 {
        self.stats.allocated.load(Ordering::Relaxed)
    }

    pub fn reused(&self) -> u64 {
        self.stats.reused.load(Ordering::Relaxed)
    }

    pub fn discarded(&self) -> u64 {
        self.stats.discarded.load(Ordering::Relaxed)
    }
}
