//! Datagram sources.
//!
//! Socket I/O is not part of the pipeline: anything implementing
//! [`DatagramSource`] can feed it. [`IterSource`] replays datagrams held in
//! memory, which is what the CLI and the tests use.

use anyhow::{Context, Result};
use bytes::{BufMut, Bytes, BytesMut};
use std::io;
use std::time::Instant;

/// One received UDP datagram on its way to the parser.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Datagram {
    pub data: Bytes,
    pub received_at: Instant,
    /// Per-pipeline receive counter.
    pub sequence: u64,
    /// Times the datagram was re-queued waiting for keys.
    pub retries: u8,
}

impl Datagram {
    pub fn new(data: Bytes, sequence: u64) -> Self {
        Self {
            data,
            received_at: Instant::now(),
            sequence,
            retries: 0,
        }
    }

    pub fn len(&self) -> usize {
        self.data.len()
    }

    pub fn is_empty(&self) -> bool {
        self.data.is_empty()
    }

    /// The same datagram, counted as retried once more.
    pub fn retried(mut self) -> Self {
        self.retries = self.retries.saturating_add(1);
        self
    }
}

/// Producer of raw datagram payloads.
pub trait DatagramSource: Send {
    /// Append the next datagram to `buf` and return its length.
    ///
    /// `Ok(None)` means the source is exhausted. `WouldBlock`, `TimedOut`
    /// and `Interrupted` errors are treated as "nothing yet".
    fn recv(&mut self, buf: &mut BytesMut) -> io::Result<Option<usize>>;
}

/// Replays an iterator of datagrams.
#[derive(Debug)]
pub struct IterSource<I> {
    datagrams: I,
}

impl<I> IterSource<I>
where
    I: Iterator<Item = Bytes> + Send,
{
    pub fn new(datagrams: impl IntoIterator<IntoIter = I>) -> Self {
        Self {
            datagrams: datagrams.into_iter(),
        }
    }
}

impl<I> DatagramSource for IterSource<I>
where
    I: Iterator<Item = Bytes> + Send,
{
    fn recv(&mut self, buf: &mut BytesMut) -> io::Result<Option<usize>> {
        Ok(self.datagrams.next().map(|datagram| {
            buf.put_slice(&datagram);
            datagram.len()
        }))
    }
}

/// Parse one hex-encoded datagram per line.
///
/// Blank lines and lines starting with `#` are skipped; whitespace inside a
/// line is ignored so dumps can be grouped by byte or word.
pub fn parse_hex_datagrams(input: &str) -> Result<Vec<Bytes>> {
    let mut datagrams = Vec::new();
    for (index, line) in input.lines().enumerate() {
        let line = line.trim();
        if line.is_empty() || line.starts_with('#') {
            continue;
        }
        let compact: String = line.chars().filter(|c| !c.is_whitespace()).collect();
        let bytes = hex::decode(&compact)
            .with_context(|| format!("line {}: invalid hex datagram", index + 1))?;
        datagrams.push(Bytes::from(bytes));
    }
    Ok(datagrams)
}
