//! # Flow Control (RFC 9000 Section 4)
//!
//! QUIC uses credit-based flow control at two levels:
//! - **Connection-level**: Total bytes across all streams
//! - **Stream-level**: Bytes per individual stream
//!
//! A [`FlowCredit`] is one limit/transferred counter pair. It only counts;
//! deciding that an overrun is a FLOW_CONTROL_ERROR is left to the caller
//! applying frame effects.

#![forbid(unsafe_code)]

use crate::error::{Error, Result};
use crate::varint::VARINT_MAX;

/// Limit/transferred pair for one direction at one level.
///
/// Both counters only grow and never exceed 2^62 - 1.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct FlowCredit {
    limit: u64,
    transferred: u64,
}

impl FlowCredit {
    pub fn new(limit: u64) -> Self {
        Self {
            limit: limit.min(VARINT_MAX),
            transferred: 0,
        }
    }

    pub fn limit(&self) -> u64 {
        self.limit
    }

    pub fn transferred(&self) -> u64 {
        self.transferred
    }

    /// True if `n` more bytes stay within the limit.
    pub fn can_send(&self, n: u64) -> bool {
        self.transferred
            .checked_add(n)
            .is_some_and(|total| total <= self.limit)
    }

    /// Count `n` more bytes as transferred.
    pub fn increment_transferred(&mut self, n: u64) -> Result<()> {
        self.transferred = checked_grow(self.transferred, n)?;
        Ok(())
    }

    /// Extend the limit by `n` bytes.
    pub fn increment_limit(&mut self, n: u64) -> Result<()> {
        self.limit = checked_grow(self.limit, n)?;
        Ok(())
    }

    /// Raise the limit to an absolute value, as MAX_DATA and
    /// MAX_STREAM_DATA do. Smaller values are ignored.
    ///
    /// Returns true if the limit changed.
    pub fn raise_limit_to(&mut self, limit: u64) -> bool {
        let limit = limit.min(VARINT_MAX);
        if limit > self.limit {
            self.limit = limit;
            true
        } else {
            false
        }
    }

    /// Bytes that can still be transferred.
    pub fn credit(&self) -> u64 {
        self.limit.saturating_sub(self.transferred)
    }
}

fn checked_grow(current: u64, n: u64) -> Result<u64> {
    current
        .checked_add(n)
        .filter(|v| *v <= VARINT_MAX)
        .ok_or(Error::FlowControlOverflow)
}

// ============================================================================
// Unit Tests
// ============================================================================

#[cfg(test)]
mod tests {
    use super::*;
    use proptest::prelude::*;

    #[test]
    fn test_credit_accounting() {
        let mut fc = FlowCredit::new(100);
        assert!(fc.can_send(100));
        assert!(!fc.can_send(101));

        fc.increment_transferred(60).unwrap();
        assert_eq!(fc.credit(), 40);
        assert!(fc.can_send(40));
        assert!(!fc.can_send(41));

        fc.increment_limit(10).unwrap();
        assert_eq!(fc.credit(), 50);
    }

    #[test]
    fn test_transferred_may_exceed_limit() {
        let mut fc = FlowCredit::new(10);
        fc.increment_transferred(15).unwrap();
        assert_eq!(fc.credit(), 0);
        assert!(!fc.can_send(0));
    }

    #[test]
    fn test_raise_limit_ignores_decrease() {
        let mut fc = FlowCredit::new(1000);
        assert!(!fc.raise_limit_to(500));
        assert_eq!(fc.limit(), 1000);
        assert!(fc.raise_limit_to(2000));
        assert_eq!(fc.limit(), 2000);
    }

    #[test]
    fn test_overflow_rejected() {
        let mut fc = FlowCredit::new(VARINT_MAX);
        assert_eq!(fc.increment_limit(1), Err(Error::FlowControlOverflow));
        fc.increment_transferred(VARINT_MAX).unwrap();
        assert_eq!(fc.increment_transferred(1), Err(Error::FlowControlOverflow));
        assert_eq!(fc.transferred(), VARINT_MAX);
        assert!(!fc.can_send(u64::MAX));
    }

    #[derive(Debug, Clone)]
    enum Op {
        Limit(u64),
        Transfer(u64),
    }

    fn op() -> impl Strategy<Value = Op> {
        prop_oneof![
            (0u64..1 << 20).prop_map(Op::Limit),
            (0u64..1 << 20).prop_map(Op::Transfer),
        ]
    }

    proptest! {
        #[test]
        fn prop_counters_monotonic(initial in 0u64..1 << 20, ops in proptest::collection::vec(op(), 0..64)) {
            let mut fc = FlowCredit::new(initial);
            for op in ops {
                let before = fc;
                match op {
                    Op::Limit(n) => fc.increment_limit(n).unwrap(),
                    Op::Transfer(n) => {
                        if fc.can_send(n) {
                            fc.increment_transferred(n).unwrap();
                            prop_assert!(fc.transferred() <= fc.limit());
                        }
                    }
                }
                prop_assert!(fc.limit() >= before.limit());
                prop_assert!(fc.transferred() >= before.transferred());
            }
        }
    }
}
