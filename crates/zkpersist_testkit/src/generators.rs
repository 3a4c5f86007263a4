//! Property-based test generators using proptest.
//!
//! Provides strategies for generating transaction headers, payloads and
//! zxid sequences.

use proptest::prelude::*;
use zkpersist_core::{TxnHeader, TxnRecord, Zxid};

/// Generates a zxid from a small epoch and counter.
pub fn zxid_strategy() -> impl Strategy<Value = Zxid> {
    (0u32..4, 1u32..10_000).prop_map(|(epoch, counter)| Zxid::from_parts(epoch, counter))
}

/// Generates an opaque record payload.
pub fn payload_strategy() -> impl Strategy<Value = Vec<u8>> {
    prop::collection::vec(any::<u8>(), 0..512)
}

/// Generates a header for the given zxid.
pub fn header_strategy(zxid: Zxid) -> impl Strategy<Value = TxnHeader> {
    (any::<i64>(), any::<i32>(), 0i64..i64::MAX, -20i32..20)
        .prop_map(move |(session, cxid, time, op)| TxnHeader::new(session, cxid, zxid, time, op))
}

/// Generates strictly increasing zxids starting above zero.
pub fn increasing_zxids_strategy(max_len: usize) -> impl Strategy<Value = Vec<i64>> {
    prop::collection::vec(1i64..1_000, 1..=max_len).prop_map(|gaps| {
        gaps.into_iter()
            .scan(0i64, |acc, gap| {
                *acc += gap;
                Some(*acc)
            })
            .collect()
    })
}

/// Generates records with strictly increasing zxids.
pub fn record_batch_strategy(max_len: usize) -> impl Strategy<Value = Vec<TxnRecord>> {
    increasing_zxids_strategy(max_len).prop_flat_map(|zxids| {
        zxids
            .into_iter()
            .map(|z| {
                (header_strategy(Zxid::new(z)), payload_strategy())
                    .prop_map(|(header, payload)| TxnRecord::new(header, payload))
            })
            .collect::<Vec<_>>()
    })
}

/// Configuration for property tests.
#[derive(Debug, Clone)]
pub struct PropTestConfig {
    /// Number of test cases to run.
    pub cases: u32,
    /// Maximum shrink iterations.
    pub max_shrink_iters: u32,
}

impl Default for PropTestConfig {
    fn default() -> Self {
        Self {
            cases: 256,
            max_shrink_iters: 1000,
        }
    }
}

impl PropTestConfig {
    /// Creates a configuration for quick tests.
    #[must_use]
    pub fn quick() -> Self {
        Self {
            cases: 32,
            max_shrink_iters: 100,
        }
    }

    /// Converts to proptest config.
    #[must_use]
    pub fn to_proptest_config(&self) -> ProptestConfig {
        ProptestConfig {
            cases: self.cases,
            max_shrink_iters: self.max_shrink_iters,
            ..ProptestConfig::default()
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    proptest! {
        #![proptest_config(PropTestConfig::quick().to_proptest_config())]

        #[test]
        fn zxids_strictly_increase(zxids in increasing_zxids_strategy(50)) {
            prop_assert!(zxids[0] > 0);
            prop_assert!(zxids.windows(2).all(|w| w[0] < w[1]));
        }

        #[test]
        fn batch_headers_carry_their_zxid(batch in record_batch_strategy(10)) {
            prop_assert!(!batch.is_empty());
            prop_assert!(batch.windows(2).all(|w| w[0].zxid() < w[1].zxid()));
        }

        #[test]
        fn generated_zxid_is_valid(zxid in zxid_strategy()) {
            prop_assert!(zxid.is_valid());
            prop_assert!(zxid.epoch() < 4);
        }
    }
}
