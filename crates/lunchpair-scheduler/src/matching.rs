//! Matching engine: partitions a roster into random pairs.
//!
//! Pure and stateless: no I/O, no error channel. Randomness comes from the
//! caller's generator so tests can seed it.

use lunchpair_core::{MatchPair, Participant};
use rand::Rng;
use serde::Serialize;

/// Result of one round's matching.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct Round {
    pub pairs: Vec<MatchPair>,
    /// Present only for odd-sized rosters.
    pub leftover: Option<Participant>,
}

/// Pair up `roster` at random.
///
/// Repeatedly draws two distinct indices from the remaining entries, pairs
/// them and removes both. A roster of n entries yields n/2 pairs and, when
/// n is odd, the last remaining entry as the leftover.
pub fn compute_round<R: Rng + ?Sized>(mut roster: Vec<Participant>, rng: &mut R) -> Round {
    let mut pairs = Vec::with_capacity(roster.len() / 2);

    while roster.len() >= 2 {
        let len = roster.len();
        let first = rng.gen_range(0..len);
        let mut second = rng.gen_range(0..len);
        while second == first {
            second = rng.gen_range(0..len);
        }

        pairs.push(MatchPair {
            user_id_1: roster[first].user_id,
            user_id_2: roster[second].user_id,
            schedule_id: roster[first].schedule_id,
        });

        // Remove the higher index first so the lower one stays valid.
        let (hi, lo) = if first > second {
            (first, second)
        } else {
            (second, first)
        };
        roster.swap_remove(hi);
        roster.swap_remove(lo);
    }

    Round {
        pairs,
        leftover: roster.pop(),
    }
}
