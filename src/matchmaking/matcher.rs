//! Pairing algorithm over the waiting pool
//!
//! Matching is one-shot and eager: a search either pairs synchronously
//! against the current pool contents or the searcher is queued. Enqueueing
//! never re-scans older waiters; they are reconsidered only when the next
//! searcher arrives.

use crate::connection::handle::ConnectionId;
use crate::matchmaking::pool::{WaitingEntry, WaitingPool};
use crate::types::Profile;
use crate::utils::realms_within_tolerance;

/// Configuration for pairing behavior
#[derive(Debug, Clone)]
pub struct MatchingConfig {
    /// Maximum realm-index distance allowed for a pairing
    pub max_realm_difference: i64,
}

impl Default for MatchingConfig {
    fn default() -> Self {
        Self {
            max_realm_difference: 1,
        }
    }
}

/// Realm-proximity matchmaker
#[derive(Debug, Clone, Default)]
pub struct Matchmaker {
    config: MatchingConfig,
}

impl Matchmaker {
    pub fn new(config: MatchingConfig) -> Self {
        Self { config }
    }

    /// Whether two profiles may be paired
    pub fn profiles_compatible(&self, a: &Profile, b: &Profile) -> bool {
        realms_within_tolerance(
            a.realm_index(),
            b.realm_index(),
            self.config.max_realm_difference,
        )
    }

    /// Find, remove, and return the earliest compatible waiter.
    ///
    /// Returns `None` when no waiter is compatible; the caller is then
    /// responsible for enqueueing the candidate.
    pub fn find_opponent(
        &self,
        pool: &mut WaitingPool,
        candidate_id: ConnectionId,
        candidate: &Profile,
    ) -> Option<WaitingEntry> {
        pool.scan_and_remove_first_match(candidate_id, candidate, |waiting, searching| {
            self.profiles_compatible(waiting, searching)
        })
    }
}
