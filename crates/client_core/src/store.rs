use shared::domain::{Candidate, CandidateId};
use tracing::warn;

use crate::error::StoreError;

/// Ordered, id-unique view of the candidate roster for one session.
///
/// Display order is fixed at snapshot time and never changes afterwards, no
/// matter how the tallies move. The store carries no synchronization of its
/// own; the owning session keeps a single writer at a time in front of it
/// (the snapshot completion, then the subscription task).
#[derive(Debug, Default)]
pub struct CandidateStore {
    candidates: Vec<Candidate>,
    initialized: bool,
}

impl CandidateStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// Whether `apply_snapshot` has run. Reads before that just see an empty
    /// roster.
    pub fn is_initialized(&self) -> bool {
        self.initialized
    }

    /// Installs the full roster in service order. First call wins; any later
    /// call is a programming error and leaves the contents untouched.
    pub fn apply_snapshot(&mut self, candidates: Vec<Candidate>) -> Result<(), StoreError> {
        if self.initialized {
            return Err(StoreError::AlreadyInitialized);
        }
        let mut accepted: Vec<Candidate> = Vec::with_capacity(candidates.len());
        for candidate in candidates {
            if accepted.iter().any(|existing| existing.id == candidate.id) {
                warn!(id = %candidate.id, "dropping duplicate candidate id in snapshot");
                continue;
            }
            accepted.push(candidate);
        }
        self.candidates = accepted;
        self.initialized = true;
        Ok(())
    }

    /// Overwrites one candidate's tally with the absolute count carried by a
    /// delta event, which makes application idempotent and order-insensitive
    /// per id. Unknown ids are a no-op returning `false`: the event may have
    /// raced the snapshot or be malformed, and the roster is fixed for the
    /// session.
    pub fn apply_delta(&mut self, id: &CandidateId, votes: u64) -> bool {
        match self
            .candidates
            .iter_mut()
            .find(|candidate| &candidate.id == id)
        {
            Some(candidate) => {
                candidate.votes = votes;
                true
            }
            None => false,
        }
    }

    /// Current view, in snapshot order.
    pub fn candidates(&self) -> &[Candidate] {
        &self.candidates
    }

    pub fn get(&self, id: &CandidateId) -> Option<&Candidate> {
        self.candidates.iter().find(|candidate| &candidate.id == id)
    }

    pub fn len(&self) -> usize {
        self.candidates.len()
    }

    pub fn is_empty(&self) -> bool {
        self.candidates.is_empty()
    }
}
