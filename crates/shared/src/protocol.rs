use serde::{Deserialize, Serialize};

use crate::domain::{Candidate, CandidateId};

/// One row of the full candidate listing returned by `GET /candidates`.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CandidateSummary {
    pub id: CandidateId,
    pub name: String,
    pub votes: u64,
}

impl From<CandidateSummary> for Candidate {
    fn from(value: CandidateSummary) -> Self {
        Self {
            id: value.id,
            name: value.name,
            votes: value.votes,
        }
    }
}

impl From<Candidate> for CandidateSummary {
    fn from(value: Candidate) -> Self {
        Self {
            id: value.id,
            name: value.name,
            votes: value.votes,
        }
    }
}

/// Absolute tally carried by every subscription event. Not an increment:
/// the service reports the authoritative count after each accepted vote.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct VoteDelta {
    pub id: CandidateId,
    pub votes: u64,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CastVoteRequest {
    pub id: CandidateId,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(tag = "type", content = "payload", rename_all = "snake_case")]
pub enum ServerEvent {
    VoteChanged(VoteDelta),
}
