use serde::{Deserialize, Serialize};

/// Opaque candidate identifier assigned by the vote service.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct CandidateId(pub String);

impl CandidateId {
    pub fn new(id: impl Into<String>) -> Self {
        Self(id.into())
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl std::fmt::Display for CandidateId {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.pad(&self.0)
    }
}

impl From<&str> for CandidateId {
    fn from(value: &str) -> Self {
        Self(value.to_string())
    }
}

impl From<String> for CandidateId {
    fn from(value: String) -> Self {
        Self(value)
    }
}

/// A selectable option with its current tally. `id` and `name` are fixed at
/// creation; `votes` tracks whatever the service last reported.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Candidate {
    pub id: CandidateId,
    pub name: String,
    pub votes: u64,
}

impl Candidate {
    pub fn new(id: impl Into<CandidateId>, name: impl Into<String>, votes: u64) -> Self {
        Self {
            id: id.into(),
            name: name.into(),
            votes,
        }
    }
}
