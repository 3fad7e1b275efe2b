//! Candidate shader source and its provenance.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use sha2::{Digest, Sha256};
use uuid::Uuid;

/// Which proposer entry point produced (or was meant to produce) a candidate.
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "snake_case")]
pub enum ProposalPath {
    /// First iteration: built from the target description only.
    Initial,

    /// Later iterations: built from the previous candidate and critique.
    Edit,
}

/// Where the source text of a candidate came from.
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum CandidateOrigin {
    /// Accepted as returned by the proposer.
    Proposed,

    /// Hardcoded baseline substituted for a failed initial proposal.
    Baseline,

    /// Previous candidate reused after a failed edit proposal.
    CarriedForward { parent: Uuid },

    /// Revision produced by the proposer's repair capability.
    Repaired { parent: Uuid },

    /// Last successfully rendered source, used after repair failed.
    LastKnownGood { parent: Uuid },
}

/// Immutable unit of renderable source for one iteration.
///
/// Fields are private; a candidate is never changed after construction.
/// Derivations such as repairs produce a new candidate whose origin points
/// back at the parent.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct Candidate {
    id: Uuid,
    iteration: u32,
    path: ProposalPath,
    origin: CandidateOrigin,
    source: String,
    digest: String,
    created_at: DateTime<Utc>,
}

impl Candidate {
    /// Create a candidate with an explicit origin.
    pub fn new(
        iteration: u32,
        path: ProposalPath,
        origin: CandidateOrigin,
        source: impl Into<String>,
    ) -> Self {
        let source = source.into();
        Self {
            id: Uuid::new_v4(),
            iteration,
            path,
            origin,
            digest: source_digest(&source),
            source,
            created_at: Utc::now(),
        }
    }

    /// Candidate accepted directly from the proposer.
    pub fn proposed(iteration: u32, path: ProposalPath, source: impl Into<String>) -> Self {
        Self::new(iteration, path, CandidateOrigin::Proposed, source)
    }

    /// Derive a new candidate from this one, keeping the iteration and path.
    pub fn derive(&self, origin: CandidateOrigin, source: impl Into<String>) -> Self {
        Self::new(self.iteration, self.path, origin, source)
    }

    /// Re-home an earlier candidate's source into another iteration.
    pub fn reuse_for(&self, iteration: u32, path: ProposalPath, origin: CandidateOrigin) -> Self {
        Self::new(iteration, path, origin, self.source.clone())
    }

    pub fn id(&self) -> Uuid {
        self.id
    }

    pub fn iteration(&self) -> u32 {
        self.iteration
    }

    pub fn path(&self) -> ProposalPath {
        self.path
    }

    pub fn origin(&self) -> CandidateOrigin {
        self.origin
    }

    pub fn source(&self) -> &str {
        &self.source
    }

    /// SHA256 hex digest of the source text.
    pub fn digest(&self) -> &str {
        &self.digest
    }

    pub fn created_at(&self) -> DateTime<Utc> {
        self.created_at
    }

    /// Whether the source came from anywhere other than a direct proposal.
    pub fn is_substitute(&self) -> bool {
        !matches!(self.origin, CandidateOrigin::Proposed)
    }
}

/// Compute the SHA256 hex digest of shader source.
pub fn source_digest(source: &str) -> String {
    let mut hasher = Sha256::new();
    hasher.update(source.as_bytes());
    hex::encode(hasher.finalize())
}
