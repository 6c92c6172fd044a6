use std::io;

use thiserror::Error;

use super::{CandidateId, DistrictId, PartyId};

#[derive(Debug, Error)]
pub enum ElectionError {
    #[error("could not read election definition: {0}")]
    Io(#[from] io::Error),
    #[error("invalid election definition: {0}")]
    Json(#[from] serde_json::Error),
    #[error("no districts found")]
    NoDistricts,
    #[error("district {district_id} has no parties")]
    NoParties { district_id: DistrictId },
    #[error("party {party_name} in district {district_id} has no candidates")]
    NoCandidates {
        district_id: DistrictId,
        party_name: String,
    },
    #[error("{0}")]
    DuplicateId(DuplicateId),
    #[error("invalid district: {0}")]
    UnknownDistrict(String),
    #[error("invalid party: {0}")]
    UnknownParty(String),
    #[error("invalid candidate: {0}")]
    UnknownCandidate(String),
}

/// Which level of the definition reused an id, and where.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DuplicateId {
    District(DistrictId),
    Party {
        district_id: DistrictId,
        party_id: PartyId,
    },
    Candidate {
        district_id: DistrictId,
        party_id: PartyId,
        candidate_id: CandidateId,
    },
}

impl std::fmt::Display for DuplicateId {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            DuplicateId::District(id) => {
                write!(f, "duplicate district id {id}")
            }
            DuplicateId::Party {
                district_id,
                party_id,
            } => write!(
                f,
                "duplicate party id {party_id} in district {district_id}"
            ),
            DuplicateId::Candidate {
                district_id,
                party_id,
                candidate_id,
            } => write!(
                f,
                "duplicate candidate id {candidate_id} for party {party_id} \
                 in district {district_id}"
            ),
        }
    }
}
