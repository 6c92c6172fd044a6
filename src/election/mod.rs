use std::{fmt, path::Path};

use serde::{Deserialize, Serialize};

mod error;
mod index;

pub use error::{DuplicateId, ElectionError};
pub use index::{Catalog, Lookup, Position, ResolvedVote};

pub type DistrictId = u32;
pub type PartyId = u32;
pub type CandidateId = u32;

/// Anything in the definition tree that can be picked by id or by name.
pub trait Identifiable {
    fn id(&self) -> u32;
    fn name(&self) -> &str;
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Election {
    pub election_id: String,
    pub districts: Vec<District>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct District {
    pub district_id: DistrictId,
    pub name: String,
    pub mandates: u32,
    pub parties: Vec<Party>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Party {
    pub party_id: PartyId,
    pub party_name: String,
    pub candidates: Vec<Candidate>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Candidate {
    pub candidate_id: CandidateId,
    pub name: String,
}

impl Election {
    /// Parses an election definition. The result is not validated; build a
    /// [`Catalog`] from it for that.
    pub fn from_json(json: &str) -> Result<Self, ElectionError> {
        Ok(serde_json::from_str(json)?)
    }

    pub fn load(path: impl AsRef<Path>) -> Result<Self, ElectionError> {
        let data = std::fs::read_to_string(path)?;
        Self::from_json(&data)
    }
}

impl Identifiable for District {
    fn id(&self) -> u32 {
        self.district_id
    }

    fn name(&self) -> &str {
        &self.name
    }
}

impl Identifiable for Party {
    fn id(&self) -> u32 {
        self.party_id
    }

    fn name(&self) -> &str {
        &self.party_name
    }
}

impl Identifiable for Candidate {
    fn id(&self) -> u32 {
        self.candidate_id
    }

    fn name(&self) -> &str {
        &self.name
    }
}

/// The key of a single vote counter.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct VoteTarget {
    pub district_id: DistrictId,
    pub party_id: PartyId,
    pub candidate_id: CandidateId,
}

impl VoteTarget {
    pub fn new(
        district_id: DistrictId,
        party_id: PartyId,
        candidate_id: CandidateId,
    ) -> Self {
        Self {
            district_id,
            party_id,
            candidate_id,
        }
    }
}

impl fmt::Display for VoteTarget {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "district={} party={} candidate={}",
            self.district_id, self.party_id, self.candidate_id
        )
    }
}

#[cfg(test)]
pub(crate) mod tests {
    use super::*;

    /// Builds `districts x parties x candidates` with ids starting at 1.
    pub(crate) fn grid(
        districts: u32,
        parties: u32,
        candidates: u32,
    ) -> Election {
        Election {
            election_id: "test".into(),
            districts: (1..=districts)
                .map(|d| District {
                    district_id: d,
                    name: format!("district-{d}"),
                    mandates: 2,
                    parties: (1..=parties)
                        .map(|p| Party {
                            party_id: p,
                            party_name: format!("party-{p}"),
                            candidates: (1..=candidates)
                                .map(|c| Candidate {
                                    candidate_id: c,
                                    name: format!("candidate-{d}-{p}-{c}"),
                                })
                                .collect(),
                        })
                        .collect(),
                })
                .collect(),
        }
    }

    #[test]
    fn parses_definition() {
        let json = r#"{
            "election_id": "parliament-2024",
            "districts": [{
                "district_id": 7,
                "name": "North",
                "mandates": 12,
                "parties": [{
                    "party_id": 3,
                    "party_name": "Greens",
                    "candidates": [{"candidate_id": 1, "name": "Ann"}]
                }]
            }]
        }"#;
        let election = Election::from_json(json).unwrap();

        assert_eq!(election.election_id, "parliament-2024");
        let district = &election.districts[0];
        assert_eq!((district.id(), district.name()), (7, "North"));
        assert_eq!(district.mandates, 12);
        assert_eq!(district.parties[0].name(), "Greens");
        assert_eq!(district.parties[0].candidates[0].id(), 1);
    }

    #[test]
    fn rejects_malformed_json() {
        let err = Election::from_json(r#"{"election_id": 1}"#).unwrap_err();
        assert!(matches!(err, ElectionError::Json(_)));
    }

    #[test]
    fn target_display_names_every_level() {
        let target = VoteTarget::new(1, 2, 3);
        assert_eq!(target.to_string(), "district=1 party=2 candidate=3");
    }
}
