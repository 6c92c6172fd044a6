use hashbrown::HashMap;
use rand::Rng;

use super::{
    error::{DuplicateId, ElectionError},
    Candidate, District, Election, Identifiable, Party, VoteTarget,
};

/// Id and name maps over one ordered list of entities, resolving to the
/// entity's position in that list.
#[derive(Debug, Default, Clone)]
pub struct Lookup {
    by_id: HashMap<u32, usize>,
    by_name: HashMap<String, usize>,
}

impl Lookup {
    /// Returns the first id that appears twice if the list can't be indexed.
    fn build<T: Identifiable>(items: &[T]) -> Result<Self, u32> {
        let mut lookup = Lookup {
            by_id: HashMap::with_capacity(items.len()),
            by_name: HashMap::with_capacity(items.len()),
        };
        for (pos, item) in items.iter().enumerate() {
            if lookup.by_id.insert(item.id(), pos).is_some() {
                return Err(item.id());
            }
            // names aren't unique, the first one wins
            lookup.by_name.entry(item.name().to_owned()).or_insert(pos);
        }
        Ok(lookup)
    }

    pub fn by_id(&self, id: u32) -> Option<usize> {
        self.by_id.get(&id).copied()
    }

    pub fn by_name(&self, name: &str) -> Option<usize> {
        self.by_name.get(name).copied()
    }

    /// Anything that parses as an integer is an id, everything else a name.
    pub fn find(&self, arg: &str) -> Option<usize> {
        match arg.parse::<i64>() {
            Ok(id) => u32::try_from(id).ok().and_then(|id| self.by_id(id)),
            Err(_) => self.by_name(arg),
        }
    }

    pub fn len(&self) -> usize {
        self.by_id.len()
    }

    pub fn is_empty(&self) -> bool {
        self.by_id.is_empty()
    }
}

/// Positions of a candidate inside the election tree.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Position {
    pub district: usize,
    pub party: usize,
    pub candidate: usize,
}

/// A validated election together with the indices used to resolve votes and
/// tally rows against it.
///
/// Parties are indexed per district, the same way candidates are indexed per
/// party, so districts that list parties in different orders (or with
/// different ids) still resolve correctly.
#[derive(Debug)]
pub struct Catalog {
    election: Election,
    districts: Lookup,
    parties: Vec<Lookup>,
    candidates: Vec<Vec<Lookup>>,
}

impl Catalog {
    pub fn new(election: Election) -> Result<Self, ElectionError> {
        if election.districts.is_empty() {
            return Err(ElectionError::NoDistricts);
        }

        let districts = Lookup::build(&election.districts).map_err(|id| {
            ElectionError::DuplicateId(DuplicateId::District(id))
        })?;

        let mut parties = Vec::with_capacity(election.districts.len());
        let mut candidates = Vec::with_capacity(election.districts.len());
        for district in &election.districts {
            let district_id = district.district_id;
            if district.parties.is_empty() {
                return Err(ElectionError::NoParties { district_id });
            }
            let party_lookup =
                Lookup::build(&district.parties).map_err(|party_id| {
                    ElectionError::DuplicateId(DuplicateId::Party {
                        district_id,
                        party_id,
                    })
                })?;

            let mut candidate_lookups =
                Vec::with_capacity(district.parties.len());
            for party in &district.parties {
                if party.candidates.is_empty() {
                    return Err(ElectionError::NoCandidates {
                        district_id,
                        party_name: party.party_name.clone(),
                    });
                }
                let lookup = Lookup::build(&party.candidates).map_err(
                    |candidate_id| {
                        ElectionError::DuplicateId(DuplicateId::Candidate {
                            district_id,
                            party_id: party.party_id,
                            candidate_id,
                        })
                    },
                )?;
                candidate_lookups.push(lookup);
            }

            parties.push(party_lookup);
            candidates.push(candidate_lookups);
        }

        Ok(Self {
            election,
            districts,
            parties,
            candidates,
        })
    }

    pub fn election(&self) -> &Election {
        &self.election
    }

    pub fn districts(&self) -> &[District] {
        &self.election.districts
    }

    pub fn district_position(&self, district_id: u32) -> Option<usize> {
        self.districts.by_id(district_id)
    }

    pub fn party_position(
        &self,
        district: usize,
        party_id: u32,
    ) -> Option<usize> {
        self.parties.get(district)?.by_id(party_id)
    }

    pub fn candidate_position(
        &self,
        district: usize,
        party: usize,
        candidate_id: u32,
    ) -> Option<usize> {
        self.candidates.get(district)?.get(party)?.by_id(candidate_id)
    }

    pub fn locate(&self, target: VoteTarget) -> Option<Position> {
        let district = self.district_position(target.district_id)?;
        let party = self.party_position(district, target.party_id)?;
        let candidate =
            self.candidate_position(district, party, target.candidate_id)?;
        Some(Position {
            district,
            party,
            candidate,
        })
    }

    /// Resolves the three arguments of an interactive vote, each one scoped
    /// to the entity resolved before it.
    pub fn resolve(
        &self,
        district: &str,
        party: &str,
        candidate: &str,
    ) -> Result<ResolvedVote<'_>, ElectionError> {
        let d = self
            .districts
            .find(district)
            .ok_or_else(|| ElectionError::UnknownDistrict(district.into()))?;
        let p = self.parties[d]
            .find(party)
            .ok_or_else(|| ElectionError::UnknownParty(party.into()))?;
        let c = self.candidates[d][p]
            .find(candidate)
            .ok_or_else(|| ElectionError::UnknownCandidate(candidate.into()))?;

        let district = &self.election.districts[d];
        let party = &district.parties[p];
        Ok(ResolvedVote {
            district,
            party,
            candidate: &party.candidates[c],
        })
    }

    /// Picks a district, then a party in it, then a candidate of that party,
    /// each uniformly.
    pub fn random_target<R: Rng>(&self, rng: &mut R) -> VoteTarget {
        let districts = &self.election.districts;
        let district = &districts[rng.gen_range(0..districts.len())];
        let party = &district.parties[rng.gen_range(0..district.parties.len())];
        let candidate =
            &party.candidates[rng.gen_range(0..party.candidates.len())];
        VoteTarget::new(
            district.district_id,
            party.party_id,
            candidate.candidate_id,
        )
    }

    /// Every counter key the election defines, in definition order.
    pub fn targets(&self) -> impl Iterator<Item = VoteTarget> + '_ {
        self.election.districts.iter().flat_map(|d| {
            d.parties.iter().flat_map(move |p| {
                p.candidates.iter().map(move |c| {
                    VoteTarget::new(d.district_id, p.party_id, c.candidate_id)
                })
            })
        })
    }
}

/// An interactive vote after its arguments have been resolved.
#[derive(Debug, Clone, Copy)]
pub struct ResolvedVote<'a> {
    pub district: &'a District,
    pub party: &'a Party,
    pub candidate: &'a Candidate,
}

impl ResolvedVote<'_> {
    pub fn target(&self) -> VoteTarget {
        VoteTarget::new(
            self.district.district_id,
            self.party.party_id,
            self.candidate.candidate_id,
        )
    }
}

#[cfg(test)]
mod tests {
    use rand::{rngs::SmallRng, SeedableRng};

    use super::*;
    use crate::election::tests::grid;

    #[test]
    fn rejects_empty_levels() {
        let mut election = grid(1, 1, 1);
        election.districts.clear();
        assert!(matches!(
            Catalog::new(election),
            Err(ElectionError::NoDistricts)
        ));

        let mut election = grid(2, 1, 1);
        election.districts[1].parties.clear();
        assert!(matches!(
            Catalog::new(election),
            Err(ElectionError::NoParties { district_id: 2 })
        ));

        let mut election = grid(1, 2, 1);
        election.districts[0].parties[1].candidates.clear();
        match Catalog::new(election) {
            Err(ElectionError::NoCandidates {
                district_id,
                party_name,
            }) => {
                assert_eq!(district_id, 1);
                assert_eq!(party_name, "party-2");
            }
            other => panic!("unexpected result: {other:?}"),
        }
    }

    #[test]
    fn rejects_duplicate_ids() {
        let mut election = grid(2, 2, 2);
        election.districts[1].district_id = 1;
        assert!(matches!(
            Catalog::new(election),
            Err(ElectionError::DuplicateId(DuplicateId::District(1)))
        ));

        let mut election = grid(1, 2, 2);
        election.districts[0].parties[0].candidates[1].candidate_id = 1;
        assert!(matches!(
            Catalog::new(election),
            Err(ElectionError::DuplicateId(DuplicateId::Candidate {
                district_id: 1,
                party_id: 1,
                candidate_id: 1,
            }))
        ));
    }

    #[test]
    fn resolves_by_id_or_name() {
        let catalog = Catalog::new(grid(2, 2, 2)).unwrap();
        assert_eq!(catalog.election().districts.len(), 2);

        let by_id = catalog.resolve("2", "1", "2").unwrap();
        assert_eq!(by_id.target(), VoteTarget::new(2, 1, 2));

        let by_name = catalog
            .resolve("district-2", "party-1", "candidate-2-1-2")
            .unwrap();
        assert_eq!(by_name.target(), by_id.target());
        assert_eq!(by_name.candidate.name, "candidate-2-1-2");

        let mixed = catalog.resolve("district-1", "2", "candidate-1-2-1");
        assert_eq!(mixed.unwrap().target(), VoteTarget::new(1, 2, 1));
    }

    #[test]
    fn numeric_arguments_never_fall_back_to_names() {
        let mut election = grid(1, 1, 1);
        election.districts[0].name = "42".into();
        let catalog = Catalog::new(election).unwrap();

        assert!(matches!(
            catalog.resolve("42", "1", "1"),
            Err(ElectionError::UnknownDistrict(arg)) if arg == "42"
        ));
    }

    #[test]
    fn resolution_is_scoped_to_the_parent() {
        let catalog = Catalog::new(grid(2, 2, 2)).unwrap();

        // candidate names carry their district, so this one lives elsewhere
        assert!(matches!(
            catalog.resolve("1", "1", "candidate-2-1-1"),
            Err(ElectionError::UnknownCandidate(_))
        ));
        assert!(matches!(
            catalog.resolve("1", "party-9", "1"),
            Err(ElectionError::UnknownParty(_))
        ));
        assert!(matches!(
            catalog.resolve("-1", "1", "1"),
            Err(ElectionError::UnknownDistrict(_))
        ));
    }

    #[test]
    fn locates_with_non_uniform_party_order() {
        let mut election = grid(2, 3, 1);
        election.districts[1].parties.reverse();
        let catalog = Catalog::new(election).unwrap();

        assert_eq!(
            catalog.locate(VoteTarget::new(2, 1, 1)),
            Some(Position {
                district: 1,
                party: 2,
                candidate: 0
            })
        );
        assert_eq!(catalog.locate(VoteTarget::new(2, 4, 1)), None);
    }

    #[test]
    fn random_targets_stay_inside_the_definition() {
        let catalog = Catalog::new(grid(3, 2, 4)).unwrap();
        let mut rng = SmallRng::seed_from_u64(7);

        for _ in 0..500 {
            let target = catalog.random_target(&mut rng);
            assert!(catalog.locate(target).is_some(), "{target}");
        }
        assert_eq!(catalog.targets().count(), 24);
    }
}
