use tracing::debug;

use crate::{
    election::{
        Catalog, CandidateId, DistrictId, PartyId, Position, VoteTarget,
    },
    store::{CounterStore, TallyRow},
    Error, Result,
};

pub mod threshold;

pub use threshold::{
    PartyResult, PartyTotal, PartyTotals, Threshold, ThresholdReport,
};

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CandidateTally {
    pub candidate_id: CandidateId,
    pub votes: u64,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PartyTally {
    pub party_id: PartyId,
    pub party_name: String,
    pub candidates: Vec<CandidateTally>,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DistrictTally {
    pub district_id: DistrictId,
    pub parties: Vec<PartyTally>,
}

/// Vote counts in the shape of the election: districts, parties and
/// candidates in definition order. Every candidate has a count, zero when the
/// store holds nothing for it.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct AggregatedTally {
    pub districts: Vec<DistrictTally>,
}

impl AggregatedTally {
    /// A tally with every count at zero.
    pub fn empty(catalog: &Catalog) -> Self {
        let districts = catalog
            .districts()
            .iter()
            .map(|d| DistrictTally {
                district_id: d.district_id,
                parties: d
                    .parties
                    .iter()
                    .map(|p| PartyTally {
                        party_id: p.party_id,
                        party_name: p.party_name.clone(),
                        candidates: p
                            .candidates
                            .iter()
                            .map(|c| CandidateTally {
                                candidate_id: c.candidate_id,
                                votes: 0,
                            })
                            .collect(),
                    })
                    .collect(),
            })
            .collect();
        Self { districts }
    }

    /// Reads every district from the store and places each row in the
    /// election. Stops at the first read failure or at the first row the
    /// election has no place for; no partial tally is returned.
    pub async fn collect<S>(catalog: &Catalog, store: &S) -> Result<Self>
    where
        S: CounterStore + ?Sized,
    {
        let mut tally = Self::empty(catalog);
        for (pos, district) in catalog.districts().iter().enumerate() {
            let district_id = district.district_id;
            let rows = store
                .read_district(district_id)
                .await
                .map_err(|source| Error::Read {
                    district_id,
                    source,
                })?;
            debug!(district = district_id, rows = rows.len(), "read tallies");

            for row in rows {
                let at = reconcile(catalog, pos, &row)?;
                tally.districts[at.district].parties[at.party].candidates
                    [at.candidate]
                    .votes = row.votes;
            }
        }
        Ok(tally)
    }

    pub fn get(&self, target: VoteTarget) -> Option<u64> {
        self.districts
            .iter()
            .find(|d| d.district_id == target.district_id)?
            .parties
            .iter()
            .find(|p| p.party_id == target.party_id)?
            .candidates
            .iter()
            .find(|c| c.candidate_id == target.candidate_id)
            .map(|c| c.votes)
    }

    /// Every counter with its target, in definition order.
    pub fn counts(&self) -> impl Iterator<Item = (VoteTarget, u64)> + '_ {
        self.districts.iter().flat_map(|d| {
            d.parties.iter().flat_map(move |p| {
                p.candidates.iter().map(move |c| {
                    let target = VoteTarget::new(
                        d.district_id,
                        p.party_id,
                        c.candidate_id,
                    );
                    (target, c.votes)
                })
            })
        })
    }

    /// Fails with [`Error::TallyOverflow`] if a sum does not fit in a `u64`.
    pub fn party_totals(&self) -> Result<PartyTotals> {
        let mut totals = PartyTotals::new();
        for party in self.districts.iter().flat_map(|d| &d.parties) {
            let votes = party
                .candidates
                .iter()
                .try_fold(0u64, |sum, c| sum.checked_add(c.votes))
                .ok_or(Error::TallyOverflow("a party"))?;
            totals.add(party.party_id, &party.party_name, votes)?;
        }
        Ok(totals)
    }
}

fn reconcile(
    catalog: &Catalog,
    district_pos: usize,
    row: &TallyRow,
) -> Result<Position> {
    let mismatch = |reason| Error::ReconciliationMismatch { row: *row, reason };

    let district = catalog
        .district_position(row.district_id)
        .ok_or_else(|| mismatch("unknown district"))?;
    if district != district_pos {
        return Err(mismatch("row returned for another district"));
    }
    let party = catalog
        .party_position(district, row.party_id)
        .ok_or_else(|| mismatch("unknown party"))?;
    let candidate = catalog
        .candidate_position(district, party, row.candidate_id)
        .ok_or_else(|| mismatch("unknown candidate"))?;
    Ok(Position {
        district,
        party,
        candidate,
    })
}

/// Reads the store, totals votes per party and evaluates the threshold.
pub async fn compute_results<S>(
    catalog: &Catalog,
    store: &S,
    threshold: Threshold,
) -> Result<ThresholdReport>
where
    S: CounterStore + ?Sized,
{
    let tally = AggregatedTally::collect(catalog, store).await?;
    let report = tally.party_totals()?.evaluate(threshold)?;
    debug!(
        threshold = threshold.percent(),
        total_votes = report.total_votes,
        failed = report.failed().count(),
        "threshold evaluated"
    );
    Ok(report)
}
