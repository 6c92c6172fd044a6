use std::{collections::BTreeMap, fmt};

use crate::{election::PartyId, Error, Result};

/// Minimum share of all votes, in whole percent, a party needs to qualify.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Threshold(u8);

impl Threshold {
    pub const DEFAULT: Threshold = Threshold(5);

    pub fn new(percent: u8) -> Result<Self> {
        if percent > 100 {
            return Err(Error::InvalidParameters(format!(
                "threshold of {percent}% is above 100%"
            )));
        }
        Ok(Self(percent))
    }

    pub fn percent(self) -> u8 {
        self.0
    }

    /// `votes / total >= percent / 100`, in integers. Reaching the threshold
    /// exactly counts as passing.
    pub fn is_met(self, votes: u64, total: u64) -> bool {
        u128::from(votes) * 100 >= u128::from(total) * u128::from(self.0)
    }
}

impl Default for Threshold {
    fn default() -> Self {
        Self::DEFAULT
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PartyTotal {
    pub party_id: PartyId,
    pub name: String,
    pub votes: u64,
}

/// Votes per party summed over every district.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct PartyTotals {
    totals: BTreeMap<PartyId, PartyTotal>,
}

impl PartyTotals {
    pub fn new() -> Self {
        Self::default()
    }

    /// Adds votes to a party. The first name seen for an id is kept.
    pub fn add(
        &mut self,
        party_id: PartyId,
        name: &str,
        votes: u64,
    ) -> Result<()> {
        let total = self.totals.entry(party_id).or_insert_with(|| PartyTotal {
            party_id,
            name: name.to_owned(),
            votes: 0,
        });
        total.votes = total
            .votes
            .checked_add(votes)
            .ok_or(Error::TallyOverflow("a party"))?;
        Ok(())
    }

    pub fn get(&self, party_id: PartyId) -> Option<u64> {
        self.totals.get(&party_id).map(|t| t.votes)
    }

    pub fn iter(&self) -> impl Iterator<Item = &PartyTotal> {
        self.totals.values()
    }

    pub fn len(&self) -> usize {
        self.totals.len()
    }

    pub fn is_empty(&self) -> bool {
        self.totals.is_empty()
    }

    pub fn grand_total(&self) -> Result<u64> {
        self.totals
            .values()
            .try_fold(0u64, |sum, t| sum.checked_add(t.votes))
            .ok_or(Error::TallyOverflow("all parties"))
    }

    /// Decides which parties qualify. Without a single vote there is no
    /// share to compute, which is reported as [`Error::NoVotesRecorded`].
    pub fn evaluate(&self, threshold: Threshold) -> Result<ThresholdReport> {
        let total_votes = self.grand_total()?;
        if total_votes == 0 {
            return Err(Error::NoVotesRecorded);
        }

        let parties = self
            .totals
            .values()
            .map(|t| PartyResult {
                party_id: t.party_id,
                name: t.name.clone(),
                votes: t.votes,
                percentage: 100.0 * t.votes as f64 / total_votes as f64,
                passed: threshold.is_met(t.votes, total_votes),
            })
            .collect();

        Ok(ThresholdReport {
            threshold,
            total_votes,
            parties,
        })
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct PartyResult {
    pub party_id: PartyId,
    pub name: String,
    pub votes: u64,
    pub percentage: f64,
    pub passed: bool,
}

#[derive(Debug, Clone, PartialEq)]
pub struct ThresholdReport {
    pub threshold: Threshold,
    pub total_votes: u64,
    /// Ordered by party id.
    pub parties: Vec<PartyResult>,
}

impl ThresholdReport {
    pub fn party(&self, party_id: PartyId) -> Option<&PartyResult> {
        self.parties.iter().find(|p| p.party_id == party_id)
    }

    pub fn failed(&self) -> impl Iterator<Item = &PartyResult> {
        self.parties.iter().filter(|p| !p.passed)
    }
}

impl fmt::Display for ThresholdReport {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        writeln!(f, "Total Votes: {}", self.total_votes)?;
        writeln!(f, "Party Results:")?;
        for party in &self.parties {
            write!(f, "Party: {}", party.party_id)?;
            if !party.name.is_empty() {
                write!(f, " ({})", party.name)?;
            }
            writeln!(
                f,
                ", Votes: {}, Percentage: {:.2}%",
                party.votes, party.percentage
            )?;
            if !party.passed {
                writeln!(
                    f,
                    "Party ID {} did not pass the threshold with {} votes",
                    party.party_id, party.votes
                )?;
            }
        }
        Ok(())
    }
}
