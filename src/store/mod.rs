use std::fmt;

use async_trait::async_trait;

use crate::election::{CandidateId, DistrictId, PartyId, VoteTarget};

mod error;
pub mod memory;
#[cfg(feature = "resp")]
pub mod resp;

pub use error::StoreError;
pub use memory::MemoryStore;
#[cfg(feature = "resp")]
pub use resp::{RespConfig, RespStore};

/// How many replicas have to acknowledge an operation before it counts as
/// done. Chosen per call, never per store.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum Consistency {
    /// Whatever the store does without being asked.
    #[default]
    Default,
    One,
    Two,
    Three,
    Quorum,
    All,
}

impl Consistency {
    /// Acknowledgements needed from replicas on top of the primary, for a
    /// deployment with `replicas` replicas behind it.
    pub fn required_replica_acks(self, replicas: usize) -> usize {
        let nodes = replicas + 1;
        let required_nodes = match self {
            Consistency::Default | Consistency::One => 1,
            Consistency::Two => 2,
            Consistency::Three => 3,
            Consistency::Quorum => nodes / 2 + 1,
            Consistency::All => nodes,
        };
        required_nodes - 1
    }
}

impl fmt::Display for Consistency {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            Consistency::Default => "default",
            Consistency::One => "one",
            Consistency::Two => "two",
            Consistency::Three => "three",
            Consistency::Quorum => "quorum",
            Consistency::All => "all",
        };
        f.write_str(name)
    }
}

/// One counter as read back from the store.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct TallyRow {
    pub district_id: DistrictId,
    pub party_id: PartyId,
    pub candidate_id: CandidateId,
    pub votes: u64,
}

impl TallyRow {
    pub fn target(&self) -> VoteTarget {
        VoteTarget::new(self.district_id, self.party_id, self.candidate_id)
    }
}

impl fmt::Display for TallyRow {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{} votes={}", self.target(), self.votes)
    }
}

/// The three operations the vote pipeline needs from a counter store.
///
/// Increments are not idempotent: every call is a distinct increment, and
/// nothing here retries.
#[async_trait]
pub trait CounterStore: Send + Sync {
    /// Adds one vote to the counter keyed by `target`.
    async fn increment(
        &self,
        target: VoteTarget,
        consistency: Consistency,
    ) -> Result<(), StoreError>;

    /// Returns every counter currently visible for the district, in no
    /// particular order.
    async fn read_district(
        &self,
        district_id: DistrictId,
    ) -> Result<Vec<TallyRow>, StoreError>;

    /// Resets every counter.
    async fn truncate(&self, consistency: Consistency)
        -> Result<(), StoreError>;
}

#[async_trait]
impl<S: CounterStore + ?Sized> CounterStore for std::sync::Arc<S> {
    async fn increment(
        &self,
        target: VoteTarget,
        consistency: Consistency,
    ) -> Result<(), StoreError> {
        (**self).increment(target, consistency).await
    }

    async fn read_district(
        &self,
        district_id: DistrictId,
    ) -> Result<Vec<TallyRow>, StoreError> {
        (**self).read_district(district_id).await
    }

    async fn truncate(
        &self,
        consistency: Consistency,
    ) -> Result<(), StoreError> {
        (**self).truncate(consistency).await
    }
}
