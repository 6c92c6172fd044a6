use std::sync::{Mutex, MutexGuard};

use async_trait::async_trait;
use hashbrown::HashMap;

use super::{Consistency, CounterStore, StoreError, TallyRow};
use crate::election::{DistrictId, VoteTarget};

type Counters = HashMap<VoteTarget, u64>;

/// Counters kept in process memory. There is a single replica, so every
/// consistency level is trivially met.
#[derive(Debug, Default)]
pub struct MemoryStore {
    counters: Mutex<Counters>,
}

impl MemoryStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// Current value of one counter, zero if it was never incremented.
    pub fn get(&self, target: VoteTarget) -> Result<u64, StoreError> {
        Ok(self.lock()?.get(&target).copied().unwrap_or(0))
    }

    /// Sum of all counters.
    pub fn total(&self) -> Result<u64, StoreError> {
        let counters = self.lock()?;
        counters
            .values()
            .try_fold(0u64, |sum, votes| sum.checked_add(*votes))
            .ok_or_else(|| {
                StoreError::Unavailable("counter total overflows u64".into())
            })
    }

    /// Overwrites a counter, for seeding a store with known tallies.
    pub fn set(
        &self,
        target: VoteTarget,
        votes: u64,
    ) -> Result<(), StoreError> {
        self.lock()?.insert(target, votes);
        Ok(())
    }

    fn lock(&self) -> Result<MutexGuard<'_, Counters>, StoreError> {
        self.counters.lock().map_err(|_| {
            StoreError::Unavailable("counter lock poisoned".into())
        })
    }
}

#[async_trait]
impl CounterStore for MemoryStore {
    async fn increment(
        &self,
        target: VoteTarget,
        _consistency: Consistency,
    ) -> Result<(), StoreError> {
        *self.lock()?.entry(target).or_insert(0) += 1;
        Ok(())
    }

    async fn read_district(
        &self,
        district_id: DistrictId,
    ) -> Result<Vec<TallyRow>, StoreError> {
        Ok(self
            .lock()?
            .iter()
            .filter(|(target, _)| target.district_id == district_id)
            .map(|(target, votes)| TallyRow {
                district_id: target.district_id,
                party_id: target.party_id,
                candidate_id: target.candidate_id,
                votes: *votes,
            })
            .collect())
    }

    async fn truncate(
        &self,
        _consistency: Consistency,
    ) -> Result<(), StoreError> {
        self.lock()?.clear();
        Ok(())
    }
}
