//! Shared helpers for integration tests.
#![allow(dead_code)]

use std::{
    collections::{HashMap, HashSet},
    sync::{
        atomic::{AtomicU64, AtomicUsize, Ordering},
        Mutex,
    },
    time::Duration,
};

use async_trait::async_trait;
use tokio::time::Instant;
use votes::{
    election::{
        Candidate, Catalog, District, DistrictId, Election, Party, VoteTarget,
    },
    store::{Consistency, CounterStore, MemoryStore, StoreError, TallyRow},
};

/// Builds `districts x parties x candidates` with ids starting at 1 and
/// names `d{d}`, `p{p}`, `c{d}.{p}.{c}`.
pub fn grid(districts: u32, parties: u32, candidates: u32) -> Election {
    Election {
        election_id: "integration".into(),
        districts: (1..=districts)
            .map(|d| District {
                district_id: d,
                name: format!("d{d}"),
                mandates: 4,
                parties: (1..=parties)
                    .map(|p| Party {
                        party_id: p,
                        party_name: format!("p{p}"),
                        candidates: (1..=candidates)
                            .map(|c| Candidate {
                                candidate_id: c,
                                name: format!("c{d}.{p}.{c}"),
                            })
                            .collect(),
                    })
                    .collect(),
            })
            .collect(),
    }
}

pub fn catalog(districts: u32, parties: u32, candidates: u32) -> Catalog {
    Catalog::new(grid(districts, parties, candidates)).unwrap()
}

/// A memory store with injectable failures, latency and rows, that records
/// how it was called.
#[derive(Default)]
pub struct TestStore {
    pub inner: MemoryStore,
    increments: AtomicU64,
    failing_increments: HashSet<u64>,
    fail_every_increment: bool,
    failing_reads: HashSet<DistrictId>,
    extra_rows: Vec<(DistrictId, TallyRow)>,
    delay: Option<Duration>,
    slow_calls: HashMap<u64, Duration>,
    call_times: Mutex<Vec<Instant>>,
    in_flight: AtomicUsize,
    max_in_flight: AtomicUsize,
    consistencies: Mutex<Vec<Consistency>>,
    truncates: Mutex<Vec<Consistency>>,
}

impl TestStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// Fails the increment calls with these 1-based call numbers.
    pub fn failing_calls(
        mut self,
        calls: impl IntoIterator<Item = u64>,
    ) -> Self {
        self.failing_increments = calls.into_iter().collect();
        self
    }

    pub fn failing_every_increment(mut self) -> Self {
        self.fail_every_increment = true;
        self
    }

    pub fn failing_reads(
        mut self,
        districts: impl IntoIterator<Item = DistrictId>,
    ) -> Self {
        self.failing_reads = districts.into_iter().collect();
        self
    }

    /// Rows returned by reads of `district_id` on top of the real counters,
    /// whatever district the rows themselves name.
    pub fn with_rows(
        mut self,
        district_id: DistrictId,
        rows: impl IntoIterator<Item = TallyRow>,
    ) -> Self {
        self.extra_rows
            .extend(rows.into_iter().map(|row| (district_id, row)));
        self
    }

    pub fn with_delay(mut self, delay: Duration) -> Self {
        self.delay = Some(delay);
        self
    }

    /// Delays only the increment call with this 1-based call number.
    pub fn slow_call(mut self, call: u64, delay: Duration) -> Self {
        self.slow_calls.insert(call, delay);
        self
    }

    pub fn increment_calls(&self) -> u64 {
        self.increments.load(Ordering::SeqCst)
    }

    /// When each increment call started, in call order.
    pub fn call_times(&self) -> Vec<Instant> {
        self.call_times.lock().unwrap().clone()
    }

    pub fn max_in_flight(&self) -> usize {
        self.max_in_flight.load(Ordering::SeqCst)
    }

    pub fn consistencies(&self) -> Vec<Consistency> {
        self.consistencies.lock().unwrap().clone()
    }

    pub fn truncates(&self) -> Vec<Consistency> {
        self.truncates.lock().unwrap().clone()
    }
}

#[async_trait]
impl CounterStore for TestStore {
    async fn increment(
        &self,
        target: VoteTarget,
        consistency: Consistency,
    ) -> Result<(), StoreError> {
        let call = self.increments.fetch_add(1, Ordering::SeqCst) + 1;
        self.consistencies.lock().unwrap().push(consistency);
        self.call_times.lock().unwrap().push(Instant::now());

        let in_flight = self.in_flight.fetch_add(1, Ordering::SeqCst) + 1;
        self.max_in_flight.fetch_max(in_flight, Ordering::SeqCst);
        let delay = self.delay.or_else(|| self.slow_calls.get(&call).copied());
        if let Some(delay) = delay {
            tokio::time::sleep(delay).await;
        }
        self.in_flight.fetch_sub(1, Ordering::SeqCst);

        if self.fail_every_increment || self.failing_increments.contains(&call)
        {
            return Err(StoreError::Unavailable(format!(
                "injected failure on call {call}"
            )));
        }
        self.inner.increment(target, consistency).await
    }

    async fn read_district(
        &self,
        district_id: DistrictId,
    ) -> Result<Vec<TallyRow>, StoreError> {
        if self.failing_reads.contains(&district_id) {
            return Err(StoreError::Timeout);
        }
        let mut rows = self.inner.read_district(district_id).await?;
        rows.extend(
            self.extra_rows
                .iter()
                .filter(|(read, _)| *read == district_id)
                .map(|(_, row)| *row),
        );
        Ok(rows)
    }

    async fn truncate(
        &self,
        consistency: Consistency,
    ) -> Result<(), StoreError> {
        self.truncates.lock().unwrap().push(consistency);
        self.inner.truncate(consistency).await
    }
}
