use thiserror::Error;

use crate::{
    election::{DistrictId, ElectionError, VoteTarget},
    store::{StoreError, TallyRow},
};

#[derive(Debug, Error)]
pub enum Error {
    #[error("invalid parameters: {0}")]
    InvalidParameters(String),
    #[error("vote failed ({target}): {source}")]
    Submission {
        target: VoteTarget,
        #[source]
        source: StoreError,
    },
    #[error("failed to read tallies for district {district_id}: {source}")]
    Read {
        district_id: DistrictId,
        #[source]
        source: StoreError,
    },
    #[error("stored tally does not match the election ({reason}): {row}")]
    ReconciliationMismatch {
        row: TallyRow,
        reason: &'static str,
    },
    #[error("no votes recorded")]
    NoVotesRecorded,
    #[error("vote total for {0} does not fit in 64 bits")]
    TallyOverflow(&'static str),
    #[error("failed to clear votes: {0}")]
    Truncate(#[source] StoreError),
    #[error(
        "every worker stopped after failures, {dispatched} votes dispatched"
    )]
    WorkersExhausted { dispatched: u64 },
    #[error(transparent)]
    Election(#[from] ElectionError),
}
