use tracing::{info, warn};

use crate::{
    election::ResolvedVote,
    store::{Consistency, CounterStore},
    Error, Result,
};

/// Consistency of a single interactive vote. Load-generated votes use the
/// store default instead and trade durability for throughput.
pub const INTERACTIVE_CONSISTENCY: Consistency = Consistency::Three;

/// Casts one vote. A failure is returned to the caller with the target it
/// was meant for; nothing is retried.
pub async fn cast_vote<S>(store: &S, vote: &ResolvedVote<'_>) -> Result<()>
where
    S: CounterStore + ?Sized,
{
    let target = vote.target();
    info!(
        "voting for candidate {} (ID: {}) from party {} (ID: {}) in district \
         {} (ID: {})",
        vote.candidate.name,
        target.candidate_id,
        vote.party.party_name,
        target.party_id,
        vote.district.name,
        target.district_id,
    );
    store
        .increment(target, INTERACTIVE_CONSISTENCY)
        .await
        .map_err(|source| Error::Submission { target, source })
}

/// Resets every counter. Requires every replica to acknowledge.
pub async fn clear_votes<S>(store: &S) -> Result<()>
where
    S: CounterStore + ?Sized,
{
    warn!("clearing all votes");
    store
        .truncate(Consistency::All)
        .await
        .map_err(Error::Truncate)
}
