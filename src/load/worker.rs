use std::sync::Arc;

use tokio::sync::{mpsc, oneshot};
use tracing::{debug, error};

use crate::{
    election::VoteTarget,
    store::{Consistency, CounterStore},
};

/// Where an idle worker waits for its next vote. The dispatcher only ever
/// fills a slot it has taken off the idle queue, so nothing is buffered
/// between a tick and the worker that serves it.
pub(super) type Slot = oneshot::Sender<VoteTarget>;

#[derive(Debug, Default, Clone, Copy)]
pub(super) struct WorkerReport {
    pub submitted: u64,
    pub failed: bool,
}

/// Submits votes handed over by the dispatcher until the handoff is closed,
/// or until the first failed submission.
pub(super) async fn submitter<S: CounterStore + ?Sized>(
    store: Arc<S>,
    idle: mpsc::Sender<Slot>,
) -> WorkerReport {
    let mut report = WorkerReport::default();
    loop {
        let (slot, next_vote) = oneshot::channel();
        if idle.send(slot).await.is_err() {
            break;
        }
        // a dropped slot means the dispatcher closed the handoff while we
        // were queued
        let Ok(target) = next_vote.await else {
            break;
        };
        match store.increment(target, Consistency::Default).await {
            Ok(()) => report.submitted += 1,
            Err(e) => {
                error!(%target, error = %e, "vote failed, stopping worker");
                report.failed = true;
                break;
            }
        }
    }
    debug!(submitted = report.submitted, "worker finished");
    report
}
