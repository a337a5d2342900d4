use crate::classify::classify;
use crate::config::MAX_WORKERS;
use crate::probe::Probe;
use crate::types::Finding;
use std::sync::Arc;
use tokio::sync::{mpsc, Semaphore};
use tokio::task::{JoinError, JoinSet};
use tracing::{debug, error};

/// Sender side of the live finding stream consumed by a reporter.
pub type FindingSink = mpsc::UnboundedSender<Finding>;

/// Probe every candidate with at most `workers` probes in flight and classify each outcome.
///
/// - Limits concurrent probes using a `Semaphore`; a permit is held for the whole probe.
/// - Returns exactly one `Finding` per candidate, in completion order.
/// - When a `sink` is given, each finding is also sent there as soon as it completes.
///
/// A panic inside a probe task (an impossible outcome reaching the classifier)
/// is re-raised here rather than dropped.
pub async fn run_probes<P, I>(
    probe: Arc<P>,
    candidates: I,
    workers: usize,
    sink: Option<FindingSink>,
) -> Vec<Finding>
where
    P: Probe,
    I: IntoIterator<Item = P::Candidate>,
{
    let workers = workers.clamp(1, MAX_WORKERS);
    let sem = Arc::new(Semaphore::new(workers));
    let mut set = JoinSet::new();
    let mut findings = Vec::new();
    let mut dispatched = 0u64;

    for candidate in candidates {
        let permit = sem
            .clone()
            .acquire_owned()
            .await
            .expect("semaphore in scope");
        let probe = probe.clone();
        dispatched += 1;

        set.spawn(async move {
            let outcome = {
                let _permit = permit; // keep permit until the probe completes
                probe.execute(candidate).await
            };
            classify(&outcome)
        });

        // Reap finished tasks so results don't pile up in the set on large runs.
        while let Some(res) = set.try_join_next() {
            collect(res, &mut findings, sink.as_ref());
        }
    }

    while let Some(res) = set.join_next().await {
        collect(res, &mut findings, sink.as_ref());
    }

    debug!(
        "Probed {} candidates with {} workers, {} findings",
        dispatched,
        workers,
        findings.len()
    );
    findings
}

fn collect(res: Result<Finding, JoinError>, findings: &mut Vec<Finding>, sink: Option<&FindingSink>) {
    match res {
        Ok(finding) => {
            if let Some(tx) = sink {
                // A closed receiver only means nobody is watching live output.
                let _ = tx.send(finding.clone());
            }
            findings.push(finding);
        }
        Err(e) if e.is_panic() => std::panic::resume_unwind(e.into_panic()),
        Err(e) => error!("probe task did not complete: {e}"),
    }
}
