//! Sources of workload lifecycle notifications.
//!
//! A source delivers [`WorkloadEvent`]s at least once, without ordering guarantees
//! across workloads, until it is told to stop. [`deliver`] is the loop every source
//! ends in; [`KubernetesSource`] feeds it from a pod watch.
mod error;
mod kubernetes;

pub use error::{Error, Result};
pub use kubernetes::{KubernetesSource, PodTracker};

use futures::{Stream, StreamExt};

use crate::workload::{WorkloadEvent, WorkloadHandler};

/// Hands every event of `events` to `handler`, one at a time, until `shutdown`
/// resolves.
///
/// # Errors
///
/// Returns [`Error::StreamEnded`] if `events` ends before `shutdown` resolves; a
/// source that stops delivering leaves the inventory without a way to converge.
pub async fn deliver<S, H>(
    events: S,
    handler: &H,
    shutdown: impl Future<Output = ()>,
) -> Result<()>
where
    S: Stream<Item = WorkloadEvent>,
    H: WorkloadHandler + ?Sized,
{
    let events = events.fuse();
    tokio::pin!(events);
    tokio::pin!(shutdown);

    let mut delivered: u64 = 0;
    loop {
        tokio::select! {
            biased;
            _ = &mut shutdown => {
                log::info!("Stopping workload delivery after {} events", delivered);
                return Ok(());
            }
            event = events.next() => match event {
                Some(event) => {
                    log::trace!("Delivering {:?}", event);
                    handler.handle(&event);
                    delivered += 1;
                }
                None => return Err(Error::StreamEnded),
            },
        }
    }
}
