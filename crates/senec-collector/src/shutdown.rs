use std::time::Duration;

use poller_actor::{clear_connection, PollerError};
use state_store::StateStore;
use tokio::sync::watch;
use tokio::task::JoinSet;
use tokio::time::timeout;
use tracing::warn;

pub type PollerSet = JoinSet<(String, Result<(), PollerError>)>;

/// Waits up to `grace` for pollers to stop on their own, then aborts the rest.
/// An aborted poller never reaches its own cleanup, so the connection state is
/// cleared here instead. Returns whether every poller stopped in time.
pub async fn drain_pollers(
    join_set: &mut PollerSet,
    grace: Duration,
    host: &str,
    store: &dyn StateStore,
    connection: &watch::Sender<bool>,
) -> bool {
    let drained = timeout(grace, async {
        while let Some(result) = join_set.join_next().await {
            if let Err(err) = result {
                warn!(error = %err, "poller task join failed");
            }
        }
    })
    .await
    .is_ok();

    if drained {
        return true;
    }

    warn!(host, grace_ms = grace.as_millis(), "poller did not stop in time, aborting");
    join_set.abort_all();
    while join_set.join_next().await.is_some() {}

    connection.send_replace(false);
    if let Err(err) = clear_connection(store, host).await {
        warn!(host, error = %err, "connection state reset failed");
    }
    false
}
