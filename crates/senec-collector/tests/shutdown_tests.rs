use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;
use std::time::{Duration, Instant};

use async_trait::async_trait;
use lala_client::{ClientError, Transport};
use poller_actor::{ActorConfig, PollCycle, PollerActor, CONNECTION_KEY};
use senec_collector::shutdown::{drain_pollers, PollerSet};
use state_store::{MemoryStore, StateStore};
use tokio::sync::watch;
use tokio::time::{sleep, timeout};
use types::{DeviceIdentity, TelemetryValue};

const PROBE_REPLY: &str = r#"{"STATISTIC":{"STAT_DAY_E_HOUSE":"fl_41200000"}}"#;
const POLL_REPLY: &str = r#"{"ENERGY":{"STAT_STATE":"u8_05"}}"#;

/// Answers the probe, then stalls every later request for `stall`.
struct StallingTransport {
    calls: AtomicUsize,
    stall: Duration,
}

#[async_trait]
impl Transport for StallingTransport {
    async fn post(&self, _url: &str, _body: &str) -> Result<String, ClientError> {
        if self.calls.fetch_add(1, Ordering::SeqCst) == 0 {
            return Ok(PROBE_REPLY.to_string());
        }
        sleep(self.stall).await;
        Ok(POLL_REPLY.to_string())
    }
}

struct Running {
    join_set: PollerSet,
    store: Arc<MemoryStore>,
    connection: Arc<watch::Sender<bool>>,
    shutdown: watch::Sender<bool>,
}

async fn start(stall: Duration) -> Running {
    let transport = Arc::new(StallingTransport {
        calls: AtomicUsize::new(0),
        stall,
    });
    let store = Arc::new(MemoryStore::new());
    let connection = Arc::new(watch::channel(false).0);
    let (shutdown_tx, shutdown_rx) = watch::channel(false);

    let cycle = PollCycle::new(
        DeviceIdentity::new("senec.test"),
        transport.clone(),
        store.clone(),
    )
    .with_connection_status(connection.clone());
    let actor = PollerActor::new(cycle, shutdown_rx, ActorConfig::default());

    let mut join_set = PollerSet::new();
    join_set.spawn(async move { ("senec.test".to_string(), actor.run().await) });

    timeout(Duration::from_secs(5), async {
        while transport.calls.load(Ordering::SeqCst) < 2 {
            sleep(Duration::from_millis(5)).await;
        }
    })
    .await
    .expect("poll request in flight");

    Running {
        join_set,
        store,
        connection,
        shutdown: shutdown_tx,
    }
}

#[tokio::test]
async fn stuck_fetch_is_aborted_and_connection_cleared() {
    let Running {
        mut join_set,
        store,
        connection,
        shutdown,
    } = start(Duration::from_secs(30)).await;
    assert_eq!(
        store.get_last(CONNECTION_KEY).await.expect("get"),
        Some(TelemetryValue::Bool(true))
    );

    shutdown.send(true).expect("shutdown");
    let started = Instant::now();
    let drained = drain_pollers(
        &mut join_set,
        Duration::from_millis(200),
        "senec.test",
        store.as_ref(),
        &connection,
    )
    .await;

    assert!(!drained);
    assert!(started.elapsed() < Duration::from_secs(5));
    assert!(join_set.is_empty());
    assert!(!*connection.borrow());
    assert_eq!(
        store.get_last(CONNECTION_KEY).await.expect("get"),
        Some(TelemetryValue::Bool(false))
    );
}

#[tokio::test]
async fn finished_fetch_drains_gracefully() {
    let Running {
        mut join_set,
        store,
        connection,
        shutdown,
    } = start(Duration::from_millis(50)).await;

    shutdown.send(true).expect("shutdown");
    let drained = drain_pollers(
        &mut join_set,
        Duration::from_secs(5),
        "senec.test",
        store.as_ref(),
        &connection,
    )
    .await;

    assert!(drained);
    assert!(!*connection.borrow());
    assert_eq!(
        store.get_last(CONNECTION_KEY).await.expect("get"),
        Some(TelemetryValue::Bool(false))
    );
    assert_eq!(
        store.get_last("ENERGY.STAT_STATE").await.expect("get"),
        Some(TelemetryValue::Integer(5))
    );
}
