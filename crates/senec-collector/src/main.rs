use std::env;
use std::sync::Arc;
use std::time::Duration;

use anyhow::{Context, Result};
use metrics::counter;
use metrics_exporter_prometheus::PrometheusBuilder;
use tokio::net::TcpListener;
use tokio::sync::watch;
use tokio::task::JoinSet;
use tokio::time::sleep;
use tracing::{info, warn};

use lala_client::{LalaClient, Transport};
use poller_actor::{ActorConfig, PollCycle, PollerActor};
use senec_collector::shutdown::{drain_pollers, PollerSet};
use senec_collector::{server, CollectorConfig, ServerState};
use state_store::{MemoryStore, SqliteStore, StateStore};
use types::DeviceIdentity;

#[tokio::main]
async fn main() -> Result<()> {
    tracing_subscriber::fmt::init();

    let config_path = parse_config_arg();
    let config = CollectorConfig::load_with_path(config_path).context("load config failed")?;
    config.validate().context("config validation failed")?;
    let (shutdown_tx, shutdown_rx) = watch::channel(false);

    let metrics = PrometheusBuilder::new()
        .install_recorder()
        .context("metrics recorder install failed")?;
    let connection = Arc::new(watch::channel(false).0);

    let (store, sqlite): (Arc<dyn StateStore>, Option<SqliteStore>) = match &config.store_path {
        Some(path) => {
            let sqlite = SqliteStore::new(path)
                .await
                .context("state store init failed")?;
            (Arc::new(sqlite.clone()), Some(sqlite))
        }
        None => {
            info!("no store.path configured, keeping states in memory");
            (Arc::new(MemoryStore::new()), None)
        }
    };

    let client = LalaClient::new(config.http.clone()).context("http client init failed")?;
    let transport: Arc<dyn Transport> = Arc::new(client);

    let server_handle = match config.listen.as_deref() {
        Some(addr) => {
            let listener = TcpListener::bind(addr)
                .await
                .with_context(|| format!("bind {addr} failed"))?;
            info!(addr, "serving /metrics and /health");
            let state = ServerState {
                host: config.device.host.clone(),
                connected: connection.subscribe(),
                metrics,
            };
            let shutdown = shutdown_rx.clone();
            Some(tokio::spawn(async move {
                if let Err(err) = server::serve(listener, state, shutdown).await {
                    warn!(error = %err, "metrics server failed");
                }
            }))
        }
        None => None,
    };

    let parts = PollerParts {
        identity: config.device.clone(),
        transport,
        store,
        connection,
        poller_config: config.poller.clone(),
        shutdown: shutdown_rx.clone(),
    };

    let mut join_set = JoinSet::new();
    spawn_poller(parts.clone(), &mut join_set, Duration::ZERO);

    notify_ready();
    let watchdog_handle = start_watchdog(shutdown_rx.clone());

    let mut shutdown_signal = std::pin::pin!(tokio::signal::ctrl_c());
    loop {
        tokio::select! {
            _ = &mut shutdown_signal => {
                info!("shutdown signal received");
                let _ = shutdown_tx.send(true);
                break;
            }
            maybe_result = join_set.join_next() => {
                match maybe_result {
                    Some(Ok((host, outcome))) => {
                        if let Err(err) = outcome {
                            warn!(host = %host, error = %err, "poller exited with error");
                        } else {
                            info!(host = %host, "poller exited cleanly");
                        }
                        counter!("senec_poller_respawns_total", "host" => host).increment(1);
                        spawn_poller(parts.clone(), &mut join_set, config.respawn_delay());
                    }
                    Some(Err(err)) => {
                        warn!(error = %err, "poller task failed");
                        spawn_poller(parts.clone(), &mut join_set, config.respawn_delay());
                    }
                    None => break,
                }
            }
        }
    }

    drain_pollers(
        &mut join_set,
        config.shutdown_grace(),
        &config.device.host,
        parts.store.as_ref(),
        &parts.connection,
    )
    .await;

    if let Some(handle) = server_handle {
        let _ = handle.await;
    }
    if let Some(handle) = watchdog_handle {
        let _ = handle.await;
    }
    if let Some(sqlite) = sqlite {
        sqlite.close().await;
    }
    Ok(())
}

#[derive(Clone)]
struct PollerParts {
    identity: DeviceIdentity,
    transport: Arc<dyn Transport>,
    store: Arc<dyn StateStore>,
    connection: Arc<watch::Sender<bool>>,
    poller_config: ActorConfig,
    shutdown: watch::Receiver<bool>,
}

fn spawn_poller(parts: PollerParts, join_set: &mut PollerSet, delay: Duration) {
    let host = parts.identity.host.clone();
    join_set.spawn(async move {
        if delay > Duration::ZERO {
            sleep(delay).await;
        }
        if *parts.shutdown.borrow() {
            return (host, Ok(()));
        }
        let cycle = PollCycle::new(parts.identity, parts.transport, parts.store)
            .with_connection_status(parts.connection);
        let actor = PollerActor::new(cycle, parts.shutdown, parts.poller_config);
        (host, actor.run().await)
    });
}

fn parse_config_arg() -> Option<String> {
    let mut args = env::args().skip(1);
    while let Some(arg) = args.next() {
        if arg == "--config" {
            return args.next();
        }
        if let Some(path) = arg.strip_prefix("--config=") {
            return Some(path.to_string());
        }
    }
    None
}

#[cfg(target_os = "linux")]
fn notify_ready() {
    if let Err(err) = sd_notify::notify(true, &[sd_notify::NotifyState::Ready]) {
        warn!(error = %err, "systemd ready notify failed");
    }
}

#[cfg(not(target_os = "linux"))]
fn notify_ready() {}

#[cfg(target_os = "linux")]
fn start_watchdog(mut shutdown: watch::Receiver<bool>) -> Option<tokio::task::JoinHandle<()>> {
    let interval = watchdog_interval()?;
    Some(tokio::spawn(async move {
        loop {
            tokio::select! {
                _ = sleep(interval) => {
                    let notified = sd_notify::notify(false, &[sd_notify::NotifyState::Watchdog]);
                    if let Err(err) = notified {
                        warn!(error = %err, "systemd watchdog notify failed");
                    }
                }
                changed = shutdown.changed() => {
                    if changed.is_err() || *shutdown.borrow() {
                        break;
                    }
                }
            }
        }
    }))
}

#[cfg(not(target_os = "linux"))]
fn start_watchdog(_shutdown: watch::Receiver<bool>) -> Option<tokio::task::JoinHandle<()>> {
    None
}

#[cfg(target_os = "linux")]
fn watchdog_interval() -> Option<Duration> {
    let watchdog_usec = env::var("WATCHDOG_USEC").ok()?.parse::<u64>().ok()?;
    if let Some(pid) = env::var("WATCHDOG_PID")
        .ok()
        .and_then(|value| value.parse::<u32>().ok())
    {
        if pid != std::process::id() {
            return None;
        }
    }

    let interval = watchdog_usec.saturating_div(2).max(100_000);
    Some(Duration::from_micros(interval))
}
