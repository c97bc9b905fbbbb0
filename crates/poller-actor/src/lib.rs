use std::sync::Arc;
use std::time::{Duration, Instant};

use field_catalog::{resolve, Resolution, STATE_TEXT_FIELD, STATE_TEXT_KEY};
use lala_client::{ClientError, Transport};
use metrics::{counter, gauge, histogram};
use senec_parser::{decode_document, poll_request, probe_request, ParserError};
use state_store::{StateMeta, StateStore, StoreError};
use thiserror::Error;
use tokio::sync::watch;
use tokio::time::sleep;
use tracing::{debug, info, warn};
use types::{DeviceIdentity, TelemetryValue, ValueKind};

/// State key mirroring the connection indicator.
pub const CONNECTION_KEY: &str = "info.connection";

#[derive(Debug, Clone)]
pub struct ActorConfig {
    pub poll_interval: Duration,
}

impl Default for ActorConfig {
    fn default() -> Self {
        Self {
            poll_interval: Duration::from_secs(10),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CycleState {
    Idle,
    Connecting,
    Polling,
    Resolving,
    Publishing,
    Scheduled,
    Failed,
}

#[derive(Debug, Error)]
pub enum PollerError {
    #[error("error connecting to Senec (host: {host}): {source}")]
    Connect {
        host: String,
        #[source]
        source: ClientError,
    },
    #[error("error reading from Senec (host: {host}): {source}")]
    Fetch {
        host: String,
        #[source]
        source: ClientError,
    },
    #[error("malformed payload from Senec (host: {host}): {source}")]
    Payload {
        host: String,
        #[source]
        source: ParserError,
    },
    #[error("state store error: {0}")]
    Store(#[from] StoreError),
    #[error("poll requested while {0:?}")]
    NotConnected(CycleState),
}

#[derive(Debug, Clone, PartialEq)]
pub struct ResolvedField {
    pub key: String,
    pub resolution: Resolution,
}

#[derive(Debug, Clone, Default, PartialEq)]
pub struct CycleReport {
    /// Number of fields resolved, including synthesized ones.
    pub resolved: usize,
    /// Keys whose value changed and was acknowledged, in document order.
    pub published: Vec<String>,
}

/// Decodes a response body and resolves every field against the catalog,
/// appending the synthesized system-state text when `ENERGY.STAT_STATE` is present.
pub fn resolve_body(body: &str) -> Result<Vec<ResolvedField>, ParserError> {
    let snapshot = decode_document(body)?;

    let mut resolved: Vec<ResolvedField> = snapshot
        .fields()
        .iter()
        .map(|field| ResolvedField {
            key: field.key(),
            resolution: resolve(&field.category, &field.field, field.raw),
        })
        .collect();

    if let Some(state) = snapshot.get("ENERGY", "STAT_STATE") {
        resolved.push(ResolvedField {
            key: STATE_TEXT_KEY.to_string(),
            resolution: resolve("ENERGY", STATE_TEXT_FIELD, state),
        });
    }

    Ok(resolved)
}

/// Forces the stored connection state to false without a running cycle,
/// e.g. after the poller task was aborted mid-fetch.
pub async fn clear_connection(store: &dyn StateStore, host: &str) -> Result<(), StoreError> {
    gauge!("senec_connected", "host" => host.to_string()).set(0.0);
    write_connection(store, false).await
}

async fn write_connection(store: &dyn StateStore, connected: bool) -> Result<(), StoreError> {
    let meta = StateMeta::new("Device connected", "", ValueKind::Boolean);
    store.ensure_registered(CONNECTION_KEY, &meta).await?;
    store
        .set_if_changed(CONNECTION_KEY, &TelemetryValue::Bool(connected))
        .await?;
    Ok(())
}

/// One device's probe/poll/publish state machine.
pub struct PollCycle {
    identity: DeviceIdentity,
    url: String,
    transport: Arc<dyn Transport>,
    store: Arc<dyn StateStore>,
    state: CycleState,
    connected: Arc<watch::Sender<bool>>,
}

impl PollCycle {
    pub fn new(
        identity: DeviceIdentity,
        transport: Arc<dyn Transport>,
        store: Arc<dyn StateStore>,
    ) -> Self {
        let (connected, _) = watch::channel(false);
        Self {
            url: identity.lala_url(),
            identity,
            transport,
            store,
            state: CycleState::Idle,
            connected: Arc::new(connected),
        }
    }

    /// Shares an externally owned connection indicator, so it outlives respawns.
    pub fn with_connection_status(mut self, connected: Arc<watch::Sender<bool>>) -> Self {
        self.connected = connected;
        self
    }

    pub fn identity(&self) -> &DeviceIdentity {
        &self.identity
    }

    pub fn state(&self) -> CycleState {
        self.state
    }

    pub fn is_connected(&self) -> bool {
        *self.connected.borrow()
    }

    pub fn subscribe_connection(&self) -> watch::Receiver<bool> {
        self.connected.subscribe()
    }

    /// Forces the connection indicator to false, as on process start.
    pub async fn reset(&mut self) -> Result<(), PollerError> {
        self.transition(CycleState::Idle);
        self.publish_connection(false).await?;
        Ok(())
    }

    /// Sends the single-field probe.
    pub async fn connect(&mut self) -> Result<(), PollerError> {
        self.transition(CycleState::Connecting);
        info!(host = %self.identity, "connecting to Senec");

        if let Err(source) = self.transport.post(&self.url, &probe_request()).await {
            self.fail().await;
            return Err(PollerError::Connect {
                host: self.identity.host.clone(),
                source,
            });
        }

        info!(host = %self.identity, "connected to Senec");
        if let Err(err) = self.publish_connection(true).await {
            self.fail().await;
            return Err(err.into());
        }
        self.transition(CycleState::Polling);
        Ok(())
    }

    /// Runs one fetch/resolve/publish round. Only valid after a successful probe.
    pub async fn poll(&mut self) -> Result<CycleReport, PollerError> {
        if !matches!(self.state, CycleState::Polling | CycleState::Scheduled) {
            return Err(PollerError::NotConnected(self.state));
        }

        let host = self.identity.host.clone();
        let started = Instant::now();
        counter!("senec_poll_cycles_total", "host" => host.clone()).increment(1);

        match self.run_cycle().await {
            Ok(report) => {
                self.transition(CycleState::Scheduled);
                counter!("senec_states_published_total", "host" => host.clone())
                    .increment(report.published.len() as u64);
                histogram!("senec_poll_duration_seconds", "host" => host)
                    .record(started.elapsed().as_secs_f64());
                Ok(report)
            }
            Err(err) => {
                counter!("senec_poll_failures_total", "host" => host).increment(1);
                self.fail().await;
                Err(err)
            }
        }
    }

    /// Leaves the cycle idle and clears the connection indicator.
    pub async fn shutdown(&mut self) {
        self.transition(CycleState::Idle);
        if let Err(err) = self.publish_connection(false).await {
            warn!(host = %self.identity, error = %err, "connection state reset failed");
        }
    }

    async fn run_cycle(&mut self) -> Result<CycleReport, PollerError> {
        self.transition(CycleState::Polling);
        let body = self
            .transport
            .post(&self.url, &poll_request())
            .await
            .map_err(|source| PollerError::Fetch {
                host: self.identity.host.clone(),
                source,
            })?;
        debug!(host = %self.identity, body = %body, "received data from Senec");

        self.transition(CycleState::Resolving);
        let resolved = resolve_body(&body).map_err(|source| PollerError::Payload {
            host: self.identity.host.clone(),
            source,
        })?;

        self.transition(CycleState::Publishing);
        let mut published = Vec::new();
        for field in &resolved {
            if self.publish(field).await? {
                published.push(field.key.clone());
            }
        }

        Ok(CycleReport {
            resolved: resolved.len(),
            published,
        })
    }

    async fn publish(&self, field: &ResolvedField) -> Result<bool, StoreError> {
        let resolution = &field.resolution;
        let meta = StateMeta::new(
            resolution.description.clone(),
            resolution.unit.as_str(),
            resolution.value.kind(),
        );
        self.store.ensure_registered(&field.key, &meta).await?;

        let changed = self.store.set_if_changed(&field.key, &resolution.value).await?;
        if changed {
            debug!(key = %field.key, value = %resolution.value, "state updated");
        }
        Ok(changed)
    }

    async fn publish_connection(&self, connected: bool) -> Result<(), StoreError> {
        self.connected.send_replace(connected);
        gauge!("senec_connected", "host" => self.identity.host.clone())
            .set(if connected { 1.0 } else { 0.0 });
        write_connection(self.store.as_ref(), connected).await
    }

    async fn fail(&mut self) {
        self.transition(CycleState::Failed);
        if let Err(err) = self.publish_connection(false).await {
            warn!(host = %self.identity, error = %err, "connection state reset failed");
        }
    }

    fn transition(&mut self, next: CycleState) {
        if self.state != next {
            debug!(host = %self.identity, from = ?self.state, to = ?next, "cycle transition");
            self.state = next;
        }
    }
}

/// A polling task responsible for one device. Cycles run strictly one after another;
/// the delay is armed only once the previous cycle has finished.
pub struct PollerActor {
    cycle: PollCycle,
    shutdown: watch::Receiver<bool>,
    config: ActorConfig,
}

impl PollerActor {
    pub fn new(cycle: PollCycle, shutdown: watch::Receiver<bool>, config: ActorConfig) -> Self {
        Self {
            cycle,
            shutdown,
            config,
        }
    }

    /// Probes, then polls until shutdown. A failed cycle ends the run with its error.
    pub async fn run(mut self) -> Result<(), PollerError> {
        self.cycle.reset().await?;
        self.cycle.connect().await?;
        let mut iteration = 0u64;

        loop {
            if *self.shutdown.borrow() {
                info!(host = %self.cycle.identity(), "poller shutdown requested");
                break;
            }

            let cycle_start = Instant::now();
            let report = self.cycle.poll().await?;
            iteration = iteration.wrapping_add(1);
            info!(
                host = %self.cycle.identity(),
                iteration,
                elapsed_ms = cycle_start.elapsed().as_millis(),
                resolved = report.resolved,
                published = report.published.len(),
                delay_ms = self.config.poll_interval.as_millis(),
                "poll cycle complete"
            );

            tokio::select! {
                _ = sleep(self.config.poll_interval) => {},
                changed = self.shutdown.changed() => {
                    if changed.is_err() || *self.shutdown.borrow() {
                        info!(host = %self.cycle.identity(), "poller shutdown requested");
                        break;
                    }
                }
            }
        }

        self.cycle.shutdown().await;
        Ok(())
    }
}
