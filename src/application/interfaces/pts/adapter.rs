//! jsonPTS controller adapter
//!
//! Monitoring starts with a bootstrap (station resolution, tank mapping,
//! first clock check, probe discovery) and only then spawns the periodic
//! tasks:
//! - **probe poll**: one `ProbeGetMeasurements` per probe, persisted and
//!   published together
//! - **transaction poll**: `ReportGetPumpTransactions` since the last stored sale
//! - **clock check**: drift correction against the authoritative time source

use std::collections::HashMap;
use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use chrono::{DateTime, NaiveDateTime, TimeDelta, Utc};
use serde_json::Value;
use tokio::sync::{Mutex, RwLock};
use tracing::{debug, info, warn};

use super::client::{PtsClient, PtsClientConfig};
use super::clock::{check_and_correct, ClockCheck};
use super::packets::{
    parse_probe_measurement, probe_ids, probe_measurement_request, transactions_request,
    GET_PROBES_CONFIGURATION, PROBE_GET_MEASUREMENTS, REPORT_GET_PUMP_TRANSACTIONS,
};
use super::simulator::PtsSimulator;
use crate::application::interfaces::base::{spawn_periodic, AdapterCore, FirstTick, MonitoringSession};
use crate::application::ports::{
    AdapterError, AdapterResult, IngestSummary, RealtimePublisher, TankSnapshot, TelemetryAdapter,
    TimeSource,
};
use crate::domain::{
    AdapterMode, ConnectionState, FuelTransaction, InterfaceSource, InterfaceStatus,
    RepositoryProvider, Station, TankFilter, TankSample, TransactionQuery,
};

#[derive(Debug, Clone)]
pub struct PtsSettings {
    pub interface_code: String,
    pub client: PtsClientConfig,
    pub probe_poll_interval: Duration,
    pub transaction_poll_interval: Duration,
    pub time_check_interval: Duration,
    pub drift_threshold: Duration,
    pub station_poll_interval: Duration,
    /// Transaction window when nothing is stored yet
    pub transaction_lookback: Duration,
    pub force_simulation: bool,
    pub simulated_probes: u32,
    pub base_volume: f64,
}

impl Default for PtsSettings {
    fn default() -> Self {
        Self {
            interface_code: "NFPP".to_string(),
            client: PtsClientConfig::default(),
            probe_poll_interval: Duration::from_secs(10),
            transaction_poll_interval: Duration::from_secs(300),
            time_check_interval: Duration::from_secs(3600),
            drift_threshold: Duration::from_secs(60),
            station_poll_interval: Duration::from_secs(10),
            transaction_lookback: Duration::from_secs(24 * 3600),
            force_simulation: false,
            simulated_probes: 3,
            base_volume: 15000.0,
        }
    }
}

/// Data strategy, chosen once by `initialize()`.
#[derive(Clone)]
enum PtsStrategy {
    Device(Arc<PtsClient>),
    Simulated(Arc<Mutex<PtsSimulator>>),
}

struct PtsInner {
    core: AdapterCore,
    settings: PtsSettings,
    time_source: Arc<dyn TimeSource>,
    strategy: RwLock<Option<PtsStrategy>>,
    station: RwLock<Option<Station>>,
    probes: RwLock<Vec<i32>>,
    /// Probe id (tank number) → tank id
    tanks: RwLock<HashMap<u32, i32>>,
    /// Latest sample per probe
    live: RwLock<HashMap<u32, TankSample>>,
    /// Device offset from UTC, learned from the last clock read
    utc_offset_minutes: RwLock<i32>,
}

/// jsonPTS forecourt/probe controller adapter.
#[derive(Clone)]
pub struct PtsAdapter {
    inner: Arc<PtsInner>,
}

impl PtsAdapter {
    pub fn new(
        settings: PtsSettings,
        repos: Arc<dyn RepositoryProvider>,
        publisher: Arc<dyn RealtimePublisher>,
        time_source: Arc<dyn TimeSource>,
    ) -> Self {
        Self {
            inner: Arc::new(PtsInner {
                core: AdapterCore::new(&settings.interface_code, repos, publisher),
                settings,
                time_source,
                strategy: RwLock::new(None),
                station: RwLock::new(None),
                probes: RwLock::new(Vec::new()),
                tanks: RwLock::new(HashMap::new()),
                live: RwLock::new(HashMap::new()),
                utc_offset_minutes: RwLock::new(0),
            }),
        }
    }

    /// Run one clock check now.
    pub async fn synchronize_clock(&self) -> AdapterResult<ClockCheck> {
        self.inner.synchronize_clock().await
    }
}

impl PtsInner {
    async fn strategy(&self) -> Option<PtsStrategy> {
        self.strategy.read().await.clone()
    }

    fn simulated(&self) -> PtsStrategy {
        PtsStrategy::Simulated(Arc::new(Mutex::new(PtsSimulator::new(
            self.settings.simulated_probes,
            self.settings.base_volume,
        ))))
    }

    async fn synchronize_clock(&self) -> AdapterResult<ClockCheck> {
        let client = match self.strategy().await {
            Some(PtsStrategy::Device(client)) => client,
            Some(PtsStrategy::Simulated(_)) => return Ok(ClockCheck::NotApplicable),
            None => {
                return Err(AdapterError::NotInitialized(
                    self.core.interface_code().to_string(),
                ))
            }
        };
        match check_and_correct(&client, self.time_source.as_ref(), self.settings.drift_threshold).await {
            Ok((check, offset)) => {
                *self.utc_offset_minutes.write().await = offset;
                self.core.record_success().await;
                Ok(check)
            }
            Err(e) => {
                warn!(interface = %self.core.interface_code(), error = %e, "Clock check failed");
                self.core.record_error(&e).await;
                Err(e)
            }
        }
    }

    /// Device-local "now" using the last known offset.
    async fn device_now(&self) -> NaiveDateTime {
        let offset = *self.utc_offset_minutes.read().await;
        Utc::now().naive_utc() + TimeDelta::minutes(i64::from(offset))
    }

    async fn bootstrap(self: Arc<Self>, session: MonitoringSession) {
        let Some(station) = self
            .core
            .await_station(&session, self.settings.station_poll_interval)
            .await
        else {
            return;
        };
        let map = match self.core.tank_map(station.id).await {
            Ok(map) => map,
            Err(e) => {
                warn!(interface = %self.core.interface_code(), error = %e, "Failed to load tanks");
                self.core.record_error(&e).await;
                return;
            }
        };
        let Some(strategy) = self.strategy().await else {
            return;
        };
        match &strategy {
            PtsStrategy::Device(_) => {
                // failures are logged inside; polling proceeds regardless
                let _ = self.synchronize_clock().await;
                self.discover_probes().await;
            }
            PtsStrategy::Simulated(sim) => {
                *self.probes.write().await = sim.lock().await.probes();
            }
        }
        if !self.core.is_current(&session) {
            return;
        }
        let probe_count = self.probes.read().await.len();
        info!(
            interface = %self.core.interface_code(),
            station_id = station.id,
            tanks = map.len(),
            probes = probe_count,
            "Controller bootstrap complete"
        );
        *self.tanks.write().await = map;
        *self.station.write().await = Some(station);

        self.spawn_tasks(&session, matches!(strategy, PtsStrategy::Device(_)));
    }

    fn spawn_tasks(self: Arc<Self>, session: &MonitoringSession, clock_governed: bool) {
        let probe = self.clone();
        let probe_session = session.clone();
        spawn_periodic(
            session,
            "pts-probe-poll",
            self.settings.probe_poll_interval,
            FirstTick::Immediate,
            move || {
                let inner = probe.clone();
                let session = probe_session.clone();
                async move { inner.poll_probes(&session).await }
            },
        );

        let tx = self.clone();
        let tx_session = session.clone();
        spawn_periodic(
            session,
            "pts-transaction-poll",
            self.settings.transaction_poll_interval,
            FirstTick::Immediate,
            move || {
                let inner = tx.clone();
                let session = tx_session.clone();
                async move { inner.poll_transactions(&session).await }
            },
        );

        if clock_governed {
            let clock = self.clone();
            let clock_session = session.clone();
            spawn_periodic(
                session,
                "pts-clock-check",
                self.settings.time_check_interval,
                FirstTick::AfterPeriod,
                move || {
                    let inner = clock.clone();
                    let session = clock_session.clone();
                    async move {
                        if inner.core.is_current(&session) {
                            let _ = inner.synchronize_clock().await;
                        }
                    }
                },
            );
        }
    }

    async fn discover_probes(&self) {
        let Some(PtsStrategy::Device(client)) = self.strategy().await else {
            return;
        };
        match client.call(GET_PROBES_CONFIGURATION, None).await {
            Ok(data) => {
                let ids = probe_ids(&data);
                if ids.is_empty() {
                    warn!(interface = %self.core.interface_code(), "Controller reported no probes");
                } else {
                    info!(interface = %self.core.interface_code(), probes = ?ids, "🔎 Probes discovered");
                }
                *self.probes.write().await = ids;
            }
            Err(e) => {
                warn!(interface = %self.core.interface_code(), error = %e, "Probe discovery failed");
                self.core.record_error(&e).await;
            }
        }
    }

    /// One probe-poll cycle.
    async fn poll_probes(&self, session: &MonitoringSession) {
        if !self.core.is_current(session) {
            return;
        }
        let Some(strategy) = self.strategy().await else {
            return;
        };
        let tag = self.core.source_tag().await;
        let now = Utc::now();

        let samples = match strategy {
            PtsStrategy::Simulated(sim) => {
                self.core.record_success().await;
                sim.lock().await.probe_samples(now, &tag)
            }
            PtsStrategy::Device(client) => {
                if self.probes.read().await.is_empty() {
                    self.discover_probes().await;
                }
                let probes = self.probes.read().await.clone();
                if probes.is_empty() {
                    return;
                }
                match self.measure(&client, &probes, now, &tag).await {
                    Some(samples) => samples,
                    None => return,
                }
            }
        };

        if !self.core.is_current(session) {
            debug!(interface = %self.core.interface_code(), "Discarding probe results after stop");
            return;
        }

        let samples = {
            let tanks = self.tanks.read().await;
            samples
                .into_iter()
                .map(|mut s| {
                    s.tank_id = tanks.get(&s.tank_number).copied();
                    s
                })
                .collect::<Vec<_>>()
        };
        {
            let mut live = self.live.write().await;
            for sample in &samples {
                live.insert(sample.tank_number, sample.clone());
            }
        }
        if let Err(e) = self.core.save_tank_readings(&samples).await {
            warn!(interface = %self.core.interface_code(), error = %e, "Failed to persist probe readings");
            self.core.record_error(&e).await;
        }
        metrics::counter!("telemetry_polls_total", "interface" => self.core.interface_code().to_string())
            .increment(1);
        self.core.emit_tank_data(samples).await;
    }

    /// Query every probe. `None` when the controller is unreachable.
    async fn measure(
        &self,
        client: &PtsClient,
        probes: &[i32],
        now: DateTime<Utc>,
        tag: &str,
    ) -> Option<Vec<TankSample>> {
        let mut samples = Vec::with_capacity(probes.len());
        let mut unreachable = 0;

        for &probe in probes {
            let Ok(tank_number) = u32::try_from(probe) else {
                debug!(probe, "Probe id is not a tank number");
                continue;
            };
            match client
                .call(PROBE_GET_MEASUREMENTS, Some(probe_measurement_request(probe)))
                .await
            {
                Ok(data) => match parse_probe_measurement(&data) {
                    Ok(m) => samples.push(TankSample::online(tank_number, now, m, tag).with_raw(data)),
                    Err(e) => {
                        debug!(probe, error = %e, "Probe offline this cycle");
                        samples.push(TankSample::offline(tank_number, now, tag));
                    }
                },
                Err(e) if e.is_transport() => {
                    warn!(probe, error = %e, "Probe request failed");
                    unreachable += 1;
                    samples.push(TankSample::offline(tank_number, now, tag));
                }
                Err(e) => {
                    debug!(probe, error = %e, "Probe rejected");
                    samples.push(TankSample::offline(tank_number, now, tag));
                }
            }
        }

        if unreachable == samples.len() {
            self.core
                .record_error(format!("controller unreachable at {}", client.base_url()))
                .await;
            self.core.set_connection(ConnectionState::Disconnected).await;
            return None;
        }
        self.core.record_success().await;
        self.core.set_connection(ConnectionState::Connected).await;
        Some(samples)
    }

    /// One transaction-poll cycle.
    async fn poll_transactions(&self, session: &MonitoringSession) {
        if !self.core.is_current(session) {
            return;
        }
        let Some(station) = self.station.read().await.clone() else {
            return;
        };
        let Some(strategy) = self.strategy().await else {
            return;
        };
        let end = self.device_now().await;

        let payload = match strategy {
            PtsStrategy::Simulated(sim) => sim.lock().await.transactions(end),
            PtsStrategy::Device(client) => {
                let start = match self.window_start(station.id, end).await {
                    Some(start) => start,
                    None => return,
                };
                match client
                    .call(REPORT_GET_PUMP_TRANSACTIONS, Some(transactions_request(start, end)))
                    .await
                {
                    Ok(data) => data,
                    Err(e) => {
                        warn!(interface = %self.core.interface_code(), error = %e, "Transaction report failed");
                        self.core.record_error(&e).await;
                        return;
                    }
                }
            }
        };

        if !self.core.is_current(session) {
            return;
        }
        let tag = self.core.source_tag().await;
        match self.core.ingest_transactions(&payload, &station, &tag).await {
            Ok(summary) if summary.received > 0 => {
                info!(
                    interface = %self.core.interface_code(),
                    station_id = station.id,
                    inserted = summary.inserted,
                    duplicates = summary.duplicates,
                    "⛽ Transactions polled"
                );
            }
            Ok(_) => {}
            Err(e) => {
                warn!(interface = %self.core.interface_code(), error = %e, "Failed to store transactions");
                self.core.record_error(&e).await;
            }
        }
    }

    /// Last stored device sale for this station, else `end − lookback`.
    /// Simulated rows never move the device window.
    async fn window_start(&self, station_id: i32, end: NaiveDateTime) -> Option<NaiveDateTime> {
        let source = InterfaceSource::real(self.core.interface_code());
        match self
            .core
            .repos()
            .transactions()
            .latest_occurred_at(station_id, &source)
            .await
        {
            Ok(Some(last)) => Some(last),
            Ok(None) => {
                let lookback = TimeDelta::from_std(self.settings.transaction_lookback)
                    .unwrap_or_else(|_| TimeDelta::hours(24));
                Some(end - lookback)
            }
            Err(e) => {
                warn!(interface = %self.core.interface_code(), error = %e, "Failed to read last transaction time");
                None
            }
        }
    }
}

#[async_trait]
impl TelemetryAdapter for PtsAdapter {
    fn interface_code(&self) -> &str {
        self.inner.core.interface_code()
    }

    fn accept_alias(&self, alias: &str) {
        self.inner.core.add_alias(alias);
    }

    async fn initialize(&self) -> AdapterResult<()> {
        let inner = &self.inner;
        let mut strategy = inner.strategy.write().await;
        if strategy.is_some() {
            return Ok(());
        }

        if inner.settings.force_simulation {
            info!(interface = %inner.core.interface_code(), "🧪 Simulation forced by configuration");
            *strategy = Some(inner.simulated());
            inner.core.set_mode(AdapterMode::Simulated).await;
            return Ok(());
        }

        inner.core.set_connection(ConnectionState::Connecting).await;
        let discovered = match PtsClient::new(inner.settings.client.clone()) {
            Ok(client) => client.discover().await.map(|path| (client, path)),
            Err(e) => Err(e),
        };
        match discovered {
            Ok((client, path)) => {
                info!(
                    interface = %inner.core.interface_code(),
                    base_url = %client.base_url(),
                    path = %path,
                    "✅ Controller connected"
                );
                *strategy = Some(PtsStrategy::Device(Arc::new(client)));
                inner.core.set_mode(AdapterMode::Real).await;
                inner.core.set_connection(ConnectionState::Connected).await;
                inner.core.record_success().await;
            }
            Err(e) => {
                warn!(
                    interface = %inner.core.interface_code(),
                    base_url = %inner.settings.client.base_url,
                    error = %e,
                    "Controller unavailable, switching to simulated data"
                );
                *strategy = Some(inner.simulated());
                inner.core.set_mode(AdapterMode::Simulated).await;
            }
        }
        Ok(())
    }

    async fn start_monitoring(&self) -> AdapterResult<()> {
        let inner = &self.inner;
        if inner.strategy().await.is_none() {
            return Err(AdapterError::NotInitialized(
                inner.core.interface_code().to_string(),
            ));
        }
        let Some(session) = inner.core.begin_session().await else {
            debug!(interface = %inner.core.interface_code(), "Already monitoring");
            return Ok(());
        };
        tokio::spawn(inner.clone().bootstrap(session));
        Ok(())
    }

    async fn stop_monitoring(&self) {
        if self.inner.core.end_session().await {
            self.inner.live.write().await.clear();
        }
    }

    fn is_monitoring(&self) -> bool {
        self.inner.core.is_monitoring()
    }

    async fn get_current_tank_data(&self, filter: &TankFilter) -> AdapterResult<Vec<TankSnapshot>> {
        let live: Vec<TankSample> = self.inner.live.read().await.values().cloned().collect();
        self.inner.core.current_tank_data(filter, &live).await
    }

    async fn get_transactions(&self, query: &TransactionQuery) -> AdapterResult<Vec<FuelTransaction>> {
        self.inner.core.transactions(query).await
    }

    async fn receive_transaction_data(
        &self,
        payload: &Value,
        station: &Station,
    ) -> AdapterResult<IngestSummary> {
        let tag = self.inner.core.source_tag().await;
        self.inner.core.ingest_transactions(payload, station, &tag).await
    }

    async fn get_status(&self) -> InterfaceStatus {
        let endpoint = match self.inner.strategy().await {
            Some(PtsStrategy::Device(client)) => client
                .active_path()
                .await
                .map(|path| format!("{}{}", client.base_url().trim_end_matches('/'), path)),
            _ => None,
        };
        let probes = self.inner.probes.read().await.clone();
        self.inner.core.status(endpoint, probes).await
    }
}
