//! Shared adapter machinery
//!
//! [`AdapterCore`] carries everything the protocol adapters have in common:
//! status bookkeeping, the monitoring session, station resolution,
//! persistence helpers and real-time emission. Protocol adapters embed one
//! and only add their wire handling on top.

use std::collections::HashMap;
use std::future::Future;
use std::sync::atomic::{AtomicBool, AtomicU64, Ordering};
use std::sync::Arc;
use std::time::Duration;

use chrono::{DateTime, Utc};
use dashmap::DashSet;
use serde_json::Value;
use tokio::sync::{Mutex, RwLock};
use tokio::task::JoinHandle;
use tokio::time::{Instant, MissedTickBehavior};
use tracing::{debug, info, warn};

use super::normalize::{normalize_transaction, transaction_records};
use crate::application::ports::{AdapterResult, IngestSummary, RealtimePublisher, TankSnapshot};
use crate::domain::{
    AdapterMode, ConnectionState, DomainResult, FuelTransaction, InterfaceSource, InterfaceStatus,
    RepositoryProvider, Station, TankFilter, TankReading, TankSample, TransactionQuery,
};
use crate::notifications::{Event, TankDataEvent, TransactionsEvent};
use crate::shared::shutdown::StopSignal;

/// One `start_monitoring` .. `stop_monitoring` span.
///
/// Work started in a session checks [`AdapterCore::is_current`] before
/// touching shared state, so results that land after a stop are dropped.
#[derive(Clone)]
pub struct MonitoringSession {
    pub epoch: u64,
    pub signal: StopSignal,
}

/// When the first tick of a periodic task fires.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FirstTick {
    Immediate,
    AfterPeriod,
}

#[derive(Debug)]
struct CoreState {
    station_id: Option<i32>,
    connection: ConnectionState,
    mode: Option<AdapterMode>,
    last_communication: Option<DateTime<Utc>>,
    error_count: u64,
    last_error: Option<String>,
}

pub struct AdapterCore {
    interface_code: String,
    /// Legacy codes stations may still be registered under
    aliases: DashSet<String>,
    repos: Arc<dyn RepositoryProvider>,
    publisher: Arc<dyn RealtimePublisher>,
    monitoring: AtomicBool,
    epoch: AtomicU64,
    state: RwLock<CoreState>,
    session: Mutex<Option<MonitoringSession>>,
}

impl AdapterCore {
    pub fn new(
        interface_code: &str,
        repos: Arc<dyn RepositoryProvider>,
        publisher: Arc<dyn RealtimePublisher>,
    ) -> Self {
        Self {
            interface_code: interface_code.to_ascii_uppercase(),
            aliases: DashSet::new(),
            repos,
            publisher,
            monitoring: AtomicBool::new(false),
            epoch: AtomicU64::new(0),
            state: RwLock::new(CoreState {
                station_id: None,
                connection: ConnectionState::Disconnected,
                mode: None,
                last_communication: None,
                error_count: 0,
                last_error: None,
            }),
            session: Mutex::new(None),
        }
    }

    pub fn interface_code(&self) -> &str {
        &self.interface_code
    }

    /// Also claim stations registered under `alias`.
    pub fn add_alias(&self, alias: &str) {
        let alias = alias.trim().to_ascii_uppercase();
        if !alias.is_empty() && alias != self.interface_code && self.aliases.insert(alias.clone()) {
            debug!(interface = %self.interface_code, alias = %alias, "Alias accepted");
        }
    }

    /// Own code first, then aliases in sorted order.
    pub fn accepted_codes(&self) -> Vec<String> {
        let mut aliases: Vec<String> = self.aliases.iter().map(|a| a.key().clone()).collect();
        aliases.sort();
        let mut codes = Vec::with_capacity(aliases.len() + 1);
        codes.push(self.interface_code.clone());
        codes.extend(aliases);
        codes
    }

    pub fn repos(&self) -> &dyn RepositoryProvider {
        self.repos.as_ref()
    }

    // ── Mode & connection state ─────────────────────────────────

    pub async fn set_mode(&self, mode: AdapterMode) {
        let mut state = self.state.write().await;
        state.mode = Some(mode);
        if mode == AdapterMode::Simulated {
            state.connection = ConnectionState::Simulating;
        }
    }

    pub async fn mode(&self) -> Option<AdapterMode> {
        self.state.read().await.mode
    }

    /// Source tag for rows produced in the current mode.
    pub async fn source_tag(&self) -> String {
        let mode = self.mode().await.unwrap_or(AdapterMode::Real);
        InterfaceSource::for_mode(&self.interface_code, mode).to_string()
    }

    pub async fn set_connection(&self, connection: ConnectionState) {
        let mut state = self.state.write().await;
        if state.connection != connection {
            debug!(
                interface = %self.interface_code,
                from = %state.connection,
                to = %connection,
                "Connection state changed"
            );
            state.connection = connection;
        }
    }

    pub async fn connection(&self) -> ConnectionState {
        self.state.read().await.connection
    }

    pub async fn station_id(&self) -> Option<i32> {
        self.state.read().await.station_id
    }

    pub async fn record_success(&self) {
        self.state.write().await.last_communication = Some(Utc::now());
    }

    pub async fn record_error(&self, error: impl std::fmt::Display) {
        let message = error.to_string();
        metrics::counter!("telemetry_errors_total", "interface" => self.interface_code.clone())
            .increment(1);
        let mut state = self.state.write().await;
        state.error_count += 1;
        state.last_error = Some(message);
    }

    pub async fn status(&self, active_endpoint: Option<String>, probes: Vec<i32>) -> InterfaceStatus {
        let state = self.state.read().await;
        InterfaceStatus {
            interface_code: self.interface_code.clone(),
            station_id: state.station_id,
            connected: state.connection.is_connected(),
            monitoring: self.is_monitoring(),
            mode: state.mode,
            state: state.connection,
            last_communication: state.last_communication,
            error_count: state.error_count,
            last_error: state.last_error.clone(),
            active_endpoint,
            probes,
        }
    }

    // ── Monitoring session ──────────────────────────────────────

    /// Open a new session. Returns `None` if one is already running.
    pub async fn begin_session(&self) -> Option<MonitoringSession> {
        let mut slot = self.session.lock().await;
        if slot.is_some() {
            return None;
        }
        let session = MonitoringSession {
            epoch: self.epoch.fetch_add(1, Ordering::SeqCst) + 1,
            signal: StopSignal::new(),
        };
        self.monitoring.store(true, Ordering::SeqCst);
        *slot = Some(session.clone());
        info!(interface = %self.interface_code, epoch = session.epoch, "▶️ Monitoring started");
        Some(session)
    }

    /// Close the running session. Returns `false` if none was running.
    pub async fn end_session(&self) -> bool {
        let Some(session) = self.session.lock().await.take() else {
            return false;
        };
        self.monitoring.store(false, Ordering::SeqCst);
        self.epoch.fetch_add(1, Ordering::SeqCst);
        session.signal.trigger();
        info!(interface = %self.interface_code, epoch = session.epoch, "⏹️ Monitoring stopped");
        true
    }

    pub fn is_monitoring(&self) -> bool {
        self.monitoring.load(Ordering::SeqCst)
    }

    pub fn is_current(&self, session: &MonitoringSession) -> bool {
        self.is_monitoring()
            && self.epoch.load(Ordering::SeqCst) == session.epoch
            && !session.signal.is_triggered()
    }

    // ── Station resolution ──────────────────────────────────────

    /// Wait until exactly one active station uses this interface or one of
    /// its aliases.
    ///
    /// Zero or several matches are logged and retried every `interval`.
    /// Returns `None` if the session ends first.
    pub async fn await_station(
        &self,
        session: &MonitoringSession,
        interval: Duration,
    ) -> Option<Station> {
        loop {
            if !self.is_current(session) {
                return None;
            }
            let codes = self.accepted_codes();
            match self.repos.stations().find_active_by_interfaces(&codes).await {
                Ok(mut stations) if stations.len() == 1 => {
                    let station = stations.remove(0);
                    self.state.write().await.station_id = Some(station.id);
                    info!(
                        interface = %self.interface_code,
                        station_id = station.id,
                        station = %station.name,
                        "🏪 Station resolved"
                    );
                    return Some(station);
                }
                Ok(stations) if stations.is_empty() => {
                    info!(interface = %self.interface_code, "No active station uses this interface yet");
                }
                Ok(stations) => {
                    warn!(
                        interface = %self.interface_code,
                        count = stations.len(),
                        "Several active stations use this interface; waiting for a single match"
                    );
                }
                Err(e) => {
                    warn!(interface = %self.interface_code, error = %e, "Station lookup failed");
                }
            }
            if !session.signal.sleep(interval).await {
                return None;
            }
        }
    }

    /// Tank number → tank id for one station.
    pub async fn tank_map(&self, station_id: i32) -> DomainResult<HashMap<u32, i32>> {
        let tanks = self
            .repos
            .stations()
            .find_tanks(&TankFilter::station(station_id))
            .await?;
        Ok(tanks
            .into_iter()
            .map(|info| (info.tank.number, info.tank.id))
            .collect())
    }

    // ── Persistence ─────────────────────────────────────────────

    pub async fn save_tank_reading(&self, reading: TankReading) -> DomainResult<()> {
        self.repos.readings().upsert(reading).await
    }

    /// Persist every online, mapped sample. Returns how many were written.
    pub async fn save_tank_readings(&self, samples: &[TankSample]) -> DomainResult<usize> {
        let mut saved = 0;
        for reading in samples.iter().filter_map(TankSample::to_reading) {
            self.save_tank_reading(reading).await?;
            saved += 1;
        }
        if saved > 0 {
            metrics::counter!("telemetry_readings_persisted_total", "interface" => self.interface_code.clone())
                .increment(saved as u64);
        }
        debug!(interface = %self.interface_code, saved, "Tank readings persisted");
        Ok(saved)
    }

    pub async fn save_transaction(&self, transaction: FuelTransaction) -> DomainResult<bool> {
        self.repos.transactions().insert_if_absent(transaction).await
    }

    // ── Real-time ───────────────────────────────────────────────

    pub fn emit_real_time_data(&self, event: Event) {
        self.publisher.publish(event);
    }

    pub async fn emit_tank_data(&self, readings: Vec<TankSample>) {
        let station_id = self.station_id().await;
        self.emit_real_time_data(Event::TankData(TankDataEvent {
            station_id,
            interface_code: self.interface_code.clone(),
            readings,
            timestamp: Utc::now(),
        }));
    }

    pub fn emit_transactions(&self, station_id: i32, transactions: Vec<FuelTransaction>) {
        if transactions.is_empty() {
            return;
        }
        self.emit_real_time_data(Event::Transactions(TransactionsEvent {
            station_id,
            interface_code: self.interface_code.clone(),
            transactions,
            timestamp: Utc::now(),
        }));
    }

    // ── Queries ─────────────────────────────────────────────────

    /// Registry tanks joined with their latest stored reading, with live
    /// samples (matched by tank id) laid over the stored values.
    pub async fn current_tank_data(
        &self,
        filter: &TankFilter,
        live: &[TankSample],
    ) -> AdapterResult<Vec<TankSnapshot>> {
        let filter = filter.widened(&self.accepted_codes());
        let tanks = self.repos.stations().find_tanks(&filter).await?;
        let mut snapshots = Vec::with_capacity(tanks.len());
        for info in &tanks {
            let latest = self.repos.readings().latest_for_tank(info.tank.id).await?;
            let mut snapshot = TankSnapshot::new(info, latest.as_ref());
            if let Some(sample) = live.iter().find(|s| s.tank_id == Some(info.tank.id)) {
                snapshot.overlay(sample);
            }
            snapshots.push(snapshot);
        }
        Ok(snapshots)
    }

    pub async fn transactions(&self, query: &TransactionQuery) -> AdapterResult<Vec<FuelTransaction>> {
        Ok(self.repos.transactions().find(query).await?)
    }

    /// Normalize, store and announce pushed transaction records.
    pub async fn ingest_transactions(
        &self,
        payload: &Value,
        station: &Station,
        interface_source: &str,
    ) -> AdapterResult<IngestSummary> {
        let records = transaction_records(payload);
        let mut summary = IngestSummary {
            received: records.len(),
            ..Default::default()
        };
        let mut inserted = Vec::new();

        for record in records {
            let tx = match normalize_transaction(record, station.id, interface_source) {
                Ok(tx) => tx,
                Err(e) => {
                    warn!(interface = %self.interface_code, station_id = station.id, error = %e, "Rejected transaction record");
                    summary.rejected += 1;
                    continue;
                }
            };
            if self.save_transaction(tx.clone()).await? {
                summary.inserted += 1;
                inserted.push(tx);
            } else {
                summary.duplicates += 1;
            }
        }

        if summary.inserted > 0 {
            metrics::counter!("telemetry_transactions_stored_total", "interface" => self.interface_code.clone())
                .increment(summary.inserted as u64);
        }
        debug!(
            interface = %self.interface_code,
            station_id = station.id,
            received = summary.received,
            inserted = summary.inserted,
            duplicates = summary.duplicates,
            rejected = summary.rejected,
            "Transactions ingested"
        );
        self.emit_transactions(station.id, inserted);
        Ok(summary)
    }
}

/// Run `tick` every `period` until the session's stop signal fires.
///
/// The stop signal is checked with priority before every tick; a tick that
/// has started runs to completion.
pub fn spawn_periodic<F, Fut>(
    session: &MonitoringSession,
    name: &'static str,
    period: Duration,
    first: FirstTick,
    mut tick: F,
) -> JoinHandle<()>
where
    F: FnMut() -> Fut + Send + 'static,
    Fut: Future<Output = ()> + Send + 'static,
{
    let signal = session.signal.clone();
    let epoch = session.epoch;
    tokio::spawn(async move {
        let start = match first {
            FirstTick::Immediate => Instant::now(),
            FirstTick::AfterPeriod => Instant::now() + period,
        };
        let mut interval = tokio::time::interval_at(start, period);
        interval.set_missed_tick_behavior(MissedTickBehavior::Delay);

        loop {
            tokio::select! {
                biased;
                _ = signal.stopped() => break,
                _ = interval.tick() => {}
            }
            tick().await;
        }
        debug!(task = name, epoch, "Periodic task stopped");
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::application::ports::NoopPublisher;
    use crate::domain::{Product, Tank, TankMeasurement, TankStatus};
    use crate::infrastructure::storage::InMemoryRepositoryProvider;
    use chrono::TimeZone;
    use serde_json::json;
    use std::sync::atomic::AtomicUsize;

    fn station(id: i32, code: &str) -> Station {
        Station {
            id,
            code: format!("ST-{id}"),
            name: format!("Station {id}"),
            is_active: true,
            interface_code: Some(code.to_string()),
            ewura_license_no: None,
        }
    }

    fn core_with(repos: Arc<InMemoryRepositoryProvider>) -> AdapterCore {
        AdapterCore::new("atg", repos, Arc::new(NoopPublisher))
    }

    #[tokio::test]
    async fn sessions_are_idempotent() {
        let core = core_with(Arc::new(InMemoryRepositoryProvider::new()));

        let first = core.begin_session().await.expect("first session");
        assert!(core.begin_session().await.is_none());
        assert!(core.is_current(&first));

        assert!(core.end_session().await);
        assert!(!core.end_session().await);
        assert!(!core.is_current(&first));
        assert!(first.signal.is_triggered());

        let second = core.begin_session().await.expect("second session");
        assert!(second.epoch > first.epoch);
        assert!(!core.is_current(&first));
    }

    #[tokio::test(start_paused = true)]
    async fn await_station_waits_for_a_single_match() {
        let repos = Arc::new(InMemoryRepositoryProvider::new());
        repos.insert_station(station(1, "ATG"));
        repos.insert_station(station(2, "ATG"));
        let core = Arc::new(core_with(repos.clone()));
        let session = core.begin_session().await.unwrap();

        let waiter = {
            let core = core.clone();
            let session = session.clone();
            tokio::spawn(async move { core.await_station(&session, Duration::from_secs(10)).await })
        };

        tokio::time::sleep(Duration::from_secs(15)).await;
        assert!(!waiter.is_finished());

        let mut second = station(2, "ATG");
        second.is_active = false;
        repos.insert_station(second);

        let resolved = waiter.await.unwrap().expect("station");
        assert_eq!(resolved.id, 1);
        assert_eq!(core.station_id().await, Some(1));
    }

    #[tokio::test(start_paused = true)]
    async fn await_station_accepts_alias_codes() {
        let repos = Arc::new(InMemoryRepositoryProvider::new());
        repos.insert_station(station(3, "pts"));
        repos.insert_tank(Tank {
            id: 30,
            station_id: 3,
            number: 1,
            capacity: 20000.0,
            product_id: None,
            is_active: true,
        });
        let core = Arc::new(AdapterCore::new("NFPP", repos, Arc::new(NoopPublisher)));
        core.add_alias("pts");
        core.add_alias("NFPP");
        assert_eq!(core.accepted_codes(), vec!["NFPP".to_string(), "PTS".to_string()]);

        let session = core.begin_session().await.unwrap();
        let resolved = tokio::time::timeout(
            Duration::from_secs(1),
            core.await_station(&session, Duration::from_secs(10)),
        )
        .await
        .expect("resolved without waiting")
        .expect("station");
        assert_eq!(resolved.id, 3);

        let snapshots = core
            .current_tank_data(&TankFilter::interface("NFPP"), &[])
            .await
            .unwrap();
        assert_eq!(snapshots.len(), 1);
        assert_eq!(snapshots[0].tank_id, 30);
    }

    #[tokio::test(start_paused = true)]
    async fn await_station_gives_up_when_stopped() {
        let core = Arc::new(core_with(Arc::new(InMemoryRepositoryProvider::new())));
        let session = core.begin_session().await.unwrap();

        let waiter = {
            let core = core.clone();
            let session = session.clone();
            tokio::spawn(async move { core.await_station(&session, Duration::from_secs(10)).await })
        };
        tokio::time::sleep(Duration::from_secs(1)).await;
        core.end_session().await;

        assert!(waiter.await.unwrap().is_none());
    }

    #[tokio::test(start_paused = true)]
    async fn periodic_task_stops_on_signal() {
        let core = core_with(Arc::new(InMemoryRepositoryProvider::new()));
        let session = core.begin_session().await.unwrap();
        let ticks = Arc::new(AtomicUsize::new(0));

        let handle = {
            let ticks = ticks.clone();
            spawn_periodic(&session, "test", Duration::from_secs(5), FirstTick::Immediate, move || {
                let ticks = ticks.clone();
                async move {
                    ticks.fetch_add(1, Ordering::SeqCst);
                }
            })
        };

        tokio::time::sleep(Duration::from_secs(11)).await;
        assert_eq!(ticks.load(Ordering::SeqCst), 3);

        core.end_session().await;
        handle.await.unwrap();
        tokio::time::sleep(Duration::from_secs(20)).await;
        assert_eq!(ticks.load(Ordering::SeqCst), 3);
    }

    #[tokio::test]
    async fn current_tank_data_joins_registry_readings_and_live_samples() {
        let repos = Arc::new(InMemoryRepositoryProvider::new());
        repos.insert_station(station(1, "ATG"));
        repos.insert_product(Product {
            id: 1,
            name: "Diesel".into(),
            color: Some("#ffcc00".into()),
        });
        for (id, number) in [(10, 1), (11, 2), (12, 3)] {
            repos.insert_tank(Tank {
                id,
                station_id: 1,
                number,
                capacity: 20000.0,
                product_id: Some(1),
                is_active: true,
            });
        }
        let stored_at = Utc.with_ymd_and_hms(2024, 1, 15, 9, 0, 0).unwrap();
        let m = TankMeasurement::new(5000.0, 0.0, 4990.0, 15000.0, 800.0, 0.0, 24.0);
        repos
            .readings()
            .upsert(TankReading {
                tank_id: 10,
                tank_number: 1,
                timestamp: stored_at,
                measurement: m.clone(),
                status: TankStatus::Online,
                interface_source: "ATG".into(),
                raw_payload: None,
            })
            .await
            .unwrap();

        let core = core_with(repos);
        let mut live = TankSample::online(
            2,
            stored_at + chrono::Duration::minutes(5),
            TankMeasurement::new(7000.0, 10.0, 6900.0, 13000.0, 950.0, 5.0, 23.0),
            "ATG",
        );
        live.tank_id = Some(11);

        let snapshots = core
            .current_tank_data(&TankFilter::station(1), &[live])
            .await
            .unwrap();

        assert_eq!(snapshots.len(), 3);
        assert_eq!(snapshots[0].measurement, Some(m));
        assert_eq!(snapshots[0].product_name.as_deref(), Some("Diesel"));
        assert_eq!(snapshots[1].measurement.as_ref().map(|m| m.oil_volume), Some(6990.0));
        assert!(snapshots[2].measurement.is_none());
    }

    #[tokio::test]
    async fn ingest_counts_inserted_duplicates_and_rejects() {
        let repos = Arc::new(InMemoryRepositoryProvider::new());
        let core = core_with(repos.clone());
        let st = station(4, "ATG");
        let payload = json!({"transactions": [
            {"Id": "1", "Volume": 10, "Price": 3000, "DateTime": "2024-01-15T10:00:00"},
            {"Id": "2", "Volume": 5, "Amount": 15000, "DateTime": "2024-01-15T10:05:00"},
            {"Id": "3", "Volume": 5}
        ]});

        let first = core.ingest_transactions(&payload, &st, "ATG").await.unwrap();
        assert_eq!(
            first,
            IngestSummary { received: 3, inserted: 2, duplicates: 0, rejected: 1 }
        );

        let again = core.ingest_transactions(&payload, &st, "ATG").await.unwrap();
        assert_eq!(again.inserted, 0);
        assert_eq!(again.duplicates, 2);

        let stored = core
            .transactions(&TransactionQuery { station_id: Some(4), ..Default::default() })
            .await
            .unwrap();
        assert_eq!(stored.len(), 2);
        assert_eq!(stored[0].transaction_id, "2");
    }

    #[tokio::test]
    async fn errors_are_counted_in_status() {
        let core = core_with(Arc::new(InMemoryRepositoryProvider::new()));
        core.set_mode(AdapterMode::Simulated).await;
        core.record_error("serial port vanished").await;
        core.record_error("serial port vanished").await;

        let status = core.status(None, Vec::new()).await;
        assert_eq!(status.interface_code, "ATG");
        assert_eq!(status.error_count, 2);
        assert_eq!(status.state, ConnectionState::Simulating);
        assert!(status.connected);
        assert_eq!(core.source_tag().await, "ATG_SIMULATED");
    }
}
