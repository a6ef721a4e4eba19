//! Automatic tank gauge adapter
//!
//! Two periodic tasks per monitoring session:
//! - **fast poll** (default 5 s): query the gauge, refresh the live map and
//!   publish `tankData`
//! - **persist** (default hourly): write the live map to storage
//!
//! A third, one-shot task resolves the station and its tank numbers. Readings
//! are persisted only once that mapping exists. Every (re)connection is
//! followed by an immediate read-then-persist.

use std::collections::HashMap;
use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use chrono::Utc;
use serde_json::Value;
use tokio::sync::{Mutex, RwLock};
use tracing::{debug, info, warn};

use super::codec::FloatDecoder;
use super::protocol::{parse_inventory, sanitize, TankFrame, POLL_COMMAND};
use super::simulator::AtgSimulator;
use super::transport::{AtgConnector, AtgLink, SerialConnector};
use crate::application::interfaces::base::{spawn_periodic, AdapterCore, FirstTick, MonitoringSession};
use crate::application::ports::{
    AdapterError, AdapterResult, IngestSummary, RealtimePublisher, TankSnapshot, TelemetryAdapter,
};
use crate::domain::{
    AdapterMode, ConnectionState, FuelTransaction, InterfaceStatus, RepositoryProvider, Station,
    TankFilter, TankSample, TransactionQuery,
};

/// Runtime settings of the gauge adapter.
#[derive(Debug, Clone)]
pub struct AtgSettings {
    pub interface_code: String,
    pub port: String,
    pub baud_rate: u32,
    pub read_timeout: Duration,
    pub poll_interval: Duration,
    pub persist_interval: Duration,
    pub tank_count: u32,
    pub station_poll_interval: Duration,
    pub force_simulation: bool,
    /// Simulated tank-1 volume
    pub base_volume: f64,
}

impl Default for AtgSettings {
    fn default() -> Self {
        Self {
            interface_code: "ATG".to_string(),
            port: "/dev/ttyUSB0".to_string(),
            baud_rate: 9600,
            read_timeout: Duration::from_millis(3000),
            poll_interval: Duration::from_secs(5),
            persist_interval: Duration::from_secs(3600),
            tank_count: 5,
            station_poll_interval: Duration::from_secs(10),
            force_simulation: false,
            base_volume: 10000.0,
        }
    }
}

struct HardwareLine {
    link: Option<Box<dyn AtgLink>>,
    /// Set on every (re)connection; cleared by the first successful read
    fresh: bool,
    decoder: FloatDecoder,
}

/// Data strategy, chosen once by `initialize()`.
enum AtgSource {
    Hardware(HardwareLine),
    Simulated(AtgSimulator),
}

struct AtgInner {
    core: AdapterCore,
    settings: AtgSettings,
    connector: Arc<dyn AtgConnector>,
    source: Mutex<Option<AtgSource>>,
    /// Latest sample per tank number
    live: RwLock<HashMap<u32, TankSample>>,
    /// Tank number → tank id for the resolved station
    tanks: RwLock<HashMap<u32, i32>>,
}

/// Serial tank gauge adapter.
#[derive(Clone)]
pub struct AtgAdapter {
    inner: Arc<AtgInner>,
}

impl AtgAdapter {
    pub fn new(
        settings: AtgSettings,
        repos: Arc<dyn RepositoryProvider>,
        publisher: Arc<dyn RealtimePublisher>,
    ) -> Self {
        let connector = Arc::new(SerialConnector::new(settings.port.clone(), settings.baud_rate));
        Self::with_connector(settings, connector, repos, publisher)
    }

    pub fn with_connector(
        settings: AtgSettings,
        connector: Arc<dyn AtgConnector>,
        repos: Arc<dyn RepositoryProvider>,
        publisher: Arc<dyn RealtimePublisher>,
    ) -> Self {
        Self {
            inner: Arc::new(AtgInner {
                core: AdapterCore::new(&settings.interface_code, repos, publisher),
                settings,
                connector,
                source: Mutex::new(None),
                live: RwLock::new(HashMap::new()),
                tanks: RwLock::new(HashMap::new()),
            }),
        }
    }
}

impl AtgInner {
    fn simulator(&self) -> AtgSimulator {
        AtgSimulator::new(self.settings.tank_count, self.settings.base_volume)
    }

    /// Station and tank-number mapping; then flush what the poll already saw.
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
        if !self.core.is_current(&session) {
            return;
        }
        info!(
            interface = %self.core.interface_code(),
            station_id = station.id,
            tanks = map.len(),
            "Tank mapping loaded"
        );
        *self.tanks.write().await = map;

        {
            let tanks = self.tanks.read().await;
            let mut live = self.live.write().await;
            for sample in live.values_mut() {
                sample.tank_id = tanks.get(&sample.tank_number).copied();
            }
        }
        self.persist(&session).await;
    }

    /// One fast-poll cycle.
    async fn poll(&self, session: &MonitoringSession) {
        if !self.core.is_current(session) {
            return;
        }
        let Some((samples, fresh)) = self.read_samples().await else {
            return;
        };
        if !self.core.is_current(session) {
            debug!(interface = %self.core.interface_code(), "Discarding poll result after stop");
            return;
        }

        let samples = self.map_tanks(samples).await;
        {
            let mut live = self.live.write().await;
            for sample in &samples {
                live.insert(sample.tank_number, sample.clone());
            }
        }
        metrics::counter!("telemetry_polls_total", "interface" => self.core.interface_code().to_string())
            .increment(1);
        self.core.emit_tank_data(samples).await;

        if fresh {
            self.persist(session).await;
        }
    }

    /// Read every tank once. Returns the samples and whether this was the
    /// first read on a new connection.
    async fn read_samples(&self) -> Option<(Vec<TankSample>, bool)> {
        let tag = self.core.source_tag().await;
        let now = Utc::now();
        let mut source = self.source.lock().await;

        match source.as_mut()? {
            AtgSource::Simulated(sim) => {
                self.core.record_success().await;
                Some((sim.sample(now, &tag), false))
            }
            AtgSource::Hardware(line) => {
                if line.link.is_none() {
                    self.core.set_connection(ConnectionState::Connecting).await;
                    match self.connector.open().await {
                        Ok(link) => {
                            info!(target_port = %self.connector.describe(), "🔌 Gauge reconnected");
                            line.link = Some(link);
                            line.fresh = true;
                            self.core.set_connection(ConnectionState::Connected).await;
                        }
                        Err(e) => {
                            warn!(target_port = %self.connector.describe(), error = %e, "Gauge reconnect failed");
                            self.core.record_error(&e).await;
                            self.core.set_connection(ConnectionState::Disconnected).await;
                            return None;
                        }
                    }
                }
                let link = line.link.as_mut()?;

                let raw = match link.exchange(POLL_COMMAND, self.settings.read_timeout).await {
                    Ok(raw) => raw,
                    Err(e) => {
                        warn!(target_port = %self.connector.describe(), error = %e, "Gauge exchange failed");
                        line.link = None;
                        self.core.record_error(&e).await;
                        self.core.set_connection(ConnectionState::Disconnected).await;
                        return None;
                    }
                };

                let payload = sanitize(&raw);
                let frames = match parse_inventory(&payload, self.settings.tank_count, &mut line.decoder) {
                    Ok(frames) => frames,
                    Err(e) => {
                        debug!(error = %e, bytes = raw.len(), "Ignoring non-inventory frame");
                        return None;
                    }
                };
                self.core.record_success().await;

                let samples = frames
                    .into_iter()
                    .map(|frame| {
                        if let TankFrame::Malformed { tank_number, error } = &frame {
                            warn!(tank = tank_number, error = %error, "Malformed tank block");
                        }
                        frame.into_sample(now, &tag)
                    })
                    .collect();
                Some((samples, std::mem::take(&mut line.fresh)))
            }
        }
    }

    async fn map_tanks(&self, mut samples: Vec<TankSample>) -> Vec<TankSample> {
        let tanks = self.tanks.read().await;
        for sample in &mut samples {
            sample.tank_id = tanks.get(&sample.tank_number).copied();
        }
        samples
    }

    /// Write the live map to storage.
    async fn persist(&self, session: &MonitoringSession) {
        if !self.core.is_current(session) {
            return;
        }
        if self.core.station_id().await.is_none() {
            debug!(interface = %self.core.interface_code(), "Station not resolved yet, skipping persist");
            return;
        }
        let samples: Vec<TankSample> = self.live.read().await.values().cloned().collect();
        if let Err(e) = self.core.save_tank_readings(&samples).await {
            warn!(interface = %self.core.interface_code(), error = %e, "Failed to persist tank readings");
            self.core.record_error(&e).await;
        }
    }
}

#[async_trait]
impl TelemetryAdapter for AtgAdapter {
    fn interface_code(&self) -> &str {
        self.inner.core.interface_code()
    }

    fn accept_alias(&self, alias: &str) {
        self.inner.core.add_alias(alias);
    }

    async fn initialize(&self) -> AdapterResult<()> {
        let inner = &self.inner;
        let mut source = inner.source.lock().await;
        if source.is_some() {
            return Ok(());
        }

        if inner.settings.force_simulation {
            info!(interface = %inner.core.interface_code(), "🧪 Simulation forced by configuration");
            *source = Some(AtgSource::Simulated(inner.simulator()));
            inner.core.set_mode(AdapterMode::Simulated).await;
            return Ok(());
        }

        inner.core.set_connection(ConnectionState::Connecting).await;
        match inner.connector.open().await {
            Ok(link) => {
                *source = Some(AtgSource::Hardware(HardwareLine {
                    link: Some(link),
                    fresh: true,
                    decoder: FloatDecoder::new(),
                }));
                inner.core.set_mode(AdapterMode::Real).await;
                inner.core.set_connection(ConnectionState::Connected).await;
                info!(
                    interface = %inner.core.interface_code(),
                    target_port = %inner.connector.describe(),
                    "✅ Gauge connected"
                );
            }
            Err(e) => {
                warn!(
                    interface = %inner.core.interface_code(),
                    target_port = %inner.connector.describe(),
                    error = %e,
                    "Gauge unavailable, switching to simulated readings"
                );
                *source = Some(AtgSource::Simulated(inner.simulator()));
                inner.core.set_mode(AdapterMode::Simulated).await;
            }
        }
        Ok(())
    }

    async fn start_monitoring(&self) -> AdapterResult<()> {
        let inner = &self.inner;
        if inner.source.lock().await.is_none() {
            return Err(AdapterError::NotInitialized(
                inner.core.interface_code().to_string(),
            ));
        }
        let Some(session) = inner.core.begin_session().await else {
            debug!(interface = %inner.core.interface_code(), "Already monitoring");
            return Ok(());
        };

        tokio::spawn(inner.clone().bootstrap(session.clone()));

        let poller = inner.clone();
        let poll_session = session.clone();
        spawn_periodic(
            &session,
            "atg-fast-poll",
            inner.settings.poll_interval,
            FirstTick::Immediate,
            move || {
                let inner = poller.clone();
                let session = poll_session.clone();
                async move { inner.poll(&session).await }
            },
        );

        let persister = inner.clone();
        let persist_session = session.clone();
        spawn_periodic(
            &session,
            "atg-persist",
            inner.settings.persist_interval,
            FirstTick::AfterPeriod,
            move || {
                let inner = persister.clone();
                let session = persist_session.clone();
                async move { inner.persist(&session).await }
            },
        );
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
        self.inner.core.status(None, Vec::new()).await
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::application::interfaces::atg::protocol::fixtures::inventory_wire;
    use crate::application::interfaces::atg::transport::TransportError;
    use crate::application::ports::NoopPublisher;
    use crate::domain::{Tank, TankStatus};
    use crate::infrastructure::storage::InMemoryRepositoryProvider;
    use crate::notifications::EventBus;
    use std::collections::VecDeque;
    use std::sync::atomic::{AtomicUsize, Ordering};
    use std::sync::Mutex as StdMutex;

    type Script = Arc<StdMutex<VecDeque<Result<Vec<u8>, TransportError>>>>;

    /// Link that replays scripted responses, optionally after a delay.
    struct ScriptedLink {
        script: Script,
        delay: Duration,
    }

    #[async_trait]
    impl AtgLink for ScriptedLink {
        async fn exchange(&mut self, command: &[u8], _timeout: Duration) -> Result<Vec<u8>, TransportError> {
            assert_eq!(command, POLL_COMMAND);
            if !self.delay.is_zero() {
                tokio::time::sleep(self.delay).await;
            }
            let next = self.script.lock().unwrap().pop_front();
            next.unwrap_or_else(|| Ok(inventory_wire()))
        }
    }

    struct ScriptedConnector {
        script: Script,
        delay: Duration,
        reachable: bool,
        opens: AtomicUsize,
    }

    impl ScriptedConnector {
        fn new(responses: Vec<Result<Vec<u8>, TransportError>>) -> Arc<Self> {
            Arc::new(Self {
                script: Arc::new(StdMutex::new(responses.into())),
                delay: Duration::ZERO,
                reachable: true,
                opens: AtomicUsize::new(0),
            })
        }

        fn unreachable() -> Arc<Self> {
            Arc::new(Self {
                script: Arc::default(),
                delay: Duration::ZERO,
                reachable: false,
                opens: AtomicUsize::new(0),
            })
        }
    }

    #[async_trait]
    impl AtgConnector for ScriptedConnector {
        async fn open(&self) -> Result<Box<dyn AtgLink>, TransportError> {
            self.opens.fetch_add(1, Ordering::SeqCst);
            if !self.reachable {
                return Err(TransportError::Open {
                    port: "/dev/null".into(),
                    reason: "no such device".into(),
                });
            }
            Ok(Box::new(ScriptedLink {
                script: self.script.clone(),
                delay: self.delay,
            }))
        }

        fn describe(&self) -> String {
            "scripted".into()
        }
    }

    fn registry() -> Arc<InMemoryRepositoryProvider> {
        let repos = Arc::new(InMemoryRepositoryProvider::new());
        repos.insert_station(Station {
            id: 1,
            code: "ST-1".into(),
            name: "Depot".into(),
            is_active: true,
            interface_code: Some("ATG".into()),
            ewura_license_no: None,
        });
        for (id, number) in [(10, 1), (11, 2), (12, 3)] {
            repos.insert_tank(Tank {
                id,
                station_id: 1,
                number,
                capacity: 20000.0,
                product_id: None,
                is_active: true,
            });
        }
        repos
    }

    fn adapter(
        connector: Arc<ScriptedConnector>,
        repos: Arc<InMemoryRepositoryProvider>,
        publisher: Arc<dyn RealtimePublisher>,
    ) -> AtgAdapter {
        AtgAdapter::with_connector(AtgSettings::default(), connector, repos, publisher)
    }

    #[tokio::test]
    async fn missing_port_falls_back_to_simulation() {
        let adapter = adapter(
            ScriptedConnector::unreachable(),
            registry(),
            Arc::new(NoopPublisher),
        );
        adapter.initialize().await.unwrap();

        let status = adapter.get_status().await;
        assert_eq!(status.mode, Some(AdapterMode::Simulated));
        assert_eq!(status.state, ConnectionState::Simulating);
        assert!(!status.monitoring);
    }

    #[tokio::test]
    async fn forced_simulation_never_opens_the_port() {
        let connector = ScriptedConnector::new(Vec::new());
        let settings = AtgSettings {
            force_simulation: true,
            ..Default::default()
        };
        let adapter = AtgAdapter::with_connector(
            settings,
            connector.clone(),
            registry(),
            Arc::new(NoopPublisher),
        );
        adapter.initialize().await.unwrap();

        assert_eq!(connector.opens.load(Ordering::SeqCst), 0);
        assert_eq!(adapter.get_status().await.mode, Some(AdapterMode::Simulated));
    }

    #[tokio::test]
    async fn monitoring_requires_initialize() {
        let adapter = adapter(ScriptedConnector::new(Vec::new()), registry(), Arc::new(NoopPublisher));
        assert!(matches!(
            adapter.start_monitoring().await,
            Err(AdapterError::NotInitialized(_))
        ));
    }

    #[tokio::test(start_paused = true)]
    async fn hardware_poll_publishes_and_persists_golden_frame() {
        let repos = registry();
        let bus = Arc::new(EventBus::new());
        let mut events = bus.subscribe();
        let adapter = adapter(ScriptedConnector::new(Vec::new()), repos.clone(), bus.clone());

        adapter.initialize().await.unwrap();
        adapter.start_monitoring().await.unwrap();
        tokio::time::sleep(Duration::from_secs(1)).await;

        let event = events.recv().await.expect("tankData event");
        assert_eq!(event.event.event_type(), "tankData");

        let snapshots = adapter
            .get_current_tank_data(&TankFilter::station(1))
            .await
            .unwrap();
        assert_eq!(snapshots.len(), 3);
        let tank1 = snapshots[0].measurement.as_ref().expect("tank 1 reading");
        assert_eq!(tank1.total_volume, 10000.0);
        assert_eq!(tank1.oil_volume, 9950.0);
        assert_eq!(snapshots[2].status, Some(TankStatus::Offline));

        // fresh connection ⇒ immediate persist of the mapped online tanks
        assert_eq!(repos.readings().count_for_tank(10).await.unwrap(), 1);
        assert_eq!(repos.readings().count_for_tank(11).await.unwrap(), 1);
        assert_eq!(repos.readings().count_for_tank(12).await.unwrap(), 0);

        let stored = repos.readings().latest_for_tank(10).await.unwrap().unwrap();
        assert_eq!(stored.interface_source, "ATG");
        assert!(stored.raw_payload.is_some());

        adapter.stop_monitoring().await;
    }

    #[tokio::test(start_paused = true)]
    async fn noise_frames_are_ignored() {
        let repos = registry();
        let connector = ScriptedConnector::new(vec![Ok(b"\x01\x15garbage\x03".to_vec())]);
        let adapter = adapter(connector, repos, Arc::new(NoopPublisher));
        adapter.initialize().await.unwrap();
        adapter.start_monitoring().await.unwrap();

        tokio::time::sleep(Duration::from_secs(1)).await;
        let status = adapter.get_status().await;
        assert_eq!(status.error_count, 0);
        assert!(adapter.inner.live.read().await.is_empty());

        tokio::time::sleep(Duration::from_secs(5)).await;
        assert_eq!(adapter.inner.live.read().await.len(), 5);
        adapter.stop_monitoring().await;
    }

    #[tokio::test(start_paused = true)]
    async fn transport_error_disconnects_then_reconnects() {
        let connector = ScriptedConnector::new(vec![Err(TransportError::Timeout(Duration::from_secs(3)))]);
        let adapter = adapter(connector.clone(), registry(), Arc::new(NoopPublisher));
        adapter.initialize().await.unwrap();
        adapter.start_monitoring().await.unwrap();

        tokio::time::sleep(Duration::from_secs(1)).await;
        let status = adapter.get_status().await;
        assert_eq!(status.state, ConnectionState::Disconnected);
        assert_eq!(status.error_count, 1);

        tokio::time::sleep(Duration::from_secs(5)).await;
        let status = adapter.get_status().await;
        assert_eq!(status.state, ConnectionState::Connected);
        assert_eq!(connector.opens.load(Ordering::SeqCst), 2);
        assert!(status.last_communication.is_some());
        adapter.stop_monitoring().await;
    }

    #[tokio::test(start_paused = true)]
    async fn late_poll_results_after_stop_are_discarded() {
        let connector = Arc::new(ScriptedConnector {
            script: Arc::default(),
            delay: Duration::from_secs(2),
            reachable: true,
            opens: AtomicUsize::new(0),
        });
        let repos = registry();
        let adapter = adapter(connector, repos.clone(), Arc::new(NoopPublisher));
        adapter.initialize().await.unwrap();
        adapter.start_monitoring().await.unwrap();

        // poll is in flight (2 s exchange); stop underneath it
        tokio::time::sleep(Duration::from_millis(500)).await;
        adapter.stop_monitoring().await;
        assert!(!adapter.is_monitoring());

        tokio::time::sleep(Duration::from_secs(5)).await;
        assert!(adapter.inner.live.read().await.is_empty());
        assert_eq!(repos.readings().count_for_tank(10).await.unwrap(), 0);
    }

    #[tokio::test(start_paused = true)]
    async fn stop_is_idempotent_and_clears_cache() {
        let adapter = adapter(ScriptedConnector::new(Vec::new()), registry(), Arc::new(NoopPublisher));
        adapter.initialize().await.unwrap();
        adapter.start_monitoring().await.unwrap();
        adapter.start_monitoring().await.unwrap();
        tokio::time::sleep(Duration::from_secs(1)).await;
        assert!(!adapter.inner.live.read().await.is_empty());

        adapter.stop_monitoring().await;
        adapter.stop_monitoring().await;
        assert!(adapter.inner.live.read().await.is_empty());
        assert!(!adapter.get_status().await.monitoring);
    }

    #[tokio::test(start_paused = true)]
    async fn simulated_readings_are_tagged() {
        let repos = registry();
        let settings = AtgSettings {
            persist_interval: Duration::from_secs(60),
            ..Default::default()
        };
        let adapter = AtgAdapter::with_connector(
            settings,
            ScriptedConnector::unreachable(),
            repos.clone(),
            Arc::new(NoopPublisher),
        );
        adapter.initialize().await.unwrap();
        adapter.start_monitoring().await.unwrap();
        tokio::time::sleep(Duration::from_secs(1)).await;

        let snapshots = adapter
            .get_current_tank_data(&TankFilter::default())
            .await
            .unwrap();
        assert_eq!(snapshots.len(), 3);
        assert!(snapshots
            .iter()
            .all(|s| s.interface_source.as_deref() == Some("ATG_SIMULATED")));

        tokio::time::sleep(Duration::from_secs(61)).await;
        let stored = repos.readings().latest_for_tank(10).await.unwrap().expect("persisted");
        assert_eq!(stored.interface_source, "ATG_SIMULATED");
        adapter.stop_monitoring().await;
    }
}
