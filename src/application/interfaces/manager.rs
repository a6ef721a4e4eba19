//! Interface manager — adapter registry and station router

use std::collections::HashMap;
use std::sync::Arc;

use dashmap::DashMap;
use futures_util::future::join_all;
use serde::Serialize;
use tokio::sync::RwLock;
use tracing::{error, info, warn};

use crate::application::ports::{AdapterResult, SharedAdapter};
use crate::domain::{DomainResult, InterfaceStatus, RepositoryProvider};

/// Result of one lifecycle step for one adapter.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct LifecycleOutcome {
    pub interface_code: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
}

impl LifecycleOutcome {
    fn from_result(interface_code: String, result: AdapterResult<()>) -> Self {
        Self {
            interface_code,
            error: result.err().map(|e| e.to_string()),
        }
    }

    pub fn is_ok(&self) -> bool {
        self.error.is_none()
    }
}

/// Registry of telemetry adapters keyed by interface code.
///
/// Codes and aliases are case-insensitive. The station → interface map is
/// rebuilt from the registry on demand and swapped in whole.
pub struct InterfaceManager {
    adapters: DashMap<String, SharedAdapter>,
    aliases: DashMap<String, String>,
    default_code: String,
    repos: Arc<dyn RepositoryProvider>,
    station_map: RwLock<Arc<HashMap<i32, String>>>,
}

pub type SharedInterfaceManager = Arc<InterfaceManager>;

impl InterfaceManager {
    pub fn new(default_code: &str, repos: Arc<dyn RepositoryProvider>) -> Self {
        Self {
            adapters: DashMap::new(),
            aliases: DashMap::new(),
            default_code: default_code.to_ascii_uppercase(),
            repos,
            station_map: RwLock::new(Arc::new(HashMap::new())),
        }
    }

    pub fn default_code(&self) -> &str {
        &self.default_code
    }

    /// Register an adapter under its own interface code.
    pub fn register(&self, adapter: SharedAdapter) {
        let code = adapter.interface_code().to_ascii_uppercase();
        info!(interface = %code, "Registering telemetry adapter");
        if self.adapters.insert(code.clone(), adapter).is_some() {
            warn!(interface = %code, "Replaced previously registered adapter");
        }
    }

    /// Make `alias` resolve to the adapter registered under `code`. The
    /// adapter also starts claiming stations registered under the alias.
    pub fn register_alias(&self, alias: &str, code: &str) -> bool {
        let target = code.to_ascii_uppercase();
        let Some(adapter) = self.adapters.get(&target).map(|a| a.value().clone()) else {
            warn!(alias, interface = %target, "Alias target is not registered");
            return false;
        };
        adapter.accept_alias(alias);
        self.aliases.insert(alias.trim().to_ascii_uppercase(), target);
        true
    }

    /// Canonical code for a code or alias.
    pub fn resolve_code(&self, code: &str) -> Option<String> {
        let code = code.trim().to_ascii_uppercase();
        if self.adapters.contains_key(&code) {
            return Some(code);
        }
        self.aliases.get(&code).map(|target| target.value().clone())
    }

    /// Adapter for an interface code or alias.
    pub fn get_service(&self, code: &str) -> Option<SharedAdapter> {
        let code = self.resolve_code(code)?;
        self.adapters.get(&code).map(|a| a.value().clone())
    }

    pub fn default_service(&self) -> Option<SharedAdapter> {
        self.get_service(&self.default_code)
    }

    /// Rebuild the station → interface map from active stations.
    pub async fn reload_station_mappings(&self) -> DomainResult<usize> {
        let stations = self.repos.stations().find_active().await?;
        let map: HashMap<i32, String> = stations
            .into_iter()
            .filter_map(|s| {
                s.interface_code
                    .filter(|code| !code.trim().is_empty())
                    .map(|code| (s.id, code.trim().to_ascii_uppercase()))
            })
            .collect();
        let count = map.len();
        *self.station_map.write().await = Arc::new(map);
        info!(stations = count, "🗺️ Station interface mappings reloaded");
        Ok(count)
    }

    /// Interface code a station is mapped to, if any.
    pub async fn station_interface(&self, station_id: i32) -> Option<String> {
        let map = self.station_map.read().await.clone();
        map.get(&station_id).cloned()
    }

    /// Adapter serving a station; unmapped or unknown codes fall back to the
    /// default adapter.
    pub async fn get_service_for_station(&self, station_id: i32) -> Option<SharedAdapter> {
        match self.station_interface(station_id).await {
            Some(code) => {
                if let Some(adapter) = self.get_service(&code) {
                    return Some(adapter);
                }
                warn!(
                    station_id,
                    interface = %code,
                    fallback = %self.default_code,
                    "No adapter for station interface, using default"
                );
            }
            None => {
                warn!(
                    station_id,
                    fallback = %self.default_code,
                    "Station has no interface mapping, using default"
                );
            }
        }
        self.default_service()
    }

    /// Every registered adapter once, ordered by code.
    fn distinct_adapters(&self) -> Vec<(String, SharedAdapter)> {
        let mut adapters: Vec<(String, SharedAdapter)> = self
            .adapters
            .iter()
            .map(|entry| (entry.key().clone(), entry.value().clone()))
            .collect();
        adapters.sort_by(|a, b| a.0.cmp(&b.0));
        adapters
    }

    pub async fn initialize_all(&self) -> Vec<LifecycleOutcome> {
        let outcomes = join_all(self.distinct_adapters().into_iter().map(|(code, adapter)| async move {
            LifecycleOutcome::from_result(code, adapter.initialize().await)
        }))
        .await;
        log_outcomes("initialize", &outcomes);
        outcomes
    }

    pub async fn start_all_monitoring(&self) -> Vec<LifecycleOutcome> {
        let outcomes = join_all(self.distinct_adapters().into_iter().map(|(code, adapter)| async move {
            LifecycleOutcome::from_result(code, adapter.start_monitoring().await)
        }))
        .await;
        log_outcomes("start monitoring", &outcomes);
        outcomes
    }

    pub async fn stop_all_monitoring(&self) -> Vec<LifecycleOutcome> {
        let outcomes = join_all(self.distinct_adapters().into_iter().map(|(code, adapter)| async move {
            adapter.stop_monitoring().await;
            LifecycleOutcome::from_result(code, Ok(()))
        }))
        .await;
        log_outcomes("stop monitoring", &outcomes);
        outcomes
    }

    pub async fn get_all_statuses(&self) -> Vec<InterfaceStatus> {
        join_all(
            self.distinct_adapters()
                .into_iter()
                .map(|(_, adapter)| async move { adapter.get_status().await }),
        )
        .await
    }
}

fn log_outcomes(step: &str, outcomes: &[LifecycleOutcome]) {
    for outcome in outcomes {
        match &outcome.error {
            None => info!(interface = %outcome.interface_code, "✅ {} succeeded", step),
            Some(e) => error!(interface = %outcome.interface_code, error = %e, "{} failed", step),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::application::ports::{
        AdapterError, IngestSummary, TankSnapshot, TelemetryAdapter,
    };
    use crate::domain::{
        ConnectionState, FuelTransaction, Station, TankFilter, TransactionQuery,
    };
    use crate::infrastructure::storage::InMemoryRepositoryProvider;
    use async_trait::async_trait;
    use serde_json::Value;
    use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};
    use std::sync::Mutex;

    struct FakeAdapter {
        code: String,
        fail_start: bool,
        monitoring: AtomicBool,
        starts: AtomicUsize,
        stops: AtomicUsize,
        aliases: Mutex<Vec<String>>,
    }

    impl FakeAdapter {
        fn new(code: &str, fail_start: bool) -> Arc<Self> {
            Arc::new(Self {
                code: code.to_string(),
                fail_start,
                monitoring: AtomicBool::new(false),
                starts: AtomicUsize::new(0),
                stops: AtomicUsize::new(0),
                aliases: Mutex::new(Vec::new()),
            })
        }
    }

    #[async_trait]
    impl TelemetryAdapter for FakeAdapter {
        fn interface_code(&self) -> &str {
            &self.code
        }

        fn accept_alias(&self, alias: &str) {
            self.aliases.lock().unwrap().push(alias.to_ascii_uppercase());
        }

        async fn initialize(&self) -> AdapterResult<()> {
            Ok(())
        }

        async fn start_monitoring(&self) -> AdapterResult<()> {
            self.starts.fetch_add(1, Ordering::SeqCst);
            if self.fail_start {
                return Err(AdapterError::Transport("port busy".into()));
            }
            self.monitoring.store(true, Ordering::SeqCst);
            Ok(())
        }

        async fn stop_monitoring(&self) {
            self.stops.fetch_add(1, Ordering::SeqCst);
            self.monitoring.store(false, Ordering::SeqCst);
        }

        fn is_monitoring(&self) -> bool {
            self.monitoring.load(Ordering::SeqCst)
        }

        async fn get_current_tank_data(&self, _filter: &TankFilter) -> AdapterResult<Vec<TankSnapshot>> {
            Ok(Vec::new())
        }

        async fn get_transactions(&self, _query: &TransactionQuery) -> AdapterResult<Vec<FuelTransaction>> {
            Ok(Vec::new())
        }

        async fn receive_transaction_data(
            &self,
            _payload: &Value,
            _station: &Station,
        ) -> AdapterResult<IngestSummary> {
            Ok(IngestSummary::default())
        }

        async fn get_status(&self) -> InterfaceStatus {
            InterfaceStatus {
                interface_code: self.code.clone(),
                station_id: None,
                connected: false,
                monitoring: self.is_monitoring(),
                mode: None,
                state: ConnectionState::Disconnected,
                last_communication: None,
                error_count: 0,
                last_error: None,
                active_endpoint: None,
                probes: Vec::new(),
            }
        }
    }

    fn station(id: i32, code: Option<&str>) -> Station {
        Station {
            id,
            code: format!("ST-{id}"),
            name: format!("Station {id}"),
            is_active: true,
            interface_code: code.map(str::to_string),
            ewura_license_no: None,
        }
    }

    fn manager() -> (InterfaceManager, Arc<FakeAdapter>, Arc<FakeAdapter>) {
        let repos = Arc::new(InMemoryRepositoryProvider::new());
        repos.insert_station(station(1, Some("atg")));
        repos.insert_station(station(2, Some("PTS")));
        repos.insert_station(station(3, None));
        repos.insert_station(station(4, Some("LEGACY")));

        let manager = InterfaceManager::new("atg", repos);
        let atg = FakeAdapter::new("ATG", false);
        let nfpp = FakeAdapter::new("NFPP", true);
        manager.register(atg.clone());
        manager.register(nfpp.clone());
        assert!(manager.register_alias("pts", "nfpp"));
        (manager, atg, nfpp)
    }

    #[tokio::test]
    async fn aliases_resolve_to_the_same_adapter() {
        let (manager, atg, nfpp) = manager();
        assert_eq!(*nfpp.aliases.lock().unwrap(), vec!["PTS".to_string()]);
        assert!(atg.aliases.lock().unwrap().is_empty());
        let by_alias = manager.get_service("Pts").unwrap();
        let by_code = manager.get_service("NFPP").unwrap();
        assert!(Arc::ptr_eq(&by_alias, &by_code));
        assert!(manager.get_service("unknown").is_none());
        assert!(!manager.register_alias("x", "missing"));
    }

    #[tokio::test]
    async fn stations_route_with_default_fallback() {
        let (manager, _, _) = manager();
        assert_eq!(manager.reload_station_mappings().await.unwrap(), 3);

        let svc = manager.get_service_for_station(2).await.unwrap();
        assert_eq!(svc.interface_code(), "NFPP");
        let svc = manager.get_service_for_station(1).await.unwrap();
        assert_eq!(svc.interface_code(), "ATG");
        // no mapping, unknown code, unknown station
        for id in [3, 4, 99] {
            let svc = manager.get_service_for_station(id).await.unwrap();
            assert_eq!(svc.interface_code(), "ATG");
        }
    }

    #[tokio::test]
    async fn lifecycle_isolates_failures_and_deduplicates() {
        let (manager, atg, nfpp) = manager();

        let outcomes = manager.start_all_monitoring().await;
        assert_eq!(outcomes.len(), 2);
        assert!(outcomes.iter().find(|o| o.interface_code == "ATG").unwrap().is_ok());
        let failed = outcomes.iter().find(|o| o.interface_code == "NFPP").unwrap();
        assert!(failed.error.as_deref().unwrap().contains("port busy"));

        assert_eq!(atg.starts.load(Ordering::SeqCst), 1);
        assert_eq!(nfpp.starts.load(Ordering::SeqCst), 1);
        assert!(atg.is_monitoring());

        let statuses = manager.get_all_statuses().await;
        assert_eq!(statuses.len(), 2);

        let outcomes = manager.stop_all_monitoring().await;
        assert!(outcomes.iter().all(LifecycleOutcome::is_ok));
        assert_eq!(atg.stops.load(Ordering::SeqCst), 1);
        assert!(!atg.is_monitoring());
    }
}
