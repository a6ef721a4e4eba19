//! In-memory repository provider for development and testing

use async_trait::async_trait;
use chrono::{DateTime, NaiveDate, NaiveDateTime, Utc};
use dashmap::mapref::entry::Entry;
use dashmap::DashMap;

use crate::domain::{
    AnomalyAlert, DetectionRepository, DomainResult, FuelTransaction, InterfaceSource, Product,
    ReadingRepository, RefillEvent, RepositoryProvider, Station, StationRepository, Tank,
    TankFilter, TankInfo, TankReading, TransactionQuery, TransactionRepository,
};

/// Every repository backed by `DashMap`s, keyed by the same natural keys as
/// the database unique indexes.
pub struct InMemoryRepositoryProvider {
    stations: DashMap<i32, Station>,
    tanks: DashMap<i32, Tank>,
    products: DashMap<i32, Product>,
    readings: DashMap<(i32, DateTime<Utc>), TankReading>,
    transactions: DashMap<(i32, String, NaiveDate), FuelTransaction>,
    refill_events: DashMap<(i32, DateTime<Utc>), RefillEvent>,
    anomaly_alerts: DashMap<(i32, NaiveDate), AnomalyAlert>,
}

impl InMemoryRepositoryProvider {
    pub fn new() -> Self {
        Self {
            stations: DashMap::new(),
            tanks: DashMap::new(),
            products: DashMap::new(),
            readings: DashMap::new(),
            transactions: DashMap::new(),
            refill_events: DashMap::new(),
            anomaly_alerts: DashMap::new(),
        }
    }

    // Registry seeding; inserts overwrite by id.

    pub fn insert_station(&self, station: Station) {
        self.stations.insert(station.id, station);
    }

    pub fn insert_tank(&self, tank: Tank) {
        self.tanks.insert(tank.id, tank);
    }

    pub fn insert_product(&self, product: Product) {
        self.products.insert(product.id, product);
    }

    fn readings_in(&self, tank_id: i32, from: DateTime<Utc>, to: DateTime<Utc>) -> Vec<TankReading> {
        let mut readings: Vec<TankReading> = self
            .readings
            .iter()
            .filter(|r| r.tank_id == tank_id && r.timestamp >= from && r.timestamp < to)
            .map(|r| r.value().clone())
            .collect();
        readings.sort_by_key(|r| r.timestamp);
        readings
    }
}

impl Default for InMemoryRepositoryProvider {
    fn default() -> Self {
        Self::new()
    }
}

impl RepositoryProvider for InMemoryRepositoryProvider {
    fn readings(&self) -> &dyn ReadingRepository {
        self
    }

    fn transactions(&self) -> &dyn TransactionRepository {
        self
    }

    fn stations(&self) -> &dyn StationRepository {
        self
    }

    fn detections(&self) -> &dyn DetectionRepository {
        self
    }
}

#[async_trait]
impl ReadingRepository for InMemoryRepositoryProvider {
    async fn upsert(&self, reading: TankReading) -> DomainResult<()> {
        self.readings
            .insert((reading.tank_id, reading.timestamp), reading);
        Ok(())
    }

    async fn latest_for_tank(&self, tank_id: i32) -> DomainResult<Option<TankReading>> {
        Ok(self
            .readings
            .iter()
            .filter(|r| r.tank_id == tank_id)
            .max_by_key(|r| r.timestamp)
            .map(|r| r.value().clone()))
    }

    async fn find_between(
        &self,
        tank_id: i32,
        from: DateTime<Utc>,
        to: DateTime<Utc>,
    ) -> DomainResult<Vec<TankReading>> {
        Ok(self.readings_in(tank_id, from, to))
    }

    async fn first_between(
        &self,
        tank_id: i32,
        from: DateTime<Utc>,
        to: DateTime<Utc>,
    ) -> DomainResult<Option<TankReading>> {
        Ok(self.readings_in(tank_id, from, to).into_iter().next())
    }

    async fn last_between(
        &self,
        tank_id: i32,
        from: DateTime<Utc>,
        to: DateTime<Utc>,
    ) -> DomainResult<Option<TankReading>> {
        Ok(self.readings_in(tank_id, from, to).pop())
    }

    async fn count_for_tank(&self, tank_id: i32) -> DomainResult<u64> {
        Ok(self.readings.iter().filter(|r| r.tank_id == tank_id).count() as u64)
    }
}

fn source_matches(tx: &FuelTransaction, interface_code: &str) -> bool {
    InterfaceSource::tags_for(interface_code)
        .iter()
        .any(|tag| tag.eq_ignore_ascii_case(&tx.interface_source))
}

#[async_trait]
impl TransactionRepository for InMemoryRepositoryProvider {
    async fn insert_if_absent(&self, transaction: FuelTransaction) -> DomainResult<bool> {
        match self.transactions.entry(transaction.natural_key()) {
            Entry::Occupied(_) => Ok(false),
            Entry::Vacant(slot) => {
                slot.insert(transaction);
                Ok(true)
            }
        }
    }

    async fn find(&self, query: &TransactionQuery) -> DomainResult<Vec<FuelTransaction>> {
        let mut found: Vec<FuelTransaction> = self
            .transactions
            .iter()
            .filter(|t| query.station_id.map_or(true, |id| t.station_id == id))
            .filter(|t| {
                query
                    .interface_code
                    .as_deref()
                    .map_or(true, |code| source_matches(t, code))
            })
            .filter(|t| query.date.map_or(true, |d| t.transaction_date == d))
            .map(|t| t.value().clone())
            .collect();
        found.sort_by(|a, b| b.occurred_at().cmp(&a.occurred_at()));
        found.truncate(query.limit as usize);
        Ok(found)
    }

    async fn latest_occurred_at(
        &self,
        station_id: i32,
        source: &InterfaceSource,
    ) -> DomainResult<Option<NaiveDateTime>> {
        let tag = source.to_string();
        Ok(self
            .transactions
            .iter()
            .filter(|t| t.station_id == station_id && t.interface_source.eq_ignore_ascii_case(&tag))
            .map(|t| t.occurred_at())
            .max())
    }
}

#[async_trait]
impl StationRepository for InMemoryRepositoryProvider {
    async fn find_by_id(&self, id: i32) -> DomainResult<Option<Station>> {
        Ok(self.stations.get(&id).map(|s| s.value().clone()))
    }

    async fn find_active(&self) -> DomainResult<Vec<Station>> {
        let mut stations: Vec<Station> = self
            .stations
            .iter()
            .filter(|s| s.is_active)
            .map(|s| s.value().clone())
            .collect();
        stations.sort_by_key(|s| s.id);
        Ok(stations)
    }

    async fn find_active_by_interfaces(&self, codes: &[String]) -> DomainResult<Vec<Station>> {
        Ok(self
            .find_active()
            .await?
            .into_iter()
            .filter(|s| s.uses_any_interface(codes))
            .collect())
    }

    async fn find_tanks(&self, filter: &TankFilter) -> DomainResult<Vec<TankInfo>> {
        let mut tanks: Vec<TankInfo> = self
            .tanks
            .iter()
            .filter_map(|tank| {
                let station = self.stations.get(&tank.station_id)?.value().clone();
                let product = tank
                    .product_id
                    .and_then(|id| self.products.get(&id).map(|p| p.value().clone()));
                Some(TankInfo {
                    tank: tank.value().clone(),
                    station,
                    product,
                })
            })
            .filter(|info| filter.matches(info))
            .collect();
        tanks.sort_by_key(|info| (info.station.id, info.tank.number));
        Ok(tanks)
    }
}

#[async_trait]
impl DetectionRepository for InMemoryRepositoryProvider {
    async fn save_refill_event(&self, event: RefillEvent) -> DomainResult<bool> {
        match self.refill_events.entry((event.tank_id, event.detected_at)) {
            Entry::Occupied(_) => Ok(false),
            Entry::Vacant(slot) => {
                slot.insert(event);
                Ok(true)
            }
        }
    }

    async fn save_anomaly_alert(&self, alert: AnomalyAlert) -> DomainResult<bool> {
        match self.anomaly_alerts.entry((alert.tank_id, alert.detection_date)) {
            Entry::Occupied(_) => Ok(false),
            Entry::Vacant(slot) => {
                slot.insert(alert);
                Ok(true)
            }
        }
    }

    async fn refill_events_for_tank(&self, tank_id: i32) -> DomainResult<Vec<RefillEvent>> {
        let mut events: Vec<RefillEvent> = self
            .refill_events
            .iter()
            .filter(|e| e.tank_id == tank_id)
            .map(|e| e.value().clone())
            .collect();
        events.sort_by_key(|e| e.detected_at);
        Ok(events)
    }

    async fn anomaly_alerts_on(&self, date: NaiveDate) -> DomainResult<Vec<AnomalyAlert>> {
        let mut alerts: Vec<AnomalyAlert> = self
            .anomaly_alerts
            .iter()
            .filter(|a| a.detection_date == date)
            .map(|a| a.value().clone())
            .collect();
        alerts.sort_by_key(|a| a.tank_id);
        Ok(alerts)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::{NaiveTime, TimeZone};

    fn tx(id: &str, time: (u32, u32), source: &str) -> FuelTransaction {
        FuelTransaction {
            station_id: 1,
            transaction_id: id.to_string(),
            pump: Some(1),
            nozzle: Some(1),
            volume: 10.0,
            unit_price: 3000.0,
            amount: 30000.0,
            tc_volume: 10.0,
            discount_amount: 0.0,
            transaction_date: NaiveDate::from_ymd_opt(2024, 1, 15).unwrap(),
            transaction_time: NaiveTime::from_hms_opt(time.0, time.1, 0).unwrap(),
            fuel_grade_name: "Petrol".into(),
            customer_name: None,
            efd_serial: None,
            interface_source: source.to_string(),
        }
    }

    #[tokio::test]
    async fn transactions_are_insert_or_ignore() {
        let repos = InMemoryRepositoryProvider::new();
        assert!(repos.insert_if_absent(tx("1", (8, 0), "NFPP")).await.unwrap());
        assert!(!repos.insert_if_absent(tx("1", (9, 0), "NFPP")).await.unwrap());
        assert!(repos.insert_if_absent(tx("2", (10, 30), "NFPP_SIMULATED")).await.unwrap());
        assert!(repos.insert_if_absent(tx("3", (11, 0), "ATG")).await.unwrap());

        let latest = repos
            .latest_occurred_at(1, &InterfaceSource::real("nfpp"))
            .await
            .unwrap()
            .unwrap();
        assert_eq!(latest.time(), NaiveTime::from_hms_opt(8, 0, 0).unwrap());

        let found = repos
            .find(&TransactionQuery {
                interface_code: Some("NFPP".into()),
                ..Default::default()
            })
            .await
            .unwrap();
        let ids: Vec<_> = found.iter().map(|t| t.transaction_id.as_str()).collect();
        assert_eq!(ids, vec!["2", "1"]);
    }

    #[tokio::test]
    async fn latest_sale_time_is_per_exact_tag() {
        let repos = InMemoryRepositoryProvider::new();
        repos.insert_if_absent(tx("7001", (7, 45), "NFPP")).await.unwrap();
        repos.insert_if_absent(tx("SIM-1", (12, 0), "NFPP_SIMULATED")).await.unwrap();

        let real = repos
            .latest_occurred_at(1, &InterfaceSource::real("NFPP"))
            .await
            .unwrap()
            .unwrap();
        assert_eq!(real.time(), NaiveTime::from_hms_opt(7, 45, 0).unwrap());

        let simulated = repos
            .latest_occurred_at(1, &InterfaceSource::simulated("NFPP"))
            .await
            .unwrap()
            .unwrap();
        assert_eq!(simulated.time(), NaiveTime::from_hms_opt(12, 0, 0).unwrap());
        assert!(repos
            .latest_occurred_at(2, &InterfaceSource::real("NFPP"))
            .await
            .unwrap()
            .is_none());
    }

    #[tokio::test]
    async fn reading_ranges_are_half_open() {
        let repos = InMemoryRepositoryProvider::new();
        let at = |h| Utc.with_ymd_and_hms(2024, 1, 15, h, 0, 0).unwrap();
        for h in [1, 2, 3] {
            let reading = TankReading {
                tank_id: 5,
                tank_number: 1,
                timestamp: at(h),
                measurement: crate::domain::TankMeasurement::new(
                    1000.0 * h as f64, 0.0, 0.0, 0.0, 0.0, 0.0, 20.0,
                ),
                status: crate::domain::TankStatus::Online,
                interface_source: "ATG".into(),
                raw_payload: None,
            };
            repos.upsert(reading).await.unwrap();
        }

        let between = repos.find_between(5, at(1), at(3)).await.unwrap();
        assert_eq!(between.len(), 2);
        let last = repos.last_between(5, at(1), at(3)).await.unwrap().unwrap();
        assert_eq!(last.timestamp, at(2));
        assert_eq!(repos.count_for_tank(5).await.unwrap(), 3);
    }
}
