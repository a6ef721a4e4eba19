//! SeaORM implementation of RepositoryProvider

use sea_orm::DatabaseConnection;

use crate::domain::{
    DetectionRepository, ReadingRepository, RepositoryProvider, StationRepository,
    TransactionRepository,
};

use super::detection_repository::SeaOrmDetectionRepository;
use super::reading_repository::SeaOrmReadingRepository;
use super::station_repository::SeaOrmStationRepository;
use super::transaction_repository::SeaOrmTransactionRepository;

/// Unified repository provider backed by SeaORM.
///
/// Holds one connection pool and exposes per-aggregate repository accessors.
///
/// ```ignore
/// let repos = SeaOrmRepositoryProvider::new(db.clone());
/// let tanks = repos.stations().find_tanks(&TankFilter::station(1)).await?;
/// let latest = repos.readings().latest_for_tank(tanks[0].tank.id).await?;
/// ```
pub struct SeaOrmRepositoryProvider {
    readings: SeaOrmReadingRepository,
    transactions: SeaOrmTransactionRepository,
    stations: SeaOrmStationRepository,
    detections: SeaOrmDetectionRepository,
}

impl SeaOrmRepositoryProvider {
    pub fn new(db: DatabaseConnection) -> Self {
        Self {
            readings: SeaOrmReadingRepository::new(db.clone()),
            transactions: SeaOrmTransactionRepository::new(db.clone()),
            stations: SeaOrmStationRepository::new(db.clone()),
            detections: SeaOrmDetectionRepository::new(db),
        }
    }
}

impl RepositoryProvider for SeaOrmRepositoryProvider {
    fn readings(&self) -> &dyn ReadingRepository {
        &self.readings
    }

    fn transactions(&self) -> &dyn TransactionRepository {
        &self.transactions
    }

    fn stations(&self) -> &dyn StationRepository {
        &self.stations
    }

    fn detections(&self) -> &dyn DetectionRepository {
        &self.detections
    }
}
