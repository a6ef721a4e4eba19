//! Transaction repository interface

use async_trait::async_trait;
use chrono::NaiveDateTime;

use super::model::{FuelTransaction, TransactionQuery};
use crate::domain::{DomainResult, InterfaceSource};

#[async_trait]
pub trait TransactionRepository: Send + Sync {
    /// Insert-or-ignore on `(station_id, transaction_id, transaction_date)`.
    ///
    /// Returns `true` if a new row was stored.
    async fn insert_if_absent(&self, transaction: FuelTransaction) -> DomainResult<bool>;
    async fn find(&self, query: &TransactionQuery) -> DomainResult<Vec<FuelTransaction>>;
    /// Most recent stored date/time for a station under exactly `source`.
    ///
    /// Real and simulated tags are never mixed.
    async fn latest_occurred_at(
        &self,
        station_id: i32,
        source: &InterfaceSource,
    ) -> DomainResult<Option<NaiveDateTime>>;
}
