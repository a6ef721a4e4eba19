//! SeaORM implementation of TransactionRepository

use async_trait::async_trait;
use chrono::{NaiveDateTime, Utc};
use log::debug;
use sea_orm::sea_query::OnConflict;
use sea_orm::{
    ColumnTrait, DatabaseConnection, EntityTrait, NotSet, QueryFilter, QueryOrder, QuerySelect,
    Set,
};

use crate::domain::{
    DomainError, DomainResult, FuelTransaction, InterfaceSource, TransactionQuery,
    TransactionRepository,
};
use crate::infrastructure::database::entities::transaction;

pub struct SeaOrmTransactionRepository {
    db: DatabaseConnection,
}

impl SeaOrmTransactionRepository {
    pub fn new(db: DatabaseConnection) -> Self {
        Self { db }
    }
}

// ── Conversion helpers ──────────────────────────────────────────

fn model_to_domain(m: transaction::Model) -> FuelTransaction {
    FuelTransaction {
        station_id: m.station_id,
        transaction_id: m.transaction_id,
        pump: m.pump,
        nozzle: m.nozzle,
        volume: m.volume,
        unit_price: m.unit_price,
        amount: m.amount,
        tc_volume: m.tc_volume,
        discount_amount: m.discount_amount,
        transaction_date: m.transaction_date,
        transaction_time: m.transaction_time,
        fuel_grade_name: m.fuel_grade_name,
        customer_name: m.customer_name,
        efd_serial: m.efd_serial,
        interface_source: m.interface_source,
    }
}

fn db_err(e: sea_orm::DbErr) -> DomainError {
    DomainError::Storage(format!("Database error: {}", e))
}

// ── TransactionRepository impl ──────────────────────────────────

#[async_trait]
impl TransactionRepository for SeaOrmTransactionRepository {
    async fn insert_if_absent(&self, t: FuelTransaction) -> DomainResult<bool> {
        debug!(
            "Storing transaction: station={} id={} date={}",
            t.station_id, t.transaction_id, t.transaction_date
        );

        let model = transaction::ActiveModel {
            id: NotSet,
            station_id: Set(t.station_id),
            transaction_id: Set(t.transaction_id),
            pump: Set(t.pump),
            nozzle: Set(t.nozzle),
            volume: Set(t.volume),
            unit_price: Set(t.unit_price),
            amount: Set(t.amount),
            tc_volume: Set(t.tc_volume),
            discount_amount: Set(t.discount_amount),
            transaction_date: Set(t.transaction_date),
            transaction_time: Set(t.transaction_time),
            fuel_grade_name: Set(t.fuel_grade_name),
            customer_name: Set(t.customer_name),
            efd_serial: Set(t.efd_serial),
            interface_source: Set(t.interface_source),
            created_at: Set(Utc::now()),
        };

        let inserted = transaction::Entity::insert(model)
            .on_conflict(
                OnConflict::columns([
                    transaction::Column::StationId,
                    transaction::Column::TransactionId,
                    transaction::Column::TransactionDate,
                ])
                .do_nothing()
                .to_owned(),
            )
            .exec_without_returning(&self.db)
            .await
            .map_err(db_err)?;
        Ok(inserted > 0)
    }

    async fn find(&self, query: &TransactionQuery) -> DomainResult<Vec<FuelTransaction>> {
        let mut select = transaction::Entity::find();
        if let Some(station_id) = query.station_id {
            select = select.filter(transaction::Column::StationId.eq(station_id));
        }
        if let Some(code) = &query.interface_code {
            select = select.filter(transaction::Column::InterfaceSource.is_in(InterfaceSource::tags_for(code)));
        }
        if let Some(date) = query.date {
            select = select.filter(transaction::Column::TransactionDate.eq(date));
        }

        let models = select
            .order_by_desc(transaction::Column::TransactionDate)
            .order_by_desc(transaction::Column::TransactionTime)
            .order_by_desc(transaction::Column::Id)
            .limit(query.limit)
            .all(&self.db)
            .await
            .map_err(db_err)?;
        Ok(models.into_iter().map(model_to_domain).collect())
    }

    async fn latest_occurred_at(
        &self,
        station_id: i32,
        source: &InterfaceSource,
    ) -> DomainResult<Option<NaiveDateTime>> {
        let model = transaction::Entity::find()
            .filter(transaction::Column::StationId.eq(station_id))
            .filter(transaction::Column::InterfaceSource.eq(source.to_string()))
            .order_by_desc(transaction::Column::TransactionDate)
            .order_by_desc(transaction::Column::TransactionTime)
            .one(&self.db)
            .await
            .map_err(db_err)?;
        Ok(model.map(|m| m.transaction_date.and_time(m.transaction_time)))
    }
}
