//! Fuel sale transaction entity

use chrono::{NaiveDate, NaiveDateTime, NaiveTime};
use serde::{Deserialize, Serialize};

/// One completed fuel sale.
///
/// Natural key: `(station_id, transaction_id, transaction_date)`. Date and time
/// are kept as the station reported them (station-local wall clock).
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct FuelTransaction {
    pub station_id: i32,
    /// External transaction id assigned by the forecourt controller
    pub transaction_id: String,
    pub pump: Option<i32>,
    pub nozzle: Option<i32>,
    pub volume: f64,
    pub unit_price: f64,
    pub amount: f64,
    pub tc_volume: f64,
    pub discount_amount: f64,
    pub transaction_date: NaiveDate,
    pub transaction_time: NaiveTime,
    pub fuel_grade_name: String,
    pub customer_name: Option<String>,
    pub efd_serial: Option<String>,
    pub interface_source: String,
}

impl FuelTransaction {
    pub fn occurred_at(&self) -> NaiveDateTime {
        self.transaction_date.and_time(self.transaction_time)
    }

    /// The natural key as a tuple.
    pub fn natural_key(&self) -> (i32, String, NaiveDate) {
        (
            self.station_id,
            self.transaction_id.clone(),
            self.transaction_date,
        )
    }
}

/// Filter for transaction queries. Results are most-recent-first.
#[derive(Debug, Clone)]
pub struct TransactionQuery {
    pub station_id: Option<i32>,
    pub interface_code: Option<String>,
    pub date: Option<NaiveDate>,
    pub limit: u64,
}

impl Default for TransactionQuery {
    fn default() -> Self {
        Self {
            station_id: None,
            interface_code: None,
            date: None,
            limit: 100,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn occurred_at_combines_date_and_time() {
        let tx = FuelTransaction {
            station_id: 1,
            transaction_id: "T1".into(),
            pump: Some(2),
            nozzle: None,
            volume: 20.0,
            unit_price: 3000.0,
            amount: 60000.0,
            tc_volume: 19.9,
            discount_amount: 0.0,
            transaction_date: NaiveDate::from_ymd_opt(2024, 1, 15).unwrap(),
            transaction_time: NaiveTime::from_hms_opt(10, 30, 0).unwrap(),
            fuel_grade_name: "Diesel".into(),
            customer_name: None,
            efd_serial: None,
            interface_source: "NFPP".into(),
        };
        assert_eq!(tx.occurred_at().to_string(), "2024-01-15 10:30:00");
        assert_eq!(tx.natural_key().1, "T1");
    }
}
