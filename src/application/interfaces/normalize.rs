//! Vendor field normalization
//!
//! Controllers and station back-offices name the same field several ways
//! (`Volume`, `Quantity`, `Liters`...). Lookups try every alias exactly first,
//! then case-insensitively. Null values count as absent.

use chrono::{DateTime, NaiveDate, NaiveDateTime, NaiveTime};
use serde_json::Value;

use crate::application::ports::{AdapterError, AdapterResult};
use crate::domain::FuelTransaction;

const ID_KEYS: &[&str] = &[
    "Transaction",
    "TransactionId",
    "TransactionID",
    "transaction_id",
    "Id",
    "id",
];
const PUMP_KEYS: &[&str] = &["Pump", "PumpId", "PumpNumber", "pump"];
const NOZZLE_KEYS: &[&str] = &["Nozzle", "NozzleId", "NozzleNumber", "nozzle"];
const VOLUME_KEYS: &[&str] = &["Volume", "Quantity", "Liters", "volume"];
const PRICE_KEYS: &[&str] = &["Price", "UnitPrice", "unit_price"];
const AMOUNT_KEYS: &[&str] = &["Amount", "TotalAmount", "Total", "amount"];
const TC_VOLUME_KEYS: &[&str] = &["TCVolume", "TcVolume", "tc_volume"];
const DISCOUNT_KEYS: &[&str] = &["Discount", "DiscountAmount", "discount_amount"];
const DATETIME_KEYS: &[&str] = &[
    "DateTime",
    "DateTimeEnd",
    "TransactionDateTime",
    "transaction_datetime",
];
const DATE_KEYS: &[&str] = &["Date", "TransactionDate", "transaction_date"];
const TIME_KEYS: &[&str] = &["Time", "TransactionTime", "transaction_time"];
const GRADE_KEYS: &[&str] = &["FuelGradeName", "FuelGrade", "Product", "fuel_grade_name"];
const CUSTOMER_KEYS: &[&str] = &["CustomerName", "Customer", "customer_name"];
const EFD_KEYS: &[&str] = &["EfdSerial", "EFDSerial", "efd_serial"];

const WRAPPER_KEYS: &[&str] = &["transactions", "Transactions", "data", "Data"];

const DATETIME_FORMATS: &[&str] = &["%Y-%m-%dT%H:%M:%S", "%Y-%m-%d %H:%M:%S", "%Y-%m-%dT%H:%M:%S%.f"];
const TIME_FORMATS: &[&str] = &["%H:%M:%S", "%H:%M"];

// ── Field lookups ───────────────────────────────────────────────

/// First non-null value under any of `keys`.
pub fn field<'a>(obj: &'a Value, keys: &[&str]) -> Option<&'a Value> {
    let map = obj.as_object()?;
    keys.iter()
        .find_map(|k| map.get(*k).filter(|v| !v.is_null()))
        .or_else(|| {
            keys.iter().find_map(|k| {
                map.iter()
                    .find(|(name, v)| name.eq_ignore_ascii_case(k) && !v.is_null())
                    .map(|(_, v)| v)
            })
        })
}

/// Numeric field; numeric strings are accepted.
pub fn number(obj: &Value, keys: &[&str]) -> Option<f64> {
    let value = match field(obj, keys)? {
        Value::Number(n) => n.as_f64(),
        Value::String(s) => s.trim().parse::<f64>().ok(),
        _ => None,
    };
    value.filter(|v| v.is_finite())
}

pub fn integer(obj: &Value, keys: &[&str]) -> Option<i64> {
    match field(obj, keys)? {
        Value::Number(n) => n
            .as_i64()
            .or_else(|| n.as_f64().filter(|f| f.fract() == 0.0).map(|f| f as i64)),
        Value::String(s) => s.trim().parse::<i64>().ok(),
        _ => None,
    }
}

/// Non-empty string field; numbers are rendered as text.
pub fn text(obj: &Value, keys: &[&str]) -> Option<String> {
    match field(obj, keys)? {
        Value::String(s) if !s.trim().is_empty() => Some(s.trim().to_string()),
        Value::Number(n) => Some(n.to_string()),
        _ => None,
    }
}

/// Flag field. Absent means `None`.
pub fn flag(obj: &Value, keys: &[&str]) -> Option<bool> {
    match field(obj, keys)? {
        Value::Bool(b) => Some(*b),
        Value::Number(n) => n.as_i64().map(|v| v != 0),
        Value::String(s) => match s.trim().to_ascii_lowercase().as_str() {
            "true" | "yes" | "1" => Some(true),
            "false" | "no" | "0" => Some(false),
            _ => None,
        },
        _ => None,
    }
}

/// Parse a station wall-clock timestamp. Offsets, if present, are dropped
/// and the local reading kept.
pub fn parse_local_datetime(raw: &str) -> Option<NaiveDateTime> {
    let raw = raw.trim();
    if let Ok(dt) = DateTime::parse_from_rfc3339(raw) {
        return Some(dt.naive_local());
    }
    DATETIME_FORMATS
        .iter()
        .find_map(|fmt| NaiveDateTime::parse_from_str(raw, fmt).ok())
}

fn parse_time(raw: &str) -> Option<NaiveTime> {
    TIME_FORMATS
        .iter()
        .find_map(|fmt| NaiveTime::parse_from_str(raw.trim(), fmt).ok())
}

fn round2(value: f64) -> f64 {
    (value * 100.0).round() / 100.0
}

// ── Transactions ────────────────────────────────────────────────

/// Individual transaction records inside a pushed payload.
///
/// Accepts a single object, an array, an object wrapping either under
/// `transactions`/`Transactions`/`data`/`Data`, or a jsonPTS envelope whose
/// packets carry the records in `Data`.
pub fn transaction_records(payload: &Value) -> Vec<&Value> {
    match payload {
        Value::Array(items) => items.iter().collect(),
        Value::Object(map) => {
            if let Some(Value::Array(packets)) = map.get("Packets") {
                return packets
                    .iter()
                    .filter_map(|p| p.get("Data"))
                    .flat_map(transaction_records)
                    .collect();
            }
            match WRAPPER_KEYS.iter().find_map(|k| map.get(*k)) {
                Some(inner @ (Value::Array(_) | Value::Object(_))) => transaction_records(inner),
                _ => vec![payload],
            }
        }
        _ => Vec::new(),
    }
}

fn occurred_at(record: &Value) -> Option<NaiveDateTime> {
    if let Some(dt) = text(record, DATETIME_KEYS).and_then(|s| parse_local_datetime(&s)) {
        return Some(dt);
    }
    let date_raw = text(record, DATE_KEYS)?;
    if let Some(dt) = parse_local_datetime(&date_raw) {
        return Some(dt);
    }
    let date = NaiveDate::parse_from_str(date_raw.trim(), "%Y-%m-%d").ok()?;
    let time = text(record, TIME_KEYS)
        .and_then(|t| parse_time(&t))
        .unwrap_or(NaiveTime::MIN);
    Some(date.and_time(time))
}

/// Map one vendor transaction record onto [`FuelTransaction`].
///
/// Unit price or amount may be missing; the absent one is derived from the
/// other and the volume. A record with neither is rejected.
pub fn normalize_transaction(
    record: &Value,
    station_id: i32,
    interface_source: &str,
) -> AdapterResult<FuelTransaction> {
    if !record.is_object() {
        return Err(AdapterError::InvalidPayload(
            "transaction record is not an object".into(),
        ));
    }
    let transaction_id = text(record, ID_KEYS)
        .ok_or_else(|| AdapterError::InvalidPayload("missing transaction id".into()))?;
    let volume = number(record, VOLUME_KEYS)
        .filter(|v| *v >= 0.0)
        .ok_or_else(|| {
            AdapterError::InvalidPayload(format!("transaction {transaction_id}: missing volume"))
        })?;

    let (unit_price, amount) = match (number(record, PRICE_KEYS), number(record, AMOUNT_KEYS)) {
        (Some(price), Some(amount)) => (price, amount),
        (Some(price), None) => (price, round2(price * volume)),
        (None, Some(amount)) if volume > 0.0 => (round2(amount / volume), amount),
        _ => {
            return Err(AdapterError::InvalidPayload(format!(
                "transaction {transaction_id}: missing price and amount"
            )))
        }
    };

    let occurred = occurred_at(record).ok_or_else(|| {
        AdapterError::InvalidPayload(format!("transaction {transaction_id}: missing date/time"))
    })?;

    Ok(FuelTransaction {
        station_id,
        transaction_id,
        pump: integer(record, PUMP_KEYS).and_then(|v| i32::try_from(v).ok()),
        nozzle: integer(record, NOZZLE_KEYS).and_then(|v| i32::try_from(v).ok()),
        volume,
        unit_price,
        amount,
        tc_volume: number(record, TC_VOLUME_KEYS).unwrap_or(volume),
        discount_amount: number(record, DISCOUNT_KEYS).unwrap_or(0.0),
        transaction_date: occurred.date(),
        transaction_time: occurred.time(),
        fuel_grade_name: text(record, GRADE_KEYS).unwrap_or_else(|| "Unknown".to_string()),
        customer_name: text(record, CUSTOMER_KEYS),
        efd_serial: text(record, EFD_KEYS),
        interface_source: interface_source.to_string(),
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn aliases_resolve_exact_then_case_insensitive() {
        let v = json!({"VOLUME": "12.5", "Quantity": null, "price": 3000});
        assert_eq!(number(&v, VOLUME_KEYS), Some(12.5));
        assert_eq!(number(&v, PRICE_KEYS), Some(3000.0));
        assert_eq!(number(&v, AMOUNT_KEYS), None);
    }

    #[test]
    fn pts_style_record_normalizes() {
        let record = json!({
            "Transaction": 5521,
            "Pump": 2,
            "Nozzle": 1,
            "Volume": 20.0,
            "Price": 3150.0,
            "Amount": 63000.0,
            "TCVolume": 19.87,
            "DateTime": "2024-01-15T10:30:05",
            "FuelGradeName": "Diesel",
            "EfdSerial": "10TZ100123"
        });
        let tx = normalize_transaction(&record, 7, "NFPP").unwrap();

        assert_eq!(tx.transaction_id, "5521");
        assert_eq!(tx.pump, Some(2));
        assert_eq!(tx.tc_volume, 19.87);
        assert_eq!(tx.discount_amount, 0.0);
        assert_eq!(tx.transaction_date.to_string(), "2024-01-15");
        assert_eq!(tx.transaction_time.to_string(), "10:30:05");
        assert_eq!(tx.efd_serial.as_deref(), Some("10TZ100123"));
        assert_eq!(tx.interface_source, "NFPP");
    }

    #[test]
    fn back_office_style_record_derives_amount() {
        let record = json!({
            "transaction_id": "A-9",
            "Quantity": "10",
            "UnitPrice": "2999.5",
            "Date": "2024-02-01",
            "Time": "07:05",
            "Product": "Petrol",
            "CustomerName": "Fleet Co"
        });
        let tx = normalize_transaction(&record, 1, "ATG").unwrap();

        assert_eq!(tx.amount, 29995.0);
        assert_eq!(tx.tc_volume, 10.0);
        assert_eq!(tx.fuel_grade_name, "Petrol");
        assert_eq!(tx.transaction_time.to_string(), "07:05:00");
        assert_eq!(tx.customer_name.as_deref(), Some("Fleet Co"));
    }

    #[test]
    fn out_of_range_pump_numbers_are_dropped() {
        let record = json!({"Id": 1, "Pump": 4294967297_i64, "Nozzle": -2, "Volume": 1.0,
                            "Price": 1.0, "DateTime": "2024-01-01T00:00:00"});
        let tx = normalize_transaction(&record, 1, "NFPP").unwrap();
        assert_eq!(tx.pump, None);
        assert_eq!(tx.nozzle, Some(-2));
    }

    #[test]
    fn price_is_derived_from_amount() {
        let record = json!({"Id": 1, "Liters": 4.0, "Total": 10000.0, "DateTime": "2024-01-01 00:00:00"});
        let tx = normalize_transaction(&record, 1, "NFPP").unwrap();
        assert_eq!(tx.unit_price, 2500.0);
    }

    #[test]
    fn rfc3339_keeps_station_wall_clock() {
        let record = json!({"Id": 1, "Volume": 1.0, "Price": 1.0, "DateTime": "2024-01-15T23:30:00+03:00"});
        let tx = normalize_transaction(&record, 1, "NFPP").unwrap();
        assert_eq!(tx.transaction_date.to_string(), "2024-01-15");
        assert_eq!(tx.transaction_time.to_string(), "23:30:00");
    }

    #[test]
    fn incomplete_records_are_rejected() {
        let no_id = json!({"Volume": 1.0, "Price": 1.0, "DateTime": "2024-01-01T00:00:00"});
        let no_price = json!({"Id": 3, "Volume": 1.0, "DateTime": "2024-01-01T00:00:00"});
        let no_date = json!({"Id": 3, "Volume": 1.0, "Price": 2.0});

        for record in [no_id, no_price, no_date, json!("nope")] {
            assert!(matches!(
                normalize_transaction(&record, 1, "NFPP"),
                Err(AdapterError::InvalidPayload(_))
            ));
        }
    }

    #[test]
    fn records_are_found_in_every_wrapper_shape() {
        let single = json!({"Id": 1});
        let array = json!([{"Id": 1}, {"Id": 2}]);
        let wrapped = json!({"Transactions": [{"Id": 1}, {"Id": 2}, {"Id": 3}]});
        let lower = json!({"data": {"Id": 1}});
        let envelope = json!({
            "Protocol": "jsonPTS",
            "Packets": [
                {"Id": 1, "Type": "UploadPumpTransaction", "Data": {"Id": 1}},
                {"Id": 2, "Type": "UploadPumpTransaction", "Data": [{"Id": 2}, {"Id": 3}]}
            ]
        });

        assert_eq!(transaction_records(&single).len(), 1);
        assert_eq!(transaction_records(&array).len(), 2);
        assert_eq!(transaction_records(&wrapped).len(), 3);
        assert_eq!(transaction_records(&lower).len(), 1);
        assert_eq!(transaction_records(&envelope).len(), 3);
        assert!(transaction_records(&json!(42)).is_empty());
    }

    #[test]
    fn flags_accept_common_spellings() {
        let v = json!({"Enabled": "yes", "Other": 0});
        assert_eq!(flag(&v, &["Enabled"]), Some(true));
        assert_eq!(flag(&v, &["Other"]), Some(false));
        assert_eq!(flag(&v, &["Missing"]), None);
    }
}
