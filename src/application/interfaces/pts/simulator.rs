//! Synthetic controller used when no jsonPTS endpoint answers

use chrono::{DateTime, NaiveDateTime, Utc};
use rand::rngs::StdRng;
use rand::{Rng, SeedableRng};
use serde_json::{json, Value};

use super::packets::DEVICE_DATETIME_FORMAT;
use crate::domain::{TankMeasurement, TankSample};

const GRADES: &[(&str, f64)] = &[("Petrol", 3120.0), ("Diesel", 3050.0), ("Kerosene", 2890.0)];
/// Chance that a transaction poll yields any sales
const SALE_PROBABILITY: f64 = 0.3;
/// Synthetic ids are `SIM-<run epoch>-<n>`, disjoint from numeric device ids.
const SIMULATED_ID_PREFIX: &str = "SIM";

pub struct PtsSimulator {
    rng: StdRng,
    probes: Vec<i32>,
    base_volume: f64,
    run_epoch: i64,
    next_transaction: u64,
}

impl PtsSimulator {
    pub fn new(probe_count: u32, base_volume: f64) -> Self {
        Self::with_rng(StdRng::from_entropy(), probe_count, base_volume)
    }

    pub fn with_seed(probe_count: u32, base_volume: f64, seed: u64) -> Self {
        Self::with_rng(StdRng::seed_from_u64(seed), probe_count, base_volume)
    }

    fn with_rng(rng: StdRng, probe_count: u32, base_volume: f64) -> Self {
        Self {
            rng,
            probes: (1..=i32::try_from(probe_count).unwrap_or(i32::MAX)).collect(),
            base_volume,
            run_epoch: Utc::now().timestamp(),
            next_transaction: 1,
        }
    }

    pub fn probes(&self) -> Vec<i32> {
        self.probes.clone()
    }

    /// One online reading per probe; the probe id is the tank number.
    pub fn probe_samples(&mut self, timestamp: DateTime<Utc>, interface_source: &str) -> Vec<TankSample> {
        let probes = self.probes.clone();
        probes
            .into_iter()
            .map(|probe| {
                let capacity = self.base_volume * 1.5;
                let total = (self.base_volume - 500.0 * f64::from(probe - 1)
                    + self.rng.gen_range(-40.0..40.0))
                .max(0.0);
                let water = self.rng.gen_range(0.0..15.0);
                let temperature = self.rng.gen_range(22.0..30.0);
                let m = TankMeasurement::new(
                    total,
                    water,
                    total * 0.996,
                    (capacity - total).max(0.0),
                    total / capacity * 2000.0,
                    water / capacity * 2000.0,
                    temperature,
                )
                .with_density(Some(self.rng.gen_range(730.0..840.0)))
                .with_fill_percentage(Some(total / capacity * 100.0));
                TankSample::online(probe.unsigned_abs(), timestamp, m, interface_source)
                    .with_raw(json!({ "Probe": probe, "simulated": true }))
            })
            .collect()
    }

    /// Occasional vendor-shaped sales stamped at `now_local`.
    pub fn transactions(&mut self, now_local: NaiveDateTime) -> Value {
        if !self.rng.gen_bool(SALE_PROBABILITY) {
            return Value::Array(Vec::new());
        }
        let count = self.rng.gen_range(1..=2);
        let records = (0..count)
            .map(|_| {
                let (grade, price) = GRADES[self.rng.gen_range(0..GRADES.len())];
                let volume: f64 = (self.rng.gen_range(5.0..60.0) * 100.0_f64).round() / 100.0;
                let id = format!("{SIMULATED_ID_PREFIX}-{}-{}", self.run_epoch, self.next_transaction);
                self.next_transaction += 1;
                json!({
                    "Transaction": id,
                    "Pump": self.rng.gen_range(1..=4),
                    "Nozzle": self.rng.gen_range(1..=2),
                    "Volume": volume,
                    "TCVolume": volume,
                    "Price": price,
                    "Amount": (volume * price).round(),
                    "DateTime": now_local.format(DEVICE_DATETIME_FORMAT).to_string(),
                    "FuelGradeName": grade,
                })
            })
            .collect();
        Value::Array(records)
    }
}
