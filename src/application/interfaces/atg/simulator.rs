//! Synthetic gauge used when no serial line is available

use chrono::{DateTime, Utc};
use rand::rngs::StdRng;
use rand::{Rng, SeedableRng};
use serde_json::json;

use crate::domain::{TankMeasurement, TankSample};

const VOLUME_JITTER: f64 = 50.0;
const TEMPERATURE_RANGE: std::ops::Range<f64> = 20.0..32.0;
/// Gauge height (mm) of a full tank
const FULL_HEIGHT_MM: f64 = 2500.0;

pub struct AtgSimulator {
    rng: StdRng,
    tank_count: u32,
    base_volume: f64,
}

impl AtgSimulator {
    pub fn new(tank_count: u32, base_volume: f64) -> Self {
        Self {
            rng: StdRng::from_entropy(),
            tank_count,
            base_volume,
        }
    }

    pub fn with_seed(tank_count: u32, base_volume: f64, seed: u64) -> Self {
        Self {
            rng: StdRng::seed_from_u64(seed),
            tank_count,
            base_volume,
        }
    }

    /// One reading per tank, all online.
    pub fn sample(&mut self, timestamp: DateTime<Utc>, interface_source: &str) -> Vec<TankSample> {
        (1..=self.tank_count)
            .map(|tank| {
                let m = self.measurement(tank);
                TankSample::online(tank, timestamp, m, interface_source)
                    .with_raw(json!({ "simulated": true }))
            })
            .collect()
    }

    fn measurement(&mut self, tank: u32) -> TankMeasurement {
        let capacity = self.base_volume * 2.0;
        // Tanks sit at staggered levels so dashboards show distinct bars
        let level = self.base_volume * (1.0 - 0.1 * f64::from(tank - 1)).max(0.1);
        let total = (level + self.rng.gen_range(-VOLUME_JITTER..VOLUME_JITTER)).max(0.0);
        let water = self.rng.gen_range(0.0..20.0);
        let temperature = self.rng.gen_range(TEMPERATURE_RANGE);

        TankMeasurement::new(
            total,
            water,
            total * 0.995,
            (capacity - total).max(0.0),
            total / capacity * FULL_HEIGHT_MM,
            water / capacity * FULL_HEIGHT_MM,
            temperature,
        )
    }
}
