//! Station registry entities (read-only to the device layer)

use serde::{Deserialize, Serialize};

/// A fuel station and the interface its hardware speaks.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Station {
    pub id: i32,
    pub code: String,
    pub name: String,
    pub is_active: bool,
    /// Interface type code (e.g. `ATG`, `NFPP`); `None` if unassigned
    pub interface_code: Option<String>,
    pub ewura_license_no: Option<String>,
}

impl Station {
    /// Whether this station is fed by the given interface (case-insensitive).
    pub fn uses_interface(&self, code: &str) -> bool {
        self.interface_code
            .as_deref()
            .is_some_and(|c| c.trim().eq_ignore_ascii_case(code.trim()))
    }

    /// Whether this station is fed by any of `codes` (a canonical code plus
    /// its aliases).
    pub fn uses_any_interface<S: AsRef<str>>(&self, codes: &[S]) -> bool {
        codes.iter().any(|code| self.uses_interface(code.as_ref()))
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Product {
    pub id: i32,
    pub name: String,
    pub color: Option<String>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Tank {
    pub id: i32,
    pub station_id: i32,
    /// Physical tank / probe number on the gauge
    pub number: u32,
    pub capacity: f64,
    pub product_id: Option<i32>,
    pub is_active: bool,
}

/// A tank joined with its station and product.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TankInfo {
    pub tank: Tank,
    pub station: Station,
    pub product: Option<Product>,
}

/// Filter for registry tank lookups. Only active tanks on active stations
/// are ever returned.
///
/// `interface_codes` matches stations using any of the listed codes; empty
/// means any interface.
#[derive(Debug, Clone, Default)]
pub struct TankFilter {
    pub station_id: Option<i32>,
    pub interface_codes: Vec<String>,
}

impl TankFilter {
    pub fn station(station_id: i32) -> Self {
        Self {
            station_id: Some(station_id),
            interface_codes: Vec::new(),
        }
    }

    pub fn interface(code: impl Into<String>) -> Self {
        Self {
            station_id: None,
            interface_codes: vec![code.into()],
        }
    }

    /// Replace the interface codes with `accepted` when the filter names any
    /// of them, so a canonical code also matches its aliases.
    pub fn widened(&self, accepted: &[String]) -> Self {
        let names_accepted = self
            .interface_codes
            .iter()
            .any(|code| accepted.iter().any(|a| a.eq_ignore_ascii_case(code.trim())));
        let mut filter = self.clone();
        if names_accepted {
            filter.interface_codes = accepted.to_vec();
        }
        filter
    }

    pub fn matches(&self, info: &TankInfo) -> bool {
        if !info.tank.is_active || !info.station.is_active {
            return false;
        }
        if let Some(id) = self.station_id {
            if info.station.id != id {
                return false;
            }
        }
        self.interface_codes.is_empty() || info.station.uses_any_interface(&self.interface_codes)
    }
}
