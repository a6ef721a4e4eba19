//! Interface identity and runtime status

use std::fmt;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

const SIMULATED_SUFFIX: &str = "_SIMULATED";

/// Tag identifying which adapter produced a row, and whether it was synthetic.
///
/// Rendered as `CODE` for hardware data and `CODE_SIMULATED` for synthetic data.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct InterfaceSource {
    pub code: String,
    pub simulated: bool,
}

impl InterfaceSource {
    pub fn real(code: impl Into<String>) -> Self {
        Self {
            code: code.into().to_ascii_uppercase(),
            simulated: false,
        }
    }

    pub fn simulated(code: impl Into<String>) -> Self {
        Self {
            code: code.into().to_ascii_uppercase(),
            simulated: true,
        }
    }

    pub fn for_mode(code: &str, mode: AdapterMode) -> Self {
        match mode {
            AdapterMode::Real => Self::real(code),
            AdapterMode::Simulated => Self::simulated(code),
        }
    }

    pub fn parse(tag: &str) -> Self {
        match tag.strip_suffix(SIMULATED_SUFFIX) {
            Some(code) => Self::simulated(code),
            None => Self::real(tag),
        }
    }

    /// Both tags an interface code may appear under in storage.
    pub fn tags_for(code: &str) -> [String; 2] {
        [
            Self::real(code).to_string(),
            Self::simulated(code).to_string(),
        ]
    }
}

impl fmt::Display for InterfaceSource {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        if self.simulated {
            write!(f, "{}{}", self.code, SIMULATED_SUFFIX)
        } else {
            f.write_str(&self.code)
        }
    }
}

/// Data strategy selected once at `initialize()`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum AdapterMode {
    Real,
    Simulated,
}

/// Link state of an adapter.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ConnectionState {
    Disconnected,
    Connecting,
    Connected,
    Simulating,
}

impl ConnectionState {
    pub fn is_connected(&self) -> bool {
        matches!(self, Self::Connected | Self::Simulating)
    }
}

impl fmt::Display for ConnectionState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let s = match self {
            Self::Disconnected => "disconnected",
            Self::Connecting => "connecting",
            Self::Connected => "connected",
            Self::Simulating => "simulating",
        };
        f.write_str(s)
    }
}

/// Per-adapter runtime state, recomputed on every `get_status()`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct InterfaceStatus {
    pub interface_code: String,
    pub station_id: Option<i32>,
    pub connected: bool,
    pub monitoring: bool,
    /// `None` until `initialize()` has run
    pub mode: Option<AdapterMode>,
    pub state: ConnectionState,
    pub last_communication: Option<DateTime<Utc>>,
    pub error_count: u64,
    pub last_error: Option<String>,
    /// Active device endpoint (HTTP path) when one has been discovered
    #[serde(skip_serializing_if = "Option::is_none")]
    pub active_endpoint: Option<String>,
    /// Discovered probe ids (probe-based interfaces)
    #[serde(skip_serializing_if = "Vec::is_empty", default)]
    pub probes: Vec<i32>,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn source_tags_render_and_parse() {
        assert_eq!(InterfaceSource::real("atg").to_string(), "ATG");
        assert_eq!(
            InterfaceSource::simulated("NFPP").to_string(),
            "NFPP_SIMULATED"
        );
        assert_eq!(
            InterfaceSource::parse("ATG_SIMULATED"),
            InterfaceSource::simulated("ATG")
        );
        assert!(!InterfaceSource::parse("NFPP").simulated);
    }

    #[test]
    fn tags_for_lists_both_variants() {
        let tags = InterfaceSource::tags_for("nfpp");
        assert_eq!(tags, ["NFPP".to_string(), "NFPP_SIMULATED".to_string()]);
    }

    #[test]
    fn simulating_counts_as_connected() {
        assert!(ConnectionState::Simulating.is_connected());
        assert!(!ConnectionState::Connecting.is_connected());
    }
}
