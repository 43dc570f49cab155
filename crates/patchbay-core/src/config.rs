// ── Runtime bridge configuration ──
//
// These types describe how a `Bridge` runs. They never touch disk: the
// CLI loads its config file and hands the translated values in.

use std::net::{IpAddr, Ipv4Addr};
use std::path::PathBuf;
use std::time::Duration;

use patchbay_api::TransportConfig;

use crate::model::Node;

pub const DEFAULT_EMULATOR_PORT: u16 = 9990;
pub const DEFAULT_MODEL_NAME: &str = "NMOS Patchbay";

/// Settings that may change while the bridge is running.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Settings {
    /// Delay between discovery refreshes.
    pub refresh_interval: Duration,
    /// Strip ST 2022-7 secondary streams from SDP before staging.
    pub patch_secondary: bool,
    /// Run the Videohub emulator.
    pub enable_emulator: bool,
}

impl Default for Settings {
    fn default() -> Self {
        Self {
            refresh_interval: Duration::from_secs(300),
            patch_secondary: true,
            enable_emulator: false,
        }
    }
}

/// Values the bridge re-reads from its owner on every refresh tick.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Reload {
    pub settings: Settings,
    pub nodes: Vec<Node>,
}

/// Where and as what the Videohub emulator presents itself.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct EmulatorConfig {
    pub bind: IpAddr,
    pub port: u16,
    pub model_name: String,
}

impl Default for EmulatorConfig {
    fn default() -> Self {
        Self {
            bind: IpAddr::V4(Ipv4Addr::UNSPECIFIED),
            port: DEFAULT_EMULATOR_PORT,
            model_name: DEFAULT_MODEL_NAME.into(),
        }
    }
}

/// Everything needed to build a `Bridge`.
#[derive(Debug, Clone)]
pub struct BridgeConfig {
    pub nodes: Vec<Node>,
    /// Logical registry JSON file.
    pub registry_path: PathBuf,
    /// Optional discovery snapshot file shared between invocations.
    pub cache_path: Option<PathBuf>,
    pub transport: TransportConfig,
    pub emulator: EmulatorConfig,
    pub settings: Settings,
}

impl Default for BridgeConfig {
    fn default() -> Self {
        Self {
            nodes: Vec::new(),
            registry_path: PathBuf::from("logical.json"),
            cache_path: None,
            transport: TransportConfig::default(),
            emulator: EmulatorConfig::default(),
            settings: Settings::default(),
        }
    }
}
