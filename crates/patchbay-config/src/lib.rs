//! Configuration for the patchbay binary.
//!
//! One TOML file holds settings, emulator identity, HTTP budgets, storage
//! paths and the node list. Loading layers serialized defaults, the file
//! and `PATCHBAY_*` environment variables; the result is translated into
//! `patchbay_core::BridgeConfig`. The core never reads this file itself.

use std::net::{IpAddr, Ipv4Addr};
use std::path::{Path, PathBuf};
use std::time::Duration;

use directories::ProjectDirs;
use figment::{
    Figment,
    providers::{Env, Format, Serialized, Toml},
};
use serde::{Deserialize, Serialize};
use thiserror::Error;

use patchbay_core::{
    ApiVersions, BridgeConfig, DEFAULT_EMULATOR_PORT, DEFAULT_MODEL_NAME, EmulatorConfig, Node,
    Settings, TlsMode, TransportConfig,
};

// ── Error ───────────────────────────────────────────────────────────

#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("invalid {field}: {reason}")]
    Validation { field: String, reason: String },

    #[error("node '{name}' not found in configuration")]
    UnknownNode { name: String },

    #[error("node '{name}' already exists")]
    DuplicateNode { name: String },

    #[error("failed to serialize config: {0}")]
    Serialization(#[from] toml::ser::Error),

    #[error("config loading failed: {0}")]
    Figment(Box<figment::Error>),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
}

impl From<figment::Error> for ConfigError {
    fn from(err: figment::Error) -> Self {
        Self::Figment(Box::new(err))
    }
}

// ── TOML config structs ─────────────────────────────────────────────

/// Top-level TOML configuration.
#[derive(Debug, Clone, Default, PartialEq, Deserialize, Serialize)]
pub struct Config {
    #[serde(default)]
    pub settings: SettingsSection,

    #[serde(default)]
    pub emulator: EmulatorSection,

    #[serde(default)]
    pub http: HttpSection,

    #[serde(default)]
    pub storage: StorageSection,

    #[serde(default)]
    pub nodes: Vec<NodeEntry>,
}

/// Settings re-read by the daemon on every refresh tick.
#[derive(Debug, Clone, PartialEq, Eq, Deserialize, Serialize)]
pub struct SettingsSection {
    /// Seconds between discovery refreshes.
    #[serde(default = "default_refresh_interval")]
    pub refresh_interval: u64,

    /// Strip ST 2022-7 secondary streams before staging.
    #[serde(default = "default_true")]
    pub patch_secondary: bool,

    #[serde(default)]
    pub enable_emulator: bool,
}

impl Default for SettingsSection {
    fn default() -> Self {
        Self {
            refresh_interval: default_refresh_interval(),
            patch_secondary: true,
            enable_emulator: false,
        }
    }
}

fn default_refresh_interval() -> u64 {
    300
}
fn default_true() -> bool {
    true
}

#[derive(Debug, Clone, PartialEq, Eq, Deserialize, Serialize)]
pub struct EmulatorSection {
    #[serde(default = "default_bind")]
    pub bind: IpAddr,

    #[serde(default = "default_port")]
    pub port: u16,

    #[serde(default = "default_model_name")]
    pub model_name: String,
}

impl Default for EmulatorSection {
    fn default() -> Self {
        Self {
            bind: default_bind(),
            port: default_port(),
            model_name: default_model_name(),
        }
    }
}

fn default_bind() -> IpAddr {
    IpAddr::V4(Ipv4Addr::UNSPECIFIED)
}
fn default_port() -> u16 {
    DEFAULT_EMULATOR_PORT
}
fn default_model_name() -> String {
    DEFAULT_MODEL_NAME.into()
}

/// Per-request budgets and TLS for device calls.
#[derive(Debug, Clone, PartialEq, Eq, Deserialize, Serialize)]
pub struct HttpSection {
    /// Seconds allowed for each discovery request.
    #[serde(default = "default_discovery_timeout")]
    pub discovery_timeout: u64,

    /// Seconds allowed for each connection API request.
    #[serde(default = "default_connection_timeout")]
    pub connection_timeout: u64,

    /// Accept self-signed device certificates.
    #[serde(default)]
    pub insecure: bool,

    /// Path to a custom CA certificate (PEM).
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub ca_cert: Option<PathBuf>,
}

impl Default for HttpSection {
    fn default() -> Self {
        Self {
            discovery_timeout: default_discovery_timeout(),
            connection_timeout: default_connection_timeout(),
            insecure: false,
            ca_cert: None,
        }
    }
}

fn default_discovery_timeout() -> u64 {
    3
}
fn default_connection_timeout() -> u64 {
    2
}

/// Where logical groups and the discovery snapshot live. Relative paths
/// are resolved against the config file's directory.
#[derive(Debug, Clone, PartialEq, Eq, Deserialize, Serialize)]
pub struct StorageSection {
    #[serde(default = "default_registry_path")]
    pub registry: PathBuf,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub cache: Option<PathBuf>,
}

impl Default for StorageSection {
    fn default() -> Self {
        Self {
            registry: default_registry_path(),
            cache: Some(data_dir().join("discovery.json")),
        }
    }
}

fn default_registry_path() -> PathBuf {
    data_dir().join("logical.json")
}

/// A device exposing IS-04 and IS-05.
#[derive(Debug, Clone, PartialEq, Eq, Deserialize, Serialize)]
pub struct NodeEntry {
    pub name: String,

    /// Base URL, e.g. `http://10.0.0.5:8080`.
    pub url: String,

    #[serde(default = "default_node_version")]
    pub node_version: String,

    #[serde(default = "default_connection_version")]
    pub connection_version: String,
}

fn default_node_version() -> String {
    ApiVersions::default().node
}
fn default_connection_version() -> String {
    ApiVersions::default().connection
}

impl NodeEntry {
    pub fn new(name: impl Into<String>, url: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            url: url.into(),
            node_version: default_node_version(),
            connection_version: default_connection_version(),
        }
    }

    pub fn to_node(&self) -> Node {
        Node {
            name: self.name.clone(),
            url: self.url.clone(),
            versions: ApiVersions {
                node: self.node_version.clone(),
                connection: self.connection_version.clone(),
            },
        }
    }

    fn validate(&self) -> Result<(), ConfigError> {
        if self.name.trim().is_empty() {
            return Err(ConfigError::Validation {
                field: "nodes.name".into(),
                reason: "must not be empty".into(),
            });
        }
        url::Url::parse(&self.url).map_err(|e| ConfigError::Validation {
            field: format!("nodes.{}.url", self.name),
            reason: format!("{e}: {}", self.url),
        })?;
        Ok(())
    }
}

// ── Paths ───────────────────────────────────────────────────────────

/// Default config file path via XDG / platform conventions.
pub fn config_path() -> PathBuf {
    ProjectDirs::from("org", "patchbay", "patchbay").map_or_else(
        || fallback_dir(".config").join("config.toml"),
        |dirs| dirs.config_dir().join("config.toml"),
    )
}

/// Default directory for the registry and discovery cache.
pub fn data_dir() -> PathBuf {
    ProjectDirs::from("org", "patchbay", "patchbay").map_or_else(
        || fallback_dir(".local/share"),
        |dirs| dirs.data_dir().to_path_buf(),
    )
}

fn fallback_dir(base: &str) -> PathBuf {
    let mut p = PathBuf::from(std::env::var("HOME").unwrap_or_else(|_| ".".into()));
    p.push(base);
    p.push("patchbay");
    p
}

fn resolve_against(base: Option<&Path>, path: &Path) -> PathBuf {
    match base {
        Some(base) if path.is_relative() => base.join(path),
        _ => path.to_path_buf(),
    }
}

// ── Loading and saving ──────────────────────────────────────────────

fn figment(path: &Path) -> Figment {
    Figment::new()
        .merge(Serialized::defaults(Config::default()))
        .merge(Toml::file(path))
        .merge(Env::prefixed("PATCHBAY_").split("__"))
}

/// Load the config from `path` plus environment. A missing file yields
/// the defaults.
pub fn load_config(path: &Path) -> Result<Config, ConfigError> {
    Ok(figment(path).extract()?)
}

/// Serialize config to TOML and write it to `path`.
pub fn save_config(cfg: &Config, path: &Path) -> Result<(), ConfigError> {
    if let Some(parent) = path.parent() {
        std::fs::create_dir_all(parent)?;
    }
    let toml_str = toml::to_string_pretty(cfg)?;
    std::fs::write(path, toml_str)?;
    Ok(())
}

// ── Node management ─────────────────────────────────────────────────

impl Config {
    pub fn node(&self, name: &str) -> Option<&NodeEntry> {
        self.nodes.iter().find(|n| n.name == name)
    }

    pub fn add_node(&mut self, entry: NodeEntry) -> Result<(), ConfigError> {
        entry.validate()?;
        if self.node(&entry.name).is_some() {
            return Err(ConfigError::DuplicateNode { name: entry.name });
        }
        self.nodes.push(entry);
        Ok(())
    }

    pub fn remove_node(&mut self, name: &str) -> Result<NodeEntry, ConfigError> {
        let idx = self
            .nodes
            .iter()
            .position(|n| n.name == name)
            .ok_or_else(|| ConfigError::UnknownNode { name: name.into() })?;
        Ok(self.nodes.remove(idx))
    }

    // ── Translation to core types ───────────────────────────────────

    pub fn settings(&self) -> Settings {
        Settings {
            refresh_interval: Duration::from_secs(self.settings.refresh_interval.max(1)),
            patch_secondary: self.settings.patch_secondary,
            enable_emulator: self.settings.enable_emulator,
        }
    }

    pub fn transport(&self) -> TransportConfig {
        let tls = if self.http.insecure {
            TlsMode::DangerAcceptInvalid
        } else if let Some(ref ca) = self.http.ca_cert {
            TlsMode::CustomCa(ca.clone())
        } else {
            TlsMode::System
        };
        TransportConfig {
            tls,
            discovery_timeout: Duration::from_secs(self.http.discovery_timeout),
            connection_timeout: Duration::from_secs(self.http.connection_timeout),
        }
    }

    /// Build a `BridgeConfig`. `config_dir` anchors relative storage paths.
    pub fn to_bridge_config(&self, config_dir: Option<&Path>) -> Result<BridgeConfig, ConfigError> {
        for entry in &self.nodes {
            entry.validate()?;
        }
        if self.emulator.model_name.trim().is_empty() {
            return Err(ConfigError::Validation {
                field: "emulator.model_name".into(),
                reason: "must not be empty".into(),
            });
        }

        Ok(BridgeConfig {
            nodes: self.nodes.iter().map(NodeEntry::to_node).collect(),
            registry_path: resolve_against(config_dir, &self.storage.registry),
            cache_path: self
                .storage
                .cache
                .as_deref()
                .map(|p| resolve_against(config_dir, p)),
            transport: self.transport(),
            emulator: EmulatorConfig {
                bind: self.emulator.bind,
                port: self.emulator.port,
                model_name: self.emulator.model_name.clone(),
            },
            settings: self.settings(),
        })
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;
    use tempfile::TempDir;

    #[test]
    fn missing_file_gives_defaults() {
        let dir = TempDir::new().unwrap();
        let cfg = load_config(&dir.path().join("absent.toml")).unwrap();
        assert_eq!(cfg.settings, SettingsSection::default());
        assert_eq!(cfg.emulator.port, 9990);
        assert!(cfg.nodes.is_empty());
    }

    #[test]
    fn file_values_override_defaults() {
        let dir = TempDir::new().unwrap();
        let path = dir.path().join("config.toml");
        std::fs::write(
            &path,
            r#"
[settings]
refresh_interval = 60
enable_emulator = true

[emulator]
bind = "127.0.0.1"
port = 9991

[storage]
registry = "groups.json"

[[nodes]]
name = "rack-a"
url = "http://10.0.0.5:8080"
node_version = "v1.2"
"#,
        )
        .unwrap();

        let cfg = load_config(&path).unwrap();
        assert_eq!(cfg.settings.refresh_interval, 60);
        assert!(cfg.settings.patch_secondary);
        assert!(cfg.settings.enable_emulator);
        assert_eq!(cfg.emulator.model_name, DEFAULT_MODEL_NAME);
        assert_eq!(cfg.nodes[0].connection_version, "v1.1");

        let bridge = cfg.to_bridge_config(Some(dir.path())).unwrap();
        assert_eq!(bridge.registry_path, dir.path().join("groups.json"));
        assert_eq!(bridge.emulator.port, 9991);
        assert_eq!(bridge.settings.refresh_interval, Duration::from_secs(60));
        assert_eq!(bridge.nodes[0].versions.node, "v1.2");
    }

    #[test]
    fn save_then_load_keeps_nodes() {
        let dir = TempDir::new().unwrap();
        let path = dir.path().join("nested/config.toml");

        let mut cfg = Config::default();
        cfg.add_node(NodeEntry::new("rack-a", "http://10.0.0.5")).unwrap();
        save_config(&cfg, &path).unwrap();

        let loaded = load_config(&path).unwrap();
        assert_eq!(loaded.nodes, cfg.nodes);
    }

    #[test]
    fn node_management_rejects_duplicates_and_bad_urls() {
        let mut cfg = Config::default();
        cfg.add_node(NodeEntry::new("rack-a", "http://10.0.0.5")).unwrap();

        assert!(matches!(
            cfg.add_node(NodeEntry::new("rack-a", "http://10.0.0.6")),
            Err(ConfigError::DuplicateNode { .. })
        ));
        assert!(matches!(
            cfg.add_node(NodeEntry::new("rack-b", "not a url")),
            Err(ConfigError::Validation { .. })
        ));
        assert!(matches!(
            cfg.remove_node("rack-z"),
            Err(ConfigError::UnknownNode { .. })
        ));
        assert_eq!(cfg.remove_node("rack-a").unwrap().url, "http://10.0.0.5");
        assert!(cfg.nodes.is_empty());
    }

    #[test]
    fn insecure_wins_over_custom_ca() {
        let mut cfg = Config::default();
        cfg.http.insecure = true;
        cfg.http.ca_cert = Some(PathBuf::from("/etc/ca.pem"));
        assert!(matches!(cfg.transport().tls, TlsMode::DangerAcceptInvalid));
    }
}
