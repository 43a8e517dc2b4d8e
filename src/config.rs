//! Engine configuration
//!
//! Typed TOML configuration plus the string parameter capability decoders
//! consume. Decoders never read the typed config directly: they ask for
//! named parameters with a default, so how configuration is sourced stays
//! invisible to them.

use std::collections::HashMap;
use std::path::Path;

use anyhow::{Context as _, Result};
use serde::{Deserialize, Serialize};

/// Parameter lookup capability. The default is returned when a key is
/// absent; lookup is never an error.
pub trait Parameters: Send + Sync {
    fn get_parameter(&self, key: &str, default: &str) -> String;
}

/// Main configuration structure.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct Config {
    #[serde(default)]
    pub engine: EngineConfig,

    #[serde(default)]
    pub sip: SipConfig,

    #[serde(default)]
    pub rtp: RtpConfig,

    #[serde(default)]
    pub tls: TlsConfig,

    /// Free-form parameter overrides, consulted before the typed sections.
    #[serde(default)]
    pub overrides: HashMap<String, String>,
}

/// Engine-level settings.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct EngineConfig {
    /// Capture device label stamped on every observation record.
    pub device: Option<String>,

    /// Upper bound on live contexts; the oldest idle flow is dropped when
    /// the table is full.
    pub max_contexts: usize,
}

impl Default for EngineConfig {
    fn default() -> Self {
        Self {
            device: None,
            max_contexts: 65_536,
        }
    }
}

/// SIP decoder configuration.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SipConfig {
    /// Ports classified as SIP for new flows.
    pub ports: Vec<u16>,

    /// Seconds a dialog may stay idle before it is purged.
    pub dialog_timeout_secs: u64,

    /// Largest accepted start-line-plus-header block, in bytes.
    pub max_header_block: usize,
}

impl Default for SipConfig {
    fn default() -> Self {
        Self {
            ports: vec![5060, 5061],
            dialog_timeout_secs: 120,
            max_header_block: 16_384,
        }
    }
}

/// RTP decoder configuration.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RtpConfig {
    /// Largest forward sequence jump treated as loss rather than a new
    /// sequence position.
    pub max_seq_jump: u16,
}

impl Default for RtpConfig {
    fn default() -> Self {
        Self { max_seq_jump: 64 }
    }
}

/// TLS classification configuration.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct TlsConfig {
    /// Ports classified as TLS for new flows.
    pub ports: Vec<u16>,
}

impl Default for TlsConfig {
    fn default() -> Self {
        Self {
            ports: vec![443, 8443],
        }
    }
}

impl Config {
    /// Load configuration from a TOML file.
    pub fn load(path: impl AsRef<Path>) -> Result<Self> {
        let path = path.as_ref();
        let text = std::fs::read_to_string(path)
            .with_context(|| format!("reading config file {}", path.display()))?;
        let config: Config = toml::from_str(&text)
            .with_context(|| format!("parsing config file {}", path.display()))?;
        Ok(config)
    }
}

impl Parameters for Config {
    fn get_parameter(&self, key: &str, default: &str) -> String {
        if let Some(v) = self.overrides.get(key) {
            return v.clone();
        }
        match key {
            "sip.dialog-timeout" => self.sip.dialog_timeout_secs.to_string(),
            "sip.max-header-block" => self.sip.max_header_block.to_string(),
            "rtp.max-seq-jump" => self.rtp.max_seq_jump.to_string(),
            _ => default.to_string(),
        }
    }
}

/// Parse a numeric parameter, falling back to the caller's default when the
/// configured value does not parse. Misconfiguration must never break
/// decoding.
pub fn numeric_parameter<T: std::str::FromStr>(value: &str, fallback: T) -> T {
    value.trim().parse().unwrap_or(fallback)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_default_config() {
        let config = Config::default();
        assert_eq!(config.sip.ports, vec![5060, 5061]);
        assert_eq!(config.sip.dialog_timeout_secs, 120);
        assert_eq!(config.rtp.max_seq_jump, 64);
        assert!(config.engine.device.is_none());
    }

    #[test]
    fn test_get_parameter_typed_sections() {
        let config = Config::default();
        assert_eq!(config.get_parameter("sip.dialog-timeout", "0"), "120");
        assert_eq!(config.get_parameter("rtp.max-seq-jump", "0"), "64");
    }

    #[test]
    fn test_get_parameter_absent_key_returns_default() {
        let config = Config::default();
        assert_eq!(config.get_parameter("no.such.key", "fallback"), "fallback");
    }

    #[test]
    fn test_overrides_win() {
        let mut config = Config::default();
        config
            .overrides
            .insert("sip.dialog-timeout".to_string(), "30".to_string());
        assert_eq!(config.get_parameter("sip.dialog-timeout", "0"), "30");
    }

    #[test]
    fn test_toml_round_trip() {
        let text = r#"
            [engine]
            device = "probe-1"
            max_contexts = 1024

            [sip]
            ports = [5060]
            dialog_timeout_secs = 60
            max_header_block = 8192

            [rtp]
            max_seq_jump = 32

            [tls]
            ports = [443]

            [overrides]
            "sip.strict" = "true"
        "#;
        let config: Config = toml::from_str(text).unwrap();
        assert_eq!(config.engine.device.as_deref(), Some("probe-1"));
        assert_eq!(config.sip.dialog_timeout_secs, 60);
        assert_eq!(config.get_parameter("sip.strict", "false"), "true");
    }

    #[test]
    fn test_numeric_parameter_fallback() {
        assert_eq!(numeric_parameter::<u16>("32", 64), 32);
        assert_eq!(numeric_parameter::<u16>("not a number", 64), 64);
    }

    #[test]
    fn test_load_from_file() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("flowsift.toml");
        std::fs::write(&path, "[sip]\nports = [5080]\ndialog_timeout_secs = 90\nmax_header_block = 4096\n").unwrap();

        let config = Config::load(&path).unwrap();
        assert_eq!(config.sip.ports, vec![5080]);
        assert_eq!(config.get_parameter("sip.dialog-timeout", "0"), "90");

        assert!(Config::load(dir.path().join("missing.toml")).is_err());
    }
}
