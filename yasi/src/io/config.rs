//! Idler configuration stored under `.yasi/config.toml`.

use std::fs;
use std::path::Path;
use std::time::Duration;

use anyhow::{Context, Result, anyhow};
use serde::{Deserialize, Serialize};

use crate::core::types::SourceKind;

/// Idler configuration (TOML).
///
/// Edited by humans. Missing fields fall back to defaults.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq, Default)]
#[serde(default)]
pub struct YasiConfig {
    pub idle: IdleConfig,
    pub batch: BatchConfig,
    pub steam: SteamConfig,
    pub presence: PresenceConfig,
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
#[serde(default)]
pub struct IdleConfig {
    /// Seconds between progress checks while idling.
    pub default_monitoring_interval_seconds: u64,

    /// Idle time ceiling per target card, in minutes.
    pub max_idle_minutes_per_card: u64,

    /// Minutes per assumed drop when inventory checking is disabled.
    /// Falls back to `max_idle_minutes_per_card`.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub expected_minutes_per_card: Option<u64>,

    /// Poll the public inventory (true) or estimate drops from idle time (false).
    pub enable_inventory_checking: bool,
}

impl Default for IdleConfig {
    fn default() -> Self {
        Self {
            default_monitoring_interval_seconds: 300,
            max_idle_minutes_per_card: 30,
            expected_minutes_per_card: None,
            enable_inventory_checking: true,
        }
    }
}

impl IdleConfig {
    pub fn interval(&self) -> Duration {
        Duration::from_secs(self.default_monitoring_interval_seconds)
    }

    pub fn expected_minutes_per_card(&self) -> u64 {
        self.expected_minutes_per_card
            .unwrap_or(self.max_idle_minutes_per_card)
    }

    pub fn source_kind(&self) -> SourceKind {
        if self.enable_inventory_checking {
            SourceKind::Inventory
        } else {
            SourceKind::ElapsedTime
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
#[serde(default)]
pub struct BatchConfig {
    /// Pause between consecutive games of a batch, in seconds.
    pub pause_between_games_seconds: u64,
}

impl Default for BatchConfig {
    fn default() -> Self {
        Self {
            pause_between_games_seconds: 10,
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
#[serde(default)]
pub struct SteamConfig {
    /// SteamID64 of the account whose inventory is polled.
    pub steam_id_64: String,

    /// AppID of the Steam Community inventory (trading cards live under 753).
    pub community_app_id: u32,

    /// Inventory context holding trading cards.
    pub trading_card_context_id: u64,

    /// Per-request timeout for inventory and store calls.
    pub request_timeout_secs: u64,

    /// Look up display names from the store API.
    pub lookup_game_names: bool,
}

impl Default for SteamConfig {
    fn default() -> Self {
        Self {
            steam_id_64: String::new(),
            community_app_id: 753,
            trading_card_context_id: 6,
            request_timeout_secs: 20,
            lookup_game_names: true,
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
#[serde(default)]
pub struct PresenceConfig {
    /// Helper that holds the game-presence session (AppID appended as last argument).
    pub helper_command: Vec<String>,

    /// A helper that exits within this window failed to start.
    pub startup_grace_secs: u64,
}

impl Default for PresenceConfig {
    fn default() -> Self {
        Self {
            helper_command: vec!["steam-presence-helper".to_string()],
            startup_grace_secs: 5,
        }
    }
}

impl YasiConfig {
    pub fn validate(&self) -> Result<()> {
        if self.idle.default_monitoring_interval_seconds == 0 {
            return Err(anyhow!("idle.default_monitoring_interval_seconds must be > 0"));
        }
        if self.idle.max_idle_minutes_per_card == 0 {
            return Err(anyhow!("idle.max_idle_minutes_per_card must be > 0"));
        }
        if self.idle.expected_minutes_per_card == Some(0) {
            return Err(anyhow!("idle.expected_minutes_per_card must be > 0"));
        }
        if self.idle.enable_inventory_checking && self.steam.steam_id_64.trim().is_empty() {
            return Err(anyhow!(
                "steam.steam_id_64 must be set when idle.enable_inventory_checking is true"
            ));
        }
        if self.steam.request_timeout_secs == 0 {
            return Err(anyhow!("steam.request_timeout_secs must be > 0"));
        }
        if self.presence.helper_command.is_empty()
            || self.presence.helper_command[0].trim().is_empty()
        {
            return Err(anyhow!("presence.helper_command must be a non-empty array"));
        }
        Ok(())
    }
}

/// Load config from a TOML file.
///
/// If the file is missing, returns `YasiConfig::default()` (which still has to
/// validate, so inventory mode without a SteamID is rejected).
pub fn load_config(path: &Path) -> Result<YasiConfig> {
    if !path.exists() {
        let cfg = YasiConfig::default();
        cfg.validate()
            .with_context(|| format!("no config at {} (run `yasi init`)", path.display()))?;
        return Ok(cfg);
    }
    let contents = fs::read_to_string(path).with_context(|| format!("read {}", path.display()))?;
    let mut cfg: YasiConfig =
        toml::from_str(&contents).with_context(|| format!("parse {}", path.display()))?;
    cfg.steam.steam_id_64 = cfg.steam.steam_id_64.trim().to_string();
    cfg.validate()
        .with_context(|| format!("invalid config {}", path.display()))?;
    Ok(cfg)
}

/// Atomically write config to disk (temp file + rename).
///
/// Unlike `load_config`, this does not validate: `yasi init` writes the
/// defaults for the user to fill in.
pub fn write_config(path: &Path, cfg: &YasiConfig) -> Result<()> {
    let mut buf = toml::to_string_pretty(cfg).context("serialize config toml")?;
    buf.push('\n');
    write_atomic(path, &buf)
}

fn write_atomic(path: &Path, contents: &str) -> Result<()> {
    let parent = path
        .parent()
        .with_context(|| format!("config path missing parent {}", path.display()))?;
    fs::create_dir_all(parent).with_context(|| format!("create directory {}", parent.display()))?;
    let tmp_path = path.with_extension("toml.tmp");
    fs::write(&tmp_path, contents)
        .with_context(|| format!("write temp config {}", tmp_path.display()))?;
    fs::rename(&tmp_path, path).with_context(|| format!("replace config {}", path.display()))?;
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    fn timed_config() -> YasiConfig {
        YasiConfig {
            idle: IdleConfig {
                enable_inventory_checking: false,
                ..IdleConfig::default()
            },
            ..YasiConfig::default()
        }
    }

    #[test]
    fn missing_config_requires_steam_id_for_inventory_mode() {
        let temp = tempfile::tempdir().expect("tempdir");
        let err = load_config(&temp.path().join("missing.toml")).unwrap_err();
        assert!(format!("{err:#}").contains("steam_id_64"));
    }

    #[test]
    fn write_then_load_round_trips() {
        let temp = tempfile::tempdir().expect("tempdir");
        let path = temp.path().join("config.toml");
        let cfg = timed_config();
        write_config(&path, &cfg).expect("write");
        let loaded = load_config(&path).expect("load");
        assert_eq!(loaded, cfg);
    }

    #[test]
    fn partial_file_uses_defaults_and_trims_steam_id() {
        let temp = tempfile::tempdir().expect("tempdir");
        let path = temp.path().join("config.toml");
        fs::write(
            &path,
            "[idle]\ndefault_monitoring_interval_seconds = 60\n\n[steam]\nsteam_id_64 = \" 76561197960287930 \"\n",
        )
        .expect("write");
        let cfg = load_config(&path).expect("load");
        assert_eq!(cfg.idle.interval(), Duration::from_secs(60));
        assert_eq!(cfg.idle.max_idle_minutes_per_card, 30);
        assert_eq!(cfg.steam.steam_id_64, "76561197960287930");
        assert_eq!(cfg.steam.community_app_id, 753);
        assert_eq!(cfg.idle.source_kind(), SourceKind::Inventory);
    }

    #[test]
    fn rejects_zero_interval() {
        let mut cfg = timed_config();
        cfg.idle.default_monitoring_interval_seconds = 0;
        assert!(cfg.validate().is_err());
    }

    #[test]
    fn expected_minutes_fall_back_to_ceiling() {
        let mut cfg = timed_config();
        assert_eq!(cfg.idle.expected_minutes_per_card(), 30);
        cfg.idle.expected_minutes_per_card = Some(20);
        assert_eq!(cfg.idle.expected_minutes_per_card(), 20);
        assert_eq!(cfg.idle.source_kind(), SourceKind::ElapsedTime);
    }
}
