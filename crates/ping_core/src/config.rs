use std::io::Write;

use cap_std::fs_utf8::Dir;
use glam::DVec3;
use miette::{Context, IntoDiagnostic, Result};
use serde::{Deserialize, Serialize};
use time::OffsetDateTime;
use tracing::info;

use crate::{error::ConfigError, TICK_DURATION};

pub const PING_CONFIG_NAME: &str = "ping_config.json";

/// Owns the config file inside the data directory.
pub struct ConfigManager {
    dir: Dir,
    pub config: PingConfig,
    pub last_saved: OffsetDateTime,
    pub needs_save: bool,
}
impl ConfigManager {
    /// Loads `ping_config.json` from `dir`. If it doesn't exist yet, the default config is written first.
    pub fn new(dir: Dir) -> Result<Self> {
        if !dir.exists(PING_CONFIG_NAME) {
            let default_config = PingConfig::default();
            dir.create(PING_CONFIG_NAME)
                .into_diagnostic()
                .wrap_err("failed to create default config file")?
                .write_all(
                    serde_json::to_string_pretty(&default_config)
                        .into_diagnostic()
                        .wrap_err("failed to serialize config default")?
                        .as_bytes(),
                )
                .into_diagnostic()
                .wrap_err("failed to write default config file")?;
            info!("created default config file");
        }
        let config_src = dir
            .read_to_string(PING_CONFIG_NAME)
            .into_diagnostic()
            .wrap_err("failed to read config file")?;
        let config: PingConfig = serde_json::from_str(&config_src)
            .into_diagnostic()
            .wrap_err("failed to deserialize config from file")?;
        config.validate()?;
        Ok(Self {
            dir,
            config,
            last_saved: OffsetDateTime::now_utc(),
            needs_save: false,
        })
    }
    pub fn save_config(&mut self) -> Result<()> {
        if self.needs_save {
            self.config.validate()?;
            let config_string = serde_json::to_string_pretty(&self.config).into_diagnostic()?;
            self.dir
                .write(PING_CONFIG_NAME, config_string.as_bytes())
                .into_diagnostic()
                .wrap_err("failed to save config file")?;
            self.needs_save = false;
            self.last_saved = OffsetDateTime::now_utc();
        }
        Ok(())
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct PingConfig {
    /// held items whose display name starts with this character are ping items
    pub marker_prefix: char,
    /// players without this permission are ignored
    pub permission: String,
    /// tag attached to every spawned visual
    pub group_tag: String,
    /// how long a marker lives, in server ticks
    pub marker_ttl_ticks: u32,
    /// half size of the box around the look-at point that a left click clears
    pub removal_half_extents: DVec3,
    /// how far a player can ping. interactions whose hit is farther away are ignored.
    pub max_target_distance: f64,
    /// whether an item named just the prefix (eg: `!`) may place a marker with an empty label
    pub allow_empty_label: bool,
}

impl PingConfig {
    pub const MARKER_PREFIX: char = '!';
    pub const PERMISSION: &'static str = "ping";
    pub const GROUP_TAG: &'static str = "ping";
    /// 5 minutes
    pub const MARKER_TTL_TICKS: u32 = 20 * 60 * 5;
    pub const REMOVAL_HALF_EXTENTS: DVec3 = DVec3::splat(3.0);
    pub const MAX_TARGET_DISTANCE: f64 = 50.0;

    pub fn marker_ttl(&self) -> std::time::Duration {
        TICK_DURATION * self.marker_ttl_ticks
    }

    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.marker_ttl_ticks == 0 {
            return Err(ConfigError::ZeroTtl);
        }
        let extents = self.removal_half_extents;
        if !extents.is_finite() || extents.min_element() < 0.0 {
            return Err(ConfigError::InvalidRemovalExtents(extents.to_array()));
        }
        if !self.max_target_distance.is_finite() || self.max_target_distance <= 0.0 {
            return Err(ConfigError::InvalidTargetDistance(
                self.max_target_distance,
            ));
        }
        if self.group_tag.is_empty() {
            return Err(ConfigError::EmptyGroupTag);
        }
        Ok(())
    }
}

impl Default for PingConfig {
    fn default() -> Self {
        Self {
            marker_prefix: Self::MARKER_PREFIX,
            permission: Self::PERMISSION.to_string(),
            group_tag: Self::GROUP_TAG.to_string(),
            marker_ttl_ticks: Self::MARKER_TTL_TICKS,
            removal_half_extents: Self::REMOVAL_HALF_EXTENTS,
            max_target_distance: Self::MAX_TARGET_DISTANCE,
            allow_empty_label: true,
        }
    }
}
