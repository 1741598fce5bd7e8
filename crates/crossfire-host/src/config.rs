use std::time::Duration;

use serde::Deserialize;

use crossfire_core::settings::{MatchSettings, WinCondition};
use crossfire_referee::RefereeConfig;

use crate::error::HostError;

/// Top-level host configuration, loaded from `crossfire.toml`.
#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct HostConfig {
    /// Session ticks per second.
    pub tick_rate_hz: f64,
    pub log_format: LogFormat,
    pub referee: RefereeConfig,
    pub demo: DemoConfig,
}

impl Default for HostConfig {
    fn default() -> Self {
        Self {
            tick_rate_hz: 20.0,
            log_format: LogFormat::Pretty,
            referee: RefereeConfig::default(),
            demo: DemoConfig::default(),
        }
    }
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum LogFormat {
    #[default]
    Pretty,
    Json,
}

/// Headless demo match run by the binary.
#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct DemoConfig {
    pub participants: usize,
    /// Give up after this many seconds even if the match has not finished.
    pub max_duration_secs: u64,
    /// Seed for bot movement; random when unset.
    pub seed: Option<u64>,
    pub settings: MatchSettings,
}

impl Default for DemoConfig {
    fn default() -> Self {
        Self {
            participants: 4,
            max_duration_secs: 120,
            seed: None,
            settings: MatchSettings {
                teams: true,
                win_condition: WinCondition::TIMER | WinCondition::REACH_SCORE,
                timer_seconds: 60,
                score_target: 40,
                ..MatchSettings::lobby()
            },
        }
    }
}

impl HostConfig {
    /// Check value ranges before anything is spawned.
    pub fn validate(&self) -> Result<(), HostError> {
        if !self.tick_rate_hz.is_finite() || self.tick_rate_hz <= 0.0 {
            return Err(HostError::Config(format!(
                "tick_rate_hz must be > 0, got {}",
                self.tick_rate_hz
            )));
        }
        if self.referee.team_count == 0 {
            return Err(HostError::Config("referee.team_count must be > 0".into()));
        }
        if self.referee.countdown_secs < 0.0 {
            return Err(HostError::Config(
                "referee.countdown_secs must not be negative".into(),
            ));
        }
        if self.referee.capture_threshold_millis <= 0.0 {
            return Err(HostError::Config(
                "referee.capture_threshold_millis must be > 0".into(),
            ));
        }
        if self.demo.participants == 0 {
            return Err(HostError::Config("demo.participants must be > 0".into()));
        }
        Ok(())
    }

    pub fn tick_interval(&self) -> Duration {
        Duration::from_secs_f64(1.0 / self.tick_rate_hz)
    }

    /// Load config from `crossfire.toml` if it exists, then apply env var overrides.
    pub fn load() -> Self {
        let mut config = Self::load_from_file("crossfire.toml");

        // A standalone referee file replaces the `[referee]` table.
        if std::env::var_os("CROSSFIRE_REFEREE_CONFIG").is_some() {
            config.referee = RefereeConfig::load();
        }

        if let Ok(val) = std::env::var("CROSSFIRE_TICK_RATE")
            && let Ok(n) = val.parse::<f64>()
        {
            config.tick_rate_hz = n;
        }
        if let Ok(val) = std::env::var("CROSSFIRE_LOG_FORMAT") {
            match val.to_ascii_lowercase().as_str() {
                "json" => config.log_format = LogFormat::Json,
                "pretty" => config.log_format = LogFormat::Pretty,
                other => tracing::warn!("Ignoring unknown CROSSFIRE_LOG_FORMAT {other:?}"),
            }
        }
        if let Ok(val) = std::env::var("CROSSFIRE_DEMO_PARTICIPANTS")
            && let Ok(n) = val.parse::<usize>()
        {
            config.demo.participants = n;
        }
        if let Ok(val) = std::env::var("CROSSFIRE_DEMO_SEED")
            && let Ok(n) = val.parse::<u64>()
        {
            config.demo.seed = Some(n);
        }

        config
    }

    fn load_from_file(path: &str) -> Self {
        match std::fs::read_to_string(path) {
            Ok(content) => match toml::from_str::<Self>(&content) {
                Ok(cfg) => {
                    tracing::info!("Loaded configuration from {path}");
                    cfg
                },
                Err(e) => {
                    tracing::warn!("Failed to parse {path}: {e}, using defaults");
                    Self::default()
                },
            },
            Err(_) => {
                tracing::info!("No {path} found, using defaults");
                Self::default()
            },
        }
    }
}
