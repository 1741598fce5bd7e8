use serde::{Deserialize, Serialize};

use crossfire_core::settings::MatchSettings;

/// Data-driven referee configuration.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct RefereeConfig {
    /// Delay between everyone mustering and the match starting (seconds).
    pub countdown_secs: f64,
    /// Uncontested presence needed to flip a control point (milliseconds).
    pub capture_threshold_millis: f32,
    /// Number of real teams. The score ledger has one extra slot for team 0.
    pub team_count: u8,
    /// Horizontal pickup radius around a flag.
    pub flag_pickup_radius: f32,
    /// Vertical extent of a flag pickup volume above and below its home.
    pub flag_pickup_half_height: f32,
    /// Settings restored whenever the match returns to `NotPlaying`.
    pub lobby: MatchSettings,
}

impl Default for RefereeConfig {
    fn default() -> Self {
        Self {
            countdown_secs: 3.0,
            capture_threshold_millis: 10_000.0,
            team_count: 2,
            flag_pickup_radius: 1.0,
            flag_pickup_half_height: 2.0,
            lobby: MatchSettings::lobby(),
        }
    }
}

impl RefereeConfig {
    /// Load config from environment or TOML file, falling back to defaults.
    pub fn load() -> Self {
        if let Ok(path) = std::env::var("CROSSFIRE_REFEREE_CONFIG")
            && let Some(config) = Self::load_from_file(&path)
        {
            return config;
        }
        Self::load_from_file("config/referee.toml").unwrap_or_default()
    }

    /// Parse a TOML file, returning `None` if it is missing or invalid.
    pub fn load_from_file(path: &str) -> Option<Self> {
        let contents = std::fs::read_to_string(path).ok()?;
        match toml::from_str::<Self>(&contents) {
            Ok(config) => Some(config),
            Err(e) => {
                tracing::warn!("Failed to parse {path}: {e}");
                None
            },
        }
    }

    /// Length of the score ledger, including the unteamed slot.
    pub fn ledger_len(&self) -> usize {
        usize::from(self.team_count) + 1
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn defaults() {
        let config = RefereeConfig::default();
        assert_eq!(config.countdown_secs, 3.0);
        assert_eq!(config.ledger_len(), 3);
        assert_eq!(config.lobby, MatchSettings::lobby());
    }

    #[test]
    fn partial_toml_keeps_other_defaults() {
        let config: RefereeConfig = toml::from_str(
            r#"
            team_count = 4
            capture_threshold_millis = 2500.0

            [lobby]
            points_per_flag_capture = 9
            "#,
        )
        .unwrap();
        assert_eq!(config.team_count, 4);
        assert_eq!(config.ledger_len(), 5);
        assert_eq!(config.capture_threshold_millis, 2500.0);
        assert_eq!(config.countdown_secs, 3.0);
        assert_eq!(config.lobby.points_per_flag_capture, 9);
        assert_eq!(config.lobby.points_per_kill, 1);
    }

    #[test]
    fn missing_file_is_none() {
        assert!(RefereeConfig::load_from_file("does/not/exist.toml").is_none());
    }
}
