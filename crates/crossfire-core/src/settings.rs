use serde::{Deserialize, Serialize};

bitflags::bitflags! {
    /// Conditions that end a running match. Both may be set, in which case
    /// whichever resolves first wins. Empty means the match only ends when
    /// the authority ends it.
    #[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
    #[serde(transparent)]
    pub struct WinCondition: u8 {
        const TIMER = 1 << 0;
        const REACH_SCORE = 1 << 1;
    }
}

impl Default for WinCondition {
    fn default() -> Self {
        Self::empty()
    }
}

/// Rules for one match. Replicated to every participant and never mutated
/// while a match is running; replaced wholesale on reset.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct MatchSettings {
    pub teams: bool,
    pub respawn_in_bases: bool,
    pub respawn_seconds: f32,
    pub health_regen_per_second: f32,
    pub damage_multiplier: f32,
    pub points_per_kill: u8,
    pub points_per_second_holding_point: u8,
    pub points_per_flag_capture: u8,
    pub win_condition: WinCondition,
    pub timer_seconds: i32,
    pub score_target: u16,
}

impl Default for MatchSettings {
    fn default() -> Self {
        Self::lobby()
    }
}

impl MatchSettings {
    /// Free-play settings used whenever no match is running.
    pub fn lobby() -> Self {
        Self {
            teams: false,
            respawn_in_bases: false,
            respawn_seconds: 3.0,
            health_regen_per_second: 5.0,
            damage_multiplier: 1.0,
            points_per_kill: 1,
            points_per_second_holding_point: 1,
            points_per_flag_capture: 5,
            win_condition: WinCondition::empty(),
            timer_seconds: 300,
            score_target: 50,
        }
    }

    pub fn has_timer(&self) -> bool {
        self.win_condition.contains(WinCondition::TIMER)
    }

    pub fn has_score_target(&self) -> bool {
        self.win_condition.contains(WinCondition::REACH_SCORE)
    }

    /// Timer length in seconds, clamped at zero.
    pub fn timer_duration(&self) -> f64 {
        f64::from(self.timer_seconds.max(0))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn win_conditions_combine() {
        let both = WinCondition::TIMER | WinCondition::REACH_SCORE;
        let settings = MatchSettings {
            win_condition: both,
            ..MatchSettings::lobby()
        };
        assert!(settings.has_timer());
        assert!(settings.has_score_target());
        assert!(!MatchSettings::lobby().has_timer());
    }

    #[test]
    fn negative_timer_clamps_to_zero() {
        let settings = MatchSettings {
            timer_seconds: -5,
            ..MatchSettings::lobby()
        };
        assert_eq!(settings.timer_duration(), 0.0);
    }

    #[test]
    fn partial_toml_fills_defaults() {
        let settings: MatchSettings = toml::from_str(
            r#"
            teams = true
            score_target = 15
            "#,
        )
        .unwrap();
        assert!(settings.teams);
        assert_eq!(settings.score_target, 15);
        assert_eq!(settings.points_per_kill, 1);
        assert!(settings.win_condition.is_empty());
    }

    #[test]
    fn settings_survive_msgpack() {
        let settings = MatchSettings {
            win_condition: WinCondition::TIMER,
            timer_seconds: 120,
            ..MatchSettings::lobby()
        };
        let bytes = rmp_serde::to_vec(&settings).unwrap();
        let decoded: MatchSettings = rmp_serde::from_slice(&bytes).unwrap();
        assert_eq!(decoded, settings);
    }
}
