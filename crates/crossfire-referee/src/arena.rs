use serde::{Deserialize, Serialize};

use crossfire_core::geometry::{Position, Zone};
use crossfire_core::participant::{Participant, TeamId};

/// Where a team musters, respawns and delivers captured flags.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct TeamBase {
    pub team: TeamId,
    pub zone: Zone,
}

/// A flag's home team and resting position.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct FlagSpawn {
    pub home_team: TeamId,
    pub home: Position,
}

/// Objective layout for a play space.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Arena {
    pub name: String,
    pub bases: Vec<TeamBase>,
    pub control_points: Vec<Zone>,
    pub flags: Vec<FlagSpawn>,
}

impl Arena {
    pub fn base_for(&self, team: TeamId) -> Option<&TeamBase> {
        self.bases.iter().find(|b| b.team == team)
    }

    /// Whether the participant is alive and inside the base of their own team.
    pub fn in_own_base(&self, participant: &Participant) -> bool {
        self.base_for(participant.team)
            .is_some_and(|base| participant.is_inside(&base.zone))
    }

    /// Whether the participant is alive and inside any base.
    pub fn in_any_base(&self, participant: &Participant) -> bool {
        self.bases.iter().any(|b| participant.is_inside(&b.zone))
    }
}

/// Load an arena from a JSON file, returning `None` if the file is missing or invalid.
pub fn load_arena_from_file(path: &str) -> Option<Arena> {
    match std::fs::read_to_string(path) {
        Ok(content) => match serde_json::from_str::<Arena>(&content) {
            Ok(arena) => Some(arena),
            Err(e) => {
                tracing::warn!("Failed to parse {path}: {e}");
                None
            },
        },
        Err(_) => None,
    }
}

/// Load the arena named by `CROSSFIRE_ARENA` (default `config/arena.json`),
/// falling back to `generate_arena(team_count)`.
pub fn load_arena(team_count: u8) -> Arena {
    let path =
        std::env::var("CROSSFIRE_ARENA").unwrap_or_else(|_| "config/arena.json".to_string());
    load_arena_from_file(&path).unwrap_or_else(|| generate_arena(team_count))
}

/// Base radius in generated arenas.
pub const BASE_RADIUS: f32 = 2.5;
/// Control point radius in generated arenas.
pub const CONTROL_POINT_RADIUS: f32 = 2.0;
/// Vertical extent used for every generated zone.
pub const ZONE_HALF_HEIGHT: f32 = 2.0;

/// Generate a symmetric layout: one base per team evenly spaced on a ring,
/// a single control point in the middle, and one flag per team sitting just
/// in front of its base.
pub fn generate_arena(team_count: u8) -> Arena {
    let ring = 8.0_f32;
    let count = team_count.max(1);
    let mut bases = Vec::with_capacity(count as usize);
    let mut flags = Vec::with_capacity(count as usize);

    for i in 0..count {
        let angle = std::f32::consts::TAU * f32::from(i) / f32::from(count);
        let (sin, cos) = angle.sin_cos();
        let team = i + 1;
        bases.push(TeamBase {
            team,
            zone: Zone::new(
                Position::new(cos * ring, 0.0, sin * ring),
                BASE_RADIUS,
                ZONE_HALF_HEIGHT,
            ),
        });
        let flag_ring = ring - BASE_RADIUS - 1.5;
        flags.push(FlagSpawn {
            home_team: team,
            home: Position::new(cos * flag_ring, 0.0, sin * flag_ring),
        });
    }

    Arena {
        name: format!("generated-{count}"),
        bases,
        control_points: vec![Zone::new(
            Position::default(),
            CONTROL_POINT_RADIUS,
            ZONE_HALF_HEIGHT,
        )],
        flags,
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn generated_arena_has_one_base_and_flag_per_team() {
        let arena = generate_arena(3);
        assert_eq!(arena.bases.len(), 3);
        assert_eq!(arena.flags.len(), 3);
        assert_eq!(arena.control_points.len(), 1);
        for team in 1..=3 {
            assert!(arena.base_for(team).is_some(), "missing base for {team}");
        }
        assert!(arena.base_for(0).is_none());
    }

    #[test]
    fn generated_zones_do_not_overlap() {
        let arena = generate_arena(4);
        let cp = arena.control_points[0];
        for base in &arena.bases {
            let d = base.zone.center.horizontal_distance_sq(&cp.center).sqrt();
            assert!(d > base.zone.radius + cp.radius);
            for flag in &arena.flags {
                assert!(
                    !base.zone.contains(&flag.home),
                    "flag of team {} sits inside base {}",
                    flag.home_team,
                    base.team
                );
            }
        }
    }

    #[test]
    fn own_base_check_uses_team() {
        let arena = generate_arena(2);
        let base1 = arena.base_for(1).unwrap().zone.center;
        let mut p = Participant::new(1, 1);
        p.position = base1;
        assert!(arena.in_own_base(&p));

        p.team = 2;
        assert!(!arena.in_own_base(&p));
        assert!(arena.in_any_base(&p));

        p.alive = false;
        assert!(!arena.in_any_base(&p));
    }

    #[test]
    fn arena_json_roundtrip() {
        let arena = generate_arena(2);
        let json = serde_json::to_string(&arena).unwrap();
        let parsed: Arena = serde_json::from_str(&json).unwrap();
        assert_eq!(parsed.bases.len(), 2);
        assert_eq!(parsed.name, arena.name);
    }

    #[test]
    fn missing_arena_file_is_none() {
        assert!(load_arena_from_file("does/not/exist.json").is_none());
    }
}
