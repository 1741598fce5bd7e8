use serde::{Deserialize, Serialize};

/// World-space position. `y` is up.
#[derive(Debug, Clone, Copy, Default, PartialEq, Serialize, Deserialize)]
pub struct Position {
    pub x: f32,
    pub y: f32,
    pub z: f32,
}

impl Position {
    pub const fn new(x: f32, y: f32, z: f32) -> Self {
        Self { x, y, z }
    }

    /// Squared distance on the horizontal (XZ) plane.
    pub fn horizontal_distance_sq(&self, other: &Position) -> f32 {
        let dx = self.x - other.x;
        let dz = self.z - other.z;
        dx * dx + dz * dz
    }
}

/// A vertical cylinder: bases, control points and flag pickup volumes.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct Zone {
    pub center: Position,
    pub radius: f32,
    /// Vertical extent above and below `center.y`.
    pub half_height: f32,
}

impl Zone {
    pub const fn new(center: Position, radius: f32, half_height: f32) -> Self {
        Self {
            center,
            radius,
            half_height,
        }
    }

    pub fn contains(&self, point: &Position) -> bool {
        self.center.horizontal_distance_sq(point) <= self.radius * self.radius
            && (point.y - self.center.y).abs() <= self.half_height
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn cylinder_contains_center_and_edge() {
        let zone = Zone::new(Position::new(10.0, 0.0, 10.0), 2.0, 1.5);
        assert!(zone.contains(&zone.center));
        assert!(zone.contains(&Position::new(12.0, 0.0, 10.0)));
        assert!(!zone.contains(&Position::new(12.1, 0.0, 10.0)));
    }

    #[test]
    fn cylinder_rejects_points_above_and_below() {
        let zone = Zone::new(Position::new(0.0, 1.0, 0.0), 3.0, 1.0);
        assert!(zone.contains(&Position::new(0.5, 1.9, 0.5)));
        assert!(!zone.contains(&Position::new(0.5, 2.1, 0.5)));
        assert!(!zone.contains(&Position::new(0.5, -0.1, 0.5)));
    }
}
