//! Zone definitions

use arena_core::{ArenaId, Vec3};
use serde::{Deserialize, Serialize};

/// A named circular region bound to an arena
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ZoneConfig {
    /// Unique zone name
    pub name: String,
    /// Center point
    pub center: Vec3,
    /// Radius (inclusive)
    pub radius: f32,
    /// Arena this zone leads into
    pub arena: ArenaId,
    /// Walking in may put opted-in players into the arena
    pub auto_enter: bool,
    /// Walking out takes players out of the arena
    pub auto_exit: bool,
}

impl ZoneConfig {
    /// Create a zone with auto enter and exit enabled
    pub fn new(name: impl Into<String>, center: Vec3, radius: f32, arena: impl Into<ArenaId>) -> Self {
        Self {
            name: name.into(),
            center,
            radius,
            arena: arena.into(),
            auto_enter: true,
            auto_exit: true,
        }
    }

    /// Set auto-enter
    pub fn with_auto_enter(mut self, auto_enter: bool) -> Self {
        self.auto_enter = auto_enter;
        self
    }

    /// Set auto-exit
    pub fn with_auto_exit(mut self, auto_exit: bool) -> Self {
        self.auto_exit = auto_exit;
        self
    }

    /// Check if a point is inside (distance <= radius)
    pub fn contains(&self, point: Vec3) -> bool {
        self.center.distance_squared(point) <= self.radius * self.radius
    }

    /// The default zones: the main arena and the PvP pit
    pub fn defaults() -> Vec<ZoneConfig> {
        vec![
            ZoneConfig::new("MainArena", Vec3::new(-1000.0, 5.0, -500.0), 50.0, "main_arena"),
            ZoneConfig::new("PvPArena", Vec3::new(0.0, 10.0, 0.0), 30.0, "pvp_arena"),
        ]
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_contains_is_inclusive() {
        let zone = ZoneConfig::new("Pit", Vec3::ZERO, 10.0, "pit");

        assert!(zone.contains(Vec3::ZERO));
        assert!(zone.contains(Vec3::new(10.0, 0.0, 0.0)));
        assert!(!zone.contains(Vec3::new(10.01, 0.0, 0.0)));
        assert!(!zone.contains(Vec3::new(8.0, 8.0, 0.0)));
    }

    #[test]
    fn test_defaults() {
        let zones = ZoneConfig::defaults();
        assert_eq!(zones.len(), 2);
        assert_eq!(zones[0].arena, ArenaId::from("main_arena"));
        assert!(zones[0].contains(Vec3::new(-1000.0, 5.0, -460.0)));
        assert!(zones[1].auto_enter && zones[1].auto_exit);
    }
}
