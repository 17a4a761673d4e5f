//! Per-arena tunables and the structure catalog

use arena_core::{ArenaId, Vec3};
use arena_zones::ZoneRegistry;
use std::collections::HashMap;
use std::time::Duration;

/// Spawn used for arenas with no configured spawn and no zone
pub const DEFAULT_SPAWN: Vec3 = Vec3::new(-1000.0, 5.0, -500.0);

/// Name prefix applied to players inside an arena
pub const DEFAULT_NAME_PREFIX: &str = "[PvP] ";

/// Structure kinds known to the building system
pub const STRUCTURE_KINDS: [&str; 5] = ["wall", "floor", "portal", "waygate", "glow"];

/// Seconds a structure of `kind` takes to build
pub fn build_time(kind: &str) -> Duration {
    let secs = match kind {
        "wall" => 2.0,
        "floor" => 1.0,
        "portal" => 5.0,
        "waygate" => 8.0,
        "glow" => 1.5,
        _ => 3.0,
    };
    Duration::from_secs_f32(secs)
}

/// Hit points of a completed structure of `kind`
pub fn max_health(kind: &str) -> f32 {
    match kind {
        "wall" => 100.0,
        "floor" => 50.0,
        "portal" => 200.0,
        "waygate" => 300.0,
        "glow" => 25.0,
        _ => 100.0,
    }
}

/// Tunables for one arena
#[derive(Debug, Clone, PartialEq)]
pub struct ArenaRules {
    /// Where entering players are teleported
    pub spawn: Option<Vec3>,
    /// Live structures allowed per player
    pub max_structures: usize,
    /// Max distance between a player's body and their build spot
    pub build_range: f32,
    /// Allowed structure kinds, `None` allows every kind
    pub allowed_structures: Option<Vec<String>>,
    pub name_prefix: String,
    /// Blood type forced on entry, at full quality
    pub blood_type: Option<String>,
}

impl Default for ArenaRules {
    fn default() -> Self {
        Self {
            spawn: None,
            max_structures: 10,
            build_range: 10.0,
            allowed_structures: None,
            name_prefix: DEFAULT_NAME_PREFIX.to_string(),
            blood_type: None,
        }
    }
}

impl ArenaRules {
    pub fn allows(&self, kind: &str) -> bool {
        match &self.allowed_structures {
            Some(kinds) => kinds.iter().any(|k| k == kind),
            None => true,
        }
    }

    pub fn spawn_point(&self) -> Vec3 {
        self.spawn.unwrap_or(DEFAULT_SPAWN)
    }
}

/// Rules for every arena, with a fallback for arenas nobody configured
#[derive(Debug, Clone, PartialEq)]
pub struct ArenaRuleBook {
    arenas: HashMap<ArenaId, ArenaRules>,
    fallback: ArenaRules,
}

impl Default for ArenaRuleBook {
    fn default() -> Self {
        let mut arenas = HashMap::new();
        arenas.insert(
            ArenaId::new("main_arena"),
            ArenaRules {
                max_structures: 20,
                build_range: 15.0,
                ..ArenaRules::default()
            },
        );
        arenas.insert(
            ArenaId::new("pvp_arena"),
            ArenaRules {
                max_structures: 10,
                build_range: 10.0,
                allowed_structures: Some(vec!["wall".into(), "floor".into(), "glow".into()]),
                ..ArenaRules::default()
            },
        );
        Self {
            arenas,
            fallback: ArenaRules::default(),
        }
    }
}

impl ArenaRuleBook {
    /// Rule book with only the fallback
    pub fn empty() -> Self {
        Self {
            arenas: HashMap::new(),
            fallback: ArenaRules::default(),
        }
    }

    /// Rules for `arena`
    pub fn get(&self, arena: &ArenaId) -> &ArenaRules {
        self.arenas.get(arena).unwrap_or(&self.fallback)
    }

    /// Configured rules, if `arena` has its own entry
    pub fn configured(&self, arena: &ArenaId) -> Option<&ArenaRules> {
        self.arenas.get(arena)
    }

    pub fn insert(&mut self, arena: ArenaId, rules: ArenaRules) {
        self.arenas.insert(arena, rules);
    }

    pub fn arenas(&self) -> impl Iterator<Item = (&ArenaId, &ArenaRules)> {
        self.arenas.iter()
    }

    /// Give every arena without a spawn the center of its first zone
    pub fn resolve_spawns(&mut self, zones: &ZoneRegistry) {
        for zone in zones.zones() {
            let fallback = self.fallback.clone();
            let rules = self.arenas.entry(zone.arena.clone()).or_insert(fallback);
            if rules.spawn.is_none() {
                rules.spawn = Some(zone.center);
            }
        }
    }
}
