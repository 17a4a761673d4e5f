//! Engine configuration - TOML to EngineConfig conversion
//!
//! Every section and field is optional. An empty document gives the
//! built-in zones and arena rules.
//!
//! # Config Format
//!
//! ```toml
//! [lifecycle]
//! context = "practice"
//! snapshot_dir = "data/snapshots"
//! snapshot_format = "json"        # or "binary"
//!
//! [lifecycle.clear_strategy]
//! kind = "keep_categories"        # "delete_all", "keep_categories", "move_to_container"
//! keep = ["key", "quest"]
//!
//! [[zones]]
//! name = "MainArena"
//! center = [-1000.0, 5.0, -500.0]
//! radius = 50.0
//! arena = "main_arena"
//! auto_enter = true
//! auto_exit = true
//!
//! [arenas.main_arena]
//! spawn = [-1000.0, 5.0, -500.0]
//! max_structures = 20
//! build_range = 15.0
//! allowed_structures = ["wall", "floor", "portal"]
//! name_prefix = "[PvP] "
//! blood_type = "Warrior"
//!
//! [auto_enter]
//! cooldown_secs = 5.0
//! scan_interval_secs = 1.0
//!
//! [character_swap]
//! arena = "main_arena"
//! arena_spawn = [-1000.0, 5.0, -500.0]
//! frozen_position = [0.0, -1000.0, 0.0]
//! arena_blood_type = "Rogue"
//! ```

use crate::coordinator::{CoordinatorSettings, DEFAULT_CONTEXT};
use crate::rules::{ArenaRuleBook, ArenaRules};
use crate::swap::SwapSettings;
use arena_core::{ArenaId, Vec3};
use arena_inventory::ItemCategory;
use arena_snapshot::{is_valid_context, ClearStrategy, SnapshotFormat};
use arena_zones::{ZoneConfig, ZoneError, ZoneRegistry};
use serde::Deserialize;
use std::collections::BTreeMap;
use std::path::{Path, PathBuf};
use std::time::Duration;
use thiserror::Error;

/// Errors from loading configuration
#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("TOML parse error: {0}")]
    Parse(#[from] toml::de::Error),

    #[error("Zone error: {0}")]
    Zone(#[from] ZoneError),

    #[error("Invalid config: {0}")]
    Invalid(String),
}

/// Result type for configuration
pub type ConfigResult<T> = Result<T, ConfigError>;

/// Raw TOML structure for a clear strategy
#[derive(Debug, Deserialize)]
struct ClearStrategyToml {
    kind: String,
    #[serde(default)]
    keep: Vec<String>,
}

/// Raw TOML structure for the lifecycle section
#[derive(Debug, Deserialize, Default)]
struct LifecycleToml {
    context: Option<String>,
    snapshot_dir: Option<PathBuf>,
    snapshot_format: Option<String>,
    clear_strategy: Option<ClearStrategyToml>,
}

/// Raw TOML structure for one zone
#[derive(Debug, Deserialize)]
struct ZoneToml {
    name: String,
    center: [f32; 3],
    radius: f32,
    arena: String,
    auto_enter: Option<bool>,
    auto_exit: Option<bool>,
}

/// Raw TOML structure for one arena's rules
#[derive(Debug, Deserialize, Default)]
struct ArenaToml {
    spawn: Option<[f32; 3]>,
    max_structures: Option<usize>,
    build_range: Option<f32>,
    allowed_structures: Option<Vec<String>>,
    name_prefix: Option<String>,
    blood_type: Option<String>,
}

/// Raw TOML structure for the auto-enter section
#[derive(Debug, Deserialize, Default)]
struct AutoEnterToml {
    cooldown_secs: Option<f64>,
    scan_interval_secs: Option<f64>,
}

/// Raw TOML structure for the character swap section
#[derive(Debug, Deserialize, Default)]
struct SwapToml {
    arena: Option<String>,
    arena_spawn: Option<[f32; 3]>,
    frozen_position: Option<[f32; 3]>,
    arena_blood_type: Option<String>,
}

/// Root TOML structure
#[derive(Debug, Deserialize, Default)]
struct EngineToml {
    #[serde(default)]
    lifecycle: LifecycleToml,
    zones: Option<Vec<ZoneToml>>,
    #[serde(default)]
    arenas: BTreeMap<String, ArenaToml>,
    #[serde(default)]
    auto_enter: AutoEnterToml,
    #[serde(default)]
    character_swap: SwapToml,
}

/// Snapshot and clearing settings
#[derive(Debug, Clone, PartialEq)]
pub struct LifecycleSettings {
    /// Snapshot context label for arena sessions
    pub context: String,
    /// Persist snapshots here; in memory only when `None`
    pub snapshot_dir: Option<PathBuf>,
    pub snapshot_format: SnapshotFormat,
    pub clear_strategy: ClearStrategy,
}

impl Default for LifecycleSettings {
    fn default() -> Self {
        Self {
            context: DEFAULT_CONTEXT.to_string(),
            snapshot_dir: None,
            snapshot_format: SnapshotFormat::Json,
            clear_strategy: ClearStrategy::DeleteAll,
        }
    }
}

impl LifecycleSettings {
    pub fn coordinator_settings(&self) -> CoordinatorSettings {
        CoordinatorSettings {
            context: self.context.clone(),
            clear_strategy: self.clear_strategy.clone(),
        }
    }
}

/// Auto-enter timing
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct AutoEnterSettings {
    /// Minimum time between attempts for one player
    pub cooldown: Duration,
    /// Time between periodic scans
    pub scan_interval: Duration,
}

impl Default for AutoEnterSettings {
    fn default() -> Self {
        Self {
            cooldown: Duration::from_secs(5),
            scan_interval: Duration::from_secs(1),
        }
    }
}

/// Validated engine configuration
#[derive(Debug, Clone, PartialEq)]
pub struct EngineConfig {
    pub lifecycle: LifecycleSettings,
    pub zones: Vec<ZoneConfig>,
    pub arenas: ArenaRuleBook,
    pub auto_enter: AutoEnterSettings,
    pub character_swap: SwapSettings,
}

impl Default for EngineConfig {
    fn default() -> Self {
        Self {
            lifecycle: LifecycleSettings::default(),
            zones: ZoneConfig::defaults(),
            arenas: ArenaRuleBook::default(),
            auto_enter: AutoEnterSettings::default(),
            character_swap: SwapSettings::default(),
        }
    }
}

/// Parse a snapshot format name
fn parse_format(s: &str) -> ConfigResult<SnapshotFormat> {
    match s.to_lowercase().as_str() {
        "json" => Ok(SnapshotFormat::Json),
        "binary" | "bincode" => Ok(SnapshotFormat::Binary),
        _ => Err(ConfigError::Invalid(format!("unknown snapshot format '{}'", s))),
    }
}

/// Parse an item category name
fn parse_category(s: &str) -> ConfigResult<ItemCategory> {
    match s.to_lowercase().as_str() {
        "weapon" => Ok(ItemCategory::Weapon),
        "armor" => Ok(ItemCategory::Armor),
        "consumable" => Ok(ItemCategory::Consumable),
        "material" => Ok(ItemCategory::Material),
        "quest" => Ok(ItemCategory::Quest),
        "key" => Ok(ItemCategory::Key),
        "currency" => Ok(ItemCategory::Currency),
        "misc" => Ok(ItemCategory::Misc),
        _ => Err(ConfigError::Invalid(format!("unknown item category '{}'", s))),
    }
}

fn parse_strategy(raw: &ClearStrategyToml) -> ConfigResult<ClearStrategy> {
    match raw.kind.to_lowercase().as_str() {
        "delete_all" => Ok(ClearStrategy::DeleteAll),
        "move_to_container" => Ok(ClearStrategy::MoveToContainer),
        "keep_categories" => Ok(ClearStrategy::KeepCategories {
            keep: raw
                .keep
                .iter()
                .map(|name| parse_category(name))
                .collect::<ConfigResult<_>>()?,
        }),
        _ => Err(ConfigError::Invalid(format!("unknown clear strategy '{}'", raw.kind))),
    }
}

/// Seconds to a duration; rejects negative and non-finite values
fn parse_secs(field: &str, secs: f64) -> ConfigResult<Duration> {
    if !secs.is_finite() || secs < 0.0 {
        return Err(ConfigError::Invalid(format!("{} must be a non-negative number, got {}", field, secs)));
    }
    Duration::try_from_secs_f64(secs)
        .map_err(|_| ConfigError::Invalid(format!("{} is out of range, got {}", field, secs)))
}

fn merge_arena(base: ArenaRules, raw: ArenaToml) -> ArenaRules {
    ArenaRules {
        spawn: raw.spawn.map(Vec3::from).or(base.spawn),
        max_structures: raw.max_structures.unwrap_or(base.max_structures),
        build_range: raw.build_range.unwrap_or(base.build_range),
        allowed_structures: raw.allowed_structures.or(base.allowed_structures),
        name_prefix: raw.name_prefix.unwrap_or(base.name_prefix),
        blood_type: raw.blood_type.or(base.blood_type),
    }
}

impl EngineConfig {
    /// Read and validate a config file
    pub fn load(path: impl AsRef<Path>) -> ConfigResult<Self> {
        let path = path.as_ref();
        let content = std::fs::read_to_string(path)?;
        let config = Self::from_toml_str(&content)?;
        log::info!(
            "Loaded config from {}: {} zone(s), snapshots {}",
            path.display(),
            config.zones.len(),
            config
                .lifecycle
                .snapshot_dir
                .as_ref()
                .map(|dir| dir.display().to_string())
                .unwrap_or_else(|| "in memory".to_string())
        );
        Ok(config)
    }

    /// Parse and validate a TOML document
    pub fn from_toml_str(content: &str) -> ConfigResult<Self> {
        let raw: EngineToml = toml::from_str(content)?;
        let defaults = Self::default();

        let lifecycle = LifecycleSettings {
            context: raw.lifecycle.context.unwrap_or(defaults.lifecycle.context),
            snapshot_dir: raw.lifecycle.snapshot_dir,
            snapshot_format: match &raw.lifecycle.snapshot_format {
                Some(name) => parse_format(name)?,
                None => defaults.lifecycle.snapshot_format,
            },
            clear_strategy: match &raw.lifecycle.clear_strategy {
                Some(strategy) => parse_strategy(strategy)?,
                None => defaults.lifecycle.clear_strategy,
            },
        };

        let zones = match raw.zones {
            Some(zones) => zones
                .into_iter()
                .map(|z| {
                    ZoneConfig::new(z.name, Vec3::from(z.center), z.radius, z.arena.as_str())
                        .with_auto_enter(z.auto_enter.unwrap_or(true))
                        .with_auto_exit(z.auto_exit.unwrap_or(true))
                })
                .collect(),
            None => defaults.zones,
        };

        let mut arenas = defaults.arenas;
        for (id, rules) in raw.arenas {
            let id = ArenaId::new(id);
            let merged = merge_arena(arenas.get(&id).clone(), rules);
            arenas.insert(id, merged);
        }

        let auto_enter = AutoEnterSettings {
            cooldown: match raw.auto_enter.cooldown_secs {
                Some(secs) => parse_secs("auto_enter.cooldown_secs", secs)?,
                None => defaults.auto_enter.cooldown,
            },
            scan_interval: match raw.auto_enter.scan_interval_secs {
                Some(secs) => parse_secs("auto_enter.scan_interval_secs", secs)?,
                None => defaults.auto_enter.scan_interval,
            },
        };

        let swap = raw.character_swap;
        let base = defaults.character_swap;
        let character_swap = SwapSettings {
            arena: swap.arena.map(ArenaId::new).unwrap_or(base.arena),
            arena_spawn: swap.arena_spawn.map(Vec3::from).unwrap_or(base.arena_spawn),
            frozen_position: swap.frozen_position.map(Vec3::from).unwrap_or(base.frozen_position),
            arena_blood_type: swap.arena_blood_type.unwrap_or(base.arena_blood_type),
        };

        let config = Self {
            lifecycle,
            zones,
            arenas,
            auto_enter,
            character_swap,
        };
        config.validate()?;
        Ok(config)
    }

    /// Check the config for values that would fail at runtime
    pub fn validate(&self) -> ConfigResult<()> {
        if !is_valid_context(&self.lifecycle.context) {
            return Err(ConfigError::Invalid(format!(
                "lifecycle.context must be non-empty and use only letters, digits, '-' and '_', got '{}'",
                self.lifecycle.context
            )));
        }

        self.zone_registry()?;

        for (id, rules) in self.arenas.arenas() {
            if id.is_empty() {
                return Err(ConfigError::Invalid("arena id must not be empty".into()));
            }
            if !(rules.build_range.is_finite() && rules.build_range > 0.0) {
                return Err(ConfigError::Invalid(format!(
                    "arenas.{}.build_range must be positive, got {}",
                    id, rules.build_range
                )));
            }
            if matches!(rules.spawn, Some(spawn) if !spawn.is_finite()) {
                return Err(ConfigError::Invalid(format!("arenas.{}.spawn is not finite", id)));
            }
        }

        let swap = &self.character_swap;
        if swap.arena.is_empty() {
            return Err(ConfigError::Invalid("character_swap.arena must not be empty".into()));
        }
        if !swap.arena_spawn.is_finite() || !swap.frozen_position.is_finite() {
            return Err(ConfigError::Invalid("character_swap positions must be finite".into()));
        }
        Ok(())
    }

    /// Build the zone registry
    pub fn zone_registry(&self) -> ConfigResult<ZoneRegistry> {
        Ok(ZoneRegistry::new(self.zones.clone())?)
    }

    /// Arena rules with unset spawns filled in from the zones
    pub fn resolved_rules(&self, zones: &ZoneRegistry) -> ArenaRuleBook {
        let mut rules = self.arenas.clone();
        rules.resolve_spawns(zones);
        rules
    }
}
