//! Immutable zone registry

use crate::zone::ZoneConfig;
use arena_core::{ArenaId, Vec3};
use std::collections::HashSet;
use thiserror::Error;

/// Zone configuration errors. All of them are fatal at start-up.
#[derive(Debug, Clone, Error, PartialEq)]
pub enum ZoneError {
    #[error("zone name must not be empty")]
    EmptyName,

    #[error("duplicate zone name: {0}")]
    DuplicateName(String),

    #[error("zone {zone} has invalid radius {radius}")]
    InvalidRadius { zone: String, radius: f32 },

    #[error("zone {0} has a non-finite center")]
    InvalidCenter(String),

    #[error("zone {0} is not bound to an arena")]
    MissingArena(String),
}

/// Result type for zone operations
pub type ZoneResult<T> = Result<T, ZoneError>;

/// Query result for zones containing a point
#[derive(Debug, Clone)]
pub struct ZoneQueryResult<'a> {
    /// The matching zone
    pub zone: &'a ZoneConfig,
    /// Distance to zone center (squared)
    pub distance_sq: f32,
}

/// The configured zones, read-only after construction.
///
/// Zones are expected not to overlap. When they do, the zone listed first
/// wins for [`ZoneRegistry::zone_at`].
#[derive(Debug, Clone, Default)]
pub struct ZoneRegistry {
    zones: Vec<ZoneConfig>,
}

impl ZoneRegistry {
    /// Validate and freeze a zone list
    pub fn new(zones: Vec<ZoneConfig>) -> ZoneResult<Self> {
        let mut names = HashSet::new();
        for zone in &zones {
            if zone.name.trim().is_empty() {
                return Err(ZoneError::EmptyName);
            }
            if !names.insert(zone.name.as_str()) {
                return Err(ZoneError::DuplicateName(zone.name.clone()));
            }
            if !(zone.radius.is_finite() && zone.radius > 0.0) {
                return Err(ZoneError::InvalidRadius {
                    zone: zone.name.clone(),
                    radius: zone.radius,
                });
            }
            if !zone.center.is_finite() {
                return Err(ZoneError::InvalidCenter(zone.name.clone()));
            }
            if zone.arena.is_empty() {
                return Err(ZoneError::MissingArena(zone.name.clone()));
            }
        }
        log::info!("Zone registry loaded with {} zone(s)", zones.len());
        Ok(Self { zones })
    }

    /// First zone containing `point`
    pub fn zone_at(&self, point: Vec3) -> Option<&ZoneConfig> {
        self.zones.iter().find(|zone| zone.contains(point))
    }

    /// All zones containing `point`, nearest center first
    pub fn query_point(&self, point: Vec3) -> Vec<ZoneQueryResult<'_>> {
        let mut results: Vec<_> = self
            .zones
            .iter()
            .filter(|zone| zone.contains(point))
            .map(|zone| ZoneQueryResult {
                zone,
                distance_sq: zone.center.distance_squared(point),
            })
            .collect();

        results.sort_by(|a, b| a.distance_sq.total_cmp(&b.distance_sq));
        results
    }

    /// Look up a zone by name
    pub fn get(&self, name: &str) -> Option<&ZoneConfig> {
        self.zones.iter().find(|zone| zone.name == name)
    }

    /// Zones bound to an arena, in configuration order
    pub fn zones_for_arena<'a>(&'a self, arena: &'a ArenaId) -> impl Iterator<Item = &'a ZoneConfig> + 'a {
        self.zones.iter().filter(move |zone| &zone.arena == arena)
    }

    /// Configured zone names, in configuration order
    pub fn zone_names(&self) -> Vec<&str> {
        self.zones.iter().map(|zone| zone.name.as_str()).collect()
    }

    /// All zones
    pub fn zones(&self) -> &[ZoneConfig] {
        &self.zones
    }

    /// Zone count
    pub fn len(&self) -> usize {
        self.zones.len()
    }

    /// Whether no zones are configured
    pub fn is_empty(&self) -> bool {
        self.zones.is_empty()
    }
}
