//! Engine wiring
//!
//! [`ArenaEngine`] builds every subsystem from an [`EngineConfig`] and a
//! host, registers the subscribers in a fixed order (building tracker,
//! then auto-enter) and exposes the tick and command entry points the
//! hosting server drives.

use crate::auto_enter::{AutoEnterTrigger, ScanReport};
use crate::building::BuildingTracker;
use crate::commands::ArenaCommand;
use crate::config::{ConfigError, EngineConfig};
use crate::coordinator::LifecycleCoordinator;
use crate::events::LifecycleEvents;
use crate::location::LocationService;
use crate::recovery::RecoveryReport;
use crate::swap::{CharacterSwap, NORMAL_CONTEXT};
use arena_core::{Clock, Timestamp};
use arena_host::GameHost;
use arena_snapshot::{SnapshotError, SnapshotStore};
use arena_zones::{ZoneError, ZoneRegistry};
use parking_lot::Mutex;
use std::sync::Arc;
use thiserror::Error;

/// Errors that stop the engine from starting
#[derive(Debug, Error)]
pub enum EngineError {
    #[error("Config error: {0}")]
    Config(#[from] ConfigError),

    #[error("Zone error: {0}")]
    Zone(#[from] ZoneError),

    #[error("Snapshot store error: {0}")]
    Snapshot(#[from] SnapshotError),
}

/// Result type for engine start-up
pub type EngineResult<T> = Result<T, EngineError>;

/// What one tick did
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct TickReport {
    /// Zone enter/exit events seen
    pub zone_events: usize,
    /// Set when the auto-enter scan ran this tick
    pub scan: Option<ScanReport>,
}

/// The assembled arena lifecycle engine
pub struct ArenaEngine {
    config: EngineConfig,
    clock: Arc<dyn Clock>,
    zones: Arc<ZoneRegistry>,
    coordinator: Arc<LifecycleCoordinator>,
    buildings: Arc<BuildingTracker>,
    auto_enter: Arc<AutoEnterTrigger>,
    location: LocationService,
    swap: CharacterSwap,
    last_scan: Mutex<Option<Timestamp>>,
}

impl ArenaEngine {
    pub fn new(config: EngineConfig, host: Arc<dyn GameHost>, clock: Arc<dyn Clock>) -> EngineResult<Self> {
        config.validate()?;
        let zones = Arc::new(ZoneRegistry::new(config.zones.clone())?);
        let rules = Arc::new(config.resolved_rules(&zones));

        let lifecycle = &config.lifecycle;
        let snapshots = Arc::new(match &lifecycle.snapshot_dir {
            Some(dir) => SnapshotStore::open(host.clone(), clock.clone(), dir, lifecycle.snapshot_format)?,
            None => SnapshotStore::in_memory(host.clone(), clock.clone()),
        });

        let coordinator = Arc::new(LifecycleCoordinator::new(
            host.clone(),
            snapshots.clone(),
            clock.clone(),
            rules.clone(),
            lifecycle.coordinator_settings(),
        ));

        let buildings = Arc::new(BuildingTracker::new(host.clone(), clock.clone(), rules));
        coordinator.register(buildings.clone());

        let auto_enter = Arc::new(AutoEnterTrigger::new(
            &coordinator,
            host.clone(),
            zones.clone(),
            clock.clone(),
            config.auto_enter.cooldown,
        ));
        coordinator.register(auto_enter.clone());

        let location = LocationService::new(host.clone(), zones.clone(), coordinator.clone(), auto_enter.clone());
        let swap = CharacterSwap::new(
            host,
            snapshots,
            coordinator.clone(),
            clock.clone(),
            config.character_swap.clone(),
        );

        log::info!(
            "Arena engine ready: {} zone(s), subscribers {:?}",
            zones.len(),
            coordinator.subscriber_names()
        );

        Ok(Self {
            config,
            clock,
            zones,
            coordinator,
            buildings,
            auto_enter,
            location,
            swap,
            last_scan: Mutex::new(None),
        })
    }

    /// Restore players left mid-session by a previous run. Call once,
    /// before the first tick.
    pub fn bootstrap(&self) -> RecoveryReport {
        let mut report = self.coordinator.recover_pending(self.coordinator.context());
        report.merge(self.coordinator.recover_pending(NORMAL_CONTEXT));
        report
    }

    /// Poll positions, and run the auto-enter scan when its interval is up
    pub fn tick(&self) -> TickReport {
        let zone_events = self.location.update_all();

        let now = self.clock.now();
        let due = {
            let mut last_scan = self.last_scan.lock();
            let due = match *last_scan {
                Some(last) => now.saturating_since(last) >= self.config.auto_enter.scan_interval,
                None => true,
            };
            if due {
                *last_scan = Some(now);
            }
            due
        };

        TickReport {
            zone_events,
            scan: due.then(|| self.auto_enter.scan()),
        }
    }

    /// Run a command; the result is the underlying operation's result
    pub fn execute(&self, command: ArenaCommand) -> bool {
        log::debug!("Executing command: {}", command);
        let ok = match &command {
            ArenaCommand::EnableAutoEnter { player } => self.auto_enter.enable(*player),
            ArenaCommand::DisableAutoEnter { player } => self.auto_enter.disable(*player),
            ArenaCommand::SwapCharacters { player } => self.swap.swap_characters(*player),
            ArenaCommand::ForceActivate { player, to_arena } => self.swap.force_activate(*player, *to_arena),
            ArenaCommand::Enter { player, arena } => self.coordinator.request_enter(*player, arena),
            ArenaCommand::Exit { player, arena } => self.coordinator.request_exit(*player, arena),
            ArenaCommand::StartArena { arena } => self.coordinator.start_arena(arena),
            ArenaCommand::EndArena { arena } => self.coordinator.end_arena(arena),
        };
        if !ok {
            log::warn!("Command failed: {}", command);
        }
        ok
    }

    /// End every arena and refuse further entries
    pub fn shutdown(&self) {
        self.coordinator.shutdown();
    }

    pub fn config(&self) -> &EngineConfig {
        &self.config
    }

    pub fn zones(&self) -> &ZoneRegistry {
        &self.zones
    }

    pub fn coordinator(&self) -> &Arc<LifecycleCoordinator> {
        &self.coordinator
    }

    pub fn buildings(&self) -> &BuildingTracker {
        &self.buildings
    }

    pub fn auto_enter(&self) -> &AutoEnterTrigger {
        &self.auto_enter
    }

    pub fn location(&self) -> &LocationService {
        &self.location
    }

    pub fn swap(&self) -> &CharacterSwap {
        &self.swap
    }

    pub fn snapshots(&self) -> &SnapshotStore {
        self.coordinator.snapshots()
    }

    pub fn events(&self) -> &LifecycleEvents {
        self.coordinator.events()
    }
}
