//! # Arena Lifecycle
//!
//! Moves players between world mode and arena mode. Entering an arena
//! snapshots the player's belongings, clears them, and applies the arena
//! profile. Leaving puts everything back exactly.
//!
//! ## Architecture
//!
//! - [`LifecycleCoordinator`] owns the "is in arena" record and serializes
//!   every transition under one lock
//! - [`LifecycleSubscriber`]s observe transitions in registration order;
//!   [`BuildingTracker`] and [`AutoEnterTrigger`] are the built-in ones
//! - [`LocationService`] turns player positions into zone transitions
//! - [`CharacterSwap`] hands control between a normal and an arena body
//! - [`ArenaEngine`] wires it all together from an [`EngineConfig`]
//!
//! ## Usage
//!
//! ```ignore
//! let config = EngineConfig::load("arena.toml")?;
//! let engine = ArenaEngine::new(config, host, Arc::new(SystemClock))?;
//! engine.bootstrap();
//!
//! loop {
//!     engine.tick();
//!     engine.execute(ArenaCommand::Enter { player: PlayerId(42), arena: "main_arena".into() });
//! }
//! ```

pub mod auto_enter;
pub mod building;
pub mod commands;
pub mod config;
pub mod coordinator;
pub mod engine;
pub mod events;
pub mod location;
pub mod recovery;
pub mod rules;
pub mod state;
pub mod subscriber;
pub mod swap;

pub mod prelude {
    pub use crate::auto_enter::{AutoEnterProfile, AutoEnterTrigger, ScanReport, DEFAULT_COOLDOWN};
    pub use crate::building::{BuildPermissions, BuildingRecord, BuildingStatus, BuildingTracker};
    pub use crate::commands::ArenaCommand;
    pub use crate::config::{AutoEnterSettings, ConfigError, ConfigResult, EngineConfig, LifecycleSettings};
    pub use crate::coordinator::{CoordinatorSettings, LifecycleCoordinator, DEFAULT_CONTEXT};
    pub use crate::engine::{ArenaEngine, EngineError, EngineResult, TickReport};
    pub use crate::events::{LifecycleEvent, LifecycleEvents};
    pub use crate::location::LocationService;
    pub use crate::recovery::RecoveryReport;
    pub use crate::rules::{build_time, max_health, ArenaRuleBook, ArenaRules, DEFAULT_SPAWN, STRUCTURE_KINDS};
    pub use crate::state::{
        ArenaState, BuildingEvent, BuildingEventKind, LifecycleStats, PlayerLifecycleRecord, TransitionEvent,
        TransitionKind,
    };
    pub use crate::subscriber::{BuildContext, LifecycleSubscriber, PlayerContext, SubscriberId};
    pub use crate::swap::{CharacterMode, CharacterSwap, DualCharacterState, SwapSettings, NORMAL_CONTEXT};
}

pub use prelude::*;
