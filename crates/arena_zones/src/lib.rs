//! Arena Zones - Proximity Regions
//!
//! Named circular regions bound to arenas, and the membership diff that turns
//! a stream of player positions into zone enter/exit events.
//!
//! # Features
//!
//! - Immutable, validated zone registry (first matching zone wins)
//! - Enter/Exit events, exit always before enter on a zone change
//! - Zone population queries
//!
//! # Example
//!
//! ```ignore
//! use arena_zones::prelude::*;
//!
//! let registry = ZoneRegistry::new(vec![
//!     ZoneConfig::new("MainArena", Vec3::new(-1000.0, 5.0, -500.0), 50.0, "main_arena"),
//! ])?;
//! let mut tracker = LocationTracker::new();
//! for event in tracker.update(&registry, PlayerId(42), position) {
//!     println!("{:?}", event);
//! }
//! ```

pub mod events;
pub mod registry;
pub mod tracker;
pub mod zone;

pub mod prelude {
    pub use crate::events::{ZoneEvent, ZoneEventType};
    pub use crate::registry::{ZoneError, ZoneQueryResult, ZoneRegistry, ZoneResult};
    pub use crate::tracker::LocationTracker;
    pub use crate::zone::ZoneConfig;
    pub use arena_core::{ArenaId, PlayerId, Vec3};
}

pub use prelude::*;
