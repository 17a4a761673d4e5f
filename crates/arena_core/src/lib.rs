//! # arena_core - Shared Primitives
//!
//! Identifiers, small vector math and the clock abstraction used by every
//! other arena crate. Nothing here knows about arenas beyond naming.
//!
//! - [`PlayerId`] is the stable platform identifier of a player
//! - [`EntityRef`] is a generational reference into the hosting engine
//! - [`ArenaId`] names an arena instance ("main_arena", "pvp_arena")
//! - [`Clock`] supplies [`Timestamp`]s so time-dependent logic is testable

pub mod id;
pub mod math;
pub mod time;

pub use id::*;
pub use math::*;
pub use time::*;

/// Re-export commonly used types
pub mod prelude {
    pub use crate::id::{ArenaId, BuildingId, EntityRef, PlayerId};
    pub use crate::math::{Quat, Vec3};
    pub use crate::time::{Clock, ManualClock, SystemClock, Timestamp};
}
