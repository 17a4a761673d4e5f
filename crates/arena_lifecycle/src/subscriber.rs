//! Lifecycle subscriber contract
//!
//! Subsystems that react to mode changes implement [`LifecycleSubscriber`]
//! and register with the coordinator. Every callback returns a success flag.
//! Callbacks run while the coordinator lock is held, so they must only touch
//! state they own plus the host, and must never call back into the
//! coordinator.

use arena_core::{ArenaId, BuildingId, EntityRef, PlayerId, Quat, Vec3};
use serde::{Deserialize, Serialize};
use std::any::Any;
use std::fmt;
use std::panic::{self, AssertUnwindSafe};

/// Registration handle returned by the coordinator
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct SubscriberId(pub u64);

impl fmt::Display for SubscriberId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "subscriber_{}", self.0)
    }
}

/// A player crossing into or out of an arena
#[derive(Debug, Clone, PartialEq)]
pub struct PlayerContext {
    pub player: PlayerId,
    pub arena: ArenaId,
    /// Body the player drives
    pub body: EntityRef,
    /// Session entity
    pub session: EntityRef,
    /// Body position at the time of the callback
    pub position: Vec3,
}

/// A structure moving through its build lifecycle
#[derive(Debug, Clone, PartialEq)]
pub struct BuildContext {
    pub building: BuildingId,
    pub player: PlayerId,
    pub arena: ArenaId,
    /// Body of the building player
    pub body: EntityRef,
    pub kind: String,
    pub position: Vec3,
    pub rotation: Quat,
    /// Set when the engine itself tears the structure down, bypassing
    /// player permissions
    pub forced: bool,
}

/// Reacts to arena lifecycle events.
///
/// Callbacks default to accepting. They must be idempotent and must not
/// block.
pub trait LifecycleSubscriber: Send + Sync {
    /// Name used in logs
    fn name(&self) -> &str;

    fn on_player_enter(&self, _ctx: &PlayerContext) -> bool {
        true
    }

    fn on_player_exit(&self, _ctx: &PlayerContext) -> bool {
        true
    }

    /// Any subscriber returning false rejects the build
    fn on_build_start(&self, _ctx: &BuildContext) -> bool {
        true
    }

    fn on_build_complete(&self, _ctx: &BuildContext) -> bool {
        true
    }

    fn on_build_destroy(&self, _ctx: &BuildContext) -> bool {
        true
    }

    fn on_arena_start(&self, _arena: &ArenaId) -> bool {
        true
    }

    fn on_arena_end(&self, _arena: &ArenaId) -> bool {
        true
    }
}

/// Run one callback, turning a panic into a logged failure
pub(crate) fn notify<F>(subscriber: &dyn LifecycleSubscriber, callback: &str, f: F) -> bool
where
    F: FnOnce(&dyn LifecycleSubscriber) -> bool,
{
    match panic::catch_unwind(AssertUnwindSafe(|| f(subscriber))) {
        Ok(true) => true,
        Ok(false) => {
            log::warn!("Subscriber '{}' reported failure in {}", subscriber.name(), callback);
            false
        }
        Err(payload) => {
            log::warn!(
                "Subscriber '{}' panicked in {}: {}",
                subscriber.name(),
                callback,
                panic_message(payload.as_ref())
            );
            false
        }
    }
}

/// Text of a caught panic payload
pub(crate) fn panic_message(payload: &(dyn Any + Send)) -> String {
    if let Some(s) = payload.downcast_ref::<&str>() {
        s.to_string()
    } else if let Some(s) = payload.downcast_ref::<String>() {
        s.clone()
    } else {
        "unknown panic".to_string()
    }
}
