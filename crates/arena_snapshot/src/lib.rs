//! Arena Snapshot - Suspend and Restore Player State
//!
//! Before a player's belongings are cleared for arena use, their inventory,
//! equipment, identity and position are captured into a snapshot keyed by
//! `(player, context)`. Leaving the arena restores the snapshot and deletes
//! it. Snapshots are written through to disk, so one that is still present
//! after a restart marks a player who was mid-session when the process died.
//!
//! # Invariants
//!
//! - A snapshot exists before the clear it protects runs
//! - Clearing never touches the snapshot
//! - A snapshot is deleted only after a successful restore

pub mod clear;
pub mod error;
pub mod persistence;
pub mod snapshot;
pub mod store;

pub mod prelude {
    pub use crate::clear::{ClearReport, ClearStrategy};
    pub use crate::error::{SnapshotError, SnapshotResult};
    pub use crate::persistence::{is_valid_context, SnapshotDisk, SnapshotFormat};
    pub use crate::snapshot::{
        EquipmentSnapshot, EquippedRecord, InventoryRecord, InventorySnapshot, PlayerSnapshot, SnapshotKey,
    };
    pub use crate::store::SnapshotStore;
}

pub use prelude::*;
