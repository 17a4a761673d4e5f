//! Zone transition events

use crate::zone::ZoneConfig;
use arena_core::{ArenaId, PlayerId, Vec3};
use serde::{Deserialize, Serialize};

/// Type of zone event
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum ZoneEventType {
    /// Player walked into the zone
    Enter,
    /// Player walked out of the zone
    Exit,
}

/// A zone membership change for one player
#[derive(Debug, Clone, PartialEq)]
pub struct ZoneEvent {
    /// Type of event
    pub event_type: ZoneEventType,
    /// The player that moved
    pub player: PlayerId,
    /// Zone name
    pub zone: String,
    /// Arena the zone is bound to
    pub arena: ArenaId,
    /// Player position when the change was observed
    pub position: Vec3,
}

impl ZoneEvent {
    /// Create an enter event
    pub fn enter(player: PlayerId, zone: &ZoneConfig, position: Vec3) -> Self {
        Self {
            event_type: ZoneEventType::Enter,
            player,
            zone: zone.name.clone(),
            arena: zone.arena.clone(),
            position,
        }
    }

    /// Create an exit event
    pub fn exit(player: PlayerId, zone: &ZoneConfig, position: Vec3) -> Self {
        Self {
            event_type: ZoneEventType::Exit,
            player,
            zone: zone.name.clone(),
            arena: zone.arena.clone(),
            position,
        }
    }

    /// Check if this is an enter event
    pub fn is_enter(&self) -> bool {
        self.event_type == ZoneEventType::Enter
    }

    /// Check if this is an exit event
    pub fn is_exit(&self) -> bool {
        self.event_type == ZoneEventType::Exit
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_event_creation() {
        let zone = ZoneConfig::new("Pit", Vec3::ZERO, 5.0, "pit");
        let event = ZoneEvent::enter(PlayerId(3), &zone, Vec3::ONE);

        assert!(event.is_enter());
        assert!(!event.is_exit());
        assert_eq!(event.zone, "Pit");
        assert_eq!(event.arena, ArenaId::from("pit"));
    }
}
