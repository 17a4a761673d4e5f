//! Authoritative lifecycle records

use arena_core::{ArenaId, BuildingId, EntityRef, PlayerId, Quat, Timestamp, Vec3};
use serde::{Deserialize, Serialize};
use std::collections::{BTreeSet, HashMap};

/// Entries kept per arena log before the oldest are dropped
pub const MAX_LOG_ENTRIES: usize = 1024;

/// One player currently in arena mode
#[derive(Debug, Clone, PartialEq)]
pub struct PlayerLifecycleRecord {
    pub player: PlayerId,
    pub arena: ArenaId,
    /// Body the player drove when entering
    pub body: EntityRef,
    /// Controlling session
    pub session: EntityRef,
    pub entered_at: Timestamp,
    /// Where the body stood before entering
    pub original_position: Vec3,
}

/// Direction of a player transition
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum TransitionKind {
    Entered,
    Exited,
}

/// Entry in an arena's transition log
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TransitionEvent {
    pub player: PlayerId,
    pub kind: TransitionKind,
    pub at: Timestamp,
}

/// What happened to a structure
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum BuildingEventKind {
    Started,
    Completed,
    Destroyed,
    /// Removed because its owner left or the arena ended
    Cleared,
}

/// Entry in an arena's building log
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct BuildingEvent {
    pub building: BuildingId,
    pub player: PlayerId,
    pub kind: String,
    pub event: BuildingEventKind,
    pub at: Timestamp,
}

/// Where a structure was started, kept so later callbacks get full context
#[derive(Debug, Clone, PartialEq)]
pub(crate) struct Placement {
    pub owner: PlayerId,
    pub kind: String,
    pub position: Vec3,
    pub rotation: Quat,
}

/// State of one arena. Created on first reference, never deleted.
#[derive(Debug, Clone, PartialEq)]
pub struct ArenaState {
    pub id: ArenaId,
    pub active: bool,
    pub created_at: Timestamp,
    pub started_at: Option<Timestamp>,
    pub ended_at: Option<Timestamp>,
    /// Players currently inside
    pub present: BTreeSet<PlayerId>,
    pub transitions: Vec<TransitionEvent>,
    pub building_events: Vec<BuildingEvent>,
    pub(crate) placements: HashMap<BuildingId, Placement>,
}

impl ArenaState {
    pub(crate) fn new(id: ArenaId, now: Timestamp) -> Self {
        Self {
            id,
            active: false,
            created_at: now,
            started_at: None,
            ended_at: None,
            present: BTreeSet::new(),
            transitions: Vec::new(),
            building_events: Vec::new(),
            placements: HashMap::new(),
        }
    }

    pub(crate) fn start(&mut self, now: Timestamp) {
        self.active = true;
        self.started_at = Some(now);
        self.ended_at = None;
    }

    pub(crate) fn end(&mut self, now: Timestamp) {
        self.active = false;
        self.ended_at = Some(now);
    }

    pub(crate) fn log_transition(&mut self, player: PlayerId, kind: TransitionKind, at: Timestamp) {
        push_bounded(&mut self.transitions, TransitionEvent { player, kind, at });
    }

    pub(crate) fn log_building(
        &mut self,
        building: BuildingId,
        player: PlayerId,
        kind: &str,
        event: BuildingEventKind,
        at: Timestamp,
    ) {
        push_bounded(
            &mut self.building_events,
            BuildingEvent {
                building,
                player,
                kind: kind.to_string(),
                event,
                at,
            },
        );
    }

    /// Drop every placement owned by `player`, logging each as cleared
    pub(crate) fn clear_placements_of(&mut self, player: PlayerId, at: Timestamp) {
        let mut owned: Vec<(BuildingId, String)> = self
            .placements
            .iter()
            .filter(|(_, placement)| placement.owner == player)
            .map(|(id, placement)| (*id, placement.kind.clone()))
            .collect();
        owned.sort();
        for (id, kind) in owned {
            self.placements.remove(&id);
            self.log_building(id, player, &kind, BuildingEventKind::Cleared, at);
        }
    }

    /// Number of structures started and not yet destroyed or cleared
    pub fn live_structures(&self) -> usize {
        self.placements.len()
    }
}

fn push_bounded<T>(log: &mut Vec<T>, entry: T) {
    if log.len() >= MAX_LOG_ENTRIES {
        log.remove(0);
    }
    log.push(entry);
}

/// Coordinator counters
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct LifecycleStats {
    pub enter_requests: u64,
    pub exit_requests: u64,
    /// Committed entries
    pub enters: u64,
    /// Committed exits
    pub exits: u64,
    /// Requests that found the player already in the requested state
    pub noop_requests: u64,
    pub capture_failures: u64,
    pub restore_failures: u64,
    /// Subscriber callbacks that returned false or panicked
    pub subscriber_failures: u64,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_arena_start_and_end() {
        let mut arena = ArenaState::new(ArenaId::new("main_arena"), Timestamp::from_millis(5));
        assert!(!arena.active);

        arena.start(Timestamp::from_millis(10));
        assert!(arena.active);
        assert_eq!(arena.started_at, Some(Timestamp::from_millis(10)));

        arena.end(Timestamp::from_millis(20));
        assert!(!arena.active);
        assert_eq!(arena.ended_at, Some(Timestamp::from_millis(20)));

        arena.start(Timestamp::from_millis(30));
        assert_eq!(arena.ended_at, None);
        assert_eq!(arena.created_at, Timestamp::from_millis(5));
    }

    #[test]
    fn test_logs_are_bounded() {
        let mut arena = ArenaState::new(ArenaId::new("main_arena"), Timestamp::ZERO);
        for i in 0..(MAX_LOG_ENTRIES as u64 + 10) {
            arena.log_transition(PlayerId(i), TransitionKind::Entered, Timestamp::from_millis(i));
        }
        assert_eq!(arena.transitions.len(), MAX_LOG_ENTRIES);
        assert_eq!(arena.transitions[0].player, PlayerId(10));
    }

    #[test]
    fn test_clear_placements_only_touches_owner() {
        let mut arena = ArenaState::new(ArenaId::new("main_arena"), Timestamp::ZERO);
        for (id, owner) in [(1, 7), (2, 8), (3, 7)] {
            arena.placements.insert(
                BuildingId(id),
                Placement {
                    owner: PlayerId(owner),
                    kind: "wall".into(),
                    position: Vec3::ZERO,
                    rotation: Quat::IDENTITY,
                },
            );
        }

        arena.clear_placements_of(PlayerId(7), Timestamp::from_millis(3));

        assert_eq!(arena.live_structures(), 1);
        let cleared: Vec<_> = arena.building_events.iter().map(|e| e.building).collect();
        assert_eq!(cleared, vec![BuildingId(1), BuildingId(3)]);
        assert!(arena.building_events.iter().all(|e| e.event == BuildingEventKind::Cleared));
    }
}
