//! The lifecycle coordinator
//!
//! Owns the authoritative "is in arena" record for every player. Every
//! transition (enter, exit, build, arena start/end) runs under one coarse
//! lock, including the fan-out to subscribers, so transitions are atomic
//! with respect to each other. `is_active` reads a lock-free mirror.
//!
//! Enter:
//! 1. no-op success if the player already has a record
//! 2. capture the snapshot (failure aborts before anything is mutated)
//! 3. clear the body (failure restores the snapshot and aborts)
//! 4. apply the arena profile: name prefix, blood override, spawn teleport
//! 5. notify subscribers in registration order, best-effort
//! 6. commit the record
//!
//! Exit is the mirror image: subscribers first, while the record still
//! exists, then restore, then drop the record. A failed restore is logged
//! and the record is dropped anyway so nobody is trapped in arena mode.

use crate::events::{LifecycleEvent, LifecycleEvents};
use crate::rules::ArenaRuleBook;
use crate::state::{
    ArenaState, BuildingEventKind, LifecycleStats, Placement, PlayerLifecycleRecord, TransitionKind,
};
use crate::subscriber::{notify, BuildContext, LifecycleSubscriber, PlayerContext, SubscriberId};
use arena_core::{ArenaId, BuildingId, Clock, EntityRef, PlayerId, Quat, Timestamp, Vec3};
use arena_host::{GameHost, GameHostExt, HostResult, Identity};
use arena_snapshot::{ClearStrategy, SnapshotStore};
use dashmap::DashMap;
use parking_lot::Mutex;
use std::collections::HashMap;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;

/// Snapshot context used for arena sessions
pub const DEFAULT_CONTEXT: &str = "practice";

/// Coordinator tunables
#[derive(Debug, Clone, PartialEq)]
pub struct CoordinatorSettings {
    /// Snapshot context label for arena sessions
    pub context: String,
    /// How a body is emptied on entry
    pub clear_strategy: ClearStrategy,
}

impl Default for CoordinatorSettings {
    fn default() -> Self {
        Self {
            context: DEFAULT_CONTEXT.to_string(),
            clear_strategy: ClearStrategy::default(),
        }
    }
}

struct SubscriberEntry {
    id: SubscriberId,
    subscriber: Arc<dyn LifecycleSubscriber>,
}

#[derive(Default)]
struct CoordinatorState {
    records: HashMap<PlayerId, PlayerLifecycleRecord>,
    arenas: HashMap<ArenaId, ArenaState>,
    subscribers: Vec<SubscriberEntry>,
    stats: LifecycleStats,
    shut_down: bool,
}

impl CoordinatorState {
    /// Notify every subscriber in order, counting failures
    fn broadcast<F>(&mut self, callback: &str, f: F) -> Vec<bool>
    where
        F: Fn(&dyn LifecycleSubscriber) -> bool,
    {
        let results: Vec<bool> = self
            .subscribers
            .iter()
            .map(|entry| notify(entry.subscriber.as_ref(), callback, &f))
            .collect();
        self.stats.subscriber_failures += results.iter().filter(|ok| !**ok).count() as u64;
        results
    }
}

/// Serializes every arena transition
pub struct LifecycleCoordinator {
    host: Arc<dyn GameHost>,
    snapshots: Arc<SnapshotStore>,
    clock: Arc<dyn Clock>,
    rules: Arc<ArenaRuleBook>,
    settings: CoordinatorSettings,
    state: Mutex<CoordinatorState>,
    /// Lock-free mirror of `state.records` for queries
    active: DashMap<PlayerId, ArenaId>,
    events: LifecycleEvents,
    next_subscriber: AtomicU64,
    next_building: AtomicU64,
}

impl LifecycleCoordinator {
    pub fn new(
        host: Arc<dyn GameHost>,
        snapshots: Arc<SnapshotStore>,
        clock: Arc<dyn Clock>,
        rules: Arc<ArenaRuleBook>,
        settings: CoordinatorSettings,
    ) -> Self {
        Self {
            host,
            snapshots,
            clock,
            rules,
            settings,
            state: Mutex::new(CoordinatorState::default()),
            active: DashMap::new(),
            events: LifecycleEvents::new(),
            next_subscriber: AtomicU64::new(1),
            next_building: AtomicU64::new(1),
        }
    }

    /// Snapshot context label for arena sessions
    pub fn context(&self) -> &str {
        &self.settings.context
    }

    pub fn events(&self) -> &LifecycleEvents {
        &self.events
    }

    pub fn host(&self) -> &Arc<dyn GameHost> {
        &self.host
    }

    pub fn snapshots(&self) -> &Arc<SnapshotStore> {
        &self.snapshots
    }

    pub fn rules(&self) -> &ArenaRuleBook {
        &self.rules
    }

    // ------------------------------------------------------------------
    // Subscribers
    // ------------------------------------------------------------------

    /// Append a subscriber; callbacks run in registration order
    pub fn register(&self, subscriber: Arc<dyn LifecycleSubscriber>) -> SubscriberId {
        let id = SubscriberId(self.next_subscriber.fetch_add(1, Ordering::Relaxed));
        let mut state = self.state.lock();
        log::debug!("Registered lifecycle subscriber '{}' as {}", subscriber.name(), id);
        state.subscribers.push(SubscriberEntry { id, subscriber });
        id
    }

    /// Remove a subscriber; false if the id is unknown
    pub fn unregister(&self, id: SubscriberId) -> bool {
        let mut state = self.state.lock();
        let before = state.subscribers.len();
        state.subscribers.retain(|entry| entry.id != id);
        before != state.subscribers.len()
    }

    /// Names of registered subscribers in call order
    pub fn subscriber_names(&self) -> Vec<String> {
        self.state
            .lock()
            .subscribers
            .iter()
            .map(|entry| entry.subscriber.name().to_string())
            .collect()
    }

    // ------------------------------------------------------------------
    // Player transitions
    // ------------------------------------------------------------------

    /// Move a player into arena mode. Already being in arena mode is a
    /// successful no-op.
    pub fn request_enter(&self, player: PlayerId, arena: &ArenaId) -> bool {
        let mut notifications = Vec::new();
        let entered = {
            let mut state = self.state.lock();
            state.stats.enter_requests += 1;
            self.enter_locked(&mut state, player, arena, &mut notifications)
        };
        self.publish_all(notifications);
        entered
    }

    fn enter_locked(
        &self,
        state: &mut CoordinatorState,
        player: PlayerId,
        arena: &ArenaId,
        notifications: &mut Vec<LifecycleEvent>,
    ) -> bool {
        if let Some(record) = state.records.get(&player) {
            state.stats.noop_requests += 1;
            log::debug!(
                "Player {} already in arena {}, ignoring enter for {}",
                player,
                record.arena,
                arena
            );
            return true;
        }
        if state.shut_down {
            log::warn!("Refusing enter for player {}: coordinator is shut down", player);
            return false;
        }
        if arena.is_empty() {
            log::warn!("Refusing enter for player {}: empty arena id", player);
            return false;
        }
        let Some(handles) = self.host.find_player(player) else {
            log::warn!("Refusing enter for player {}: not connected", player);
            return false;
        };
        let body = handles.character;
        let original_position = match self.host.position(body) {
            Ok(position) => position,
            Err(err) => {
                state.stats.capture_failures += 1;
                log::error!("Cannot read position of player {} body {}: {}", player, body, err);
                return false;
            }
        };

        let now = self.clock.now();
        self.ensure_started(state, arena, now, notifications);

        let context = self.settings.context.as_str();
        if !self.snapshots.capture(player, context, body) {
            state.stats.capture_failures += 1;
            return false;
        }
        if !self.snapshots.clear(player, context, &self.settings.clear_strategy) {
            if !self.snapshots.restore(player, context) {
                state.stats.restore_failures += 1;
                log::error!("Rollback after failed clear left player {} unrestored", player);
            }
            return false;
        }

        let position = match self.apply_arena_profile(body, arena) {
            Ok(spawn) => spawn,
            Err(err) => {
                log::warn!("Arena profile for player {} only partly applied: {}", player, err);
                self.host.position(body).unwrap_or(original_position)
            }
        };

        let ctx = PlayerContext {
            player,
            arena: arena.clone(),
            body,
            session: handles.user,
            position,
        };
        let results = state.broadcast("on_player_enter", |s| s.on_player_enter(&ctx));
        let failed = results.iter().filter(|ok| !**ok).count();
        if failed > 0 {
            log::warn!(
                "Player {} entered {} with {} subscriber failure(s)",
                player,
                arena,
                failed
            );
        }

        state.records.insert(
            player,
            PlayerLifecycleRecord {
                player,
                arena: arena.clone(),
                body,
                session: handles.user,
                entered_at: now,
                original_position,
            },
        );
        if let Some(arena_state) = state.arenas.get_mut(arena) {
            arena_state.present.insert(player);
            arena_state.log_transition(player, TransitionKind::Entered, now);
        }
        self.active.insert(player, arena.clone());
        state.stats.enters += 1;

        log::info!("Player {} entered arena {}", player, arena);
        notifications.push(LifecycleEvent::PlayerEnteredArena {
            player,
            arena: arena.clone(),
        });
        true
    }

    fn apply_arena_profile(&self, body: EntityRef, arena: &ArenaId) -> HostResult<Vec3> {
        let rules = self.rules.get(arena);
        self.host.update::<Identity, _>(body, |identity| {
            if !rules.name_prefix.is_empty() && !identity.display_name.starts_with(&rules.name_prefix) {
                identity.display_name = format!("{}{}", rules.name_prefix, identity.display_name);
            }
            if let Some(blood) = &rules.blood_type {
                identity.blood_type = blood.clone();
                identity.blood_quality = 100.0;
            }
        })?;
        let spawn = rules.spawn_point();
        self.host.set_position(body, spawn)?;
        Ok(spawn)
    }

    /// Move a player back to world mode. Not being in arena mode, or being
    /// in a different arena than `arena`, is a successful no-op.
    pub fn request_exit(&self, player: PlayerId, arena: &ArenaId) -> bool {
        let mut notifications = Vec::new();
        {
            let mut state = self.state.lock();
            state.stats.exit_requests += 1;
            self.exit_locked(&mut state, player, Some(arena), &mut notifications);
        }
        self.publish_all(notifications);
        true
    }

    /// Returns true if a record was removed
    fn exit_locked(
        &self,
        state: &mut CoordinatorState,
        player: PlayerId,
        expected: Option<&ArenaId>,
        notifications: &mut Vec<LifecycleEvent>,
    ) -> bool {
        let Some(record) = state.records.get(&player).cloned() else {
            state.stats.noop_requests += 1;
            log::debug!("Player {} is not in an arena, ignoring exit", player);
            return false;
        };
        if let Some(expected) = expected {
            if *expected != record.arena {
                state.stats.noop_requests += 1;
                log::debug!(
                    "Player {} is in {}, ignoring exit for {}",
                    player,
                    record.arena,
                    expected
                );
                return false;
            }
        }

        let now = self.clock.now();
        let ctx = PlayerContext {
            player,
            arena: record.arena.clone(),
            body: record.body,
            session: record.session,
            position: self.host.position(record.body).unwrap_or(record.original_position),
        };
        let results = state.broadcast("on_player_exit", |s| s.on_player_exit(&ctx));
        let failed = results.iter().filter(|ok| !**ok).count();
        if failed > 0 {
            log::warn!(
                "Player {} left {} with {} subscriber failure(s)",
                player,
                record.arena,
                failed
            );
        }

        if !self.snapshots.restore(player, &self.settings.context) {
            state.stats.restore_failures += 1;
            if let Err(err) = self.host.set_position(record.body, record.original_position) {
                log::error!("Could not return player {} to {:?}: {}", player, record.original_position, err);
            }
        }

        state.records.remove(&player);
        self.active.remove(&player);
        if let Some(arena_state) = state.arenas.get_mut(&record.arena) {
            arena_state.present.remove(&player);
            arena_state.clear_placements_of(player, now);
            arena_state.log_transition(player, TransitionKind::Exited, now);
        }
        state.stats.exits += 1;

        log::info!("Player {} exited arena {}", player, record.arena);
        notifications.push(LifecycleEvent::PlayerExitedArena {
            player,
            arena: record.arena,
        });
        true
    }

    // ------------------------------------------------------------------
    // Arena lifecycle
    // ------------------------------------------------------------------

    /// Start an arena. Starting an active arena is a no-op.
    pub fn start_arena(&self, arena: &ArenaId) -> bool {
        if arena.is_empty() {
            return false;
        }
        let mut notifications = Vec::new();
        {
            let mut state = self.state.lock();
            if state.shut_down {
                log::warn!("Refusing to start arena {}: coordinator is shut down", arena);
                return false;
            }
            let now = self.clock.now();
            self.ensure_started(&mut state, arena, now, &mut notifications);
        }
        self.publish_all(notifications);
        true
    }

    /// Create the arena if needed and start it if inactive
    fn ensure_started(
        &self,
        state: &mut CoordinatorState,
        arena: &ArenaId,
        now: Timestamp,
        notifications: &mut Vec<LifecycleEvent>,
    ) {
        let arena_state = state
            .arenas
            .entry(arena.clone())
            .or_insert_with(|| ArenaState::new(arena.clone(), now));
        if arena_state.active {
            return;
        }
        arena_state.start(now);
        state.broadcast("on_arena_start", |s| s.on_arena_start(arena));
        log::info!("Arena {} started", arena);
        notifications.push(LifecycleEvent::ArenaStarted(arena.clone()));
    }

    /// End an arena and force every present player out
    pub fn end_arena(&self, arena: &ArenaId) -> bool {
        let mut notifications = Vec::new();
        {
            let mut state = self.state.lock();
            self.end_locked(&mut state, arena, &mut notifications);
        }
        self.publish_all(notifications);
        true
    }

    fn end_locked(&self, state: &mut CoordinatorState, arena: &ArenaId, notifications: &mut Vec<LifecycleEvent>) {
        let present: Vec<PlayerId> = match state.arenas.get(arena) {
            Some(arena_state) if arena_state.active => arena_state.present.iter().copied().collect(),
            _ => {
                log::debug!("Arena {} is not active, ignoring end", arena);
                return;
            }
        };

        state.broadcast("on_arena_end", |s| s.on_arena_end(arena));
        for player in present {
            state.stats.exit_requests += 1;
            self.exit_locked(state, player, Some(arena), notifications);
        }

        let now = self.clock.now();
        if let Some(arena_state) = state.arenas.get_mut(arena) {
            arena_state.end(now);
        }
        log::info!("Arena {} ended", arena);
        notifications.push(LifecycleEvent::ArenaEnded(arena.clone()));
    }

    /// End every active arena and refuse further entries
    pub fn shutdown(&self) {
        let mut notifications = Vec::new();
        {
            let mut state = self.state.lock();
            if state.shut_down {
                return;
            }
            state.shut_down = true;
            let mut active: Vec<ArenaId> = state
                .arenas
                .values()
                .filter(|arena| arena.active)
                .map(|arena| arena.id.clone())
                .collect();
            active.sort();
            for arena in active {
                self.end_locked(&mut state, &arena, &mut notifications);
            }
            let stragglers: Vec<PlayerId> = state.records.keys().copied().collect();
            for player in stragglers {
                self.exit_locked(&mut state, player, None, &mut notifications);
            }
            log::info!("Lifecycle coordinator shut down: {:?}", state.stats);
        }
        self.publish_all(notifications);
    }

    pub fn is_shut_down(&self) -> bool {
        self.state.lock().shut_down
    }

    // ------------------------------------------------------------------
    // Building
    // ------------------------------------------------------------------

    /// Ask subscribers to accept a new structure. Returns its id if every
    /// subscriber accepted.
    pub fn begin_build(
        &self,
        player: PlayerId,
        arena: &ArenaId,
        kind: &str,
        position: Vec3,
        rotation: Quat,
    ) -> Option<BuildingId> {
        let mut state = self.state.lock();
        let body = match state.records.get(&player) {
            Some(record) if record.arena == *arena => record.body,
            _ => {
                log::warn!("Player {} cannot build in {}: not in that arena", player, arena);
                return None;
            }
        };

        let building = BuildingId(self.next_building.fetch_add(1, Ordering::Relaxed));
        let ctx = BuildContext {
            building,
            player,
            arena: arena.clone(),
            body,
            kind: kind.to_string(),
            position,
            rotation,
            forced: false,
        };
        let results = state.broadcast("on_build_start", |s| s.on_build_start(&ctx));
        if results.iter().any(|ok| !ok) {
            let forced = BuildContext {
                forced: true,
                ..ctx.clone()
            };
            let accepted: Vec<Arc<dyn LifecycleSubscriber>> = state
                .subscribers
                .iter()
                .zip(&results)
                .filter(|(_, ok)| **ok)
                .map(|(entry, _)| entry.subscriber.clone())
                .collect();
            for subscriber in accepted {
                notify(subscriber.as_ref(), "on_build_destroy", |s| s.on_build_destroy(&forced));
            }
            log::debug!("Build of {} by player {} in {} rejected", kind, player, arena);
            return None;
        }

        let now = self.clock.now();
        if let Some(arena_state) = state.arenas.get_mut(arena) {
            arena_state.placements.insert(
                building,
                Placement {
                    owner: player,
                    kind: kind.to_string(),
                    position,
                    rotation,
                },
            );
            arena_state.log_building(building, player, kind, BuildingEventKind::Started, now);
        }
        log::debug!("Player {} started {} {} in {}", player, kind, building, arena);
        Some(building)
    }

    /// Finish a structure. All subscribers must accept.
    pub fn complete_build(&self, player: PlayerId, arena: &ArenaId, building: BuildingId) -> bool {
        self.build_transition(player, arena, building, BuildingEventKind::Completed)
    }

    /// Tear down a structure at its owner's request. All subscribers must
    /// accept.
    pub fn destroy_build(&self, player: PlayerId, arena: &ArenaId, building: BuildingId) -> bool {
        self.build_transition(player, arena, building, BuildingEventKind::Destroyed)
    }

    fn build_transition(
        &self,
        player: PlayerId,
        arena: &ArenaId,
        building: BuildingId,
        event: BuildingEventKind,
    ) -> bool {
        let mut state = self.state.lock();
        let body = match state.records.get(&player) {
            Some(record) if record.arena == *arena => record.body,
            _ => {
                log::warn!("Player {} is not in {}, ignoring {:?} of {}", player, arena, event, building);
                return false;
            }
        };
        let Some(placement) = state
            .arenas
            .get(arena)
            .and_then(|arena_state| arena_state.placements.get(&building))
            .cloned()
        else {
            log::warn!("Unknown structure {} in {}", building, arena);
            return false;
        };
        if placement.owner != player {
            log::warn!("Player {} does not own {}", player, building);
            return false;
        }

        let ctx = BuildContext {
            building,
            player,
            arena: arena.clone(),
            body,
            kind: placement.kind.clone(),
            position: placement.position,
            rotation: placement.rotation,
            forced: false,
        };
        let results = match event {
            BuildingEventKind::Completed => state.broadcast("on_build_complete", |s| s.on_build_complete(&ctx)),
            _ => state.broadcast("on_build_destroy", |s| s.on_build_destroy(&ctx)),
        };
        if results.iter().any(|ok| !ok) {
            return false;
        }

        let now = self.clock.now();
        if let Some(arena_state) = state.arenas.get_mut(arena) {
            if event == BuildingEventKind::Destroyed {
                arena_state.placements.remove(&building);
            }
            arena_state.log_building(building, player, &placement.kind, event, now);
        }
        true
    }

    // ------------------------------------------------------------------
    // Queries
    // ------------------------------------------------------------------

    /// Whether the player is in arena mode
    pub fn is_active(&self, player: PlayerId) -> bool {
        self.active.contains_key(&player)
    }

    /// Arena the player is in
    pub fn active_arena(&self, player: PlayerId) -> Option<ArenaId> {
        self.active.get(&player).map(|entry| entry.value().clone())
    }

    /// Number of players in arena mode
    pub fn active_count(&self) -> usize {
        self.active.len()
    }

    pub fn player_record(&self, player: PlayerId) -> Option<PlayerLifecycleRecord> {
        self.state.lock().records.get(&player).cloned()
    }

    pub(crate) fn has_record(&self, player: PlayerId) -> bool {
        self.state.lock().records.contains_key(&player)
    }

    pub fn arena_state(&self, arena: &ArenaId) -> Option<ArenaState> {
        self.state.lock().arenas.get(arena).cloned()
    }

    /// Players present in an arena, sorted
    pub fn active_players(&self, arena: &ArenaId) -> Vec<PlayerId> {
        self.state
            .lock()
            .arenas
            .get(arena)
            .map(|arena_state| arena_state.present.iter().copied().collect())
            .unwrap_or_default()
    }

    /// Active arenas, sorted
    pub fn active_arenas(&self) -> Vec<ArenaId> {
        let mut arenas: Vec<ArenaId> = self
            .state
            .lock()
            .arenas
            .values()
            .filter(|arena| arena.active)
            .map(|arena| arena.id.clone())
            .collect();
        arenas.sort();
        arenas
    }

    pub fn stats(&self) -> LifecycleStats {
        self.state.lock().stats.clone()
    }

    fn publish_all(&self, notifications: Vec<LifecycleEvent>) {
        for event in notifications {
            self.events.publish(event);
        }
    }
}
