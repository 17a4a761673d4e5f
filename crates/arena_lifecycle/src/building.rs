//! Structures built during arena sessions
//!
//! The tracker owns every structure a player builds inside an arena and
//! guarantees none survives the session: when the owner exits or the arena
//! ends, in-progress builds are cancelled and completed structures are
//! destroyed in the host. A structure that cannot be destroyed is an error,
//! not a warning: it is kept aside as stranded and retried on the next exit
//! or arena end that covers it.

use crate::rules::{self, ArenaRuleBook};
use crate::subscriber::{BuildContext, LifecycleSubscriber, PlayerContext};
use arena_core::{ArenaId, BuildingId, Clock, EntityRef, PlayerId, Quat, Timestamp, Vec3};
use arena_host::{GameHost, GameHostExt, HostResult, Structure};
use parking_lot::RwLock;
use serde::{Deserialize, Serialize};
use std::collections::{HashMap, HashSet};
use std::sync::Arc;
use std::time::Duration;

/// Lifecycle status of a structure
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum BuildingStatus {
    Building,
    Completed,
    Destroyed,
}

/// One structure owned by the tracker
#[derive(Debug, Clone, PartialEq)]
pub struct BuildingRecord {
    pub id: BuildingId,
    pub kind: String,
    pub owner: PlayerId,
    pub arena: ArenaId,
    /// Host entity, present once completed
    pub entity: Option<EntityRef>,
    pub status: BuildingStatus,
    pub position: Vec3,
    pub rotation: Quat,
    pub started_at: Timestamp,
    pub completed_at: Option<Timestamp>,
}

/// What a player may do with structures in an arena
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct BuildPermissions {
    pub build: bool,
    pub destroy: bool,
    pub modify: bool,
}

impl Default for BuildPermissions {
    fn default() -> Self {
        Self {
            build: true,
            destroy: true,
            modify: true,
        }
    }
}

impl BuildPermissions {
    /// No permissions at all
    pub fn none() -> Self {
        Self {
            build: false,
            destroy: false,
            modify: false,
        }
    }
}

#[derive(Debug, Default)]
struct TrackerState {
    records: HashMap<BuildingId, BuildingRecord>,
    /// Completed structures whose entity survived a teardown
    stranded: HashMap<BuildingId, BuildingRecord>,
    permissions: HashMap<(PlayerId, ArenaId), BuildPermissions>,
    closed: HashSet<ArenaId>,
}

impl TrackerState {
    fn live_count(&self, player: PlayerId, arena: &ArenaId) -> usize {
        self.records
            .values()
            .filter(|r| r.owner == player && r.arena == *arena && r.status != BuildingStatus::Destroyed)
            .count()
    }

    /// Remove records matching `pred`, destroying their entities. Stranded
    /// structures matching `pred` are retried.
    /// Returns false if any entity could not be destroyed.
    fn remove_where<H, P>(&mut self, host: &H, pred: P) -> bool
    where
        H: GameHost + ?Sized,
        P: Fn(&BuildingRecord) -> bool,
    {
        let mut doomed: Vec<BuildingId> = self
            .records
            .values()
            .chain(self.stranded.values())
            .filter(|r| pred(r))
            .map(|r| r.id)
            .collect();
        doomed.sort();

        let mut clean = true;
        for id in doomed {
            let Some(record) = self.records.remove(&id).or_else(|| self.stranded.remove(&id)) else {
                continue;
            };
            match (record.status, record.entity) {
                (BuildingStatus::Completed, Some(entity)) if host.exists(entity) => {
                    if let Err(err) = host.destroy(entity) {
                        log::error!(
                            "Structure {} ({}) of player {} left standing in {}: {}",
                            record.id,
                            record.kind,
                            record.owner,
                            record.arena,
                            err
                        );
                        self.stranded.insert(id, record);
                        clean = false;
                    }
                }
                (BuildingStatus::Building, _) => {
                    log::debug!("Cancelled {} ({}) of player {}", record.id, record.kind, record.owner);
                }
                _ => {}
            }
        }
        clean
    }
}

/// Owns arena structures and cleans them up on exit
pub struct BuildingTracker {
    host: Arc<dyn GameHost>,
    clock: Arc<dyn Clock>,
    rules: Arc<ArenaRuleBook>,
    state: RwLock<TrackerState>,
}

impl BuildingTracker {
    pub fn new(host: Arc<dyn GameHost>, clock: Arc<dyn Clock>, rules: Arc<ArenaRuleBook>) -> Self {
        Self {
            host,
            clock,
            rules,
            state: RwLock::new(TrackerState::default()),
        }
    }

    /// Override a player's permissions in an arena
    pub fn set_permissions(&self, player: PlayerId, arena: &ArenaId, permissions: BuildPermissions) {
        self.state.write().permissions.insert((player, arena.clone()), permissions);
    }

    /// Current permissions; none if the player is not in the arena
    pub fn permissions(&self, player: PlayerId, arena: &ArenaId) -> BuildPermissions {
        self.state
            .read()
            .permissions
            .get(&(player, arena.clone()))
            .copied()
            .unwrap_or_else(BuildPermissions::none)
    }

    /// Records owned by a player in an arena, sorted by id
    pub fn player_buildings(&self, player: PlayerId, arena: &ArenaId) -> Vec<BuildingRecord> {
        let mut records: Vec<BuildingRecord> = self
            .state
            .read()
            .records
            .values()
            .filter(|r| r.owner == player && r.arena == *arena)
            .cloned()
            .collect();
        records.sort_by_key(|r| r.id);
        records
    }

    /// Every record in an arena, sorted by id
    pub fn arena_buildings(&self, arena: &ArenaId) -> Vec<BuildingRecord> {
        let mut records: Vec<BuildingRecord> = self
            .state
            .read()
            .records
            .values()
            .filter(|r| r.arena == *arena)
            .cloned()
            .collect();
        records.sort_by_key(|r| r.id);
        records
    }

    /// Structures counted against the player's quota
    pub fn player_building_count(&self, player: PlayerId, arena: &ArenaId) -> usize {
        self.state.read().live_count(player, arena)
    }

    /// Whether the player may start another `kind` right now
    pub fn can_player_build(&self, player: PlayerId, arena: &ArenaId, kind: &str) -> bool {
        let state = self.state.read();
        self.check_build(&state, player, arena, kind).is_ok()
    }

    /// Time a `kind` takes to build
    pub fn build_time(&self, kind: &str) -> Duration {
        rules::build_time(kind)
    }

    pub fn get(&self, id: BuildingId) -> Option<BuildingRecord> {
        self.state.read().records.get(&id).cloned()
    }

    pub fn total_count(&self) -> usize {
        self.state.read().records.len()
    }

    /// Structures whose teardown failed and still stand in the host, sorted
    /// by id
    pub fn stranded(&self) -> Vec<BuildingRecord> {
        let mut records: Vec<BuildingRecord> = self.state.read().stranded.values().cloned().collect();
        records.sort_by_key(|r| r.id);
        records
    }

    fn check_build(&self, state: &TrackerState, player: PlayerId, arena: &ArenaId, kind: &str) -> Result<(), String> {
        if state.closed.contains(arena) {
            return Err(format!("arena {} is closed", arena));
        }
        let permissions = state
            .permissions
            .get(&(player, arena.clone()))
            .copied()
            .unwrap_or_else(BuildPermissions::none);
        if !permissions.build {
            return Err("no build permission".to_string());
        }
        let rules = self.rules.get(arena);
        if !rules.allows(kind) {
            return Err(format!("{} is not allowed in {}", kind, arena));
        }
        let count = state.live_count(player, arena);
        if count >= rules.max_structures {
            return Err(format!("quota reached ({}/{})", count, rules.max_structures));
        }
        Ok(())
    }

    fn spawn_structure(&self, record: &BuildingRecord) -> HostResult<EntityRef> {
        let entity = self.host.create_entity()?;
        let placed = self
            .host
            .write(
                entity,
                Structure {
                    kind: record.kind.clone(),
                    owner: record.owner,
                    arena: record.arena.clone(),
                    max_health: rules::max_health(&record.kind),
                },
            )
            .and_then(|_| self.host.set_position(entity, record.position))
            .and_then(|_| self.host.set_rotation(entity, record.rotation));
        if let Err(err) = placed {
            let _ = self.host.destroy(entity);
            return Err(err);
        }
        Ok(entity)
    }
}

impl LifecycleSubscriber for BuildingTracker {
    fn name(&self) -> &str {
        "building_tracker"
    }

    fn on_player_enter(&self, ctx: &PlayerContext) -> bool {
        self.state
            .write()
            .permissions
            .entry((ctx.player, ctx.arena.clone()))
            .or_default();
        true
    }

    fn on_player_exit(&self, ctx: &PlayerContext) -> bool {
        let mut state = self.state.write();
        state.permissions.remove(&(ctx.player, ctx.arena.clone()));
        let clean = state.remove_where(self.host.as_ref(), |r| r.owner == ctx.player && r.arena == ctx.arena);
        if clean {
            log::debug!("Cleared structures of player {} in {}", ctx.player, ctx.arena);
        }
        clean
    }

    fn on_build_start(&self, ctx: &BuildContext) -> bool {
        let mut state = self.state.write();
        if state.records.contains_key(&ctx.building) {
            return true;
        }
        if let Err(reason) = self.check_build(&state, ctx.player, &ctx.arena, &ctx.kind) {
            log::debug!("Player {} cannot build {}: {}", ctx.player, ctx.kind, reason);
            return false;
        }

        let range = self.rules.get(&ctx.arena).build_range;
        match self.host.position(ctx.body) {
            Ok(at) if at.distance(ctx.position) <= range => {}
            Ok(at) => {
                log::debug!(
                    "Player {} build spot {:?} is out of range ({:.1} > {})",
                    ctx.player,
                    ctx.position,
                    at.distance(ctx.position),
                    range
                );
                return false;
            }
            Err(err) => {
                log::warn!("Cannot locate body of player {}: {}", ctx.player, err);
                return false;
            }
        }

        state.records.insert(
            ctx.building,
            BuildingRecord {
                id: ctx.building,
                kind: ctx.kind.clone(),
                owner: ctx.player,
                arena: ctx.arena.clone(),
                entity: None,
                status: BuildingStatus::Building,
                position: ctx.position,
                rotation: ctx.rotation,
                started_at: self.clock.now(),
                completed_at: None,
            },
        );
        true
    }

    fn on_build_complete(&self, ctx: &BuildContext) -> bool {
        let mut state = self.state.write();
        let Some(record) = state.records.get(&ctx.building).cloned() else {
            log::warn!("Cannot complete unknown structure {}", ctx.building);
            return false;
        };
        match record.status {
            BuildingStatus::Completed => return true,
            BuildingStatus::Destroyed => return false,
            BuildingStatus::Building => {}
        }

        let entity = match self.spawn_structure(&record) {
            Ok(entity) => entity,
            Err(err) => {
                log::warn!("Could not place structure {}: {}", ctx.building, err);
                return false;
            }
        };
        if let Some(record) = state.records.get_mut(&ctx.building) {
            record.entity = Some(entity);
            record.status = BuildingStatus::Completed;
            record.completed_at = Some(self.clock.now());
        }
        true
    }

    fn on_build_destroy(&self, ctx: &BuildContext) -> bool {
        let mut state = self.state.write();
        let Some(record) = state.records.get(&ctx.building).cloned() else {
            return true;
        };
        if ctx.forced {
            return state.remove_where(self.host.as_ref(), |r| r.id == ctx.building);
        }
        if record.status == BuildingStatus::Destroyed {
            return true;
        }
        let allowed = state
            .permissions
            .get(&(ctx.player, ctx.arena.clone()))
            .map(|p| p.destroy)
            .unwrap_or(false);
        if !allowed || record.owner != ctx.player {
            log::debug!("Player {} may not destroy {}", ctx.player, ctx.building);
            return false;
        }

        if let Some(entity) = record.entity {
            if let Err(err) = self.host.destroy(entity) {
                log::error!("Could not destroy structure {}: {}", ctx.building, err);
                return false;
            }
        }
        if let Some(record) = state.records.get_mut(&ctx.building) {
            record.entity = None;
            record.status = BuildingStatus::Destroyed;
        }
        true
    }

    fn on_arena_start(&self, arena: &ArenaId) -> bool {
        self.state.write().closed.remove(arena);
        true
    }

    fn on_arena_end(&self, arena: &ArenaId) -> bool {
        let mut state = self.state.write();
        state.closed.insert(arena.clone());
        state.permissions.retain(|(_, a), _| a != arena);
        state.remove_where(self.host.as_ref(), |r| r.arena == *arena)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use arena_core::ManualClock;
    use arena_host::MemoryHost;

    struct Fixture {
        host: Arc<MemoryHost>,
        tracker: BuildingTracker,
        body: EntityRef,
    }

    fn fixture() -> Fixture {
        let host = Arc::new(MemoryHost::new());
        let clock = Arc::new(ManualClock::new(Timestamp::ZERO));
        let tracker = BuildingTracker::new(host.clone(), clock, Arc::new(ArenaRuleBook::default()));
        let body = host.spawn_body("Builder", Vec3::ZERO).unwrap();
        Fixture { host, tracker, body }
    }

    fn player_ctx(fx: &Fixture, arena: &str) -> PlayerContext {
        PlayerContext {
            player: PlayerId(1),
            arena: ArenaId::new(arena),
            body: fx.body,
            session: fx.body,
            position: Vec3::ZERO,
        }
    }

    fn build_ctx(fx: &Fixture, id: u64, arena: &str, kind: &str, position: Vec3) -> BuildContext {
        BuildContext {
            building: BuildingId(id),
            player: PlayerId(1),
            arena: ArenaId::new(arena),
            body: fx.body,
            kind: kind.to_string(),
            position,
            rotation: Quat::IDENTITY,
            forced: false,
        }
    }

    fn build_and_complete(fx: &Fixture, id: u64, arena: &str, kind: &str) -> BuildContext {
        let ctx = build_ctx(fx, id, arena, kind, Vec3::new(2.0, 0.0, 0.0));
        assert!(fx.tracker.on_build_start(&ctx));
        assert!(fx.tracker.on_build_complete(&ctx));
        ctx
    }

    #[test]
    fn test_build_requires_entry() {
        let fx = fixture();
        let ctx = build_ctx(&fx, 1, "main_arena", "wall", Vec3::ZERO);
        assert!(!fx.tracker.on_build_start(&ctx));

        fx.tracker.on_player_enter(&player_ctx(&fx, "main_arena"));
        assert!(fx.tracker.on_build_start(&ctx));
        assert_eq!(fx.tracker.get(BuildingId(1)).unwrap().status, BuildingStatus::Building);
    }

    #[test]
    fn test_complete_spawns_structure() {
        let fx = fixture();
        fx.tracker.on_player_enter(&player_ctx(&fx, "main_arena"));
        build_and_complete(&fx, 1, "main_arena", "waygate");

        let record = fx.tracker.get(BuildingId(1)).unwrap();
        assert_eq!(record.status, BuildingStatus::Completed);
        let structure: Structure = fx.host.read(record.entity.unwrap()).unwrap();
        assert_eq!(structure.kind, "waygate");
        assert_eq!(structure.max_health, 300.0);
        assert_eq!(fx.host.position(record.entity.unwrap()).unwrap(), Vec3::new(2.0, 0.0, 0.0));
    }

    #[test]
    fn test_validation_rules() {
        let fx = fixture();
        fx.tracker.on_player_enter(&player_ctx(&fx, "pvp_arena"));

        assert!(!fx.tracker.can_player_build(PlayerId(1), &ArenaId::new("pvp_arena"), "portal"));
        assert!(!fx.tracker.on_build_start(&build_ctx(&fx, 1, "pvp_arena", "portal", Vec3::ZERO)));

        let far = build_ctx(&fx, 2, "pvp_arena", "wall", Vec3::new(11.0, 0.0, 0.0));
        assert!(!fx.tracker.on_build_start(&far));

        fx.tracker.set_permissions(PlayerId(1), &ArenaId::new("pvp_arena"), BuildPermissions::none());
        assert!(!fx.tracker.on_build_start(&build_ctx(&fx, 3, "pvp_arena", "wall", Vec3::ZERO)));
    }

    #[test]
    fn test_quota_ignores_destroyed() {
        let fx = fixture();
        let arena = ArenaId::new("pvp_arena");
        fx.tracker.on_player_enter(&player_ctx(&fx, "pvp_arena"));
        for id in 1..=10 {
            build_and_complete(&fx, id, "pvp_arena", "floor");
        }
        assert_eq!(fx.tracker.player_building_count(PlayerId(1), &arena), 10);
        assert!(!fx.tracker.can_player_build(PlayerId(1), &arena, "floor"));

        let ctx = build_ctx(&fx, 4, "pvp_arena", "floor", Vec3::ZERO);
        assert!(fx.tracker.on_build_destroy(&ctx));
        assert_eq!(fx.tracker.get(BuildingId(4)).unwrap().status, BuildingStatus::Destroyed);
        assert_eq!(fx.tracker.player_building_count(PlayerId(1), &arena), 9);
        assert!(fx.tracker.can_player_build(PlayerId(1), &arena, "floor"));
    }

    #[test]
    fn test_exit_clears_everything() {
        let fx = fixture();
        let arena = ArenaId::new("main_arena");
        fx.tracker.on_player_enter(&player_ctx(&fx, "main_arena"));
        let entities_before = fx.host.entity_count();
        build_and_complete(&fx, 1, "main_arena", "wall");
        build_and_complete(&fx, 2, "main_arena", "portal");
        assert!(fx.tracker.on_build_start(&build_ctx(&fx, 3, "main_arena", "glow", Vec3::ZERO)));

        assert!(fx.tracker.on_player_exit(&player_ctx(&fx, "main_arena")));

        assert!(fx.tracker.player_buildings(PlayerId(1), &arena).is_empty());
        assert_eq!(fx.host.entity_count(), entities_before);
        assert!(!fx.tracker.can_player_build(PlayerId(1), &arena, "wall"));
    }

    #[test]
    fn test_undestroyable_structure_fails_exit() {
        let fx = fixture();
        fx.tracker.on_player_enter(&player_ctx(&fx, "main_arena"));
        build_and_complete(&fx, 1, "main_arena", "wall");
        let entity = fx.tracker.get(BuildingId(1)).unwrap().entity.unwrap();
        fx.host.fail_destroy(entity);

        assert!(!fx.tracker.on_player_exit(&player_ctx(&fx, "main_arena")));
        assert!(fx.tracker.player_buildings(PlayerId(1), &ArenaId::new("main_arena")).is_empty());
        let stranded = fx.tracker.stranded();
        assert_eq!(stranded.len(), 1);
        assert_eq!(stranded[0].status, BuildingStatus::Completed);
        assert!(fx.host.exists(entity));
    }

    #[test]
    fn test_arena_end_retries_stranded_structure() {
        let fx = fixture();
        let arena = ArenaId::new("main_arena");
        fx.tracker.on_player_enter(&player_ctx(&fx, "main_arena"));
        build_and_complete(&fx, 1, "main_arena", "wall");
        let entity = fx.tracker.get(BuildingId(1)).unwrap().entity.unwrap();
        fx.host.fail_destroy(entity);
        assert!(!fx.tracker.on_player_exit(&player_ctx(&fx, "main_arena")));

        assert!(!fx.tracker.on_arena_end(&arena));
        assert_eq!(fx.tracker.stranded().len(), 1);

        fx.host.clear_faults();
        assert!(fx.tracker.on_arena_end(&arena));
        assert!(!fx.host.exists(entity));
        assert!(fx.tracker.stranded().is_empty());
    }

    #[test]
    fn test_arena_end_closes_building() {
        let fx = fixture();
        let arena = ArenaId::new("main_arena");
        fx.tracker.on_player_enter(&player_ctx(&fx, "main_arena"));
        build_and_complete(&fx, 1, "main_arena", "wall");

        assert!(fx.tracker.on_arena_end(&arena));
        assert!(fx.tracker.arena_buildings(&arena).is_empty());
        assert!(!fx.tracker.can_player_build(PlayerId(1), &arena, "wall"));

        fx.tracker.on_arena_start(&arena);
        fx.tracker.on_player_enter(&player_ctx(&fx, "main_arena"));
        assert!(fx.tracker.can_player_build(PlayerId(1), &arena, "wall"));
    }

    #[test]
    fn test_forced_destroy_bypasses_permissions() {
        let fx = fixture();
        let arena = ArenaId::new("main_arena");
        fx.tracker.on_player_enter(&player_ctx(&fx, "main_arena"));
        let ctx = build_ctx(&fx, 1, "main_arena", "wall", Vec3::ZERO);
        fx.tracker.on_build_start(&ctx);
        fx.tracker.set_permissions(PlayerId(1), &arena, BuildPermissions::none());

        assert!(!fx.tracker.on_build_destroy(&ctx));
        let forced = BuildContext { forced: true, ..ctx };
        assert!(fx.tracker.on_build_destroy(&forced));
        assert!(fx.tracker.get(BuildingId(1)).is_none());
    }
}
