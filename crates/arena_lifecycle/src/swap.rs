//! Dual-character swap
//!
//! Some players own a second, pre-provisioned body for arena play. Swapping
//! parks one body off-map and hands control to the other. The normal body's
//! belongings are captured under the `"normal"` snapshot context before it
//! is parked and put back when the player swaps home.

use crate::coordinator::LifecycleCoordinator;
use arena_core::{ArenaId, Clock, EntityRef, PlayerId, Timestamp, Vec3};
use arena_host::{Controller, GameHost, GameHostExt, Identity, Session};
use arena_snapshot::{ClearStrategy, SnapshotResult, SnapshotStore};
use parking_lot::Mutex;
use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::sync::Arc;

/// Snapshot context for the parked normal body
pub const NORMAL_CONTEXT: &str = "normal";

/// Which body a player drives
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum CharacterMode {
    NormalActive,
    ArenaActive,
}

/// Swap tunables
#[derive(Debug, Clone, PartialEq)]
pub struct SwapSettings {
    /// Arena entered on swap
    pub arena: ArenaId,
    /// Where the arena body appears
    pub arena_spawn: Vec3,
    /// Where parked bodies are kept
    pub frozen_position: Vec3,
    pub arena_blood_type: String,
}

impl Default for SwapSettings {
    fn default() -> Self {
        Self {
            arena: ArenaId::new("main_arena"),
            arena_spawn: Vec3::new(-1000.0, 5.0, -500.0),
            frozen_position: Vec3::new(0.0, -1000.0, 0.0),
            arena_blood_type: "Rogue".to_string(),
        }
    }
}

/// Per-player pair of bodies
#[derive(Debug, Clone, PartialEq)]
pub struct DualCharacterState {
    pub normal: EntityRef,
    pub arena: EntityRef,
    pub mode: CharacterMode,
    /// Where the normal body stood before it was parked
    pub last_normal_position: Vec3,
    pub last_swap: Option<Timestamp>,
    pub arena_blood_type: String,
    pub initialized: bool,
}

/// Swaps players between their normal and arena bodies
pub struct CharacterSwap {
    host: Arc<dyn GameHost>,
    snapshots: Arc<SnapshotStore>,
    coordinator: Arc<LifecycleCoordinator>,
    clock: Arc<dyn Clock>,
    settings: SwapSettings,
    pairs: Mutex<HashMap<PlayerId, DualCharacterState>>,
}

impl CharacterSwap {
    pub fn new(
        host: Arc<dyn GameHost>,
        snapshots: Arc<SnapshotStore>,
        coordinator: Arc<LifecycleCoordinator>,
        clock: Arc<dyn Clock>,
        settings: SwapSettings,
    ) -> Self {
        Self {
            host,
            snapshots,
            coordinator,
            clock,
            settings,
            pairs: Mutex::new(HashMap::new()),
        }
    }

    /// Provision a body pair. The normal body starts active and the arena
    /// body parked.
    pub fn register_pair(&self, player: PlayerId, normal: EntityRef, arena: EntityRef) -> bool {
        if normal == arena || !self.host.exists(normal) || !self.host.exists(arena) {
            log::warn!("Cannot pair bodies {} and {} for player {}", normal, arena, player);
            return false;
        }
        let mut pairs = self.pairs.lock();
        if matches!(pairs.get(&player), Some(state) if state.mode == CharacterMode::ArenaActive) {
            log::warn!("Player {} is on their arena body, refusing to re-pair", player);
            return false;
        }

        let provisioned = self
            .park(arena)
            .and_then(|_| self.host.write(normal, Controller::active(player)).map_err(Into::into))
            .and_then(|_| self.host.position(normal).map_err(Into::into));
        let last_normal_position = match provisioned {
            Ok(position) => position,
            Err(err) => {
                log::error!("Provisioning body pair for player {} failed: {}", player, err);
                return false;
            }
        };

        pairs.insert(
            player,
            DualCharacterState {
                normal,
                arena,
                mode: CharacterMode::NormalActive,
                last_normal_position,
                last_swap: None,
                arena_blood_type: self.settings.arena_blood_type.clone(),
                initialized: true,
            },
        );
        log::info!("Registered body pair for player {}: normal {}, arena {}", player, normal, arena);
        true
    }

    /// Toggle between the normal and arena body
    pub fn swap_characters(&self, player: PlayerId) -> bool {
        let mut pairs = self.pairs.lock();
        let Some(state) = pairs.get_mut(&player) else {
            log::warn!("Player {} has no body pair", player);
            return false;
        };
        if !self.bodies_valid(player, state) {
            return false;
        }

        let swapped = match state.mode {
            CharacterMode::NormalActive => self.swap_to_arena(player, state),
            CharacterMode::ArenaActive => self.swap_to_normal(player, state),
        };
        if swapped {
            state.last_swap = Some(self.clock.now());
            log::info!("Player {} now on {:?}", player, state.mode);
        }
        swapped
    }

    /// Put the player in the requested mode, swapping only if needed
    pub fn force_activate(&self, player: PlayerId, to_arena: bool) -> bool {
        let wanted = if to_arena {
            CharacterMode::ArenaActive
        } else {
            CharacterMode::NormalActive
        };
        match self.active_mode(player) {
            Some(mode) if mode == wanted => true,
            Some(_) => self.swap_characters(player),
            None => false,
        }
    }

    /// Whether a swap would pass validation right now
    pub fn can_swap(&self, player: PlayerId) -> bool {
        self.pairs
            .lock()
            .get(&player)
            .map(|state| self.bodies_valid(player, state))
            .unwrap_or(false)
    }

    pub fn active_mode(&self, player: PlayerId) -> Option<CharacterMode> {
        self.pairs.lock().get(&player).map(|state| state.mode)
    }

    pub fn state(&self, player: PlayerId) -> Option<DualCharacterState> {
        self.pairs.lock().get(&player).cloned()
    }

    fn bodies_valid(&self, player: PlayerId, state: &DualCharacterState) -> bool {
        state.initialized
            && self.host.exists(state.normal)
            && self.host.exists(state.arena)
            && self.host.find_player(player).is_some()
    }

    fn swap_to_arena(&self, player: PlayerId, state: &mut DualCharacterState) -> bool {
        // the normal body would be captured already stripped for the arena
        if let Some(arena) = self.coordinator.active_arena(player) {
            log::warn!("Player {} is already in arena {} on their normal body, refusing swap", player, arena);
            return false;
        }
        let Some(handles) = self.host.find_player(player) else {
            return false;
        };
        let position = match self.host.position(state.normal) {
            Ok(position) => position,
            Err(err) => {
                log::warn!("Cannot read normal body of player {}: {}", player, err);
                return false;
            }
        };
        if !self.snapshots.capture(player, NORMAL_CONTEXT, state.normal) {
            return false;
        }

        state.last_normal_position = position;
        if let Err(err) = self.activate_arena_body(player, handles.user, state) {
            log::error!("Swap to arena body failed for player {}: {}", player, err);
            self.undo_to_normal(player, handles.user, state);
            return false;
        }

        if !self.coordinator.request_enter(player, &self.settings.arena) {
            log::warn!("Player {} could not enter {}, undoing swap", player, self.settings.arena);
            self.undo_to_normal(player, handles.user, state);
            return false;
        }

        state.mode = CharacterMode::ArenaActive;
        true
    }

    fn activate_arena_body(&self, player: PlayerId, session: EntityRef, state: &DualCharacterState) -> SnapshotResult<()> {
        self.park(state.normal)?;
        self.activate(player, session, state.arena)?;
        self.snapshots.clear_body(state.arena, &ClearStrategy::DeleteAll)?;
        self.host.update::<Identity, _>(state.arena, |identity| {
            identity.blood_type = state.arena_blood_type.clone();
            identity.blood_quality = 100.0;
        })?;
        self.host.set_position(state.arena, self.settings.arena_spawn)?;
        Ok(())
    }

    fn undo_to_normal(&self, player: PlayerId, session: EntityRef, state: &DualCharacterState) {
        if let Err(err) = self.park(state.arena) {
            log::error!("Could not park arena body of player {}: {}", player, err);
        }
        if let Err(err) = self.activate(player, session, state.normal) {
            log::error!("Could not reactivate normal body of player {}: {}", player, err);
        }
        if !self
            .snapshots
            .restore_onto(player, NORMAL_CONTEXT, Some(state.normal))
        {
            log::error!("Normal body of player {} was not restored", player);
        }
    }

    fn swap_to_normal(&self, player: PlayerId, state: &mut DualCharacterState) -> bool {
        let Some(handles) = self.host.find_player(player) else {
            return false;
        };
        self.coordinator.request_exit(player, &self.settings.arena);

        let handed_back = self
            .park(state.arena)
            .and_then(|_| self.activate(player, handles.user, state.normal));
        if let Err(err) = handed_back {
            log::error!("Swap back to normal body failed for player {}: {}", player, err);
            return false;
        }

        if !self
            .snapshots
            .restore_onto(player, NORMAL_CONTEXT, Some(state.normal))
        {
            log::error!("Normal body of player {} came back without its belongings", player);
        }
        if let Err(err) = self.host.set_position(state.normal, state.last_normal_position) {
            log::warn!("Could not return player {} to {:?}: {}", player, state.last_normal_position, err);
        }

        state.mode = CharacterMode::NormalActive;
        true
    }

    /// Strip control from a body and move it off-map
    fn park(&self, body: EntityRef) -> SnapshotResult<()> {
        self.host.write(body, Controller::frozen())?;
        self.host.set_position(body, self.settings.frozen_position)?;
        Ok(())
    }

    /// Give the player control of `body`
    fn activate(&self, player: PlayerId, session: EntityRef, body: EntityRef) -> SnapshotResult<()> {
        self.host.write(body, Controller::active(player))?;
        self.host.write(
            session,
            Session {
                player,
                character: body,
                connected: true,
            },
        )?;
        Ok(())
    }
}
