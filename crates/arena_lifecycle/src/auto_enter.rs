//! Automatic arena entry for opted-in players
//!
//! The trigger is both a lifecycle subscriber and a poller. Callbacks only
//! update the trigger's own bookkeeping; anything that needs the coordinator
//! (forced exits after an arena ends) is queued and done by the next
//! [`AutoEnterTrigger::scan`], outside the coordinator lock.
//!
//! Entry is edge-triggered: once a player leaves an arena they are disarmed
//! until they are seen outside every auto-enter zone. Exiting puts the body
//! back where it stood when it entered, which is usually inside the zone.

use crate::coordinator::LifecycleCoordinator;
use crate::subscriber::{LifecycleSubscriber, PlayerContext};
use arena_core::{ArenaId, Clock, PlayerId, Timestamp};
use arena_host::GameHost;
use arena_zones::ZoneRegistry;
use parking_lot::Mutex;
use serde::{Deserialize, Serialize};
use std::collections::{HashMap, HashSet};
use std::sync::{Arc, Weak};
use std::time::Duration;

/// Default time between two entry attempts for one player
pub const DEFAULT_COOLDOWN: Duration = Duration::from_secs(5);

/// Auto-enter history of one player. Never deleted, only disabled.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct AutoEnterProfile {
    pub enabled: bool,
    pub enabled_at: Option<Timestamp>,
    pub disabled_at: Option<Timestamp>,
    pub last_attempt: Option<Timestamp>,
    pub attempts: u32,
    pub enters: u32,
    pub exits: u32,
    pub cooldown: Duration,
    pub last_arena: Option<ArenaId>,
    pub last_enter: Option<Timestamp>,
    pub last_exit: Option<Timestamp>,
}

impl AutoEnterProfile {
    fn new(cooldown: Duration) -> Self {
        Self {
            enabled: false,
            enabled_at: None,
            disabled_at: None,
            last_attempt: None,
            attempts: 0,
            enters: 0,
            exits: 0,
            cooldown,
            last_arena: None,
            last_enter: None,
            last_exit: None,
        }
    }

    /// Whether the cooldown has elapsed at `now`
    pub fn ready(&self, now: Timestamp) -> bool {
        match self.last_attempt {
            Some(last) => now.saturating_since(last) >= self.cooldown,
            None => true,
        }
    }
}

#[derive(Debug, Default)]
struct TriggerState {
    profiles: HashMap<PlayerId, AutoEnterProfile>,
    /// Players with an entry request in flight from this trigger
    attempting: HashSet<PlayerId>,
    /// Players this trigger put into an arena
    auto_entered: HashMap<PlayerId, ArenaId>,
    /// Forced exits queued by an arena end, with the time it ended
    pending_exits: Vec<PendingExit>,
    /// Players who left an arena and have not stepped out of the zone since
    disarmed: HashSet<PlayerId>,
}

#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord)]
struct PendingExit {
    player: PlayerId,
    arena: ArenaId,
    ended_at: Timestamp,
}

/// What a scan did
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ScanReport {
    pub attempts: usize,
    pub entered: usize,
    pub forced_exits: usize,
}

/// Enters opted-in players when they stand in an auto-enter zone
pub struct AutoEnterTrigger {
    coordinator: Weak<LifecycleCoordinator>,
    host: Arc<dyn GameHost>,
    zones: Arc<ZoneRegistry>,
    clock: Arc<dyn Clock>,
    cooldown: Duration,
    state: Mutex<TriggerState>,
}

impl AutoEnterTrigger {
    pub fn new(
        coordinator: &Arc<LifecycleCoordinator>,
        host: Arc<dyn GameHost>,
        zones: Arc<ZoneRegistry>,
        clock: Arc<dyn Clock>,
        cooldown: Duration,
    ) -> Self {
        Self {
            coordinator: Arc::downgrade(coordinator),
            host,
            zones,
            clock,
            cooldown,
            state: Mutex::new(TriggerState::default()),
        }
    }

    /// Opt a player in
    pub fn enable(&self, player: PlayerId) -> bool {
        let now = self.clock.now();
        let mut state = self.state.lock();
        let profile = state
            .profiles
            .entry(player)
            .or_insert_with(|| AutoEnterProfile::new(self.cooldown));
        if !profile.enabled {
            profile.enabled = true;
            profile.enabled_at = Some(now);
            log::info!("Auto-enter enabled for player {}", player);
        }
        true
    }

    /// Opt a player out, keeping their history
    pub fn disable(&self, player: PlayerId) -> bool {
        let now = self.clock.now();
        let mut state = self.state.lock();
        match state.profiles.get_mut(&player) {
            Some(profile) if profile.enabled => {
                profile.enabled = false;
                profile.disabled_at = Some(now);
                log::info!("Auto-enter disabled for player {}", player);
                true
            }
            Some(_) => true,
            None => false,
        }
    }

    pub fn is_enabled(&self, player: PlayerId) -> bool {
        self.state
            .lock()
            .profiles
            .get(&player)
            .map(|p| p.enabled)
            .unwrap_or(false)
    }

    /// Copy of a player's profile
    pub fn stats(&self, player: PlayerId) -> Option<AutoEnterProfile> {
        self.state.lock().profiles.get(&player).cloned()
    }

    /// Opted-in players, sorted
    pub fn enabled_players(&self) -> Vec<PlayerId> {
        let mut players: Vec<PlayerId> = self
            .state
            .lock()
            .profiles
            .iter()
            .filter(|(_, p)| p.enabled)
            .map(|(id, _)| *id)
            .collect();
        players.sort();
        players
    }

    /// Exits queued for the next scan
    pub fn pending_exit_count(&self) -> usize {
        self.state.lock().pending_exits.len()
    }

    /// Whether the player must leave the zone before auto-enter fires again
    pub fn is_disarmed(&self, player: PlayerId) -> bool {
        self.state.lock().disarmed.contains(&player)
    }

    /// A zone reported the player walked out of an auto-enter zone
    pub fn on_zone_exited(&self, player: PlayerId) {
        if self.state.lock().disarmed.remove(&player) {
            log::debug!("Auto-enter re-armed for player {}", player);
        }
    }

    /// A zone reported the player walked into an auto-enter zone
    pub fn on_zone_entered(&self, player: PlayerId, arena: &ArenaId) -> bool {
        let Some(coordinator) = self.coordinator.upgrade() else {
            return false;
        };
        if coordinator.is_active(player) || self.is_disarmed(player) {
            return false;
        }
        self.try_enter(&coordinator, player, arena).unwrap_or(false)
    }

    /// Run queued exits, then attempt entry for every enabled player who
    /// stands in an auto-enter zone and is not already in an arena
    pub fn scan(&self) -> ScanReport {
        let mut report = ScanReport::default();
        let Some(coordinator) = self.coordinator.upgrade() else {
            return report;
        };

        let exits = std::mem::take(&mut self.state.lock().pending_exits);
        for exit in exits {
            // only a session that began before the arena ended is stale
            let stale = coordinator
                .player_record(exit.player)
                .map_or(false, |record| record.arena == exit.arena && record.entered_at < exit.ended_at);
            if !stale {
                continue;
            }
            coordinator.request_exit(exit.player, &exit.arena);
            report.forced_exits += 1;
        }

        for player in self.enabled_players() {
            if coordinator.is_active(player) {
                continue;
            }
            let Some(handles) = self.host.find_player(player) else {
                continue;
            };
            let Ok(position) = self.host.position(handles.character) else {
                continue;
            };
            let zone = self.zones.zone_at(position).filter(|zone| zone.auto_enter);
            let Some(zone) = zone else {
                self.on_zone_exited(player);
                continue;
            };
            if self.is_disarmed(player) {
                continue;
            }
            let arena = zone.arena.clone();
            if let Some(entered) = self.try_enter(&coordinator, player, &arena) {
                report.attempts += 1;
                if entered {
                    report.entered += 1;
                }
            }
        }
        report
    }

    /// Gate on opt-in and cooldown, then ask the coordinator.
    /// `None` if the gate held; otherwise the attempt is counted whatever
    /// the outcome.
    fn try_enter(&self, coordinator: &LifecycleCoordinator, player: PlayerId, arena: &ArenaId) -> Option<bool> {
        let now = self.clock.now();
        {
            let mut state = self.state.lock();
            let profile = state.profiles.get_mut(&player)?;
            if !profile.enabled {
                return None;
            }
            if !profile.ready(now) {
                log::debug!("Auto-enter for player {} is cooling down", player);
                return None;
            }
            profile.last_attempt = Some(now);
            profile.attempts += 1;
            state.attempting.insert(player);
        }

        let entered = coordinator.request_enter(player, arena);

        self.state.lock().attempting.remove(&player);
        if !entered {
            log::debug!("Auto-enter of player {} into {} failed", player, arena);
        }
        Some(entered)
    }
}

impl LifecycleSubscriber for AutoEnterTrigger {
    fn name(&self) -> &str {
        "auto_enter"
    }

    fn on_player_enter(&self, ctx: &PlayerContext) -> bool {
        let now = self.clock.now();
        let mut state = self.state.lock();
        if !state.attempting.contains(&ctx.player) {
            return true;
        }
        state.auto_entered.insert(ctx.player, ctx.arena.clone());
        if let Some(profile) = state.profiles.get_mut(&ctx.player) {
            profile.enters += 1;
            profile.last_enter = Some(now);
            profile.last_arena = Some(ctx.arena.clone());
        }
        true
    }

    fn on_player_exit(&self, ctx: &PlayerContext) -> bool {
        let now = self.clock.now();
        let mut state = self.state.lock();
        if state.profiles.contains_key(&ctx.player) {
            state.disarmed.insert(ctx.player);
        }
        if state.auto_entered.remove(&ctx.player).is_none() {
            return true;
        }
        if let Some(profile) = state.profiles.get_mut(&ctx.player) {
            profile.exits += 1;
            profile.last_exit = Some(now);
        }
        true
    }

    fn on_arena_start(&self, arena: &ArenaId) -> bool {
        log::debug!("Arena {} started; auto-enter picks players up on the next scan", arena);
        true
    }

    fn on_arena_end(&self, arena: &ArenaId) -> bool {
        let ended_at = self.clock.now();
        let mut state = self.state.lock();
        let mut queued: Vec<PendingExit> = state
            .auto_entered
            .iter()
            .filter(|(_, a)| *a == arena)
            .map(|(player, a)| PendingExit {
                player: *player,
                arena: a.clone(),
                ended_at,
            })
            .collect();
        queued.sort();
        state.pending_exits.extend(queued);
        true
    }
}
