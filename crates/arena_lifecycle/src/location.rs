//! Position polling and zone-driven transitions

use crate::auto_enter::AutoEnterTrigger;
use crate::coordinator::LifecycleCoordinator;
use arena_core::PlayerId;
use arena_host::GameHost;
use arena_zones::{LocationTracker, ZoneEvent, ZoneEventType, ZoneRegistry};
use parking_lot::Mutex;
use std::sync::Arc;

/// Feeds live player positions through the zone tracker and forwards the
/// resulting transitions.
///
/// Leaving an `auto_exit` zone requests an exit from the coordinator.
/// Entering an `auto_enter` zone goes through the auto-enter trigger, so
/// only opted-in, armed players outside their cooldown are entered.
pub struct LocationService {
    host: Arc<dyn GameHost>,
    zones: Arc<ZoneRegistry>,
    coordinator: Arc<LifecycleCoordinator>,
    auto_enter: Arc<AutoEnterTrigger>,
    tracker: Mutex<LocationTracker>,
}

impl LocationService {
    pub fn new(
        host: Arc<dyn GameHost>,
        zones: Arc<ZoneRegistry>,
        coordinator: Arc<LifecycleCoordinator>,
        auto_enter: Arc<AutoEnterTrigger>,
    ) -> Self {
        Self {
            host,
            zones,
            coordinator,
            auto_enter,
            tracker: Mutex::new(LocationTracker::new()),
        }
    }

    /// Read one player's position and act on any zone change
    pub fn update_player_location(&self, player: PlayerId) -> Vec<ZoneEvent> {
        let Some(handles) = self.host.find_player(player) else {
            return Vec::new();
        };
        let position = match self.host.position(handles.character) {
            Ok(position) => position,
            Err(err) => {
                log::debug!("No position for player {}: {}", player, err);
                return Vec::new();
            }
        };

        let events = self.tracker.lock().update(&self.zones, player, position);
        for event in &events {
            self.dispatch(event);
        }
        events
    }

    /// Update every connected player; returns the number of zone events
    pub fn update_all(&self) -> usize {
        self.host
            .online_players()
            .into_iter()
            .map(|player| self.update_player_location(player).len())
            .sum()
    }

    fn dispatch(&self, event: &ZoneEvent) {
        let Some(zone) = self.zones.get(&event.zone) else {
            return;
        };
        match event.event_type {
            ZoneEventType::Exit => {
                log::debug!("Player {} left zone {}", event.player, zone.name);
                // re-arm before the exit, which disarms again
                if zone.auto_enter {
                    self.auto_enter.on_zone_exited(event.player);
                }
                if zone.auto_exit {
                    self.coordinator.request_exit(event.player, &event.arena);
                }
            }
            ZoneEventType::Enter if zone.auto_enter => {
                log::debug!("Player {} entered zone {}", event.player, zone.name);
                self.auto_enter.on_zone_entered(event.player, &event.arena);
            }
            _ => {}
        }
    }

    /// Drop a disconnected player's tracking state without acting on it
    pub fn forget(&self, player: PlayerId) -> bool {
        let position = self
            .host
            .find_player(player)
            .and_then(|handles| self.host.position(handles.character).ok())
            .unwrap_or_default();
        self.tracker.lock().forget(&self.zones, player, position).is_some()
    }

    pub fn current_zone(&self, player: PlayerId) -> Option<String> {
        self.tracker.lock().current_zone(player).map(str::to_string)
    }

    pub fn players_in_zone(&self, zone: &str) -> Vec<PlayerId> {
        self.tracker.lock().players_in_zone(zone)
    }

    pub fn player_count_in_zone(&self, zone: &str) -> usize {
        self.tracker.lock().player_count_in_zone(zone)
    }

    pub fn is_player_in_zone(&self, player: PlayerId, zone: &str) -> bool {
        self.tracker.lock().is_player_in_zone(player, zone)
    }

    pub fn zone_names(&self) -> Vec<String> {
        self.zones.zone_names().into_iter().map(str::to_string).collect()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::auto_enter::DEFAULT_COOLDOWN;
    use crate::coordinator::CoordinatorSettings;
    use crate::rules::ArenaRuleBook;
    use arena_core::{ArenaId, ManualClock, Timestamp, Vec3};
    use arena_host::MemoryHost;
    use arena_snapshot::SnapshotStore;
    use arena_zones::ZoneConfig;

    struct Fixture {
        host: Arc<MemoryHost>,
        coordinator: Arc<LifecycleCoordinator>,
        auto_enter: Arc<AutoEnterTrigger>,
        service: LocationService,
    }

    fn fixture() -> Fixture {
        let host = Arc::new(MemoryHost::new());
        let clock = Arc::new(ManualClock::new(Timestamp::from_millis(1)));
        let zones = Arc::new(
            ZoneRegistry::new(vec![
                ZoneConfig::new("ZoneA", Vec3::ZERO, 10.0, "arena_a"),
                ZoneConfig::new("ZoneB", Vec3::new(100.0, 0.0, 0.0), 10.0, "arena_b"),
                ZoneConfig::new("Gallery", Vec3::new(0.0, 0.0, 100.0), 10.0, "arena_a").with_auto_exit(false),
            ])
            .unwrap(),
        );
        let snapshots = Arc::new(SnapshotStore::in_memory(host.clone(), clock.clone()));
        let coordinator = Arc::new(LifecycleCoordinator::new(
            host.clone(),
            snapshots,
            clock.clone(),
            Arc::new(ArenaRuleBook::default()),
            CoordinatorSettings::default(),
        ));
        let auto_enter = Arc::new(AutoEnterTrigger::new(
            &coordinator,
            host.clone(),
            zones.clone(),
            clock,
            DEFAULT_COOLDOWN,
        ));
        coordinator.register(auto_enter.clone());
        let service = LocationService::new(host.clone(), zones, coordinator.clone(), auto_enter.clone());
        Fixture {
            host,
            coordinator,
            auto_enter,
            service,
        }
    }

    #[test]
    fn test_zone_entry_respects_opt_in() {
        let fx = fixture();
        let handles = fx.host.spawn_player(PlayerId(1), "Ash", Vec3::new(50.0, 0.0, 0.0)).unwrap();
        fx.host.set_position(handles.character, Vec3::new(1.0, 0.0, 0.0)).unwrap();

        let events = fx.service.update_player_location(PlayerId(1));

        assert_eq!(events.len(), 1);
        assert!(events[0].is_enter());
        assert!(!fx.coordinator.is_active(PlayerId(1)));
        assert_eq!(fx.service.current_zone(PlayerId(1)).as_deref(), Some("ZoneA"));
    }

    #[test]
    fn test_opted_in_player_enters_and_leaving_zone_exits() {
        let fx = fixture();
        let handles = fx.host.spawn_player(PlayerId(1), "Ash", Vec3::new(50.0, 0.0, 0.0)).unwrap();
        fx.auto_enter.enable(PlayerId(1));
        fx.service.update_player_location(PlayerId(1));

        fx.host.set_position(handles.character, Vec3::new(1.0, 0.0, 0.0)).unwrap();
        fx.service.update_player_location(PlayerId(1));
        assert_eq!(fx.coordinator.active_arena(PlayerId(1)), Some(ArenaId::new("arena_a")));

        // the arena spawn moved the body; walk it out of every zone
        fx.host.set_position(handles.character, Vec3::new(50.0, 0.0, 50.0)).unwrap();
        let events = fx.service.update_player_location(PlayerId(1));

        assert!(events.iter().any(|e| e.is_exit()));
        assert!(!fx.coordinator.is_active(PlayerId(1)));
    }

    #[test]
    fn test_zone_without_auto_exit_keeps_player() {
        let fx = fixture();
        let handles = fx.host.spawn_player(PlayerId(1), "Ash", Vec3::new(0.0, 0.0, 100.0)).unwrap();
        fx.service.update_player_location(PlayerId(1));
        fx.coordinator.request_enter(PlayerId(1), &ArenaId::new("arena_a"));
        fx.host.set_position(handles.character, Vec3::new(0.0, 0.0, 100.0)).unwrap();
        fx.service.update_player_location(PlayerId(1));

        fx.host.set_position(handles.character, Vec3::new(50.0, 0.0, 50.0)).unwrap();
        let events = fx.service.update_player_location(PlayerId(1));

        assert_eq!(events.len(), 1);
        assert!(fx.coordinator.is_active(PlayerId(1)));
    }

    #[test]
    fn test_queries_and_forget() {
        let fx = fixture();
        fx.host.spawn_player(PlayerId(1), "A", Vec3::ZERO).unwrap();
        fx.host.spawn_player(PlayerId(2), "B", Vec3::new(100.0, 0.0, 0.0)).unwrap();
        fx.host.spawn_player(PlayerId(3), "C", Vec3::new(2.0, 0.0, 0.0)).unwrap();

        assert_eq!(fx.service.update_all(), 3);

        assert_eq!(fx.service.players_in_zone("ZoneA"), vec![PlayerId(1), PlayerId(3)]);
        assert_eq!(fx.service.player_count_in_zone("ZoneB"), 1);
        assert!(fx.service.is_player_in_zone(PlayerId(2), "ZoneB"));
        assert_eq!(fx.service.zone_names(), vec!["ZoneA", "ZoneB", "Gallery"]);

        assert!(fx.service.forget(PlayerId(3)));
        assert!(!fx.service.forget(PlayerId(3)));
        assert_eq!(fx.service.player_count_in_zone("ZoneA"), 1);
    }
}
