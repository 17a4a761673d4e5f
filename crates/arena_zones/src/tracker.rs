//! Per-player zone membership

use crate::events::ZoneEvent;
use crate::registry::ZoneRegistry;
use arena_core::{PlayerId, Vec3};
use std::collections::HashMap;

/// Remembers which zone each player was last seen in and reports changes.
///
/// On a change the exit from the old zone is always reported before the
/// enter into the new one. An unchanged zone reports nothing.
#[derive(Debug, Default)]
pub struct LocationTracker {
    /// player -> name of the zone they were last seen in
    current: HashMap<PlayerId, String>,
}

impl LocationTracker {
    pub fn new() -> Self {
        Self::default()
    }

    /// Feed the player's latest position
    pub fn update(&mut self, registry: &ZoneRegistry, player: PlayerId, position: Vec3) -> Vec<ZoneEvent> {
        let new_zone = registry.zone_at(position);
        let old_name = self.current.get(&player).map(String::as_str);

        if old_name == new_zone.map(|zone| zone.name.as_str()) {
            return Vec::new();
        }

        let mut events = Vec::with_capacity(2);
        if let Some(old_zone) = old_name.and_then(|name| registry.get(name)) {
            events.push(ZoneEvent::exit(player, old_zone, position));
        }
        match new_zone {
            Some(zone) => {
                events.push(ZoneEvent::enter(player, zone, position));
                self.current.insert(player, zone.name.clone());
            }
            None => {
                self.current.remove(&player);
            }
        }

        log::debug!("Player {} zone change: {:?}", player, events);
        events
    }

    /// Drop a player's state, reporting an exit if they were in a zone
    pub fn forget(&mut self, registry: &ZoneRegistry, player: PlayerId, position: Vec3) -> Option<ZoneEvent> {
        let name = self.current.remove(&player)?;
        registry.get(&name).map(|zone| ZoneEvent::exit(player, zone, position))
    }

    /// Zone the player was last seen in
    pub fn current_zone(&self, player: PlayerId) -> Option<&str> {
        self.current.get(&player).map(String::as_str)
    }

    /// Players currently in the named zone, sorted
    pub fn players_in_zone(&self, zone: &str) -> Vec<PlayerId> {
        let mut players: Vec<_> = self
            .current
            .iter()
            .filter(|(_, name)| name.as_str() == zone)
            .map(|(player, _)| *player)
            .collect();
        players.sort();
        players
    }

    /// Number of players in the named zone
    pub fn player_count_in_zone(&self, zone: &str) -> usize {
        self.current.values().filter(|name| name.as_str() == zone).count()
    }

    /// Whether the player is in the named zone
    pub fn is_player_in_zone(&self, player: PlayerId, zone: &str) -> bool {
        self.current_zone(player) == Some(zone)
    }

    /// Number of players tracked inside any zone
    pub fn tracked_count(&self) -> usize {
        self.current.len()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::events::ZoneEventType;
    use crate::zone::ZoneConfig;

    fn registry() -> ZoneRegistry {
        ZoneRegistry::new(vec![
            ZoneConfig::new("ZoneA", Vec3::ZERO, 10.0, "arena_a"),
            ZoneConfig::new("ZoneB", Vec3::new(100.0, 0.0, 0.0), 10.0, "arena_b"),
        ])
        .unwrap()
    }

    fn kinds(events: &[ZoneEvent]) -> Vec<(ZoneEventType, &str)> {
        events.iter().map(|e| (e.event_type, e.zone.as_str())).collect()
    }

    #[test]
    fn test_enter_then_move_between_zones() {
        let registry = registry();
        let mut tracker = LocationTracker::new();
        let player = PlayerId(1);

        assert!(tracker.update(&registry, player, Vec3::new(50.0, 0.0, 0.0)).is_empty());

        let events = tracker.update(&registry, player, Vec3::new(1.0, 0.0, 0.0));
        assert_eq!(kinds(&events), vec![(ZoneEventType::Enter, "ZoneA")]);

        assert!(tracker.update(&registry, player, Vec3::new(2.0, 0.0, 0.0)).is_empty());

        let events = tracker.update(&registry, player, Vec3::new(99.0, 0.0, 0.0));
        assert_eq!(
            kinds(&events),
            vec![(ZoneEventType::Exit, "ZoneA"), (ZoneEventType::Enter, "ZoneB")]
        );
        assert_eq!(tracker.current_zone(player), Some("ZoneB"));
    }

    #[test]
    fn test_leave_all_zones() {
        let registry = registry();
        let mut tracker = LocationTracker::new();
        let player = PlayerId(1);

        tracker.update(&registry, player, Vec3::ZERO);
        let events = tracker.update(&registry, player, Vec3::new(50.0, 0.0, 0.0));

        assert_eq!(kinds(&events), vec![(ZoneEventType::Exit, "ZoneA")]);
        assert_eq!(tracker.current_zone(player), None);
        assert_eq!(tracker.tracked_count(), 0);
    }

    #[test]
    fn test_zone_population_queries() {
        let registry = registry();
        let mut tracker = LocationTracker::new();

        tracker.update(&registry, PlayerId(3), Vec3::ZERO);
        tracker.update(&registry, PlayerId(1), Vec3::new(1.0, 0.0, 0.0));
        tracker.update(&registry, PlayerId(2), Vec3::new(100.0, 0.0, 0.0));

        assert_eq!(tracker.players_in_zone("ZoneA"), vec![PlayerId(1), PlayerId(3)]);
        assert_eq!(tracker.player_count_in_zone("ZoneB"), 1);
        assert!(tracker.is_player_in_zone(PlayerId(2), "ZoneB"));
        assert!(!tracker.is_player_in_zone(PlayerId(2), "ZoneA"));
    }

    #[test]
    fn test_forget_reports_exit() {
        let registry = registry();
        let mut tracker = LocationTracker::new();

        tracker.update(&registry, PlayerId(5), Vec3::ZERO);
        let exit = tracker.forget(&registry, PlayerId(5), Vec3::ZERO).unwrap();

        assert!(exit.is_exit());
        assert!(tracker.forget(&registry, PlayerId(5), Vec3::ZERO).is_none());
    }
}
