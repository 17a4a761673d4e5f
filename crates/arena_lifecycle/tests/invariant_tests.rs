//! Invariant tests for arena_lifecycle
//!
//! These tests verify lifecycle guarantees that MUST NEVER be violated

use arena_core::{ArenaId, EntityRef, ManualClock, PlayerId, Quat, Timestamp, Vec3};
use arena_host::{ComponentKind, GameHost, GameHostExt, Identity, MemoryHost};
use arena_inventory::{Equipment, EquipmentSlot, Inventory, ItemCategory, ItemStack};
use arena_lifecycle::prelude::*;
use arena_snapshot::{SnapshotFormat, SnapshotStore};
use arena_zones::{LocationTracker, ZoneConfig, ZoneEventType, ZoneRegistry};
use std::sync::Arc;
use std::time::Duration;

fn main_arena() -> ArenaId {
    ArenaId::new("main_arena")
}

fn engine_with(config: EngineConfig) -> (Arc<MemoryHost>, Arc<ManualClock>, ArenaEngine) {
    let host = Arc::new(MemoryHost::new());
    let clock = Arc::new(ManualClock::new(Timestamp::from_millis(1_000)));
    let engine = ArenaEngine::new(config, host.clone(), clock.clone()).unwrap();
    (host, clock, engine)
}

/// Give a body a recognizable loadout
fn stock(host: &MemoryHost, body: EntityRef) {
    host.update::<Inventory, _>(body, |inv| {
        inv.add_item(ItemStack::new("blood_rose", 12).with_category(ItemCategory::Material));
        inv.add_item(ItemStack::single("crypt_key").with_category(ItemCategory::Key));
    })
    .unwrap();
    host.update::<Equipment, _>(body, |eq| {
        eq.equip(
            EquipmentSlot::MainHand,
            ItemStack::single("reaper").with_durability(40.0, 100.0),
        )
        .unwrap();
    })
    .unwrap();
}

/// INVARIANT: A lifecycle record exists exactly while a player is in arena
/// mode, and a swapped player is never active on both bodies
#[test]
fn invariant_single_mode() {
    let (host, _, engine) = engine_with(EngineConfig::default());
    let pvp = ArenaId::new("pvp_arena");
    for id in 1..=4 {
        host.spawn_player(PlayerId(id), "Bot", Vec3::new(300.0, 0.0, 300.0)).unwrap();
    }
    let handles = host.find_player(PlayerId(4)).unwrap();
    let spare = host.spawn_body("Bot (arena)", Vec3::ZERO).unwrap();
    assert!(engine.swap().register_pair(PlayerId(4), handles.character, spare));

    let commands = vec![
        ArenaCommand::Enter { player: PlayerId(1), arena: main_arena() },
        ArenaCommand::Enter { player: PlayerId(1), arena: pvp.clone() },
        ArenaCommand::Enter { player: PlayerId(2), arena: pvp.clone() },
        ArenaCommand::SwapCharacters { player: PlayerId(4) },
        ArenaCommand::Exit { player: PlayerId(1), arena: pvp.clone() },
        ArenaCommand::Exit { player: PlayerId(3), arena: main_arena() },
        ArenaCommand::EndArena { arena: pvp.clone() },
        ArenaCommand::Enter { player: PlayerId(3), arena: main_arena() },
        ArenaCommand::SwapCharacters { player: PlayerId(4) },
        ArenaCommand::ForceActivate { player: PlayerId(4), to_arena: true },
        ArenaCommand::Exit { player: PlayerId(1), arena: main_arena() },
    ];

    let coordinator = engine.coordinator();
    for command in commands {
        engine.execute(command);

        for id in 1..=4 {
            let player = PlayerId(id);
            let record = coordinator.player_record(player);
            assert_eq!(record.is_some(), coordinator.is_active(player));
            assert_eq!(record.is_some(), engine.snapshots().has_snapshot(player, DEFAULT_CONTEXT));
            assert_eq!(
                record.as_ref().map(|r| r.arena.clone()),
                coordinator.active_arena(player)
            );
        }

        let mode = engine.swap().active_mode(PlayerId(4)).unwrap();
        assert_eq!(mode == CharacterMode::ArenaActive, coordinator.is_active(PlayerId(4)));
        let driven = host.find_player(PlayerId(4)).unwrap().character;
        let frozen_count = [handles.character, spare]
            .iter()
            .filter(|body| host.read::<arena_host::Controller>(**body).unwrap().frozen)
            .count();
        assert_eq!(frozen_count, 1);
        assert!(!host.read::<arena_host::Controller>(driven).unwrap().frozen);
    }

    assert_eq!(coordinator.active_count(), 2);
    assert!(coordinator.is_active(PlayerId(3)));
    assert!(!coordinator.is_active(PlayerId(1)));
}

/// INVARIANT: Capture then restore gives back the pre-capture belongings and
/// leaves no snapshot behind
#[test]
fn invariant_snapshot_round_trip() {
    let host = Arc::new(MemoryHost::new());
    let clock = Arc::new(ManualClock::new(Timestamp::from_millis(1)));
    let store = SnapshotStore::in_memory(host.clone(), clock);
    let body = host.spawn_body("Vlad", Vec3::new(5.0, 0.0, 5.0)).unwrap();
    stock(&host, body);
    let inventory_before = host.read::<Inventory>(body).unwrap();
    let equipment_before = host.read::<Equipment>(body).unwrap();

    assert!(store.capture(PlayerId(9), "practice", body));
    assert!(store.restore(PlayerId(9), "practice"));

    let inventory_after = host.read::<Inventory>(body).unwrap();
    let equipment_after = host.read::<Equipment>(body).unwrap();
    assert_eq!(
        inventory_after.items().collect::<Vec<_>>(),
        inventory_before.items().collect::<Vec<_>>()
    );
    assert_eq!(
        equipment_after.all_equipped(),
        equipment_before.all_equipped()
    );
    assert!(!store.has_snapshot(PlayerId(9), "practice"));
    assert!(store.is_empty());
}

/// INVARIANT: A second enter is a successful no-op that does not capture again
#[test]
fn invariant_enter_is_idempotent() {
    let (host, _, engine) = engine_with(EngineConfig::default());
    let handles = host.spawn_player(PlayerId(5), "Ash", Vec3::ZERO).unwrap();
    stock(&host, handles.character);
    let coordinator = engine.coordinator();

    assert!(coordinator.request_enter(PlayerId(5), &main_arena()));
    let first = engine.snapshots().get(PlayerId(5), DEFAULT_CONTEXT).unwrap();
    assert!(coordinator.request_enter(PlayerId(5), &main_arena()));
    let second = engine.snapshots().get(PlayerId(5), DEFAULT_CONTEXT).unwrap();

    assert_eq!(first.id, second.id);
    assert_eq!(second.inventory.item_count(), 2);
    assert_eq!(coordinator.active_count(), 1);
    let stats = coordinator.stats();
    assert_eq!(stats.enter_requests, 2);
    assert_eq!(stats.enters, 1);
    assert_eq!(stats.noop_requests, 1);
    assert_eq!(coordinator.active_players(&main_arena()), vec![PlayerId(5)]);
}

/// INVARIANT: After a player exits, they own no structures in that arena
#[test]
fn invariant_exit_cleans_up_buildings() {
    let (host, _, engine) = engine_with(EngineConfig::default());
    host.spawn_player(PlayerId(6), "Builder", Vec3::ZERO).unwrap();
    let coordinator = engine.coordinator();
    assert!(coordinator.request_enter(PlayerId(6), &main_arena()));
    let spawn = Vec3::new(-1000.0, 5.0, -500.0);

    let wall = coordinator
        .begin_build(PlayerId(6), &main_arena(), "wall", Vec3::new(-995.0, 5.0, -500.0), Quat::IDENTITY)
        .unwrap();
    assert!(coordinator.complete_build(PlayerId(6), &main_arena(), wall));
    let floor = coordinator
        .begin_build(PlayerId(6), &main_arena(), "floor", spawn, Quat::IDENTITY)
        .unwrap();
    let structure = engine.buildings().get(wall).unwrap().entity.unwrap();
    assert!(host.exists(structure));
    assert_eq!(engine.buildings().player_building_count(PlayerId(6), &main_arena()), 2);

    assert!(coordinator.request_exit(PlayerId(6), &main_arena()));

    assert!(engine.buildings().player_buildings(PlayerId(6), &main_arena()).is_empty());
    assert!(engine.buildings().get(floor).is_none());
    assert!(!host.exists(structure));
    assert_eq!(coordinator.arena_state(&main_arena()).unwrap().live_structures(), 0);
}

/// INVARIANT: Crossing into ZoneA then ZoneB emits Enter(A), Exit(A),
/// Enter(B) in that order, with no duplicate Enter(A)
#[test]
fn invariant_zone_transitions_in_order() {
    let registry = ZoneRegistry::new(vec![
        ZoneConfig::new("ZoneA", Vec3::ZERO, 10.0, "arena_a"),
        ZoneConfig::new("ZoneB", Vec3::new(15.0, 0.0, 0.0), 4.0, "arena_b"),
    ])
    .unwrap();
    let mut tracker = LocationTracker::new();
    let player = PlayerId(1);

    let path = [
        Vec3::new(-50.0, 0.0, 0.0),
        Vec3::new(-5.0, 0.0, 0.0),
        Vec3::new(0.0, 0.0, 0.0),
        Vec3::new(5.0, 0.0, 0.0),
        Vec3::new(14.0, 0.0, 0.0),
        Vec3::new(15.0, 0.0, 1.0),
    ];
    let events: Vec<(ZoneEventType, String)> = path
        .iter()
        .flat_map(|position| tracker.update(&registry, player, *position))
        .map(|event| (event.event_type, event.zone))
        .collect();

    assert_eq!(
        events,
        vec![
            (ZoneEventType::Enter, "ZoneA".to_string()),
            (ZoneEventType::Exit, "ZoneA".to_string()),
            (ZoneEventType::Enter, "ZoneB".to_string()),
        ]
    );
}

/// INVARIANT: With a 5s cooldown, two opportunities 2s apart produce exactly
/// one enter request
#[test]
fn invariant_auto_enter_cooldown() {
    let (host, clock, engine) = engine_with(EngineConfig::default());
    let handles = host.spawn_player(PlayerId(8), "Ash", Vec3::new(-1000.0, 5.0, -500.0)).unwrap();
    // capture fails without an inventory, so the player stays eligible
    host.remove_component(handles.character, ComponentKind::Inventory).unwrap();
    engine.auto_enter().enable(PlayerId(8));

    engine.auto_enter().on_zone_entered(PlayerId(8), &main_arena());
    clock.advance(Duration::from_secs(2));
    engine.auto_enter().on_zone_entered(PlayerId(8), &main_arena());

    assert_eq!(engine.coordinator().stats().enter_requests, 1);
    assert_eq!(engine.auto_enter().stats(PlayerId(8)).unwrap().attempts, 1);

    clock.advance(Duration::from_secs(3));
    engine.auto_enter().scan();
    assert_eq!(engine.coordinator().stats().enter_requests, 2);
}

/// INVARIANT: Player 42 enters and exits main_arena with a snapshot created
/// and consumed
#[test]
fn invariant_enter_exit_scenario() {
    let (host, _, engine) = engine_with(EngineConfig::default());
    let handles = host.spawn_player(PlayerId(42), "Vlad", Vec3::new(12.0, 0.0, -3.0)).unwrap();
    stock(&host, handles.character);
    let coordinator = engine.coordinator();
    let events = engine.events().channel();

    assert!(!coordinator.is_active(PlayerId(42)));
    assert!(coordinator.request_enter(PlayerId(42), &main_arena()));
    assert!(engine.snapshots().has_snapshot(PlayerId(42), DEFAULT_CONTEXT));
    assert!(coordinator.player_record(PlayerId(42)).is_some());
    assert!(coordinator.is_active(PlayerId(42)));
    assert!(host.read::<Inventory>(handles.character).unwrap().is_empty());
    assert_eq!(
        host.read::<Identity>(handles.character).unwrap().display_name,
        "[PvP] Vlad"
    );

    assert!(coordinator.request_exit(PlayerId(42), &main_arena()));
    assert!(!engine.snapshots().has_snapshot(PlayerId(42), DEFAULT_CONTEXT));
    assert!(coordinator.player_record(PlayerId(42)).is_none());
    assert!(!coordinator.is_active(PlayerId(42)));
    assert_eq!(host.read::<Inventory>(handles.character).unwrap().count_item("blood_rose"), 12);
    assert_eq!(host.read::<Identity>(handles.character).unwrap().display_name, "Vlad");
    assert_eq!(host.position(handles.character).unwrap(), Vec3::new(12.0, 0.0, -3.0));

    let seen: Vec<LifecycleEvent> = events.try_iter().collect();
    assert_eq!(
        seen,
        vec![
            LifecycleEvent::ArenaStarted(main_arena()),
            LifecycleEvent::PlayerEnteredArena { player: PlayerId(42), arena: main_arena() },
            LifecycleEvent::PlayerExitedArena { player: PlayerId(42), arena: main_arena() },
        ]
    );
}

/// INVARIANT: A snapshot left behind by a crash is restored and deleted
/// exactly once on restart
#[test]
fn invariant_crash_recovery_restores_once() {
    let dir = tempfile::tempdir().unwrap();
    let mut config = EngineConfig::default();
    config.lifecycle.snapshot_dir = Some(dir.path().to_path_buf());
    config.lifecycle.snapshot_format = SnapshotFormat::Binary;

    let host = Arc::new(MemoryHost::new());
    let clock = Arc::new(ManualClock::new(Timestamp::from_millis(1)));
    let handles = host.spawn_player(PlayerId(7), "Ash", Vec3::new(3.0, 0.0, 3.0)).unwrap();
    stock(&host, handles.character);

    {
        let engine = ArenaEngine::new(config.clone(), host.clone(), clock.clone()).unwrap();
        assert!(engine.bootstrap().is_empty());
        assert!(engine.coordinator().request_enter(PlayerId(7), &main_arena()));
        // process dies here, mid-session
    }
    assert!(host.read::<Inventory>(handles.character).unwrap().is_empty());
    assert_eq!(std::fs::read_dir(dir.path()).unwrap().count(), 1);

    let engine = ArenaEngine::new(config, host.clone(), clock).unwrap();
    assert!(engine.snapshots().has_snapshot(PlayerId(7), "practice"));
    let report = engine.bootstrap();

    assert_eq!(report.restored, vec![PlayerId(7)]);
    assert!(report.failed.is_empty());
    assert!(!engine.snapshots().has_snapshot(PlayerId(7), "practice"));
    assert_eq!(std::fs::read_dir(dir.path()).unwrap().count(), 0);
    assert_eq!(host.read::<Inventory>(handles.character).unwrap().count_item("blood_rose"), 12);
    assert_eq!(host.read::<Identity>(handles.character).unwrap().display_name, "Ash");
    assert!(!engine.coordinator().is_active(PlayerId(7)));

    assert!(engine.bootstrap().is_empty());
    assert_eq!(host.read::<Inventory>(handles.character).unwrap().count_item("blood_rose"), 12);
}

/// INVARIANT: Enter and exit requests racing from several threads leave
/// exactly one record and one snapshot per active player, and nothing for
/// the rest
#[test]
fn invariant_concurrent_transitions_stay_consistent() {
    let (host, _, engine) = engine_with(EngineConfig::default());
    let pvp = ArenaId::new("pvp_arena");
    let players: Vec<PlayerId> = (1..=6).map(PlayerId).collect();
    for player in &players {
        let handles = host.spawn_player(*player, "Racer", Vec3::new(300.0, 0.0, 300.0)).unwrap();
        stock(&host, handles.character);
    }
    let coordinator = engine.coordinator();

    std::thread::scope(|scope| {
        // two threads fight over players 1-3, two more over 4-6
        for (worker, arena) in [main_arena(), pvp.clone(), main_arena(), pvp.clone()].into_iter().enumerate() {
            let group: Vec<PlayerId> = if worker < 2 {
                players[..3].to_vec()
            } else {
                players[3..].to_vec()
            };
            scope.spawn(move || {
                for round in 0..50 {
                    for player in &group {
                        coordinator.request_enter(*player, &arena);
                        if (round + worker) % 3 != 0 {
                            coordinator.request_exit(*player, &arena);
                        }
                    }
                }
            });
        }
    });

    let stats = coordinator.stats();
    assert_eq!(stats.enters - stats.exits, coordinator.active_count() as u64);
    assert_eq!(engine.snapshots().len(), coordinator.active_count());

    for player in &players {
        let record = coordinator.player_record(*player);
        let active = coordinator.is_active(*player);
        assert_eq!(record.is_some(), active);
        assert_eq!(engine.snapshots().has_snapshot(*player, "practice"), active);
        assert_eq!(coordinator.active_arena(*player), record.map(|r| r.arena));

        let body = host.find_player(*player).unwrap().character;
        let expected = if active { 0 } else { 12 };
        assert_eq!(host.read::<Inventory>(body).unwrap().count_item("blood_rose"), expected);
    }
}
