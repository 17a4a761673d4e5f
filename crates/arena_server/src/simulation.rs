//! Simulated population
//!
//! Bots walk a loop through every zone and a point outside all of them, so
//! the location service sees real enter and exit transitions. Bots that end
//! up in an arena occasionally put up a wall.

use arena_core::{PlayerId, Quat, Vec3};
use arena_host::{GameHost, HostResult, MemoryHost};
use arena_lifecycle::ArenaEngine;
use arena_zones::ZoneRegistry;
use std::sync::Arc;

/// First platform id handed to bots
const FIRST_BOT_ID: u64 = 1000;

/// Ticks between build attempts by one bot
const BUILD_EVERY: u64 = 40;

struct Bot {
    player: PlayerId,
    route: Vec<Vec3>,
    next: usize,
}

pub struct Population {
    host: Arc<MemoryHost>,
    bots: Vec<Bot>,
    /// Distance a bot moves per tick
    speed: f32,
    ticks: u64,
    builds: u64,
}

impl Population {
    /// Spawn `count` bots. Each starts at its own staging point and walks
    /// the zones in a different order.
    pub fn spawn(host: Arc<MemoryHost>, zones: &ZoneRegistry, count: usize, speed: f32) -> HostResult<Self> {
        let centers: Vec<Vec3> = zones.zones().iter().map(|zone| zone.center).collect();
        let mut bots = Vec::with_capacity(count);

        for i in 0..count {
            let staging = Vec3::new(i as f32 * 15.0, 0.0, 400.0);
            let mut route = centers.clone();
            if !route.is_empty() {
                let len = route.len();
                route.rotate_left(i % len);
            }
            route.push(staging);

            let player = PlayerId(FIRST_BOT_ID + i as u64);
            host.spawn_player(player, &format!("Bot{:02}", i), staging)?;
            bots.push(Bot { player, route, next: 0 });
        }

        log::info!("Spawned {} bot(s)", bots.len());
        Ok(Self {
            host,
            bots,
            speed,
            ticks: 0,
            builds: 0,
        })
    }

    pub fn players(&self) -> Vec<PlayerId> {
        self.bots.iter().map(|bot| bot.player).collect()
    }

    /// Structures completed so far
    pub fn builds(&self) -> u64 {
        self.builds
    }

    /// Advance every bot one step
    pub fn step(&mut self, engine: &ArenaEngine) {
        self.ticks += 1;
        for bot in &mut self.bots {
            let Some(handles) = self.host.find_player(bot.player) else {
                continue;
            };
            let Ok(position) = self.host.position(handles.character) else {
                continue;
            };

            let target = bot.route[bot.next];
            let to_target = target - position;
            let distance = to_target.length();
            let moved = if distance <= self.speed {
                bot.next = (bot.next + 1) % bot.route.len();
                target
            } else {
                position + to_target * (self.speed / distance)
            };
            if let Err(err) = self.host.set_position(handles.character, moved) {
                log::debug!("Bot {} could not move: {}", bot.player, err);
                continue;
            }

            if self.ticks % BUILD_EVERY == bot.player.raw() % BUILD_EVERY {
                if let Some(arena) = engine.coordinator().active_arena(bot.player) {
                    let coordinator = engine.coordinator();
                    let spot = moved + Vec3::new(2.0, 0.0, 0.0);
                    if let Some(building) = coordinator.begin_build(bot.player, &arena, "wall", spot, Quat::IDENTITY) {
                        if coordinator.complete_build(bot.player, &arena, building) {
                            self.builds += 1;
                        }
                    }
                }
            }
        }
    }
}
