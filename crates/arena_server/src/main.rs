//! Arena Lifecycle Server
//!
//! Loads the engine configuration, recovers players left mid-session by a
//! previous run, then drives the world tick on a background thread while a
//! simulated population walks between zones.
//!
//! Run with: cargo run -p arena_server -- [config.toml] [--ticks N] [--bots N] [--tick-ms N]

mod simulation;

use arena_core::{PlayerId, SystemClock};
use arena_host::{GameHost, MemoryHost};
use arena_lifecycle::{ArenaCommand, ArenaEngine, EngineConfig, LifecycleEvent};
use crossbeam_channel::{Receiver, Sender};
use simulation::Population;
use std::path::PathBuf;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::thread;
use std::time::Duration;

/// Command-line options
struct Options {
    config: Option<PathBuf>,
    ticks: Option<u64>,
    bots: usize,
    tick_interval: Duration,
}

impl Default for Options {
    fn default() -> Self {
        Self {
            config: None,
            ticks: None,
            bots: 6,
            tick_interval: Duration::from_millis(50),
        }
    }
}

fn parse_args() -> Result<Options, String> {
    let mut options = Options::default();
    let mut args = std::env::args().skip(1);

    while let Some(arg) = args.next() {
        match arg.as_str() {
            "--ticks" => options.ticks = Some(parse_value(&arg, args.next())?),
            "--bots" => options.bots = parse_value(&arg, args.next())?,
            "--tick-ms" => options.tick_interval = Duration::from_millis(parse_value(&arg, args.next())?),
            flag if flag.starts_with("--") => return Err(format!("unknown option {}", flag)),
            path => options.config = Some(PathBuf::from(path)),
        }
    }
    Ok(options)
}

fn parse_value<T: std::str::FromStr>(flag: &str, value: Option<String>) -> Result<T, String> {
    value
        .ok_or_else(|| format!("{} needs a value", flag))?
        .parse()
        .map_err(|_| format!("{} got an invalid value", flag))
}

fn main() {
    // Initialize logging
    env_logger::Builder::from_env(env_logger::Env::default().default_filter_or("info")).init();

    println!();
    println!("=== Arena Lifecycle Server v{} ===", env!("CARGO_PKG_VERSION"));
    println!();

    let options = match parse_args() {
        Ok(options) => options,
        Err(e) => {
            log::error!("{}", e);
            eprintln!("usage: arena-server [config.toml] [--ticks N] [--bots N] [--tick-ms N]");
            std::process::exit(2);
        }
    };

    let config = match &options.config {
        Some(path) => match EngineConfig::load(path) {
            Ok(config) => config,
            Err(e) => {
                log::error!("Failed to load config {}: {}", path.display(), e);
                std::process::exit(1);
            }
        },
        None => {
            log::info!("No config given, using built-in defaults");
            EngineConfig::default()
        }
    };

    let host = Arc::new(MemoryHost::new());
    let engine = match ArenaEngine::new(config, host.clone(), Arc::new(SystemClock)) {
        Ok(engine) => Arc::new(engine),
        Err(e) => {
            log::error!("Failed to start engine: {}", e);
            std::process::exit(1);
        }
    };

    let recovery = engine.bootstrap();
    if !recovery.is_empty() {
        log::info!(
            "Recovered {} player(s), {} left pending",
            recovery.restored.len(),
            recovery.failed.len()
        );
    }

    let population = match Population::spawn(host.clone(), engine.zones(), options.bots, 2.5) {
        Ok(population) => population,
        Err(e) => {
            log::error!("Failed to spawn population: {}", e);
            std::process::exit(1);
        }
    };
    let swapper = provision_swapper(&host, &engine, population.players().first().copied());

    // Set up signal handler
    let shutdown = Arc::new(AtomicBool::new(false));
    let flag = shutdown.clone();
    if let Err(e) = ctrlc::set_handler(move || {
        log::info!("Received shutdown signal");
        flag.store(true, Ordering::Relaxed);
    }) {
        log::warn!("Failed to set signal handler: {}", e);
    }

    let events = engine.events().channel();
    let (commands, inbox) = crossbeam_channel::unbounded();

    for player in population.players().iter().step_by(2) {
        send(&commands, ArenaCommand::EnableAutoEnter { player: *player });
    }

    let world = {
        let engine = engine.clone();
        let shutdown = shutdown.clone();
        let ticks = options.ticks;
        let interval = options.tick_interval;
        thread::Builder::new()
            .name("world-tick".into())
            .spawn(move || run_world(engine, population, inbox, events, shutdown, ticks, interval))
    };
    let world = match world {
        Ok(handle) => handle,
        Err(e) => {
            log::error!("Failed to start world thread: {}", e);
            std::process::exit(1);
        }
    };

    // Operator loop: swap the first bot back and forth every few seconds
    let mut elapsed = Duration::ZERO;
    let poll = Duration::from_millis(100);
    while !shutdown.load(Ordering::Relaxed) && !world.is_finished() {
        thread::sleep(poll);
        elapsed += poll;
        if let Some(player) = swapper {
            if elapsed.as_millis() % 3000 == 0 {
                send(&commands, ArenaCommand::SwapCharacters { player });
            }
        }
    }
    shutdown.store(true, Ordering::Relaxed);

    let summary = match world.join() {
        Ok(summary) => summary,
        Err(_) => {
            log::error!("World thread panicked");
            WorldSummary::default()
        }
    };

    engine.shutdown();
    let stats = engine.coordinator().stats();

    println!();
    println!("=== Session summary ===");
    println!("  ticks:              {}", summary.ticks);
    println!("  zone events:        {}", summary.zone_events);
    println!("  auto-enter scans:   {}", summary.scans);
    println!("  commands run:       {} ({} failed)", summary.commands, summary.failed_commands);
    println!("  lifecycle events:   {}", summary.events);
    println!("  structures built:   {}", summary.builds);
    println!("  enters / exits:     {} / {}", stats.enters, stats.exits);
    println!("  no-op requests:     {}", stats.noop_requests);
    println!("  capture failures:   {}", stats.capture_failures);
    println!("  restore failures:   {}", stats.restore_failures);
    println!("  subscriber errors:  {}", stats.subscriber_failures);
    println!("  snapshots left:     {}", engine.snapshots().len());
    println!();
}

#[derive(Debug, Default)]
struct WorldSummary {
    ticks: u64,
    zone_events: usize,
    scans: usize,
    commands: usize,
    failed_commands: usize,
    events: usize,
    builds: u64,
}

/// The world-tick loop: commands, bot movement, then the engine tick
fn run_world(
    engine: Arc<ArenaEngine>,
    mut population: Population,
    inbox: Receiver<ArenaCommand>,
    events: Receiver<LifecycleEvent>,
    shutdown: Arc<AtomicBool>,
    max_ticks: Option<u64>,
    interval: Duration,
) -> WorldSummary {
    let mut summary = WorldSummary::default();

    while !shutdown.load(Ordering::Relaxed) && max_ticks.map_or(true, |max| summary.ticks < max) {
        for command in inbox.try_iter() {
            summary.commands += 1;
            if !engine.execute(command) {
                summary.failed_commands += 1;
            }
        }

        population.step(&engine);
        let report = engine.tick();
        summary.ticks += 1;
        summary.zone_events += report.zone_events;
        if report.scan.is_some() {
            summary.scans += 1;
        }

        for event in events.try_iter() {
            summary.events += 1;
            match &event {
                LifecycleEvent::PlayerEnteredArena { player, arena } => {
                    log::info!("[event] {} entered {}", player, arena)
                }
                LifecycleEvent::PlayerExitedArena { player, arena } => {
                    log::info!("[event] {} left {}", player, arena)
                }
                LifecycleEvent::ArenaStarted(arena) => log::info!("[event] {} started", arena),
                LifecycleEvent::ArenaEnded(arena) => log::info!("[event] {} ended", arena),
            }
        }

        thread::sleep(interval);
    }

    summary.builds = population.builds();
    log::info!("World thread stopping after {} tick(s)", summary.ticks);
    summary
}

/// Give one bot a spare arena body so the swap path gets exercised
fn provision_swapper(host: &MemoryHost, engine: &ArenaEngine, player: Option<PlayerId>) -> Option<PlayerId> {
    let player = player?;
    let normal = host.find_player(player)?.character;
    let spare = match host.spawn_body("Swapper (arena)", engine.config().character_swap.frozen_position) {
        Ok(body) => body,
        Err(e) => {
            log::warn!("Could not spawn arena body for {}: {}", player, e);
            return None;
        }
    };
    if !engine.swap().register_pair(player, normal, spare) {
        return None;
    }
    log::info!(
        "Player {} swaps between {} and {} (arena {})",
        player,
        normal,
        spare,
        engine.config().character_swap.arena
    );
    Some(player)
}

fn send(commands: &Sender<ArenaCommand>, command: ArenaCommand) {
    if commands.send(command).is_err() {
        log::warn!("World thread is gone, dropping command");
    }
}
