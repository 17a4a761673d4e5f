//! Lifecycle notifications for UI and telemetry
//!
//! Events are fire-and-forget. They are published after the coordinator
//! lock is released, listeners run under `catch_unwind`, and channel
//! receivers that have gone away are dropped silently.

use crate::subscriber::panic_message;
use arena_core::{ArenaId, PlayerId};
use crossbeam_channel::{Receiver, Sender};
use parking_lot::RwLock;
use serde::{Deserialize, Serialize};
use std::panic::{self, AssertUnwindSafe};

/// Something observable happened in the arena lifecycle
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub enum LifecycleEvent {
    PlayerEnteredArena { player: PlayerId, arena: ArenaId },
    PlayerExitedArena { player: PlayerId, arena: ArenaId },
    ArenaStarted(ArenaId),
    ArenaEnded(ArenaId),
}

impl LifecycleEvent {
    /// Player concerned, if any
    pub fn player(&self) -> Option<PlayerId> {
        match self {
            Self::PlayerEnteredArena { player, .. } | Self::PlayerExitedArena { player, .. } => Some(*player),
            Self::ArenaStarted(_) | Self::ArenaEnded(_) => None,
        }
    }
}

type Listener = Box<dyn Fn(&LifecycleEvent) + Send + Sync>;

/// Fan-out point for [`LifecycleEvent`]s
#[derive(Default)]
pub struct LifecycleEvents {
    listeners: RwLock<Vec<Listener>>,
    senders: RwLock<Vec<Sender<LifecycleEvent>>>,
}

impl LifecycleEvents {
    pub fn new() -> Self {
        Self::default()
    }

    /// Register a callback listener
    pub fn subscribe<F>(&self, listener: F)
    where
        F: Fn(&LifecycleEvent) + Send + Sync + 'static,
    {
        self.listeners.write().push(Box::new(listener));
    }

    /// Open an unbounded channel receiving every later event
    pub fn channel(&self) -> Receiver<LifecycleEvent> {
        let (tx, rx) = crossbeam_channel::unbounded();
        self.senders.write().push(tx);
        rx
    }

    /// Deliver an event to every listener and channel
    pub fn publish(&self, event: LifecycleEvent) {
        for listener in self.listeners.read().iter() {
            if let Err(payload) = panic::catch_unwind(AssertUnwindSafe(|| listener(&event))) {
                log::warn!("Event listener panicked on {:?}: {}", event, panic_message(payload.as_ref()));
            }
        }

        let mut senders = self.senders.write();
        senders.retain(|tx| tx.send(event.clone()).is_ok());
    }

    pub fn listener_count(&self) -> usize {
        self.listeners.read().len() + self.senders.read().len()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::atomic::{AtomicUsize, Ordering};
    use std::sync::Arc;

    fn entered(player: u64) -> LifecycleEvent {
        LifecycleEvent::PlayerEnteredArena {
            player: PlayerId(player),
            arena: ArenaId::new("main_arena"),
        }
    }

    #[test]
    fn test_listener_and_channel_receive() {
        let events = LifecycleEvents::new();
        let seen = Arc::new(AtomicUsize::new(0));
        let counter = seen.clone();
        events.subscribe(move |_| {
            counter.fetch_add(1, Ordering::SeqCst);
        });
        let rx = events.channel();

        events.publish(entered(42));

        assert_eq!(seen.load(Ordering::SeqCst), 1);
        assert_eq!(rx.try_recv().unwrap().player(), Some(PlayerId(42)));
    }

    #[test]
    fn test_panicking_listener_does_not_stop_delivery() {
        let events = LifecycleEvents::new();
        events.subscribe(|_| panic!("listener bug"));
        let rx = events.channel();

        events.publish(entered(1));
        events.publish(LifecycleEvent::ArenaEnded(ArenaId::new("main_arena")));

        assert_eq!(rx.try_iter().count(), 2);
    }

    #[test]
    fn test_dropped_receiver_is_pruned() {
        let events = LifecycleEvents::new();
        drop(events.channel());
        let rx = events.channel();
        assert_eq!(events.listener_count(), 2);

        events.publish(entered(1));

        assert_eq!(events.listener_count(), 1);
        assert!(rx.try_recv().is_ok());
    }
}
