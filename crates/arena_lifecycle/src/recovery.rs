//! Crash recovery
//!
//! A snapshot still on disk at startup belongs to a player who was in arena
//! mode when the process stopped. Their belongings are restored before any
//! new transition runs.

use crate::coordinator::LifecycleCoordinator;
use arena_core::PlayerId;
use serde::Serialize;

/// Outcome of a recovery pass
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct RecoveryReport {
    pub restored: Vec<PlayerId>,
    /// Players whose snapshot is kept for a later attempt
    pub failed: Vec<PlayerId>,
}

impl RecoveryReport {
    pub fn is_empty(&self) -> bool {
        self.restored.is_empty() && self.failed.is_empty()
    }

    pub fn merge(&mut self, other: RecoveryReport) {
        self.restored.extend(other.restored);
        self.failed.extend(other.failed);
    }
}

impl LifecycleCoordinator {
    /// Restore every orphaned snapshot under `context`.
    ///
    /// A snapshot is orphaned when its player has no live arena record. It
    /// is applied to the body it was taken from, or to the player's current
    /// body if that one is gone. Failed restores keep the snapshot.
    pub fn recover_pending(&self, context: &str) -> RecoveryReport {
        let mut report = RecoveryReport::default();

        for key in self.snapshots().keys_for_context(context) {
            let player = key.player;
            if self.has_record(player) {
                continue;
            }
            let Some(snapshot) = self.snapshots().get(player, context) else {
                continue;
            };

            let target = if self.host().exists(snapshot.body) {
                Some(snapshot.body)
            } else {
                self.host().find_player(player).map(|handles| handles.character)
            };
            let Some(target) = target else {
                log::error!("No body to recover {} onto, keeping snapshot", key);
                report.failed.push(player);
                continue;
            };

            if self.snapshots().restore_onto(player, context, Some(target)) {
                log::info!("Recovered player {} from {} snapshot onto {}", player, context, target);
                report.restored.push(player);
            } else {
                log::error!("Recovery of player {} ({}) failed, keeping snapshot", player, context);
                report.failed.push(player);
            }
        }

        if !report.is_empty() {
            log::info!(
                "Recovery of '{}': {} restored, {} failed",
                context,
                report.restored.len(),
                report.failed.len()
            );
        }
        report
    }
}
