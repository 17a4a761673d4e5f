//! Snapshot store

use crate::clear::{ClearReport, ClearStrategy};
use crate::error::{SnapshotError, SnapshotResult};
use crate::persistence::{SnapshotDisk, SnapshotFormat};
use crate::snapshot::{PlayerSnapshot, SnapshotKey};
use arena_core::{Clock, EntityRef, PlayerId};
use arena_host::GameHost;
use parking_lot::RwLock;
use std::collections::HashMap;
use std::path::PathBuf;
use std::sync::Arc;

/// Keyed snapshots of player state, written through to disk when opened
/// with a directory.
///
/// The boolean methods (`capture`, `restore`, `clear`) log their failure
/// cause and are what the lifecycle engine calls; the `try_` variants
/// return the error.
pub struct SnapshotStore {
    host: Arc<dyn GameHost>,
    clock: Arc<dyn Clock>,
    entries: RwLock<HashMap<SnapshotKey, PlayerSnapshot>>,
    disk: Option<SnapshotDisk>,
}

impl SnapshotStore {
    /// Store without persistence
    pub fn in_memory(host: Arc<dyn GameHost>, clock: Arc<dyn Clock>) -> Self {
        Self {
            host,
            clock,
            entries: RwLock::new(HashMap::new()),
            disk: None,
        }
    }

    /// Store persisted under `dir`, loading every snapshot already there
    pub fn open(
        host: Arc<dyn GameHost>,
        clock: Arc<dyn Clock>,
        dir: impl Into<PathBuf>,
        format: SnapshotFormat,
    ) -> SnapshotResult<Self> {
        let disk = SnapshotDisk::new(dir, format);
        let loaded = disk.load_all()?;
        if !loaded.is_empty() {
            log::info!("Loaded {} persisted snapshot(s) from {}", loaded.len(), disk.dir().display());
        }
        let entries = loaded
            .into_iter()
            .map(|snapshot| (snapshot.key.clone(), snapshot))
            .collect();
        Ok(Self {
            host,
            clock,
            entries: RwLock::new(entries),
            disk: Some(disk),
        })
    }

    /// Capture `body`'s live state for `(player, context)`
    pub fn capture(&self, player: PlayerId, context: &str, body: EntityRef) -> bool {
        match self.try_capture(player, context, body) {
            Ok(()) => true,
            Err(err) => {
                log::error!("Snapshot capture failed for player {} ({}): {}", player, context, err);
                false
            }
        }
    }

    /// Capture, refusing to overwrite an existing snapshot
    pub fn try_capture(&self, player: PlayerId, context: &str, body: EntityRef) -> SnapshotResult<()> {
        let key = SnapshotKey::new(player, context);
        let mut entries = self.entries.write();
        if entries.contains_key(&key) {
            return Err(SnapshotError::AlreadyExists(key));
        }

        let snapshot = PlayerSnapshot::capture(self.host.as_ref(), key.clone(), body, self.clock.now())?;
        if let Some(disk) = &self.disk {
            disk.save(&snapshot)?;
        }

        log::debug!(
            "Captured snapshot {} for {} ({} items, {} equipped)",
            snapshot.id,
            key,
            snapshot.inventory.item_count(),
            snapshot.equipment.items.len()
        );
        entries.insert(key, snapshot);
        Ok(())
    }

    /// Restore onto the body the snapshot was taken from
    pub fn restore(&self, player: PlayerId, context: &str) -> bool {
        self.restore_onto(player, context, None)
    }

    /// Restore onto `target`, or the captured body when `None`
    pub fn restore_onto(&self, player: PlayerId, context: &str, target: Option<EntityRef>) -> bool {
        match self.try_restore(player, context, target) {
            Ok(()) => true,
            Err(SnapshotError::NotFound(key)) => {
                log::warn!("No snapshot to restore for {}", key);
                false
            }
            Err(err) => {
                log::error!("Snapshot restore failed for player {} ({}): {}", player, context, err);
                false
            }
        }
    }

    /// Re-apply and then delete the snapshot.
    /// On any error the snapshot is kept.
    pub fn try_restore(&self, player: PlayerId, context: &str, target: Option<EntityRef>) -> SnapshotResult<()> {
        let key = SnapshotKey::new(player, context);
        let mut entries = self.entries.write();
        let snapshot = entries
            .get(&key)
            .ok_or_else(|| SnapshotError::NotFound(key.clone()))?;

        let target = target.unwrap_or(snapshot.body);
        snapshot.apply(self.host.as_ref(), target)?;

        if let Some(stash) = snapshot.stash {
            if self.host.exists(stash) {
                if let Err(err) = self.host.destroy(stash) {
                    log::warn!("Could not remove overflow container {} for {}: {}", stash, key, err);
                }
            }
        }

        if let Some(disk) = &self.disk {
            disk.delete(&key)?;
        }
        entries.remove(&key);

        log::debug!("Restored and deleted snapshot for {} onto {}", key, target);
        Ok(())
    }

    /// Whether a snapshot is held for `(player, context)`
    pub fn has_snapshot(&self, player: PlayerId, context: &str) -> bool {
        self.entries.read().contains_key(&SnapshotKey::new(player, context))
    }

    /// Copy of a held snapshot
    pub fn get(&self, player: PlayerId, context: &str) -> Option<PlayerSnapshot> {
        self.entries.read().get(&SnapshotKey::new(player, context)).cloned()
    }

    /// Empty the captured body per `strategy`
    pub fn clear(&self, player: PlayerId, context: &str, strategy: &ClearStrategy) -> bool {
        match self.try_clear(player, context, strategy) {
            Ok(_) => true,
            Err(err) => {
                log::error!("Clearing player {} ({}) failed: {}", player, context, err);
                false
            }
        }
    }

    /// Clear the body a snapshot was taken from.
    /// Refuses to run unless that snapshot exists.
    pub fn try_clear(&self, player: PlayerId, context: &str, strategy: &ClearStrategy) -> SnapshotResult<ClearReport> {
        let key = SnapshotKey::new(player, context);
        let mut entries = self.entries.write();
        let snapshot = entries
            .get_mut(&key)
            .ok_or_else(|| SnapshotError::NotFound(key.clone()))?;

        let report = strategy.apply(self.host.as_ref(), snapshot.body)?;

        if report.container.is_some() {
            snapshot.stash = report.container;
            if let Some(disk) = &self.disk {
                disk.save(snapshot)?;
            }
        }
        Ok(report)
    }

    /// Empty a body that has no snapshot to protect (a disposable body)
    pub fn clear_body(&self, body: EntityRef, strategy: &ClearStrategy) -> SnapshotResult<ClearReport> {
        strategy.apply(self.host.as_ref(), body)
    }

    /// Drop a snapshot without restoring it
    pub fn discard(&self, player: PlayerId, context: &str) -> SnapshotResult<bool> {
        let key = SnapshotKey::new(player, context);
        let mut entries = self.entries.write();
        if !entries.contains_key(&key) {
            return Ok(false);
        }
        if let Some(disk) = &self.disk {
            disk.delete(&key)?;
        }
        entries.remove(&key);
        log::info!("Discarded snapshot for {}", key);
        Ok(true)
    }

    /// Keys held under a context label, sorted
    pub fn keys_for_context(&self, context: &str) -> Vec<SnapshotKey> {
        let mut keys: Vec<_> = self
            .entries
            .read()
            .keys()
            .filter(|key| key.context == context)
            .cloned()
            .collect();
        keys.sort();
        keys
    }

    /// Number of snapshots held
    pub fn len(&self) -> usize {
        self.entries.read().len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Whether snapshots are written to disk
    pub fn is_persistent(&self) -> bool {
        self.disk.is_some()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use arena_core::{ManualClock, Timestamp, Vec3};
    use arena_host::{ComponentKind, GameHostExt, Identity, MemoryHost};
    use arena_inventory::{Equipment, EquipmentSlot, Inventory, ItemCategory, ItemStack};

    struct Fixture {
        host: Arc<MemoryHost>,
        clock: Arc<ManualClock>,
        body: EntityRef,
    }

    fn fixture() -> Fixture {
        let host = Arc::new(MemoryHost::new());
        let clock = Arc::new(ManualClock::new(Timestamp::from_millis(10_000)));
        let body = host.spawn_body("Vlad", Vec3::new(5.0, 0.0, 5.0)).unwrap();
        host.update::<Inventory, _>(body, |inv| {
            inv.add_item(ItemStack::new("blood_rose", 12).with_category(ItemCategory::Material));
            inv.add_item(ItemStack::single("crypt_key").with_category(ItemCategory::Key));
        })
        .unwrap();
        host.update::<Equipment, _>(body, |eq| {
            eq.equip(
                EquipmentSlot::MainHand,
                ItemStack::single("dread_axe").with_durability(75.0, 100.0).with_enchantment("leech", 2),
            )
            .unwrap();
        })
        .unwrap();
        Fixture { host, clock, body }
    }

    fn store(fx: &Fixture) -> SnapshotStore {
        SnapshotStore::in_memory(fx.host.clone(), fx.clock.clone())
    }

    #[test]
    fn test_capture_clear_restore_round_trip() {
        let fx = fixture();
        let store = store(&fx);
        let player = PlayerId(42);
        let inv_before: Inventory = fx.host.read(fx.body).unwrap();
        let eq_before: Equipment = fx.host.read(fx.body).unwrap();

        assert!(store.capture(player, "practice", fx.body));
        assert!(store.has_snapshot(player, "practice"));
        assert!(store.clear(player, "practice", &ClearStrategy::DeleteAll));
        assert!(fx.host.read::<Inventory>(fx.body).unwrap().is_empty());

        assert!(store.restore(player, "practice"));

        assert_eq!(fx.host.read::<Inventory>(fx.body).unwrap(), inv_before);
        assert_eq!(fx.host.read::<Equipment>(fx.body).unwrap(), eq_before);
        assert!(!store.has_snapshot(player, "practice"));
    }

    #[test]
    fn test_capture_refuses_overwrite() {
        let fx = fixture();
        let store = store(&fx);

        assert!(store.capture(PlayerId(1), "practice", fx.body));
        let first = store.get(PlayerId(1), "practice").unwrap();
        assert!(matches!(
            store.try_capture(PlayerId(1), "practice", fx.body),
            Err(SnapshotError::AlreadyExists(_))
        ));
        assert_eq!(store.get(PlayerId(1), "practice").unwrap().id, first.id);
        assert!(store.capture(PlayerId(1), "normal", fx.body));
        assert_eq!(store.len(), 2);
    }

    #[test]
    fn test_restore_missing_snapshot_is_false() {
        let fx = fixture();
        let store = store(&fx);
        assert!(!store.restore(PlayerId(9), "practice"));
        assert!(matches!(
            store.try_restore(PlayerId(9), "practice", None),
            Err(SnapshotError::NotFound(_))
        ));
    }

    #[test]
    fn test_clear_requires_snapshot() {
        let fx = fixture();
        let store = store(&fx);

        assert!(!store.clear(PlayerId(1), "practice", &ClearStrategy::DeleteAll));
        assert_eq!(fx.host.read::<Inventory>(fx.body).unwrap().used_slots(), 2);
    }

    #[test]
    fn test_failed_restore_keeps_snapshot() {
        let fx = fixture();
        let store = store(&fx);
        store.capture(PlayerId(1), "practice", fx.body);

        fx.host.fail_writes(fx.body, ComponentKind::Identity);
        assert!(!store.restore(PlayerId(1), "practice"));
        assert!(store.has_snapshot(PlayerId(1), "practice"));

        fx.host.clear_faults();
        assert!(store.restore(PlayerId(1), "practice"));
    }

    #[test]
    fn test_every_strategy_restores_original() {
        let strategies = [
            ClearStrategy::DeleteAll,
            ClearStrategy::KeepCategories {
                keep: vec![ItemCategory::Key],
            },
            ClearStrategy::MoveToContainer,
        ];
        for strategy in strategies {
            let fx = fixture();
            let store = store(&fx);
            let inv_before: Inventory = fx.host.read(fx.body).unwrap();
            let eq_before: Equipment = fx.host.read(fx.body).unwrap();
            let entities_before = fx.host.entity_count();

            store.capture(PlayerId(3), "practice", fx.body);
            assert!(store.clear(PlayerId(3), "practice", &strategy));
            fx.host
                .update::<Inventory, _>(fx.body, |inv| {
                    inv.add_item(ItemStack::single("arena_blade"));
                })
                .unwrap();

            assert!(store.restore(PlayerId(3), "practice"), "{:?}", strategy);
            assert_eq!(fx.host.read::<Inventory>(fx.body).unwrap(), inv_before, "{:?}", strategy);
            assert_eq!(fx.host.read::<Equipment>(fx.body).unwrap(), eq_before, "{:?}", strategy);
            assert_eq!(fx.host.entity_count(), entities_before, "{:?}", strategy);
        }
    }

    #[test]
    fn test_restore_onto_other_body() {
        let fx = fixture();
        let store = store(&fx);
        let other = fx.host.spawn_body("Spare", Vec3::ZERO).unwrap();

        store.capture(PlayerId(1), "normal", fx.body);
        assert!(store.restore_onto(PlayerId(1), "normal", Some(other)));

        let identity: Identity = fx.host.read(other).unwrap();
        assert_eq!(identity.display_name, "Vlad");
        assert_eq!(fx.host.position(other).unwrap(), Vec3::new(5.0, 0.0, 5.0));
    }

    #[test]
    fn test_persisted_snapshot_survives_reopen() {
        let fx = fixture();
        let dir = tempfile::tempdir().unwrap();
        {
            let store =
                SnapshotStore::open(fx.host.clone(), fx.clock.clone(), dir.path(), SnapshotFormat::Binary).unwrap();
            assert!(store.capture(PlayerId(7), "practice", fx.body));
            assert!(store.clear(PlayerId(7), "practice", &ClearStrategy::MoveToContainer));
        }

        let reopened =
            SnapshotStore::open(fx.host.clone(), fx.clock.clone(), dir.path(), SnapshotFormat::Binary).unwrap();
        assert_eq!(reopened.keys_for_context("practice"), vec![SnapshotKey::new(PlayerId(7), "practice")]);
        let held = reopened.get(PlayerId(7), "practice").unwrap();
        assert!(held.stash.is_some());
        assert_eq!(held.captured_at, Timestamp::from_millis(10_000));

        assert!(reopened.restore(PlayerId(7), "practice"));
        assert!(reopened.is_empty());
        assert_eq!(std::fs::read_dir(dir.path()).unwrap().count(), 0);
    }

    #[test]
    fn test_discard() {
        let fx = fixture();
        let store = store(&fx);
        store.capture(PlayerId(1), "practice", fx.body);

        assert!(store.discard(PlayerId(1), "practice").unwrap());
        assert!(!store.discard(PlayerId(1), "practice").unwrap());
        assert!(!store.has_snapshot(PlayerId(1), "practice"));
    }
}
