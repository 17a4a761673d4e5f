//! Snapshot data

use crate::error::{SnapshotError, SnapshotResult};
use arena_core::{EntityRef, PlayerId, Timestamp, Vec3};
use arena_host::{GameHost, GameHostExt, Identity};
use arena_inventory::{Equipment, EquipmentSlot, Inventory, ItemStack};
use serde::{Deserialize, Serialize};
use std::fmt;
use uuid::Uuid;

/// Current snapshot format version
pub const SNAPSHOT_VERSION: u32 = 1;

/// Snapshot key: one snapshot per player per context label
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct SnapshotKey {
    pub player: PlayerId,
    pub context: String,
}

impl SnapshotKey {
    pub fn new(player: PlayerId, context: impl Into<String>) -> Self {
        Self {
            player,
            context: context.into(),
        }
    }
}

impl fmt::Display for SnapshotKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}_{}", self.player, self.context)
    }
}

/// One occupied inventory slot
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct InventoryRecord {
    pub slot: usize,
    pub item: ItemStack,
}

/// Inventory contents in slot order
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct InventorySnapshot {
    pub capacity: usize,
    pub items: Vec<InventoryRecord>,
}

impl InventorySnapshot {
    pub fn from_inventory(inventory: &Inventory) -> Self {
        Self {
            capacity: inventory.capacity(),
            items: inventory
                .items()
                .map(|(slot, item)| InventoryRecord {
                    slot,
                    item: item.clone(),
                })
                .collect(),
        }
    }

    /// Rebuild `live` so it holds exactly these records.
    /// Whatever `live` held before is discarded.
    pub fn apply(&self, live: &mut Inventory) -> SnapshotResult<()> {
        live.take_all();
        live.resize(self.capacity);
        for record in &self.items {
            live.put_in_slot(record.slot, record.item.clone())
                .map_err(|item| SnapshotError::Placement {
                    item: item.item_id,
                    place: format!("inventory slot {}", record.slot),
                })?;
        }
        Ok(())
    }

    pub fn item_count(&self) -> usize {
        self.items.len()
    }
}

/// One equipped slot; durability and enchantments ride in the stack's
/// instance data
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct EquippedRecord {
    pub slot: EquipmentSlot,
    pub item: ItemStack,
}

/// Equipped items in slot order
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct EquipmentSnapshot {
    pub items: Vec<EquippedRecord>,
}

impl EquipmentSnapshot {
    pub fn from_equipment(equipment: &Equipment) -> Self {
        Self {
            items: equipment
                .all_equipped()
                .into_iter()
                .map(|(slot, item)| EquippedRecord {
                    slot,
                    item: item.clone(),
                })
                .collect(),
        }
    }

    /// Rebuild `live` so exactly these slots are equipped
    pub fn apply(&self, live: &mut Equipment) -> SnapshotResult<()> {
        live.clear();
        for record in &self.items {
            live.equip(record.slot, record.item.clone())
                .map_err(|err| SnapshotError::Placement {
                    item: record.item.item_id.clone(),
                    place: err.to_string(),
                })?;
        }
        Ok(())
    }
}

/// Everything captured about a player before arena mutation
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PlayerSnapshot {
    /// Format version
    pub version: u32,
    /// Unique id of this capture
    pub id: Uuid,
    pub key: SnapshotKey,
    /// Body the state was read from
    pub body: EntityRef,
    pub captured_at: Timestamp,
    pub inventory: InventorySnapshot,
    pub equipment: EquipmentSnapshot,
    pub identity: Identity,
    pub position: Vec3,
    /// Container holding items moved out by an overflow clear
    #[serde(default)]
    pub stash: Option<EntityRef>,
}

impl PlayerSnapshot {
    /// Read the live state of `body`
    pub fn capture<H: GameHost + ?Sized>(
        host: &H,
        key: SnapshotKey,
        body: EntityRef,
        now: Timestamp,
    ) -> SnapshotResult<Self> {
        let inventory: Inventory = host.read(body)?;
        let equipment: Equipment = host.read(body)?;
        let identity: Identity = host.read(body)?;
        let position = host.position(body)?;

        Ok(Self {
            version: SNAPSHOT_VERSION,
            id: Uuid::new_v4(),
            key,
            body,
            captured_at: now,
            inventory: InventorySnapshot::from_inventory(&inventory),
            equipment: EquipmentSnapshot::from_equipment(&equipment),
            identity,
            position,
            stash: None,
        })
    }

    /// Write the captured state onto `target`
    pub fn apply<H: GameHost + ?Sized>(&self, host: &H, target: EntityRef) -> SnapshotResult<()> {
        let mut inventory = host
            .try_read::<Inventory>(target)?
            .unwrap_or_else(|| Inventory::new(self.inventory.capacity));
        self.inventory.apply(&mut inventory)?;

        let mut equipment = host.try_read::<Equipment>(target)?.unwrap_or_default();
        self.equipment.apply(&mut equipment)?;

        host.write(target, inventory)?;
        host.write(target, equipment)?;
        host.write(target, self.identity.clone())?;
        host.set_position(target, self.position)?;
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use arena_host::MemoryHost;
    use arena_inventory::ItemCategory;

    fn stocked_body(host: &MemoryHost) -> EntityRef {
        let body = host.spawn_body("Vlad", Vec3::new(3.0, 0.0, 4.0)).unwrap();
        host.update::<Inventory, _>(body, |inv| {
            inv.put_in_slot(4, ItemStack::new("blood_rose", 12).with_category(ItemCategory::Material))
                .unwrap();
            inv.put_in_slot(0, ItemStack::single("waypoint_scroll")).unwrap();
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
        body
    }

    #[test]
    fn test_capture_reads_live_state() {
        let host = MemoryHost::new();
        let body = stocked_body(&host);

        let snap = PlayerSnapshot::capture(&host, SnapshotKey::new(PlayerId(1), "practice"), body, Timestamp::ZERO)
            .unwrap();

        assert_eq!(snap.inventory.item_count(), 2);
        assert_eq!(snap.inventory.items[0].slot, 0);
        assert_eq!(snap.inventory.items[1].slot, 4);
        assert_eq!(snap.equipment.items[0].slot, EquipmentSlot::MainHand);
        assert_eq!(snap.equipment.items[0].item.durability(), Some((75.0, 100.0)));
        assert_eq!(snap.identity.display_name, "Vlad");
        assert_eq!(snap.position, Vec3::new(3.0, 0.0, 4.0));
    }

    #[test]
    fn test_apply_replaces_arena_state() {
        let host = MemoryHost::new();
        let body = stocked_body(&host);
        let snap = PlayerSnapshot::capture(&host, SnapshotKey::new(PlayerId(1), "practice"), body, Timestamp::ZERO)
            .unwrap();
        let before_inv: Inventory = host.read(body).unwrap();
        let before_eq: Equipment = host.read(body).unwrap();

        host.write(body, Inventory::new(8)).unwrap();
        host.update::<Inventory, _>(body, |inv| {
            inv.add_item(ItemStack::single("arena_sword"));
        })
        .unwrap();
        host.write(body, Equipment::new()).unwrap();
        host.write(body, Identity::new("[PvP] Vlad")).unwrap();
        host.set_position(body, Vec3::ZERO).unwrap();

        snap.apply(&host, body).unwrap();

        assert_eq!(host.read::<Inventory>(body).unwrap(), before_inv);
        assert_eq!(host.read::<Equipment>(body).unwrap(), before_eq);
        assert_eq!(host.read::<Identity>(body).unwrap().display_name, "Vlad");
        assert_eq!(host.position(body).unwrap(), Vec3::new(3.0, 0.0, 4.0));
    }

    #[test]
    fn test_capture_requires_components() {
        let host = MemoryHost::new();
        let bare = host.create_entity().unwrap();

        let result = PlayerSnapshot::capture(&host, SnapshotKey::new(PlayerId(1), "practice"), bare, Timestamp::ZERO);
        assert!(matches!(result, Err(SnapshotError::Host(_))));
    }
}
