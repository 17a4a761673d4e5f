//! Clearing strategies for a body's belongings

use crate::error::SnapshotResult;
use arena_core::EntityRef;
use arena_host::{GameHost, GameHostExt};
use arena_inventory::{Equipment, Inventory, ItemCategory, ItemStack};
use serde::{Deserialize, Serialize};

/// How a body's inventory and equipment are emptied for arena use
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum ClearStrategy {
    /// Delete every item and unequip everything
    DeleteAll,
    /// Delete items except those whose category is on the keep-list
    KeepCategories { keep: Vec<ItemCategory> },
    /// Move everything into a fresh container entity next to the body
    MoveToContainer,
}

impl Default for ClearStrategy {
    fn default() -> Self {
        Self::DeleteAll
    }
}

/// What a clear did
#[derive(Debug, Clone, Default, PartialEq)]
pub struct ClearReport {
    /// Stacks removed from inventory and equipment
    pub removed: usize,
    /// Stacks left in place by a keep-list
    pub kept: usize,
    /// Container the removed stacks were moved into
    pub container: Option<EntityRef>,
}

impl ClearStrategy {
    /// Empty `body` according to this strategy
    pub fn apply<H: GameHost + ?Sized>(&self, host: &H, body: EntityRef) -> SnapshotResult<ClearReport> {
        let mut inventory: Inventory = host.read(body)?;
        let mut equipment: Equipment = host.read(body)?;

        let (taken, taken_equipped): (Vec<ItemStack>, Vec<ItemStack>) = match self {
            Self::DeleteAll | Self::MoveToContainer => (
                inventory.take_all().into_iter().map(|(_, item)| item).collect(),
                equipment.clear().into_iter().map(|(_, item)| item).collect(),
            ),
            Self::KeepCategories { keep } => (
                inventory
                    .take_where(|item| !keep.contains(&item.category))
                    .into_iter()
                    .map(|(_, item)| item)
                    .collect(),
                equipment
                    .take_where(|_, item| !keep.contains(&item.category))
                    .into_iter()
                    .map(|(_, item)| item)
                    .collect(),
            ),
        };

        let mut report = ClearReport {
            removed: taken.len() + taken_equipped.len(),
            kept: inventory.used_slots() + equipment.equipped_count(),
            container: None,
        };

        if *self == Self::MoveToContainer && report.removed > 0 {
            report.container = Some(stash_items(host, body, taken.into_iter().chain(taken_equipped))?);
        }

        let written = host
            .write(body, inventory)
            .and_then(|_| host.write(body, equipment));
        if let Err(err) = written {
            // the caller rolls the body back from its snapshot, so a stash would duplicate items
            if let Some(container) = report.container {
                discard_container(host, container);
            }
            return Err(err.into());
        }

        log::debug!("Cleared {} with {:?}: {:?}", body, self, report);
        Ok(report)
    }
}

/// Create a container next to `body` holding `items`
fn stash_items<H, I>(host: &H, body: EntityRef, items: I) -> SnapshotResult<EntityRef>
where
    H: GameHost + ?Sized,
    I: Iterator<Item = ItemStack>,
{
    let items: Vec<ItemStack> = items.collect();
    let container = host.create_entity()?;
    let mut stash = Inventory::new(items.len());
    for item in items {
        stash.add_item(item);
    }

    let placed = host
        .write(container, stash)
        .and_then(|_| host.position(body))
        .and_then(|position| host.set_position(container, position));
    if let Err(err) = placed {
        discard_container(host, container);
        return Err(err.into());
    }
    Ok(container)
}

fn discard_container<H: GameHost + ?Sized>(host: &H, container: EntityRef) {
    if let Err(err) = host.destroy(container) {
        log::error!("Could not remove overflow container {}: {}", container, err);
    }
}
