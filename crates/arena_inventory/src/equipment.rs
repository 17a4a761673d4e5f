//! Equipment slots

use crate::item::ItemStack;
use serde::{Deserialize, Serialize};
use std::collections::HashMap;

/// Equipment slot types
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum EquipmentSlot {
    /// Head armor (helmet, hat)
    Head,
    /// Chest armor
    Chest,
    /// Leg armor
    Legs,
    /// Foot armor (boots)
    Feet,
    /// Hand armor (gloves)
    Hands,
    /// Main hand weapon
    MainHand,
    /// Off hand (shield, second weapon)
    OffHand,
    /// Accessory slot 1 (ring, amulet)
    Accessory1,
    /// Accessory slot 2
    Accessory2,
    /// Back slot (cape, bag)
    Back,
    /// Custom slot
    Custom(u32),
}

impl EquipmentSlot {
    /// Get all standard slots
    pub fn all_standard() -> Vec<Self> {
        vec![
            Self::Head,
            Self::Chest,
            Self::Legs,
            Self::Feet,
            Self::Hands,
            Self::MainHand,
            Self::OffHand,
            Self::Accessory1,
            Self::Accessory2,
            Self::Back,
        ]
    }
}

/// Equipment component
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Equipment {
    /// Equipped items per slot
    slots: HashMap<EquipmentSlot, ItemStack>,
    /// Available slots for this entity
    available_slots: Vec<EquipmentSlot>,
}

impl Equipment {
    /// Create new equipment with standard slots
    pub fn new() -> Self {
        Self::with_slots(EquipmentSlot::all_standard())
    }

    /// Create with custom slots
    pub fn with_slots(slots: Vec<EquipmentSlot>) -> Self {
        Self {
            slots: HashMap::new(),
            available_slots: slots,
        }
    }

    /// Check if slot is available
    pub fn has_slot(&self, slot: EquipmentSlot) -> bool {
        self.available_slots.contains(&slot)
    }

    /// Check if slot is occupied
    pub fn is_slot_occupied(&self, slot: EquipmentSlot) -> bool {
        self.slots.contains_key(&slot)
    }

    /// Equip an item
    /// Returns previously equipped item if any
    pub fn equip(&mut self, slot: EquipmentSlot, item: ItemStack) -> Result<Option<ItemStack>, EquipError> {
        if !self.has_slot(slot) {
            return Err(EquipError::SlotNotAvailable(slot));
        }
        Ok(self.slots.insert(slot, item))
    }

    /// Unequip item from slot
    pub fn unequip(&mut self, slot: EquipmentSlot) -> Option<ItemStack> {
        self.slots.remove(&slot)
    }

    /// All equipped items, ordered by slot
    pub fn all_equipped(&self) -> Vec<(EquipmentSlot, &ItemStack)> {
        let mut items: Vec<_> = self.slots.iter().map(|(slot, item)| (*slot, item)).collect();
        items.sort_by_key(|(slot, _)| *slot);
        items
    }

    /// Get count of equipped items
    pub fn equipped_count(&self) -> usize {
        self.slots.len()
    }

    /// Unequip everything, ordered by slot
    pub fn clear(&mut self) -> Vec<(EquipmentSlot, ItemStack)> {
        self.take_where(|_, _| true)
    }

    /// Unequip the slots matching `pred`, ordered by slot
    pub fn take_where<F>(&mut self, mut pred: F) -> Vec<(EquipmentSlot, ItemStack)>
    where
        F: FnMut(EquipmentSlot, &ItemStack) -> bool,
    {
        let mut matching: Vec<EquipmentSlot> = self
            .slots
            .iter()
            .filter(|(slot, item)| pred(**slot, item))
            .map(|(slot, _)| *slot)
            .collect();
        matching.sort();
        matching
            .into_iter()
            .filter_map(|slot| self.slots.remove(&slot).map(|item| (slot, item)))
            .collect()
    }
}

impl Default for Equipment {
    fn default() -> Self {
        Self::new()
    }
}

/// Equipment errors
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum EquipError {
    /// Slot is not available for this entity
    SlotNotAvailable(EquipmentSlot),
}

impl std::fmt::Display for EquipError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::SlotNotAvailable(slot) => write!(f, "Equipment slot not available: {:?}", slot),
        }
    }
}

impl std::error::Error for EquipError {}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::item::ItemCategory;

    #[test]
    fn test_equip_item() {
        let mut eq = Equipment::new();

        let result = eq.equip(EquipmentSlot::Head, ItemStack::single("iron_helmet"));

        assert!(result.unwrap().is_none());
        assert!(eq.is_slot_occupied(EquipmentSlot::Head));
    }

    #[test]
    fn test_equip_replace() {
        let mut eq = Equipment::new();

        eq.equip(EquipmentSlot::MainHand, ItemStack::single("iron_sword")).unwrap();
        let previous = eq
            .equip(EquipmentSlot::MainHand, ItemStack::single("steel_sword"))
            .unwrap();

        assert_eq!(previous.unwrap().item_id, "iron_sword");
    }

    #[test]
    fn test_custom_slots() {
        let mut eq = Equipment::with_slots(vec![EquipmentSlot::MainHand, EquipmentSlot::OffHand]);

        assert!(eq.has_slot(EquipmentSlot::MainHand));
        assert_eq!(
            eq.equip(EquipmentSlot::Head, ItemStack::single("hat")),
            Err(EquipError::SlotNotAvailable(EquipmentSlot::Head))
        );
    }

    #[test]
    fn test_take_where_is_slot_ordered() {
        let mut eq = Equipment::new();
        eq.equip(EquipmentSlot::Back, ItemStack::single("cape")).unwrap();
        eq.equip(EquipmentSlot::Head, ItemStack::single("hood")).unwrap();
        eq.equip(
            EquipmentSlot::MainHand,
            ItemStack::single("reaper").with_category(ItemCategory::Weapon),
        )
        .unwrap();

        let armor = eq.take_where(|_, item| item.category != ItemCategory::Weapon);
        let slots: Vec<_> = armor.iter().map(|(slot, _)| *slot).collect();

        assert_eq!(slots, vec![EquipmentSlot::Head, EquipmentSlot::Back]);
        assert_eq!(eq.equipped_count(), 1);
        assert_eq!(eq.clear().len(), 1);
    }
}
