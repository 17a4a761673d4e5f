//! Slot-based inventory component

use crate::item::ItemStack;
use serde::{Deserialize, Serialize};

/// Largest quantity one slot holds
pub const MAX_STACK: u32 = 99;

/// Inventory component
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Inventory {
    /// Inventory slots (None = empty)
    slots: Vec<Option<ItemStack>>,
}

impl Inventory {
    /// Create a new inventory with given capacity
    pub fn new(capacity: usize) -> Self {
        Self {
            slots: vec![None; capacity],
        }
    }

    /// Get inventory capacity
    pub fn capacity(&self) -> usize {
        self.slots.len()
    }

    /// Grow or shrink to `capacity` slots; shrinking drops trailing slots
    pub fn resize(&mut self, capacity: usize) {
        self.slots.resize(capacity, None);
    }

    /// Get number of used slots
    pub fn used_slots(&self) -> usize {
        self.slots.iter().filter(|s| s.is_some()).count()
    }

    /// Check if inventory is empty
    pub fn is_empty(&self) -> bool {
        self.used_slots() == 0
    }

    /// Find first empty slot
    pub fn find_empty_slot(&self) -> Option<usize> {
        self.slots.iter().position(|s| s.is_none())
    }

    /// Count total quantity of an item
    pub fn count_item(&self, item_id: &str) -> u32 {
        self.slots
            .iter()
            .filter_map(|s| s.as_ref())
            .filter(|i| i.item_id == item_id)
            .map(|i| i.quantity)
            .sum()
    }

    /// Add item to inventory
    /// Returns overflow (amount that couldn't fit)
    pub fn add_item(&mut self, mut stack: ItemStack) -> u32 {
        for existing in self.slots.iter_mut().flatten() {
            if existing.quantity < MAX_STACK && existing.can_merge(&stack) {
                stack.quantity = existing.add(stack.quantity, MAX_STACK);
                if stack.quantity == 0 {
                    return 0;
                }
            }
        }

        while stack.quantity > 0 {
            let Some(empty_slot) = self.find_empty_slot() else {
                break;
            };
            let amount = stack.quantity.min(MAX_STACK);
            self.slots[empty_slot] = Some(ItemStack {
                quantity: amount,
                ..stack.clone()
            });
            stack.quantity -= amount;
        }

        stack.quantity
    }

    /// Place a stack into an exact slot, which must be empty.
    /// Returns the stack back if the slot is out of range or occupied.
    pub fn put_in_slot(&mut self, slot: usize, stack: ItemStack) -> Result<(), ItemStack> {
        match self.slots.get_mut(slot) {
            Some(entry @ None) => {
                *entry = Some(stack);
                Ok(())
            }
            _ => Err(stack),
        }
    }

    /// Empty every slot, returning what was held with its slot index
    pub fn take_all(&mut self) -> Vec<(usize, ItemStack)> {
        self.take_where(|_| true)
    }

    /// Empty the slots whose stack matches `pred`
    pub fn take_where<F>(&mut self, mut pred: F) -> Vec<(usize, ItemStack)>
    where
        F: FnMut(&ItemStack) -> bool,
    {
        let mut taken = Vec::new();
        for (index, slot) in self.slots.iter_mut().enumerate() {
            if slot.as_ref().map(&mut pred).unwrap_or(false) {
                if let Some(stack) = slot.take() {
                    taken.push((index, stack));
                }
            }
        }
        taken
    }

    /// Get all items as iterator
    pub fn items(&self) -> impl Iterator<Item = (usize, &ItemStack)> {
        self.slots
            .iter()
            .enumerate()
            .filter_map(|(i, s)| s.as_ref().map(|stack| (i, stack)))
    }
}

impl Default for Inventory {
    fn default() -> Self {
        Self::new(20)
    }
}
