//! Arena Inventory - Items, Inventories and Equipment
//!
//! The live data a snapshot has to capture before a player's belongings are
//! cleared for arena use, and put back exactly on the way out.
//!
//! # Example
//!
//! ```ignore
//! use arena_inventory::prelude::*;
//!
//! let mut inventory = Inventory::new(20);
//! inventory.add_item(ItemStack::new("blood_potion", 3).with_category(ItemCategory::Consumable));
//!
//! let mut equipment = Equipment::new();
//! equipment.equip(EquipmentSlot::MainHand, ItemStack::single("iron_sword").with_durability(80.0, 100.0))?;
//! ```

pub mod equipment;
pub mod inventory;
pub mod item;

pub mod prelude {
    pub use crate::equipment::{EquipError, Equipment, EquipmentSlot};
    pub use crate::inventory::{Inventory, MAX_STACK};
    pub use crate::item::{ItemCategory, ItemProperty, ItemStack};
}

pub use prelude::*;
