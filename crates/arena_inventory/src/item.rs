//! Item stacks and their per-instance metadata

use serde::{Deserialize, Serialize};
use std::collections::HashMap;

/// Item category
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ItemCategory {
    /// Weapons (swords, axes, etc.)
    Weapon,
    /// Armor pieces
    Armor,
    /// Consumables (potions, food, etc.)
    Consumable,
    /// Materials for crafting
    Material,
    /// Quest items
    Quest,
    /// Key items (cannot be dropped)
    Key,
    /// Currency
    Currency,
    /// Misc items
    Misc,
    /// Custom category
    Custom(u32),
}

impl Default for ItemCategory {
    fn default() -> Self {
        Self::Misc
    }
}

/// Item property value
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub enum ItemProperty {
    /// Integer value
    Int(i64),
    /// Float value
    Float(f64),
    /// Boolean value
    Bool(bool),
    /// String value
    String(String),
}

impl ItemProperty {
    /// Get as integer
    pub fn as_int(&self) -> Option<i64> {
        match self {
            Self::Int(v) => Some(*v),
            Self::Float(v) => Some(*v as i64),
            _ => None,
        }
    }

    /// Get as float
    pub fn as_float(&self) -> Option<f64> {
        match self {
            Self::Float(v) => Some(*v),
            Self::Int(v) => Some(*v as f64),
            _ => None,
        }
    }
}

const ENCHANT_PREFIX: &str = "enchant:";

/// A stack of items in an inventory or equipment slot
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ItemStack {
    /// Item type identifier
    pub item_id: String,
    /// Quantity
    pub quantity: u32,
    /// Category, used by keep-list clearing
    #[serde(default)]
    pub category: ItemCategory,
    /// Instance-specific properties (durability, enchantments, etc.)
    #[serde(default)]
    pub instance_data: HashMap<String, ItemProperty>,
}

impl ItemStack {
    /// Create a new item stack
    pub fn new(item_id: impl Into<String>, quantity: u32) -> Self {
        Self {
            item_id: item_id.into(),
            quantity: quantity.max(1),
            category: ItemCategory::default(),
            instance_data: HashMap::new(),
        }
    }

    /// Create a single item
    pub fn single(item_id: impl Into<String>) -> Self {
        Self::new(item_id, 1)
    }

    /// Set category
    pub fn with_category(mut self, category: ItemCategory) -> Self {
        self.category = category;
        self
    }

    /// Set instance data
    pub fn with_data(mut self, key: impl Into<String>, value: ItemProperty) -> Self {
        self.instance_data.insert(key.into(), value);
        self
    }

    /// Set durability
    pub fn with_durability(self, current: f32, max: f32) -> Self {
        self.with_data("durability", ItemProperty::Float(current as f64))
            .with_data("max_durability", ItemProperty::Float(max as f64))
    }

    /// Get durability (current, max)
    pub fn durability(&self) -> Option<(f32, f32)> {
        let current = self.instance_data.get("durability")?.as_float()? as f32;
        let max = self.instance_data.get("max_durability")?.as_float()? as f32;
        Some((current, max))
    }

    /// Add an enchantment at the given level
    pub fn with_enchantment(self, name: &str, level: i64) -> Self {
        self.with_data(format!("{ENCHANT_PREFIX}{name}"), ItemProperty::Int(level))
    }

    /// Enchantments as (name, level), sorted by name
    pub fn enchantments(&self) -> Vec<(&str, i64)> {
        let mut out: Vec<_> = self
            .instance_data
            .iter()
            .filter_map(|(key, value)| {
                let name = key.strip_prefix(ENCHANT_PREFIX)?;
                Some((name, value.as_int()?))
            })
            .collect();
        out.sort_by(|a, b| a.0.cmp(b.0));
        out
    }

    /// Add to this stack (returns overflow if any)
    pub fn add(&mut self, amount: u32, max_stack: u32) -> u32 {
        let space = max_stack.saturating_sub(self.quantity);
        let to_add = amount.min(space);
        self.quantity += to_add;
        amount - to_add
    }

    /// Stacks merge only when neither carries instance data
    pub fn can_merge(&self, other: &ItemStack) -> bool {
        self.item_id == other.item_id
            && self.category == other.category
            && self.instance_data.is_empty()
            && other.instance_data.is_empty()
    }
}
