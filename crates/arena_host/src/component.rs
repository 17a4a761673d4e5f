//! Components the lifecycle engine reads and writes through the host

use arena_core::{ArenaId, EntityRef, PlayerId};
use arena_inventory::{Equipment, Inventory};
use serde::{Deserialize, Serialize};

/// Component type tag
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum ComponentKind {
    Identity,
    Inventory,
    Equipment,
    Controller,
    Session,
    Structure,
}

/// A component value of any kind
#[derive(Debug, Clone, PartialEq)]
pub enum ComponentValue {
    Identity(Identity),
    Inventory(Inventory),
    Equipment(Equipment),
    Controller(Controller),
    Session(Session),
    Structure(Structure),
}

impl ComponentValue {
    /// Kind tag of this value
    pub fn kind(&self) -> ComponentKind {
        match self {
            Self::Identity(_) => ComponentKind::Identity,
            Self::Inventory(_) => ComponentKind::Inventory,
            Self::Equipment(_) => ComponentKind::Equipment,
            Self::Controller(_) => ComponentKind::Controller,
            Self::Session(_) => ComponentKind::Session,
            Self::Structure(_) => ComponentKind::Structure,
        }
    }
}

/// Typed access to a [`ComponentValue`] variant
pub trait Component: Clone + Send + Sync + 'static {
    /// Kind tag for this component type
    const KIND: ComponentKind;

    /// Wrap into a value
    fn into_value(self) -> ComponentValue;

    /// Unwrap from a value of the same kind
    fn from_value(value: ComponentValue) -> Option<Self>;
}

macro_rules! impl_component {
    ($ty:ident) => {
        impl Component for $ty {
            const KIND: ComponentKind = ComponentKind::$ty;

            fn into_value(self) -> ComponentValue {
                ComponentValue::$ty(self)
            }

            fn from_value(value: ComponentValue) -> Option<Self> {
                match value {
                    ComponentValue::$ty(inner) => Some(inner),
                    _ => None,
                }
            }
        }
    };
}

impl_component!(Identity);
impl_component!(Inventory);
impl_component!(Equipment);
impl_component!(Controller);
impl_component!(Session);
impl_component!(Structure);

/// Player-visible identity of a character body
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Identity {
    /// Display name
    pub display_name: String,
    /// Blood (role) type
    pub blood_type: String,
    /// Blood quality, 0..=100
    pub blood_quality: f32,
}

impl Identity {
    pub fn new(display_name: impl Into<String>) -> Self {
        Self {
            display_name: display_name.into(),
            blood_type: "none".to_string(),
            blood_quality: 0.0,
        }
    }

    pub fn with_blood(mut self, blood_type: impl Into<String>, quality: f32) -> Self {
        self.blood_type = blood_type.into();
        self.blood_quality = quality;
        self
    }
}

/// Who controls a character body
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct Controller {
    /// Owning player, `None` while parked
    pub owner: Option<PlayerId>,
    /// Frozen bodies ignore input and are hidden off-map
    pub frozen: bool,
}

impl Controller {
    pub fn active(owner: PlayerId) -> Self {
        Self {
            owner: Some(owner),
            frozen: false,
        }
    }

    pub fn frozen() -> Self {
        Self {
            owner: None,
            frozen: true,
        }
    }
}

/// Connection of a player to the body they currently drive
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct Session {
    pub player: PlayerId,
    pub character: EntityRef,
    pub connected: bool,
}

/// A structure placed in an arena
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Structure {
    pub kind: String,
    pub owner: PlayerId,
    pub arena: ArenaId,
    pub max_health: f32,
}
