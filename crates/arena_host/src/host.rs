//! The hosting engine interface

use crate::component::{Component, ComponentKind, ComponentValue};
use crate::error::{HostError, HostResult};
use arena_core::{EntityRef, PlayerId, Quat, Vec3};

/// Entities that make up a connected player
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct PlayerHandles {
    /// The player's account/session entity
    pub user: EntityRef,
    /// The body the player currently drives
    pub character: EntityRef,
}

/// Data access into the hosting game engine.
///
/// The host is the system of record for live entity data. Implementations
/// must be safe to call from the world-tick thread and command threads at
/// the same time, and must never call back into the lifecycle engine.
pub trait GameHost: Send + Sync {
    /// Whether the entity is alive
    fn exists(&self, entity: EntityRef) -> bool;

    /// Read a component; `Ok(None)` if the entity lacks it
    fn read_component(&self, entity: EntityRef, kind: ComponentKind) -> HostResult<Option<ComponentValue>>;

    /// Insert or replace a component
    fn write_component(&self, entity: EntityRef, value: ComponentValue) -> HostResult<()>;

    /// Create an empty entity
    fn create_entity(&self) -> HostResult<EntityRef>;

    /// Destroy an entity and all its components
    fn destroy(&self, entity: EntityRef) -> HostResult<()>;

    /// World position of an entity
    fn position(&self, entity: EntityRef) -> HostResult<Vec3>;

    /// Teleport an entity
    fn set_position(&self, entity: EntityRef, position: Vec3) -> HostResult<()>;

    /// Set orientation of an entity
    fn set_rotation(&self, entity: EntityRef, rotation: Quat) -> HostResult<()>;

    /// Resolve a connected player's entities
    fn find_player(&self, player: PlayerId) -> Option<PlayerHandles>;

    /// Players with a connected session
    fn online_players(&self) -> Vec<PlayerId>;
}

/// Typed helpers over [`GameHost`]
pub trait GameHostExt: GameHost {
    /// Read a component if present
    fn try_read<T: Component>(&self, entity: EntityRef) -> HostResult<Option<T>> {
        match self.read_component(entity, T::KIND)? {
            Some(value) => {
                let found = value.kind();
                T::from_value(value)
                    .map(Some)
                    .ok_or(HostError::KindMismatch {
                        expected: T::KIND,
                        found,
                    })
            }
            None => Ok(None),
        }
    }

    /// Read a component that must be present
    fn read<T: Component>(&self, entity: EntityRef) -> HostResult<T> {
        self.try_read(entity)?.ok_or(HostError::MissingComponent {
            entity,
            kind: T::KIND,
        })
    }

    /// Write a component
    fn write<T: Component>(&self, entity: EntityRef, component: T) -> HostResult<()> {
        self.write_component(entity, component.into_value())
    }

    /// Read, modify and write back a component
    fn update<T, F>(&self, entity: EntityRef, f: F) -> HostResult<()>
    where
        T: Component,
        F: FnOnce(&mut T),
    {
        let mut component: T = self.read(entity)?;
        f(&mut component);
        self.write(entity, component)
    }
}

impl<H: GameHost + ?Sized> GameHostExt for H {}
