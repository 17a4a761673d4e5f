//! In-memory host

use crate::component::{ComponentKind, ComponentValue, Controller, Identity, Session};
use crate::error::{HostError, HostResult};
use crate::host::{GameHost, GameHostExt, PlayerHandles};
use arena_core::{EntityRef, PlayerId, Quat, Vec3};
use arena_inventory::{Equipment, Inventory};
use parking_lot::RwLock;
use std::collections::{HashMap, HashSet};

/// Default inventory size for spawned bodies
pub const DEFAULT_INVENTORY_SLOTS: usize = 36;

struct EntitySlot {
    generation: u32,
    alive: bool,
    position: Vec3,
    rotation: Quat,
    components: HashMap<ComponentKind, ComponentValue>,
}

#[derive(Default)]
struct World {
    slots: Vec<EntitySlot>,
    free: Vec<u32>,
    failing_writes: HashSet<(EntityRef, ComponentKind)>,
    failing_destroys: HashSet<EntityRef>,
}

impl World {
    fn slot(&self, entity: EntityRef) -> HostResult<&EntitySlot> {
        self.slots
            .get(entity.index() as usize)
            .filter(|slot| slot.alive && slot.generation == entity.generation())
            .ok_or(HostError::EntityNotFound(entity))
    }

    fn slot_mut(&mut self, entity: EntityRef) -> HostResult<&mut EntitySlot> {
        self.slots
            .get_mut(entity.index() as usize)
            .filter(|slot| slot.alive && slot.generation == entity.generation())
            .ok_or(HostError::EntityNotFound(entity))
    }

    fn allocate(&mut self) -> EntityRef {
        if let Some(index) = self.free.pop() {
            let slot = &mut self.slots[index as usize];
            slot.generation += 1;
            slot.alive = true;
            slot.position = Vec3::ZERO;
            slot.rotation = Quat::IDENTITY;
            slot.components.clear();
            return EntityRef::new(index, slot.generation);
        }
        let index = self.slots.len() as u32;
        self.slots.push(EntitySlot {
            generation: 0,
            alive: true,
            position: Vec3::ZERO,
            rotation: Quat::IDENTITY,
            components: HashMap::new(),
        });
        EntityRef::new(index, 0)
    }

    fn sessions(&self) -> impl Iterator<Item = (EntityRef, &Session)> {
        self.slots.iter().enumerate().filter(|(_, slot)| slot.alive).filter_map(|(index, slot)| {
            match slot.components.get(&ComponentKind::Session) {
                Some(ComponentValue::Session(session)) => {
                    Some((EntityRef::new(index as u32, slot.generation), session))
                }
                _ => None,
            }
        })
    }
}

/// Thread-safe in-memory [`GameHost`] with generational entity slots.
///
/// Also supports fault injection so callers can exercise their failure
/// paths: see [`MemoryHost::fail_writes`] and [`MemoryHost::fail_destroy`].
#[derive(Default)]
pub struct MemoryHost {
    world: RwLock<World>,
}

impl MemoryHost {
    pub fn new() -> Self {
        Self::default()
    }

    /// Spawn a character body with identity, empty inventory and equipment
    pub fn spawn_body(&self, name: &str, position: Vec3) -> HostResult<EntityRef> {
        let body = self.create_entity()?;
        self.write(body, Identity::new(name))?;
        self.write(body, Inventory::new(DEFAULT_INVENTORY_SLOTS))?;
        self.write(body, Equipment::new())?;
        self.write(body, Controller::frozen())?;
        self.set_position(body, position)?;
        Ok(body)
    }

    /// Spawn a connected player: a session entity driving a fresh body
    pub fn spawn_player(&self, player: PlayerId, name: &str, position: Vec3) -> HostResult<PlayerHandles> {
        let character = self.spawn_body(name, position)?;
        self.write(character, Controller::active(player))?;
        let user = self.create_entity()?;
        self.write(
            user,
            Session {
                player,
                character,
                connected: true,
            },
        )?;
        log::debug!("Spawned player {} (user {}, body {})", player, user, character);
        Ok(PlayerHandles { user, character })
    }

    /// Mark a player's session as disconnected
    pub fn disconnect(&self, player: PlayerId) -> HostResult<()> {
        let handles = self
            .find_player(player)
            .ok_or_else(|| HostError::Rejected(format!("player {} not connected", player)))?;
        self.update::<Session, _>(handles.user, |session| session.connected = false)
    }

    /// Make every write of `kind` to `entity` fail until cleared
    pub fn fail_writes(&self, entity: EntityRef, kind: ComponentKind) {
        self.world.write().failing_writes.insert((entity, kind));
    }

    /// Make destroying `entity` fail until cleared
    pub fn fail_destroy(&self, entity: EntityRef) {
        self.world.write().failing_destroys.insert(entity);
    }

    /// Remove all injected faults
    pub fn clear_faults(&self) {
        let mut world = self.world.write();
        world.failing_writes.clear();
        world.failing_destroys.clear();
    }

    /// Remove a component from an entity
    pub fn remove_component(&self, entity: EntityRef, kind: ComponentKind) -> HostResult<Option<ComponentValue>> {
        let mut world = self.world.write();
        Ok(world.slot_mut(entity)?.components.remove(&kind))
    }

    /// Number of live entities
    pub fn entity_count(&self) -> usize {
        self.world.read().slots.iter().filter(|slot| slot.alive).count()
    }

    /// Current rotation of an entity
    pub fn rotation(&self, entity: EntityRef) -> HostResult<Quat> {
        Ok(self.world.read().slot(entity)?.rotation)
    }
}

impl GameHost for MemoryHost {
    fn exists(&self, entity: EntityRef) -> bool {
        self.world.read().slot(entity).is_ok()
    }

    fn read_component(&self, entity: EntityRef, kind: ComponentKind) -> HostResult<Option<ComponentValue>> {
        let world = self.world.read();
        Ok(world.slot(entity)?.components.get(&kind).cloned())
    }

    fn write_component(&self, entity: EntityRef, value: ComponentValue) -> HostResult<()> {
        let mut world = self.world.write();
        let kind = value.kind();
        if world.failing_writes.contains(&(entity, kind)) {
            return Err(HostError::Rejected(format!("write of {:?} to {} refused", kind, entity)));
        }
        world.slot_mut(entity)?.components.insert(kind, value);
        Ok(())
    }

    fn create_entity(&self) -> HostResult<EntityRef> {
        Ok(self.world.write().allocate())
    }

    fn destroy(&self, entity: EntityRef) -> HostResult<()> {
        let mut world = self.world.write();
        if world.failing_destroys.contains(&entity) {
            return Err(HostError::Rejected(format!("destroy of {} refused", entity)));
        }
        let slot = world.slot_mut(entity)?;
        slot.alive = false;
        slot.components.clear();
        world.free.push(entity.index());
        Ok(())
    }

    fn position(&self, entity: EntityRef) -> HostResult<Vec3> {
        Ok(self.world.read().slot(entity)?.position)
    }

    fn set_position(&self, entity: EntityRef, position: Vec3) -> HostResult<()> {
        self.world.write().slot_mut(entity)?.position = position;
        Ok(())
    }

    fn set_rotation(&self, entity: EntityRef, rotation: Quat) -> HostResult<()> {
        self.world.write().slot_mut(entity)?.rotation = rotation;
        Ok(())
    }

    fn find_player(&self, player: PlayerId) -> Option<PlayerHandles> {
        let world = self.world.read();
        let found = world
            .sessions()
            .find(|(_, session)| session.player == player && session.connected)
            .map(|(user, session)| PlayerHandles {
                user,
                character: session.character,
            });
        found
    }

    fn online_players(&self) -> Vec<PlayerId> {
        let world = self.world.read();
        let mut players: Vec<PlayerId> = world
            .sessions()
            .filter(|(_, session)| session.connected)
            .map(|(_, session)| session.player)
            .collect();
        players.sort();
        players
    }
}
