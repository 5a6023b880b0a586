//! Fixed-capacity entity pools
//!
//! Each entity kind lives in its own pool. Slots are kept sorted by entity id,
//! and ids are handed out monotonically, so iteration order is insertion
//! order and stays deterministic from tick to tick.
//!
//! Releasing an entity only marks its slot; the slot keeps occupying capacity
//! until [`EntityPool::compact`] runs at the end of the tick. Lookups and
//! iteration skip marked slots immediately, so an entity destroyed early in a
//! pass is invisible to every later check in the same tick.

use serde::{Deserialize, Serialize};

use crate::error::{Result, SimError};

/// Unique entity identifier. Never reused within a session, which makes it
/// safe to hold as a weak reference (e.g. a homing target).
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub struct EntityId(pub u32);

/// Anything stored in a pool exposes its id
pub trait Pooled {
    fn id(&self) -> EntityId;
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum SlotState {
    Active,
    PendingRemoval,
}

#[derive(Debug, Clone)]
struct Slot<T> {
    item: T,
    state: SlotState,
}

/// Fixed-capacity store of one entity kind
#[derive(Debug, Clone)]
pub struct EntityPool<T> {
    name: &'static str,
    capacity: usize,
    slots: Vec<Slot<T>>,
    pending: usize,
}

impl<T: Pooled> EntityPool<T> {
    pub fn new(name: &'static str, capacity: usize) -> Self {
        Self {
            name,
            capacity,
            slots: Vec::with_capacity(capacity),
            pending: 0,
        }
    }

    pub fn name(&self) -> &'static str {
        self.name
    }

    pub fn capacity(&self) -> usize {
        self.capacity
    }

    /// Number of live entities
    pub fn len(&self) -> usize {
        self.slots.len() - self.pending
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Slots in use, including ones awaiting compaction
    pub fn occupied_slots(&self) -> usize {
        self.slots.len()
    }

    pub fn pending_removals(&self) -> usize {
        self.pending
    }

    pub fn is_full(&self) -> bool {
        self.slots.len() >= self.capacity
    }

    /// Place an entity into a free slot
    ///
    /// Fails with [`SimError::PoolExhausted`] when every slot is taken; the
    /// pool is left untouched in that case.
    pub fn allocate(&mut self, item: T) -> Result<EntityId> {
        if self.is_full() {
            return Err(SimError::PoolExhausted {
                pool: self.name,
                capacity: self.capacity,
            });
        }

        let id = item.id();
        let slot = Slot {
            item,
            state: SlotState::Active,
        };
        match self.slots.last() {
            Some(last) if last.item.id() > id => {
                // Out-of-order id (only happens with hand-built entities)
                let at = self.slots.partition_point(|s| s.item.id() < id);
                self.slots.insert(at, slot);
            }
            _ => self.slots.push(slot),
        }
        Ok(id)
    }

    fn index_of(&self, id: EntityId) -> Option<usize> {
        self.slots.binary_search_by_key(&id, |s| s.item.id()).ok()
    }

    /// Live entity by id; `None` once released
    pub fn get(&self, id: EntityId) -> Option<&T> {
        self.index_of(id)
            .map(|i| &self.slots[i])
            .filter(|s| s.state == SlotState::Active)
            .map(|s| &s.item)
    }

    pub fn get_mut(&mut self, id: EntityId) -> Option<&mut T> {
        let index = self.index_of(id)?;
        let slot = &mut self.slots[index];
        if slot.state == SlotState::Active {
            Some(&mut slot.item)
        } else {
            None
        }
    }

    pub fn contains(&self, id: EntityId) -> bool {
        self.get(id).is_some()
    }

    /// Mark an entity for removal. Returns false if it was not live.
    pub fn release(&mut self, id: EntityId) -> bool {
        let Some(index) = self.index_of(id) else {
            return false;
        };
        let slot = &mut self.slots[index];
        if slot.state != SlotState::Active {
            return false;
        }
        slot.state = SlotState::PendingRemoval;
        self.pending += 1;
        true
    }

    /// Live entities in insertion order
    pub fn iter(&self) -> impl Iterator<Item = &T> {
        self.slots
            .iter()
            .filter(|s| s.state == SlotState::Active)
            .map(|s| &s.item)
    }

    pub fn iter_mut(&mut self) -> impl Iterator<Item = &mut T> {
        self.slots
            .iter_mut()
            .filter(|s| s.state == SlotState::Active)
            .map(|s| &mut s.item)
    }

    pub fn for_each(&self, mut visitor: impl FnMut(&T)) {
        for item in self.iter() {
            visitor(item);
        }
    }

    /// Ids of live entities, for passes that mutate while walking the pool
    pub fn ids(&self) -> Vec<EntityId> {
        self.iter().map(Pooled::id).collect()
    }

    /// Visit every live entity mutably; returning `false` releases it.
    /// Returns the number released.
    pub fn retain_live(&mut self, mut keep: impl FnMut(&mut T) -> bool) -> usize {
        let mut released = 0;
        for slot in self.slots.iter_mut() {
            if slot.state == SlotState::Active && !keep(&mut slot.item) {
                slot.state = SlotState::PendingRemoval;
                released += 1;
            }
        }
        self.pending += released;
        released
    }

    /// Free every slot marked for removal, preserving the order of the rest.
    /// Returns the number of slots freed.
    pub fn compact(&mut self) -> usize {
        if self.pending == 0 {
            return 0;
        }
        let freed = self.pending;
        self.slots.retain(|s| s.state == SlotState::Active);
        self.pending = 0;
        freed
    }

    /// Drop everything (session teardown)
    pub fn clear(&mut self) {
        self.slots.clear();
        self.pending = 0;
    }
}
