//! Dense participant registry
//!
//! Participants live in one contiguous `Vec` with no gaps. Each registration
//! owns a slot in a side table that records where its participant currently
//! sits in that `Vec`. Joining pushes to the end; leaving swap-removes, so the
//! former last participant moves into the vacated position and its slot is
//! rewritten. Both are O(1) and dispatch is a plain linear walk.

use crate::participant::SharedParticipant;
use cadence_core::DispatcherId;
use tracing::warn;

/// Generational key of one registration.
///
/// Keys are recycled after a leave, with the generation bumped so an old key
/// never resolves to the participant that reused its slot.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct SlotKey {
    index: u32,
    generation: u32,
}

/// Proof of registration returned by [`Registry::join`].
///
/// Not `Clone`: handing it back to `leave` consumes it, so the same
/// registration cannot be removed twice through one token.
#[derive(Debug, PartialEq, Eq, Hash)]
#[must_use = "dropping a Registration leaves no way to remove the participant except from its own callback"]
pub struct Registration {
    key: SlotKey,
    owner: DispatcherId,
}

impl Registration {
    /// The key this registration resolves through
    pub fn key(&self) -> SlotKey {
        self.key
    }

    /// The dispatcher that issued this registration
    pub fn owner(&self) -> DispatcherId {
        self.owner
    }
}

struct Entry {
    key: SlotKey,
    participant: SharedParticipant,
}

struct Slot {
    generation: u32,
    /// Position in `entries`, `None` while the slot is free
    dense: Option<usize>,
}

/// Dense, index-addressable collection of registered participants
pub struct Registry {
    owner: DispatcherId,
    entries: Vec<Entry>,
    slots: Vec<Slot>,
    free: Vec<u32>,
}

impl Registry {
    pub fn with_capacity(owner: DispatcherId, capacity: usize) -> Self {
        Self {
            owner,
            entries: Vec::with_capacity(capacity),
            slots: Vec::with_capacity(capacity),
            free: Vec::new(),
        }
    }

    /// Append a participant to the end of the collection.
    ///
    /// Joining a participant that is already registered gives it a second,
    /// independent registration; owners join once per enable cycle.
    pub fn join(&mut self, participant: SharedParticipant) -> Registration {
        let dense = self.entries.len();
        let index = match self.free.pop() {
            Some(index) => {
                self.slots[index as usize].dense = Some(dense);
                index
            }
            None => {
                self.slots.push(Slot {
                    generation: 0,
                    dense: Some(dense),
                });
                (self.slots.len() - 1) as u32
            }
        };

        let key = SlotKey {
            index,
            generation: self.slots[index as usize].generation,
        };
        self.entries.push(Entry { key, participant });

        Registration {
            key,
            owner: self.owner,
        }
    }

    /// Remove a participant by swapping the last one into its position.
    ///
    /// Returns the removed participant, or `None` if the registration is
    /// stale (already left) or was issued by another dispatcher.
    pub fn leave(&mut self, registration: Registration) -> Option<SharedParticipant> {
        if registration.owner != self.owner {
            warn!(
                "leave ignored: registration belongs to {}, not {}",
                registration.owner, self.owner
            );
            return None;
        }
        self.remove(registration.key)
    }

    pub(crate) fn remove(&mut self, key: SlotKey) -> Option<SharedParticipant> {
        let Some(position) = self.position(key) else {
            warn!("leave ignored: {:?} is not registered", key);
            return None;
        };

        let removed = self.entries.swap_remove(position);
        if let Some(moved) = self.entries.get(position) {
            self.slots[moved.key.index as usize].dense = Some(position);
        }
        self.release(key.index);

        Some(removed.participant)
    }

    /// Free a slot for reuse. A slot whose generation is exhausted is retired
    /// instead, so its keys can never resolve again.
    fn release(&mut self, index: u32) {
        let slot = &mut self.slots[index as usize];
        slot.dense = None;
        match slot.generation.checked_add(1) {
            Some(generation) => {
                slot.generation = generation;
                self.free.push(index);
            }
            None => warn!("slot {} exhausted its generations; retiring it", index),
        }
    }

    /// Current position of a registration in collection order
    pub fn position(&self, key: SlotKey) -> Option<usize> {
        let slot = self.slots.get(key.index as usize)?;
        if slot.generation != key.generation {
            return None;
        }
        slot.dense
    }

    /// Position of a registration, `None` once it has left
    pub fn slot_of(&self, registration: &Registration) -> Option<usize> {
        if registration.owner != self.owner {
            return None;
        }
        self.position(registration.key)
    }

    pub fn contains(&self, registration: &Registration) -> bool {
        self.slot_of(registration).is_some()
    }

    /// The participant registered under `key`, if it is still registered
    pub fn get(&self, key: SlotKey) -> Option<&SharedParticipant> {
        self.position(key).map(|i| &self.entries[i].participant)
    }

    /// Key and participant at a position in collection order
    pub(crate) fn entry_at(&self, position: usize) -> Option<(SlotKey, &SharedParticipant)> {
        self.entries.get(position).map(|e| (e.key, &e.participant))
    }

    pub(crate) fn keys(&self) -> impl Iterator<Item = SlotKey> + '_ {
        self.entries.iter().map(|e| e.key)
    }

    /// Participants in current collection order
    pub fn iter(&self) -> impl Iterator<Item = &SharedParticipant> {
        self.entries.iter().map(|e| &e.participant)
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    pub fn capacity(&self) -> usize {
        self.entries.capacity()
    }

    /// Remove every participant, invalidating all outstanding registrations
    pub fn clear(&mut self) {
        let keys: Vec<u32> = self.entries.drain(..).map(|e| e.key.index).collect();
        for index in keys {
            self.release(index);
        }
    }
}
