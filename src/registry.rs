//! Callback registry
//!
//! Maps event type labels to script callbacks. Entries live in a
//! fixed-capacity arena and are threaded into a singly linked list with the
//! newest entry at the head, so lookups see the most recent registration
//! first.
//!
//! Writers build the entry before taking the lock and link it in one step;
//! readers on any thread only ever observe fully constructed entries.

use std::sync::{Arc, RwLock, RwLockReadGuard, RwLockWriteGuard};

use crate::error::BridgeError;
use crate::script::CallbackRef;

/// A registered (event type → callback) association.
pub struct CallbackEntry {
    event_type: String,
    handler: CallbackRef,
}

impl CallbackEntry {
    pub fn event_type(&self) -> &str {
        &self.event_type
    }

    pub fn handler(&self) -> &CallbackRef {
        &self.handler
    }

    /// True when the first `search.len()` bytes of the label equal `search`.
    pub fn matches_prefix(&self, search: &str) -> bool {
        self.event_type.as_bytes().starts_with(search.as_bytes())
    }
}

impl std::fmt::Debug for CallbackEntry {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("CallbackEntry")
            .field("event_type", &self.event_type)
            .finish_non_exhaustive()
    }
}

/// Handle identifying one registration.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct RegistryToken {
    slot: usize,
    generation: u64,
}

struct Slot {
    entry: Option<Arc<CallbackEntry>>,
    next: Option<usize>,
    generation: u64,
}

struct Arena {
    slots: Vec<Slot>,
    free: Vec<usize>,
    head: Option<usize>,
    len: usize,
}

impl Arena {
    fn with_capacity(capacity: usize) -> Self {
        let slots = (0..capacity)
            .map(|_| Slot {
                entry: None,
                next: None,
                generation: 0,
            })
            .collect();
        Self {
            slots,
            // popped from the back, so slot 0 is handed out first
            free: (0..capacity).rev().collect(),
            head: None,
            len: 0,
        }
    }

    fn iter(&self) -> ArenaIter<'_> {
        ArenaIter {
            arena: self,
            cursor: self.head,
        }
    }
}

struct ArenaIter<'a> {
    arena: &'a Arena,
    cursor: Option<usize>,
}

impl<'a> Iterator for ArenaIter<'a> {
    type Item = (usize, &'a Arc<CallbackEntry>);

    fn next(&mut self) -> Option<Self::Item> {
        while let Some(idx) = self.cursor {
            let slot = &self.arena.slots[idx];
            self.cursor = slot.next;
            if let Some(entry) = &slot.entry {
                return Some((idx, entry));
            }
        }
        None
    }
}

/// Ordered, fixed-capacity set of callback registrations.
pub struct CallbackRegistry {
    max_event_type_len: usize,
    arena: RwLock<Arena>,
}

impl CallbackRegistry {
    pub fn new(capacity: usize, max_event_type_len: usize) -> Self {
        Self {
            max_event_type_len,
            arena: RwLock::new(Arena::with_capacity(capacity)),
        }
    }

    /// Register `handler` for `event_type`, ahead of every earlier entry.
    pub fn register(
        &self,
        event_type: &str,
        handler: CallbackRef,
    ) -> Result<RegistryToken, BridgeError> {
        if event_type.is_empty() {
            return Err(BridgeError::InvalidArgument(
                "event type must not be empty".into(),
            ));
        }
        if event_type.len() > self.max_event_type_len {
            return Err(BridgeError::InvalidArgument(format!(
                "event type '{}' is {} bytes, limit is {}",
                event_type,
                event_type.len(),
                self.max_event_type_len
            )));
        }

        let entry = Arc::new(CallbackEntry {
            event_type: event_type.to_string(),
            handler,
        });

        let mut arena = self.write();

        let idx = arena.free.pop().ok_or_else(|| {
            log::warn!("Out of callback slots registering '{}'", event_type);
            BridgeError::Allocation(format!(
                "registry full ({} entries)",
                arena.slots.len()
            ))
        })?;

        let head = arena.head;
        let slot = &mut arena.slots[idx];
        slot.generation += 1;
        slot.next = head;
        slot.entry = Some(entry);
        let token = RegistryToken {
            slot: idx,
            generation: slot.generation,
        };
        arena.head = Some(idx);
        arena.len += 1;

        log::debug!("Registered callback for '{}' in slot {}", event_type, idx);
        Ok(token)
    }

    /// Remove a registration and return its slot to the free list.
    pub fn unregister(&self, token: RegistryToken) -> Result<(), BridgeError> {
        let mut arena = self.write();

        let live = arena
            .slots
            .get(token.slot)
            .map(|s| s.generation == token.generation && s.entry.is_some())
            .unwrap_or(false);
        if !live {
            return Err(BridgeError::InvalidArgument(
                "stale or unknown registry token".into(),
            ));
        }

        let next = arena.slots[token.slot].next;
        if arena.head == Some(token.slot) {
            arena.head = next;
        } else {
            let mut cursor = arena.head;
            while let Some(idx) = cursor {
                if arena.slots[idx].next == Some(token.slot) {
                    arena.slots[idx].next = next;
                    break;
                }
                cursor = arena.slots[idx].next;
            }
        }

        let slot = &mut arena.slots[token.slot];
        slot.entry = None;
        slot.next = None;
        arena.free.push(token.slot);
        arena.len -= 1;
        Ok(())
    }

    /// Find the newest entry whose label starts with `search`.
    pub fn lookup_by_prefix(&self, search: &str) -> Option<Arc<CallbackEntry>> {
        self.read()
            .iter()
            .find(|(_, entry)| entry.matches_prefix(search))
            .map(|(_, entry)| Arc::clone(entry))
    }

    /// Labels in lookup order (newest first).
    pub fn event_types(&self) -> Vec<String> {
        self.read()
            .iter()
            .map(|(_, entry)| entry.event_type.clone())
            .collect()
    }

    pub fn len(&self) -> usize {
        self.read().len
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    pub fn capacity(&self) -> usize {
        self.read().slots.len()
    }

    pub fn max_event_type_len(&self) -> usize {
        self.max_event_type_len
    }

    /// Drop every registration, releasing the held callbacks.
    ///
    /// Slot generations survive, so tokens issued before the clear stay
    /// stale and cannot remove later registrations.
    pub fn clear(&self) {
        let mut arena = self.write();
        for slot in arena.slots.iter_mut() {
            slot.entry = None;
            slot.next = None;
        }
        let capacity = arena.slots.len();
        arena.free = (0..capacity).rev().collect();
        arena.head = None;
        arena.len = 0;
    }

    // Nothing that can panic runs between the arena edits above, so a
    // poisoned lock still guards a consistent arena.
    fn read(&self) -> RwLockReadGuard<'_, Arena> {
        match self.arena.read() {
            Ok(guard) => guard,
            Err(poisoned) => {
                log::warn!("Callback registry lock poisoned, recovering");
                poisoned.into_inner()
            }
        }
    }

    fn write(&self) -> RwLockWriteGuard<'_, Arena> {
        match self.arena.write() {
            Ok(guard) => guard,
            Err(poisoned) => {
                log::warn!("Callback registry lock poisoned, recovering");
                poisoned.into_inner()
            }
        }
    }
}
