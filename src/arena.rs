//! Generation-checked slot arena.
//!
//! [`Arena<T>`] stores values in contiguous slots and hands out opaque
//! [`Handle`]s instead of references or raw pointers. Removed slots go on a
//! free-list and are reused by later insertions; each reuse bumps the slot's
//! generation counter, so a handle to a removed value can never observe the
//! value that replaced it.
//!
//! The vertex factory allocates its temporary vertex records from an arena:
//! records stay contiguous for cheap iteration, handles stay stable across
//! unrelated insertions and removals, and use-after-delete degrades to a
//! `None` lookup instead of undefined behavior.

/// Opaque handle into an [`Arena`].
///
/// Handles are `Copy` and cheap to pass around. A handle is only valid for
/// the arena that produced it; looking it up elsewhere returns `None` (or
/// trips a `debug_assert!` where the contract is stricter).
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct Handle {
    index: u32,
    generation: u32,
}

impl Handle {
    /// Slot index of this handle. Mostly useful for diagnostics.
    pub fn index(&self) -> u32 {
        self.index
    }
}

#[derive(Debug, Clone)]
struct Slot<T> {
    generation: u32,
    value: Option<T>,
}

/// A slot arena with a free-list and generation-checked handles.
#[derive(Debug, Clone)]
pub struct Arena<T> {
    slots: Vec<Slot<T>>,
    free: Vec<u32>,
    len: usize,
}

impl<T> Arena<T> {
    /// Create an empty arena.
    pub fn new() -> Self {
        Self {
            slots: Vec::new(),
            free: Vec::new(),
            len: 0,
        }
    }

    /// Create an empty arena with room for `capacity` values.
    pub fn with_capacity(capacity: usize) -> Self {
        Self {
            slots: Vec::with_capacity(capacity),
            free: Vec::new(),
            len: 0,
        }
    }

    /// Insert a value, reusing a free slot when one is available.
    pub fn insert(&mut self, value: T) -> Handle {
        self.len += 1;
        if let Some(index) = self.free.pop() {
            let slot = &mut self.slots[index as usize];
            slot.value = Some(value);
            Handle {
                index,
                generation: slot.generation,
            }
        } else {
            let index = self.slots.len() as u32;
            self.slots.push(Slot {
                generation: 0,
                value: Some(value),
            });
            Handle {
                index,
                generation: 0,
            }
        }
    }

    /// Remove the value behind `handle`, returning it.
    ///
    /// Returns `None` if the handle is stale or foreign. The slot's
    /// generation is bumped so outstanding copies of the handle go stale.
    pub fn remove(&mut self, handle: Handle) -> Option<T> {
        let slot = self.slots.get_mut(handle.index as usize)?;
        if slot.generation != handle.generation || slot.value.is_none() {
            return None;
        }
        slot.generation = slot.generation.wrapping_add(1);
        self.free.push(handle.index);
        self.len -= 1;
        slot.value.take()
    }

    /// Get a reference to the value behind `handle`, if still live.
    pub fn get(&self, handle: Handle) -> Option<&T> {
        let slot = self.slots.get(handle.index as usize)?;
        if slot.generation != handle.generation {
            return None;
        }
        slot.value.as_ref()
    }

    /// Get a mutable reference to the value behind `handle`, if still live.
    pub fn get_mut(&mut self, handle: Handle) -> Option<&mut T> {
        let slot = self.slots.get_mut(handle.index as usize)?;
        if slot.generation != handle.generation {
            return None;
        }
        slot.value.as_mut()
    }

    /// Check whether `handle` still refers to a live value.
    pub fn contains(&self, handle: Handle) -> bool {
        self.get(handle).is_some()
    }

    /// Number of live values.
    pub fn len(&self) -> usize {
        self.len
    }

    /// Check whether the arena holds no live values.
    pub fn is_empty(&self) -> bool {
        self.len == 0
    }

    /// Remove all values. Slot generations are preserved so handles from
    /// before the clear stay stale.
    pub fn clear(&mut self) {
        for (index, slot) in self.slots.iter_mut().enumerate() {
            if slot.value.take().is_some() {
                slot.generation = slot.generation.wrapping_add(1);
                self.free.push(index as u32);
            }
        }
        self.len = 0;
    }

    /// Iterate over live values.
    pub fn iter(&self) -> impl Iterator<Item = &T> {
        self.slots.iter().filter_map(|slot| slot.value.as_ref())
    }
}

impl<T> Default for Arena<T> {
    fn default() -> Self {
        Self::new()
    }
}
