//! A generational slot registry.
//!
//! Values live in a `Vec` of slots. Removing a value frees its slot for reuse
//! and bumps the slot's generation, so a [`Key`] handed out before the removal
//! can never reach the value that later reuses the slot:
//!
//! ```rust,ignore
//! let a = registry.insert("a"); // Key { index: 0, generation: 0 }
//! registry.remove(a);
//! let b = registry.insert("b"); // Key { index: 0, generation: 1 }
//! assert!(registry.get(a).is_none());
//! ```
//!
//! Insert and remove are O(1).

/// Slot generation, bumped every time the slot is vacated.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
struct Generation(u32);

impl Generation {
    const FIRST: Self = Self(0);

    #[inline]
    fn next(self) -> Self {
        Self(self.0.wrapping_add(1))
    }
}

/// Identifies one value in a [`Registry`].
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub(crate) struct Key {
    index: u32,
    generation: Generation,
}

struct Slot<T> {
    generation: Generation,
    value: Option<T>,
}

pub(crate) struct Registry<T> {
    slots: Vec<Slot<T>>,
    free: Vec<u32>,
    len: usize,
}

impl<T> Registry<T> {
    pub(crate) fn new() -> Self {
        Self {
            slots: Vec::new(),
            free: Vec::new(),
            len: 0,
        }
    }

    pub(crate) fn with_capacity(capacity: usize) -> Self {
        Self {
            slots: Vec::with_capacity(capacity),
            free: Vec::new(),
            len: 0,
        }
    }

    pub(crate) fn insert(&mut self, value: T) -> Key {
        self.len += 1;
        if let Some(index) = self.free.pop() {
            let slot = &mut self.slots[index as usize];
            slot.value = Some(value);
            return Key {
                index,
                generation: slot.generation,
            };
        }
        let index = self.slots.len() as u32;
        self.slots.push(Slot {
            generation: Generation::FIRST,
            value: Some(value),
        });
        Key {
            index,
            generation: Generation::FIRST,
        }
    }

    /// Remove the value under `key`. Stale keys return `None`.
    pub(crate) fn remove(&mut self, key: Key) -> Option<T> {
        let slot = self.slots.get_mut(key.index as usize)?;
        if slot.generation != key.generation {
            return None;
        }
        let value = slot.value.take()?;
        slot.generation = slot.generation.next();
        self.free.push(key.index);
        self.len -= 1;
        Some(value)
    }

    pub(crate) fn get(&self, key: Key) -> Option<&T> {
        self.slots
            .get(key.index as usize)
            .filter(|slot| slot.generation == key.generation)
            .and_then(|slot| slot.value.as_ref())
    }

    #[inline]
    pub(crate) fn contains(&self, key: Key) -> bool {
        self.get(key).is_some()
    }

    #[inline]
    pub(crate) fn len(&self) -> usize {
        self.len
    }

    #[inline]
    pub(crate) fn is_empty(&self) -> bool {
        self.len == 0
    }

    /// Remove every value, invalidating all outstanding keys.
    pub(crate) fn drain(&mut self) -> Vec<T> {
        let mut values = Vec::with_capacity(self.len);
        for (index, slot) in self.slots.iter_mut().enumerate() {
            if let Some(value) = slot.value.take() {
                slot.generation = slot.generation.next();
                self.free.push(index as u32);
                values.push(value);
            }
        }
        self.len = 0;
        values
    }
}

impl<T> Default for Registry<T> {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn insert_and_get() {
        let mut registry = Registry::new();
        let a = registry.insert("a");
        let b = registry.insert("b");

        assert_eq!(registry.get(a), Some(&"a"));
        assert_eq!(registry.get(b), Some(&"b"));
        assert_eq!(registry.len(), 2);
    }

    #[test]
    fn remove_frees_the_slot() {
        let mut registry = Registry::new();
        let a = registry.insert(1);

        assert_eq!(registry.remove(a), Some(1));
        assert_eq!(registry.remove(a), None);
        assert!(registry.is_empty());
        assert!(!registry.contains(a));
    }

    #[test]
    fn stale_key_does_not_alias_reused_slot() {
        let mut registry = Registry::new();
        let a = registry.insert(1);
        registry.remove(a);
        let b = registry.insert(2);

        assert_eq!(a.index, b.index);
        assert_ne!(a.generation, b.generation);
        assert_eq!(registry.get(a), None);
        assert_eq!(registry.remove(a), None);
        assert_eq!(registry.get(b), Some(&2));
    }

    #[test]
    fn drain_invalidates_every_key() {
        let mut registry = Registry::with_capacity(4);
        let keys: Vec<_> = (0..4).map(|v| registry.insert(v)).collect();
        registry.remove(keys[1]);

        let mut drained = registry.drain();
        drained.sort();

        assert_eq!(drained, vec![0, 2, 3]);
        assert!(registry.is_empty());
        assert!(keys.iter().all(|k| !registry.contains(*k)));

        let fresh = registry.insert(9);
        assert_eq!(registry.get(fresh), Some(&9));
        assert_eq!(registry.len(), 1);
    }
}
