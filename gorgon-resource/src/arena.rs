//! # Arenas
//! Slot storage addressed by generational [`Key`]s. Keys are namespaced by the stored type, so a
//! key into one arena can't be mixed up with a key into an arena of a different type. A key whose
//! slot has been freed and reused is detected by its generation and treated as missing.

/// Key into an [`Arena<T>`]. Keys with different `T` may share a value but are never equal.
pub struct Key<T: std::any::Any> {
    index: u32,
    generation: u32,
    // Namespace marker
    _phantom: std::marker::PhantomData<fn() -> T>,
}
impl<T: std::any::Any> Clone for Key<T> {
    fn clone(&self) -> Self {
        *self
    }
}
impl<T: std::any::Any> Copy for Key<T> {}
impl<T: std::any::Any> std::cmp::PartialEq for Key<T> {
    fn eq(&self, other: &Self) -> bool {
        // Namespace already checked at compile time.
        self.index == other.index && self.generation == other.generation
    }
}
impl<T: std::any::Any> std::cmp::Eq for Key<T> {}
impl<T: std::any::Any> std::hash::Hash for Key<T> {
    fn hash<H: std::hash::Hasher>(&self, state: &mut H) {
        self.index.hash(state);
        self.generation.hash(state);
    }
}
impl<T: std::any::Any> Key<T> {
    /// Slot index. Reused after the keyed value is removed.
    #[must_use]
    pub fn index(&self) -> u32 {
        self.index
    }
    #[must_use]
    pub fn generation(&self) -> u32 {
        self.generation
    }
}
impl<T: std::any::Any> std::fmt::Display for Key<T> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        // The rsplit always yields at least one element, even for empty strings.
        let name = std::any::type_name::<T>()
            .rsplit("::")
            .next()
            .unwrap_or_default();
        write!(f, "{name}#{}v{}", self.index, self.generation)
    }
}
impl<T: std::any::Any> std::fmt::Debug for Key<T> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        <Key<T> as std::fmt::Display>::fmt(self, f)
    }
}

struct Slot<T> {
    generation: u32,
    value: Option<T>,
}

/// Generational slot storage.
pub struct Arena<T: std::any::Any> {
    slots: Vec<Slot<T>>,
    free: Vec<u32>,
    len: usize,
}
impl<T: std::any::Any> Default for Arena<T> {
    fn default() -> Self {
        Self {
            slots: Vec::new(),
            free: Vec::new(),
            len: 0,
        }
    }
}
impl<T: std::any::Any> Arena<T> {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }
    #[must_use]
    pub fn len(&self) -> usize {
        self.len
    }
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.len == 0
    }
    pub fn insert(&mut self, value: T) -> Key<T> {
        self.len += 1;
        if let Some(index) = self.free.pop() {
            let slot = &mut self.slots[index as usize];
            slot.value = Some(value);
            Key {
                index,
                generation: slot.generation,
                _phantom: std::marker::PhantomData,
            }
        } else {
            let index = u32::try_from(self.slots.len()).unwrap_or_else(|_| {
                log::error!("{} arena exhausted! Aborting!", std::any::type_name::<T>());
                std::process::abort()
            });
            self.slots.push(Slot {
                generation: 0,
                value: Some(value),
            });
            Key {
                index,
                generation: 0,
                _phantom: std::marker::PhantomData,
            }
        }
    }
    #[must_use]
    pub fn contains(&self, key: Key<T>) -> bool {
        self.get(key).is_some()
    }
    #[must_use]
    pub fn get(&self, key: Key<T>) -> Option<&T> {
        self.slots
            .get(key.index as usize)
            .filter(|slot| slot.generation == key.generation)
            .and_then(|slot| slot.value.as_ref())
    }
    pub fn get_mut(&mut self, key: Key<T>) -> Option<&mut T> {
        self.slots
            .get_mut(key.index as usize)
            .filter(|slot| slot.generation == key.generation)
            .and_then(|slot| slot.value.as_mut())
    }
    /// Remove the value, invalidating every copy of `key`.
    pub fn remove(&mut self, key: Key<T>) -> Option<T> {
        let slot = self
            .slots
            .get_mut(key.index as usize)
            .filter(|slot| slot.generation == key.generation)?;
        let value = slot.value.take()?;
        slot.generation = slot.generation.wrapping_add(1);
        self.free.push(key.index);
        self.len -= 1;
        Some(value)
    }
    /// Live entries in slot order.
    pub fn iter(&self) -> impl Iterator<Item = (Key<T>, &T)> + '_ {
        self.slots.iter().enumerate().filter_map(|(index, slot)| {
            let value = slot.value.as_ref()?;
            Some((
                Key {
                    // Slots are only ever pushed while their index fits in u32.
                    index: index as u32,
                    generation: slot.generation,
                    _phantom: std::marker::PhantomData,
                },
                value,
            ))
        })
    }
}

#[cfg(test)]
mod test {
    use super::Arena;
    #[test]
    fn stale_keys_miss() {
        let mut arena = Arena::new();
        let a = arena.insert("a");
        let b = arena.insert("b");
        assert_eq!(arena.remove(a), Some("a"));
        assert_eq!(arena.get(a), None);
        assert_eq!(arena.remove(a), None);

        // Slot is reused, old key stays dead.
        let c = arena.insert("c");
        assert_eq!(c.index(), a.index());
        assert_ne!(c, a);
        assert_eq!(arena.get(a), None);
        assert_eq!(arena.get(c), Some(&"c"));
        assert_eq!(arena.get(b), Some(&"b"));
        assert_eq!(arena.len(), 2);
    }
    #[test]
    fn iter_skips_holes() {
        let mut arena = Arena::new();
        let keys: Vec<_> = (0..4).map(|i| arena.insert(i)).collect();
        arena.remove(keys[1]);
        let live: Vec<_> = arena.iter().map(|(_, v)| *v).collect();
        assert_eq!(live, [0, 2, 3]);
    }
    #[test]
    fn display_names_namespace() {
        struct Namespace;
        let mut arena = Arena::new();
        let key = arena.insert(Namespace);
        assert_eq!(key.to_string(), "Namespace#0v0");
    }
}
