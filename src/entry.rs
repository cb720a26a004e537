//! Entry: the owned key/value pair stored in an occupied slot.

use core::mem;

/// One stored association. The key is the entry's immutable identity; the
/// value may be overwritten in place.
#[derive(Debug)]
pub struct Entry<K, V> {
    key: K,
    value: V,
}

impl<K, V> Entry<K, V> {
    pub fn new(key: K, value: V) -> Self {
        Entry { key, value }
    }

    pub fn key(&self) -> &K {
        &self.key
    }

    pub fn value(&self) -> &V {
        &self.value
    }

    pub fn value_mut(&mut self) -> &mut V {
        &mut self.value
    }

    /// Overwrite the value, returning the previous one.
    pub fn set_value(&mut self, value: V) -> V {
        mem::replace(&mut self.value, value)
    }

    pub fn into_pair(self) -> (K, V) {
        (self.key, self.value)
    }

    pub(crate) fn pair(&self) -> (&K, &V) {
        (&self.key, &self.value)
    }

    pub(crate) fn pair_mut(&mut self) -> (&K, &mut V) {
        (&self.key, &mut self.value)
    }
}

#[cfg(test)]
mod tests {
    use super::Entry;

    #[test]
    fn set_value_returns_previous() {
        let mut e = Entry::new("k", 1);
        assert_eq!(e.set_value(2), 1);
        assert_eq!(*e.value(), 2);
        assert_eq!(*e.key(), "k");
        assert_eq!(e.into_pair(), ("k", 2));
    }
}
