use std::hash::Hash;

use indexmap::map::{Iter, IterMut};
use indexmap::IndexMap;

use crate::element::Element;

/// A keyed collection of subelements that creates entries on first access.
///
/// [`VivifyMap::vivify`] is the only way elements enter the scene, so every
/// key maps to exactly one element for the lifetime of the map. Entries keep
/// their insertion order; equality does not depend on it.
#[derive(Debug, Clone)]
pub struct VivifyMap<K, V> {
    entries: IndexMap<K, V>,
}

impl<K, V> Default for VivifyMap<K, V> {
    fn default() -> Self {
        Self {
            entries: IndexMap::new(),
        }
    }
}

impl<K: Hash + Eq, V> VivifyMap<K, V> {
    pub fn new() -> Self {
        Self::default()
    }

    /// Returns the element for `key`, inserting `V::default()` if absent.
    pub fn vivify(&mut self, key: impl Into<K>) -> &mut V
    where
        V: Default,
    {
        self.entries.entry(key.into()).or_default()
    }

    /// Like [`Self::vivify`] with an explicit factory for the new element.
    pub fn vivify_with(&mut self, key: impl Into<K>, make: impl FnOnce() -> V) -> &mut V {
        self.entries.entry(key.into()).or_insert_with(make)
    }

    pub fn get<Q>(&self, key: &Q) -> Option<&V>
    where
        Q: ?Sized + Hash + indexmap::Equivalent<K>,
    {
        self.entries.get(key)
    }

    pub fn get_mut<Q>(&mut self, key: &Q) -> Option<&mut V>
    where
        Q: ?Sized + Hash + indexmap::Equivalent<K>,
    {
        self.entries.get_mut(key)
    }

    pub fn contains_key<Q>(&self, key: &Q) -> bool
    where
        Q: ?Sized + Hash + indexmap::Equivalent<K>,
    {
        self.entries.contains_key(key)
    }

    /// Removes `key`, keeping the order of the remaining entries.
    pub fn remove<Q>(&mut self, key: &Q) -> Option<V>
    where
        Q: ?Sized + Hash + indexmap::Equivalent<K>,
    {
        self.entries.shift_remove(key)
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    pub fn iter(&self) -> Iter<'_, K, V> {
        self.entries.iter()
    }

    pub fn iter_mut(&mut self) -> IterMut<'_, K, V> {
        self.entries.iter_mut()
    }

    pub fn keys(&self) -> impl Iterator<Item = &K> {
        self.entries.keys()
    }

    pub fn values(&self) -> impl Iterator<Item = &V> {
        self.entries.values()
    }
}

impl<K: Hash + Eq, V: Element> VivifyMap<K, V> {
    /// Prunes every entry and drops the ones left empty. Returns whether the
    /// map itself is now empty.
    pub fn prune(&mut self) -> bool {
        self.entries.retain(|_, element| !element.prune());
        self.entries.is_empty()
    }
}

impl<K: Hash + Eq, V: PartialEq> PartialEq for VivifyMap<K, V> {
    fn eq(&self, other: &Self) -> bool {
        self.entries == other.entries
    }
}

impl<'a, K, V> IntoIterator for &'a VivifyMap<K, V> {
    type Item = (&'a K, &'a V);
    type IntoIter = Iter<'a, K, V>;

    fn into_iter(self) -> Self::IntoIter {
        self.entries.iter()
    }
}

impl<K, V, Q> std::ops::Index<&Q> for VivifyMap<K, V>
where
    K: Hash + Eq,
    Q: ?Sized + Hash + indexmap::Equivalent<K>,
{
    type Output = V;

    fn index(&self, key: &Q) -> &V {
        &self.entries[key]
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::element::AField;

    #[test]
    fn vivify_is_idempotent() {
        let mut fields: VivifyMap<String, AField> = VivifyMap::new();
        let first: *const AField = fields.vivify("x");
        let second: *const AField = fields.vivify("x");
        assert!(std::ptr::eq(first, second));
        assert_eq!(fields.len(), 1);
    }

    #[test]
    fn empty_entries_affect_equality_until_pruned() {
        let mut vivified: VivifyMap<String, AField> = VivifyMap::new();
        vivified.vivify("x");
        let mut empty: VivifyMap<String, AField> = VivifyMap::new();
        assert!(vivified != empty);

        assert!(vivified.prune());
        assert!(empty.prune());
        assert!(vivified == empty);
    }
}
