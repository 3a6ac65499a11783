use std::hash::{Hash, Hasher};

use indexmap::IndexMap;

/// A map that preserves encounter order.
///
/// AMQP map encodings carry entries in a defined order, so a plain
/// `HashMap` would not round-trip canonically. This wraps
/// [`indexmap::IndexMap`] and adds the `Hash` impl needed for maps to be
/// usable as map keys inside [`crate::Value`].
#[derive(Debug, Clone)]
pub struct OrderedMap<K, V>(IndexMap<K, V>);

impl<K, V> Default for OrderedMap<K, V> {
    fn default() -> Self {
        Self(IndexMap::new())
    }
}

impl<K, V> OrderedMap<K, V> {
    /// Creates an empty map.
    pub fn new() -> Self {
        Self::default()
    }

    /// Number of entries.
    pub fn len(&self) -> usize {
        self.0.len()
    }

    /// Whether the map has no entries.
    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }

    /// Iterates entries in encounter order.
    pub fn iter(&self) -> indexmap::map::Iter<'_, K, V> {
        self.0.iter()
    }
}

impl<K, V> OrderedMap<K, V>
where
    K: Hash + Eq,
{
    /// Inserts an entry, keeping the position of an existing key.
    pub fn insert(&mut self, key: K, value: V) -> Option<V> {
        self.0.insert(key, value)
    }

    /// Looks an entry up by key.
    pub fn get<Q>(&self, key: &Q) -> Option<&V>
    where
        Q: Hash + indexmap::Equivalent<K> + ?Sized,
    {
        self.0.get(key)
    }

    /// Removes an entry by key, preserving the order of the rest.
    pub fn shift_remove<Q>(&mut self, key: &Q) -> Option<V>
    where
        Q: Hash + indexmap::Equivalent<K> + ?Sized,
    {
        self.0.shift_remove(key)
    }
}

impl<K, V> PartialEq for OrderedMap<K, V>
where
    K: Hash + Eq,
    V: PartialEq,
{
    fn eq(&self, other: &Self) -> bool {
        self.0 == other.0
    }
}

impl<K, V> Eq for OrderedMap<K, V>
where
    K: Hash + Eq,
    V: Eq,
{
}

impl<K, V> Hash for OrderedMap<K, V>
where
    K: Hash,
    V: Hash,
{
    fn hash<H: Hasher>(&self, state: &mut H) {
        state.write_usize(self.0.len());
        for (k, v) in &self.0 {
            k.hash(state);
            v.hash(state);
        }
    }
}

impl<K, V> From<IndexMap<K, V>> for OrderedMap<K, V> {
    fn from(val: IndexMap<K, V>) -> Self {
        Self(val)
    }
}

impl<K, V> FromIterator<(K, V)> for OrderedMap<K, V>
where
    K: Hash + Eq,
{
    fn from_iter<T: IntoIterator<Item = (K, V)>>(iter: T) -> Self {
        Self(IndexMap::from_iter(iter))
    }
}

impl<K, V> IntoIterator for OrderedMap<K, V> {
    type Item = (K, V);
    type IntoIter = indexmap::map::IntoIter<K, V>;

    fn into_iter(self) -> Self::IntoIter {
        self.0.into_iter()
    }
}

impl<'a, K, V> IntoIterator for &'a OrderedMap<K, V> {
    type Item = (&'a K, &'a V);
    type IntoIter = indexmap::map::Iter<'a, K, V>;

    fn into_iter(self) -> Self::IntoIter {
        self.0.iter()
    }
}
