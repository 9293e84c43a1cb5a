use std::hash::Hash;

use fnv::FnvHashMap;

/// FNV-keyed map for small integer-like keys (stage tags, table functions).
#[derive(Debug, Clone)]
pub struct Map<K, V>(pub FnvHashMap<K, V>);

impl<K: Eq + Hash, V> Default for Map<K, V> {
    fn default() -> Self {
        Self::new()
    }
}

impl<K: Eq + Hash, V> Map<K, V> {
    pub fn new() -> Self {
        Self(FnvHashMap::<K, V>::default())
    }

    pub fn insert(&mut self, k: K, data: V) -> Option<V> {
        self.0.insert(k, data)
    }

    pub fn get(&self, k: &K) -> Option<&V> {
        self.0.get(k)
    }

    pub fn remove(&mut self, k: &K) -> Option<V> {
        self.0.remove(k)
    }

    pub fn contains_key(&self, k: &K) -> bool {
        self.0.contains_key(k)
    }

    pub fn len(&self) -> usize {
        self.0.len()
    }

    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }

    pub fn values(&self) -> impl Iterator<Item = &V> {
        self.0.values()
    }
}

#[cfg(test)]
mod tests {
    use super::Map;

    #[test]
    fn insert_get_remove() {
        let mut map: Map<u32, &str> = Map::new();
        assert!(map.is_empty());
        assert_eq!(map.insert(3, "a"), None);
        assert_eq!(map.insert(3, "b"), Some("a"));
        assert_eq!(map.get(&3), Some(&"b"));
        assert!(map.contains_key(&3));
        assert_eq!(map.remove(&3), Some("b"));
        assert_eq!(map.len(), 0);
    }
}
