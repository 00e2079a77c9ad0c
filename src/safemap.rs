use crate::RwLock;
use foldhash::fast::RandomState;
use std::borrow::Borrow;
use std::collections::HashMap;
use std::fmt;
use std::hash::Hash;

/// A thread-safe hashmap guarded by a single reader/writer lock.
///
/// Every operation takes the lock exactly once: lookups and iteration take a shared
/// hold, writes take an exclusive hold. Values are handed out by clone, no reference
/// into the map ever escapes the lock.
pub struct SafeMap<K, V> {
    map: RwLock<HashMap<K, V, RandomState>>,
}

impl<K: Eq + Hash, V> Default for SafeMap<K, V> {
    fn default() -> Self {
        Self::new()
    }
}

impl<K: Eq + Hash, V> SafeMap<K, V> {
    /// Creates an empty `SafeMap`.
    ///
    /// # Examples
    /// ```
    /// use safemap::SafeMap;
    ///
    /// let map = SafeMap::<String, u32>::new();
    /// assert!(map.is_empty());
    /// ```
    pub fn new() -> Self {
        Self::with_capacity(0)
    }

    /// Creates an empty `SafeMap` with room for at least `capacity` entries.
    ///
    /// # Arguments
    ///
    /// * `capacity` - The initial capacity of the hashmap.
    pub fn with_capacity(capacity: usize) -> Self {
        Self {
            map: RwLock::new(HashMap::with_capacity_and_hasher(
                capacity,
                RandomState::default(),
            )),
        }
    }

    /// Stores a value for the given key, overwriting any previous value.
    ///
    /// # Examples
    /// ```
    /// use safemap::SafeMap;
    ///
    /// let map = SafeMap::<String, u32>::new();
    /// map.store("key".to_string(), 42);
    /// map.store("key".to_string(), 123);
    /// assert_eq!(map.load("key"), 123);
    /// assert_eq!(map.len(), 1);
    /// ```
    pub fn store(&self, key: K, value: V) {
        self.map.write().insert(key, value);
    }

    /// Removes the entry for the given key. Deleting an absent key is a no-op.
    pub fn delete<Q>(&self, key: &Q)
    where
        K: Borrow<Q>,
        Q: Eq + Hash + ?Sized,
    {
        self.map.write().remove(key);
    }

    /// Gets the value associated with the given key, or `V::default()` if the key
    /// is absent.
    ///
    /// An absent key and a key holding the default value look the same here, use
    /// [`load_checked`](Self::load_checked) or [`get`](Self::get) to tell them apart.
    ///
    /// # Examples
    /// ```
    /// use safemap::SafeMap;
    ///
    /// let map = SafeMap::<String, String>::new();
    /// assert_eq!(map.load("foo"), "");
    /// map.store("foo".to_string(), "bar".to_string());
    /// assert_eq!(map.load("foo"), "bar");
    /// ```
    pub fn load<Q>(&self, key: &Q) -> V
    where
        K: Borrow<Q>,
        V: Clone + Default,
        Q: Eq + Hash + ?Sized,
    {
        self.map.read().get(key).cloned().unwrap_or_default()
    }

    /// Gets the value associated with the given key together with a flag telling
    /// whether the key was present.
    ///
    /// # Returns
    /// * `(value, true)` if the key exists
    /// * `(V::default(), false)` if the key doesn't exist
    pub fn load_checked<Q>(&self, key: &Q) -> (V, bool)
    where
        K: Borrow<Q>,
        V: Clone + Default,
        Q: Eq + Hash + ?Sized,
    {
        match self.get(key) {
            Some(value) => (value, true),
            None => (V::default(), false),
        }
    }

    /// Gets a clone of the value associated with the given key.
    ///
    /// # Returns
    /// * `Some(V)` if the key exists
    /// * `None` if the key doesn't exist
    pub fn get<Q>(&self, key: &Q) -> Option<V>
    where
        K: Borrow<Q>,
        V: Clone,
        Q: Eq + Hash + ?Sized,
    {
        self.map.read().get(key).cloned()
    }

    pub fn contains_key<Q>(&self, key: &Q) -> bool
    where
        K: Borrow<Q>,
        Q: Eq + Hash + ?Sized,
    {
        self.map.read().contains_key(key)
    }

    /// Installs a new value for the key and returns what it replaced.
    ///
    /// The read of the old value and the write of the new one happen under a single
    /// exclusive hold, so concurrent swaps on the same key never observe the same
    /// previous value twice and never lose an update.
    ///
    /// # Returns
    /// * `(previous, true)` if the key existed
    /// * `(V::default(), false)` if the key didn't exist
    ///
    /// # Examples
    /// ```
    /// use safemap::SafeMap;
    ///
    /// let map = SafeMap::<&str, u32>::new();
    /// assert_eq!(map.swap("key", 1), (0, false));
    /// assert_eq!(map.swap("key", 2), (1, true));
    /// assert_eq!(map.load("key"), 2);
    /// ```
    pub fn swap(&self, key: K, value: V) -> (V, bool)
    where
        V: Default,
    {
        match self.replace(key, value) {
            Some(previous) => (previous, true),
            None => (V::default(), false),
        }
    }

    /// Like [`swap`](Self::swap), but reports a missing previous value as `None`.
    pub fn replace(&self, key: K, value: V) -> Option<V> {
        self.map.write().insert(key, value)
    }

    /// Calls `f` for every entry until it returns `false`.
    ///
    /// The whole iteration runs under one shared hold, so it sees a consistent
    /// snapshot of the map. Iteration order is unspecified.
    ///
    /// **Locking behaviour:** Deadlock if `f` calls `store`, `delete`, `swap` or
    /// `replace` on the same map. Reading the map from `f` is fine.
    ///
    /// # Examples
    /// ```
    /// use safemap::SafeMap;
    ///
    /// let map = SafeMap::<u32, u32>::new();
    /// map.store(1, 10);
    /// map.store(2, 20);
    ///
    /// let mut sum = 0;
    /// map.range(|k, v| {
    ///     sum += k * v;
    ///     // let _ = map.load(k); // OK
    ///     // map.store(3, 30); // DEADLOCK!
    ///     true
    /// });
    /// assert_eq!(sum, 50);
    /// ```
    pub fn range<F>(&self, mut f: F)
    where
        F: FnMut(&K, &V) -> bool,
    {
        let map = self.map.read();
        for (key, value) in map.iter() {
            if !f(key, value) {
                break;
            }
        }
    }

    /// Calls `f` for every value until it returns `false`.
    ///
    /// **Locking behaviour:** same as [`range`](Self::range).
    pub fn range_values<F>(&self, mut f: F)
    where
        F: FnMut(&V) -> bool,
    {
        let map = self.map.read();
        for value in map.values() {
            if !f(value) {
                break;
            }
        }
    }

    /// Calls `f` for every key until it returns `false`.
    ///
    /// **Locking behaviour:** same as [`range`](Self::range).
    pub fn range_keys<F>(&self, mut f: F)
    where
        F: FnMut(&K) -> bool,
    {
        let map = self.map.read();
        for key in map.keys() {
            if !f(key) {
                break;
            }
        }
    }

    pub fn len(&self) -> usize {
        self.map.read().len()
    }

    pub fn is_empty(&self) -> bool {
        self.map.read().is_empty()
    }
}

impl<K: Eq + Hash, V> FromIterator<(K, V)> for SafeMap<K, V> {
    fn from_iter<I: IntoIterator<Item = (K, V)>>(iter: I) -> Self {
        Self {
            map: RwLock::new(iter.into_iter().collect()),
        }
    }
}

impl<K: fmt::Debug, V: fmt::Debug> fmt::Debug for SafeMap<K, V> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_map().entries(self.map.read().iter()).finish()
    }
}
