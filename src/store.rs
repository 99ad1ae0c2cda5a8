//! The primary shard owned by this node (`store`) and the replica it
//! holds of its predecessor's shard (`pre_backup`). Both are plain
//! `HashMap`s guarded by their own lock. Lock order is fixed as `store`
//! before `pre_backup` wherever both are needed, and every call site in
//! this crate that needs both follows that order.

use std::collections::HashMap;
use std::time::{SystemTime, UNIX_EPOCH};

pub type Key = Vec<u8>;

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct StoredValue {
    pub value: Vec<u8>,
    /// Seconds since epoch after which the entry is considered gone.
    /// Zero means the entry never expires.
    pub expires_at: u64,
}

impl StoredValue {
    pub fn new(value: Vec<u8>, ttl_secs: u64) -> Self {
        let expires_at = if ttl_secs == 0 {
            0
        } else {
            now_secs() + ttl_secs
        };
        StoredValue { value, expires_at }
    }

    pub fn is_expired(&self) -> bool {
        self.expires_at != 0 && self.expires_at <= now_secs()
    }
}

pub fn now_secs() -> u64 {
    SystemTime::now()
        .duration_since(UNIX_EPOCH)
        .expect("system clock before unix epoch")
        .as_secs()
}

#[derive(Debug, Clone, Default)]
pub struct KvStore {
    entries: HashMap<Key, StoredValue>,
}

impl KvStore {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    pub fn insert(&mut self, key: Key, value: StoredValue) {
        self.entries.insert(key, value);
    }

    /// Returns the value if present and not expired; expired entries are
    /// evicted lazily on read.
    pub fn get_live(&mut self, key: &Key) -> Option<StoredValue> {
        match self.entries.get(key) {
            Some(v) if v.is_expired() => {
                self.entries.remove(key);
                None
            }
            Some(v) => Some(v.clone()),
            None => None,
        }
    }

    /// Removes and returns the entry if present, idempotent on a
    /// subsequent call for the same key.
    pub fn remove(&mut self, key: &Key) -> Option<StoredValue> {
        self.entries.remove(key)
    }

    pub fn contains(&self, key: &Key) -> bool {
        self.entries.contains_key(key)
    }

    /// Merges `other` into self with overwrite semantics, matching
    /// `AppendPreBackup`'s contract.
    pub fn merge_overwrite(&mut self, other: KvStore) {
        self.entries.extend(other.entries);
    }

    /// Deletes every key present in `keys`, matching
    /// `EraseRedundantPreBackup`'s contract. A no-op for absent keys.
    pub fn erase_keys<'a>(&mut self, keys: impl Iterator<Item = &'a Key>) {
        for key in keys {
            self.entries.remove(key);
        }
    }

    /// Splits off every entry whose key does not belong in
    /// `(boundary, owner]`; used by `TransferData` to hand the donor's
    /// previous-owner range to a newly joined predecessor.
    pub fn split_outside(
        &mut self,
        belongs: impl Fn(&Key) -> bool,
    ) -> KvStore {
        let mut moved = KvStore::new();
        let moving: Vec<Key> = self
            .entries
            .keys()
            .filter(|k| !belongs(k))
            .cloned()
            .collect();
        for key in moving {
            if let Some(value) = self.entries.remove(&key) {
                moved.entries.insert(key, value);
            }
        }
        moved
    }

    pub fn iter(&self) -> impl Iterator<Item = (&Key, &StoredValue)> {
        self.entries.iter()
    }

    pub fn keys(&self) -> impl Iterator<Item = &Key> {
        self.entries.keys()
    }

    pub fn take(self) -> HashMap<Key, StoredValue> {
        self.entries
    }
}

impl FromIterator<(Key, StoredValue)> for KvStore {
    fn from_iter<T: IntoIterator<Item = (Key, StoredValue)>>(iter: T) -> Self {
        KvStore {
            entries: HashMap::from_iter(iter),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn erase_keys_is_idempotent() {
        let mut store = KvStore::new();
        store.insert(b"k".to_vec(), StoredValue::new(b"v".to_vec(), 0));
        store.erase_keys([b"k".to_vec()].iter());
        store.erase_keys([b"k".to_vec()].iter());
        assert!(!store.contains(&b"k".to_vec()));
    }

    #[test]
    fn append_pre_backup_overwrites() {
        let mut store = KvStore::new();
        store.insert(b"k".to_vec(), StoredValue::new(b"old".to_vec(), 0));
        let mut other = KvStore::new();
        other.insert(b"k".to_vec(), StoredValue::new(b"new".to_vec(), 0));
        store.merge_overwrite(other);
        assert_eq!(store.get_live(&b"k".to_vec()).unwrap().value, b"new".to_vec());
    }

    #[test]
    fn expired_entry_is_evicted_on_read() {
        let mut store = KvStore::new();
        let mut expired = StoredValue::new(b"v".to_vec(), 1);
        expired.expires_at = 1; // epoch second 1, always in the past
        store.insert(b"k".to_vec(), expired);
        assert!(store.get_live(&b"k".to_vec()).is_none());
        assert!(!store.contains(&b"k".to_vec()));
    }
}
