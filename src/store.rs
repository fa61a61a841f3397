use std::collections::HashMap;

use parking_lot::Mutex;

/// A per-node container mapping opaque block keys to opaque block values.
///
/// The overlay only requires that the store exist and be internally
/// synchronized; placement of blocks onto the ring follows the successor
/// mapping and is downstream work. Values are owned copies, so readers
/// never observe a block mid-write.
#[derive(Debug, Default)]
pub struct BlockStore {
    blocks: Mutex<HashMap<Vec<u8>, Vec<u8>>>,
}

impl BlockStore {
    /// Creates an empty store.
    pub fn new() -> BlockStore {
        BlockStore::default()
    }

    /// Inserts or replaces the block at `key`.
    pub fn put(&self, key: Vec<u8>, value: Vec<u8>) {
        self.blocks.lock().insert(key, value);
    }

    /// Returns a copy of the block at `key`, if present.
    pub fn get(&self, key: &[u8]) -> Option<Vec<u8>> {
        self.blocks.lock().get(key).cloned()
    }

    /// Removes the block at `key`, reporting whether it existed.
    pub fn delete(&self, key: &[u8]) -> bool {
        self.blocks.lock().remove(key).is_some()
    }

    /// All keys currently held, in no particular order.
    pub fn keys(&self) -> Vec<Vec<u8>> {
        self.blocks.lock().keys().cloned().collect()
    }

    /// Number of blocks held.
    pub fn len(&self) -> usize {
        self.blocks.lock().len()
    }

    /// Whether the store holds no blocks.
    pub fn is_empty(&self) -> bool {
        self.blocks.lock().is_empty()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn put_get_delete_round_trip() {
        let store = BlockStore::new();
        assert!(store.is_empty());

        store.put(b"alpha".to_vec(), b"one".to_vec());
        store.put(b"beta".to_vec(), b"two".to_vec());
        assert_eq!(store.get(b"alpha"), Some(b"one".to_vec()));
        assert_eq!(store.len(), 2);

        store.put(b"alpha".to_vec(), b"three".to_vec());
        assert_eq!(store.get(b"alpha"), Some(b"three".to_vec()));

        assert!(store.delete(b"alpha"));
        assert!(!store.delete(b"alpha"));
        assert_eq!(store.get(b"alpha"), None);

        let mut keys = store.keys();
        keys.sort();
        assert_eq!(keys, vec![b"beta".to_vec()]);
    }
}
