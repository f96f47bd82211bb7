// Copyright (c) The report-tree Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

use crate::node::TestNodeId;
use parking_lot::RwLock;
use std::collections::HashMap;
use xxhash_rust::xxh3::xxh3_64;

/// Number of shards per map. Must be a power of two.
pub(super) const SHARD_COUNT: usize = 32;

/// A map from node ids to values, split into independently locked shards.
///
/// Writers for nodes on different shards never wait on each other. Each operation holds at most
/// one shard lock, and never while calling back into user code.
pub(super) struct ShardedMap<V> {
    shards: Box<[RwLock<HashMap<TestNodeId, V>>; SHARD_COUNT]>,
}

impl<V> ShardedMap<V> {
    pub(super) fn new() -> Self {
        Self {
            shards: Box::new(std::array::from_fn(|_| RwLock::new(HashMap::new()))),
        }
    }

    pub(super) fn insert(&self, key: TestNodeId, value: V) {
        self.shard(&key).write().insert(key, value);
    }

    pub(super) fn contains_key(&self, key: &TestNodeId) -> bool {
        self.shard(key).read().contains_key(key)
    }

    /// Runs `f` on the value for `key`, inserting a default value first if there is none.
    pub(super) fn update_or_default(&self, key: &TestNodeId, f: impl FnOnce(&mut V))
    where
        V: Default,
    {
        let mut shard = self.shard(key).write();
        match shard.get_mut(key) {
            Some(value) => f(value),
            None => {
                let mut value = V::default();
                f(&mut value);
                shard.insert(key.clone(), value);
            }
        }
    }

    pub(super) fn get_cloned(&self, key: &TestNodeId) -> Option<V>
    where
        V: Clone,
    {
        self.shard(key).read().get(key).cloned()
    }

    /// Runs `f` on a shared reference to the value for `key`, if any.
    pub(super) fn with<T>(&self, key: &TestNodeId, f: impl FnOnce(&V) -> T) -> Option<T> {
        self.shard(key).read().get(key).map(f)
    }

    pub(super) fn len(&self) -> usize {
        self.shards.iter().map(|shard| shard.read().len()).sum()
    }

    fn shard(&self, key: &TestNodeId) -> &RwLock<HashMap<TestNodeId, V>> {
        &self.shards[shard_index(key)]
    }
}

fn shard_index(key: &TestNodeId) -> usize {
    (xxh3_64(key.as_str().as_bytes()) as usize) & (SHARD_COUNT - 1)
}
