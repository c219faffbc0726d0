use std::{
    collections::{BTreeMap, btree_map},
    ops::RangeBounds,
};

use crate::{
    error::Result,
    storage::engine::{Engine, EngineIterator},
};

/// Volatile engine over an ordered map, used for tests and scratch sessions
#[derive(Debug, Default)]
pub struct MemoryEngine {
    data: BTreeMap<Vec<u8>, Vec<u8>>,
}

impl MemoryEngine {
    pub fn new() -> Self {
        Self::default()
    }
}

impl Engine for MemoryEngine {
    type EngineIterator<'a> = MemoryEngineIterator<'a>;

    fn set(&mut self, key: Vec<u8>, value: Vec<u8>) -> Result<()> {
        self.data.insert(key, value);
        Ok(())
    }

    fn get(&mut self, key: Vec<u8>) -> Result<Option<Vec<u8>>> {
        Ok(self.data.get(&key).cloned())
    }

    fn delete(&mut self, key: Vec<u8>) -> Result<()> {
        self.data.remove(&key);
        Ok(())
    }

    fn scan(&mut self, range: impl RangeBounds<Vec<u8>>) -> Self::EngineIterator<'_> {
        MemoryEngineIterator {
            inner: self.data.range(range),
        }
    }
}

pub struct MemoryEngineIterator<'a> {
    inner: btree_map::Range<'a, Vec<u8>, Vec<u8>>,
}

fn owned((k, v): (&Vec<u8>, &Vec<u8>)) -> Result<(Vec<u8>, Vec<u8>)> {
    Ok((k.clone(), v.clone()))
}

impl EngineIterator for MemoryEngineIterator<'_> {}

impl Iterator for MemoryEngineIterator<'_> {
    type Item = Result<(Vec<u8>, Vec<u8>)>;

    fn next(&mut self) -> Option<Self::Item> {
        self.inner.next().map(owned)
    }
}

impl DoubleEndedIterator for MemoryEngineIterator<'_> {
    fn next_back(&mut self) -> Option<Self::Item> {
        self.inner.next_back().map(owned)
    }
}
