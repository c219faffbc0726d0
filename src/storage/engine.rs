use std::ops::{Bound, RangeBounds};

use crate::error::Result;

/// Byte-level key/value engine underneath the table store.
///
/// Keys are ordered lexicographically; the table store relies on this for
/// prefix scans over one table's rows.
pub trait Engine {
    type EngineIterator<'a>: EngineIterator
    where
        Self: 'a;

    fn set(&mut self, key: Vec<u8>, value: Vec<u8>) -> Result<()>;
    fn get(&mut self, key: Vec<u8>) -> Result<Option<Vec<u8>>>;
    fn delete(&mut self, key: Vec<u8>) -> Result<()>;
    fn scan(&mut self, range: impl RangeBounds<Vec<u8>>) -> Self::EngineIterator<'_>;

    /// Makes every completed write durable. A no-op for volatile engines.
    fn flush(&mut self) -> Result<()> {
        Ok(())
    }

    /// Prefix scan using lexicographic ordering
    ///
    /// Converts prefix scan to range scan by incrementing the last byte.
    /// For example, prefix "apple" becomes range ["apple", "applf").
    /// Trailing 0xff bytes cannot be incremented and are dropped first.
    fn scan_prefix(&mut self, prefix: Vec<u8>) -> Self::EngineIterator<'_> {
        let start = Bound::Included(prefix.clone());
        let mut upper = prefix;
        while upper.last() == Some(&0xff) {
            upper.pop();
        }
        let end = match upper.last_mut() {
            Some(last) => {
                *last += 1;
                Bound::Excluded(upper)
            }
            None => Bound::Unbounded,
        };
        self.scan((start, end))
    }
}

/// Storage engine iterator trait (supports reverse traversal)
pub trait EngineIterator: DoubleEndedIterator<Item = Result<(Vec<u8>, Vec<u8>)>> {}
