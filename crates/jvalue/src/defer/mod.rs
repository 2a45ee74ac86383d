//! Deferred (lazy) array drivers.
//!
//! A deferred array produces its elements on demand instead of storing
//! them in memory. We model this as a trait object plus an RAII scan
//! handle: dropping the scan is the break-scan release.

pub mod blob;
pub mod file;
pub mod range;

use crate::value::Value;
use std::fmt;

pub use blob::BlobArray;
pub use file::FileBackedArray;
pub use range::RangeArray;

/// A source of lazily-produced array elements.
///
/// Implementations MAY provide `by_index`/`by_key_value` as O(1)
/// shortcuts; the evaluator always tries them before falling back to a
/// linear scan via [`open_scan`](DeferredDriver::open_scan).
pub trait DeferredDriver: fmt::Debug + Send + Sync {
    /// A cheap upper bound on the element count, if known without a scan.
    fn len_hint(&self) -> Option<usize>;

    /// Opens a fresh scan over the driver's elements. Dropping the scan
    /// (whether by running it to completion or abandoning it early) is
    /// the break-scan release point.
    fn open_scan<'a>(&'a self) -> Box<dyn DeferredScan + 'a>;

    /// O(1) indexed lookup, if the driver supports direct access.
    fn by_index(&self, _index: usize) -> Option<Value> {
        None
    }

    /// O(1) lookup of the first row whose `key` member equals `value`,
    /// if the driver supports an index for it.
    fn by_key_value(&self, _key: &str, _value: &Value) -> Option<Value> {
        None
    }
}

/// An in-progress scan over a [`DeferredDriver`]'s elements.
pub trait DeferredScan {
    fn next(&mut self) -> Option<Value>;
}

/// A deferred array: a driver plus a small cache of facts a prior scan
/// already established (so later callers don't have to re-derive them).
pub struct DeferredArray {
    driver: std::sync::Arc<dyn DeferredDriver>,
    cached_len: std::cell::Cell<Option<usize>>,
}

impl fmt::Debug for DeferredArray {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("DeferredArray").field("driver", &self.driver).finish()
    }
}

impl Clone for DeferredArray {
    fn clone(&self) -> Self {
        // Deferred arrays share their driver (e.g. the same mmap'd file)
        // across clones; only eager arrays are deep-copied element by
        // element ("copying is always deep" applies to the *materialized*
        // elements, not to which file backs a lazy scan of them).
        DeferredArray { driver: self.driver.clone(), cached_len: self.cached_len.clone() }
    }
}

impl DeferredArray {
    pub fn new(driver: std::sync::Arc<dyn DeferredDriver>) -> Self {
        DeferredArray { driver, cached_len: std::cell::Cell::new(None) }
    }

    pub fn driver(&self) -> &dyn DeferredDriver {
        self.driver.as_ref()
    }

    pub fn open_scan(&self) -> Box<dyn DeferredScan + '_> {
        self.driver.open_scan()
    }

    pub fn by_index(&self, index: usize) -> Option<Value> {
        if let Some(v) = self.driver.by_index(index) {
            return Some(v);
        }
        // Fall back to a linear scan; this is the O(n) path the driver
        // contract allows when no shortcut is implemented.
        let mut scan = self.driver.open_scan();
        let mut i = 0;
        while let Some(v) = scan.next() {
            if i == index {
                return Some(v);
            }
            i += 1;
        }
        None
    }

    pub fn by_key_value(&self, key: &str, value: &Value) -> Option<Value> {
        if let Some(v) = self.driver.by_key_value(key, value) {
            return Some(v);
        }
        let mut scan = self.driver.open_scan();
        while let Some(row) = scan.next() {
            if let Value::Object(obj) = &row {
                if let Some(member) = obj.get(key) {
                    if member.loose_eq(value) {
                        return Some(row);
                    }
                }
            }
        }
        None
    }

    /// Length, computed by a full scan the first time and cached after.
    pub fn len(&self) -> usize {
        if let Some(n) = self.cached_len.get() {
            return n;
        }
        if let Some(n) = self.driver.len_hint() {
            self.cached_len.set(Some(n));
            return n;
        }
        let mut scan = self.driver.open_scan();
        let mut n = 0;
        while scan.next().is_some() {
            n += 1;
        }
        self.cached_len.set(Some(n));
        n
    }

    pub fn is_empty(&self) -> bool {
        self.driver.open_scan().next().is_none()
    }

    /// Materializes the whole deferred array into an eager `Vec<Value>`.
    /// Used by operations (joins, sorts) that need random access or
    /// multiple passes the driver can't provide directly.
    pub fn materialize(&self) -> Vec<Value> {
        let mut scan = self.driver.open_scan();
        let mut out = Vec::new();
        while let Some(v) = scan.next() {
            out.push(v);
        }
        out
    }
}
