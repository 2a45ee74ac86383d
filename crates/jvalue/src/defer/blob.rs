//! Byte-blob deferred array driver: each element is an integer 0–255,
//! with O(1) indexed access.

use super::{DeferredDriver, DeferredScan};
use crate::number::Number;
use crate::value::Value;
use std::sync::Arc;

#[derive(Debug, Clone)]
pub struct BlobArray {
    bytes: Arc<[u8]>,
}

impl BlobArray {
    pub fn new(bytes: impl Into<Arc<[u8]>>) -> Self {
        BlobArray { bytes: bytes.into() }
    }

    pub fn bytes(&self) -> &[u8] {
        &self.bytes
    }
}

impl DeferredDriver for BlobArray {
    fn len_hint(&self) -> Option<usize> {
        Some(self.bytes.len())
    }

    fn open_scan<'a>(&'a self) -> Box<dyn DeferredScan + 'a> {
        Box::new(BlobScan { blob: self, next: 0 })
    }

    fn by_index(&self, index: usize) -> Option<Value> {
        self.bytes.get(index).map(|b| Value::Number(Number::from_int(*b as i64)))
    }
}

struct BlobScan<'a> {
    blob: &'a BlobArray,
    next: usize,
}

impl<'a> DeferredScan for BlobScan<'a> {
    fn next(&mut self) -> Option<Value> {
        let v = self.blob.bytes.get(self.next)?;
        self.next += 1;
        Some(Value::Number(Number::from_int(*v as i64)))
    }
}

#[cfg(test)]
mod test {
    use super::*;

    #[test]
    fn indexes_and_scans() {
        let blob = BlobArray::new(vec![1u8, 2, 255]);
        assert_eq!(blob.by_index(2).unwrap().to_string(), "255");
        let mut scan = blob.open_scan();
        let mut out = Vec::new();
        while let Some(v) = scan.next() {
            out.push(v.to_string());
        }
        assert_eq!(out, vec!["1", "2", "255"]);
    }
}
