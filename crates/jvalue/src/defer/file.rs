//! A memory-mapped, file-backed JSON array driver.
//!
//! This driver walks the file once to find the split points between
//! top-level array elements, then re-parses each element from its
//! mmap'd bytes on demand: an initial structural scan
//! (bracket/brace/string-aware, but it doesn't build any values) locates
//! each element's byte range, and later reads re-parse only the bytes
//! within that range.

use super::{DeferredDriver, DeferredScan};
use crate::error::{JError, Result};
use crate::value::Value;
use memmap2::Mmap;
use std::fs::File;
use std::path::Path;
use std::sync::Arc;

#[derive(Debug)]
pub struct FileBackedArray {
    mmap: Arc<Mmap>,
    /// Byte ranges of each top-level array element, relative to `mmap`.
    elements: Vec<(usize, usize)>,
}

impl FileBackedArray {
    /// Opens `path`, which must contain a single top-level JSON array,
    /// and indexes its element boundaries without parsing the elements.
    pub fn open(path: impl AsRef<Path>) -> Result<Self> {
        let file = File::open(path)?;
        // Safety: the mapped file is treated as an immutable byte slice
        // for the lifetime of this driver; the backing file must not be
        // mutated concurrently.
        let mmap = unsafe { Mmap::map(&file)? };
        let elements = index_array_elements(&mmap)
            .map_err(|e| JError::Driver(format!("malformed file-backed array: {e}")))?;
        tracing::debug!(count = elements.len(), "opened file-backed deferred array");
        Ok(FileBackedArray { mmap: Arc::new(mmap), elements })
    }

    fn parse_element(&self, idx: usize) -> Option<Value> {
        let (start, end) = *self.elements.get(idx)?;
        let text = std::str::from_utf8(&self.mmap[start..end]).ok()?;
        crate::io::parse_str(text).ok()
    }
}

impl DeferredDriver for FileBackedArray {
    fn len_hint(&self) -> Option<usize> {
        Some(self.elements.len())
    }

    fn open_scan<'a>(&'a self) -> Box<dyn DeferredScan + 'a> {
        Box::new(FileScan { array: self, next: 0 })
    }

    fn by_index(&self, index: usize) -> Option<Value> {
        self.parse_element(index)
    }
}

struct FileScan<'a> {
    array: &'a FileBackedArray,
    next: usize,
}

impl<'a> DeferredScan for FileScan<'a> {
    fn next(&mut self) -> Option<Value> {
        let v = self.array.parse_element(self.next)?;
        self.next += 1;
        Some(v)
    }
}

impl<'a> Drop for FileScan<'a> {
    fn drop(&mut self) {
        tracing::trace!(consumed = self.next, total = self.array.elements.len(), "file-backed scan released");
    }
}

/// Scans `bytes` (expected to hold a single top-level JSON array) for
/// the byte ranges of its elements, tracking string/escape state so that
/// `,`/`[`/`]` inside string literals don't confuse the split. Returns an
/// error string (not [`JError`] directly, to keep this free function
/// independent of the driver's own error type) on malformed input.
fn index_array_elements(bytes: &[u8]) -> std::result::Result<Vec<(usize, usize)>, String> {
    let mut i = 0;
    while i < bytes.len() && bytes[i].is_ascii_whitespace() {
        i += 1;
    }
    if bytes.get(i) != Some(&b'[') {
        return Err("expected top-level array".into());
    }
    i += 1;

    let mut elements = Vec::new();
    let mut depth = 0i32;
    let mut in_string = false;
    let mut escape = false;
    let mut elem_start: Option<usize> = None;

    loop {
        while i < bytes.len() && depth == 0 && elem_start.is_none() && bytes[i].is_ascii_whitespace() {
            i += 1;
        }
        let Some(&b) = bytes.get(i) else {
            return Err("unterminated array".into());
        };
        if depth == 0 && elem_start.is_none() {
            if b == b']' {
                return Ok(elements);
            }
            elem_start = Some(i);
        }
        if in_string {
            if escape {
                escape = false;
            } else if b == b'\\' {
                escape = true;
            } else if b == b'"' {
                in_string = false;
            }
            i += 1;
            continue;
        }
        match b {
            b'"' => in_string = true,
            b'[' | b'{' => depth += 1,
            b']' | b'}' if depth > 0 => depth -= 1,
            b',' | b']' if depth == 0 => {
                let start = elem_start.take().expect("element start set before a top-level separator");
                let mut end = i;
                while end > start && bytes[end - 1].is_ascii_whitespace() {
                    end -= 1;
                }
                elements.push((start, end));
                if b == b']' {
                    return Ok(elements);
                }
            }
            _ => {}
        }
        i += 1;
    }
}

#[cfg(test)]
mod test {
    use super::*;

    #[test]
    fn indexes_simple_array() {
        let bytes = br#"[1, "a,b", {"x": [1,2]}, true]"#;
        let ranges = index_array_elements(bytes).unwrap();
        assert_eq!(ranges.len(), 4);
        let texts: Vec<&str> = ranges
            .iter()
            .map(|&(s, e)| std::str::from_utf8(&bytes[s..e]).unwrap())
            .collect();
        assert_eq!(texts, vec!["1", "\"a,b\"", "{\"x\": [1,2]}", "true"]);
    }

    #[test]
    fn empty_array_has_no_elements() {
        let ranges = index_array_elements(b"[]").unwrap();
        assert!(ranges.is_empty());
    }
}
