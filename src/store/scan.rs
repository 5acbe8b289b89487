//! Bucket Scan
//!
//! Lazy iteration over one bucket of a committed snapshot.

use std::ops::Bound;
use std::sync::Arc;

use bytes::Bytes;

use super::state::BucketData;

/// Iterator over a bucket in lexicographic key order
///
/// Holds its own reference to the bucket it was created from, so later
/// commits are never visible through it. Dropping it releases the snapshot.
pub struct Scan {
    data: Option<Arc<BucketData>>,
    /// Last key yielded; the next step resumes strictly after it
    cursor: Option<Vec<u8>>,
}

impl Scan {
    pub(crate) fn new(data: Option<Arc<BucketData>>) -> Self {
        Self { data, cursor: None }
    }

    /// Number of entries in the pinned bucket (including already yielded ones)
    pub fn total(&self) -> usize {
        self.data.as_ref().map_or(0, |d| d.len())
    }
}

impl Iterator for Scan {
    /// (key, value)
    type Item = (Vec<u8>, Bytes);

    fn next(&mut self) -> Option<Self::Item> {
        let data = self.data.as_ref()?;

        let next = match &self.cursor {
            None => data.iter().next(),
            Some(last) => data
                .range::<[u8], _>((Bound::Excluded(last.as_slice()), Bound::Unbounded))
                .next(),
        };

        let (key, value) = next?;
        self.cursor = Some(key.clone());
        Some((key.clone(), value.clone()))
    }
}
