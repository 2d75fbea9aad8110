//! The reached set.
//!
//! Maps ARG vertices to the precision they were explored under and owns
//! the waitlist. Waitlist membership is always a subset of the reached
//! map; every mutation path here preserves that invariant, and it is
//! debug-asserted on pop. A per-location index serves the merge and stop
//! operators their candidate subsets.

use std::collections::HashMap;

use indexmap::IndexMap;
use loris_cfa::LocationId;

use crate::arg::VertexId;
use crate::waitlist::{TieBreak, Waitlist};

/// Size view handed to precision adjustment.
///
/// Deliberately narrow: adjustment may react to how large the reached set
/// or the frontier has grown, but does not get to mutate or enumerate it.
pub trait ReachedStats {
    fn len(&self) -> usize;
    fn frontier_len(&self) -> usize;
    fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

#[derive(Debug)]
pub struct ReachedSet<P> {
    /// Vertex to (location, precision), in insertion order.
    entries: IndexMap<VertexId, (LocationId, P)>,
    by_location: HashMap<LocationId, Vec<VertexId>>,
    waitlist: Waitlist,
}

impl<P: Clone> ReachedSet<P> {
    pub fn new(tie_break: TieBreak) -> Self {
        Self {
            entries: IndexMap::new(),
            by_location: HashMap::new(),
            waitlist: Waitlist::new(tie_break),
        }
    }

    /// Add a vertex to the reached set and the waitlist.
    pub fn add(&mut self, v: VertexId, location: LocationId, precision: P, sort_key: i64) {
        self.insert_entry(v, location, precision);
        self.waitlist.add(v, sort_key);
    }

    /// Add a vertex that must not be scheduled for expansion (`Break`).
    pub fn add_outside_waitlist(&mut self, v: VertexId, location: LocationId, precision: P) {
        self.insert_entry(v, location, precision);
    }

    fn insert_entry(&mut self, v: VertexId, location: LocationId, precision: P) {
        let previous = self.entries.insert(v, (location, precision));
        debug_assert!(previous.is_none(), "vertex {v} reached twice");
        self.by_location.entry(location).or_default().push(v);
    }

    /// Re-queue an already-reached vertex (after uncovering or refinement).
    /// Returns `false` if the vertex is not reached or already queued.
    pub fn re_add_to_waitlist(&mut self, v: VertexId, sort_key: i64) -> bool {
        if !self.entries.contains_key(&v) {
            return false;
        }
        self.waitlist.add(v, sort_key)
    }

    pub fn pop_waitlist(&mut self) -> Option<VertexId> {
        let v = self.waitlist.pop()?;
        debug_assert!(self.entries.contains_key(&v), "waitlist not a subset of reached");
        Some(v)
    }

    /// Drop a vertex from the reached set (and the waitlist, if queued).
    pub fn remove(&mut self, v: VertexId) -> Option<P> {
        let (location, precision) = self.entries.shift_remove(&v)?;
        if let Some(bucket) = self.by_location.get_mut(&location) {
            bucket.retain(|&c| c != v);
        }
        self.waitlist.remove(v);
        Some(precision)
    }

    pub fn contains(&self, v: VertexId) -> bool {
        self.entries.contains_key(&v)
    }

    pub fn in_waitlist(&self, v: VertexId) -> bool {
        self.waitlist.contains(v)
    }

    pub fn precision(&self, v: VertexId) -> Option<&P> {
        self.entries.get(&v).map(|(_, p)| p)
    }

    pub fn location(&self, v: VertexId) -> Option<LocationId> {
        self.entries.get(&v).map(|(l, _)| *l)
    }

    pub fn set_precision(&mut self, v: VertexId, precision: P) -> bool {
        match self.entries.get_mut(&v) {
            Some((_, p)) => {
                *p = precision;
                true
            }
            None => false,
        }
    }

    /// Reached vertices at `location`, in insertion order.
    pub fn at_location(&self, location: LocationId) -> &[VertexId] {
        self.by_location
            .get(&location)
            .map(Vec::as_slice)
            .unwrap_or(&[])
    }

    /// Snapshot of all reached vertex ids in insertion order. Later
    /// mutation of the set does not affect an already-taken snapshot.
    pub fn vertices(&self) -> Vec<VertexId> {
        self.entries.keys().copied().collect()
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    pub fn frontier_len(&self) -> usize {
        self.waitlist.len()
    }

    pub fn waitlist_is_empty(&self) -> bool {
        self.waitlist.is_empty()
    }
}

impl<P> ReachedStats for ReachedSet<P> {
    fn len(&self) -> usize {
        self.entries.len()
    }

    fn frontier_len(&self) -> usize {
        self.waitlist.len()
    }
}
