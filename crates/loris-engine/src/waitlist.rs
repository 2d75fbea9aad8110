//! The exploration frontier.
//!
//! A [`Waitlist`] holds the ARG vertices still awaiting expansion, sorted
//! by an `i64` key: `pop` always returns a vertex with the highest key,
//! ties broken by a secondary LIFO or FIFO policy. Membership has set
//! semantics; adding a vertex twice is a no-op.

use std::collections::{BTreeMap, HashMap, VecDeque};
use std::str::FromStr;

use crate::arg::VertexId;
use crate::error::ConfigError;

/// Secondary policy among vertices with equal sort keys.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum TieBreak {
    /// Most recently added first.
    #[default]
    Lifo,
    /// Least recently added first.
    Fifo,
}

/// Named traversal strategies, mapped to a key derivation plus tie-break.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum WaitlistStrategy {
    /// Breadth-first: constant key, FIFO ties.
    #[default]
    Fifo,
    /// Depth-first by recency: constant key, LIFO ties.
    Lifo,
    /// Deepest ARG vertex first.
    Dfs,
    /// Shallowest ARG vertex first.
    Bfs,
}

impl WaitlistStrategy {
    /// Sort key for a vertex at the given ARG depth.
    pub fn sort_key(&self, depth: usize) -> i64 {
        match self {
            WaitlistStrategy::Fifo | WaitlistStrategy::Lifo => 0,
            WaitlistStrategy::Dfs => depth as i64,
            WaitlistStrategy::Bfs => -(depth as i64),
        }
    }

    pub fn tie_break(&self) -> TieBreak {
        match self {
            WaitlistStrategy::Fifo | WaitlistStrategy::Bfs => TieBreak::Fifo,
            WaitlistStrategy::Lifo | WaitlistStrategy::Dfs => TieBreak::Lifo,
        }
    }
}

impl FromStr for WaitlistStrategy {
    type Err = ConfigError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "fifo" => Ok(WaitlistStrategy::Fifo),
            "lifo" => Ok(WaitlistStrategy::Lifo),
            "dfs" => Ok(WaitlistStrategy::Dfs),
            "bfs" => Ok(WaitlistStrategy::Bfs),
            other => Err(ConfigError::UnknownWaitlistStrategy(other.to_string())),
        }
    }
}

/// Sorted frontier of vertices awaiting expansion.
#[derive(Debug, Default)]
pub struct Waitlist {
    /// Key buckets in ascending order; pop takes from the last bucket.
    /// Emptied buckets are removed eagerly.
    buckets: BTreeMap<i64, VecDeque<VertexId>>,
    /// Membership plus the key each member was filed under.
    keys: HashMap<VertexId, i64>,
    tie_break: TieBreak,
}

impl Waitlist {
    pub fn new(tie_break: TieBreak) -> Self {
        Self {
            buckets: BTreeMap::new(),
            keys: HashMap::new(),
            tie_break,
        }
    }

    /// Add `vertex` under `key`. Returns `false` if it was already queued.
    pub fn add(&mut self, vertex: VertexId, key: i64) -> bool {
        if self.keys.contains_key(&vertex) {
            return false;
        }
        self.keys.insert(vertex, key);
        self.buckets.entry(key).or_default().push_back(vertex);
        true
    }

    /// Remove and return a vertex with the highest key.
    pub fn pop(&mut self) -> Option<VertexId> {
        let mut entry = self.buckets.last_entry()?;
        let vertex = match self.tie_break {
            TieBreak::Lifo => entry.get_mut().pop_back(),
            TieBreak::Fifo => entry.get_mut().pop_front(),
        }?;
        if entry.get().is_empty() {
            entry.remove();
        }
        self.keys.remove(&vertex);
        Some(vertex)
    }

    /// Remove `vertex` wherever it is queued. Returns whether it was there.
    pub fn remove(&mut self, vertex: VertexId) -> bool {
        let Some(key) = self.keys.remove(&vertex) else {
            return false;
        };
        if let Some(bucket) = self.buckets.get_mut(&key) {
            bucket.retain(|&v| v != vertex);
            if bucket.is_empty() {
                self.buckets.remove(&key);
            }
        }
        true
    }

    pub fn contains(&self, vertex: VertexId) -> bool {
        self.keys.contains_key(&vertex)
    }

    pub fn len(&self) -> usize {
        self.keys.len()
    }

    pub fn is_empty(&self) -> bool {
        self.keys.is_empty()
    }
}
