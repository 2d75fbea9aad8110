#![allow(dead_code)]

//! Shared fixtures: small CFAs, toy analyses and a scripted refiner.

use std::cell::Cell;
use std::collections::{BTreeSet, VecDeque};
use std::sync::Arc;

use loris_cfa::{Cfa, CfaBuilder, CfaEdge, LocationId};
use loris_engine::cpa::AbstractDomain;
use loris_engine::error::{AnalysisError, RefinementError};
use loris_engine::location::{LocationDomain, LocationState};
use loris_engine::refine::{ArgPath, RefinementOutcome, Refiner};
use loris_engine::Cpa;

/// A straight-line CFA `l0 -> l1 -> ... -> ln`, last location a target.
pub fn straight_line(labels: &[&str]) -> Arc<Cfa> {
    let mut b = CfaBuilder::new();
    let mut prev = b.add_location("l0");
    let entry = prev;
    for (i, label) in labels.iter().enumerate() {
        let next = if i == labels.len() - 1 {
            b.add_target_location(&format!("l{}", i + 1))
        } else {
            b.add_location(&format!("l{}", i + 1))
        };
        b.add_edge(prev, next, label).unwrap();
        prev = next;
    }
    Arc::new(b.build(entry).unwrap())
}

/// A single location with a self-loop and no targets.
pub fn self_loop() -> Arc<Cfa> {
    let mut b = CfaBuilder::new();
    let entry = b.add_location("spin");
    b.add_edge(entry, entry, "loop").unwrap();
    Arc::new(b.build(entry).unwrap())
}

/// Three-level lattice used by the merge-join fixpoint fixture: two
/// incomparable values that join to a common top.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub enum Level {
    A,
    B,
    Top,
}

#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct LevelState {
    pub location: LocationId,
    pub level: Level,
}

#[derive(Debug, Clone, Copy, Default)]
pub struct LevelDomain;

impl AbstractDomain for LevelDomain {
    type State = LevelState;

    fn less_or_equal(&self, a: &LevelState, b: &LevelState) -> bool {
        a.location == b.location && (a.level == b.level || b.level == Level::Top)
    }

    fn join(&self, a: &LevelState, b: &LevelState) -> Result<LevelState, AnalysisError> {
        if a.location != b.location {
            return Err(AnalysisError::JoinUnsupported);
        }
        let level = if a.level == b.level {
            a.level.clone()
        } else {
            Level::Top
        };
        Ok(LevelState {
            location: a.location,
            level,
        })
    }
}

/// Analysis whose transfer oscillates between the two lattice values, so
/// only a join can close the fixpoint: A -> B -> A -> ... but
/// join(A, B) = Top and Top is a transfer fixpoint.
pub struct OscillatingCpa;

impl Cpa for OscillatingCpa {
    type State = LevelState;
    type Precision = ();
    type Domain = LevelDomain;

    fn domain(&self) -> &LevelDomain {
        &LevelDomain
    }

    fn initial_state(&self, entry: LocationId) -> LevelState {
        LevelState {
            location: entry,
            level: Level::A,
        }
    }

    fn initial_precision(&self) {}

    fn location_of(&self, state: &LevelState) -> LocationId {
        state.location
    }

    fn is_target(&self, _state: &LevelState) -> bool {
        false
    }

    fn successors(
        &self,
        state: &LevelState,
        _precision: &(),
        edge: &CfaEdge,
    ) -> Result<Vec<LevelState>, AnalysisError> {
        if edge.from != state.location {
            return Ok(vec![]);
        }
        let level = match state.level {
            Level::A => Level::B,
            Level::B => Level::A,
            Level::Top => Level::Top,
        };
        Ok(vec![LevelState {
            location: edge.to,
            level,
        }])
    }
}

/// Location-following analysis with a set-of-atoms precision, for
/// refinement tests. `merge_precision` is set union, so refinement
/// deltas strengthen monotonically.
pub struct TrackedCpa {
    cfa: Arc<Cfa>,
    /// How many times the engine announced an ARG pruning.
    pub pruned_notices: Cell<usize>,
}

impl TrackedCpa {
    pub fn new(cfa: Arc<Cfa>) -> Self {
        Self {
            cfa,
            pruned_notices: Cell::new(0),
        }
    }
}

impl Cpa for TrackedCpa {
    type State = LocationState;
    type Precision = BTreeSet<String>;
    type Domain = LocationDomain;

    fn domain(&self) -> &LocationDomain {
        &LocationDomain
    }

    fn initial_state(&self, entry: LocationId) -> LocationState {
        LocationState(entry)
    }

    fn initial_precision(&self) -> BTreeSet<String> {
        BTreeSet::from(["p0".to_string()])
    }

    fn location_of(&self, state: &LocationState) -> LocationId {
        state.0
    }

    fn is_target(&self, state: &LocationState) -> bool {
        self.cfa.is_target(state.0)
    }

    fn successors(
        &self,
        state: &LocationState,
        _precision: &BTreeSet<String>,
        edge: &CfaEdge,
    ) -> Result<Vec<LocationState>, AnalysisError> {
        if edge.from == state.0 {
            Ok(vec![LocationState(edge.to)])
        } else {
            Ok(vec![])
        }
    }

    fn merge_precision(
        &self,
        current: &BTreeSet<String>,
        delta: &BTreeSet<String>,
    ) -> BTreeSet<String> {
        current.union(delta).cloned().collect()
    }

    fn on_arg_pruned(&self) {
        self.pruned_notices.set(self.pruned_notices.get() + 1);
    }
}

/// Location plus a bitmask of accumulated facts, ordered by mask
/// inclusion at the same location. Edge labels `set1`/`set2` turn bits
/// on; join takes the union, so a join-merge can retire a state with a
/// strictly smaller mask.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct MaskState {
    pub location: LocationId,
    pub mask: u8,
}

#[derive(Debug, Clone, Copy, Default)]
pub struct MaskDomain;

impl AbstractDomain for MaskDomain {
    type State = MaskState;

    fn less_or_equal(&self, a: &MaskState, b: &MaskState) -> bool {
        a.location == b.location && a.mask & b.mask == a.mask
    }

    fn join(&self, a: &MaskState, b: &MaskState) -> Result<MaskState, AnalysisError> {
        if a.location != b.location {
            return Err(AnalysisError::JoinUnsupported);
        }
        Ok(MaskState {
            location: a.location,
            mask: a.mask | b.mask,
        })
    }
}

pub struct MaskCpa {
    cfa: Arc<Cfa>,
}

impl MaskCpa {
    pub fn new(cfa: Arc<Cfa>) -> Self {
        Self { cfa }
    }
}

impl Cpa for MaskCpa {
    type State = MaskState;
    type Precision = BTreeSet<String>;
    type Domain = MaskDomain;

    fn domain(&self) -> &MaskDomain {
        &MaskDomain
    }

    fn initial_state(&self, entry: LocationId) -> MaskState {
        MaskState {
            location: entry,
            mask: 0,
        }
    }

    fn initial_precision(&self) -> BTreeSet<String> {
        BTreeSet::from(["p0".to_string()])
    }

    fn location_of(&self, state: &MaskState) -> LocationId {
        state.location
    }

    fn is_target(&self, state: &MaskState) -> bool {
        self.cfa.is_target(state.location)
    }

    fn successors(
        &self,
        state: &MaskState,
        _precision: &BTreeSet<String>,
        edge: &CfaEdge,
    ) -> Result<Vec<MaskState>, AnalysisError> {
        if edge.from != state.location {
            return Ok(vec![]);
        }
        let mask = match edge.label.as_str() {
            "set1" => state.mask | 0b01,
            "set2" => state.mask | 0b10,
            _ => state.mask,
        };
        Ok(vec![MaskState {
            location: edge.to,
            mask,
        }])
    }

    fn merge_precision(
        &self,
        current: &BTreeSet<String>,
        delta: &BTreeSet<String>,
    ) -> BTreeSet<String> {
        current.union(delta).cloned().collect()
    }
}

/// Refiner that replays a fixed script of answers.
pub struct ScriptedRefiner<P> {
    script: VecDeque<Result<RefinementOutcome<P>, RefinementError>>,
    pub calls: usize,
}

impl<P> ScriptedRefiner<P> {
    pub fn new(
        script: impl IntoIterator<Item = Result<RefinementOutcome<P>, RefinementError>>,
    ) -> Self {
        Self {
            script: script.into_iter().collect(),
            calls: 0,
        }
    }
}

impl<C: Cpa> Refiner<C> for ScriptedRefiner<C::Precision> {
    fn refine(
        &mut self,
        _path: &ArgPath<'_, C::State>,
    ) -> Result<RefinementOutcome<C::Precision>, RefinementError> {
        self.calls += 1;
        self.script
            .pop_front()
            .unwrap_or_else(|| panic!("refiner called more times than scripted ({})", self.calls))
    }
}
