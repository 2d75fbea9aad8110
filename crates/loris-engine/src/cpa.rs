//! Operator contracts of a configurable program analysis.
//!
//! A [`Cpa`] bundles an abstract domain, a transfer relation, a precision
//! and the refinement hooks into one pluggable unit. The merge and stop
//! operators are engine-side and selected by name; their standard variants
//! cover the usual analyses, and anything beyond them belongs in the
//! domain's `join`/`less_or_equal`.

use std::collections::HashMap;
use std::fmt;
use std::hash::Hash;
use std::str::FromStr;

use loris_cfa::{CfaEdge, LocationId};

use crate::error::{AnalysisError, ConfigError};
use crate::reached::ReachedStats;

/// Partial order and join of an abstract state lattice.
///
/// `join` may be unsupported ([`AnalysisError::JoinUnsupported`]) for flat
/// bookkeeping domains; such domains cannot be run with the `join` merge
/// operator. `top`/`bottom` are optional: the engine never consumes them,
/// they exist for domains that have natural distinguished elements.
pub trait AbstractDomain {
    type State;

    /// `a ⊑ b`: everything `a` represents is also represented by `b`.
    fn less_or_equal(&self, a: &Self::State, b: &Self::State) -> bool;

    /// Least upper bound. The result must subsume both arguments.
    fn join(&self, a: &Self::State, b: &Self::State) -> Result<Self::State, AnalysisError>;

    fn top(&self) -> Option<Self::State> {
        None
    }

    fn bottom(&self) -> Option<Self::State> {
        None
    }
}

/// What the exploration should do with a state after precision adjustment.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum PrecisionAction {
    /// Proceed normally: stop-check, merge, insert into the waitlist.
    #[default]
    Continue,
    /// Record the state in the reached set but do not schedule it for
    /// expansion. Used by resource-threshold analyses to pause a branch.
    Break,
}

/// One configurable program analysis.
///
/// States are compared and hashed structurally; precisions are plain
/// values. Refining analyses must override [`Cpa::merge_precision`] so
/// that folding a refinement delta in strengthens the precision
/// monotonically.
pub trait Cpa {
    type State: Clone + Eq + Hash + fmt::Debug;
    type Precision: Clone + PartialEq + fmt::Debug;
    type Domain: AbstractDomain<State = Self::State> + Clone;

    fn domain(&self) -> &Self::Domain;

    fn initial_state(&self, entry: LocationId) -> Self::State;

    fn initial_precision(&self) -> Self::Precision;

    /// The CFA location an abstract state sits at. Drives edge selection
    /// and the per-location merge/stop candidate index.
    fn location_of(&self, state: &Self::State) -> LocationId;

    /// Whether the state violates the property under analysis.
    fn is_target(&self, state: &Self::State) -> bool;

    /// All abstract successors of `state` along `edge` under `precision`.
    /// An empty vector means the edge is infeasible from this state.
    fn successors(
        &self,
        state: &Self::State,
        precision: &Self::Precision,
        edge: &CfaEdge,
    ) -> Result<Vec<Self::State>, AnalysisError>;

    /// Widen `state` and adapt `precision` before insertion. Must be
    /// idempotent: adjusting an already-adjusted state is the identity.
    fn adjust_precision(
        &self,
        state: &Self::State,
        precision: &Self::Precision,
        _reached: &dyn ReachedStats,
    ) -> Result<(Self::State, Self::Precision, PrecisionAction), AnalysisError> {
        Ok((state.clone(), precision.clone(), PrecisionAction::Continue))
    }

    /// Fold a refinement delta into an existing precision. The result
    /// must be at least as strong as `current`. The default keeps the
    /// current precision and is only correct for analyses that never
    /// refine.
    fn merge_precision(&self, current: &Self::Precision, _delta: &Self::Precision) -> Self::Precision {
        current.clone()
    }

    /// Called after the engine pruned ARG vertices, so content-keyed
    /// caches inside the analysis can be invalidated.
    fn on_arg_pruned(&self) {}
}

/// Merge operator: how a new state is combined with prior reached states
/// at the same location before insertion.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum MergeOperator {
    /// Never combine; every state is kept separately.
    #[default]
    Separate,
    /// Join with each prior state; prior states subsumed by the join are
    /// replaced by the merged state.
    Join,
}

impl MergeOperator {
    pub fn apply<D: AbstractDomain>(
        &self,
        domain: &D,
        new: &D::State,
        old: &D::State,
    ) -> Result<D::State, AnalysisError>
    where
        D::State: Clone,
    {
        match self {
            MergeOperator::Separate => Ok(new.clone()),
            MergeOperator::Join => domain.join(new, old),
        }
    }
}

impl FromStr for MergeOperator {
    type Err = ConfigError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "separate" => Ok(MergeOperator::Separate),
            "join" => Ok(MergeOperator::Join),
            other => Err(ConfigError::UnknownMerge(other.to_string())),
        }
    }
}

impl fmt::Display for MergeOperator {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(match self {
            MergeOperator::Separate => "separate",
            MergeOperator::Join => "join",
        })
    }
}

/// Stop operator: whether a new state is already covered by the reached
/// states at its location and can be discarded without insertion.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum StopOperator {
    /// Covered iff some single reached state subsumes it.
    #[default]
    Separate,
    /// Always covered. For bookkeeping components whose coverage is
    /// decided elsewhere in a composite.
    Always,
}

impl StopOperator {
    /// The precision the state was explored under is part of the seam so
    /// precision-sensitive variants can be added without breaking
    /// callers; the standard variants decide on states alone.
    pub fn stop<'a, D: AbstractDomain, P>(
        &self,
        domain: &D,
        state: &D::State,
        _precision: &P,
        reached: impl IntoIterator<Item = &'a D::State>,
    ) -> bool
    where
        D::State: 'a,
    {
        match self {
            StopOperator::Always => true,
            StopOperator::Separate => reached
                .into_iter()
                .any(|candidate| domain.less_or_equal(state, candidate)),
        }
    }
}

impl FromStr for StopOperator {
    type Err = ConfigError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "separate" => Ok(StopOperator::Separate),
            "always" => Ok(StopOperator::Always),
            other => Err(ConfigError::UnknownStop(other.to_string())),
        }
    }
}

impl fmt::Display for StopOperator {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(match self {
            StopOperator::Separate => "separate",
            StopOperator::Always => "always",
        })
    }
}

/// Content-keyed memo table for idempotent precision adjustments.
///
/// Keys are abstract states (or any structural key), never identities, so
/// the cache stays valid across state re-creation. It must be invalidated
/// whenever the ARG is pruned, since adjustment may depend on reached-set
/// shape; wire [`Cpa::on_arg_pruned`] to [`AdjustmentCache::invalidate`].
#[derive(Debug)]
pub struct AdjustmentCache<K, V> {
    entries: HashMap<K, V>,
    hits: usize,
    misses: usize,
}

impl<K, V> Default for AdjustmentCache<K, V> {
    fn default() -> Self {
        Self {
            entries: HashMap::new(),
            hits: 0,
            misses: 0,
        }
    }
}

impl<K: Eq + Hash, V: Clone> AdjustmentCache<K, V> {
    pub fn new() -> Self {
        Self::default()
    }

    /// Look up `key`, computing and memoizing on a miss.
    pub fn eval(
        &mut self,
        key: K,
        compute: impl FnOnce() -> Result<V, AnalysisError>,
    ) -> Result<V, AnalysisError> {
        if let Some(v) = self.entries.get(&key) {
            self.hits += 1;
            return Ok(v.clone());
        }
        self.misses += 1;
        let v = compute()?;
        self.entries.insert(key, v.clone());
        Ok(v)
    }

    pub fn invalidate(&mut self) {
        self.entries.clear();
    }

    pub fn hits(&self) -> usize {
        self.hits
    }

    pub fn misses(&self) -> usize {
        self.misses
    }
}

/// Outcome of one attempt of a lazily-sized transfer relation.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TransferProbe<T> {
    Ready(T),
    /// The attempt consumed more input slots than were provided.
    NeedsMoreInput,
}

/// Drive a transfer relation that discovers its input arity lazily.
///
/// `attempt` is called with input widths `0..=bound` until it reports
/// [`TransferProbe::Ready`]; exhausting the bound is an
/// [`AnalysisError::InputVectorExhausted`]. Hard failures from `attempt`
/// propagate immediately.
pub fn run_with_extended_input<T, F>(bound: usize, mut attempt: F) -> Result<T, AnalysisError>
where
    F: FnMut(usize) -> Result<TransferProbe<T>, AnalysisError>,
{
    for width in 0..=bound {
        match attempt(width)? {
            TransferProbe::Ready(value) => return Ok(value),
            TransferProbe::NeedsMoreInput => continue,
        }
    }
    Err(AnalysisError::InputVectorExhausted { bound })
}
