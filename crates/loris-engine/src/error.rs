//! Error taxonomy of the analysis core.
//!
//! [`AnalysisError`] is raised by operator implementations and aborts the
//! run. [`RefinementError`] is raised by refiners and surfaces as an
//! `Unknown` verdict rather than aborting. [`CoverageError`] rejects
//! ill-formed covering edits on the ARG. Invariant violations inside the
//! core itself fail fast instead of being encoded as errors.

use std::fmt;

use loris_cfa::EdgeId;
use thiserror::Error;

use crate::arg::VertexId;

/// Failure inside an abstract-domain operator or transfer relation.
#[derive(Debug, Error)]
pub enum AnalysisError {
    /// The domain has no join (for example a flat bookkeeping lattice).
    #[error("join is not supported by this abstract domain")]
    JoinUnsupported,
    /// The transfer relation could not compute successors for an edge.
    #[error("transfer relation failed on edge {edge}: {message}")]
    Transfer { edge: EdgeId, message: String },
    #[error("precision adjustment failed: {0}")]
    PrecisionAdjustment(String),
    /// A lazily-sized transfer relation ran out of input-extension budget.
    #[error("input vector exhausted after {bound} extension attempts")]
    InputVectorExhausted { bound: usize },
    /// Failure in an external backend (solver, oracle, ...).
    #[error("backend failure: {0}")]
    Backend(String),
}

/// Why a refinement attempt could not produce an answer.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RefinementFailureReason {
    /// The backend could not derive interpolants for the path.
    InterpolationFailed,
    /// Refinement succeeded formally but produced no new precision,
    /// so re-exploration would loop.
    NoNewPrecision,
    /// The path grew past the refiner's unrolling bound.
    TooMuchUnrolling,
    /// The refiner hit its time budget.
    Timeout,
}

impl RefinementFailureReason {
    /// Stable machine-readable code for reports.
    pub fn code(&self) -> &'static str {
        match self {
            RefinementFailureReason::InterpolationFailed => "interpolation-failed",
            RefinementFailureReason::NoNewPrecision => "no-new-precision",
            RefinementFailureReason::TooMuchUnrolling => "too-much-unrolling",
            RefinementFailureReason::Timeout => "timeout",
        }
    }
}

impl fmt::Display for RefinementFailureReason {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.code())
    }
}

/// A refinement attempt that produced neither `Feasible` nor `Spurious`.
///
/// Fatal to the run: the engine stops and reports `Unknown`.
#[derive(Debug, Error)]
pub struct RefinementError {
    pub reason: RefinementFailureReason,
    /// Index into the error path the failure is attributed to, if known.
    pub path_index: Option<usize>,
}

impl fmt::Display for RefinementError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "refinement failed ({})", self.reason)?;
        if let Some(index) = self.path_index {
            write!(f, " at path index {index}")?;
        }
        Ok(())
    }
}

/// Rejected covering edit on the ARG.
#[derive(Debug, Error)]
pub enum CoverageError {
    #[error("vertex {0} is already covered")]
    AlreadyCovered(VertexId),
    #[error("vertex {0} is covered and cannot cover another vertex")]
    CoveredCoverer(VertexId),
    #[error("vertex {0} covers other vertices and cannot itself be covered")]
    CoveringCovered(VertexId),
    #[error("vertex {0} cannot cover itself")]
    SelfCover(VertexId),
    #[error("vertex {0} does not exist or was pruned")]
    Missing(VertexId),
}

/// Unknown operator or strategy name in configuration.
#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("unknown merge operator `{0}` (expected `separate` or `join`)")]
    UnknownMerge(String),
    #[error("unknown stop operator `{0}` (expected `separate` or `always`)")]
    UnknownStop(String),
    #[error("unknown waitlist strategy `{0}` (expected `fifo`, `lifo`, `dfs` or `bfs`)")]
    UnknownWaitlistStrategy(String),
}

/// Umbrella error returned by [`Engine::run`](crate::explore::Engine::run).
#[derive(Debug, Error)]
pub enum EngineError {
    #[error(transparent)]
    Analysis(#[from] AnalysisError),
    #[error(transparent)]
    Coverage(#[from] CoverageError),
    #[error("refiner returned pivot {pivot} outside path of length {len}")]
    PivotOutOfRange { pivot: usize, len: usize },
}
