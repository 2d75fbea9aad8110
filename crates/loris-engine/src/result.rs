//! Run verdicts, counterexamples and statistics.

use std::fmt;

use loris_cfa::{EdgeId, LocationId};
use serde::Serialize;

use crate::arg::VertexId;

/// One step of a counterexample path.
#[derive(Debug, Clone, Serialize)]
pub struct CounterexampleStep {
    pub location: LocationId,
    pub location_name: String,
    /// Edge taken into this step's location; `None` for the initial step.
    pub edge: Option<EdgeId>,
    pub edge_label: Option<String>,
}

/// A root-to-target error path confirmed feasible by the refiner.
#[derive(Debug, Clone, Serialize)]
pub struct Counterexample {
    pub steps: Vec<CounterexampleStep>,
    /// ARG vertex of the violating state, for post-run ARG inspection.
    pub target_vertex: VertexId,
}

impl fmt::Display for Counterexample {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        writeln!(f, "Counterexample path:")?;
        for (i, step) in self.steps.iter().enumerate() {
            match &step.edge_label {
                Some(label) => writeln!(
                    f,
                    "  Step {}: --[{}]--> l{} {}",
                    i, label, step.location, step.location_name
                )?,
                None => writeln!(f, "  Step {}: l{} {} (initial)", i, step.location, step.location_name)?,
            }
        }
        Ok(())
    }
}

/// Counters accumulated over one run.
#[derive(Debug, Clone, Copy, Default, Serialize)]
pub struct RunStats {
    /// Vertices popped from the waitlist and expanded.
    pub expansions: usize,
    /// States inserted into the reached set (including `Break` states).
    pub states_added: usize,
    /// Prior states replaced by a joined state.
    pub merges: usize,
    /// Successors discarded because the stop operator covered them.
    pub stop_hits: usize,
    /// Spurious refinement rounds performed.
    pub refinement_rounds: usize,
    /// ARG vertices removed by refinement pruning.
    pub pruned_vertices: usize,
}

/// Final answer of a run. Exactly one of these is reported.
#[derive(Debug, Clone)]
pub enum RunVerdict {
    /// The fixpoint was reached without any feasible target path.
    Safe {
        /// Size of the final reached set.
        states_explored: usize,
    },
    /// A target state was reached and the path to it is feasible.
    Unsafe { counterexample: Counterexample },
    /// The analysis could not decide (refinement failure or exhausted
    /// refinement budget).
    Unknown { reason: String },
    /// Cancellation was requested and honored.
    Interrupted,
}

impl RunVerdict {
    /// Coarse verdict class for machine consumption.
    pub fn verdict_class(&self) -> &'static str {
        match self {
            RunVerdict::Safe { .. } => "safe",
            RunVerdict::Unsafe { .. } => "unsafe",
            RunVerdict::Unknown { .. } => "unknown",
            RunVerdict::Interrupted => "interrupted",
        }
    }

    pub fn is_safe(&self) -> bool {
        matches!(self, RunVerdict::Safe { .. })
    }
}

impl fmt::Display for RunVerdict {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            RunVerdict::Safe { states_explored } => {
                write!(f, "RESULT: SAFE ({states_explored} states explored)")
            }
            RunVerdict::Unsafe { counterexample } => {
                writeln!(f, "RESULT: UNSAFE")?;
                write!(f, "{counterexample}")
            }
            RunVerdict::Unknown { reason } => write!(f, "RESULT: UNKNOWN ({reason})"),
            RunVerdict::Interrupted => write!(f, "RESULT: INTERRUPTED"),
        }
    }
}
