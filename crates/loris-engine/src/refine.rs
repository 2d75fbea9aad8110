//! The refinement seam of the CEGAR loop.
//!
//! When exploration reaches a target state, the engine reconstructs the
//! root-to-target path and hands it to a [`Refiner`]. The refiner either
//! confirms the path ([`RefinementOutcome::Feasible`]) or declares it an
//! artifact of over-approximation and names the pivot where precision
//! must be strengthened ([`RefinementOutcome::Spurious`]). Pruning,
//! re-queuing and precision bookkeeping are engine-side and live in
//! [`crate::explore`].

use loris_cfa::{Cfa, CfaEdge};

use crate::arg::{Arg, VertexId};
use crate::cpa::Cpa;
use crate::error::RefinementError;

/// Read-only view of one root-to-target error path.
pub struct ArgPath<'a, S> {
    vertices: Vec<VertexId>,
    arg: &'a Arg<S>,
    cfa: &'a Cfa,
}

impl<'a, S> ArgPath<'a, S> {
    pub(crate) fn new(arg: &'a Arg<S>, cfa: &'a Cfa, vertices: Vec<VertexId>) -> Self {
        Self { vertices, arg, cfa }
    }

    /// Number of states on the path, including root and target.
    pub fn len(&self) -> usize {
        self.vertices.len()
    }

    pub fn is_empty(&self) -> bool {
        self.vertices.is_empty()
    }

    pub fn vertex(&self, index: usize) -> VertexId {
        self.vertices[index]
    }

    pub fn vertices(&self) -> &[VertexId] {
        &self.vertices
    }

    pub fn state(&self, index: usize) -> &S {
        self.arg.state(self.vertices[index])
    }

    /// The CFA edge taken into the state at `index`; `None` at the root.
    pub fn edge_into(&self, index: usize) -> Option<&CfaEdge> {
        self.arg
            .entering_edge(self.vertices[index])
            .map(|e| self.cfa.edge(e))
    }

    pub fn target(&self) -> VertexId {
        *self.vertices.last().expect("error path is never empty")
    }
}

/// Answer of one refinement attempt.
#[derive(Debug, Clone)]
pub enum RefinementOutcome<P> {
    /// The abstract path corresponds to a real execution.
    Feasible,
    /// The path is an artifact of too-coarse precision.
    Spurious {
        /// Index into the path of the first state that becomes
        /// unreachable under the strengthened precision. Exploration
        /// restarts from here.
        pivot: usize,
        /// Precision increment to fold into the pivot's precision.
        delta: P,
    },
}

/// Counterexample checker and precision generator.
pub trait Refiner<C: Cpa> {
    fn refine(
        &mut self,
        path: &ArgPath<'_, C::State>,
    ) -> Result<RefinementOutcome<C::Precision>, RefinementError>;
}

/// Refiner that accepts every error path as real.
///
/// This is the "no refinement configured" mode: the first target state
/// reached becomes an `Unsafe` verdict.
#[derive(Debug, Clone, Copy, Default)]
pub struct AlwaysFeasible;

impl<C: Cpa> Refiner<C> for AlwaysFeasible {
    fn refine(
        &mut self,
        _path: &ArgPath<'_, C::State>,
    ) -> Result<RefinementOutcome<C::Precision>, RefinementError> {
        Ok(RefinementOutcome::Feasible)
    }
}
