//! The bookkeeping location analysis.
//!
//! Tracks nothing but the current CFA location in a flat lattice: two
//! states are ordered iff they are equal, and join is undefined across
//! distinct locations. Used as the leftmost component of composites and
//! as the simplest possible analysis in tests.

use std::sync::Arc;

use loris_cfa::{Cfa, CfaEdge, LocationId};

use crate::cpa::{AbstractDomain, Cpa};
use crate::error::AnalysisError;

#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct LocationState(pub LocationId);

#[derive(Debug, Clone, Copy, Default)]
pub struct LocationDomain;

impl AbstractDomain for LocationDomain {
    type State = LocationState;

    fn less_or_equal(&self, a: &LocationState, b: &LocationState) -> bool {
        a == b
    }

    fn join(&self, a: &LocationState, b: &LocationState) -> Result<LocationState, AnalysisError> {
        if a == b {
            Ok(a.clone())
        } else {
            Err(AnalysisError::JoinUnsupported)
        }
    }
}

pub struct LocationCpa {
    cfa: Arc<Cfa>,
    domain: LocationDomain,
}

impl LocationCpa {
    pub fn new(cfa: Arc<Cfa>) -> Self {
        Self {
            cfa,
            domain: LocationDomain,
        }
    }
}

impl Cpa for LocationCpa {
    type State = LocationState;
    type Precision = ();
    type Domain = LocationDomain;

    fn domain(&self) -> &LocationDomain {
        &self.domain
    }

    fn initial_state(&self, entry: LocationId) -> LocationState {
        LocationState(entry)
    }

    fn initial_precision(&self) {}

    fn location_of(&self, state: &LocationState) -> LocationId {
        state.0
    }

    fn is_target(&self, state: &LocationState) -> bool {
        self.cfa.is_target(state.0)
    }

    fn successors(
        &self,
        state: &LocationState,
        _precision: &(),
        edge: &CfaEdge,
    ) -> Result<Vec<LocationState>, AnalysisError> {
        if edge.from == state.0 {
            Ok(vec![LocationState(edge.to)])
        } else {
            Ok(vec![])
        }
    }
}
