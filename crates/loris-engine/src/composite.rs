//! Composite (product) analysis.
//!
//! [`CompositeCpa`] runs two component analyses in lockstep over a
//! pointwise product lattice. Nesting composites yields products of any
//! arity. After the cartesian successor product, an optional strengthen
//! operator lets one component sharpen or kill a combination using the
//! other component's information.

use loris_cfa::{CfaEdge, LocationId};

use crate::cpa::{AbstractDomain, Cpa, PrecisionAction};
use crate::error::AnalysisError;
use crate::reached::ReachedStats;

#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct CompositeState<A, B> {
    pub first: A,
    pub second: B,
}

#[derive(Debug, Clone, PartialEq)]
pub struct CompositePrecision<A, B> {
    pub first: A,
    pub second: B,
}

/// Pointwise product of two abstract domains.
#[derive(Debug, Clone)]
pub struct CompositeDomain<DA, DB> {
    first: DA,
    second: DB,
}

impl<DA, DB> AbstractDomain for CompositeDomain<DA, DB>
where
    DA: AbstractDomain,
    DB: AbstractDomain,
{
    type State = CompositeState<DA::State, DB::State>;

    fn less_or_equal(&self, a: &Self::State, b: &Self::State) -> bool {
        self.first.less_or_equal(&a.first, &b.first)
            && self.second.less_or_equal(&a.second, &b.second)
    }

    fn join(&self, a: &Self::State, b: &Self::State) -> Result<Self::State, AnalysisError> {
        Ok(CompositeState {
            first: self.first.join(&a.first, &b.first)?,
            second: self.second.join(&a.second, &b.second)?,
        })
    }

    fn top(&self) -> Option<Self::State> {
        Some(CompositeState {
            first: self.first.top()?,
            second: self.second.top()?,
        })
    }

    fn bottom(&self) -> Option<Self::State> {
        Some(CompositeState {
            first: self.first.bottom()?,
            second: self.second.bottom()?,
        })
    }
}

/// Result of strengthening one successor combination.
#[derive(Debug, Clone)]
pub enum Strengthened<SA, SB> {
    /// Keep the combination as produced by the product.
    Unchanged,
    /// Replace the combination with sharpened component states.
    Refined(SA, SB),
    /// The components contradict each other; drop the combination.
    Infeasible,
}

/// Post-product strengthening seam between the two components.
pub trait StrengthenOperator<A: Cpa, B: Cpa> {
    fn strengthen(
        &self,
        first: &A::State,
        second: &B::State,
    ) -> Result<Strengthened<A::State, B::State>, AnalysisError>;
}

/// The identity strengthen operator.
#[derive(Debug, Clone, Copy, Default)]
pub struct NoStrengthen;

impl<A: Cpa, B: Cpa> StrengthenOperator<A, B> for NoStrengthen {
    fn strengthen(
        &self,
        _first: &A::State,
        _second: &B::State,
    ) -> Result<Strengthened<A::State, B::State>, AnalysisError> {
        Ok(Strengthened::Unchanged)
    }
}

pub struct CompositeCpa<A: Cpa, B: Cpa, S = NoStrengthen> {
    first: A,
    second: B,
    strengthen: S,
    domain: CompositeDomain<A::Domain, B::Domain>,
}

impl<A: Cpa, B: Cpa> CompositeCpa<A, B, NoStrengthen> {
    pub fn new(first: A, second: B) -> Self {
        let domain = CompositeDomain {
            first: first.domain().clone(),
            second: second.domain().clone(),
        };
        Self {
            first,
            second,
            strengthen: NoStrengthen,
            domain,
        }
    }
}

impl<A: Cpa, B: Cpa, S> CompositeCpa<A, B, S> {
    /// Swap in a strengthen operator.
    pub fn with_strengthen<S2: StrengthenOperator<A, B>>(self, strengthen: S2) -> CompositeCpa<A, B, S2> {
        CompositeCpa {
            first: self.first,
            second: self.second,
            strengthen,
            domain: self.domain,
        }
    }

    pub fn first(&self) -> &A {
        &self.first
    }

    pub fn second(&self) -> &B {
        &self.second
    }
}

impl<A, B, S> Cpa for CompositeCpa<A, B, S>
where
    A: Cpa,
    B: Cpa,
    S: StrengthenOperator<A, B>,
{
    type State = CompositeState<A::State, B::State>;
    type Precision = CompositePrecision<A::Precision, B::Precision>;
    type Domain = CompositeDomain<A::Domain, B::Domain>;

    fn domain(&self) -> &Self::Domain {
        &self.domain
    }

    fn initial_state(&self, entry: LocationId) -> Self::State {
        CompositeState {
            first: self.first.initial_state(entry),
            second: self.second.initial_state(entry),
        }
    }

    fn initial_precision(&self) -> Self::Precision {
        CompositePrecision {
            first: self.first.initial_precision(),
            second: self.second.initial_precision(),
        }
    }

    /// The leftmost component is authoritative for the location.
    fn location_of(&self, state: &Self::State) -> LocationId {
        self.first.location_of(&state.first)
    }

    fn is_target(&self, state: &Self::State) -> bool {
        self.first.is_target(&state.first) || self.second.is_target(&state.second)
    }

    fn successors(
        &self,
        state: &Self::State,
        precision: &Self::Precision,
        edge: &CfaEdge,
    ) -> Result<Vec<Self::State>, AnalysisError> {
        let firsts = self.first.successors(&state.first, &precision.first, edge)?;
        if firsts.is_empty() {
            return Ok(vec![]);
        }
        let seconds = self.second.successors(&state.second, &precision.second, edge)?;
        if seconds.is_empty() {
            return Ok(vec![]);
        }

        let mut out = Vec::with_capacity(firsts.len() * seconds.len());
        for fa in &firsts {
            for sb in &seconds {
                match self.strengthen.strengthen(fa, sb)? {
                    Strengthened::Unchanged => out.push(CompositeState {
                        first: fa.clone(),
                        second: sb.clone(),
                    }),
                    Strengthened::Refined(a, b) => out.push(CompositeState { first: a, second: b }),
                    Strengthened::Infeasible => {}
                }
            }
        }
        Ok(out)
    }

    fn adjust_precision(
        &self,
        state: &Self::State,
        precision: &Self::Precision,
        reached: &dyn ReachedStats,
    ) -> Result<(Self::State, Self::Precision, PrecisionAction), AnalysisError> {
        let (a, pa, act_a) = self
            .first
            .adjust_precision(&state.first, &precision.first, reached)?;
        let (b, pb, act_b) = self
            .second
            .adjust_precision(&state.second, &precision.second, reached)?;

        // A break in any component pauses the whole product state.
        let action = if act_a == PrecisionAction::Break || act_b == PrecisionAction::Break {
            PrecisionAction::Break
        } else {
            PrecisionAction::Continue
        };

        let changed =
            a != state.first || b != state.second || pa != precision.first || pb != precision.second;
        if changed {
            Ok((
                CompositeState { first: a, second: b },
                CompositePrecision { first: pa, second: pb },
                action,
            ))
        } else {
            Ok((state.clone(), precision.clone(), action))
        }
    }

    fn merge_precision(&self, current: &Self::Precision, delta: &Self::Precision) -> Self::Precision {
        CompositePrecision {
            first: self.first.merge_precision(&current.first, &delta.first),
            second: self.second.merge_precision(&current.second, &delta.second),
        }
    }

    fn on_arg_pruned(&self) {
        self.first.on_arg_pruned();
        self.second.on_arg_pruned();
    }
}
