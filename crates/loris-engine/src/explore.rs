//! The core exploration algorithm.
//!
//! One engine owns one run: pop a vertex from the waitlist, compute
//! abstract successors along every outgoing CFA edge, adjust precision,
//! apply the stop and merge operators against the reached states at the
//! successor's location, insert, and hand any reached target state to the
//! refiner. The loop is single-threaded and cooperative: a cancellation
//! flag is polled once per pop and once per refinement round.

use std::str::FromStr;
use std::sync::atomic::{AtomicBool, Ordering};

use loris_cfa::{Cfa, LocationId};
use tracing::{debug, info};

use crate::arg::{Arg, VertexId};
use crate::cpa::{Cpa, MergeOperator, PrecisionAction, StopOperator};
use crate::error::{ConfigError, EngineError};
use crate::reached::ReachedSet;
use crate::refine::{ArgPath, RefinementOutcome, Refiner};
use crate::result::{Counterexample, CounterexampleStep, RunStats, RunVerdict};
use crate::waitlist::WaitlistStrategy;

/// Knobs of one run.
#[derive(Debug, Clone, Copy)]
pub struct EngineOptions {
    pub merge: MergeOperator,
    pub stop: StopOperator,
    pub waitlist: WaitlistStrategy,
    /// Spurious refinement rounds allowed before giving up with
    /// `Unknown`. Zero means unbounded.
    pub max_refinements: usize,
}

impl Default for EngineOptions {
    fn default() -> Self {
        Self {
            merge: MergeOperator::Separate,
            stop: StopOperator::Separate,
            waitlist: WaitlistStrategy::Fifo,
            max_refinements: 8,
        }
    }
}

impl EngineOptions {
    /// Build options from configuration strings, e.g. `("join",
    /// "separate", "bfs")`.
    pub fn from_names(merge: &str, stop: &str, waitlist: &str) -> Result<Self, ConfigError> {
        Ok(Self {
            merge: MergeOperator::from_str(merge)?,
            stop: StopOperator::from_str(stop)?,
            waitlist: WaitlistStrategy::from_str(waitlist)?,
            ..Self::default()
        })
    }

    pub fn with_max_refinements(mut self, max: usize) -> Self {
        self.max_refinements = max;
        self
    }
}

/// Observer notifications emitted during a run.
#[derive(Debug, Clone)]
pub enum EngineEvent {
    StateAdded {
        vertex: VertexId,
        location: LocationId,
        target: bool,
    },
    TargetFound {
        vertex: VertexId,
    },
    RefinementRound {
        round: usize,
        spurious: bool,
        pivot: Option<usize>,
    },
}

enum RefineStep {
    Feasible(Counterexample),
    Refined,
    GiveUp(String),
    Interrupted,
}

/// One analysis run over one CFA.
pub struct Engine<'a, C: Cpa> {
    cfa: &'a Cfa,
    cpa: &'a C,
    options: EngineOptions,
    arg: Arg<C::State>,
    reached: ReachedSet<C::Precision>,
    stats: RunStats,
    cancel: Option<&'a AtomicBool>,
    sink: Option<Box<dyn FnMut(&EngineEvent) + 'a>>,
}

impl<'a, C: Cpa> Engine<'a, C> {
    /// Engine seeded with the analysis's initial state at the CFA entry.
    pub fn new(cfa: &'a Cfa, cpa: &'a C, options: EngineOptions) -> Self {
        let state = cpa.initial_state(cfa.entry());
        let precision = cpa.initial_precision();
        let mut engine = Self::empty(cfa, cpa, options);
        engine.seed(state, precision);
        engine
    }

    /// Engine seeded from externally assembled (state, precision) pairs,
    /// e.g. the output of the proof-partition reader. Every seed becomes
    /// an ARG root on the waitlist.
    pub fn from_states(
        cfa: &'a Cfa,
        cpa: &'a C,
        options: EngineOptions,
        states: impl IntoIterator<Item = (C::State, C::Precision)>,
    ) -> Self {
        let mut engine = Self::empty(cfa, cpa, options);
        for (state, precision) in states {
            engine.seed(state, precision);
        }
        engine
    }

    fn empty(cfa: &'a Cfa, cpa: &'a C, options: EngineOptions) -> Self {
        Self {
            cfa,
            cpa,
            options,
            arg: Arg::new(),
            reached: ReachedSet::new(options.waitlist.tie_break()),
            stats: RunStats::default(),
            cancel: None,
            sink: None,
        }
    }

    fn seed(&mut self, state: C::State, precision: C::Precision) {
        let location = self.cpa.location_of(&state);
        let root = self.arg.add_root(state);
        self.reached
            .add(root, location, precision, self.options.waitlist.sort_key(0));
        self.stats.states_added += 1;
    }

    /// Poll `flag` once per pop and per refinement round; when it turns
    /// true the run finishes with `Interrupted`.
    pub fn with_cancellation(mut self, flag: &'a AtomicBool) -> Self {
        self.cancel = Some(flag);
        self
    }

    pub fn with_event_sink(mut self, sink: impl FnMut(&EngineEvent) + 'a) -> Self {
        self.sink = Some(Box::new(sink));
        self
    }

    pub fn arg(&self) -> &Arg<C::State> {
        &self.arg
    }

    pub fn reached(&self) -> &ReachedSet<C::Precision> {
        &self.reached
    }

    pub fn stats(&self) -> &RunStats {
        &self.stats
    }

    pub fn options(&self) -> &EngineOptions {
        &self.options
    }

    pub fn cfa(&self) -> &Cfa {
        self.cfa
    }

    pub fn cpa(&self) -> &C {
        self.cpa
    }

    fn cancelled(&self) -> bool {
        self.cancel.is_some_and(|f| f.load(Ordering::Relaxed))
    }

    fn emit(&mut self, event: EngineEvent) {
        if let Some(sink) = &mut self.sink {
            sink(&event);
        }
    }

    /// Run to a verdict. Operator failures abort with `Err`; everything
    /// else ends in exactly one [`RunVerdict`].
    pub fn run<R: Refiner<C>>(&mut self, refiner: &mut R) -> Result<RunVerdict, EngineError> {
        info!(
            merge = %self.options.merge,
            stop = %self.options.stop,
            waitlist = ?self.options.waitlist,
            "starting exploration"
        );
        loop {
            if self.cancelled() {
                info!("run interrupted by cancellation request");
                return Ok(RunVerdict::Interrupted);
            }
            let Some(vertex) = self.reached.pop_waitlist() else {
                let states_explored = self.reached.len();
                info!(states_explored, "fixpoint reached, no feasible target path");
                return Ok(RunVerdict::Safe { states_explored });
            };
            debug_assert!(!self.arg.is_covered(vertex), "covered vertex on the waitlist");
            self.stats.expansions += 1;

            if let Some(target) = self.expand(vertex)? {
                self.emit(EngineEvent::TargetFound { vertex: target });
                info!(vertex = target, "target state reached, starting refinement");
                match self.refine_step(refiner, target)? {
                    RefineStep::Feasible(counterexample) => {
                        return Ok(RunVerdict::Unsafe { counterexample });
                    }
                    RefineStep::Refined => continue,
                    RefineStep::GiveUp(reason) => {
                        return Ok(RunVerdict::Unknown { reason });
                    }
                    RefineStep::Interrupted => {
                        info!("run interrupted during refinement");
                        return Ok(RunVerdict::Interrupted);
                    }
                }
            }
        }
    }

    /// Expand one vertex. Returns the first target successor, if any;
    /// the rest of the expansion is deferred until after refinement so
    /// that exactly one target candidate exists per refinement round.
    fn expand(&mut self, vertex: VertexId) -> Result<Option<VertexId>, EngineError> {
        let state = self.arg.state(vertex).clone();
        let precision = self
            .reached
            .precision(vertex)
            .cloned()
            .expect("expanded vertex missing from reached set");
        let location = self.cpa.location_of(&state);
        debug!(vertex, location, "expanding");

        for (edge_id, edge) in self.cfa.outgoing(location) {
            let successors = self.cpa.successors(&state, &precision, edge)?;
            for successor in successors {
                let (adjusted, new_precision, action) =
                    self.cpa.adjust_precision(&successor, &precision, &self.reached)?;
                let succ_location = self.cpa.location_of(&adjusted);
                let is_target = self.cpa.is_target(&adjusted);

                if action == PrecisionAction::Break {
                    let child = self.arg.add_child(vertex, edge_id, adjusted);
                    self.reached
                        .add_outside_waitlist(child, succ_location, new_precision);
                    self.stats.states_added += 1;
                    self.emit(EngineEvent::StateAdded {
                        vertex: child,
                        location: succ_location,
                        target: is_target,
                    });
                    if is_target {
                        return Ok(Some(child));
                    }
                    continue;
                }

                // Candidates for stop and merge: non-covered reached
                // states at the successor's location.
                let candidates: Vec<VertexId> = self
                    .reached
                    .at_location(succ_location)
                    .iter()
                    .copied()
                    .filter(|&c| !self.arg.is_covered(c))
                    .collect();

                let stopped = self.options.stop.stop(
                    self.cpa.domain(),
                    &adjusted,
                    &new_precision,
                    candidates.iter().map(|&c| self.arg.state(c)),
                );
                if stopped {
                    self.stats.stop_hits += 1;
                    debug!(vertex, edge = edge_id, "successor covered, discarded");
                    continue;
                }

                // Join merge: fold the new state into each prior state it
                // does not already agree with; superseded priors are
                // retired below.
                let mut merged_state = adjusted;
                let mut superseded: Vec<VertexId> = Vec::new();
                if self.options.merge == MergeOperator::Join {
                    for &candidate in &candidates {
                        let old_state = self.arg.state(candidate);
                        let merged =
                            self.options
                                .merge
                                .apply(self.cpa.domain(), &merged_state, old_state)?;
                        if &merged != old_state {
                            superseded.push(candidate);
                        }
                        merged_state = merged;
                    }
                }

                let child = self.arg.add_child(vertex, edge_id, merged_state);
                let key = self.options.waitlist.sort_key(self.arg.depth(child));
                self.reached.add(child, succ_location, new_precision, key);
                self.stats.states_added += 1;

                for old in superseded {
                    // The merged vertex subsumes the old one: anything the
                    // old vertex covered is re-opened, and the old vertex
                    // itself leaves the reached set as covered.
                    for freed in self.arg.clean_coverage(old) {
                        if self.reached.contains(freed) {
                            let key = self.options.waitlist.sort_key(self.arg.depth(freed));
                            self.reached.re_add_to_waitlist(freed, key);
                        }
                    }
                    self.reached.remove(old);
                    self.arg.set_covered_by(old, child)?;
                    self.stats.merges += 1;
                }

                let target = self.cpa.is_target(self.arg.state(child));
                self.emit(EngineEvent::StateAdded {
                    vertex: child,
                    location: succ_location,
                    target,
                });
                if target {
                    return Ok(Some(child));
                }
            }
        }
        Ok(None)
    }

    fn refine_step<R: Refiner<C>>(
        &mut self,
        refiner: &mut R,
        target: VertexId,
    ) -> Result<RefineStep, EngineError> {
        if self.cancelled() {
            return Ok(RefineStep::Interrupted);
        }
        let path_ids = self.arg.path_from_root(target);
        let outcome = {
            let path = ArgPath::new(&self.arg, self.cfa, path_ids.clone());
            refiner.refine(&path)
        };
        let round = self.stats.refinement_rounds + 1;

        match outcome {
            Ok(RefinementOutcome::Feasible) => {
                self.emit(EngineEvent::RefinementRound {
                    round,
                    spurious: false,
                    pivot: None,
                });
                info!(round, "error path confirmed feasible");
                Ok(RefineStep::Feasible(self.build_counterexample(&path_ids)))
            }
            Ok(RefinementOutcome::Spurious { pivot, delta }) => {
                if pivot >= path_ids.len() {
                    return Err(EngineError::PivotOutOfRange {
                        pivot,
                        len: path_ids.len(),
                    });
                }
                self.stats.refinement_rounds = round;
                self.emit(EngineEvent::RefinementRound {
                    round,
                    spurious: true,
                    pivot: Some(pivot),
                });
                info!(round, pivot, "spurious error path, refining");

                let pivot_vertex = path_ids[pivot];
                let pruned = self.arg.prune_descendants(pivot_vertex);
                for removed in &pruned.removed {
                    self.reached.remove(*removed);
                }
                self.stats.pruned_vertices += pruned.removed.len();
                for freed in pruned.uncovered {
                    if self.reached.contains(freed) {
                        let key = self.options.waitlist.sort_key(self.arg.depth(freed));
                        self.reached.re_add_to_waitlist(freed, key);
                    }
                }

                // The delta lands on the pivot itself when it is still
                // reached. A pivot retired by a join-merge is covered and
                // out of reached; its coverer carries the live entry that
                // subsumes it and takes the delta instead. A coverer is
                // never itself covered, so the walk ends there; otherwise
                // it climbs to the nearest reached ancestor.
                let mut anchor = pivot_vertex;
                while !self.reached.contains(anchor) {
                    if let Some(coverer) = self.arg.covered_by(anchor) {
                        anchor = coverer;
                        continue;
                    }
                    match self.arg.parent(anchor) {
                        Some(parent) => anchor = parent,
                        None => break,
                    }
                }
                let current = match self.reached.precision(anchor) {
                    Some(p) => p.clone(),
                    None => self.cpa.initial_precision(),
                };
                let strengthened = self.cpa.merge_precision(&current, &delta);
                self.reached.set_precision(anchor, strengthened);
                if !self.arg.is_covered(anchor) {
                    let key = self.options.waitlist.sort_key(self.arg.depth(anchor));
                    self.reached.re_add_to_waitlist(anchor, key);
                }
                // The target's parent stopped expanding early when the
                // target was found; re-queue it so its remaining
                // successors are not lost. Duplicate adds are no-ops.
                if path_ids.len() >= 2 {
                    let parent = path_ids[path_ids.len() - 2];
                    if self.reached.contains(parent) && !self.arg.is_covered(parent) {
                        let key = self.options.waitlist.sort_key(self.arg.depth(parent));
                        self.reached.re_add_to_waitlist(parent, key);
                    }
                }
                self.cpa.on_arg_pruned();

                if self.options.max_refinements > 0 && round >= self.options.max_refinements {
                    info!(round, "refinement budget exhausted");
                    return Ok(RefineStep::GiveUp(format!(
                        "refinement budget exhausted after {round} rounds"
                    )));
                }
                Ok(RefineStep::Refined)
            }
            Err(failure) => {
                self.emit(EngineEvent::RefinementRound {
                    round,
                    spurious: false,
                    pivot: failure.path_index,
                });
                info!(reason = %failure.reason, "refinement failed");
                Ok(RefineStep::GiveUp(failure.to_string()))
            }
        }
    }

    fn build_counterexample(&self, path_ids: &[VertexId]) -> Counterexample {
        let steps = path_ids
            .iter()
            .map(|&v| {
                let location = self.cpa.location_of(self.arg.state(v));
                let edge = self.arg.entering_edge(v);
                CounterexampleStep {
                    location,
                    location_name: self.cfa.location(location).name.clone(),
                    edge,
                    edge_label: edge.map(|e| self.cfa.edge(e).label.clone()),
                }
            })
            .collect();
        Counterexample {
            steps,
            target_vertex: *path_ids.last().expect("error path is never empty"),
        }
    }
}
