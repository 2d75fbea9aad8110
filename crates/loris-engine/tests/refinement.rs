//! CEGAR refinement behavior.

mod common;

use std::cell::RefCell;
use std::collections::BTreeSet;
use std::rc::Rc;

use common::*;
use loris_engine::refine::RefinementOutcome;
use loris_engine::{
    Engine, EngineEvent, EngineOptions, RefinementError, RefinementFailureReason, RunVerdict,
};

fn tracked_setup() -> (std::sync::Arc<loris_cfa::Cfa>, TrackedCpa) {
    let cfa = straight_line(&["e0", "e1"]);
    let cpa = TrackedCpa::new(cfa.clone());
    (cfa, cpa)
}

#[test]
fn two_spurious_rounds_then_feasible() {
    let (cfa, cpa) = tracked_setup();
    let mut refiner = ScriptedRefiner::new([
        Ok(RefinementOutcome::Spurious {
            pivot: 1,
            delta: BTreeSet::new(),
        }),
        Ok(RefinementOutcome::Spurious {
            pivot: 1,
            delta: BTreeSet::new(),
        }),
        Ok(RefinementOutcome::Feasible),
    ]);

    let events: Rc<RefCell<Vec<EngineEvent>>> = Rc::new(RefCell::new(Vec::new()));
    let log = events.clone();
    let mut engine = Engine::new(&cfa, &cpa, EngineOptions::default())
        .with_event_sink(move |e| log.borrow_mut().push(e.clone()));

    let counterexample = match engine.run(&mut refiner).unwrap() {
        RunVerdict::Unsafe { counterexample } => counterexample,
        other => panic!("expected UNSAFE, got: {other}"),
    };
    assert_eq!(refiner.calls, 3);
    assert_eq!(engine.stats().refinement_rounds, 2);
    assert_eq!(counterexample.steps.len(), 3);

    // Each spurious round pruned the target below the pivot and the pivot
    // was re-explored; the feasible round reports without pruning.
    assert_eq!(engine.stats().pruned_vertices, 2);
    let spurious_rounds: Vec<_> = events
        .borrow()
        .iter()
        .filter_map(|e| match e {
            EngineEvent::RefinementRound {
                round,
                spurious: true,
                pivot,
            } => Some((*round, *pivot)),
            _ => None,
        })
        .collect();
    assert_eq!(spurious_rounds, vec![(1, Some(1)), (2, Some(1))]);
}

#[test]
fn refinement_delta_strengthens_pivot_precision_monotonically() {
    let (cfa, cpa) = tracked_setup();
    let delta: BTreeSet<String> = BTreeSet::from(["p1".to_string()]);
    let mut refiner = ScriptedRefiner::new([
        Ok(RefinementOutcome::Spurious {
            pivot: 1,
            delta: delta.clone(),
        }),
        Ok(RefinementOutcome::Feasible),
    ]);

    let mut engine = Engine::new(&cfa, &cpa, EngineOptions::default());
    let verdict = engine.run(&mut refiner).unwrap();
    assert_eq!(verdict.verdict_class(), "unsafe");

    // Vertex 1 is the pivot (root=0, l1=1); its precision must now
    // subsume both the initial precision and the delta.
    let precision = engine.reached().precision(1).unwrap();
    assert!(precision.contains("p0"));
    assert!(precision.contains("p1"));
}

#[test]
fn pruned_target_vertices_leave_reached_and_arg() {
    let (cfa, cpa) = tracked_setup();
    let mut refiner = ScriptedRefiner::new([
        Ok(RefinementOutcome::Spurious {
            pivot: 1,
            delta: BTreeSet::new(),
        }),
        Ok(RefinementOutcome::Feasible),
    ]);

    let mut engine = Engine::new(&cfa, &cpa, EngineOptions::default());
    engine.run(&mut refiner).unwrap();

    // The first target vertex (id 2) was pruned; its replacement is a
    // fresh id, never a reused one.
    assert!(!engine.arg().contains(2));
    assert!(!engine.reached().contains(2));
    let snapshot = engine.arg_snapshot();
    assert!(snapshot.vertices.iter().all(|v| v.id != 2));
    assert!(snapshot.vertices.iter().any(|v| v.id > 2 && v.target));
}

#[test]
fn spurious_pivot_retired_by_a_merge_strengthens_its_coverer() {
    // Two routes into location m: `set1` directly from the entry, `set2`
    // through a detour. The 01-masked state expands toward the target
    // first; the 10-masked arrival then joins to mask 11 and retires it.
    // When the refiner blames the retired vertex, the delta must land on
    // the covering merged state, not vanish.
    let mut b = loris_cfa::CfaBuilder::new();
    let l0 = b.add_location("l0");
    let m = b.add_location("m");
    let d = b.add_location("d");
    let x = b.add_location("x");
    let t = b.add_target_location("t");
    b.add_edge(l0, m, "set1").unwrap();
    b.add_edge(l0, d, "skip").unwrap();
    b.add_edge(d, m, "set2").unwrap();
    b.add_edge(m, x, "step").unwrap();
    b.add_edge(x, t, "fail").unwrap();
    let cfa = std::sync::Arc::new(b.build(l0).unwrap());
    let cpa = MaskCpa::new(cfa.clone());

    let delta: BTreeSet<String> = BTreeSet::from(["p1".to_string()]);
    let mut refiner = ScriptedRefiner::new([
        Ok(RefinementOutcome::Spurious { pivot: 1, delta }),
        Ok(RefinementOutcome::Feasible),
    ]);
    let options = EngineOptions::from_names("join", "separate", "fifo").unwrap();
    let mut engine = Engine::new(&cfa, &cpa, options);

    let verdict = engine.run(&mut refiner).unwrap();
    assert_eq!(verdict.verdict_class(), "unsafe");
    assert_eq!(refiner.calls, 2);
    assert_eq!(engine.stats().merges, 1);
    assert_eq!(engine.stats().pruned_vertices, 2);

    // Vertex 1 is the retired (m, mask 01) pivot: covered, out of
    // reached, and its coverer now carries the strengthened precision.
    assert!(engine.arg().is_covered(1));
    assert!(!engine.reached().contains(1));
    let coverer = engine.arg().covered_by(1).unwrap();
    let precision = engine.reached().precision(coverer).unwrap();
    assert!(precision.contains("p0"));
    assert!(precision.contains("p1"));
}

#[test]
fn each_pruning_round_notifies_the_analysis() {
    let (cfa, cpa) = tracked_setup();
    let spurious = || {
        Ok(RefinementOutcome::Spurious {
            pivot: 1,
            delta: BTreeSet::new(),
        })
    };
    let mut refiner = ScriptedRefiner::new([spurious(), spurious(), Ok(RefinementOutcome::Feasible)]);

    let mut engine = Engine::new(&cfa, &cpa, EngineOptions::default());
    engine.run(&mut refiner).unwrap();
    // One notification per pruning round; the feasible round prunes
    // nothing and stays silent.
    assert_eq!(cpa.pruned_notices.get(), 2);
}

#[test]
fn refinement_failure_yields_unknown_with_reason_code() {
    let (cfa, cpa) = tracked_setup();
    let mut refiner = ScriptedRefiner::new([Err(RefinementError {
        reason: RefinementFailureReason::InterpolationFailed,
        path_index: Some(1),
    })]);

    let mut engine = Engine::new(&cfa, &cpa, EngineOptions::default());
    let reason = match engine.run(&mut refiner).unwrap() {
        RunVerdict::Unknown { reason } => reason,
        other => panic!("expected UNKNOWN, got: {other}"),
    };
    assert!(reason.contains("interpolation-failed"));
    assert!(reason.contains("path index 1"));
}

#[test]
fn refinement_budget_exhaustion_yields_unknown() {
    let (cfa, cpa) = tracked_setup();
    let spurious = || {
        Ok(RefinementOutcome::Spurious {
            pivot: 1,
            delta: BTreeSet::new(),
        })
    };
    let mut refiner = ScriptedRefiner::new([spurious(), spurious(), spurious(), spurious()]);

    let options = EngineOptions::default().with_max_refinements(3);
    let mut engine = Engine::new(&cfa, &cpa, options);
    let reason = match engine.run(&mut refiner).unwrap() {
        RunVerdict::Unknown { reason } => reason,
        other => panic!("expected UNKNOWN, got: {other}"),
    };
    assert!(reason.contains("budget"));
    assert_eq!(engine.stats().refinement_rounds, 3);
}

#[test]
fn out_of_range_pivot_is_a_contract_violation() {
    let (cfa, cpa) = tracked_setup();
    let mut refiner = ScriptedRefiner::new([Ok(RefinementOutcome::Spurious {
        pivot: 99,
        delta: BTreeSet::new(),
    })]);

    let mut engine = Engine::new(&cfa, &cpa, EngineOptions::default());
    let err = engine.run(&mut refiner).unwrap_err();
    assert!(err.to_string().contains("pivot 99"));
}

#[test]
fn timeout_failure_reason_is_reported() {
    let (cfa, cpa) = tracked_setup();
    let mut refiner = ScriptedRefiner::new([Err(RefinementError {
        reason: RefinementFailureReason::Timeout,
        path_index: None,
    })]);

    let mut engine = Engine::new(&cfa, &cpa, EngineOptions::default());
    let reason = match engine.run(&mut refiner).unwrap() {
        RunVerdict::Unknown { reason } => reason,
        other => panic!("expected UNKNOWN, got: {other}"),
    };
    assert!(reason.contains("timeout"));
}
