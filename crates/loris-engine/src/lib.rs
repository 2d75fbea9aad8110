#![doc = include_str!("../README.md")]

pub mod arg;
pub mod composite;
pub mod cpa;
pub mod error;
pub mod explore;
pub mod export;
pub mod location;
pub mod partition;
pub mod reached;
pub mod refine;
pub mod result;
pub mod waitlist;

pub use crate::cpa::{AbstractDomain, Cpa, MergeOperator, PrecisionAction, StopOperator};
pub use crate::error::{AnalysisError, EngineError, RefinementError, RefinementFailureReason};
pub use crate::explore::{Engine, EngineEvent, EngineOptions};
pub use crate::refine::{RefinementOutcome, Refiner};
pub use crate::result::{Counterexample, RunStats, RunVerdict};
pub use crate::waitlist::WaitlistStrategy;
