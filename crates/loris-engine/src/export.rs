//! Post-terminal ARG export.
//!
//! A snapshot is taken after the run has produced its verdict; it is a
//! read-only rendering of the ARG with lineage, covering edges, and the
//! precision each reached vertex ended up with. The fingerprint ties an
//! exported artifact to the exact graph that produced it.

use std::fmt::Write as _;

use loris_cfa::{Cfa, EdgeId, LocationId};
use serde::Serialize;
use sha2::{Digest, Sha256};

use crate::arg::{Arg, VertexId};
use crate::cpa::Cpa;
use crate::explore::Engine;
use crate::reached::ReachedSet;

pub const ARG_SNAPSHOT_SCHEMA_VERSION: u32 = 1;

#[derive(Debug, Clone, Serialize)]
pub struct ArgVertexExport {
    pub id: VertexId,
    pub location: LocationId,
    pub location_name: String,
    pub target: bool,
    pub parent: Option<VertexId>,
    pub entering_edge: Option<EdgeId>,
    pub edge_label: Option<String>,
    pub children: Vec<VertexId>,
    pub covered_by: Option<VertexId>,
    /// Debug rendering of the abstract state.
    pub state: String,
    /// Debug rendering of the precision, for vertices still reached.
    pub precision: Option<String>,
}

#[derive(Debug, Clone, Serialize)]
pub struct ArgSnapshot {
    pub schema_version: u32,
    pub engine_version: String,
    pub roots: Vec<VertexId>,
    pub vertices: Vec<ArgVertexExport>,
    /// sha-256 over the canonical structure rendering below.
    pub fingerprint: String,
}

/// Render the structural identity of the snapshot: ids, lineage,
/// covering and states, but not display-only strings like location names.
fn canonical_rendering(roots: &[VertexId], vertices: &[ArgVertexExport]) -> String {
    let mut out = String::new();
    let _ = write!(out, "v{ARG_SNAPSHOT_SCHEMA_VERSION};roots:{roots:?};");
    for v in vertices {
        let _ = write!(
            out,
            "{}|{}|{:?}|{:?}|{:?}|{}\n",
            v.id, v.location, v.parent, v.entering_edge, v.covered_by, v.state
        );
    }
    out
}

pub fn snapshot<C: Cpa>(
    cfa: &Cfa,
    cpa: &C,
    arg: &Arg<C::State>,
    reached: &ReachedSet<C::Precision>,
) -> ArgSnapshot {
    let vertices: Vec<ArgVertexExport> = arg
        .vertices()
        .map(|v| {
            let state = arg.state(v);
            let location = cpa.location_of(state);
            let edge = arg.entering_edge(v);
            ArgVertexExport {
                id: v,
                location,
                location_name: cfa.location(location).name.clone(),
                target: cpa.is_target(state),
                parent: arg.parent(v),
                entering_edge: edge,
                edge_label: edge.map(|e| cfa.edge(e).label.clone()),
                children: arg.children(v).to_vec(),
                covered_by: arg.covered_by(v),
                state: format!("{state:?}"),
                precision: reached.precision(v).map(|p| format!("{p:?}")),
            }
        })
        .collect();

    let digest = Sha256::digest(canonical_rendering(arg.roots(), &vertices).as_bytes());
    let mut fingerprint = String::with_capacity(64);
    for byte in digest {
        let _ = write!(fingerprint, "{byte:02x}");
    }

    ArgSnapshot {
        schema_version: ARG_SNAPSHOT_SCHEMA_VERSION,
        engine_version: env!("CARGO_PKG_VERSION").to_string(),
        roots: arg.roots().to_vec(),
        vertices,
        fingerprint,
    }
}

impl<C: Cpa> Engine<'_, C> {
    /// Export the ARG after the run has terminated.
    pub fn arg_snapshot(&self) -> ArgSnapshot {
        snapshot(self.cfa(), self.cpa(), self.arg(), self.reached())
    }
}
