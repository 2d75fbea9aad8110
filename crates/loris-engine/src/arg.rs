//! The abstract reachability graph.
//!
//! Vertices live in an arena with monotonically increasing ids; pruning
//! empties a slot but never reuses it, so vertex ids stay stable for the
//! lifetime of the graph. Each vertex records its parent and the CFA edge
//! it was produced along, its children, and the covering relation:
//! `covered_by` on the covered side, a reverse `covers` index on the
//! coverer. A vertex may be covered by at most one vertex, and a covered
//! vertex may not itself cover others.

use std::collections::HashSet;

use loris_cfa::EdgeId;

use crate::error::CoverageError;

/// Stable id of an ARG vertex.
pub type VertexId = usize;

#[derive(Debug)]
struct Vertex<S> {
    state: S,
    parent: Option<(VertexId, EdgeId)>,
    children: Vec<VertexId>,
    covered_by: Option<VertexId>,
    covers: Vec<VertexId>,
    depth: usize,
}

/// Vertices removed and uncovered by a pruning operation.
#[derive(Debug, Default)]
pub struct Pruned {
    /// Vertices deleted from the graph, in removal order.
    pub removed: Vec<VertexId>,
    /// Surviving vertices whose coverer was deleted; they are reachable
    /// again and must rejoin the frontier.
    pub uncovered: Vec<VertexId>,
}

#[derive(Debug, Default)]
pub struct Arg<S> {
    slots: Vec<Option<Vertex<S>>>,
    roots: Vec<VertexId>,
    live: usize,
}

impl<S> Arg<S> {
    pub fn new() -> Self {
        Self {
            slots: Vec::new(),
            roots: Vec::new(),
            live: 0,
        }
    }

    fn vertex(&self, v: VertexId) -> &Vertex<S> {
        self.slots[v].as_ref().expect("ARG vertex was pruned")
    }

    fn vertex_mut(&mut self, v: VertexId) -> &mut Vertex<S> {
        self.slots[v].as_mut().expect("ARG vertex was pruned")
    }

    fn push(&mut self, vertex: Vertex<S>) -> VertexId {
        let id = self.slots.len();
        self.slots.push(Some(vertex));
        self.live += 1;
        id
    }

    pub fn add_root(&mut self, state: S) -> VertexId {
        let id = self.push(Vertex {
            state,
            parent: None,
            children: Vec::new(),
            covered_by: None,
            covers: Vec::new(),
            depth: 0,
        });
        self.roots.push(id);
        id
    }

    pub fn add_child(&mut self, parent: VertexId, edge: EdgeId, state: S) -> VertexId {
        let depth = self.vertex(parent).depth + 1;
        let id = self.push(Vertex {
            state,
            parent: Some((parent, edge)),
            children: Vec::new(),
            covered_by: None,
            covers: Vec::new(),
            depth,
        });
        self.vertex_mut(parent).children.push(id);
        id
    }

    pub fn contains(&self, v: VertexId) -> bool {
        self.slots.get(v).is_some_and(|s| s.is_some())
    }

    pub fn state(&self, v: VertexId) -> &S {
        &self.vertex(v).state
    }

    pub fn parent(&self, v: VertexId) -> Option<VertexId> {
        self.vertex(v).parent.map(|(p, _)| p)
    }

    pub fn entering_edge(&self, v: VertexId) -> Option<EdgeId> {
        self.vertex(v).parent.map(|(_, e)| e)
    }

    pub fn children(&self, v: VertexId) -> &[VertexId] {
        &self.vertex(v).children
    }

    pub fn depth(&self, v: VertexId) -> usize {
        self.vertex(v).depth
    }

    pub fn is_covered(&self, v: VertexId) -> bool {
        self.vertex(v).covered_by.is_some()
    }

    pub fn covered_by(&self, v: VertexId) -> Option<VertexId> {
        self.vertex(v).covered_by
    }

    /// Vertices directly covered by `v`.
    pub fn covers(&self, v: VertexId) -> &[VertexId] {
        &self.vertex(v).covers
    }

    pub fn roots(&self) -> &[VertexId] {
        &self.roots
    }

    /// Number of live vertices.
    pub fn len(&self) -> usize {
        self.live
    }

    pub fn is_empty(&self) -> bool {
        self.live == 0
    }

    /// Ids of all live vertices, ascending.
    pub fn vertices(&self) -> impl Iterator<Item = VertexId> + '_ {
        self.slots
            .iter()
            .enumerate()
            .filter(|(_, s)| s.is_some())
            .map(|(i, _)| i)
    }

    /// Record that `covered` is subsumed by `coverer`.
    ///
    /// Rejects double covering, self covering, covering by a covered
    /// vertex, and covering of a vertex that itself covers others.
    pub fn set_covered_by(
        &mut self,
        covered: VertexId,
        coverer: VertexId,
    ) -> Result<(), CoverageError> {
        if covered == coverer {
            return Err(CoverageError::SelfCover(covered));
        }
        if !self.contains(covered) {
            return Err(CoverageError::Missing(covered));
        }
        if !self.contains(coverer) {
            return Err(CoverageError::Missing(coverer));
        }
        if self.vertex(covered).covered_by.is_some() {
            return Err(CoverageError::AlreadyCovered(covered));
        }
        if !self.vertex(covered).covers.is_empty() {
            return Err(CoverageError::CoveringCovered(covered));
        }
        if self.vertex(coverer).covered_by.is_some() {
            return Err(CoverageError::CoveredCoverer(coverer));
        }
        self.vertex_mut(covered).covered_by = Some(coverer);
        self.vertex_mut(coverer).covers.push(covered);
        Ok(())
    }

    /// Uncover everything `v` covers and return the uncovered vertices.
    pub fn clean_coverage(&mut self, v: VertexId) -> Vec<VertexId> {
        let freed = std::mem::take(&mut self.vertex_mut(v).covers);
        for &u in &freed {
            self.vertex_mut(u).covered_by = None;
        }
        freed
    }

    /// Path of vertex ids from a root to `v`, inclusive.
    pub fn path_from_root(&self, v: VertexId) -> Vec<VertexId> {
        let mut path = vec![v];
        let mut current = v;
        while let Some(p) = self.parent(current) {
            path.push(p);
            current = p;
        }
        path.reverse();
        path
    }

    /// Delete all descendants of `v`, keeping `v` itself.
    ///
    /// Coverage is repaired on the way: survivors covered by a deleted
    /// vertex are uncovered and reported, and deleted vertices are removed
    /// from surviving coverers' indices.
    pub fn prune_descendants(&mut self, v: VertexId) -> Pruned {
        let mut doomed: HashSet<VertexId> = HashSet::new();
        let mut stack: Vec<VertexId> = self.vertex(v).children.clone();
        while let Some(id) = stack.pop() {
            if doomed.insert(id) {
                stack.extend(self.vertex(id).children.iter().copied());
            }
        }

        let mut pruned = Pruned::default();
        for &id in &doomed {
            let vertex = self.slots[id].take().expect("descendant already pruned");
            self.live -= 1;
            for covered in vertex.covers {
                if !doomed.contains(&covered) {
                    self.vertex_mut(covered).covered_by = None;
                    pruned.uncovered.push(covered);
                }
            }
            if let Some(coverer) = vertex.covered_by {
                if !doomed.contains(&coverer) {
                    self.vertex_mut(coverer).covers.retain(|&c| c != id);
                }
            }
            pruned.removed.push(id);
        }
        self.vertex_mut(v).children.clear();
        pruned
    }
}
