#![doc = include_str!("../README.md")]

use std::fmt;

use thiserror::Error;

/// Index of a location in a [`Cfa`].
pub type LocationId = usize;

/// Index of an edge in a [`Cfa`].
pub type EdgeId = usize;

/// A program location (control point).
#[derive(Debug, Clone)]
pub struct Location {
    /// Human-readable name, used in traces and exports.
    pub name: String,
    /// Whether reaching this location violates the property under analysis.
    pub is_target: bool,
}

/// A directed, labeled edge between two locations.
#[derive(Debug, Clone)]
pub struct CfaEdge {
    pub from: LocationId,
    pub to: LocationId,
    /// Operation label (statement, guard, ...). Opaque to the engine.
    pub label: String,
}

#[derive(Debug, Error)]
pub enum CfaError {
    #[error("unknown location id {0}")]
    UnknownLocation(LocationId),
    #[error("control-flow automaton has no locations")]
    Empty,
}

/// An immutable control-flow automaton.
///
/// Locations and edges are stored in arenas indexed by [`LocationId`] and
/// [`EdgeId`]; outgoing edges are precomputed per location.
#[derive(Debug, Clone)]
pub struct Cfa {
    locations: Vec<Location>,
    edges: Vec<CfaEdge>,
    outgoing: Vec<Vec<EdgeId>>,
    entry: LocationId,
}

impl Cfa {
    pub fn entry(&self) -> LocationId {
        self.entry
    }

    pub fn num_locations(&self) -> usize {
        self.locations.len()
    }

    pub fn num_edges(&self) -> usize {
        self.edges.len()
    }

    pub fn location(&self, id: LocationId) -> &Location {
        &self.locations[id]
    }

    pub fn edge(&self, id: EdgeId) -> &CfaEdge {
        &self.edges[id]
    }

    /// Edges leaving `loc`, in insertion order.
    pub fn outgoing(&self, loc: LocationId) -> impl Iterator<Item = (EdgeId, &CfaEdge)> + '_ {
        self.outgoing[loc].iter().map(|&e| (e, &self.edges[e]))
    }

    pub fn is_target(&self, loc: LocationId) -> bool {
        self.locations[loc].is_target
    }

    pub fn target_locations(&self) -> impl Iterator<Item = LocationId> + '_ {
        self.locations
            .iter()
            .enumerate()
            .filter(|(_, l)| l.is_target)
            .map(|(i, _)| i)
    }
}

impl fmt::Display for Cfa {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        writeln!(f, "cfa ({} locations, {} edges)", self.locations.len(), self.edges.len())?;
        for (i, loc) in self.locations.iter().enumerate() {
            let entry = if i == self.entry { " [entry]" } else { "" };
            let target = if loc.is_target { " [target]" } else { "" };
            writeln!(f, "  l{i} {}{entry}{target}", loc.name)?;
            for &e in &self.outgoing[i] {
                let edge = &self.edges[e];
                writeln!(f, "    --[{}]--> l{}", edge.label, edge.to)?;
            }
        }
        Ok(())
    }
}

/// Builder for [`Cfa`]. Edge endpoints are validated eagerly.
#[derive(Debug, Default)]
pub struct CfaBuilder {
    locations: Vec<Location>,
    edges: Vec<CfaEdge>,
}

impl CfaBuilder {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn add_location(&mut self, name: &str) -> LocationId {
        let id = self.locations.len();
        self.locations.push(Location {
            name: name.to_string(),
            is_target: false,
        });
        id
    }

    pub fn add_target_location(&mut self, name: &str) -> LocationId {
        let id = self.add_location(name);
        self.locations[id].is_target = true;
        id
    }

    pub fn mark_target(&mut self, loc: LocationId) -> Result<(), CfaError> {
        let l = self
            .locations
            .get_mut(loc)
            .ok_or(CfaError::UnknownLocation(loc))?;
        l.is_target = true;
        Ok(())
    }

    pub fn add_edge(
        &mut self,
        from: LocationId,
        to: LocationId,
        label: &str,
    ) -> Result<EdgeId, CfaError> {
        if from >= self.locations.len() {
            return Err(CfaError::UnknownLocation(from));
        }
        if to >= self.locations.len() {
            return Err(CfaError::UnknownLocation(to));
        }
        let id = self.edges.len();
        self.edges.push(CfaEdge {
            from,
            to,
            label: label.to_string(),
        });
        Ok(id)
    }

    pub fn build(self, entry: LocationId) -> Result<Cfa, CfaError> {
        if self.locations.is_empty() {
            return Err(CfaError::Empty);
        }
        if entry >= self.locations.len() {
            return Err(CfaError::UnknownLocation(entry));
        }
        let mut outgoing = vec![Vec::new(); self.locations.len()];
        for (i, edge) in self.edges.iter().enumerate() {
            outgoing[edge.from].push(i);
        }
        Ok(Cfa {
            locations: self.locations,
            edges: self.edges,
            outgoing,
            entry,
        })
    }
}
