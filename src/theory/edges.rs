use std::ops::Index;

use hashbrown::HashMap;

use crate::collections::ref_store::{RefVec, StringInterner};
use crate::core::{Lit, W};
use crate::create_ref_type;

create_ref_type!(NodeId);
create_ref_type!(EdgeId);

/// A difference constraint `value(target) - value(source) <= weight`, imposed
/// whenever the host asserts `lit`.
#[derive(Copy, Clone, Debug, PartialEq, Eq, Hash)]
pub struct Edge {
    pub source: NodeId,
    pub target: NodeId,
    pub weight: W,
    pub lit: Lit,
}

/// The process-wide edge table: every difference constraint of the program,
/// identified by a dense [`EdgeId`] in registration order, together with the
/// interned endpoint names and the literal-to-edges index.
///
/// Built once during initialization and read-only afterwards; it can be shared
/// freely across solver threads.
#[derive(Clone, Default)]
pub struct EdgeDb {
    edges: RefVec<EdgeId, Edge>,
    /// Node names, interned in first-seen order.
    names: StringInterner<NodeId>,
    /// All edges controlled by a given literal, in registration order.
    /// A single literal may control several edges.
    watches: HashMap<Lit, Vec<EdgeId>>,
}

impl EdgeDb {
    /// Interns both endpoint names and records a new edge controlled by `lit`.
    /// Only valid during initialization, before any propagation.
    pub fn register(&mut self, source: &str, target: &str, weight: W, lit: Lit) -> EdgeId {
        let source = self.names.intern(source);
        let target = self.names.intern(target);
        let id = self.edges.push(Edge {
            source,
            target,
            weight,
            lit,
        });
        self.watches.entry(lit).or_default().push(id);
        id
    }

    /// The edges activated by `lit`, in registration order.
    /// Empty for literals that control no edge.
    pub fn edges_for(&self, lit: Lit) -> &[EdgeId] {
        self.watches.get(&lit).map(|v| v.as_slice()).unwrap_or(&[])
    }

    pub fn num_edges(&self) -> usize {
        self.edges.len()
    }

    pub fn num_nodes(&self) -> usize {
        self.names.len()
    }

    pub fn nodes(&self) -> impl Iterator<Item = NodeId> {
        self.names.keys()
    }

    pub fn node_name(&self, node: NodeId) -> &str {
        self.names.get(node)
    }
}

impl Index<EdgeId> for EdgeDb {
    type Output = Edge;

    fn index(&self, index: EdgeId) -> &Edge {
        &self.edges[index]
    }
}
