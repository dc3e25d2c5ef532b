use std::cmp::Ordering;
use std::collections::BinaryHeap;

use crate::collections::ref_store::RefVec;
use crate::core::W;
use crate::theory::edges::{EdgeDb, EdgeId, NodeId};

/// Per-node state of the consistency graph. Records are materialized lazily
/// when a node first appears as the endpoint of an activated edge.
#[derive(Clone, Default)]
struct Node {
    /// Distance label of the shortest-path reformulation. `None` until the
    /// node participates in an active edge; treated as 0 at that moment.
    potential: Option<W>,
    /// Active edges leaving this node, in activation order.
    outgoing: Vec<EdgeId>,
    /// Scratch: the edge through which this node was last relaxed during the
    /// current [`DlGraph::add_edge`] call.
    last_edge: Option<EdgeId>,
    /// Scratch: tentative potential decrement of the current call.
    gamma: W,
    /// Scratch: whether the node was settled during the current call.
    changed: bool,
}

/// Queue entry of the relaxation loop. Ordered so that the most negative
/// decrement is popped first; stale entries are discarded lazily through the
/// node's `changed` flag.
#[derive(Copy, Clone, Debug)]
struct PotentialUpdate {
    node: NodeId,
    gamma: W,
}

impl PartialEq for PotentialUpdate {
    fn eq(&self, other: &Self) -> bool {
        self.gamma == other.gamma
    }
}
impl Eq for PotentialUpdate {}
impl PartialOrd for PotentialUpdate {
    fn partial_cmp(&self, other: &Self) -> Option<Ordering> {
        Some(self.cmp(other))
    }
}
impl Ord for PotentialUpdate {
    fn cmp(&self, other: &Self) -> Ordering {
        other.gamma.cmp(&self.gamma)
    }
}

/// The consistency graph of one solver thread: the set of currently active
/// difference constraints, kept feasible through node potentials.
///
/// Potentials are maintained so that every active edge `(u -> v, w)` has a
/// non-negative reduced weight `potential(u) + w - potential(v)`. Under this
/// invariant the potentials themselves are a satisfying assignment, which
/// [`DlGraph::value`] exposes, and relaxation never has to traverse an edge
/// with a negative reduced weight, so a Dijkstra-style queue suffices.
///
/// Weights and potentials use a plain [`W`]; it is up to the caller to keep
/// program constants small enough that path sums stay within
/// [`crate::core::W_MAX`] (additions are checked in debug builds).
#[derive(Clone, Default)]
pub struct DlGraph {
    nodes: RefVec<NodeId, Node>,
    /// Scratch priority queue of tentative decrements, owned by the graph so
    /// its allocation is reused across calls.
    queue: BinaryHeap<PotentialUpdate>,
    /// Nodes settled by the current call, with their previous potential.
    changed: Vec<(NodeId, W)>,
    /// Buffer for the negative cycle of the latest rejected edge.
    cycle: Vec<EdgeId>,
}

impl DlGraph {
    /// Tentatively activates the edge `uv_idx` of `edges`.
    ///
    /// Returns an empty slice if the edge was installed; node potentials may
    /// have decreased to keep all reduced weights non-negative. Otherwise the
    /// returned slice is the negative cycle the edge would have closed, listed
    /// by walking the relaxation chain backward from the edge's target, and
    /// the graph is left exactly as it was before the call.
    ///
    /// Must only be called at quiescence: all scratch state clean, which this
    /// method re-establishes before returning.
    pub fn add_edge(&mut self, uv_idx: EdgeId, edges: &EdgeDb) -> &[EdgeId] {
        self.cycle.clear();
        let uv = edges[uv_idx];
        let (u, v) = (uv.source, uv.target);

        self.nodes.fill_with(u.max(v), Node::default);
        if self.nodes[u].potential.is_none() {
            self.nodes[u].potential = Some(0);
        }
        if self.nodes[v].potential.is_none() {
            self.nodes[v].potential = Some(0);
        }

        debug_assert!(self.potential(u).checked_add(uv.weight).is_some());
        let gamma_v = self.potential(u) + uv.weight - self.potential(v);
        self.nodes[v].gamma = gamma_v;
        if gamma_v < 0 {
            self.queue.push(PotentialUpdate { node: v, gamma: gamma_v });
            self.nodes[v].last_edge = Some(uv_idx);
        }

        // Relaxation loop. Every queued decrement is negative, so if one ever
        // reaches `u` the chain from `v` to `u` plus the new edge forms a
        // negative cycle and the loop stops immediately.
        while self.nodes[u].gamma == 0 {
            let Some(PotentialUpdate { node: s, gamma }) = self.queue.pop() else {
                break;
            };
            if self.nodes[s].changed {
                // stale entry, a stronger decrement was already applied
                continue;
            }
            debug_assert_eq!(self.nodes[s].gamma, gamma);
            let previous = self.potential(s);
            let s_pot = previous + gamma;
            self.changed.push((s, previous));
            {
                let node = &mut self.nodes[s];
                node.potential = Some(s_pot);
                node.gamma = 0;
                node.changed = true;
            }
            for i in 0..self.nodes[s].outgoing.len() {
                let st_idx = self.nodes[s].outgoing[i];
                let st = edges[st_idx];
                let t = st.target;
                if self.nodes[t].changed {
                    continue;
                }
                debug_assert!(s_pot.checked_add(st.weight).is_some());
                let gamma = s_pot + st.weight - self.potential(t);
                if gamma < self.nodes[t].gamma {
                    let target = &mut self.nodes[t];
                    target.gamma = gamma;
                    target.last_edge = Some(st_idx);
                    self.queue.push(PotentialUpdate { node: t, gamma });
                }
            }
        }

        if self.nodes[u].gamma < 0 {
            // Gather the cycle by following the relaxation chain backward
            // until it comes around to the target of the rejected edge.
            let mut last = self.nodes[v]
                .last_edge
                .expect("negative decrement without a relaxing edge");
            self.cycle.push(last);
            let mut pred = edges[last].source;
            while pred != v {
                last = self.nodes[pred]
                    .last_edge
                    .expect("broken relaxation chain");
                self.cycle.push(last);
                pred = edges[last].source;
            }
            // the edge is rejected, roll the tentative potentials back
            for &(node, previous) in &self.changed {
                self.nodes[node].potential = Some(previous);
            }
        } else {
            self.nodes[u].outgoing.push(uv_idx);
        }

        // scratch cleanup, re-establishing quiescence
        self.nodes[v].gamma = 0;
        while let Some(PotentialUpdate { node, .. }) = self.queue.pop() {
            self.nodes[node].gamma = 0;
        }
        for &(node, _) in &self.changed {
            self.nodes[node].changed = false;
        }
        self.changed.clear();

        &self.cycle
    }

    /// Drops every node record, leaving the graph as freshly constructed.
    /// Allocated capacity is retained for reuse.
    pub fn reset(&mut self) {
        self.nodes.clear();
    }

    /// The value assigned to `node` by the current potentials, or `None` if
    /// the node never participated in an active edge since the last reset.
    /// Between `add_edge` calls these values satisfy every active constraint.
    pub fn value(&self, node: NodeId) -> Option<W> {
        if self.nodes.contains(node) {
            self.nodes[node].potential
        } else {
            None
        }
    }

    pub fn value_defined(&self, node: NodeId) -> bool {
        self.value(node).is_some()
    }

    fn potential(&self, node: NodeId) -> W {
        self.nodes[node].potential.expect("node without a potential")
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::core::Lit;
    use rand::rngs::SmallRng;
    use rand::{Rng, SeedableRng};

    fn edge_db(edges: &[(&str, &str, W)]) -> EdgeDb {
        let mut db = EdgeDb::default();
        for (i, &(source, target, weight)) in edges.iter().enumerate() {
            db.register(source, target, weight, Lit::from(i as i32 + 1));
        }
        db
    }

    fn eid(i: u32) -> EdgeId {
        EdgeId::from_u32(i)
    }

    /// Scratch must be clean between `add_edge` calls.
    fn assert_quiescent(graph: &DlGraph) {
        assert!(graph.queue.is_empty());
        assert!(graph.changed.is_empty());
        for (_, node) in graph.nodes.entries() {
            assert_eq!(node.gamma, 0);
            assert!(!node.changed);
        }
    }

    /// The values of the graph must satisfy every installed constraint.
    fn assert_feasible(graph: &DlGraph, db: &EdgeDb, active: &[EdgeId]) {
        for &e in active {
            let edge = db[e];
            let source = graph.value(edge.source).expect("endpoint of an active edge");
            let target = graph.value(edge.target).expect("endpoint of an active edge");
            assert!(
                target - source <= edge.weight,
                "{} - {} > {} for edge {:?}",
                target,
                source,
                edge.weight,
                edge
            );
        }
    }

    /// Adjacency lists must hold exactly the active edges, in insertion order.
    fn assert_adjacency(graph: &DlGraph, db: &EdgeDb, active: &[EdgeId]) {
        for (n, node) in graph.nodes.entries() {
            let expected: Vec<EdgeId> = active.iter().copied().filter(|&e| db[e].source == n).collect();
            assert_eq!(node.outgoing, expected);
        }
    }

    /// The edges must form a single directed cycle of negative total weight.
    /// The slice walks the cycle backward: each edge's source is the next
    /// edge's target, wrapping around.
    fn assert_negative_cycle(cycle: &[EdgeId], db: &EdgeDb) {
        assert!(!cycle.is_empty());
        for i in 0..cycle.len() {
            let next = cycle[(i + 1) % cycle.len()];
            assert_eq!(db[cycle[i]].source, db[next].target);
        }
        let weight: W = cycle.iter().map(|&e| db[e].weight).sum();
        assert!(weight < 0, "cycle weight: {weight}");
    }

    #[test]
    fn test_three_edge_cycle() {
        let db = edge_db(&[("a", "b", 1), ("b", "c", 1), ("c", "a", -3)]);
        let g = &mut DlGraph::default();

        assert!(g.add_edge(eid(0), &db).is_empty());
        assert!(g.add_edge(eid(1), &db).is_empty());
        let cycle = g.add_edge(eid(2), &db).to_vec();

        assert_eq!(cycle.len(), 3);
        assert_negative_cycle(&cycle, &db);
        let weight: W = cycle.iter().map(|&e| db[e].weight).sum();
        assert_eq!(weight, -1);
        assert_quiescent(g);
    }

    #[test]
    fn test_tight_pair_forces_difference() {
        let db = edge_db(&[("x", "y", 5), ("y", "x", -5)]);
        let g = &mut DlGraph::default();

        assert!(g.add_edge(eid(0), &db).is_empty());
        assert!(g.add_edge(eid(1), &db).is_empty());

        let x = db[eid(0)].source;
        let y = db[eid(0)].target;
        let vx = g.value(x).unwrap();
        let vy = g.value(y).unwrap();
        // both inequalities together force the difference to exactly 5
        assert_eq!(vy - vx, 5);
        assert_quiescent(g);
        assert_feasible(g, &db, &[eid(0), eid(1)]);
    }

    #[test]
    fn test_negative_self_loop() {
        let db = edge_db(&[("a", "a", -1)]);
        let g = &mut DlGraph::default();

        let cycle = g.add_edge(eid(0), &db).to_vec();
        assert_eq!(cycle, vec![eid(0)]);
        assert_negative_cycle(&cycle, &db);
        assert_quiescent(g);
        assert_adjacency(g, &db, &[]);
    }

    #[test]
    fn test_positive_self_loop_is_harmless() {
        let db = edge_db(&[("a", "a", 0), ("a", "b", 1)]);
        let g = &mut DlGraph::default();
        assert!(g.add_edge(eid(0), &db).is_empty());
        assert!(g.add_edge(eid(1), &db).is_empty());
        assert_quiescent(g);
        assert_adjacency(g, &db, &[eid(0), eid(1)]);
        assert_feasible(g, &db, &[eid(0), eid(1)]);
    }

    #[test]
    fn test_transitive_chain_with_shortcut() {
        let db = edge_db(&[("a", "b", 2), ("b", "c", 2), ("a", "c", 1)]);
        let g = &mut DlGraph::default();

        for i in 0..3 {
            assert!(g.add_edge(eid(i), &db).is_empty());
        }
        let a = db[eid(0)].source;
        let b = db[eid(0)].target;
        let c = db[eid(1)].target;
        let (va, vb, vc) = (g.value(a).unwrap(), g.value(b).unwrap(), g.value(c).unwrap());
        assert!(vc - va <= 1);
        assert!(vc - vb <= 2);
        assert!(vb - va <= 2);
        assert_quiescent(g);
    }

    #[test]
    fn test_reset_forgets_installed_edges() {
        let db = edge_db(&[("a", "b", 1), ("b", "a", -2)]);
        let g = &mut DlGraph::default();

        assert!(g.add_edge(eid(0), &db).is_empty());
        g.reset();
        // in a fresh lifetime the reversed edge closes no cycle
        assert!(g.add_edge(eid(1), &db).is_empty());
        assert_quiescent(g);
        assert_adjacency(g, &db, &[eid(1)]);

        let a = db[eid(0)].source;
        let b = db[eid(0)].target;
        assert!(g.value(a).unwrap() - g.value(b).unwrap() <= -2);
    }

    #[test]
    fn test_reset_clears_values() {
        let db = edge_db(&[("a", "b", 1)]);
        let g = &mut DlGraph::default();
        assert!(g.add_edge(eid(0), &db).is_empty());
        assert!(g.value_defined(db[eid(0)].source));
        assert!(g.value_defined(db[eid(0)].target));
        g.reset();
        assert!(!g.value_defined(db[eid(0)].source));
        assert!(!g.value_defined(db[eid(0)].target));
    }

    #[test]
    fn test_parallel_edges() {
        let db = edge_db(&[("a", "b", 3), ("a", "b", 1)]);
        let g = &mut DlGraph::default();

        assert!(g.add_edge(eid(0), &db).is_empty());
        assert!(g.add_edge(eid(1), &db).is_empty());
        let a = db[eid(0)].source;
        let b = db[eid(0)].target;
        assert!(g.value(b).unwrap() - g.value(a).unwrap() <= 1);
        assert_adjacency(g, &db, &[eid(0), eid(1)]);
        assert_quiescent(g);
    }

    #[test]
    fn test_first_negative_edge_between_distinct_nodes() {
        let db = edge_db(&[("a", "b", -4)]);
        let g = &mut DlGraph::default();
        assert!(g.add_edge(eid(0), &db).is_empty());
        let a = db[eid(0)].source;
        let b = db[eid(0)].target;
        assert!(g.value(b).unwrap() - g.value(a).unwrap() <= -4);
        assert_quiescent(g);
    }

    #[test]
    fn test_rejected_edge_leaves_graph_untouched() {
        let db = edge_db(&[("a", "b", 1), ("b", "c", 1), ("c", "d", 1), ("d", "a", -10)]);
        let g = &mut DlGraph::default();
        for i in 0..3 {
            assert!(g.add_edge(eid(i), &db).is_empty());
        }

        let snapshot: Vec<(Option<W>, Vec<EdgeId>)> = g
            .nodes
            .entries()
            .map(|(_, n)| (n.potential, n.outgoing.clone()))
            .collect();

        let cycle = g.add_edge(eid(3), &db).to_vec();
        assert_eq!(cycle.len(), 4);
        assert_negative_cycle(&cycle, &db);

        let after: Vec<(Option<W>, Vec<EdgeId>)> = g
            .nodes
            .entries()
            .map(|(_, n)| (n.potential, n.outgoing.clone()))
            .collect();
        assert_eq!(snapshot, after);
        assert_quiescent(g);
    }

    #[test]
    fn test_replay_reproduces_potentials() {
        let edges = [("a", "b", 2), ("b", "c", -1), ("c", "d", 0), ("a", "d", 1), ("d", "b", 1)];
        let db = edge_db(&edges);

        let first = &mut DlGraph::default();
        for i in 0..edges.len() as u32 {
            assert!(first.add_edge(eid(i), &db).is_empty());
        }
        let second = &mut DlGraph::default();
        for i in 0..edges.len() as u32 {
            assert!(second.add_edge(eid(i), &db).is_empty());
        }
        for node in db.nodes() {
            assert_eq!(first.value(node), second.value(node));
        }
    }

    /// Bellman-Ford feasibility oracle over a set of edges.
    fn feasible(db: &EdgeDb, active: &[EdgeId]) -> bool {
        let n = db.num_nodes();
        let mut dist = vec![0i64; n];
        for round in 0..=n {
            let mut updated = false;
            for &e in active {
                let edge = db[e];
                let (s, t) = (usize::from(edge.source), usize::from(edge.target));
                if dist[s] + (edge.weight as i64) < dist[t] {
                    dist[t] = dist[s] + edge.weight as i64;
                    updated = true;
                }
            }
            if !updated {
                return true;
            }
            if round == n {
                return false;
            }
        }
        unreachable!()
    }

    #[test]
    fn test_random_sequences_match_bellman_ford() {
        let names = ["a", "b", "c", "d", "e", "f"];
        let mut rng = SmallRng::seed_from_u64(0x5eed);
        for _ in 0..200 {
            let mut db = EdgeDb::default();
            let num_edges = rng.gen_range(1..15);
            for i in 0..num_edges {
                let source = names[rng.gen_range(0..names.len())];
                let target = names[rng.gen_range(0..names.len())];
                let weight = rng.gen_range(-4..5);
                db.register(source, target, weight, Lit::from(i + 1));
            }

            let g = &mut DlGraph::default();
            let mut active: Vec<EdgeId> = Vec::new();
            for i in 0..num_edges as u32 {
                let candidate = eid(i);
                let mut tentative = active.clone();
                tentative.push(candidate);
                let expect_feasible = feasible(&db, &tentative);

                let cycle = g.add_edge(candidate, &db).to_vec();
                if cycle.is_empty() {
                    assert!(expect_feasible, "accepted an infeasible edge set");
                    active.push(candidate);
                    assert_feasible(g, &db, &active);
                } else {
                    assert!(!expect_feasible, "rejected a feasible edge set");
                    assert_negative_cycle(&cycle, &db);
                    // the reported cycle must consist of active edges plus the
                    // candidate itself
                    for &e in &cycle {
                        assert!(e == candidate || active.contains(&e));
                    }
                    assert!(cycle.contains(&candidate));
                }
                assert_quiescent(g);
                assert_adjacency(g, &db, &active);
            }
        }
    }
}
