pub mod atoms;
pub mod edges;
pub mod graph;

use std::time::{Duration, Instant};

use crate::env_param::EnvParam;
use smallvec::SmallVec;
use tracing::{debug, trace};

use crate::core::{Lit, W};
use crate::stats::{Stats, ThreadStats, Timer};
use crate::theory::edges::{EdgeDb, EdgeId};
use crate::theory::graph::DlGraph;
use crate::{InitContext, PropagateContext, Propagator};

pub static DIFFLOG_STRICT: EnvParam<bool> = EnvParam::new("DIFFLOG_STRICT", "false");

/// Options of the difference-logic propagator.
///
/// The default value of all parameters can be set through environment
/// variables.
#[derive(Clone, Debug)]
pub struct DlConfig {
    /// Interpret guards strictly: an atom `&diff { a - b } < k` is translated
    /// as `a - b <= k - 1`, which is equivalent over the integers.
    pub strict: bool,
}

impl Default for DlConfig {
    fn default() -> Self {
        DlConfig {
            strict: DIFFLOG_STRICT.get(),
        }
    }
}

/// Propagation state owned by a single solver thread.
///
/// The host calls back sequentially within one thread, so no synchronization
/// is involved; distinct threads never share their state.
#[derive(Clone, Default)]
struct DlState {
    /// Edges of the asserted literals, in assertion order.
    trail: Vec<EdgeId>,
    /// Length of the trail prefix already handed to the graph.
    propagated: usize,
    graph: DlGraph,
    stats: ThreadStats,
}

/// The difference-logic theory propagator.
///
/// Holds the edge table shared by all solver threads and one [`DlState`] per
/// thread. The host drives it through the [`Propagator`] callbacks; on a
/// satisfying assignment, [`DlPropagator::assignment`] reads the integer
/// value of every node that took part in an active constraint.
pub struct DlPropagator {
    config: DlConfig,
    edges: EdgeDb,
    states: Vec<DlState>,
    init_time: Duration,
}

impl DlPropagator {
    pub fn new(config: DlConfig) -> Self {
        DlPropagator {
            config,
            edges: EdgeDb::default(),
            states: Vec::new(),
            init_time: Duration::ZERO,
        }
    }

    /// The edge table built during initialization.
    pub fn edges(&self) -> &EdgeDb {
        &self.edges
    }

    /// The values of all defined nodes of the given thread, as
    /// `(name, value)` pairs. Only meaningful on a satisfying assignment.
    pub fn assignment(&self, thread: usize) -> impl Iterator<Item = (&str, W)> + '_ {
        let state = &self.states[thread];
        self.edges
            .nodes()
            .filter_map(move |n| state.graph.value(n).map(|v| (self.edges.node_name(n), v)))
    }

    /// Snapshot of the propagator's timing statistics.
    pub fn stats(&self) -> Stats {
        Stats {
            init_time: self.init_time,
            threads: self.states.iter().map(|s| s.stats).collect(),
        }
    }
}

impl Default for DlPropagator {
    fn default() -> Self {
        Self::new(DlConfig::default())
    }
}

impl Propagator for DlPropagator {
    fn init(&mut self, init: &mut dyn InitContext) {
        let start = Instant::now();
        for atom in init.diff_atoms() {
            let lit = init.solver_literal(atom.lit);
            let mut weight = atom.guard.value();
            if self.config.strict {
                weight -= 1;
            }
            // the atom bounds `source - target`, while an edge bounds its
            // target relative to its source, so the endpoints swap here
            self.edges.register(&atom.target, &atom.source, weight, lit);
            init.add_watch(lit);
        }
        self.states = vec![DlState::default(); init.num_threads()];
        self.init_time = start.elapsed();
        debug!(
            "initialized: {} edges over {} nodes, {} threads",
            self.edges.num_edges(),
            self.edges.num_nodes(),
            self.states.len()
        );
    }

    fn propagate(&mut self, ctl: &mut dyn PropagateContext, changes: &[Lit]) -> bool {
        let state = &mut self.states[ctl.thread_id()];
        let _timer = Timer::new(&mut state.stats.propagate_time);

        for &lit in changes {
            state.trail.extend_from_slice(self.edges.edges_for(lit));
        }

        while state.propagated < state.trail.len() {
            let edge = state.trail[state.propagated];
            state.stats.propagations += 1;
            let cycle = state.graph.add_edge(edge, &self.edges);
            if !cycle.is_empty() {
                state.stats.conflicts += 1;
                let clause: SmallVec<[Lit; 8]> = cycle.iter().map(|&e| !self.edges[e].lit).collect();
                trace!("negative cycle of {} edges, clause {:?}", cycle.len(), clause);
                if !ctl.add_clause(&clause) || !ctl.propagate() {
                    return false;
                }
                unreachable!("a cycle clause conflicts with the current assignment and cannot be accepted");
            }
            state.propagated += 1;
        }

        true
    }

    fn undo(&mut self, thread: usize, changes: &[Lit]) {
        let state = &mut self.states[thread];
        let _timer = Timer::new(&mut state.stats.undo_time);

        let retracted: usize = changes.iter().map(|&lit| self.edges.edges_for(lit).len()).sum();
        assert!(
            retracted <= state.trail.len(),
            "host retracted more literals than were asserted"
        );
        state.trail.truncate(state.trail.len() - retracted);
        state.propagated = 0;
        state.graph.reset();
    }
}
