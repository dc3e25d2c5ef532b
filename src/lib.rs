//! Difference-logic theory propagation for ASP and SAT host solvers.
//!
//! The crate extends a Boolean host solver with constraints of the form
//! `a - b <= k` over integer-valued variables, written as grounded theory
//! atoms `&diff { a - b } <= k`. Each atom becomes an edge of a constraint
//! graph that is activated when the host asserts the atom's literal. The
//! propagator incrementally checks that the active edges admit an integer
//! solution and, when an edge closes a negative cycle, reports the cycle as a
//! conflict clause so the host can backtrack.
//!
//! The host drives the propagator through the [`Propagator`] callbacks,
//! providing its own [`InitContext`] and [`PropagateContext`]
//! implementations. The edge table built during initialization is read-only
//! afterwards and can be shared across solver threads; all mutable state is
//! kept per thread.

pub mod collections;
pub mod core;
mod env_param;
pub mod stats;
pub mod theory;

use crate::core::Lit;
use crate::theory::atoms::DiffAtom;

pub use crate::theory::{DlConfig, DlPropagator};

/// Host services available while a propagator initializes, once per solver
/// session after grounding.
pub trait InitContext {
    /// Number of solver threads that will drive the propagator.
    fn num_threads(&self) -> usize;

    /// The grounded `diff` atoms of the program.
    fn diff_atoms(&self) -> Vec<DiffAtom>;

    /// Maps an atom's literal into the solver's literal space.
    fn solver_literal(&mut self, atom_lit: Lit) -> Lit;

    /// Asks the host to deliver future assignments of `lit` through
    /// [`Propagator::propagate`].
    fn add_watch(&mut self, lit: Lit);
}

/// Host services available during a propagate callback.
pub trait PropagateContext {
    /// The solver thread this callback runs on.
    fn thread_id(&self) -> usize;

    /// Hands a clause to the host. Returns `false` if the solver entered a
    /// conflicting state and the callback must return.
    fn add_clause(&mut self, clause: &[Lit]) -> bool;

    /// Asks the host to propagate the consequences of the added clauses.
    /// Returns `false` if the callback must return.
    fn propagate(&mut self) -> bool;
}

/// The callbacks of a theory propagator, invoked by the host solver.
///
/// Within one thread the calls are strictly sequential; callbacks for
/// distinct threads may run in parallel on disjoint per-thread state.
pub trait Propagator {
    /// Called once per solver session, before any propagation.
    fn init(&mut self, init: &mut dyn InitContext);

    /// Notifies the propagator that the literals in `changes` became true on
    /// the calling thread. Returns `false` iff the host asked to stop.
    fn propagate(&mut self, ctl: &mut dyn PropagateContext, changes: &[Lit]) -> bool;

    /// Notifies the propagator that the literals in `changes` were retracted
    /// on backtracking. `changes` covers the most recently asserted literals
    /// first, matching the host's trail. Must not fail.
    fn undo(&mut self, thread: usize, changes: &[Lit]);
}
