use crate::core::{Lit, W};

/// Right-hand side of a `diff` atom guard, as it appears in the grounded
/// program: either a plain integer constant or one wrapped in a unary minus.
#[derive(Copy, Clone, Debug, PartialEq, Eq)]
pub enum GuardTerm {
    Number(W),
    Negated(W),
}

impl GuardTerm {
    /// The integer bound denoted by the guard.
    pub fn value(self) -> W {
        match self {
            GuardTerm::Number(k) => k,
            GuardTerm::Negated(k) => -k,
        }
    }
}

/// A grounded theory atom `&diff { a - b } <= k`, stating that
/// `a - b <= k` must hold whenever the atom's literal is true.
///
/// The host enumerates these during initialization; the propagator turns each
/// one into a single edge of the constraint graph.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct DiffAtom {
    pub source: String,
    pub target: String,
    pub guard: GuardTerm,
    /// The atom's controlling Boolean in the host's atom numbering. It still
    /// has to be mapped to a solver literal before watching it.
    pub lit: Lit,
}

impl DiffAtom {
    pub fn new(source: impl Into<String>, target: impl Into<String>, guard: GuardTerm, lit: Lit) -> DiffAtom {
        DiffAtom {
            source: source.into(),
            target: target.into(),
            guard,
            lit,
        }
    }
}
