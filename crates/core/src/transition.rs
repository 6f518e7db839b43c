//! Reusable transition-table abstraction for status workflows.
//!
//! Both the production-case workflow and the purchase-order lifecycle are
//! validated against a static table of edges, so both entities get the same
//! legality guarantee from one piece of code.

use crate::error::DomainError;

/// A static, directed transition graph over a status type.
#[derive(Debug, Clone, Copy)]
pub struct TransitionTable<S: 'static> {
    edges: &'static [(S, &'static [S])],
}

impl<S> TransitionTable<S>
where
    S: Copy + Eq + core::fmt::Debug + 'static,
{
    pub const fn new(edges: &'static [(S, &'static [S])]) -> Self {
        Self { edges }
    }

    /// Legal destinations from `from`. Unknown states have no outgoing edges.
    pub fn targets(&self, from: S) -> &'static [S] {
        self.edges
            .iter()
            .find(|(s, _)| *s == from)
            .map(|(_, targets)| *targets)
            .unwrap_or(&[])
    }

    pub fn allows(&self, from: S, to: S) -> bool {
        self.targets(from).contains(&to)
    }

    /// Check an edge, producing the domain error the workflow engines surface.
    pub fn check(&self, from: S, to: S) -> Result<(), DomainError> {
        if self.allows(from, to) {
            Ok(())
        } else {
            Err(DomainError::invalid_transition(format!(
                "{from:?} -> {to:?} is not a legal transition"
            )))
        }
    }

    /// A state with no outgoing edges is terminal.
    pub fn is_terminal(&self, state: S) -> bool {
        self.targets(state).is_empty()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[derive(Debug, Copy, Clone, PartialEq, Eq)]
    enum Toy {
        A,
        B,
        C,
    }

    static TABLE: TransitionTable<Toy> =
        TransitionTable::new(&[(Toy::A, &[Toy::B]), (Toy::B, &[Toy::A, Toy::C])]);

    #[test]
    fn allows_listed_edges_only() {
        assert!(TABLE.allows(Toy::A, Toy::B));
        assert!(TABLE.allows(Toy::B, Toy::A));
        assert!(!TABLE.allows(Toy::A, Toy::C));
    }

    #[test]
    fn unknown_or_unlisted_states_are_terminal() {
        assert!(TABLE.is_terminal(Toy::C));
        assert!(!TABLE.is_terminal(Toy::A));
    }

    #[test]
    fn check_surfaces_invalid_transition() {
        let err = TABLE.check(Toy::A, Toy::C).unwrap_err();
        assert!(matches!(err, DomainError::InvalidTransition(_)));
    }
}
