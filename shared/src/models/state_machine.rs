//! Table-driven status transitions
//!
//! Each entity declares its allowed transitions as a static table of
//! `(from, to, gate)` rows. A transition absent from the table is rejected
//! before any gate is evaluated.

use crate::error::{DomainError, GateFailure};

/// Status enums usable in a transition table
pub trait Status: Copy + PartialEq + std::fmt::Debug {
    /// Entity label used in error messages
    const ENTITY: &'static str;

    fn as_str(&self) -> &'static str;

    fn is_terminal(&self) -> bool;
}

/// One row of a transition table
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Transition<S, G> {
    pub from: S,
    pub to: S,
    pub gate: G,
}

impl<S, G> Transition<S, G> {
    pub const fn new(from: S, to: S, gate: G) -> Self {
        Self { from, to, gate }
    }
}

/// Look up the row for `from -> to`, rejecting unknown transitions
pub fn find_transition<S: Status, G: Copy>(
    table: &[Transition<S, G>],
    from: S,
    to: S,
) -> Result<Transition<S, G>, DomainError> {
    table
        .iter()
        .copied()
        .find(|t| t.from == from && t.to == to)
        .ok_or_else(|| {
            GateFailure::InvalidTransition {
                entity: S::ENTITY.to_string(),
                from: from.as_str().to_string(),
                to: to.as_str().to_string(),
            }
            .into()
        })
}

/// Targets reachable from `from` in one step
pub fn targets_from<S: Status, G: Copy>(table: &[Transition<S, G>], from: S) -> Vec<S> {
    table
        .iter()
        .filter(|t| t.from == from)
        .map(|t| t.to)
        .collect()
}
