//! The fault cell: single-assignment record of how a producer ended.

use std::sync::{Arc, OnceLock};

/// How a producer routine ended.
#[derive(Debug, Clone)]
pub enum ProducerOutcome {
    Completed,
    /// Stopped because the composite cancellation fired. Not a fault.
    Cancelled,
    Failed(Arc<anyhow::Error>),
}

impl ProducerOutcome {
    pub fn failed(err: anyhow::Error) -> Self {
        Self::Failed(Arc::new(err))
    }

    #[must_use]
    pub fn kind(&self) -> &'static str {
        match self {
            Self::Completed => "completed",
            Self::Cancelled => "cancelled",
            Self::Failed(_) => "failed",
        }
    }
}

/// What the consumer sees when it reads the cell.
#[derive(Debug, Clone)]
pub enum FaultState {
    /// The producer is still running.
    Unset,
    /// The producer finished without error (completed or cancelled).
    Empty,
    Faulted(Arc<anyhow::Error>),
}

/// Written once by the producer task, read without blocking by the consumer.
#[derive(Debug, Default)]
pub struct FaultCell {
    slot: OnceLock<ProducerOutcome>,
}

impl FaultCell {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Record the outcome. Returns `false`, leaving the cell untouched, if an
    /// outcome was already recorded.
    pub fn set(&self, outcome: ProducerOutcome) -> bool {
        self.slot.set(outcome).is_ok()
    }

    #[must_use]
    pub fn state(&self) -> FaultState {
        match self.slot.get() {
            None => FaultState::Unset,
            Some(ProducerOutcome::Completed | ProducerOutcome::Cancelled) => FaultState::Empty,
            Some(ProducerOutcome::Failed(err)) => FaultState::Faulted(Arc::clone(err)),
        }
    }

    #[must_use]
    pub fn outcome(&self) -> Option<&ProducerOutcome> {
        self.slot.get()
    }

    #[must_use]
    pub fn is_set(&self) -> bool {
        self.slot.get().is_some()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use anyhow::anyhow;

    #[test]
    fn first_outcome_wins() {
        let cell = FaultCell::new();
        assert!(matches!(cell.state(), FaultState::Unset));
        assert!(cell.set(ProducerOutcome::failed(anyhow!("first"))));
        assert!(!cell.set(ProducerOutcome::Completed));
        match cell.state() {
            FaultState::Faulted(err) => assert_eq!(err.to_string(), "first"),
            other => panic!("expected fault, got {other:?}"),
        }
    }

    #[test]
    fn cancellation_is_not_a_fault() {
        let cell = FaultCell::new();
        cell.set(ProducerOutcome::Cancelled);
        assert!(cell.is_set());
        assert!(matches!(cell.state(), FaultState::Empty));
        assert_eq!(cell.outcome().map(ProducerOutcome::kind), Some("cancelled"));
    }
}
