// Copyright (c) 2025 - Cowboy AI, Inc.
//! Finite State Machine Abstractions
//!
//! Generic state machine types used to model component lifecycles. All
//! transitions are pure functions of `(state, input)`; recording history is
//! the only effect and it lives in [`StateMachineWithHistory`].
//!
//! # Mealy Machine
//!
//! ```text
//! (State, Input) → (State, Output)
//! ```
//!
//! # Example
//!
//! ```rust
//! use cim_deployment::state_machine::StateMachine;
//! use cim_deployment::state_machine::component_lifecycle::LifecycleEvent;
//! use cim_deployment::component::ComponentStatus;
//!
//! let (next, _) = ComponentStatus::Pending
//!     .transition(&LifecycleEvent::Begin)
//!     .unwrap();
//! assert_eq!(next, ComponentStatus::Materializing);
//! ```

pub mod component_lifecycle;

use chrono::{DateTime, Utc};
use serde::Serialize;

/// Result of a state transition
pub type TransitionResult<S> = Result<S, TransitionError>;

/// Errors that can occur during state transitions
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum TransitionError {
    /// Transition from current state to target state is not allowed
    #[error("Invalid transition from {from} to {to}")]
    InvalidTransition { from: String, to: String },

    /// Precondition not met for transition
    #[error("Precondition failed: {0}")]
    PreconditionFailed(String),
}

/// Trait for finite state machines
pub trait StateMachine: Sized + Clone {
    /// Input type that triggers transitions
    type Input;

    /// Output type produced by transitions (use () if none)
    type Output;

    /// Attempt to transition to a new state given an input
    ///
    /// # Returns
    /// - Ok((new_state, output)) if transition is valid
    /// - Err(TransitionError) if transition is invalid
    fn transition(&self, input: &Self::Input) -> TransitionResult<(Self, Self::Output)>;

    /// Check if a transition is valid without performing it
    fn can_transition(&self, input: &Self::Input) -> bool {
        self.transition(input).is_ok()
    }

    /// Get all valid inputs from current state (if enumerable)
    fn valid_inputs(&self) -> Vec<Self::Input>
    where
        Self::Input: Clone,
    {
        Vec::new()
    }
}

/// Transition metadata
///
/// Records information about a state transition for auditing.
#[derive(Debug, Clone, Serialize)]
pub struct Transition<S, I> {
    /// State before transition
    pub from: S,

    /// State after transition
    pub to: S,

    /// Input that triggered transition
    pub input: I,

    /// Timestamp of transition
    pub timestamp: DateTime<Utc>,
}

impl<S, I> Transition<S, I> {
    /// Create a new transition record
    pub fn new(from: S, to: S, input: I, timestamp: DateTime<Utc>) -> Self {
        Self {
            from,
            to,
            input,
            timestamp,
        }
    }
}

/// State machine with history
///
/// Wraps a state machine and tracks transition history.
#[derive(Debug, Clone)]
pub struct StateMachineWithHistory<FSM: StateMachine> {
    current: FSM,
    history: Vec<Transition<FSM, FSM::Input>>,
}

impl<FSM: StateMachine> StateMachineWithHistory<FSM> {
    /// Create a new state machine with history tracking
    pub fn new(initial: FSM) -> Self {
        Self {
            current: initial,
            history: Vec::new(),
        }
    }

    /// Transition with history recording
    ///
    /// The state is left untouched when the transition is rejected.
    pub fn transition_with_history(
        &mut self,
        input: FSM::Input,
        timestamp: DateTime<Utc>,
    ) -> TransitionResult<FSM::Output>
    where
        FSM::Input: Clone,
    {
        let from = self.current.clone();
        let (to, output) = self.current.transition(&input)?;

        self.history
            .push(Transition::new(from, to.clone(), input, timestamp));

        self.current = to;
        Ok(output)
    }

    /// Get transition history
    pub fn history(&self) -> &[Transition<FSM, FSM::Input>] {
        &self.history
    }

    /// Get current state
    pub fn current_state(&self) -> &FSM {
        &self.current
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[derive(Debug, Clone, PartialEq, Eq)]
    enum Switch {
        Off,
        On,
    }

    #[derive(Clone)]
    enum SwitchInput {
        Press,
        Break,
    }

    impl StateMachine for Switch {
        type Input = SwitchInput;
        type Output = ();

        fn transition(&self, input: &Self::Input) -> TransitionResult<(Self, Self::Output)> {
            match (self, input) {
                (Switch::Off, SwitchInput::Press) => Ok((Switch::On, ())),
                (Switch::On, SwitchInput::Press) => Ok((Switch::Off, ())),
                (_, SwitchInput::Break) => Err(TransitionError::PreconditionFailed(
                    "switch is sealed".to_string(),
                )),
            }
        }
    }

    #[test]
    fn test_history_records_transitions() {
        let mut fsm = StateMachineWithHistory::new(Switch::Off);

        fsm.transition_with_history(SwitchInput::Press, Utc::now())
            .unwrap();
        assert_eq!(*fsm.current_state(), Switch::On);
        assert_eq!(fsm.history().len(), 1);

        fsm.transition_with_history(SwitchInput::Press, Utc::now())
            .unwrap();
        assert_eq!(*fsm.current_state(), Switch::Off);
        assert_eq!(fsm.history().len(), 2);
    }

    #[test]
    fn test_rejected_transition_leaves_state() {
        let mut fsm = StateMachineWithHistory::new(Switch::On);

        assert!(fsm
            .transition_with_history(SwitchInput::Break, Utc::now())
            .is_err());
        assert_eq!(*fsm.current_state(), Switch::On);
        assert!(fsm.history().is_empty());
        assert!(!fsm.current_state().can_transition(&SwitchInput::Break));
    }
}
