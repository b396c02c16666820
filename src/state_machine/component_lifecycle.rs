// Copyright (c) 2025 - Cowboy AI, Inc.
//! Component Lifecycle State Machine
//!
//! # States
//!
//! - Pending: Registered, not yet started
//! - Materializing: Provisioning calls in flight
//! - Materialized: Outputs published (terminal)
//! - Failed: Creation failed (terminal)
//!
//! # Inputs
//!
//! - Begin: Pending → Materializing
//! - Complete: Materializing → Materialized
//! - Fail: Materializing → Failed
//!
//! Whether every dependency is materialized is checked by the assembler
//! before it issues `Begin`.

use serde::Serialize;

use super::{StateMachine, TransitionError, TransitionResult};
use crate::component::ComponentStatus;

/// Lifecycle event (FSM input)
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum LifecycleEvent {
    /// Dependencies satisfied, start creating
    Begin,

    /// Outputs available
    Complete,

    /// Creation failed
    Fail,
}

impl StateMachine for ComponentStatus {
    type Input = LifecycleEvent;
    type Output = ();

    fn transition(&self, input: &Self::Input) -> TransitionResult<(Self, Self::Output)> {
        use ComponentStatus::*;
        use LifecycleEvent::*;

        match (self, input) {
            (Pending, Begin) => Ok((Materializing, ())),
            (Materializing, Complete) => Ok((Materialized, ())),
            (Materializing, Fail) => Ok((Failed, ())),

            (from, event) => Err(TransitionError::InvalidTransition {
                from: format!("{:?}", from),
                to: format!("{:?} (via {:?})", event.target(), event),
            }),
        }
    }

    fn valid_inputs(&self) -> Vec<Self::Input> {
        match self {
            ComponentStatus::Pending => vec![LifecycleEvent::Begin],
            ComponentStatus::Materializing => vec![LifecycleEvent::Complete, LifecycleEvent::Fail],
            ComponentStatus::Materialized | ComponentStatus::Failed => Vec::new(),
        }
    }
}

impl LifecycleEvent {
    /// State this event leads to when accepted
    pub fn target(&self) -> ComponentStatus {
        match self {
            LifecycleEvent::Begin => ComponentStatus::Materializing,
            LifecycleEvent::Complete => ComponentStatus::Materialized,
            LifecycleEvent::Fail => ComponentStatus::Failed,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use test_case::test_case;

    #[test_case(ComponentStatus::Pending, LifecycleEvent::Begin, ComponentStatus::Materializing ; "begin")]
    #[test_case(ComponentStatus::Materializing, LifecycleEvent::Complete, ComponentStatus::Materialized ; "complete")]
    #[test_case(ComponentStatus::Materializing, LifecycleEvent::Fail, ComponentStatus::Failed ; "fail")]
    fn test_valid_transitions(from: ComponentStatus, event: LifecycleEvent, expected: ComponentStatus) {
        let (to, _) = from.transition(&event).expect("transition should succeed");
        assert_eq!(to, expected);
        assert_eq!(event.target(), expected);
    }

    #[test_case(ComponentStatus::Pending, LifecycleEvent::Complete ; "complete before begin")]
    #[test_case(ComponentStatus::Pending, LifecycleEvent::Fail ; "fail before begin")]
    #[test_case(ComponentStatus::Materializing, LifecycleEvent::Begin ; "begin twice")]
    #[test_case(ComponentStatus::Materialized, LifecycleEvent::Begin ; "restart materialized")]
    #[test_case(ComponentStatus::Failed, LifecycleEvent::Begin ; "restart failed")]
    fn test_invalid_transitions(from: ComponentStatus, event: LifecycleEvent) {
        assert!(matches!(
            from.transition(&event),
            Err(TransitionError::InvalidTransition { .. })
        ));
    }

    #[test]
    fn test_terminal_states_have_no_inputs() {
        assert!(ComponentStatus::Materialized.valid_inputs().is_empty());
        assert!(ComponentStatus::Failed.valid_inputs().is_empty());
        assert_eq!(
            ComponentStatus::Materializing.valid_inputs(),
            vec![LifecycleEvent::Complete, LifecycleEvent::Fail]
        );
    }
}
