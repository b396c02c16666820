// Copyright (c) 2025 - Cowboy AI, Inc.
//! Component Graph Assembler
//!
//! Owns the dependency graph, orders it, and materializes each component
//! once everything it depends on has produced outputs.
//!
//! # Pass Semantics
//!
//! ```text
//! register(..)*  →  validate graph  →  topological order  →  materialize in order
//!                      │                                        │
//!                      └─ UnknownDependency / CyclicDependency  └─ MaterializationFailure
//!                         (nothing materialized)                   (earlier components kept)
//! ```
//!
//! Graph errors are raised before the first provisioning call. A failing
//! component aborts the rest of the pass; components already materialized
//! stay materialized, since only the backend can tear resources down.
//!
//! Ties between components with no ordering constraint are broken by
//! registration order, so the same registrations always yield the same
//! sequence of provisioning calls.

use chrono::{DateTime, Utc};
use serde::Serialize;
use std::cmp::Reverse;
use std::collections::{BTreeMap, BinaryHeap, HashMap};
use std::sync::Arc;
use tracing::{error, info, info_span, Instrument};
use uuid::Uuid;

use crate::component::{
    Component, ComponentId, ComponentOutputs, ComponentStatus, DependencyOutputs,
};
use crate::errors::{DeploymentError, DeploymentResult};
use crate::provisioner::Provisioner;
use crate::state_machine::component_lifecycle::LifecycleEvent;
use crate::state_machine::{StateMachineWithHistory, Transition, TransitionError};

/// Lifecycle transition of a component
pub type ComponentTransition = Transition<ComponentStatus, LifecycleEvent>;

struct Entry {
    component: Box<dyn Component>,
    lifecycle: StateMachineWithHistory<ComponentStatus>,
    outputs: Option<Arc<ComponentOutputs>>,
}

impl Entry {
    fn status(&self) -> ComponentStatus {
        *self.lifecycle.current_state()
    }

    fn advance(&mut self, event: LifecycleEvent) -> DeploymentResult<()> {
        self.lifecycle.transition_with_history(event, Utc::now())?;
        Ok(())
    }
}

/// Summary of a completed pass
#[derive(Debug, Clone, Serialize)]
pub struct AssemblyReport {
    pub run_id: Uuid,
    pub started_at: DateTime<Utc>,
    pub finished_at: DateTime<Utc>,
    /// Components materialized by this pass, in order
    pub materialized: Vec<ComponentId>,
    pub outputs: BTreeMap<ComponentId, ComponentOutputs>,
}

/// Dependency-ordered component assembler
#[derive(Default)]
pub struct Assembler {
    entries: Vec<Entry>,
    index: HashMap<ComponentId, usize>,
}

impl Assembler {
    pub fn new() -> Self {
        Self::default()
    }

    /// Register a component
    ///
    /// Dependencies may be registered later; they are checked when the graph
    /// is validated.
    ///
    /// # Errors
    /// - [`DeploymentError::DuplicateComponent`] if the id is taken
    pub fn register<C>(&mut self, component: C) -> DeploymentResult<()>
    where
        C: Component + 'static,
    {
        self.register_boxed(Box::new(component))
    }

    /// Register an already boxed component
    pub fn register_boxed(&mut self, component: Box<dyn Component>) -> DeploymentResult<()> {
        let id = component.id().clone();
        if self.index.contains_key(&id) {
            return Err(DeploymentError::DuplicateComponent(id.to_string()));
        }

        self.index.insert(id, self.entries.len());
        self.entries.push(Entry {
            component,
            lifecycle: StateMachineWithHistory::new(ComponentStatus::Pending),
            outputs: None,
        });
        Ok(())
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    /// Registered ids, in registration order
    pub fn component_ids(&self) -> Vec<ComponentId> {
        self.entries
            .iter()
            .map(|e| e.component.id().clone())
            .collect()
    }

    pub fn status(&self, id: &ComponentId) -> Option<ComponentStatus> {
        self.entry(id).map(Entry::status)
    }

    /// Outputs of `id`, only once it is materialized
    pub fn outputs(&self, id: &ComponentId) -> Option<&ComponentOutputs> {
        self.entry(id)
            .filter(|e| e.status() == ComponentStatus::Materialized)
            .and_then(|e| e.outputs.as_deref())
    }

    /// Timestamped lifecycle transitions of `id`
    pub fn history(&self, id: &ComponentId) -> Option<&[ComponentTransition]> {
        self.entry(id).map(|e| e.lifecycle.history())
    }

    fn entry(&self, id: &ComponentId) -> Option<&Entry> {
        self.index.get(id).map(|&idx| &self.entries[idx])
    }

    /// Validated materialization order
    ///
    /// Uses Kahn's algorithm with a min-heap on registration index, so
    /// ready components are always taken in registration order.
    ///
    /// # Errors
    /// - [`DeploymentError::UnknownDependency`] for an unregistered dependency
    /// - [`DeploymentError::CyclicDependency`] listing the components on or
    ///   behind a cycle, in registration order
    pub fn materialization_order(&self) -> DeploymentResult<Vec<ComponentId>> {
        let count = self.entries.len();
        let mut in_degree = vec![0usize; count];
        let mut dependents: Vec<Vec<usize>> = vec![Vec::new(); count];

        for (idx, entry) in self.entries.iter().enumerate() {
            let mut deps = entry.component.dependencies().to_vec();
            deps.sort();
            deps.dedup();

            for dependency in &deps {
                let dep_idx = *self.index.get(dependency).ok_or_else(|| {
                    DeploymentError::UnknownDependency {
                        component: entry.component.id().to_string(),
                        dependency: dependency.to_string(),
                    }
                })?;
                dependents[dep_idx].push(idx);
                in_degree[idx] += 1;
            }
        }

        let mut ready: BinaryHeap<Reverse<usize>> = in_degree
            .iter()
            .enumerate()
            .filter(|&(_, &degree)| degree == 0)
            .map(|(idx, _)| Reverse(idx))
            .collect();

        let mut order = Vec::with_capacity(count);
        while let Some(Reverse(idx)) = ready.pop() {
            order.push(idx);
            for &dependent in &dependents[idx] {
                in_degree[dependent] -= 1;
                if in_degree[dependent] == 0 {
                    ready.push(Reverse(dependent));
                }
            }
        }

        if order.len() < count {
            let blocked = in_degree
                .iter()
                .enumerate()
                .filter(|&(_, &degree)| degree > 0)
                .map(|(idx, _)| self.entries[idx].component.id().to_string())
                .collect();
            return Err(DeploymentError::CyclicDependency(blocked));
        }

        Ok(order
            .into_iter()
            .map(|idx| self.entries[idx].component.id().clone())
            .collect())
    }

    /// Materialize every pending component in dependency order
    ///
    /// Components already materialized by an earlier pass are skipped.
    pub async fn materialize_all(
        &mut self,
        provisioner: &dyn Provisioner,
    ) -> DeploymentResult<AssemblyReport> {
        let order = self.materialization_order()?;
        let run_id = Uuid::now_v7();
        let started_at = Utc::now();

        let span = info_span!("assembly", %run_id);
        let materialized = self
            .run_pass(&order, provisioner)
            .instrument(span)
            .await?;

        let outputs = order
            .iter()
            .filter_map(|id| self.outputs(id).map(|o| (id.clone(), o.clone())))
            .collect();

        Ok(AssemblyReport {
            run_id,
            started_at,
            finished_at: Utc::now(),
            materialized,
            outputs,
        })
    }

    async fn run_pass(
        &mut self,
        order: &[ComponentId],
        provisioner: &dyn Provisioner,
    ) -> DeploymentResult<Vec<ComponentId>> {
        info!("Materializing {} components", order.len());
        let mut materialized = Vec::new();

        for id in order {
            let idx = self.index[id];
            if self.entries[idx].status() == ComponentStatus::Materialized {
                info!("Skipping {} (already materialized)", id);
                continue;
            }

            let inputs = self.dependency_outputs(idx)?;
            self.entries[idx].advance(LifecycleEvent::Begin)?;
            info!(component = %id, "Materializing component");

            let result = self.entries[idx]
                .component
                .materialize(&inputs, provisioner)
                .await;

            match result {
                Ok(outputs) => {
                    let entry = &mut self.entries[idx];
                    entry.outputs = Some(Arc::new(outputs));
                    entry.advance(LifecycleEvent::Complete)?;
                    info!(component = %id, "Component materialized");
                    materialized.push(id.clone());
                }
                Err(source) => {
                    self.entries[idx].advance(LifecycleEvent::Fail)?;
                    error!(component = %id, "Materialization failed: {}", source);
                    return Err(DeploymentError::MaterializationFailure {
                        component: id.to_string(),
                        source: Box::new(source),
                    });
                }
            }
        }

        Ok(materialized)
    }

    /// Outputs of the declared dependencies of entry `idx`
    fn dependency_outputs(&self, idx: usize) -> DeploymentResult<DependencyOutputs> {
        let entry = &self.entries[idx];
        let consumer = entry.component.id().clone();
        let mut outputs = HashMap::new();

        for dependency in entry.component.dependencies() {
            let dep = self
                .entry(dependency)
                .ok_or_else(|| DeploymentError::UnknownDependency {
                    component: consumer.to_string(),
                    dependency: dependency.to_string(),
                })?;

            match (&dep.outputs, dep.status()) {
                (Some(dep_outputs), ComponentStatus::Materialized) => {
                    outputs.insert(dependency.clone(), Arc::clone(dep_outputs));
                }
                (_, status) => {
                    return Err(TransitionError::PreconditionFailed(format!(
                        "{} cannot start: dependency {} is {}",
                        consumer, dependency, status
                    ))
                    .into());
                }
            }
        }

        Ok(DependencyOutputs::new(consumer, outputs))
    }
}

impl std::fmt::Debug for Assembler {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_map()
            .entries(
                self.entries
                    .iter()
                    .map(|e| (e.component.id().to_string(), e.status())),
            )
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::component::OutputValue;
    use crate::provisioner::InMemoryProvisioner;
    use async_trait::async_trait;
    use std::sync::atomic::{AtomicUsize, Ordering};

    struct Fixed {
        id: ComponentId,
        deps: Vec<ComponentId>,
        calls: Arc<AtomicUsize>,
    }

    impl Fixed {
        fn new(id: &str, deps: &[&str], calls: &Arc<AtomicUsize>) -> Self {
            Self {
                id: id.into(),
                deps: deps.iter().map(|d| ComponentId::from(*d)).collect(),
                calls: Arc::clone(calls),
            }
        }
    }

    #[async_trait]
    impl Component for Fixed {
        fn id(&self) -> &ComponentId {
            &self.id
        }

        fn dependencies(&self) -> &[ComponentId] {
            &self.deps
        }

        async fn materialize(
            &self,
            _inputs: &DependencyOutputs,
            _provisioner: &dyn Provisioner,
        ) -> DeploymentResult<ComponentOutputs> {
            self.calls.fetch_add(1, Ordering::SeqCst);
            Ok(ComponentOutputs::new().with("name", OutputValue::Text(self.id.to_string())))
        }
    }

    fn ids(order: &[ComponentId]) -> Vec<&str> {
        order.iter().map(ComponentId::as_str).collect()
    }

    #[test]
    fn test_ties_follow_registration_order() {
        let calls = Arc::new(AtomicUsize::new(0));
        let mut assembler = Assembler::new();
        assembler.register(Fixed::new("c", &["a"], &calls)).unwrap();
        assembler.register(Fixed::new("b", &[], &calls)).unwrap();
        assembler.register(Fixed::new("a", &[], &calls)).unwrap();

        let order = assembler.materialization_order().unwrap();
        assert_eq!(ids(&order), vec!["b", "a", "c"]);
    }

    #[test]
    fn test_duplicate_registration() {
        let calls = Arc::new(AtomicUsize::new(0));
        let mut assembler = Assembler::new();
        assembler.register(Fixed::new("a", &[], &calls)).unwrap();
        assert!(matches!(
            assembler.register(Fixed::new("a", &[], &calls)),
            Err(DeploymentError::DuplicateComponent(_))
        ));
    }

    #[test]
    fn test_unknown_dependency() {
        let calls = Arc::new(AtomicUsize::new(0));
        let mut assembler = Assembler::new();
        assembler.register(Fixed::new("a", &["ghost"], &calls)).unwrap();

        match assembler.materialization_order() {
            Err(DeploymentError::UnknownDependency {
                component,
                dependency,
            }) => {
                assert_eq!(component, "a");
                assert_eq!(dependency, "ghost");
            }
            other => panic!("expected UnknownDependency, got {:?}", other),
        }
    }

    #[test]
    fn test_self_dependency_is_a_cycle() {
        let calls = Arc::new(AtomicUsize::new(0));
        let mut assembler = Assembler::new();
        assembler.register(Fixed::new("a", &["a"], &calls)).unwrap();
        assert!(matches!(
            assembler.materialization_order(),
            Err(DeploymentError::CyclicDependency(_))
        ));
    }

    #[test]
    fn test_repeated_dependency_counts_once() {
        let calls = Arc::new(AtomicUsize::new(0));
        let mut assembler = Assembler::new();
        assembler.register(Fixed::new("a", &[], &calls)).unwrap();
        assembler.register(Fixed::new("b", &["a", "a"], &calls)).unwrap();

        let order = assembler.materialization_order().unwrap();
        assert_eq!(ids(&order), vec!["a", "b"]);
    }

    #[tokio::test]
    async fn test_rerun_skips_materialized() {
        let calls = Arc::new(AtomicUsize::new(0));
        let mut assembler = Assembler::new();
        assembler.register(Fixed::new("a", &[], &calls)).unwrap();

        let provisioner = InMemoryProvisioner::new();
        let first = assembler.materialize_all(&provisioner).await.unwrap();
        let second = assembler.materialize_all(&provisioner).await.unwrap();

        assert_eq!(first.materialized.len(), 1);
        assert!(second.materialized.is_empty());
        assert_eq!(second.outputs.len(), 1);
        assert_eq!(calls.load(Ordering::SeqCst), 1);
    }

    #[tokio::test]
    async fn test_history_is_recorded() {
        let calls = Arc::new(AtomicUsize::new(0));
        let mut assembler = Assembler::new();
        assembler.register(Fixed::new("a", &[], &calls)).unwrap();
        assembler
            .materialize_all(&InMemoryProvisioner::new())
            .await
            .unwrap();

        let history = assembler.history(&"a".into()).unwrap();
        let states: Vec<ComponentStatus> = history.iter().map(|t| t.to).collect();
        assert_eq!(
            states,
            vec![ComponentStatus::Materializing, ComponentStatus::Materialized]
        );
    }
}
