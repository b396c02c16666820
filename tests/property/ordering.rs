// Copyright (c) 2025 - Cowboy AI, Inc.
//! Property-Based Tests for Dependency Ordering
//!
//! Random acyclic graphs are registered in a random order; the assembler
//! must always produce the registration-order-preferring topological order
//! and materialize in exactly that order.

use cim_deployment::{Assembler, DeploymentError, InMemoryProvisioner};
use proptest::prelude::*;

use crate::fixtures::{called, calls, call_log, Recorder, CallLog};

/// Graph over nodes 0..n where node i may only depend on nodes below i,
/// plus a registration order (a permutation of 0..n)
#[derive(Debug, Clone)]
struct Graph {
    deps: Vec<Vec<usize>>,
    registration: Vec<usize>,
}

impl Graph {
    fn name(node: usize) -> String {
        format!("c{}", node)
    }

    fn register(&self, log: &CallLog) -> Assembler {
        let mut assembler = Assembler::new();
        for &node in &self.registration {
            assembler
                .register(self.recorder(node, &self.deps[node], log))
                .unwrap();
        }
        assembler
    }

    fn recorder(&self, node: usize, deps: &[usize], log: &CallLog) -> Recorder {
        let names: Vec<String> = deps.iter().map(|&d| Self::name(d)).collect();
        let refs: Vec<&str> = names.iter().map(String::as_str).collect();
        Recorder::new(&Self::name(node), &refs, log)
    }

    /// Reference order: repeatedly take the earliest-registered ready node
    fn expected_order(&self) -> Vec<String> {
        let mut placed = vec![false; self.deps.len()];
        let mut order = Vec::new();

        while order.len() < self.deps.len() {
            let next = self
                .registration
                .iter()
                .copied()
                .find(|&n| !placed[n] && self.deps[n].iter().all(|&d| placed[d]))
                .unwrap();
            placed[next] = true;
            order.push(Self::name(next));
        }
        order
    }
}

fn graph() -> impl Strategy<Value = Graph> {
    (1usize..10)
        .prop_flat_map(|n| {
            let masks: Vec<_> = (0..n)
                .map(|i| prop::collection::vec(any::<bool>(), i))
                .collect();
            let registration = Just((0..n).collect::<Vec<usize>>()).prop_shuffle();
            (masks, registration)
        })
        .prop_map(|(masks, registration)| Graph {
            deps: masks
                .iter()
                .map(|mask| {
                    mask.iter()
                        .enumerate()
                        .filter(|&(_, &on)| on)
                        .map(|(j, _)| j)
                        .collect()
                })
                .collect(),
            registration,
        })
}

proptest! {
    #[test]
    fn prop_order_matches_reference(g in graph()) {
        let assembler = g.register(&call_log());
        let order: Vec<String> = assembler
            .materialization_order()
            .unwrap()
            .iter()
            .map(ToString::to_string)
            .collect();

        prop_assert_eq!(order, g.expected_order());
    }

    #[test]
    fn prop_materialization_follows_order(g in graph()) {
        let log = call_log();
        let mut assembler = g.register(&log);
        let order: Vec<String> = assembler
            .materialization_order()
            .unwrap()
            .iter()
            .map(ToString::to_string)
            .collect();

        tokio_test::block_on(assembler.materialize_all(&InMemoryProvisioner::new())).unwrap();

        prop_assert_eq!(called(&log), order);
        for call in calls(&log) {
            let node: usize = call.component[1..].parse().unwrap();
            let mut expected: Vec<String> = g.deps[node].iter().map(|&d| Graph::name(d)).collect();
            expected.sort();
            prop_assert_eq!(call.visible, expected);
        }
    }

    #[test]
    fn prop_back_edge_is_a_cycle(g in graph()) {
        let edge = g
            .deps
            .iter()
            .enumerate()
            .find_map(|(node, deps)| deps.first().map(|&d| (node, d)));
        prop_assume!(edge.is_some());
        let (node, dep) = edge.unwrap();

        // make `dep` depend back on `node`
        let mut cyclic = g.clone();
        cyclic.deps[dep].push(node);

        let log = call_log();
        let mut assembler = cyclic.register(&log);
        let result = tokio_test::block_on(assembler.materialize_all(&InMemoryProvisioner::new()));

        match result {
            Err(DeploymentError::CyclicDependency(members)) => {
                prop_assert!(members.contains(&Graph::name(node)));
                prop_assert!(members.contains(&Graph::name(dep)));
            }
            other => prop_assert!(false, "expected CyclicDependency, got {:?}", other.map(|r| r.materialized)),
        }
        prop_assert!(called(&log).is_empty());
    }
}
