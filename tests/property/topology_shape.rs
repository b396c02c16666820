// Copyright (c) 2025 - Cowboy AI, Inc.
//! Property-Based Tests for Cluster Topology

use cim_deployment::cluster::CLUSTER_IPS_PLACEHOLDER;
use cim_deployment::{ClusterTopology, NodeRole};
use proptest::prelude::*;

/// Quoted tokens of `text`, in order of appearance
fn quoted_tokens(text: &str) -> Vec<String> {
    text.split('"').skip(1).step_by(2).map(str::to_string).collect()
}

fn resolved(size: usize) -> ClusterTopology {
    let mut topology = ClusterTopology::plan(size).unwrap();
    for ordinal in 1..=size {
        topology
            .assign_address(ordinal, format!("10.0.{}.{}", ordinal / 250, ordinal % 250 + 1))
            .unwrap();
    }
    topology
}

proptest! {
    #[test]
    fn prop_exactly_one_primary_last(size in 1usize..64) {
        let topology = ClusterTopology::plan(size).unwrap();
        let roles: Vec<NodeRole> = topology.nodes().iter().map(|n| n.role()).collect();

        prop_assert_eq!(roles.iter().filter(|r| **r == NodeRole::Primary).count(), 1);
        prop_assert_eq!(roles.last(), Some(&NodeRole::Primary));
        let ordinals: Vec<usize> = topology.nodes().iter().map(|n| n.ordinal()).collect();
        prop_assert_eq!(ordinals, (1..=size).collect::<Vec<_>>());
    }

    #[test]
    fn prop_descriptor_lists_every_node_once(size in 1usize..64, port in 1u16..=65535) {
        let topology = resolved(size);
        let descriptor = topology.connection_descriptor(port).unwrap();
        let entries: Vec<&str> = descriptor.split(',').collect();

        prop_assert_eq!(entries.len(), size);
        let suffix = format!(":{}", port);
        prop_assert!(entries.iter().all(|e| e.ends_with(&suffix)));
        let primary = topology.primary().unwrap().address().unwrap();
        prop_assert_eq!(*entries.last().unwrap(), format!("{}:{}", primary, port));
    }

    #[test]
    fn prop_bootstrap_lists_only_secondaries(size in 1usize..64) {
        let topology = resolved(size);
        let rendered = topology.render_primary_bootstrap(CLUSTER_IPS_PLACEHOLDER).unwrap();

        prop_assert_eq!(rendered.matches('"').count(), 2 * (size - 1));
        for node in topology.secondaries() {
            let quoted = format!("\"{}\"", node.address().unwrap());
            prop_assert!(rendered.contains(&quoted));
        }
        let primary = format!("\"{}\"", topology.primary().unwrap().address().unwrap());
        prop_assert!(!rendered.contains(&primary));
    }

    /// Reading the quoted addresses back yields the secondaries in order
    #[test]
    fn prop_bootstrap_addresses_read_back_in_order(
        size in 1usize..64,
        prefix in "[a-z]{0,8}",
        suffix in "[a-z;]{0,8}"
    ) {
        let topology = resolved(size);
        let template = format!("{}{}{}", prefix, CLUSTER_IPS_PLACEHOLDER, suffix);
        let rendered = topology.render_primary_bootstrap(&template).unwrap();

        let expected: Vec<String> = topology
            .secondaries()
            .map(|node| node.address().unwrap().to_string())
            .collect();
        prop_assert_eq!(quoted_tokens(&rendered), expected);
    }
}
