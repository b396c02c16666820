// Copyright (c) 2025 - Cowboy AI, Inc.
//! Property-Based Tests for Ingress Expansion

use cim_deployment::domain::CidrBlock;
use cim_deployment::ingress::{self, IngressMatrix, PortSet, Protocol, RulePort, Scope};
use cim_deployment::DeploymentError;
use proptest::prelude::*;
use std::collections::BTreeSet;

fn protocol_sets() -> impl Strategy<Value = Vec<Protocol>> {
    prop::sample::subsequence(vec![Protocol::Tcp, Protocol::Udp], 1..=2)
}

fn port_sets() -> impl Strategy<Value = BTreeSet<u32>> {
    prop::collection::btree_set(1u32..=65535, 1..12)
}

fn matrix() -> IngressMatrix {
    IngressMatrix::new(
        CidrBlock::new("10.0.10.0/23").unwrap(),
        CidrBlock::new("203.0.113.7/32").unwrap(),
    )
}

proptest! {
    /// Distinct ports expand to exactly ports × protocols rules
    #[test]
    fn prop_rule_count(ports in port_sets(), protocols in protocol_sets()) {
        let list: Vec<u32> = ports.iter().copied().collect();
        let rules = ingress::build(&[matrix().internal(PortSet::List(list), &protocols)]).unwrap();

        prop_assert_eq!(rules.len(), ports.len() * protocols.len());
    }

    /// Expansion is port-major: every protocol of a port before the next port
    #[test]
    fn prop_expansion_order(ports in port_sets(), protocols in protocol_sets()) {
        let list: Vec<u32> = ports.iter().copied().collect();
        let rules = ingress::build(&[matrix().internal(PortSet::List(list.clone()), &protocols)]).unwrap();

        for (idx, rule) in rules.iter().enumerate() {
            let port = list[idx / protocols.len()];
            prop_assert_eq!(rule.port, RulePort::Single(cim_deployment::domain::Port::new(port).unwrap()));
            prop_assert_eq!(rule.protocol, protocols[idx % protocols.len()]);
        }
    }

    /// Scope always selects its own source range
    #[test]
    fn prop_scope_selects_range(
        internal in port_sets(),
        external in port_sets(),
        protocols in protocol_sets()
    ) {
        let m = matrix();
        let rules = m.build(&[
            m.internal(PortSet::List(internal.into_iter().collect()), &protocols),
            m.external(PortSet::List(external.into_iter().collect()), &protocols),
        ]).unwrap();

        for rule in rules {
            let expected = match rule.scope {
                Scope::Internal => m.internal_range(),
                Scope::External => m.external_range(),
            };
            prop_assert_eq!(rule.source_range, expected);
        }
    }

    /// Building the same specs twice yields no extra rules
    #[test]
    fn prop_duplicates_collapse(ports in port_sets(), protocols in protocol_sets()) {
        let spec = matrix().internal(PortSet::List(ports.iter().copied().collect()), &protocols);
        let once = ingress::build(&[spec.clone()]).unwrap();
        let twice = ingress::build(&[spec.clone(), spec]).unwrap();

        prop_assert_eq!(once, twice);
    }

    /// Any out-of-range port rejects the whole spec list
    #[test]
    fn prop_out_of_range_port_rejected(
        ports in port_sets(),
        bad in prop_oneof![Just(0u32), 65536u32..=200_000]
    ) {
        let mut list: Vec<u32> = ports.into_iter().collect();
        list.push(bad);
        let result = ingress::build(&[matrix().internal(PortSet::List(list), &[Protocol::Tcp])]);

        prop_assert!(matches!(result, Err(DeploymentError::InvalidRuleSpec(_))));
    }
}

#[test]
fn test_empty_protocols_rejected() {
    let result = ingress::build(&[matrix().internal(PortSet::list(&[80]), &[])]);
    assert!(matches!(result, Err(DeploymentError::InvalidRuleSpec(_))));
}
