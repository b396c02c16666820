// Copyright (c) 2025 - Cowboy AI, Inc.
//! Property-Based Tests Module

mod ingress_expansion;
mod ordering;
mod topology_shape;
