//! # hearth-compose
//!
//! Desired-state side of Hearth.
//!
//! Handles:
//! - **Catalog**: Loading and validation of the YAML service list.
//! - **Template**: Parsing of `${VAR:-default}` placeholders.
//! - **Env**: Layered key-value environments (defaults, machine overrides, process).
//! - **Resolver**: Expansion of placeholders into concrete descriptors.
//! - **Graph**: Dependency graph construction and deterministic topological ordering.

#![cfg_attr(test, allow(clippy::expect_used, clippy::unwrap_used))]

pub mod catalog;
pub mod env;
pub mod graph;
pub mod resolver;
pub mod template;
