//! Node Configuration Module
//!
//! Per-node configuration loaded from TOML files. Every threshold of the
//! decision core (hysteresis, tracking, risk, cascade, admission, alert
//! cooldown) is an operator-tunable value with a built-in default.
//!
//! ## Loading Order
//!
//! 1. `OCEANVIEWER_CONFIG` environment variable (path to TOML file)
//! 2. `node_config.toml` in the current working directory
//! 3. Built-in defaults
//!
//! Agents receive their section by value at construction; there is no
//! global config singleton.

mod node_config;
pub mod defaults;
pub mod validation;

pub use node_config::*;
