//! Graph execution runtime
//!
//! This crate provides systems (scopes of nodes executed in dependency
//! order), the `For`/`If` composites that nest them, and the runtime
//! facade that validates, runs and lowers a root system.

pub mod control;
mod runtime;
mod system;

pub use control::{For, If};
pub use runtime::{ExecutionResult, FlowRuntime, RuntimeConfig};
pub use system::System;
