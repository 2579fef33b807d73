//! Core abstractions for the dataflow graph engine
//!
//! This crate provides values, signatures, ports and the node contract that
//! every other component depends on, plus the lowering IR nodes emit.

mod error;
pub mod lower;
mod node;
mod port;
mod signature;
mod validation;
mod value;
mod wiring;

pub use error::{FlowError, LowerError, NodeError, SystemError};
pub use node::{Node, NodeBase};
pub use port::{Arity, ConnectResult, NodeId, Port, PortId, Requiredness, Role, SystemId};
pub use signature::{CompatibilityRule, Signature, TypeRegistry};
pub use validation::{Issue, IssueKind, Severity, ValidationReport};
pub use value::Value;
pub use wiring::Wiring;

/// Result type for flow operations
pub type Result<T> = std::result::Result<T, FlowError>;
