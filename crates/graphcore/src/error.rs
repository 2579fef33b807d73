use crate::{NodeId, PortId};
use thiserror::Error;

#[derive(Error, Debug)]
pub enum FlowError {
    #[error("Node error: {0}")]
    Node(#[from] NodeError),

    #[error("System error: {0}")]
    System(#[from] SystemError),

    #[error("Lowering error: {0}")]
    Lower(#[from] LowerError),

    #[error("Validation failed with {errors} error(s)")]
    Validation { errors: usize },

    #[error("Serialization error: {0}")]
    Serialization(#[from] serde_json::Error),
}

#[derive(Error, Debug, Clone, PartialEq)]
pub enum NodeError {
    #[error("Nothing connected to required input '{port}' of node {node}")]
    MissingConnection { node: NodeId, port: String },

    #[error("Output '{port}' of node {node} has no computed value")]
    ValueNotComputed { node: NodeId, port: String },

    #[error("Invalid input type for '{field}': expected {expected}, got {actual}")]
    InvalidInputType {
        field: String,
        expected: String,
        actual: String,
    },

    #[error("Execution failed: {0}")]
    ExecutionFailed(String),
}

#[derive(Error, Debug, Clone, PartialEq)]
pub enum SystemError {
    #[error("Cyclic dependency detected in system '{system}' between nodes {nodes:?}")]
    CyclicGraph { system: String, nodes: Vec<String> },

    #[error("Invariant violation: {0}")]
    InvariantViolation(String),

    #[error("Node not found: {0}")]
    NodeNotFound(NodeId),

    #[error("Port not found: {0}")]
    PortNotFound(PortId),

    #[error("Invalid connection: {0}")]
    InvalidConnection(String),

    #[error("Ports {output} and {input} do not belong to the same system")]
    CrossSystem { output: PortId, input: PortId },

    #[error("Relay chain starting at port {0} loops back on itself")]
    RelayLoop(PortId),
}

#[derive(Error, Debug, Clone, PartialEq)]
pub enum LowerError {
    #[error("Port '{port}' of node {node} is not wired to anything")]
    Unbound { node: NodeId, port: String },

    #[error("Unknown binding: {0}")]
    UnknownBinding(String),

    #[error("Type mismatch: {0}")]
    TypeMismatch(String),
}
