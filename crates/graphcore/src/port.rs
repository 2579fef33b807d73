use crate::{Signature, Value};
use serde::{Deserialize, Serialize};
use std::fmt;
use uuid::Uuid;

/// Stable node identity, assigned from a monotonic counter
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct NodeId(pub u64);

/// Stable port identity, assigned from a monotonic counter
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct PortId(pub u64);

pub type SystemId = Uuid;

impl fmt::Display for NodeId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "n{}", self.0)
    }
}

impl fmt::Display for PortId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "p{}", self.0)
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum Role {
    Input,
    Output,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum Arity {
    Single,
    Multi,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum Requiredness {
    Required,
    Optional,
}

/// Outcome of a successful connect
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ConnectResult {
    Connected,
    AlreadyConnected,
}

/// A typed connection endpoint owned by a node
///
/// Inputs keep references to upstream outputs; outputs keep references to
/// downstream inputs and, unless they are relays, the last value written.
/// A relay port carries the id of its partner on the same node.
#[derive(Debug, Clone)]
pub struct Port {
    pub(crate) id: PortId,
    pub(crate) node: NodeId,
    pub(crate) name: String,
    pub(crate) signature: Signature,
    pub(crate) role: Role,
    pub(crate) arity: Arity,
    pub(crate) requiredness: Requiredness,
    pub(crate) connections: Vec<PortId>,
    pub(crate) value: Option<Value>,
    pub(crate) relay: Option<PortId>,
}

impl Port {
    pub fn id(&self) -> PortId {
        self.id
    }

    pub fn node(&self) -> NodeId {
        self.node
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn signature(&self) -> &Signature {
        &self.signature
    }

    pub fn role(&self) -> Role {
        self.role
    }

    pub fn arity(&self) -> Arity {
        self.arity
    }

    pub fn requiredness(&self) -> Requiredness {
        self.requiredness
    }

    pub fn connections(&self) -> &[PortId] {
        &self.connections
    }

    pub fn is_relay(&self) -> bool {
        self.relay.is_some()
    }

    pub fn is_connected(&self) -> bool {
        !self.connections.is_empty()
    }

    /// Binding name used when lowering, derived from node and port identity
    pub(crate) fn own_reference(&self) -> String {
        let name: String = self
            .name
            .chars()
            .map(|c| if c.is_ascii_alphanumeric() { c } else { '_' })
            .collect();
        format!("{}_{}_{}", name, self.node, self.id)
    }
}

impl fmt::Display for Port {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}.{}[{}]", self.node, self.name, self.signature)
    }
}
