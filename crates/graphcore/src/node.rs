use crate::lower::Block;
use crate::{FlowError, NodeId, PortId, TypeRegistry, ValidationReport, Wiring};

/// Identity and display name shared by every node implementation
#[derive(Debug, Clone)]
pub struct NodeBase {
    id: NodeId,
    name: String,
}

impl NodeBase {
    /// Allocate a new identity in `wiring`
    pub fn new(wiring: &mut Wiring, name: impl Into<String>) -> Self {
        Self {
            id: wiring.create_node(),
            name: name.into(),
        }
    }

    pub fn id(&self) -> NodeId {
        self.id
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn set_name(&mut self, name: impl Into<String>) {
        self.name = name.into();
    }
}

/// Core trait that all nodes implement, leaf or composite
///
/// A node only ever touches other nodes through its ports; every lookup
/// across nodes is resolved by the [`Wiring`] or by the owning system.
pub trait Node {
    fn base(&self) -> &NodeBase;

    fn base_mut(&mut self) -> &mut NodeBase;

    /// Type identifier (e.g. "math.sum", "control.for")
    fn node_type(&self) -> &str;

    fn id(&self) -> NodeId {
        self.base().id()
    }

    fn name(&self) -> &str {
        self.base().name()
    }

    fn set_name(&mut self, name: String) {
        self.base_mut().set_name(name);
    }

    fn inputs(&self) -> Vec<PortId>;

    fn outputs(&self) -> Vec<PortId>;

    /// Forget every value this node has stored, including nested systems
    fn clear_values(&self, wiring: &mut Wiring) -> Result<(), FlowError> {
        for output in self.outputs() {
            if !wiring.port(output)?.is_relay() {
                wiring.clear_value(output)?;
            }
        }
        Ok(())
    }

    /// Read inputs and write every output exactly once
    fn run(&mut self, wiring: &mut Wiring) -> Result<(), FlowError>;

    /// Collect issues for this node's ports
    fn validate(&self, wiring: &Wiring, types: &TypeRegistry) -> ValidationReport {
        wiring.validate_ports(self.inputs().into_iter().chain(self.outputs()), types)
    }

    /// Statements equivalent to `run`; nodes that compute nothing emit none
    fn lower(&self, _wiring: &Wiring) -> Result<Block, FlowError> {
        Ok(Block::new())
    }

    /// Structural checks of anything the node owns, run before execution starts
    fn check_structure(&self, _wiring: &Wiring) -> Result<(), FlowError> {
        Ok(())
    }
}
