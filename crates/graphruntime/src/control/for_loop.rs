use super::relay::{Accumulator, AccumulatorPorts, IterationRelay, Relay, RelayPorts};
use crate::System;
use graphcore::lower::{Block, Expr, Stmt};
use graphcore::{
    Arity, ConnectResult, FlowError, Node, NodeBase, NodeError, NodeId, PortId, Requiredness,
    Signature, SystemError, TypeRegistry, ValidationReport, Value, Wiring,
};
use std::collections::BTreeMap;

/// Iteration composite: runs its body system once per element of a list
///
/// Values enter the body through named passthrough inputs and leave it
/// either through passthrough outputs, which keep whatever the last pass
/// computed, or through accumulators, which collect one value per pass.
pub struct For {
    base: NodeBase,
    iterator: PortId,
    iteration: PortId,
    iteration_node: NodeId,
    inputs: BTreeMap<String, RelayPorts>,
    outputs: BTreeMap<String, RelayPorts>,
    accumulators: BTreeMap<String, AccumulatorPorts>,
    body: System,
}

impl For {
    pub fn new(wiring: &mut Wiring) -> Result<Self, SystemError> {
        let base = NodeBase::new(wiring, "For");
        let iterator = wiring.add_input(
            base.id(),
            "iterator",
            Signature::list_of(Signature::Any),
            Arity::Single,
            Requiredness::Required,
        );

        let mut body = System::new("for_body");
        let iteration = IterationRelay::new(wiring);
        let iteration_port = iteration.output();
        let iteration_node = body.add(wiring, iteration)?;

        Ok(Self {
            base,
            iterator,
            iteration: iteration_port,
            iteration_node,
            inputs: BTreeMap::new(),
            outputs: BTreeMap::new(),
            accumulators: BTreeMap::new(),
            body,
        })
    }

    /// Input receiving the list to iterate over
    pub fn iterator(&self) -> PortId {
        self.iterator
    }

    /// Output inside the body holding the current element
    pub fn iteration(&self) -> PortId {
        self.iteration
    }

    pub fn body(&self) -> &System {
        &self.body
    }

    pub fn body_mut(&mut self) -> &mut System {
        &mut self.body
    }

    pub fn input(&self, name: &str) -> Option<RelayPorts> {
        self.inputs.get(name).copied()
    }

    pub fn output(&self, name: &str) -> Option<RelayPorts> {
        self.outputs.get(name).copied()
    }

    pub fn accumulator(&self, name: &str) -> Option<AccumulatorPorts> {
        self.accumulators.get(name).copied()
    }

    pub fn add_input(&mut self, wiring: &mut Wiring, name: &str) -> Result<RelayPorts, SystemError> {
        if self.inputs.contains_key(name) {
            return Err(self.duplicate("input", name));
        }
        let relay = Relay::new(wiring, name, Requiredness::Required);
        let ports = relay.ports();
        self.body.add(wiring, relay)?;
        self.inputs.insert(name.to_string(), ports);
        Ok(ports)
    }

    pub fn remove_input(&mut self, wiring: &mut Wiring, name: &str) -> Result<(), SystemError> {
        let ports = self.inputs.remove(name).ok_or_else(|| self.absent("input", name))?;
        self.discard(wiring, ports.node)
    }

    pub fn add_output(&mut self, wiring: &mut Wiring, name: &str) -> Result<RelayPorts, SystemError> {
        if self.outputs.contains_key(name) || self.accumulators.contains_key(name) {
            return Err(self.duplicate("output", name));
        }
        let relay = Relay::new(wiring, name, Requiredness::Required);
        let ports = relay.ports();
        self.body.add(wiring, relay)?;
        self.outputs.insert(name.to_string(), ports);
        Ok(ports)
    }

    pub fn remove_output(&mut self, wiring: &mut Wiring, name: &str) -> Result<(), SystemError> {
        let ports = self.outputs.remove(name).ok_or_else(|| self.absent("output", name))?;
        self.discard(wiring, ports.node)
    }

    pub fn add_accumulator(
        &mut self,
        wiring: &mut Wiring,
        name: &str,
    ) -> Result<AccumulatorPorts, SystemError> {
        if self.outputs.contains_key(name) || self.accumulators.contains_key(name) {
            return Err(self.duplicate("accumulator", name));
        }
        let accumulator = Accumulator::new(wiring, name);
        let ports = accumulator.ports();
        self.body.add(wiring, accumulator)?;
        self.accumulators.insert(name.to_string(), ports);
        Ok(ports)
    }

    pub fn remove_accumulator(&mut self, wiring: &mut Wiring, name: &str) -> Result<(), SystemError> {
        let ports = self
            .accumulators
            .remove(name)
            .ok_or_else(|| self.absent("accumulator", name))?;
        self.discard(wiring, ports.node)
    }

    /// Feed a passthrough input from an output in the enclosing system
    pub fn bind_input(
        &self,
        wiring: &mut Wiring,
        name: &str,
        source: PortId,
    ) -> Result<ConnectResult, FlowError> {
        let ports = self.input(name).ok_or_else(|| self.absent("input", name))?;
        wiring.connect_across(source, ports.input)
    }

    /// Feed an input in the enclosing system from a passthrough output or accumulator
    pub fn bind_output(
        &self,
        wiring: &mut Wiring,
        name: &str,
        target: PortId,
    ) -> Result<ConnectResult, FlowError> {
        let output = match (self.outputs.get(name), self.accumulators.get(name)) {
            (Some(relay), _) => relay.output,
            (None, Some(acc)) => acc.output,
            (None, None) => return Err(self.absent("output", name).into()),
        };
        wiring.connect_across(output, target)
    }

    /// Swap in a new body, carrying every bridge node over; returns the old body
    pub fn set_body(&mut self, wiring: &mut Wiring, mut body: System) -> Result<System, SystemError> {
        for id in self.bridge_nodes() {
            let node = self.body.remove(wiring, id)?;
            body.add_boxed(wiring, node)?;
        }
        Ok(std::mem::replace(&mut self.body, body))
    }

    /// Validate every node of the body, bridge nodes included
    pub fn validate_body(&self, wiring: &Wiring, types: &TypeRegistry) -> ValidationReport {
        self.body.validate(wiring, types)
    }

    fn bridge_nodes(&self) -> Vec<NodeId> {
        std::iter::once(self.iteration_node)
            .chain(self.inputs.values().map(|p| p.node))
            .chain(self.outputs.values().map(|p| p.node))
            .chain(self.accumulators.values().map(|p| p.node))
            .collect()
    }

    fn discard(&mut self, wiring: &mut Wiring, node: NodeId) -> Result<(), SystemError> {
        self.body.remove(wiring, node)?;
        wiring.discard_node(node)
    }

    fn duplicate(&self, kind: &str, name: &str) -> SystemError {
        SystemError::InvariantViolation(format!(
            "cannot add {kind} '{name}' to {} '{}': the name is already taken",
            self.node_type(),
            self.name()
        ))
    }

    fn absent(&self, kind: &str, name: &str) -> SystemError {
        SystemError::InvariantViolation(format!(
            "{} '{}' has no {kind} named '{name}'",
            self.node_type(),
            self.name()
        ))
    }
}

impl Node for For {
    fn base(&self) -> &NodeBase {
        &self.base
    }

    fn base_mut(&mut self) -> &mut NodeBase {
        &mut self.base
    }

    fn node_type(&self) -> &str {
        "control.for"
    }

    fn inputs(&self) -> Vec<PortId> {
        std::iter::once(self.iterator)
            .chain(self.inputs.values().map(|p| p.input))
            .collect()
    }

    fn outputs(&self) -> Vec<PortId> {
        self.outputs
            .values()
            .map(|p| p.output)
            .chain(self.accumulators.values().map(|p| p.output))
            .collect()
    }

    fn run(&mut self, wiring: &mut Wiring) -> Result<(), FlowError> {
        let items = match wiring.value(self.iterator)? {
            Value::List(items) => items,
            other => {
                return Err(NodeError::InvalidInputType {
                    field: "iterator".to_string(),
                    expected: "list".to_string(),
                    actual: other.signature().to_string(),
                }
                .into())
            }
        };

        // Nothing from an earlier run may leak through a zero-pass loop.
        self.body.clear_values(wiring)?;

        let passthrough_in: Vec<NodeId> = self.inputs.values().map(|p| p.node).collect();
        self.body.run_nodes(wiring, &passthrough_in)?;

        for acc in self.accumulators.values() {
            wiring.set_value(acc.output, Value::List(Vec::new()))?;
        }

        tracing::debug!(node = %self.name(), iterations = items.len(), "starting loop");
        for (index, item) in items.into_iter().enumerate() {
            tracing::trace!(node = %self.name(), index, "loop pass");
            wiring.set_value(self.iteration, item)?;
            self.body.run(wiring)?;
        }

        let passthrough_out: Vec<NodeId> = self.outputs.values().map(|p| p.node).collect();
        self.body.run_nodes(wiring, &passthrough_out)?;
        Ok(())
    }

    fn validate(&self, wiring: &Wiring, types: &TypeRegistry) -> ValidationReport {
        let relays = self
            .inputs
            .values()
            .chain(self.outputs.values())
            .flat_map(|p| [p.input, p.output]);
        let accumulators = self.accumulators.values().flat_map(|p| [p.input, p.output]);
        wiring.validate_ports(
            std::iter::once(self.iterator).chain(relays).chain(accumulators),
            types,
        )
    }

    fn lower(&self, wiring: &Wiring) -> Result<Block, FlowError> {
        let mut block = Block::new();
        for acc in self.accumulators.values() {
            block.push(Stmt::assign(
                wiring.reference(acc.output)?,
                Expr::List { items: Vec::new() },
            ));
        }
        block.push(Stmt::For {
            target: wiring.reference(self.iteration)?,
            iter: wiring.read_expr(self.iterator)?,
            body: self.body.lower(wiring)?,
        });
        Ok(block)
    }

    fn check_structure(&self, wiring: &Wiring) -> Result<(), FlowError> {
        self.body.check_structure(wiring)
    }

    fn clear_values(&self, wiring: &mut Wiring) -> Result<(), FlowError> {
        self.body.clear_values(wiring)
    }
}
