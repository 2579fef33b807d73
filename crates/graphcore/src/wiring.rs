use crate::lower::{Block, Expr, Stmt};
use crate::{
    Arity, ConnectResult, FlowError, Issue, LowerError, NodeError, NodeId, Port, PortId,
    Requiredness, Role, Signature, SystemError, SystemId, TypeRegistry, ValidationReport, Value,
};
use std::collections::{HashMap, HashSet};

#[derive(Debug, Default)]
struct NodeEntry {
    system: Option<SystemId>,
    ports: Vec<PortId>,
}

/// Arena holding every port and the system membership of every node
///
/// Nodes refer to their ports by [`PortId`] only. Connections, relay
/// partners and cached output values all live here, so links never
/// outlive the ports they point at.
#[derive(Debug, Default)]
pub struct Wiring {
    next_node: u64,
    next_port: u64,
    nodes: HashMap<NodeId, NodeEntry>,
    ports: HashMap<PortId, Port>,
}

impl Wiring {
    pub fn new() -> Self {
        Self::default()
    }

    /// Allocate a fresh node identity
    pub fn create_node(&mut self) -> NodeId {
        let id = NodeId(self.next_node);
        self.next_node += 1;
        self.nodes.insert(id, NodeEntry::default());
        id
    }

    pub fn add_input(
        &mut self,
        node: NodeId,
        name: impl Into<String>,
        signature: Signature,
        arity: Arity,
        requiredness: Requiredness,
    ) -> PortId {
        self.insert_port(node, name.into(), signature, Role::Input, arity, requiredness)
    }

    pub fn add_output(&mut self, node: NodeId, name: impl Into<String>, signature: Signature) -> PortId {
        self.insert_port(
            node,
            name.into(),
            signature,
            Role::Output,
            Arity::Multi,
            Requiredness::Optional,
        )
    }

    /// Create a cross-linked relay pair on `node`: reading the returned
    /// output forwards to whatever the returned input is connected to.
    pub fn add_relay(
        &mut self,
        node: NodeId,
        name: impl Into<String>,
        signature: Signature,
        requiredness: Requiredness,
    ) -> (PortId, PortId) {
        let name = name.into();
        let input = self.insert_port(
            node,
            name.clone(),
            signature.clone(),
            Role::Input,
            Arity::Single,
            requiredness,
        );
        let output = self.insert_port(
            node,
            name,
            signature,
            Role::Output,
            Arity::Multi,
            Requiredness::Optional,
        );
        if let Some(p) = self.ports.get_mut(&input) {
            p.relay = Some(output);
        }
        if let Some(p) = self.ports.get_mut(&output) {
            p.relay = Some(input);
        }
        (input, output)
    }

    fn insert_port(
        &mut self,
        node: NodeId,
        name: String,
        signature: Signature,
        role: Role,
        arity: Arity,
        requiredness: Requiredness,
    ) -> PortId {
        let id = PortId(self.next_port);
        self.next_port += 1;
        self.ports.insert(
            id,
            Port {
                id,
                node,
                name,
                signature,
                role,
                arity,
                requiredness,
                connections: Vec::new(),
                value: None,
                relay: None,
            },
        );
        self.nodes.entry(node).or_default().ports.push(id);
        id
    }

    pub fn port(&self, id: PortId) -> Result<&Port, SystemError> {
        self.ports.get(&id).ok_or(SystemError::PortNotFound(id))
    }

    fn port_mut(&mut self, id: PortId) -> Result<&mut Port, SystemError> {
        self.ports.get_mut(&id).ok_or(SystemError::PortNotFound(id))
    }

    pub fn contains_node(&self, node: NodeId) -> bool {
        self.nodes.contains_key(&node)
    }

    pub fn node_ports(&self, node: NodeId) -> &[PortId] {
        self.nodes.get(&node).map(|n| n.ports.as_slice()).unwrap_or(&[])
    }

    /// System the node currently belongs to
    pub fn node_system(&self, node: NodeId) -> Option<SystemId> {
        self.nodes.get(&node).and_then(|n| n.system)
    }

    /// Record that `node` now resides in `system`
    pub fn attach(&mut self, node: NodeId, system: SystemId) -> Result<(), SystemError> {
        let entry = self.nodes.get_mut(&node).ok_or(SystemError::NodeNotFound(node))?;
        if let Some(current) = entry.system {
            return Err(SystemError::InvariantViolation(format!(
                "node {node} already belongs to system {current}"
            )));
        }
        entry.system = Some(system);
        Ok(())
    }

    pub fn detach(&mut self, node: NodeId, system: SystemId) -> Result<(), SystemError> {
        let entry = self.nodes.get_mut(&node).ok_or(SystemError::NodeNotFound(node))?;
        if entry.system != Some(system) {
            return Err(SystemError::InvariantViolation(format!(
                "node {node} does not belong to system {system}"
            )));
        }
        entry.system = None;
        Ok(())
    }

    /// Drop a detached node together with its ports, scrubbing every
    /// connection that pointed at them.
    pub fn discard_node(&mut self, node: NodeId) -> Result<(), SystemError> {
        match self.nodes.get(&node) {
            None => return Err(SystemError::NodeNotFound(node)),
            Some(entry) if entry.system.is_some() => {
                return Err(SystemError::InvariantViolation(format!(
                    "node {node} must be removed from its system before it is discarded"
                )))
            }
            Some(_) => {}
        }

        let entry = self.nodes.remove(&node).unwrap_or_default();
        let dead: HashSet<PortId> = entry.ports.iter().copied().collect();
        for id in &entry.ports {
            self.ports.remove(id);
        }
        for port in self.ports.values_mut() {
            port.connections.retain(|c| !dead.contains(c));
        }
        tracing::trace!(node = %node, ports = dead.len(), "discarded node");
        Ok(())
    }

    /// Remove a single port from its node, scrubbing connections to it
    pub fn remove_port(&mut self, port: PortId) -> Result<(), SystemError> {
        let removed = self.ports.remove(&port).ok_or(SystemError::PortNotFound(port))?;
        if let Some(entry) = self.nodes.get_mut(&removed.node) {
            entry.ports.retain(|p| *p != port);
        }
        for other in removed.connections {
            if let Some(p) = self.ports.get_mut(&other) {
                p.connections.retain(|c| *c != port);
            }
        }
        Ok(())
    }

    /// Connect an output to an input of a node in the same system
    pub fn connect(&mut self, output: PortId, input: PortId) -> Result<ConnectResult, FlowError> {
        self.connect_with(output, input, true)
    }

    /// Connect across a system boundary; used when bridging composites
    pub fn connect_across(&mut self, output: PortId, input: PortId) -> Result<ConnectResult, FlowError> {
        self.connect_with(output, input, false)
    }

    pub fn connect_with(
        &mut self,
        output: PortId,
        input: PortId,
        enforce_same_system: bool,
    ) -> Result<ConnectResult, FlowError> {
        let (out_node, in_arity, previous) = {
            let out = self.port(output)?;
            let inp = self.port(input)?;
            if out.role != Role::Output || inp.role != Role::Input {
                return Err(SystemError::InvalidConnection(format!(
                    "expected output -> input, got {out} -> {inp}"
                ))
                .into());
            }
            (out.node, inp.arity, inp.connections.clone())
        };

        if enforce_same_system {
            let in_node = self.port(input)?.node;
            if self.node_system(out_node) != self.node_system(in_node) {
                return Err(SystemError::CrossSystem { output, input }.into());
            }
        }

        let input_result = if previous.contains(&output) {
            ConnectResult::AlreadyConnected
        } else {
            match in_arity {
                Arity::Single => {
                    // Overwrite: unlink the stale upstream output first.
                    for old in previous {
                        if let Ok(p) = self.port_mut(old) {
                            p.connections.retain(|c| *c != input);
                        }
                    }
                    self.port_mut(input)?.connections = vec![output];
                }
                Arity::Multi => self.port_mut(input)?.connections.push(output),
            }
            ConnectResult::Connected
        };

        let out = self.port_mut(output)?;
        let output_result = if out.connections.contains(&input) {
            ConnectResult::AlreadyConnected
        } else {
            out.connections.push(input);
            ConnectResult::Connected
        };

        if input_result == ConnectResult::AlreadyConnected
            && output_result == ConnectResult::AlreadyConnected
        {
            Ok(ConnectResult::AlreadyConnected)
        } else {
            Ok(ConnectResult::Connected)
        }
    }

    /// Remove the link between an output and an input; returns whether one existed
    pub fn disconnect(&mut self, output: PortId, input: PortId) -> Result<bool, SystemError> {
        let before = self.port(input)?.connections.len();
        self.port_mut(input)?.connections.retain(|c| *c != output);
        self.port_mut(output)?.connections.retain(|c| *c != input);
        Ok(self.port(input)?.connections.len() != before)
    }

    pub fn connections(&self, port: PortId) -> Result<&[PortId], SystemError> {
        Ok(self.port(port)?.connections())
    }

    pub fn is_connected(&self, port: PortId) -> bool {
        self.ports.get(&port).is_some_and(Port::is_connected)
    }

    /// Read the current value of a port
    ///
    /// Inputs are never cached: the value is fetched from the connected
    /// output(s) at read time. Multi inputs yield a list.
    pub fn value(&self, port: PortId) -> Result<Value, FlowError> {
        let p = self.port(port)?;
        match (p.role, p.arity) {
            (Role::Output, _) => self.output_value(port),
            (Role::Input, Arity::Multi) => Ok(Value::List(self.values(port)?)),
            (Role::Input, Arity::Single) => match p.connections.first() {
                Some(conn) => self.output_value(*conn),
                None if p.requiredness == Requiredness::Optional => Ok(Value::Null),
                None => Err(missing(p).into()),
            },
        }
    }

    /// Values of every connection of an input, in connection order
    pub fn values(&self, port: PortId) -> Result<Vec<Value>, FlowError> {
        let p = self.port(port)?;
        if p.role == Role::Output {
            return Ok(vec![self.output_value(port)?]);
        }
        if p.connections.is_empty() && p.requiredness == Requiredness::Required {
            return Err(missing(p).into());
        }
        p.connections.iter().map(|c| self.output_value(*c)).collect()
    }

    fn output_value(&self, output: PortId) -> Result<Value, FlowError> {
        match self.resolve_output(output)? {
            Some(source) => {
                let p = self.port(source)?;
                p.value.clone().ok_or_else(|| {
                    NodeError::ValueNotComputed {
                        node: p.node,
                        port: p.name.clone(),
                    }
                    .into()
                })
            }
            None => Ok(Value::Null),
        }
    }

    /// Follow relay outputs back to the output that actually stores a value.
    /// `None` means the chain ends at an unconnected optional relay.
    fn resolve_output(&self, output: PortId) -> Result<Option<PortId>, FlowError> {
        let mut current = output;
        let mut seen = HashSet::new();
        loop {
            if !seen.insert(current) {
                return Err(SystemError::RelayLoop(output).into());
            }
            let port = self.port(current)?;
            let Some(partner) = port.relay else {
                return Ok(Some(current));
            };
            let input = self.port(partner)?;
            match input.connections.first() {
                Some(next) => current = *next,
                None if input.requiredness == Requiredness::Optional => return Ok(None),
                None => return Err(missing(input).into()),
            }
        }
    }

    pub fn set_value(&mut self, output: PortId, value: Value) -> Result<(), FlowError> {
        let p = self.storing_output(output)?;
        p.value = Some(value);
        Ok(())
    }

    /// Push onto the list held by an output, starting a new list if empty
    pub fn append_value(&mut self, output: PortId, value: Value) -> Result<(), FlowError> {
        let p = self.storing_output(output)?;
        match &mut p.value {
            Some(Value::List(items)) => items.push(value),
            slot => *slot = Some(Value::List(vec![value])),
        }
        Ok(())
    }

    pub fn clear_value(&mut self, output: PortId) -> Result<(), FlowError> {
        self.storing_output(output)?.value = None;
        Ok(())
    }

    fn storing_output(&mut self, output: PortId) -> Result<&mut Port, FlowError> {
        let p = self.port_mut(output)?;
        if p.role != Role::Output || p.relay.is_some() {
            return Err(SystemError::InvariantViolation(format!(
                "port {p} cannot store a value"
            ))
            .into());
        }
        Ok(p)
    }

    /// Binding name a port resolves to when lowered
    ///
    /// Relays never introduce a name: they resolve to whatever they are wired
    /// to. Multi inputs and unconnected optional inputs own a binding which
    /// [`Wiring::lower_input`] initialises.
    pub fn reference(&self, port: PortId) -> Result<String, FlowError> {
        let p = self.port(port)?;
        match (p.role, p.arity) {
            (Role::Output, _) => match self.resolve_output(port)? {
                Some(source) => Ok(self.port(source)?.own_reference()),
                None => Err(unbound(p).into()),
            },
            (Role::Input, Arity::Multi) => Ok(p.own_reference()),
            (Role::Input, Arity::Single) => match p.connections.first() {
                Some(conn) => self.reference(*conn),
                None if p.requiredness == Requiredness::Optional => Ok(p.own_reference()),
                None => Err(unbound(p).into()),
            },
        }
    }

    /// Expression reading a port in lowered code
    ///
    /// A relay chain ending at an unconnected optional relay, or an
    /// unconnected optional single input, reads as a `null` literal.
    pub fn read_expr(&self, port: PortId) -> Result<Expr, FlowError> {
        let p = self.port(port)?;
        match (p.role, p.arity, p.connections.first()) {
            (Role::Output, _, _) => match self.resolve_output(port)? {
                Some(source) => Ok(Expr::reference(self.port(source)?.own_reference())),
                None => Ok(Expr::literal(Value::Null)),
            },
            (Role::Input, Arity::Single, Some(conn)) => self.read_expr(*conn),
            (Role::Input, Arity::Single, None) if p.requiredness == Requiredness::Optional => {
                Ok(Expr::literal(Value::Null))
            }
            _ => self.reference(port).map(Expr::reference),
        }
    }

    /// Statements that bind an input's reference before it is used
    pub fn lower_input(&self, port: PortId) -> Result<Block, FlowError> {
        let p = self.port(port)?;
        let mut block = Block::new();
        match (p.role, p.arity) {
            (Role::Input, Arity::Multi) => {
                let items = p
                    .connections
                    .iter()
                    .map(|c| self.read_expr(*c))
                    .collect::<Result<Vec<_>, _>>()?;
                block.push(Stmt::assign(p.own_reference(), Expr::List { items }));
            }
            (Role::Input, Arity::Single)
                if p.connections.is_empty() && p.requiredness == Requiredness::Optional =>
            {
                block.push(Stmt::assign(p.own_reference(), Expr::literal(Value::Null)));
            }
            _ => {}
        }
        Ok(block)
    }

    pub fn validate_port(&self, port: PortId, types: &TypeRegistry) -> ValidationReport {
        let mut report = ValidationReport::new();
        let Ok(p) = self.port(port) else {
            return report;
        };
        let location = format!("{}.{}", p.node, p.name);

        for conn in &p.connections {
            let Ok(other) = self.port(*conn) else {
                continue;
            };
            let (from, to) = match p.role {
                Role::Input => (&other.signature, &p.signature),
                Role::Output => continue,
            };
            if !types.is_compatible(from, to) {
                report.push(Issue::signature_mismatch(
                    location.clone(),
                    format!("Signature '{to}' does not match connection's signature '{from}' ({other})."),
                ));
            }
        }

        if p.role == Role::Input && p.requiredness == Requiredness::Required && p.connections.is_empty() {
            report.push(Issue::unbound(
                location,
                format!("Nothing connected to input '{}'.", p.name),
            ));
        }

        report
    }

    pub fn validate_ports(
        &self,
        ports: impl IntoIterator<Item = PortId>,
        types: &TypeRegistry,
    ) -> ValidationReport {
        let mut report = ValidationReport::new();
        for port in ports {
            report.merge(self.validate_port(port, types));
        }
        report
    }
}

fn missing(p: &Port) -> NodeError {
    NodeError::MissingConnection {
        node: p.node,
        port: p.name.clone(),
    }
}

fn unbound(p: &Port) -> LowerError {
    LowerError::Unbound {
        node: p.node,
        port: p.name.clone(),
    }
}
