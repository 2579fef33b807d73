use graphcore::lower::Block;
use graphcore::{
    FlowError, Node, NodeId, PortId, SystemError, SystemId, TypeRegistry, ValidationReport, Wiring,
};
use petgraph::algo::tarjan_scc;
use petgraph::graph::{DiGraph, NodeIndex};
use petgraph::Direction;
use std::cmp::Reverse;
use std::collections::{BinaryHeap, HashMap};
use std::time::Instant;

/// A scope of nodes executed together in dependency order
///
/// The dependency graph is derived from the current port connections every
/// time the system runs or lowers, so edits between calls are always seen.
pub struct System {
    id: SystemId,
    name: String,
    nodes: Vec<Box<dyn Node>>,
}

impl System {
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            id: SystemId::new_v4(),
            name: name.into(),
            nodes: Vec::new(),
        }
    }

    pub fn id(&self) -> SystemId {
        self.id
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn set_name(&mut self, name: impl Into<String>) {
        self.name = name.into();
    }

    pub fn len(&self) -> usize {
        self.nodes.len()
    }

    pub fn is_empty(&self) -> bool {
        self.nodes.is_empty()
    }

    pub fn contains(&self, node: NodeId) -> bool {
        self.nodes.iter().any(|n| n.id() == node)
    }

    /// Resident node ids in insertion order
    pub fn node_ids(&self) -> Vec<NodeId> {
        self.nodes.iter().map(|n| n.id()).collect()
    }

    pub fn node(&self, id: NodeId) -> Option<&dyn Node> {
        self.nodes.iter().find(|n| n.id() == id).map(|n| &**n)
    }

    pub fn node_mut(&mut self, id: NodeId) -> Option<&mut (dyn Node + 'static)> {
        self.nodes.iter_mut().find(|n| n.id() == id).map(|n| &mut **n)
    }

    pub fn add<N: Node + 'static>(&mut self, wiring: &mut Wiring, node: N) -> Result<NodeId, SystemError> {
        self.add_boxed(wiring, Box::new(node))
    }

    pub fn add_boxed(&mut self, wiring: &mut Wiring, node: Box<dyn Node>) -> Result<NodeId, SystemError> {
        let id = node.id();
        if self.contains(id) {
            return Err(SystemError::InvariantViolation(format!(
                "node {} ({}) is already in system '{}'",
                node.name(),
                id,
                self.name
            )));
        }
        wiring.attach(id, self.id)?;
        self.nodes.push(node);
        Ok(id)
    }

    /// Take a node out of the system; its ports stay alive until discarded
    pub fn remove(&mut self, wiring: &mut Wiring, id: NodeId) -> Result<Box<dyn Node>, SystemError> {
        let pos = self.nodes.iter().position(|n| n.id() == id).ok_or_else(|| {
            SystemError::InvariantViolation(format!("node {} is not in system '{}'", id, self.name))
        })?;
        wiring.detach(id, self.id)?;
        Ok(self.nodes.remove(pos))
    }

    /// Validate every resident node; cycles are not checked here
    pub fn validate(&self, wiring: &Wiring, types: &TypeRegistry) -> ValidationReport {
        let mut report = ValidationReport::new();
        for node in &self.nodes {
            report.merge(node.validate(wiring, types));
        }
        report
    }

    /// Dependency graph over resident nodes; weights are insertion indices
    fn build_graph(&self, wiring: &Wiring) -> DiGraph<usize, ()> {
        let mut graph = DiGraph::new();
        for idx in 0..self.nodes.len() {
            graph.add_node(idx);
        }

        let mut producers: HashMap<PortId, usize> = HashMap::new();
        for (idx, node) in self.nodes.iter().enumerate() {
            for output in node.outputs() {
                producers.insert(output, idx);
            }
        }

        for (consumer, node) in self.nodes.iter().enumerate() {
            for input in node.inputs() {
                let Ok(connections) = wiring.connections(input) else {
                    continue;
                };
                for output in connections {
                    // Ports owned outside this system are bridged by relays.
                    match producers.get(output) {
                        Some(&producer) if producer != consumer => {
                            graph.update_edge(NodeIndex::new(producer), NodeIndex::new(consumer), ());
                        }
                        _ => {}
                    }
                }
            }
        }

        graph
    }

    /// Topological order of resident nodes, ties broken by insertion order
    pub fn execution_order(&self, wiring: &Wiring) -> Result<Vec<NodeId>, SystemError> {
        Ok(self
            .order_indices(wiring)?
            .into_iter()
            .map(|idx| self.nodes[idx].id())
            .collect())
    }

    fn order_indices(&self, wiring: &Wiring) -> Result<Vec<usize>, SystemError> {
        let graph = self.build_graph(wiring);

        if let Some(cycle) = tarjan_scc(&graph).into_iter().find(|scc| scc.len() > 1) {
            let mut members: Vec<usize> = cycle.iter().map(|i| graph[*i]).collect();
            members.sort_unstable();
            let nodes = members
                .into_iter()
                .map(|idx| self.nodes[idx].name().to_string())
                .collect::<Vec<_>>();
            tracing::error!(system = %self.name, ?nodes, "cyclic dependency detected");
            return Err(SystemError::CyclicGraph {
                system: self.name.clone(),
                nodes,
            });
        }

        let mut in_degree: Vec<usize> = graph
            .node_indices()
            .map(|idx| graph.neighbors_directed(idx, Direction::Incoming).count())
            .collect();
        let mut ready: BinaryHeap<Reverse<usize>> = in_degree
            .iter()
            .enumerate()
            .filter(|(_, degree)| **degree == 0)
            .map(|(idx, _)| Reverse(idx))
            .collect();

        let mut order = Vec::with_capacity(self.nodes.len());
        while let Some(Reverse(idx)) = ready.pop() {
            order.push(idx);
            for next in graph.neighbors_directed(NodeIndex::new(idx), Direction::Outgoing) {
                let degree = &mut in_degree[next.index()];
                *degree -= 1;
                if *degree == 0 {
                    ready.push(Reverse(next.index()));
                }
            }
        }

        Ok(order)
    }

    /// Reject cycles here and in every nested system before anything runs
    pub fn check_structure(&self, wiring: &Wiring) -> Result<(), FlowError> {
        self.order_indices(wiring)?;
        for node in &self.nodes {
            node.check_structure(wiring)?;
        }
        Ok(())
    }

    /// Forget the values stored by every resident node, recursively
    pub fn clear_values(&self, wiring: &mut Wiring) -> Result<(), FlowError> {
        for node in &self.nodes {
            node.clear_values(wiring)?;
        }
        Ok(())
    }

    /// Run every resident node exactly once, in execution order
    pub fn run(&mut self, wiring: &mut Wiring) -> Result<(), FlowError> {
        let order = self.order_indices(wiring)?;
        for node in &self.nodes {
            node.check_structure(wiring)?;
        }

        tracing::debug!(system = %self.name, nodes = order.len(), "running system");
        let start = Instant::now();
        for idx in order {
            let node = &mut self.nodes[idx];
            tracing::trace!(system = %self.name, node = %node.name(), id = %node.id(), "running node");
            if let Err(e) = node.run(wiring) {
                tracing::error!(system = %self.name, node = %node.name(), "node failed: {}", e);
                return Err(e);
            }
        }
        tracing::debug!(
            system = %self.name,
            elapsed_us = start.elapsed().as_micros() as u64,
            "system completed"
        );
        Ok(())
    }

    /// Run only the given resident nodes, in execution order
    pub fn run_nodes(&mut self, wiring: &mut Wiring, ids: &[NodeId]) -> Result<(), FlowError> {
        if ids.is_empty() {
            return Ok(());
        }
        for idx in self.order_indices(wiring)? {
            let node = &mut self.nodes[idx];
            if ids.contains(&node.id()) {
                node.run(wiring)?;
            }
        }
        Ok(())
    }

    /// Concatenate every node's lowered block in execution order
    pub fn lower(&self, wiring: &Wiring) -> Result<Block, FlowError> {
        self.check_structure(wiring)?;
        tracing::debug!(system = %self.name, "lowering system");

        let mut block = Block::new();
        for idx in self.order_indices(wiring)? {
            block.extend(self.nodes[idx].lower(wiring)?);
        }
        Ok(block)
    }
}

impl std::fmt::Debug for System {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("System")
            .field("id", &self.id)
            .field("name", &self.name)
            .field("nodes", &self.node_ids())
            .finish()
    }
}
