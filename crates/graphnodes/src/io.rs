use graphcore::lower::{Block, Effect, Stmt};
use graphcore::{Arity, FlowError, Node, NodeBase, PortId, Requiredness, Signature, Value, Wiring};

/// Keeps the last value it received for the embedding caller to show
pub struct Display {
    base: NodeBase,
    input: PortId,
    shown: Option<Value>,
}

impl Display {
    pub fn new(wiring: &mut Wiring) -> Self {
        let base = NodeBase::new(wiring, "Display");
        let input = wiring.add_input(base.id(), "input", Signature::Any, Arity::Single, Requiredness::Required);
        Self {
            base,
            input,
            shown: None,
        }
    }

    pub fn input(&self) -> PortId {
        self.input
    }

    /// Value seen on the most recent run
    pub fn shown(&self) -> Option<&Value> {
        self.shown.as_ref()
    }
}

impl Node for Display {
    fn base(&self) -> &NodeBase {
        &self.base
    }

    fn base_mut(&mut self) -> &mut NodeBase {
        &mut self.base
    }

    fn node_type(&self) -> &str {
        "io.display"
    }

    fn inputs(&self) -> Vec<PortId> {
        vec![self.input]
    }

    fn outputs(&self) -> Vec<PortId> {
        Vec::new()
    }

    fn run(&mut self, wiring: &mut Wiring) -> Result<(), FlowError> {
        let value = wiring.value(self.input)?;
        tracing::trace!(node = %self.name(), %value, "display updated");
        self.shown = Some(value);
        Ok(())
    }
}

/// Writes `name: value` to standard output
pub struct ConsolePrinter {
    base: NodeBase,
    input: PortId,
    printed: Vec<String>,
}

impl ConsolePrinter {
    pub fn new(wiring: &mut Wiring) -> Self {
        let base = NodeBase::new(wiring, "ConsolePrinter");
        let input = wiring.add_input(base.id(), "input", Signature::Any, Arity::Single, Requiredness::Required);
        Self {
            base,
            input,
            printed: Vec::new(),
        }
    }

    pub fn input(&self) -> PortId {
        self.input
    }

    /// Every line written so far
    pub fn printed(&self) -> &[String] {
        &self.printed
    }
}

impl Node for ConsolePrinter {
    fn base(&self) -> &NodeBase {
        &self.base
    }

    fn base_mut(&mut self) -> &mut NodeBase {
        &mut self.base
    }

    fn node_type(&self) -> &str {
        "io.console"
    }

    fn inputs(&self) -> Vec<PortId> {
        vec![self.input]
    }

    fn outputs(&self) -> Vec<PortId> {
        Vec::new()
    }

    fn run(&mut self, wiring: &mut Wiring) -> Result<(), FlowError> {
        let line = format!("{}: {}", self.name(), wiring.value(self.input)?);
        println!("{line}");
        self.printed.push(line);
        Ok(())
    }

    fn lower(&self, wiring: &Wiring) -> Result<Block, FlowError> {
        Ok(Block::from(vec![Stmt::Effect(Effect::Print {
            label: self.name().to_string(),
            value: wiring.read_expr(self.input)?,
        })]))
    }
}
