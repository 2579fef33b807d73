use graphcore::lower::{Block, Effect, Stmt};
use graphcore::{
    Arity, FlowError, Node, NodeBase, NodeId, PortId, Requiredness, Signature, Wiring,
};

/// Port ids of a relay pair together with the node that owns them
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RelayPorts {
    pub node: NodeId,
    pub input: PortId,
    pub output: PortId,
}

/// Bridge node living inside a nested system
///
/// Reading its output forwards to whatever its input is wired to, so it
/// computes nothing and lowers to nothing.
pub struct Relay {
    base: NodeBase,
    input: PortId,
    output: PortId,
}

impl Relay {
    pub fn new(wiring: &mut Wiring, name: impl Into<String>, requiredness: Requiredness) -> Self {
        let name = name.into();
        let base = NodeBase::new(wiring, name.clone());
        let (input, output) = wiring.add_relay(base.id(), name, Signature::Any, requiredness);
        Self { base, input, output }
    }

    pub fn ports(&self) -> RelayPorts {
        RelayPorts {
            node: self.base.id(),
            input: self.input,
            output: self.output,
        }
    }
}

impl Node for Relay {
    fn base(&self) -> &NodeBase {
        &self.base
    }

    fn base_mut(&mut self) -> &mut NodeBase {
        &mut self.base
    }

    fn node_type(&self) -> &str {
        "control.relay"
    }

    fn inputs(&self) -> Vec<PortId> {
        vec![self.input]
    }

    fn outputs(&self) -> Vec<PortId> {
        vec![self.output]
    }

    fn run(&mut self, _wiring: &mut Wiring) -> Result<(), FlowError> {
        Ok(())
    }
}

/// Holds the element of the current loop iteration
pub struct IterationRelay {
    base: NodeBase,
    output: PortId,
}

impl IterationRelay {
    pub fn new(wiring: &mut Wiring) -> Self {
        let base = NodeBase::new(wiring, "iteration");
        let output = wiring.add_output(base.id(), "iteration", Signature::Any);
        Self { base, output }
    }

    pub fn output(&self) -> PortId {
        self.output
    }
}

impl Node for IterationRelay {
    fn base(&self) -> &NodeBase {
        &self.base
    }

    fn base_mut(&mut self) -> &mut NodeBase {
        &mut self.base
    }

    fn node_type(&self) -> &str {
        "control.iteration"
    }

    fn inputs(&self) -> Vec<PortId> {
        Vec::new()
    }

    fn outputs(&self) -> Vec<PortId> {
        vec![self.output]
    }

    // The owning loop writes the element before each pass.
    fn run(&mut self, _wiring: &mut Wiring) -> Result<(), FlowError> {
        Ok(())
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct AccumulatorPorts {
    pub node: NodeId,
    pub input: PortId,
    pub output: PortId,
}

/// Collects one value per loop pass into a list
///
/// Passes where the input reads `Null` (nothing fed it) are skipped.
pub struct Accumulator {
    base: NodeBase,
    input: PortId,
    output: PortId,
}

impl Accumulator {
    pub fn new(wiring: &mut Wiring, name: impl Into<String>) -> Self {
        let name = name.into();
        let base = NodeBase::new(wiring, name.clone());
        let input = wiring.add_input(
            base.id(),
            name.clone(),
            Signature::Any,
            Arity::Single,
            Requiredness::Optional,
        );
        let output = wiring.add_output(base.id(), name, Signature::list_of(Signature::Any));
        Self { base, input, output }
    }

    pub fn ports(&self) -> AccumulatorPorts {
        AccumulatorPorts {
            node: self.base.id(),
            input: self.input,
            output: self.output,
        }
    }
}

impl Node for Accumulator {
    fn base(&self) -> &NodeBase {
        &self.base
    }

    fn base_mut(&mut self) -> &mut NodeBase {
        &mut self.base
    }

    fn node_type(&self) -> &str {
        "control.accumulator"
    }

    fn inputs(&self) -> Vec<PortId> {
        vec![self.input]
    }

    fn outputs(&self) -> Vec<PortId> {
        vec![self.output]
    }

    fn run(&mut self, wiring: &mut Wiring) -> Result<(), FlowError> {
        let value = wiring.value(self.input)?;
        if !value.is_null() {
            wiring.append_value(self.output, value)?;
        }
        Ok(())
    }

    fn lower(&self, wiring: &Wiring) -> Result<Block, FlowError> {
        Ok(Block::from(vec![Stmt::Effect(Effect::Append {
            target: wiring.reference(self.output)?,
            value: wiring.read_expr(self.input)?,
        })]))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use graphcore::Value;

    #[test]
    fn test_accumulator_skips_null_passes() {
        let mut wiring = Wiring::new();
        let src = wiring.create_node();
        let out = wiring.add_output(src, "output", Signature::Int);
        let mut acc = Accumulator::new(&mut wiring, "acc");
        let ports = acc.ports();
        wiring.connect(out, ports.input).unwrap();
        wiring.set_value(ports.output, Value::List(vec![])).unwrap();

        for value in [Value::Int(1), Value::Null, Value::Int(3)] {
            wiring.set_value(out, value).unwrap();
            acc.run(&mut wiring).unwrap();
        }
        assert_eq!(wiring.value(ports.output).unwrap(), Value::from(vec![1i64, 3]));
    }

    #[test]
    fn test_relay_is_transparent() {
        let mut wiring = Wiring::new();
        let src = wiring.create_node();
        let out = wiring.add_output(src, "output", Signature::Float);
        wiring.set_value(out, Value::Float(1.5)).unwrap();

        let mut relay = Relay::new(&mut wiring, "x", Requiredness::Required);
        let ports = relay.ports();
        wiring.connect(out, ports.input).unwrap();
        relay.run(&mut wiring).unwrap();

        assert_eq!(wiring.value(ports.output).unwrap(), Value::Float(1.5));
        assert!(relay.lower(&wiring).unwrap().is_empty());
        assert_eq!(wiring.reference(ports.output).unwrap(), wiring.reference(out).unwrap());
    }
}
