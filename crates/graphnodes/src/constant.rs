use graphcore::lower::{Block, Expr, Stmt};
use graphcore::{FlowError, Node, NodeBase, PortId, Value, Wiring};

/// Emits a fixed literal value
pub struct Constant {
    base: NodeBase,
    output: PortId,
    value: Value,
}

impl Constant {
    pub fn new(wiring: &mut Wiring, value: impl Into<Value>) -> Self {
        let value = value.into();
        let base = NodeBase::new(wiring, "Constant");
        let output = wiring.add_output(base.id(), "output", value.signature());
        Self { base, output, value }
    }

    pub fn output(&self) -> PortId {
        self.output
    }

    pub fn value(&self) -> &Value {
        &self.value
    }
}

impl Node for Constant {
    fn base(&self) -> &NodeBase {
        &self.base
    }

    fn base_mut(&mut self) -> &mut NodeBase {
        &mut self.base
    }

    fn node_type(&self) -> &str {
        "const.value"
    }

    fn inputs(&self) -> Vec<PortId> {
        Vec::new()
    }

    fn outputs(&self) -> Vec<PortId> {
        vec![self.output]
    }

    fn run(&mut self, wiring: &mut Wiring) -> Result<(), FlowError> {
        wiring.set_value(self.output, self.value.clone())
    }

    fn lower(&self, wiring: &Wiring) -> Result<Block, FlowError> {
        Ok(Block::from(vec![Stmt::assign(
            wiring.reference(self.output)?,
            Expr::literal(self.value.clone()),
        )]))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use graphcore::Signature;

    #[test]
    fn test_output_signature_follows_value() {
        let mut wiring = Wiring::new();
        let floats = Constant::new(&mut wiring, vec![0.5, 1.0]);
        let text = Constant::new(&mut wiring, "hello");
        assert_eq!(
            wiring.port(floats.output()).unwrap().signature(),
            &Signature::list_of(Signature::Float)
        );
        assert_eq!(wiring.port(text.output()).unwrap().signature(), &Signature::String);
    }

    #[test]
    fn test_run_publishes_value() {
        let mut wiring = Wiring::new();
        let mut constant = Constant::new(&mut wiring, 3i64);
        constant.run(&mut wiring).unwrap();
        assert_eq!(wiring.value(constant.output()).unwrap(), Value::Int(3));
    }
}
