use graphcore::lower::{Block, Builtin, Expr, Stmt};
use graphcore::{
    Arity, FlowError, Node, NodeBase, NodeError, PortId, Requiredness, Signature, Value, Wiring,
};

/// Truthiness reduction over a list: `All` or `Any`
pub struct Truthiness {
    base: NodeBase,
    input: PortId,
    output: PortId,
    every: bool,
}

impl Truthiness {
    /// True when every element is truthy (and for an empty list)
    pub fn all(wiring: &mut Wiring) -> Self {
        Self::new(wiring, "All", true)
    }

    /// True when at least one element is truthy
    pub fn any(wiring: &mut Wiring) -> Self {
        Self::new(wiring, "Any", false)
    }

    fn new(wiring: &mut Wiring, name: &str, every: bool) -> Self {
        let base = NodeBase::new(wiring, name);
        let input = wiring.add_input(
            base.id(),
            "input",
            Signature::list_of(Signature::Any),
            Arity::Single,
            Requiredness::Required,
        );
        let output = wiring.add_output(base.id(), "output", Signature::Bool);
        Self {
            base,
            input,
            output,
            every,
        }
    }

    pub fn input(&self) -> PortId {
        self.input
    }

    pub fn output(&self) -> PortId {
        self.output
    }
}

impl Node for Truthiness {
    fn base(&self) -> &NodeBase {
        &self.base
    }

    fn base_mut(&mut self) -> &mut NodeBase {
        &mut self.base
    }

    fn node_type(&self) -> &str {
        if self.every {
            "boolean.all"
        } else {
            "boolean.any"
        }
    }

    fn inputs(&self) -> Vec<PortId> {
        vec![self.input]
    }

    fn outputs(&self) -> Vec<PortId> {
        vec![self.output]
    }

    fn run(&mut self, wiring: &mut Wiring) -> Result<(), FlowError> {
        let value = wiring.value(self.input)?;
        let items = value.as_list().ok_or_else(|| NodeError::InvalidInputType {
            field: "input".to_string(),
            expected: "list".to_string(),
            actual: value.signature().to_string(),
        })?;
        let result = if self.every {
            items.iter().all(Value::is_truthy)
        } else {
            items.iter().any(Value::is_truthy)
        };
        wiring.set_value(self.output, Value::Bool(result))
    }

    fn lower(&self, wiring: &Wiring) -> Result<Block, FlowError> {
        let func = if self.every { Builtin::All } else { Builtin::Any };
        Ok(Block::from(vec![Stmt::assign(
            wiring.reference(self.output)?,
            Expr::call(func, vec![wiring.read_expr(self.input)?]),
        )]))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn run(node: &mut Truthiness, wiring: &mut Wiring, items: Value) -> Value {
        let src = wiring.create_node();
        let out = wiring.add_output(src, "items", items.signature());
        wiring.set_value(out, items).unwrap();
        wiring.connect(out, node.input()).unwrap();
        node.run(wiring).unwrap();
        wiring.value(node.output()).unwrap()
    }

    #[test]
    fn test_all_and_any() {
        let mut wiring = Wiring::new();
        let mixed = Value::List(vec![Value::Int(1), Value::Int(0)]);

        let mut all = Truthiness::all(&mut wiring);
        assert_eq!(run(&mut all, &mut wiring, mixed.clone()), Value::Bool(false));
        assert_eq!(run(&mut all, &mut wiring, Value::List(vec![])), Value::Bool(true));

        let mut any = Truthiness::any(&mut wiring);
        assert_eq!(run(&mut any, &mut wiring, mixed), Value::Bool(true));
        assert_eq!(run(&mut any, &mut wiring, Value::List(vec![])), Value::Bool(false));
    }
}
