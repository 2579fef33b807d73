use graphcore::lower::{BinaryOp, Block, Builtin, Expr, Stmt};
use graphcore::{
    Arity, FlowError, Node, NodeBase, PortId, Requiredness, Signature, Value, Wiring,
};

/// Reduction over every value connected to a multi input
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Reduction {
    Sum,
    Product,
}

/// Shared shape of `Sum` and `Product`
struct Reduce {
    base: NodeBase,
    input: PortId,
    output: PortId,
    kind: Reduction,
}

impl Reduce {
    fn new(wiring: &mut Wiring, name: &str, kind: Reduction) -> Self {
        let base = NodeBase::new(wiring, name);
        let input = wiring.add_input(base.id(), "input", Signature::Float, Arity::Multi, Requiredness::Required);
        let output = wiring.add_output(base.id(), "output", Signature::Float);
        Self {
            base,
            input,
            output,
            kind,
        }
    }

    fn run(&self, wiring: &mut Wiring) -> Result<(), FlowError> {
        let values = wiring.values(self.input)?;
        let result = match self.kind {
            Reduction::Sum => Value::sum(&values)?,
            Reduction::Product => Value::product(&values)?,
        };
        wiring.set_value(self.output, result)
    }

    fn lower(&self, wiring: &Wiring) -> Result<Block, FlowError> {
        let func = match self.kind {
            Reduction::Sum => Builtin::Sum,
            Reduction::Product => Builtin::Product,
        };
        let mut block = wiring.lower_input(self.input)?;
        block.push(Stmt::assign(
            wiring.reference(self.output)?,
            Expr::call(func, vec![Expr::reference(wiring.reference(self.input)?)]),
        ));
        Ok(block)
    }
}

/// Adds every connected value
pub struct Sum(Reduce);

impl Sum {
    pub fn new(wiring: &mut Wiring) -> Self {
        Self(Reduce::new(wiring, "Sum", Reduction::Sum))
    }

    pub fn input(&self) -> PortId {
        self.0.input
    }

    pub fn output(&self) -> PortId {
        self.0.output
    }
}

impl Node for Sum {
    fn base(&self) -> &NodeBase {
        &self.0.base
    }

    fn base_mut(&mut self) -> &mut NodeBase {
        &mut self.0.base
    }

    fn node_type(&self) -> &str {
        "math.sum"
    }

    fn inputs(&self) -> Vec<PortId> {
        vec![self.0.input]
    }

    fn outputs(&self) -> Vec<PortId> {
        vec![self.0.output]
    }

    fn run(&mut self, wiring: &mut Wiring) -> Result<(), FlowError> {
        self.0.run(wiring)
    }

    fn lower(&self, wiring: &Wiring) -> Result<Block, FlowError> {
        self.0.lower(wiring)
    }
}

/// Multiplies every connected value
pub struct Product(Reduce);

impl Product {
    pub fn new(wiring: &mut Wiring) -> Self {
        Self(Reduce::new(wiring, "Product", Reduction::Product))
    }

    pub fn input(&self) -> PortId {
        self.0.input
    }

    pub fn output(&self) -> PortId {
        self.0.output
    }
}

impl Node for Product {
    fn base(&self) -> &NodeBase {
        &self.0.base
    }

    fn base_mut(&mut self) -> &mut NodeBase {
        &mut self.0.base
    }

    fn node_type(&self) -> &str {
        "math.product"
    }

    fn inputs(&self) -> Vec<PortId> {
        vec![self.0.input]
    }

    fn outputs(&self) -> Vec<PortId> {
        vec![self.0.output]
    }

    fn run(&mut self, wiring: &mut Wiring) -> Result<(), FlowError> {
        self.0.run(wiring)
    }

    fn lower(&self, wiring: &Wiring) -> Result<Block, FlowError> {
        self.0.lower(wiring)
    }
}

/// Two-operand arithmetic: subtraction, division or modulo
pub struct Arithmetic {
    base: NodeBase,
    lhs: PortId,
    rhs: PortId,
    output: PortId,
    op: BinaryOp,
}

impl Arithmetic {
    /// `left - right`
    pub fn subtract(wiring: &mut Wiring) -> Self {
        Self::new(wiring, "Subtract", BinaryOp::Sub, ("left", "right"))
    }

    /// `numerator / denominator`, always a float
    pub fn divide(wiring: &mut Wiring) -> Self {
        Self::new(wiring, "Divide", BinaryOp::Div, ("numerator", "denominator"))
    }

    /// `dividend % divisor`, taking the sign of the divisor
    pub fn modulo(wiring: &mut Wiring) -> Self {
        Self::new(wiring, "Modulo", BinaryOp::Rem, ("dividend", "divisor"))
    }

    fn new(wiring: &mut Wiring, name: &str, op: BinaryOp, operands: (&str, &str)) -> Self {
        let base = NodeBase::new(wiring, name);
        let lhs = wiring.add_input(base.id(), operands.0, Signature::Float, Arity::Single, Requiredness::Required);
        let rhs = wiring.add_input(base.id(), operands.1, Signature::Float, Arity::Single, Requiredness::Required);
        let output = wiring.add_output(base.id(), "output", Signature::Float);
        Self {
            base,
            lhs,
            rhs,
            output,
            op,
        }
    }

    pub fn lhs(&self) -> PortId {
        self.lhs
    }

    pub fn rhs(&self) -> PortId {
        self.rhs
    }

    pub fn output(&self) -> PortId {
        self.output
    }
}

impl Node for Arithmetic {
    fn base(&self) -> &NodeBase {
        &self.base
    }

    fn base_mut(&mut self) -> &mut NodeBase {
        &mut self.base
    }

    fn node_type(&self) -> &str {
        match self.op {
            BinaryOp::Add => "math.add",
            BinaryOp::Sub => "math.subtract",
            BinaryOp::Mul => "math.multiply",
            BinaryOp::Div => "math.divide",
            BinaryOp::Rem => "math.modulo",
        }
    }

    fn inputs(&self) -> Vec<PortId> {
        vec![self.lhs, self.rhs]
    }

    fn outputs(&self) -> Vec<PortId> {
        vec![self.output]
    }

    fn run(&mut self, wiring: &mut Wiring) -> Result<(), FlowError> {
        let lhs = wiring.value(self.lhs)?;
        let rhs = wiring.value(self.rhs)?;
        let result = match self.op {
            BinaryOp::Add => lhs.add(&rhs),
            BinaryOp::Sub => lhs.sub(&rhs),
            BinaryOp::Mul => lhs.mul(&rhs),
            BinaryOp::Div => lhs.div(&rhs),
            BinaryOp::Rem => lhs.rem(&rhs),
        }?;
        wiring.set_value(self.output, result)
    }

    fn lower(&self, wiring: &Wiring) -> Result<Block, FlowError> {
        Ok(Block::from(vec![Stmt::assign(
            wiring.reference(self.output)?,
            Expr::binary(self.op, wiring.read_expr(self.lhs)?, wiring.read_expr(self.rhs)?),
        )]))
    }
}

/// Absolute value of a number
pub struct Abs {
    base: NodeBase,
    input: PortId,
    output: PortId,
}

impl Abs {
    pub fn new(wiring: &mut Wiring) -> Self {
        let base = NodeBase::new(wiring, "Abs");
        let input = wiring.add_input(base.id(), "input", Signature::Float, Arity::Single, Requiredness::Required);
        let output = wiring.add_output(base.id(), "output", Signature::Float);
        Self { base, input, output }
    }

    pub fn input(&self) -> PortId {
        self.input
    }

    pub fn output(&self) -> PortId {
        self.output
    }
}

impl Node for Abs {
    fn base(&self) -> &NodeBase {
        &self.base
    }

    fn base_mut(&mut self) -> &mut NodeBase {
        &mut self.base
    }

    fn node_type(&self) -> &str {
        "math.abs"
    }

    fn inputs(&self) -> Vec<PortId> {
        vec![self.input]
    }

    fn outputs(&self) -> Vec<PortId> {
        vec![self.output]
    }

    fn run(&mut self, wiring: &mut Wiring) -> Result<(), FlowError> {
        let value = wiring.value(self.input)?.abs()?;
        wiring.set_value(self.output, value)
    }

    fn lower(&self, wiring: &Wiring) -> Result<Block, FlowError> {
        Ok(Block::from(vec![Stmt::assign(
            wiring.reference(self.output)?,
            Expr::call(Builtin::Abs, vec![wiring.read_expr(self.input)?]),
        )]))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use graphcore::NodeError;

    fn source(wiring: &mut Wiring, value: impl Into<Value>) -> PortId {
        let node = wiring.create_node();
        let value = value.into();
        let out = wiring.add_output(node, "source", value.signature());
        wiring.set_value(out, value).unwrap();
        out
    }

    #[test]
    fn test_divide_by_zero_fails_the_run() {
        let mut wiring = Wiring::new();
        let mut divide = Arithmetic::divide(&mut wiring);
        let one = source(&mut wiring, 1i64);
        let zero = source(&mut wiring, 0i64);
        wiring.connect(one, divide.lhs()).unwrap();
        wiring.connect(zero, divide.rhs()).unwrap();

        let err = divide.run(&mut wiring).unwrap_err();
        assert!(matches!(err, FlowError::Node(NodeError::ExecutionFailed(_))));
        assert!(wiring.value(divide.output()).is_err());
    }

    #[test]
    fn test_modulo_follows_divisor_sign() {
        let mut wiring = Wiring::new();
        let mut modulo = Arithmetic::modulo(&mut wiring);
        let a = source(&mut wiring, -7i64);
        let b = source(&mut wiring, 3i64);
        wiring.connect(a, modulo.lhs()).unwrap();
        wiring.connect(b, modulo.rhs()).unwrap();
        modulo.run(&mut wiring).unwrap();
        assert_eq!(wiring.value(modulo.output()).unwrap(), Value::Int(2));
        assert_eq!(modulo.node_type(), "math.modulo");
    }

    #[test]
    fn test_sum_requires_a_connection() {
        let mut wiring = Wiring::new();
        let mut sum = Sum::new(&mut wiring);
        assert!(matches!(
            sum.run(&mut wiring),
            Err(FlowError::Node(NodeError::MissingConnection { .. }))
        ));
    }

    #[test]
    fn test_abs_keeps_integers_integral() {
        let mut wiring = Wiring::new();
        let mut abs = Abs::new(&mut wiring);
        let a = source(&mut wiring, -4i64);
        wiring.connect(a, abs.input()).unwrap();
        abs.run(&mut wiring).unwrap();
        assert_eq!(wiring.value(abs.output()).unwrap(), Value::Int(4));
    }
}
