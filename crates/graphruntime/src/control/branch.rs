use super::relay::{Relay, RelayPorts};
use crate::System;
use graphcore::lower::{Block, Stmt};
use graphcore::{
    Arity, FlowError, Node, NodeBase, NodeId, PortId, Requiredness, Signature, SystemError,
    TypeRegistry, ValidationReport, Wiring,
};
use std::collections::BTreeMap;

/// Relay halves sharing one input name, one per branch
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct IfInput {
    pub on_true: RelayPorts,
    pub on_false: RelayPorts,
}

/// Relay halves sharing one output name, plus the merged port seen outside
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct IfOutput {
    pub on_true: RelayPorts,
    pub on_false: RelayPorts,
    pub output: PortId,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Branch {
    True,
    False,
}

/// Branch composite: runs exactly one of two nested systems
///
/// After the taken branch runs, every merged output holds what that
/// branch fed into its half of the slot, or `Null` if it fed nothing.
pub struct If {
    base: NodeBase,
    condition: PortId,
    true_system: System,
    false_system: System,
    inputs: BTreeMap<String, IfInput>,
    outputs: BTreeMap<String, IfOutput>,
}

impl If {
    pub fn new(wiring: &mut Wiring) -> Self {
        let base = NodeBase::new(wiring, "If");
        let condition = wiring.add_input(
            base.id(),
            "condition",
            Signature::Bool,
            Arity::Single,
            Requiredness::Required,
        );
        Self {
            base,
            condition,
            true_system: System::new("if_true"),
            false_system: System::new("if_false"),
            inputs: BTreeMap::new(),
            outputs: BTreeMap::new(),
        }
    }

    pub fn condition(&self) -> PortId {
        self.condition
    }

    pub fn true_system(&self) -> &System {
        &self.true_system
    }

    pub fn true_system_mut(&mut self) -> &mut System {
        &mut self.true_system
    }

    pub fn false_system(&self) -> &System {
        &self.false_system
    }

    pub fn false_system_mut(&mut self) -> &mut System {
        &mut self.false_system
    }

    pub fn input(&self, name: &str) -> Option<IfInput> {
        self.inputs.get(name).copied()
    }

    pub fn output(&self, name: &str) -> Option<IfOutput> {
        self.outputs.get(name).copied()
    }

    pub fn add_input(&mut self, wiring: &mut Wiring, name: &str) -> Result<IfInput, SystemError> {
        if self.inputs.contains_key(name) {
            return Err(self.duplicate("input", name));
        }
        let slot = IfInput {
            on_true: add_relay(wiring, &mut self.true_system, name, Requiredness::Required)?,
            on_false: add_relay(wiring, &mut self.false_system, name, Requiredness::Required)?,
        };
        self.inputs.insert(name.to_string(), slot);
        Ok(slot)
    }

    pub fn remove_input(&mut self, wiring: &mut Wiring, name: &str) -> Result<(), SystemError> {
        let slot = self.inputs.remove(name).ok_or_else(|| self.absent("input", name))?;
        discard(wiring, &mut self.true_system, slot.on_true.node)?;
        discard(wiring, &mut self.false_system, slot.on_false.node)
    }

    pub fn add_output(&mut self, wiring: &mut Wiring, name: &str) -> Result<IfOutput, SystemError> {
        if self.outputs.contains_key(name) {
            return Err(self.duplicate("output", name));
        }
        let slot = IfOutput {
            on_true: add_relay(wiring, &mut self.true_system, name, Requiredness::Optional)?,
            on_false: add_relay(wiring, &mut self.false_system, name, Requiredness::Optional)?,
            output: wiring.add_output(self.base.id(), name, Signature::Any),
        };
        self.outputs.insert(name.to_string(), slot);
        Ok(slot)
    }

    pub fn remove_output(&mut self, wiring: &mut Wiring, name: &str) -> Result<(), SystemError> {
        let slot = self.outputs.remove(name).ok_or_else(|| self.absent("output", name))?;
        discard(wiring, &mut self.true_system, slot.on_true.node)?;
        discard(wiring, &mut self.false_system, slot.on_false.node)?;
        wiring.remove_port(slot.output)
    }

    /// Feed both halves of an input from an output in the enclosing system
    pub fn bind_input(&self, wiring: &mut Wiring, name: &str, source: PortId) -> Result<(), FlowError> {
        let slot = self.input(name).ok_or_else(|| self.absent("input", name))?;
        wiring.connect_across(source, slot.on_true.input)?;
        wiring.connect_across(source, slot.on_false.input)?;
        Ok(())
    }

    /// Swap in a new true branch, carrying its relay halves over; returns the old one
    pub fn set_true_system(&mut self, wiring: &mut Wiring, system: System) -> Result<System, SystemError> {
        let halves = self.halves(Branch::True);
        swap_system(wiring, &mut self.true_system, system, &halves)
    }

    /// Swap in a new false branch, carrying its relay halves over; returns the old one
    pub fn set_false_system(&mut self, wiring: &mut Wiring, system: System) -> Result<System, SystemError> {
        let halves = self.halves(Branch::False);
        swap_system(wiring, &mut self.false_system, system, &halves)
    }

    fn halves(&self, branch: Branch) -> Vec<NodeId> {
        let pick = |on_true: &RelayPorts, on_false: &RelayPorts| match branch {
            Branch::True => on_true.node,
            Branch::False => on_false.node,
        };
        self.inputs
            .values()
            .map(|s| pick(&s.on_true, &s.on_false))
            .chain(self.outputs.values().map(|s| pick(&s.on_true, &s.on_false)))
            .collect()
    }

    fn lower_arm(&self, wiring: &Wiring, branch: Branch) -> Result<Block, FlowError> {
        let mut block = match branch {
            Branch::True => self.true_system.lower(wiring)?,
            Branch::False => self.false_system.lower(wiring)?,
        };
        for slot in self.outputs.values() {
            let half = match branch {
                Branch::True => slot.on_true,
                Branch::False => slot.on_false,
            };
            block.push(Stmt::Assign {
                target: wiring.reference(slot.output)?,
                value: wiring.read_expr(half.output)?,
            });
        }
        Ok(block)
    }

    fn duplicate(&self, kind: &str, name: &str) -> SystemError {
        SystemError::InvariantViolation(format!(
            "{} '{}' already has an {kind} named '{name}'",
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

fn add_relay(
    wiring: &mut Wiring,
    system: &mut System,
    name: &str,
    requiredness: Requiredness,
) -> Result<RelayPorts, SystemError> {
    let relay = Relay::new(wiring, name, requiredness);
    let ports = relay.ports();
    system.add(wiring, relay)?;
    Ok(ports)
}

fn discard(wiring: &mut Wiring, system: &mut System, node: NodeId) -> Result<(), SystemError> {
    system.remove(wiring, node)?;
    wiring.discard_node(node)
}

fn swap_system(
    wiring: &mut Wiring,
    current: &mut System,
    mut replacement: System,
    bridge: &[NodeId],
) -> Result<System, SystemError> {
    for id in bridge {
        let node = current.remove(wiring, *id)?;
        replacement.add_boxed(wiring, node)?;
    }
    Ok(std::mem::replace(current, replacement))
}

impl Node for If {
    fn base(&self) -> &NodeBase {
        &self.base
    }

    fn base_mut(&mut self) -> &mut NodeBase {
        &mut self.base
    }

    fn node_type(&self) -> &str {
        "control.if"
    }

    fn inputs(&self) -> Vec<PortId> {
        std::iter::once(self.condition)
            .chain(
                self.inputs
                    .values()
                    .flat_map(|s| [s.on_true.input, s.on_false.input]),
            )
            .collect()
    }

    fn outputs(&self) -> Vec<PortId> {
        self.outputs.values().map(|s| s.output).collect()
    }

    fn run(&mut self, wiring: &mut Wiring) -> Result<(), FlowError> {
        let branch = if wiring.value(self.condition)?.is_truthy() {
            Branch::True
        } else {
            Branch::False
        };
        tracing::debug!(node = %self.name(), ?branch, "taking branch");

        match branch {
            Branch::True => self.true_system.run(wiring)?,
            Branch::False => self.false_system.run(wiring)?,
        }

        for slot in self.outputs.values() {
            let half = match branch {
                Branch::True => slot.on_true,
                Branch::False => slot.on_false,
            };
            let value = wiring.value(half.output)?;
            wiring.set_value(slot.output, value)?;
        }
        Ok(())
    }

    fn validate(&self, wiring: &Wiring, types: &TypeRegistry) -> ValidationReport {
        let own = std::iter::once(self.condition).chain(self.outputs.values().map(|s| s.output));
        let mut report = wiring.validate_ports(own, types);
        report.merge(self.true_system.validate(wiring, types));
        report.merge(self.false_system.validate(wiring, types));
        report
    }

    fn lower(&self, wiring: &Wiring) -> Result<Block, FlowError> {
        Ok(Block::from(vec![Stmt::If {
            test: wiring.read_expr(self.condition)?,
            then: self.lower_arm(wiring, Branch::True)?,
            orelse: self.lower_arm(wiring, Branch::False)?,
        }]))
    }

    fn check_structure(&self, wiring: &Wiring) -> Result<(), FlowError> {
        self.true_system.check_structure(wiring)?;
        self.false_system.check_structure(wiring)
    }

    fn clear_values(&self, wiring: &mut Wiring) -> Result<(), FlowError> {
        for output in self.outputs() {
            wiring.clear_value(output)?;
        }
        self.true_system.clear_values(wiring)?;
        self.false_system.clear_values(wiring)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use graphcore::lower::{Evaluator, Expr};
    use graphcore::{IssueKind, Value};
    use std::cell::Cell;
    use std::rc::Rc;

    /// Emits a fixed value and counts how often it ran
    struct Tagged {
        base: NodeBase,
        output: PortId,
        value: Value,
        runs: Rc<Cell<usize>>,
    }

    impl Tagged {
        fn new(wiring: &mut Wiring, value: impl Into<Value>, runs: &Rc<Cell<usize>>) -> Self {
            let base = NodeBase::new(wiring, "tagged");
            let output = wiring.add_output(base.id(), "output", Signature::Any);
            Self {
                base,
                output,
                value: value.into(),
                runs: Rc::clone(runs),
            }
        }
    }

    impl Node for Tagged {
        fn base(&self) -> &NodeBase {
            &self.base
        }

        fn base_mut(&mut self) -> &mut NodeBase {
            &mut self.base
        }

        fn node_type(&self) -> &str {
            "test.tagged"
        }

        fn inputs(&self) -> Vec<PortId> {
            Vec::new()
        }

        fn outputs(&self) -> Vec<PortId> {
            vec![self.output]
        }

        fn run(&mut self, wiring: &mut Wiring) -> Result<(), FlowError> {
            self.runs.set(self.runs.get() + 1);
            wiring.set_value(self.output, self.value.clone())
        }

        fn lower(&self, wiring: &Wiring) -> Result<Block, FlowError> {
            Ok(Block::from(vec![Stmt::assign(
                wiring.reference(self.output)?,
                Expr::literal(self.value.clone()),
            )]))
        }
    }

    struct Fixture {
        wiring: Wiring,
        branch: If,
        condition: PortId,
        true_runs: Rc<Cell<usize>>,
        false_runs: Rc<Cell<usize>>,
    }

    /// `result` is "yes" on the true branch and unfed on the false branch
    fn fixture() -> Fixture {
        let mut wiring = Wiring::new();
        let cond_node = wiring.create_node();
        let condition = wiring.add_output(cond_node, "flag", Signature::Bool);

        let mut branch = If::new(&mut wiring);
        wiring.connect_across(condition, branch.condition()).unwrap();
        let result = branch.add_output(&mut wiring, "result").unwrap();

        let true_runs = Rc::new(Cell::new(0));
        let false_runs = Rc::new(Cell::new(0));
        let yes = Tagged::new(&mut wiring, "yes", &true_runs);
        let yes_out = yes.output;
        branch.true_system_mut().add(&mut wiring, yes).unwrap();
        wiring.connect(yes_out, result.on_true.input).unwrap();
        let unused = Tagged::new(&mut wiring, "no", &false_runs);
        branch.false_system_mut().add(&mut wiring, unused).unwrap();

        Fixture {
            wiring,
            branch,
            condition,
            true_runs,
            false_runs,
        }
    }

    #[test]
    fn test_exactly_one_branch_runs() {
        let mut f = fixture();
        let result = f.branch.output("result").unwrap().output;

        f.wiring.set_value(f.condition, Value::Bool(true)).unwrap();
        f.branch.run(&mut f.wiring).unwrap();
        assert_eq!((f.true_runs.get(), f.false_runs.get()), (1, 0));
        assert_eq!(f.wiring.value(result).unwrap(), Value::from("yes"));

        f.wiring.set_value(f.condition, Value::Bool(false)).unwrap();
        f.branch.run(&mut f.wiring).unwrap();
        assert_eq!((f.true_runs.get(), f.false_runs.get()), (1, 1));
        assert_eq!(f.wiring.value(result).unwrap(), Value::Null);
    }

    #[test]
    fn test_lowered_branch_matches_interpretation() {
        let mut f = fixture();
        let result = f.branch.output("result").unwrap().output;
        let block = f.branch.lower(&f.wiring).unwrap();
        let flag = f.wiring.reference(f.condition).unwrap();

        for cond in [true, false] {
            f.wiring.set_value(f.condition, Value::Bool(cond)).unwrap();
            f.branch.run(&mut f.wiring).unwrap();

            let mut eval = Evaluator::new();
            eval.exec(&Block::from(vec![Stmt::assign(flag.clone(), Expr::literal(cond))]))
                .unwrap();
            eval.exec(&block).unwrap();
            assert_eq!(
                eval.get(&f.wiring.reference(result).unwrap()),
                Some(&f.wiring.value(result).unwrap())
            );
        }
    }

    #[test]
    fn test_validation_covers_both_branches() {
        let mut f = fixture();
        f.branch.add_input(&mut f.wiring, "unbound").unwrap();
        let report = f.branch.validate(&f.wiring, &TypeRegistry::standard());
        assert_eq!(report.count(IssueKind::UnboundRequiredPort), 2);
    }

    #[test]
    fn test_bound_input_reaches_both_branches() {
        let mut f = fixture();
        let src = f.wiring.create_node();
        let value = f.wiring.add_output(src, "value", Signature::Int);
        f.wiring.set_value(value, Value::Int(7)).unwrap();

        let slot = f.branch.add_input(&mut f.wiring, "value").unwrap();
        f.branch.bind_input(&mut f.wiring, "value", value).unwrap();
        assert_eq!(f.wiring.value(slot.on_true.output).unwrap(), Value::Int(7));
        assert_eq!(f.wiring.value(slot.on_false.output).unwrap(), Value::Int(7));
        assert!(f.branch.inputs().contains(&slot.on_false.input));
    }

    #[test]
    fn test_remove_output_drops_merged_port() {
        let mut f = fixture();
        let slot = f.branch.output("result").unwrap();
        f.branch.remove_output(&mut f.wiring, "result").unwrap();
        assert!(f.wiring.port(slot.output).is_err());
        assert!(f.branch.outputs().is_empty());
        assert_eq!(f.branch.true_system().len(), 1);
        assert!(matches!(
            f.branch.remove_output(&mut f.wiring, "result"),
            Err(SystemError::InvariantViolation(_))
        ));
    }

    #[test]
    fn test_replacing_a_branch_keeps_relay_halves() {
        let mut f = fixture();
        let slot = f.branch.output("result").unwrap();
        let old = f
            .branch
            .set_false_system(&mut f.wiring, System::new("replacement"))
            .unwrap();
        assert_eq!(old.len(), 1);
        assert_eq!(f.branch.false_system().len(), 1);
        assert_eq!(
            f.wiring.node_system(slot.on_false.node),
            Some(f.branch.false_system().id())
        );
    }
}
