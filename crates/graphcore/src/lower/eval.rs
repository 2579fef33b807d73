use super::{BinaryOp, Block, Builtin, Effect, Expr, Stmt};
use crate::{FlowError, LowerError, Value};
use std::collections::BTreeMap;

/// Reference executor for lowered programs
///
/// Bindings live in one flat scope, so loop targets and values assigned
/// inside loop bodies or branch arms stay visible after the construct ends.
#[derive(Debug, Default)]
pub struct Evaluator {
    bindings: BTreeMap<String, Value>,
    output: Vec<String>,
}

impl Evaluator {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn get(&self, name: &str) -> Option<&Value> {
        self.bindings.get(name)
    }

    pub fn bindings(&self) -> &BTreeMap<String, Value> {
        &self.bindings
    }

    /// Lines written by `Print` effects
    pub fn output(&self) -> &[String] {
        &self.output
    }

    pub fn exec(&mut self, block: &Block) -> Result<(), FlowError> {
        for stmt in block.statements() {
            self.exec_stmt(stmt)?;
        }
        Ok(())
    }

    fn exec_stmt(&mut self, stmt: &Stmt) -> Result<(), FlowError> {
        match stmt {
            Stmt::Assign { target, value } => {
                let value = self.eval(value)?;
                self.bindings.insert(target.clone(), value);
            }
            Stmt::For { target, iter, body } => {
                let items = match self.eval(iter)? {
                    Value::List(items) => items,
                    other => {
                        return Err(LowerError::TypeMismatch(format!(
                            "cannot iterate over {other}"
                        ))
                        .into())
                    }
                };
                for item in items {
                    self.bindings.insert(target.clone(), item);
                    self.exec(body)?;
                }
            }
            Stmt::If { test, then, orelse } => {
                if self.eval(test)?.is_truthy() {
                    self.exec(then)?;
                } else {
                    self.exec(orelse)?;
                }
            }
            Stmt::Effect(Effect::Append { target, value }) => {
                let value = self.eval(value)?;
                if value.is_null() {
                    return Ok(());
                }
                match self.bindings.get_mut(target) {
                    Some(Value::List(items)) => items.push(value),
                    Some(other) => {
                        return Err(LowerError::TypeMismatch(format!(
                            "cannot append to '{target}' holding {other}"
                        ))
                        .into())
                    }
                    None => return Err(LowerError::UnknownBinding(target.clone()).into()),
                }
            }
            Stmt::Effect(Effect::Print { label, value }) => {
                let value = self.eval(value)?;
                self.output.push(format!("{label}: {value}"));
            }
        }
        Ok(())
    }

    fn eval(&self, expr: &Expr) -> Result<Value, FlowError> {
        match expr {
            Expr::Literal { value } => Ok(value.clone()),
            Expr::Ref { name } => self
                .bindings
                .get(name)
                .cloned()
                .ok_or_else(|| LowerError::UnknownBinding(name.clone()).into()),
            Expr::List { items } => Ok(Value::List(
                items.iter().map(|e| self.eval(e)).collect::<Result<_, _>>()?,
            )),
            Expr::Binary { op, lhs, rhs } => {
                let lhs = self.eval(lhs)?;
                let rhs = self.eval(rhs)?;
                let result = match op {
                    BinaryOp::Add => lhs.add(&rhs),
                    BinaryOp::Sub => lhs.sub(&rhs),
                    BinaryOp::Mul => lhs.mul(&rhs),
                    BinaryOp::Div => lhs.div(&rhs),
                    BinaryOp::Rem => lhs.rem(&rhs),
                };
                Ok(result?)
            }
            Expr::Call { func, args } => {
                let args = args
                    .iter()
                    .map(|e| self.eval(e))
                    .collect::<Result<Vec<_>, _>>()?;
                self.call(*func, &args)
            }
        }
    }

    fn call(&self, func: Builtin, args: &[Value]) -> Result<Value, FlowError> {
        let single = |name: &str| -> Result<&Value, FlowError> {
            match args {
                [arg] => Ok(arg),
                _ => Err(LowerError::TypeMismatch(format!(
                    "{name} takes exactly one argument, got {}",
                    args.len()
                ))
                .into()),
            }
        };
        let list = |name: &str| -> Result<&[Value], FlowError> {
            single(name)?
                .as_list()
                .ok_or_else(|| LowerError::TypeMismatch(format!("{name} expects a list")).into())
        };

        match func {
            Builtin::Sum => Ok(Value::sum(list("sum")?)?),
            Builtin::Product => Ok(Value::product(list("product")?)?),
            Builtin::Abs => Ok(single("abs")?.abs()?),
            Builtin::All => Ok(Value::Bool(list("all")?.iter().all(Value::is_truthy))),
            Builtin::Any => Ok(Value::Bool(list("any")?.iter().any(Value::is_truthy))),
        }
    }
}
