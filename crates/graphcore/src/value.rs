use crate::{NodeError, Signature};
use serde::{Deserialize, Serialize};
use std::fmt;

/// Dynamic value carried between ports
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(tag = "type", content = "value")]
pub enum Value {
    Null,
    Bool(bool),
    Int(i64),
    Float(f64),
    String(String),
    List(Vec<Value>),
}

impl Value {
    pub fn as_str(&self) -> Option<&str> {
        match self {
            Value::String(s) => Some(s),
            _ => None,
        }
    }

    /// Numeric view; integers are widened.
    pub fn as_f64(&self) -> Option<f64> {
        match self {
            Value::Float(n) => Some(*n),
            Value::Int(n) => Some(*n as f64),
            _ => None,
        }
    }

    pub fn as_i64(&self) -> Option<i64> {
        match self {
            Value::Int(n) => Some(*n),
            _ => None,
        }
    }

    pub fn as_bool(&self) -> Option<bool> {
        match self {
            Value::Bool(b) => Some(*b),
            _ => None,
        }
    }

    pub fn as_list(&self) -> Option<&[Value]> {
        match self {
            Value::List(items) => Some(items),
            _ => None,
        }
    }

    pub fn is_null(&self) -> bool {
        matches!(self, Value::Null)
    }

    /// Truthiness used by branch conditions: null, false, zero, empty string
    /// and empty list are false.
    pub fn is_truthy(&self) -> bool {
        match self {
            Value::Null => false,
            Value::Bool(b) => *b,
            Value::Int(n) => *n != 0,
            Value::Float(n) => *n != 0.0,
            Value::String(s) => !s.is_empty(),
            Value::List(items) => !items.is_empty(),
        }
    }

    /// Signature describing this value at run time.
    pub fn signature(&self) -> Signature {
        match self {
            Value::Null => Signature::Any,
            Value::Bool(_) => Signature::Bool,
            Value::Int(_) => Signature::Int,
            Value::Float(_) => Signature::Float,
            Value::String(_) => Signature::String,
            Value::List(items) => {
                let mut sigs = items.iter().map(Value::signature);
                let elem = match sigs.next() {
                    Some(first) if sigs.all(|s| s == first) => first,
                    _ => Signature::Any,
                };
                Signature::List(Box::new(elem))
            }
        }
    }

    fn type_name(&self) -> &'static str {
        match self {
            Value::Null => "null",
            Value::Bool(_) => "bool",
            Value::Int(_) => "int",
            Value::Float(_) => "float",
            Value::String(_) => "string",
            Value::List(_) => "list",
        }
    }

    pub fn add(&self, other: &Value) -> Result<Value, NodeError> {
        self.arith(other, "+", i64::checked_add, |a, b| a + b)
    }

    pub fn sub(&self, other: &Value) -> Result<Value, NodeError> {
        self.arith(other, "-", i64::checked_sub, |a, b| a - b)
    }

    pub fn mul(&self, other: &Value) -> Result<Value, NodeError> {
        self.arith(other, "*", i64::checked_mul, |a, b| a * b)
    }

    /// True division; the result is always a float.
    pub fn div(&self, other: &Value) -> Result<Value, NodeError> {
        let (a, b) = self.numeric_pair(other, "/")?;
        if b == 0.0 {
            return Err(NodeError::ExecutionFailed("division by zero".to_string()));
        }
        Ok(Value::Float(a / b))
    }

    /// Remainder whose sign follows the divisor.
    pub fn rem(&self, other: &Value) -> Result<Value, NodeError> {
        match (self, other) {
            (Value::Int(_), Value::Int(0)) => Err(NodeError::ExecutionFailed(
                "integer modulo by zero".to_string(),
            )),
            (Value::Int(a), Value::Int(b)) => {
                let r = a.checked_rem(*b).ok_or_else(|| {
                    NodeError::ExecutionFailed(format!("integer overflow in {a} % {b}"))
                })?;
                Ok(Value::Int(if r != 0 && (r < 0) != (*b < 0) { r + b } else { r }))
            }
            _ => {
                let (a, b) = self.numeric_pair(other, "%")?;
                if b == 0.0 {
                    return Err(NodeError::ExecutionFailed("float modulo by zero".to_string()));
                }
                let r = a % b;
                Ok(Value::Float(if r != 0.0 && (r < 0.0) != (b < 0.0) { r + b } else { r }))
            }
        }
    }

    pub fn abs(&self) -> Result<Value, NodeError> {
        match self {
            Value::Int(n) => n
                .checked_abs()
                .map(Value::Int)
                .ok_or_else(|| NodeError::ExecutionFailed(format!("integer overflow in abs({n})"))),
            Value::Float(n) => Ok(Value::Float(n.abs())),
            other => Err(NodeError::InvalidInputType {
                field: "abs".to_string(),
                expected: "number".to_string(),
                actual: other.type_name().to_string(),
            }),
        }
    }

    /// Sum of a sequence; an empty sequence sums to integer zero.
    pub fn sum(values: &[Value]) -> Result<Value, NodeError> {
        values.iter().try_fold(Value::Int(0), |acc, v| acc.add(v))
    }

    /// Product of a sequence; an empty sequence multiplies to integer one.
    pub fn product(values: &[Value]) -> Result<Value, NodeError> {
        values.iter().try_fold(Value::Int(1), |acc, v| acc.mul(v))
    }

    fn arith(
        &self,
        other: &Value,
        op: &str,
        int_op: fn(i64, i64) -> Option<i64>,
        float_op: fn(f64, f64) -> f64,
    ) -> Result<Value, NodeError> {
        if let (Value::Int(a), Value::Int(b)) = (self, other) {
            return int_op(*a, *b)
                .map(Value::Int)
                .ok_or_else(|| NodeError::ExecutionFailed(format!("integer overflow in {a} {op} {b}")));
        }
        let (a, b) = self.numeric_pair(other, op)?;
        Ok(Value::Float(float_op(a, b)))
    }

    fn numeric_pair(&self, other: &Value, op: &str) -> Result<(f64, f64), NodeError> {
        match (self.as_f64(), other.as_f64()) {
            (Some(a), Some(b)) => Ok((a, b)),
            _ => Err(NodeError::InvalidInputType {
                field: op.to_string(),
                expected: "number".to_string(),
                actual: format!("{} and {}", self.type_name(), other.type_name()),
            }),
        }
    }
}

impl fmt::Display for Value {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Value::Null => write!(f, "null"),
            Value::Bool(b) => write!(f, "{b}"),
            Value::Int(n) => write!(f, "{n}"),
            Value::Float(n) => write!(f, "{n:?}"),
            Value::String(s) => write!(f, "{s}"),
            Value::List(items) => {
                write!(f, "[")?;
                for (i, item) in items.iter().enumerate() {
                    if i > 0 {
                        write!(f, ", ")?;
                    }
                    write!(f, "{item}")?;
                }
                write!(f, "]")
            }
        }
    }
}

impl From<String> for Value {
    fn from(s: String) -> Self {
        Value::String(s)
    }
}

impl From<&str> for Value {
    fn from(s: &str) -> Self {
        Value::String(s.to_string())
    }
}

impl From<f64> for Value {
    fn from(n: f64) -> Self {
        Value::Float(n)
    }
}

impl From<i64> for Value {
    fn from(n: i64) -> Self {
        Value::Int(n)
    }
}

impl From<bool> for Value {
    fn from(b: bool) -> Self {
        Value::Bool(b)
    }
}

impl<T: Into<Value>> From<Vec<T>> for Value {
    fn from(items: Vec<T>) -> Self {
        Value::List(items.into_iter().map(Into::into).collect())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_integer_arithmetic_stays_integral() {
        assert_eq!(Value::Int(2).mul(&Value::Int(4)).unwrap(), Value::Int(8));
        assert_eq!(Value::Int(2).add(&Value::Float(0.5)).unwrap(), Value::Float(2.5));
    }

    #[test]
    fn test_division_is_true_division() {
        assert_eq!(Value::Int(7).div(&Value::Int(2)).unwrap(), Value::Float(3.5));
        assert!(Value::Int(1).div(&Value::Int(0)).is_err());
    }

    #[test]
    fn test_remainder_follows_divisor_sign() {
        assert_eq!(Value::Int(-7).rem(&Value::Int(3)).unwrap(), Value::Int(2));
        assert_eq!(Value::Int(7).rem(&Value::Int(-3)).unwrap(), Value::Int(-2));
        assert_eq!(Value::Int(53).rem(&Value::Int(11)).unwrap(), Value::Int(9));
    }

    #[test]
    fn test_sum_and_product_of_sequences() {
        let ints: Vec<Value> = vec![2i64, 4, 9].into_iter().map(Value::from).collect();
        assert_eq!(Value::product(&ints).unwrap(), Value::Int(72));
        assert_eq!(Value::sum(&[]).unwrap(), Value::Int(0));
    }

    #[test]
    fn test_truthiness() {
        assert!(!Value::Int(0).is_truthy());
        assert!(Value::Int(1).is_truthy());
        assert!(!Value::Null.is_truthy());
        assert!(!Value::List(vec![]).is_truthy());
    }

    #[test]
    fn test_list_signature() {
        let v = Value::from(vec![1i64, 2]);
        assert_eq!(v.signature(), Signature::List(Box::new(Signature::Int)));
        let mixed = Value::List(vec![Value::Int(1), Value::Float(2.0)]);
        assert_eq!(mixed.signature(), Signature::List(Box::new(Signature::Any)));
    }
}
