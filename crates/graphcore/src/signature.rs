use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::fmt;
use std::sync::Arc;

/// Semantic type descriptor attached to every port
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum Signature {
    Any,
    Bool,
    Int,
    Float,
    String,
    List(Box<Signature>),
}

impl Signature {
    pub fn list_of(elem: Signature) -> Self {
        Signature::List(Box::new(elem))
    }
}

impl fmt::Display for Signature {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Signature::Any => write!(f, "any"),
            Signature::Bool => write!(f, "bool"),
            Signature::Int => write!(f, "int"),
            Signature::Float => write!(f, "float"),
            Signature::String => write!(f, "string"),
            Signature::List(elem) => write!(f, "list[{elem}]"),
        }
    }
}

/// Predicate over the source signature, registered for one target signature
pub type CompatibilityRule = Arc<dyn Fn(&Signature) -> bool + Send + Sync>;

/// Table answering "can a value of signature A feed a port expecting B"
///
/// Lookups are keyed by the *target* signature. Exact equality is always
/// compatible; otherwise the rule registered for the target decides, and an
/// unregistered target rejects every other source.
pub struct TypeRegistry {
    rules: HashMap<Signature, CompatibilityRule>,
}

impl TypeRegistry {
    /// Registry with no rules: only identical signatures are compatible.
    pub fn new() -> Self {
        Self {
            rules: HashMap::new(),
        }
    }

    /// Registry with the built-in numeric widening and `any` rules.
    pub fn standard() -> Self {
        let mut registry = Self::new();
        registry.register(Signature::Any, |_| true);
        registry.register(Signature::Float, |from| {
            matches!(from, Signature::Int | Signature::Float | Signature::Any)
        });
        for target in [Signature::Bool, Signature::Int, Signature::String] {
            registry.register(target, |from| matches!(from, Signature::Any));
        }
        registry.register(Signature::list_of(Signature::Any), |from| {
            matches!(from, Signature::List(_) | Signature::Any)
        });
        registry.register(Signature::list_of(Signature::Float), |from| match from {
            Signature::List(elem) => {
                matches!(**elem, Signature::Int | Signature::Float | Signature::Any)
            }
            Signature::Any => true,
            _ => false,
        });
        registry.register(Signature::list_of(Signature::Int), |from| match from {
            Signature::List(elem) => matches!(**elem, Signature::Int | Signature::Any),
            Signature::Any => true,
            _ => false,
        });
        registry
    }

    /// Register the rule for a target signature, replacing any previous one
    pub fn register<F>(&mut self, target: Signature, rule: F)
    where
        F: Fn(&Signature) -> bool + Send + Sync + 'static,
    {
        tracing::debug!("Registering compatibility rule for: {}", target);
        self.rules.insert(target, Arc::new(rule));
    }

    pub fn is_compatible(&self, from: &Signature, to: &Signature) -> bool {
        if from == to {
            return true;
        }

        match self.rules.get(to) {
            Some(rule) => rule(from),
            None => false,
        }
    }
}

impl Default for TypeRegistry {
    fn default() -> Self {
        Self::standard()
    }
}
