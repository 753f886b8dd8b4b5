//! Function and aggregate registries.

use std::collections::HashMap;
use std::sync::Arc;

use once_cell::sync::Lazy;

use crate::error::RegistryError;
use crate::signature::FnSignature;
use crate::types::{StaticType, TypeKind};

static BUILTINS: Lazy<FunctionRegistry> = Lazy::new(FunctionRegistry::with_builtins);

/// Overloads by name, scalar functions and aggregates kept apart.
#[derive(Debug, Clone, Default)]
pub struct FunctionRegistry {
    scalars: HashMap<String, Vec<Arc<FnSignature>>>,
    aggregates: HashMap<String, Vec<Arc<FnSignature>>>,
}

impl FunctionRegistry {
    /// An empty registry.
    pub fn new() -> Self {
        Self::default()
    }

    /// The shared built-in registry.
    pub fn builtins() -> &'static FunctionRegistry {
        &BUILTINS
    }

    /// A fresh registry holding the built-ins, for callers that want to add
    /// their own functions.
    pub fn with_builtins() -> Self {
        let mut registry = Self::new();
        registry.register_builtins();
        registry
    }

    /// Scalar overloads of `name`, in registration order.
    pub fn variants_for(&self, name: &str) -> &[Arc<FnSignature>] {
        self.scalars
            .get(&name.to_lowercase())
            .map(Vec::as_slice)
            .unwrap_or(&[])
    }

    /// Aggregate overloads of `name`, in registration order.
    pub fn aggregate_variants_for(&self, name: &str) -> &[Arc<FnSignature>] {
        self.aggregates
            .get(&name.to_lowercase())
            .map(Vec::as_slice)
            .unwrap_or(&[])
    }

    pub fn contains(&self, name: &str) -> bool {
        !self.variants_for(name).is_empty()
    }

    pub fn contains_aggregate(&self, name: &str) -> bool {
        !self.aggregate_variants_for(name).is_empty()
    }

    /// Add a signature after checking it.
    pub fn register(&mut self, signature: FnSignature) -> Result<(), RegistryError> {
        validate(&signature)?;
        let existing = self.namespace(signature.is_aggregate).get(&signature.name.to_lowercase());
        if let Some(variants) = existing {
            if variants.iter().any(|v| v.parameters == signature.parameters) {
                return Err(RegistryError::Duplicate {
                    signature: signature.to_string(),
                });
            }
        }
        self.define_function(signature);
        Ok(())
    }

    fn namespace(&self, aggregate: bool) -> &HashMap<String, Vec<Arc<FnSignature>>> {
        if aggregate {
            &self.aggregates
        } else {
            &self.scalars
        }
    }

    fn define_function(&mut self, signature: FnSignature) {
        let namespace = if signature.is_aggregate {
            &mut self.aggregates
        } else {
            &mut self.scalars
        };
        namespace
            .entry(signature.name.to_lowercase())
            .or_default()
            .push(Arc::new(signature));
    }

    /// Add a signature without validation, to reach the typer's fault path.
    #[cfg(test)]
    pub(crate) fn define_unchecked(&mut self, signature: FnSignature) {
        self.define_function(signature);
    }

    fn register_builtins(&mut self) {
        use TypeKind::*;

        // Arithmetic
        for name in ["plus", "minus", "times", "divide", "modulo"] {
            for kind in TypeKind::NUMERICS {
                self.define_function(FnSignature::scalar(name, vec![kind, kind], kind.to_static()));
            }
        }
        for name in ["pos", "neg", "abs"] {
            for kind in TypeKind::NUMERICS {
                self.define_function(FnSignature::scalar(name, vec![kind], kind.to_static()));
            }
        }
        for kind in TypeKind::INTEGERS {
            self.define_function(FnSignature::scalar("bitwise_and", vec![kind, kind], kind.to_static()));
        }

        // Comparison
        let ordered: Vec<TypeKind> = TypeKind::NUMERICS
            .into_iter()
            .chain([String, Clob, Bool, Date, Time, Timestamp])
            .collect();
        for name in ["eq", "neq"] {
            for &kind in &ordered {
                self.define_function(FnSignature::scalar(name, vec![kind, kind], StaticType::Bool));
            }
            self.define_function(FnSignature::scalar(name, vec![Any, Any], StaticType::Bool));
        }
        for name in ["lt", "lte", "gt", "gte"] {
            for &kind in &ordered {
                self.define_function(FnSignature::scalar(name, vec![kind, kind], StaticType::Bool));
            }
        }

        // Boolean connectives follow three-valued logic: FALSE AND NULL is FALSE
        for name in ["and", "or"] {
            self.define_function(
                FnSignature::scalar(name, vec![Bool, Bool], StaticType::Bool)
                    .handles_absent()
                    .nullable(true),
            );
        }
        self.define_function(FnSignature::scalar("not", vec![Bool], StaticType::Bool));

        // Text
        let string = StaticType::String(None);
        self.define_function(FnSignature::scalar("concat", vec![String, String], string.clone()));
        self.define_function(FnSignature::scalar("concat", vec![Clob, Clob], StaticType::Clob));
        self.define_function(FnSignature::scalar("like", vec![String, String], StaticType::Bool));
        self.define_function(FnSignature::scalar("like", vec![String, String, String], StaticType::Bool));
        for name in ["upper", "lower", "trim"] {
            self.define_function(FnSignature::scalar(name, vec![String], string.clone()));
            self.define_function(FnSignature::scalar(name, vec![Clob], StaticType::Clob));
        }
        self.define_function(FnSignature::scalar("char_length", vec![String], StaticType::Int));
        self.define_function(FnSignature::scalar("char_length", vec![Clob], StaticType::Int));
        self.define_function(FnSignature::scalar("substring", vec![String, Int], string.clone()));
        self.define_function(FnSignature::scalar("substring", vec![String, Int, Int], string));

        // Predicates
        for name in ["is_null", "is_missing"] {
            self.define_function(FnSignature::scalar(name, vec![Any], StaticType::Bool).handles_absent());
        }

        // Temporal
        self.define_function(FnSignature::scalar("extract_year", vec![Date], StaticType::Int));
        self.define_function(FnSignature::scalar("extract_year", vec![Timestamp], StaticType::Int));

        // Aggregates
        self.define_function(FnSignature::aggregate("count", vec![Any], StaticType::BigInt).nullable(false));
        self.define_function(FnSignature::aggregate("count_star", vec![], StaticType::BigInt).nullable(false));
        for kind in TypeKind::NUMERICS {
            self.define_function(FnSignature::aggregate("sum", vec![kind], kind.to_static()));
            let avg = if matches!(kind, Float32 | Float64) {
                StaticType::Float64
            } else {
                StaticType::DecimalArbitrary
            };
            self.define_function(FnSignature::aggregate("avg", vec![kind], avg));
        }
        for name in ["min", "max"] {
            for &kind in &ordered {
                self.define_function(FnSignature::aggregate(name, vec![kind], kind.to_static()));
            }
        }
        for name in ["every", "any", "some"] {
            self.define_function(FnSignature::aggregate(name, vec![Bool], StaticType::Bool));
        }
    }
}

fn validate(signature: &FnSignature) -> Result<(), RegistryError> {
    let malformed = |reason: &str| RegistryError::Malformed {
        signature: signature.to_string(),
        reason: reason.to_string(),
    };
    if signature.name.is_empty() {
        return Err(malformed("empty name"));
    }
    if signature.parameters.iter().any(|p| p.is_absent()) {
        return Err(malformed("NULL and MISSING are not parameter kinds"));
    }
    if signature.returns.is_missing() {
        return Err(malformed("a function cannot always return MISSING"));
    }
    Ok(())
}
