//! Function signatures and the outcome of overload resolution.

use std::fmt;
use std::sync::Arc;

use crate::error::ResolveError;
use crate::types::{StaticType, TypeKind};

/// A function or aggregate overload.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct FnSignature {
    pub name: String,
    pub parameters: Vec<TypeKind>,
    pub returns: StaticType,
    /// May return NULL even for non-NULL arguments.
    pub is_nullable: bool,
    /// May return MISSING even for present arguments.
    pub is_missable: bool,
    /// A NULL argument yields NULL without invoking the body.
    pub is_null_call: bool,
    /// A MISSING argument yields MISSING without invoking the body.
    pub is_missing_call: bool,
    pub is_aggregate: bool,
}

impl FnSignature {
    /// A scalar function with SQL's default NULL/MISSING propagation.
    pub fn scalar(name: impl Into<String>, parameters: Vec<TypeKind>, returns: StaticType) -> Self {
        Self {
            name: name.into(),
            parameters,
            returns,
            is_nullable: false,
            is_missable: false,
            is_null_call: true,
            is_missing_call: true,
            is_aggregate: false,
        }
    }

    /// An aggregate; NULL inputs are skipped and an empty group yields NULL.
    pub fn aggregate(name: impl Into<String>, parameters: Vec<TypeKind>, returns: StaticType) -> Self {
        Self {
            name: name.into(),
            parameters,
            returns,
            is_nullable: true,
            is_missable: false,
            is_null_call: false,
            is_missing_call: false,
            is_aggregate: true,
        }
    }

    pub fn nullable(mut self, nullable: bool) -> Self {
        self.is_nullable = nullable;
        self
    }

    pub fn missable(mut self) -> Self {
        self.is_missable = true;
        self
    }

    /// The body handles NULL and MISSING arguments itself.
    pub fn handles_absent(mut self) -> Self {
        self.is_null_call = false;
        self.is_missing_call = false;
        self
    }

    pub fn arity(&self) -> usize {
        self.parameters.len()
    }

    /// Whether every parameter is `ANY`.
    pub fn is_catch_all(&self) -> bool {
        !self.parameters.is_empty() && self.parameters.iter().all(|p| *p == TypeKind::Any)
    }
}

impl fmt::Display for FnSignature {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}(", self.name)?;
        for (i, p) in self.parameters.iter().enumerate() {
            if i > 0 {
                write!(f, ", ")?;
            }
            write!(f, "{p}")?;
        }
        write!(f, ") -> {}", self.returns)
    }
}

/// A coercion inserted in front of one argument.
///
/// A cast from `ANY` is a coercion whose source kind is only known at
/// runtime.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct CastSpec {
    pub from: TypeKind,
    pub to: TypeKind,
}

/// What happens to one argument before the call.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ArgCast {
    NoCast,
    Cast(CastSpec),
}

impl ArgCast {
    pub fn cast(from: TypeKind, to: TypeKind) -> Self {
        ArgCast::Cast(CastSpec { from, to })
    }

    pub fn is_cast(&self) -> bool {
        matches!(self, ArgCast::Cast(_))
    }
}

/// A signature together with the casts that make the arguments fit it.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Candidate {
    pub signature: Arc<FnSignature>,
    pub mapping: Vec<ArgCast>,
}

impl Candidate {
    /// Pair a signature with its argument mapping, one entry per parameter.
    pub fn new(signature: Arc<FnSignature>, mapping: Vec<ArgCast>) -> Result<Self, ResolveError> {
        if mapping.len() != signature.arity() {
            return Err(ResolveError::MappingArity {
                name: signature.name.clone(),
                expected: signature.arity(),
                actual: mapping.len(),
            });
        }
        Ok(Self { signature, mapping })
    }
}

/// Result of resolving a call against its overloads.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum FnMatch {
    /// Exactly one overload applies for every argument shape.
    Ok {
        signature: Arc<FnSignature>,
        mapping: Vec<ArgCast>,
        is_missable: bool,
    },
    /// The overload depends on runtime value kinds.
    Dynamic {
        candidates: Vec<Candidate>,
        is_missable: bool,
    },
    /// No overload applies.
    Error { name: String, args: Vec<StaticType> },
}

impl FnMatch {
    pub fn ok(candidate: Candidate, is_missable: bool) -> Self {
        FnMatch::Ok {
            signature: candidate.signature,
            mapping: candidate.mapping,
            is_missable,
        }
    }

    pub fn is_ok(&self) -> bool {
        matches!(self, FnMatch::Ok { .. })
    }

    pub fn is_dynamic(&self) -> bool {
        matches!(self, FnMatch::Dynamic { .. })
    }

    pub fn is_error(&self) -> bool {
        matches!(self, FnMatch::Error { .. })
    }

    pub fn is_missable(&self) -> bool {
        match self {
            FnMatch::Ok { is_missable, .. } | FnMatch::Dynamic { is_missable, .. } => *is_missable,
            FnMatch::Error { .. } => true,
        }
    }

    /// Signatures this match may dispatch to.
    pub fn signatures(&self) -> Vec<&Arc<FnSignature>> {
        match self {
            FnMatch::Ok { signature, .. } => vec![signature],
            FnMatch::Dynamic { candidates, .. } => candidates.iter().map(|c| &c.signature).collect(),
            FnMatch::Error { .. } => Vec::new(),
        }
    }
}
