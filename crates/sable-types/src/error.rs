//! Typing diagnostics and internal error definitions.

use std::fmt;

use miette::{Diagnostic, LabeledSpan};
use sable_plan::Span;
use thiserror::Error;

use crate::types::StaticType;

/// How bad a problem is.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub enum Severity {
    Warning,
    Error,
}

impl From<Severity> for miette::Severity {
    fn from(severity: Severity) -> Self {
        match severity {
            Severity::Warning => miette::Severity::Warning,
            Severity::Error => miette::Severity::Error,
        }
    }
}

/// What went wrong while typing a plan.
#[derive(Error, Debug, Clone, PartialEq)]
pub enum ProblemKind {
    #[error("undefined variable `{name}` (visible: {})", .visible.join(", "))]
    VarRefNotFound { name: String, visible: Vec<String> },

    #[error("no variant of `{name}` accepts ({})", join_types(.args))]
    FunctionTypeMismatch { name: String, args: Vec<StaticType> },

    #[error("expression always evaluates to MISSING: {reason}")]
    AlwaysMissing { reason: String },

    #[error("path index into {root} can never succeed")]
    PathIndexNeverSucceeds { root: StaticType },

    #[error("type mismatch in {context}: expected {expected}, found {found}")]
    TypeMismatch {
        context: String,
        expected: String,
        found: StaticType,
    },

    #[error("invalid EXCLUDE path `{path}`: {reason}")]
    InvalidExcludePath { path: String, reason: String },

    #[error("degree violation: expected {expected} column(s), found {actual}")]
    DegreeViolation { expected: usize, actual: usize },

    #[error("not supported: {feature}")]
    FeatureNotSupported { feature: String },

    #[error("internal error: {cause}")]
    InternalError { cause: String },
}

fn join_types(types: &[StaticType]) -> String {
    types
        .iter()
        .map(ToString::to_string)
        .collect::<Vec<_>>()
        .join(", ")
}

impl ProblemKind {
    /// Stable diagnostic code.
    pub fn code(&self) -> &'static str {
        match self {
            ProblemKind::VarRefNotFound { .. } => "sable::var_ref_not_found",
            ProblemKind::FunctionTypeMismatch { .. } => "sable::function_type_mismatch",
            ProblemKind::AlwaysMissing { .. } => "sable::always_missing",
            ProblemKind::PathIndexNeverSucceeds { .. } => "sable::path_index_never_succeeds",
            ProblemKind::TypeMismatch { .. } => "sable::type_mismatch",
            ProblemKind::InvalidExcludePath { .. } => "sable::invalid_exclude_path",
            ProblemKind::DegreeViolation { .. } => "sable::degree_violation",
            ProblemKind::FeatureNotSupported { .. } => "sable::feature_not_supported",
            ProblemKind::InternalError { .. } => "sable::internal_error",
        }
    }

    fn help(&self) -> Option<&'static str> {
        match self {
            ProblemKind::PathIndexNeverSucceeds { .. } => {
                Some("use a literal key or CAST the key to the intended type")
            }
            ProblemKind::InternalError { .. } => Some("this is a bug in the typer"),
            _ => None,
        }
    }
}

impl From<ResolveError> for ProblemKind {
    fn from(err: ResolveError) -> Self {
        ProblemKind::InternalError {
            cause: err.to_string(),
        }
    }
}

/// A diagnostic produced while typing.
#[derive(Error, Debug, Clone, PartialEq)]
#[error("{kind}")]
pub struct Problem {
    pub severity: Severity,
    pub kind: ProblemKind,
    pub span: Span,
}

impl Problem {
    pub fn error(kind: ProblemKind, span: Span) -> Self {
        Self {
            severity: Severity::Error,
            kind,
            span,
        }
    }

    pub fn warning(kind: ProblemKind, span: Span) -> Self {
        Self {
            severity: Severity::Warning,
            kind,
            span,
        }
    }

    pub fn is_error(&self) -> bool {
        self.severity == Severity::Error
    }
}

impl Diagnostic for Problem {
    fn code<'a>(&'a self) -> Option<Box<dyn fmt::Display + 'a>> {
        Some(Box::new(self.kind.code()))
    }

    fn severity(&self) -> Option<miette::Severity> {
        Some(self.severity.into())
    }

    fn help<'a>(&'a self) -> Option<Box<dyn fmt::Display + 'a>> {
        self.kind
            .help()
            .map(|h| Box::new(h) as Box<dyn fmt::Display + 'a>)
    }

    fn labels(&self) -> Option<Box<dyn Iterator<Item = LabeledSpan> + '_>> {
        let label = LabeledSpan::new_with_span(Some(self.kind.to_string()), self.span);
        Some(Box::new(std::iter::once(label)))
    }
}

/// Receives problems as they are found.
pub trait DiagnosticSink {
    fn report(&mut self, problem: Problem);
}

impl DiagnosticSink for Vec<Problem> {
    fn report(&mut self, problem: Problem) {
        self.push(problem);
    }
}

/// Append-only problem list.
#[derive(Debug, Clone, Default)]
pub struct ProblemCollector {
    problems: Vec<Problem>,
}

impl ProblemCollector {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn problems(&self) -> &[Problem] {
        &self.problems
    }

    pub fn errors(&self) -> impl Iterator<Item = &Problem> {
        self.problems.iter().filter(|p| p.severity == Severity::Error)
    }

    pub fn warnings(&self) -> impl Iterator<Item = &Problem> {
        self.problems.iter().filter(|p| p.severity == Severity::Warning)
    }

    pub fn has_errors(&self) -> bool {
        self.errors().next().is_some()
    }

    pub fn is_empty(&self) -> bool {
        self.problems.is_empty()
    }

    pub fn len(&self) -> usize {
        self.problems.len()
    }

    pub fn into_problems(self) -> Vec<Problem> {
        self.problems
    }
}

impl DiagnosticSink for ProblemCollector {
    fn report(&mut self, problem: Problem) {
        self.problems.push(problem);
    }
}

/// Faults inside overload resolution. These indicate a broken registry or
/// resolver, never a problem with the query.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum ResolveError {
    #[error("mapping for `{name}` has {actual} entries, signature takes {expected}")]
    MappingArity {
        name: String,
        expected: usize,
        actual: usize,
    },

    #[error("malformed signature `{signature}`: {reason}")]
    MalformedSignature { signature: String, reason: String },
}

/// Rejected registrations.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum RegistryError {
    #[error("malformed signature `{signature}`: {reason}")]
    Malformed { signature: String, reason: String },

    #[error("duplicate signature `{signature}`")]
    Duplicate { signature: String },
}
