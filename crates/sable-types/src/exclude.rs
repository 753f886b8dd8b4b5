//! `EXCLUDE` narrowing of binding types.

use std::fmt::Write as _;

use sable_plan::{ExcludePath, ExcludeStep};
use tracing::debug;

use crate::config::ExcludePolicy;
use crate::env::Binding;
use crate::error::{DiagnosticSink, Problem, ProblemKind, Severity};
use crate::types::{StaticType, StructField, StructType};

/// How a path applied to a type.
#[derive(Debug, Clone, PartialEq, Eq)]
enum Applied {
    Removed,
    /// The shape is not statically known; nothing was removed.
    OpenShape(String),
    NoMatch(String),
}

impl Applied {
    /// Combine the outcomes of union members; the best one wins.
    fn or(self, other: Applied) -> Applied {
        match (self, other) {
            (Applied::Removed, _) | (_, Applied::Removed) => Applied::Removed,
            (Applied::OpenShape(r), _) | (_, Applied::OpenShape(r)) => Applied::OpenShape(r),
            (no_match, _) => no_match,
        }
    }
}

/// Remove every path from the schema, reporting paths that remove nothing.
pub(crate) fn exclude_bindings(
    mut schema: Vec<Binding>,
    paths: &[ExcludePath],
    policy: ExcludePolicy,
    sink: &mut dyn DiagnosticSink,
) -> Vec<Binding> {
    for path in paths {
        let rendered = render(path);
        let Some(binding) = schema.iter_mut().find(|b| path.root.matches(&b.name)) else {
            report(sink, policy.severity(), &rendered, "no such binding".to_string(), path);
            continue;
        };
        if path.steps.is_empty() {
            report(sink, policy.severity(), &rendered, "a path must name something inside the binding".to_string(), path);
            continue;
        }
        let (narrowed, applied) = exclude_steps(&binding.ty, &path.steps);
        match applied {
            Applied::Removed => {
                debug!(path = %rendered, "excluded");
                binding.ty = narrowed;
            }
            Applied::OpenShape(reason) => report(sink, Severity::Warning, &rendered, reason, path),
            Applied::NoMatch(reason) => report(sink, policy.severity(), &rendered, reason, path),
        }
    }
    schema
}

fn report(sink: &mut dyn DiagnosticSink, severity: Severity, rendered: &str, reason: String, path: &ExcludePath) {
    sink.report(Problem {
        severity,
        kind: ProblemKind::InvalidExcludePath {
            path: rendered.to_string(),
            reason,
        },
        span: path.span,
    });
}

fn exclude_steps(ty: &StaticType, steps: &[ExcludeStep]) -> (StaticType, Applied) {
    let mut applied: Option<Applied> = None;
    let mut members = Vec::new();
    for member in ty.members() {
        let (narrowed, outcome) = exclude_member(member, steps);
        members.push(narrowed);
        if let Some(outcome) = outcome {
            applied = Some(match applied {
                Some(prev) => prev.or(outcome),
                None => outcome,
            });
        }
    }
    let applied = applied.unwrap_or_else(|| Applied::NoMatch(format!("{ty} has no such path")));
    if applied == Applied::Removed {
        (StaticType::union(members), applied)
    } else {
        (ty.clone(), applied)
    }
}

/// Apply the steps to one non-union member. NULL and MISSING carry nothing
/// to exclude and report no outcome.
fn exclude_member(member: &StaticType, steps: &[ExcludeStep]) -> (StaticType, Option<Applied>) {
    let Some((step, rest)) = steps.split_first() else {
        return (member.clone(), Some(Applied::Removed));
    };
    let unchanged = |outcome: Applied| (member.clone(), Some(outcome));
    match (member, step) {
        (StaticType::Null | StaticType::Missing, _) => (member.clone(), None),
        (StaticType::Any, _) => unchanged(Applied::OpenShape("the input shape is unknown".to_string())),

        (StaticType::Struct(s), ExcludeStep::Field(part)) => {
            if !s.contains(part) {
                return if s.is_closed() {
                    unchanged(Applied::NoMatch(format!("{member} has no field `{part}`")))
                } else {
                    unchanged(Applied::OpenShape(format!("field `{part}` is not known in {member}")))
                };
            }
            if rest.is_empty() {
                let fields = s.fields.iter().filter(|f| !part.matches(&f.name)).cloned().collect();
                return (rebuild(s, fields), Some(Applied::Removed));
            }
            let mut outcome: Option<Applied> = None;
            let mut fields = Vec::with_capacity(s.fields.len());
            for field in &s.fields {
                if part.matches(&field.name) {
                    let (ty, applied) = exclude_steps(&field.ty, rest);
                    outcome = Some(match outcome {
                        Some(prev) => prev.or(applied),
                        None => applied,
                    });
                    fields.push(StructField::new(field.name.clone(), ty));
                } else {
                    fields.push(field.clone());
                }
            }
            (rebuild(s, fields), outcome)
        }
        (StaticType::Struct(s), ExcludeStep::StructWildcard) => {
            if rest.is_empty() {
                if !s.is_closed() {
                    return unchanged(Applied::OpenShape(format!("{member} may have unlisted fields")));
                }
                return (rebuild(s, Vec::new()), Some(Applied::Removed));
            }
            let mut outcome: Option<Applied> = None;
            let fields = s
                .fields
                .iter()
                .map(|field| {
                    let (ty, applied) = exclude_steps(&field.ty, rest);
                    outcome = Some(match outcome.take() {
                        Some(prev) => prev.or(applied),
                        None => applied,
                    });
                    StructField::new(field.name.clone(), ty)
                })
                .collect();
            if s.fields.is_empty() && !s.is_closed() {
                return unchanged(Applied::OpenShape(format!("{member} may have unlisted fields")));
            }
            (rebuild(s, fields), outcome)
        }

        (
            StaticType::List(element) | StaticType::Sexp(element) | StaticType::Bag(element),
            ExcludeStep::CollectionWildcard | ExcludeStep::Index(_),
        ) => {
            if matches!(step, ExcludeStep::Index(_)) && matches!(member, StaticType::Bag(_)) {
                return unchanged(Applied::NoMatch(format!("{member} is not ordered")));
            }
            if rest.is_empty() {
                // Removing elements leaves the element type as is
                return unchanged(Applied::Removed);
            }
            let (narrowed, applied) = exclude_steps(element, rest);
            let element = match step {
                // Only one position changes; the others keep the old type
                ExcludeStep::Index(_) if applied == Applied::Removed => (**element).clone().or(narrowed),
                _ => narrowed,
            };
            let rebuilt = match member {
                StaticType::List(_) => StaticType::list(element),
                StaticType::Sexp(_) => StaticType::Sexp(Box::new(element)),
                _ => StaticType::bag(element),
            };
            (rebuilt, Some(applied))
        }

        _ => unchanged(Applied::NoMatch(format!("step does not apply to {member}"))),
    }
}

fn rebuild(s: &StructType, fields: Vec<StructField>) -> StaticType {
    StaticType::Struct(StructType::with_constraints(fields, s.constraints))
}

fn render(path: &ExcludePath) -> String {
    let mut out = path.root.to_string();
    for step in &path.steps {
        let _ = match step {
            ExcludeStep::Field(part) => write!(out, ".{part}"),
            ExcludeStep::Index(i) => write!(out, "[{i}]"),
            ExcludeStep::StructWildcard => write!(out, ".*"),
            ExcludeStep::CollectionWildcard => write!(out, "[*]"),
        };
    }
    out
}
