//! Type inference for scalar expressions.

use sable_plan::{
    CollectionKind, IdentPart, Identifier, Literal, PathStep, Rex, Span, SubqueryCoercion, TypeExpr,
};
use tracing::trace;

use crate::checker::Checker;
use crate::env::TypeEnv;
use crate::error::ProblemKind;
use crate::lattice::{CastRelationship, TypeLattice};
use crate::signature::{FnMatch, FnSignature};
use crate::typed::{TypedPathStep, TypedRex, TypedRexOp};
use crate::types::{StaticType, StructField, StructType, TypeKind};

impl Checker<'_> {
    /// Infer the type of an expression.
    pub(crate) fn infer_rex(&mut self, rex: &Rex, env: &TypeEnv<'_>) -> TypedRex {
        let typed = self.infer_rex_inner(rex, env);
        trace!(ty = %typed.ty, "typed expression");
        typed
    }

    fn infer_rex_inner(&mut self, rex: &Rex, env: &TypeEnv<'_>) -> TypedRex {
        match rex {
            Rex::Lit(lit, span) => TypedRex::new(literal_type(lit), TypedRexOp::Lit(lit.clone()), *span),

            Rex::Var(ident, span) => self.infer_var(ident, *span, env),

            Rex::Path(root, steps, span) => {
                let mut typed = self.infer_rex(root, env);
                for step in steps {
                    typed = self.infer_step(typed, step, *span, env);
                }
                typed
            }

            Rex::Binary(left, op, right, span) => {
                let args = vec![self.infer_rex(left, env), self.infer_rex(right, env)];
                self.infer_call(op.function_name(), args, *span)
            }

            Rex::Unary(op, operand, span) => {
                let args = vec![self.infer_rex(operand, env)];
                self.infer_call(op.function_name(), args, *span)
            }

            Rex::Call(name, args, span) => {
                let args = args.iter().map(|a| self.infer_rex(a, env)).collect();
                self.infer_call(name, args, *span)
            }

            Rex::Cast(operand, target, span) => {
                let operand = self.infer_rex(operand, env);
                self.infer_cast(operand, target, *span)
            }

            Rex::Case(branches, default, span) => {
                let mut typed = Vec::new();
                let mut exhaustive = false;
                for (condition, result) in branches {
                    if matches!(condition, Rex::Lit(Literal::Bool(false), _)) {
                        trace!("CASE branch pruned");
                        continue;
                    }
                    let condition_t = self.infer_rex(condition, env);
                    self.expect_bool(&condition_t, "CASE condition");
                    typed.push((condition_t, self.infer_rex(result, env)));
                    if matches!(condition, Rex::Lit(Literal::Bool(true), _)) {
                        exhaustive = true;
                        break;
                    }
                }
                let default = match default {
                    Some(d) if !exhaustive => Some(Box::new(self.infer_rex(d, env))),
                    _ => None,
                };
                let mut types: Vec<StaticType> = typed.iter().map(|(_, r)| r.ty.clone()).collect();
                match &default {
                    Some(d) => types.push(d.ty.clone()),
                    None if !exhaustive => types.push(StaticType::Null),
                    None => {}
                }
                TypedRex::new(StaticType::union(types), TypedRexOp::Case(typed, default), *span)
            }

            Rex::Coalesce(args, span) => {
                let args: Vec<TypedRex> = args.iter().map(|a| self.infer_rex(a, env)).collect();
                let mut types = Vec::new();
                for (i, arg) in args.iter().enumerate() {
                    if i + 1 == args.len() {
                        types.push(arg.ty.clone());
                    } else {
                        types.extend(arg.ty.members().into_iter().filter(|m| !m.is_absent()).cloned());
                    }
                }
                if args.is_empty() {
                    types.push(StaticType::Null);
                }
                TypedRex::new(StaticType::union(types), TypedRexOp::Coalesce(args), *span)
            }

            Rex::NullIf(value, other, span) => {
                let value = self.infer_rex(value, env);
                let other = self.infer_rex(other, env);
                let ty = value.ty.clone().or(StaticType::Null);
                TypedRex::new(ty, TypedRexOp::NullIf(Box::new(value), Box::new(other)), *span)
            }

            Rex::Collection(kind, elements, span) => {
                let elements: Vec<TypedRex> = elements.iter().map(|e| self.infer_rex(e, env)).collect();
                let element = if elements.is_empty() {
                    StaticType::Any
                } else {
                    StaticType::union(elements.iter().map(|e| e.ty.clone()))
                };
                let ty = match kind {
                    CollectionKind::Bag => StaticType::bag(element),
                    CollectionKind::List => StaticType::list(element),
                    CollectionKind::Sexp => StaticType::Sexp(Box::new(element)),
                };
                TypedRex::new(ty, TypedRexOp::Collection(*kind, elements), *span)
            }

            Rex::Struct(pairs, span) => self.infer_struct(pairs, *span, env),

            Rex::TupleUnion(args, span) => {
                let args: Vec<TypedRex> = args.iter().map(|a| self.infer_rex(a, env)).collect();
                let mut fields = Vec::new();
                let mut ordered = true;
                let mut closed = true;
                for arg in &args {
                    match &arg.ty {
                        StaticType::Struct(s) if s.is_closed() => {
                            fields.extend(s.fields.iter().cloned());
                            ordered &= s.constraints.ordered;
                        }
                        _ => closed = false,
                    }
                }
                let ty = if closed {
                    let mut row = StructType::closed(fields);
                    row.constraints.ordered = ordered;
                    StaticType::Struct(row)
                } else {
                    StaticType::Any
                };
                TypedRex::new(ty, TypedRexOp::TupleUnion(args), *span)
            }

            Rex::Select(rel, constructor, span) => {
                let rel = self.infer_rel(rel, env);
                let scope = env.nest(rel.schema.clone());
                let constructor = self.infer_rex(constructor, &scope);
                let ty = collection_of(rel.ordered, constructor.ty.clone());
                TypedRex::new(ty, TypedRexOp::Select(Box::new(rel), Box::new(constructor)), *span)
            }

            Rex::Subquery(rel, constructor, coercion, span) => {
                let rel = self.infer_rel(rel, env);
                let scope = env.nest(rel.schema.clone());
                let constructor = self.infer_rex(constructor, &scope);
                let ty = match coercion {
                    SubqueryCoercion::Scalar => self.scalar_subquery_type(&constructor.ty, *span),
                    SubqueryCoercion::Row => constructor.ty.clone(),
                    SubqueryCoercion::Collection => collection_of(rel.ordered, constructor.ty.clone()),
                };
                TypedRex::new(
                    ty,
                    TypedRexOp::Subquery(Box::new(rel), Box::new(constructor), *coercion),
                    *span,
                )
            }

            Rex::Window(name, args, span) => {
                let args = args.iter().map(|a| self.infer_rex(a, env)).collect();
                self.error(
                    ProblemKind::FeatureNotSupported {
                        feature: format!("window function `{name}`"),
                    },
                    *span,
                );
                TypedRex::new(StaticType::Any, TypedRexOp::Unsupported(name.clone(), args), *span)
            }
        }
    }

    fn infer_var(&mut self, ident: &Identifier, span: Span, env: &TypeEnv<'_>) -> TypedRex {
        if let Some(found) = env.resolve(ident) {
            let mut typed = TypedRex::new(
                found.ty,
                TypedRexOp::Local {
                    name: found.name,
                    depth: found.depth,
                    ordinal: found.ordinal,
                },
                span,
            );
            for part in found.implicit_field.into_iter().chain(found.residual) {
                typed = self.field_step(typed, part, span);
            }
            return typed;
        }

        if let Some(entry) = self.catalog.lookup(&ident.parts) {
            let mut typed = TypedRex::new(entry.ty, TypedRexOp::Global { name: entry.name }, span);
            for part in ident.parts.iter().skip(entry.matched) {
                typed = self.field_step(typed, part.clone(), span);
            }
            return typed;
        }

        self.error(
            ProblemKind::VarRefNotFound {
                name: ident.to_string(),
                visible: env.visible_names(),
            },
            span,
        );
        TypedRex::new(StaticType::Any, TypedRexOp::Unresolved(ident.clone()), span)
    }

    fn infer_step(&mut self, root: TypedRex, step: &PathStep, span: Span, env: &TypeEnv<'_>) -> TypedRex {
        match step {
            PathStep::Field(part) => self.field_step(root, part.clone(), span),
            PathStep::Index(key) => {
                let key_t = self.infer_rex(key, env);
                let ty = if matches!(key, Rex::Lit(..) | Rex::Cast(..)) {
                    self.index_type(&root.ty, key, &key_t.ty, span)
                } else {
                    self.never_succeeds(&root.ty, span)
                };
                TypedRex::new(ty, TypedRexOp::Path(Box::new(root), TypedPathStep::Index(Box::new(key_t))), span)
            }
            PathStep::Wildcard => {
                let elements = root.ty.members().into_iter().filter(|m| !m.is_absent()).map(|m| match m {
                    StaticType::Bag(e) | StaticType::List(e) | StaticType::Sexp(e) => (**e).clone(),
                    other => other.clone(),
                });
                let ty = StaticType::bag(StaticType::union(elements));
                TypedRex::new(ty, TypedRexOp::Path(Box::new(root), TypedPathStep::Wildcard), span)
            }
            PathStep::Unpivot => {
                let ty = StaticType::bag(unpivot_values(&root.ty));
                TypedRex::new(ty, TypedRexOp::Path(Box::new(root), TypedPathStep::Unpivot), span)
            }
        }
    }

    fn field_step(&mut self, root: TypedRex, part: IdentPart, span: Span) -> TypedRex {
        let ty = match root.ty.field_type(&part) {
            Some(ty) => ty,
            None => {
                // An absent root was either reported already or is a NULL literal
                if !root.ty.is_absent() {
                    self.error(
                        ProblemKind::AlwaysMissing {
                            reason: format!("{} has no field `{part}`", root.ty),
                        },
                        span,
                    );
                }
                StaticType::Missing
            }
        };
        TypedRex::new(ty, TypedRexOp::Path(Box::new(root), TypedPathStep::Field(part)), span)
    }

    fn index_type(&mut self, root: &StaticType, key: &Rex, key_ty: &StaticType, span: Span) -> StaticType {
        if let Rex::Lit(Literal::String(name) | Literal::Symbol(name), _) = key {
            let part = IdentPart::delimited(name.clone());
            return match root.field_type(&part) {
                Some(ty) => ty,
                None => {
                    self.error(
                        ProblemKind::AlwaysMissing {
                            reason: format!("{root} has no field `{name}`"),
                        },
                        span,
                    );
                    StaticType::Missing
                }
            };
        }

        let mut found = Vec::new();
        let mut absent = false;
        for member in root.members() {
            match member {
                StaticType::Any => found.push(StaticType::Any),
                StaticType::List(e) | StaticType::Sexp(e) if key_ty.may_be_integer() => found.push((**e).clone()),
                StaticType::Struct(s) if key_ty.may_be(|k| k.is_text()) => {
                    found.extend(s.fields.iter().map(|f| f.ty.clone()));
                    if !s.is_closed() {
                        found.push(StaticType::Any);
                    }
                }
                _ => absent = true,
            }
        }
        if found.is_empty() {
            return self.never_succeeds(root, span);
        }
        if absent {
            found.push(StaticType::Missing);
        }
        StaticType::union(found)
    }

    fn never_succeeds(&mut self, root: &StaticType, span: Span) -> StaticType {
        self.error(ProblemKind::PathIndexNeverSucceeds { root: root.clone() }, span);
        StaticType::Missing
    }

    /// Type a call to a scalar function.
    fn infer_call(&mut self, name: &str, args: Vec<TypedRex>, span: Span) -> TypedRex {
        let arg_types: Vec<StaticType> = args.iter().map(|a| a.ty.clone()).collect();
        let variants = self.registry.variants_for(name);
        let (matched, ty) = match self.resolver.resolve(name, variants, &arg_types) {
            Ok(matched) => {
                let ty = self.call_type(&matched, &arg_types, span);
                (matched, ty)
            }
            Err(err) => {
                let ty = self.internal_fault(err, span);
                let matched = FnMatch::Error {
                    name: name.to_string(),
                    args: arg_types,
                };
                (matched, ty)
            }
        };
        TypedRex::new(
            ty,
            TypedRexOp::Call {
                name: name.to_string(),
                matched,
                args,
            },
            span,
        )
    }

    /// Result type of a resolved call.
    pub(crate) fn call_type(&mut self, matched: &FnMatch, args: &[StaticType], span: Span) -> StaticType {
        let (signatures, is_missable): (Vec<&FnSignature>, bool) = match matched {
            FnMatch::Ok {
                signature, is_missable, ..
            } => (vec![signature.as_ref()], *is_missable),
            FnMatch::Dynamic {
                candidates,
                is_missable,
            } => (candidates.iter().map(|c| c.signature.as_ref()).collect(), *is_missable),
            FnMatch::Error { name, args } => {
                self.error(
                    ProblemKind::FunctionTypeMismatch {
                        name: name.clone(),
                        args: args.clone(),
                    },
                    span,
                );
                return StaticType::Missing;
            }
        };

        let returns = StaticType::union(signatures.iter().map(|s| s.returns.clone()));
        let missing_call = signatures.iter().all(|s| s.is_missing_call);
        if missing_call {
            if let Some(position) = args.iter().position(StaticType::is_missing) {
                let name = signatures.first().map(|s| s.name.as_str()).unwrap_or_default();
                self.error(
                    ProblemKind::AlwaysMissing {
                        reason: format!("argument {} of `{name}` is always MISSING", position + 1),
                    },
                    span,
                );
                return returns;
            }
        }

        let mut members = vec![returns];
        let null_call = signatures.iter().any(|s| s.is_null_call);
        if signatures.iter().any(|s| s.is_nullable) || (null_call && args.iter().any(StaticType::may_be_null)) {
            members.push(StaticType::Null);
        }
        // Bodies that handle absent arguments themselves never produce MISSING
        // unless declared missable
        let propagates = signatures.iter().any(|s| s.is_missing_call || s.is_missable);
        if propagates && (is_missable || args.iter().any(StaticType::may_be_missing)) {
            members.push(StaticType::Missing);
        }
        StaticType::union(members)
    }

    fn infer_cast(&mut self, operand: TypedRex, target: &TypeExpr, span: Span) -> TypedRex {
        let Some(target_ty) = resolve_type(target) else {
            self.error(
                ProblemKind::FeatureNotSupported {
                    feature: format!("CAST to {}", type_expr_name(target)),
                },
                span,
            );
            return TypedRex::new(StaticType::Any, TypedRexOp::Cast(Box::new(operand), StaticType::Any), span);
        };

        let ty = if operand.ty.is_absent() {
            operand.ty.clone()
        } else {
            self.cast_type(&operand.ty, &target_ty, span)
        };
        TypedRex::new(ty, TypedRexOp::Cast(Box::new(operand), target_ty), span)
    }

    fn cast_type(&mut self, from: &StaticType, target: &StaticType, span: Span) -> StaticType {
        let Some(target_kind) = target.kind() else {
            return target.clone();
        };
        let lattice = TypeLattice::standard();
        let mut members = Vec::new();
        let mut possible = false;
        for member in from.members() {
            match member.kind() {
                Some(kind) if kind.is_absent() => members.push(member.clone()),
                // Any runtime kind, including ones that cast unsafely
                Some(TypeKind::Any) if target_kind != TypeKind::Any => {
                    possible = true;
                    members.extend([StaticType::Null, StaticType::Missing]);
                }
                Some(kind) => match lattice.relationship(kind, target_kind) {
                    Some(CastRelationship::Unsafe) => {
                        possible = true;
                        members.push(StaticType::Missing);
                    }
                    Some(_) => possible = true,
                    None => members.push(StaticType::Missing),
                },
                None => {}
            }
        }
        if !possible {
            self.error(
                ProblemKind::AlwaysMissing {
                    reason: format!("{from} cannot be cast to {target}"),
                },
                span,
            );
            return StaticType::Missing;
        }
        members.push(target.clone());
        StaticType::union(members)
    }

    fn infer_struct(&mut self, pairs: &[(Rex, Rex)], span: Span, env: &TypeEnv<'_>) -> TypedRex {
        let mut typed = Vec::with_capacity(pairs.len());
        let mut fields = Vec::new();
        let mut closed = true;
        for (key, value) in pairs {
            let key_t = self.infer_rex(key, env);
            let value_t = self.infer_rex(value, env);
            match key {
                Rex::Lit(Literal::String(name) | Literal::Symbol(name), _) => {
                    // A MISSING value drops the field
                    if !value_t.ty.is_missing() {
                        fields.push(StructField::new(name.clone(), value_t.ty.clone()));
                    }
                }
                _ => {
                    if !key_t.ty.may_be(|k| k.is_text()) {
                        self.error(
                            ProblemKind::TypeMismatch {
                                context: "struct key".to_string(),
                                expected: "a string".to_string(),
                                found: key_t.ty.clone(),
                            },
                            key_t.span,
                        );
                    }
                    closed = false;
                }
            }
            typed.push((key_t, value_t));
        }
        let shape = if closed {
            StructType::closed(fields)
        } else {
            StructType::open(fields)
        };
        TypedRex::new(StaticType::Struct(shape), TypedRexOp::Struct(typed), span)
    }

    fn scalar_subquery_type(&mut self, row: &StaticType, span: Span) -> StaticType {
        match row {
            StaticType::Struct(s) if s.is_closed() => {
                if let [only] = s.fields.as_slice() {
                    only.ty.clone().or(StaticType::Null)
                } else {
                    self.error(
                        ProblemKind::DegreeViolation {
                            expected: 1,
                            actual: s.fields.len(),
                        },
                        span,
                    );
                    StaticType::Any
                }
            }
            StaticType::Struct(_) | StaticType::Any => StaticType::Any,
            other => other.clone().or(StaticType::Null),
        }
    }

    /// Report a non-boolean condition.
    pub(crate) fn expect_bool(&mut self, rex: &TypedRex, context: &str) {
        if !rex.ty.may_be_bool() && !rex.ty.is_absent() {
            self.error(
                ProblemKind::TypeMismatch {
                    context: context.to_string(),
                    expected: "BOOL".to_string(),
                    found: rex.ty.clone(),
                },
                rex.span,
            );
        }
    }
}

fn collection_of(ordered: bool, element: StaticType) -> StaticType {
    if ordered {
        StaticType::list(element)
    } else {
        StaticType::bag(element)
    }
}

/// Union of the values an `UNPIVOT` of `ty` can produce.
pub(crate) fn unpivot_values(ty: &StaticType) -> StaticType {
    let mut values = Vec::new();
    for member in ty.members() {
        match member {
            StaticType::Struct(s) => {
                values.extend(s.fields.iter().map(|f| f.ty.clone()));
                if !s.is_closed() {
                    values.push(StaticType::Any);
                }
            }
            StaticType::Null | StaticType::Missing => {}
            other => values.push(other.clone()),
        }
    }
    StaticType::union(values)
}

/// Type of a literal value.
pub fn literal_type(lit: &Literal) -> StaticType {
    match lit {
        Literal::Null => StaticType::Null,
        Literal::Missing => StaticType::Missing,
        Literal::Bool(_) => StaticType::Bool,
        Literal::Int(v) => {
            if i32::try_from(*v).is_ok() {
                StaticType::Int
            } else {
                StaticType::BigInt
            }
        }
        Literal::Decimal { unscaled, scale } => {
            let digits = unscaled.unsigned_abs().to_string().len().min(38) as u8;
            let precision = digits.max(*scale).max(1);
            StaticType::Decimal {
                precision,
                scale: (*scale).min(precision),
            }
        }
        Literal::Float(_) => StaticType::Float64,
        Literal::String(_) => StaticType::String(None),
        Literal::Symbol(_) => StaticType::Symbol,
        Literal::Date(_) => StaticType::Date,
        Literal::Timestamp(_) => StaticType::Timestamp,
    }
}

/// Resolve a type expression from a `CAST`.
pub fn resolve_type(ty: &TypeExpr) -> Option<StaticType> {
    let resolved = match ty {
        TypeExpr::Named(name) => match name.to_uppercase().as_str() {
            "ANY" => StaticType::Any,
            "NULL" => StaticType::Null,
            "MISSING" => StaticType::Missing,
            "BOOL" | "BOOLEAN" => StaticType::Bool,
            "TINYINT" | "INT1" => StaticType::TinyInt,
            "SMALLINT" | "INT2" => StaticType::SmallInt,
            "INT" | "INTEGER" | "INT4" => StaticType::Int,
            "BIGINT" | "INT8" => StaticType::BigInt,
            "DECIMAL" | "NUMERIC" => StaticType::DecimalArbitrary,
            "REAL" | "FLOAT32" => StaticType::Float32,
            "FLOAT" | "DOUBLE" | "DOUBLE PRECISION" | "FLOAT64" => StaticType::Float64,
            "CHAR" | "CHARACTER" => StaticType::Char(1),
            "STRING" | "VARCHAR" | "TEXT" => StaticType::String(None),
            "SYMBOL" => StaticType::Symbol,
            "CLOB" => StaticType::Clob,
            "BINARY" => StaticType::Binary(None),
            "BLOB" => StaticType::Blob,
            "DATE" => StaticType::Date,
            "TIME" => StaticType::Time,
            "TIMESTAMP" => StaticType::Timestamp,
            "BAG" => StaticType::bag(StaticType::Any),
            "LIST" | "ARRAY" => StaticType::list(StaticType::Any),
            "SEXP" => StaticType::Sexp(Box::new(StaticType::Any)),
            "STRUCT" | "TUPLE" => StaticType::Struct(StructType::open(Vec::new())),
            _ => return None,
        },
        TypeExpr::Decimal { precision, scale } => StaticType::Decimal {
            precision: *precision,
            scale: *scale,
        },
        TypeExpr::Char(n) => StaticType::Char(*n),
        TypeExpr::VarChar(n) => StaticType::String(Some(*n)),
        TypeExpr::List(inner) => StaticType::list(resolve_type(inner)?),
        TypeExpr::Bag(inner) => StaticType::bag(resolve_type(inner)?),
        TypeExpr::Sexp(inner) => StaticType::Sexp(Box::new(resolve_type(inner)?)),
        TypeExpr::Struct(fields) => {
            let fields = fields
                .iter()
                .map(|(name, ty)| Some(StructField::new(name.clone(), resolve_type(ty)?)))
                .collect::<Option<Vec<_>>>()?;
            StaticType::Struct(StructType::closed(fields))
        }
    };
    Some(resolved)
}

fn type_expr_name(ty: &TypeExpr) -> String {
    match ty {
        TypeExpr::Named(name) => name.clone(),
        TypeExpr::Decimal { precision, scale } => format!("DECIMAL({precision},{scale})"),
        TypeExpr::Char(n) => format!("CHAR({n})"),
        TypeExpr::VarChar(n) => format!("VARCHAR({n})"),
        TypeExpr::List(inner) => format!("LIST<{}>", type_expr_name(inner)),
        TypeExpr::Bag(inner) => format!("BAG<{}>", type_expr_name(inner)),
        TypeExpr::Sexp(inner) => format!("SEXP<{}>", type_expr_name(inner)),
        TypeExpr::Struct(_) => "STRUCT".to_string(),
    }
}

#[cfg(test)]
mod tests {
    use sable_plan::{BinOp, UnaryOp};

    use super::*;
    use crate::catalog::{MemoryCatalog, Session};
    use crate::config::TyperConfig;
    use crate::env::Binding;
    use crate::error::{Problem, ProblemCollector, Severity};
    use crate::registry::FunctionRegistry;

    fn infer_with(rex: &Rex, bindings: Vec<Binding>) -> (TypedRex, Vec<Problem>) {
        let catalog = MemoryCatalog::new();
        let session = Session::default();
        let config = TyperConfig::default();
        let mut sink = ProblemCollector::new();
        let typed = {
            let mut checker = Checker::new(&catalog, FunctionRegistry::builtins(), &config, &session, &mut sink);
            let env = TypeEnv::new(bindings);
            checker.infer_rex(rex, &env)
        };
        (typed, sink.into_problems())
    }

    fn infer(rex: &Rex) -> (TypedRex, Vec<Problem>) {
        infer_with(rex, Vec::new())
    }

    fn codes(problems: &[Problem]) -> Vec<&'static str> {
        problems.iter().map(|p| p.kind.code()).collect()
    }

    #[test]
    fn test_literals() {
        assert_eq!(literal_type(&Literal::Int(1)), StaticType::Int);
        assert_eq!(literal_type(&Literal::Int(1 << 40)), StaticType::BigInt);
        assert_eq!(
            literal_type(&Literal::Decimal { unscaled: 15, scale: 1 }),
            StaticType::Decimal { precision: 2, scale: 1 }
        );
        assert_eq!(
            literal_type(&Literal::Decimal { unscaled: 5, scale: 3 }),
            StaticType::Decimal { precision: 3, scale: 3 }
        );
        assert_eq!(literal_type(&Literal::String("x".into())), StaticType::String(None));
    }

    #[test]
    fn test_bitwise_and_with_missing() {
        let rex = Rex::binary(Rex::int(1), BinOp::BitAnd, Rex::missing());
        let (typed, problems) = infer(&rex);
        assert_eq!(typed.ty, StaticType::Int);
        assert_eq!(codes(&problems), vec!["sable::always_missing"]);
        assert_eq!(problems[0].severity, Severity::Error);
        match typed.op {
            TypedRexOp::Call { matched: FnMatch::Ok { signature, .. }, .. } => {
                assert_eq!(signature.to_string(), "bitwise_and(INT4, INT4) -> INT4");
            }
            other => panic!("expected resolved call, got {other:?}"),
        }
    }

    #[test]
    fn test_nullable_argument_propagates_null() {
        let rex = Rex::binary(Rex::name("x"), BinOp::Add, Rex::int(1));
        let (typed, problems) = infer_with(&rex, vec![Binding::new("x", StaticType::Int.or(StaticType::Null))]);
        assert!(problems.is_empty());
        assert_eq!(typed.ty, StaticType::Int.or(StaticType::Null));
    }

    #[test]
    fn test_is_null_is_never_absent() {
        let rex = Rex::unary(UnaryOp::IsNull, Rex::null());
        let (typed, problems) = infer(&rex);
        assert!(problems.is_empty());
        assert_eq!(typed.ty, StaticType::Bool);
    }

    #[test]
    fn test_unknown_function() {
        let (typed, problems) = infer(&Rex::call("frobnicate", vec![Rex::int(1)]));
        assert_eq!(typed.ty, StaticType::Missing);
        assert_eq!(codes(&problems), vec!["sable::function_type_mismatch"]);
    }

    #[test]
    fn test_no_applicable_variant() {
        let (typed, problems) = infer(&Rex::call("upper", vec![Rex::int(1)]));
        assert_eq!(typed.ty, StaticType::Missing);
        assert_eq!(codes(&problems), vec!["sable::function_type_mismatch"]);
    }

    #[test]
    fn test_undefined_variable_is_any() {
        let (typed, problems) = infer_with(&Rex::name("nope").dot("a"), vec![Binding::new("t", StaticType::Int)]);
        assert_eq!(typed.ty, StaticType::Any);
        assert_eq!(codes(&problems), vec!["sable::var_ref_not_found"]);
        match &problems[0].kind {
            ProblemKind::VarRefNotFound { visible, .. } => assert_eq!(visible, &vec!["t".to_string()]),
            other => panic!("unexpected {other:?}"),
        }
    }

    #[test]
    fn test_duplicate_field_path() {
        let row = StaticType::row([("a", StaticType::Int), ("a", StaticType::String(None))]);
        let both = StaticType::Int.or(StaticType::String(None));
        let bindings = || vec![Binding::new("t", row.clone())];

        let (typed, problems) = infer_with(&Rex::name("t").dot("a"), bindings());
        assert_eq!(typed.ty, both);
        assert!(problems.is_empty());

        let (typed, _) = infer_with(&Rex::name("t").dot_quoted("a"), bindings());
        assert_eq!(typed.ty, both);

        let (typed, problems) = infer_with(&Rex::name("t").dot_quoted("A"), bindings());
        assert_eq!(typed.ty, StaticType::Missing);
        assert_eq!(codes(&problems), vec!["sable::always_missing"]);
    }

    #[test]
    fn test_implicit_field_reference() {
        let row = StaticType::row([("a", StaticType::Int)]);
        let (typed, problems) = infer_with(&Rex::name("a"), vec![Binding::new("t", row)]);
        assert!(problems.is_empty());
        assert_eq!(typed.ty, StaticType::Int);
        assert!(matches!(typed.op, TypedRexOp::Path(_, TypedPathStep::Field(_))));
    }

    #[test]
    fn test_index_requires_literal_key() {
        let list = StaticType::list(StaticType::Int);
        let bindings = || vec![Binding::new("l", list.clone()), Binding::new("i", StaticType::Int)];

        let (typed, problems) = infer_with(&Rex::name("l").index(Rex::int(0)), bindings());
        assert_eq!(typed.ty, StaticType::Int);
        assert!(problems.is_empty());

        let (typed, problems) = infer_with(&Rex::name("l").index(Rex::name("i")), bindings());
        assert_eq!(typed.ty, StaticType::Missing);
        assert_eq!(codes(&problems), vec!["sable::path_index_never_succeeds"]);

        let cast_key = Rex::name("i").cast(TypeExpr::Named("INT".into()));
        let (typed, problems) = infer_with(&Rex::name("l").index(cast_key), bindings());
        assert_eq!(typed.ty, StaticType::Int);
        assert!(problems.is_empty());
    }

    #[test]
    fn test_string_index_is_case_sensitive_key() {
        let row = StaticType::row([("Name", StaticType::String(None))]);
        let (typed, problems) = infer_with(&Rex::name("t").index(Rex::string("Name")), vec![Binding::new("t", row)]);
        assert!(problems.is_empty());
        assert_eq!(typed.ty, StaticType::String(None));
    }

    #[test]
    fn test_wildcard_and_unpivot_paths() {
        let row = StaticType::row([("a", StaticType::Int), ("b", StaticType::Bool)]);
        let bindings = || vec![Binding::new("l", StaticType::list(row.clone())), Binding::new("s", row.clone())];

        let (typed, _) = infer_with(&Rex::name("l").step(PathStep::Wildcard), bindings());
        assert_eq!(typed.ty, StaticType::bag(row.clone()));

        let (typed, _) = infer_with(&Rex::name("s").step(PathStep::Unpivot), bindings());
        assert_eq!(typed.ty, StaticType::bag(StaticType::Int.or(StaticType::Bool)));
    }

    #[test]
    fn test_cast_relationships() {
        let (typed, problems) = infer(&Rex::int(1).cast(TypeExpr::Named("BIGINT".into())));
        assert_eq!(typed.ty, StaticType::BigInt);
        assert!(problems.is_empty());

        let (typed, _) = infer(&Rex::string("12").cast(TypeExpr::Named("INT".into())));
        assert_eq!(typed.ty, StaticType::Int.or(StaticType::Missing));

        let (typed, problems) = infer(&Rex::int(1).cast(TypeExpr::Named("DATE".into())));
        assert_eq!(typed.ty, StaticType::Missing);
        assert_eq!(codes(&problems), vec!["sable::always_missing"]);

        let (typed, problems) = infer(&Rex::null().cast(TypeExpr::Named("INT".into())));
        assert_eq!(typed.ty, StaticType::Null);
        assert!(problems.is_empty());
    }

    #[test]
    fn test_cast_from_any_may_fail() {
        let rex = Rex::name("x").cast(TypeExpr::Named("INT".into()));
        let (typed, problems) = infer_with(&rex, vec![Binding::new("x", StaticType::Any)]);
        assert!(problems.is_empty(), "{problems:?}");
        assert_eq!(
            typed.ty,
            StaticType::union([StaticType::Int, StaticType::Null, StaticType::Missing])
        );

        let rex = Rex::name("x").cast(TypeExpr::Named("ANY".into()));
        let (typed, _) = infer_with(&rex, vec![Binding::new("x", StaticType::Any)]);
        assert_eq!(typed.ty, StaticType::Any);
    }

    #[test]
    fn test_case_prunes_literal_branches() {
        let rex = Rex::Case(
            vec![
                (Rex::bool(false), Rex::string("never")),
                (Rex::name("c"), Rex::int(1)),
                (Rex::bool(true), Rex::int(2).cast(TypeExpr::Named("BIGINT".into()))),
                (Rex::name("c"), Rex::bool(true)),
            ],
            Some(Box::new(Rex::null())),
            Span::default(),
        );
        let (typed, problems) = infer_with(&rex, vec![Binding::new("c", StaticType::Bool)]);
        assert!(problems.is_empty());
        assert_eq!(typed.ty, StaticType::Int.or(StaticType::BigInt));
    }

    #[test]
    fn test_case_without_else_adds_null() {
        let rex = Rex::Case(vec![(Rex::name("c"), Rex::int(1))], None, Span::default());
        let (typed, _) = infer_with(&rex, vec![Binding::new("c", StaticType::Bool)]);
        assert_eq!(typed.ty, StaticType::Int.or(StaticType::Null));
    }

    #[test]
    fn test_case_condition_must_be_bool() {
        let rex = Rex::Case(vec![(Rex::int(1), Rex::int(1))], Some(Box::new(Rex::int(2))), Span::default());
        let (typed, problems) = infer(&rex);
        assert_eq!(typed.ty, StaticType::Int);
        assert_eq!(codes(&problems), vec!["sable::type_mismatch"]);
    }

    #[test]
    fn test_coalesce_and_nullif() {
        let nullable = StaticType::Int.or(StaticType::Null);
        let bindings = || vec![Binding::new("x", nullable.clone()), Binding::new("y", StaticType::String(None).or(StaticType::Null))];

        let rex = Rex::Coalesce(vec![Rex::name("x"), Rex::name("y")], Span::default());
        let (typed, _) = infer_with(&rex, bindings());
        assert_eq!(
            typed.ty,
            StaticType::union([StaticType::Int, StaticType::String(None), StaticType::Null])
        );

        let rex = Rex::Coalesce(vec![Rex::name("x"), Rex::int(0)], Span::default());
        let (typed, _) = infer_with(&rex, bindings());
        assert_eq!(typed.ty, StaticType::Int);

        let rex = Rex::NullIf(Box::new(Rex::int(1)), Box::new(Rex::int(2)), Span::default());
        let (typed, _) = infer(&rex);
        assert_eq!(typed.ty, nullable);
    }

    #[test]
    fn test_collection_constructors() {
        let rex = Rex::Collection(CollectionKind::List, vec![Rex::int(1), Rex::string("a")], Span::default());
        let (typed, _) = infer(&rex);
        assert_eq!(typed.ty, StaticType::list(StaticType::Int.or(StaticType::String(None))));

        let rex = Rex::Collection(CollectionKind::Bag, Vec::new(), Span::default());
        let (typed, _) = infer(&rex);
        assert_eq!(typed.ty, StaticType::bag(StaticType::Any));
    }

    #[test]
    fn test_struct_constructor() {
        let rex = Rex::struct_of([("a", Rex::int(1)), ("a", Rex::string("x")), ("gone", Rex::missing())]);
        let (typed, _) = infer(&rex);
        let s = typed.ty.as_struct().unwrap();
        assert!(s.is_closed());
        assert!(!s.constraints.unique);
        assert_eq!(s.names(), vec!["a", "a"]);

        let rex = Rex::Struct(vec![(Rex::name("k"), Rex::int(1))], Span::default());
        let (typed, problems) = infer_with(&rex, vec![Binding::new("k", StaticType::String(None))]);
        assert!(problems.is_empty());
        assert!(!typed.ty.as_struct().unwrap().is_closed());
    }

    #[test]
    fn test_tuple_union() {
        let rex = Rex::TupleUnion(
            vec![
                Rex::struct_of([("a", Rex::int(1))]),
                Rex::struct_of([("a", Rex::bool(true)), ("b", Rex::int(2))]),
            ],
            Span::default(),
        );
        let (typed, _) = infer(&rex);
        let s = typed.ty.as_struct().unwrap();
        assert_eq!(s.names(), vec!["a", "a", "b"]);
        assert!(!s.constraints.unique);

        let rex = Rex::TupleUnion(vec![Rex::struct_of([("a", Rex::int(1))]), Rex::name("o")], Span::default());
        let (typed, _) = infer_with(&rex, vec![Binding::new("o", StaticType::Any)]);
        assert_eq!(typed.ty, StaticType::Any);
    }

    #[test]
    fn test_window_not_supported() {
        let (typed, problems) = infer(&Rex::Window("rank".into(), Vec::new(), Span::default()));
        assert_eq!(typed.ty, StaticType::Any);
        assert_eq!(codes(&problems), vec!["sable::feature_not_supported"]);
    }

    #[test]
    fn test_resolve_type_expressions() {
        assert_eq!(resolve_type(&TypeExpr::Named("integer".into())), Some(StaticType::Int));
        assert_eq!(
            resolve_type(&TypeExpr::List(Box::new(TypeExpr::VarChar(10)))),
            Some(StaticType::list(StaticType::String(Some(10))))
        );
        assert_eq!(resolve_type(&TypeExpr::Named("GEOMETRY".into())), None);
    }
}
