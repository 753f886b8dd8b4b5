//! Plan typer for Sable statements.
//!
//! [`PlanTyper`] walks an unresolved plan bottom-up. Each relational operator
//! produces a schema that becomes the innermost scope of the expressions
//! above it; each expression is typed against that scope, the catalog and
//! the function registry. Problems go to a [`DiagnosticSink`] and typing
//! always runs to completion.

use sable_plan::{AggCall, Literal, PathStep, Rel, Rex, Span, Statement};
use tracing::{debug, warn};

use crate::catalog::{Catalog, CatalogCache, Session};
use crate::config::TyperConfig;
use crate::env::{Binding, TypeEnv};
use crate::error::{DiagnosticSink, Problem, ProblemCollector, ProblemKind, ResolveError};
use crate::exclude::exclude_bindings;
use crate::inference::unpivot_values;
use crate::lattice::TypeLattice;
use crate::registry::FunctionRegistry;
use crate::resolver::FnResolver;
use crate::signature::FnMatch;
use crate::typed::{TypedAggCall, TypedRel, TypedRelOp, TypedRex, TypedStatement};
use crate::types::StaticType;

/// Type a statement against `catalog` with the builtin functions and
/// default options.
pub fn check_statement(catalog: &dyn Catalog, statement: &Statement) -> (TypedStatement, Vec<Problem>) {
    let typer = PlanTyper::new(catalog, FunctionRegistry::builtins(), TyperConfig::default());
    let mut problems = ProblemCollector::new();
    let typed = typer.type_statement(statement, &Session::default(), &mut problems);
    (typed, problems.into_problems())
}

/// Assigns static types to plans.
pub struct PlanTyper<'a> {
    catalog: &'a dyn Catalog,
    registry: &'a FunctionRegistry,
    config: TyperConfig,
}

impl<'a> PlanTyper<'a> {
    pub fn new(catalog: &'a dyn Catalog, registry: &'a FunctionRegistry, config: TyperConfig) -> Self {
        Self {
            catalog,
            registry,
            config,
        }
    }

    pub fn config(&self) -> &TyperConfig {
        &self.config
    }

    /// Type `statement`, reporting problems to `sink`.
    pub fn type_statement(
        &self,
        statement: &Statement,
        session: &Session,
        sink: &mut dyn DiagnosticSink,
    ) -> TypedStatement {
        let mut checker = Checker::new(self.catalog, self.registry, &self.config, session, sink);
        let env = TypeEnv::default();
        let typed = match statement {
            Statement::Query(rex) => TypedStatement::Query(checker.infer_rex(rex, &env)),
        };
        debug!(
            ty = %typed.ty(),
            errors = checker.errors,
            warnings = checker.warnings,
            "typed statement"
        );
        typed
    }
}

/// State of one typing pass.
pub(crate) struct Checker<'a> {
    pub(crate) catalog: CatalogCache<'a>,
    pub(crate) registry: &'a FunctionRegistry,
    pub(crate) resolver: FnResolver<'a>,
    config: &'a TyperConfig,
    sink: &'a mut dyn DiagnosticSink,
    errors: usize,
    warnings: usize,
}

impl<'a> Checker<'a> {
    pub(crate) fn new(
        catalog: &'a dyn Catalog,
        registry: &'a FunctionRegistry,
        config: &'a TyperConfig,
        session: &'a Session,
        sink: &'a mut dyn DiagnosticSink,
    ) -> Self {
        let resolver = FnResolver::new(TypeLattice::standard(), config.match_policy.as_ref())
            .with_max_union_expansion(config.max_union_expansion);
        Self {
            catalog: CatalogCache::new(catalog, session),
            registry,
            resolver,
            config,
            sink,
            errors: 0,
            warnings: 0,
        }
    }

    pub(crate) fn error(&mut self, kind: ProblemKind, span: Span) {
        self.report(Problem::error(kind, span));
    }

    /// A resolver fault becomes an error and the node is typed `ANY`.
    pub(crate) fn internal_fault(&mut self, err: ResolveError, span: Span) -> StaticType {
        warn!(error = %err, "overload resolution fault");
        self.error(err.into(), span);
        StaticType::Any
    }

    /// Infer the output schema of a relational operator.
    pub(crate) fn infer_rel(&mut self, rel: &Rel, env: &TypeEnv<'_>) -> TypedRel {
        match rel {
            Rel::Scan(scan) => {
                let expr = self.infer_rex(&scan.expr, env);
                let mut schema = vec![Binding::new(scan.alias.clone(), scan_element(&expr.ty))];
                if let Some(at) = &scan.at {
                    let position = if is_ordered_collection(&expr.ty) {
                        StaticType::BigInt
                    } else {
                        StaticType::BigInt.or(StaticType::Missing)
                    };
                    schema.push(Binding::new(at.clone(), position));
                }
                TypedRel {
                    schema,
                    ordered: false,
                    op: TypedRelOp::Scan { expr },
                    span: scan.span,
                }
            }

            Rel::Unpivot(unpivot) => {
                let expr = self.infer_rex(&unpivot.expr, env);
                let schema = vec![
                    Binding::new(unpivot.alias.clone(), unpivot_values(&expr.ty)),
                    Binding::new(unpivot.at.clone(), StaticType::String(None)),
                ];
                TypedRel {
                    schema,
                    ordered: false,
                    op: TypedRelOp::Unpivot { expr },
                    span: unpivot.span,
                }
            }

            Rel::Filter(filter) => {
                let input = self.infer_rel(&filter.input, env);
                let scope = env.nest(input.schema.clone());
                let predicate = self.infer_rex(&filter.predicate, &scope);
                self.expect_bool(&predicate, "WHERE predicate");
                TypedRel {
                    schema: input.schema.clone(),
                    ordered: input.ordered,
                    op: TypedRelOp::Filter {
                        input: Box::new(input),
                        predicate,
                    },
                    span: filter.span,
                }
            }

            Rel::Project(project) => {
                let input = self.infer_rel(&project.input, env);
                let scope = env.nest(input.schema.clone());
                let mut schema = Vec::with_capacity(project.items.len());
                let mut items = Vec::with_capacity(project.items.len());
                for (i, item) in project.items.iter().enumerate() {
                    let typed = self.infer_rex(&item.expr, &scope);
                    let name = item
                        .alias
                        .clone()
                        .or_else(|| derived_name(&item.expr))
                        .unwrap_or_else(|| format!("_{}", i + 1));
                    schema.push(Binding::new(name, typed.ty.clone()));
                    items.push(typed);
                }
                TypedRel {
                    schema,
                    ordered: input.ordered,
                    op: TypedRelOp::Project {
                        input: Box::new(input),
                        items,
                    },
                    span: project.span,
                }
            }

            Rel::Sort(sort) => {
                let input = self.infer_rel(&sort.input, env);
                let scope = env.nest(input.schema.clone());
                let keys = sort
                    .keys
                    .iter()
                    .map(|(key, order)| (self.infer_rex(key, &scope), *order))
                    .collect();
                TypedRel {
                    schema: input.schema.clone(),
                    ordered: true,
                    op: TypedRelOp::Sort {
                        input: Box::new(input),
                        keys,
                    },
                    span: sort.span,
                }
            }

            Rel::Limit(limit) => {
                let input = self.infer_rel(&limit.input, env);
                let count = self.infer_rex(&limit.limit, env);
                self.expect_integer(&count, "LIMIT");
                TypedRel {
                    schema: input.schema.clone(),
                    ordered: input.ordered,
                    op: TypedRelOp::Limit {
                        input: Box::new(input),
                        limit: count,
                    },
                    span: limit.span,
                }
            }

            Rel::Offset(offset) => {
                let input = self.infer_rel(&offset.input, env);
                let count = self.infer_rex(&offset.offset, env);
                self.expect_integer(&count, "OFFSET");
                TypedRel {
                    schema: input.schema.clone(),
                    ordered: input.ordered,
                    op: TypedRelOp::Offset {
                        input: Box::new(input),
                        offset: count,
                    },
                    span: offset.span,
                }
            }

            Rel::Distinct(distinct) => {
                let input = self.infer_rel(&distinct.input, env);
                TypedRel {
                    schema: input.schema.clone(),
                    ordered: input.ordered,
                    op: TypedRelOp::Distinct { input: Box::new(input) },
                    span: distinct.span,
                }
            }

            Rel::Join(join) => {
                let left = self.infer_rel(&join.left, env);
                let right = if join.kind.allows_lateral() {
                    let lateral = env.nest(left.schema.clone());
                    self.infer_rel(&join.right, &lateral)
                } else {
                    self.infer_rel(&join.right, env)
                };
                // Outer joins keep both sides' field types unchanged
                let schema: Vec<Binding> = left.schema.iter().chain(&right.schema).cloned().collect();
                let condition = join.condition.as_ref().map(|condition| {
                    let scope = env.nest(schema.clone());
                    let typed = self.infer_rex(condition, &scope);
                    self.expect_bool(&typed, "JOIN condition");
                    typed
                });
                TypedRel {
                    schema,
                    ordered: false,
                    op: TypedRelOp::Join {
                        kind: join.kind,
                        left: Box::new(left),
                        right: Box::new(right),
                        condition,
                    },
                    span: join.span,
                }
            }

            Rel::Aggregate(aggregate) => {
                let input = self.infer_rel(&aggregate.input, env);
                let scope = env.nest(input.schema.clone());
                let mut schema = Vec::new();

                let mut calls = Vec::with_capacity(aggregate.calls.len());
                for (i, call) in aggregate.calls.iter().enumerate() {
                    let typed = self.infer_agg_call(call, &scope);
                    let name = call.alias.clone().unwrap_or_else(|| format!("_{}", i + 1));
                    schema.push(Binding::new(name, typed.ty.clone()));
                    calls.push(typed);
                }

                let mut groups = Vec::with_capacity(aggregate.groups.len());
                for (i, key) in aggregate.groups.iter().enumerate() {
                    let typed = self.infer_rex(&key.expr, &scope);
                    let name = key
                        .alias
                        .clone()
                        .or_else(|| derived_name(&key.expr))
                        .unwrap_or_else(|| format!("_{}", calls.len() + i + 1));
                    schema.push(Binding::new(name, typed.ty.clone()));
                    groups.push(typed);
                }

                if let Some(group_as) = &aggregate.group_as {
                    schema.push(Binding::new(group_as.clone(), StaticType::bag(input.row_type())));
                }

                TypedRel {
                    schema,
                    ordered: false,
                    op: TypedRelOp::Aggregate {
                        input: Box::new(input),
                        calls,
                        groups,
                    },
                    span: aggregate.span,
                }
            }

            Rel::SetOp(set_op) => {
                let left = self.infer_rel(&set_op.left, env);
                let right = self.infer_rel(&set_op.right, env);
                let schema = if left.schema.len() == right.schema.len() {
                    left.schema
                        .iter()
                        .zip(&right.schema)
                        .map(|(l, r)| Binding::new(l.name.clone(), l.ty.supertype(&r.ty)))
                        .collect()
                } else {
                    self.error(
                        ProblemKind::DegreeViolation {
                            expected: left.schema.len(),
                            actual: right.schema.len(),
                        },
                        set_op.span,
                    );
                    left.schema
                        .iter()
                        .map(|l| Binding::new(l.name.clone(), StaticType::Any))
                        .collect()
                };
                TypedRel {
                    schema,
                    ordered: false,
                    op: TypedRelOp::SetOp {
                        op: set_op.op,
                        quantifier: set_op.quantifier,
                        left: Box::new(left),
                        right: Box::new(right),
                    },
                    span: set_op.span,
                }
            }

            Rel::Exclude(exclude) => {
                let input = self.infer_rel(&exclude.input, env);
                let policy = self.config.exclude_policy;
                let schema = exclude_bindings(input.schema.clone(), &exclude.paths, policy, self);
                TypedRel {
                    schema,
                    ordered: input.ordered,
                    op: TypedRelOp::Exclude {
                        input: Box::new(input),
                        paths: exclude.paths.clone(),
                    },
                    span: exclude.span,
                }
            }
        }
    }

    fn infer_agg_call(&mut self, call: &AggCall, scope: &TypeEnv<'_>) -> TypedAggCall {
        let args: Vec<TypedRex> = call.args.iter().map(|a| self.infer_rex(a, scope)).collect();
        let arg_types: Vec<StaticType> = args.iter().map(|a| a.ty.clone()).collect();
        let variants = self.registry.aggregate_variants_for(&call.name);
        let (matched, ty) = match self.resolver.resolve(&call.name, variants, &arg_types) {
            Ok(matched) => {
                let ty = self.call_type(&matched, &arg_types, call.span);
                (matched, ty)
            }
            Err(err) => {
                let ty = self.internal_fault(err, call.span);
                let matched = FnMatch::Error {
                    name: call.name.clone(),
                    args: arg_types,
                };
                (matched, ty)
            }
        };
        TypedAggCall {
            name: call.name.clone(),
            matched,
            args,
            distinct: call.distinct,
            ty,
        }
    }

    fn expect_integer(&mut self, rex: &TypedRex, context: &str) {
        if !rex.ty.may_be_integer() && !rex.ty.is_absent() {
            self.error(
                ProblemKind::TypeMismatch {
                    context: context.to_string(),
                    expected: "an integer".to_string(),
                    found: rex.ty.clone(),
                },
                rex.span,
            );
        }
    }
}

impl DiagnosticSink for Checker<'_> {
    fn report(&mut self, problem: Problem) {
        if problem.is_error() {
            self.errors += 1;
        } else {
            self.warnings += 1;
        }
        self.sink.report(problem);
    }
}

/// Type each row of a scan binds: collection members yield their element,
/// anything else is scanned as a single value.
fn scan_element(ty: &StaticType) -> StaticType {
    StaticType::union(ty.members().into_iter().map(|member| match member {
        StaticType::Bag(e) | StaticType::List(e) | StaticType::Sexp(e) => (**e).clone(),
        other => other.clone(),
    }))
}

fn is_ordered_collection(ty: &StaticType) -> bool {
    ty.members()
        .into_iter()
        .filter(|m| !m.is_absent())
        .all(|m| matches!(m, StaticType::List(_) | StaticType::Sexp(_)))
}

/// Column name implied by an unaliased expression.
fn derived_name(rex: &Rex) -> Option<String> {
    match rex {
        Rex::Var(ident, _) => ident.parts.last().map(|p| p.text.clone()),
        Rex::Path(_, steps, _) => match steps.last() {
            Some(PathStep::Field(part)) => Some(part.text.clone()),
            Some(PathStep::Index(Rex::Lit(Literal::String(name), _))) => Some(name.clone()),
            _ => None,
        },
        _ => None,
    }
}

#[cfg(test)]
mod tests {
    use sable_plan::{
        AggregateRel, BinOp, ExcludePath, ExcludeStep, GroupKey, IdentPart, Identifier, JoinKind, Projection,
        SetOpKind, SetQuantifier, SortOrder, SubqueryCoercion,
    };

    use super::*;
    use crate::catalog::MemoryCatalog;
    use crate::config::ExcludePolicy;
    use crate::error::Severity;
    use crate::resolver::DeferTies;
    use crate::signature::FnSignature;
    use crate::typed::TypedRexOp;
    use crate::types::TypeKind;

    fn catalog() -> MemoryCatalog {
        MemoryCatalog::new()
            .with("t1", StaticType::bag(StaticType::row([("a", StaticType::Int)])))
            .with(
                "t2",
                StaticType::bag(StaticType::row([("b", StaticType::Decimal { precision: 2, scale: 1 })])),
            )
            .with(
                "people",
                StaticType::bag(StaticType::row([
                    ("name", StaticType::String(None)),
                    ("age", StaticType::Int.or(StaticType::Null)),
                    ("tags", StaticType::list(StaticType::String(None))),
                ])),
            )
            .with("readings", StaticType::list(StaticType::Float64))
    }

    fn check(rex: Rex) -> (TypedStatement, Vec<Problem>) {
        let catalog = catalog();
        check_statement(&catalog, &Statement::Query(rex))
    }

    fn check_with(rex: Rex, config: TyperConfig) -> (TypedStatement, Vec<Problem>) {
        let catalog = catalog();
        let typer = PlanTyper::new(&catalog, FunctionRegistry::builtins(), config);
        let mut problems = ProblemCollector::new();
        let typed = typer.type_statement(&Statement::Query(rex), &Session::default(), &mut problems);
        (typed, problems.into_problems())
    }

    fn codes(problems: &[Problem]) -> Vec<&'static str> {
        problems.iter().map(|p| p.kind.code()).collect()
    }

    fn select_rel(typed: &TypedStatement) -> &TypedRel {
        match typed {
            TypedStatement::Query(TypedRex {
                op: TypedRexOp::Select(rel, _),
                ..
            }) => rel,
            other => panic!("expected SELECT, got {other:?}"),
        }
    }

    fn item(expr: Rex, alias: Option<&str>) -> Projection {
        Projection {
            expr,
            alias: alias.map(str::to_string),
        }
    }

    #[test]
    fn test_left_join_star() {
        let rel = Rel::scan(Rex::name("t1"), "t1").join(
            JoinKind::Left,
            Rel::scan(Rex::name("t2"), "t2"),
            Some(Rex::bool(true)),
        );
        let star = Rex::TupleUnion(vec![Rex::name("t1"), Rex::name("t2")], Span::default());
        let (typed, problems) = check(Rex::select(rel, star));

        assert!(problems.is_empty(), "{problems:?}");
        let row = StaticType::row([
            ("a", StaticType::Int),
            ("b", StaticType::Decimal { precision: 2, scale: 1 }),
        ]);
        assert_eq!(typed.ty(), &StaticType::bag(row));
    }

    #[test]
    fn test_typing_is_idempotent() {
        let rel = Rel::scan(Rex::name("people"), "p").filter(Rex::binary(
            Rex::name("p").dot("age"),
            BinOp::Gt,
            Rex::int(30),
        ));
        let query = Rex::select(rel, Rex::name("p").dot("name"));
        let first = check(query.clone());
        let second = check(query);
        assert_eq!(first, second);
        assert_eq!(first.0.ty(), &StaticType::bag(StaticType::String(None)));
    }

    #[test]
    fn test_global_then_field() {
        let (typed, problems) = check(Rex::var(Identifier::qualified(["t1"])));
        assert!(problems.is_empty());
        assert_eq!(typed.ty(), &StaticType::bag(StaticType::row([("a", StaticType::Int)])));
    }

    #[test]
    fn test_unknown_table() {
        let (typed, problems) = check(Rex::select(Rel::scan(Rex::name("nope"), "n"), Rex::name("n")));
        assert_eq!(codes(&problems), vec!["sable::var_ref_not_found"]);
        assert_eq!(typed.ty(), &StaticType::bag(StaticType::Any));
    }

    #[test]
    fn test_where_must_be_bool() {
        let rel = Rel::scan(Rex::name("t1"), "t").filter(Rex::name("t").dot("a"));
        let (_, problems) = check(Rex::select(rel, Rex::name("t")));
        assert_eq!(codes(&problems), vec!["sable::type_mismatch"]);
    }

    #[test]
    fn test_projection_names() {
        let rel = Rel::scan(Rex::name("people"), "p").project(vec![
            item(Rex::name("p").dot("name"), None),
            item(Rex::name("p").dot("age"), Some("years")),
            item(Rex::int(1), None),
            item(Rex::name("age"), None),
        ]);
        let (typed, problems) = check(Rex::select(rel, Rex::name("years")));
        assert!(problems.is_empty(), "{problems:?}");
        let names: Vec<&str> = select_rel(&typed).schema.iter().map(|b| b.name.as_str()).collect();
        assert_eq!(names, vec!["name", "years", "_3", "age"]);
        assert_eq!(typed.ty(), &StaticType::bag(StaticType::Int.or(StaticType::Null)));
    }

    #[test]
    fn test_sort_produces_list() {
        let rel = Rel::scan(Rex::name("t1"), "t").sort(vec![(Rex::name("t").dot("a"), SortOrder::Desc)]);
        let (typed, _) = check(Rex::select(rel, Rex::name("t").dot("a")));
        assert_eq!(typed.ty(), &StaticType::list(StaticType::Int));
    }

    #[test]
    fn test_limit_must_be_integer() {
        let rel = Rel::scan(Rex::name("t1"), "t").limit(Rex::string("ten"));
        let (_, problems) = check(Rex::select(rel, Rex::name("t")));
        assert_eq!(codes(&problems), vec!["sable::type_mismatch"]);

        let rel = Rel::scan(Rex::name("t1"), "t").limit(Rex::int(10)).offset(Rex::int(5));
        let (_, problems) = check(Rex::select(rel, Rex::name("t")));
        assert!(problems.is_empty());
    }

    #[test]
    fn test_scan_position() {
        let (typed, _) = check(Rex::select(
            Rel::scan_at(Rex::name("readings"), "r", "i"),
            Rex::name("i"),
        ));
        assert_eq!(typed.ty(), &StaticType::bag(StaticType::BigInt));

        let (typed, _) = check(Rex::select(Rel::scan_at(Rex::name("t1"), "t", "i"), Rex::name("i")));
        assert_eq!(
            typed.ty(),
            &StaticType::bag(StaticType::BigInt.or(StaticType::Missing))
        );
    }

    #[test]
    fn test_scan_of_scalar_binds_value() {
        let (typed, _) = check(Rex::select(Rel::scan(Rex::int(1), "x"), Rex::name("x")));
        assert_eq!(typed.ty(), &StaticType::bag(StaticType::Int));
    }

    #[test]
    fn test_unpivot() {
        let row = Rex::struct_of([("a", Rex::int(1)), ("b", Rex::string("x"))]);
        let (typed, problems) = check(Rex::select(
            Rel::unpivot(row, "v", "k"),
            Rex::struct_of([("k", Rex::name("k")), ("v", Rex::name("v"))]),
        ));
        assert!(problems.is_empty(), "{problems:?}");
        let row = StaticType::row([
            ("k", StaticType::String(None)),
            ("v", StaticType::Int.or(StaticType::String(None))),
        ]);
        assert_eq!(typed.ty(), &StaticType::bag(row));
    }

    #[test]
    fn test_lateral_join_sees_left() {
        let rel = Rel::scan(Rex::name("people"), "p").join(
            JoinKind::Inner,
            Rel::scan(Rex::name("p").dot("tags"), "tag"),
            None,
        );
        let (typed, problems) = check(Rex::select(rel, Rex::name("tag")));
        assert!(problems.is_empty(), "{problems:?}");
        assert_eq!(typed.ty(), &StaticType::bag(StaticType::String(None)));

        let rel = Rel::scan(Rex::name("people"), "p").join(
            JoinKind::Full,
            Rel::scan(Rex::name("p").dot("tags"), "tag"),
            None,
        );
        let (_, problems) = check(Rex::select(rel, Rex::name("tag")));
        assert_eq!(codes(&problems), vec!["sable::var_ref_not_found"]);

        let rel = Rel::scan(Rex::name("people"), "p").join(
            JoinKind::Cross,
            Rel::scan(Rex::name("p").dot("tags"), "tag"),
            None,
        );
        let (_, problems) = check(Rex::select(rel, Rex::name("tag")));
        assert!(problems.is_empty(), "{problems:?}");
    }

    #[test]
    fn test_aggregate_schema() {
        let rel = Rel::Aggregate(AggregateRel {
            input: Box::new(Rel::scan(Rex::name("people"), "p")),
            calls: vec![
                AggCall::new("count_star", Vec::new()),
                AggCall::new("sum", vec![Rex::name("p").dot("age")]).alias("total"),
            ],
            groups: vec![GroupKey {
                expr: Rex::name("p").dot("name"),
                alias: None,
            }],
            group_as: Some("g".to_string()),
            span: Span::default(),
        });
        let (typed, problems) = check(Rex::select(rel, Rex::name("total")));
        assert!(problems.is_empty(), "{problems:?}");

        let schema = &select_rel(&typed).schema;
        let names: Vec<&str> = schema.iter().map(|b| b.name.as_str()).collect();
        assert_eq!(names, vec!["_1", "total", "name", "g"]);
        assert_eq!(schema[0].ty, StaticType::BigInt);
        assert_eq!(schema[1].ty, StaticType::Int.or(StaticType::Null));
        assert!(matches!(&schema[3].ty, StaticType::Bag(_)));
    }

    #[test]
    fn test_unknown_aggregate() {
        let rel = Rel::scan(Rex::name("t1"), "t").aggregate(
            vec![AggCall::new("median", vec![Rex::name("t").dot("a")])],
            Vec::new(),
        );
        let (_, problems) = check(Rex::select(rel, Rex::name("_1")));
        assert_eq!(codes(&problems), vec!["sable::function_type_mismatch"]);
    }

    #[test]
    fn test_set_op() {
        let left = Rel::scan(Rex::name("t1"), "t").project(vec![item(Rex::name("t").dot("a"), None)]);
        let right = Rel::scan(Rex::name("readings"), "r").project(vec![item(Rex::name("r"), Some("a"))]);
        let rel = left.set_op(SetOpKind::Union, SetQuantifier::All, right);
        let (typed, problems) = check(Rex::select(rel, Rex::name("a")));
        assert!(problems.is_empty(), "{problems:?}");
        assert_eq!(typed.ty(), &StaticType::bag(StaticType::Int.or(StaticType::Float64)));
    }

    #[test]
    fn test_set_op_degree() {
        let left = Rel::scan(Rex::name("t1"), "t").project(vec![item(Rex::name("t").dot("a"), None)]);
        let right = Rel::scan(Rex::name("people"), "p").project(vec![
            item(Rex::name("p").dot("name"), None),
            item(Rex::name("p").dot("age"), None),
        ]);
        let rel = left.set_op(SetOpKind::Except, SetQuantifier::Distinct, right);
        let (typed, problems) = check(Rex::select(rel, Rex::name("a")));
        assert_eq!(codes(&problems), vec!["sable::degree_violation"]);
        assert_eq!(typed.ty(), &StaticType::bag(StaticType::Any));
    }

    #[test]
    fn test_exclude() {
        let paths = vec![ExcludePath::new(
            IdentPart::regular("p"),
            vec![ExcludeStep::Field(IdentPart::regular("age"))],
        )];
        let rel = Rel::scan(Rex::name("people"), "p").exclude(paths);
        let (typed, problems) = check(Rex::select(rel, Rex::name("p")));
        assert!(problems.is_empty());
        let row = StaticType::row([
            ("name", StaticType::String(None)),
            ("tags", StaticType::list(StaticType::String(None))),
        ]);
        assert_eq!(typed.ty(), &StaticType::bag(row));
    }

    #[test]
    fn test_exclude_policy() {
        let paths = || {
            vec![ExcludePath::new(
                IdentPart::regular("p"),
                vec![ExcludeStep::Field(IdentPart::regular("salary"))],
            )]
        };
        let query = || Rex::select(Rel::scan(Rex::name("people"), "p").exclude(paths()), Rex::name("p"));

        let (_, problems) = check(query());
        assert_eq!(codes(&problems), vec!["sable::invalid_exclude_path"]);
        assert_eq!(problems[0].severity, Severity::Warning);

        let config = TyperConfig::default().with_exclude_policy(ExcludePolicy::Error);
        let (_, problems) = check_with(query(), config);
        assert_eq!(problems[0].severity, Severity::Error);
    }

    #[test]
    fn test_scalar_subquery() {
        let one_column = Rex::Subquery(
            Box::new(Rel::scan(Rex::name("t1"), "t")),
            Box::new(Rex::name("t")),
            SubqueryCoercion::Scalar,
            Span::default(),
        );
        let (typed, problems) = check(one_column);
        assert!(problems.is_empty());
        assert_eq!(typed.ty(), &StaticType::Int.or(StaticType::Null));

        let two_columns = Rex::Subquery(
            Box::new(Rel::scan(Rex::name("people"), "p")),
            Box::new(Rex::name("p")),
            SubqueryCoercion::Scalar,
            Span::default(),
        );
        let (typed, problems) = check(two_columns);
        assert_eq!(codes(&problems), vec!["sable::degree_violation"]);
        assert_eq!(typed.ty(), &StaticType::Any);
    }

    #[test]
    fn test_correlated_subquery() {
        let inner = Rex::Subquery(
            Box::new(Rel::scan(Rex::name("t1"), "t").filter(Rex::binary(
                Rex::name("t").dot("a"),
                BinOp::Eq,
                Rex::name("p").dot("age"),
            ))),
            Box::new(Rex::name("t")),
            SubqueryCoercion::Collection,
            Span::default(),
        );
        let (typed, problems) = check(Rex::select(Rel::scan(Rex::name("people"), "p"), inner));
        assert!(problems.is_empty(), "{problems:?}");
        let row = StaticType::row([("a", StaticType::Int)]);
        assert_eq!(typed.ty(), &StaticType::bag(StaticType::bag(row)));
    }

    #[test]
    fn test_dynamic_dispatch_over_union() {
        let catalog = MemoryCatalog::new().with("x", StaticType::Int.or(StaticType::Float64));
        let query = Rex::binary(Rex::name("x"), BinOp::Add, Rex::int(1));
        let (typed, problems) = check_statement(&catalog, &Statement::Query(query));
        assert!(problems.is_empty());
        assert_eq!(typed.ty(), &StaticType::Int.or(StaticType::Float64));
        match typed {
            TypedStatement::Query(TypedRex {
                op: TypedRexOp::Call { matched, .. },
                ..
            }) => assert!(matched.is_dynamic()),
            other => panic!("expected call, got {other:?}"),
        }
    }

    #[test]
    fn test_any_operand_dispatches_at_runtime() {
        let catalog = MemoryCatalog::new().with("x", StaticType::Any);
        for (op, result) in [(BinOp::Add, TypeKind::Float64), (BinOp::Eq, TypeKind::Bool)] {
            let query = Rex::binary(Rex::name("x"), op, Rex::int(1));
            let (typed, problems) = check_statement(&catalog, &Statement::Query(query));
            assert!(problems.is_empty(), "{problems:?}");
            assert!(typed.ty().may_be(|k| k == result));
            assert!(typed.ty().may_be_missing());
            match typed {
                TypedStatement::Query(TypedRex {
                    op: TypedRexOp::Call { matched, .. },
                    ..
                }) => assert!(matched.is_dynamic()),
                other => panic!("expected call, got {other:?}"),
            }
        }
    }

    #[test]
    fn test_resolver_fault_is_internal_error() {
        let catalog = catalog();
        let mut registry = FunctionRegistry::new();
        registry.define_unchecked(FnSignature::scalar("broken", vec![TypeKind::Null], StaticType::Int));
        let typer = PlanTyper::new(&catalog, &registry, TyperConfig::default());
        let mut problems = ProblemCollector::new();
        let query = Rex::call("broken", vec![Rex::int(1)]);
        let typed = typer.type_statement(&Statement::Query(query), &Session::default(), &mut problems);
        assert_eq!(typed.ty(), &StaticType::Any);
        assert_eq!(codes(&problems.into_problems()), vec!["sable::internal_error"]);
    }

    #[test]
    fn test_match_policy_from_config() {
        let catalog = MemoryCatalog::new().with("x", StaticType::Int);
        let typer = PlanTyper::new(
            &catalog,
            FunctionRegistry::builtins(),
            TyperConfig::default().with_match_policy(DeferTies),
        );
        assert_eq!(typer.config().match_policy.name(), "defer-ties");
        let query = Rex::binary(Rex::name("x"), BinOp::Add, Rex::int(1));
        let mut problems = ProblemCollector::new();
        let typed = typer.type_statement(&Statement::Query(query), &Session::default(), &mut problems);
        assert!(problems.is_empty());
        // Every widening of INT4 applies, so the call is left to runtime
        assert!(typed.ty().may_be(|k| k == TypeKind::BigInt));
        assert!(typed.ty().may_be_missing());
        match typed {
            TypedStatement::Query(TypedRex {
                op: TypedRexOp::Call { matched, .. },
                ..
            }) => assert!(matched.is_dynamic()),
            other => panic!("expected call, got {other:?}"),
        }
    }

    #[test]
    fn test_session_namespace() {
        let catalog = MemoryCatalog::new().with("db.orders", StaticType::bag(StaticType::Int));
        let typer = PlanTyper::new(&catalog, FunctionRegistry::builtins(), TyperConfig::default());
        let mut problems = ProblemCollector::new();
        let typed = typer.type_statement(
            &Statement::Query(Rex::name("orders")),
            &Session::new(["db"]),
            &mut problems,
        );
        assert!(problems.is_empty());
        assert_eq!(typed.ty(), &StaticType::bag(StaticType::Int));
    }
}
