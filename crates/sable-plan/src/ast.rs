//! Unresolved logical plan definitions.
//!
//! Scalar expressions are [`Rex`] nodes and relational operators are [`Rel`]
//! nodes. Variable references are still plain identifiers and function calls
//! are still names; the typer resolves both.

use crate::ident::{IdentPart, Identifier};
use crate::span::Span;

/// A statement handed to the typer.
#[derive(Debug, Clone, PartialEq)]
pub enum Statement {
    /// A query producing a value (usually `Rex::Select`).
    Query(Rex),
}

/// A literal value.
#[derive(Debug, Clone, PartialEq)]
pub enum Literal {
    Null,
    Missing,
    Bool(bool),
    Int(i64),
    /// Exact decimal `unscaled * 10^-scale`.
    Decimal { unscaled: i128, scale: u8 },
    Float(f64),
    String(String),
    Symbol(String),
    Date(String),
    Timestamp(String),
}

/// A type name as written in `CAST(x AS ...)`.
#[derive(Debug, Clone, PartialEq)]
pub enum TypeExpr {
    Named(String),
    Decimal { precision: u8, scale: u8 },
    Char(u32),
    VarChar(u32),
    List(Box<TypeExpr>),
    Bag(Box<TypeExpr>),
    Sexp(Box<TypeExpr>),
    Struct(Vec<(String, TypeExpr)>),
}

/// A step of a path expression.
#[derive(Debug, Clone, PartialEq)]
pub enum PathStep {
    /// `x.a` or `x."A"`.
    Field(IdentPart),
    /// `x[expr]`.
    Index(Rex),
    /// `x[*]`.
    Wildcard,
    /// `x.*`.
    Unpivot,
}

/// Kind of collection constructor.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CollectionKind {
    Bag,
    List,
    Sexp,
}

/// How a subquery result is coerced by its context.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SubqueryCoercion {
    /// `(SELECT a FROM t)` used as a scalar.
    Scalar,
    /// A single row, e.g. `(a, b) = (SELECT ...)`.
    Row,
    /// Used as a collection, e.g. `x IN (SELECT ...)`.
    Collection,
}

/// A scalar expression.
#[derive(Debug, Clone, PartialEq)]
pub enum Rex {
    Lit(Literal, Span),
    Var(Identifier, Span),
    Path(Box<Rex>, Vec<PathStep>, Span),

    Binary(Box<Rex>, BinOp, Box<Rex>, Span),
    Unary(UnaryOp, Box<Rex>, Span),
    Call(String, Vec<Rex>, Span),
    Cast(Box<Rex>, TypeExpr, Span),

    // Conditionals
    Case(Vec<(Rex, Rex)>, Option<Box<Rex>>, Span),
    Coalesce(Vec<Rex>, Span),
    NullIf(Box<Rex>, Box<Rex>, Span),

    // Constructors
    Collection(CollectionKind, Vec<Rex>, Span),
    Struct(Vec<(Rex, Rex)>, Span),
    TupleUnion(Vec<Rex>, Span),

    // Queries
    Select(Box<Rel>, Box<Rex>, Span),
    Subquery(Box<Rel>, Box<Rex>, SubqueryCoercion, Span),

    /// Window function call (`RANK() OVER (...)`).
    Window(String, Vec<Rex>, Span),
}

impl Rex {
    pub fn span(&self) -> Span {
        match self {
            Rex::Lit(_, s) => *s,
            Rex::Var(_, s) => *s,
            Rex::Path(_, _, s) => *s,
            Rex::Binary(_, _, _, s) => *s,
            Rex::Unary(_, _, s) => *s,
            Rex::Call(_, _, s) => *s,
            Rex::Cast(_, _, s) => *s,
            Rex::Case(_, _, s) => *s,
            Rex::Coalesce(_, s) => *s,
            Rex::NullIf(_, _, s) => *s,
            Rex::Collection(_, _, s) => *s,
            Rex::Struct(_, s) => *s,
            Rex::TupleUnion(_, s) => *s,
            Rex::Select(_, _, s) => *s,
            Rex::Subquery(_, _, _, s) => *s,
            Rex::Window(_, _, s) => *s,
        }
    }

    pub fn lit(literal: Literal) -> Self {
        Rex::Lit(literal, Span::default())
    }

    pub fn null() -> Self {
        Rex::lit(Literal::Null)
    }

    pub fn missing() -> Self {
        Rex::lit(Literal::Missing)
    }

    pub fn bool(value: bool) -> Self {
        Rex::lit(Literal::Bool(value))
    }

    pub fn int(value: i64) -> Self {
        Rex::lit(Literal::Int(value))
    }

    pub fn string(value: impl Into<String>) -> Self {
        Rex::lit(Literal::String(value.into()))
    }

    /// A variable reference by (possibly qualified) identifier.
    pub fn var(ident: Identifier) -> Self {
        Rex::Var(ident, Span::default())
    }

    /// Shorthand for a single regular identifier reference.
    pub fn name(text: &str) -> Self {
        Rex::var(Identifier::regular(text))
    }

    pub fn binary(left: Rex, op: BinOp, right: Rex) -> Self {
        let span = left.span().merge(right.span());
        Rex::Binary(Box::new(left), op, Box::new(right), span)
    }

    pub fn unary(op: UnaryOp, operand: Rex) -> Self {
        Rex::Unary(op, Box::new(operand), Span::default())
    }

    pub fn call(name: impl Into<String>, args: Vec<Rex>) -> Self {
        Rex::Call(name.into(), args, Span::default())
    }

    pub fn cast(self, target: TypeExpr) -> Self {
        Rex::Cast(Box::new(self), target, Span::default())
    }

    /// Append a regular field step.
    pub fn dot(self, field: &str) -> Self {
        self.step(PathStep::Field(IdentPart::regular(field)))
    }

    /// Append a delimited field step.
    pub fn dot_quoted(self, field: &str) -> Self {
        self.step(PathStep::Field(IdentPart::delimited(field)))
    }

    pub fn index(self, key: Rex) -> Self {
        self.step(PathStep::Index(key))
    }

    /// Append a path step, extending an existing path node in place.
    pub fn step(self, step: PathStep) -> Self {
        match self {
            Rex::Path(root, mut steps, span) => {
                steps.push(step);
                Rex::Path(root, steps, span)
            }
            other => {
                let span = other.span();
                Rex::Path(Box::new(other), vec![step], span)
            }
        }
    }

    pub fn struct_of<I, S>(fields: I) -> Self
    where
        I: IntoIterator<Item = (S, Rex)>,
        S: Into<String>,
    {
        Rex::Struct(
            fields
                .into_iter()
                .map(|(k, v)| (Rex::string(k), v))
                .collect(),
            Span::default(),
        )
    }

    /// `SELECT VALUE constructor FROM rel`.
    pub fn select(rel: Rel, constructor: Rex) -> Self {
        Rex::Select(Box::new(rel), Box::new(constructor), Span::default())
    }
}

/// Binary operators. Each lowers to a registry function.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum BinOp {
    Add,
    Sub,
    Mul,
    Div,
    Mod,
    BitAnd,
    Eq,
    Ne,
    Lt,
    Le,
    Gt,
    Ge,
    And,
    Or,
    Concat,
    Like,
}

impl BinOp {
    /// Name of the function implementing this operator.
    pub fn function_name(self) -> &'static str {
        match self {
            BinOp::Add => "plus",
            BinOp::Sub => "minus",
            BinOp::Mul => "times",
            BinOp::Div => "divide",
            BinOp::Mod => "modulo",
            BinOp::BitAnd => "bitwise_and",
            BinOp::Eq => "eq",
            BinOp::Ne => "neq",
            BinOp::Lt => "lt",
            BinOp::Le => "lte",
            BinOp::Gt => "gt",
            BinOp::Ge => "gte",
            BinOp::And => "and",
            BinOp::Or => "or",
            BinOp::Concat => "concat",
            BinOp::Like => "like",
        }
    }
}

/// Unary operators.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum UnaryOp {
    Pos,
    Neg,
    Not,
    IsNull,
    IsMissing,
}

impl UnaryOp {
    pub fn function_name(self) -> &'static str {
        match self {
            UnaryOp::Pos => "pos",
            UnaryOp::Neg => "neg",
            UnaryOp::Not => "not",
            UnaryOp::IsNull => "is_null",
            UnaryOp::IsMissing => "is_missing",
        }
    }
}

/// A relational operator.
#[derive(Debug, Clone, PartialEq)]
pub enum Rel {
    Scan(ScanRel),
    Unpivot(UnpivotRel),
    Filter(FilterRel),
    Project(ProjectRel),
    Sort(SortRel),
    Limit(LimitRel),
    Offset(OffsetRel),
    Distinct(DistinctRel),
    Join(JoinRel),
    Aggregate(AggregateRel),
    SetOp(SetOpRel),
    Exclude(ExcludeRel),
}

/// `FROM expr AS alias [AT index]`.
#[derive(Debug, Clone, PartialEq)]
pub struct ScanRel {
    pub expr: Rex,
    pub alias: String,
    pub at: Option<String>,
    pub span: Span,
}

/// `FROM UNPIVOT expr AS alias AT key`.
#[derive(Debug, Clone, PartialEq)]
pub struct UnpivotRel {
    pub expr: Rex,
    pub alias: String,
    pub at: String,
    pub span: Span,
}

/// A `WHERE` / `HAVING` filter.
#[derive(Debug, Clone, PartialEq)]
pub struct FilterRel {
    pub input: Box<Rel>,
    pub predicate: Rex,
    pub span: Span,
}

/// A named projection list.
#[derive(Debug, Clone, PartialEq)]
pub struct ProjectRel {
    pub input: Box<Rel>,
    pub items: Vec<Projection>,
    pub span: Span,
}

/// One item of a projection list.
#[derive(Debug, Clone, PartialEq)]
pub struct Projection {
    pub expr: Rex,
    pub alias: Option<String>,
}

#[derive(Debug, Clone, PartialEq)]
pub struct SortRel {
    pub input: Box<Rel>,
    pub keys: Vec<(Rex, SortOrder)>,
    pub span: Span,
}

/// Sort order.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SortOrder {
    Asc,
    Desc,
}

#[derive(Debug, Clone, PartialEq)]
pub struct LimitRel {
    pub input: Box<Rel>,
    pub limit: Rex,
    pub span: Span,
}

#[derive(Debug, Clone, PartialEq)]
pub struct OffsetRel {
    pub input: Box<Rel>,
    pub offset: Rex,
    pub span: Span,
}

#[derive(Debug, Clone, PartialEq)]
pub struct DistinctRel {
    pub input: Box<Rel>,
    pub span: Span,
}

/// A join of two inputs. A missing condition is a cross join.
#[derive(Debug, Clone, PartialEq)]
pub struct JoinRel {
    pub kind: JoinKind,
    pub left: Box<Rel>,
    pub right: Box<Rel>,
    pub condition: Option<Rex>,
    pub span: Span,
}

/// Kind of join.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum JoinKind {
    Inner,
    /// Comma join or `CROSS JOIN`; never carries a condition.
    Cross,
    Left,
    Right,
    Full,
}

impl JoinKind {
    /// Whether the right input may reference bindings of the left input.
    pub fn allows_lateral(self) -> bool {
        matches!(self, JoinKind::Inner | JoinKind::Cross | JoinKind::Left)
    }
}

/// `GROUP BY` with aggregate calls.
#[derive(Debug, Clone, PartialEq)]
pub struct AggregateRel {
    pub input: Box<Rel>,
    pub calls: Vec<AggCall>,
    pub groups: Vec<GroupKey>,
    pub group_as: Option<String>,
    pub span: Span,
}

/// An aggregate function call such as `SUM(DISTINCT x) AS total`.
#[derive(Debug, Clone, PartialEq)]
pub struct AggCall {
    pub name: String,
    pub args: Vec<Rex>,
    pub distinct: bool,
    pub alias: Option<String>,
    pub span: Span,
}

impl AggCall {
    pub fn new(name: impl Into<String>, args: Vec<Rex>) -> Self {
        Self {
            name: name.into(),
            args,
            distinct: false,
            alias: None,
            span: Span::default(),
        }
    }

    pub fn alias(mut self, alias: impl Into<String>) -> Self {
        self.alias = Some(alias.into());
        self
    }
}

/// A `GROUP BY` key.
#[derive(Debug, Clone, PartialEq)]
pub struct GroupKey {
    pub expr: Rex,
    pub alias: Option<String>,
}

/// `UNION`, `INTERSECT` or `EXCEPT`.
#[derive(Debug, Clone, PartialEq)]
pub struct SetOpRel {
    pub op: SetOpKind,
    pub quantifier: SetQuantifier,
    pub left: Box<Rel>,
    pub right: Box<Rel>,
    pub span: Span,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SetOpKind {
    Union,
    Intersect,
    Except,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SetQuantifier {
    All,
    Distinct,
}

/// `EXCLUDE path, ...`.
#[derive(Debug, Clone, PartialEq)]
pub struct ExcludeRel {
    pub input: Box<Rel>,
    pub paths: Vec<ExcludePath>,
    pub span: Span,
}

/// A path removed by `EXCLUDE`, rooted at a binding.
#[derive(Debug, Clone, PartialEq)]
pub struct ExcludePath {
    pub root: IdentPart,
    pub steps: Vec<ExcludeStep>,
    pub span: Span,
}

impl ExcludePath {
    pub fn new(root: IdentPart, steps: Vec<ExcludeStep>) -> Self {
        Self {
            root,
            steps,
            span: Span::default(),
        }
    }
}

#[derive(Debug, Clone, PartialEq)]
pub enum ExcludeStep {
    Field(IdentPart),
    Index(i64),
    /// `.*`
    StructWildcard,
    /// `[*]`
    CollectionWildcard,
}

impl Rel {
    pub fn span(&self) -> Span {
        match self {
            Rel::Scan(r) => r.span,
            Rel::Unpivot(r) => r.span,
            Rel::Filter(r) => r.span,
            Rel::Project(r) => r.span,
            Rel::Sort(r) => r.span,
            Rel::Limit(r) => r.span,
            Rel::Offset(r) => r.span,
            Rel::Distinct(r) => r.span,
            Rel::Join(r) => r.span,
            Rel::Aggregate(r) => r.span,
            Rel::SetOp(r) => r.span,
            Rel::Exclude(r) => r.span,
        }
    }

    /// `FROM expr AS alias`.
    pub fn scan(expr: Rex, alias: impl Into<String>) -> Self {
        Rel::Scan(ScanRel {
            expr,
            alias: alias.into(),
            at: None,
            span: Span::default(),
        })
    }

    /// `FROM expr AS alias AT at`.
    pub fn scan_at(expr: Rex, alias: impl Into<String>, at: impl Into<String>) -> Self {
        Rel::Scan(ScanRel {
            expr,
            alias: alias.into(),
            at: Some(at.into()),
            span: Span::default(),
        })
    }

    pub fn unpivot(expr: Rex, alias: impl Into<String>, at: impl Into<String>) -> Self {
        Rel::Unpivot(UnpivotRel {
            expr,
            alias: alias.into(),
            at: at.into(),
            span: Span::default(),
        })
    }

    pub fn filter(self, predicate: Rex) -> Self {
        Rel::Filter(FilterRel {
            input: Box::new(self),
            predicate,
            span: Span::default(),
        })
    }

    pub fn project(self, items: Vec<Projection>) -> Self {
        Rel::Project(ProjectRel {
            input: Box::new(self),
            items,
            span: Span::default(),
        })
    }

    pub fn sort(self, keys: Vec<(Rex, SortOrder)>) -> Self {
        Rel::Sort(SortRel {
            input: Box::new(self),
            keys,
            span: Span::default(),
        })
    }

    pub fn limit(self, limit: Rex) -> Self {
        Rel::Limit(LimitRel {
            input: Box::new(self),
            limit,
            span: Span::default(),
        })
    }

    pub fn offset(self, offset: Rex) -> Self {
        Rel::Offset(OffsetRel {
            input: Box::new(self),
            offset,
            span: Span::default(),
        })
    }

    pub fn distinct(self) -> Self {
        Rel::Distinct(DistinctRel {
            input: Box::new(self),
            span: Span::default(),
        })
    }

    pub fn join(self, kind: JoinKind, right: Rel, condition: Option<Rex>) -> Self {
        Rel::Join(JoinRel {
            kind,
            left: Box::new(self),
            right: Box::new(right),
            condition,
            span: Span::default(),
        })
    }

    pub fn aggregate(self, calls: Vec<AggCall>, groups: Vec<GroupKey>) -> Self {
        Rel::Aggregate(AggregateRel {
            input: Box::new(self),
            calls,
            groups,
            group_as: None,
            span: Span::default(),
        })
    }

    pub fn set_op(self, op: SetOpKind, quantifier: SetQuantifier, right: Rel) -> Self {
        Rel::SetOp(SetOpRel {
            op,
            quantifier,
            left: Box::new(self),
            right: Box::new(right),
            span: Span::default(),
        })
    }

    pub fn exclude(self, paths: Vec<ExcludePath>) -> Self {
        Rel::Exclude(ExcludeRel {
            input: Box::new(self),
            paths,
            span: Span::default(),
        })
    }
}
