//! Typed plan definitions.
//!
//! Mirrors the unresolved plan with every variable bound to a scope slot or
//! catalog object, every call bound to its overload(s) and every node
//! carrying its static type.

use sable_plan::{
    CollectionKind, ExcludePath, IdentPart, Identifier, JoinKind, Literal, SetOpKind, SetQuantifier,
    SortOrder, Span, SubqueryCoercion,
};

use crate::env::Binding;
use crate::signature::FnMatch;
use crate::types::StaticType;

/// Output of typing a statement.
#[derive(Debug, Clone, PartialEq)]
pub enum TypedStatement {
    Query(TypedRex),
}

impl TypedStatement {
    /// Type of the statement's result.
    pub fn ty(&self) -> &StaticType {
        match self {
            TypedStatement::Query(rex) => &rex.ty,
        }
    }
}

/// A typed scalar expression.
#[derive(Debug, Clone, PartialEq)]
pub struct TypedRex {
    pub ty: StaticType,
    pub op: TypedRexOp,
    pub span: Span,
}

impl TypedRex {
    pub fn new(ty: StaticType, op: TypedRexOp, span: Span) -> Self {
        Self { ty, op, span }
    }
}

#[derive(Debug, Clone, PartialEq)]
pub enum TypedRexOp {
    Lit(Literal),
    /// A binding of an enclosing relation.
    Local {
        name: String,
        depth: usize,
        ordinal: usize,
    },
    /// A catalog object.
    Global { name: Vec<String> },
    /// A reference that resolved to nothing.
    Unresolved(Identifier),
    Path(Box<TypedRex>, TypedPathStep),
    Call {
        name: String,
        matched: FnMatch,
        args: Vec<TypedRex>,
    },
    Cast(Box<TypedRex>, StaticType),
    Case(Vec<(TypedRex, TypedRex)>, Option<Box<TypedRex>>),
    Coalesce(Vec<TypedRex>),
    NullIf(Box<TypedRex>, Box<TypedRex>),
    Collection(CollectionKind, Vec<TypedRex>),
    Struct(Vec<(TypedRex, TypedRex)>),
    TupleUnion(Vec<TypedRex>),
    Select(Box<TypedRel>, Box<TypedRex>),
    Subquery(Box<TypedRel>, Box<TypedRex>, SubqueryCoercion),
    /// Recognized but not typed further.
    Unsupported(String, Vec<TypedRex>),
}

#[derive(Debug, Clone, PartialEq)]
pub enum TypedPathStep {
    Field(IdentPart),
    Index(Box<TypedRex>),
    Wildcard,
    Unpivot,
}

/// A typed relational operator.
#[derive(Debug, Clone, PartialEq)]
pub struct TypedRel {
    /// Output bindings in declaration order.
    pub schema: Vec<Binding>,
    /// Whether rows come out in a defined order.
    pub ordered: bool,
    pub op: TypedRelOp,
    pub span: Span,
}

impl TypedRel {
    /// The schema as a closed row struct.
    pub fn row_type(&self) -> StaticType {
        StaticType::row(self.schema.iter().map(|b| (b.name.clone(), b.ty.clone())))
    }

    pub fn binding(&self, name: &str) -> Option<&Binding> {
        self.schema.iter().find(|b| b.name == name)
    }
}

#[derive(Debug, Clone, PartialEq)]
pub enum TypedRelOp {
    Scan {
        expr: TypedRex,
    },
    Unpivot {
        expr: TypedRex,
    },
    Filter {
        input: Box<TypedRel>,
        predicate: TypedRex,
    },
    Project {
        input: Box<TypedRel>,
        items: Vec<TypedRex>,
    },
    Sort {
        input: Box<TypedRel>,
        keys: Vec<(TypedRex, SortOrder)>,
    },
    Limit {
        input: Box<TypedRel>,
        limit: TypedRex,
    },
    Offset {
        input: Box<TypedRel>,
        offset: TypedRex,
    },
    Distinct {
        input: Box<TypedRel>,
    },
    Join {
        kind: JoinKind,
        left: Box<TypedRel>,
        right: Box<TypedRel>,
        condition: Option<TypedRex>,
    },
    Aggregate {
        input: Box<TypedRel>,
        calls: Vec<TypedAggCall>,
        groups: Vec<TypedRex>,
    },
    SetOp {
        op: SetOpKind,
        quantifier: SetQuantifier,
        left: Box<TypedRel>,
        right: Box<TypedRel>,
    },
    Exclude {
        input: Box<TypedRel>,
        paths: Vec<ExcludePath>,
    },
}

#[derive(Debug, Clone, PartialEq)]
pub struct TypedAggCall {
    pub name: String,
    pub matched: FnMatch,
    pub args: Vec<TypedRex>,
    pub distinct: bool,
    pub ty: StaticType,
}

