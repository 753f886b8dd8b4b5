//! Static type definitions for Sable.
//!
//! A [`StaticType`] describes the shape of every value an expression may
//! produce. Unions are kept flat and behave as sets: `union` sorts and
//! de-duplicates its members, so member order never affects equality.

use std::collections::BTreeSet;
use std::fmt;

use sable_plan::IdentPart;

/// Sable static types.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub enum StaticType {
    /// Top type: any value, decided at runtime.
    Any,
    // Absence markers
    Null,
    Missing,
    // Primitives
    Bool,
    TinyInt,
    SmallInt,
    Int,
    BigInt,
    Decimal { precision: u8, scale: u8 },
    DecimalArbitrary,
    Float32,
    Float64,
    // Text and binary
    Char(u32),
    /// `STRING`, or `VARCHAR(n)` when bounded.
    String(Option<u32>),
    Symbol,
    Clob,
    Binary(Option<u32>),
    Blob,
    // Temporal
    Date,
    Time,
    Timestamp,
    // Collections
    Bag(Box<StaticType>),
    List(Box<StaticType>),
    Sexp(Box<StaticType>),
    Struct(StructType),
    /// Flattened set of at least two members, never containing `Any`.
    Union(BTreeSet<StaticType>),
}

/// Field-less kind of a type. Used as lattice key and signature parameter.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub enum TypeKind {
    Any,
    Null,
    Missing,
    Bool,
    TinyInt,
    SmallInt,
    Int,
    BigInt,
    Decimal,
    Float32,
    Float64,
    Char,
    Symbol,
    String,
    Clob,
    Binary,
    Blob,
    Date,
    Time,
    Timestamp,
    Bag,
    List,
    Sexp,
    Struct,
}

impl TypeKind {
    pub const ALL: [TypeKind; 24] = [
        TypeKind::Any,
        TypeKind::Null,
        TypeKind::Missing,
        TypeKind::Bool,
        TypeKind::TinyInt,
        TypeKind::SmallInt,
        TypeKind::Int,
        TypeKind::BigInt,
        TypeKind::Decimal,
        TypeKind::Float32,
        TypeKind::Float64,
        TypeKind::Char,
        TypeKind::Symbol,
        TypeKind::String,
        TypeKind::Clob,
        TypeKind::Binary,
        TypeKind::Blob,
        TypeKind::Date,
        TypeKind::Time,
        TypeKind::Timestamp,
        TypeKind::Bag,
        TypeKind::List,
        TypeKind::Sexp,
        TypeKind::Struct,
    ];

    /// Integer kinds, narrowest first.
    pub const INTEGERS: [TypeKind; 4] = [
        TypeKind::TinyInt,
        TypeKind::SmallInt,
        TypeKind::Int,
        TypeKind::BigInt,
    ];

    /// Numeric kinds, narrowest first.
    pub const NUMERICS: [TypeKind; 7] = [
        TypeKind::TinyInt,
        TypeKind::SmallInt,
        TypeKind::Int,
        TypeKind::BigInt,
        TypeKind::Decimal,
        TypeKind::Float32,
        TypeKind::Float64,
    ];

    /// Text kinds, narrowest first.
    pub const TEXT: [TypeKind; 4] = [
        TypeKind::Char,
        TypeKind::Symbol,
        TypeKind::String,
        TypeKind::Clob,
    ];

    pub fn is_absent(self) -> bool {
        matches!(self, TypeKind::Null | TypeKind::Missing)
    }

    pub fn is_integer(self) -> bool {
        Self::INTEGERS.contains(&self)
    }

    pub fn is_numeric(self) -> bool {
        Self::NUMERICS.contains(&self)
    }

    pub fn is_text(self) -> bool {
        Self::TEXT.contains(&self)
    }

    pub fn is_temporal(self) -> bool {
        matches!(self, TypeKind::Date | TypeKind::Time | TypeKind::Timestamp)
    }

    pub fn is_collection(self) -> bool {
        matches!(self, TypeKind::Bag | TypeKind::List | TypeKind::Sexp)
    }

    /// The unconstrained static type of this kind.
    pub fn to_static(self) -> StaticType {
        match self {
            TypeKind::Any => StaticType::Any,
            TypeKind::Null => StaticType::Null,
            TypeKind::Missing => StaticType::Missing,
            TypeKind::Bool => StaticType::Bool,
            TypeKind::TinyInt => StaticType::TinyInt,
            TypeKind::SmallInt => StaticType::SmallInt,
            TypeKind::Int => StaticType::Int,
            TypeKind::BigInt => StaticType::BigInt,
            TypeKind::Decimal => StaticType::DecimalArbitrary,
            TypeKind::Float32 => StaticType::Float32,
            TypeKind::Float64 => StaticType::Float64,
            TypeKind::Char => StaticType::Char(1),
            TypeKind::Symbol => StaticType::Symbol,
            TypeKind::String => StaticType::String(None),
            TypeKind::Clob => StaticType::Clob,
            TypeKind::Binary => StaticType::Binary(None),
            TypeKind::Blob => StaticType::Blob,
            TypeKind::Date => StaticType::Date,
            TypeKind::Time => StaticType::Time,
            TypeKind::Timestamp => StaticType::Timestamp,
            TypeKind::Bag => StaticType::Bag(Box::new(StaticType::Any)),
            TypeKind::List => StaticType::List(Box::new(StaticType::Any)),
            TypeKind::Sexp => StaticType::Sexp(Box::new(StaticType::Any)),
            TypeKind::Struct => StaticType::Struct(StructType::open(Vec::new())),
        }
    }

    pub fn name(self) -> &'static str {
        match self {
            TypeKind::Any => "ANY",
            TypeKind::Null => "NULL",
            TypeKind::Missing => "MISSING",
            TypeKind::Bool => "BOOL",
            TypeKind::TinyInt => "INT1",
            TypeKind::SmallInt => "INT2",
            TypeKind::Int => "INT4",
            TypeKind::BigInt => "INT8",
            TypeKind::Decimal => "DECIMAL",
            TypeKind::Float32 => "FLOAT32",
            TypeKind::Float64 => "FLOAT64",
            TypeKind::Char => "CHAR",
            TypeKind::Symbol => "SYMBOL",
            TypeKind::String => "STRING",
            TypeKind::Clob => "CLOB",
            TypeKind::Binary => "BINARY",
            TypeKind::Blob => "BLOB",
            TypeKind::Date => "DATE",
            TypeKind::Time => "TIME",
            TypeKind::Timestamp => "TIMESTAMP",
            TypeKind::Bag => "BAG",
            TypeKind::List => "LIST",
            TypeKind::Sexp => "SEXP",
            TypeKind::Struct => "STRUCT",
        }
    }
}

impl fmt::Display for TypeKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}

/// A struct field. Names are kept verbatim; duplicates are allowed.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct StructField {
    pub name: String,
    pub ty: StaticType,
}

impl StructField {
    pub fn new(name: impl Into<String>, ty: StaticType) -> Self {
        Self {
            name: name.into(),
            ty,
        }
    }
}

/// Shape constraints of a struct type.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct StructConstraints {
    /// No fields beyond the listed ones.
    pub closed: bool,
    /// Field order is significant.
    pub ordered: bool,
    /// No two fields share a name.
    pub unique: bool,
}

/// A struct (tuple) type.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct StructType {
    pub fields: Vec<StructField>,
    pub constraints: StructConstraints,
}

impl StructType {
    /// A closed, ordered struct; uniqueness follows from the field names.
    pub fn closed(fields: Vec<StructField>) -> Self {
        let unique = has_unique_names(&fields);
        Self {
            fields,
            constraints: StructConstraints {
                closed: true,
                ordered: true,
                unique,
            },
        }
    }

    /// An open, unordered struct whose known fields are listed.
    pub fn open(fields: Vec<StructField>) -> Self {
        let unique = has_unique_names(&fields);
        Self {
            fields,
            constraints: StructConstraints {
                closed: false,
                ordered: false,
                unique,
            },
        }
    }

    pub fn with_constraints(fields: Vec<StructField>, constraints: StructConstraints) -> Self {
        Self {
            fields,
            constraints,
        }
    }

    pub fn is_closed(&self) -> bool {
        self.constraints.closed
    }

    /// Types of every field matched by `part`, in declaration order.
    pub fn matching_fields<'a>(&'a self, part: &'a IdentPart) -> impl Iterator<Item = &'a StaticType> {
        self.fields
            .iter()
            .filter(move |f| part.matches(&f.name))
            .map(|f| &f.ty)
    }

    /// Union of the matched fields' types, built in declaration order.
    ///
    /// Open structs may carry unlisted fields, so a miss there is `ANY`
    /// rather than `None`.
    pub fn lookup(&self, part: &IdentPart) -> Option<StaticType> {
        let matches: Vec<StaticType> = self.matching_fields(part).cloned().collect();
        if !matches.is_empty() {
            Some(StaticType::union(matches))
        } else if self.is_closed() {
            None
        } else {
            Some(StaticType::Any)
        }
    }

    /// Whether some listed field is matched by `part`.
    pub fn contains(&self, part: &IdentPart) -> bool {
        self.matching_fields(part).next().is_some()
    }

    /// Field names in declaration order.
    pub fn names(&self) -> Vec<&str> {
        self.fields.iter().map(|f| f.name.as_str()).collect()
    }
}

fn has_unique_names(fields: &[StructField]) -> bool {
    let mut seen = BTreeSet::new();
    fields.iter().all(|f| seen.insert(f.name.as_str()))
}

impl StaticType {
    /// Build a union from the given types: nested unions are flattened,
    /// duplicates dropped and `ANY` absorbs everything.
    ///
    /// An empty union has no values and is represented as `MISSING`.
    pub fn union<I>(types: I) -> StaticType
    where
        I: IntoIterator<Item = StaticType>,
    {
        let mut members = BTreeSet::new();
        for ty in types {
            match ty {
                StaticType::Any => return StaticType::Any,
                StaticType::Union(inner) => members.extend(inner),
                other => {
                    members.insert(other);
                }
            }
        }
        match members.len() {
            0 => StaticType::Missing,
            1 => members.into_iter().next().unwrap_or(StaticType::Missing),
            _ => StaticType::Union(members),
        }
    }

    /// `self ∪ other`.
    pub fn or(self, other: StaticType) -> StaticType {
        StaticType::union([self, other])
    }

    /// A closed, ordered struct built from `(name, type)` pairs.
    pub fn row<I, S>(fields: I) -> StaticType
    where
        I: IntoIterator<Item = (S, StaticType)>,
        S: Into<String>,
    {
        StaticType::Struct(StructType::closed(
            fields
                .into_iter()
                .map(|(name, ty)| StructField::new(name, ty))
                .collect(),
        ))
    }

    pub fn bag(element: StaticType) -> StaticType {
        StaticType::Bag(Box::new(element))
    }

    pub fn list(element: StaticType) -> StaticType {
        StaticType::List(Box::new(element))
    }

    /// Members of a union, or the type itself.
    pub fn members(&self) -> Vec<&StaticType> {
        match self {
            StaticType::Union(members) => members.iter().collect(),
            other => vec![other],
        }
    }

    /// The kind of a non-union type.
    pub fn kind(&self) -> Option<TypeKind> {
        let kind = match self {
            StaticType::Any => TypeKind::Any,
            StaticType::Null => TypeKind::Null,
            StaticType::Missing => TypeKind::Missing,
            StaticType::Bool => TypeKind::Bool,
            StaticType::TinyInt => TypeKind::TinyInt,
            StaticType::SmallInt => TypeKind::SmallInt,
            StaticType::Int => TypeKind::Int,
            StaticType::BigInt => TypeKind::BigInt,
            StaticType::Decimal { .. } | StaticType::DecimalArbitrary => TypeKind::Decimal,
            StaticType::Float32 => TypeKind::Float32,
            StaticType::Float64 => TypeKind::Float64,
            StaticType::Char(_) => TypeKind::Char,
            StaticType::String(_) => TypeKind::String,
            StaticType::Symbol => TypeKind::Symbol,
            StaticType::Clob => TypeKind::Clob,
            StaticType::Binary(_) => TypeKind::Binary,
            StaticType::Blob => TypeKind::Blob,
            StaticType::Date => TypeKind::Date,
            StaticType::Time => TypeKind::Time,
            StaticType::Timestamp => TypeKind::Timestamp,
            StaticType::Bag(_) => TypeKind::Bag,
            StaticType::List(_) => TypeKind::List,
            StaticType::Sexp(_) => TypeKind::Sexp,
            StaticType::Struct(_) => TypeKind::Struct,
            StaticType::Union(_) => return None,
        };
        Some(kind)
    }

    /// Kinds of all members, de-duplicated, in member order.
    pub fn kinds(&self) -> Vec<TypeKind> {
        let mut kinds: Vec<TypeKind> = Vec::new();
        for member in self.members() {
            if let Some(kind) = member.kind() {
                if !kinds.contains(&kind) {
                    kinds.push(kind);
                }
            }
        }
        kinds
    }

    pub fn is_any(&self) -> bool {
        matches!(self, StaticType::Any)
    }

    pub fn is_null(&self) -> bool {
        matches!(self, StaticType::Null)
    }

    pub fn is_missing(&self) -> bool {
        matches!(self, StaticType::Missing)
    }

    /// Whether every value of this type is NULL or MISSING.
    pub fn is_absent(&self) -> bool {
        self.members()
            .iter()
            .all(|m| matches!(m, StaticType::Null | StaticType::Missing))
    }

    pub fn may_be_null(&self) -> bool {
        self.members()
            .iter()
            .any(|m| matches!(m, StaticType::Null | StaticType::Any))
    }

    pub fn may_be_missing(&self) -> bool {
        self.members()
            .iter()
            .any(|m| matches!(m, StaticType::Missing | StaticType::Any))
    }

    /// Whether some value of this type satisfies `pred` on its kind. `ANY`
    /// satisfies everything.
    pub fn may_be(&self, pred: impl Fn(TypeKind) -> bool) -> bool {
        self.members().iter().any(|m| match m.kind() {
            Some(TypeKind::Any) => true,
            Some(kind) => pred(kind),
            None => false,
        })
    }

    pub fn may_be_bool(&self) -> bool {
        self.may_be(|k| k == TypeKind::Bool)
    }

    pub fn may_be_integer(&self) -> bool {
        self.may_be(TypeKind::is_integer)
    }

    /// The type with NULL and MISSING members removed. An entirely absent
    /// type is returned unchanged.
    pub fn without_absent(&self) -> StaticType {
        if self.is_absent() {
            return self.clone();
        }
        StaticType::union(
            self.members()
                .into_iter()
                .filter(|m| !matches!(m, StaticType::Null | StaticType::Missing))
                .cloned(),
        )
    }

    /// Element type of a collection, member-wise over unions.
    ///
    /// Returns `None` when no member is a collection.
    pub fn element_type(&self) -> Option<StaticType> {
        let mut elements = Vec::new();
        for member in self.members() {
            match member {
                StaticType::Bag(e) | StaticType::List(e) | StaticType::Sexp(e) => {
                    elements.push((**e).clone())
                }
                StaticType::Any => elements.push(StaticType::Any),
                _ => {}
            }
        }
        if elements.is_empty() {
            None
        } else {
            Some(StaticType::union(elements))
        }
    }

    pub fn as_struct(&self) -> Option<&StructType> {
        match self {
            StaticType::Struct(s) => Some(s),
            _ => None,
        }
    }

    /// Type of `self.part`, navigated member-wise.
    ///
    /// `None` means the lookup provably never yields a value. Members that
    /// are not structs contribute MISSING.
    pub fn field_type(&self, part: &IdentPart) -> Option<StaticType> {
        let mut found = Vec::new();
        let mut absent = false;
        for member in self.members() {
            match member {
                StaticType::Any => found.push(StaticType::Any),
                StaticType::Struct(s) => match s.lookup(part) {
                    Some(ty) => found.push(ty),
                    None => absent = true,
                },
                _ => absent = true,
            }
        }
        if found.is_empty() {
            return None;
        }
        if absent {
            found.push(StaticType::Missing);
        }
        Some(StaticType::union(found))
    }

    /// Least common shape of two row types, used by set operators.
    ///
    /// Structs with the same closed field names merge field-wise; structs
    /// whose closed field sets differ widen to an open struct that keeps the
    /// common fields.
    pub fn supertype(&self, other: &StaticType) -> StaticType {
        if self == other {
            return self.clone();
        }
        match (self, other) {
            (StaticType::Struct(a), StaticType::Struct(b)) => StaticType::Struct(struct_supertype(a, b)),
            _ => StaticType::union([self.clone(), other.clone()]),
        }
    }
}

fn struct_supertype(a: &StructType, b: &StructType) -> StructType {
    let same_names = a.fields.len() == b.fields.len()
        && a.fields.iter().zip(&b.fields).all(|(x, y)| x.name == y.name);
    let unique = a.constraints.unique && b.constraints.unique;
    if same_names {
        let fields = a
            .fields
            .iter()
            .zip(&b.fields)
            .map(|(x, y)| StructField::new(x.name.clone(), x.ty.clone().or(y.ty.clone())))
            .collect();
        return StructType::with_constraints(
            fields,
            StructConstraints {
                closed: a.is_closed() && b.is_closed(),
                ordered: a.constraints.ordered && b.constraints.ordered,
                unique,
            },
        );
    }
    let fields = a
        .fields
        .iter()
        .filter_map(|x| {
            let shared: Vec<StaticType> = b
                .fields
                .iter()
                .filter(|y| y.name == x.name)
                .map(|y| y.ty.clone())
                .collect();
            if shared.is_empty() {
                None
            } else {
                Some(StructField::new(
                    x.name.clone(),
                    StaticType::union(std::iter::once(x.ty.clone()).chain(shared)),
                ))
            }
        })
        .collect();
    StructType::with_constraints(
        fields,
        StructConstraints {
            closed: false,
            ordered: false,
            unique,
        },
    )
}

impl fmt::Display for StaticType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            StaticType::Decimal { precision, scale } => write!(f, "DECIMAL({precision},{scale})"),
            StaticType::Char(n) => write!(f, "CHAR({n})"),
            StaticType::String(Some(n)) => write!(f, "VARCHAR({n})"),
            StaticType::Binary(Some(n)) => write!(f, "BINARY({n})"),
            StaticType::Bag(e) => write!(f, "BAG<{e}>"),
            StaticType::List(e) => write!(f, "LIST<{e}>"),
            StaticType::Sexp(e) => write!(f, "SEXP<{e}>"),
            StaticType::Struct(s) => write!(f, "{s}"),
            StaticType::Union(members) => {
                write!(f, "UNION(")?;
                for (i, m) in members.iter().enumerate() {
                    if i > 0 {
                        write!(f, ", ")?;
                    }
                    write!(f, "{m}")?;
                }
                write!(f, ")")
            }
            other => match other.kind() {
                Some(kind) => write!(f, "{kind}"),
                None => write!(f, "?"),
            },
        }
    }
}

impl fmt::Display for StructType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "STRUCT{{")?;
        for (i, field) in self.fields.iter().enumerate() {
            if i > 0 {
                write!(f, ", ")?;
            }
            write!(f, "{}: {}", field.name, field.ty)?;
        }
        if !self.is_closed() {
            if !self.fields.is_empty() {
                write!(f, ", ")?;
            }
            write!(f, "...")?;
        }
        write!(f, "}}")
    }
}
