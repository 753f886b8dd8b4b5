//! Lexical scopes of query variables.
//!
//! Each relational operator exposes its output as an ordered list of
//! bindings. Nested queries push a new level whose `outer` points at the
//! enclosing one, so resolution walks innermost first.

use sable_plan::{IdentPart, Identifier};

use crate::types::StaticType;

/// A named variable produced by a relational operator.
#[derive(Debug, Clone, PartialEq)]
pub struct Binding {
    pub name: String,
    pub ty: StaticType,
}

impl Binding {
    pub fn new(name: impl Into<String>, ty: StaticType) -> Self {
        Self {
            name: name.into(),
            ty,
        }
    }
}

/// Where a variable reference landed.
#[derive(Debug, Clone, PartialEq)]
pub struct ResolvedVar {
    /// Scope levels between the reference and the binding; 0 is innermost.
    pub depth: usize,
    /// Declaration index within the level.
    pub ordinal: usize,
    pub name: String,
    pub ty: StaticType,
    /// Set when the first part named a field of the binding rather than the
    /// binding itself.
    pub implicit_field: Option<IdentPart>,
    /// Parts left to navigate as field steps.
    pub residual: Vec<IdentPart>,
}

/// One scope level plus the levels enclosing it.
#[derive(Debug, Clone, Default)]
pub struct TypeEnv<'a> {
    bindings: Vec<Binding>,
    outer: Option<&'a TypeEnv<'a>>,
}

impl<'a> TypeEnv<'a> {
    /// A top-level scope.
    pub fn new(bindings: Vec<Binding>) -> Self {
        Self {
            bindings,
            outer: None,
        }
    }

    /// A nested scope whose misses fall through to `self`.
    pub fn nest(&'a self, bindings: Vec<Binding>) -> TypeEnv<'a> {
        TypeEnv {
            bindings,
            outer: Some(self),
        }
    }

    pub fn bindings(&self) -> &[Binding] {
        &self.bindings
    }

    /// Names visible from this level, innermost first.
    pub fn visible_names(&self) -> Vec<String> {
        let mut names: Vec<String> = self.bindings.iter().map(|b| b.name.clone()).collect();
        if let Some(outer) = self.outer {
            names.extend(outer.visible_names());
        }
        names
    }

    /// A binding of this level matched by name, first in declaration order.
    pub fn local(&self, part: &IdentPart) -> Option<(usize, &Binding)> {
        self.bindings.iter().enumerate().find(|(_, b)| part.matches(&b.name))
    }

    /// Resolve a (possibly qualified) variable reference against the local
    /// levels only.
    pub fn resolve(&self, path: &Identifier) -> Option<ResolvedVar> {
        let (first, rest) = path.parts.split_first()?;
        let mut level = Some(self);
        let mut depth = 0;
        while let Some(env) = level {
            if let Some(found) = env.resolve_at_level(first, rest, depth) {
                return Some(found);
            }
            level = env.outer;
            depth += 1;
        }
        None
    }

    fn resolve_at_level(&self, first: &IdentPart, rest: &[IdentPart], depth: usize) -> Option<ResolvedVar> {
        if let Some((ordinal, binding)) = self.local(first) {
            return Some(ResolvedVar {
                depth,
                ordinal,
                name: binding.name.clone(),
                ty: binding.ty.clone(),
                implicit_field: None,
                residual: rest.to_vec(),
            });
        }

        // The first part may be a field of one of this level's rows
        let owner = self
            .bindings
            .iter()
            .position(|b| definitely_contains(&b.ty, first))
            .or_else(|| self.bindings.iter().position(|b| has_open_content(&b.ty)))?;
        let binding = &self.bindings[owner];
        Some(ResolvedVar {
            depth,
            ordinal: owner,
            name: binding.name.clone(),
            ty: binding.ty.clone(),
            implicit_field: Some(first.clone()),
            residual: rest.to_vec(),
        })
    }
}

/// Some struct member of `ty` lists a field matched by `part`.
fn definitely_contains(ty: &StaticType, part: &IdentPart) -> bool {
    ty.members().iter().any(|m| match m {
        StaticType::Struct(s) => s.contains(part),
        _ => false,
    })
}

/// Values of `ty` may carry fields that are not statically listed.
fn has_open_content(ty: &StaticType) -> bool {
    ty.members().iter().any(|m| match m {
        StaticType::Any => true,
        StaticType::Struct(s) => !s.is_closed(),
        _ => false,
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::types::{StructField, StructType};

    fn row(fields: &[(&str, StaticType)]) -> StaticType {
        StaticType::row(fields.iter().cloned())
    }

    #[test]
    fn test_binding_name_wins() {
        let env = TypeEnv::new(vec![
            Binding::new("t", row(&[("a", StaticType::Int)])),
            Binding::new("a", StaticType::Bool),
        ]);
        let found = env.resolve(&Identifier::regular("a")).unwrap();
        assert_eq!(found.ordinal, 1);
        assert_eq!(found.ty, StaticType::Bool);
        assert!(found.implicit_field.is_none());
    }

    #[test]
    fn test_regular_name_ignores_case() {
        let env = TypeEnv::new(vec![Binding::new("Orders", StaticType::Int)]);
        assert!(env.resolve(&Identifier::regular("ORDERS")).is_some());
        assert!(env.resolve(&Identifier::delimited("orders")).is_none());
        assert!(env.resolve(&Identifier::delimited("Orders")).is_some());
    }

    #[test]
    fn test_field_of_binding() {
        let env = TypeEnv::new(vec![
            Binding::new("t1", row(&[("a", StaticType::Int)])),
            Binding::new("t2", row(&[("b", StaticType::Bool)])),
        ]);
        let found = env.resolve(&Identifier::regular("b")).unwrap();
        assert_eq!(found.name, "t2");
        assert_eq!(found.implicit_field, Some(IdentPart::regular("b")));
    }

    #[test]
    fn test_definite_field_beats_open_binding() {
        let open = StaticType::Struct(StructType::open(vec![StructField::new("x", StaticType::Int)]));
        let env = TypeEnv::new(vec![
            Binding::new("o", open),
            Binding::new("c", row(&[("b", StaticType::Bool)])),
        ]);
        assert_eq!(env.resolve(&Identifier::regular("b")).unwrap().name, "c");
        assert_eq!(env.resolve(&Identifier::regular("zzz")).unwrap().name, "o");
    }

    #[test]
    fn test_closed_rows_do_not_absorb_unknown_names() {
        let env = TypeEnv::new(vec![Binding::new("t", row(&[("a", StaticType::Int)]))]);
        assert!(env.resolve(&Identifier::regular("b")).is_none());
    }

    #[test]
    fn test_outer_levels_after_inner() {
        let outer = TypeEnv::new(vec![Binding::new("x", StaticType::Int)]);
        let inner = outer.nest(vec![Binding::new("y", StaticType::Bool)]);
        let found = inner.resolve(&Identifier::regular("x")).unwrap();
        assert_eq!(found.depth, 1);
        assert_eq!(found.ordinal, 0);
        assert_eq!(inner.visible_names(), vec!["y", "x"]);
    }

    #[test]
    fn test_inner_shadows_outer() {
        let outer = TypeEnv::new(vec![Binding::new("x", StaticType::Int)]);
        let inner = outer.nest(vec![Binding::new("x", StaticType::Bool)]);
        let found = inner.resolve(&Identifier::regular("x")).unwrap();
        assert_eq!(found.depth, 0);
        assert_eq!(found.ty, StaticType::Bool);
    }

    #[test]
    fn test_qualified_path_keeps_residual() {
        let env = TypeEnv::new(vec![Binding::new("t", row(&[("a", StaticType::Int)]))]);
        let found = env.resolve(&Identifier::qualified(["t", "a"])).unwrap();
        assert_eq!(found.name, "t");
        assert_eq!(found.residual, vec![IdentPart::regular("a")]);
    }
}
