//! Pairwise cast relationships between type kinds.
//!
//! The lattice is a dense table built once per process. Coercions inside a
//! promotion chain are transitively closed and carry a distance (number of
//! widening steps) used to rank overloads.

use once_cell::sync::Lazy;

use crate::types::TypeKind;

/// How a value of one kind may become another.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub enum CastRelationship {
    /// Safe widening, inserted automatically.
    Coercion,
    /// Allowed only through an explicit `CAST`.
    Explicit,
    /// Narrowing that may fail at runtime; explicit `CAST` only.
    Unsafe,
}

/// One cell of the lattice.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct CastEdge {
    pub relationship: CastRelationship,
    /// Widening steps; zero for identity, absence markers and `ANY`.
    pub distance: u32,
}

const KINDS: usize = TypeKind::ALL.len();

static STANDARD: Lazy<TypeLattice> = Lazy::new(TypeLattice::build);

const NUMERIC_CHAIN: &[TypeKind] = &TypeKind::NUMERICS;
const TEXT_CHAIN: &[TypeKind] = &TypeKind::TEXT;
const BINARY_CHAIN: &[TypeKind] = &[TypeKind::Binary, TypeKind::Blob];
const DATETIME_CHAIN: &[TypeKind] = &[TypeKind::Date, TypeKind::Timestamp];
const LIST_CHAIN: &[TypeKind] = &[TypeKind::List, TypeKind::Bag];
const SEXP_CHAIN: &[TypeKind] = &[TypeKind::Sexp, TypeKind::Bag];

/// The static cast table.
#[derive(Debug, Clone)]
pub struct TypeLattice {
    cells: Vec<Option<CastEdge>>,
}

impl TypeLattice {
    /// The process-wide lattice.
    pub fn standard() -> &'static TypeLattice {
        &STANDARD
    }

    /// Relationship of `from` to `to`, if any conversion exists.
    pub fn relationship(&self, from: TypeKind, to: TypeKind) -> Option<CastRelationship> {
        self.edge(from, to).map(|e| e.relationship)
    }

    /// Coercion distance from `from` to `to`; `None` unless coercible.
    pub fn distance(&self, from: TypeKind, to: TypeKind) -> Option<u32> {
        self.edge(from, to)
            .filter(|e| e.relationship == CastRelationship::Coercion)
            .map(|e| e.distance)
    }

    pub fn is_coercible(&self, from: TypeKind, to: TypeKind) -> bool {
        self.distance(from, to).is_some()
    }

    pub fn edge(&self, from: TypeKind, to: TypeKind) -> Option<CastEdge> {
        self.cells[index(from, to)]
    }

    fn build() -> Self {
        let mut lattice = TypeLattice {
            cells: vec![None; KINDS * KINDS],
        };

        for chain in [NUMERIC_CHAIN, TEXT_CHAIN, BINARY_CHAIN, DATETIME_CHAIN, LIST_CHAIN, SEXP_CHAIN] {
            lattice.chain(chain);
        }

        // Cross-chain scalar conversions
        for &num in NUMERIC_CHAIN {
            for &text in TEXT_CHAIN {
                lattice.set(num, text, CastRelationship::Explicit, 0);
                lattice.set(text, num, CastRelationship::Unsafe, 0);
            }
            lattice.set(TypeKind::Bool, num, CastRelationship::Explicit, 0);
            lattice.set(num, TypeKind::Bool, CastRelationship::Explicit, 0);
        }
        for &text in TEXT_CHAIN {
            lattice.set(TypeKind::Bool, text, CastRelationship::Explicit, 0);
            lattice.set(text, TypeKind::Bool, CastRelationship::Unsafe, 0);
            for temporal in [TypeKind::Date, TypeKind::Time, TypeKind::Timestamp] {
                lattice.set(temporal, text, CastRelationship::Explicit, 0);
                lattice.set(text, temporal, CastRelationship::Unsafe, 0);
            }
        }
        lattice.set(TypeKind::Timestamp, TypeKind::Time, CastRelationship::Unsafe, 0);
        lattice.set(TypeKind::Bag, TypeKind::List, CastRelationship::Explicit, 0);
        lattice.set(TypeKind::Bag, TypeKind::Sexp, CastRelationship::Explicit, 0);
        lattice.set(TypeKind::List, TypeKind::Sexp, CastRelationship::Explicit, 0);
        lattice.set(TypeKind::Sexp, TypeKind::List, CastRelationship::Explicit, 0);

        // ANY, NULL and MISSING are compatible with every kind
        for kind in TypeKind::ALL {
            lattice.set(kind, kind, CastRelationship::Coercion, 0);
            lattice.set(TypeKind::Any, kind, CastRelationship::Coercion, 0);
            lattice.set(kind, TypeKind::Any, CastRelationship::Coercion, 0);
            lattice.set(TypeKind::Null, kind, CastRelationship::Coercion, 0);
            lattice.set(TypeKind::Missing, kind, CastRelationship::Coercion, 0);
        }

        lattice
    }

    /// Widening along `chain` is a coercion, narrowing is unsafe.
    fn chain(&mut self, chain: &[TypeKind]) {
        for (i, &lo) in chain.iter().enumerate() {
            for (j, &hi) in chain.iter().enumerate().skip(i + 1) {
                self.set(lo, hi, CastRelationship::Coercion, (j - i) as u32);
                self.set(hi, lo, CastRelationship::Unsafe, 0);
            }
        }
    }

    fn set(&mut self, from: TypeKind, to: TypeKind, relationship: CastRelationship, distance: u32) {
        self.cells[index(from, to)] = Some(CastEdge {
            relationship,
            distance,
        });
    }
}

fn index(from: TypeKind, to: TypeKind) -> usize {
    from as usize * KINDS + to as usize
}
