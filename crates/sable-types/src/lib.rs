//! Sable Types
//!
//! Static type inference for Sable query plans. This crate provides:
//! - The static type model and cast lattice (`types`, `lattice`)
//! - Function signatures, the builtin registry and overload resolution
//!   (`signature`, `registry`, `resolver`)
//! - Variable scopes and catalog lookup (`env`, `catalog`)
//! - The plan typer producing a fully typed plan (`checker`, `inference`)

pub mod types;
pub mod lattice;
pub mod signature;
pub mod error;
pub mod registry;
pub mod resolver;
pub mod catalog;
pub mod env;
pub mod config;
pub mod typed;
pub mod inference;
pub mod checker;
mod exclude;


pub use catalog::{Catalog, CatalogEntry, MemoryCatalog, Session};
pub use checker::{check_statement, PlanTyper};
pub use config::{ExcludePolicy, TyperConfig};
pub use env::{Binding, TypeEnv};
pub use error::{DiagnosticSink, Problem, ProblemCollector, ProblemKind, Severity};
pub use lattice::{CastRelationship, TypeLattice};
pub use registry::FunctionRegistry;
pub use resolver::{CoercionDistance, DeferTies, FnResolver, MatchPolicy};
pub use signature::{ArgCast, Candidate, FnMatch, FnSignature};
pub use typed::{TypedRel, TypedRex, TypedStatement};
pub use types::{StaticType, StructType, TypeKind};
