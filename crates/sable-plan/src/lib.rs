//! Sable Plan
//!
//! Unresolved logical plan model for the Sable query compiler. A front-end
//! (out of this workspace) lowers query text into these nodes; `sable-types`
//! assigns a static type to every one of them.

pub mod span;
pub mod ident;
pub mod ast;

pub use ast::*;
pub use ident::{CaseSensitivity, IdentPart, Identifier};
pub use span::Span;
