//! JavaScript AST for backport.
//!
//! An immutable, `Rc`-shared tree covering the ES2017 surface the lowering
//! passes understand, plus:
//! - temporary identifier tokens resolved to text by a late renaming pass
//! - node factories for synthesized code
//! - [`Options`], the feature flags of one compilation

pub mod factory;
pub mod node;
pub mod ops;
pub mod options;
pub mod span;
pub mod temp;

pub use node::*;
pub use ops::{AssignOp, BinaryOp, UnaryOp, UpdateOp, VarKind};
pub use options::{ConfigError, ModuleFormat, Options};
pub use span::Span;
pub use temp::{Atom, Name, TempToken};
