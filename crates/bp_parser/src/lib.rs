//! JavaScript frontend for backport.
//!
//! Wraps the standard SWC parser and converts its output into the
//! immutable `bp_ast` model the lowering passes operate on.
//!
//! - [`parse`] parses a script or module and returns the converted program
//! - syntax outside the modelled surface (optional chaining, object
//!   rest/spread, class fields, ...) is rejected with located errors

mod convert;
pub mod parse;
mod support;

pub use parse::{parse, parse_expr, parse_module, parse_script, ParseResult, SourceKind};
