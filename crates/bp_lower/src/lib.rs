//! Lowering passes that rewrite ES2015+ syntax into ES5 for backport.
//!
//! Each pass maps a [`bp_ast::Program`] to a new one, sharing every subtree
//! it leaves alone:
//! - `class C extends B {}`      → constructor function + `$traceurRuntime.createClass`
//! - `function f(a = 1, ...r)`   → `arguments` reads
//! - `f(...xs)`                  → `f.apply(void 0, $traceurRuntime.spread(xs))`
//! - `var {a, b} = o`            → member reads through a temporary
//! - `let` / `const`             → `var`, renamed on collision, with loop closures
//! - `async function`            → `$traceurRuntime.spawn` over a generator
//! - `function*`                 → a `$ctx` state machine
//! - `import` / `export`         → CommonJS or AMD
//!
//! [`compile`] runs them in order and names the temporaries they allocated.

pub mod async_fn;
pub mod block_binding;
pub mod classes;
pub mod destructuring;
pub mod diagnostics;
pub mod free_vars;
pub mod generator;
pub mod modules;
pub mod parameters;
pub mod pipeline;
pub mod rename;
pub mod runtime;
pub mod runtime_imports;
pub mod scope;
pub mod spread;
pub mod temps;
pub mod transform;
pub mod util;
pub mod visit;

#[cfg(test)]
mod test_util;

pub use diagnostics::{Diagnostic, Reporter, Severity};
pub use modules::file_path_to_binding_name;
pub use pipeline::{compile, Compilation};
pub use temps::TempAllocator;
