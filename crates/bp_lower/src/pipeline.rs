//! Runs the enabled passes over one program, in dependency order.
//!
//! Classes and parameters go first because they produce destructuring,
//! spread and block bindings of their own; async functions become
//! generators before generators become state machines. Temporaries get
//! their final names last, once every pass has allocated its own.
//!
//! The generator state machine hoists every local into one function scope
//! and cannot resume into the middle of a destructuring pattern, so when a
//! program has generators or async functions to lower, destructuring and
//! block bindings are lowered too whatever the options say.

use bp_ast::{Arrow, Function, ModuleFormat, Options, Program, Span};
use tracing::{debug, info_span};

use crate::async_fn::lower_async_functions;
use crate::block_binding::lower_block_bindings;
use crate::classes::lower_classes;
use crate::destructuring::lower_destructuring;
use crate::diagnostics::{Diagnostic, Reporter};
use crate::free_vars::check_free_variables;
use crate::generator::lower_generators;
use crate::modules::lower_modules;
use crate::parameters::lower_parameters;
use crate::rename::rename_temporaries;
use crate::runtime_imports::bind_runtime_helpers;
use crate::spread::lower_spread;
use crate::temps::TempAllocator;
use crate::visit::{self, Visit};

/// The lowered program and everything reported while producing it.
#[derive(Debug)]
pub struct Compilation {
    pub program: Program,
    pub diagnostics: Vec<Diagnostic>,
}

impl Compilation {
    pub fn is_ok(&self) -> bool {
        !self.diagnostics.iter().any(Diagnostic::is_error)
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Pass {
    FreeVariables,
    Classes,
    Parameters,
    Spread,
    Destructuring,
    BlockBinding,
    AsyncFunctions,
    Generators,
    RuntimeImports,
    Modules,
}

impl Pass {
    const ORDER: [Pass; 10] = [
        Pass::FreeVariables,
        Pass::Classes,
        Pass::Parameters,
        Pass::Spread,
        Pass::Destructuring,
        Pass::BlockBinding,
        Pass::AsyncFunctions,
        Pass::Generators,
        Pass::RuntimeImports,
        Pass::Modules,
    ];

    fn name(self) -> &'static str {
        match self {
            Pass::FreeVariables => "free_variables",
            Pass::Classes => "classes",
            Pass::Parameters => "parameters",
            Pass::Spread => "spread",
            Pass::Destructuring => "destructuring",
            Pass::BlockBinding => "block_binding",
            Pass::AsyncFunctions => "async_functions",
            Pass::Generators => "generators",
            Pass::RuntimeImports => "runtime_imports",
            Pass::Modules => "modules",
        }
    }

    fn enabled(self, options: &Options) -> bool {
        match self {
            Pass::FreeVariables => options.free_variable_checker,
            Pass::Classes => options.classes,
            Pass::Parameters => options.parameters,
            Pass::Spread => options.spread,
            Pass::Destructuring => options.destructuring,
            Pass::BlockBinding => options.block_binding,
            Pass::AsyncFunctions => options.async_functions,
            Pass::Generators => options.generators,
            Pass::RuntimeImports => options.import_runtime || options.require_runtime,
            Pass::Modules => true,
        }
    }

    fn run(self, program: &Program, options: &Options, alloc: &mut TempAllocator, reporter: &mut Reporter) -> Program {
        match self {
            Pass::FreeVariables => {
                check_free_variables(program, &options.globals, reporter);
                program.clone()
            }
            Pass::Classes => lower_classes(program, alloc, reporter),
            Pass::Parameters => lower_parameters(program, alloc),
            Pass::Spread => lower_spread(program, alloc),
            Pass::Destructuring => lower_destructuring(program, alloc, options.block_binding),
            Pass::BlockBinding => lower_block_bindings(program, alloc, reporter),
            Pass::AsyncFunctions => lower_async_functions(program, alloc),
            Pass::Generators => lower_generators(program, alloc, reporter),
            Pass::RuntimeImports => bind_runtime_helpers(program, options),
            Pass::Modules => lower_modules(program, &options.modules, alloc, reporter),
        }
    }
}

/// Looks for functions the generator passes will rewrite.
#[derive(Default)]
struct FindSuspendable {
    generators: bool,
    async_functions: bool,
}

impl Visit for FindSuspendable {
    fn visit_function(&mut self, function: &Function) {
        self.generators |= function.is_generator;
        self.async_functions |= function.is_async;
        visit::walk_function(self, function);
    }

    fn visit_arrow(&mut self, arrow: &Arrow) {
        self.async_functions |= arrow.is_async;
        visit::walk_arrow(self, arrow);
    }
}

/// `options` with the lowerings the state machine depends on switched on
/// when `program` needs it.
fn effective_options(program: &Program, options: &Options) -> Options {
    let mut effective = options.clone();
    if effective.destructuring && effective.block_binding {
        return effective;
    }
    let mut finder = FindSuspendable::default();
    finder.visit_program(program);
    let needs_machine =
        (finder.generators && options.generators) || (finder.async_functions && options.async_functions);
    if needs_machine {
        debug!(
            destructuring = options.destructuring,
            block_binding = options.block_binding,
            "generators present, enabling destructuring and block bindings"
        );
        effective.destructuring = true;
        effective.block_binding = true;
    }
    effective
}

/// Lowers `program` with every pass `options` enables.
///
/// Stops after the first pass that reports an error and returns the tree
/// as that pass left it, with temporaries still unnamed. An unknown module
/// format is reported up front; every other pass still runs and only the
/// module lowering is skipped.
pub fn compile(program: &Program, options: &Options) -> Compilation {
    let mut alloc = TempAllocator::new();
    let mut reporter = Reporter::new();
    let options = &effective_options(program, options);
    let format = match options.module_format() {
        Ok(format) => format,
        Err(err) => {
            reporter.error(Span::DUMMY, err.to_string());
            ModuleFormat::None
        }
    };
    let config_errors = reporter.error_count();
    let mut current = program.clone();
    for pass in Pass::ORDER.into_iter().filter(|p| p.enabled(options)) {
        if pass == Pass::Modules && format == ModuleFormat::None {
            continue;
        }
        let _span = info_span!("pass", name = pass.name()).entered();
        current = pass.run(&current, options, &mut alloc, &mut reporter);
        if reporter.error_count() > config_errors {
            debug!(errors = reporter.error_count(), "stopping");
            return Compilation {
                program: current,
                diagnostics: reporter.into_diagnostics(),
            };
        }
    }
    debug!(temps = alloc.count(), "renaming temporaries");
    Compilation {
        program: rename_temporaries(&current),
        diagnostics: reporter.into_diagnostics(),
    }
}
