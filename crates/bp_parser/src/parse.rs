use anyhow::{bail, Result};
use bp_ast::Program;
use swc_common::{
    comments::SingleThreadedComments, errors::Handler, sync::Lrc, FileName, SourceMap,
};
use swc_ecma_ast::EsVersion;
use swc_ecma_parser::{EsSyntax, Syntax};
use swc_ecma_visit::VisitWith;

use crate::convert::Converter;
use crate::support::SupportChecker;

/// How the source text is to be parsed.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SourceKind {
    Script,
    Module,
}

impl SourceKind {
    /// `.mjs` files and anything declared as a module parse as modules.
    pub fn from_filename(filename: &str) -> Self {
        if filename.ends_with(".mjs") {
            SourceKind::Module
        } else {
            SourceKind::Script
        }
    }
}

/// Result of parsing one source file.
pub struct ParseResult {
    pub program: Program,
    pub source_map: Lrc<SourceMap>,
}

/// Parse JavaScript source into a backport [`Program`].
///
/// 1. Parse: feed the text to the SWC parser (plain ECMAScript syntax).
/// 2. Check: reject constructs the lowering passes do not model.
/// 3. Convert: rebuild the tree as `bp_ast` nodes, dropping parentheses.
pub fn parse(source: &str, filename: &str, kind: SourceKind) -> Result<ParseResult> {
    let source_map: Lrc<SourceMap> = Default::default();
    let source_file = source_map.new_source_file(
        Lrc::new(FileName::Custom(filename.to_string())),
        source.to_string(),
    );

    let comments = SingleThreadedComments::default();

    let handler =
        Handler::with_emitter_writer(Box::new(std::io::stderr()), Some(source_map.clone()));

    let syntax = Syntax::Es(EsSyntax {
        allow_return_outside_function: false,
        ..Default::default()
    });

    let mut checker = SupportChecker::new(source_map.clone());
    let program = match kind {
        SourceKind::Module => {
            let module = swc_ecma_parser::parse_file_as_module(
                &source_file,
                syntax,
                EsVersion::latest(),
                Some(&comments),
                &mut vec![],
            )
            .map_err(|e| {
                e.into_diagnostic(&handler).emit();
                anyhow::anyhow!("failed to parse {filename}")
            })?;
            module.visit_with(&mut checker);
            checker.finish(filename)?;
            Converter::new(source_map.clone()).module(&module)
        }
        SourceKind::Script => {
            let script = swc_ecma_parser::parse_file_as_script(
                &source_file,
                syntax,
                EsVersion::latest(),
                Some(&comments),
                &mut vec![],
            )
            .map_err(|e| {
                e.into_diagnostic(&handler).emit();
                anyhow::anyhow!("failed to parse {filename}")
            })?;
            script.visit_with(&mut checker);
            checker.finish(filename)?;
            Converter::new(source_map.clone()).script(&script)
        }
    };

    tracing::debug!(filename, statements = program.body.len(), "parsed");

    Ok(ParseResult {
        program,
        source_map,
    })
}

/// Parse a script held in memory, as tests and tools do.
pub fn parse_script(source: &str) -> Result<Program> {
    Ok(parse(source, "input.js", SourceKind::Script)?.program)
}

/// Parse a module held in memory.
pub fn parse_module(source: &str) -> Result<Program> {
    Ok(parse(source, "input.mjs", SourceKind::Module)?.program)
}

/// Parse a single expression, for callers that build fragments.
pub fn parse_expr(source: &str) -> Result<bp_ast::ExprRef> {
    let program = parse_script(&format!("({source});"))?;
    match program.body.first().map(|s| &s.kind) {
        Some(bp_ast::StmtKind::Expr(expr)) if program.body.len() == 1 => Ok(expr.clone()),
        _ => bail!("`{source}` is not a single expression"),
    }
}
