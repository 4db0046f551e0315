mod config;

use std::path::{Path, PathBuf};

use anyhow::{bail, Context, Result};
use bp_lower::{compile, Compilation};
use bp_parser::{parse, SourceKind};
use clap::{Parser, Subcommand};
use tracing_subscriber::EnvFilter;

use crate::config::{load_options, OptionFlags};

#[derive(Parser)]
#[command(name = "bp", about = "backport: lower ES2015+ JavaScript to ES5")]
struct Cli {
    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Parse, lower and print ES5.
    Compile {
        /// Input .js/.mjs file.
        input: PathBuf,
        /// Output file (stdout if omitted).
        #[arg(short, long)]
        output: Option<PathBuf>,
        /// Parse the input as a module.
        #[arg(long)]
        module: bool,
        #[command(flatten)]
        options: OptionFlags,
    },
    /// Run the passes and report diagnostics without printing.
    Check {
        input: PathBuf,
        #[arg(long)]
        module: bool,
        #[command(flatten)]
        options: OptionFlags,
    },
    /// Parse and dump the AST.
    Parse {
        input: PathBuf,
        #[arg(long)]
        module: bool,
        /// Print JSON instead of the debug representation.
        #[arg(long)]
        json: bool,
    },
}

fn source_kind(input: &Path, module: bool) -> SourceKind {
    if module {
        return SourceKind::Module;
    }
    SourceKind::from_filename(&input.display().to_string())
}

/// Reads and lowers `input`, writing rendered diagnostics to stderr.
fn run(input: &Path, module: bool, flags: &OptionFlags) -> Result<Compilation> {
    let options = load_options(flags)?;
    let source = std::fs::read_to_string(input)
        .with_context(|| format!("failed to read {}", input.display()))?;
    let filename = input.display().to_string();
    let kind = match source_kind(input, module) {
        SourceKind::Script if options.module_format()? != bp_ast::ModuleFormat::None => SourceKind::Module,
        kind => kind,
    };
    let parsed = parse(&source, &filename, kind)?;
    let compilation = compile(&parsed.program, &options);
    for diagnostic in &compilation.diagnostics {
        eprintln!("{}", diagnostic.render(&filename));
    }
    if !compilation.is_ok() {
        let errors = compilation.diagnostics.iter().filter(|d| d.is_error()).count();
        bail!("{filename}: {errors} error(s)");
    }
    Ok(compilation)
}

fn main() -> Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("warn")))
        .with_writer(std::io::stderr)
        .init();

    let cli = Cli::parse();

    match cli.command {
        Commands::Compile {
            input,
            output,
            module,
            options,
        } => {
            let compilation = run(&input, module, &options)?;
            let text = bp_codegen::print_program(&compilation.program);
            match &output {
                Some(path) => std::fs::write(path, &text)
                    .with_context(|| format!("failed to write {}", path.display()))?,
                None => print!("{text}"),
            }
        }
        Commands::Check {
            input,
            module,
            options,
        } => {
            run(&input, module, &options)?;
            eprintln!("OK: {}", input.display());
        }
        Commands::Parse {
            input,
            module,
            json,
        } => {
            let source = std::fs::read_to_string(&input)
                .with_context(|| format!("failed to read {}", input.display()))?;
            let filename = input.display().to_string();
            let parsed = parse(&source, &filename, source_kind(&input, module))?;

            if json {
                let json = serde_json::to_string_pretty(&parsed.program)?;
                println!("{json}");
            } else {
                println!("{:#?}", parsed.program);
            }
        }
    }

    Ok(())
}

#[cfg(test)]
mod tests {
    use std::io::Write;

    use super::*;

    fn source_file(suffix: &str, text: &str) -> tempfile::NamedTempFile {
        let mut file = tempfile::Builder::new().suffix(suffix).tempfile().unwrap();
        file.write_all(text.as_bytes()).unwrap();
        file
    }

    #[test]
    fn module_flag_and_extension_pick_the_source_kind() {
        assert_eq!(source_kind(Path::new("a.mjs"), false), SourceKind::Module);
        assert_eq!(source_kind(Path::new("a.js"), false), SourceKind::Script);
        assert_eq!(source_kind(Path::new("a.js"), true), SourceKind::Module);
    }

    #[test]
    fn run_lowers_a_file() {
        let file = source_file(".js", "let [a] = [1];");
        let compilation = run(file.path(), false, &OptionFlags::default()).unwrap();
        let text = bp_codegen::print_program(&compilation.program);
        assert!(text.starts_with("var "), "{text}");
    }

    #[test]
    fn a_module_format_parses_scripts_as_modules() {
        let file = source_file(".js", "export var a = 1;");
        let flags = OptionFlags {
            modules: Some("commonjs".into()),
            ..OptionFlags::default()
        };
        let compilation = run(file.path(), false, &flags).unwrap();
        let text = bp_codegen::print_program(&compilation.program);
        assert!(text.contains("module.exports"), "{text}");
    }

    #[test]
    fn errors_fail_the_run() {
        let file = source_file(".js", "a;");
        let flags = OptionFlags {
            free_variable_checker: true,
            ..OptionFlags::default()
        };
        let err = run(file.path(), false, &flags).unwrap_err();
        assert!(err.to_string().contains("1 error(s)"), "{err}");
    }
}
