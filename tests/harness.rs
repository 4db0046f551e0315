//! Golden-file test harness for backport.
//!
//! Discovers `.input.js` (script) and `.input.mjs` (module) files under
//! `tests/fixtures/`, runs the whole pipeline (parse → lower → print), and
//! compares the output against the sibling `.expected.js` file. Both sides
//! go through the printer, so only structure and names are compared.
//!
//! A first line `// options: {...}` holds JSON compilation options for
//! that fixture.
//!
//! Set `BP_UPDATE_FIXTURES=1` to overwrite expected files with actual output.

use std::path::{Path, PathBuf};

use anyhow::{bail, Context, Result};
use bp_ast::{Options, Program};
use bp_lower::compile;
use bp_parser::{parse, SourceKind};

const INPUT_SUFFIXES: [&str; 2] = [".input.js", ".input.mjs"];

fn fixtures_dir() -> PathBuf {
    // CARGO_MANIFEST_DIR is crates/bp_test/, so go up two levels to workspace root.
    PathBuf::from(env!("CARGO_MANIFEST_DIR"))
        .parent()
        .unwrap()
        .parent()
        .unwrap()
        .join("tests")
        .join("fixtures")
}

fn collect_input_files(dir: &Path) -> Vec<PathBuf> {
    let mut files: Vec<PathBuf> = walkdir(dir)
        .into_iter()
        .filter(|path| {
            path.file_name()
                .and_then(|n| n.to_str())
                .is_some_and(|n| INPUT_SUFFIXES.iter().any(|s| n.ends_with(s)))
        })
        .collect();
    files.sort();
    files
}

fn walkdir(dir: &Path) -> Vec<PathBuf> {
    let mut result = Vec::new();
    if let Ok(entries) = std::fs::read_dir(dir) {
        for entry in entries.flatten() {
            let path = entry.path();
            if path.is_dir() {
                result.extend(walkdir(&path));
            } else {
                result.push(path);
            }
        }
    }
    result
}

fn expected_path(input: &Path) -> PathBuf {
    let name = input.to_str().unwrap();
    let stem = INPUT_SUFFIXES
        .iter()
        .find_map(|s| name.strip_suffix(s))
        .unwrap();
    PathBuf::from(format!("{stem}.expected.js"))
}

fn source_kind(input: &Path) -> SourceKind {
    if input.to_str().is_some_and(|n| n.ends_with(".mjs")) {
        SourceKind::Module
    } else {
        SourceKind::Script
    }
}

fn fixture_options(source: &str) -> Result<Options> {
    let first = source.lines().next().unwrap_or_default();
    match first.trim().strip_prefix("// options:") {
        Some(json) => serde_json::from_str(json).context("invalid fixture options"),
        None => Ok(Options::default()),
    }
}

/// Output is a module only when no module format lowered it.
fn output_kind(program: &Program) -> SourceKind {
    if program.is_module() {
        SourceKind::Module
    } else {
        SourceKind::Script
    }
}

fn run_pipeline(source: &str, filename: &str, kind: SourceKind) -> Result<(String, SourceKind)> {
    let options = fixture_options(source)?;
    let parsed = parse(source, filename, kind)?;
    let compilation = compile(&parsed.program, &options);
    if !compilation.is_ok() {
        let rendered: Vec<String> = compilation
            .diagnostics
            .iter()
            .map(|d| d.render(filename))
            .collect();
        bail!("diagnostics:\n{}", rendered.join("\n"));
    }
    Ok((
        bp_codegen::print_program(&compilation.program),
        output_kind(&compilation.program),
    ))
}

/// Reprints hand-written expected output so formatting does not matter.
fn normalize(source: &str, filename: &str, kind: SourceKind) -> Result<String> {
    let parsed = parse(source, filename, kind)?;
    Ok(bp_codegen::print_program(&parsed.program))
}

#[test]
fn golden_file_tests() {
    let fixtures = fixtures_dir();
    let input_files = collect_input_files(&fixtures);

    assert!(
        !input_files.is_empty(),
        "No test fixtures found in {}",
        fixtures.display()
    );

    let update_mode = std::env::var("BP_UPDATE_FIXTURES").is_ok();
    let mut failures = Vec::new();

    for input_path in &input_files {
        let expected_path = expected_path(input_path);
        let test_name = input_path
            .strip_prefix(&fixtures)
            .unwrap()
            .display()
            .to_string();

        let source = match std::fs::read_to_string(input_path) {
            Ok(s) => s,
            Err(e) => {
                failures.push(format!("{test_name}: failed to read input: {e}"));
                continue;
            }
        };

        let filename = input_path.display().to_string();
        let (actual, kind) = match run_pipeline(&source, &filename, source_kind(input_path)) {
            Ok(out) => out,
            Err(e) => {
                failures.push(format!("{test_name}: pipeline failed: {e:#}"));
                continue;
            }
        };

        if update_mode {
            if let Err(e) = std::fs::write(&expected_path, &actual) {
                failures.push(format!("{test_name}: failed to write expected: {e}"));
            }
            continue;
        }

        if !expected_path.exists() {
            failures.push(format!(
                "{test_name}: missing expected file: {}",
                expected_path.display()
            ));
            continue;
        }

        let expected = match std::fs::read_to_string(&expected_path)
            .map_err(anyhow::Error::from)
            .and_then(|text| normalize(&text, &expected_path.display().to_string(), kind))
        {
            Ok(s) => s,
            Err(e) => {
                failures.push(format!("{test_name}: failed to read expected: {e:#}"));
                continue;
            }
        };
        if actual.trim() != expected.trim() {
            failures.push(format!(
                "{test_name}: output mismatch\n--- expected ---\n{}\n--- actual ---\n{}",
                expected.trim(),
                actual.trim()
            ));
        }
    }

    if !failures.is_empty() {
        panic!(
            "\n{} golden test(s) failed:\n\n{}",
            failures.len(),
            failures.join("\n\n")
        );
    }
}

#[test]
fn roundtrip_tests() {
    let input_files = collect_input_files(&fixtures_dir());

    let mut failures = Vec::new();

    for input_path in &input_files {
        let test_name = input_path
            .file_name()
            .unwrap()
            .to_str()
            .unwrap()
            .to_string();

        let source = match std::fs::read_to_string(input_path) {
            Ok(s) => s,
            Err(e) => {
                failures.push(format!("{test_name}: failed to read: {e}"));
                continue;
            }
        };

        let filename = input_path.display().to_string();
        let (output, kind) = match run_pipeline(&source, &filename, source_kind(input_path)) {
            Ok(out) => out,
            Err(e) => {
                failures.push(format!("{test_name}: pipeline failed: {e:#}"));
                continue;
            }
        };

        if let Err(e) = parse(&output, &format!("{test_name}.output"), kind) {
            failures.push(format!(
                "{test_name}: output is not valid JavaScript: {e}\n--- output ---\n{}",
                output.trim()
            ));
        }
    }

    if !failures.is_empty() {
        panic!(
            "\n{} roundtrip test(s) failed:\n\n{}",
            failures.len(),
            failures.join("\n\n")
        );
    }
}
