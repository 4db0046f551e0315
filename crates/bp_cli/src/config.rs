//! Compilation options from an optional JSON file plus command-line flags.

use std::path::Path;

use anyhow::{Context, Result};
use bp_ast::Options;
use clap::Args;

/// Flags that override the config file.
#[derive(Args, Debug, Default, Clone)]
pub struct OptionFlags {
    /// JSON file with compilation options (camelCase keys).
    #[arg(short, long)]
    pub config: Option<std::path::PathBuf>,
    /// Module format: none, commonjs or amd.
    #[arg(long)]
    pub modules: Option<String>,
    /// Turn off a lowering (destructuring, blockBinding, generators,
    /// asyncFunctions, classes, parameters, spread). Repeatable.
    #[arg(long = "disable", value_name = "LOWERING")]
    pub disabled: Vec<String>,
    /// Report references to undeclared names.
    #[arg(long)]
    pub free_variable_checker: bool,
    /// Names the free-variable checker accepts. Repeatable.
    #[arg(long = "global", value_name = "NAME")]
    pub globals: Vec<String>,
    /// Bind runtime helpers through module imports.
    #[arg(long)]
    pub import_runtime: bool,
    /// Bind runtime helpers through `require` in scripts.
    #[arg(long)]
    pub require_runtime: bool,
}

pub fn load_options(flags: &OptionFlags) -> Result<Options> {
    let mut options = match &flags.config {
        Some(path) => read_config(path)?,
        None => Options::default(),
    };
    if let Some(modules) = &flags.modules {
        options.modules = modules.clone();
    }
    for name in &flags.disabled {
        let toggle = match name.as_str() {
            "destructuring" => &mut options.destructuring,
            "blockBinding" => &mut options.block_binding,
            "generators" => &mut options.generators,
            "asyncFunctions" => &mut options.async_functions,
            "classes" => &mut options.classes,
            "parameters" => &mut options.parameters,
            "spread" => &mut options.spread,
            other => anyhow::bail!("unknown lowering `{other}`"),
        };
        *toggle = false;
    }
    options.free_variable_checker |= flags.free_variable_checker;
    options.globals.extend(flags.globals.iter().cloned());
    options.import_runtime |= flags.import_runtime;
    options.require_runtime |= flags.require_runtime;
    options.module_format()?;
    tracing::debug!(?options, "resolved options");
    Ok(options)
}

fn read_config(path: &Path) -> Result<Options> {
    let text = std::fs::read_to_string(path)
        .with_context(|| format!("failed to read config {}", path.display()))?;
    serde_json::from_str(&text).with_context(|| format!("invalid config {}", path.display()))
}

#[cfg(test)]
mod tests {
    use std::io::Write;

    use super::*;

    fn config_file(json: &str) -> tempfile::NamedTempFile {
        let mut file = tempfile::NamedTempFile::new().unwrap();
        file.write_all(json.as_bytes()).unwrap();
        file
    }

    #[test]
    fn defaults_without_a_file() {
        let options = load_options(&OptionFlags::default()).unwrap();
        assert_eq!(options, Options::default());
    }

    #[test]
    fn flags_override_the_file() {
        let file = config_file(r#"{"modules": "amd", "generators": false, "globals": ["window"]}"#);
        let flags = OptionFlags {
            config: Some(file.path().to_path_buf()),
            modules: Some("commonjs".into()),
            disabled: vec!["blockBinding".into()],
            globals: vec!["document".into()],
            ..OptionFlags::default()
        };
        let options = load_options(&flags).unwrap();
        assert_eq!(options.modules, "commonjs");
        assert!(!options.generators);
        assert!(!options.block_binding);
        assert!(options.destructuring);
        assert_eq!(options.globals, ["window", "document"]);
    }

    #[test]
    fn rejects_unknown_formats_and_lowerings() {
        let flags = OptionFlags {
            modules: Some("system".into()),
            ..OptionFlags::default()
        };
        let err = load_options(&flags).unwrap_err();
        assert!(err.to_string().contains("system"));

        let flags = OptionFlags {
            disabled: vec!["macros".into()],
            ..OptionFlags::default()
        };
        assert!(load_options(&flags).is_err());
    }

    #[test]
    fn malformed_config_names_the_file() {
        let file = config_file("{ not json");
        let flags = OptionFlags {
            config: Some(file.path().to_path_buf()),
            ..OptionFlags::default()
        };
        let err = load_options(&flags).unwrap_err();
        assert!(format!("{err:#}").contains("invalid config"));
    }
}
