//! Compilation options: which lowerings run and how modules are emitted.

use std::str::FromStr;

use serde::{Deserialize, Serialize};

/// Feature flags and settings for one compilation.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default, rename_all = "camelCase")]
pub struct Options {
    pub destructuring: bool,
    pub block_binding: bool,
    pub generators: bool,
    pub async_functions: bool,
    pub classes: bool,
    pub parameters: bool,
    pub spread: bool,
    /// `"none"`, `"commonjs"` or `"amd"`.
    pub modules: String,
    pub free_variable_checker: bool,
    /// Names the free-variable checker accepts without a declaration.
    pub globals: Vec<String>,
    pub import_runtime: bool,
    pub require_runtime: bool,
}

impl Default for Options {
    fn default() -> Self {
        Self {
            destructuring: true,
            block_binding: true,
            generators: true,
            async_functions: true,
            classes: true,
            parameters: true,
            spread: true,
            modules: "none".to_string(),
            free_variable_checker: false,
            globals: Vec::new(),
            import_runtime: false,
            require_runtime: false,
        }
    }
}

impl Options {
    /// Options with every lowering switched off.
    pub fn none() -> Self {
        Self {
            destructuring: false,
            block_binding: false,
            generators: false,
            async_functions: false,
            classes: false,
            parameters: false,
            spread: false,
            ..Self::default()
        }
    }

    pub fn module_format(&self) -> Result<ModuleFormat, ConfigError> {
        self.modules.parse()
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum ModuleFormat {
    None,
    CommonJs,
    Amd,
}

impl FromStr for ModuleFormat {
    type Err = ConfigError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "" | "none" => Ok(ModuleFormat::None),
            "commonjs" => Ok(ModuleFormat::CommonJs),
            "amd" => Ok(ModuleFormat::Amd),
            other => Err(ConfigError::UnsupportedModuleFormat(other.to_string())),
        }
    }
}

impl std::fmt::Display for ModuleFormat {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            ModuleFormat::None => write!(f, "none"),
            ModuleFormat::CommonJs => write!(f, "commonjs"),
            ModuleFormat::Amd => write!(f, "amd"),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum ConfigError {
    #[error("unsupported module format `{0}` (expected none, commonjs or amd)")]
    UnsupportedModuleFormat(String),
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn defaults_enable_every_lowering() {
        let opts = Options::default();
        assert!(opts.destructuring && opts.block_binding && opts.generators);
        assert_eq!(opts.module_format(), Ok(ModuleFormat::None));
    }

    #[test]
    fn module_format_parsing() {
        assert_eq!("amd".parse::<ModuleFormat>(), Ok(ModuleFormat::Amd));
        assert_eq!(
            "register".parse::<ModuleFormat>(),
            Err(ConfigError::UnsupportedModuleFormat("register".into()))
        );
    }

    #[test]
    fn deserializes_camel_case_with_defaults() {
        let opts: Options =
            serde_json::from_str(r#"{"blockBinding": false, "modules": "commonjs"}"#).unwrap();
        assert!(!opts.block_binding);
        assert!(opts.destructuring);
        assert_eq!(opts.module_format(), Ok(ModuleFormat::CommonJs));
    }
}
