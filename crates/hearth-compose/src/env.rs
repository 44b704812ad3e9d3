//! Layered key-value environments.
//!
//! Layers are stacked least specific first (shared defaults, then
//! machine-specific overrides, then the process environment). A lookup
//! walks from the most specific layer down and returns the first value.

use std::collections::BTreeMap;
use std::ffi::OsString;
use std::path::{Path, PathBuf};

use hearth_common::error::{HearthError, Result};

/// One named mapping of variables.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct EnvironmentLayer {
    /// Where the layer came from (file path or `process`).
    pub name: String,
    /// Variables defined by this layer.
    pub vars: BTreeMap<String, String>,
}

impl EnvironmentLayer {
    /// Creates an empty layer.
    #[must_use]
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            vars: BTreeMap::new(),
        }
    }

    /// Adds a variable, replacing any previous value.
    #[must_use]
    pub fn with(mut self, key: impl Into<String>, value: impl Into<String>) -> Self {
        let _ = self.vars.insert(key.into(), value.into());
        self
    }

    /// Parses `KEY=value` lines.
    ///
    /// Blank lines and `#` comments are skipped, an `export ` prefix is
    /// ignored, and matching single or double quotes around the value are
    /// removed. Unquoted values end at ` #`. Later lines override earlier ones.
    ///
    /// # Errors
    ///
    /// Returns [`HearthError::Parse`] naming the line of the first entry
    /// without `=` or with an invalid variable name.
    pub fn parse(name: impl Into<String>, content: &str) -> Result<Self> {
        let mut layer = Self::new(name);
        for (lineno, raw) in content.lines().enumerate() {
            let line = raw.trim();
            if line.is_empty() || line.starts_with('#') {
                continue;
            }
            let line = line.strip_prefix("export ").map_or(line, str::trim_start);
            let Some((key, value)) = line.split_once('=') else {
                return Err(parse_err(&layer.name, lineno, "expected KEY=value"));
            };
            let key = key.trim();
            if !is_valid_key(key) {
                return Err(parse_err(
                    &layer.name,
                    lineno,
                    &format!("invalid variable name \"{key}\""),
                ));
            }
            let _ = layer.vars.insert(key.to_string(), unquote(value.trim()));
        }
        Ok(layer)
    }

    /// Reads and parses an environment file.
    ///
    /// # Errors
    ///
    /// Returns an error if the file cannot be read or parsed.
    pub fn from_file(path: &Path) -> Result<Self> {
        let content = std::fs::read_to_string(path).map_err(|e| HearthError::Io {
            path: path.to_path_buf(),
            source: e,
        })?;
        Self::parse(path.display().to_string(), &content)
    }

    /// Captures the current process environment.
    #[must_use]
    pub fn from_process_env() -> Self {
        Self::from_os_vars("process", std::env::vars_os())
    }

    /// Builds a layer from raw OS pairs, skipping entries that are not
    /// valid UTF-8.
    #[must_use]
    pub fn from_os_vars(
        name: impl Into<String>,
        vars: impl IntoIterator<Item = (OsString, OsString)>,
    ) -> Self {
        let vars = vars
            .into_iter()
            .filter_map(|(key, value)| match (key.into_string(), value.into_string()) {
                (Ok(key), Ok(value)) => Some((key, value)),
                (key, _) => {
                    tracing::debug!(?key, "skipping non UTF-8 environment variable");
                    None
                }
            })
            .collect();
        Self {
            name: name.into(),
            vars,
        }
    }

    /// Returns the value of `key` in this layer only.
    #[must_use]
    pub fn get(&self, key: &str) -> Option<&str> {
        self.vars.get(key).map(String::as_str)
    }
}

fn parse_err(origin: &str, lineno: usize, message: &str) -> HearthError {
    HearthError::Parse {
        origin: origin.to_string(),
        message: format!("line {}: {message}", lineno + 1),
    }
}

fn is_valid_key(key: &str) -> bool {
    let mut chars = key.chars();
    chars
        .next()
        .is_some_and(|c| c.is_ascii_alphabetic() || c == '_')
        && chars.all(|c| c.is_ascii_alphanumeric() || c == '_')
}

fn unquote(value: &str) -> String {
    for quote in ['"', '\''] {
        if value.len() >= 2 && value.starts_with(quote) && value.ends_with(quote) {
            return value[1..value.len() - 1].to_string();
        }
    }
    value
        .find(" #")
        .map_or(value, |idx| value[..idx].trim_end())
        .to_string()
}

/// An ordered stack of layers, least specific first.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct EnvironmentLayers {
    layers: Vec<EnvironmentLayer>,
}

impl EnvironmentLayers {
    /// Creates an empty stack.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Pushes a layer that overrides every layer already in the stack.
    pub fn push(&mut self, layer: EnvironmentLayer) {
        self.layers.push(layer);
    }

    /// Returns the layers, least specific first.
    #[must_use]
    pub fn layers(&self) -> &[EnvironmentLayer] {
        &self.layers
    }

    /// Looks `key` up from the most specific layer down.
    #[must_use]
    pub fn lookup(&self, key: &str) -> Option<&str> {
        self.layers.iter().rev().find_map(|layer| layer.get(key))
    }

    /// Loads a stack from environment files and, optionally, the process
    /// environment as the top layer.
    ///
    /// When `missing_ok` is set, files that do not exist are skipped.
    ///
    /// # Errors
    ///
    /// Returns an error if a file cannot be read or parsed.
    pub fn load(files: &[PathBuf], missing_ok: bool, inherit_process_env: bool) -> Result<Self> {
        let mut stack = Self::new();
        for path in files {
            if missing_ok && !path.exists() {
                tracing::debug!(path = %path.display(), "environment file not present, skipping");
                continue;
            }
            let layer = EnvironmentLayer::from_file(path)?;
            tracing::debug!(
                path = %path.display(),
                vars = layer.vars.len(),
                "loaded environment layer"
            );
            stack.push(layer);
        }
        if inherit_process_env {
            stack.push(EnvironmentLayer::from_process_env());
        }
        Ok(stack)
    }
}

impl FromIterator<EnvironmentLayer> for EnvironmentLayers {
    fn from_iter<I: IntoIterator<Item = EnvironmentLayer>>(iter: I) -> Self {
        Self {
            layers: iter.into_iter().collect(),
        }
    }
}
