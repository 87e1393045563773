use std::fs;
use std::path::Path;

use anyhow::{Context, Result, ensure};
use serde::{Deserialize, Serialize};

/// How the failure branch is regenerated.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Strategy {
    /// Mirror `&&`/`||` evaluation order and print only what was evaluated.
    #[default]
    ShortCircuit,
    /// One printer call covering the whole expression, every leaf included.
    Flat,
}

impl Strategy {
    pub fn from_name(name: &str) -> Option<Self> {
        match name {
            "short_circuit" | "short-circuit" => Some(Self::ShortCircuit),
            "flat" => Some(Self::Flat),
            _ => None,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct RewriteConfig {
    /// Callee that marks the else-branch of a lowered assertion.
    pub failure_function: String,
    /// Variadic, format-string based function the diagnostics call.
    pub printer: String,
    pub strategy: Strategy,
    /// Placeholder printed for every leaf value.
    pub leaf_format: String,
    pub trailing_newline: bool,
    /// Keep the original failure call after the trace instead of dropping it.
    pub preserve_abort: bool,
}

impl Default for RewriteConfig {
    fn default() -> Self {
        Self {
            failure_function: "__assert_fail".to_string(),
            printer: "printf".to_string(),
            strategy: Strategy::ShortCircuit,
            leaf_format: "%d".to_string(),
            trailing_newline: false,
            preserve_abort: false,
        }
    }
}

impl RewriteConfig {
    pub fn from_yaml_str(source: &str) -> Result<Self> {
        let config: Self = serde_yaml::from_str(source).context("Parsing rewrite config")?;
        config.validate()?;
        Ok(config)
    }

    pub fn load(path: &Path) -> Result<Self> {
        let raw =
            fs::read_to_string(path).with_context(|| format!("Reading {}", path.display()))?;
        Self::from_yaml_str(&raw).with_context(|| format!("Loading {}", path.display()))
    }

    pub fn validate(&self) -> Result<()> {
        ensure!(
            !self.failure_function.is_empty(),
            "failure_function must not be empty"
        );
        ensure!(!self.printer.is_empty(), "printer must not be empty");
        let conversions = count_conversions(&self.leaf_format);
        ensure!(
            conversions == 1,
            "leaf_format '{}' must contain exactly one conversion, found {conversions}",
            self.leaf_format
        );
        Ok(())
    }
}

fn count_conversions(format: &str) -> usize {
    let mut count = 0;
    let mut chars = format.chars().peekable();
    while let Some(ch) = chars.next() {
        if ch != '%' {
            continue;
        }
        if chars.peek() == Some(&'%') {
            chars.next();
        } else {
            count += 1;
        }
    }
    count
}
