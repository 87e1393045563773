//! Loader for the fixture cases under `tests/programs`.
//!
//! Each case is a directory holding `case.yaml` and the `unit.yaml` it
//! compiles. Expected output lives in separate files referenced from the case.

use std::collections::BTreeMap;
use std::fs;
use std::path::{Path, PathBuf};

use anyhow::{Context, Result, ensure};
use serde::Deserialize;

use crate::config::RewriteConfig;
use crate::syntax::UnitSyntax;

#[derive(Debug, Deserialize, Clone, Copy, PartialEq, Eq)]
#[serde(rename_all = "snake_case")]
pub enum CaseClass {
    /// Compiles, then runs without an executor error.
    RuntimeSuccess,
    /// The rewrite itself fails.
    RewriteError,
    /// The translation unit is rejected before any pass runs.
    LoweringError,
}

#[derive(Debug, Deserialize, Clone)]
pub struct RunSpec {
    pub function: String,
    #[serde(default)]
    pub env: BTreeMap<String, i64>,
}

#[derive(Debug, Deserialize, Clone, Default)]
#[serde(default)]
pub struct ExpectedOutcome {
    pub stdout_file: Option<String>,
    pub rendered_file: Option<String>,
    pub aborted: bool,
    /// Environment after the run, checked for the listed names only.
    pub env: BTreeMap<String, i64>,
    pub rewritten: Option<usize>,
    pub error_contains: Option<String>,
}

#[derive(Debug, Deserialize, Clone)]
pub struct CaseSpec {
    pub class: CaseClass,
    #[serde(default)]
    pub description: String,
    #[serde(default)]
    pub config: RewriteConfig,
    pub run: Option<RunSpec>,
    #[serde(default)]
    pub expected: ExpectedOutcome,
}

#[derive(Debug, Clone)]
pub struct Case {
    pub name: String,
    pub dir: PathBuf,
    pub unit_path: PathBuf,
    pub spec: CaseSpec,
}

impl Case {
    pub fn read_text(&self, relative_path: &str) -> Result<String> {
        fs::read_to_string(self.dir.join(relative_path))
            .with_context(|| format!("Reading {} fixture file {}", self.name, relative_path))
    }

    pub fn unit(&self) -> Result<UnitSyntax> {
        let raw = fs::read_to_string(&self.unit_path)
            .with_context(|| format!("Reading {}", self.unit_path.display()))?;
        UnitSyntax::from_yaml_str(&raw).with_context(|| format!("Loading {}", self.name))
    }
}

pub fn load_cases(programs_dir: &Path) -> Result<Vec<Case>> {
    let mut cases = Vec::new();

    for entry in
        fs::read_dir(programs_dir).with_context(|| format!("Reading {}", programs_dir.display()))?
    {
        let path = entry?.path();
        if !path.is_dir() {
            continue;
        }

        let case_path = path.join("case.yaml");
        if !case_path.exists() {
            continue;
        }

        let unit_path = path.join("unit.yaml");
        ensure!(
            unit_path.exists(),
            "Missing unit.yaml (the YAML translation unit) for case {}",
            path.display()
        );

        let case_name = path
            .file_name()
            .and_then(|value| value.to_str())
            .map(str::to_string)
            .with_context(|| format!("Invalid case directory name {}", path.display()))?;
        let case_raw = fs::read_to_string(&case_path)
            .with_context(|| format!("Reading {}", case_path.display()))?;
        let spec: CaseSpec = serde_yaml::from_str(&case_raw)
            .with_context(|| format!("Parsing {}", case_path.display()))?;

        cases.push(Case {
            name: case_name,
            dir: path,
            unit_path,
            spec,
        });
    }

    ensure!(
        !cases.is_empty(),
        "No test cases found in {}",
        programs_dir.display()
    );
    cases.sort_by(|left, right| left.name.cmp(&right.name));
    Ok(cases)
}
