// src/suite/mod.rs — Suite definitions and on-disk loading
//
// A suite lives in `{test_dir}/{name}/`: `prompt.txt` holds the template and
// either `assertions.rhai` or `assertions.toml` declares the test cases.

pub mod declarative;
pub mod rhai_host;

use std::collections::HashSet;
use std::path::{Path, PathBuf};

use crate::core::types::TestCase;
use crate::infra::errors::ProbeError;
use crate::infra::paths;

pub const PROMPT_FILE: &str = "prompt.txt";
pub const RHAI_ASSERTIONS: &str = "assertions.rhai";
pub const TOML_ASSERTIONS: &str = "assertions.toml";
pub const CONTEXT_FILE: &str = "context.json";

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SuiteFormat {
    Rhai,
    Toml,
}

impl SuiteFormat {
    pub fn file_name(&self) -> &'static str {
        match self {
            SuiteFormat::Rhai => RHAI_ASSERTIONS,
            SuiteFormat::Toml => TOML_ASSERTIONS,
        }
    }
}

/// The assertions file a suite was loaded from.
#[derive(Debug, Clone)]
pub struct AssertionsSource {
    pub path: PathBuf,
    pub format: SuiteFormat,
    pub raw: String,
}

/// An ordered collection of test cases sharing one prompt template.
#[derive(Debug, Clone)]
pub struct Suite {
    pub name: String,
    pub prompt_template: String,
    pub cases: Vec<TestCase>,
    /// `None` for suites built in code.
    pub source: Option<AssertionsSource>,
}

impl Suite {
    /// Build a suite without touching the filesystem.
    pub fn in_memory(
        name: impl Into<String>,
        prompt_template: impl Into<String>,
        cases: Vec<TestCase>,
    ) -> Self {
        Self {
            name: name.into(),
            prompt_template: prompt_template.into(),
            cases,
            source: None,
        }
    }

    /// Reject empty suites and duplicate descriptions.
    pub fn validate(&self) -> Result<(), ProbeError> {
        if self.cases.is_empty() {
            return Err(ProbeError::malformed_suite(&self.name, "no tests declared"));
        }
        let mut seen = HashSet::new();
        for case in &self.cases {
            if !seen.insert(case.description.as_str()) {
                return Err(ProbeError::malformed_suite(
                    &self.name,
                    format!("duplicate test description '{}'", case.description),
                ));
            }
        }
        Ok(())
    }
}

/// Resolves suites by name under a test directory.
#[derive(Debug, Clone)]
pub struct SuiteLoader {
    test_dir: PathBuf,
}

impl SuiteLoader {
    pub fn new(test_dir: impl Into<PathBuf>) -> Self {
        Self {
            test_dir: test_dir.into(),
        }
    }

    pub fn test_dir(&self) -> &Path {
        &self.test_dir
    }

    /// Load and validate the suite called `name`.
    pub fn load(&self, name: &str) -> Result<Suite, ProbeError> {
        let dir = paths::suite_dir(&self.test_dir, name);
        if !dir.is_dir() {
            return Err(not_found(name, &dir));
        }

        let prompt_path = dir.join(PROMPT_FILE);
        if !prompt_path.is_file() {
            return Err(not_found(name, &prompt_path));
        }
        let prompt_template = std::fs::read_to_string(&prompt_path)?;

        let (path, format) = find_assertions(&dir)
            .ok_or_else(|| not_found(name, &dir.join(RHAI_ASSERTIONS)))?;
        let raw = std::fs::read_to_string(&path)?;

        let cases = match format {
            SuiteFormat::Rhai => {
                let context = read_context(name, &dir)?;
                rhai_host::load_cases(name, &raw, context.as_ref())?
            }
            SuiteFormat::Toml => declarative::load_cases(name, &raw)?,
        };

        let suite = Suite {
            name: name.to_string(),
            prompt_template,
            cases,
            source: Some(AssertionsSource { path, format, raw }),
        };
        suite.validate()?;

        tracing::debug!(
            suite = name,
            format = ?format,
            cases = suite.cases.len(),
            "Loaded suite"
        );
        Ok(suite)
    }

    pub fn list(&self) -> Result<Vec<String>, ProbeError> {
        list_suites(&self.test_dir)
    }
}

fn not_found(name: &str, path: &Path) -> ProbeError {
    ProbeError::SuiteNotFound {
        name: name.to_string(),
        path: path.display().to_string(),
    }
}

fn find_assertions(dir: &Path) -> Option<(PathBuf, SuiteFormat)> {
    let rhai = dir.join(RHAI_ASSERTIONS);
    let toml = dir.join(TOML_ASSERTIONS);
    match (rhai.is_file(), toml.is_file()) {
        (true, true) => {
            tracing::warn!(
                dir = %dir.display(),
                "Both assertions.rhai and assertions.toml present; using assertions.rhai"
            );
            Some((rhai, SuiteFormat::Rhai))
        }
        (true, false) => Some((rhai, SuiteFormat::Rhai)),
        (false, true) => Some((toml, SuiteFormat::Toml)),
        (false, false) => None,
    }
}

fn read_context(name: &str, dir: &Path) -> Result<Option<serde_json::Value>, ProbeError> {
    let path = dir.join(CONTEXT_FILE);
    if !path.is_file() {
        return Ok(None);
    }
    let raw = std::fs::read_to_string(&path)?;
    serde_json::from_str(&raw)
        .map(Some)
        .map_err(|e| ProbeError::malformed_suite(name, format!("{CONTEXT_FILE} is invalid: {e}")))
}

/// Names of the suite directories under `test_dir`, sorted. A missing
/// directory has no suites.
pub fn list_suites(test_dir: &Path) -> Result<Vec<String>, ProbeError> {
    if !test_dir.is_dir() {
        return Ok(Vec::new());
    }
    let mut names = Vec::new();
    for entry in std::fs::read_dir(test_dir)? {
        let entry = entry?;
        if entry.file_type()?.is_dir() {
            if let Some(name) = entry.file_name().to_str() {
                names.push(name.to_string());
            }
        }
    }
    names.sort();
    Ok(names)
}
