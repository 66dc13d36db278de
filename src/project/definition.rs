use std::fs::read_to_string;
use std::path::{Path, PathBuf};

use serde_derive::Deserialize;
use thiserror::Error;
use tracing::warn;

use crate::test::process::is_valid_timeout;
use super::paths::PathResolver;
use super::setup::SetupStep;


pub const SESSION_CONFIG_FILE: &str = "grader_config.toml";

#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("failed reading config `{path}`: {source}")]
    Io {
        path: String,
        #[source]
        source: std::io::Error,
    },
    #[error("failed parsing config `{path}`: {message}")]
    Parse { path: String, message: String },
    #[error("missing {field} in `{path}`")]
    MissingField { path: String, field: &'static str },
    #[error("invalid value in `{path}`: {message}")]
    InvalidValue { path: String, message: String },
    #[error("test cases directory not found: {0}")]
    CasesDirNotFound(String),
    #[error("no test cases found in {0}")]
    NoTestCases(String),
    #[error("test case '{0}' not found")]
    TestNotFound(String),
}

#[derive(Clone, Debug, Deserialize)]
#[serde(default)]
pub struct PathDefinition {
    pub tests_dir: String,
    pub cases_dir: String,
    pub common_dir: String,
}

impl Default for PathDefinition {
    fn default() -> Self {
        PathDefinition {
            tests_dir: "tests".to_owned(),
            cases_dir: "tests/cases".to_owned(),
            common_dir: "tests/common".to_owned(),
        }
    }
}

#[derive(Debug, Default, Deserialize)]
pub struct SetupDefinition {
    #[serde(default)]
    pub steps: Vec<SetupStep>,
}

/// How special judge scripts are launched.
#[derive(Clone, Debug, Deserialize)]
#[serde(default)]
pub struct JudgeDefinition {
    /// Program the judge script is handed to. Without one, `*.py` scripts run under
    /// `python3` and everything else is executed directly.
    pub interpreter: Option<String>,
    pub timeout: f64,
}

impl Default for JudgeDefinition {
    fn default() -> Self {
        JudgeDefinition {
            interpreter: None,
            timeout: 10.0,
        }
    }
}

#[derive(Debug, Default, Deserialize)]
pub struct ProjectDefinition {
    #[serde(default)]
    pub paths: PathDefinition,
    #[serde(default)]
    pub setup: SetupDefinition,
    #[serde(default)]
    pub judge: JudgeDefinition,
    #[serde(skip)]
    pub root_dir: PathBuf,
}

impl ProjectDefinition {
    /// Loads the session config of the project at `root_dir`.
    ///
    /// `grader_config.toml` in the root is optional; without it the default layout
    /// (`tests`, `tests/cases`, `tests/common`) is used. An explicitly given `config_path`
    /// has to exist.
    pub fn from_root(root_dir: &Path, config_path: Option<&Path>) -> Result<Self, ConfigError> {
        let mut definition = match config_path {
            Some(path) => Self::from_file(path)?,
            None => {
                let path = root_dir.join(SESSION_CONFIG_FILE);
                if path.is_file() {
                    Self::from_file(&path)?
                } else {
                    warn!(path = %path.display(), "session config not found, using default paths");
                    ProjectDefinition::default()
                }
            }
        };
        definition.root_dir = root_dir.to_path_buf();
        Ok(definition)
    }

    fn from_file(path: &Path) -> Result<Self, ConfigError> {
        let display = path.display().to_string();
        let config = read_to_string(path).map_err(|source| ConfigError::Io { path: display.clone(), source })?;
        let definition: Self = toml::from_str(&config).map_err(|err| ConfigError::Parse { path: display.clone(), message: err.to_string() })?;

        if !is_valid_timeout(definition.judge.timeout) {
            return Err(ConfigError::InvalidValue { path: display, message: "judge timeout must be a positive number of seconds".to_owned() });
        }
        if let Some(number) = definition.setup.steps.iter().position(|step| !step.has_valid_timeout()) {
            return Err(ConfigError::InvalidValue {
                path: display,
                message: format!("setup step {}: timeout must be a positive number of seconds", number + 1),
            });
        }
        Ok(definition)
    }

    pub fn tests_dir(&self) -> PathBuf {
        self.root_dir.join(&self.paths.tests_dir)
    }

    pub fn cases_dir(&self) -> PathBuf {
        self.root_dir.join(&self.paths.cases_dir)
    }

    pub fn common_dir(&self) -> PathBuf {
        self.root_dir.join(&self.paths.common_dir)
    }

    pub fn resolver(&self) -> PathResolver {
        PathResolver::new(self.root_dir.clone(), self.common_dir())
    }
}
