use std::collections::BTreeMap;
use std::fs::create_dir_all;
use std::path::Path;

use lazy_static::lazy_static;
use regex::Regex;
use serde_derive::Deserialize;
use thiserror::Error;
use tracing::{info, warn};

use crate::test::process::{command_line, is_valid_timeout, run_with_timeout, ProcessError};


pub const DEFAULT_SETUP_TIMEOUT: f64 = 5.0;

lazy_static! {
    static ref COMPILER_WARNING: Regex = Regex::new(r"warning: .*? \[-W(?P<warn>[^\]]+)\]").unwrap();
}

#[derive(Debug, Error)]
pub enum SetupError {
    #[error("source file `{0}` not found")]
    SourceNotFound(String),
    #[error("compilation of `{source_file}` failed with exit code {exit_code}:\n{stderr}")]
    CompilationFailed {
        source_file: String,
        exit_code: i32,
        stderr: String,
    },
    #[error("command `{command}` failed with exit code {exit_code}:\n{stderr}")]
    CommandFailed {
        command: String,
        exit_code: i32,
        stderr: String,
    },
    #[error("`{command}` {source}")]
    Process {
        command: String,
        #[source]
        source: ProcessError,
    },
    #[error("could not prepare output directory: {0}")]
    Io(#[from] std::io::Error),
}

/// Settings shared by every kind of setup step.
#[derive(Debug, Default, Deserialize)]
pub struct SetupMeta {
    pub message: Option<String>,
    pub success_message: Option<String>,
    pub timeout: Option<f64>,
}

impl SetupMeta {
    pub fn timeout(&self) -> f64 {
        self.timeout.unwrap_or(DEFAULT_SETUP_TIMEOUT)
    }
}

pub trait Setup {
    fn run(&self, root_dir: &Path) -> Result<(), SetupError>;

    fn meta(&self) -> &SetupMeta;

    fn describe(&self) -> String;
}

#[derive(Debug, Deserialize)]
#[serde(tag = "type", rename_all = "lowercase")]
pub enum SetupStep {
    Compile(CompileStep),
    Command(CommandStep),
}

impl SetupStep {
    pub fn as_setup(&self) -> &dyn Setup {
        match self {
            SetupStep::Compile(step) => step,
            SetupStep::Command(step) => step,
        }
    }

    pub fn has_valid_timeout(&self) -> bool {
        is_valid_timeout(self.as_setup().meta().timeout())
    }
}

fn default_compiler() -> String {
    "gcc".to_owned()
}

/// Builds `output` from a single `source` file: `<compiler> [flags] <source> -o <output>`.
#[derive(Debug, Deserialize)]
pub struct CompileStep {
    #[serde(flatten)]
    pub meta: SetupMeta,
    pub source: String,
    pub output: String,
    #[serde(default = "default_compiler")]
    pub compiler: String,
    #[serde(default)]
    pub flags: Vec<String>,
}

impl Setup for CompileStep {
    fn run(&self, root_dir: &Path) -> Result<(), SetupError> {
        let source = root_dir.join(&self.source);
        if !source.is_file() {
            return Err(SetupError::SourceNotFound(self.source.clone()));
        }
        let output = root_dir.join(&self.output);
        if let Some(parent) = output.parent() {
            create_dir_all(parent)?;
        }

        let mut args = self.flags.clone();
        args.push(source.display().to_string());
        args.push("-o".to_owned());
        args.push(output.display().to_string());

        let result = run_with_timeout(&self.compiler, &args, root_dir, None, self.meta.timeout())
            .map_err(|source| SetupError::Process { command: self.compiler.clone(), source })?;

        let warnings = count_compiler_warnings(&result.stderr);
        for (warning, amount) in warnings.iter() {
            warn!(source = %self.source, warning = %warning, amount, "compiler warning");
        }

        if result.exit_code != 0 {
            return Err(SetupError::CompilationFailed {
                source_file: self.source.clone(),
                exit_code: result.exit_code,
                stderr: result.stderr,
            });
        }
        info!(source = %self.source, output = %self.output, "compilation successful");
        Ok(())
    }

    fn meta(&self) -> &SetupMeta {
        &self.meta
    }

    fn describe(&self) -> String {
        format!("compile {} -> {}", self.source, self.output)
    }
}

/// Arguments of a command step, written either as one string or as a list.
#[derive(Debug, Deserialize)]
#[serde(untagged)]
pub enum CommandArgs {
    Single(String),
    List(Vec<String>),
}

impl Default for CommandArgs {
    fn default() -> Self {
        CommandArgs::List(Vec::new())
    }
}

impl CommandArgs {
    pub fn to_vec(&self) -> Vec<String> {
        match self {
            CommandArgs::Single(arg) => vec![arg.clone()],
            CommandArgs::List(args) => args.clone(),
        }
    }
}

#[derive(Debug, Deserialize)]
pub struct CommandStep {
    #[serde(flatten)]
    pub meta: SetupMeta,
    pub command: String,
    #[serde(default)]
    pub args: CommandArgs,
}

impl Setup for CommandStep {
    fn run(&self, root_dir: &Path) -> Result<(), SetupError> {
        let args = self.args.to_vec();
        let result = run_with_timeout(&self.command, &args, root_dir, None, self.meta.timeout())
            .map_err(|source| SetupError::Process { command: self.command.clone(), source })?;

        if result.exit_code != 0 {
            return Err(SetupError::CommandFailed {
                command: command_line(&self.command, &args),
                exit_code: result.exit_code,
                stderr: result.stderr,
            });
        }
        Ok(())
    }

    fn meta(&self) -> &SetupMeta {
        &self.meta
    }

    fn describe(&self) -> String {
        command_line(&self.command, &self.args.to_vec())
    }
}

/// Counts `[-W...]` tagged diagnostics in compiler output, keyed by warning flag.
pub fn count_compiler_warnings(stderr: &str) -> BTreeMap<String, usize> {
    let mut warnings = BTreeMap::new();
    for cap in COMPILER_WARNING.captures_iter(stderr) {
        *warnings.entry(cap["warn"].to_owned()).or_insert(0) += 1;
    }
    warnings
}

/// Runs the global setup steps in order. The first failing step ends the setup phase.
pub fn run_setup(steps: &[SetupStep], root_dir: &Path) -> Result<(), SetupError> {
    for (number, step) in steps.iter().enumerate() {
        let step = step.as_setup();
        match &step.meta().message {
            Some(message) => info!(step = number + 1, "{}", message),
            None => info!(step = number + 1, "running setup step `{}`", step.describe()),
        }

        step.run(root_dir)?;

        if let Some(message) = &step.meta().success_message {
            info!(step = number + 1, "{}", message);
        }
    }
    Ok(())
}
