use std::fmt;

use serde_json::json;
use thiserror::Error;
use tracing::{info, warn};

use crate::project::definition::{ConfigError, ProjectDefinition};
use crate::project::setup::{run_setup, SetupError};
use crate::test::runner::StepRunner;
use crate::test::testcase::{load_all, load_one, TestCaseConfig};
use crate::testresult::score::{round_to, SessionState};
use crate::testresult::testresult::TestResult;


#[derive(Debug, Error)]
pub enum TestrunnerError {
    #[error(transparent)]
    Config(#[from] ConfigError),
    #[error("setup failed: {0}")]
    Setup(#[from] SetupError),
    #[error("error generating report: {0}")]
    Report(#[from] serde_json::Error),
}

/// One grading session: global setup, then every loaded test case in order.
#[derive(Debug)]
pub struct Testrunner {
    project_definition: ProjectDefinition,
    testcases: Vec<TestCaseConfig>,
    state: SessionState,
}

impl Testrunner {
    pub fn new(project_definition: ProjectDefinition) -> Self {
        Testrunner {
            project_definition,
            testcases: Vec::new(),
            state: SessionState::default(),
        }
    }

    pub fn run_setup(&self) -> Result<(), TestrunnerError> {
        let steps = &self.project_definition.setup.steps;
        if steps.is_empty() {
            return Ok(());
        }
        info!(steps = steps.len(), "running setup");
        run_setup(steps, &self.project_definition.root_dir)?;
        info!("setup completed");
        Ok(())
    }

    /// Loads all test cases, or just `selected` when given.
    pub fn load_testcases(&mut self, selected: Option<&str>) -> Result<(), TestrunnerError> {
        let cases_dir = self.project_definition.cases_dir();
        self.testcases = match selected {
            Some(name) => vec![load_one(&cases_dir, name)?],
            None => load_all(&cases_dir)?,
        };
        info!(
            count = self.testcases.len(),
            tests_dir = %self.project_definition.tests_dir().display(),
            cases_dir = %cases_dir.display(),
            "loaded test cases"
        );
        Ok(())
    }

    pub fn run_tests(&mut self) {
        let resolver = self.project_definition.resolver();
        let runner = StepRunner::new(&resolver, &self.project_definition.judge);
        for testcase in self.testcases.iter() {
            self.state.record(runner.run(testcase));
        }

        if self.state.all_passed() {
            info!("Passed testcases: {} / {}", self.state.passed_count(), self.state.results().len());
        } else {
            warn!("Passed testcases: {} / {}", self.state.passed_count(), self.state.results().len());
        }
    }

    pub fn state(&self) -> &SessionState {
        &self.state
    }

    pub fn generate_json_report(&self) -> Result<String, TestrunnerError> {
        let tests = self.state.results().iter()
            .map(|result| result.get_json_entry())
            .collect::<Vec<serde_json::Value>>();
        let report = json!({
            "total_score": round_to(self.state.total_score(), 1),
            "max_score": round_to(self.state.max_score(), 1),
            "percentage": round_to(self.state.percentage(), 1),
            "tests": tests,
        });
        Ok(serde_json::to_string_pretty(&report)?)
    }

    pub fn generate_table_report(&self) -> String {
        TableReport(&self.state).to_string()
    }
}

/// Plain-text rendering: one row per test case, the total, then a block per failure.
struct TableReport<'a>(&'a SessionState);

impl fmt::Display for TableReport<'_> {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        let state = self.0;
        let name_width = state.results().iter()
            .map(|result| result.name.chars().count())
            .chain(std::iter::once("Test Case".len()))
            .max()
            .unwrap_or(0);

        writeln!(f, "{:<name_width$}  {:<7}  {:>8}  {:>11}  {}", "Test Case", "Result", "Time", "Score", "Message", name_width = name_width)?;
        writeln!(f, "{}", "-".repeat(name_width + 44))?;
        for result in state.results().iter() {
            writeln!(
                f,
                "{:<name_width$}  {:<7}  {:>7.2}s  {:>11}  {}",
                result.name,
                result.status.to_string(),
                result.time,
                format!("{:.1}/{:.1}", result.score, result.max_score),
                result.message,
                name_width = name_width,
            )?;
        }
        writeln!(f, "\nTotal Score: {:.1}/{:.1} ({:.1}%)", state.total_score(), state.max_score(), state.percentage())?;

        for result in state.results().iter().filter(|result| !result.success()) {
            write_failure_block(f, result)?;
        }
        Ok(())
    }
}

fn write_failure_block(f: &mut fmt::Formatter, result: &TestResult) -> fmt::Result {
    writeln!(f, "\n=== {} ({}) ===\n{}", result.name, result.status, result.message)?;
    let details = match &result.error_details {
        Some(details) => details,
        None => return Ok(()),
    };
    writeln!(f, "Command: {}", details.command)?;
    if let Some(return_code) = details.return_code {
        writeln!(f, "Return code: {}", return_code)?;
    }
    for (label, captured) in [("stdout", &details.stdout), ("stderr", &details.stderr)].iter() {
        if let Some(text) = captured {
            if !text.is_empty() {
                writeln!(f, "--- {} ---\n{}", label, text.trim_end())?;
            }
        }
    }
    if let Some(diff) = &details.diff {
        match details.similarity {
            Some(similarity) => writeln!(f, "--- diff ({}% similar) ---", similarity)?,
            None => writeln!(f, "--- diff ---")?,
        }
        write!(f, "{}", diff)?;
    }
    Ok(())
}
