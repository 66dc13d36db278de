use std::fmt;

use serde_derive::Serialize;
use serde_json::json;

use super::score::round_to;


/// Terminal state of a test case.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum TestStatus {
    Passed,
    Failed,
    TimedOut,
    Errored,
}

impl fmt::Display for TestStatus {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        match self {
            TestStatus::Passed => write!(f, "PASS"),
            TestStatus::Failed => write!(f, "FAIL"),
            TestStatus::TimedOut => write!(f, "TIMEOUT"),
            TestStatus::Errored => write!(f, "ERROR"),
        }
    }
}

/// Where and why a test case failed.
#[derive(Clone, Debug, Default, Serialize)]
pub struct ErrorDetails {
    pub step: usize,
    pub step_name: String,
    pub command: String,
    pub error_message: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub stdout: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub stderr: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub return_code: Option<i32>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub diff: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub similarity: Option<f32>,
}

#[derive(Clone, Debug)]
pub struct TestResult {
    pub name: String,
    pub status: TestStatus,
    pub message: String,
    /// Wall-clock seconds over all executed steps.
    pub time: f64,
    pub score: f64,
    pub max_score: f64,
    pub error_details: Option<ErrorDetails>,
}

impl TestResult {
    pub fn passed(name: &str, max_score: f64, time: f64) -> Self {
        TestResult {
            name: name.to_owned(),
            status: TestStatus::Passed,
            message: "All steps completed".to_owned(),
            time,
            score: max_score,
            max_score,
            error_details: None,
        }
    }

    pub fn failed(name: &str, max_score: f64, status: TestStatus, message: String, time: f64, error_details: Option<ErrorDetails>) -> Self {
        TestResult {
            name: name.to_owned(),
            status,
            message,
            time,
            score: 0.0,
            max_score,
            error_details,
        }
    }

    pub fn success(&self) -> bool {
        self.status == TestStatus::Passed
    }

    pub fn get_json_entry(&self) -> serde_json::Value {
        json!({
            "name": self.name,
            "success": self.success(),
            "status": self.status,
            "time": round_to(self.time, 2),
            "score": round_to(self.score, 1),
            "max_score": round_to(self.max_score, 1),
            "message": self.message,
            "error_details": self.error_details,
        })
    }
}
