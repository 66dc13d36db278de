use super::testresult::TestResult;


pub fn round_to(value: f64, decimals: i32) -> f64 {
    let factor = 10f64.powi(decimals);
    (value * factor).round() / factor
}

/// Results of one grading session, in execution order, with running score sums.
///
/// Sums are kept unrounded; rounding only happens when reporting.
#[derive(Debug, Default)]
pub struct SessionState {
    results: Vec<TestResult>,
    total_score: f64,
    max_score: f64,
}

impl SessionState {
    pub fn record(&mut self, result: TestResult) {
        self.total_score += result.score;
        self.max_score += result.max_score;
        self.results.push(result);
    }

    pub fn results(&self) -> &[TestResult] {
        &self.results
    }

    pub fn total_score(&self) -> f64 {
        self.total_score
    }

    pub fn max_score(&self) -> f64 {
        self.max_score
    }

    pub fn percentage(&self) -> f64 {
        if self.max_score > 0.0 {
            100.0 * self.total_score / self.max_score
        } else {
            0.0
        }
    }

    pub fn passed_count(&self) -> usize {
        self.results.iter().filter(|result| result.success()).count()
    }

    pub fn all_passed(&self) -> bool {
        self.passed_count() == self.results.len()
    }
}
