// Summary of a batch of test cases, printed as a box or saved as JSON

use crate::error::ErrorKind;
use crate::test_case::{ScenarioKind, TestCase};
use anyhow::{Context, Result};
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};
use tokio::fs;
use tokio::io::AsyncWriteExt;

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct CaseSummary {
    pub name: String,
    pub scenario: ScenarioKind,
    pub executed: bool,
    pub expected: bool,
    pub result: bool,
    pub passed: bool,
    pub transactions: usize,
    pub duration_ms: Option<i64>,
    pub error_kind: Option<ErrorKind>,
    pub error: Option<String>,
}

impl From<&TestCase> for CaseSummary {
    fn from(case: &TestCase) -> Self {
        Self {
            name: case.name.clone(),
            scenario: case.scenario,
            executed: case.executed,
            expected: case.expected,
            result: case.result,
            passed: case.passed(),
            transactions: case.transactions.len(),
            duration_ms: case.duration().map(|d| d.num_milliseconds()),
            error_kind: case.error.as_ref().map(|err| err.kind()),
            error: case.error.as_ref().map(|err| err.to_string()),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct TestReport {
    pub executed: usize,
    pub passed: usize,
    pub failed: usize,
    pub cases: Vec<CaseSummary>,
}

impl TestReport {
    pub fn from_cases(cases: &[TestCase]) -> Self {
        let cases: Vec<CaseSummary> = cases.iter().map(CaseSummary::from).collect();
        let executed = cases.iter().filter(|case| case.executed).count();
        let passed = cases.iter().filter(|case| case.passed).count();
        Self {
            executed,
            passed,
            failed: executed - passed,
            cases,
        }
    }

    pub fn all_passed(&self) -> bool {
        self.failed == 0 && self.executed == self.cases.len()
    }

    pub fn failures(&self) -> impl Iterator<Item = &CaseSummary> {
        self.cases.iter().filter(|case| case.executed && !case.passed)
    }

    pub fn to_json(&self) -> Result<String> {
        serde_json::to_string_pretty(self).context("Failed to serialize test report")
    }

    /// Writes the report as `<dir>/staking_report_<timestamp>.json`
    pub async fn save(&self, output_dir: impl AsRef<Path>) -> Result<PathBuf> {
        let output_dir = output_dir.as_ref();
        fs::create_dir_all(output_dir)
            .await
            .context("Failed to create report directory")?;

        let timestamp = chrono::Utc::now().format("%Y%m%d_%H%M%S");
        let filepath = output_dir.join(format!("staking_report_{}.json", timestamp));

        let json = self.to_json()?;
        let mut file = fs::File::create(&filepath)
            .await
            .context("Failed to create report file")?;
        file.write_all(json.as_bytes())
            .await
            .context("Failed to write report")?;
        file.flush().await.context("Failed to flush report file")?;

        Ok(filepath)
    }

    pub fn print(&self) {
        println!("╔════════════════════════════════════════════════════════════════╗");
        println!("║                   STAKING SCENARIO REPORT                      ║");
        println!("╠════════════════════════════════════════════════════════════════╣");
        println!("║ Executed:      {:<47} ║", self.executed);
        println!("║ Passed:        {:<47} ║", self.passed);
        println!("║ Failed:        {:<47} ║", self.failed);
        println!("╠════════════════════════════════════════════════════════════════╣");
        for case in &self.cases {
            let status = match (case.executed, case.passed) {
                (false, _) => "SKIP",
                (true, true) => "PASS",
                (true, false) => "FAIL",
            };
            println!("║ [{}] {:56} ║", status, truncate(&case.name, 56));
            if let Some(error) = &case.error {
                println!("║        {:55} ║", truncate(error, 55));
            } else if case.executed && !case.passed {
                let line = format!("result {}, expected {}", case.result, case.expected);
                println!("║        {:55} ║", line);
            }
        }
        println!("╚════════════════════════════════════════════════════════════════╝");
    }
}

fn truncate(text: &str, max: usize) -> String {
    if text.chars().count() <= max {
        return text.to_string();
    }
    let kept: String = text.chars().take(max.saturating_sub(3)).collect();
    format!("{}...", kept)
}
