// Test case files
//
// One YAML document per file:
//
// name: "create_map3_node_basic"
// scenario: create_map3_node
// expected: true
// parameters:
//   create_map3_node:
//     amount: "1000000"
//     commission_rate: "0.1"
//     description: { name: "node-1" }

use crate::parameters::StakingParameters;
use crate::test_case::{ScenarioKind, TestCase};
use anyhow::{bail, Context, Result};
use log::debug;
use serde::{Deserialize, Serialize};
use std::collections::HashSet;
use std::path::{Path, PathBuf};

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct TestCaseDefinition {
    pub name: String,
    pub scenario: ScenarioKind,
    #[serde(default = "default_expected")]
    pub expected: bool,
    #[serde(default)]
    pub verbose: bool,
    #[serde(default)]
    pub parameters: StakingParameters,
}

fn default_expected() -> bool {
    true
}

impl From<TestCaseDefinition> for TestCase {
    fn from(definition: TestCaseDefinition) -> Self {
        TestCase::new(definition.name, definition.scenario, definition.parameters)
            .expecting(definition.expected)
            .verbose(definition.verbose)
    }
}

/// Parses a single test case from YAML
pub fn parse_test_case(yaml: &str) -> Result<TestCase> {
    let definition: TestCaseDefinition =
        serde_yaml::from_str(yaml).context("Failed to parse test case YAML")?;
    if definition.name.trim().is_empty() {
        bail!("Test case name must not be empty");
    }
    Ok(definition.into())
}

/// Loads every `.yaml`/`.yml` file of `dir`, ordered by file name.
///
/// Names must be unique across the directory: account names derive from them.
pub async fn load_test_cases(dir: impl AsRef<Path>) -> Result<Vec<TestCase>> {
    let dir = dir.as_ref();
    let mut entries = tokio::fs::read_dir(dir)
        .await
        .with_context(|| format!("Failed to read test case directory {}", dir.display()))?;

    let mut paths: Vec<PathBuf> = Vec::new();
    while let Some(entry) = entries
        .next_entry()
        .await
        .context("Failed to list test case directory")?
    {
        let path = entry.path();
        let is_yaml = path
            .extension()
            .and_then(|ext| ext.to_str())
            .map(|ext| ext == "yaml" || ext == "yml")
            .unwrap_or(false);
        if is_yaml {
            paths.push(path);
        }
    }
    paths.sort();

    let mut names = HashSet::new();
    let mut cases = Vec::with_capacity(paths.len());
    for path in paths {
        let content = tokio::fs::read_to_string(&path)
            .await
            .with_context(|| format!("Failed to read {}", path.display()))?;
        let case = parse_test_case(&content)
            .with_context(|| format!("Invalid test case {}", path.display()))?;
        if !names.insert(case.name.clone()) {
            bail!("Duplicate test case name {} in {}", case.name, path.display());
        }
        debug!("Loaded test case {} from {}", case.name, path.display());
        cases.push(case);
    }
    Ok(cases)
}
