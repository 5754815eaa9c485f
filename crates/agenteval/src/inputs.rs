//! Reading and writing the JSON files the commands work on.

use anyhow::{bail, Context, Result};
use std::collections::BTreeMap;
use std::path::Path;

use agenteval_core::{BatchItem, ScoredBatch};
use agenteval_critic::{CriteriaStore, Task, TestCase};

pub fn load_task(path: &Path) -> Result<Task> {
    let content = read(path)?;
    serde_json::from_str(&content).with_context(|| format!("Invalid task file {}", path.display()))
}

pub fn load_store(path: &Path) -> Result<CriteriaStore> {
    let content = read(path)?;
    CriteriaStore::from_document(&content)
        .with_context(|| format!("Invalid criteria file {}", path.display()))
}

pub fn load_results(path: &Path) -> Result<ScoredBatch> {
    let content = read(path)?;
    ScoredBatch::from_json(&content)
        .with_context(|| format!("Invalid results file {}", path.display()))
}

/// Load test cases from a JSON file mapping id to test case, or from a
/// directory of `*.json` test case files where the id is the file stem.
/// Items come back sorted by id.
pub fn load_cases(path: &Path) -> Result<Vec<BatchItem>> {
    let cases: BTreeMap<String, TestCase> = if path.is_dir() {
        let mut cases = BTreeMap::new();
        let entries = std::fs::read_dir(path)
            .with_context(|| format!("Failed to read directory {}", path.display()))?;
        for entry in entries {
            let file = entry?.path();
            if file.extension().and_then(|e| e.to_str()) != Some("json") {
                continue;
            }
            let Some(id) = file.file_stem().and_then(|s| s.to_str()) else {
                continue;
            };
            let case: TestCase = serde_json::from_str(&read(&file)?)
                .with_context(|| format!("Invalid test case file {}", file.display()))?;
            cases.insert(id.to_string(), case);
        }
        cases
    } else {
        serde_json::from_str(&read(path)?)
            .with_context(|| format!("Invalid test case file {}", path.display()))?
    };

    if cases.is_empty() {
        bail!("No test cases found in {}", path.display());
    }

    Ok(cases
        .into_iter()
        .map(|(id, case)| BatchItem::new(id, case))
        .collect())
}

/// Write `content` to `path`, creating parent directories
pub fn write_output(path: &Path, content: &str) -> Result<()> {
    if let Some(parent) = path.parent().filter(|p| !p.as_os_str().is_empty()) {
        std::fs::create_dir_all(parent)
            .with_context(|| format!("Failed to create {}", parent.display()))?;
    }
    std::fs::write(path, format!("{}\n", content))
        .with_context(|| format!("Failed to write {}", path.display()))
}

fn read(path: &Path) -> Result<String> {
    std::fs::read_to_string(path).with_context(|| format!("Failed to read {}", path.display()))
}
