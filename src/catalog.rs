//! The ordered collection of test cases.

use crate::case::{TestCase, TestResult};
use crate::expect;
use crate::runner::{ProcessRunner, split_command};
use crate::schema::TestRecord;

/// A spec record that cannot become a test case.
#[derive(Debug, thiserror::Error)]
pub enum RecordError {
    #[error("record has no label")]
    MissingLabel,
    #[error("record {label:?} has no command")]
    MissingCommand { label: String },
}

/// A case paired with the result of executing it.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Outcome {
    pub case: TestCase,
    pub result: TestResult,
}

impl TestCase {
    /// Build a case from a spec record.
    pub fn from_record(record: TestRecord) -> Result<Self, RecordError> {
        let label = record.label.ok_or(RecordError::MissingLabel)?;
        let command = record
            .command
            .as_deref()
            .map(split_command)
            .unwrap_or_default();
        if command.is_empty() {
            return Err(RecordError::MissingCommand { label });
        }
        let predicate = record.expect.as_deref().and_then(expect::parse);
        if record.expect.is_some() && predicate.is_none() {
            tracing::warn!(label = %label, "expectation has no recognised clause");
        }

        Ok(TestCase {
            name: record.name.unwrap_or_else(|| label.clone()),
            label,
            command,
            expected: record.expect,
            predicate,
            notes: record.notes.into_vec(),
            prerequisites: record.pre.into_vec(),
            postrequisites: record.post.into_vec(),
            skip: record.skip,
        })
    }
}

/// Test cases in insertion order.
#[derive(Debug, Clone, Default)]
pub struct TestCatalog {
    cases: Vec<TestCase>,
}

impl TestCatalog {
    pub fn new() -> Self {
        Self::default()
    }

    /// Build a catalog from records, skipping the ones that are incomplete.
    pub fn from_records(records: impl IntoIterator<Item = TestRecord>) -> Self {
        let mut catalog = Self::new();
        for record in records {
            catalog.add_record(record);
        }
        catalog
    }

    /// Append a case.
    pub fn add(&mut self, case: TestCase) {
        self.cases.push(case);
    }

    /// Convert and append a record. Incomplete records are logged and skipped.
    pub fn add_record(&mut self, record: TestRecord) {
        match TestCase::from_record(record) {
            Ok(case) => {
                tracing::debug!(case = %case, "parsed test");
                self.add(case);
            }
            Err(e) => tracing::warn!(error = %e, "skipping spec record"),
        }
    }

    pub fn cases(&self) -> &[TestCase] {
        &self.cases
    }

    pub fn len(&self) -> usize {
        self.cases.len()
    }

    pub fn is_empty(&self) -> bool {
        self.cases.is_empty()
    }

    /// All cases carrying `label`, in insertion order.
    ///
    /// Never empty: an unknown label yields a single placeholder case.
    pub fn lookup(&self, label: &str) -> Vec<TestCase> {
        let found: Vec<TestCase> = self
            .cases
            .iter()
            .filter(|c| c.label == label)
            .cloned()
            .collect();
        if found.is_empty() {
            vec![TestCase::placeholder(label)]
        } else {
            found
        }
    }

    /// Execute every case carrying `label`, sequentially.
    pub fn run(&self, label: &str, runner: &dyn ProcessRunner) -> Vec<Outcome> {
        self.lookup(label)
            .into_iter()
            .map(|case| run_case(case, runner))
            .collect()
    }

    /// Execute every case in insertion order, sequentially.
    pub fn run_all(&self, runner: &dyn ProcessRunner) -> Vec<Outcome> {
        self.cases
            .iter()
            .cloned()
            .map(|case| run_case(case, runner))
            .collect()
    }
}

fn run_case(case: TestCase, runner: &dyn ProcessRunner) -> Outcome {
    println!("Testing {}", case.name);
    let result = case.execute(runner);
    Outcome { case, result }
}
