//! Test cases and their execution.

use crate::expect::Expectation;
use crate::runner::{self, ProcessRunner};
use std::fmt;

/// Note attached to placeholder cases for labels with no test.
pub const MISSING_TEST_NOTE: &str = "Missing test";

/// Outcome classification of one case.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum TestStatus {
    Success,
    Failed,
    /// Explicitly skipped.
    NotTested,
    /// No predicate attached, nothing to run, or the process failed to launch.
    Unknown,
}

impl TestStatus {
    /// Whether the case ran and a predicate judged it.
    pub fn is_judged(self) -> bool {
        matches!(self, TestStatus::Success | TestStatus::Failed)
    }
}

/// Result of executing one case.
///
/// The optional fields are populated exactly when the main command launched.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TestResult {
    pub status: TestStatus,
    pub exit_code: Option<i32>,
    pub stdout: Option<String>,
    pub stderr: Option<String>,
}

impl TestResult {
    /// A result for a case whose command never ran.
    pub fn not_run(status: TestStatus) -> Self {
        Self {
            status,
            exit_code: None,
            stdout: None,
            stderr: None,
        }
    }
}

/// A single test: a command, the expectation it must meet, and metadata.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TestCase {
    /// Grouping key; not unique.
    pub label: String,
    /// Display title.
    pub name: String,
    /// Argv tokens. Empty only for placeholders.
    pub command: Vec<String>,
    /// Expectation expression as written in the spec.
    pub expected: Option<String>,
    /// Parsed expectation. `None` means the outcome is always `Unknown`.
    pub predicate: Option<Expectation>,
    pub notes: Vec<String>,
    pub prerequisites: Vec<String>,
    pub postrequisites: Vec<String>,
    pub skip: bool,
}

impl TestCase {
    /// A case with a command and no expectation or hooks.
    pub fn new(label: impl Into<String>, command: Vec<String>) -> Self {
        let label = label.into();
        Self {
            name: label.clone(),
            label,
            command,
            expected: None,
            predicate: None,
            notes: Vec::new(),
            prerequisites: Vec::new(),
            postrequisites: Vec::new(),
            skip: false,
        }
    }

    /// Stand-in for a label that has no test.
    pub fn placeholder(label: impl Into<String>) -> Self {
        let mut case = Self::new(label, Vec::new());
        case.notes.push(MISSING_TEST_NOTE.to_string());
        case
    }

    /// The command as a single string.
    pub fn command_line(&self) -> String {
        self.command.join(" ")
    }

    /// Run the case: prerequisites, main command, postrequisites.
    pub fn execute(&self, runner: &dyn ProcessRunner) -> TestResult {
        if self.skip {
            return TestResult::not_run(TestStatus::NotTested);
        }
        if self.command.is_empty() {
            tracing::warn!(case = %self, "no command to run");
            return TestResult::not_run(TestStatus::Unknown);
        }

        runner::run_hooks(runner, &self.prerequisites);

        let result = match runner.run(&self.command) {
            Ok(output) => {
                let status = match &self.predicate {
                    None => TestStatus::Unknown,
                    Some(p) if p.evaluate(output.exit_code, &output.stdout, &output.stderr) => {
                        TestStatus::Success
                    }
                    Some(_) => TestStatus::Failed,
                };

                if status == TestStatus::Failed {
                    println!("Failed:\n - Out: {}\n - Err: {}", output.stdout, output.stderr);
                }

                TestResult {
                    status,
                    exit_code: Some(output.exit_code),
                    stdout: Some(output.stdout),
                    stderr: Some(output.stderr),
                }
            }
            Err(e) => {
                tracing::warn!(case = %self, error = %e, "command failed to launch");
                TestResult::not_run(TestStatus::Unknown)
            }
        };

        runner::run_hooks(runner, &self.postrequisites);

        result
    }
}

impl fmt::Display for TestCase {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{} (label: {})", self.name, self.label)
    }
}

#[cfg(test)]
pub(crate) mod testing {
    //! Scripted process runner shared by unit tests.

    use crate::runner::{ProcessOutput, ProcessRunner, SpawnError};
    use std::cell::RefCell;
    use std::collections::HashMap;

    /// Answers commands from a script and records every invocation.
    #[derive(Default)]
    pub struct ScriptedRunner {
        responses: HashMap<String, ProcessOutput>,
        calls: RefCell<Vec<String>>,
    }

    impl ScriptedRunner {
        pub fn new() -> Self {
            Self::default()
        }

        pub fn respond(mut self, command: &str, exit_code: i32, stdout: &str, stderr: &str) -> Self {
            self.responses.insert(
                command.to_string(),
                ProcessOutput {
                    exit_code,
                    stdout: stdout.to_string(),
                    stderr: stderr.to_string(),
                },
            );
            self
        }

        pub fn calls(&self) -> Vec<String> {
            self.calls.borrow().clone()
        }
    }

    impl ProcessRunner for ScriptedRunner {
        fn run(&self, argv: &[String]) -> Result<ProcessOutput, SpawnError> {
            let command = argv.join(" ");
            self.calls.borrow_mut().push(command.clone());
            self.responses
                .get(&command)
                .cloned()
                .ok_or_else(|| SpawnError::Spawn {
                    program: argv.first().cloned().unwrap_or_default(),
                    source: std::io::Error::from(std::io::ErrorKind::NotFound),
                })
        }
    }
}
