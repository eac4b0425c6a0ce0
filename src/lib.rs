//! Declarative CLI test runner with template-driven reports.
//!
//! A spec file lists labelled test cases, each a command plus an expectation
//! such as `exit code equals 0 and output contains 'ok'`. The cases are run
//! in order and their outcomes are rendered through a line-oriented template
//! into a report, typically a Markdown compatibility table.

pub mod case;
pub mod catalog;
pub mod expect;
pub mod loader;
pub mod probe;
pub mod render;
pub mod runner;
pub mod schema;
pub mod style;
pub mod template;

pub use case::{TestCase, TestResult, TestStatus};
pub use catalog::{Outcome, TestCatalog};
pub use render::TemplateEngine;
