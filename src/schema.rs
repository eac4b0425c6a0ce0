//! Schema definitions for testmatrix spec files.
//!
//! A spec file is a stream of test records. YAML specs hold one record per
//! document; TOML specs hold them in a `[[tests]]` array.

use schemars::JsonSchema;
use serde::{Deserialize, Serialize};

/// A single test record as written in a spec file.
///
/// `label` and `command` are only optional at the parsing level so that an
/// incomplete record can be reported and skipped instead of failing the file.
#[derive(Debug, Clone, Default, Serialize, Deserialize, JsonSchema)]
pub struct TestRecord {
    /// Grouping key. Several records may share a label.
    #[serde(default)]
    pub label: Option<String>,

    /// Display title (defaults to the label).
    #[serde(default)]
    pub name: Option<String>,

    /// Command line to execute, split on whitespace.
    #[serde(default)]
    pub command: Option<String>,

    /// Expectation expression, e.g. `exit code equals 0 and output contains 'ok'`.
    #[serde(default)]
    pub expect: Option<String>,

    /// Free-form notes shown in the report.
    #[serde(default)]
    pub notes: StringOrList,

    /// Skip execution and report the case as not tested.
    #[serde(default)]
    pub skip: bool,

    /// Commands run before the test command. Failures are ignored.
    #[serde(default)]
    pub pre: StringOrList,

    /// Commands run after the test command. Failures are ignored.
    #[serde(default)]
    pub post: StringOrList,
}

/// A field that accepts either a single string or a list of strings.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, JsonSchema)]
#[serde(untagged)]
pub enum StringOrList {
    /// A single entry.
    One(String),
    /// Several entries, in order.
    Many(Vec<String>),
}

impl Default for StringOrList {
    fn default() -> Self {
        StringOrList::Many(Vec::new())
    }
}

impl StringOrList {
    /// Flatten into an ordered list of entries.
    pub fn into_vec(self) -> Vec<String> {
        match self {
            StringOrList::One(s) => vec![s],
            StringOrList::Many(v) => v,
        }
    }
}

/// Root document for a TOML spec file.
#[derive(Debug, Clone, Default, Serialize, Deserialize, JsonSchema)]
pub struct TomlSpec {
    /// The records defined in this file.
    #[serde(default)]
    pub tests: Vec<TestRecord>,
}

/// Generate the JSON Schema for a test record.
pub fn generate_schema() -> schemars::schema::RootSchema {
    schemars::schema_for!(TestRecord)
}
