//! Expectation expressions.
//!
//! An expectation is a conjunction of clauses evaluated against a finished
//! process:
//!
//! ```text
//! expression    := clause (" and " clause)*
//! clause        := exit_clause | output_clause
//! exit_clause   := "exit code" comparator integer
//! comparator    := "equals" | "greater than" | "less than"
//!                | "greater than or equals" | "less than or equals"
//! output_clause := "output" operation "'" value "'"
//! operation     := "equals" | "contains" | "doesn't contain"
//! ```
//!
//! Clauses that match neither grammar are dropped from the conjunction.
//! An unrecognised comparator reads as `equals`.

/// Separator between clauses of one expression.
const CLAUSE_SEPARATOR: &str = " and ";

/// Comparison applied to the process exit code.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ExitCodeOp {
    Eq,
    Gt,
    Lt,
    Gte,
    Lte,
}

impl ExitCodeOp {
    fn from_phrase(phrase: &str) -> Self {
        match phrase {
            "greater than" => ExitCodeOp::Gt,
            "less than" => ExitCodeOp::Lt,
            "greater than or equals" => ExitCodeOp::Gte,
            "less than or equals" => ExitCodeOp::Lte,
            _ => ExitCodeOp::Eq,
        }
    }

    fn holds(self, actual: i64, expected: i64) -> bool {
        match self {
            ExitCodeOp::Eq => actual == expected,
            ExitCodeOp::Gt => actual > expected,
            ExitCodeOp::Lt => actual < expected,
            ExitCodeOp::Gte => actual >= expected,
            ExitCodeOp::Lte => actual <= expected,
        }
    }
}

/// Comparison applied to captured stdout.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum OutputOp {
    Equals,
    Contains,
    NotContains,
}

const OUTPUT_OPS: [(&str, OutputOp); 3] = [
    ("equals", OutputOp::Equals),
    ("contains", OutputOp::Contains),
    ("doesn't contain", OutputOp::NotContains),
];

/// A parsed expectation: a predicate over `(exit code, stdout, stderr)`.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Expectation {
    /// `exit code <op> <value>`
    ExitCode { op: ExitCodeOp, value: i64 },
    /// `output <op> '<value>'`, checked against stdout only.
    Output { op: OutputOp, value: String },
    /// Both sides must hold.
    All(Box<Expectation>, Box<Expectation>),
}

impl Expectation {
    /// Conjunction of `self` and `other`.
    pub fn and(self, other: Expectation) -> Expectation {
        Expectation::All(Box::new(self), Box::new(other))
    }

    /// Evaluate against a finished process.
    ///
    /// `stderr` is accepted for uniformity but no clause reads it.
    pub fn evaluate(&self, exit_code: i32, stdout: &str, stderr: &str) -> bool {
        match self {
            Expectation::ExitCode { op, value } => op.holds(i64::from(exit_code), *value),
            Expectation::Output { op, value } => match op {
                // `echo` style commands terminate their output with a newline.
                OutputOp::Equals => stdout.trim_end_matches(['\r', '\n']) == value.as_str(),
                OutputOp::Contains => stdout.contains(value.as_str()),
                OutputOp::NotContains => !stdout.contains(value.as_str()),
            },
            Expectation::All(lhs, rhs) => {
                lhs.evaluate(exit_code, stdout, stderr) && rhs.evaluate(exit_code, stdout, stderr)
            }
        }
    }
}

/// Parse an expectation expression.
///
/// Returns `None` when no clause could be parsed.
pub fn parse(expr: &str) -> Option<Expectation> {
    split_clauses(expr)
        .into_iter()
        .filter_map(parse_clause)
        .reduce(Expectation::and)
}

/// Split on the clause separator, ignoring separators inside quoted values.
fn split_clauses(expr: &str) -> Vec<&str> {
    let mut clauses = Vec::new();
    let mut start = 0;
    let mut quoted = false;
    let mut chars = expr.char_indices().peekable();

    while let Some((i, c)) = chars.next() {
        if c == '\'' && is_delimiting_quote(expr, i) {
            quoted = !quoted;
        } else if !quoted && expr[i..].starts_with(CLAUSE_SEPARATOR) {
            clauses.push(&expr[start..i]);
            start = i + CLAUSE_SEPARATOR.len();
            while chars.next_if(|&(j, _)| j < start).is_some() {}
        }
    }
    clauses.push(&expr[start..]);
    clauses
}

/// A `'` between two alphanumerics is an apostrophe (`doesn't`), not a quote.
fn is_delimiting_quote(text: &str, idx: usize) -> bool {
    let prev = text[..idx].chars().next_back();
    let next = text[idx + 1..].chars().next();
    !(prev.is_some_and(char::is_alphanumeric) && next.is_some_and(char::is_alphanumeric))
}

fn parse_clause(clause: &str) -> Option<Expectation> {
    let clause = clause.trim();
    parse_exit_code(clause).or_else(|| parse_output(clause))
}

fn parse_exit_code(clause: &str) -> Option<Expectation> {
    let rest = clause.strip_prefix("exit code")?;
    if !rest.starts_with(char::is_whitespace) {
        return None;
    }

    let mut comparator = Vec::new();
    for word in rest.split_whitespace() {
        if word.bytes().all(|b| b.is_ascii_digit()) {
            let value = word.parse().ok()?;
            let op = ExitCodeOp::from_phrase(&comparator.join(" "));
            return Some(Expectation::ExitCode { op, value });
        }
        comparator.push(word);
    }
    None
}

fn parse_output(clause: &str) -> Option<Expectation> {
    let rest = clause.strip_prefix("output")?;
    if !rest.starts_with(char::is_whitespace) {
        return None;
    }

    let rest = rest.trim_start();
    let (op, rest) = OUTPUT_OPS
        .iter()
        .find_map(|&(phrase, op)| rest.strip_prefix(phrase).map(|r| (op, r)))?;

    let quoted = rest.trim_start().strip_prefix('\'')?;
    let end = quoted
        .char_indices()
        .find(|&(i, c)| c == '\'' && is_delimiting_quote(quoted, i))
        .map(|(i, _)| i)?;
    let value = &quoted[..end];
    if value.is_empty() {
        return None;
    }

    Some(Expectation::Output {
        op,
        value: value.to_string(),
    })
}
