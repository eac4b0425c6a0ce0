//! Template rendering.
//!
//! Rendering makes two passes over every unit of a template. Global tokens
//! (date, tool banners, status glyphs) are substituted first. A unit that
//! then still names a per-result token is replayed once per outcome, or once
//! per distinct label for `BEGIN_GROUP` blocks.

use crate::case::{TestStatus, TestResult};
use crate::catalog::Outcome;
use crate::probe::{Tool, ToolInfo, VersionProbe};
use crate::style::ReportStyle;
use crate::template::{
    self, Block, BlockKind, GLOBAL_TOKENS, GlobalToken, RESULT_TOKENS, ResultToken, Template,
    TemplateError, Unit,
};
use chrono::{Local, NaiveDate};
use regex::Regex;
use std::collections::HashMap;
use std::path::Path;
use std::sync::LazyLock;

/// `TODAY_DATE` format: short numeric month/day/year.
const DATE_FORMAT: &str = "%-m/%-d/%y";

/// Substituted for `EXIT_CODE` when the process never exited.
pub const NO_EXIT_CODE: &str = "(no exit code)";

/// Substituted for `RAW_OUTPUT`/`RAW_ERROR` when nothing was captured.
pub const NO_OUTPUT: &str = "(no output)";

static ANSI_SGR: LazyLock<Regex> =
    LazyLock::new(|| Regex::new("\x1b\\[[0-9;]*m").expect("valid regex"));

/// Renders outcomes through a template.
pub struct TemplateEngine<'a> {
    style: &'a dyn ReportStyle,
    probe: &'a dyn VersionProbe,
    today: String,
}

impl<'a> TemplateEngine<'a> {
    pub fn new(style: &'a dyn ReportStyle, probe: &'a dyn VersionProbe) -> Self {
        Self {
            style,
            probe,
            today: Local::now().format(DATE_FORMAT).to_string(),
        }
    }

    /// Pin the date used for `TODAY_DATE`.
    pub fn with_date(mut self, date: NaiveDate) -> Self {
        self.today = date.format(DATE_FORMAT).to_string();
        self
    }

    /// Load the template at `path` and render `outcomes` through it.
    pub fn render_file(&self, outcomes: &[Outcome], path: &Path) -> Result<String, TemplateError> {
        let template = Template::load(path)?;
        Ok(self.render(outcomes, &template))
    }

    /// Render `outcomes` through `template`.
    pub fn render(&self, outcomes: &[Outcome], template: &Template) -> String {
        let globals = self.resolve_globals(template);
        let mut output = String::new();

        for unit in template.units() {
            let rendered = match unit {
                Unit::Literal(line) => self.render_literal(line, &globals, outcomes),
                Unit::Block(block) => self.render_block(block, &globals, outcomes),
            };
            output.push_str(&rendered);
            if !rendered.is_empty() && !output.ends_with('\n') {
                output.push('\n');
            }
        }

        output
    }

    /// Values of the global tokens the template actually uses.
    fn resolve_globals(&self, template: &Template) -> HashMap<GlobalToken, String> {
        let mut used: Vec<GlobalToken> = Vec::new();
        for line in template.lines() {
            for piece in template::scan(line, GLOBAL_TOKENS) {
                if let template::Piece::Token(token) = piece
                    && !used.contains(&token)
                {
                    used.push(token);
                }
            }
        }

        let mut kubectl: Option<ToolInfo> = None;
        let mut curl: Option<ToolInfo> = None;
        let mut values = HashMap::new();
        for token in used {
            let value = match token {
                GlobalToken::EmptyLine => " ".to_string(),
                GlobalToken::TodayDate => self.today.clone(),
                GlobalToken::KubectlVersion => {
                    self.tool(&mut kubectl, Tool::Kubectl).version.clone()
                }
                GlobalToken::KubectlPlatform => {
                    self.tool(&mut kubectl, Tool::Kubectl).platform.clone()
                }
                GlobalToken::CurlVersion => self.tool(&mut curl, Tool::Curl).version.clone(),
                GlobalToken::CurlPlatform => self.tool(&mut curl, Tool::Curl).platform.clone(),
                GlobalToken::StatusSuccess => self.style.glyph(TestStatus::Success).to_string(),
                GlobalToken::StatusFailed => self.style.glyph(TestStatus::Failed).to_string(),
                GlobalToken::StatusNotTested => {
                    self.style.glyph(TestStatus::NotTested).to_string()
                }
                GlobalToken::StatusUnknown => self.style.glyph(TestStatus::Unknown).to_string(),
            };
            values.insert(token, value);
        }
        values
    }

    fn tool<'c>(&self, cache: &'c mut Option<ToolInfo>, tool: Tool) -> &'c ToolInfo {
        cache.get_or_insert_with(|| self.probe.probe(tool))
    }

    /// A top-level line: replayed like a one-line block, but a value that
    /// already ends the line does not earn a second newline.
    fn render_literal(
        &self,
        line: &str,
        globals: &HashMap<GlobalToken, String>,
        outcomes: &[Outcome],
    ) -> String {
        let line = apply_globals(line, globals);
        if !template::mentions(&line, RESULT_TOKENS, |_| true) {
            return line + "\n";
        }
        let all: Vec<&Outcome> = outcomes.iter().collect();
        self.replay(&line, &line, &all)
    }

    fn render_block(
        &self,
        block: &Block,
        globals: &HashMap<GlobalToken, String>,
        outcomes: &[Outcome],
    ) -> String {
        let first = apply_globals(&block.first_replay_text(), globals);
        let later = apply_globals(&block.later_replay_text(), globals);

        match block.kind {
            BlockKind::Plain => {
                let all: Vec<&Outcome> = outcomes.iter().collect();
                self.replay(&first, &later, &all)
            }
            BlockKind::Grouped => group_by_label(outcomes)
                .iter()
                .map(|group| self.replay(&first, &later, group))
                .collect(),
        }
    }

    /// Replay a block body over a sequence of outcomes.
    ///
    /// `first` is used until a replay is emitted, `later` afterwards. Bodies
    /// that expose raw process output are skipped for unjudged outcomes, and a
    /// skipped replay does not consume the header or footer.
    fn replay(&self, first: &str, later: &str, outcomes: &[&Outcome]) -> String {
        if !template::mentions(first, RESULT_TOKENS, |_| true) {
            return first.to_string();
        }

        let mut output = String::new();
        let mut emitted = false;
        for outcome in outcomes {
            let body = if emitted { later } else { first };
            if !outcome.result.status.is_judged()
                && template::mentions(body, RESULT_TOKENS, ResultToken::exposes_process_output)
            {
                continue;
            }

            output.push_str(&template::substitute(body, RESULT_TOKENS, |token| {
                self.result_value(token, outcome)
            }));
            if !output.ends_with('\n') {
                output.push('\n');
            }
            emitted = true;
        }
        output
    }

    fn result_value(&self, token: ResultToken, outcome: &Outcome) -> String {
        let Outcome { case, result } = outcome;
        match token {
            ResultToken::Status => self.style.glyph(result.status).to_string(),
            ResultToken::Command => case.name.clone(),
            ResultToken::CmdLabel => case.label.clone(),
            ResultToken::RawCmd => case.command_line(),
            ResultToken::RelUrl => self.style.relative_url(&case.name),
            ResultToken::RelLabel => self.style.relative_url(&case.label),
            ResultToken::Expected => case.expected.clone().unwrap_or_default(),
            ResultToken::Notes => case.notes.join("\n"),
            ResultToken::Note1 => case.notes.first().cloned().unwrap_or_default(),
            ResultToken::Note2 => case.notes.get(1).cloned().unwrap_or_default(),
            ResultToken::ExitCode => exit_code_text(result),
            ResultToken::RawOutput => raw_stream(result.stdout.as_deref()),
            ResultToken::RawError => raw_stream(result.stderr.as_deref()),
        }
    }
}

fn apply_globals(text: &str, globals: &HashMap<GlobalToken, String>) -> String {
    template::substitute(text, GLOBAL_TOKENS, |t| {
        globals.get(&t).cloned().unwrap_or_default()
    })
}

fn exit_code_text(result: &TestResult) -> String {
    result
        .exit_code
        .map_or_else(|| NO_EXIT_CODE.to_string(), |code| code.to_string())
}

fn raw_stream(captured: Option<&str>) -> String {
    match captured {
        Some(text) if !text.is_empty() => strip_ansi(text),
        _ => NO_OUTPUT.to_string(),
    }
}

/// Remove ANSI SGR colour sequences.
pub fn strip_ansi(text: &str) -> String {
    ANSI_SGR.replace_all(text, "").into_owned()
}

/// Outcomes grouped by label, groups in first-occurrence order.
fn group_by_label(outcomes: &[Outcome]) -> Vec<Vec<&Outcome>> {
    let mut groups: Vec<Vec<&Outcome>> = Vec::new();
    for outcome in outcomes {
        match groups
            .iter_mut()
            .find(|group| group[0].case.label == outcome.case.label)
        {
            Some(group) => group.push(outcome),
            None => groups.push(vec![outcome]),
        }
    }
    groups
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::case::TestCase;
    use crate::runner::split_command;
    use crate::style::Markdown;
    use std::cell::RefCell;

    /// Returns fixed banners and counts probes.
    #[derive(Default)]
    struct FixedProbe {
        probed: RefCell<Vec<Tool>>,
    }

    impl VersionProbe for FixedProbe {
        fn probe(&self, tool: Tool) -> ToolInfo {
            self.probed.borrow_mut().push(tool);
            match tool {
                Tool::Kubectl => ToolInfo::new("v1.9.2", "linux/amd64"),
                Tool::Curl => ToolInfo::new("8.5.0", "x86_64-pc-linux-gnu"),
            }
        }
    }

    fn outcome(label: &str, status: TestStatus) -> Outcome {
        let mut case = TestCase::new(label, split_command(&format!("echo {label}")));
        case.expected = Some(format!("output equals '{label}'"));
        let result = match status {
            TestStatus::Success | TestStatus::Failed => TestResult {
                status,
                exit_code: Some(0),
                stdout: Some(format!("{label}\n")),
                stderr: Some(String::new()),
            },
            _ => TestResult::not_run(status),
        };
        Outcome { case, result }
    }

    fn render(template: &str, outcomes: &[Outcome]) -> String {
        let probe = FixedProbe::default();
        let engine = TemplateEngine::new(&Markdown, &probe)
            .with_date(NaiveDate::from_ymd_opt(2024, 3, 7).unwrap());
        engine.render(outcomes, &Template::parse(template).unwrap())
    }

    #[test]
    fn literal_without_tokens_is_emitted_once() {
        let outcomes = [outcome("a", TestStatus::Success), outcome("b", TestStatus::Success)];
        assert_eq!(render("# Report\n", &outcomes), "# Report\n");
    }

    #[test]
    fn literal_with_result_token_is_replayed_per_outcome() {
        let outcomes = [outcome("a", TestStatus::Success), outcome("b", TestStatus::Failed)];
        assert_eq!(
            render("| STATUS | COMMAND |\n", &outcomes),
            "| :arrow_right: | a |\n| :x: | b |\n"
        );
    }

    #[test]
    fn global_tokens_are_substituted() {
        let out = render(
            "Date: TODAY_DATE\nkubectl KUBECTL_VERSION (KUBECTL_PLATFORM)\ncurl CURL_VERSION on CURL_PLATFORM\nEMPTY_LINE\nSTATUS_SUCCESS STATUS_FAILED STATUS_NOTTESTED STATUS_UNKOWN\n",
            &[],
        );
        assert_eq!(
            out,
            "Date: 3/7/24\nkubectl v1.9.2 (linux/amd64)\ncurl 8.5.0 on x86_64-pc-linux-gnu\n \n:arrow_right: :x: :heavy_minus_sign: :grey_question:\n"
        );
    }

    #[test]
    fn tools_are_probed_once_and_only_when_used() {
        let probe = FixedProbe::default();
        let engine = TemplateEngine::new(&Markdown, &probe);

        engine.render(&[], &Template::parse("STATUS_SUCCESS\n").unwrap());
        assert!(probe.probed.borrow().is_empty());

        engine.render(
            &[],
            &Template::parse("KUBECTL_VERSION KUBECTL_PLATFORM\nKUBECTL_VERSION\n").unwrap(),
        );
        assert_eq!(*probe.probed.borrow(), vec![Tool::Kubectl]);
    }

    #[test]
    fn plain_block_is_replayed_per_outcome() {
        let outcomes = [outcome("a", TestStatus::Success), outcome("b", TestStatus::NotTested)];
        let out = render("BEGIN\n## COMMAND\n\nSTATUS RAW_CMD\nEND\n", &outcomes);
        assert_eq!(
            out,
            "## a\n\n:arrow_right: echo a\n## b\n\n:heavy_minus_sign: echo b\n"
        );
    }

    #[test]
    fn block_without_result_tokens_is_emitted_once() {
        let outcomes = [outcome("a", TestStatus::Success), outcome("b", TestStatus::Success)];
        assert_eq!(render("BEGIN\nstatic\nEND\n", &outcomes), "static\n");
    }

    #[test]
    fn grouped_block_replays_members_per_distinct_label() {
        let outcomes = [
            outcome("A", TestStatus::Success),
            outcome("B", TestStatus::Success),
            outcome("A", TestStatus::Failed),
            outcome("C", TestStatus::Success),
        ];
        let out = render("BEGIN_GROUP\n[CMD_LABEL STATUS]\nEND\n", &outcomes);
        assert_eq!(
            out,
            "[A :arrow_right:]\n[A :x:]\n[B :arrow_right:]\n[C :arrow_right:]\n"
        );
    }

    #[test]
    fn grouped_block_header_once_per_group() {
        let outcomes = [
            outcome("A", TestStatus::Success),
            outcome("B", TestStatus::Success),
            outcome("A", TestStatus::Failed),
        ];
        let out = render(
            "BEGIN_GROUP\nHEADER\n### CMD_LABEL\nHEADER\n- STATUS\nEND\n",
            &outcomes,
        );
        assert_eq!(out, "### A\n- :arrow_right:\n- :x:\n### B\n- :arrow_right:\n");
    }

    #[test]
    fn header_and_footer_appear_once() {
        let outcomes = [
            outcome("a", TestStatus::Success),
            outcome("b", TestStatus::Success),
            outcome("c", TestStatus::Failed),
        ];
        let out = render(
            "BEGIN\nHEADER\n| Status | Name |\n|---|---|\nHEADER\n| STATUS | COMMAND |\nFOOTER\n(table end)\nFOOTER\nEND\n",
            &outcomes,
        );
        assert_eq!(out.matches("| Status | Name |").count(), 1);
        assert_eq!(out.matches("(table end)").count(), 1);
        assert_eq!(out.matches("| :").count(), 3);
        assert!(!out.contains("HEADER"));
        assert!(!out.contains("FOOTER"));
        assert!(out.starts_with("| Status | Name |\n|---|---|\n| :arrow_right: | a |\n"));
    }

    #[test]
    fn raw_output_block_skips_unjudged_outcomes() {
        let outcomes = [
            outcome("ok", TestStatus::Success),
            outcome("skipped", TestStatus::NotTested),
            outcome("unknown", TestStatus::Unknown),
            outcome("bad", TestStatus::Failed),
        ];
        let out = render("BEGIN\nCOMMAND: RAW_OUTPUT\nEND\n", &outcomes);
        assert_eq!(out, "ok: ok\n\nbad: bad\n\n");
    }

    #[test]
    fn literal_line_ending_in_output_gets_one_newline() {
        let outcomes = [
            outcome("hi", TestStatus::Success),
            outcome("skipped", TestStatus::NotTested),
        ];
        assert_eq!(render("Out: RAW_OUTPUT\n", &outcomes), "Out: hi\n");
        assert_eq!(
            render("CMD_LABEL ends\nOut: RAW_OUTPUT\ndone\n", &outcomes[..1]),
            "hi ends\nOut: hi\ndone\n"
        );
    }

    #[test]
    fn exit_code_block_skips_unjudged_outcomes() {
        let outcomes = [outcome("skipped", TestStatus::NotTested)];
        assert_eq!(render("intro\nBEGIN\nEXIT_CODE\nEND\n", &outcomes), "intro\n");
    }

    #[test]
    fn header_waits_for_first_emitted_replay() {
        let outcomes = [outcome("skipped", TestStatus::NotTested), outcome("ok", TestStatus::Success)];
        let out = render("BEGIN\nHEADER\nLogs\nHEADER\nRAW_ERROR\nEND\n", &outcomes);
        assert_eq!(out, "Logs\n(no output)\n");
    }

    #[test]
    fn ansi_sequences_are_stripped() {
        let mut colored = outcome("c", TestStatus::Failed);
        colored.result.stdout = Some("\x1b[31mred\x1b[0m plain \x1b[1;32mbold\x1b[0m".to_string());
        colored.result.stderr = Some("\x1b[33mwarn\x1b[0m".to_string());

        let out = render("BEGIN\nRAW_OUTPUT\nRAW_ERROR\nEND\n", &[colored]);
        assert_eq!(out, "red plain bold\nwarn\n");
        assert!(!out.contains('\x1b'));
    }

    #[test]
    fn placeholders_for_missing_fields() {
        let mut ran = outcome("x", TestStatus::Failed);
        ran.result.exit_code = None;
        ran.result.stdout = Some(String::new());
        ran.result.stderr = None;

        let out = render("EXIT_CODE|RAW_OUTPUT|RAW_ERROR\n", &[ran]);
        assert_eq!(out, "(no exit code)|(no output)|(no output)\n");
    }

    #[test]
    fn metadata_tokens() {
        let mut o = outcome("get pods", TestStatus::Success);
        o.case.name = "Get Pods/Wide".to_string();
        o.case.notes = vec!["first".to_string(), "second".to_string(), "third".to_string()];

        let out = render(
            "COMMAND|CMD_LABEL|REL_URL|REL_LABEL|EXPECTED|NOTE1|NOTE2|EXIT_CODE\nNOTES\n",
            &[o],
        );
        assert_eq!(
            out,
            "Get Pods/Wide|get pods|#get-podswide|#get-pods|output equals 'get pods'|first|second|0\nfirst\nsecond\nthird\n"
        );
    }

    #[test]
    fn missing_notes_and_expectation_are_empty() {
        let mut o = outcome("n", TestStatus::Unknown);
        o.case.expected = None;
        assert_eq!(render("[EXPECTED][NOTE1][NOTE2]\n", &[o]), "[][][]\n");
    }

    #[test]
    fn per_result_line_with_no_outcomes_vanishes() {
        assert_eq!(render("top\n| STATUS |\nbottom\n", &[]), "top\nbottom\n");
    }

    #[test]
    fn blank_lines_are_preserved() {
        assert_eq!(render("a\n\nb\n", &[]), "a\n\nb\n");
    }

    #[test]
    fn render_file_propagates_io_errors() {
        let probe = FixedProbe::default();
        let engine = TemplateEngine::new(&Markdown, &probe);
        let result = engine.render_file(&[], Path::new("/nonexistent/template.md"));
        assert!(matches!(result, Err(TemplateError::Io { .. })));
    }

    #[test]
    fn strip_ansi_leaves_plain_text() {
        assert_eq!(strip_ansi("[not an escape]"), "[not an escape]");
        assert_eq!(strip_ansi("\x1b[0mx"), "x");
    }
}
