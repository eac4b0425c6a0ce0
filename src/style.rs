//! Output-format specific pieces of a report.

use crate::case::TestStatus;

/// How a report format spells statuses and in-document links.
pub trait ReportStyle {
    /// Glyph substituted for a status.
    fn glyph(&self, status: TestStatus) -> &str;

    /// Relative anchor pointing at the section titled `text`.
    fn relative_url(&self, text: &str) -> String;
}

/// GitHub-flavoured Markdown.
#[derive(Debug, Clone, Copy, Default)]
pub struct Markdown;

impl ReportStyle for Markdown {
    fn glyph(&self, status: TestStatus) -> &str {
        match status {
            TestStatus::Success => ":arrow_right:",
            TestStatus::Failed => ":x:",
            TestStatus::NotTested => ":heavy_minus_sign:",
            TestStatus::Unknown => ":grey_question:",
        }
    }

    fn relative_url(&self, text: &str) -> String {
        let slug: String = text
            .to_lowercase()
            .chars()
            .filter(|&c| c != '/')
            .map(|c| if c == ' ' { '-' } else { c })
            .collect();
        format!("#{slug}")
    }
}
