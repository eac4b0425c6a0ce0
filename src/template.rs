//! Report template language.
//!
//! A template is line oriented. Lines outside blocks are literals. A line
//! reading `BEGIN` (or `BEGIN_GROUP`) opens a replay block that runs up to the
//! next `END` line. Inside a block, a `HEADER` line pair and a `FOOTER` line
//! pair each delimit a zone that is shown only with the first replay.
//!
//! Placeholders are plain words (`STATUS`, `RAW_OUTPUT`, `TODAY_DATE`, ...)
//! matched anywhere in a line, longest name first.

use std::fmt;
use std::path::{Path, PathBuf};

pub const BEGIN: &str = "BEGIN";
pub const BEGIN_GROUP: &str = "BEGIN_GROUP";
pub const END: &str = "END";
pub const HEADER: &str = "HEADER";
pub const FOOTER: &str = "FOOTER";

/// Error type for template loading and parsing.
#[derive(Debug, thiserror::Error)]
pub enum TemplateError {
    #[error("failed to read template {}: {source}", .path.display())]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },
    #[error("line {line}: {marker} inside a block that is still open")]
    NestedBlock { line: usize, marker: String },
    #[error("line {line}: block is never closed with END")]
    UnterminatedBlock { line: usize },
    #[error("line {line}: {zone} zone is never closed")]
    UnbalancedZone { line: usize, zone: ZoneKind },
    #[error("line {line}: second {zone} zone in one block")]
    DuplicateZone { line: usize, zone: ZoneKind },
}

/// Tokens resolved once per render.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum GlobalToken {
    EmptyLine,
    TodayDate,
    KubectlVersion,
    KubectlPlatform,
    CurlVersion,
    CurlPlatform,
    StatusSuccess,
    StatusFailed,
    StatusNotTested,
    StatusUnknown,
}

pub const GLOBAL_TOKENS: &[(&str, GlobalToken)] = &[
    ("EMPTY_LINE", GlobalToken::EmptyLine),
    ("TODAY_DATE", GlobalToken::TodayDate),
    ("KUBECTL_VERSION", GlobalToken::KubectlVersion),
    ("KUBECTL_PLATFORM", GlobalToken::KubectlPlatform),
    ("CURL_VERSION", GlobalToken::CurlVersion),
    ("CURL_PLATFORM", GlobalToken::CurlPlatform),
    ("STATUS_SUCCESS", GlobalToken::StatusSuccess),
    ("STATUS_FAILED", GlobalToken::StatusFailed),
    ("STATUS_NOTTESTED", GlobalToken::StatusNotTested),
    ("STATUS_UNKOWN", GlobalToken::StatusUnknown),
    ("STATUS_UNKNOWN", GlobalToken::StatusUnknown),
];

/// Tokens resolved for every replayed result.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ResultToken {
    Status,
    Command,
    CmdLabel,
    RawCmd,
    RelUrl,
    RelLabel,
    Expected,
    Notes,
    Note1,
    Note2,
    ExitCode,
    RawOutput,
    RawError,
}

impl ResultToken {
    /// Tokens that only make sense for a process that ran and was judged.
    pub fn exposes_process_output(self) -> bool {
        matches!(
            self,
            ResultToken::ExitCode | ResultToken::RawOutput | ResultToken::RawError
        )
    }
}

pub const RESULT_TOKENS: &[(&str, ResultToken)] = &[
    ("STATUS", ResultToken::Status),
    ("COMMAND", ResultToken::Command),
    ("CMD_LABEL", ResultToken::CmdLabel),
    ("RAW_CMD", ResultToken::RawCmd),
    ("REL_URL", ResultToken::RelUrl),
    ("REL_LABEL", ResultToken::RelLabel),
    ("EXPECTED", ResultToken::Expected),
    ("NOTES", ResultToken::Notes),
    ("NOTE1", ResultToken::Note1),
    ("NOTE2", ResultToken::Note2),
    ("EXIT_CODE", ResultToken::ExitCode),
    ("RAW_OUTPUT", ResultToken::RawOutput),
    ("RAW_ERROR", ResultToken::RawError),
];

/// A run of text or a recognised token.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Piece<'a, T> {
    Text(&'a str),
    Token(T),
}

/// Split `text` into literal runs and tokens from `table`.
///
/// At each position the longest matching token name wins.
pub fn scan<'a, T: Copy>(text: &'a str, table: &[(&str, T)]) -> Vec<Piece<'a, T>> {
    let mut pieces = Vec::new();
    let mut text_start = 0;
    let mut i = 0;

    while i < text.len() {
        let rest = &text[i..];
        let hit = table
            .iter()
            .filter(|entry| rest.starts_with(entry.0))
            .max_by_key(|entry| entry.0.len());
        match hit {
            Some(&(name, token)) => {
                if text_start < i {
                    pieces.push(Piece::Text(&text[text_start..i]));
                }
                pieces.push(Piece::Token(token));
                i += name.len();
                text_start = i;
            }
            None => i += rest.chars().next().map_or(1, char::len_utf8),
        }
    }
    if text_start < text.len() {
        pieces.push(Piece::Text(&text[text_start..]));
    }
    pieces
}

/// Replace every token of `table` in `text` with `value(token)`.
///
/// Substituted values are never rescanned.
pub fn substitute<T: Copy>(
    text: &str,
    table: &[(&str, T)],
    mut value: impl FnMut(T) -> String,
) -> String {
    let mut out = String::with_capacity(text.len());
    for piece in scan(text, table) {
        match piece {
            Piece::Text(s) => out.push_str(s),
            Piece::Token(token) => out.push_str(&value(token)),
        }
    }
    out
}

/// Whether `text` holds a token of `table` accepted by `pred`.
pub fn mentions<T: Copy>(text: &str, table: &[(&str, T)], pred: impl Fn(T) -> bool) -> bool {
    scan(text, table)
        .into_iter()
        .any(|piece| matches!(piece, Piece::Token(t) if pred(t)))
}

/// Header or footer.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ZoneKind {
    Header,
    Footer,
}

impl ZoneKind {
    fn from_marker(line: &str) -> Option<Self> {
        match line.trim() {
            HEADER => Some(ZoneKind::Header),
            FOOTER => Some(ZoneKind::Footer),
            _ => None,
        }
    }
}

impl fmt::Display for ZoneKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(match self {
            ZoneKind::Header => HEADER,
            ZoneKind::Footer => FOOTER,
        })
    }
}

/// Whether a block replays per result or per distinct label.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum BlockKind {
    Plain,
    Grouped,
}

/// Part of a block body.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Segment {
    Line(String),
    Zone { kind: ZoneKind, lines: Vec<String> },
}

/// A replay block: its body split into plain lines and zones.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Block {
    pub kind: BlockKind,
    pub segments: Vec<Segment>,
}

impl Block {
    fn from_body(kind: BlockKind, body: Vec<String>, first_line: usize) -> Result<Self, TemplateError> {
        let mut segments = Vec::new();
        let mut open: Option<(ZoneKind, usize, Vec<String>)> = None;
        let mut seen = Vec::new();

        for (offset, line) in body.into_iter().enumerate() {
            let line_no = first_line + offset;
            match (ZoneKind::from_marker(&line), open.take()) {
                (Some(marker), Some((zone, start, lines))) => {
                    if marker != zone {
                        return Err(TemplateError::UnbalancedZone { line: start, zone });
                    }
                    segments.push(Segment::Zone { kind: zone, lines });
                }
                (Some(marker), None) => {
                    if seen.contains(&marker) {
                        return Err(TemplateError::DuplicateZone {
                            line: line_no,
                            zone: marker,
                        });
                    }
                    seen.push(marker);
                    open = Some((marker, line_no, Vec::new()));
                }
                (None, Some((zone, start, mut lines))) => {
                    lines.push(line);
                    open = Some((zone, start, lines));
                }
                (None, None) => segments.push(Segment::Line(line)),
            }
        }

        if let Some((zone, start, _)) = open {
            return Err(TemplateError::UnbalancedZone { line: start, zone });
        }
        Ok(Self { kind, segments })
    }

    /// Body for the first emitted replay: zone markers dropped, zone content kept.
    pub fn first_replay_text(&self) -> String {
        self.text(true)
    }

    /// Body for every later replay: zones dropped entirely.
    pub fn later_replay_text(&self) -> String {
        self.text(false)
    }

    fn text(&self, with_zones: bool) -> String {
        let mut out = String::new();
        for segment in &self.segments {
            match segment {
                Segment::Line(line) => push_line(&mut out, line),
                Segment::Zone { lines, .. } if with_zones => {
                    lines.iter().for_each(|line| push_line(&mut out, line));
                }
                Segment::Zone { .. } => {}
            }
        }
        out
    }

    fn lines(&self) -> impl Iterator<Item = &str> {
        self.segments
            .iter()
            .flat_map(|segment| match segment {
                Segment::Line(line) => std::slice::from_ref(line),
                Segment::Zone { lines, .. } => lines.as_slice(),
            })
            .map(String::as_str)
    }
}

fn push_line(out: &mut String, line: &str) {
    out.push_str(line);
    out.push('\n');
}

/// Top-level unit of a template.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Unit {
    Literal(String),
    Block(Block),
}

/// A parsed template.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Template {
    units: Vec<Unit>,
}

impl Template {
    /// Read and parse a template file.
    pub fn load(path: &Path) -> Result<Self, TemplateError> {
        let contents = std::fs::read_to_string(path).map_err(|source| TemplateError::Io {
            path: path.to_path_buf(),
            source,
        })?;
        Self::parse(&contents)
    }

    /// Parse template text in a single forward scan.
    pub fn parse(text: &str) -> Result<Self, TemplateError> {
        let mut units = Vec::new();
        let mut open: Option<(BlockKind, usize, Vec<String>)> = None;

        for (idx, line) in text.lines().enumerate() {
            let line_no = idx + 1;
            let opens = match line.trim() {
                BEGIN => Some(BlockKind::Plain),
                BEGIN_GROUP => Some(BlockKind::Grouped),
                _ => None,
            };

            match (opens, open.take()) {
                (Some(_), Some(_)) => {
                    return Err(TemplateError::NestedBlock {
                        line: line_no,
                        marker: line.trim().to_string(),
                    });
                }
                (Some(kind), None) => open = Some((kind, line_no, Vec::new())),
                (None, Some((kind, start, body))) if line.trim() == END => {
                    units.push(Unit::Block(Block::from_body(kind, body, start + 1)?));
                }
                (None, Some((kind, start, mut body))) => {
                    body.push(line.to_string());
                    open = Some((kind, start, body));
                }
                (None, None) => units.push(Unit::Literal(line.to_string())),
            }
        }

        if let Some((_, start, _)) = open {
            return Err(TemplateError::UnterminatedBlock { line: start });
        }
        Ok(Self { units })
    }

    pub fn units(&self) -> &[Unit] {
        &self.units
    }

    /// Every content line, excluding block and zone markers.
    pub fn lines(&self) -> impl Iterator<Item = &str> {
        self.units.iter().flat_map(|unit| {
            let (literal, block) = match unit {
                Unit::Literal(line) => (Some(line.as_str()), None),
                Unit::Block(block) => (None, Some(block)),
            };
            literal
                .into_iter()
                .chain(block.into_iter().flat_map(Block::lines))
        })
    }
}
