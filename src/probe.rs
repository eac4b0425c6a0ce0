//! Version banners of external tools shown in report headers.

use crate::runner::ProcessRunner;
use regex::Regex;
use std::sync::LazyLock;

/// Value reported in place of a version when probing fails.
pub const PROBE_ERROR: &str = "ERROR";

static KUBECTL_GIT_VERSION: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r#"GitVersion:"([^"]+)".*Platform:"([^"]+)""#).expect("valid regex")
});
static KUBECTL_CLIENT_VERSION: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"Client Version:\s*(\S+)").expect("valid regex"));
static CURL_BANNER: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"curl\s+([0-9]+\.[0-9]+\.[0-9]+)\s+\(([^)]+)\)").expect("valid regex")
});

/// External tools whose versions can appear in a report.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Tool {
    Kubectl,
    Curl,
}

impl Tool {
    fn argv(self) -> Vec<String> {
        let parts: &[&str] = match self {
            Tool::Kubectl => &["kubectl", "version", "--client=true"],
            Tool::Curl => &["curl", "--version"],
        };
        parts.iter().map(|s| s.to_string()).collect()
    }

    fn parse_banner(self, banner: &str) -> Option<ToolInfo> {
        match self {
            Tool::Kubectl => KUBECTL_GIT_VERSION
                .captures(banner)
                .map(|c| ToolInfo::new(&c[1], &c[2]))
                .or_else(|| {
                    KUBECTL_CLIENT_VERSION
                        .captures(banner)
                        .map(|c| ToolInfo::new(&c[1], "unknown"))
                }),
            Tool::Curl => CURL_BANNER
                .captures(banner)
                .map(|c| ToolInfo::new(&c[1], &c[2])),
        }
    }
}

/// Version and platform strings of a tool.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ToolInfo {
    pub version: String,
    pub platform: String,
}

impl ToolInfo {
    pub fn new(version: impl Into<String>, platform: impl Into<String>) -> Self {
        Self {
            version: version.into(),
            platform: platform.into(),
        }
    }

    /// Sentinel pair for a failed probe.
    pub fn error(detail: impl Into<String>) -> Self {
        Self::new(PROBE_ERROR, detail)
    }
}

/// Capability to look up a tool's version banner.
pub trait VersionProbe {
    /// Never fails; errors come back as [`ToolInfo::error`].
    fn probe(&self, tool: Tool) -> ToolInfo;
}

/// Probes tools by running them through a [`ProcessRunner`].
pub struct CommandProbe<'a> {
    runner: &'a dyn ProcessRunner,
}

impl<'a> CommandProbe<'a> {
    pub fn new(runner: &'a dyn ProcessRunner) -> Self {
        Self { runner }
    }
}

impl VersionProbe for CommandProbe<'_> {
    fn probe(&self, tool: Tool) -> ToolInfo {
        match self.runner.run(&tool.argv()) {
            Ok(output) => tool.parse_banner(&output.stdout).unwrap_or_else(|| {
                tracing::warn!(?tool, "unrecognised version banner");
                ToolInfo::error("unrecognised version banner")
            }),
            Err(e) => {
                tracing::warn!(?tool, error = %e, "version probe failed");
                ToolInfo::error(e.to_string())
            }
        }
    }
}
