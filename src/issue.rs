//! The canonical issue record produced by a review.
//!
//! Model replies arrive with inconsistent key names and vocabulary; the
//! reconciler maps all of them onto this one schema so everything
//! downstream (table, CSV, JSON output, session) sees a single shape.

use serde::{Deserialize, Serialize};
use std::fmt;

/// Category of a finding. Closed vocabulary; anything the model invents
/// outside it becomes [`IssueType::Unknown`].
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum IssueType {
    /// Layout, alignment, fonts, colours, inconsistent styling.
    Format,
    /// Argument flow, contradictory numbers, unsupported claims.
    Logic,
    /// Spelling and grammar.
    Typo,
    #[default]
    Unknown,
}

impl IssueType {
    pub fn as_str(&self) -> &'static str {
        match self {
            IssueType::Format => "format",
            IssueType::Logic => "logic",
            IssueType::Typo => "typo",
            IssueType::Unknown => "unknown",
        }
    }

    /// Case-insensitive parse that never fails.
    pub fn parse_lenient(s: &str) -> Self {
        match s.trim().to_lowercase().as_str() {
            "format" | "formatting" | "layout" => IssueType::Format,
            "logic" | "logical" => IssueType::Logic,
            "typo" | "typos" | "spelling" | "grammar" => IssueType::Typo,
            _ => IssueType::Unknown,
        }
    }
}

impl fmt::Display for IssueType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// How urgently a finding should be fixed.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Severity {
    High,
    Medium,
    Low,
    #[default]
    Unknown,
}

impl Severity {
    pub fn as_str(&self) -> &'static str {
        match self {
            Severity::High => "high",
            Severity::Medium => "medium",
            Severity::Low => "low",
            Severity::Unknown => "unknown",
        }
    }

    /// Case-insensitive parse that never fails.
    pub fn parse_lenient(s: &str) -> Self {
        match s.trim().to_lowercase().as_str() {
            "high" | "critical" | "major" => Severity::High,
            "medium" | "moderate" => Severity::Medium,
            "low" | "minor" => Severity::Low,
            _ => Severity::Unknown,
        }
    }
}

impl fmt::Display for Severity {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// One finding on one page.
///
/// `page` is 1-based and always one of the pages submitted in the batch
/// that produced the issue (or the batch's first page when the model's
/// page reference could not be trusted).
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Issue {
    pub page: u32,
    pub issue_type: IssueType,
    pub severity: Severity,
    pub description: String,
    #[serde(default)]
    pub suggestion: String,
}

impl Issue {
    /// The placeholder emitted when a reply cannot be parsed at all: the raw
    /// reply text is kept verbatim so nothing the model said is lost.
    pub fn unparsed(page: u32, raw: impl Into<String>) -> Self {
        Self {
            page,
            issue_type: IssueType::Unknown,
            severity: Severity::Unknown,
            description: raw.into(),
            suggestion: String::new(),
        }
    }
}
