//! Response reconciliation: turn a raw model reply into canonical issues.
//!
//! The reply is free-form text that *usually* contains a JSON array of
//! issue objects. Which shape actually arrives varies by model and run:
//!
//! | Shape | Example | Page assignment |
//! |-------|---------|-----------------|
//! | Flat list | `[{"page": 7, …}, …]` | the issue's own `page`, coerced; first batch page if unusable |
//! | Grouped list | `[[{…}], [{…}, {…}]]` | group *i* → *i*-th batch page (first page past the end) |
//! | Wrapped object | `{"issues": [ … ]}` | as the wrapped list |
//! | Anything else | prose, truncated JSON | one synthetic `unknown` issue carrying the raw text |
//!
//! Keys are matched loosely (`Issue Type`, `issueType`, `type` all mean
//! `issue_type`), vocabulary values case-insensitively, and text fields that
//! hold structured data are kept as JSON text.
//!
//! [`reconcile`] never fails: malformed output degrades to the synthetic
//! issue so the run still completes.
//!
//! Known gap: positional assignment of grouped replies trusts that the model
//! emitted one group per submitted page, in order. When the group count
//! differs from the batch size the pages of later groups may be wrong; this
//! is logged but not corrected.

use super::cleanup::{extract_json_span, prepare_reply};
use crate::issue::{Issue, IssueType, Severity};
use once_cell::sync::Lazy;
use regex::Regex;
use serde::Serialize;
use serde_json::{Map, Value};
use tracing::{debug, warn};

/// Which reply shape was recognised.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum ReplyShape {
    Flat,
    Grouped,
    Wrapped,
    /// Not parseable as issues; the synthetic fallback issue was emitted.
    Unparsed,
}

/// Issues recovered from one reply.
#[derive(Debug, Clone)]
pub struct Reconciliation {
    pub issues: Vec<Issue>,
    pub shape: ReplyShape,
}

/// Normalise a raw reply against the batch's ordered page numbers.
pub fn reconcile(raw: &str, pages: &[u32]) -> Vec<Issue> {
    reconcile_reply(raw, pages).issues
}

/// Like [`reconcile`], also reporting the recognised shape.
pub fn reconcile_reply(raw: &str, pages: &[u32]) -> Reconciliation {
    let batch = Batch::new(pages);
    let cleaned = prepare_reply(raw);

    let direct = serde_json::from_str::<Value>(&cleaned)
        .ok()
        .and_then(|v| interpret(v, &batch));

    let recovered = direct.or_else(|| {
        let span = extract_json_span(&cleaned)?;
        let value = serde_json::from_str::<Value>(span).ok()?;
        if !contains_object(&value) {
            return None;
        }
        debug!("Recovered JSON payload from surrounding prose");
        interpret(value, &batch)
    });

    match recovered {
        Some((shape, issues)) => {
            debug!("Reconciled {} issues from {:?} reply", issues.len(), shape);
            Reconciliation { issues, shape }
        }
        None => {
            warn!(
                "Review reply is not structured JSON ({} chars); keeping it as one unknown issue",
                raw.len()
            );
            Reconciliation {
                issues: vec![Issue::unparsed(batch.first, raw)],
                shape: ReplyShape::Unparsed,
            }
        }
    }
}

// ── Shape dispatch ───────────────────────────────────────────────────────────

struct Batch<'a> {
    pages: &'a [u32],
    first: u32,
}

impl<'a> Batch<'a> {
    fn new(pages: &'a [u32]) -> Self {
        Self {
            pages,
            first: pages.first().copied().unwrap_or(1),
        }
    }

    /// Keep a page only if it belongs to the batch.
    fn accept(&self, page: Option<u32>) -> u32 {
        match page {
            Some(p) if self.pages.is_empty() || self.pages.contains(&p) => p,
            Some(p) => {
                debug!("Page {} is not in the batch; using page {}", p, self.first);
                self.first
            }
            None => self.first,
        }
    }

    fn group_page(&self, group: usize) -> u32 {
        self.pages.get(group).copied().unwrap_or(self.first)
    }
}

fn interpret(value: Value, batch: &Batch<'_>) -> Option<(ReplyShape, Vec<Issue>)> {
    match value {
        Value::Array(items) => Some(from_list(items, batch)),
        Value::Object(map) => from_object(map, batch),
        _ => None,
    }
}

fn from_list(items: Vec<Value>, batch: &Batch<'_>) -> (ReplyShape, Vec<Issue>) {
    let grouped = items.iter().any(Value::is_array);
    if !grouped {
        let issues = items
            .into_iter()
            .map(|item| issue_from_value(item, None, batch))
            .collect();
        return (ReplyShape::Flat, issues);
    }

    let group_count = items.iter().filter(|v| v.is_array()).count();
    if group_count != batch.pages.len() {
        warn!(
            "Grouped reply has {} groups for {} pages; page numbers are assigned by position",
            group_count,
            batch.pages.len()
        );
    }

    let mut issues = Vec::new();
    let mut group = 0;
    for item in items {
        match item {
            Value::Array(members) => {
                let page = batch.group_page(group);
                group += 1;
                issues.extend(
                    members
                        .into_iter()
                        .map(|m| issue_from_value(m, Some(page), batch)),
                );
            }
            other => issues.push(issue_from_value(other, None, batch)),
        }
    }
    (ReplyShape::Grouped, issues)
}

const WRAPPER_KEYS: [&str; 4] = ["issues", "results", "findings", "items"];

fn from_object(mut map: Map<String, Value>, batch: &Batch<'_>) -> Option<(ReplyShape, Vec<Issue>)> {
    let named = map
        .keys()
        .find(|k| WRAPPER_KEYS.contains(&normalise_key(k).as_str()) && map[*k].is_array())
        .cloned();
    if let Some(key) = named {
        return unwrap_list(&mut map, &key, batch);
    }

    // An issue whose text fields are lists is still one issue.
    if map.keys().any(|k| field_for(k).is_some_and(|f| f != Field::Page)) {
        let issue = issue_from_map(&map, None, batch);
        return Some((ReplyShape::Flat, vec![issue]));
    }

    let arrays: Vec<&String> = map
        .iter()
        .filter(|(_, v)| v.is_array() && contains_object(v))
        .map(|(k, _)| k)
        .collect();
    if let [only] = arrays.as_slice() {
        let key = (*only).clone();
        return unwrap_list(&mut map, &key, batch);
    }

    None
}

fn unwrap_list(
    map: &mut Map<String, Value>,
    key: &str,
    batch: &Batch<'_>,
) -> Option<(ReplyShape, Vec<Issue>)> {
    match map.remove(key) {
        Some(Value::Array(items)) => {
            let (_, issues) = from_list(items, batch);
            Some((ReplyShape::Wrapped, issues))
        }
        _ => None,
    }
}

fn contains_object(value: &Value) -> bool {
    match value {
        Value::Object(_) => true,
        Value::Array(items) => items.iter().any(contains_object),
        _ => false,
    }
}

// ── Field mapping ────────────────────────────────────────────────────────────

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Field {
    Page,
    IssueType,
    Severity,
    Description,
    Suggestion,
}

/// Lowercase and drop everything but letters and digits, so `Issue Type`,
/// `issue_type`, `issueType` and `ISSUE-TYPE` compare equal.
fn normalise_key(key: &str) -> String {
    key.chars()
        .filter(|c| c.is_alphanumeric())
        .flat_map(char::to_lowercase)
        .collect()
}

fn field_for(key: &str) -> Option<Field> {
    match normalise_key(key).as_str() {
        "page" | "pagenumber" | "pageno" | "pagenum" | "slide" | "slidenumber" => Some(Field::Page),
        "issuetype" | "type" | "category" | "kind" => Some(Field::IssueType),
        "severity" | "level" | "priority" => Some(Field::Severity),
        "description" | "issue" | "problem" | "detail" | "details" => Some(Field::Description),
        "suggestion" | "suggestions" | "fix" | "recommendation" | "improvement" => {
            Some(Field::Suggestion)
        }
        _ => None,
    }
}

fn issue_from_value(value: Value, forced_page: Option<u32>, batch: &Batch<'_>) -> Issue {
    match value {
        Value::Object(map) => issue_from_map(&map, forced_page, batch),
        Value::String(text) => Issue::unparsed(forced_page.unwrap_or(batch.first), text),
        other => Issue::unparsed(forced_page.unwrap_or(batch.first), other.to_string()),
    }
}

fn issue_from_map(map: &Map<String, Value>, forced_page: Option<u32>, batch: &Batch<'_>) -> Issue {
    let mut page = None;
    let mut issue_type = None;
    let mut severity = None;
    let mut description = None;
    let mut suggestion = None;

    // First key mapping to a field wins.
    for (key, value) in map {
        match field_for(key) {
            Some(Field::Page) if page.is_none() => page = Some(value),
            Some(Field::IssueType) if issue_type.is_none() => issue_type = Some(value),
            Some(Field::Severity) if severity.is_none() => severity = Some(value),
            Some(Field::Description) if description.is_none() => description = Some(value),
            Some(Field::Suggestion) if suggestion.is_none() => suggestion = Some(value),
            _ => {}
        }
    }

    let page = match forced_page {
        Some(p) => p,
        None => batch.accept(page.and_then(coerce_page)),
    };

    Issue {
        page,
        issue_type: issue_type
            .and_then(Value::as_str)
            .map(IssueType::parse_lenient)
            .unwrap_or_default(),
        severity: severity
            .and_then(Value::as_str)
            .map(Severity::parse_lenient)
            .unwrap_or_default(),
        description: text_field(description),
        suggestion: text_field(suggestion),
    }
}

static RE_PAGE_LABEL: Lazy<Regex> = Lazy::new(|| {
    Regex::new(r"(?i)^\s*(?:page|slide|p\.?)?\s*#?\s*(\d+)(?:\.0+)?\s*$").unwrap()
});

/// Coerce a `page` value to a positive integer: integers, whole floats,
/// numeric strings and labels such as `"Page 7"` / `"slide #3"`.
fn coerce_page(value: &Value) -> Option<u32> {
    let raw = match value {
        Value::Number(n) => n.as_u64().or_else(|| {
            n.as_f64()
                .filter(|f| f.is_finite() && f.fract() == 0.0 && *f >= 1.0)
                .map(|f| f as u64)
        }),
        Value::String(s) => RE_PAGE_LABEL
            .captures(s)
            .and_then(|caps| caps[1].parse::<u64>().ok()),
        _ => None,
    }?;
    u32::try_from(raw).ok().filter(|&p| p >= 1)
}

fn text_field(value: Option<&Value>) -> String {
    match value {
        None | Some(Value::Null) => String::new(),
        Some(Value::String(s)) => s.clone(),
        Some(other) => other.to_string(),
    }
}
