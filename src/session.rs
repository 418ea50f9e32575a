//! Interactive review session.
//!
//! A [`Session`] is an explicit state machine over one loaded document:
//!
//! ```text
//!            LoadDocument            SelectRange            StartReview
//!   Idle ───────────────▶ DocumentLoaded ───────▶ RangeSelected ───────▶ Reviewing
//!    ▲                                               ▲                    │    │
//!    │ Reset (from any state but Reviewing)          │ SelectRange        │    │
//!    └───────────────────────────────────────────────┼──── Completed ◀────┘    │
//!                                                    └──── Failed    ◀─────────┘
//! ```
//!
//! Every event that does not fit the table is refused with
//! [`ReviewError::InvalidTransition`] and leaves the session untouched, so a
//! front end can forward user input verbatim.

use crate::config::{PageRange, ReviewConfig, DEFAULT_MAX_BATCH_PAGES};
use crate::error::ReviewError;
use crate::issue::Issue;
use crate::output::ReviewOutput;
use crate::pipeline::input::{self, ResolvedInput};
use crate::pipeline::render;
use crate::review::review_resolved;
use std::path::Path;
use tracing::{debug, info};

/// Rough wall-clock cost of reviewing one page, shown before a run.
pub const SECONDS_PER_PAGE: u64 = 20;

/// A document held by the session.
///
/// Uploaded documents are a private temp copy, deleted when the document is
/// dropped (replaced, reset, or the session ends).
#[derive(Debug)]
pub struct LoadedDocument {
    name: String,
    input: ResolvedInput,
    page_count: usize,
}

impl LoadedDocument {
    /// Wrap an already-resolved input whose page count is known.
    pub fn new(name: impl Into<String>, input: ResolvedInput, page_count: usize) -> Self {
        Self {
            name: name.into(),
            input,
            page_count,
        }
    }

    /// Open a document in place, e.g. the bundled sample deck.
    pub async fn open(path: impl AsRef<Path>, password: Option<&str>) -> Result<Self, ReviewError> {
        let path = path.as_ref();
        let resolved = input::resolve_input(path)?;
        let info = render::extract_metadata(resolved.path(), password).await?;
        let name = display_name(path);
        Ok(Self::new(name, resolved, info.page_count))
    }

    /// Take a private copy of uploaded bytes.
    pub async fn from_upload(
        name: impl Into<String>,
        bytes: &[u8],
        password: Option<&str>,
    ) -> Result<Self, ReviewError> {
        let resolved = input::resolve_bytes(bytes)?;
        let info = render::extract_metadata(resolved.path(), password).await?;
        Ok(Self::new(name, resolved, info.page_count))
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn page_count(&self) -> usize {
        self.page_count
    }

    pub fn path(&self) -> &Path {
        self.input.path()
    }
}

fn display_name(path: &Path) -> String {
    path.file_name()
        .map(|n| n.to_string_lossy().into_owned())
        .unwrap_or_else(|| path.display().to_string())
}

/// Where the session is in its lifecycle.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SessionState {
    Idle,
    DocumentLoaded,
    RangeSelected,
    Reviewing,
    Completed,
    Failed,
}

impl SessionState {
    pub fn as_str(&self) -> &'static str {
        match self {
            SessionState::Idle => "idle",
            SessionState::DocumentLoaded => "waiting for a page range",
            SessionState::RangeSelected => "ready to review",
            SessionState::Reviewing => "reviewing",
            SessionState::Completed => "showing results",
            SessionState::Failed => "showing an error",
        }
    }
}

/// Inputs to the session state machine.
#[derive(Debug)]
pub enum SessionEvent {
    LoadDocument(LoadedDocument),
    SelectRange { start: u32, end: u32 },
    StartReview,
    ReviewFinished(Vec<Issue>),
    ReviewFailed(String),
    Reset,
}

impl SessionEvent {
    fn verb(&self) -> &'static str {
        match self {
            SessionEvent::LoadDocument(_) => "load a document",
            SessionEvent::SelectRange { .. } => "select a page range",
            SessionEvent::StartReview => "start a review",
            SessionEvent::ReviewFinished(_) => "finish a review",
            SessionEvent::ReviewFailed(_) => "fail a review",
            SessionEvent::Reset => "reset",
        }
    }
}

/// One user's review session.
#[derive(Debug)]
pub struct Session {
    state: SessionState,
    document: Option<LoadedDocument>,
    range: Option<PageRange>,
    issues: Vec<Issue>,
    error: Option<String>,
    max_batch_pages: usize,
}

impl Default for Session {
    fn default() -> Self {
        Self::new(DEFAULT_MAX_BATCH_PAGES)
    }
}

impl Session {
    pub fn new(max_batch_pages: usize) -> Self {
        Self {
            state: SessionState::Idle,
            document: None,
            range: None,
            issues: Vec::new(),
            error: None,
            max_batch_pages,
        }
    }

    pub fn state(&self) -> SessionState {
        self.state
    }

    pub fn document(&self) -> Option<&LoadedDocument> {
        self.document.as_ref()
    }

    pub fn range(&self) -> Option<PageRange> {
        self.range
    }

    /// Issues of the last completed review; empty in every other state.
    pub fn issues(&self) -> &[Issue] {
        &self.issues
    }

    /// Message of the last failed review.
    pub fn error(&self) -> Option<&str> {
        self.error.as_deref()
    }

    pub fn max_batch_pages(&self) -> usize {
        self.max_batch_pages
    }

    /// Estimated review duration for the selected range, in seconds.
    pub fn estimated_review_secs(&self) -> Option<u64> {
        self.range.map(|r| r.len() as u64 * SECONDS_PER_PAGE)
    }

    /// Whether the selected range is larger than one review call may take.
    pub fn exceeds_batch_limit(&self) -> bool {
        self.range.is_some_and(|r| r.len() > self.max_batch_pages)
    }

    /// Apply one event. On error the session is left exactly as it was.
    pub fn apply(&mut self, event: SessionEvent) -> Result<SessionState, ReviewError> {
        use SessionState::*;

        let refuse = |state: SessionState, event: &SessionEvent| ReviewError::InvalidTransition {
            state: state.as_str(),
            event: event.verb(),
        };

        let next = match (self.state, event) {
            (Idle | DocumentLoaded | RangeSelected, SessionEvent::LoadDocument(doc)) => {
                info!("Loaded '{}' ({} pages)", doc.name, doc.page_count);
                self.document = Some(doc);
                self.range = None;
                self.clear_results();
                DocumentLoaded
            }
            (DocumentLoaded | RangeSelected | Completed | Failed, SessionEvent::SelectRange { start, end }) => {
                let range = PageRange::new(start, end);
                range.validate()?;
                let page_count = self.document.as_ref().map_or(0, |d| d.page_count);
                if end as usize > page_count {
                    return Err(ReviewError::InvalidPageRange {
                        start,
                        end,
                        reason: format!("the document has {} pages", page_count),
                    });
                }
                self.range = Some(range);
                self.clear_results();
                RangeSelected
            }
            (RangeSelected, SessionEvent::StartReview) => {
                if self.exceeds_batch_limit() {
                    return Err(ReviewError::BatchTooLarge {
                        requested: self.range.map_or(0, |r| r.len()),
                        max: self.max_batch_pages,
                    });
                }
                Reviewing
            }
            (Reviewing, SessionEvent::ReviewFinished(issues)) => {
                self.issues = issues;
                Completed
            }
            (Reviewing, SessionEvent::ReviewFailed(message)) => {
                self.error = Some(message);
                Failed
            }
            (Reviewing, event @ SessionEvent::Reset) => return Err(refuse(Reviewing, &event)),
            (_, SessionEvent::Reset) => {
                self.document = None;
                self.range = None;
                self.clear_results();
                Idle
            }
            (state, event) => return Err(refuse(state, &event)),
        };

        debug!("Session {:?} -> {:?}", self.state, next);
        self.state = next;
        Ok(next)
    }

    fn clear_results(&mut self) {
        self.issues.clear();
        self.error = None;
    }

    /// Review the selected range of the loaded document.
    ///
    /// Drives StartReview, the review itself, then ReviewFinished or
    /// ReviewFailed. `config.pages` is replaced by the session's range.
    pub async fn run_review(&mut self, config: &ReviewConfig) -> Result<ReviewOutput, ReviewError> {
        self.apply(SessionEvent::StartReview)?;

        let result = match (self.document.as_ref(), self.range) {
            (Some(doc), Some(range)) => {
                let mut config = config.clone();
                config.pages = range;
                review_resolved(&doc.input, &config).await
            }
            _ => Err(ReviewError::Internal(
                "review started without a document and range".into(),
            )),
        };

        match result {
            Ok(output) => {
                self.apply(SessionEvent::ReviewFinished(output.issues.clone()))?;
                Ok(output)
            }
            Err(e) => {
                self.apply(SessionEvent::ReviewFailed(e.to_string()))?;
                Err(e)
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::issue::{IssueType, Severity};

    fn doc(pages: usize) -> LoadedDocument {
        let input = input::resolve_bytes(b"%PDF-1.4\n%%EOF\n").unwrap();
        LoadedDocument::new("deck.pdf", input, pages)
    }

    fn ready(pages: usize, start: u32, end: u32) -> Session {
        let mut s = Session::default();
        s.apply(SessionEvent::LoadDocument(doc(pages))).unwrap();
        s.apply(SessionEvent::SelectRange { start, end }).unwrap();
        s
    }

    fn typo(page: u32) -> Issue {
        Issue {
            page,
            issue_type: IssueType::Typo,
            severity: Severity::Low,
            description: "Teh".into(),
            suggestion: "The".into(),
        }
    }

    #[test]
    fn happy_path() {
        let mut s = ready(10, 7, 8);
        assert_eq!(s.state(), SessionState::RangeSelected);
        assert_eq!(s.estimated_review_secs(), Some(40));
        assert_eq!(s.apply(SessionEvent::StartReview).unwrap(), SessionState::Reviewing);
        s.apply(SessionEvent::ReviewFinished(vec![typo(7)])).unwrap();
        assert_eq!(s.state(), SessionState::Completed);
        assert_eq!(s.issues(), &[typo(7)]);
    }

    #[test]
    fn review_without_range_is_refused() {
        let mut s = Session::default();
        s.apply(SessionEvent::LoadDocument(doc(3))).unwrap();
        let err = s.apply(SessionEvent::StartReview).unwrap_err();
        assert!(matches!(err, ReviewError::InvalidTransition { event: "start a review", .. }));
        assert_eq!(s.state(), SessionState::DocumentLoaded);
    }

    #[test]
    fn invalid_range_leaves_state_unchanged() {
        let mut s = ready(10, 2, 3);
        for (start, end) in [(5, 4), (0, 2), (9, 11)] {
            let err = s.apply(SessionEvent::SelectRange { start, end }).unwrap_err();
            assert!(matches!(err, ReviewError::InvalidPageRange { .. }), "{start}-{end}");
        }
        assert_eq!(s.state(), SessionState::RangeSelected);
        assert_eq!(s.range(), Some(PageRange::new(2, 3)));
    }

    #[test]
    fn oversized_range_is_refused() {
        let mut s = ready(20, 1, 6);
        assert!(s.exceeds_batch_limit());
        let err = s.apply(SessionEvent::StartReview).unwrap_err();
        assert_eq!(err.to_string(), "Please select no more than 5 pages (selected 6)");
        assert_eq!(s.state(), SessionState::RangeSelected);
    }

    #[test]
    fn reset_is_refused_while_reviewing() {
        let mut s = ready(10, 1, 1);
        s.apply(SessionEvent::StartReview).unwrap();
        assert!(s.apply(SessionEvent::Reset).is_err());
        assert_eq!(s.state(), SessionState::Reviewing);
    }

    #[test]
    fn failure_then_new_range() {
        let mut s = ready(10, 1, 2);
        s.apply(SessionEvent::StartReview).unwrap();
        s.apply(SessionEvent::ReviewFailed("429 rate limited".into())).unwrap();
        assert_eq!(s.state(), SessionState::Failed);
        assert_eq!(s.error(), Some("429 rate limited"));
        s.apply(SessionEvent::SelectRange { start: 3, end: 3 }).unwrap();
        assert_eq!(s.state(), SessionState::RangeSelected);
        assert_eq!(s.error(), None);
    }

    #[test]
    fn completed_session_must_reset_before_new_document() {
        let mut s = ready(4, 1, 1);
        s.apply(SessionEvent::StartReview).unwrap();
        s.apply(SessionEvent::ReviewFinished(Vec::new())).unwrap();
        assert!(s.apply(SessionEvent::LoadDocument(doc(2))).is_err());
        s.apply(SessionEvent::Reset).unwrap();
        assert_eq!(s.state(), SessionState::Idle);
        assert!(s.document().is_none());
        s.apply(SessionEvent::LoadDocument(doc(2))).unwrap();
        assert_eq!(s.document().map(|d| d.page_count()), Some(2));
    }

    #[test]
    fn reset_deletes_uploaded_copy() {
        let mut s = ready(3, 1, 1);
        let path = s.document().unwrap().path().to_path_buf();
        assert!(path.exists());
        s.apply(SessionEvent::Reset).unwrap();
        assert!(!path.exists());
    }

    #[test]
    fn finish_outside_review_is_refused() {
        let mut s = ready(3, 1, 1);
        let err = s.apply(SessionEvent::ReviewFinished(vec![typo(1)])).unwrap_err();
        assert_eq!(
            err.to_string(),
            "Cannot finish a review while the session is ready to review"
        );
        assert!(s.issues().is_empty());
    }

    #[tokio::test]
    async fn run_review_requires_a_selected_range() {
        let mut s = Session::default();
        let err = s.run_review(&ReviewConfig::default()).await.unwrap_err();
        assert!(matches!(err, ReviewError::InvalidTransition { .. }));
        assert_eq!(s.state(), SessionState::Idle);
    }
}
