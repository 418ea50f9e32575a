//! Output types returned by the review entry points.

use crate::issue::Issue;
use crate::pipeline::reconcile::ReplyShape;
use serde::Serialize;

/// Result of one review run.
#[derive(Debug, Clone, Serialize)]
pub struct ReviewOutput {
    /// Reconciled issues, in reply order.
    pub issues: Vec<Issue>,
    /// Pages that were actually rendered and sent, in request order.
    pub pages: Vec<u32>,
    pub document: DocumentInfo,
    /// The model's reply exactly as received.
    pub raw_reply: String,
    pub stats: ReviewStats,
}

impl ReviewOutput {
    /// True when the review found nothing to report.
    pub fn is_clean(&self) -> bool {
        self.issues.is_empty()
    }
}

/// PDF document metadata.
#[derive(Debug, Clone, Default, Serialize)]
pub struct DocumentInfo {
    pub title: Option<String>,
    pub author: Option<String>,
    pub subject: Option<String>,
    pub creator: Option<String>,
    pub producer: Option<String>,
    pub page_count: usize,
    pub pdf_version: String,
}

/// Statistics for a review run.
#[derive(Debug, Clone, Serialize)]
pub struct ReviewStats {
    /// Total pages in the document.
    pub total_pages: usize,
    /// Pages named by the configured range.
    pub requested_pages: usize,
    /// Pages rendered and sent for review.
    pub reviewed_pages: usize,
    /// Requested pages beyond the end of the document.
    pub skipped_pages: usize,
    pub issue_count: usize,
    pub input_tokens: u64,
    pub output_tokens: u64,
    pub render_duration_ms: u64,
    pub llm_duration_ms: u64,
    pub total_duration_ms: u64,
    /// Shape the reply was recognised as.
    pub reply_shape: ReplyShape,
}

impl ReviewStats {
    /// Whether the reply parsed into structured issues.
    pub fn reply_parsed(&self) -> bool {
        self.reply_shape != ReplyShape::Unparsed
    }
}
