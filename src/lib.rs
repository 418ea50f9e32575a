//! # edgequake-slide-review
//!
//! Review slide decks with a Vision Language Model: render selected PDF
//! pages, send them in one multimodal request, and get back a list of
//! structured issues (formatting, logic, typos) per page.
//!
//! ## Pipeline Overview
//!
//! ```text
//! PDF
//!  │
//!  ├─ 1. Input      validate the path, or spool uploaded bytes to a temp file
//!  ├─ 2. Render     rasterise the page range via pdfium (spawn_blocking)
//!  ├─ 3. Encode     PNG → base64 ImageData
//!  ├─ 4. Request    one call carrying every page image
//!  ├─ 5. Reconcile  whatever JSON shape came back → Vec<Issue>
//!  └─ 6. Report     console table, CSV with BOM
//! ```
//!
//! ## Quick Start
//!
//! ```rust,no_run
//! use edgequake_slide_review::{review, PageRange, ReviewConfig};
//!
//! #[tokio::main]
//! async fn main() -> Result<(), Box<dyn std::error::Error>> {
//!     let config = ReviewConfig::builder().pages(PageRange::new(1, 3)).build()?;
//!     let output = review("deck.pdf", &config).await?;
//!     for issue in &output.issues {
//!         println!("p{} [{}/{}] {}", issue.page, issue.issue_type, issue.severity, issue.description);
//!     }
//!     Ok(())
//! }
//! ```
//!
//! ## Feature Flags
//!
//! | Feature | Default | Description |
//! |---------|---------|-------------|
//! | `cli`   | on      | Enables the `slide-review` binary (clap + anyhow + indicatif + tracing-subscriber) |

// ── Modules ──────────────────────────────────────────────────────────────

pub mod config;
pub mod error;
pub mod issue;
pub mod output;
pub mod pipeline;
pub mod progress;
pub mod prompts;
pub mod report;
pub mod review;
pub mod session;

// ── Re-exports ───────────────────────────────────────────────────────────

pub use config::{PageRange, ReviewConfig, ReviewConfigBuilder};
pub use error::ReviewError;
pub use issue::{Issue, IssueType, Severity};
pub use output::{DocumentInfo, ReviewOutput, ReviewStats};
pub use pipeline::reconcile::{reconcile, ReplyShape};
pub use pipeline::request::{LlmReviewService, ReviewRequest, ReviewService, ServiceReply};
pub use progress::{NoopProgressCallback, ProgressCallback, ReviewProgressCallback};
pub use report::{read_csv, render_table, to_csv_bytes, write_csv};
pub use review::{inspect, review, review_from_bytes, review_sync, review_to_csv};
pub use session::{LoadedDocument, Session, SessionEvent, SessionState};
