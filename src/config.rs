//! Configuration types for slide review.
//!
//! All review behaviour is controlled through [`ReviewConfig`], built via its
//! [`ReviewConfigBuilder`]. Keeping every knob in one struct makes it trivial
//! to clone a config into an interactive session, log it, and diff two runs.

use crate::error::ReviewError;
use crate::pipeline::request::ReviewService;
use crate::progress::ProgressCallback;
use serde::{Deserialize, Serialize};
use std::fmt;
use std::sync::Arc;

/// First page reviewed when no explicit range is supplied (1-based).
pub const DEFAULT_PAGE_START: u32 = 7;
/// Last page reviewed when no explicit range is supplied (1-based, inclusive).
pub const DEFAULT_PAGE_END: u32 = 8;
/// Rasterisation resolution used when none is configured.
pub const DEFAULT_DPI: u32 = 200;
/// Recommended upper bound on pages per review call.
pub const DEFAULT_MAX_BATCH_PAGES: usize = 5;
/// Model used when neither the config nor the environment names one.
pub const DEFAULT_MODEL: &str = "gpt-5-mini";
/// Document reviewed by a scripted run when no path is given.
pub const DEFAULT_DOCUMENT: &str = "test1.pdf";
/// Sample deck offered by the interactive session.
pub const DEFAULT_SAMPLE_DOCUMENT: &str = "test_en.pdf";
/// Where a scripted run writes its CSV.
pub const DEFAULT_CSV_OUTPUT: &str = "review_issues.csv";

/// Configuration for a slide review run.
///
/// # Example
/// ```rust
/// use edgequake_slide_review::{PageRange, ReviewConfig};
///
/// let config = ReviewConfig::builder()
///     .dpi(200)
///     .pages(PageRange::new(1, 3))
///     .model("gpt-4.1-mini")
///     .build()
///     .unwrap();
/// assert_eq!(config.pages.len(), 3);
/// ```
#[derive(Clone)]
pub struct ReviewConfig {
    /// Rendering DPI used when rasterising each page. Range: 72–400. Default: 200.
    ///
    /// Slides use large type, but footnotes and chart labels are where most
    /// typos hide; 200 DPI keeps them legible to the model.
    pub dpi: u32,

    /// Maximum rendered image dimension (width or height) in pixels. Default: 2400.
    ///
    /// A safety cap independent of DPI so an oversized page cannot exhaust
    /// memory or exceed the provider's upload limit.
    pub max_rendered_pixels: u32,

    /// Pages to review (1-based, inclusive). Default: 7–8.
    pub pages: PageRange,

    /// Recommended maximum pages per review call. Default: 5.
    ///
    /// Controls cost and latency only. The pipeline logs a warning above it;
    /// the interactive session refuses to start a review above it.
    pub max_batch_pages: usize,

    /// LLM model identifier. If None, uses [`DEFAULT_MODEL`] or `EDGEQUAKE_MODEL`.
    pub model: Option<String>,

    /// LLM provider name (e.g. "openai", "anthropic", "gemini").
    /// If None along with `service`, the provider is auto-detected.
    pub provider_name: Option<String>,

    /// Pre-constructed review service. Takes precedence over `provider_name`.
    pub service: Option<Arc<dyn ReviewService>>,

    /// Sampling temperature. None leaves the provider default in place
    /// (some reasoning models reject anything else).
    pub temperature: Option<f32>,

    /// Maximum tokens the model may generate for the whole batch.
    pub max_tokens: Option<usize>,

    /// PDF user password for encrypted documents.
    pub password: Option<String>,

    /// Custom system prompt. If None, uses [`crate::prompts::DEFAULT_SYSTEM_PROMPT`].
    pub system_prompt: Option<String>,

    /// Custom review instructions. If None, uses [`crate::prompts::DEFAULT_REVIEW_PROMPT`].
    pub review_prompt: Option<String>,

    /// Receives render / review events. None disables progress reporting.
    pub progress_callback: Option<ProgressCallback>,
}

impl Default for ReviewConfig {
    fn default() -> Self {
        Self {
            dpi: DEFAULT_DPI,
            max_rendered_pixels: 2400,
            pages: PageRange::default(),
            max_batch_pages: DEFAULT_MAX_BATCH_PAGES,
            model: None,
            provider_name: None,
            service: None,
            temperature: None,
            max_tokens: None,
            password: None,
            system_prompt: None,
            review_prompt: None,
            progress_callback: None,
        }
    }
}

impl fmt::Debug for ReviewConfig {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ReviewConfig")
            .field("dpi", &self.dpi)
            .field("max_rendered_pixels", &self.max_rendered_pixels)
            .field("pages", &self.pages)
            .field("max_batch_pages", &self.max_batch_pages)
            .field("model", &self.model)
            .field("provider_name", &self.provider_name)
            .field("service", &self.service.as_ref().map(|_| "<dyn ReviewService>"))
            .field("temperature", &self.temperature)
            .field("max_tokens", &self.max_tokens)
            .field("password", &self.password.as_ref().map(|_| "<redacted>"))
            .field("system_prompt", &self.system_prompt.is_some())
            .field("review_prompt", &self.review_prompt.is_some())
            .finish()
    }
}

impl ReviewConfig {
    /// Create a new builder for `ReviewConfig`.
    pub fn builder() -> ReviewConfigBuilder {
        ReviewConfigBuilder {
            config: Self::default(),
        }
    }
}

/// Builder for [`ReviewConfig`].
#[derive(Debug)]
pub struct ReviewConfigBuilder {
    config: ReviewConfig,
}

impl ReviewConfigBuilder {
    pub fn dpi(mut self, dpi: u32) -> Self {
        self.config.dpi = dpi.clamp(72, 400);
        self
    }

    pub fn max_rendered_pixels(mut self, px: u32) -> Self {
        self.config.max_rendered_pixels = px.max(100);
        self
    }

    pub fn pages(mut self, range: PageRange) -> Self {
        self.config.pages = range;
        self
    }

    pub fn max_batch_pages(mut self, n: usize) -> Self {
        self.config.max_batch_pages = n.max(1);
        self
    }

    pub fn model(mut self, model: impl Into<String>) -> Self {
        self.config.model = Some(model.into());
        self
    }

    pub fn provider_name(mut self, name: impl Into<String>) -> Self {
        self.config.provider_name = Some(name.into());
        self
    }

    pub fn service(mut self, service: Arc<dyn ReviewService>) -> Self {
        self.config.service = Some(service);
        self
    }

    pub fn temperature(mut self, t: f32) -> Self {
        self.config.temperature = Some(t.clamp(0.0, 2.0));
        self
    }

    pub fn max_tokens(mut self, n: usize) -> Self {
        self.config.max_tokens = Some(n);
        self
    }

    pub fn password(mut self, pwd: impl Into<String>) -> Self {
        self.config.password = Some(pwd.into());
        self
    }

    pub fn system_prompt(mut self, prompt: impl Into<String>) -> Self {
        self.config.system_prompt = Some(prompt.into());
        self
    }

    pub fn review_prompt(mut self, prompt: impl Into<String>) -> Self {
        self.config.review_prompt = Some(prompt.into());
        self
    }

    pub fn progress_callback(mut self, cb: ProgressCallback) -> Self {
        self.config.progress_callback = Some(cb);
        self
    }

    /// Build the configuration, validating constraints.
    pub fn build(self) -> Result<ReviewConfig, ReviewError> {
        let c = &self.config;
        if c.dpi < 72 || c.dpi > 400 {
            return Err(ReviewError::InvalidConfig(format!(
                "DPI must be 72–400, got {}",
                c.dpi
            )));
        }
        c.pages.validate()?;
        Ok(self.config)
    }
}

// ── Page range ───────────────────────────────────────────────────────────

/// An inclusive, 1-based page range.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct PageRange {
    pub start: u32,
    pub end: u32,
}

impl Default for PageRange {
    fn default() -> Self {
        Self {
            start: DEFAULT_PAGE_START,
            end: DEFAULT_PAGE_END,
        }
    }
}

impl fmt::Display for PageRange {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}-{}", self.start, self.end)
    }
}

impl PageRange {
    pub fn new(start: u32, end: u32) -> Self {
        Self { start, end }
    }

    /// Number of pages the range spans, ignoring the document length.
    pub fn len(&self) -> usize {
        if self.end < self.start {
            0
        } else {
            (u64::from(self.end) - u64::from(self.start) + 1) as usize
        }
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Reject ranges that can never be valid: pages are 1-based and the
    /// end is inclusive, so `start >= 1` and `end >= start`.
    pub fn validate(&self) -> Result<(), ReviewError> {
        if self.start < 1 {
            return Err(ReviewError::InvalidPageRange {
                start: self.start,
                end: self.end,
                reason: "pages are 1-indexed, minimum is 1".into(),
            });
        }
        if self.end < self.start {
            return Err(ReviewError::InvalidPageRange {
                start: self.start,
                end: self.end,
                reason: "end page must be >= start page".into(),
            });
        }
        Ok(())
    }

    /// The 1-based page numbers of this range that exist in a document of
    /// `total_pages` pages. Pages past the end are dropped silently.
    pub fn page_numbers(&self, total_pages: usize) -> Vec<u32> {
        let last = (self.end as usize).min(total_pages);
        (self.start.max(1) as usize..=last)
            .map(|p| p as u32)
            .collect()
    }
}
