//! Review entry points.
//!
//! A run is strictly sequential: open the document, render the selected
//! pages, send them in one request, reconcile the reply. Nothing is retried
//! and a failed call returns no partial results.

use crate::config::{ReviewConfig, DEFAULT_MODEL};
use crate::error::ReviewError;
use crate::issue::Issue;
use crate::output::{DocumentInfo, ReviewOutput, ReviewStats};
use crate::pipeline::encode;
use crate::pipeline::input::{self, ResolvedInput};
use crate::pipeline::reconcile::{reconcile_reply, ReplyShape};
use crate::pipeline::render::{self, PageImage};
use crate::pipeline::request::{send_batch, LlmReviewService, ReviewService};
use crate::report;
use edgequake_llm::{LLMProvider, ProviderFactory};
use std::path::Path;
use std::sync::Arc;
use std::time::Instant;
use tracing::{debug, info};

/// Review the configured page range of a PDF file.
///
/// # Errors
/// Fatal input errors (missing file, not a PDF, password, empty range),
/// provider setup errors and the review call's own failure. A reply that
/// cannot be parsed is *not* an error; see [`crate::pipeline::reconcile`].
pub async fn review(
    path: impl AsRef<Path>,
    config: &ReviewConfig,
) -> Result<ReviewOutput, ReviewError> {
    let resolved = input::resolve_input(path)?;
    review_resolved(&resolved, config).await
}

/// Review PDF bytes held in memory.
///
/// The bytes are copied to a managed temp file that is removed when this
/// function returns, whatever the outcome.
pub async fn review_from_bytes(
    bytes: &[u8],
    config: &ReviewConfig,
) -> Result<ReviewOutput, ReviewError> {
    let resolved = input::resolve_bytes(bytes)?;
    review_resolved(&resolved, config).await
}

/// Review a PDF and write the issues as CSV to `csv_path`.
///
/// The CSV is written atomically (temp file + rename).
pub async fn review_to_csv(
    path: impl AsRef<Path>,
    csv_path: impl AsRef<Path>,
    config: &ReviewConfig,
) -> Result<ReviewOutput, ReviewError> {
    let output = review(path, config).await?;
    report::write_csv(csv_path.as_ref(), &output.issues)?;
    Ok(output)
}

/// Synchronous wrapper around [`review`].
///
/// Creates a temporary tokio runtime internally.
pub fn review_sync(
    path: impl AsRef<Path>,
    config: &ReviewConfig,
) -> Result<ReviewOutput, ReviewError> {
    tokio::runtime::Runtime::new()
        .map_err(|e| ReviewError::Internal(format!("Failed to create tokio runtime: {}", e)))?
        .block_on(review(path, config))
}

/// Read PDF metadata without contacting the review service.
pub async fn inspect(
    path: impl AsRef<Path>,
    password: Option<&str>,
) -> Result<DocumentInfo, ReviewError> {
    let resolved = input::resolve_input(path)?;
    render::extract_metadata(resolved.path(), password).await
}

/// Review an already-resolved input.
pub async fn review_resolved(
    resolved: &ResolvedInput,
    config: &ReviewConfig,
) -> Result<ReviewOutput, ReviewError> {
    let total_start = Instant::now();
    let pdf_path = resolved.path();
    info!("Starting review: {} (pages {})", pdf_path.display(), config.pages);

    let service = resolve_service(config)?;

    let document = render::extract_metadata(pdf_path, config.password.as_deref()).await?;
    let total_pages = document.page_count;

    let requested = config.pages.len();
    let pages = config.pages.page_numbers(total_pages);
    if pages.is_empty() {
        return Err(ReviewError::EmptyBatch {
            start: config.pages.start,
            end: config.pages.end,
            total: total_pages,
        });
    }
    debug!("Selected pages {:?} of {}", pages, total_pages);

    let render_start = Instant::now();
    let images = render::render_pages(pdf_path, config, &pages).await?;
    let render_duration_ms = render_start.elapsed().as_millis() as u64;
    info!("Rendered {} pages in {}ms", images.len(), render_duration_ms);

    let batch = review_batch(&service, &images, config).await?;

    let stats = ReviewStats {
        total_pages,
        requested_pages: requested,
        reviewed_pages: images.len(),
        skipped_pages: requested.saturating_sub(images.len()),
        issue_count: batch.issues.len(),
        input_tokens: batch.input_tokens as u64,
        output_tokens: batch.output_tokens as u64,
        render_duration_ms,
        llm_duration_ms: batch.llm_duration_ms,
        total_duration_ms: total_start.elapsed().as_millis() as u64,
        reply_shape: batch.shape,
    };

    info!(
        "Review complete: {} issues on {} pages, {}ms total",
        stats.issue_count, stats.reviewed_pages, stats.total_duration_ms
    );

    Ok(ReviewOutput {
        issues: batch.issues,
        pages: images.iter().map(|p| p.page).collect(),
        document,
        raw_reply: batch.raw_reply,
        stats,
    })
}

/// Outcome of reviewing one batch of rendered pages.
#[derive(Debug, Clone)]
pub struct BatchReview {
    pub issues: Vec<Issue>,
    pub shape: ReplyShape,
    pub raw_reply: String,
    pub input_tokens: usize,
    pub output_tokens: usize,
    pub llm_duration_ms: u64,
}

/// Encode, send and reconcile one batch of rendered pages.
pub async fn review_batch(
    service: &Arc<dyn ReviewService>,
    images: &[PageImage],
    config: &ReviewConfig,
) -> Result<BatchReview, ReviewError> {
    let encoded = images
        .iter()
        .map(|img| {
            encode::encode_page(img).map_err(|e| ReviewError::RasterisationFailed {
                page: img.page,
                detail: format!("Image encoding failed: {}", e),
            })
        })
        .collect::<Result<Vec<_>, _>>()?;
    let pages: Vec<u32> = encoded.iter().map(|p| p.page).collect();

    if let Some(ref cb) = config.progress_callback {
        cb.on_review_start(&pages);
    }

    let llm_start = Instant::now();
    let reply = match send_batch(service, &encoded, config).await {
        Ok(reply) => reply,
        Err(e) => {
            if let Some(ref cb) = config.progress_callback {
                cb.on_review_error(e.to_string());
            }
            return Err(e);
        }
    };
    let llm_duration_ms = llm_start.elapsed().as_millis() as u64;

    let reconciled = reconcile_reply(&reply.content, &pages);

    if let Some(ref cb) = config.progress_callback {
        cb.on_review_complete(reconciled.issues.len());
    }

    Ok(BatchReview {
        issues: reconciled.issues,
        shape: reconciled.shape,
        raw_reply: reply.content,
        input_tokens: reply.input_tokens,
        output_tokens: reply.output_tokens,
        llm_duration_ms,
    })
}

// ── Provider resolution ──────────────────────────────────────────────────

fn create_vision_provider(
    provider_name: &str,
    model: &str,
) -> Result<Arc<dyn LLMProvider>, ReviewError> {
    ProviderFactory::create_llm_provider(provider_name, model).map_err(|e| {
        ReviewError::ProviderNotConfigured {
            provider: provider_name.to_string(),
            hint: format!("{e}"),
        }
    })
}

fn wrap(name: &str, provider: Arc<dyn LLMProvider>) -> Arc<dyn ReviewService> {
    Arc::new(LlmReviewService::new(name, provider))
}

/// Resolve the review service, from most-specific to least-specific:
///
/// 1. `config.service`, used as-is (tests, custom middleware).
/// 2. `config.provider_name` with `config.model` (or [`DEFAULT_MODEL`]).
/// 3. `EDGEQUAKE_LLM_PROVIDER` + `EDGEQUAKE_MODEL`, when both are set.
/// 4. OpenAI when `OPENAI_API_KEY` is set.
/// 5. Whatever [`ProviderFactory::from_env`] detects.
pub fn resolve_service(config: &ReviewConfig) -> Result<Arc<dyn ReviewService>, ReviewError> {
    if let Some(ref service) = config.service {
        return Ok(Arc::clone(service));
    }

    let model = config.model.as_deref().unwrap_or(DEFAULT_MODEL);

    if let Some(ref name) = config.provider_name {
        return Ok(wrap(name, create_vision_provider(name, model)?));
    }

    if let (Ok(prov), Ok(env_model)) = (
        std::env::var("EDGEQUAKE_LLM_PROVIDER"),
        std::env::var("EDGEQUAKE_MODEL"),
    ) {
        if !prov.is_empty() && !env_model.is_empty() {
            let model = config.model.as_deref().unwrap_or(&env_model);
            return Ok(wrap(&prov, create_vision_provider(&prov, model)?));
        }
    }

    if let Ok(openai_key) = std::env::var("OPENAI_API_KEY") {
        if !openai_key.is_empty() {
            return Ok(wrap("openai", create_vision_provider("openai", model)?));
        }
    }

    let (llm_provider, _embedding) =
        ProviderFactory::from_env().map_err(|e| ReviewError::ProviderNotConfigured {
            provider: "auto".to_string(),
            hint: format!(
                "No LLM provider could be auto-detected from environment.\n\
                Set OPENAI_API_KEY, ANTHROPIC_API_KEY, or configure a provider.\n\
                Error: {}",
                e
            ),
        })?;

    Ok(wrap("auto", llm_provider))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::issue::{IssueType, Severity};
    use crate::pipeline::request::{ReviewRequest, ServiceReply};
    use async_trait::async_trait;
    use image::{DynamicImage, Rgba, RgbaImage};
    use std::sync::Mutex;

    struct Scripted {
        reply: String,
        calls: Mutex<Vec<Vec<u32>>>,
    }

    #[async_trait]
    impl ReviewService for Scripted {
        fn name(&self) -> &str {
            "scripted"
        }

        async fn review(&self, request: &ReviewRequest) -> Result<ServiceReply, ReviewError> {
            self.calls.lock().unwrap().push(request.pages.clone());
            Ok(ServiceReply {
                content: self.reply.clone(),
                input_tokens: 1200,
                output_tokens: 80,
            })
        }
    }

    fn blank(page: u32) -> PageImage {
        PageImage {
            page,
            image: DynamicImage::ImageRgba8(RgbaImage::from_pixel(8, 6, Rgba([255, 255, 255, 255]))),
        }
    }

    #[test]
    fn review_batch_reconciles_against_batch_pages() {
        let scripted = Arc::new(Scripted {
            reply: r#"[{"page": 8, "issue_type": "typo", "severity": "low", "description": "Teh", "suggestion": "The"},
                       {"page": 42, "issue_type": "logic", "severity": "high", "description": "Totals differ", "suggestion": ""}]"#
                .into(),
            calls: Mutex::new(Vec::new()),
        });
        let service: Arc<dyn ReviewService> = scripted.clone();
        let config = ReviewConfig::default();

        let batch = tokio_test::block_on(review_batch(&service, &[blank(7), blank(8)], &config)).unwrap();

        assert_eq!(*scripted.calls.lock().unwrap(), vec![vec![7, 8]]);
        assert_eq!(batch.shape, ReplyShape::Flat);
        assert_eq!(batch.issues.len(), 2);
        assert_eq!(batch.issues[0].page, 8);
        assert_eq!(batch.issues[0].issue_type, IssueType::Typo);
        assert_eq!(batch.issues[1].page, 7);
        assert_eq!(batch.issues[1].severity, Severity::High);
        assert_eq!(batch.input_tokens, 1200);
    }

    #[test]
    fn prebuilt_service_wins() {
        let service: Arc<dyn ReviewService> = Arc::new(Scripted {
            reply: "[]".into(),
            calls: Mutex::new(Vec::new()),
        });
        let config = ReviewConfig::builder()
            .service(service)
            .provider_name("definitely-not-a-provider")
            .build()
            .unwrap();
        let resolved = resolve_service(&config).unwrap();
        assert_eq!(resolved.name(), "scripted");
    }

    #[tokio::test]
    async fn review_of_missing_file_fails_before_any_call() {
        let scripted = Arc::new(Scripted {
            reply: "[]".into(),
            calls: Mutex::new(Vec::new()),
        });
        let config = ReviewConfig::builder()
            .service(scripted.clone() as Arc<dyn ReviewService>)
            .build()
            .unwrap();
        let err = review("/no/such/deck.pdf", &config).await.unwrap_err();
        assert!(matches!(err, ReviewError::FileNotFound { .. }));
        assert!(scripted.calls.lock().unwrap().is_empty());
    }
}
