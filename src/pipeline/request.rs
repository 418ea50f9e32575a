//! Review request: one multimodal call per batch of pages.
//!
//! All images of the batch travel in a single user turn, after the review
//! instructions, so the model can compare slides with each other (repeated
//! typos, inconsistent styling across pages). There is no retry: a failed
//! call fails the run and no partial results are returned.
//!
//! The call goes through the [`ReviewService`] trait. [`LlmReviewService`]
//! adapts any `edgequake_llm` provider; tests and embedding applications can
//! supply their own implementation through
//! [`crate::config::ReviewConfigBuilder::service`].

use super::encode::EncodedPage;
use crate::config::ReviewConfig;
use crate::error::ReviewError;
use crate::prompts::{review_message, DEFAULT_REVIEW_PROMPT, DEFAULT_SYSTEM_PROMPT};
use async_trait::async_trait;
use edgequake_llm::{ChatMessage, CompletionOptions, ImageData, LLMProvider};
use std::sync::Arc;
use std::time::Instant;
use tracing::{debug, info, warn};

/// Everything the review service needs for one batch.
#[derive(Debug, Clone)]
pub struct ReviewRequest {
    pub system_prompt: String,
    /// Review instructions plus the page list of the attached images.
    pub prompt: String,
    /// 1-based page numbers, in the same order as `images`.
    pub pages: Vec<u32>,
    pub images: Vec<ImageData>,
    pub temperature: Option<f32>,
    pub max_tokens: Option<usize>,
}

/// The raw reply of one review call.
#[derive(Debug, Clone, Default)]
pub struct ServiceReply {
    pub content: String,
    pub input_tokens: usize,
    pub output_tokens: usize,
}

/// A backend able to answer a review request.
#[async_trait]
pub trait ReviewService: Send + Sync {
    /// Short name used in logs and error messages.
    fn name(&self) -> &str;

    /// Send one request and return the model's raw text.
    async fn review(&self, request: &ReviewRequest) -> Result<ServiceReply, ReviewError>;
}

/// [`ReviewService`] backed by an `edgequake_llm` chat provider.
pub struct LlmReviewService {
    name: String,
    provider: Arc<dyn LLMProvider>,
}

impl LlmReviewService {
    pub fn new(name: impl Into<String>, provider: Arc<dyn LLMProvider>) -> Self {
        Self {
            name: name.into(),
            provider,
        }
    }
}

#[async_trait]
impl ReviewService for LlmReviewService {
    fn name(&self) -> &str {
        &self.name
    }

    /// Message layout: system prompt, then one user message carrying the
    /// instructions and every page image.
    async fn review(&self, request: &ReviewRequest) -> Result<ServiceReply, ReviewError> {
        let messages = vec![
            ChatMessage::system(request.system_prompt.as_str()),
            ChatMessage::user_with_images(request.prompt.as_str(), request.images.clone()),
        ];

        let options = CompletionOptions {
            temperature: request.temperature,
            max_tokens: request.max_tokens,
            ..Default::default()
        };

        let response = self
            .provider
            .chat(&messages, Some(&options))
            .await
            .map_err(|e| ReviewError::LlmApiError {
                message: format!("{}: {}", self.name, e),
            })?;

        Ok(ServiceReply {
            content: response.content,
            input_tokens: response.prompt_tokens as usize,
            output_tokens: response.completion_tokens as usize,
        })
    }
}

/// Build the request for a batch without sending it.
pub fn build_request(batch: &[EncodedPage], config: &ReviewConfig) -> ReviewRequest {
    let pages: Vec<u32> = batch.iter().map(|p| p.page).collect();
    let instructions = config
        .review_prompt
        .as_deref()
        .unwrap_or(DEFAULT_REVIEW_PROMPT);

    ReviewRequest {
        system_prompt: config
            .system_prompt
            .clone()
            .unwrap_or_else(|| DEFAULT_SYSTEM_PROMPT.to_string()),
        prompt: review_message(instructions, &pages),
        images: batch.iter().map(|p| p.image.clone()).collect(),
        pages,
        temperature: config.temperature,
        max_tokens: config.max_tokens,
    }
}

/// Send one batch for review and return the raw reply.
///
/// The batch must be non-empty. Batches above `config.max_batch_pages`
/// are still sent; the limit only exists to keep cost and latency down.
pub async fn send_batch(
    service: &Arc<dyn ReviewService>,
    batch: &[EncodedPage],
    config: &ReviewConfig,
) -> Result<ServiceReply, ReviewError> {
    let (first, last) = match (batch.first(), batch.last()) {
        (Some(f), Some(l)) => (f.page, l.page),
        _ => {
            return Err(ReviewError::EmptyBatch {
                start: config.pages.start,
                end: config.pages.end,
                total: 0,
            })
        }
    };

    if batch.len() > config.max_batch_pages {
        warn!(
            "Batch of {} pages exceeds the recommended maximum of {}",
            batch.len(),
            config.max_batch_pages
        );
    }

    let request = build_request(batch, config);
    info!(
        "Reviewing pages {}-{} ({} images) with {}",
        first,
        last,
        request.images.len(),
        service.name()
    );

    let start = Instant::now();
    let reply = service.review(&request).await?;
    debug!(
        "Review reply: {} input tokens, {} output tokens, {} chars, {:?}",
        reply.input_tokens,
        reply.output_tokens,
        reply.content.len(),
        start.elapsed()
    );

    Ok(reply)
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::Mutex;

    struct Recorder {
        seen: Mutex<Vec<ReviewRequest>>,
        reply: Result<String, String>,
    }

    #[async_trait]
    impl ReviewService for Recorder {
        fn name(&self) -> &str {
            "recorder"
        }

        async fn review(&self, request: &ReviewRequest) -> Result<ServiceReply, ReviewError> {
            self.seen.lock().unwrap().push(request.clone());
            match &self.reply {
                Ok(content) => Ok(ServiceReply {
                    content: content.clone(),
                    input_tokens: 100,
                    output_tokens: 20,
                }),
                Err(message) => Err(ReviewError::LlmApiError {
                    message: message.clone(),
                }),
            }
        }
    }

    fn page(n: u32) -> EncodedPage {
        EncodedPage {
            page: n,
            image: ImageData::new(format!("aW1n{n}"), "image/png"),
        }
    }

    #[test]
    fn build_request_keeps_page_order() {
        let config = ReviewConfig::default();
        let req = build_request(&[page(7), page(8)], &config);
        assert_eq!(req.pages, vec![7, 8]);
        assert_eq!(req.images.len(), 2);
        assert_eq!(req.images[1].data, "aW1n8");
        assert_eq!(req.system_prompt, DEFAULT_SYSTEM_PROMPT);
        assert!(req.prompt.starts_with(DEFAULT_REVIEW_PROMPT));
        assert!(req.prompt.contains("pages 7, 8"));
    }

    #[test]
    fn build_request_honours_overrides() {
        let config = ReviewConfig::builder()
            .system_prompt("Be terse.")
            .review_prompt("Only typos.")
            .temperature(0.2)
            .max_tokens(1024)
            .build()
            .unwrap();
        let req = build_request(&[page(1)], &config);
        assert_eq!(req.system_prompt, "Be terse.");
        assert!(req.prompt.starts_with("Only typos."));
        assert_eq!(req.temperature, Some(0.2));
        assert_eq!(req.max_tokens, Some(1024));
    }

    #[tokio::test]
    async fn send_batch_makes_one_call() {
        let recorder = Arc::new(Recorder {
            seen: Mutex::new(Vec::new()),
            reply: Ok("[]".into()),
        });
        let service: Arc<dyn ReviewService> = recorder.clone();
        let reply = send_batch(&service, &[page(3), page(4)], &ReviewConfig::default())
            .await
            .unwrap();
        assert_eq!(reply.content, "[]");
        assert_eq!(recorder.seen.lock().unwrap().len(), 1);
    }

    #[tokio::test]
    async fn send_batch_rejects_empty_batch() {
        let service: Arc<dyn ReviewService> = Arc::new(Recorder {
            seen: Mutex::new(Vec::new()),
            reply: Ok("[]".into()),
        });
        let err = send_batch(&service, &[], &ReviewConfig::default())
            .await
            .unwrap_err();
        assert!(matches!(err, ReviewError::EmptyBatch { .. }));
    }

    #[tokio::test]
    async fn service_errors_propagate() {
        let service: Arc<dyn ReviewService> = Arc::new(Recorder {
            seen: Mutex::new(Vec::new()),
            reply: Err("429 rate limited".into()),
        });
        let err = send_batch(&service, &[page(1)], &ReviewConfig::default())
            .await
            .unwrap_err();
        assert!(err.to_string().contains("429"));
    }
}
