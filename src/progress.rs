//! Progress-callback trait for review events.
//!
//! Inject an [`Arc<dyn ReviewProgressCallback>`] via
//! [`crate::config::ReviewConfigBuilder::progress_callback`] to follow a run:
//! rendering each page, then the single review call. The CLI forwards these
//! events to a terminal spinner; library callers can forward them anywhere.
//!
//! # Example
//!
//! ```rust
//! use edgequake_slide_review::{ReviewConfig, ReviewProgressCallback};
//! use std::sync::{Arc, atomic::{AtomicUsize, Ordering}};
//!
//! struct CountingCallback {
//!     rendered: AtomicUsize,
//! }
//!
//! impl ReviewProgressCallback for CountingCallback {
//!     fn on_page_rendered(&self, page_num: u32, _total: usize) {
//!         self.rendered.fetch_add(1, Ordering::SeqCst);
//!         eprintln!("rendered page {page_num}");
//!     }
//! }
//!
//! let cb = Arc::new(CountingCallback { rendered: AtomicUsize::new(0) });
//! let config = ReviewConfig::builder()
//!     .progress_callback(cb as Arc<dyn ReviewProgressCallback>)
//!     .build()
//!     .unwrap();
//! ```

use std::sync::Arc;

/// Called by the review pipeline as it works through a batch.
///
/// All methods have default no-op implementations so callers only override
/// what they care about. `Send + Sync` because rendering happens on a
/// blocking thread and the callback crosses into it.
pub trait ReviewProgressCallback: Send + Sync {
    /// Called once before rasterisation starts.
    ///
    /// # Arguments
    /// * `total_pages`: number of in-range pages that will be rendered
    fn on_render_start(&self, total_pages: usize) {
        let _ = total_pages;
    }

    /// Called after each page is rasterised.
    fn on_page_rendered(&self, page_num: u32, total_pages: usize) {
        let _ = (page_num, total_pages);
    }

    /// Called just before the review request is sent.
    ///
    /// # Arguments
    /// * `pages`: 1-based page numbers in the batch, in request order
    fn on_review_start(&self, pages: &[u32]) {
        let _ = pages;
    }

    /// Called when the reply has been reconciled into issues.
    fn on_review_complete(&self, issue_count: usize) {
        let _ = issue_count;
    }

    /// Called when the review call fails. The run ends right after.
    fn on_review_error(&self, error: String) {
        let _ = error;
    }
}

/// A no-op implementation for callers that don't need progress events.
pub struct NoopProgressCallback;

impl ReviewProgressCallback for NoopProgressCallback {}

/// Convenience alias matching the type stored in [`crate::config::ReviewConfig`].
pub type ProgressCallback = Arc<dyn ReviewProgressCallback>;

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::atomic::{AtomicUsize, Ordering};
    use std::sync::Mutex;

    #[derive(Default)]
    struct TrackingCallback {
        rendered: AtomicUsize,
        review_pages: Mutex<Vec<u32>>,
        issues: AtomicUsize,
        errors: Mutex<Vec<String>>,
    }

    impl ReviewProgressCallback for TrackingCallback {
        fn on_page_rendered(&self, _page_num: u32, _total: usize) {
            self.rendered.fetch_add(1, Ordering::SeqCst);
        }

        fn on_review_start(&self, pages: &[u32]) {
            self.review_pages.lock().unwrap().extend_from_slice(pages);
        }

        fn on_review_complete(&self, issue_count: usize) {
            self.issues.store(issue_count, Ordering::SeqCst);
        }

        fn on_review_error(&self, error: String) {
            self.errors.lock().unwrap().push(error);
        }
    }

    #[test]
    fn noop_callback_does_not_panic() {
        let cb = NoopProgressCallback;
        cb.on_render_start(2);
        cb.on_page_rendered(7, 2);
        cb.on_review_start(&[7, 8]);
        cb.on_review_complete(3);
        cb.on_review_error("boom".into());
    }

    #[test]
    fn tracking_callback_receives_events() {
        let tracker = TrackingCallback::default();
        tracker.on_render_start(2);
        tracker.on_page_rendered(7, 2);
        tracker.on_page_rendered(8, 2);
        tracker.on_review_start(&[7, 8]);
        tracker.on_review_complete(4);

        assert_eq!(tracker.rendered.load(Ordering::SeqCst), 2);
        assert_eq!(*tracker.review_pages.lock().unwrap(), vec![7, 8]);
        assert_eq!(tracker.issues.load(Ordering::SeqCst), 4);
        assert!(tracker.errors.lock().unwrap().is_empty());
    }

    #[test]
    fn arc_dyn_callback_moves_into_spawned_task() {
        let cb: ProgressCallback = Arc::new(NoopProgressCallback);
        std::thread::spawn(move || cb.on_review_error("timeout".to_string()))
            .join()
            .expect("thread must not panic");
    }
}
