//! Pipeline stages for reviewing slide pages.
//!
//! Each submodule implements exactly one step, so every stage can be tested
//! on its own and the network-facing one can be replaced in tests.
//!
//! ## Data Flow
//!
//! ```text
//! input ──▶ render ──▶ encode ──▶ request ──▶ cleanup ──▶ reconcile
//! (path)    (pdfium)   (base64)   (VLM)       (fences)    (issues)
//! ```
//!
//! 1. [`input`]     : check the path (or spool uploaded bytes) to a local PDF
//! 2. [`render`]    : rasterise the selected pages in `spawn_blocking`
//! 3. [`encode`]    : PNG + base64 for the multimodal request body
//! 4. [`request`]   : one review call per batch; the only stage with network I/O
//! 5. [`cleanup`]   : strip code fences and invisible characters from the reply
//! 6. [`reconcile`] : map whatever shape the reply has onto [`crate::Issue`]

pub mod cleanup;
pub mod encode;
pub mod input;
pub mod reconcile;
pub mod render;
pub mod request;
