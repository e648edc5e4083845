//! Page-description provider interface
//!
//! A provider turns document bytes into pages. Everything behind these traits
//! runs on the render worker thread, so only the [`DocumentProvider`] itself
//! has to be `Send`; documents and pages may hold thread-bound handles.

use std::sync::Arc;
use std::sync::atomic::{AtomicBool, Ordering};

use super::geometry::Viewport;
use super::surface::Surface;
use super::text_layer::GlyphRun;

/// Errors raised by a page-description provider
#[derive(Debug, Clone, PartialEq, thiserror::Error)]
pub enum ProviderError {
    #[error("document could not be opened: {detail}")]
    Load { detail: String },

    #[error("page {page} unavailable: {detail}")]
    PageFetch { page: usize, detail: String },

    #[error("rasterization failed: {detail}")]
    Render { detail: String },

    #[error("text content unavailable: {detail}")]
    TextContent { detail: String },

    /// The request was superseded; never reported to the user
    #[error("cancelled")]
    Cancelled,
}

impl ProviderError {
    pub fn load(detail: impl Into<String>) -> Self {
        Self::Load {
            detail: detail.into(),
        }
    }

    pub fn page_fetch(page: usize, detail: impl Into<String>) -> Self {
        Self::PageFetch {
            page,
            detail: detail.into(),
        }
    }

    pub fn render(detail: impl Into<String>) -> Self {
        Self::Render {
            detail: detail.into(),
        }
    }

    pub fn text_content(detail: impl Into<String>) -> Self {
        Self::TextContent {
            detail: detail.into(),
        }
    }
}

/// Cooperative cancellation flag shared between the owner and the worker
#[derive(Clone, Debug, Default)]
pub struct CancelToken(Arc<AtomicBool>);

impl CancelToken {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    pub fn cancel(&self) {
        self.0.store(true, Ordering::Release);
    }

    #[must_use]
    pub fn is_cancelled(&self) -> bool {
        self.0.load(Ordering::Acquire)
    }

    /// `Err(Cancelled)` once cancellation was requested
    pub fn check(&self) -> Result<(), ProviderError> {
        if self.is_cancelled() {
            Err(ProviderError::Cancelled)
        } else {
            Ok(())
        }
    }
}

/// Opens documents from raw bytes
pub trait DocumentProvider: Send + 'static {
    type Document: PageSource;

    fn open(&mut self, bytes: &[u8]) -> Result<Self::Document, ProviderError>;
}

/// An opened document
pub trait PageSource {
    type Page: PageHandle;

    fn page_count(&self) -> usize;

    /// Fetch a page by 1-based index
    fn get_page(&self, index: usize) -> Result<Self::Page, ProviderError>;
}

/// One decoded page
pub trait PageHandle {
    /// Page size and page-to-device transform at `scale`
    fn viewport(&self, scale: f32) -> Viewport;

    /// Paint the page into `surface`, whose current transform maps CSS
    /// pixels of `viewport` to backing pixels. Implementations should poll
    /// `cancel` between expensive steps.
    fn render(
        &self,
        surface: &mut Surface,
        viewport: &Viewport,
        cancel: &CancelToken,
    ) -> Result<(), ProviderError>;

    /// Ordered glyph runs in page space
    fn text_content(&self) -> Result<Vec<GlyphRun>, ProviderError>;
}
