//! Worker request and response types

use super::geometry::Viewport;
use super::provider::{CancelToken, ProviderError};
use super::surface::Surface;
use super::text_layer::GlyphRun;

/// Unique identifier for worker requests
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct RequestId(pub u64);

impl RequestId {
    #[must_use]
    pub const fn new(id: u64) -> Self {
        Self(id)
    }
}

impl std::fmt::Display for RequestId {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "#{}", self.0)
    }
}

/// Request sent to the render worker
#[derive(Debug)]
pub enum WorkerRequest {
    /// Open a document, replacing the current one
    Load { id: RequestId, bytes: Vec<u8> },

    /// Report a page's intrinsic height for fit-to-height
    Measure { id: RequestId, page: usize },

    /// Rasterize a page into a fresh back buffer
    Render {
        id: RequestId,
        page: usize,
        scale: f32,
        device_pixel_ratio: f32,
        cancel: CancelToken,
    },

    /// Fetch glyph runs for a page
    TextContent {
        id: RequestId,
        page: usize,
        scale: f32,
        cancel: CancelToken,
    },

    /// Shutdown the worker
    Shutdown,
}

/// Response from the render worker
#[derive(Debug)]
pub enum WorkerResponse {
    Loaded {
        id: RequestId,
        page_count: usize,
        /// Height of page 1 at scale 1, 0 when unavailable
        first_page_height: f32,
    },

    Measured {
        id: RequestId,
        page: usize,
        page_height: f32,
    },

    /// Finished back buffer for a render request
    Rendered {
        id: RequestId,
        page: usize,
        viewport: Viewport,
        frame: Surface,
    },

    TextReady {
        id: RequestId,
        page: usize,
        viewport: Viewport,
        runs: Vec<GlyphRun>,
    },

    /// Request was cancelled before it could finish
    Cancelled(RequestId),

    /// Provider failure
    Failed { id: RequestId, error: ProviderError },
}

impl WorkerResponse {
    #[must_use]
    pub fn id(&self) -> RequestId {
        match self {
            Self::Loaded { id, .. }
            | Self::Measured { id, .. }
            | Self::Rendered { id, .. }
            | Self::TextReady { id, .. }
            | Self::Failed { id, .. } => *id,
            Self::Cancelled(id) => *id,
        }
    }
}

/// User-facing failures, reported through notifications
#[derive(Debug, Clone, PartialEq, thiserror::Error)]
pub enum ViewerError {
    #[error("Could not open document: {0}")]
    Load(#[source] ProviderError),

    #[error("Could not fetch page {page}: {source}")]
    PageFetch { page: usize, source: ProviderError },

    #[error("Could not render page {page}: {source}")]
    Render { page: usize, source: ProviderError },

    #[error("Text layer unavailable for page {page}: {source}")]
    TextContent { page: usize, source: ProviderError },

    #[error("Render worker stopped")]
    WorkerGone,
}

impl ViewerError {
    /// Classify a failed render by where the provider gave up
    #[must_use]
    pub fn from_render(page: usize, source: ProviderError) -> Self {
        match source {
            ProviderError::PageFetch { .. } => Self::PageFetch { page, source },
            source => Self::Render { page, source },
        }
    }

    #[must_use]
    pub fn page(&self) -> Option<usize> {
        match self {
            Self::PageFetch { page, .. }
            | Self::Render { page, .. }
            | Self::TextContent { page, .. } => Some(*page),
            Self::Load(_) | Self::WorkerGone => None,
        }
    }
}
