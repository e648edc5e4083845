//! Page viewing core: viewport state, render coordination and the text
//! layer

mod config;
mod coordinator;
mod geometry;
pub mod html;
#[cfg(feature = "pdf")]
mod mupdf_source;
mod provider;
mod request;
mod service;
mod state;
mod surface;
mod text_layer;
mod worker;
mod zoom;

pub use config::{DEFAULT_RESERVED_HEIGHT, DEFAULT_WINDOW_HEIGHT, DEFAULT_WINDOW_WIDTH, ViewerConfig};
pub use coordinator::{Painted, RenderCoordinator, ViewerEvent};
pub use geometry::{MAX_BACKING_PIXELS, PageAxis, Transform, Viewport, backing_fits};
#[cfg(feature = "pdf")]
pub use mupdf_source::{MupdfDocument, MupdfPage, MupdfProvider};
pub use provider::{CancelToken, DocumentProvider, PageHandle, PageSource, ProviderError};
pub use request::{RequestId, ViewerError, WorkerRequest, WorkerResponse};
pub use service::Viewer;
pub use state::{Command, Effect, FitTicket, Phase, ViewportState};
pub use surface::Surface;
pub use text_layer::{
    Decomposition, GlyphRun, OverlaySink, TextBox, TextDirection, TextLayer, append_text_boxes,
    build_text_layer, decompose, layout_text_boxes, reset_overlay, text_box_for_run,
};
pub use worker::{render_page, render_worker};
pub use zoom::ZoomPolicy;
