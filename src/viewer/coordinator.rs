//! Page render coordination
//!
//! Keeps one authoritative render in flight for a displayed surface. Each
//! render gets a fresh [`RequestId`] and [`CancelToken`]; issuing a new
//! render cancels the previous token before the request is queued, and any
//! response whose id is no longer live is dropped without touching the
//! surface, the overlay, or the busy flag.

use flume::Sender;
use log::{debug, error, info, warn};

use super::geometry::Viewport;
use super::provider::{CancelToken, ProviderError};
use super::request::{RequestId, ViewerError, WorkerRequest, WorkerResponse};
use super::surface::Surface;
use super::text_layer::{TextLayer, append_text_boxes, reset_overlay};

/// The last frame that reached the displayed surface
#[derive(Clone, Copy, Debug, PartialEq)]
pub struct Painted {
    pub id: RequestId,
    pub page: usize,
    pub scale: f32,
}

/// Observable outcome of handling a worker response
#[derive(Clone, Debug, PartialEq)]
pub enum ViewerEvent {
    DocumentLoaded { page_count: usize },
    Painted { page: usize, scale: f32 },
    TextLayerReady { page: usize, boxes: usize },
    Failed(ViewerError),
}

#[derive(Debug)]
struct LiveRequest {
    id: RequestId,
    page: usize,
    scale: f32,
    cancel: CancelToken,
}

impl LiveRequest {
    fn cancel(self) {
        debug!(
            "Cancelling request {} for page {} at {:.3}",
            self.id, self.page, self.scale
        );
        self.cancel.cancel();
    }
}

pub struct RenderCoordinator {
    requests: Sender<WorkerRequest>,
    next_request_id: u64,
    device_pixel_ratio: f32,
    surface: Surface,
    overlay: TextLayer,
    busy: bool,
    live_render: Option<LiveRequest>,
    live_text: Option<LiveRequest>,
    painted: Option<Painted>,
    presented_frames: u64,
}

impl RenderCoordinator {
    #[must_use]
    pub fn new(requests: Sender<WorkerRequest>, device_pixel_ratio: f32) -> Self {
        Self {
            requests,
            next_request_id: 1,
            device_pixel_ratio: sanitize_ratio(device_pixel_ratio),
            surface: Surface::default(),
            overlay: TextLayer::new(),
            busy: false,
            live_render: None,
            live_text: None,
            painted: None,
            presented_frames: 0,
        }
    }

    /// A render is in flight
    #[must_use]
    pub fn is_busy(&self) -> bool {
        self.busy
    }

    /// A render or text-content request is still outstanding
    #[must_use]
    pub fn has_live_work(&self) -> bool {
        self.live_render.is_some() || self.live_text.is_some()
    }

    #[must_use]
    pub fn surface(&self) -> &Surface {
        &self.surface
    }

    #[must_use]
    pub fn text_layer(&self) -> &TextLayer {
        &self.overlay
    }

    #[must_use]
    pub fn painted(&self) -> Option<Painted> {
        self.painted
    }

    /// Number of frames copied onto the displayed surface
    #[must_use]
    pub fn presented_frames(&self) -> u64 {
        self.presented_frames
    }

    #[must_use]
    pub fn device_pixel_ratio(&self) -> f32 {
        self.device_pixel_ratio
    }

    pub fn set_device_pixel_ratio(&mut self, ratio: f32) {
        self.device_pixel_ratio = sanitize_ratio(ratio);
    }

    pub(crate) fn next_id(&mut self) -> RequestId {
        let id = RequestId::new(self.next_request_id);
        self.next_request_id += 1;
        id
    }

    /// Queue a request; `false` when the worker is gone
    pub(crate) fn send(&self, request: WorkerRequest) -> bool {
        self.requests.send(request).is_ok()
    }

    /// Supersede whatever is in flight and start rendering `page` at `scale`
    pub fn render_page(&mut self, page: usize, scale: f32) -> Result<RequestId, ViewerError> {
        self.cancel_live();
        self.busy = true;

        let id = self.next_id();
        let cancel = CancelToken::new();
        let request = WorkerRequest::Render {
            id,
            page,
            scale,
            device_pixel_ratio: self.device_pixel_ratio,
            cancel: cancel.clone(),
        };
        if !self.send(request) {
            self.busy = false;
            error!("Render worker is gone, cannot render page {page}");
            return Err(ViewerError::WorkerGone);
        }

        debug!("Render {id}: page {page} at {scale:.3}");
        self.live_render = Some(LiveRequest {
            id,
            page,
            scale,
            cancel,
        });
        Ok(id)
    }

    /// Cancel everything in flight and clear busy. Used on unmount and when
    /// the document goes away.
    pub fn cancel_all(&mut self) {
        self.cancel_live();
        self.busy = false;
    }

    /// Cancel in-flight work because a replacement render is coming. Busy
    /// stays set until that render resolves.
    pub fn supersede(&mut self) {
        self.cancel_live();
        self.busy = true;
    }

    /// Cancel in-flight work and blank the surface and overlay
    pub fn clear(&mut self) {
        self.cancel_all();
        self.surface = Surface::default();
        self.overlay = TextLayer::new();
        self.painted = None;
    }

    fn cancel_live(&mut self) {
        if let Some(live) = self.live_render.take() {
            live.cancel();
        }
        if let Some(live) = self.live_text.take() {
            live.cancel();
        }
    }

    fn is_live_render(&self, id: RequestId) -> bool {
        self.live_render.as_ref().is_some_and(|live| live.id == id)
    }

    fn is_live_text(&self, id: RequestId) -> bool {
        self.live_text.as_ref().is_some_and(|live| live.id == id)
    }

    /// Apply a render or text response. Responses for ids that are no
    /// longer live are ignored.
    pub fn handle(&mut self, response: WorkerResponse) -> Option<ViewerEvent> {
        match response {
            WorkerResponse::Rendered {
                id,
                page,
                viewport,
                frame,
            } => {
                if !self.is_live_render(id) {
                    debug!("Dropping superseded frame {id} for page {page}");
                    return None;
                }
                self.live_render = None;
                self.surface.present(&frame);
                self.presented_frames += 1;
                self.painted = Some(Painted {
                    id,
                    page,
                    scale: viewport.scale,
                });
                self.busy = false;
                info!(
                    "Painted page {page} at {:.3} ({}x{} px)",
                    viewport.scale,
                    frame.width(),
                    frame.height()
                );
                self.request_text(page, &viewport);
                Some(ViewerEvent::Painted {
                    page,
                    scale: viewport.scale,
                })
            }

            WorkerResponse::TextReady {
                id,
                page,
                viewport,
                runs,
            } => {
                if !self.is_live_text(id) {
                    debug!("Dropping superseded text content {id} for page {page}");
                    return None;
                }
                self.live_text = None;
                let boxes = append_text_boxes(&mut self.overlay, &runs, &viewport);
                debug!(
                    "Text layer for page {page}: {boxes} boxes from {} runs",
                    runs.len()
                );
                Some(ViewerEvent::TextLayerReady { page, boxes })
            }

            WorkerResponse::Cancelled(id) => {
                if self.is_live_render(id) {
                    self.live_render = None;
                    self.busy = false;
                } else if self.is_live_text(id) {
                    self.live_text = None;
                }
                None
            }

            WorkerResponse::Failed { id, error } => self.handle_failure(id, error),

            WorkerResponse::Loaded { id, .. } | WorkerResponse::Measured { id, .. } => {
                debug!("Coordinator ignoring response {id}");
                None
            }
        }
    }

    fn handle_failure(&mut self, id: RequestId, error: ProviderError) -> Option<ViewerEvent> {
        if self.is_live_render(id) {
            let live = self.live_render.take()?;
            self.busy = false;
            if error == ProviderError::Cancelled {
                return None;
            }
            let error = ViewerError::from_render(live.page, error);
            error!("{error}");
            return Some(ViewerEvent::Failed(error));
        }

        if self.is_live_text(id) {
            let live = self.live_text.take()?;
            if error == ProviderError::Cancelled {
                return None;
            }
            let error = ViewerError::TextContent {
                page: live.page,
                source: error,
            };
            warn!("{error}");
            return Some(ViewerEvent::Failed(error));
        }

        debug!("Ignoring failure of superseded request {id}: {error}");
        None
    }

    /// Reset the overlay for the freshly painted page and ask for its text
    fn request_text(&mut self, page: usize, viewport: &Viewport) {
        reset_overlay(&mut self.overlay, viewport);

        let id = self.next_id();
        let cancel = CancelToken::new();
        let request = WorkerRequest::TextContent {
            id,
            page,
            scale: viewport.scale,
            cancel: cancel.clone(),
        };
        if !self.send(request) {
            warn!("Render worker is gone, text layer for page {page} skipped");
            return;
        }
        self.live_text = Some(LiveRequest {
            id,
            page,
            scale: viewport.scale,
            cancel,
        });
    }

    /// Stop the worker loop
    pub(crate) fn shutdown(&mut self) {
        self.cancel_all();
        let _ = self.requests.send(WorkerRequest::Shutdown);
    }
}

fn sanitize_ratio(ratio: f32) -> f32 {
    if ratio.is_finite() && ratio > 0.0 {
        ratio
    } else {
        1.0
    }
}

#[cfg(test)]
mod tests {
    use flume::Receiver;

    use super::*;
    use crate::viewer::geometry::PageAxis;
    use crate::viewer::text_layer::GlyphRun;

    fn coordinator() -> (RenderCoordinator, Receiver<WorkerRequest>) {
        let (tx, rx) = flume::unbounded();
        (RenderCoordinator::new(tx, 2.0), rx)
    }

    fn frame_for(viewport: &Viewport, dpr: f32, rgba: [u8; 4]) -> Surface {
        let (w, h) = viewport.backing_size(dpr);
        let mut frame = Surface::new(w, h);
        frame.fill_rect(0.0, 0.0, w as f32, h as f32, rgba);
        frame.set_css_size(viewport.width, viewport.height);
        frame
    }

    fn take_render(rx: &Receiver<WorkerRequest>) -> (RequestId, CancelToken) {
        match rx.try_recv() {
            Ok(WorkerRequest::Render { id, cancel, .. }) => (id, cancel),
            other => panic!("expected a render request, got {other:?}"),
        }
    }

    #[test]
    fn new_render_cancels_the_previous_one_first() {
        let (mut coordinator, rx) = coordinator();
        coordinator.render_page(1, 1.0).unwrap();
        let (_, first_cancel) = take_render(&rx);
        assert!(coordinator.is_busy());

        coordinator.render_page(2, 1.0).unwrap();
        assert!(first_cancel.is_cancelled());
        let (_, second_cancel) = take_render(&rx);
        assert!(!second_cancel.is_cancelled());
    }

    #[test]
    fn superseded_frame_is_never_presented() {
        let (mut coordinator, rx) = coordinator();
        let viewport = Viewport::new(10.0, 10.0, 1.0, PageAxis::TopDown);

        coordinator.render_page(1, 1.0).unwrap();
        let (first, _) = take_render(&rx);
        coordinator.render_page(2, 1.0).unwrap();
        let (second, _) = take_render(&rx);

        let late = coordinator.handle(WorkerResponse::Rendered {
            id: first,
            page: 1,
            viewport,
            frame: frame_for(&viewport, 2.0, [255, 0, 0, 255]),
        });
        assert!(late.is_none());
        assert!(coordinator.is_busy());
        assert_eq!(coordinator.presented_frames(), 0);

        let event = coordinator.handle(WorkerResponse::Rendered {
            id: second,
            page: 2,
            viewport,
            frame: frame_for(&viewport, 2.0, [0, 255, 0, 255]),
        });
        assert_eq!(event, Some(ViewerEvent::Painted { page: 2, scale: 1.0 }));
        assert!(!coordinator.is_busy());
        assert_eq!(coordinator.presented_frames(), 1);
        assert_eq!(coordinator.surface().pixel(0, 0), Some([0, 255, 0, 255]));
        assert_eq!(coordinator.painted().map(|p| p.page), Some(2));
    }

    #[test]
    fn paint_triggers_text_layer_for_same_page() {
        let (mut coordinator, rx) = coordinator();
        let viewport = Viewport::new(100.0, 100.0, 1.0, PageAxis::BottomUp);

        coordinator.render_page(1, 1.0).unwrap();
        let (id, _) = take_render(&rx);
        let _ = coordinator.handle(WorkerResponse::Rendered {
            id,
            page: 1,
            viewport,
            frame: frame_for(&viewport, 2.0, [1, 1, 1, 255]),
        });

        let text_id = match rx.try_recv() {
            Ok(WorkerRequest::TextContent { id, page, scale, .. }) => {
                assert_eq!((page, scale), (1, 1.0));
                id
            }
            other => panic!("expected a text request, got {other:?}"),
        };
        assert_eq!(coordinator.text_layer().size(), (100.0, 100.0));
        assert!(coordinator.has_live_work());

        let event = coordinator.handle(WorkerResponse::TextReady {
            id: text_id,
            page: 1,
            viewport,
            runs: vec![GlyphRun::new("Hi", [2.0, 0.0, 0.0, -2.0, 10.0, 50.0], "F1")],
        });
        assert_eq!(event, Some(ViewerEvent::TextLayerReady { page: 1, boxes: 1 }));
        assert_eq!(coordinator.text_layer().boxes()[0].top, 48.0);
        assert!(!coordinator.has_live_work());
    }

    #[test]
    fn cancellation_is_silent() {
        let (mut coordinator, rx) = coordinator();
        coordinator.render_page(1, 1.0).unwrap();
        let (id, _) = take_render(&rx);

        assert!(coordinator.handle(WorkerResponse::Cancelled(id)).is_none());
        assert!(!coordinator.is_busy());

        coordinator.render_page(1, 1.0).unwrap();
        let (id, _) = take_render(&rx);
        let event = coordinator.handle(WorkerResponse::Failed {
            id,
            error: ProviderError::Cancelled,
        });
        assert!(event.is_none());
    }

    #[test]
    fn failure_keeps_last_good_frame() {
        let (mut coordinator, rx) = coordinator();
        let viewport = Viewport::new(4.0, 4.0, 1.0, PageAxis::TopDown);

        coordinator.render_page(1, 1.0).unwrap();
        let (id, _) = take_render(&rx);
        let _ = coordinator.handle(WorkerResponse::Rendered {
            id,
            page: 1,
            viewport,
            frame: frame_for(&viewport, 2.0, [9, 9, 9, 255]),
        });
        let _text = rx.try_recv();

        coordinator.render_page(2, 1.0).unwrap();
        let (id, _) = take_render(&rx);
        let event = coordinator.handle(WorkerResponse::Failed {
            id,
            error: ProviderError::render("boom"),
        });
        assert!(matches!(
            event,
            Some(ViewerEvent::Failed(ViewerError::Render { page: 2, .. }))
        ));
        assert!(!coordinator.is_busy());
        assert_eq!(coordinator.surface().pixel(0, 0), Some([9, 9, 9, 255]));
        assert_eq!(coordinator.painted().map(|p| p.page), Some(1));
    }

    #[test]
    fn stale_failure_does_not_clear_busy() {
        let (mut coordinator, rx) = coordinator();
        coordinator.render_page(1, 1.0).unwrap();
        let (first, _) = take_render(&rx);
        coordinator.render_page(2, 1.0).unwrap();

        let event = coordinator.handle(WorkerResponse::Failed {
            id: first,
            error: ProviderError::render("late"),
        });
        assert!(event.is_none());
        assert!(coordinator.is_busy());
    }

    #[test]
    fn cancel_all_clears_busy_and_invalidates_tokens() {
        let (mut coordinator, rx) = coordinator();
        coordinator.render_page(3, 2.0).unwrap();
        let (_, cancel) = take_render(&rx);

        coordinator.cancel_all();
        assert!(cancel.is_cancelled());
        assert!(!coordinator.is_busy());
        assert!(!coordinator.has_live_work());
    }

    #[test]
    fn supersede_cancels_but_stays_busy() {
        let (mut coordinator, rx) = coordinator();
        coordinator.render_page(1, 1.0).unwrap();
        let (id, cancel) = take_render(&rx);

        coordinator.supersede();
        assert!(cancel.is_cancelled());
        assert!(coordinator.is_busy());
        assert!(coordinator.handle(WorkerResponse::Cancelled(id)).is_none());
        assert!(coordinator.is_busy());
    }

    #[test]
    fn render_fails_fast_when_worker_is_gone() {
        let (mut coordinator, rx) = coordinator();
        drop(rx);
        assert_eq!(coordinator.render_page(1, 1.0), Err(ViewerError::WorkerGone));
        assert!(!coordinator.is_busy());
    }
}
