//! Viewer service - ties the viewport state machine, the render
//! coordinator and the worker thread together

use std::collections::HashMap;
use std::thread::{self, JoinHandle};
use std::time::{Duration, Instant};

use flume::{Receiver, RecvTimeoutError};
use log::{debug, error, info, warn};

use super::config::ViewerConfig;
use super::coordinator::{Painted, RenderCoordinator, ViewerEvent};
use super::provider::DocumentProvider;
use super::request::{RequestId, ViewerError, WorkerRequest, WorkerResponse};
use super::state::{Command, Effect, FitTicket, ViewportState};
use super::surface::Surface;
use super::text_layer::TextLayer;
use super::worker::render_worker;
use crate::notification::NotificationManager;

#[derive(Debug)]
enum PendingRequest {
    Load,
    Measure(FitTicket),
}

/// One mounted viewer: a displayed surface, its text overlay and the
/// worker thread that talks to the page provider.
pub struct Viewer {
    state: ViewportState,
    coordinator: RenderCoordinator,
    response_rx: Receiver<WorkerResponse>,
    pending_requests: HashMap<RequestId, PendingRequest>,
    live_load: Option<RequestId>,
    notifications: NotificationManager,
    config: ViewerConfig,
    worker: Option<JoinHandle<()>>,
}

impl Viewer {
    /// Start the worker thread for `provider`
    pub fn spawn<P: DocumentProvider>(provider: P, config: ViewerConfig) -> std::io::Result<Self> {
        let (request_tx, request_rx) = flume::unbounded();
        let (response_tx, response_rx) = flume::unbounded();

        let worker = thread::Builder::new()
            .name("folioview-render".to_string())
            .spawn(move || render_worker(provider, request_rx, response_tx))?;

        let config = ViewerConfig {
            zoom: config.zoom.sanitized(),
            ..config
        };

        Ok(Self {
            state: ViewportState::new(config.zoom, config.available_height()),
            coordinator: RenderCoordinator::new(request_tx, config.device_pixel_ratio),
            response_rx,
            pending_requests: HashMap::new(),
            live_load: None,
            notifications: NotificationManager::new(),
            config,
            worker: Some(worker),
        })
    }

    #[must_use]
    pub fn state(&self) -> &ViewportState {
        &self.state
    }

    #[must_use]
    pub fn current_page(&self) -> usize {
        self.state.current_page()
    }

    #[must_use]
    pub fn page_count(&self) -> usize {
        self.state.page_count()
    }

    #[must_use]
    pub fn scale(&self) -> f32 {
        self.state.scale()
    }

    #[must_use]
    pub fn auto_fit(&self) -> bool {
        self.state.auto_fit()
    }

    #[must_use]
    pub fn config(&self) -> &ViewerConfig {
        &self.config
    }

    /// A render is in flight
    #[must_use]
    pub fn is_busy(&self) -> bool {
        self.coordinator.is_busy()
    }

    #[must_use]
    pub fn is_loading(&self) -> bool {
        self.live_load.is_some()
    }

    /// Nothing is waiting on the worker
    #[must_use]
    pub fn is_idle(&self) -> bool {
        self.pending_requests.is_empty() && !self.coordinator.has_live_work()
    }

    #[must_use]
    pub fn surface(&self) -> &Surface {
        self.coordinator.surface()
    }

    #[must_use]
    pub fn text_layer(&self) -> &TextLayer {
        self.coordinator.text_layer()
    }

    #[must_use]
    pub fn painted(&self) -> Option<Painted> {
        self.coordinator.painted()
    }

    #[must_use]
    pub fn presented_frames(&self) -> u64 {
        self.coordinator.presented_frames()
    }

    #[must_use]
    pub fn notifications(&self) -> &NotificationManager {
        &self.notifications
    }

    pub fn notifications_mut(&mut self) -> &mut NotificationManager {
        &mut self.notifications
    }

    /// Replace the current document. The viewer stays idle until the load
    /// resolves; only the most recent load is applied.
    pub fn load_document(&mut self, bytes: Vec<u8>) -> RequestId {
        self.apply_command(Command::Unload);
        let id = self.coordinator.next_id();
        info!("Loading document ({} bytes) as {id}", bytes.len());

        if self.coordinator.send(WorkerRequest::Load { id, bytes }) {
            self.pending_requests.insert(id, PendingRequest::Load);
            self.live_load = Some(id);
        } else {
            self.report(ViewerError::WorkerGone);
        }
        id
    }

    /// Apply a command to the viewport state
    pub fn apply_command(&mut self, cmd: Command) {
        let effects = self.state.apply(cmd);
        self.execute_effects(effects);
    }

    /// The window changed size
    pub fn resize(&mut self, window_width: f32, window_height: f32) {
        self.config.window_width = window_width;
        self.config.window_height = window_height;
        let available_height = self.config.available_height();
        self.apply_command(Command::Resize { available_height });
    }

    /// The window moved to a display with a different pixel density.
    /// Repaints the current page when the ratio actually changes.
    pub fn set_device_pixel_ratio(&mut self, ratio: f32) {
        if !(ratio.is_finite() && ratio > 0.0) {
            warn!("Ignoring invalid device pixel ratio {ratio}");
            return;
        }
        if (self.coordinator.device_pixel_ratio() - ratio).abs() <= f32::EPSILON {
            return;
        }
        info!("Device pixel ratio changed to {ratio}");
        self.config.device_pixel_ratio = ratio;
        self.coordinator.set_device_pixel_ratio(ratio);

        let shown = self.coordinator.painted().is_some() || self.coordinator.has_live_work();
        if self.state.is_ready() && shown {
            let (page, scale) = (self.state.current_page(), self.state.scale());
            if let Err(e) = self.coordinator.render_page(page, scale) {
                self.report(e);
            }
        }
    }

    fn execute_effects(&mut self, effects: Vec<Effect>) {
        for effect in effects {
            match effect {
                Effect::Render { page, scale } => {
                    if let Err(e) = self.coordinator.render_page(page, scale) {
                        self.report(e);
                    }
                }

                Effect::MeasureFit(ticket) => {
                    let id = self.coordinator.next_id();
                    let request = WorkerRequest::Measure {
                        id,
                        page: ticket.page,
                    };
                    if self.coordinator.send(request) {
                        self.pending_requests
                            .insert(id, PendingRequest::Measure(ticket));
                    } else {
                        self.report(ViewerError::WorkerGone);
                    }
                }

                Effect::CancelRender => {
                    self.coordinator.supersede();
                }

                Effect::ClearSurface => {
                    self.coordinator.clear();
                }
            }
        }
    }

    /// Drain completed worker responses without blocking
    pub fn poll(&mut self) -> Vec<ViewerEvent> {
        let mut events = vec![];
        while let Ok(response) = self.response_rx.try_recv() {
            self.dispatch(response, &mut events);
        }
        self.notifications.expire();
        events
    }

    /// Block until every outstanding request is answered or `timeout`
    /// passes. Returns whether the viewer went idle.
    pub fn wait_idle(&mut self, timeout: Duration) -> (bool, Vec<ViewerEvent>) {
        let deadline = Instant::now() + timeout;
        let mut events = self.poll();

        while !self.is_idle() {
            let remaining = deadline.saturating_duration_since(Instant::now());
            match self.response_rx.recv_timeout(remaining) {
                Ok(response) => self.dispatch(response, &mut events),
                Err(RecvTimeoutError::Timeout) => {
                    warn!("Viewer still busy after {timeout:?}");
                    return (false, events);
                }
                Err(RecvTimeoutError::Disconnected) => {
                    self.coordinator.cancel_all();
                    self.pending_requests.clear();
                    self.live_load = None;
                    self.report(ViewerError::WorkerGone);
                    events.push(ViewerEvent::Failed(ViewerError::WorkerGone));
                    return (false, events);
                }
            }
        }

        (true, events)
    }

    fn dispatch(&mut self, response: WorkerResponse, events: &mut Vec<ViewerEvent>) {
        let id = response.id();
        match (self.pending_requests.remove(&id), response) {
            (
                Some(PendingRequest::Load),
                WorkerResponse::Loaded {
                    page_count,
                    first_page_height,
                    ..
                },
            ) => {
                if self.live_load != Some(id) {
                    debug!("Ignoring superseded load {id}");
                    return;
                }
                self.live_load = None;
                if page_count == 0 {
                    warn!("Document has no pages");
                    self.notifications.warn("Document has no pages");
                } else {
                    info!("Document loaded: {page_count} pages");
                }
                self.apply_command(Command::DocumentLoaded {
                    page_count,
                    first_page_height,
                });
                events.push(ViewerEvent::DocumentLoaded { page_count });
            }

            (Some(PendingRequest::Load), WorkerResponse::Failed { error, .. }) => {
                if self.live_load != Some(id) {
                    debug!("Ignoring failure of superseded load {id}: {error}");
                    return;
                }
                self.live_load = None;
                self.apply_command(Command::Unload);
                let error = ViewerError::Load(error);
                self.report(error.clone());
                events.push(ViewerEvent::Failed(error));
            }

            (Some(PendingRequest::Measure(ticket)), WorkerResponse::Measured { page_height, .. }) => {
                self.apply_command(Command::FitMeasured {
                    ticket,
                    page_height,
                });
            }

            (Some(PendingRequest::Measure(ticket)), WorkerResponse::Failed { error, .. }) => {
                warn!("Fit measurement for page {} failed: {error}", ticket.page);
                self.apply_command(Command::FitFailed(ticket));
            }

            (Some(pending), response) => {
                debug!("Unexpected response {id} for {pending:?}: {response:?}");
            }

            (None, response) => {
                if let Some(event) = self.coordinator.handle(response) {
                    if let ViewerEvent::Failed(error) = &event {
                        self.notify_failure(error);
                    }
                    events.push(event);
                }
            }
        }
    }

    fn report(&mut self, error: ViewerError) {
        error!("{error}");
        self.notify_failure(&error);
    }

    fn notify_failure(&mut self, error: &ViewerError) {
        match error {
            ViewerError::TextContent { .. } => self.notifications.warn(error.to_string()),
            _ => self.notifications.error(error.to_string()),
        }
    }

    /// Cancel everything and stop the worker thread
    pub fn unmount(&mut self) {
        self.coordinator.shutdown();
        self.pending_requests.clear();
        self.live_load = None;
        if let Some(worker) = self.worker.take() {
            if worker.join().is_err() {
                error!("Render worker panicked");
            }
        }
    }
}

impl Drop for Viewer {
    fn drop(&mut self) {
        self.unmount();
    }
}
