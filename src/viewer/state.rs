//! Viewport state management
//!
//! Owns the current page, scale and auto-fit flag for one loaded document.
//! Every transition is synchronous; work that needs the page provider (fit
//! measurement, rasterization) is returned as an [`Effect`] for the caller to
//! execute. Fit measurements carry a [`FitTicket`] so results that arrive
//! after a newer page or zoom change are dropped.

use log::debug;

use super::zoom::ZoomPolicy;

/// Identifies one asynchronous fit-to-height computation
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub struct FitTicket {
    /// Page whose height is being measured (1-based)
    pub page: usize,
    /// State generation the measurement was issued against
    pub generation: u64,
}

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum Phase {
    /// No usable document
    Idle,
    Ready { page_count: usize },
}

/// Current viewing state for a document
#[derive(Clone, Debug)]
pub struct ViewportState {
    phase: Phase,
    current_page: usize,
    scale: f32,
    auto_fit: bool,
    available_height: f32,
    generation: u64,
    /// A page change is waiting on a fit result before it can render
    render_deferred: bool,
    policy: ZoomPolicy,
}

impl ViewportState {
    #[must_use]
    pub fn new(policy: ZoomPolicy, available_height: f32) -> Self {
        Self {
            phase: Phase::Idle,
            current_page: 1,
            scale: policy.clamp(1.0),
            auto_fit: true,
            available_height,
            generation: 0,
            render_deferred: false,
            policy,
        }
    }

    #[must_use]
    pub fn phase(&self) -> Phase {
        self.phase
    }

    #[must_use]
    pub fn is_ready(&self) -> bool {
        matches!(self.phase, Phase::Ready { .. })
    }

    /// Total page count, 0 when idle
    #[must_use]
    pub fn page_count(&self) -> usize {
        match self.phase {
            Phase::Ready { page_count } => page_count,
            Phase::Idle => 0,
        }
    }

    /// Current page (1-based)
    #[must_use]
    pub fn current_page(&self) -> usize {
        self.current_page
    }

    #[must_use]
    pub fn scale(&self) -> f32 {
        self.scale
    }

    #[must_use]
    pub fn auto_fit(&self) -> bool {
        self.auto_fit
    }

    #[must_use]
    pub fn available_height(&self) -> f32 {
        self.available_height
    }

    #[must_use]
    pub fn generation(&self) -> u64 {
        self.generation
    }

    #[must_use]
    pub fn policy(&self) -> &ZoomPolicy {
        &self.policy
    }

    /// Apply a command and return resulting effects
    #[must_use]
    pub fn apply(&mut self, cmd: Command) -> Vec<Effect> {
        match cmd {
            Command::DocumentLoaded {
                page_count,
                first_page_height,
            } => {
                self.generation += 1;
                self.current_page = 1;
                self.render_deferred = false;
                if page_count == 0 {
                    self.phase = Phase::Idle;
                    return vec![Effect::ClearSurface];
                }
                self.phase = Phase::Ready { page_count };
                self.auto_fit = true;
                // Unmeasurable first page: start at 100%
                self.scale = self
                    .policy
                    .fit_to_height(self.available_height, first_page_height)
                    .unwrap_or_else(|| self.policy.clamp(1.0));
                vec![self.render_effect()]
            }

            Command::Unload => {
                self.generation += 1;
                self.phase = Phase::Idle;
                self.current_page = 1;
                self.render_deferred = false;
                vec![Effect::ClearSurface]
            }

            Command::GoToPage(page) => self.go_to_page(page),

            Command::NextPage => self.go_to_page(self.current_page.saturating_add(1)),

            Command::PrevPage => self.go_to_page(self.current_page.saturating_sub(1)),

            Command::FirstPage => self.go_to_page(1),

            Command::LastPage => self.go_to_page(self.page_count()),

            Command::ZoomIn => self.set_manual_scale(self.policy.step_in(self.scale)),

            Command::ZoomOut => self.set_manual_scale(self.policy.step_out(self.scale)),

            Command::ResetZoom => self.set_manual_scale(self.policy.clamp(1.0)),

            Command::SetScale(scale) => self.set_manual_scale(self.policy.clamp(scale)),

            Command::FitToHeight => {
                if !self.is_ready() {
                    return vec![];
                }
                self.auto_fit = true;
                vec![Effect::MeasureFit(self.ticket())]
            }

            Command::Resize { available_height } => {
                self.available_height = available_height;
                if self.is_ready() && self.auto_fit {
                    vec![Effect::MeasureFit(self.ticket())]
                } else {
                    vec![]
                }
            }

            Command::FitMeasured {
                ticket,
                page_height,
            } => {
                if !self.is_current(ticket) {
                    debug!(
                        "Discarding stale fit for page {} (generation {} != {})",
                        ticket.page, ticket.generation, self.generation
                    );
                    return vec![];
                }
                let changed = match self
                    .policy
                    .fit_to_height(self.available_height, page_height)
                {
                    Some(fit) => {
                        let changed = (self.scale - fit).abs() > f32::EPSILON;
                        self.scale = fit;
                        changed
                    }
                    None => false,
                };
                let deferred = std::mem::take(&mut self.render_deferred);
                if changed || deferred {
                    vec![self.render_effect()]
                } else {
                    vec![]
                }
            }

            Command::FitFailed(ticket) => {
                if self.is_current(ticket) && std::mem::take(&mut self.render_deferred) {
                    vec![self.render_effect()]
                } else {
                    vec![]
                }
            }
        }
    }

    fn go_to_page(&mut self, page: usize) -> Vec<Effect> {
        let page_count = self.page_count();
        if page == 0 || page > page_count || page == self.current_page {
            return vec![];
        }
        self.generation += 1;
        self.current_page = page;
        if self.auto_fit {
            // The page on screen is already stale; drop its render now
            // rather than when the fit result arrives
            self.render_deferred = true;
            vec![Effect::CancelRender, Effect::MeasureFit(self.ticket())]
        } else {
            self.render_deferred = false;
            vec![self.render_effect()]
        }
    }

    fn set_manual_scale(&mut self, scale: f32) -> Vec<Effect> {
        self.generation += 1;
        self.auto_fit = false;
        let changed = (self.scale - scale).abs() > f32::EPSILON;
        self.scale = scale;
        let deferred = std::mem::take(&mut self.render_deferred);
        if self.is_ready() && (changed || deferred) {
            vec![self.render_effect()]
        } else {
            vec![]
        }
    }

    fn ticket(&self) -> FitTicket {
        FitTicket {
            page: self.current_page,
            generation: self.generation,
        }
    }

    fn is_current(&self, ticket: FitTicket) -> bool {
        self.is_ready()
            && self.auto_fit
            && ticket.generation == self.generation
            && ticket.page == self.current_page
    }

    fn render_effect(&self) -> Effect {
        Effect::Render {
            page: self.current_page,
            scale: self.scale,
        }
    }
}

/// Commands that modify viewport state
#[derive(Clone, Debug, PartialEq)]
pub enum Command {
    /// A document finished loading
    DocumentLoaded {
        page_count: usize,
        /// Height of page 1 at scale 1
        first_page_height: f32,
    },
    /// Drop the current document
    Unload,
    /// Go to a specific page (1-based)
    GoToPage(usize),
    NextPage,
    PrevPage,
    FirstPage,
    LastPage,
    ZoomIn,
    ZoomOut,
    /// Back to 100%
    ResetZoom,
    /// Set an explicit scale (clamped, disables auto-fit)
    SetScale(f32),
    /// Fit the current page's height to the display and keep fitting
    FitToHeight,
    /// The display area changed
    Resize { available_height: f32 },
    /// A fit measurement completed
    FitMeasured { ticket: FitTicket, page_height: f32 },
    /// A fit measurement could not be completed
    FitFailed(FitTicket),
}

/// Effects produced by state changes
#[derive(Clone, Debug, PartialEq)]
pub enum Effect {
    /// Rasterize a page at a scale
    Render { page: usize, scale: f32 },
    /// Measure the ticket's page height and report back
    MeasureFit(FitTicket),
    /// Cancel the in-flight render; a new one follows once the fit resolves
    CancelRender,
    /// Cancel in-flight work and blank the surface
    ClearSurface,
}
