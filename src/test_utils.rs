//! Scripted in-memory page provider for tests
//!
//! Documents are registered under the exact bytes that open them. Pages
//! can be given custom sizes, glyph runs and failure modes, and a render
//! gate lets a test hold a rasterization in flight until it decides to
//! release it.

use std::collections::HashMap;
use std::sync::Arc;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::time::Duration;

use flume::{Receiver, RecvTimeoutError, Sender};

use crate::viewer::{
    CancelToken, DocumentProvider, GlyphRun, PageAxis, PageHandle, PageSource, ProviderError,
    Surface, Viewport, ViewerConfig,
};

pub const LETTER_WIDTH: f32 = 612.0;
pub const LETTER_HEIGHT: f32 = 792.0;

/// How often a gated render re-checks its cancel token
const GATE_POLL: Duration = Duration::from_millis(5);

/// Window height leaving 660 px for the page after the default chrome
pub fn test_config() -> ViewerConfig {
    ViewerConfig::default().with_window(800.0, 780.0)
}

/// Holds gated renders until released. Dropping the handle releases
/// every current and future render.
pub struct RenderGate {
    started: Receiver<usize>,
    release: Sender<()>,
}

impl RenderGate {
    /// Wait until a gated render for some page has started
    pub fn wait_started(&self, timeout: Duration) -> Option<usize> {
        self.started.recv_timeout(timeout).ok()
    }

    /// Let one waiting render continue
    pub fn release(&self) {
        let _ = self.release.send(());
    }
}

#[derive(Clone)]
struct GateSide {
    started: Sender<usize>,
    release: Receiver<()>,
}

#[derive(Clone)]
pub struct ScriptedPage {
    pub width: f32,
    pub height: f32,
    pub axis: PageAxis,
    pub color: [u8; 4],
    pub runs: Vec<GlyphRun>,
    pub fail_fetch: bool,
    pub fail_render: bool,
    pub fail_text: bool,
    gate: Option<GateSide>,
}

impl ScriptedPage {
    pub fn new(width: f32, height: f32) -> Self {
        Self {
            width,
            height,
            axis: PageAxis::BottomUp,
            color: [40, 40, 40, 255],
            runs: Vec::new(),
            fail_fetch: false,
            fail_render: false,
            fail_text: false,
            gate: None,
        }
    }

    pub fn letter() -> Self {
        Self::new(LETTER_WIDTH, LETTER_HEIGHT)
    }

    pub fn with_color(mut self, color: [u8; 4]) -> Self {
        self.color = color;
        self
    }

    pub fn with_axis(mut self, axis: PageAxis) -> Self {
        self.axis = axis;
        self
    }

    pub fn with_runs(mut self, runs: Vec<GlyphRun>) -> Self {
        self.runs = runs;
        self
    }

    pub fn failing_fetch(mut self) -> Self {
        self.fail_fetch = true;
        self
    }

    pub fn failing_render(mut self) -> Self {
        self.fail_render = true;
        self
    }

    pub fn failing_text(mut self) -> Self {
        self.fail_text = true;
        self
    }

    /// Make every render of this page wait on the returned gate
    pub fn gated(mut self) -> (Self, RenderGate) {
        let (started_tx, started_rx) = flume::unbounded();
        let (release_tx, release_rx) = flume::unbounded();
        self.gate = Some(GateSide {
            started: started_tx,
            release: release_rx,
        });
        (
            self,
            RenderGate {
                started: started_rx,
                release: release_tx,
            },
        )
    }
}

#[derive(Clone, Default)]
pub struct ScriptedDocument {
    pub pages: Vec<ScriptedPage>,
}

impl ScriptedDocument {
    pub fn new(pages: Vec<ScriptedPage>) -> Self {
        Self { pages }
    }

    /// `count` letter-sized pages, each a different shade
    pub fn letter_pages(count: usize) -> Self {
        Self::new(
            (0..count)
                .map(|i| ScriptedPage::letter().with_color([(i * 20 % 250) as u8 + 5, 0, 0, 255]))
                .collect(),
        )
    }
}

/// Counts provider calls made on the worker thread
#[derive(Clone, Debug, Default)]
pub struct CallCounts {
    opens: Arc<AtomicUsize>,
    renders: Arc<AtomicUsize>,
    text_fetches: Arc<AtomicUsize>,
}

impl CallCounts {
    pub fn opens(&self) -> usize {
        self.opens.load(Ordering::SeqCst)
    }

    pub fn renders(&self) -> usize {
        self.renders.load(Ordering::SeqCst)
    }

    pub fn text_fetches(&self) -> usize {
        self.text_fetches.load(Ordering::SeqCst)
    }
}

#[derive(Clone, Default)]
pub struct ScriptedProvider {
    documents: HashMap<Vec<u8>, ScriptedDocument>,
    counts: CallCounts,
}

impl ScriptedProvider {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_document(mut self, bytes: &[u8], document: ScriptedDocument) -> Self {
        self.documents.insert(bytes.to_vec(), document);
        self
    }

    pub fn counts(&self) -> CallCounts {
        self.counts.clone()
    }
}

impl DocumentProvider for ScriptedProvider {
    type Document = LoadedDocument;

    fn open(&mut self, bytes: &[u8]) -> Result<LoadedDocument, ProviderError> {
        self.counts.opens.fetch_add(1, Ordering::SeqCst);
        let document = self
            .documents
            .get(bytes)
            .cloned()
            .ok_or_else(|| ProviderError::load("unrecognized document"))?;
        Ok(LoadedDocument {
            document,
            counts: self.counts.clone(),
        })
    }
}

pub struct LoadedDocument {
    document: ScriptedDocument,
    counts: CallCounts,
}

impl PageSource for LoadedDocument {
    type Page = LoadedPage;

    fn page_count(&self) -> usize {
        self.document.pages.len()
    }

    fn get_page(&self, index: usize) -> Result<LoadedPage, ProviderError> {
        let page = index
            .checked_sub(1)
            .and_then(|i| self.document.pages.get(i))
            .ok_or_else(|| ProviderError::page_fetch(index, "no such page"))?;
        if page.fail_fetch {
            return Err(ProviderError::page_fetch(index, "corrupt page"));
        }
        Ok(LoadedPage {
            index,
            page: page.clone(),
            counts: self.counts.clone(),
        })
    }
}

pub struct LoadedPage {
    index: usize,
    page: ScriptedPage,
    counts: CallCounts,
}

impl PageHandle for LoadedPage {
    fn viewport(&self, scale: f32) -> Viewport {
        Viewport::new(self.page.width, self.page.height, scale, self.page.axis)
    }

    fn render(
        &self,
        surface: &mut Surface,
        viewport: &Viewport,
        cancel: &CancelToken,
    ) -> Result<(), ProviderError> {
        self.counts.renders.fetch_add(1, Ordering::SeqCst);

        if let Some(gate) = &self.page.gate {
            let _ = gate.started.send(self.index);
            loop {
                cancel.check()?;
                match gate.release.recv_timeout(GATE_POLL) {
                    Ok(()) | Err(RecvTimeoutError::Disconnected) => break,
                    Err(RecvTimeoutError::Timeout) => {}
                }
            }
        }

        cancel.check()?;
        if self.page.fail_render {
            return Err(ProviderError::render("scripted render failure"));
        }
        surface.fill_rect(0.0, 0.0, viewport.width, viewport.height, self.page.color);
        Ok(())
    }

    fn text_content(&self) -> Result<Vec<GlyphRun>, ProviderError> {
        self.counts.text_fetches.fetch_add(1, Ordering::SeqCst);
        if self.page.fail_text {
            return Err(ProviderError::text_content("scripted text failure"));
        }
        Ok(self.page.runs.clone())
    }
}
