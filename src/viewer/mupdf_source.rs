//! MuPDF-backed page provider

use log::{debug, warn};
use mupdf::text_page::TextBlockType;
use mupdf::{Colorspace, Document, Matrix, Page, TextPageFlags};

use super::geometry::{PageAxis, Viewport};
use super::provider::{CancelToken, DocumentProvider, PageHandle, PageSource, ProviderError};
use super::surface::Surface;
use super::text_layer::GlyphRun;

const PDF_MAGIC: &str = "application/pdf";

/// Opens documents with MuPDF. `magic` is a MIME type or file name used
/// to pick the document handler.
#[derive(Clone, Debug)]
pub struct MupdfProvider {
    magic: String,
}

impl Default for MupdfProvider {
    fn default() -> Self {
        Self {
            magic: PDF_MAGIC.to_string(),
        }
    }
}

impl MupdfProvider {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Let MuPDF pick the handler from a file name (`.pdf`, `.xps`,
    /// `.epub`, `.cbz`, ...)
    #[must_use]
    pub fn for_file_name(name: &str) -> Self {
        Self {
            magic: name.to_string(),
        }
    }
}

impl DocumentProvider for MupdfProvider {
    type Document = MupdfDocument;

    fn open(&mut self, bytes: &[u8]) -> Result<MupdfDocument, ProviderError> {
        let doc = Document::from_bytes(bytes, &self.magic)
            .map_err(|e| ProviderError::load(e.to_string()))?;
        let page_count = doc
            .page_count()
            .map_err(|e| ProviderError::load(e.to_string()))?;
        Ok(MupdfDocument {
            doc,
            page_count: usize::try_from(page_count).unwrap_or(0),
        })
    }
}

pub struct MupdfDocument {
    doc: Document,
    page_count: usize,
}

impl PageSource for MupdfDocument {
    type Page = MupdfPage;

    fn page_count(&self) -> usize {
        self.page_count
    }

    fn get_page(&self, index: usize) -> Result<MupdfPage, ProviderError> {
        if index == 0 || index > self.page_count {
            return Err(ProviderError::page_fetch(
                index,
                format!("out of range (1..={})", self.page_count),
            ));
        }
        let page = self
            .doc
            .load_page((index - 1) as i32)
            .map_err(|e| ProviderError::page_fetch(index, e.to_string()))?;
        let bounds = page
            .bounds()
            .map_err(|e| ProviderError::page_fetch(index, e.to_string()))?;
        Ok(MupdfPage {
            page,
            origin: (bounds.x0, bounds.y0),
            size: (bounds.x1 - bounds.x0, bounds.y1 - bounds.y0),
        })
    }
}

pub struct MupdfPage {
    page: Page,
    origin: (f32, f32),
    size: (f32, f32),
}

impl PageHandle for MupdfPage {
    fn viewport(&self, scale: f32) -> Viewport {
        // MuPDF reports page space with y growing downwards
        Viewport::new(self.size.0, self.size.1, scale, PageAxis::TopDown)
    }

    fn render(
        &self,
        surface: &mut Surface,
        viewport: &Viewport,
        cancel: &CancelToken,
    ) -> Result<(), ProviderError> {
        cancel.check()?;

        let zoom = viewport.scale * surface.device_scale();
        let pixmap = self
            .page
            .to_pixmap(&Matrix::new_scale(zoom, zoom), &Colorspace::device_rgb(), false, false)
            .map_err(|e| ProviderError::render(e.to_string()))?;

        cancel.check()?;

        let width = pixmap.width() as u32;
        let height = pixmap.height() as u32;
        let stride = pixmap.stride() as usize;
        let n = pixmap.n() as usize;
        if (width, height) != (surface.width(), surface.height()) {
            debug!(
                "Pixmap {width}x{height} clipped to backing store {}x{}",
                surface.width(),
                surface.height()
            );
        }
        surface.blit(pixmap.samples(), width, height, stride, n);
        Ok(())
    }

    fn text_content(&self) -> Result<Vec<GlyphRun>, ProviderError> {
        let text_page = self
            .page
            .to_text_page(TextPageFlags::empty())
            .map_err(|e| ProviderError::text_content(e.to_string()))?;

        let (x0, y0) = self.origin;
        let mut runs = Vec::new();

        for block in text_page.blocks() {
            if block.r#type() != TextBlockType::Text {
                continue;
            }
            for line in block.lines() {
                let chars: Vec<_> = line.chars().collect();
                let Some(first) = chars.first() else {
                    continue;
                };
                let text: String = chars.iter().filter_map(|ch| ch.char()).collect();
                if text.trim().is_empty() {
                    continue;
                }

                let size = first.size();
                if !size.is_finite() || size <= 0.0 {
                    warn!("Skipping text line with font size {size}");
                    continue;
                }

                let start = first.origin();
                let (dx, dy) = match chars.last().map(|ch| ch.origin()) {
                    Some(end) if chars.len() > 1 => {
                        let (dx, dy) = (end.x - start.x, end.y - start.y);
                        let len = dx.hypot(dy);
                        if len > f32::EPSILON {
                            (dx / len, dy / len)
                        } else {
                            (1.0, 0.0)
                        }
                    }
                    _ => (1.0, 0.0),
                };

                runs.push(GlyphRun::new(
                    text,
                    [
                        size * dx,
                        size * dy,
                        -size * dy,
                        size * dx,
                        start.x - x0,
                        start.y - y0,
                    ],
                    "",
                ));
            }
        }

        Ok(runs)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn garbage_bytes_fail_to_load() {
        let mut provider = MupdfProvider::new();
        let result = provider.open(b"definitely not a pdf");
        assert!(matches!(result, Err(ProviderError::Load { .. })));
    }
}
