//! Render worker - owns the document and runs every provider call

use flume::{Receiver, Sender};
use log::{debug, info, warn};

use super::geometry::{MAX_BACKING_PIXELS, Transform, Viewport, backing_fits};
use super::provider::{CancelToken, DocumentProvider, PageHandle, PageSource, ProviderError};
use super::request::{RequestId, WorkerRequest, WorkerResponse};
use super::surface::Surface;
use super::text_layer::GlyphRun;

/// Worker loop. Requests are handled strictly in order; the loop ends on
/// `Shutdown` or when every sender is gone.
pub fn render_worker<P: DocumentProvider>(
    mut provider: P,
    requests: Receiver<WorkerRequest>,
    responses: Sender<WorkerResponse>,
) {
    let mut document: Option<P::Document> = None;

    for request in requests {
        let response = match request {
            WorkerRequest::Load { id, bytes } => {
                // The previous document is released before the new one opens
                document = None;
                match provider.open(&bytes) {
                    Ok(doc) => {
                        let page_count = doc.page_count();
                        let first_page_height = first_page_height(&doc);
                        info!("Opened document: {page_count} pages ({} bytes)", bytes.len());
                        document = Some(doc);
                        WorkerResponse::Loaded {
                            id,
                            page_count,
                            first_page_height,
                        }
                    }
                    Err(error) => WorkerResponse::Failed { id, error },
                }
            }

            WorkerRequest::Measure { id, page } => {
                match with_document(document.as_ref(), page, |doc| {
                    Ok(doc.get_page(page)?.viewport(1.0).height)
                }) {
                    Ok(page_height) => WorkerResponse::Measured {
                        id,
                        page,
                        page_height,
                    },
                    Err(error) => WorkerResponse::Failed { id, error },
                }
            }

            WorkerRequest::Render {
                id,
                page,
                scale,
                device_pixel_ratio,
                cancel,
            } => {
                let result = with_document(document.as_ref(), page, |doc| {
                    render_page(doc, page, scale, device_pixel_ratio, &cancel)
                });
                match result {
                    Ok((viewport, frame)) => WorkerResponse::Rendered {
                        id,
                        page,
                        viewport,
                        frame,
                    },
                    Err(error) => failure(id, error),
                }
            }

            WorkerRequest::TextContent {
                id,
                page,
                scale,
                cancel,
            } => {
                let result = with_document(document.as_ref(), page, |doc| {
                    text_content(doc, page, scale, &cancel)
                });
                match result {
                    Ok((viewport, runs)) => WorkerResponse::TextReady {
                        id,
                        page,
                        viewport,
                        runs,
                    },
                    Err(error) => failure(id, error),
                }
            }

            WorkerRequest::Shutdown => break,
        };

        if responses.send(response).is_err() {
            break;
        }
    }

    debug!("Render worker exiting");
}

fn failure(id: RequestId, error: ProviderError) -> WorkerResponse {
    match error {
        ProviderError::Cancelled => {
            debug!("Request {id} cancelled");
            WorkerResponse::Cancelled(id)
        }
        error => WorkerResponse::Failed { id, error },
    }
}

fn with_document<D: PageSource, T>(
    document: Option<&D>,
    page: usize,
    f: impl FnOnce(&D) -> Result<T, ProviderError>,
) -> Result<T, ProviderError> {
    match document {
        Some(doc) => f(doc),
        None => Err(ProviderError::page_fetch(page, "no document loaded")),
    }
}

fn first_page_height<D: PageSource>(doc: &D) -> f32 {
    if doc.page_count() == 0 {
        return 0.0;
    }
    match doc.get_page(1) {
        Ok(page) => page.viewport(1.0).height,
        Err(e) => {
            warn!("Could not measure first page: {e}");
            0.0
        }
    }
}

/// Rasterize one page into a back buffer sized for the device pixel ratio
pub fn render_page<D: PageSource>(
    doc: &D,
    page: usize,
    scale: f32,
    device_pixel_ratio: f32,
    cancel: &CancelToken,
) -> Result<(Viewport, Surface), ProviderError> {
    cancel.check()?;
    let handle = doc.get_page(page)?;
    cancel.check()?;

    let viewport = handle.viewport(scale);
    let (width, height) = viewport.backing_size(device_pixel_ratio);
    if !backing_fits(width, height) {
        return Err(ProviderError::render(format!(
            "{width}x{height} px backing store exceeds the {MAX_BACKING_PIXELS} pixel limit"
        )));
    }
    let mut frame = Surface::new(width, height);
    frame.set_transform(Transform::scale(device_pixel_ratio, device_pixel_ratio));
    frame.set_css_size(viewport.width, viewport.height);

    handle.render(&mut frame, &viewport, cancel)?;
    cancel.check()?;

    debug!(
        "Rendered page {page} at {scale:.3} ({width}x{height} px, dpr {device_pixel_ratio})"
    );
    Ok((viewport, frame))
}

fn text_content<D: PageSource>(
    doc: &D,
    page: usize,
    scale: f32,
    cancel: &CancelToken,
) -> Result<(Viewport, Vec<GlyphRun>), ProviderError> {
    cancel.check()?;
    let handle = doc.get_page(page)?;
    let viewport = handle.viewport(scale);
    let runs = handle.text_content()?;
    cancel.check()?;
    Ok((viewport, runs))
}
