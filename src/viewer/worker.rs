//! Fetch/decode/paint worker - runs in a dedicated thread
//!
//! The worker owns the fetcher, the decoder, the decoded document, and the
//! surface cache; none of them ever crosses back to the engine thread. Every
//! event it emits carries the epoch (and, for loads, the attempt) it was
//! started for, and the engine re-validates that tag before applying.

use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;

use flume::{Receiver, Sender};

use super::cache::{SurfaceCache, SurfaceKey};
use super::decode::{DecodeError, DecodedDocument, DocumentDecoder};
use super::fetch::DocumentFetcher;
use super::loader::LoadFault;
use super::pipeline::{PaintParams, RasterPlan};
use super::types::RenderedPage;
use crate::telemetry::Telemetry;

/// Identifies which load an operation belongs to: the URL epoch plus the
/// retry attempt within that epoch
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct JobTag {
    pub epoch: u64,
    pub attempt: u32,
}

/// Jobs sent to the worker
#[derive(Debug)]
pub enum WorkerJob {
    /// Fetch and decode a document
    Load { tag: JobTag, url: String },

    /// Paint every page of the current document, in order
    Paint {
        epoch: u64,
        paint_seq: u64,
        params: PaintParams,
    },

    /// Drop the current document and cached surfaces
    Clear,

    /// Shut the worker down
    Shutdown,
}

/// Events sent back from the worker
#[derive(Debug)]
pub enum WorkerEvent {
    /// Document opened; pages not yet painted
    Opened { tag: JobTag, page_count: usize },

    /// Fetch or decode failed
    LoadFailed { tag: JobTag, fault: LoadFault },

    /// A full paint pass finished
    Painted {
        epoch: u64,
        paint_seq: u64,
        pages: Vec<Arc<RenderedPage>>,
    },
}

/// Main worker loop
pub fn run_worker(
    fetcher: Box<dyn DocumentFetcher>,
    decoder: Box<dyn DocumentDecoder>,
    jobs: Receiver<WorkerJob>,
    events: Sender<WorkerEvent>,
    current_epoch: Arc<AtomicU64>,
    cache_capacity: usize,
    telemetry: Arc<dyn Telemetry>,
) {
    let mut document: Option<(u64, Box<dyn DecodedDocument>)> = None;
    let mut cache = SurfaceCache::new(cache_capacity);

    for job in jobs {
        match job {
            WorkerJob::Load { tag, url } => {
                if tag.epoch != current_epoch.load(Ordering::Acquire) {
                    // Superseded before we even started
                    continue;
                }
                match load_document(fetcher.as_ref(), decoder.as_ref(), &url) {
                    Ok(doc) => {
                        let page_count = doc.page_count();
                        document = Some((tag.epoch, doc));
                        cache.invalidate_all();
                        let _ = events.send(WorkerEvent::Opened { tag, page_count });
                    }
                    Err(fault) => {
                        let _ = events.send(WorkerEvent::LoadFailed { tag, fault });
                    }
                }
            }

            WorkerJob::Paint {
                epoch,
                paint_seq,
                params,
            } => {
                let Some((doc_epoch, doc)) = document.as_ref() else {
                    continue;
                };
                if *doc_epoch != epoch || epoch != current_epoch.load(Ordering::Acquire) {
                    continue;
                }
                let superseded = || current_epoch.load(Ordering::Acquire) != epoch;
                if let Some(pages) =
                    paint_all(doc.as_ref(), &params, &mut cache, superseded, telemetry.as_ref())
                {
                    let _ = events.send(WorkerEvent::Painted {
                        epoch,
                        paint_seq,
                        pages,
                    });
                }
            }

            WorkerJob::Clear => {
                document = None;
                cache.invalidate_all();
            }

            WorkerJob::Shutdown => break,
        }
    }
}

fn load_document(
    fetcher: &dyn DocumentFetcher,
    decoder: &dyn DocumentDecoder,
    url: &str,
) -> Result<Box<dyn DecodedDocument>, LoadFault> {
    let bytes = fetcher.fetch(url)?;
    Ok(decoder.open(&bytes)?)
}

/// Paint pages strictly in order, aborting between pages once superseded.
/// Returns `None` when aborted; a single page's failure only skips that page.
fn paint_all(
    doc: &dyn DecodedDocument,
    params: &PaintParams,
    cache: &mut SurfaceCache,
    superseded: impl Fn() -> bool,
    telemetry: &dyn Telemetry,
) -> Option<Vec<Arc<RenderedPage>>> {
    let page_count = doc.page_count();
    let mut pages = Vec::with_capacity(page_count);

    for page_index in 0..page_count {
        if superseded() {
            telemetry.debug(&format!("paint aborted at page {page_index}: superseded"));
            return None;
        }

        let key = SurfaceKey::from_params(page_index, params);
        if let Some(hit) = cache.get(&key) {
            pages.push(hit);
            continue;
        }

        match paint_page(doc, page_index, params) {
            Ok(page) => pages.push(cache.insert(key, page)),
            Err(e) => telemetry.warn(&format!("page {page_index} failed to paint: {e}")),
        }
    }

    Some(pages)
}

fn paint_page(
    doc: &dyn DecodedDocument,
    page_index: usize,
    params: &PaintParams,
) -> Result<RenderedPage, DecodeError> {
    let size = doc.page_size(page_index)?;
    let plan = RasterPlan::compute(size, params);
    let image = doc.render_page(page_index, plan.physical_scale)?;

    // Decoders round the transformed page bounds themselves; anything past
    // one pixel of the planned surface is a decoder fault, not rounding.
    if image.width_px.abs_diff(plan.surface_width) > 1
        || image.height_px.abs_diff(plan.surface_height) > 1
    {
        return Err(DecodeError::PageRender {
            page: page_index,
            detail: format!(
                "surface {}x{} deviates from planned {}x{}",
                image.width_px, image.height_px, plan.surface_width, plan.surface_height
            ),
        });
    }

    Ok(RenderedPage {
        page_index,
        scale_millionths: (plan.scale * 1_000_000.0) as u32,
        image,
    })
}
