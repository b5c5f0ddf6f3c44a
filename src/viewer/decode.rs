//! Document decoder boundary
//!
//! The engine sees documents only through this narrow interface; the byte
//! format is entirely the decoder's business. Decoded documents live on the
//! worker thread for their whole life and never cross threads.

use std::sync::Once;

use super::types::RasterImage;

/// Why decoding or page rasterization failed
#[derive(Debug, thiserror::Error)]
pub enum DecodeError {
    #[error("not a valid document: {0}")]
    Malformed(String),

    #[error("page {page} out of range (document has {page_count})")]
    PageOutOfRange { page: usize, page_count: usize },

    #[error("page {page} failed to render: {detail}")]
    PageRender { page: usize, detail: String },
}

/// Opens raw bytes into a page-addressable document
pub trait DocumentDecoder: Send {
    fn open(&self, bytes: &[u8]) -> Result<Box<dyn DecodedDocument>, DecodeError>;
}

/// A decoded, page-addressable document
pub trait DecodedDocument {
    fn page_count(&self) -> usize;

    /// Intrinsic page size at scale 1, in logical units
    fn page_size(&self, page: usize) -> Result<(f32, f32), DecodeError>;

    /// Rasterize a page at the given physical scale into RGB pixels
    fn render_page(&self, page: usize, scale: f32) -> Result<RasterImage, DecodeError>;
}

static ENGINE_INIT: Once = Once::new();

/// One-time process-wide decoder setup.
///
/// Safe to call from every engine instance; only the first call does
/// anything. Decoder implementations call this from their constructors so
/// setup is an explicit step rather than a module-load side effect.
pub fn ensure_engine_initialized() {
    ENGINE_INIT.call_once(|| {
        log::debug!("document render engine initialized");
    });
}

#[cfg(feature = "pdf")]
pub use self::pdf::PdfDecoder;

#[cfg(feature = "pdf")]
mod pdf {
    use mupdf::{Colorspace, Document, Matrix, Page, Pixmap};

    use super::{ensure_engine_initialized, DecodeError, DecodedDocument, DocumentDecoder};
    use crate::viewer::types::RasterImage;

    /// MuPDF-backed decoder
    pub struct PdfDecoder;

    impl PdfDecoder {
        #[must_use]
        pub fn new() -> Self {
            ensure_engine_initialized();
            Self
        }
    }

    impl Default for PdfDecoder {
        fn default() -> Self {
            Self::new()
        }
    }

    impl DocumentDecoder for PdfDecoder {
        fn open(&self, bytes: &[u8]) -> Result<Box<dyn DecodedDocument>, DecodeError> {
            let doc = Document::from_bytes(bytes, "application/pdf")
                .map_err(|e| DecodeError::Malformed(e.to_string()))?;
            let page_count = doc
                .page_count()
                .map_err(|e| DecodeError::Malformed(e.to_string()))? as usize;

            Ok(Box::new(PdfDocument { doc, page_count }))
        }
    }

    struct PdfDocument {
        doc: Document,
        page_count: usize,
    }

    impl PdfDocument {
        fn load(&self, page: usize) -> Result<Page, DecodeError> {
            if page >= self.page_count {
                return Err(DecodeError::PageOutOfRange {
                    page,
                    page_count: self.page_count,
                });
            }
            self.doc
                .load_page(page as i32)
                .map_err(|e| DecodeError::PageRender {
                    page,
                    detail: e.to_string(),
                })
        }
    }

    impl DecodedDocument for PdfDocument {
        fn page_count(&self) -> usize {
            self.page_count
        }

        fn page_size(&self, page: usize) -> Result<(f32, f32), DecodeError> {
            let bounds = self
                .load(page)?
                .bounds()
                .map_err(|e| DecodeError::PageRender {
                    page,
                    detail: e.to_string(),
                })?;
            Ok((bounds.x1 - bounds.x0, bounds.y1 - bounds.y0))
        }

        fn render_page(&self, page: usize, scale: f32) -> Result<RasterImage, DecodeError> {
            let loaded = self.load(page)?;
            let transform = Matrix::new_scale(scale, scale);
            let rgb = Colorspace::device_rgb();
            let pixmap = loaded
                .to_pixmap(&transform, &rgb, false, false)
                .map_err(|e| DecodeError::PageRender {
                    page,
                    detail: e.to_string(),
                })?;

            pixmap_to_rgb(&pixmap, page)
        }
    }

    /// Repack pixmap samples into tightly-rowed RGB, dropping alpha if present
    fn pixmap_to_rgb(pixmap: &Pixmap, page: usize) -> Result<RasterImage, DecodeError> {
        let n = pixmap.n() as usize;
        if n < 3 {
            return Err(DecodeError::PageRender {
                page,
                detail: format!("unsupported pixmap format: {n} channels"),
            });
        }

        let width = pixmap.width() as usize;
        let height = pixmap.height() as usize;
        let stride = pixmap.stride() as usize;
        let samples = pixmap.samples();
        let row_bytes = width * n;
        if samples.len() < stride.saturating_mul(height) || row_bytes > stride {
            return Err(DecodeError::PageRender {
                page,
                detail: "pixmap buffer size mismatch".into(),
            });
        }

        let mut pixels = Vec::with_capacity(width * height * 3);
        for y in 0..height {
            let row = &samples[y * stride..y * stride + row_bytes];
            if n == 3 {
                pixels.extend_from_slice(row);
            } else {
                for px in row.chunks_exact(n) {
                    pixels.extend_from_slice(&px[..3]);
                }
            }
        }

        Ok(RasterImage {
            pixels,
            width_px: pixmap.width(),
            height_px: pixmap.height(),
        })
    }
}
