// SPDX-License-Identifier: PMPL-1.0-or-later
// Copyright (c) 2026 Jonathan D.A. Jewell (hyperpolymath) <jonathan.jewell@open.ac.uk>
//
// PDFium-backed page rasterizer using the `pdfium-render` crate.

use std::path::{Path, PathBuf};

use image::RgbaImage;
use pdfium_render::prelude::*;
use posprint_core::error::{PosPrintError, Result};
use tracing::{debug, info, instrument};

use super::{PageRaster, RasterDocument, Rasterizer};

/// Renders PDF pages through a dynamically bound `libpdfium`.
pub struct PdfiumRasterizer {
    pdfium: Pdfium,
}

impl PdfiumRasterizer {
    // -- Construction ---------------------------------------------------------

    /// Bind `libpdfium`, looking in `library_dir` (or next to the working
    /// directory) first and falling back to the system library path.
    #[instrument(skip_all)]
    pub fn new(library_dir: Option<&Path>) -> Result<Self> {
        let dir = library_dir.unwrap_or_else(|| Path::new("./"));
        let bindings = Pdfium::bind_to_library(Pdfium::pdfium_platform_library_name_at_path(dir))
            .or_else(|_| Pdfium::bind_to_system_library())
            .map_err(|err| {
                PosPrintError::RenderInit(format!("failed to bind libpdfium: {}", err))
            })?;
        info!(dir = %dir.display(), "PDFium bound");
        Ok(Self {
            pdfium: Pdfium::new(bindings),
        })
    }
}

impl Rasterizer for PdfiumRasterizer {
    type Document<'a> = PdfiumDocument<'a>;

    #[instrument(skip(self), fields(path = %path.display()))]
    fn open<'a>(&'a self, path: &Path) -> Result<PdfiumDocument<'a>> {
        if !path.is_file() {
            return Err(PosPrintError::FileNotFound(path.to_path_buf()));
        }
        let document = self.pdfium.load_pdf_from_file(path, None).map_err(|err| {
            PosPrintError::RenderInit(format!("failed to open {}: {}", path.display(), err))
        })?;
        let page_count = document.pages().len() as usize;
        debug!(pages = page_count, "PDF opened for rasterizing");

        Ok(PdfiumDocument {
            document: Some(document),
            page_count,
            path: path.to_path_buf(),
        })
    }
}

/// An open PDFium document. Dropping the inner handle frees the native
/// document.
pub struct PdfiumDocument<'a> {
    document: Option<PdfDocument<'a>>,
    page_count: usize,
    path: PathBuf,
}

impl RasterDocument for PdfiumDocument<'_> {
    fn page_count(&self) -> usize {
        if self.document.is_some() {
            self.page_count
        } else {
            0
        }
    }

    fn render_page(&mut self, index: usize, width: u32) -> Result<PageRaster> {
        let page_count = self.page_count();
        if index >= page_count {
            return Err(PosPrintError::PageIndexOutOfRange { index, page_count });
        }
        let document = self
            .document
            .as_ref()
            .ok_or_else(|| PosPrintError::Render("document already closed".into()))?;

        let page = document
            .pages()
            .get(index as PdfPageIndex)
            .map_err(|err| PosPrintError::Render(format!("page {}: {}", index, err)))?;

        let config = PdfRenderConfig::new()
            .set_target_width(width as i32)
            .set_clear_color(PdfColor::WHITE);

        let bitmap = page
            .render_with_config(&config)
            .map_err(|err| PosPrintError::Render(format!("page {}: {}", index, err)))?;

        let (bitmap_width, bitmap_height) = (bitmap.width() as u32, bitmap.height() as u32);
        let image = RgbaImage::from_raw(bitmap_width, bitmap_height, bitmap.as_rgba_bytes())
            .ok_or_else(|| {
                PosPrintError::Render(format!(
                    "page {}: bitmap buffer does not match {}x{}",
                    index, bitmap_width, bitmap_height
                ))
            })?;

        debug!(page = index, width = bitmap_width, height = bitmap_height, "page rendered");
        Ok(PageRaster::new(image))
    }

    fn close(&mut self) {
        if self.document.take().is_some() {
            debug!(path = %self.path.display(), "PDF closed");
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn shareable<T: Send + Sync>() {}

    #[test]
    fn rasterizer_can_move_into_print_worker() {
        shareable::<PdfiumRasterizer>();
    }

    #[test]
    fn missing_file_is_not_found() {
        let Ok(rasterizer) = PdfiumRasterizer::new(None) else {
            // No libpdfium on this machine.
            return;
        };
        let err = rasterizer
            .open(Path::new("/no/such/file.pdf"))
            .err()
            .expect("missing file");
        assert!(matches!(err, PosPrintError::FileNotFound(_)));
    }
}
