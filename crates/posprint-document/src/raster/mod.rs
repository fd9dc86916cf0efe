// SPDX-License-Identifier: PMPL-1.0-or-later
// Copyright (c) 2026 Jonathan D.A. Jewell (hyperpolymath) <jonathan.jewell@open.ac.uk>
//
// Page rasterizer abstraction.
//
// A `Rasterizer` opens a document; the returned `RasterDocument` renders one
// page at a time to an RGBA buffer scaled to the head width. Decoder handles
// are released through `DocumentGuard`, which closes the document exactly
// once on every exit path.

pub mod pdfium;

use std::ops::{Deref, DerefMut};
use std::path::Path;
use std::sync::Arc;

use image::RgbaImage;
use posprint_core::error::Result;

/// One rendered page at device resolution.
///
/// Transient: produced per page, consumed by enhancement and tiling, dropped
/// before the next page is rendered.
#[derive(Debug, Clone, PartialEq)]
pub struct PageRaster {
    image: RgbaImage,
}

impl PageRaster {
    pub fn new(image: RgbaImage) -> Self {
        Self { image }
    }

    pub fn width(&self) -> u32 {
        self.image.width()
    }

    pub fn height(&self) -> u32 {
        self.image.height()
    }

    pub fn image(&self) -> &RgbaImage {
        &self.image
    }

    pub fn into_image(self) -> RgbaImage {
        self.image
    }
}

impl From<RgbaImage> for PageRaster {
    fn from(image: RgbaImage) -> Self {
        Self::new(image)
    }
}

/// An open document handle.
pub trait RasterDocument {
    /// Number of pages; zero once closed.
    fn page_count(&self) -> usize;

    /// Render page `index` scaled to `width` pixels wide, height proportional,
    /// on a white background.
    ///
    /// Fails with `PageIndexOutOfRange` if `index >= page_count()`.
    fn render_page(&mut self, index: usize, width: u32) -> Result<PageRaster>;

    /// Release decoder resources. Further calls are no-ops.
    fn close(&mut self);
}

/// Opens documents for rendering.
pub trait Rasterizer: Send + Sync {
    type Document<'a>: RasterDocument
    where
        Self: 'a;

    /// Open the document at `path`.
    ///
    /// Fails with `FileNotFound` if the path is not an existing file and
    /// `RenderInit` if the decoder rejects it.
    fn open<'a>(&'a self, path: &Path) -> Result<Self::Document<'a>>;
}

impl<R: Rasterizer> Rasterizer for Arc<R> {
    type Document<'a>
        = R::Document<'a>
    where
        Self: 'a;

    fn open<'a>(&'a self, path: &Path) -> Result<Self::Document<'a>> {
        (**self).open(path)
    }
}

/// Owns an open document and closes it on drop.
pub struct DocumentGuard<D: RasterDocument> {
    document: D,
}

impl<D: RasterDocument> DocumentGuard<D> {
    pub fn new(document: D) -> Self {
        Self { document }
    }
}

impl<D: RasterDocument> Deref for DocumentGuard<D> {
    type Target = D;

    fn deref(&self) -> &D {
        &self.document
    }
}

impl<D: RasterDocument> DerefMut for DocumentGuard<D> {
    fn deref_mut(&mut self) -> &mut D {
        &mut self.document
    }
}

impl<D: RasterDocument> Drop for DocumentGuard<D> {
    fn drop(&mut self) {
        self.document.close();
    }
}
