// SPDX-License-Identifier: PMPL-1.0-or-later
// Copyright (c) 2026 Jonathan D.A. Jewell (hyperpolymath) <jonathan.jewell@open.ac.uk>
//
// posprint-document — Document side of the thermal pipeline.
//
// Rasterizes PDF pages to head-width RGBA buffers (PDFium), inspects PDFs
// without a renderer (lopdf), and enhances rasters for thermal output.

pub mod enhance;
pub mod inspect;
pub mod raster;

// Re-export the primary types so callers can use `posprint_document::PdfInfo` etc.
pub use enhance::ThermalEnhancer;
pub use inspect::{PageBox, PdfInfo};
pub use raster::pdfium::PdfiumRasterizer;
pub use raster::{DocumentGuard, PageRaster, RasterDocument, Rasterizer};
