// SPDX-License-Identifier: PMPL-1.0-or-later
// Copyright (c) 2026 Jonathan D.A. Jewell (hyperpolymath) <jonathan.jewell@open.ac.uk>
//
// PDF inspection: page count, version and page sizes read with `lopdf`,
// without a native renderer.

use std::path::Path;

use lopdf::{Dictionary, Document, Object, ObjectId};
use posprint_core::error::{PosPrintError, Result};
use serde::Serialize;
use tracing::{debug, instrument};

/// US Letter, used when a page carries no MediaBox anywhere in its tree.
const DEFAULT_MEDIA_BOX: (f32, f32) = (612.0, 792.0);

/// Size of one page in PDF points.
#[derive(Debug, Clone, Copy, PartialEq, Serialize)]
pub struct PageBox {
    pub width_pt: f32,
    pub height_pt: f32,
}

impl PageBox {
    /// Rendered height in pixels when scaled to `head_width` pixels wide.
    pub fn scaled_height(&self, head_width: u32) -> u32 {
        if self.width_pt <= 0.0 {
            return 0;
        }
        (self.height_pt * head_width as f32 / self.width_pt).round() as u32
    }
}

/// Summary of a PDF file.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct PdfInfo {
    pub version: String,
    pub page_count: usize,
    pub pages: Vec<PageBox>,
}

impl PdfInfo {
    /// Read the summary of the PDF at `path`.
    #[instrument(skip_all, fields(path = %path.as_ref().display()))]
    pub fn probe(path: impl AsRef<Path>) -> Result<Self> {
        let path = path.as_ref();
        if !path.is_file() {
            return Err(PosPrintError::FileNotFound(path.to_path_buf()));
        }
        let document = Document::load(path).map_err(|err| {
            PosPrintError::PdfError(format!("failed to open {}: {}", path.display(), err))
        })?;
        Ok(Self::from_document(&document))
    }

    /// Summarise PDF bytes already in memory.
    pub fn from_bytes(data: &[u8]) -> Result<Self> {
        let document = Document::load_mem(data).map_err(|err| {
            PosPrintError::PdfError(format!("failed to load PDF from memory: {}", err))
        })?;
        Ok(Self::from_document(&document))
    }

    fn from_document(document: &Document) -> Self {
        let pages: Vec<PageBox> = document
            .get_pages()
            .values()
            .map(|id| media_box(document, *id))
            .collect();
        debug!(pages = pages.len(), version = %document.version, "PDF inspected");

        Self {
            version: document.version.clone(),
            page_count: pages.len(),
            pages,
        }
    }
}

/// Resolve a page's MediaBox, following `/Parent` for inherited values.
fn media_box(document: &Document, page_id: ObjectId) -> PageBox {
    let mut current = document.get_dictionary(page_id).ok();
    // Page trees are shallow; the bound stops reference cycles.
    for _ in 0..32 {
        let Some(dict) = current else { break };
        if let Some(page_box) = read_box(dict) {
            return page_box;
        }
        current = dict
            .get(b"Parent")
            .and_then(Object::as_reference)
            .and_then(|id| document.get_dictionary(id))
            .ok();
    }
    PageBox {
        width_pt: DEFAULT_MEDIA_BOX.0,
        height_pt: DEFAULT_MEDIA_BOX.1,
    }
}

fn read_box(dict: &Dictionary) -> Option<PageBox> {
    let values = dict.get(b"MediaBox").and_then(Object::as_array).ok()?;
    if values.len() != 4 {
        return None;
    }
    let coords: Vec<f32> = values.iter().filter_map(number).collect();
    if coords.len() != 4 {
        return None;
    }
    Some(PageBox {
        width_pt: (coords[2] - coords[0]).abs(),
        height_pt: (coords[3] - coords[1]).abs(),
    })
}

fn number(object: &Object) -> Option<f32> {
    match object {
        Object::Integer(value) => Some(*value as f32),
        Object::Real(value) => Some(*value as f32),
        _ => None,
    }
}

#[cfg(test)]
mod tests {
    use lopdf::{Stream, dictionary};

    use super::*;

    fn media_box_array(width: i64, height: i64) -> Vec<Object> {
        vec![
            Object::Integer(0),
            Object::Integer(0),
            Object::Integer(width),
            Object::Integer(height),
        ]
    }

    /// Build a PDF whose pages inherit a receipt-sized MediaBox from the page
    /// tree, except the last page, which overrides it.
    fn receipt_pdf(page_count: usize) -> Vec<u8> {
        let mut doc = Document::with_version("1.5");
        let pages_id = doc.new_object_id();

        let mut kids: Vec<Object> = Vec::new();
        for index in 0..page_count {
            let content_id = doc.add_object(Stream::new(dictionary! {}, Vec::new()));
            let mut page = dictionary! {
                "Type" => "Page",
                "Parent" => pages_id,
                "Contents" => content_id,
            };
            if index + 1 == page_count {
                page.set("MediaBox", media_box_array(136, 400));
            }
            kids.push(doc.add_object(page).into());
        }

        doc.objects.insert(
            pages_id,
            Object::Dictionary(dictionary! {
                "Type" => "Pages",
                "Kids" => kids,
                "Count" => page_count as i64,
                "MediaBox" => media_box_array(204, 600),
            }),
        );
        let catalog_id = doc.add_object(dictionary! {
            "Type" => "Catalog",
            "Pages" => pages_id,
        });
        doc.trailer.set("Root", catalog_id);

        let mut bytes = Vec::new();
        doc.save_to(&mut bytes).expect("serialise test PDF");
        bytes
    }

    #[test]
    fn reads_inherited_and_overridden_media_boxes() {
        let info = PdfInfo::from_bytes(&receipt_pdf(3)).expect("probe");
        assert_eq!(info.page_count, 3);
        assert_eq!(info.version, "1.5");
        assert_eq!(info.pages[0].width_pt, 204.0);
        assert_eq!(info.pages[0].height_pt, 600.0);
        assert_eq!(info.pages[2].width_pt, 136.0);
    }

    #[test]
    fn scaled_height_keeps_aspect_ratio() {
        let page = PageBox {
            width_pt: 204.0,
            height_pt: 600.0,
        };
        assert_eq!(page.scaled_height(384), 1129);
    }

    #[test]
    fn probe_missing_file_is_not_found() {
        let err = PdfInfo::probe("/definitely/not/here.pdf").expect_err("missing file");
        assert!(matches!(err, PosPrintError::FileNotFound(_)));
    }

    #[test]
    fn probe_reads_file_from_disk() {
        let dir = tempfile::tempdir().expect("tempdir");
        let path = dir.path().join("receipt.pdf");
        std::fs::write(&path, receipt_pdf(2)).expect("write PDF");
        let info = PdfInfo::probe(&path).expect("probe");
        assert_eq!(info.page_count, 2);
    }

    #[test]
    fn garbage_bytes_are_rejected() {
        let err = PdfInfo::from_bytes(b"not a pdf").expect_err("garbage");
        assert!(matches!(err, PosPrintError::PdfError(_)));
    }
}
