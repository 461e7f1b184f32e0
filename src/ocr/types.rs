//! Shared types for the OCR pipeline.

use image::DynamicImage;
use serde::{Deserialize, Serialize};

/// Vertical distance between consecutive pages when blocks from a
/// multi-page document are projected into one shared coordinate space.
///
/// Blocks themselves always keep page-local coordinates plus an explicit
/// `page` number; the offset is applied only on demand via
/// [`WordBlock::bbox_in_document`], so it is trivially removable for
/// per-page rendering.
pub const PAGE_HEIGHT_OFFSET: f32 = 2000.0;

/// One rasterized document page, held only while it is being OCR'd.
#[derive(Debug)]
pub struct RasterPage {
    /// 1-based page number
    pub page: u32,
    /// Decoded raster image
    pub image: DynamicImage,
}

impl RasterPage {
    pub fn width(&self) -> u32 {
        self.image.width()
    }

    pub fn height(&self) -> u32 {
        self.image.height()
    }
}

/// One recognized word with page-local geometry.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct WordBlock {
    pub text: String,
    /// Recognition confidence in [0, 1]
    pub confidence: f32,
    /// Page-local bounding box as [x, y, w, h]
    pub bbox: [f32; 4],
    /// 1-based page number
    pub page: u32,
}

impl WordBlock {
    /// Bounding box projected into the single document-wide coordinate
    /// space, with pages stacked [`PAGE_HEIGHT_OFFSET`] units apart.
    pub fn bbox_in_document(&self) -> [f32; 4] {
        let offset = (self.page.saturating_sub(1)) as f32 * PAGE_HEIGHT_OFFSET;
        [self.bbox[0], self.bbox[1] + offset, self.bbox[2], self.bbox[3]]
    }
}

/// Aggregated OCR output for a whole document. Immutable once produced.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct OcrResult {
    /// Page texts joined with blank lines, in ascending page order
    pub text: String,
    pub blocks: Vec<WordBlock>,
    /// Mean of per-page confidences (not per-word)
    pub avg_confidence: f32,
    pub page_count: u32,
    pub from_cache: bool,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_document_offset_applied_per_page() {
        let block = WordBlock {
            text: "итого".to_string(),
            confidence: 0.9,
            bbox: [10.0, 120.0, 50.0, 20.0],
            page: 3,
        };

        let doc = block.bbox_in_document();
        assert_eq!(doc, [10.0, 120.0 + 2.0 * PAGE_HEIGHT_OFFSET, 50.0, 20.0]);

        // Page-local coordinates are untouched, so the offset is removable
        assert_eq!(block.bbox, [10.0, 120.0, 50.0, 20.0]);
    }

    #[test]
    fn test_first_page_has_no_offset() {
        let block = WordBlock {
            text: "x".to_string(),
            confidence: 1.0,
            bbox: [1.0, 2.0, 3.0, 4.0],
            page: 1,
        };
        assert_eq!(block.bbox_in_document(), block.bbox);
    }
}
