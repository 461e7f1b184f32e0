//! PDF page rasterization.
//!
//! The default backend shells out to poppler (`pdftoppm` / `pdfinfo`),
//! which is what most servers already have installed. With the `pdfium`
//! feature enabled the pdfium library is used instead.
//!
//! Page-count resolution order: introspection (`pdfinfo` or the pdfium
//! document API), then a bounded sequential probe, then 1.

use crate::ocr::preprocess::downscale_for_ocr;
use crate::ocr::types::RasterPage;
use async_trait::async_trait;
use std::path::{Path, PathBuf};
use std::time::Duration;
use tokio::process::Command;

/// Hard cap for the sequential page-count probe.
pub const MAX_PROBE_PAGES: u32 = 100;

/// Render resolution passed to the backend.
const RENDER_DPI: u32 = 300;

/// Timeout for one external rasterization call.
const RASTERIZE_TIMEOUT: Duration = Duration::from_secs(60);

/// Converts one page of a multi-page document into a raster image.
#[async_trait]
pub trait PageRasterizer: Send + Sync {
    /// Number of pages in the document. Falls back to best-effort probing;
    /// never returns 0.
    async fn page_count(&self, path: &Path) -> Result<u32, String>;

    /// Rasterize one page (1-based). Errors on invalid page index or
    /// corrupt input.
    async fn rasterize(&self, path: &Path, page: u32) -> Result<RasterPage, String>;
}

/// Rasterizer backed by the poppler CLI tools.
pub struct PopplerRasterizer;

impl PopplerRasterizer {
    pub fn new() -> Self {
        Self
    }

    /// Parse the "Pages: N" line out of `pdfinfo` output.
    fn parse_pdfinfo_pages(stdout: &str) -> Option<u32> {
        stdout
            .lines()
            .find_map(|line| line.strip_prefix("Pages:"))
            .and_then(|rest| rest.trim().parse::<u32>().ok())
    }

    /// Probe pages sequentially until the first failure, capped at
    /// [`MAX_PROBE_PAGES`].
    async fn probe_page_count(&self, path: &Path) -> u32 {
        let mut count = 0;
        for page in 1..=MAX_PROBE_PAGES {
            match self.rasterize(path, page).await {
                Ok(_) => count = page,
                Err(_) => break,
            }
        }
        count.max(1)
    }

    fn scratch_png(page: u32) -> PathBuf {
        std::env::temp_dir().join(format!("docufield-raster-{}-{}", uuid::Uuid::new_v4(), page))
    }
}

impl Default for PopplerRasterizer {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait]
impl PageRasterizer for PopplerRasterizer {
    async fn page_count(&self, path: &Path) -> Result<u32, String> {
        let output = Command::new("pdfinfo").arg(path).output().await;

        if let Ok(out) = output {
            if out.status.success() {
                let stdout = String::from_utf8_lossy(&out.stdout);
                if let Some(pages) = Self::parse_pdfinfo_pages(&stdout) {
                    return Ok(pages.max(1));
                }
            }
        }

        tracing::debug!(
            "[Rasterizer] pdfinfo unavailable for {}, probing pages",
            path.display()
        );
        Ok(self.probe_page_count(path).await)
    }

    async fn rasterize(&self, path: &Path, page: u32) -> Result<RasterPage, String> {
        if page == 0 {
            return Err("page numbers are 1-based".to_string());
        }

        let out_prefix = Self::scratch_png(page);
        let out_png = out_prefix.with_extension("png");

        let mut command = Command::new("pdftoppm");
        command
            .arg(path)
            .arg(&out_prefix)
            .arg("-png")
            .arg("-singlefile")
            .args(["-r", &RENDER_DPI.to_string()])
            .args(["-f", &page.to_string()])
            .args(["-l", &page.to_string()]);

        let output = tokio::time::timeout(RASTERIZE_TIMEOUT, command.output())
            .await
            .map_err(|_| format!("pdftoppm timed out on page {}", page))?
            .map_err(|e| format!("failed to run pdftoppm: {}", e))?;

        if !output.status.success() {
            let stderr = String::from_utf8_lossy(&output.stderr);
            return Err(format!(
                "pdftoppm failed on page {}: {}",
                page,
                stderr.trim()
            ));
        }

        let bytes = tokio::fs::read(&out_png)
            .await
            .map_err(|e| format!("pdftoppm produced no output for page {}: {}", page, e))?;
        let _ = tokio::fs::remove_file(&out_png).await;

        // Decoding and downscaling are CPU-bound
        let image = tokio::task::spawn_blocking(move || {
            image::load_from_memory(&bytes)
                .map(downscale_for_ocr)
                .map_err(|e| format!("failed to decode rasterized page: {}", e))
        })
        .await
        .map_err(|e| format!("raster decode task failed: {}", e))??;

        Ok(RasterPage { page, image })
    }
}

/// Rasterizer backed by the pdfium library.
#[cfg(feature = "pdfium")]
pub struct PdfiumRasterizer;

#[cfg(feature = "pdfium")]
impl PdfiumRasterizer {
    pub fn new() -> Self {
        Self
    }

    fn page_count_blocking(path: &Path) -> Result<u32, String> {
        use pdfium_render::prelude::*;

        let pdfium = Pdfium::default()
            .map_err(|e| format!("failed to initialize pdfium: {}", e))?;
        let document = pdfium
            .load_pdf_from_file(path, None)
            .map_err(|e| format!("failed to load PDF: {}", e))?;
        Ok((document.pages().len() as u32).max(1))
    }

    fn rasterize_blocking(path: &Path, page_no: u32) -> Result<RasterPage, String> {
        use pdfium_render::prelude::*;

        let pdfium = Pdfium::default()
            .map_err(|e| format!("failed to initialize pdfium: {}", e))?;
        let document = pdfium
            .load_pdf_from_file(path, None)
            .map_err(|e| format!("failed to load PDF: {}", e))?;

        let page = document
            .pages()
            .get((page_no - 1) as u16)
            .map_err(|e| format!("failed to get page {}: {}", page_no, e))?;

        let page_width = page.width().value;
        let scale = RENDER_DPI as f32 / 72.0;
        let config = PdfRenderConfig::new()
            .set_target_width((page_width * scale) as i32)
            .render_form_data(true)
            .render_annotations(true);

        let bitmap = page
            .render_with_config(&config)
            .map_err(|e| format!("failed to render page {}: {}", page_no, e))?;

        Ok(RasterPage {
            page: page_no,
            image: downscale_for_ocr(bitmap.as_image()),
        })
    }
}

#[cfg(feature = "pdfium")]
#[async_trait]
impl PageRasterizer for PdfiumRasterizer {
    async fn page_count(&self, path: &Path) -> Result<u32, String> {
        let path = path.to_path_buf();
        tokio::task::spawn_blocking(move || Self::page_count_blocking(&path))
            .await
            .map_err(|e| format!("page count task failed: {}", e))?
    }

    async fn rasterize(&self, path: &Path, page: u32) -> Result<RasterPage, String> {
        if page == 0 {
            return Err("page numbers are 1-based".to_string());
        }
        let path = path.to_path_buf();
        tokio::task::spawn_blocking(move || Self::rasterize_blocking(&path, page))
            .await
            .map_err(|e| format!("rasterize task failed: {}", e))?
    }
}
