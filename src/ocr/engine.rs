//! Text-recognition engine interface and output normalization.
//!
//! The engine is an external collaborator: it receives a raster image and
//! a language tag and returns text plus word geometry with confidences on
//! the engine's native 0-100 scale. Normalization into [`WordBlock`]s
//! (0-1 confidences, page-local y-up coordinates, explicit page number)
//! happens here, so the coordinator never sees raw engine output.

use crate::ocr::types::{RasterPage, WordBlock};
use async_trait::async_trait;
use image::ImageFormat;
use std::io::Cursor;
use std::path::PathBuf;
use std::time::Duration;
use tokio::process::Command;

/// Timeout for one external recognition call.
const RECOGNIZE_TIMEOUT: Duration = Duration::from_secs(120);

/// One word as reported by the engine. Confidence is 0-100, bbox is
/// (left, top, width, height) with y growing downward.
#[derive(Debug, Clone)]
pub struct RecognizedWord {
    pub text: String,
    pub confidence: f32,
    pub x: f32,
    pub y: f32,
    pub w: f32,
    pub h: f32,
}

/// Raw engine output for one page.
#[derive(Debug, Clone, Default)]
pub struct RecognizedPage {
    pub text: String,
    pub words: Vec<RecognizedWord>,
    /// Page-level confidence, 0-100
    pub confidence: f32,
    pub image_height: f32,
}

/// External OCR engine contract.
#[async_trait]
pub trait OcrEngine: Send + Sync {
    async fn recognize(&self, page: &RasterPage, language: &str) -> Result<RecognizedPage, String>;
}

/// Convert raw engine words into normalized word blocks.
///
/// The vertical coordinate is flipped against the image height so block
/// origins are y-up, matching the renderer contract downstream.
pub fn normalize_blocks(page: &RecognizedPage, page_no: u32) -> Vec<WordBlock> {
    page.words
        .iter()
        .filter(|w| !w.text.trim().is_empty())
        .map(|w| WordBlock {
            text: w.text.trim().to_string(),
            confidence: (w.confidence / 100.0).clamp(0.0, 1.0),
            bbox: [w.x, page.image_height - w.y, w.w, w.h],
            page: page_no,
        })
        .collect()
}

/// OCR engine shelling out to the `tesseract` CLI with TSV output.
pub struct TesseractEngine {
    binary: PathBuf,
}

impl TesseractEngine {
    pub fn new() -> Self {
        Self {
            binary: PathBuf::from("tesseract"),
        }
    }

    pub fn with_binary(binary: PathBuf) -> Self {
        Self { binary }
    }

    fn scratch_input() -> PathBuf {
        std::env::temp_dir().join(format!("docufield-ocr-{}.png", uuid::Uuid::new_v4()))
    }
}

impl Default for TesseractEngine {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait]
impl OcrEngine for TesseractEngine {
    async fn recognize(&self, page: &RasterPage, language: &str) -> Result<RecognizedPage, String> {
        // Encode the (already preprocessed) raster to a scratch PNG for the CLI
        let mut png = Vec::new();
        page.image
            .write_to(&mut Cursor::new(&mut png), ImageFormat::Png)
            .map_err(|e| format!("failed to encode page for OCR: {}", e))?;

        let input = Self::scratch_input();
        tokio::fs::write(&input, &png)
            .await
            .map_err(|e| format!("failed to write OCR scratch file: {}", e))?;

        let mut command = Command::new(&self.binary);
        command
            .arg(&input)
            .arg("stdout")
            .args(["-l", language])
            .args(["--psm", "3"])
            .args(["-c", "preserve_interword_spaces=1"])
            .arg("tsv");

        let output = tokio::time::timeout(RECOGNIZE_TIMEOUT, command.output()).await;
        let _ = tokio::fs::remove_file(&input).await;

        let output = output
            .map_err(|_| "tesseract timed out".to_string())?
            .map_err(|e| format!("failed to run tesseract: {}", e))?;

        if !output.status.success() {
            let stderr = String::from_utf8_lossy(&output.stderr);
            return Err(format!("tesseract failed: {}", stderr.trim()));
        }

        let tsv = String::from_utf8_lossy(&output.stdout);
        Ok(parse_tsv(&tsv, page.height() as f32))
    }
}

/// Parse tesseract TSV output into a [`RecognizedPage`].
///
/// Word rows carry level 5; line breaks are reconstructed from the
/// (block, paragraph, line) triple.
pub fn parse_tsv(tsv: &str, image_height: f32) -> RecognizedPage {
    let mut words = Vec::new();
    let mut text = String::new();
    let mut current_line: Option<(u32, u32, u32)> = None;

    for row in tsv.lines().skip(1) {
        let cols: Vec<&str> = row.split('\t').collect();
        if cols.len() < 12 || cols[0] != "5" {
            continue;
        }

        let word = cols[11].trim();
        if word.is_empty() {
            continue;
        }

        let parse = |s: &str| s.trim().parse::<f32>().unwrap_or(0.0);
        let confidence = parse(cols[10]);
        if confidence < 0.0 {
            continue;
        }

        let line_key = (
            cols[2].trim().parse().unwrap_or(0),
            cols[3].trim().parse().unwrap_or(0),
            cols[4].trim().parse().unwrap_or(0),
        );
        match current_line {
            Some(prev) if prev == line_key => text.push(' '),
            Some(_) => text.push('\n'),
            None => {}
        }
        current_line = Some(line_key);
        text.push_str(word);

        words.push(RecognizedWord {
            text: word.to_string(),
            confidence,
            x: parse(cols[6]),
            y: parse(cols[7]),
            w: parse(cols[8]),
            h: parse(cols[9]),
        });
    }

    let confidence = if words.is_empty() {
        0.0
    } else {
        words.iter().map(|w| w.confidence).sum::<f32>() / words.len() as f32
    };

    RecognizedPage {
        text,
        words,
        confidence,
        image_height,
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    const HEADER: &str =
        "level\tpage_num\tblock_num\tpar_num\tline_num\tword_num\tleft\ttop\twidth\theight\tconf\ttext";

    fn word_row(block: u32, line: u32, word: u32, left: u32, conf: &str, text: &str) -> String {
        format!(
            "5\t1\t{}\t1\t{}\t{}\t{}\t40\t80\t20\t{}\t{}",
            block, line, word, left, conf, text
        )
    }

    #[test]
    fn test_parse_tsv_words_and_lines() {
        let tsv = [
            HEADER.to_string(),
            "4\t1\t1\t1\t1\t0\t0\t0\t500\t30\t-1\t".to_string(),
            word_row(1, 1, 1, 10, "96.5", "Дата:"),
            word_row(1, 1, 2, 120, "91.0", "12.05.2024"),
            word_row(1, 2, 1, 10, "88.0", "Итого"),
        ]
        .join("\n");

        let page = parse_tsv(&tsv, 1000.0);
        assert_eq!(page.text, "Дата: 12.05.2024\nИтого");
        assert_eq!(page.words.len(), 3);
        assert!((page.confidence - 91.833336).abs() < 0.01);
    }

    #[test]
    fn test_parse_tsv_skips_low_confidence_rows() {
        let tsv = [HEADER.to_string(), word_row(1, 1, 1, 0, "-1", "мусор")].join("\n");
        let page = parse_tsv(&tsv, 500.0);
        assert!(page.words.is_empty());
        assert!(page.text.is_empty());
        assert_eq!(page.confidence, 0.0);
    }

    #[test]
    fn test_normalize_flips_vertical_axis_and_scales_confidence() {
        let page = RecognizedPage {
            text: "слово".to_string(),
            words: vec![RecognizedWord {
                text: " слово ".to_string(),
                confidence: 80.0,
                x: 15.0,
                y: 100.0,
                w: 60.0,
                h: 22.0,
            }],
            confidence: 80.0,
            image_height: 1000.0,
        };

        let blocks = normalize_blocks(&page, 2);
        assert_eq!(blocks.len(), 1);
        assert_eq!(blocks[0].text, "слово");
        assert_eq!(blocks[0].confidence, 0.8);
        assert_eq!(blocks[0].bbox, [15.0, 900.0, 60.0, 22.0]);
        assert_eq!(blocks[0].page, 2);
    }

    #[test]
    fn test_normalize_drops_empty_words() {
        let page = RecognizedPage {
            text: String::new(),
            words: vec![RecognizedWord {
                text: "   ".to_string(),
                confidence: 50.0,
                x: 0.0,
                y: 0.0,
                w: 5.0,
                h: 5.0,
            }],
            confidence: 50.0,
            image_height: 100.0,
        };
        assert!(normalize_blocks(&page, 1).is_empty());
    }
}
