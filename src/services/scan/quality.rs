// src/services/scan/quality.rs

//! Screenshot quality analysis: white, blank and undecodable renders.

use std::collections::HashMap;
use std::path::{Path, PathBuf};

use image::DynamicImage;
use image::imageops::FilterType;

use crate::models::{QualityConfig, QualityKind, ScreenshotQualityIssue, Severity};

/// Classifies screenshots by how much of them is near-white or one flat color.
#[derive(Debug, Clone)]
pub struct QualityAnalyzer {
    config: QualityConfig,
}

impl QualityAnalyzer {
    pub fn new(config: QualityConfig) -> Self {
        Self { config }
    }

    /// Analyze a screenshot file on the blocking pool.
    pub async fn analyze(&self, path: PathBuf) -> ScreenshotQualityIssue {
        let analyzer = self.clone();
        match tokio::task::spawn_blocking(move || analyzer.analyze_file(&path)).await {
            Ok(issue) => issue,
            Err(e) => error_issue(format!("Analysis task failed: {e}")),
        }
    }

    /// Decode and analyze a screenshot file.
    pub fn analyze_file(&self, path: &Path) -> ScreenshotQualityIssue {
        match image::open(path) {
            Ok(image) => self.analyze_image(&image),
            Err(e) => error_issue(format!("Could not decode {}: {e}", path.display())),
        }
    }

    pub fn analyze_image(&self, image: &DynamicImage) -> ScreenshotQualityIssue {
        let size = self.config.sample_size.max(1);
        let sample = if image.width() > size || image.height() > size {
            image.resize(size, size, FilterType::Nearest)
        } else {
            image.clone()
        };
        let rgb = sample.to_rgb8();

        let total = rgb.width() as u64 * rgb.height() as u64;
        if total == 0 {
            return error_issue("Screenshot has no pixels".to_string());
        }

        let threshold = self.config.white_threshold;
        let mut white = 0u64;
        let mut buckets: HashMap<[u8; 3], u64> = HashMap::new();
        for pixel in rgb.pixels() {
            let [r, g, b] = pixel.0;
            if r > threshold && g > threshold && b > threshold {
                white += 1;
            }
            *buckets.entry([r >> 4, g >> 4, b >> 4]).or_default() += 1;
        }
        let dominant = buckets.values().copied().max().unwrap_or(0);

        let white_pct = percent(white, total);
        let dominant_pct = percent(dominant, total);

        if white_pct >= self.config.all_white_percent {
            ScreenshotQualityIssue {
                kind: QualityKind::AllWhite,
                severity: Severity::Error,
                message: format!("Screenshot is {white_pct:.1}% white"),
                white_percentage: white_pct,
            }
        } else if dominant_pct >= self.config.blank_percent {
            ScreenshotQualityIssue {
                kind: QualityKind::Blank,
                severity: Severity::Error,
                message: format!("Screenshot is {dominant_pct:.1}% a single flat color"),
                white_percentage: white_pct,
            }
        } else if white_pct >= self.config.mostly_white_percent {
            ScreenshotQualityIssue {
                kind: QualityKind::MostlyWhite,
                severity: Severity::Warning,
                message: format!("Screenshot is {white_pct:.1}% white"),
                white_percentage: white_pct,
            }
        } else {
            ScreenshotQualityIssue {
                kind: QualityKind::Normal,
                severity: Severity::Info,
                message: "Screenshot looks normal".to_string(),
                white_percentage: white_pct,
            }
        }
    }
}

fn percent(part: u64, total: u64) -> f64 {
    let raw = part as f64 * 100.0 / total as f64;
    (raw * 100.0).round() / 100.0
}

fn error_issue(message: String) -> ScreenshotQualityIssue {
    ScreenshotQualityIssue {
        kind: QualityKind::Error,
        severity: Severity::Warning,
        message,
        white_percentage: 0.0,
    }
}
