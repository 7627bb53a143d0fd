// src/services/scan/screenshot.rs

//! Screenshot capture with retries and desktop center-cropping.

use std::path::{Path, PathBuf};
use std::time::Duration;

use crate::browser::{BrowserPage, ScreenshotOptions};
use crate::error::{AppError, Result};
use crate::models::{ScanConfig, ViewportMode, ViewportName};
use crate::utils::{get_domain, page_key};

/// Captures full-page screenshots into `{output_dir}/{domain}/`.
#[derive(Debug, Clone)]
pub struct ScreenshotCapture {
    output_dir: PathBuf,
    attempts: u32,
    retry_delay: Duration,
    attempt_timeout: Duration,
    max_width: u32,
}

impl ScreenshotCapture {
    pub fn new(config: &ScanConfig) -> Self {
        Self {
            output_dir: PathBuf::from(&config.output_dir),
            attempts: config.screenshot_attempts.max(1),
            retry_delay: Duration::from_millis(config.screenshot_retry_delay_ms),
            attempt_timeout: Duration::from_secs(config.screenshot_timeout_secs),
            max_width: config.screenshot_max_width,
        }
    }

    pub fn attempts(&self) -> u32 {
        self.attempts
    }

    /// Where the screenshot of `url` under `viewport` is written.
    pub fn path_for(&self, url: &str, viewport: ViewportName) -> PathBuf {
        let domain = get_domain(url).unwrap_or_else(|| "unknown".to_string());
        self.output_dir
            .join(domain)
            .join(format!("{}_{}.png", page_key(url), viewport))
    }

    /// Capture with up to `attempts` tries, each bounded by the attempt
    /// timeout. PC screenshots wider than the configured maximum are
    /// center-cropped afterwards.
    pub async fn capture(
        &self,
        page: &dyn BrowserPage,
        url: &str,
        mode: &ViewportMode,
    ) -> Result<PathBuf> {
        let path = self.path_for(url, mode.name);
        if let Some(parent) = path.parent() {
            tokio::fs::create_dir_all(parent).await?;
        }

        let options = ScreenshotOptions::default();
        let mut attempt = 1;
        loop {
            let shot = tokio::time::timeout(self.attempt_timeout, page.screenshot(&path, &options))
                .await
                .unwrap_or_else(|_| Err(AppError::Timeout(self.attempt_timeout.as_millis() as u64)));
            match shot {
                Ok(()) => break,
                Err(e) if attempt < self.attempts => {
                    log::warn!(
                        "Screenshot attempt {}/{} failed for {} ({}): {}",
                        attempt,
                        self.attempts,
                        url,
                        mode.name,
                        e
                    );
                    attempt += 1;
                    tokio::time::sleep(self.retry_delay).await;
                }
                Err(e) => {
                    return Err(AppError::browser(format!(
                        "screenshot failed after {} attempt(s): {}",
                        self.attempts, e
                    )));
                }
            }
        }

        if mode.name.is_pc() {
            let crop_path = path.clone();
            let max_width = self.max_width;
            let cropped =
                tokio::task::spawn_blocking(move || center_crop(&crop_path, max_width)).await?;
            if let Err(e) = cropped {
                log::warn!("Could not crop {}: {}", path.display(), e);
            }
        }

        Ok(path)
    }
}

/// Crop the image at `path` in place to `max_width`, keeping the horizontal
/// center. Returns whether the file was rewritten.
pub fn center_crop(path: &Path, max_width: u32) -> Result<bool> {
    let image = image::open(path)?;
    let (width, height) = (image.width(), image.height());
    if max_width == 0 || width <= max_width {
        return Ok(false);
    }

    let left = (width - max_width) / 2;
    image.crop_imm(left, 0, max_width, height).save(path)?;
    Ok(true)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::browser::fake::{FakeDriver, FakePage};
    use crate::browser::{BrowserDriver, ContextOptions};
    use image::{Rgb, RgbImage};
    use tempfile::TempDir;

    fn capture_in(dir: &Path) -> ScreenshotCapture {
        ScreenshotCapture::new(&ScanConfig {
            output_dir: dir.display().to_string(),
            ..ScanConfig::default()
        })
    }

    #[test]
    fn test_path_layout() {
        let capture = capture_in(Path::new("shots"));
        let path = capture.path_for("https://Example.com/a?b=1", ViewportName::MobileSpider);

        assert!(path.starts_with("shots/example.com"));
        let name = path.file_name().unwrap().to_str().unwrap();
        assert_eq!(
            name,
            format!("{}_mobile_spider.png", page_key("https://Example.com/a?b=1"))
        );
    }

    #[tokio::test(start_paused = true)]
    async fn test_stalled_attempts_time_out() {
        let tmp = TempDir::new().unwrap();
        let capture = capture_in(tmp.path());
        let driver = FakeDriver::new(FakePage::default().hanging_screenshots());
        let mode = ViewportMode::preset(ViewportName::MobileNormal);
        let context = driver
            .new_context(&ContextOptions {
                viewport: mode.clone(),
                blocked_urls: Vec::new(),
            })
            .await
            .unwrap();
        let tab = context.new_page().await.unwrap();

        let started = tokio::time::Instant::now();
        let err = capture
            .capture(tab.as_ref(), "https://example.com/a", &mode)
            .await
            .unwrap_err();

        assert!(err.to_string().contains("after 3 attempt(s)"));
        assert_eq!(driver.screenshot_attempts(), 3);
        // Three 30s attempts with two 1s pauses between them
        let elapsed = started.elapsed();
        assert!(elapsed >= Duration::from_secs(92));
        assert!(elapsed < Duration::from_secs(93));
    }

    #[test]
    fn test_center_crop_keeps_middle() {
        let tmp = TempDir::new().unwrap();
        let path = tmp.path().join("wide.png");
        // Red left edge, blue right edge, green middle.
        let image = RgbImage::from_fn(1920, 10, |x, _| {
            if x < 240 {
                Rgb([255, 0, 0])
            } else if x >= 1680 {
                Rgb([0, 0, 255])
            } else {
                Rgb([0, 255, 0])
            }
        });
        image.save(&path).unwrap();

        assert!(center_crop(&path, 1440).unwrap());

        let cropped = image::open(&path).unwrap().to_rgb8();
        assert_eq!(cropped.dimensions(), (1440, 10));
        assert_eq!(cropped.get_pixel(0, 0), &Rgb([0, 255, 0]));
        assert_eq!(cropped.get_pixel(1439, 9), &Rgb([0, 255, 0]));
    }

    #[test]
    fn test_narrow_image_untouched() {
        let tmp = TempDir::new().unwrap();
        let path = tmp.path().join("narrow.png");
        RgbImage::new(375, 10).save(&path).unwrap();

        assert!(!center_crop(&path, 1440).unwrap());
        assert_eq!(image::open(&path).unwrap().width(), 375);
    }

    #[test]
    fn test_crop_unreadable_file() {
        let tmp = TempDir::new().unwrap();
        let path = tmp.path().join("broken.png");
        std::fs::write(&path, b"not a png").unwrap();

        assert!(center_crop(&path, 1440).is_err());
    }
}
