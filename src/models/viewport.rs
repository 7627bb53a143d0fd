// src/models/viewport.rs

//! Viewport and identity combinations used by each scan pass.

use std::fmt;

use serde::{Deserialize, Serialize};

/// The four scan passes, in canonical order.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ViewportName {
    PcNormal,
    MobileNormal,
    PcSpider,
    MobileSpider,
}

impl ViewportName {
    /// Scan order.
    pub const ALL: [ViewportName; 4] = [
        ViewportName::PcNormal,
        ViewportName::MobileNormal,
        ViewportName::PcSpider,
        ViewportName::MobileSpider,
    ];

    pub fn as_str(&self) -> &'static str {
        match self {
            ViewportName::PcNormal => "pc_normal",
            ViewportName::MobileNormal => "mobile_normal",
            ViewportName::PcSpider => "pc_spider",
            ViewportName::MobileSpider => "mobile_spider",
        }
    }

    /// Crawler-like identity pass.
    pub fn is_spider(&self) -> bool {
        matches!(self, ViewportName::PcSpider | ViewportName::MobileSpider)
    }

    /// Desktop-sized pass.
    pub fn is_pc(&self) -> bool {
        matches!(self, ViewportName::PcNormal | ViewportName::PcSpider)
    }
}

impl fmt::Display for ViewportName {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Viewport dimensions, device flags and identity for one pass.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ViewportMode {
    pub name: ViewportName,
    pub width: u32,
    pub height: u32,
    #[serde(default = "default_scale")]
    pub device_scale_factor: f64,
    #[serde(default)]
    pub is_mobile: bool,
    #[serde(default)]
    pub has_touch: bool,
    pub user_agent: String,
}

fn default_scale() -> f64 {
    1.0
}

impl ViewportMode {
    pub fn is_spider(&self) -> bool {
        self.name.is_spider()
    }

    /// Built-in definition for a pass.
    pub fn preset(name: ViewportName) -> Self {
        const DESKTOP_UA: &str = "Mozilla/5.0 (Windows NT 10.0; Win64; x64) AppleWebKit/537.36 \
             (KHTML, like Gecko) Chrome/124.0.0.0 Safari/537.36";
        const MOBILE_UA: &str = "Mozilla/5.0 (iPhone; CPU iPhone OS 17_4 like Mac OS X) \
             AppleWebKit/605.1.15 (KHTML, like Gecko) Version/17.4 Mobile/15E148 Safari/604.1";
        const SPIDER_UA: &str =
            "Mozilla/5.0 (compatible; Googlebot/2.1; +http://www.google.com/bot.html)";
        const MOBILE_SPIDER_UA: &str = "Mozilla/5.0 (Linux; Android 6.0.1; Nexus 5X Build/MMB29P) \
             AppleWebKit/537.36 (KHTML, like Gecko) Chrome/124.0.0.0 Mobile Safari/537.36 \
             (compatible; Googlebot/2.1; +http://www.google.com/bot.html)";

        let (width, height, scale, mobile, ua) = match name {
            ViewportName::PcNormal => (1920, 1080, 1.0, false, DESKTOP_UA),
            ViewportName::MobileNormal => (375, 812, 3.0, true, MOBILE_UA),
            ViewportName::PcSpider => (1920, 1080, 1.0, false, SPIDER_UA),
            ViewportName::MobileSpider => (412, 915, 2.625, true, MOBILE_SPIDER_UA),
        };

        Self {
            name,
            width,
            height,
            device_scale_factor: scale,
            is_mobile: mobile,
            has_touch: mobile,
            user_agent: ua.to_string(),
        }
    }
}
