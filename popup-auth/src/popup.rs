//! Popup placement and creation.
//!
//! Desktop popups are centered horizontally over the opener and biased toward
//! the top of it. Mobile browsers render popups full-screen anyway, so there
//! no size or position is requested.

use crate::host::{Popup, PopupHost};
use serde::{Deserialize, Serialize};
use std::fmt;

pub const DEFAULT_WIDTH: u32 = 660;
pub const DEFAULT_HEIGHT: u32 = 370;

/// Height of browser chrome assumed when only the client area is known.
const CHROME_HEIGHT: f64 = 22.0;
/// Vertical divisor; larger than 2 so the popup sits above center.
const VERTICAL_BIAS: f64 = 2.5;

/// Requested popup size in CSS pixels.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct WindowSize {
    pub width: u32,
    pub height: u32,
}

impl WindowSize {
    pub const fn new(width: u32, height: u32) -> Self {
        Self { width, height }
    }
}

impl Default for WindowSize {
    fn default() -> Self {
        Self::new(DEFAULT_WIDTH, DEFAULT_HEIGHT)
    }
}

/// Geometry of the opener window.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct ScreenMetrics {
    pub screen_x: f64,
    pub screen_y: f64,
    pub outer_width: f64,
    pub outer_height: f64,
    /// Width of the screen the opener is on.
    pub screen_width: f64,
}

impl Default for ScreenMetrics {
    fn default() -> Self {
        Self {
            screen_x: 0.0,
            screen_y: 0.0,
            outer_width: 1280.0,
            outer_height: 800.0,
            screen_width: 1280.0,
        }
    }
}

/// Metrics as a browser reports them; some properties may be unavailable.
#[derive(Debug, Clone, Copy, Default, PartialEq)]
pub struct RawMetrics {
    pub screen_x: Option<f64>,
    pub screen_y: Option<f64>,
    pub screen_left: f64,
    pub screen_top: f64,
    pub outer_width: Option<f64>,
    pub outer_height: Option<f64>,
    pub client_width: f64,
    pub client_height: f64,
    pub screen_width: f64,
}

impl RawMetrics {
    /// Fill missing values: `screenLeft`/`screenTop` for the offset, the
    /// client area (minus chrome height) for the outer bounds.
    pub fn resolve(&self) -> ScreenMetrics {
        ScreenMetrics {
            screen_x: self.screen_x.unwrap_or(self.screen_left),
            screen_y: self.screen_y.unwrap_or(self.screen_top),
            outer_width: self.outer_width.unwrap_or(self.client_width),
            outer_height: self
                .outer_height
                .unwrap_or(self.client_height - CHROME_HEIGHT),
            screen_width: self.screen_width,
        }
    }
}

/// Everything the opener needs to know about the hosting window.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct Viewport {
    pub user_agent: String,
    pub metrics: ScreenMetrics,
}

impl Viewport {
    pub fn is_mobile(&self) -> bool {
        is_mobile_user_agent(&self.user_agent)
    }
}

/// iPhone/iPad/iPod at a word boundary, or "android"/"mobile" anywhere.
pub fn is_mobile_user_agent(user_agent: &str) -> bool {
    let apple = ["iPhone", "iPad", "iPod"]
        .iter()
        .any(|needle| starts_word(user_agent, needle));
    if apple {
        return true;
    }
    let lower = user_agent.to_ascii_lowercase();
    lower.contains("android") || lower.contains("mobile")
}

fn starts_word(haystack: &str, needle: &str) -> bool {
    haystack.match_indices(needle).any(|(i, _)| {
        haystack[..i]
            .chars()
            .next_back()
            .is_none_or(|c| !(c.is_ascii_alphanumeric() || c == '_'))
    })
}

/// The `features` argument of `window.open`.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct WindowFeatures {
    pub width: Option<u32>,
    pub height: Option<u32>,
    pub left: Option<f64>,
    pub top: Option<f64>,
    pub scrollbars: bool,
}

impl WindowFeatures {
    /// Placement policy for a popup of `requested` size.
    pub fn for_viewport(viewport: &Viewport, requested: WindowSize) -> Self {
        let (width, height) = if viewport.is_mobile() {
            (0, 0)
        } else {
            (requested.width, requested.height)
        };

        let m = &viewport.metrics;
        let origin_x = if m.screen_x < 0.0 {
            m.screen_width + m.screen_x
        } else {
            m.screen_x
        };
        let left = origin_x + (m.outer_width - f64::from(width)) / 2.0;
        let top = m.screen_y + (m.outer_height - f64::from(height)) / VERTICAL_BIAS;
        let positioned = width != 0 && height != 0;

        Self {
            width: (width != 0).then_some(width),
            height: (height != 0).then_some(height),
            left: positioned.then_some(left),
            top: positioned.then_some(top),
            scrollbars: true,
        }
    }
}

impl fmt::Display for WindowFeatures {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let mut parts = Vec::new();
        if let Some(w) = self.width {
            parts.push(format!("width={}", w));
        }
        if let Some(h) = self.height {
            parts.push(format!("height={}", h));
        }
        if let Some(l) = self.left {
            parts.push(format!("left={}", l));
        }
        if let Some(t) = self.top {
            parts.push(format!("top={}", t));
        }
        if self.scrollbars {
            parts.push("scrollbars=1".to_string());
        }
        f.write_str(&parts.join(","))
    }
}

/// Open and focus a popup. Returns `None` when the host blocks creation.
pub fn open_popup(
    host: &dyn PopupHost,
    url: &str,
    title: &str,
    size: WindowSize,
) -> Option<Popup> {
    let viewport = host.viewport();
    let features = WindowFeatures::for_viewport(&viewport, size).to_string();
    tracing::debug!(url, title, features = %features, "opening popup");

    let popup = host.open_window(url, title, &features)?;
    popup.focus();
    Some(popup)
}

#[cfg(test)]
mod tests {
    use super::*;

    const DESKTOP_UA: &str =
        "Mozilla/5.0 (X11; Linux x86_64) AppleWebKit/537.36 (KHTML, like Gecko) Chrome/120.0 Safari/537.36";

    fn desktop(metrics: ScreenMetrics) -> Viewport {
        Viewport {
            user_agent: DESKTOP_UA.into(),
            metrics,
        }
    }

    #[test]
    fn mobile_user_agents() {
        assert!(is_mobile_user_agent(
            "Mozilla/5.0 (iPhone; CPU iPhone OS 17_0 like Mac OS X)"
        ));
        assert!(is_mobile_user_agent("Mozilla/5.0 (iPad; CPU OS 16_0)"));
        assert!(is_mobile_user_agent("Mozilla/5.0 (Linux; Android 14; Pixel 8)"));
        assert!(is_mobile_user_agent("SomeBrowser MOBILE"));
        assert!(!is_mobile_user_agent(DESKTOP_UA));
    }

    #[test]
    fn apple_devices_need_word_boundary() {
        assert!(!is_mobile_user_agent("XiPhoneEmulator/1.0"));
        assert!(is_mobile_user_agent("iPod touch"));
    }

    #[test]
    fn desktop_popup_is_centered_and_biased_up() {
        let f = WindowFeatures::for_viewport(
            &desktop(ScreenMetrics::default()),
            WindowSize::new(500, 400),
        );
        assert_eq!(f.to_string(), "width=500,height=400,left=390,top=160,scrollbars=1");
    }

    #[test]
    fn default_size_placement() {
        let f = WindowFeatures::for_viewport(
            &desktop(ScreenMetrics::default()),
            WindowSize::default(),
        );
        assert_eq!(f.width, Some(660));
        assert_eq!(f.height, Some(370));
        assert_eq!(f.left, Some(310.0));
        assert_eq!(f.top, Some(172.0));
    }

    #[test]
    fn negative_screen_x_wraps_through_screen_width() {
        let metrics = ScreenMetrics {
            screen_x: -1000.0,
            screen_width: 1920.0,
            ..ScreenMetrics::default()
        };
        let f = WindowFeatures::for_viewport(&desktop(metrics), WindowSize::new(500, 400));
        assert_eq!(f.left, Some(920.0 + 390.0));
    }

    #[test]
    fn fractional_offsets_are_kept() {
        let metrics = ScreenMetrics {
            outer_width: 1281.0,
            ..ScreenMetrics::default()
        };
        let f = WindowFeatures::for_viewport(&desktop(metrics), WindowSize::new(500, 400));
        assert!(f.to_string().contains("left=390.5"));
    }

    #[test]
    fn mobile_ignores_requested_size() {
        let viewport = Viewport {
            user_agent: "Mozilla/5.0 (Linux; Android 14)".into(),
            metrics: ScreenMetrics::default(),
        };
        let f = WindowFeatures::for_viewport(&viewport, WindowSize::new(500, 400));
        assert_eq!(f.to_string(), "scrollbars=1");
    }

    #[test]
    fn zero_height_drops_position() {
        let f = WindowFeatures::for_viewport(
            &desktop(ScreenMetrics::default()),
            WindowSize::new(500, 0),
        );
        assert_eq!(f.to_string(), "width=500,scrollbars=1");
    }

    #[test]
    fn raw_metrics_fall_back_to_legacy_properties() {
        let raw = RawMetrics {
            screen_x: None,
            screen_y: Some(5.0),
            screen_left: 12.0,
            screen_top: 99.0,
            outer_width: None,
            outer_height: None,
            client_width: 1024.0,
            client_height: 722.0,
            screen_width: 1920.0,
        };
        let m = raw.resolve();
        assert_eq!(m.screen_x, 12.0);
        assert_eq!(m.screen_y, 5.0);
        assert_eq!(m.outer_width, 1024.0);
        assert_eq!(m.outer_height, 700.0);
    }
}
