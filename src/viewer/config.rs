//! Viewer configuration

use super::zoom::ZoomPolicy;

/// Vertical space kept for toolbar and padding, in CSS pixels
pub const DEFAULT_RESERVED_HEIGHT: f32 = 120.0;
pub const DEFAULT_WINDOW_WIDTH: f32 = 1280.0;
pub const DEFAULT_WINDOW_HEIGHT: f32 = 900.0;

/// Everything a [`Viewer`](super::Viewer) needs to know about its display
#[derive(Clone, Copy, Debug, PartialEq)]
pub struct ViewerConfig {
    pub zoom: ZoomPolicy,
    pub reserved_height: f32,
    pub device_pixel_ratio: f32,
    pub window_width: f32,
    pub window_height: f32,
}

impl Default for ViewerConfig {
    fn default() -> Self {
        Self {
            zoom: ZoomPolicy::default(),
            reserved_height: DEFAULT_RESERVED_HEIGHT,
            device_pixel_ratio: 1.0,
            window_width: DEFAULT_WINDOW_WIDTH,
            window_height: DEFAULT_WINDOW_HEIGHT,
        }
    }
}

impl ViewerConfig {
    #[must_use]
    pub fn with_window(mut self, width: f32, height: f32) -> Self {
        self.window_width = width;
        self.window_height = height;
        self
    }

    #[must_use]
    pub fn with_device_pixel_ratio(mut self, ratio: f32) -> Self {
        self.device_pixel_ratio = ratio;
        self
    }

    #[must_use]
    pub fn with_zoom(mut self, zoom: ZoomPolicy) -> Self {
        self.zoom = zoom.sanitized();
        self
    }

    /// Height left for the page in a window of `window_height`, never below 1
    #[must_use]
    pub fn available_height_for(&self, window_height: f32) -> f32 {
        let available = window_height - self.reserved_height.max(0.0);
        if available.is_finite() && available >= 1.0 {
            available
        } else {
            1.0
        }
    }

    #[must_use]
    pub fn available_height(&self) -> f32 {
        self.available_height_for(self.window_height)
    }
}
