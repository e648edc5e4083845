//! Affine transforms and page viewports

use serde::{Deserialize, Serialize};

/// 2D affine transform `[a, b, c, d, e, f]`, mapping `(x, y)` to
/// `(a*x + c*y + e, b*x + d*y + f)`.
#[derive(Clone, Copy, Debug, PartialEq, Serialize, Deserialize)]
pub struct Transform {
    pub a: f32,
    pub b: f32,
    pub c: f32,
    pub d: f32,
    pub e: f32,
    pub f: f32,
}

impl Default for Transform {
    fn default() -> Self {
        Self::IDENTITY
    }
}

impl Transform {
    pub const IDENTITY: Self = Self::new(1.0, 0.0, 0.0, 1.0, 0.0, 0.0);

    #[must_use]
    pub const fn new(a: f32, b: f32, c: f32, d: f32, e: f32, f: f32) -> Self {
        Self { a, b, c, d, e, f }
    }

    #[must_use]
    pub const fn from_array(m: [f32; 6]) -> Self {
        Self::new(m[0], m[1], m[2], m[3], m[4], m[5])
    }

    #[must_use]
    pub const fn to_array(self) -> [f32; 6] {
        [self.a, self.b, self.c, self.d, self.e, self.f]
    }

    #[must_use]
    pub const fn scale(sx: f32, sy: f32) -> Self {
        Self::new(sx, 0.0, 0.0, sy, 0.0, 0.0)
    }

    /// Returns `self × other`: `other` is applied first, then `self`.
    #[must_use]
    pub fn multiply(self, other: Self) -> Self {
        Self {
            a: self.a * other.a + self.c * other.b,
            b: self.b * other.a + self.d * other.b,
            c: self.a * other.c + self.c * other.d,
            d: self.b * other.c + self.d * other.d,
            e: self.a * other.e + self.c * other.f + self.e,
            f: self.b * other.e + self.d * other.f + self.f,
        }
    }

    #[must_use]
    pub fn apply(self, x: f32, y: f32) -> (f32, f32) {
        (
            self.a * x + self.c * y + self.e,
            self.b * x + self.d * y + self.f,
        )
    }

    #[must_use]
    pub fn is_finite(self) -> bool {
        self.to_array().iter().all(|v| v.is_finite())
    }
}

/// Direction of the vertical axis in a provider's page space
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum PageAxis {
    /// y grows downwards, like the overlay
    #[default]
    TopDown,
    /// y grows upwards from the bottom edge (PDF user space)
    BottomUp,
}

/// Page dimensions at a given scale, plus the page-to-device transform
#[derive(Clone, Copy, Debug, PartialEq, Serialize, Deserialize)]
pub struct Viewport {
    /// Width in CSS pixels at `scale`
    pub width: f32,
    /// Height in CSS pixels at `scale`
    pub height: f32,
    pub scale: f32,
    pub transform: Transform,
}

impl Viewport {
    /// Build the viewport of a page whose intrinsic size (scale 1) is
    /// `page_width` × `page_height`.
    #[must_use]
    pub fn new(page_width: f32, page_height: f32, scale: f32, axis: PageAxis) -> Self {
        let width = page_width * scale;
        let height = page_height * scale;
        let transform = match axis {
            PageAxis::TopDown => Transform::scale(scale, scale),
            PageAxis::BottomUp => Transform::new(scale, 0.0, 0.0, -scale, 0.0, height),
        };
        Self {
            width,
            height,
            scale,
            transform,
        }
    }

    /// Intrinsic height at scale 1
    #[must_use]
    pub fn unscaled_height(&self) -> f32 {
        if self.scale > 0.0 {
            self.height / self.scale
        } else {
            0.0
        }
    }

    /// Backing-store pixel size for this viewport on a display with the
    /// given device pixel ratio. Floored, never below 1×1.
    #[must_use]
    pub fn backing_size(&self, device_pixel_ratio: f32) -> (u32, u32) {
        let to_px = |v: f32| {
            let px = (v * device_pixel_ratio).floor();
            if px.is_finite() && px >= 1.0 {
                px as u32
            } else {
                1
            }
        };
        (to_px(self.width), to_px(self.height))
    }
}

/// Largest backing store a render may allocate (2^25 pixels, 128 MiB of RGBA)
pub const MAX_BACKING_PIXELS: u64 = 1 << 25;

/// Whether a `width`×`height` backing store stays within
/// [`MAX_BACKING_PIXELS`]
#[must_use]
pub fn backing_fits(width: u32, height: u32) -> bool {
    u64::from(width) * u64::from(height) <= MAX_BACKING_PIXELS
}
