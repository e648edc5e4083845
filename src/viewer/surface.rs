//! Raster drawing surface
//!
//! An RGBA8 backing store with a current transform from CSS pixels to
//! backing pixels. The displayed surface is only ever written by
//! [`Surface::present`]; providers paint into a private back buffer.

use std::io::Cursor;
use std::path::Path;

use image::{ImageFormat, RgbaImage};

use super::geometry::Transform;

const BYTES_PER_PIXEL: usize = 4;

#[derive(Clone)]
pub struct Surface {
    width: u32,
    height: u32,
    pixels: Vec<u8>,
    transform: Transform,
    /// Presentation size in CSS pixels (the viewport size at `scale`)
    css_size: (f32, f32),
}

impl std::fmt::Debug for Surface {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Surface")
            .field("width", &self.width)
            .field("height", &self.height)
            .field("transform", &self.transform)
            .field("css_size", &self.css_size)
            .finish_non_exhaustive()
    }
}

impl Default for Surface {
    fn default() -> Self {
        Self::new(0, 0)
    }
}

impl Surface {
    /// Fully transparent surface with an identity transform
    #[must_use]
    pub fn new(width: u32, height: u32) -> Self {
        Self {
            width,
            height,
            pixels: vec![0; buffer_len(width, height)],
            transform: Transform::IDENTITY,
            css_size: (width as f32, height as f32),
        }
    }

    #[must_use]
    pub fn width(&self) -> u32 {
        self.width
    }

    #[must_use]
    pub fn height(&self) -> u32 {
        self.height
    }

    #[must_use]
    pub fn is_blank(&self) -> bool {
        self.width == 0 || self.height == 0 || self.pixels.iter().all(|&b| b == 0)
    }

    #[must_use]
    pub fn pixels(&self) -> &[u8] {
        &self.pixels
    }

    #[must_use]
    pub fn transform(&self) -> Transform {
        self.transform
    }

    pub fn set_transform(&mut self, transform: Transform) {
        self.transform = transform;
    }

    pub fn reset_transform(&mut self) {
        self.transform = Transform::IDENTITY;
    }

    /// Backing pixels per CSS pixel along x
    #[must_use]
    pub fn device_scale(&self) -> f32 {
        self.transform.a.hypot(self.transform.b)
    }

    #[must_use]
    pub fn css_size(&self) -> (f32, f32) {
        self.css_size
    }

    pub fn set_css_size(&mut self, width: f32, height: f32) {
        self.css_size = (width, height);
    }

    /// Reallocate the backing store; contents are cleared
    pub fn resize(&mut self, width: u32, height: u32) {
        self.width = width;
        self.height = height;
        self.pixels.clear();
        self.pixels.resize(buffer_len(width, height), 0);
    }

    pub fn clear(&mut self) {
        self.pixels.fill(0);
    }

    #[must_use]
    pub fn pixel(&self, x: u32, y: u32) -> Option<[u8; 4]> {
        if x >= self.width || y >= self.height {
            return None;
        }
        let i = (y as usize * self.width as usize + x as usize) * BYTES_PER_PIXEL;
        let px = self.pixels.get(i..i + BYTES_PER_PIXEL)?;
        Some([px[0], px[1], px[2], px[3]])
    }

    /// Fill a rectangle given in CSS pixels, mapped through the current
    /// transform (scale and translation only) and clipped to the surface.
    pub fn fill_rect(&mut self, x: f32, y: f32, width: f32, height: f32, rgba: [u8; 4]) {
        let (x0, y0) = self.transform.apply(x, y);
        let (x1, y1) = self.transform.apply(x + width, y + height);
        let clip = |v: f32, max: u32| v.clamp(0.0, max as f32).round() as u32;
        let (left, right) = (clip(x0.min(x1), self.width), clip(x0.max(x1), self.width));
        let (top, bottom) = (clip(y0.min(y1), self.height), clip(y0.max(y1), self.height));

        let stride = self.width as usize * BYTES_PER_PIXEL;
        for row in top..bottom {
            let start = row as usize * stride + left as usize * BYTES_PER_PIXEL;
            let end = row as usize * stride + right as usize * BYTES_PER_PIXEL;
            for px in self.pixels[start..end].chunks_exact_mut(BYTES_PER_PIXEL) {
                px.copy_from_slice(&rgba);
            }
        }
    }

    /// Copy packed rows of `components`-channel pixels (3 = RGB, 4 = RGBA)
    /// into the backing store at the origin, clipped to the surface.
    pub fn blit(&mut self, src: &[u8], src_width: u32, src_height: u32, stride: usize, components: usize) {
        if !(3..=4).contains(&components) {
            return;
        }
        let cols = src_width.min(self.width) as usize;
        let rows = src_height.min(self.height) as usize;
        let dst_stride = self.width as usize * BYTES_PER_PIXEL;

        for y in 0..rows {
            let Some(src_row) = src.get(y * stride..y * stride + cols * components) else {
                break;
            };
            let dst_row = &mut self.pixels[y * dst_stride..y * dst_stride + cols * BYTES_PER_PIXEL];
            for (dst, px) in dst_row
                .chunks_exact_mut(BYTES_PER_PIXEL)
                .zip(src_row.chunks_exact(components))
            {
                dst[..3].copy_from_slice(&px[..3]);
                dst[3] = if components == 4 { px[3] } else { u8::MAX };
            }
        }
    }

    /// Replace this surface's content with a finished frame: reset the
    /// transform, resize, clear, then copy.
    pub fn present(&mut self, frame: &Surface) {
        self.reset_transform();
        self.resize(frame.width, frame.height);
        self.clear();
        self.pixels.copy_from_slice(&frame.pixels);
        self.css_size = frame.css_size;
    }

    #[must_use]
    pub fn to_image(&self) -> Option<RgbaImage> {
        RgbaImage::from_raw(self.width, self.height, self.pixels.clone())
    }

    /// PNG-encoded copy of the backing store
    pub fn encode_png(&self) -> image::ImageResult<Vec<u8>> {
        let image = self.to_image().ok_or_else(|| {
            image::ImageError::Parameter(image::error::ParameterError::from_kind(
                image::error::ParameterErrorKind::DimensionMismatch,
            ))
        })?;
        let mut out = Cursor::new(Vec::new());
        image.write_to(&mut out, ImageFormat::Png)?;
        Ok(out.into_inner())
    }

    pub fn save_png(&self, path: &Path) -> image::ImageResult<()> {
        let bytes = self.encode_png()?;
        std::fs::write(path, bytes).map_err(image::ImageError::IoError)
    }
}

fn buffer_len(width: u32, height: u32) -> usize {
    width as usize * height as usize * BYTES_PER_PIXEL
}
