//! Zoom policy for page viewing
//!
//! Bounds and step sizes used by the viewport state machine, plus the
//! fit-to-height calculation.

use serde::{Deserialize, Serialize};

/// Zoom bounds and step rates
#[derive(Clone, Copy, Debug, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct ZoomPolicy {
    /// Minimum allowed scale
    pub min_scale: f32,
    /// Maximum allowed scale
    pub max_scale: f32,
    /// Multiplier applied per zoom-in step (divisor for zoom-out)
    pub zoom_step: f32,
    /// Upper bound for scales chosen by auto-fit
    pub max_auto_scale: f32,
}

impl Default for ZoomPolicy {
    fn default() -> Self {
        Self {
            min_scale: Self::MIN_SCALE,
            max_scale: Self::MAX_SCALE,
            zoom_step: Self::ZOOM_STEP,
            max_auto_scale: Self::MAX_AUTO_SCALE,
        }
    }
}

impl ZoomPolicy {
    pub const MIN_SCALE: f32 = 0.25;
    pub const MAX_SCALE: f32 = 5.0;
    /// 25% per step
    pub const ZOOM_STEP: f32 = 1.25;
    pub const MAX_AUTO_SCALE: f32 = 2.0;

    /// Clamp scale to the policy range, handling NaN/Inf
    #[must_use]
    pub fn clamp(&self, scale: f32) -> f32 {
        if !scale.is_finite() {
            1.0_f32.clamp(self.min_scale, self.max_scale)
        } else {
            scale.clamp(self.min_scale, self.max_scale)
        }
    }

    #[must_use]
    pub fn step_in(&self, scale: f32) -> f32 {
        self.clamp(scale * self.zoom_step)
    }

    #[must_use]
    pub fn step_out(&self, scale: f32) -> f32 {
        self.clamp(scale / self.zoom_step)
    }

    /// Scale that fits a page of `page_height` (at scale 1) into
    /// `available_height`. `None` when either input is unusable.
    #[must_use]
    pub fn fit_to_height(&self, available_height: f32, page_height: f32) -> Option<f32> {
        if !(available_height.is_finite() && page_height.is_finite()) {
            return None;
        }
        if available_height <= 0.0 || page_height <= 0.0 {
            return None;
        }
        let fit = (available_height / page_height).min(self.max_auto_scale);
        Some(self.clamp(fit))
    }

    /// Repair a policy loaded from user configuration
    #[must_use]
    pub fn sanitized(self) -> Self {
        let defaults = Self::default();
        let min_scale = if self.min_scale.is_finite() && self.min_scale > 0.0 {
            self.min_scale
        } else {
            defaults.min_scale
        };
        let max_scale = if self.max_scale.is_finite() && self.max_scale >= min_scale {
            self.max_scale
        } else {
            defaults.max_scale.max(min_scale)
        };
        let zoom_step = if self.zoom_step.is_finite() && self.zoom_step > 1.0 {
            self.zoom_step
        } else {
            defaults.zoom_step
        };
        let max_auto_scale = if self.max_auto_scale.is_finite() && self.max_auto_scale > 0.0 {
            self.max_auto_scale
        } else {
            defaults.max_auto_scale
        };
        Self {
            min_scale,
            max_scale,
            zoom_step,
            max_auto_scale,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn steps_clamp_to_bounds() {
        let policy = ZoomPolicy::default();
        let mut scale = 1.0;
        for _ in 0..50 {
            scale = policy.step_in(scale);
        }
        assert_eq!(scale, ZoomPolicy::MAX_SCALE);
        for _ in 0..50 {
            scale = policy.step_out(scale);
        }
        assert_eq!(scale, ZoomPolicy::MIN_SCALE);
    }

    #[test]
    fn fit_is_capped_by_max_auto_scale() {
        let policy = ZoomPolicy::default();
        assert_eq!(policy.fit_to_height(2000.0, 100.0), Some(2.0));
        assert_eq!(policy.fit_to_height(396.0, 792.0), Some(0.5));
        assert_eq!(policy.fit_to_height(10.0, 792.0), Some(ZoomPolicy::MIN_SCALE));
    }

    #[test]
    fn fit_rejects_degenerate_inputs() {
        let policy = ZoomPolicy::default();
        assert_eq!(policy.fit_to_height(0.0, 792.0), None);
        assert_eq!(policy.fit_to_height(800.0, 0.0), None);
        assert_eq!(policy.fit_to_height(f32::NAN, 792.0), None);
    }

    #[test]
    fn clamp_handles_non_finite() {
        let policy = ZoomPolicy::default();
        assert_eq!(policy.clamp(f32::INFINITY), 1.0);
        assert_eq!(policy.clamp(f32::NAN), 1.0);
    }

    #[test]
    fn sanitized_repairs_inverted_bounds() {
        let policy = ZoomPolicy {
            min_scale: 2.0,
            max_scale: 1.0,
            zoom_step: 0.5,
            max_auto_scale: -1.0,
        }
        .sanitized();
        assert_eq!(policy.min_scale, 2.0);
        assert_eq!(policy.max_scale, 5.0);
        assert_eq!(policy.zoom_step, ZoomPolicy::ZOOM_STEP);
        assert_eq!(policy.max_auto_scale, ZoomPolicy::MAX_AUTO_SCALE);
    }
}
