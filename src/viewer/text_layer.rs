//! Text layer geometry
//!
//! Turns glyph runs reported by a page provider into invisible, selectable
//! text boxes that sit exactly over the rasterized glyphs. The geometry is a
//! pure function of `(runs, viewport)`; applying the boxes to a display goes
//! through [`OverlaySink`] so the same layout drives the HTML overlay and
//! headless inspection.

use log::trace;
use serde::{Deserialize, Serialize};

use super::geometry::{Transform, Viewport};

/// Explicit writing direction of a run
#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum TextDirection {
    Ltr,
    Rtl,
}

impl TextDirection {
    #[must_use]
    pub fn as_str(self) -> &'static str {
        match self {
            Self::Ltr => "ltr",
            Self::Rtl => "rtl",
        }
    }
}

/// A contiguous string sharing one text transform, in page space
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct GlyphRun {
    pub text: String,
    /// Glyph-space to page-space affine `[a, b, c, d, e, f]`
    pub transform: [f32; 6],
    pub font_name: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub direction: Option<TextDirection>,
}

impl GlyphRun {
    pub fn new(text: impl Into<String>, transform: [f32; 6], font_name: impl Into<String>) -> Self {
        Self {
            text: text.into(),
            transform,
            font_name: font_name.into(),
            direction: None,
        }
    }

    #[must_use]
    pub fn with_direction(mut self, direction: TextDirection) -> Self {
        self.direction = Some(direction);
        self
    }
}

/// Components of a text transform in overlay space
#[derive(Clone, Copy, Debug, PartialEq)]
pub struct Decomposition {
    pub tx: f32,
    pub ty: f32,
    /// Signed: negative when `a < 0`
    pub scale_x: f32,
    /// Signed: negative when `d < 0`
    pub scale_y: f32,
    /// Radians, clockwise in the top-down overlay
    pub rotation: f32,
}

#[must_use]
pub fn decompose(m: Transform) -> Decomposition {
    let mut scale_x = m.a.hypot(m.b);
    if m.a < 0.0 {
        scale_x = -scale_x;
    }
    let mut scale_y = m.c.hypot(m.d);
    if m.d < 0.0 {
        scale_y = -scale_y;
    }
    Decomposition {
        tx: m.e,
        ty: m.f,
        scale_x,
        scale_y,
        rotation: m.b.atan2(m.a),
    }
}

/// Absolutely positioned overlay box for one glyph run
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct TextBox {
    /// Box origin in overlay pixels
    pub left: f32,
    pub top: f32,
    pub font_size: f32,
    /// Radians, anchored at the box's top-left corner
    pub rotation: f32,
    /// Horizontal stretch relative to `font_size` (1.0 = none)
    pub scale_x: f32,
    pub text: String,
    pub font_name: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub direction: Option<TextDirection>,
}

impl TextBox {
    /// CSS `transform` value, `None` when the box is upright and unstretched
    #[must_use]
    pub fn css_transform(&self) -> Option<String> {
        let mut parts = Vec::new();
        if self.rotation != 0.0 {
            parts.push(format!("rotate({}rad)", self.rotation));
        }
        if self.scale_x != 1.0 {
            parts.push(format!("scaleX({})", self.scale_x));
        }
        (!parts.is_empty()).then(|| parts.join(" "))
    }
}

/// Compute the overlay box for a run, or `None` when the run has no usable
/// text or a degenerate transform.
#[must_use]
pub fn text_box_for_run(run: &GlyphRun, viewport: &Viewport) -> Option<TextBox> {
    if run.text.trim().is_empty() {
        return None;
    }
    let run_transform = Transform::from_array(run.transform);
    if !run_transform.is_finite() {
        return None;
    }

    let parts = decompose(viewport.transform.multiply(run_transform));
    let font_size = parts.scale_y.abs();
    if !font_size.is_finite() || font_size <= 0.0 {
        return None;
    }

    let scale_x = if (parts.scale_x.abs() - font_size).abs() > f32::EPSILON * font_size.max(1.0) {
        parts.scale_x / font_size
    } else {
        1.0
    };

    Some(TextBox {
        left: parts.tx,
        top: parts.ty - font_size,
        font_size,
        rotation: parts.rotation,
        scale_x,
        text: run.text.clone(),
        font_name: run.font_name.clone(),
        direction: run.direction,
    })
}

/// Lay out all usable runs in order
#[must_use]
pub fn layout_text_boxes(runs: &[GlyphRun], viewport: &Viewport) -> Vec<TextBox> {
    runs.iter()
        .enumerate()
        .filter_map(|(i, run)| {
            let text_box = text_box_for_run(run, viewport);
            if text_box.is_none() {
                trace!("Skipping glyph run {i} ({:?})", run.text);
            }
            text_box
        })
        .collect()
}

/// Display target for text boxes
pub trait OverlaySink {
    /// Remove every box
    fn clear(&mut self);

    fn set_size(&mut self, width: f32, height: f32);

    fn append(&mut self, text_box: TextBox);
}

/// Clear the overlay and size it to the viewport
pub fn reset_overlay<S: OverlaySink + ?Sized>(sink: &mut S, viewport: &Viewport) {
    sink.clear();
    sink.set_size(viewport.width, viewport.height);
}

/// Append the boxes for `runs`, returning how many were added
pub fn append_text_boxes<S: OverlaySink + ?Sized>(
    sink: &mut S,
    runs: &[GlyphRun],
    viewport: &Viewport,
) -> usize {
    let boxes = layout_text_boxes(runs, viewport);
    let count = boxes.len();
    for text_box in boxes {
        sink.append(text_box);
    }
    count
}

/// Full rebuild: clear, size, then append in run order
pub fn build_text_layer<S: OverlaySink + ?Sized>(
    sink: &mut S,
    runs: &[GlyphRun],
    viewport: &Viewport,
) -> usize {
    reset_overlay(sink, viewport);
    append_text_boxes(sink, runs, viewport)
}

/// Headless overlay that keeps the boxes for inspection and export
#[derive(Clone, Debug, Default, PartialEq, Serialize)]
pub struct TextLayer {
    width: f32,
    height: f32,
    boxes: Vec<TextBox>,
}

impl TextLayer {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    #[must_use]
    pub fn boxes(&self) -> &[TextBox] {
        &self.boxes
    }

    #[must_use]
    pub fn size(&self) -> (f32, f32) {
        (self.width, self.height)
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.boxes.is_empty()
    }

    /// Overlay text in selection order, one run per line
    #[must_use]
    pub fn text(&self) -> String {
        self.boxes
            .iter()
            .map(|b| b.text.as_str())
            .collect::<Vec<_>>()
            .join("\n")
    }
}

impl OverlaySink for TextLayer {
    fn clear(&mut self) {
        self.boxes.clear();
    }

    fn set_size(&mut self, width: f32, height: f32) {
        self.width = width;
        self.height = height;
    }

    fn append(&mut self, text_box: TextBox) {
        self.boxes.push(text_box);
    }
}

#[cfg(test)]
mod tests {
    use std::f32::consts::FRAC_PI_2;

    use super::*;
    use crate::viewer::geometry::PageAxis;

    fn approx(a: f32, b: f32) -> bool {
        (a - b).abs() < 1e-4
    }

    #[test]
    fn bottom_up_run_lands_on_top_down_overlay() {
        let viewport = Viewport::new(100.0, 100.0, 1.0, PageAxis::BottomUp);
        let run = GlyphRun::new("Hello", [2.0, 0.0, 0.0, -2.0, 10.0, 50.0], "F1");

        let text_box = text_box_for_run(&run, &viewport).unwrap();
        assert_eq!(text_box.font_size, 2.0);
        assert_eq!(text_box.rotation, 0.0);
        assert_eq!(text_box.left, 10.0);
        assert_eq!(text_box.top, 48.0);
        assert_eq!(text_box.scale_x, 1.0);
        assert_eq!(text_box.css_transform(), None);
    }

    #[test]
    fn viewport_scale_is_applied_to_position_and_size() {
        let viewport = Viewport::new(200.0, 100.0, 2.0, PageAxis::BottomUp);
        let run = GlyphRun::new("x", [10.0, 0.0, 0.0, 10.0, 20.0, 30.0], "F1");

        let text_box = text_box_for_run(&run, &viewport).unwrap();
        assert_eq!(text_box.font_size, 20.0);
        assert_eq!(text_box.left, 40.0);
        // (100 - 30) * 2 = 140 baseline, minus the font size
        assert_eq!(text_box.top, 120.0);
    }

    #[test]
    fn rotated_run_reports_rotation() {
        let viewport = Viewport::new(100.0, 100.0, 1.0, PageAxis::TopDown);
        // Baseline pointing down the page
        let run = GlyphRun::new("down", [0.0, 12.0, 12.0, 0.0, 50.0, 10.0], "F1");

        let text_box = text_box_for_run(&run, &viewport).unwrap();
        assert!(approx(text_box.rotation, FRAC_PI_2));
        assert!(approx(text_box.font_size, 12.0));
        assert!(approx(text_box.scale_x, 1.0));
        assert_eq!(
            text_box.css_transform(),
            Some(format!("rotate({}rad)", text_box.rotation))
        );
    }

    #[test]
    fn horizontally_stretched_run_gets_scale_x() {
        let viewport = Viewport::new(100.0, 100.0, 1.0, PageAxis::TopDown);
        let run = GlyphRun::new("wide", [15.0, 0.0, 0.0, -10.0, 0.0, 40.0], "F1");

        let text_box = text_box_for_run(&run, &viewport).unwrap();
        assert_eq!(text_box.font_size, 10.0);
        assert!(approx(text_box.scale_x, 1.5));
        assert_eq!(text_box.top, 30.0);
    }

    #[test]
    fn unusable_runs_are_skipped_in_order() {
        let viewport = Viewport::new(100.0, 100.0, 1.0, PageAxis::TopDown);
        let runs = vec![
            GlyphRun::new("first", [10.0, 0.0, 0.0, -10.0, 0.0, 20.0], "F1"),
            GlyphRun::new("   ", [10.0, 0.0, 0.0, -10.0, 0.0, 30.0], "F1"),
            GlyphRun::new("nan", [f32::NAN, 0.0, 0.0, -10.0, 0.0, 40.0], "F1"),
            GlyphRun::new("flat", [10.0, 0.0, 0.0, 0.0, 0.0, 50.0], "F1"),
            GlyphRun::new("", [10.0, 0.0, 0.0, -10.0, 0.0, 60.0], "F1"),
            GlyphRun::new("second", [10.0, 0.0, 0.0, -10.0, 0.0, 70.0], "F1")
                .with_direction(TextDirection::Rtl),
        ];

        let boxes = layout_text_boxes(&runs, &viewport);
        let texts: Vec<_> = boxes.iter().map(|b| b.text.as_str()).collect();
        assert_eq!(texts, vec!["first", "second"]);
        assert_eq!(boxes[1].direction, Some(TextDirection::Rtl));
    }

    #[test]
    fn rebuild_is_idempotent() {
        let viewport = Viewport::new(300.0, 400.0, 1.5, PageAxis::BottomUp);
        let runs = vec![
            GlyphRun::new("a", [9.0, 0.0, 0.0, 9.0, 10.0, 380.0], "F1"),
            GlyphRun::new("b", [9.0, 1.0, -1.0, 9.0, 10.0, 360.0], "F2"),
        ];
        let mut layer = TextLayer::new();

        assert_eq!(build_text_layer(&mut layer, &runs, &viewport), 2);
        let first = layer.clone();
        assert_eq!(build_text_layer(&mut layer, &runs, &viewport), 2);
        assert_eq!(layer, first);
        assert_eq!(layer.size(), (450.0, 600.0));
        assert_eq!(layer.text(), "a\nb");
    }
}
