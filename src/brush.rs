//! Brush kernels: pointer-history stroke rendering for the paint tools.
//!
//! Kernels differ in stamp size, spacing and whether the live preview can be
//! rendered incrementally ("stepped") or needs the full pointer path in one
//! pass. Connected-line and nearest-neighbour styles fall in the second
//! group: re-rendering only the tail would change which points they link.

use crate::{
    core::{Point, Rgba8},
    math::{angle_between, distance_between, point_between},
    painter::Painter,
    scratch::{OverrideConfig, apply_override_config},
};

#[derive(Clone, Copy, Debug, PartialEq, Eq, serde::Serialize, serde::Deserialize)]
pub enum BrushType {
    Line,
    PaintBrush,
    Pen,
    Calligraphic,
    Connected,
    Nearest,
    Spray,
}

#[derive(Clone, Debug, PartialEq, serde::Serialize, serde::Deserialize)]
pub struct BrushOptions {
    pub brush_type: BrushType,
    /// Brush radius in document pixels.
    pub size: f64,
    /// Stroke opacity in `[0, 1]`, applied when committing (not during live
    /// preview, to avoid uneven overlap artifacts).
    pub opacity: f64,
    pub strokes: u32,
    /// Fill tool only: flood-fill the region under the pointer instead of
    /// filling the whole target.
    pub smart_fill: bool,
}

impl Default for BrushOptions {
    fn default() -> Self {
        Self {
            brush_type: BrushType::PaintBrush,
            size: 5.0,
            opacity: 1.0,
            strokes: 1,
            smart_fill: false,
        }
    }
}

/// Active brush state for one renderer: configuration plus the accumulated
/// pointer history of the current stroke.
#[derive(Clone, Debug)]
pub struct Brush {
    pub color: Rgba8,
    pub radius: f64,
    pub half_radius: f64,
    pub double_radius: f64,
    pub down: bool,
    pub pointers: Vec<Point>,
    /// Index of the last pointer already incorporated into the rendered
    /// preview.
    pub last: usize,
    pub options: BrushOptions,
}

impl Brush {
    pub fn new(color: Rgba8, options: BrushOptions) -> Self {
        Self::with_pointers(color, options, Vec::new())
    }

    /// Rebuild the brush configuration while keeping an in-progress pointer
    /// history (tool option changes mid-session).
    pub fn with_pointers(color: Rgba8, options: BrushOptions, pointers: Vec<Point>) -> Self {
        let radius = options.size;
        Self {
            color,
            radius,
            half_radius: radius * 0.5,
            double_radius: radius * 2.0,
            down: false,
            pointers,
            last: 0,
            options,
        }
    }

    pub fn store_pointer(&mut self, x: f64, y: f64) {
        self.down = true;
        self.pointers.push(Point::new(x, y));
    }

    pub fn reset_stroke(&mut self) {
        self.down = false;
        self.last = 0;
        self.pointers.clear();
    }
}

/// Effective stamp size for the brush type.
pub fn size_for_brush(brush: &Brush) -> f64 {
    match brush.options.brush_type {
        BrushType::Pen => brush.radius * 0.2,
        BrushType::Calligraphic => brush.half_radius,
        BrushType::Connected => brush.half_radius * 0.25,
        BrushType::Nearest => brush.half_radius,
        _ => brush.radius,
    }
}

/// Whether the kernel supports incremental ("stepped") live rendering of
/// only the not-yet-rendered pointer tail.
pub fn has_stepped_live_render(brush_type: BrushType) -> bool {
    !matches!(brush_type, BrushType::Connected | BrushType::Nearest)
}

/// Render a series of registered pointer offsets into a single brush stroke.
///
/// `last_index` is the pointer index the previous iteration stopped at,
/// allowing a single stroke to be spread over several paint cycles. Returns
/// the index of the last rendered pointer.
pub fn render_brush_stroke(
    painter: &mut Painter<'_>,
    brush: &Brush,
    override_config: Option<&OverrideConfig>,
    last_index: usize,
) -> usize {
    let mut pointers;
    let mut radius = brush.radius;
    let mut double_radius = brush.double_radius;
    let mut scale = 1.0;

    if let Some(cfg) = override_config {
        pointers = cfg.pointers.clone();
        scale = cfg.zoom;
        radius *= scale;
        double_radius *= scale;
        apply_override_config(cfg, &mut pointers);
    } else {
        pointers = brush.pointers.clone();
    }

    if pointers.len() < 2 {
        return last_index;
    }

    let line_width = size_for_brush(brush) * scale;
    let color = brush.color;
    let mut i = last_index.max(1);

    while i < pointers.len() {
        let prev = pointers[i - 1];
        let point = pointers[i];

        match brush.options.brush_type {
            BrushType::PaintBrush => {
                let dist = distance_between(prev, point);
                let angle = angle_between(prev, point);
                let incr = (radius * 0.25).max(0.5);
                let (sin, cos) = angle.sin_cos();
                let mut travelled = 0.0;
                while travelled <= dist {
                    let x = prev.x + sin * travelled;
                    let y = prev.y + cos * travelled;
                    painter.fill_circle(Point::new(x, y), radius, color);
                    travelled += incr;
                }
            }
            BrushType::Line | BrushType::Pen | BrushType::Connected => {
                stroke_segment(painter, prev, point, line_width, color);
            }
            BrushType::Calligraphic => {
                // slanted nib: three parallel strokes offset along x
                let offset = brush.half_radius * 0.5 * scale;
                for dx in [-offset, 0.0, offset] {
                    stroke_segment(
                        painter,
                        Point::new(prev.x + dx, prev.y),
                        Point::new(point.x + dx, point.y),
                        line_width * 0.5,
                        color,
                    );
                }
            }
            BrushType::Nearest => {
                // connect the new point to its nearest predecessor, which is
                // why this kernel needs the full path in one pass
                let mut nearest = prev;
                let mut best = f64::INFINITY;
                for candidate in &pointers[..i] {
                    let d = distance_between(*candidate, point);
                    if d < best {
                        best = d;
                        nearest = *candidate;
                    }
                }
                stroke_segment(painter, nearest, point, line_width, color);
            }
            BrushType::Spray => {
                let mut seed = spray_seed(i, point);
                let dots = brush.radius.max(1.0) as usize;
                for _ in 0..dots {
                    let angle = lcg_unit(&mut seed) * std::f64::consts::TAU;
                    let dist = lcg_unit(&mut seed) * double_radius;
                    let x = point.x + angle.cos() * dist;
                    let y = point.y + angle.sin() * dist;
                    painter.fill_circle(Point::new(x, y), scale.max(1.0), color);
                }
            }
        }
        i += 1;
    }
    i
}

fn stroke_segment(painter: &mut Painter<'_>, from: Point, to: Point, width: f64, color: Rgba8) {
    let r = (width * 0.5).max(0.5);
    let dist = distance_between(from, to);
    if dist == 0.0 {
        painter.fill_circle(point_between(from, to), r, color);
        return;
    }
    let steps = dist.ceil() as usize;
    for s in 0..=steps {
        let t = s as f64 / steps as f64;
        let x = from.x + (to.x - from.x) * t;
        let y = from.y + (to.y - from.y) * t;
        painter.fill_circle(Point::new(x, y), r, color);
    }
}

// deterministic scatter: spray must not depend on wall-clock entropy, so
// the generator is seeded from the pointer index and position
fn spray_seed(index: usize, point: Point) -> u64 {
    let mut seed = 0xcbf2_9ce4_8422_2325u64;
    for v in [index as u64, point.x.to_bits(), point.y.to_bits()] {
        seed ^= v;
        seed = seed.wrapping_mul(0x0000_0100_0000_01b3);
    }
    seed
}

fn lcg_unit(state: &mut u64) -> f64 {
    *state = state
        .wrapping_mul(6364136223846793005)
        .wrapping_add(1442695040888963407);
    ((*state >> 33) as f64) / f64::from(1u32 << 31)
}
