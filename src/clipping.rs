//! Selection clipping.
//!
//! Builds a clip path from a selection outline (possibly multi-shape,
//! optionally inverted) and applies it to a destination painter, accounting
//! for viewport and scale offsets when rendering into a scaled/offset
//! scratch surface.

use crate::{
    core::{BezPath, Point, Rect, Viewport},
    math::{is_shape_rectangular, rotate_rectangle_to_coordinates, scale_rectangle},
    model::{Layer, Shape},
    painter::Painter,
    scratch::OverrideConfig,
};

/// Prepare a clipping path corresponding to the selection outline,
/// transformed to the destination coordinates, and apply it as a clip on
/// `painter`. All subsequent drawing is confined to the path until the
/// painter state is restored.
pub fn clip_to_selection(
    painter: &mut Painter<'_>,
    selection: &[Shape],
    offset_x: f64,
    offset_y: f64,
    invert: bool,
    override_config: Option<&OverrideConfig>,
) {
    let (scale, vp_x, vp_y) = match override_config {
        Some(cfg) => (cfg.scale, cfg.vp_x, cfg.vp_y),
        None => (1.0, 0.0, 0.0),
    };

    // correct for scaling and viewport offset
    let delta_x = vp_x / scale;
    let delta_y = vp_y / scale;

    let width = f64::from(painter.width());
    let height = f64::from(painter.height());

    let mut path = BezPath::new();
    for shape in selection {
        for (index, point) in shape.iter().enumerate() {
            let p = Point::new((point.x - offset_x) - delta_x, (point.y - offset_y) - delta_y);
            if index == 0 {
                path.move_to(p);
            } else {
                path.line_to(p);
            }
        }
        // when the selection is inverted, the clipping operation is
        // reversed by drawing a sign-flipped rectangular outline over the
        // clipping path
        if invert {
            append_inverse_clipping(&mut path, shape, offset_x, offset_y, width, height);
            // clipping per shape is necessary when the selection holds
            // multiple shapes
            painter.clip_path(&path);
        }
    }
    painter.clip_path(&path);
}

/// Append the inverse-clipping rectangle for `shape`. The corner anchor
/// differs between axis-aligned rectangular shapes and general polygons;
/// this asymmetry is load-bearing for compatibility with stored selections
/// and must not be "corrected".
pub(crate) fn append_inverse_clipping(
    path: &mut BezPath,
    shape: &Shape,
    x: f64,
    y: f64,
    width: f64,
    height: f64,
) {
    if is_shape_rectangular(shape) {
        append_rect(path, width - x, -y, -width, height);
    } else {
        append_rect(path, width - x, height - y, -width, -height);
    }
}

/// Equivalent of the canvas `rect()` call: a rectangle subpath starting at
/// `(x, y)` spanning `w` by `h`, where negative spans flip the winding
/// direction.
fn append_rect(path: &mut BezPath, x: f64, y: f64, w: f64, h: f64) {
    path.move_to(Point::new(x, y));
    path.line_to(Point::new(x + w, y));
    path.line_to(Point::new(x + w, y + h));
    path.line_to(Point::new(x, y + h));
    path.close_path();
}

/// Clip `painter` to the layer's actual (post-scale) bounds rotated by the
/// layer's rotation, offset by the viewport. Used to prevent a live-preview
/// scratch surface from painting outside a transformed layer's true
/// footprint before the stroke is committed.
pub fn clip_layer_to_bounds(
    painter: &mut Painter<'_>,
    layer: &Layer,
    renderer_bounds: Rect,
    viewport: Viewport,
    invert: bool,
) {
    let rect = scale_rectangle(renderer_bounds, layer.transform.scale);
    let rotation = if layer.transform.mirror_y {
        -layer.transform.rotation
    } else {
        layer.transform.rotation
    };
    let mut shape = rotate_rectangle_to_coordinates(rect, rotation);
    for point in &mut shape {
        point.x -= viewport.left;
        point.y -= viewport.top;
    }
    clip_to_selection(painter, &[shape], 0.0, 0.0, invert, None);
}
