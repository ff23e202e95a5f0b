//! Painter preparation for drawing transformed layer content, and the
//! reverse transformation used when committing on-screen manipulations back
//! into a layer's untransformed source space.

use crate::{
    core::{Point, Rect, Viewport},
    math::{rotation_center, scale_rectangle, translate_pointer_rotation},
    model::{Layer, Transform2D},
    painter::Painter,
};

/// Prepare `painter` to draw mirrored, scaled or rotated layer content.
/// Save the painter state before calling and restore it after drawing.
///
/// Returns the transformed bounding box of the layer, or `None` when the
/// layer carries no transformation (nothing was done to the painter).
pub fn apply_transformation(
    painter: &mut Painter<'_>,
    layer: &Layer,
    viewport: Viewport,
) -> Option<Rect> {
    let Transform2D {
        scale,
        rotation,
        mirror_x,
        mirror_y,
    } = layer.transform;

    if layer.transform.is_identity() {
        return None; // nothing to transform
    }

    let mut bounds = layer.rect();

    // 1. apply layer scaling through the bounds rather than the painter so
    //    viewport pan logic keeps working on the returned rectangle
    if scale != 1.0 {
        bounds = scale_rectangle(bounds, scale);
    }

    let width = bounds.width();
    let height = bounds.height();
    let (mut left, mut top) = (bounds.x0, bounds.y0);

    // 2. offset for the viewport pan position
    painter.translate(-viewport.left, -viewport.top);

    // 3. mirror
    if mirror_x || mirror_y {
        painter.scale(
            if mirror_x { -1.0 } else { 1.0 },
            if mirror_y { -1.0 } else { 1.0 },
        );
        painter.translate(
            if mirror_x { -width } else { 0.0 },
            if mirror_y { -height } else { 0.0 },
        );

        // correct for the inverted axes so interactions with the content
        // keep feeling natural
        if mirror_x {
            left = -left;
        }
        if mirror_y {
            top = -top;
        }
    }

    let bounds = Rect::new(left, top, left + width, top + height);

    // 4. rotation
    if rotation != 0.0 {
        let center = rotation_center(bounds, true);
        painter.translate(center.x, center.y);
        painter.rotate(if mirror_x { -rotation } else { rotation });
        painter.translate(-center.x, -center.y);
    }
    Some(bounds)
}

/// Prepare `painter` to draw ON THE SOURCE of transformed content: reverse
/// the layer transform so on-screen manipulations land at the right origin
/// in the untransformed source. `width`/`height` are the unscaled layer
/// dimensions.
///
/// Returns the source-relative bounding box, or `None` when no
/// transformation was present.
pub fn reverse_transformation(
    painter: &mut Painter<'_>,
    transform: Transform2D,
    width: f64,
    height: f64,
) -> Option<Rect> {
    let Transform2D {
        scale,
        rotation,
        mirror_x,
        mirror_y,
    } = transform;

    if transform.is_identity() {
        return None;
    }

    let mut bounds = Rect::new(0.0, 0.0, width, height);

    // 1. mirror
    if mirror_x || mirror_y {
        painter.scale(
            if mirror_x { -1.0 } else { 1.0 },
            if mirror_y { -1.0 } else { 1.0 },
        );
        painter.translate(
            if mirror_x { -width } else { 0.0 },
            if mirror_y { -height } else { 0.0 },
        );
    }

    // 2. rotation (reversed, about the source center)
    if rotation != 0.0 {
        let tx = width * 0.5;
        let ty = height * 0.5;
        painter.translate(tx, ty);
        painter.rotate(if mirror_y { rotation } else { -rotation });
        painter.translate(-tx, -ty);
    }

    // 3. scale
    if scale != 1.0 {
        painter.scale(1.0 / scale, 1.0 / scale);

        let scaled = scale_rectangle(bounds, scale);
        // offset by the delta between the scaled and unscaled bounds
        let left = bounds.x0 - (scaled.width() - bounds.width()) * 0.5;
        let top = bounds.y0 - (scaled.height() - bounds.height()) * 0.5;
        bounds = Rect::new(left, top, left + bounds.width(), top + bounds.height());
    }
    Some(bounds)
}

/// Translate a pointer in canvas space into the layer's local,
/// untransformed coordinate space by inverse-applying rotation and
/// mirroring about the layer's own center.
pub fn rotate_pointer(pointer: Point, layer: &Layer, width: f64, height: f64) -> Point {
    let t = layer.transform;
    let cx = layer.left + width * 0.5;
    let cy = layer.top + height * 0.5;
    let rotation = if t.mirror_y { -t.rotation } else { t.rotation };

    let p = if rotation != 0.0 {
        translate_pointer_rotation(pointer.x, pointer.y, cx, cy, rotation)
    } else {
        pointer
    };

    let mut x = p.x - layer.left;
    let mut y = p.y - layer.top;
    if t.mirror_x {
        x = width - x;
    }
    if t.mirror_y {
        y = height - y;
    }
    Point::new(x, y)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::core::{LayerId, Rgba8};
    use crate::surface::RasterSurface;
    use std::f64::consts::FRAC_PI_2;

    #[test]
    fn identity_transform_is_a_noop() {
        let layer = Layer::new(LayerId(1), "l", 8, 8);
        let mut surface = RasterSurface::new(8, 8);
        let mut painter = Painter::new(&mut surface);
        assert!(apply_transformation(&mut painter, &layer, Viewport::default()).is_none());
        assert!(reverse_transformation(&mut painter, layer.transform, 8.0, 8.0).is_none());
    }

    #[test]
    fn scaled_bounds_are_returned_centered() {
        let mut layer = Layer::new(LayerId(1), "l", 10, 10);
        layer.left = 20.0;
        layer.top = 20.0;
        layer.transform.scale = 2.0;

        let mut surface = RasterSurface::new(64, 64);
        let mut painter = Painter::new(&mut surface);
        let bounds = apply_transformation(&mut painter, &layer, Viewport::default()).unwrap();
        assert_eq!(bounds, Rect::new(15.0, 15.0, 35.0, 35.0));
    }

    #[test]
    fn reverse_transform_round_trips_rotated_draw() {
        // drawing through reverse_transformation then reading through
        // apply_transformation lands content where the gesture happened
        let mut layer = Layer::new(LayerId(1), "l", 9, 9);
        layer.transform.rotation = FRAC_PI_2;

        let mut painter = Painter::new(&mut layer.source);
        painter.save();
        reverse_transformation(&mut painter, layer.transform, 9.0, 9.0);
        // stamp at the center: rotation about the center keeps it in place
        painter.fill_rect(Rect::new(4.0, 4.0, 5.0, 5.0), Rgba8::opaque(255, 0, 0));
        painter.restore();
        drop(painter);
        assert_eq!(layer.source.pixel(4, 4).unwrap().r, 255);
    }

    #[test]
    fn rotate_pointer_maps_screen_to_local_space() {
        let mut layer = Layer::new(LayerId(1), "l", 10, 10);
        layer.transform.rotation = FRAC_PI_2;
        // the center maps to itself
        let center = rotate_pointer(Point::new(5.0, 5.0), &layer, 10.0, 10.0);
        assert!((center.x - 5.0).abs() < 1e-9);
        assert!((center.y - 5.0).abs() < 1e-9);

        // a point rotated on screen maps back to its unrotated position
        let p = rotate_pointer(Point::new(5.0, 1.0), &layer, 10.0, 10.0);
        assert!((p.x - 1.0).abs() < 1e-9, "got {p:?}");
        assert!((p.y - 5.0).abs() < 1e-9, "got {p:?}");
    }

    #[test]
    fn rotate_pointer_applies_mirror() {
        let mut layer = Layer::new(LayerId(1), "l", 10, 10);
        layer.transform.mirror_x = true;
        let p = rotate_pointer(Point::new(2.0, 3.0), &layer, 10.0, 10.0);
        assert_eq!((p.x, p.y), (8.0, 3.0));
    }
}
