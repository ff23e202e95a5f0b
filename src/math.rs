//! Pure geometry routines shared by clipping, painting and position
//! correction.

use crate::{
    core::{Point, Rect, fast_round},
    model::Shape,
};

/// Rotate `point` by `angle` radians around `(cx, cy)` (standard
/// counter-clockwise rotation in a y-down raster space).
pub fn rotate_point(point: Point, angle: f64, cx: f64, cy: f64) -> Point {
    let (sin, cos) = angle.sin_cos();
    let dx = point.x - cx;
    let dy = point.y - cy;
    Point::new(cx + dx * cos - dy * sin, cy + dx * sin + dy * cos)
}

/// Translate a pointer coordinate through a rotation about a center. This is
/// the inverse-sense rotation used when mapping an on-screen coordinate back
/// to rotated layer content.
pub fn translate_pointer_rotation(
    x: f64,
    y: f64,
    rotation_center_x: f64,
    rotation_center_y: f64,
    angle: f64,
) -> Point {
    let x2 = x - rotation_center_x;
    let y2 = y - rotation_center_y;
    let (sin, cos) = angle.sin_cos();
    Point::new(
        (cos * x2) + (sin * y2) + rotation_center_x,
        (cos * y2) - (sin * x2) + rotation_center_y,
    )
}

/// Center of rotation of a rectangle, optionally rounded half-up.
pub fn rotation_center(rect: Rect, rounded: bool) -> Point {
    let x = rect.x0 + rect.width() * 0.5;
    let y = rect.y0 + rect.height() * 0.5;
    if rounded {
        Point::new(fast_round(x) as f64, fast_round(y) as f64)
    } else {
        Point::new(x, y)
    }
}

/// Scale a rectangle around its center.
pub fn scale_rectangle(rect: Rect, scale: f64) -> Rect {
    let scaled_width = rect.width() * scale;
    let scaled_height = rect.height() * scale;
    let left = rect.x0 - (scaled_width * 0.5 - rect.width() * 0.5);
    let top = rect.y0 - (scaled_height * 0.5 - rect.height() * 0.5);
    Rect::new(left, top, left + scaled_width, top + scaled_height)
}

/// Rotate a rectangle around its center and return the BOUNDING BOX of the
/// area the rotated rectangle occupies.
pub fn rotate_rectangle(rect: Rect, angle: f64) -> Rect {
    if angle == 0.0 {
        return rect;
    }
    let half_w = rect.width() * 0.5;
    let half_h = rect.height() * 0.5;
    let (sin, cos) = angle.sin_cos();

    let corners = [
        (-half_w, half_h),
        (half_w, half_h),
        (half_w, -half_h),
        (-half_w, -half_h),
    ];
    let mut x_min = f64::INFINITY;
    let mut x_max = f64::NEG_INFINITY;
    let mut y_min = f64::INFINITY;
    let mut y_max = f64::NEG_INFINITY;
    for (x, y) in corners {
        let rx = x * cos + y * sin;
        let ry = -x * sin + y * cos;
        x_min = x_min.min(rx);
        x_max = x_max.max(rx);
        y_min = y_min.min(ry);
        y_max = y_max.max(ry);
    }

    let width = x_max - x_min;
    let height = y_max - y_min;
    let left = rect.x0 - (width * 0.5 - rect.width() * 0.5);
    let top = rect.y0 - (height * 0.5 - rect.height() * 0.5);
    Rect::new(left, top, left + width, top + height)
}

/// Rotate a rectangle around its center and return the corner coordinates
/// as a closed 5-point shape.
pub fn rotate_rectangle_to_coordinates(rect: Rect, angle: f64) -> Shape {
    let cx = rect.x0 + rect.width() * 0.5;
    let cy = rect.y0 + rect.height() * 0.5;
    let corners = [
        Point::new(rect.x0, rect.y0),
        Point::new(rect.x1, rect.y0),
        Point::new(rect.x1, rect.y1),
        Point::new(rect.x0, rect.y1),
    ];
    let mut rotated: Shape = corners
        .iter()
        .map(|p| rotate_point(*p, angle, cx, cy))
        .collect();
    rotated.push(rotated[0]);
    rotated
}

/// Axis-aligned closed 5-point rectangle shape.
pub fn rectangle_to_shape(width: f64, height: f64, x: f64, y: f64) -> Shape {
    vec![
        Point::new(x, y),
        Point::new(x + width, y),
        Point::new(x + width, y + height),
        Point::new(x, y + height),
        Point::new(x, y),
    ]
}

/// Bounding rectangle of a shape.
pub fn shape_to_rectangle(shape: &Shape) -> Rect {
    let mut min_x = f64::INFINITY;
    let mut min_y = f64::INFINITY;
    let mut max_x = f64::NEG_INFINITY;
    let mut max_y = f64::NEG_INFINITY;
    for p in shape {
        min_x = min_x.min(p.x);
        max_x = max_x.max(p.x);
        min_y = min_y.min(p.y);
        max_y = max_y.max(p.y);
    }
    Rect::new(min_x, min_y, max_x, max_y)
}

/// A shape is closed when it has at least four points and its first point
/// equals its last point exactly.
pub fn is_shape_closed(shape: &Shape) -> bool {
    if shape.len() < 4 {
        return false;
    }
    let first = shape[0];
    let last = shape[shape.len() - 1];
    first.x == last.x && first.y == last.y
}

/// Rectangular shapes are 5-point closed shapes with axis-aligned edges.
pub fn is_shape_rectangular(shape: &Shape) -> bool {
    if shape.len() != 5 {
        return false;
    }
    if shape[1].x != shape[2].x || shape[2].y != shape[3].y {
        return false;
    }
    is_shape_closed(shape)
}

pub fn distance_between(a: Point, b: Point) -> f64 {
    ((b.x - a.x).powi(2) + (b.y - a.y).powi(2)).sqrt()
}

pub fn angle_between(a: Point, b: Point) -> f64 {
    (b.x - a.x).atan2(b.y - a.y)
}

pub fn point_between(a: Point, b: Point) -> Point {
    Point::new(a.x + (b.x - a.x) * 0.5, a.y + (b.y - a.y) * 0.5)
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::f64::consts::FRAC_PI_2;

    fn assert_close(a: f64, b: f64) {
        assert!((a - b).abs() < 1e-9, "{a} != {b}");
    }

    #[test]
    fn rotate_point_quarter_turn() {
        let p = rotate_point(Point::new(10.0, 0.0), FRAC_PI_2, 0.0, 0.0);
        assert_close(p.x, 0.0);
        assert_close(p.y, 10.0);
    }

    #[test]
    fn scale_rectangle_keeps_center() {
        let rect = Rect::new(10.0, 10.0, 30.0, 20.0);
        let scaled = scale_rectangle(rect, 2.0);
        assert_close(scaled.width(), 40.0);
        assert_close(scaled.height(), 20.0);
        assert_eq!(rotation_center(scaled, false), rotation_center(rect, false));
    }

    #[test]
    fn rotate_rectangle_quarter_turn_swaps_extents() {
        let rect = Rect::new(0.0, 0.0, 40.0, 20.0);
        let rotated = rotate_rectangle(rect, FRAC_PI_2);
        assert_close(rotated.width(), 20.0);
        assert_close(rotated.height(), 40.0);
        let (a, b) = (rotation_center(rotated, false), rotation_center(rect, false));
        assert_close(a.x, b.x);
        assert_close(a.y, b.y);
    }

    #[test]
    fn rectangle_shape_is_closed_and_rectangular() {
        let shape = rectangle_to_shape(100.0, 50.0, 10.0, 10.0);
        assert!(is_shape_closed(&shape));
        assert!(is_shape_rectangular(&shape));

        let rotated = rotate_rectangle_to_coordinates(Rect::new(10.0, 10.0, 110.0, 60.0), 0.3);
        assert!(is_shape_closed(&rotated));
        assert!(!is_shape_rectangular(&rotated));
    }

    #[test]
    fn open_or_small_shapes_are_not_closed() {
        assert!(!is_shape_closed(&vec![
            Point::new(0.0, 0.0),
            Point::new(1.0, 0.0),
            Point::new(0.0, 0.0),
        ]));
        let open = vec![
            Point::new(0.0, 0.0),
            Point::new(1.0, 0.0),
            Point::new(1.0, 1.0),
            Point::new(0.0, 1.0),
        ];
        assert!(!is_shape_closed(&open));
    }

    #[test]
    fn shape_to_rectangle_bounds_points() {
        let shape = vec![
            Point::new(5.0, 7.0),
            Point::new(15.0, 3.0),
            Point::new(9.0, 20.0),
        ];
        let rect = shape_to_rectangle(&shape);
        assert_eq!(rect, Rect::new(5.0, 3.0, 15.0, 20.0));
    }
}
