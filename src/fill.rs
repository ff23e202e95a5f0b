//! Flood fill ("smart fill"): fills the connected region whose pixels match
//! the color under the fill origin.

use crate::{core::Rgba8, surface::RasterSurface};

/// Scanline flood fill starting at `(source_x, source_y)`, replacing the
/// connected region of the origin's exact color with `fill_color`.
pub fn flood_fill(surface: &mut RasterSurface, source_x: f64, source_y: f64, fill_color: Rgba8) {
    let width = surface.width();
    let height = surface.height();
    if width == 0 || height == 0 || source_x < 0.0 || source_y < 0.0 {
        return;
    }
    let (sx, sy) = (source_x.floor() as u32, source_y.floor() as u32);
    let Some(target) = surface.pixel(sx, sy) else {
        return;
    };
    if target == fill_color {
        return;
    }

    let mut stack = vec![(sx, sy)];
    while let Some((x, y)) = stack.pop() {
        // walk to the left edge of the matching span
        let mut left = x;
        while left > 0 && surface.pixel(left - 1, y) == Some(target) {
            left -= 1;
        }

        let mut above_open = true;
        let mut below_open = true;
        let mut cursor = left;
        while cursor < width && surface.pixel(cursor, y) == Some(target) {
            surface.put_pixel(cursor, y, fill_color);

            if y > 0 {
                let matches = surface.pixel(cursor, y - 1) == Some(target);
                if matches && above_open {
                    stack.push((cursor, y - 1));
                    above_open = false;
                } else if !matches {
                    above_open = true;
                }
            }
            if y + 1 < height {
                let matches = surface.pixel(cursor, y + 1) == Some(target);
                if matches && below_open {
                    stack.push((cursor, y + 1));
                    below_open = false;
                } else if !matches {
                    below_open = true;
                }
            }
            cursor += 1;
        }
    }
}
