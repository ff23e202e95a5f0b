//! Mask application operations.

use crate::{
    painter::{CompositeOp, Painter},
    surface::RasterSurface,
};

/// Apply `mask` onto `source`, writing the result into `destination`.
/// Mask alpha erases: opaque mask pixels punch through the source content.
pub fn mask_image(
    destination: &mut RasterSurface,
    source: &RasterSurface,
    mask: &RasterSurface,
    mask_offset_x: f64,
    mask_offset_y: f64,
) {
    destination.clear();

    let mut painter = Painter::new(destination);
    painter.draw_surface_at(source, 0.0, 0.0);

    painter.save();
    painter.set_composite(CompositeOp::DestinationOut);
    painter.draw_surface_at(mask, mask_offset_x, mask_offset_y);
    painter.restore();
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::core::Rgba8;

    #[test]
    fn mask_erases_covered_pixels() {
        let mut source = RasterSurface::new(4, 1);
        source.fill(Rgba8::opaque(100, 110, 120));

        let mut mask = RasterSurface::new(2, 1);
        mask.fill(Rgba8::new(0, 0, 0, 255));

        let mut dst = RasterSurface::new(4, 1);
        mask_image(&mut dst, &source, &mask, 1.0, 0.0);

        assert_eq!(dst.pixel(0, 0).unwrap().a, 255);
        // mask offset by 1 erases pixels 1..3
        assert_eq!(dst.pixel(1, 0).unwrap().a, 0);
        assert_eq!(dst.pixel(2, 0).unwrap().a, 0);
        assert_eq!(dst.pixel(3, 0).unwrap().a, 255);
    }

    #[test]
    fn partial_mask_alpha_partially_erases() {
        let mut source = RasterSurface::new(1, 1);
        source.fill(Rgba8::opaque(50, 50, 50));
        let mut mask = RasterSurface::new(1, 1);
        mask.fill(Rgba8::new(0, 0, 0, 128));

        let mut dst = RasterSurface::new(1, 1);
        mask_image(&mut dst, &source, &mask, 0.0, 0.0);
        let a = dst.pixel(0, 0).unwrap().a;
        assert!(a > 120 && a < 135, "got {a}");
    }
}
