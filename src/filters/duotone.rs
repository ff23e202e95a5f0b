//! Duotone tonal remap: grayscale the buffer, min/max-normalize the tonal
//! range to full 0..255, then remap every value through a precomputed
//! two-color gradient.
//!
//! Both passes must complete before any pixel is finalized, since the
//! normalization depends on the global min/max.

use rayon::prelude::*;

use crate::core::Rgba8;

/// 256-entry linear gradient between two colors, regenerated only when the
/// color pair changes.
#[derive(Clone, Debug, Default)]
pub struct DuotoneLut {
    key: Option<(Rgba8, Rgba8)>,
    lut: Vec<[u8; 3]>,
}

impl DuotoneLut {
    pub fn new() -> Self {
        Self::default()
    }

    fn ensure(&mut self, color1: Rgba8, color2: Rgba8) {
        if self.key == Some((color1, color2)) {
            return;
        }
        let mut lut = Vec::with_capacity(256);
        for i in 0..256u32 {
            let mix = |c1: u8, c2: u8| -> u8 {
                let v = ((255 - i) * u32::from(c1) + i * u32::from(c2)) as f64 / 255.0;
                v.round().clamp(0.0, 255.0) as u8
            };
            lut.push([
                mix(color1.r, color2.r),
                mix(color1.g, color2.g),
                mix(color1.b, color2.b),
            ]);
        }
        self.lut = lut;
        self.key = Some((color1, color2));
    }

    fn map(&self, value: u8) -> [u8; 3] {
        self.lut[usize::from(value)]
    }
}

/// Apply the duotone effect in place. `lut` holds the gradient cache across
/// invocations.
pub fn apply_duotone(pixels: &mut [u8], color1: Rgba8, color2: Rgba8, lut: &mut DuotoneLut) {
    lut.ensure(color1, color2);

    // pass 1: grayscale by RGB averaging, collecting the global tonal range
    let (min, max) = pixels
        .par_chunks_mut(4)
        .map(|px| {
            let r = f64::from(px[0]);
            let g = f64::from(px[1]);
            let b = f64::from(px[2]);
            let v = (0.3333 * r + 0.3333 * g + 0.3333 * b)
                .round()
                .clamp(0.0, 255.0) as u8;
            px[0] = v;
            px[1] = v;
            px[2] = v;
            (v, v)
        })
        .reduce(
            || (255u8, 0u8),
            |(min_a, max_a), (min_b, max_b)| (min_a.min(min_b), max_a.max(max_b)),
        );

    // pass 2: normalize to full range and remap through the gradient
    let range = f64::from(max) - f64::from(min);
    for px in pixels.chunks_exact_mut(4) {
        if px[3] == 0 {
            continue; // pixel is transparent
        }
        let normalized = if range > 0.0 {
            ((f64::from(px[0]) - f64::from(min)) * 255.0 / range)
                .round()
                .clamp(0.0, 255.0) as u8
        } else {
            0
        };
        let mapped = lut.map(normalized);
        px[0] = mapped[0];
        px[1] = mapped[1];
        px[2] = mapped[2];
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    const RED: Rgba8 = Rgba8::opaque(200, 20, 40);
    const BLUE: Rgba8 = Rgba8::opaque(10, 30, 220);

    #[test]
    fn full_range_maps_extremes_exactly_to_colors() {
        // darkest pixel 0, lightest 255
        let mut buf = vec![0u8, 0, 0, 255, 255, 255, 255, 255, 128, 128, 128, 255];
        let mut lut = DuotoneLut::new();
        apply_duotone(&mut buf, RED, BLUE, &mut lut);

        assert_eq!(&buf[0..3], &[RED.r, RED.g, RED.b]);
        assert_eq!(&buf[4..7], &[BLUE.r, BLUE.g, BLUE.b]);
        // middle pixel lands between the two colors
        assert!(buf[8] < RED.r && buf[8] > BLUE.r);
    }

    #[test]
    fn narrow_range_is_stretched_to_full() {
        let mut buf = vec![100u8, 100, 100, 255, 140, 140, 140, 255];
        let mut lut = DuotoneLut::new();
        apply_duotone(&mut buf, RED, BLUE, &mut lut);
        assert_eq!(&buf[0..3], &[RED.r, RED.g, RED.b]);
        assert_eq!(&buf[4..7], &[BLUE.r, BLUE.g, BLUE.b]);
    }

    #[test]
    fn flat_buffer_maps_to_color1() {
        let mut buf = vec![77u8, 77, 77, 255, 77, 77, 77, 255];
        let mut lut = DuotoneLut::new();
        apply_duotone(&mut buf, RED, BLUE, &mut lut);
        assert_eq!(&buf[0..3], &[RED.r, RED.g, RED.b]);
        assert_eq!(&buf[4..7], &[RED.r, RED.g, RED.b]);
    }

    #[test]
    fn transparent_pixels_keep_remap_out_but_count_for_range() {
        let mut buf = vec![0u8, 0, 0, 0, 200, 200, 200, 255];
        let mut lut = DuotoneLut::new();
        apply_duotone(&mut buf, RED, BLUE, &mut lut);
        // transparent pixel is grayscaled but not remapped
        assert_eq!(buf[3], 0);
        // lightest visible pixel normalizes to 255 -> color2
        assert_eq!(&buf[4..7], &[BLUE.r, BLUE.g, BLUE.b]);
    }

    #[test]
    fn gradient_is_cached_per_color_pair() {
        let mut lut = DuotoneLut::new();
        lut.ensure(RED, BLUE);
        let first = lut.lut.clone();
        lut.ensure(RED, BLUE);
        assert_eq!(lut.lut, first);
        lut.ensure(BLUE, RED);
        assert_ne!(lut.lut, first);
    }
}
