//! Generic adjustment filters (gamma, invert, desaturate, brightness,
//! contrast, vibrance, threshold) applied in place over a straight RGBA8
//! buffer.
//!
//! Stage order is significant and must not change. Each stage is skipped
//! entirely when its parameter equals the neutral default so an "off"
//! filter is an exact identity (no float drift from no-op multiplies).

use rayon::prelude::*;

use crate::model::FilterConfig;

const MAX_8BIT: f64 = 255.0;
const HALF_MAX_8BIT: f64 = 2.0 / 255.0;
const ONE_THIRD: f64 = 1.0 / 3.0;
const HALF: f64 = 0.5;

/// Pixels per parallel work unit. Pixels are independent, so the chunk
/// size only affects scheduling granularity.
const PIXELS_PER_CHUNK: usize = 4096;

pub fn apply_adjustments(pixels: &mut [u8], config: &FilterConfig) {
    let defaults = FilterConfig::default();

    let do_brightness = config.brightness != defaults.brightness;
    let do_contrast = config.contrast != defaults.contrast;
    let do_gamma = config.gamma != defaults.gamma;
    let do_vibrance = config.vibrance != defaults.vibrance;
    let do_threshold = config.threshold != defaults.threshold;
    let do_invert = config.invert != defaults.invert;
    let desaturate = config.desaturate;

    if !(do_brightness
        || do_contrast
        || do_gamma
        || do_vibrance
        || do_threshold
        || do_invert
        || desaturate)
    {
        return;
    }

    let brightness = config.brightness * 2.0;
    let contrast = (((config.contrast * 100.0) + 100.0) / 100.0).powi(2);
    let gamma = config.gamma * 2.0;
    let vibrance = -((config.vibrance * 200.0) - 100.0);
    let threshold = config.threshold;
    let gamma_squared = gamma * gamma;

    pixels
        .par_chunks_mut(PIXELS_PER_CHUNK * 4)
        .for_each(|chunk| {
            for px in chunk.chunks_exact_mut(4) {
                let a = px[3];
                if a == 0 {
                    continue; // pixel is transparent
                }

                let mut r = f64::from(px[0]);
                let mut g = f64::from(px[1]);
                let mut b = f64::from(px[2]);

                if do_gamma {
                    r *= gamma_squared;
                    g *= gamma_squared;
                    b *= gamma_squared;
                }

                if do_invert {
                    r = MAX_8BIT - r;
                    g = MAX_8BIT - g;
                    b = MAX_8BIT - b;
                }

                if desaturate {
                    let gray_scale = r * 0.3 + g * 0.59 + b * 0.11;
                    r = gray_scale;
                    g = gray_scale;
                    b = gray_scale;
                }

                if do_brightness {
                    r *= brightness;
                    g *= brightness;
                    b *= brightness;
                }

                if do_contrast {
                    r = ((r / MAX_8BIT - HALF) * contrast + HALF) * MAX_8BIT;
                    g = ((g / MAX_8BIT - HALF) * contrast + HALF) * MAX_8BIT;
                    b = ((b / MAX_8BIT - HALF) * contrast + HALF) * MAX_8BIT;
                }

                if do_vibrance {
                    let max = r.max(g).max(b);
                    let avg = (r + g + b) * ONE_THIRD;
                    let amt = ((max - avg).abs() * HALF_MAX_8BIT) * vibrance * 0.1;

                    if r != max {
                        r += (max - r) * amt;
                    }
                    if g != max {
                        g += (max - g) * amt;
                    }
                    if b != max {
                        b += (max - b) * amt;
                    }
                }

                if do_threshold {
                    let luma = r * 0.3 + g * 0.59 + b * 0.11;
                    let luma = if luma < threshold { 0.0 } else { MAX_8BIT };
                    r = luma;
                    g = luma;
                    b = luma;
                }

                px[0] = r.round().clamp(0.0, MAX_8BIT) as u8;
                px[1] = g.round().clamp(0.0, MAX_8BIT) as u8;
                px[2] = b.round().clamp(0.0, MAX_8BIT) as u8;
                // no filter touches the alpha channel
            }
        });
}

#[cfg(test)]
mod tests {
    use super::*;

    fn gradient_buffer() -> Vec<u8> {
        let mut buf = Vec::new();
        for i in 0..64u32 {
            buf.extend_from_slice(&[(i * 4) as u8, (255 - i * 4) as u8, (i * 2) as u8, 255]);
        }
        // include a transparent pixel, which every stage must skip
        buf.extend_from_slice(&[120, 130, 140, 0]);
        buf
    }

    #[test]
    fn neutral_config_is_byte_exact_identity() {
        let mut buf = gradient_buffer();
        let before = buf.clone();
        apply_adjustments(&mut buf, &FilterConfig::default());
        assert_eq!(buf, before);
    }

    #[test]
    fn transparent_pixels_are_skipped() {
        let mut buf = vec![100u8, 100, 100, 0];
        apply_adjustments(
            &mut buf,
            &FilterConfig {
                invert: true,
                ..FilterConfig::default()
            },
        );
        assert_eq!(buf, vec![100, 100, 100, 0]);
    }

    #[test]
    fn invert_reflects_channels() {
        let mut buf = vec![10u8, 20, 30, 255];
        apply_adjustments(
            &mut buf,
            &FilterConfig {
                invert: true,
                ..FilterConfig::default()
            },
        );
        assert_eq!(buf, vec![245, 235, 225, 255]);
    }

    #[test]
    fn desaturate_uses_luma_weights() {
        let mut buf = vec![100u8, 200, 50, 255];
        apply_adjustments(
            &mut buf,
            &FilterConfig {
                desaturate: true,
                ..FilterConfig::default()
            },
        );
        // 100*0.3 + 200*0.59 + 50*0.11 = 153.5 -> 154
        assert_eq!(buf, vec![154, 154, 154, 255]);
    }

    #[test]
    fn brightness_is_multiplicative() {
        let mut buf = vec![100u8, 50, 200, 255];
        apply_adjustments(
            &mut buf,
            &FilterConfig {
                brightness: 0.75, // factor 1.5
                ..FilterConfig::default()
            },
        );
        assert_eq!(buf, vec![150, 75, 255, 255]);
    }

    #[test]
    fn threshold_binarizes_luma() {
        let mut buf = vec![10u8, 10, 10, 255, 250, 250, 250, 255];
        apply_adjustments(
            &mut buf,
            &FilterConfig {
                threshold: 128.0,
                ..FilterConfig::default()
            },
        );
        assert_eq!(buf, vec![0, 0, 0, 255, 255, 255, 255, 255]);
    }

    #[test]
    fn alpha_channel_is_never_modified() {
        let mut buf = vec![10u8, 20, 30, 200];
        apply_adjustments(
            &mut buf,
            &FilterConfig {
                invert: true,
                brightness: 0.9,
                contrast: 0.4,
                ..FilterConfig::default()
            },
        );
        assert_eq!(buf[3], 200);
    }
}
