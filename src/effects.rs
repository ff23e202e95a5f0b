//! Effect rendering: rasterize a layer's text + filter + mask configuration
//! into the bitmap the compositing pass draws.
//!
//! Derived artifacts (rendered text, filtered pixels) are memoized in the
//! per-layer cache and reused while their configuration snapshots still
//! deep-equal the layer's current configuration.

use tracing::{debug, warn};

use crate::{
    cache::{BitmapCache, RenderCache},
    error::BitmillResult,
    filters::FilterWorker,
    masking::mask_image,
    model::{Layer, TextConfig},
    painter::Painter,
    surface::RasterSurface,
};

/// Collaborator that rasterizes text content. Actual shaping is out of
/// scope for the core; tests and hosts inject an implementation.
pub trait TextRasterizer {
    fn rasterize(&mut self, text: &TextConfig) -> BitmillResult<RasterSurface>;
}

/// Result of one effect render pass.
pub struct EffectsOutput {
    /// The fully effected bitmap (text/filters/mask applied).
    pub bitmap: RasterSurface,
    /// The effected source without the mask applied; present only when the
    /// layer has a mask.
    pub unmasked_bitmap: Option<RasterSurface>,
}

/// Render the layer's effect stack. Returns `Ok(None)` when the filter
/// worker failed: the failure is non-fatal and the caller keeps the
/// last-good bitmap.
pub fn render_effects_for_layer(
    layer: &mut Layer,
    cache: &mut BitmapCache,
    worker: &mut FilterWorker,
    mut text_rasterizer: Option<&mut (dyn TextRasterizer + 'static)>,
    use_caching: bool,
) -> BitmillResult<Option<EffectsOutput>> {
    let mut width = layer.width;
    let mut height = layer.height;
    let mut canvas = RasterSurface::new(width, height);
    let mut cache_to_set = RenderCache::default();

    let apply_filter = layer.filters.has_filters();
    let mut cached_filtered = (apply_filter && use_caching)
        .then(|| cache.get(layer.id))
        .flatten()
        .filter(|entry| entry.filters.as_ref() == Some(&layer.filters))
        .and_then(|entry| entry.filter_data.clone());

    // step 1. render layer source contents
    let text_config = layer.text.clone().filter(|t| !t.value.is_empty());
    if let (Some(text), Some(rasterizer)) = (text_config, text_rasterizer.as_mut()) {
        let cached_bitmap = use_caching
            .then(|| cache.get(layer.id))
            .flatten()
            .filter(|entry| entry.text.as_ref() == Some(&text))
            .and_then(|entry| entry.text_bitmap.clone());

        let text_bitmap = match cached_bitmap {
            Some(bitmap) => {
                debug!(layer = layer.id.0, "reading rendered text from cache");
                bitmap
            }
            None => {
                let bitmap = rasterizer.rasterize(&text)?;
                layer.source = bitmap.clone();
                cache_to_set.text = Some(text);
                cache_to_set.text_bitmap = Some(bitmap.clone());
                // new contents need to be refiltered
                cached_filtered = None;
                bitmap
            }
        };
        width = text_bitmap.width();
        height = text_bitmap.height();
        canvas.resize(width, height);
        let mut painter = Painter::new(&mut canvas);
        painter.draw_surface_at(&text_bitmap, 0.0, 0.0);
    } else if cached_filtered.is_none() {
        let mut painter = Painter::new(&mut canvas);
        painter.draw_surface_at(&layer.source, 0.0, 0.0);
    }

    // step 2. apply filters; cached to avoid unnecessary crunching
    if apply_filter {
        if let Some(filtered) = cached_filtered {
            debug!(layer = layer.id.0, "reading filtered content from cache");
            canvas = filtered;
        } else {
            // the buffer is moved to the worker and back; the surface is
            // untouchable while the job is outstanding
            let pixels = canvas.take_data();
            match worker.run_job(pixels, &layer.filters) {
                Ok(filtered) => {
                    canvas.restore_data(width, height, filtered)?;
                    cache_to_set.filters = Some(layer.filters.clone());
                    cache_to_set.filter_data = Some(canvas.clone());
                }
                Err(error) => {
                    // non-fatal: the layer keeps its last-good bitmap
                    warn!(layer = layer.id.0, %error, "filter job failed");
                    return Ok(None);
                }
            }
        }
    }

    // step 3. apply mask
    let unmasked_bitmap = match &layer.mask {
        Some(mask) => {
            let unmasked = canvas.clone();
            let mask_source = if apply_filter {
                unmasked.clone()
            } else {
                layer.source.clone()
            };
            mask_image(&mut canvas, &mask_source, mask, layer.mask_x, layer.mask_y);
            Some(unmasked)
        }
        None => None,
    };

    // step 4. update the cache
    let wrote_artifacts = cache_to_set.text.is_some()
        || cache_to_set.text_bitmap.is_some()
        || cache_to_set.filters.is_some()
        || cache_to_set.filter_data.is_some();
    if use_caching && wrote_artifacts {
        cache.set(layer.id, cache_to_set);
    }

    Ok(Some(EffectsOutput {
        bitmap: canvas,
        unmasked_bitmap,
    }))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::core::{LayerId, Rgba8};
    use crate::model::FilterConfig;

    struct StubText;
    impl TextRasterizer for StubText {
        fn rasterize(&mut self, text: &TextConfig) -> BitmillResult<RasterSurface> {
            let mut surface = RasterSurface::new(6, 6);
            surface.fill(text.color);
            Ok(surface)
        }
    }

    fn text_config(value: &str) -> TextConfig {
        TextConfig {
            value: value.into(),
            font: "Sans".into(),
            size: 10.0,
            line_height: 12.0,
            letter_spacing: 0.0,
            color: Rgba8::opaque(40, 50, 60),
        }
    }

    #[test]
    fn plain_layer_renders_source_unchanged() {
        let mut layer = Layer::new(LayerId(1), "l", 4, 4);
        layer.source.fill(Rgba8::opaque(10, 20, 30));
        let mut cache = BitmapCache::new();
        let mut worker = FilterWorker::spawn().unwrap();

        let out = render_effects_for_layer(&mut layer, &mut cache, &mut worker, None, true)
            .unwrap()
            .unwrap();
        assert_eq!(out.bitmap, layer.source);
        assert!(out.unmasked_bitmap.is_none());
        // nothing cache-worthy happened
        assert!(!cache.has(layer.id));
    }

    #[test]
    fn filtered_layer_is_cached_and_reused() {
        let mut layer = Layer::new(LayerId(2), "l", 4, 4);
        layer.source.fill(Rgba8::opaque(10, 20, 30));
        layer.filters = FilterConfig {
            invert: true,
            ..FilterConfig::default()
        };
        let mut cache = BitmapCache::new();
        let mut worker = FilterWorker::spawn().unwrap();

        let out = render_effects_for_layer(&mut layer, &mut cache, &mut worker, None, true)
            .unwrap()
            .unwrap();
        assert_eq!(out.bitmap.pixel(0, 0), Some(Rgba8::opaque(245, 235, 225)));

        let entry = cache.get(layer.id).unwrap();
        assert_eq!(entry.filters.as_ref(), Some(&layer.filters));
        assert!(entry.filter_data.is_some());

        // a second pass serves the cached artifact even if the source
        // changed, because the snapshot still matches
        layer.source.fill(Rgba8::opaque(0, 0, 0));
        let again = render_effects_for_layer(&mut layer, &mut cache, &mut worker, None, true)
            .unwrap()
            .unwrap();
        assert_eq!(again.bitmap.pixel(0, 0), Some(Rgba8::opaque(245, 235, 225)));
    }

    #[test]
    fn stale_filter_snapshot_is_recomputed() {
        let mut layer = Layer::new(LayerId(3), "l", 4, 4);
        layer.source.fill(Rgba8::opaque(100, 100, 100));
        layer.filters = FilterConfig {
            invert: true,
            ..FilterConfig::default()
        };
        let mut cache = BitmapCache::new();
        let mut worker = FilterWorker::spawn().unwrap();
        render_effects_for_layer(&mut layer, &mut cache, &mut worker, None, true).unwrap();

        // configuration changes: the snapshot mismatch forces a recompute
        layer.filters.brightness = 0.25; // factor 0.5
        let out = render_effects_for_layer(&mut layer, &mut cache, &mut worker, None, true)
            .unwrap()
            .unwrap();
        // invert(100) = 155, brightness 0.5 -> 78 (rounded)
        assert_eq!(out.bitmap.pixel(0, 0), Some(Rgba8::opaque(78, 78, 78)));
        assert_eq!(
            cache.get(layer.id).unwrap().filters.as_ref(),
            Some(&layer.filters)
        );
    }

    #[test]
    fn mask_is_applied_and_unmasked_bitmap_kept() {
        let mut layer = Layer::new(LayerId(4), "l", 4, 4);
        layer.source.fill(Rgba8::opaque(10, 20, 30));
        let mut mask = RasterSurface::new(4, 4);
        mask.put_pixel(1, 1, Rgba8::new(0, 0, 0, 255));
        layer.set_mask(mask).unwrap();

        let mut cache = BitmapCache::new();
        let mut worker = FilterWorker::spawn().unwrap();
        let out = render_effects_for_layer(&mut layer, &mut cache, &mut worker, None, true)
            .unwrap()
            .unwrap();

        assert_eq!(out.bitmap.pixel(1, 1).unwrap().a, 0);
        assert_eq!(out.bitmap.pixel(0, 0).unwrap().a, 255);
        let unmasked = out.unmasked_bitmap.unwrap();
        assert_eq!(unmasked.pixel(1, 1).unwrap().a, 255);
    }

    #[test]
    fn text_raster_is_cached_by_snapshot() {
        let mut layer = Layer::new(LayerId(5), "l", 4, 4);
        layer.text = Some(text_config("hello"));
        let mut cache = BitmapCache::new();
        let mut worker = FilterWorker::spawn().unwrap();
        let mut rasterizer = StubText;

        let out = render_effects_for_layer(
            &mut layer,
            &mut cache,
            &mut worker,
            Some(&mut rasterizer),
            true,
        )
        .unwrap()
        .unwrap();
        // the text raster replaced the layer source
        assert_eq!(out.bitmap.width(), 6);
        assert_eq!(layer.source.width(), 6);
        let entry = cache.get(layer.id).unwrap();
        assert!(entry.text_bitmap.is_some());
        assert_eq!(entry.text.as_ref(), Some(&text_config("hello")));
    }
}
