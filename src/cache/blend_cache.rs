//! Single-slot whole-stack blend composite cache.
//!
//! Holds one bitmap representing "layers 0..N merged" for the highest layer
//! index N that requires non-default blend compositing. Only one stack
//! position is cached at a time; storing a higher index supersedes a lower
//! one, since the lower content is already merged into the higher bitmap
//! transitively.
//!
//! Interactive gestures pause the cache instead of disabling it: a pause
//! from a layer at or below the cached index makes the cache unreadable for
//! the duration of the gesture, while a pause from a layer strictly above
//! the cached index is ignored (an edit above the merged region cannot
//! corrupt the merged bitmap). Un-pausing flushes, because the merged
//! content can no longer be trusted to reflect the resumed state.

use tracing::debug;

use crate::surface::RasterSurface;

/// State machine over {Disabled, Idle, Cached(index), Paused(index)}.
#[derive(Debug)]
pub struct BlendedLayerCache {
    enabled: bool,
    paused: bool,
    /// Index of the layer owning the blended content; -1 when empty.
    index: i64,
    bitmap: Option<RasterSurface>,
    /// Indices of all layers participating in the blend, up to and
    /// including the layer at the cache index.
    blendable: Option<Vec<usize>>,
}

impl Default for BlendedLayerCache {
    fn default() -> Self {
        Self::new()
    }
}

impl BlendedLayerCache {
    pub fn new() -> Self {
        Self {
            enabled: false,
            paused: false,
            index: -1,
            bitmap: None,
            blendable: None,
        }
    }

    /// Whether reads through the cache are currently permitted.
    pub fn is_active(&self) -> bool {
        self.enabled && !self.paused
    }

    /// Enable or disable blend caching for the current document, recording
    /// which layer indices are considered blendable. Disabling discards the
    /// bitmap and resets the index.
    pub fn set_enabled(&mut self, enabled: bool, blendable: Option<&[usize]>) {
        self.enabled = enabled;
        if !enabled {
            self.index = -1;
            self.bitmap = None;
        }
        self.blendable = blendable.map(<[usize]>::to_vec);
        debug!(enabled, "blend caching toggled");
    }

    pub fn blendable_layers(&self) -> Option<&[usize]> {
        self.blendable.as_deref()
    }

    /// Whether the layer at `index` is covered by the cache, i.e. strictly
    /// below the layer owning the cached blend. The owning index itself is
    /// excluded, which makes diffing and cache generation straightforward
    /// for the draw pass.
    pub fn is_covered(&self, index: usize) -> bool {
        (index as i64) < self.index
    }

    /// The cached bitmap, returned only on an exact index match. Any
    /// mismatch returns `None` and forces recompute upstream.
    pub fn bitmap(&self, index: usize) -> Option<&RasterSurface> {
        if self.index != index as i64 {
            return None;
        }
        self.bitmap.as_ref()
    }

    /// Cache `bitmap` and associate its ownership with the layer at
    /// `index`. Storing a higher index than the current one is fine: the
    /// lower layer's blended content is subsumed by the higher bitmap.
    pub fn store(&mut self, index: usize, bitmap: RasterSurface) {
        debug!(index, previous = self.index, "storing blended layer cache");
        self.index = index as i64;
        self.bitmap = Some(bitmap);
    }

    /// Discard the cached bitmap and reset the index so the cache can be
    /// regenerated on the next render. Cheaper than disabling: the enabled
    /// flag and pause state persist.
    pub fn flush(&mut self) {
        debug!("flushing blended layer cache");
        self.index = -1;
        self.bitmap = None;
    }

    /// Pause or resume caching on behalf of the layer at
    /// `requesting_index`. The request only succeeds when that layer is at
    /// or below the cached index; a request from strictly above is ignored.
    /// Resuming flushes the cache.
    pub fn pause(&mut self, requesting_index: usize, paused: bool) {
        let is_cached =
            self.index == requesting_index as i64 || self.is_covered(requesting_index);
        if !is_cached {
            return;
        }
        let was_paused = self.paused;
        self.paused = paused;

        if was_paused && !paused {
            self.flush();
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn bmp() -> RasterSurface {
        RasterSurface::new(2, 2)
    }

    #[test]
    fn empty_cache_covers_nothing() {
        let cache = BlendedLayerCache::new();
        for i in 0..8 {
            assert!(!cache.is_covered(i));
        }
        assert!(cache.bitmap(0).is_none());
    }

    #[test]
    fn store_covers_lower_indices_only() {
        let mut cache = BlendedLayerCache::new();
        cache.set_enabled(true, Some(&[1, 3]));
        cache.store(3, bmp());

        for i in 0..3 {
            assert!(cache.is_covered(i), "index {i} should be covered");
        }
        assert!(!cache.is_covered(3));
        assert!(!cache.is_covered(4));

        assert!(cache.bitmap(3).is_some());
        assert!(cache.bitmap(2).is_none());
        assert!(cache.bitmap(4).is_none());
    }

    #[test]
    fn higher_store_supersedes_lower() {
        let mut cache = BlendedLayerCache::new();
        cache.set_enabled(true, None);
        cache.store(1, bmp());
        cache.store(4, bmp());
        assert!(cache.bitmap(1).is_none());
        assert!(cache.bitmap(4).is_some());
        assert!(cache.is_covered(3));
    }

    #[test]
    fn flush_clears_content_but_preserves_enabled() {
        let mut cache = BlendedLayerCache::new();
        cache.set_enabled(true, Some(&[0]));
        cache.store(2, bmp());
        cache.flush();
        assert!(cache.bitmap(2).is_none());
        assert!(!cache.is_covered(0));
        assert!(cache.is_active());
        assert_eq!(cache.blendable_layers(), Some(&[0usize][..]));
    }

    #[test]
    fn disable_discards_bitmap_and_index() {
        let mut cache = BlendedLayerCache::new();
        cache.set_enabled(true, None);
        cache.store(2, bmp());
        cache.set_enabled(false, None);
        assert!(!cache.is_active());
        assert!(cache.bitmap(2).is_none());
        assert!(!cache.is_covered(0));
    }

    #[test]
    fn pause_succeeds_only_at_or_below_cached_index() {
        let mut cache = BlendedLayerCache::new();
        cache.set_enabled(true, None);
        cache.store(2, bmp());

        // above the cached index: ignored, caching stays readable
        cache.pause(3, true);
        assert!(cache.is_active());

        // at the cached index: succeeds
        cache.pause(2, true);
        assert!(!cache.is_active());
    }

    #[test]
    fn unpause_always_flushes() {
        let mut cache = BlendedLayerCache::new();
        cache.set_enabled(true, None);
        cache.store(2, bmp());
        cache.pause(1, true);
        cache.pause(1, false);
        assert!(cache.is_active());
        // even with no intervening store, the bitmap is gone
        assert!(cache.bitmap(2).is_none());
    }

    #[test]
    fn pause_on_empty_cache_is_ignored() {
        let mut cache = BlendedLayerCache::new();
        cache.set_enabled(true, None);
        cache.pause(0, true);
        assert!(cache.is_active());
    }
}
