//! Per-layer memoization of derived render artifacts.
//!
//! Entries are keyed by layer id and hold artifacts keyed implicitly by the
//! configuration snapshot that produced them: a cached artifact is valid
//! only while its stored snapshot deep-equals the layer's current
//! configuration. Staleness is detected by comparison, never by time.

use std::collections::HashMap;

use crate::{
    core::LayerId,
    model::{FilterConfig, TextConfig},
    surface::RasterSurface,
};

/// Memoized derived artifacts for one layer. Also used as the partial-update
/// payload for [`BitmapCache::set`]: only `Some` fields are merged in.
#[derive(Clone, Debug, Default)]
pub struct RenderCache {
    /// Text configuration snapshot the rendered text raster was produced from.
    pub text: Option<TextConfig>,
    /// Rendered text raster.
    pub text_bitmap: Option<RasterSurface>,
    /// Filter configuration snapshot the filtered pixels were produced from.
    pub filters: Option<FilterConfig>,
    /// Filtered pixel data.
    pub filter_data: Option<RasterSurface>,
}

/// Property selector for [`BitmapCache::clear_property`].
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum CacheProperty {
    Text,
    TextBitmap,
    Filters,
    FilterData,
}

/// Keyed store mapping layer identity to memoized derived artifacts.
///
/// All operations are total over the key space: a miss is a valid return,
/// never an error.
#[derive(Debug, Default)]
pub struct BitmapCache {
    entries: HashMap<LayerId, RenderCache>,
}

impl BitmapCache {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn get(&self, id: LayerId) -> Option<&RenderCache> {
        self.entries.get(&id)
    }

    pub fn has(&self, id: LayerId) -> bool {
        self.entries.contains_key(&id)
    }

    /// Shallow-merge `props` into the entry for `id`, creating the entry if
    /// absent. Only `Some` fields overwrite; existing fields not named in
    /// `props` are preserved.
    pub fn set(&mut self, id: LayerId, props: RenderCache) {
        let entry = self.entries.entry(id).or_default();
        if let Some(text) = props.text {
            entry.text = Some(text);
        }
        if let Some(text_bitmap) = props.text_bitmap {
            entry.text_bitmap = Some(text_bitmap);
        }
        if let Some(filters) = props.filters {
            entry.filters = Some(filters);
        }
        if let Some(filter_data) = props.filter_data {
            entry.filter_data = Some(filter_data);
        }
    }

    /// Remove one property from the entry if present; no-op otherwise.
    pub fn clear_property(&mut self, id: LayerId, property: CacheProperty) {
        if let Some(entry) = self.entries.get_mut(&id) {
            match property {
                CacheProperty::Text => entry.text = None,
                CacheProperty::TextBitmap => entry.text_bitmap = None,
                CacheProperty::Filters => entry.filters = None,
                CacheProperty::FilterData => entry.filter_data = None,
            }
        }
    }

    /// Drop the whole entry for a layer (layer removal / disposal).
    pub fn evict(&mut self, id: LayerId) {
        self.entries.remove(&id);
    }

    /// Empty the store (document close).
    pub fn clear_all(&mut self) {
        self.entries.clear();
    }
}
