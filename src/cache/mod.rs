//! Long-lived caches owned by the compositing pipeline, with lifecycles
//! tied to document open/close.

pub mod bitmap_cache;
pub mod blend_cache;

pub use bitmap_cache::{BitmapCache, CacheProperty, RenderCache};
pub use blend_cache::BlendedLayerCache;
