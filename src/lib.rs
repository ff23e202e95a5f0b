#![forbid(unsafe_code)]

pub mod blend_cpu;
pub mod brush;
pub mod cache;
pub mod clipping;
pub mod core;
pub mod effects;
pub mod error;
pub mod fill;
pub mod filters;
pub mod history;
pub mod masking;
pub mod math;
pub mod model;
pub mod painter;
pub mod pipeline;
pub mod renderer;
pub mod scheduler;
pub mod scratch;
pub mod surface;
pub mod transforming;

pub use cache::{BitmapCache, BlendedLayerCache, CacheProperty, RenderCache};
pub use core::{LayerId, Rgba8, Viewport};
pub use error::{BitmillError, BitmillResult};
pub use history::HistoryEntry;
pub use model::{
    BlendMode, Document, DuotoneConfig, FilterConfig, Layer, PaintTarget, Selection, Shape,
    TextConfig, Transform2D,
};
pub use painter::{CompositeOp, Painter};
pub use pipeline::{CompositingPipeline, PickedColor};
pub use renderer::{LayerRenderer, ToolType};
pub use surface::RasterSurface;
