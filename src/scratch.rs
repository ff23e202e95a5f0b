//! Pooled scratch surfaces and the live-preview / commit pipeline.
//!
//! The pool holds one drawable surface (live stroke preview) and one
//! mask-composite surface, reused across operations. Surfaces are resized
//! rather than reallocated between uses and "disposed" by shrinking to
//! minimal size, staying pooled. Each entry is exclusively used by one
//! interactive gesture at a time.

use tracing::trace;

use crate::{
    brush::{Brush, has_stepped_live_render},
    core::{Point, Rect, Viewport},
    error::{BitmillError, BitmillResult},
    model::Layer,
    painter::{CompositeOp, Painter},
    surface::RasterSurface,
    transforming::reverse_transformation,
};

/// Coordinate-space correction used when rendering into a scaled/offset
/// scratch surface: scaling factors and viewport offsets of the destination,
/// plus the pointer list a draw operation should consume.
#[derive(Clone, Debug, Default)]
pub struct OverrideConfig {
    /// Inverse of the current document scale.
    pub scale: f64,
    /// On-screen zoom factor.
    pub zoom: f64,
    pub vp_x: f64,
    pub vp_y: f64,
    pub pointers: Vec<Point>,
}

/// Build an override configuration for one render operation.
pub fn create_override_config(
    document_scale: f64,
    zoom_factor: f64,
    viewport: Viewport,
    pointers: Vec<Point>,
) -> OverrideConfig {
    OverrideConfig {
        scale: 1.0 / document_scale,
        zoom: zoom_factor,
        vp_x: viewport.left,
        vp_y: viewport.top,
        pointers,
    }
}

/// Correct pointer coordinates for scaling and viewport offset in place.
pub fn apply_override_config(config: &OverrideConfig, pointers: &mut [Point]) {
    let offset_x = config.vp_x / config.scale;
    let offset_y = config.vp_y / config.scale;
    for point in pointers {
        point.x -= offset_x;
        point.y -= offset_y;
    }
}

/// Slice the pointers of an in-progress stroke that still need rendering.
///
/// Kernels with stepped live rendering receive only the tail that was not
/// yet incorporated into the last rendered preview frame (including the
/// previous point, for segment continuity). Kernels that need their full
/// path in one pass receive the entire history as a fresh copy.
pub fn slice_unrendered_pointers(brush: &Brush) -> Vec<Point> {
    if has_stepped_live_render(brush.options.brush_type) {
        let start = brush.last.saturating_sub(1).min(brush.pointers.len());
        brush.pointers[start..].to_vec()
    } else {
        brush.pointers.clone()
    }
}

/// Small set of pooled, resizable scratch surfaces.
#[derive(Debug, Default)]
pub struct ScratchPool {
    drawable: Option<RasterSurface>,
    mask_composite: Option<RasterSurface>,
}

impl ScratchPool {
    pub fn new() -> Self {
        Self::default()
    }

    /// Lazily create the pooled drawable surface and resize it (clearing
    /// contents) for a new operation. Callers must not assume prior
    /// contents persist across acquisitions of a different size.
    pub fn acquire_drawable(&mut self, width: u32, height: u32) -> &mut RasterSurface {
        trace!(width, height, "acquiring drawable scratch surface");
        let surface = self.drawable.get_or_insert_with(|| RasterSurface::new(0, 0));
        surface.resize(width, height);
        surface
    }

    pub fn drawable(&self) -> Option<&RasterSurface> {
        self.drawable.as_ref()
    }

    pub fn drawable_mut(&mut self) -> Option<&mut RasterSurface> {
        self.drawable.as_mut()
    }

    /// Take the mask-composite surface out of the pool, resized for use.
    /// Return it with [`ScratchPool::put_mask_composite`] so the slot stays
    /// pooled.
    pub fn take_mask_composite(&mut self, width: u32, height: u32) -> RasterSurface {
        let mut surface = self
            .mask_composite
            .take()
            .unwrap_or_else(|| RasterSurface::new(0, 0));
        surface.resize(width, height);
        surface
    }

    pub fn put_mask_composite(&mut self, surface: RasterSurface) {
        self.mask_composite = Some(surface);
    }

    /// Shrink the drawable surface to minimal size; the pool slot is never
    /// deallocated.
    pub fn release_drawable(&mut self) {
        if let Some(surface) = &mut self.drawable {
            surface.resize(1, 1);
        }
    }

    /// Shrink the mask-composite surface to minimal size.
    pub fn release_mask_composite(&mut self) {
        if let Some(surface) = &mut self.mask_composite {
            surface.resize(1, 1);
        }
    }

    /// Draw the pooled drawable surface onto a destination painter for
    /// continuous low-latency preview of an in-progress stroke, without
    /// touching the authoritative layer surface.
    pub fn render_live(
        &self,
        destination: &mut Painter<'_>,
        document_scale: f64,
        viewport: Option<Viewport>,
        offset: Option<Point>,
    ) {
        let Some(source) = &self.drawable else {
            return;
        };
        let sw = f64::from(source.width());
        let sh = f64::from(source.height());
        let dx = viewport.map_or(0.0, |vp| vp.left * document_scale) + offset.map_or(0.0, |o| o.x);
        let dy = viewport.map_or(0.0, |vp| vp.top * document_scale) + offset.map_or(0.0, |o| o.y);
        destination.draw_surface(
            source,
            Rect::new(0.0, 0.0, sw, sh),
            Rect::new(dx, dy, dx + sw, dy + sh),
        );
    }

    /// Commit the drawable surface onto the layer's source or mask. This is
    /// the single authoritative point where a live-preview stroke becomes
    /// permanent pixel data.
    ///
    /// `alpha` and the optional composite operator are applied here and not
    /// during live preview, so overlapping semi-transparent stroke segments
    /// do not blend unevenly. The layer's own geometric transform is
    /// reversed so the stroke lands in the layer's untransformed pixel
    /// space, with a centering correction for any active scale effect.
    pub fn commit_to_layer(
        &self,
        layer: &mut Layer,
        to_mask: bool,
        viewport: Viewport,
        document_scale: f64,
        alpha: f64,
        composite: Option<CompositeOp>,
    ) -> BitmillResult<()> {
        let transform = layer.transform;
        let width = f64::from(layer.width);
        let height = f64::from(layer.height);
        let (left, top) = (layer.left, layer.top);

        let destination = if to_mask {
            layer
                .mask
                .as_mut()
                .ok_or_else(|| BitmillError::render("commit target mask is not present"))?
        } else {
            &mut layer.source
        };

        self.blit_reversed(
            destination,
            transform,
            width,
            height,
            left,
            top,
            viewport,
            document_scale,
            alpha,
            composite,
        );
        Ok(())
    }

    /// Blit the drawable surface onto `destination` through the reverse of a
    /// layer transform. Shared by the commit path and the eraser's live
    /// preview (which erases a clone of the effected bitmap the same way).
    #[allow(clippy::too_many_arguments)]
    pub(crate) fn blit_reversed(
        &self,
        destination: &mut RasterSurface,
        transform: crate::model::Transform2D,
        width: f64,
        height: f64,
        left: f64,
        top: f64,
        viewport: Viewport,
        document_scale: f64,
        alpha: f64,
        composite: Option<CompositeOp>,
    ) {
        let Some(source) = &self.drawable else {
            return;
        };

        let scale = transform.scale;
        let offset = Point::new(
            (width * scale * 0.5) - (width * 0.5) - left,
            (height * scale * 0.5) - (height * 0.5) - top,
        );

        let mut painter = Painter::new(destination);
        painter.save();

        reverse_transformation(&mut painter, transform, width, height);

        painter.set_alpha(alpha);
        if let Some(op) = composite {
            painter.set_composite(op);
        }

        let sw = f64::from(source.width());
        let sh = f64::from(source.height());
        let dx = viewport.left * document_scale + offset.x;
        let dy = viewport.top * document_scale + offset.y;
        painter.draw_surface(
            source,
            Rect::new(0.0, 0.0, sw, sh),
            Rect::new(dx, dy, dx + sw, dy + sh),
        );
        painter.restore();
    }
}
