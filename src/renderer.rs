//! Per-layer interactive renderer: tool-mode state machine, pointer-driven
//! painting, debounced effect re-caching and the draw-time compositing
//! contract consumed by the pipeline.

use tracing::debug;

use crate::{
    brush::{Brush, BrushOptions, render_brush_stroke},
    cache::{BitmapCache, BlendedLayerCache, CacheProperty},
    clipping::{clip_layer_to_bounds, clip_to_selection},
    core::{LayerId, Point, Rect, Rgba8, Viewport},
    effects::EffectsOutput,
    fill::flood_fill,
    history::HistoryEntry,
    math::{
        is_shape_closed, rectangle_to_shape, rotate_rectangle, scale_rectangle,
        shape_to_rectangle, translate_pointer_rotation,
    },
    model::{Document, Layer, PaintTarget, Selection, Shape},
    painter::{CompositeOp, Painter},
    scheduler::TickScheduler,
    scratch::{ScratchPool, create_override_config, slice_unrendered_pointers},
    surface::RasterSurface,
    transforming::{apply_transformation, rotate_pointer},
};

/// Externally-selected tool driving the renderer state machine.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum ToolType {
    Drag,
    Brush,
    Eraser,
    Fill,
    Selection,
    Lasso,
    ColorPicker,
}

/// Mutable services the pipeline lends to a renderer for one operation.
pub(crate) struct ToolServices<'a> {
    pub bitmap_cache: &'a mut BitmapCache,
    pub blend_cache: &'a mut BlendedLayerCache,
    pub scratch: &'a mut ScratchPool,
    pub scheduler: &'a mut TickScheduler,
    pub viewport: Viewport,
    pub document_scale: f64,
    pub zoom_factor: f64,
}

/// Pending history snapshot of a paint gesture, stored debounced so a
/// single click does not allocate a full bitmap copy per stroke.
#[derive(Debug)]
struct PendingPaintState {
    original: RasterSurface,
    target: PaintTarget,
    ticks_remaining: u32,
}

// roughly five seconds at one tick per frame
const PAINT_STATE_TICKS: u32 = 300;
const PAINT_STATE_RETRY_TICKS: u32 = 60;

pub struct LayerRenderer {
    layer_id: LayerId,
    pub layer_index: usize,
    bounds: Rect,

    bitmap: Option<RasterSurface>,
    unmasked_bitmap: Option<RasterSurface>,

    interactive: bool,
    tool: Option<ToolType>,
    brush: Brush,
    pointer: Point,

    paint_mode: bool,
    drag_mode: bool,
    color_picker: bool,
    select_mode: bool,
    rectangular_select: bool,

    selection: Option<Selection>,
    invert_selection: bool,
    select_anchor: Option<Point>,
    working_shape: Shape,
    selecting: bool,

    /// A gesture's drawable scratch surface is active.
    painting: bool,
    last_brush_index: usize,

    pending_effects: bool,
    locked: bool,
    pending_paint_state: Option<PendingPaintState>,

    dragging: bool,
    drag_start_pointer: Point,
    drag_start_layer: Point,
    drag_start_bounds: Rect,
}

impl LayerRenderer {
    pub fn new(layer: &Layer, layer_index: usize) -> Self {
        Self {
            layer_id: layer.id,
            layer_index,
            bounds: layer.rect(),
            bitmap: None,
            unmasked_bitmap: None,
            interactive: false,
            tool: None,
            brush: Brush::new(Rgba8::opaque(255, 0, 0), BrushOptions::default()),
            pointer: Point::ZERO,
            paint_mode: false,
            drag_mode: false,
            color_picker: false,
            select_mode: false,
            rectangular_select: false,
            selection: None,
            invert_selection: false,
            select_anchor: None,
            working_shape: Vec::new(),
            selecting: false,
            painting: false,
            last_brush_index: 0,
            pending_effects: false,
            locked: false,
            pending_paint_state: None,
            dragging: false,
            drag_start_pointer: Point::ZERO,
            drag_start_layer: Point::ZERO,
            drag_start_bounds: Rect::ZERO,
        }
    }

    pub fn layer_id(&self) -> LayerId {
        self.layer_id
    }

    pub fn bounds(&self) -> Rect {
        self.bounds
    }

    pub fn bitmap(&self) -> Option<&RasterSurface> {
        self.bitmap.as_ref()
    }

    pub fn is_interactive(&self) -> bool {
        self.interactive
    }

    pub fn is_color_picker(&self) -> bool {
        self.color_picker
    }

    pub fn is_painting(&self) -> bool {
        self.painting
    }

    /// Whether an effect recompute is scheduled but not yet completed.
    pub fn has_pending_effects(&self) -> bool {
        self.pending_effects
    }

    /// "Do not read my output": an effect recompute is running right now.
    pub fn is_locked(&self) -> bool {
        self.locked
    }

    pub fn is_drawing(&self) -> bool {
        self.paint_mode && self.brush.down
    }

    /// The actual bounds of the renderer; transformations like scale and
    /// rotation affect the original bounds.
    pub fn actual_bounds(&self, layer: &Layer) -> Rect {
        if !layer.transform.is_rotated() && !layer.transform.is_scaled() {
            return self.bounds;
        }
        rotate_rectangle(
            scale_rectangle(self.bounds, layer.transform.scale),
            layer.transform.rotation,
        )
    }

    pub fn inside_bounds(&self, layer: &Layer, x: f64, y: f64) -> bool {
        self.actual_bounds(layer).contains(Point::new(x, y))
    }

    /// Force the renderer position back to the layer position, for when
    /// outside factors adjusted the renderer source.
    pub fn sync_position(&mut self, layer: &Layer) {
        let mut x = layer.left;
        let mut y = layer.top;
        if layer.transform.is_rotated() {
            let p = translate_pointer_rotation(
                x,
                y,
                f64::from(layer.width) / 2.0,
                f64::from(layer.height) / 2.0,
                layer.transform.rotation,
            );
            x = p.x;
            y = p.y;
        }
        let (w, h) = (self.bounds.width(), self.bounds.height());
        self.bounds = Rect::new(x, y, x + w, y + h);
    }

    /// Adopt the result of an effect render pass. The bitmap dimensions
    /// also adjust the renderer bounds; the layer model is unaffected.
    pub(crate) fn set_effects_output(&mut self, output: EffectsOutput) {
        let w = f64::from(output.bitmap.width());
        let h = f64::from(output.bitmap.height());
        self.bounds = Rect::new(
            self.bounds.x0,
            self.bounds.y0,
            self.bounds.x0 + w,
            self.bounds.y0 + h,
        );
        self.bitmap = Some(output.bitmap);
        self.unmasked_bitmap = output.unmasked_bitmap;
    }

    /// Make this renderer interactive iff its layer is the active one.
    pub fn handle_active_layer(&mut self, active_id: LayerId) {
        self.interactive = self.layer_id == active_id;
    }

    fn is_maskable(&self, doc: &Document) -> bool {
        doc.active_layer == self.layer_index
            && doc.active_target == PaintTarget::Mask
            && doc
                .layers
                .get(self.layer_index)
                .is_some_and(|l| l.mask.is_some())
    }

    fn is_drawable(&self, doc: &Document) -> bool {
        doc.layers
            .get(self.layer_index)
            .is_some_and(|l| l.text.is_none())
            || self.is_maskable(doc)
    }

    fn paint_target(&self, doc: &Document) -> PaintTarget {
        if self.is_maskable(doc) {
            PaintTarget::Mask
        } else {
            PaintTarget::Source
        }
    }

    /// Adopt the document's active selection. With `only_when_closed`, an
    /// unfinished outline deactivates the constraint instead.
    pub fn set_selection(&mut self, doc: &Document, only_when_closed: bool) {
        let last_closed = doc.selection.last().is_some_and(is_shape_closed);
        if !only_when_closed || last_closed {
            self.selection = (!doc.selection.is_empty()).then(|| doc.selection.clone());
        } else {
            self.selection = None;
        }
        self.invert_selection = self.selection.is_some() && doc.invert_selection;
    }

    fn cache_brush(&mut self, color: Rgba8, options: &BrushOptions, doc: &Document) {
        if !self.is_drawable(doc) {
            return;
        }
        let pointers = std::mem::take(&mut self.brush.pointers);
        self.brush = Brush::with_pointers(color, options.clone(), pointers);
    }

    /// Tool switch: reset mode flags, store any pending paint state, then
    /// enter the mode the new tool requires.
    pub(crate) fn handle_active_tool(
        &mut self,
        tool: Option<ToolType>,
        options: &BrushOptions,
        color: Rgba8,
        doc: &mut Document,
    ) -> Option<HistoryEntry> {
        if tool == self.tool && *options == self.brush.options {
            return None;
        }
        self.dragging = false;
        self.paint_mode = false;
        self.drag_mode = false;
        self.color_picker = false;
        self.select_mode = false;
        self.selection = None;
        self.tool = None;

        // store pending paint states (if there were any)
        let entry = self.store_paint_state(doc);

        let Some(tool) = tool else {
            return entry;
        };
        if !self.interactive {
            return entry;
        }

        self.tool = Some(tool);
        match tool {
            ToolType::Drag => {
                self.drag_mode = true;
            }
            ToolType::Fill | ToolType::Eraser | ToolType::Brush => {
                // stay in move-listening mode so the cursor position is
                // known even without an active press
                self.force_move_listener();
                self.paint_mode = true;
                self.cache_brush(color, options, doc);
                // drawable tools can work alongside an existing selection
                self.set_selection(doc, true);
            }
            ToolType::ColorPicker => {
                self.color_picker = true;
            }
            ToolType::Selection => {
                self.select_mode = true;
                self.rectangular_select = true;
                doc.selection.clear();
            }
            ToolType::Lasso => {
                self.select_mode = true;
                self.rectangular_select = false;
                doc.selection.clear();
            }
        }
        entry
    }

    fn force_move_listener(&mut self) {
        self.drag_start_pointer = self.pointer;
    }

    fn store_brush_pointer(&mut self, x: f64, y: f64) {
        self.brush.store_pointer(x, y);
    }

    /// Schedule a debounced effect recompute: at most one per tick, with an
    /// in-flight guard preventing re-entrant scheduling.
    pub(crate) fn cache_effects(&mut self, scheduler: &mut TickScheduler) {
        if self.pending_effects {
            return; // debounced to only occur once before the next tick
        }
        self.pending_effects = true;
        scheduler.schedule(self.layer_id);
    }

    pub(crate) fn begin_effects_render(&mut self) {
        self.locked = true;
    }

    pub(crate) fn finish_effects_render(&mut self) {
        self.locked = false;
        self.pending_effects = false;
    }

    /// The filter must be applied to new contents; re-render effects.
    pub(crate) fn reset_filter_and_recache(
        &mut self,
        bitmap_cache: &mut BitmapCache,
        scheduler: &mut TickScheduler,
    ) {
        bitmap_cache.clear_property(self.layer_id, CacheProperty::FilterData);
        self.cache_effects(scheduler);
    }

    /// Invalidate the blend cache when this layer either declares a blend
    /// mode or sits inside the cached composite region.
    pub(crate) fn invalidate_blend_cache(&self, blend_cache: &mut BlendedLayerCache, layer: &Layer) {
        if layer.has_blend() || blend_cache.is_covered(self.layer_index) {
            blend_cache.flush();
        }
    }

    fn prepare_pending_paint_state(&mut self, doc: &Document) {
        let target = self.paint_target(doc);
        let Some(layer) = doc.layers.get(self.layer_index) else {
            return;
        };
        let original = match target {
            PaintTarget::Source => layer.source.clone(),
            PaintTarget::Mask => match &layer.mask {
                Some(mask) => mask.clone(),
                None => return,
            },
        };
        self.pending_paint_state = Some(PendingPaintState {
            original,
            target,
            ticks_remaining: PAINT_STATE_TICKS,
        });
    }

    /// Flush the pending paint snapshot into a history entry. While a
    /// stroke is still in progress the store is re-debounced instead.
    pub(crate) fn store_paint_state(&mut self, doc: &Document) -> Option<HistoryEntry> {
        let pending = self.pending_paint_state.take()?;
        if self.is_drawing() {
            // still drawing; the surface is only updated on release
            self.pending_paint_state = Some(PendingPaintState {
                ticks_remaining: PAINT_STATE_RETRY_TICKS,
                ..pending
            });
            return None;
        }
        let layer = doc.layers.get(self.layer_index)?;
        let after = match pending.target {
            PaintTarget::Source => layer.source.clone(),
            PaintTarget::Mask => layer.mask.clone()?,
        };
        Some(HistoryEntry::Paint {
            layer_id: self.layer_id,
            target: pending.target,
            before: pending.original,
            after,
        })
    }

    /// Advance the paint-state debounce by one tick.
    pub(crate) fn tick_paint_state(&mut self, doc: &Document) -> Option<HistoryEntry> {
        let pending = self.pending_paint_state.as_mut()?;
        if pending.ticks_remaining > 1 {
            pending.ticks_remaining -= 1;
            return None;
        }
        self.store_paint_state(doc)
    }

    fn use_paint_canvas(&self) -> bool {
        // all drawing happens on the scratch drawable except selection-less
        // fill operations, which write straight into the layer
        let is_fill = self.tool == Some(ToolType::Fill);
        (is_fill && self.selection.is_some()) || self.is_drawing()
    }

    /// Draw onto the paint target (brushing / fill / eraser).
    pub(crate) fn paint(&mut self, services: &mut ToolServices<'_>, doc: &mut Document) {
        if self.pending_paint_state.is_none() {
            self.prepare_pending_paint_state(doc);
        }
        let is_fill = self.tool == Some(ToolType::Fill);
        let is_drawing = self.is_drawing();

        let pointers = if is_drawing {
            slice_unrendered_pointers(&self.brush)
        } else {
            Vec::new()
        };
        let override_config = create_override_config(
            services.document_scale,
            services.zoom_factor,
            services.viewport,
            pointers,
        );

        if self.use_paint_canvas() {
            if !self.painting {
                services.scratch.acquire_drawable(doc.width, doc.height);
                self.painting = true;
            }
            let Some(drawable) = services.scratch.drawable_mut() else {
                return;
            };
            let mut painter = Painter::new(drawable);
            if let Some(selection) = &self.selection {
                painter.save();
                // no offset is required when drawing on the document-sized
                // drawable
                clip_to_selection(
                    &mut painter,
                    selection,
                    0.0,
                    0.0,
                    self.invert_selection,
                    Some(&override_config),
                );
            }

            if is_fill {
                let color = self.brush.color;
                let w = f64::from(doc.width);
                let h = f64::from(doc.height);
                painter.fill_rect(Rect::new(0.0, 0.0, w, h), color);
            } else if is_drawing {
                self.last_brush_index = render_brush_stroke(
                    &mut painter,
                    &self.brush,
                    Some(&override_config),
                    self.last_brush_index,
                );
            }

            if self.selection.is_some() {
                painter.restore();
            }
        } else if is_fill {
            // selection-less fills write straight into the layer source
            let color = self.brush.color;
            let smart = self.brush.options.smart_fill;
            let to_mask = self.is_maskable(doc);
            let pointer = self.pointer;
            let Some(layer) = doc.layers.get_mut(self.layer_index) else {
                return;
            };
            let width = f64::from(layer.width);
            let height = f64::from(layer.height);
            // translate the pointer offset to the relative, untransformed
            // source layer content
            let point = rotate_pointer(pointer, layer, width, height);
            let surface = if to_mask {
                match layer.mask.as_mut() {
                    Some(mask) => mask,
                    None => return,
                }
            } else {
                &mut layer.source
            };
            if smart {
                flood_fill(surface, point.x, point.y, color);
            } else {
                let mut painter = Painter::new(surface);
                painter.fill_rect(Rect::new(0.0, 0.0, width, height), color);
            }
            // while drawing on the scratch surface the recache is deferred
            // to the release handler; direct writes recache immediately
            self.reset_filter_and_recache(services.bitmap_cache, services.scheduler);
        }
    }

    pub(crate) fn handle_press(
        &mut self,
        services: &mut ToolServices<'_>,
        doc: &mut Document,
        x: f64,
        y: f64,
    ) {
        self.pointer = Point::new(x, y);

        services.blend_cache.pause(self.layer_index, true);

        if self.color_picker {
            // sampling happens in the pipeline, which owns the frame
        } else if self.paint_mode {
            if self.tool == Some(ToolType::Fill) {
                self.paint(services, doc);
                return;
            }
            // for any other brush mode, set the brush application active;
            // paint happens in the update hook
            self.store_brush_pointer(x, y);
            self.last_brush_index = 1;
        } else if self.drag_mode {
            self.dragging = true;
            self.drag_start_pointer = Point::new(x, y);
            self.drag_start_bounds = self.bounds;
            if let Some(layer) = doc.layers.get(self.layer_index) {
                self.drag_start_layer = Point::new(layer.left, layer.top);
            }
        } else if self.select_mode {
            if self.rectangular_select {
                self.select_anchor = Some(Point::new(x, y));
            } else {
                self.working_shape = vec![Point::new(x, y)];
            }
            self.selecting = true;
        }
    }

    pub(crate) fn handle_move(
        &mut self,
        services: &mut ToolServices<'_>,
        doc: &mut Document,
        x: f64,
        y: f64,
    ) {
        self.pointer = Point::new(x, y);

        if self.drag_mode && self.dragging {
            let dx = x - self.drag_start_pointer.x;
            let dy = y - self.drag_start_pointer.y;
            let b = self.drag_start_bounds;
            self.bounds = Rect::new(b.x0 + dx, b.y0 + dy, b.x1 + dx, b.y1 + dy);
            if let Some(layer) = doc.layers.get_mut(self.layer_index) {
                layer.left = self.drag_start_layer.x + dx;
                layer.top = self.drag_start_layer.y + dy;
            }
            if let Some(layer) = doc.layers.get(self.layer_index) {
                self.invalidate_blend_cache(services.blend_cache, layer);
            }
        } else if self.is_drawing() {
            // enqueue the pointer; painting of all enqueued pointers is
            // deferred to the update hook so multiple move events per frame
            // do not trigger multiple renders
            self.store_brush_pointer(x, y);
        } else if self.select_mode && self.selecting && !self.rectangular_select {
            self.working_shape.push(Point::new(x, y));
        }
    }

    pub(crate) fn handle_release(
        &mut self,
        services: &mut ToolServices<'_>,
        doc: &mut Document,
        x: f64,
        y: f64,
    ) -> Vec<HistoryEntry> {
        services.blend_cache.pause(self.layer_index, false);

        let mut entries = Vec::new();

        if self.painting {
            // commit the drawable content onto the destination
            let to_mask = self.is_maskable(doc);
            let composite =
                (self.tool == Some(ToolType::Eraser)).then_some(CompositeOp::DestinationOut);
            if let Some(layer) = doc.layers.get_mut(self.layer_index) {
                let result = services.scratch.commit_to_layer(
                    layer,
                    to_mask,
                    services.viewport,
                    services.document_scale,
                    self.brush.options.opacity,
                    composite,
                );
                if let Err(error) = result {
                    debug!(%error, "stroke commit skipped");
                }
            }
            services.scratch.release_mask_composite();
            services.scratch.release_drawable();
            self.reset_filter_and_recache(services.bitmap_cache, services.scheduler);

            self.painting = false;
            self.brush.reset_stroke();
            self.last_brush_index = 0;

            // immediately store the pending history state
            if let Some(entry) = self.store_paint_state(doc) {
                entries.push(entry);
            }
        }

        if self.paint_mode {
            // keep the move listener active so the cursor stays tracked
            self.force_move_listener();
        } else if self.select_mode && self.selecting {
            self.selecting = false;
            if self.rectangular_select {
                if let Some(anchor) = self.select_anchor.take() {
                    // bounding rectangle of anchor-to-release
                    let rect = shape_to_rectangle(&vec![anchor, Point::new(x, y)]);
                    doc.selection = vec![rectangle_to_shape(
                        rect.width(),
                        rect.height(),
                        rect.x0,
                        rect.y0,
                    )];
                }
            } else {
                let mut shape = std::mem::take(&mut self.working_shape);
                if shape.len() >= 3 {
                    shape.push(shape[0]);
                    doc.selection = vec![shape];
                }
            }
        } else if self.drag_mode && self.dragging {
            self.dragging = false;
            if let Some(layer) = doc.layers.get(self.layer_index) {
                entries.push(HistoryEntry::Position {
                    layer_id: self.layer_id,
                    before: self.drag_start_layer,
                    after: Point::new(layer.left, layer.top),
                    bounds_before: self.drag_start_bounds,
                    bounds_after: self.bounds,
                });
            }
        }
        entries
    }

    /// Frame update hook: paint all pointers enqueued since the last frame.
    pub(crate) fn update(&mut self, services: &mut ToolServices<'_>, doc: &mut Document) {
        if self.is_drawing() {
            self.paint(services, doc);
            self.brush.last = self.brush.pointers.len();
        }
    }

    /// Restore renderer bounds from a history entry.
    pub(crate) fn restore_bounds(&mut self, bounds: Rect) {
        self.bounds = bounds;
    }

    /// Draw this layer onto the document frame. The blend-cache shortcut is
    /// handled by the pipeline; this renders the direct (non-cached) path.
    #[allow(clippy::too_many_arguments)]
    pub(crate) fn draw(
        &self,
        painter: &mut Painter<'_>,
        layer: &Layer,
        doc: &Document,
        scratch: &mut ScratchPool,
        viewport: Viewport,
        document_scale: f64,
        snapshot_mode: bool,
    ) {
        let filters = &layer.filters;
        let opacity = filters.opacity;
        let alt_opacity = filters.enabled && opacity != 1.0;

        let is_painting = self.painting && !snapshot_mode;
        let is_erasing = is_painting && self.tool == Some(ToolType::Eraser);
        let is_drawing_on_mask = is_painting && self.is_maskable(doc);
        let apply_blending = filters.has_blend() && !is_drawing_on_mask;

        if is_drawing_on_mask && !is_erasing {
            // compose the bitmap with the in-progress mask stroke on the
            // pooled composite surface for instant preview
            let mut composite = scratch.take_mask_composite(doc.width, doc.height);
            {
                let mut cp = Painter::new(&mut composite);
                cp.save();
                let transformed = apply_transformation(&mut cp, layer, viewport);
                let draw_bounds = transformed.unwrap_or(self.bounds);
                if let Some(bitmap) = &self.bitmap {
                    draw_bitmap(
                        &mut cp,
                        bitmap,
                        if transformed.is_none() {
                            Some(viewport)
                        } else {
                            None
                        },
                        draw_bounds,
                    );
                }
                cp.restore();

                cp.save();
                cp.set_alpha(self.brush.options.opacity);
                cp.set_composite(CompositeOp::DestinationOut);
                scratch.render_live(&mut cp, document_scale, None, None);
                cp.restore();
            }
            painter.draw_surface_at(&composite, 0.0, 0.0);
            scratch.put_mask_composite(composite);
            return;
        }

        if is_erasing {
            // erase a clone of the effected bitmap in source space for the
            // preview; the authoritative surface is only touched at commit
            let source_bitmap = if is_drawing_on_mask {
                self.unmasked_bitmap.as_ref()
            } else {
                self.bitmap.as_ref()
            };
            let Some(bitmap) = source_bitmap else {
                return;
            };
            let mut masked = bitmap.clone();
            scratch.blit_reversed(
                &mut masked,
                layer.transform,
                f64::from(layer.width),
                f64::from(layer.height),
                layer.left,
                layer.top,
                viewport,
                document_scale,
                self.brush.options.opacity,
                Some(CompositeOp::DestinationOut),
            );

            painter.save();
            if alt_opacity {
                painter.set_alpha(opacity);
            }
            let transformed = apply_transformation(painter, layer, viewport);
            let draw_bounds = transformed.unwrap_or(self.bounds);
            draw_bitmap(
                painter,
                &masked,
                if transformed.is_none() {
                    Some(viewport)
                } else {
                    None
                },
                draw_bounds,
            );
            painter.restore();
            return;
        }

        if apply_blending {
            // the layer renders into an offscreen surface which is merged
            // with the underlying document through the blend function
            let mut blend_surface =
                RasterSurface::new(painter.width(), painter.height());
            {
                let mut bp = Painter::new(&mut blend_surface);
                bp.set_alpha(if alt_opacity { opacity } else { 1.0 });
                bp.save();
                let transformed = apply_transformation(&mut bp, layer, viewport);
                let draw_bounds = transformed.unwrap_or(self.bounds);
                if let Some(bitmap) = &self.bitmap {
                    draw_bitmap(
                        &mut bp,
                        bitmap,
                        if transformed.is_none() {
                            Some(viewport)
                        } else {
                            None
                        },
                        draw_bounds,
                    );
                }
                bp.restore();
            }
            if let Err(error) = painter.blend_with(&blend_surface, filters.blend_mode) {
                debug!(%error, "blend pass skipped");
            }
        } else {
            painter.save();
            if alt_opacity {
                painter.set_alpha(opacity);
            }
            let transformed = apply_transformation(painter, layer, viewport);
            let draw_bounds = transformed.unwrap_or(self.bounds);
            if let Some(bitmap) = &self.bitmap {
                draw_bitmap(
                    painter,
                    bitmap,
                    if transformed.is_none() {
                        Some(viewport)
                    } else {
                        None
                    },
                    draw_bounds,
                );
            }
            painter.restore();
        }

        // live preview of the in-progress stroke on top of the document
        if is_painting {
            let transformed = !layer.transform.is_identity();
            let needs_clip = self.selection.is_none()
                && (self.bounds.x0 != 0.0 || self.bounds.y0 != 0.0 || transformed);
            painter.save();
            if needs_clip {
                // clip out-of-bounds content of the offset/transformed layer
                clip_layer_to_bounds(painter, layer, self.bounds, viewport, false);
            }
            painter.set_alpha(self.brush.options.opacity);
            scratch.render_live(painter, document_scale, None, None);
            painter.restore();
        }
    }

    #[cfg(test)]
    pub(crate) fn set_interactive_for_tests(&mut self, interactive: bool) {
        self.interactive = interactive;
    }
}

/// Draw an effected bitmap at its bounds, offset by the viewport when the
/// painter was not already transformed.
fn draw_bitmap(
    painter: &mut Painter<'_>,
    bitmap: &RasterSurface,
    viewport: Option<Viewport>,
    bounds: Rect,
) {
    let (vx, vy) = viewport.map_or((0.0, 0.0), |vp| (vp.left, vp.top));
    let sw = f64::from(bitmap.width());
    let sh = f64::from(bitmap.height());
    painter.draw_surface(
        bitmap,
        Rect::new(0.0, 0.0, sw, sh),
        Rect::new(
            bounds.x0 - vx,
            bounds.y0 - vy,
            bounds.x0 - vx + bounds.width(),
            bounds.y0 - vy + bounds.height(),
        ),
    );
}
