//! The compositing pipeline: walks the layer stack each frame, consults the
//! blend cache to short-circuit redraw of already-merged lower layers, and
//! owns the long-lived caches, the scratch pool, the tick scheduler and the
//! filter worker. One pipeline instance serves one open document.

use std::collections::HashMap;

use tracing::{debug, warn};

use crate::{
    brush::BrushOptions,
    cache::{BitmapCache, BlendedLayerCache},
    core::{LayerId, Rgba8, Viewport, fast_round},
    effects::{TextRasterizer, render_effects_for_layer},
    error::BitmillResult,
    filters::FilterWorker,
    history::HistoryEntry,
    model::{Document, PaintTarget},
    painter::Painter,
    renderer::{LayerRenderer, ToolServices, ToolType},
    scheduler::TickScheduler,
    scratch::ScratchPool,
    surface::RasterSurface,
};

/// Color sampled by the color-picker tool, alpha converted to 0..1.
#[derive(Clone, Copy, Debug, PartialEq)]
pub struct PickedColor {
    pub r: u8,
    pub g: u8,
    pub b: u8,
    pub alpha: f64,
}

pub struct CompositingPipeline {
    renderers: Vec<LayerRenderer>,
    bitmap_cache: BitmapCache,
    blend_cache: BlendedLayerCache,
    scratch: ScratchPool,
    scheduler: TickScheduler,
    worker: FilterWorker,
    text_rasterizer: Option<Box<dyn TextRasterizer>>,

    pub viewport: Viewport,
    pub document_scale: f64,
    pub zoom_factor: f64,

    frame: RasterSurface,
    history: Vec<HistoryEntry>,
}

impl CompositingPipeline {
    /// Build a pipeline for an opened document. Starting the filter worker
    /// may fail; the error is surfaced rather than deferred.
    pub fn new(doc: &Document) -> BitmillResult<Self> {
        for layer in &doc.layers {
            layer.validate()?;
        }
        let worker = FilterWorker::spawn()?;
        let mut pipeline = Self {
            renderers: Vec::new(),
            bitmap_cache: BitmapCache::new(),
            blend_cache: BlendedLayerCache::new(),
            scratch: ScratchPool::new(),
            scheduler: TickScheduler::new(),
            worker,
            text_rasterizer: None,
            viewport: Viewport::default(),
            document_scale: 1.0,
            zoom_factor: 1.0,
            frame: RasterSurface::new(doc.width, doc.height),
            history: Vec::new(),
        };
        pipeline.sync_layers(doc);
        pipeline.refresh_blend_caching(doc);
        Ok(pipeline)
    }

    /// Inject the text rasterization collaborator.
    pub fn set_text_rasterizer(&mut self, rasterizer: Box<dyn TextRasterizer>) {
        self.text_rasterizer = Some(rasterizer);
    }

    pub fn bitmap_cache(&self) -> &BitmapCache {
        &self.bitmap_cache
    }

    pub fn bitmap_cache_mut(&mut self) -> &mut BitmapCache {
        &mut self.bitmap_cache
    }

    pub fn blend_cache(&self) -> &BlendedLayerCache {
        &self.blend_cache
    }

    pub fn blend_cache_mut(&mut self) -> &mut BlendedLayerCache {
        &mut self.blend_cache
    }

    pub fn renderer(&self, index: usize) -> Option<&LayerRenderer> {
        self.renderers.get(index)
    }

    /// Reconcile renderers with the document's layer stack: surviving
    /// layers keep their renderer state, new layers get a renderer plus an
    /// initial effect render, and cache entries of removed layers are
    /// released.
    pub fn sync_layers(&mut self, doc: &Document) {
        let mut old: HashMap<LayerId, LayerRenderer> = self
            .renderers
            .drain(..)
            .map(|r| (r.layer_id(), r))
            .collect();
        let active_id = doc.active_layer().map(|l| l.id);

        let mut renderers = Vec::with_capacity(doc.layers.len());
        for (index, layer) in doc.layers.iter().enumerate() {
            let mut renderer = match old.remove(&layer.id) {
                Some(mut existing) => {
                    existing.layer_index = index;
                    existing
                }
                None => {
                    let mut fresh = LayerRenderer::new(layer, index);
                    fresh.cache_effects(&mut self.scheduler);
                    fresh
                }
            };
            if let Some(id) = active_id {
                renderer.handle_active_layer(id);
            }
            renderers.push(renderer);
        }

        for (id, _) in old {
            debug!(layer = id.0, "releasing caches of removed layer");
            self.bitmap_cache.evict(id);
        }
        self.renderers = renderers;
    }

    /// Re-sync renderer positions to their layer positions, for when a
    /// collaborator adjusted layer transforms outside a gesture.
    pub fn sync_positions(&mut self, doc: &Document) {
        for (index, renderer) in self.renderers.iter_mut().enumerate() {
            if let Some(layer) = doc.layers.get(index) {
                renderer.sync_position(layer);
            }
        }
    }

    /// Enable blend caching iff any layer declares a non-default blend
    /// mode; the blendable set spans the stack up to and including the
    /// highest blended layer.
    pub fn refresh_blend_caching(&mut self, doc: &Document) {
        let blended = doc.blended_layer_indices();
        match blended.iter().max() {
            Some(&highest) => {
                let blendable: Vec<usize> = (0..=highest).collect();
                self.blend_cache.set_enabled(true, Some(&blendable));
            }
            None => self.blend_cache.set_enabled(false, None),
        }
    }

    /// Route a tool change to every renderer (each one checks whether it is
    /// the interactive target).
    pub fn set_active_tool(
        &mut self,
        doc: &mut Document,
        tool: Option<ToolType>,
        options: &BrushOptions,
        color: Rgba8,
    ) {
        for index in 0..self.renderers.len() {
            if let Some(entry) = self.renderers[index].handle_active_tool(tool, options, color, doc)
            {
                self.history.push(entry);
            }
        }
    }

    pub fn handle_press(&mut self, doc: &mut Document, x: f64, y: f64) -> Option<PickedColor> {
        let index = doc.active_layer;
        let picking = {
            let Self {
                renderers,
                bitmap_cache,
                blend_cache,
                scratch,
                scheduler,
                viewport,
                document_scale,
                zoom_factor,
                ..
            } = self;
            let renderer = renderers.get_mut(index)?;
            if !renderer.is_interactive() {
                return None;
            }
            let mut services = ToolServices {
                bitmap_cache,
                blend_cache,
                scratch,
                scheduler,
                viewport: *viewport,
                document_scale: *document_scale,
                zoom_factor: *zoom_factor,
            };
            renderer.handle_press(&mut services, doc, x, y);
            renderer.is_color_picker()
        };

        if !picking {
            return None;
        }
        self.pick_color(x, y)
    }

    pub fn handle_move(&mut self, doc: &mut Document, x: f64, y: f64) {
        let index = doc.active_layer;
        let Self {
            renderers,
            bitmap_cache,
            blend_cache,
            scratch,
            scheduler,
            viewport,
            document_scale,
            zoom_factor,
            ..
        } = self;
        let Some(renderer) = renderers.get_mut(index) else {
            return;
        };
        if !renderer.is_interactive() {
            return;
        }
        let mut services = ToolServices {
            bitmap_cache,
            blend_cache,
            scratch,
            scheduler,
            viewport: *viewport,
            document_scale: *document_scale,
            zoom_factor: *zoom_factor,
        };
        renderer.handle_move(&mut services, doc, x, y);
    }

    pub fn handle_release(&mut self, doc: &mut Document, x: f64, y: f64) {
        let index = doc.active_layer;
        let entries = {
            let Self {
                renderers,
                bitmap_cache,
                blend_cache,
                scratch,
                scheduler,
                viewport,
                document_scale,
                zoom_factor,
                ..
            } = self;
            let Some(renderer) = renderers.get_mut(index) else {
                return;
            };
            if !renderer.is_interactive() {
                return;
            }
            let mut services = ToolServices {
                bitmap_cache,
                blend_cache,
                scratch,
                scheduler,
                viewport: *viewport,
                document_scale: *document_scale,
                zoom_factor: *zoom_factor,
            };
            renderer.handle_release(&mut services, doc, x, y)
        };
        self.history.extend(entries);
    }

    /// Frame update hook: renderers paint their enqueued pointers.
    pub fn update(&mut self, doc: &mut Document) {
        let Self {
            renderers,
            bitmap_cache,
            blend_cache,
            scratch,
            scheduler,
            viewport,
            document_scale,
            zoom_factor,
            ..
        } = self;
        let mut services = ToolServices {
            bitmap_cache,
            blend_cache,
            scratch,
            scheduler,
            viewport: *viewport,
            document_scale: *document_scale,
            zoom_factor: *zoom_factor,
        };
        for renderer in renderers.iter_mut() {
            renderer.update(&mut services, doc);
        }
    }

    /// Advance one virtual frame: run coalesced effect recomputes and the
    /// paint-state debounce. Each completed recompute requests blend-cache
    /// invalidation exactly once.
    pub fn tick(&mut self, doc: &mut Document) {
        let pending = self.scheduler.take();
        for id in pending {
            let Some(index) = self.renderers.iter().position(|r| r.layer_id() == id) else {
                continue;
            };
            self.renderers[index].begin_effects_render();
            let result = match doc.layers.get_mut(index) {
                Some(layer) => render_effects_for_layer(
                    layer,
                    &mut self.bitmap_cache,
                    &mut self.worker,
                    self.text_rasterizer.as_deref_mut(),
                    true,
                ),
                None => Ok(None),
            };
            match result {
                Ok(Some(output)) => self.renderers[index].set_effects_output(output),
                // the filter worker failed; the layer keeps its last-good
                // bitmap and the session continues
                Ok(None) => {}
                Err(error) => warn!(layer = id.0, %error, "effect render failed"),
            }
            self.renderers[index].finish_effects_render();

            // now that the layer effects are cached, invalidate any
            // existing blend cache containing this layer
            if let Some(layer) = doc.layers.get(index) {
                let Self {
                    renderers,
                    blend_cache,
                    ..
                } = self;
                renderers[index].invalidate_blend_cache(blend_cache, layer);
            }
        }

        for index in 0..self.renderers.len() {
            if let Some(entry) = self.renderers[index].tick_paint_state(doc) {
                self.history.push(entry);
            }
        }
    }

    /// Whether any effect recompute is queued or running.
    pub fn has_pending_effects(&self) -> bool {
        !self.scheduler.is_empty() || self.renderers.iter().any(|r| r.has_pending_effects())
    }

    /// Composite the document into the output frame.
    pub fn draw(&mut self, doc: &Document) -> BitmillResult<&RasterSurface> {
        self.frame.resize(doc.width, doc.height);
        {
            let Self {
                renderers,
                blend_cache,
                scratch,
                frame,
                viewport,
                document_scale,
                ..
            } = self;
            let mut painter = Painter::new(frame);
            let use_cache = blend_cache.is_active();

            for (index, renderer) in renderers.iter().enumerate() {
                let Some(layer) = doc.layers.get(index) else {
                    continue;
                };
                if !layer.visible {
                    continue;
                }

                if use_cache && !renderer.has_pending_effects() {
                    if blend_cache.is_covered(index) {
                        // the render is executed by a higher-order layer
                        continue;
                    }
                    if layer.has_blend() {
                        if blend_cache.bitmap(index).is_none() {
                            let indices = blend_cache.blendable_layers().map(<[usize]>::to_vec);
                            debug!(index, "building blended layer cache");
                            let snapshot = render_snapshot(
                                renderers,
                                doc,
                                scratch,
                                indices.as_deref(),
                                *document_scale,
                            );
                            blend_cache.store(index, snapshot);
                        }
                        if let Some(bitmap) = blend_cache.bitmap(index) {
                            painter.draw_surface_at(
                                bitmap,
                                -(fast_round(viewport.left) as f64),
                                -(fast_round(viewport.top) as f64),
                            );
                        }
                        continue;
                    }
                }

                renderer.draw(
                    &mut painter,
                    layer,
                    doc,
                    scratch,
                    *viewport,
                    *document_scale,
                    false,
                );
            }
        }
        Ok(&self.frame)
    }

    /// Synchronously composite a subset of the stack (or all of it) into a
    /// fresh surface, bypassing caches and live previews.
    pub fn snapshot(&mut self, doc: &Document, indices: Option<&[usize]>) -> RasterSurface {
        let Self {
            renderers,
            scratch,
            document_scale,
            ..
        } = self;
        render_snapshot(renderers, doc, scratch, indices, *document_scale)
    }

    /// Sample the composited frame at canvas-space coordinates.
    pub fn pick_color(&self, x: f64, y: f64) -> Option<PickedColor> {
        if x < 0.0 || y < 0.0 {
            return None;
        }
        let pixel = self.frame.pixel(x.floor() as u32, y.floor() as u32)?;
        Some(PickedColor {
            r: pixel.r,
            g: pixel.g,
            b: pixel.b,
            alpha: f64::from(pixel.a) / 255.0,
        })
    }

    /// Drain the history entries produced since the last call; the history
    /// collaborator owns them from here.
    pub fn take_history(&mut self) -> Vec<HistoryEntry> {
        std::mem::take(&mut self.history)
    }

    pub fn undo(&mut self, doc: &mut Document, entry: &HistoryEntry) {
        self.apply_history(doc, entry, true);
    }

    pub fn redo(&mut self, doc: &mut Document, entry: &HistoryEntry) {
        self.apply_history(doc, entry, false);
    }

    /// Restore surface pixel content / renderer bounds from a history entry
    /// and trigger the same cache-invalidation path a live edit would.
    fn apply_history(&mut self, doc: &mut Document, entry: &HistoryEntry, undo: bool) {
        match entry {
            HistoryEntry::Paint {
                layer_id,
                target,
                before,
                after,
            } => {
                let Some(index) = self.index_of(*layer_id) else {
                    return;
                };
                let Some(layer) = doc.layers.get_mut(index) else {
                    return;
                };
                let pixels = if undo { before } else { after };
                match target {
                    PaintTarget::Source => layer.source = pixels.clone(),
                    PaintTarget::Mask => {
                        if let Some(mask) = layer.mask.as_mut() {
                            *mask = pixels.clone();
                        }
                    }
                }
                let Self {
                    renderers,
                    bitmap_cache,
                    blend_cache,
                    scheduler,
                    ..
                } = self;
                renderers[index].reset_filter_and_recache(bitmap_cache, scheduler);
                renderers[index].invalidate_blend_cache(blend_cache, &doc.layers[index]);
            }
            HistoryEntry::Position {
                layer_id,
                before,
                after,
                bounds_before,
                bounds_after,
            } => {
                let Some(index) = self.index_of(*layer_id) else {
                    return;
                };
                let (position, bounds) = if undo {
                    (before, bounds_before)
                } else {
                    (after, bounds_after)
                };
                if let Some(layer) = doc.layers.get_mut(index) {
                    layer.left = position.x;
                    layer.top = position.y;
                }
                let Self {
                    renderers,
                    blend_cache,
                    ..
                } = self;
                renderers[index].restore_bounds(*bounds);
                renderers[index].invalidate_blend_cache(blend_cache, &doc.layers[index]);
            }
        }
    }

    fn index_of(&self, id: LayerId) -> Option<usize> {
        self.renderers.iter().position(|r| r.layer_id() == id)
    }

    /// Release per-document resources (document close).
    pub fn dispose(&mut self) {
        self.bitmap_cache.clear_all();
        self.blend_cache.set_enabled(false, None);
        self.scratch.release_drawable();
        self.scratch.release_mask_composite();
        self.renderers.clear();
    }
}

fn render_snapshot(
    renderers: &[LayerRenderer],
    doc: &Document,
    scratch: &mut ScratchPool,
    indices: Option<&[usize]>,
    document_scale: f64,
) -> RasterSurface {
    let mut surface = RasterSurface::new(doc.width, doc.height);
    {
        let mut painter = Painter::new(&mut surface);
        let draw_layer = |index: usize, painter: &mut Painter<'_>, scratch: &mut ScratchPool| {
            if let (Some(renderer), Some(layer)) = (renderers.get(index), doc.layers.get(index))
                && layer.visible
            {
                renderer.draw(
                    painter,
                    layer,
                    doc,
                    scratch,
                    Viewport::default(),
                    document_scale,
                    true,
                );
            }
        };
        match indices {
            Some(list) => {
                for &index in list {
                    draw_layer(index, &mut painter, scratch);
                }
            }
            None => {
                for index in 0..doc.layers.len() {
                    draw_layer(index, &mut painter, scratch);
                }
            }
        }
    }
    surface
}
