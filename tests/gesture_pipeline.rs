//! End-to-end interactive gesture scenarios across the pipeline: brush
//! strokes on transformed layers, cache interactions and undo.

use std::f64::consts::FRAC_PI_2;

use bitmill::brush::{BrushOptions, BrushType};
use bitmill::{
    BlendMode, CompositingPipeline, Document, FilterConfig, Layer, LayerId, Rgba8, ToolType,
};

fn init_tracing() {
    let _ = tracing_subscriber::fmt().with_test_writer().try_init();
}

fn document() -> Document {
    init_tracing();
    let mut doc = Document::new(16, 16);

    // bottom layer carries a blend mode so blend caching is active
    let mut base = Layer::new(LayerId(1), "base", 16, 16);
    base.source.fill(Rgba8::opaque(80, 80, 80));
    base.filters = FilterConfig {
        blend_mode: BlendMode::Multiply,
        ..FilterConfig::default()
    };
    doc.layers.push(base);

    // middle plain layer
    let mut mid = Layer::new(LayerId(2), "mid", 16, 16);
    mid.source.fill(Rgba8::opaque(200, 200, 200));
    doc.layers.push(mid);

    // top layer, rotated a quarter turn, carrying a pixel filter
    let mut top = Layer::new(LayerId(3), "top", 16, 16);
    top.transform.rotation = FRAC_PI_2;
    top.filters = FilterConfig {
        invert: true,
        ..FilterConfig::default()
    };
    doc.layers.push(top);
    doc.active_layer = 2;

    doc
}

fn brush_options() -> BrushOptions {
    BrushOptions {
        brush_type: BrushType::PaintBrush,
        size: 3.0,
        ..BrushOptions::default()
    }
}

#[test]
fn rotated_layer_brush_gesture_commits_into_local_space() {
    let mut doc = document();
    let mut pipeline = CompositingPipeline::new(&doc).unwrap();
    pipeline.tick(&mut doc);
    pipeline.draw(&doc).unwrap();

    pipeline.set_active_tool(
        &mut doc,
        Some(ToolType::Brush),
        &brush_options(),
        Rgba8::opaque(255, 0, 0),
    );

    // layer-local (5,5) appears at document (11,5) under a quarter turn
    // about the 16x16 layer center
    pipeline.handle_press(&mut doc, 11.0, 5.0);
    pipeline.update(&mut doc);
    pipeline.handle_move(&mut doc, 11.0, 6.0);
    pipeline.update(&mut doc);
    pipeline.handle_release(&mut doc, 11.0, 6.0);

    // the stroke landed in the layer's untransformed pixel space
    let painted = doc.layers[2]
        .source
        .pixel(5, 5)
        .map(|px| px.a > 0)
        .unwrap_or(false);
    assert!(painted, "expected committed paint at layer-local (5,5)");
}

#[test]
fn gesture_leaves_lower_blend_cache_untouched() {
    let mut doc = document();
    let mut pipeline = CompositingPipeline::new(&doc).unwrap();
    pipeline.tick(&mut doc);
    pipeline.draw(&doc).unwrap();

    // the blended cache is owned by layer 0
    assert!(pipeline.blend_cache().bitmap(0).is_some());

    pipeline.set_active_tool(
        &mut doc,
        Some(ToolType::Brush),
        &brush_options(),
        Rgba8::opaque(255, 0, 0),
    );
    pipeline.handle_press(&mut doc, 11.0, 5.0);
    pipeline.update(&mut doc);

    // a gesture on a layer above the cached index does not pause the cache
    assert!(pipeline.blend_cache().is_active());
    assert!(pipeline.blend_cache().bitmap(0).is_some());

    pipeline.handle_release(&mut doc, 11.0, 5.0);
    assert!(pipeline.blend_cache().bitmap(0).is_some());
}

#[test]
fn gesture_invalidates_owning_layer_filter_cache_once() {
    let mut doc = document();
    let mut pipeline = CompositingPipeline::new(&doc).unwrap();
    pipeline.tick(&mut doc);

    let top_id = doc.layers[2].id;
    assert!(
        pipeline
            .bitmap_cache()
            .get(top_id)
            .is_some_and(|entry| entry.filter_data.is_some()),
        "filter artifact cached after initial effect render"
    );

    pipeline.set_active_tool(
        &mut doc,
        Some(ToolType::Brush),
        &brush_options(),
        Rgba8::opaque(255, 0, 0),
    );
    pipeline.handle_press(&mut doc, 11.0, 5.0);
    pipeline.update(&mut doc);
    pipeline.handle_release(&mut doc, 11.0, 5.0);

    // the release invalidated the filter artifact and scheduled exactly one
    // recompute
    let entry = pipeline.bitmap_cache().get(top_id).unwrap();
    assert!(entry.filter_data.is_none());
    assert!(entry.filters.is_some(), "snapshot key survives invalidation");
    assert!(pipeline.has_pending_effects());

    pipeline.tick(&mut doc);
    assert!(!pipeline.has_pending_effects());
    let entry = pipeline.bitmap_cache().get(top_id).unwrap();
    assert!(entry.filter_data.is_some(), "recompute refilled the cache");
}

#[test]
fn gesture_on_covered_layer_pauses_and_flushes_blend_cache() {
    let mut doc = document();
    // make the TOP layer the blended one so lower layers are covered
    doc.layers[0].filters.blend_mode = BlendMode::Normal;
    doc.layers[2].filters = FilterConfig {
        blend_mode: BlendMode::Multiply,
        ..FilterConfig::default()
    };
    doc.active_layer = 1;

    let mut pipeline = CompositingPipeline::new(&doc).unwrap();
    pipeline.tick(&mut doc);
    pipeline.draw(&doc).unwrap();
    assert!(pipeline.blend_cache().bitmap(2).is_some());
    assert!(pipeline.blend_cache().is_covered(1));

    pipeline.set_active_tool(
        &mut doc,
        Some(ToolType::Brush),
        &brush_options(),
        Rgba8::opaque(0, 0, 255),
    );
    pipeline.handle_press(&mut doc, 8.0, 8.0);
    // a press on a covered layer pauses the cache for the gesture
    assert!(!pipeline.blend_cache().is_active());

    pipeline.update(&mut doc);
    pipeline.handle_release(&mut doc, 8.0, 8.0);

    // un-pausing flushed: the merged bitmap cannot be trusted anymore
    assert!(pipeline.blend_cache().is_active());
    assert!(pipeline.blend_cache().bitmap(2).is_none());
}

#[test]
fn paint_history_restores_pixels_and_invalidates_caches() {
    let mut doc = document();
    let mut pipeline = CompositingPipeline::new(&doc).unwrap();
    pipeline.tick(&mut doc);

    pipeline.set_active_tool(
        &mut doc,
        Some(ToolType::Brush),
        &brush_options(),
        Rgba8::opaque(255, 0, 0),
    );
    pipeline.handle_press(&mut doc, 11.0, 5.0);
    pipeline.update(&mut doc);
    pipeline.handle_release(&mut doc, 11.0, 5.0);
    pipeline.tick(&mut doc);

    let entries = pipeline.take_history();
    assert_eq!(entries.len(), 1);
    assert!(doc.layers[2].source.pixel(5, 5).unwrap().a > 0);

    pipeline.undo(&mut doc, &entries[0]);
    assert_eq!(doc.layers[2].source.pixel(5, 5).unwrap().a, 0);
    // undo routes through the same invalidation path as a live edit
    assert!(pipeline.has_pending_effects());

    pipeline.tick(&mut doc);
    pipeline.redo(&mut doc, &entries[0]);
    assert!(doc.layers[2].source.pixel(5, 5).unwrap().a > 0);
}

#[test]
fn eraser_gesture_erases_committed_pixels() {
    let mut doc = Document::new(16, 16);
    let mut layer = Layer::new(LayerId(7), "l", 16, 16);
    layer.source.fill(Rgba8::opaque(120, 130, 140));
    doc.layers.push(layer);
    doc.active_layer = 0;

    let mut pipeline = CompositingPipeline::new(&doc).unwrap();
    pipeline.tick(&mut doc);

    pipeline.set_active_tool(
        &mut doc,
        Some(ToolType::Eraser),
        &brush_options(),
        Rgba8::opaque(0, 0, 0),
    );
    pipeline.handle_press(&mut doc, 8.0, 8.0);
    pipeline.update(&mut doc);
    pipeline.handle_move(&mut doc, 9.0, 8.0);
    pipeline.update(&mut doc);
    pipeline.handle_release(&mut doc, 9.0, 8.0);

    assert_eq!(doc.layers[0].source.pixel(8, 8).unwrap().a, 0);
    assert_eq!(doc.layers[0].source.pixel(1, 14).unwrap().a, 255);
}

#[test]
fn selection_constrains_committed_stroke() {
    let mut doc = Document::new(16, 16);
    doc.layers.push(Layer::new(LayerId(9), "l", 16, 16));
    doc.active_layer = 0;

    let mut pipeline = CompositingPipeline::new(&doc).unwrap();
    pipeline.tick(&mut doc);

    // draw a rectangular selection over the left half
    pipeline.set_active_tool(
        &mut doc,
        Some(ToolType::Selection),
        &BrushOptions::default(),
        Rgba8::transparent(),
    );
    pipeline.handle_press(&mut doc, 0.0, 0.0);
    pipeline.handle_release(&mut doc, 8.0, 16.0);
    assert_eq!(doc.selection.len(), 1);

    // brush across the selection boundary
    pipeline.set_active_tool(
        &mut doc,
        Some(ToolType::Brush),
        &brush_options(),
        Rgba8::opaque(255, 0, 0),
    );
    pipeline.handle_press(&mut doc, 4.0, 8.0);
    pipeline.update(&mut doc);
    pipeline.handle_move(&mut doc, 14.0, 8.0);
    pipeline.update(&mut doc);
    pipeline.handle_release(&mut doc, 14.0, 8.0);

    let source = &doc.layers[0].source;
    assert!(source.pixel(4, 8).unwrap().a > 0, "inside the selection");
    assert_eq!(source.pixel(13, 8).unwrap().a, 0, "outside the selection");
}
