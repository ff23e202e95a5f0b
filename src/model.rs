use crate::{
    core::{LayerId, Point, Rect, Rgba8},
    error::{BitmillError, BitmillResult},
    surface::RasterSurface,
};

/// One closed or in-progress polygonal outline. A closed shape has at least
/// four points and its first point equals its last point exactly.
pub type Shape = Vec<Point>;

/// A selection is a list of shapes that together constrain painting and
/// clipping operations.
pub type Selection = Vec<Shape>;

/// Geometric placement effects applied to a layer's content at draw time.
#[derive(Clone, Copy, Debug, PartialEq, serde::Serialize, serde::Deserialize)]
pub struct Transform2D {
    /// Uniform scale factor, centered on the layer.
    pub scale: f64,
    /// Rotation in radians around the layer center.
    pub rotation: f64,
    /// Horizontal mirror.
    pub mirror_x: bool,
    /// Vertical mirror.
    pub mirror_y: bool,
}

impl Default for Transform2D {
    fn default() -> Self {
        Self {
            scale: 1.0,
            rotation: 0.0,
            mirror_x: false,
            mirror_y: false,
        }
    }
}

impl Transform2D {
    pub fn is_rotated(&self) -> bool {
        self.rotation != 0.0
    }

    pub fn is_scaled(&self) -> bool {
        self.scale != 1.0
    }

    pub fn is_mirrored(&self) -> bool {
        self.mirror_x || self.mirror_y
    }

    pub fn is_identity(&self) -> bool {
        !self.is_rotated() && !self.is_scaled() && !self.is_mirrored()
    }
}

/// Pixel combination function used when compositing a layer with the
/// underlying merged content.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, serde::Serialize, serde::Deserialize)]
pub enum BlendMode {
    /// Standard source-over painting.
    #[default]
    Normal,
    Screen,
    Multiply,
    Difference,
    LinearDodge,
    Overlay,
    HardLight,
    ColorDodge,
    ColorBurn,
    Darken,
    Lighten,
    Exclusion,
    SoftLight,
    Luminosity,
    Color,
    Hue,
    Saturation,
    LighterColor,
    DarkerColor,
}

/// Two-color tonal remap configuration.
#[derive(Clone, Copy, Debug, PartialEq, serde::Serialize, serde::Deserialize)]
pub struct DuotoneConfig {
    pub enabled: bool,
    pub color1: Rgba8,
    pub color2: Rgba8,
}

/// Per-layer filter configuration. Field defaults are the neutral values:
/// a layer whose config equals [`FilterConfig::default`] renders identically
/// to an unfiltered layer, byte for byte.
#[derive(Clone, Debug, PartialEq, serde::Serialize, serde::Deserialize)]
pub struct FilterConfig {
    pub enabled: bool,
    pub blend_mode: BlendMode,
    /// Layer opacity in `[0, 1]`.
    pub opacity: f64,
    /// Gamma in `[0, 1]`, neutral at 0.5 (maps to a 0..2 working range).
    pub gamma: f64,
    /// Brightness in `[0, 1]`, neutral at 0.5 (multiplicative factor = value * 2).
    pub brightness: f64,
    /// Contrast in `[-1, 1]`, neutral at 0.
    pub contrast: f64,
    /// Vibrance in `[0, 1]`, neutral at 0.5.
    pub vibrance: f64,
    /// Binary luma cutoff in `[0, 255]`; -1 disables the stage.
    pub threshold: f64,
    pub desaturate: bool,
    pub invert: bool,
    pub duotone: Option<DuotoneConfig>,
}

impl Default for FilterConfig {
    fn default() -> Self {
        Self {
            enabled: true,
            blend_mode: BlendMode::Normal,
            opacity: 1.0,
            gamma: 0.5,
            brightness: 0.5,
            contrast: 0.0,
            vibrance: 0.5,
            threshold: -1.0,
            desaturate: false,
            invert: false,
            duotone: None,
        }
    }
}

impl FilterConfig {
    /// Whether this configuration deviates from the neutral defaults in a
    /// way that requires an effect render pass.
    pub fn has_filters(&self) -> bool {
        self.enabled && *self != Self::default()
    }

    /// Whether this configuration requests non-default blend compositing.
    pub fn has_blend(&self) -> bool {
        self.enabled && self.blend_mode != BlendMode::Normal
    }
}

/// Text content configuration. Rasterization is performed by an injected
/// collaborator; the core only snapshot-compares and caches the result.
#[derive(Clone, Debug, PartialEq, serde::Serialize, serde::Deserialize)]
pub struct TextConfig {
    pub value: String,
    pub font: String,
    pub size: f64,
    pub line_height: f64,
    pub letter_spacing: f64,
    pub color: Rgba8,
}

/// Whether a paint operation addresses the layer's source pixels or its mask.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, serde::Serialize, serde::Deserialize)]
pub enum PaintTarget {
    #[default]
    Source,
    Mask,
}

/// A named, ordered, transformable raster content unit.
///
/// The source surface (and the optional mask) are exclusively owned by the
/// layer; no other layer aliases them. A mask's pixel dimensions must equal
/// the declared layer dimensions (its offset may differ).
#[derive(Clone, Debug, serde::Serialize, serde::Deserialize)]
pub struct Layer {
    pub id: LayerId,
    pub name: String,
    pub left: f64,
    pub top: f64,
    pub width: u32,
    pub height: u32,
    pub source: RasterSurface,
    pub mask: Option<RasterSurface>,
    pub mask_x: f64,
    pub mask_y: f64,
    pub transform: Transform2D,
    pub filters: FilterConfig,
    pub text: Option<TextConfig>,
    pub visible: bool,
    pub transparent: bool,
}

impl Layer {
    /// Create a layer with an empty (transparent) source surface.
    pub fn new(id: LayerId, name: impl Into<String>, width: u32, height: u32) -> Self {
        Self {
            id,
            name: name.into(),
            left: 0.0,
            top: 0.0,
            width,
            height,
            source: RasterSurface::new(width, height),
            mask: None,
            mask_x: 0.0,
            mask_y: 0.0,
            transform: Transform2D::default(),
            filters: FilterConfig::default(),
            text: None,
            visible: true,
            transparent: true,
        }
    }

    /// Attach a mask surface. The mask must match the declared layer size.
    pub fn set_mask(&mut self, mask: RasterSurface) -> BitmillResult<()> {
        if mask.width() != self.width || mask.height() != self.height {
            return Err(BitmillError::validation(format!(
                "mask dimensions {}x{} do not match layer dimensions {}x{}",
                mask.width(),
                mask.height(),
                self.width,
                self.height
            )));
        }
        self.mask = Some(mask);
        Ok(())
    }

    /// Validate structural invariants.
    pub fn validate(&self) -> BitmillResult<()> {
        if self.width == 0 || self.height == 0 {
            return Err(BitmillError::validation("layer dimensions must be > 0"));
        }
        if self.source.width() != self.width || self.source.height() != self.height {
            return Err(BitmillError::validation(
                "layer source dimensions do not match declared dimensions",
            ));
        }
        if let Some(mask) = &self.mask
            && (mask.width() != self.width || mask.height() != self.height)
        {
            return Err(BitmillError::validation(
                "mask dimensions do not match declared layer dimensions",
            ));
        }
        Ok(())
    }

    /// The untransformed bounding rectangle of the layer.
    pub fn rect(&self) -> Rect {
        Rect::new(
            self.left,
            self.top,
            self.left + f64::from(self.width),
            self.top + f64::from(self.height),
        )
    }

    pub fn has_blend(&self) -> bool {
        self.filters.has_blend()
    }
}

/// The active layer stack plus the interactive state the document-state
/// collaborator exposes to the core each frame.
#[derive(Clone, Debug, serde::Serialize, serde::Deserialize)]
pub struct Document {
    pub width: u32,
    pub height: u32,
    pub layers: Vec<Layer>,
    /// Index of the currently active layer.
    pub active_layer: usize,
    /// Whether paint operations target the active layer's source or mask.
    pub active_target: PaintTarget,
    pub selection: Selection,
    pub invert_selection: bool,
}

impl Document {
    pub fn new(width: u32, height: u32) -> Self {
        Self {
            width,
            height,
            layers: Vec::new(),
            active_layer: 0,
            active_target: PaintTarget::Source,
            selection: Vec::new(),
            invert_selection: false,
        }
    }

    pub fn active_layer(&self) -> Option<&Layer> {
        self.layers.get(self.active_layer)
    }

    /// Indices of layers whose filters request non-default blend compositing.
    pub fn blended_layer_indices(&self) -> Vec<usize> {
        self.layers
            .iter()
            .enumerate()
            .filter(|(_, l)| l.has_blend())
            .map(|(i, _)| i)
            .collect()
    }
}
