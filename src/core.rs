pub use kurbo::{Affine, BezPath, Point, Rect, Vec2};

/// Stable identity of a layer within a document.
#[derive(
    Clone, Copy, Debug, PartialEq, Eq, PartialOrd, Ord, Hash, serde::Serialize, serde::Deserialize,
)]
pub struct LayerId(pub u64);

/// Straight (non-premultiplied) RGBA8 color, matching the byte layout of
/// layer pixel buffers.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, serde::Serialize, serde::Deserialize)]
pub struct Rgba8 {
    pub r: u8,
    pub g: u8,
    pub b: u8,
    pub a: u8,
}

impl Rgba8 {
    pub const fn new(r: u8, g: u8, b: u8, a: u8) -> Self {
        Self { r, g, b, a }
    }

    pub const fn opaque(r: u8, g: u8, b: u8) -> Self {
        Self { r, g, b, a: 255 }
    }

    pub const fn transparent() -> Self {
        Self {
            r: 0,
            g: 0,
            b: 0,
            a: 0,
        }
    }

    pub const fn to_array(self) -> [u8; 4] {
        [self.r, self.g, self.b, self.a]
    }

    pub const fn from_array(px: [u8; 4]) -> Self {
        Self {
            r: px[0],
            g: px[1],
            b: px[2],
            a: px[3],
        }
    }
}

/// Top-left offset of the visible area within a document, in document pixels.
#[derive(Clone, Copy, Debug, Default, PartialEq, serde::Serialize, serde::Deserialize)]
pub struct Viewport {
    pub left: f64,
    pub top: f64,
}

impl Viewport {
    pub fn new(left: f64, top: f64) -> Self {
        Self { left, top }
    }
}

/// Round half-up, matching the `(0.5 + v) << 0` rounding used throughout
/// the interactive paths.
pub fn fast_round(v: f64) -> i64 {
    (v + 0.5).floor() as i64
}
