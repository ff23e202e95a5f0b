use crate::{
    core::Rgba8,
    error::{BitmillError, BitmillResult},
};
use image::RgbaImage;

/// An owned, mutable 2D pixel buffer storing straight-alpha RGBA8.
///
/// This is the fundamental unit of storage for layer content, masks and
/// scratch buffers. Drawing happens through [`crate::painter::Painter`],
/// which borrows the surface for the duration of a draw pass.
#[derive(Clone, Debug, PartialEq, Eq, serde::Serialize, serde::Deserialize)]
pub struct RasterSurface {
    width: u32,
    height: u32,
    data: Vec<u8>,
}

impl RasterSurface {
    /// Create a fully transparent surface.
    pub fn new(width: u32, height: u32) -> Self {
        Self {
            width,
            height,
            data: vec![0; byte_len(width, height)],
        }
    }

    pub fn width(&self) -> u32 {
        self.width
    }

    pub fn height(&self) -> u32 {
        self.height
    }

    pub fn data(&self) -> &[u8] {
        &self.data
    }

    pub fn data_mut(&mut self) -> &mut [u8] {
        &mut self.data
    }

    /// Take ownership of the pixel buffer, leaving the surface empty-sized.
    /// Used to hand the buffer to the filter worker without copying.
    pub fn take_data(&mut self) -> Vec<u8> {
        self.width = 0;
        self.height = 0;
        std::mem::take(&mut self.data)
    }

    /// Restore a buffer previously taken with [`RasterSurface::take_data`].
    pub fn restore_data(&mut self, width: u32, height: u32, data: Vec<u8>) -> BitmillResult<()> {
        if data.len() != byte_len(width, height) {
            return Err(BitmillError::validation(
                "restored buffer length does not match dimensions",
            ));
        }
        self.width = width;
        self.height = height;
        self.data = data;
        Ok(())
    }

    /// Resize the surface, clearing its contents. Callers must not assume
    /// prior contents persist across a resize. Shrinking keeps the existing
    /// allocation so pooled surfaces do not churn the allocator.
    pub fn resize(&mut self, width: u32, height: u32) {
        let len = byte_len(width, height);
        self.width = width;
        self.height = height;
        if self.data.len() < len {
            self.data = vec![0; len];
        } else {
            self.data.truncate(len);
            self.data.fill(0);
        }
    }

    /// Clear all pixels to transparent.
    pub fn clear(&mut self) {
        self.data.fill(0);
    }

    /// Fill every pixel with `color`.
    pub fn fill(&mut self, color: Rgba8) {
        for px in self.data.chunks_exact_mut(4) {
            px.copy_from_slice(&color.to_array());
        }
    }

    pub fn pixel(&self, x: u32, y: u32) -> Option<Rgba8> {
        if x >= self.width || y >= self.height {
            return None;
        }
        let i = ((y * self.width + x) * 4) as usize;
        Some(Rgba8::new(
            self.data[i],
            self.data[i + 1],
            self.data[i + 2],
            self.data[i + 3],
        ))
    }

    pub fn put_pixel(&mut self, x: u32, y: u32, color: Rgba8) {
        if x >= self.width || y >= self.height {
            return;
        }
        let i = ((y * self.width + x) * 4) as usize;
        self.data[i..i + 4].copy_from_slice(&color.to_array());
    }

    /// Ingest an opaque raster produced by an out-of-scope decoder.
    pub fn from_rgba_image(image: &RgbaImage) -> Self {
        Self {
            width: image.width(),
            height: image.height(),
            data: image.as_raw().clone(),
        }
    }

    /// Convert to an [`image::RgbaImage`] for export-side collaborators.
    pub fn to_rgba_image(&self) -> BitmillResult<RgbaImage> {
        RgbaImage::from_raw(self.width, self.height, self.data.clone())
            .ok_or_else(|| BitmillError::render("surface buffer does not match its dimensions"))
    }
}

fn byte_len(width: u32, height: u32) -> usize {
    (width as usize) * (height as usize) * 4
}
