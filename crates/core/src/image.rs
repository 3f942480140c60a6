//! Image tensors and explanation overlays.
//!
//! Images enter the pipeline as encoded bytes and are normalized into an
//! [`ImageTensor`]: RGB, resized to [`INPUT_SIZE`] square, channel values
//! scaled to `[0, 1]`, stored row-major as `height x width x 3`.

use std::io::Cursor;

use image::codecs::jpeg::JpegEncoder;
use image::imageops::FilterType;
use image::{ImageFormat, Rgb, RgbImage};

use crate::error::CoreError;

/// Side length of the model's square input.
pub const INPUT_SIZE: u32 = 224;

/// Number of channels per pixel.
pub const CHANNELS: usize = 3;

/// JPEG quality used for stored artifacts.
pub const ARTIFACT_JPEG_QUALITY: u8 = 90;

/// Boundary colour drawn around influential regions (yellow).
pub const BOUNDARY_COLOR: [f32; 3] = [1.0, 1.0, 0.0];

/// Normalized HWC float image.
#[derive(Debug, Clone, PartialEq)]
pub struct ImageTensor {
    pub width: u32,
    pub height: u32,
    pub data: Vec<f32>,
}

impl ImageTensor {
    /// A tensor of the given size filled with zeros (black).
    pub fn zeros(width: u32, height: u32) -> Self {
        Self {
            width,
            height,
            data: vec![0.0; width as usize * height as usize * CHANNELS],
        }
    }

    /// Offset of the first channel of pixel `(x, y)` in `data`.
    pub fn offset(&self, x: u32, y: u32) -> usize {
        (y as usize * self.width as usize + x as usize) * CHANNELS
    }

    pub fn pixel(&self, x: u32, y: u32) -> [f32; 3] {
        let o = self.offset(x, y);
        [self.data[o], self.data[o + 1], self.data[o + 2]]
    }

    pub fn set_pixel(&mut self, x: u32, y: u32, value: [f32; 3]) {
        let o = self.offset(x, y);
        self.data[o..o + CHANNELS].copy_from_slice(&value);
    }

    /// Convert back to an 8-bit RGB image.
    pub fn to_rgb_image(&self) -> RgbImage {
        RgbImage::from_fn(self.width, self.height, |x, y| {
            let [r, g, b] = self.pixel(x, y);
            Rgb([to_u8(r), to_u8(g), to_u8(b)])
        })
    }
}

fn to_u8(v: f32) -> u8 {
    (v.clamp(0.0, 1.0) * 255.0).round() as u8
}

/// Per-pixel boolean mask the size of an [`ImageTensor`].
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PixelMask {
    pub width: u32,
    pub height: u32,
    pub cells: Vec<bool>,
}

impl PixelMask {
    pub fn empty(width: u32, height: u32) -> Self {
        Self {
            width,
            height,
            cells: vec![false; width as usize * height as usize],
        }
    }

    pub fn get(&self, x: u32, y: u32) -> bool {
        self.cells[y as usize * self.width as usize + x as usize]
    }

    pub fn set(&mut self, x: u32, y: u32, value: bool) {
        self.cells[y as usize * self.width as usize + x as usize] = value;
    }

    pub fn count(&self) -> usize {
        self.cells.iter().filter(|c| **c).count()
    }

    /// Whether `(x, y)` differs from any 4-connected neighbour.
    pub fn is_boundary(&self, x: u32, y: u32) -> bool {
        let here = self.get(x, y);
        (x > 0 && self.get(x - 1, y) != here)
            || (x + 1 < self.width && self.get(x + 1, y) != here)
            || (y > 0 && self.get(x, y - 1) != here)
            || (y + 1 < self.height && self.get(x, y + 1) != here)
    }
}

/// Cheap header sniff used at submission time. Does not decode pixels.
pub fn detect_format(bytes: &[u8]) -> Result<ImageFormat, CoreError> {
    if bytes.is_empty() {
        return Err(CoreError::Validation("Image file is empty".into()));
    }
    image::guess_format(bytes)
        .map_err(|_| CoreError::Validation("Unsupported or unrecognised image format".into()))
}

/// Decode, convert to RGB, resize to the model input and scale to `[0, 1]`.
pub fn decode_normalized(bytes: &[u8]) -> Result<ImageTensor, CoreError> {
    let decoded = image::load_from_memory(bytes)?.to_rgb8();
    let resized = image::imageops::resize(&decoded, INPUT_SIZE, INPUT_SIZE, FilterType::Triangle);

    let data = resized
        .pixels()
        .flat_map(|p| p.0)
        .map(|v| f32::from(v) / 255.0)
        .collect();

    Ok(ImageTensor {
        width: INPUT_SIZE,
        height: INPUT_SIZE,
        data,
    })
}

/// Draw the outline of `mask` over `image` in [`BOUNDARY_COLOR`].
///
/// Both the inside and outside edge pixels are painted, giving a
/// two-pixel line that stays visible after JPEG compression.
pub fn overlay_boundaries(image: &ImageTensor, mask: &PixelMask) -> Result<ImageTensor, CoreError> {
    if image.width != mask.width || image.height != mask.height {
        return Err(CoreError::Internal(format!(
            "Mask size {}x{} does not match image size {}x{}",
            mask.width, mask.height, image.width, image.height
        )));
    }

    let mut out = image.clone();
    for y in 0..mask.height {
        for x in 0..mask.width {
            if mask.is_boundary(x, y) {
                out.set_pixel(x, y, BOUNDARY_COLOR);
            }
        }
    }
    Ok(out)
}

/// Encode a tensor as a JPEG at [`ARTIFACT_JPEG_QUALITY`].
pub fn encode_jpeg(image: &ImageTensor) -> Result<Vec<u8>, CoreError> {
    let mut buf = Cursor::new(Vec::new());
    JpegEncoder::new_with_quality(&mut buf, ARTIFACT_JPEG_QUALITY).encode_image(&image.to_rgb_image())?;
    Ok(buf.into_inner())
}
