//! CPU raster surface backed by the `image` crate.

use base64::engine::general_purpose::STANDARD;
use base64::Engine as _;
use image::codecs::jpeg::JpegEncoder;
use image::codecs::png::PngEncoder;
use image::imageops::{self, FilterType};
use image::{ColorType, DynamicImage, ImageEncoder, RgbaImage};

use crate::media::RawFrame;
use crate::surface::RasterSurface;
use crate::{CaptureError, ImageFormat};

/// A raster surface that scales and encodes on the CPU.
///
/// # Example
///
/// ```
/// use page_capture::media::RawFrame;
/// use page_capture::{ImageFormat, RasterSurface, SoftwareSurface};
///
/// let mut surface = SoftwareSurface::new();
/// surface.resize(8, 4);
/// surface.draw(&RawFrame::solid(40, 20, [255, 0, 0, 255])).unwrap();
/// let url = surface.to_data_url(ImageFormat::Jpeg, 0.8).unwrap();
/// assert!(url.starts_with("data:image/jpeg;base64,"));
/// ```
pub struct SoftwareSurface {
    canvas: RgbaImage,
}

impl SoftwareSurface {
    /// Creates a 0×0 surface.
    pub fn new() -> Self {
        Self {
            canvas: RgbaImage::new(0, 0),
        }
    }

    /// Color of the pixel at `(x, y)`, if inside the surface.
    pub fn pixel(&self, x: u32, y: u32) -> Option<[u8; 4]> {
        if x < self.canvas.width() && y < self.canvas.height() {
            Some(self.canvas.get_pixel(x, y).0)
        } else {
            None
        }
    }
}

impl Default for SoftwareSurface {
    fn default() -> Self {
        Self::new()
    }
}

/// Maps a `[0, 1]` quality to the encoder's `1..=100` scale.
fn jpeg_quality(quality: f32) -> u8 {
    (quality.clamp(0.0, 1.0) * 100.0).round().max(1.0) as u8
}

impl RasterSurface for SoftwareSurface {
    fn dimensions(&self) -> (u32, u32) {
        self.canvas.dimensions()
    }

    fn resize(&mut self, width: u32, height: u32) {
        self.canvas = RgbaImage::new(width, height);
    }

    fn draw(&mut self, frame: &RawFrame) -> Result<(), CaptureError> {
        let (width, height) = self.canvas.dimensions();
        if width == 0 || height == 0 {
            return Ok(());
        }
        if frame.width == 0 || frame.height == 0 {
            return Err(CaptureError::draw_failed("source frame has no area"));
        }

        let expected = frame.width as usize * frame.height as usize * 4;
        let Some(source) = RgbaImage::from_raw(frame.width, frame.height, frame.rgba.clone())
        else {
            return Err(CaptureError::draw_failed(format!(
                "frame buffer is {} bytes, expected {expected}",
                frame.rgba.len()
            )));
        };

        self.canvas = if source.dimensions() == (width, height) {
            source
        } else {
            imageops::resize(&source, width, height, FilterType::Triangle)
        };
        Ok(())
    }

    fn to_data_url(&self, format: ImageFormat, quality: f32) -> Result<String, CaptureError> {
        let (width, height) = self.canvas.dimensions();
        if width == 0 || height == 0 {
            return Ok("data:,".to_string());
        }

        let mut bytes = Vec::new();
        match format {
            ImageFormat::Jpeg => {
                // JPEG has no alpha channel
                let rgb = DynamicImage::ImageRgba8(self.canvas.clone()).to_rgb8();
                JpegEncoder::new_with_quality(&mut bytes, jpeg_quality(quality))
                    .encode(rgb.as_raw(), width, height, ColorType::Rgb8)
                    .map_err(|e| CaptureError::encode_failed(e.to_string()))?;
            }
            ImageFormat::Png => {
                PngEncoder::new(&mut bytes)
                    .write_image(self.canvas.as_raw(), width, height, ColorType::Rgba8)
                    .map_err(|e| CaptureError::encode_failed(e.to_string()))?;
            }
        }

        Ok(format!("data:{};base64,{}", format.mime(), STANDARD.encode(&bytes)))
    }
}
