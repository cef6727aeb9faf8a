//! Offscreen raster surfaces used by the frame sampler.
//!
//! A [`RasterSurface`] is the equivalent of an offscreen canvas with a 2-D
//! context: it is resized to the target frame size, a video frame is drawn
//! scaled onto it, and the result is encoded to a `data:` URL.

mod software;

pub use software::SoftwareSurface;

use crate::media::RawFrame;
use crate::{CaptureError, ImageFormat};

/// A resizable drawing surface that can encode itself as an image.
pub trait RasterSurface: Send {
    /// Current `(width, height)` in pixels.
    fn dimensions(&self) -> (u32, u32);

    /// Resizes the surface. Resizing clears its contents.
    fn resize(&mut self, width: u32, height: u32);

    /// Draws `frame` scaled to cover the whole surface.
    fn draw(&mut self, frame: &RawFrame) -> Result<(), CaptureError>;

    /// Encodes the surface as a `data:<mime>;base64,<payload>` URL.
    ///
    /// A surface with no area encodes to `"data:,"`.
    fn to_data_url(&self, format: ImageFormat, quality: f32) -> Result<String, CaptureError>;

    /// Drops the backing store by zeroing the dimensions.
    fn release(&mut self) {
        self.resize(0, 0);
    }
}

/// Returns the payload of a `data:` URL, i.e. everything after the first comma.
///
/// # Example
///
/// ```
/// use page_capture::surface::data_url_payload;
///
/// assert_eq!(data_url_payload("data:image/jpeg;base64,/9j/4A"), Some("/9j/4A"));
/// assert_eq!(data_url_payload("not a data url"), None);
/// ```
pub fn data_url_payload(url: &str) -> Option<&str> {
    url.split_once(',').map(|(_, payload)| payload)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_payload_of_empty_surface_url() {
        assert_eq!(data_url_payload("data:,"), Some(""));
    }

    #[test]
    fn test_payload_keeps_later_commas() {
        assert_eq!(data_url_payload("data:text/plain,a,b"), Some("a,b"));
    }
}
