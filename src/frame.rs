//! Encoded still frame handed to the frame hook.

use serde::Serialize;

use crate::TargetId;

/// Image format produced by the raster surface.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize)]
pub enum ImageFormat {
    /// Lossy JPEG. Honors the configured quality.
    #[default]
    #[serde(rename = "image/jpeg")]
    Jpeg,
    /// Lossless PNG. Quality is ignored.
    #[serde(rename = "image/png")]
    Png,
}

impl ImageFormat {
    /// MIME type, as used in data URLs.
    pub fn mime(self) -> &'static str {
        match self {
            Self::Jpeg => "image/jpeg",
            Self::Png => "image/png",
        }
    }
}

/// Transport encoding of [`VideoFrame::data`].
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum FrameEncoding {
    /// Standard base64 with padding.
    #[default]
    Base64,
}

/// One downscaled, encoded frame sampled from a playing video.
///
/// Serializes to the frame hook payload:
/// `{width, height, data, ts, format, encoding, originalWidth, originalHeight}`.
#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct VideoFrame {
    /// Session that produced the frame. Not part of the hook payload.
    #[serde(skip)]
    pub target: TargetId,

    /// Encoded width in pixels.
    pub width: u32,

    /// Encoded height in pixels.
    pub height: u32,

    /// Encoded image payload, without any `data:` URL prefix.
    pub data: String,

    /// Playback position of the source when sampled, in seconds.
    pub ts: f64,

    /// Image format of `data`.
    pub format: ImageFormat,

    /// Transport encoding of `data`.
    pub encoding: FrameEncoding,

    /// Native width of the source video.
    pub original_width: u32,

    /// Native height of the source video.
    pub original_height: u32,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_mime() {
        assert_eq!(ImageFormat::Jpeg.mime(), "image/jpeg");
        assert_eq!(ImageFormat::Png.mime(), "image/png");
    }

    #[test]
    fn test_serializes_to_hook_shape() {
        let frame = VideoFrame {
            target: TargetId::new("v"),
            width: 384,
            height: 216,
            data: "AAAA".to_string(),
            ts: 12.5,
            format: ImageFormat::Jpeg,
            encoding: FrameEncoding::Base64,
            original_width: 1920,
            original_height: 1080,
        };
        let json = serde_json::to_value(&frame).unwrap();
        assert_eq!(
            json,
            serde_json::json!({
                "width": 384,
                "height": 216,
                "data": "AAAA",
                "ts": 12.5,
                "format": "image/jpeg",
                "encoding": "base64",
                "originalWidth": 1920,
                "originalHeight": 1080,
            })
        );
    }
}
