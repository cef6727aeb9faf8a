//! Float to 16-bit quantization.

/// Quantizes one float sample to `i16`.
///
/// Saturates at the extremes: anything at or above `1.0` becomes
/// `i16::MAX`, anything at or below `-1.0` becomes `i16::MIN`. Values in
/// between map through `floor(sample * 32768)`, so the scale is asymmetric
/// and `-1.0` reaches the full negative range. `NaN` maps to 0.
///
/// # Example
///
/// ```
/// use page_capture::format::quantize_sample;
///
/// assert_eq!(quantize_sample(1.0), 32767);
/// assert_eq!(quantize_sample(-1.0), -32768);
/// assert_eq!(quantize_sample(0.5), 16384);
/// ```
#[inline]
pub fn quantize_sample(sample: f32) -> i16 {
    if sample >= 1.0 {
        i16::MAX
    } else if sample <= -1.0 {
        i16::MIN
    } else {
        // Float-to-int `as` saturates and maps NaN to 0.
        (sample * 32768.0).floor() as i16
    }
}

/// Quantizes a block of float samples.
pub fn quantize_block(samples: &[f32]) -> Vec<i16> {
    samples.iter().map(|&s| quantize_sample(s)).collect()
}

/// Serializes samples as little-endian bytes.
pub fn to_le_bytes(samples: &[i16]) -> Vec<u8> {
    samples.iter().flat_map(|s| s.to_le_bytes()).collect()
}
