//! Image transcoding to fit a size budget
//!
//! Oversized images are decoded, flattened onto white when they carry
//! transparency, and re-encoded as JPEG at decreasing quality until they fit.
//! The transcoder never fails: anything it cannot decode or encode is handed
//! back unchanged.

use crate::config::ImageConfig;
use image::codecs::jpeg::JpegEncoder;
use image::{DynamicImage, ImageError, Rgb, RgbImage};

/// Content type of every re-encoded image
pub const TRANSCODED_CONTENT_TYPE: &str = "image/jpeg";

/// Budget and quality ladder for the transcoder
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct TranscodeSettings {
    /// Largest acceptable output in bytes
    pub max_bytes: usize,
    pub start_quality: u8,
    pub quality_step: u8,
    pub min_quality: u8,
}

impl Default for TranscodeSettings {
    fn default() -> Self {
        Self::from(&ImageConfig::default())
    }
}

impl From<&ImageConfig> for TranscodeSettings {
    fn from(config: &ImageConfig) -> Self {
        Self {
            max_bytes: (config.max_size_kb as usize).saturating_mul(1024),
            start_quality: config.start_quality,
            quality_step: config.quality_step.max(1),
            min_quality: config.min_quality,
        }
    }
}

/// Output of one transcode call
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Transcoded {
    pub bytes: Vec<u8>,
    /// JPEG quality of the kept encoding; None when the input was returned as is
    pub quality: Option<u8>,
}

impl Transcoded {
    fn unchanged(input: &[u8]) -> Self {
        Self {
            bytes: input.to_vec(),
            quality: None,
        }
    }

    /// Returns true if the bytes are a fresh JPEG encoding
    pub fn is_reencoded(&self) -> bool {
        self.quality.is_some()
    }
}

/// Re-encodes raw image bytes to fit the configured budget
#[derive(Debug, Clone, Default)]
pub struct ImageTranscoder {
    settings: TranscodeSettings,
}

impl ImageTranscoder {
    pub fn new(settings: TranscodeSettings) -> Self {
        Self { settings }
    }

    pub fn settings(&self) -> &TranscodeSettings {
        &self.settings
    }

    /// Shrinks an image to the budget, or returns it untouched
    ///
    /// Input already within budget is returned byte-for-byte. Otherwise the
    /// image is re-encoded starting at `start_quality` and stepping down by
    /// `quality_step`; the first encoding within budget is kept, or the one
    /// made at `min_quality` if the budget is never met.
    pub fn transcode(&self, input: &[u8]) -> Transcoded {
        if input.len() <= self.settings.max_bytes {
            return Transcoded::unchanged(input);
        }

        match self.reencode(input) {
            Ok(transcoded) => {
                tracing::info!(
                    "Compressed image from {:.1}KB to {:.1}KB (quality={})",
                    input.len() as f64 / 1024.0,
                    transcoded.bytes.len() as f64 / 1024.0,
                    transcoded.quality.unwrap_or_default()
                );
                transcoded
            }
            Err(e) => {
                tracing::error!("Error compressing image: {}", e);
                Transcoded::unchanged(input)
            }
        }
    }

    fn reencode(&self, input: &[u8]) -> Result<Transcoded, ImageError> {
        let decoded = image::load_from_memory(input)?;
        let rgb = flatten_onto_white(&decoded);

        let floor = self.settings.min_quality.min(self.settings.start_quality);
        let mut quality = self.settings.start_quality;

        loop {
            let encoded = encode_jpeg(&rgb, quality)?;

            if encoded.len() <= self.settings.max_bytes || quality <= floor {
                return Ok(Transcoded {
                    bytes: encoded,
                    quality: Some(quality),
                });
            }

            quality = quality.saturating_sub(self.settings.quality_step).max(floor);
        }
    }
}

/// Composites any transparency onto an opaque white background
fn flatten_onto_white(image: &DynamicImage) -> RgbImage {
    if !image.color().has_alpha() {
        return image.to_rgb8();
    }

    let rgba = image.to_rgba8();
    let mut flattened = RgbImage::new(rgba.width(), rgba.height());

    for (x, y, pixel) in rgba.enumerate_pixels() {
        let [r, g, b, a] = pixel.0;
        let alpha = u32::from(a);
        let blend = |channel: u8| ((u32::from(channel) * alpha + 255 * (255 - alpha)) / 255) as u8;
        flattened.put_pixel(x, y, Rgb([blend(r), blend(g), blend(b)]));
    }

    flattened
}

fn encode_jpeg(image: &RgbImage, quality: u8) -> Result<Vec<u8>, ImageError> {
    let mut buf = Vec::new();
    let encoder = JpegEncoder::new_with_quality(&mut buf, quality);
    image.write_with_encoder(encoder)?;
    Ok(buf)
}

#[cfg(test)]
mod tests {
    use super::*;
    use image::{ImageFormat, Rgba, RgbaImage};
    use std::io::Cursor;

    fn settings(max_bytes: usize) -> TranscodeSettings {
        TranscodeSettings {
            max_bytes,
            start_quality: 95,
            quality_step: 5,
            min_quality: 30,
        }
    }

    /// Deterministic noise compresses poorly, which keeps JPEG output large
    fn noise_png(width: u32, height: u32) -> Vec<u8> {
        let mut state: u32 = 0x1234_5678;
        let img = RgbImage::from_fn(width, height, |_, _| {
            state = state.wrapping_mul(1_664_525).wrapping_add(1_013_904_223);
            let [r, g, b, _] = state.to_le_bytes();
            Rgb([r, g, b])
        });

        let mut buf = Vec::new();
        DynamicImage::ImageRgb8(img)
            .write_to(&mut Cursor::new(&mut buf), ImageFormat::Png)
            .unwrap();
        buf
    }

    #[test]
    fn test_small_input_is_unchanged() {
        let input = noise_png(8, 8);
        let transcoder = ImageTranscoder::new(settings(input.len()));

        let output = transcoder.transcode(&input);
        assert_eq!(output.bytes, input);
        assert!(!output.is_reencoded());
    }

    #[test]
    fn test_invalid_input_is_unchanged() {
        let input = b"not an image".repeat(100);
        let transcoder = ImageTranscoder::new(settings(16));

        let output = transcoder.transcode(&input);
        assert_eq!(output.bytes, input);
        assert_eq!(output.quality, None);
    }

    #[test]
    fn test_oversized_input_fits_budget_or_hits_floor() {
        let input = noise_png(256, 256);
        let budget = input.len() / 4;
        let transcoder = ImageTranscoder::new(settings(budget));

        let output = transcoder.transcode(&input);
        assert!(output.is_reencoded());
        assert!(output.bytes.len() <= budget || output.quality == Some(30));
        assert_eq!(image::guess_format(&output.bytes).unwrap(), ImageFormat::Jpeg);
    }

    #[test]
    fn test_unreachable_budget_stops_at_floor() {
        let input = noise_png(64, 64);
        let transcoder = ImageTranscoder::new(settings(1));

        let output = transcoder.transcode(&input);
        assert_eq!(output.quality, Some(30));
        assert!(image::load_from_memory(&output.bytes).is_ok());
    }

    #[test]
    fn test_floor_not_on_step_boundary_is_still_tried() {
        let input = noise_png(32, 32);
        let transcoder = ImageTranscoder::new(TranscodeSettings {
            max_bytes: 1,
            start_quality: 90,
            quality_step: 25,
            min_quality: 33,
        });

        let output = transcoder.transcode(&input);
        assert_eq!(output.quality, Some(33));
    }

    #[test]
    fn test_transparency_is_flattened_onto_white() {
        let mut img = RgbaImage::new(16, 16);
        for pixel in img.pixels_mut() {
            *pixel = Rgba([0, 0, 0, 0]);
        }
        let flattened = flatten_onto_white(&DynamicImage::ImageRgba8(img));

        assert_eq!(flattened.get_pixel(0, 0), &Rgb([255, 255, 255]));
    }

    #[test]
    fn test_opaque_pixels_survive_flattening() {
        let img = RgbaImage::from_pixel(4, 4, Rgba([10, 20, 30, 255]));
        let flattened = flatten_onto_white(&DynamicImage::ImageRgba8(img));

        assert_eq!(flattened.get_pixel(3, 3), &Rgb([10, 20, 30]));
    }

    #[test]
    fn test_settings_from_config() {
        let settings = TranscodeSettings::from(&ImageConfig::default());
        assert_eq!(settings.max_bytes, 500 * 1024);
        assert_eq!(settings.start_quality, 95);
        assert_eq!(settings.quality_step, 5);
        assert_eq!(settings.min_quality, 30);
    }
}
