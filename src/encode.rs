use crate::error::SnapError;
use crate::output::ImageFormat;
use crate::surface::PixelSurface;
use image::codecs::jpeg::JpegEncoder;
use image::codecs::png::PngEncoder;
use image::{ColorType, ImageEncoder};

pub const DEFAULT_JPEG_QUALITY: u8 = 90;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct EncodeOptions {
    /// 1..=100; only used for JPEG.
    pub jpeg_quality: u8,
}

impl Default for EncodeOptions {
    fn default() -> Self {
        Self {
            jpeg_quality: DEFAULT_JPEG_QUALITY,
        }
    }
}

/// Serializes `surface`. PNG keeps RGBA losslessly; JPEG drops alpha by
/// compositing over white. `page` only labels errors.
pub fn encode_surface(
    surface: &PixelSurface,
    format: ImageFormat,
    options: &EncodeOptions,
    page: u32,
) -> Result<Vec<u8>, SnapError> {
    let width = surface.width();
    let height = surface.height();
    let mut out = Vec::new();
    let result = match format {
        ImageFormat::Png => {
            let rgba = surface.to_rgba8();
            PngEncoder::new(&mut out).write_image(rgba.as_raw(), width, height, ColorType::Rgba8.into())
        }
        ImageFormat::Jpeg => {
            let rgb = surface.to_rgb8_over_white();
            let quality = options.jpeg_quality.clamp(1, 100);
            JpegEncoder::new_with_quality(&mut out, quality).write_image(
                rgb.as_raw(),
                width,
                height,
                ColorType::Rgb8.into(),
            )
        }
    };
    result.map_err(|err| SnapError::Encode {
        page,
        message: err.to_string(),
    })?;
    Ok(out)
}
