// image.rs: Prepares a picked photo for upload: decode, downscale if wider
// than the configured maximum, and JPEG-encode so the `image/jpeg` label the
// relay forwards is truthful.

use image::codecs::jpeg::JpegEncoder;
use image::{imageops, DynamicImage, GenericImageView};

/// Encoding parameters for outgoing photos.
#[derive(Debug, Clone, Copy)]
pub struct JpegOptions {
    /// Maximum width in pixels; wider images are downscaled.
    pub max_width: u32,
    /// JPEG compression quality (1–100).
    pub quality: u8,
}

impl Default for JpegOptions {
    fn default() -> Self {
        Self {
            max_width: 2048,
            quality: 90,
        }
    }
}

/// Decode `bytes`, downscale and JPEG-encode.
///
/// Returns the encoded buffer and its final dimensions.
pub fn encode_jpeg(bytes: &[u8], options: JpegOptions) -> Result<(Vec<u8>, u32, u32), String> {
    let img = image::load_from_memory(bytes).map_err(|e| format!("decode: {e}"))?;
    let img = downscale(img, options.max_width);
    let (w, h) = img.dimensions();

    let mut jpeg_buf: Vec<u8> = Vec::new();
    {
        let mut encoder = JpegEncoder::new_with_quality(&mut jpeg_buf, options.quality.clamp(1, 100));
        encoder
            .encode(img.to_rgb8().as_raw(), w, h, image::ExtendedColorType::Rgb8)
            .map_err(|e| format!("jpeg encode: {e}"))?;
    }

    Ok((jpeg_buf, w, h))
}

/// Shrink to `max_width` keeping the aspect ratio; narrower images pass through.
fn downscale(img: DynamicImage, max_width: u32) -> DynamicImage {
    if max_width == 0 || img.width() <= max_width {
        return img;
    }
    let ratio = max_width as f64 / img.width() as f64;
    let new_h = ((img.height() as f64 * ratio).round() as u32).max(1);
    img.resize_exact(max_width, new_h, imageops::FilterType::Triangle)
}
