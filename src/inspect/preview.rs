use base64::{engine::general_purpose::STANDARD as BASE64, Engine};
use image::codecs::jpeg::JpegEncoder;
use image::{DynamicImage, GenericImageView};
use std::io::Cursor;

/// Shrink an image so neither side exceeds `max_dimension`, re-encode as JPEG
/// and return it as a `data:` URL.
pub fn preview_data_url(img: &DynamicImage, max_dimension: u32) -> Option<String> {
    let (width, height) = img.dimensions();
    let img = if width > max_dimension || height > max_dimension {
        img.resize(
            max_dimension,
            max_dimension,
            image::imageops::FilterType::Triangle,
        )
    } else {
        img.clone()
    };

    // JPEG has no alpha channel
    let rgb = DynamicImage::ImageRgb8(img.to_rgb8());

    let mut buf = Cursor::new(Vec::new());
    let encoder = JpegEncoder::new_with_quality(&mut buf, 80);
    if let Err(e) = rgb.write_with_encoder(encoder) {
        tracing::warn!(error = %e, "Failed to encode preview");
        return None;
    }

    Some(format!("data:image/jpeg;base64,{}", BASE64.encode(buf.into_inner())))
}
