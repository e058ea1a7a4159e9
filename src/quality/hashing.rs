use image::DynamicImage;
use img_hash::{HasherConfig, ImageHash};

use crate::error::{InspectError, Result};

/// 64-bit DCT perceptual hash, base64-encoded.
pub fn perceptual_hash(img: &DynamicImage) -> Result<String> {
    // Hash a small thumbnail; thumbnail() preserves aspect ratio and is fast on large images
    let thumbnail = img.thumbnail(64, 64);

    let hasher = HasherConfig::new()
        .hash_size(8, 8)
        .preproc_dct()
        .to_hasher();

    // img_hash pins an older `image`, so hand the pixels over raw
    let rgba = thumbnail.to_rgba8();
    let (width, height) = rgba.dimensions();

    let img_hash_image = img_hash::image::RgbaImage::from_raw(width, height, rgba.into_raw())
        .ok_or_else(|| InspectError::InvalidInput("Failed to create image for hashing".to_string()))?;

    let hash = hasher.hash_image(&img_hash::image::DynamicImage::ImageRgba8(img_hash_image));

    Ok(hash.to_base64())
}

pub fn hamming_distance(hash1: &str, hash2: &str) -> Result<u32> {
    let h1 = ImageHash::<Box<[u8]>>::from_base64(hash1)
        .map_err(|e| InspectError::InvalidInput(format!("Invalid hash1: {:?}", e)))?;
    let h2 = ImageHash::<Box<[u8]>>::from_base64(hash2)
        .map_err(|e| InspectError::InvalidInput(format!("Invalid hash2: {:?}", e)))?;

    Ok(h1.dist(&h2))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::clip::testing::striped;

    #[test]
    fn test_identical_images_have_zero_distance() {
        let img = striped([200, 40, 40], 128, 96, 4);
        let a = perceptual_hash(&img).unwrap();
        let b = perceptual_hash(&img.clone()).unwrap();
        assert_eq!(hamming_distance(&a, &b).unwrap(), 0);
    }

    #[test]
    fn test_invalid_hash_rejected() {
        assert!(hamming_distance("!!!", "!!!").is_err());
    }
}
