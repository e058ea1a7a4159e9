use image::DynamicImage;
use serde::Serialize;

/// Sharpness verdict with the Laplacian variance that produced it.
#[derive(Debug, Clone, Copy, PartialEq, Serialize)]
#[serde(tag = "level", content = "score", rename_all = "lowercase")]
pub enum Sharpness {
    Sharp(f64),
    Borderline(f64),
    Blurry(f64),
}

impl Sharpness {
    pub fn classify(score: f64, reject_below: f64, warn_below: f64) -> Self {
        if score < reject_below {
            Sharpness::Blurry(score)
        } else if score < warn_below {
            Sharpness::Borderline(score)
        } else {
            Sharpness::Sharp(score)
        }
    }

    pub fn score(&self) -> f64 {
        match *self {
            Sharpness::Sharp(s) | Sharpness::Borderline(s) | Sharpness::Blurry(s) => s,
        }
    }
}

/// Variance of the 4-neighbour Laplacian over the grayscale image.
///
/// Low variance means few edges, which for a photo usually means blur.
/// Images smaller than 3x3 score 0.
pub fn blur_score(img: &DynamicImage) -> f64 {
    let gray = img.to_luma8();
    let (width, height) = gray.dimensions();
    if width < 3 || height < 3 {
        return 0.0;
    }

    let px = |x: u32, y: u32| gray.get_pixel(x, y)[0] as f64;

    let mut sum = 0.0;
    let mut sum_sq = 0.0;
    for y in 1..height - 1 {
        for x in 1..width - 1 {
            let lap = px(x, y - 1) + px(x - 1, y) + px(x + 1, y) + px(x, y + 1) - 4.0 * px(x, y);
            sum += lap;
            sum_sq += lap * lap;
        }
    }

    let n = ((width - 2) * (height - 2)) as f64;
    let mean = sum / n;
    (sum_sq / n - mean * mean).max(0.0)
}
