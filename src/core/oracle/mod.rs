//! # Oracle Module
//!
//! The pluggable per-asset scorer consulted during analysis, plus the
//! built-in pixel-statistics implementation.
//!
//! An oracle answers one question: how strong a deletion candidate is this
//! asset? Higher scores mean worse photos. The engine never interprets the
//! score beyond ranking, so alternative oracles (remote models, on-device
//! ML) slot in without touching the pipeline.

use image::GrayImage;
use serde::{Deserialize, Serialize};
use serde_json::{json, Value};

use crate::core::imaging;
use crate::error::OracleError;

/// Verdict for one asset.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct OracleScore {
    /// Badness metric: higher means a stronger deletion candidate
    pub final_score: f64,
    /// Opaque analyzer-specific fields, carried through for display
    #[serde(default)]
    pub details: Value,
}

/// The scorer consulted for every sampled asset.
///
/// Implementations must be stateless per call and callable from any worker
/// thread. `from_screenshot_album` tells the oracle the sampler drew the
/// asset from the screenshots album; how much that matters is the oracle's
/// business.
pub trait ScoringOracle: Send + Sync {
    fn analyze(
        &self,
        thumbnail: &[u8],
        from_screenshot_album: bool,
    ) -> Result<OracleScore, OracleError>;
}

/// Built-in scorer: blurry, flat and badly exposed images score high.
///
/// Works on the luma plane of the decoded thumbnail:
/// - sharpness via Laplacian variance (low variance means blur)
/// - contrast via pixel standard deviation
/// - exposure via brightness distance from mid-gray
///
/// Thumbnails arrive pre-fitted by the library, so no resizing happens here.
pub struct SharpnessOracle {
    /// Laplacian variance treated as fully sharp
    sharpness_ceiling: f64,
    /// Added to the score of assets drawn from the screenshots album
    screenshot_boost: f64,
}

impl Default for SharpnessOracle {
    fn default() -> Self {
        Self {
            sharpness_ceiling: 1500.0,
            screenshot_boost: 15.0,
        }
    }
}

impl SharpnessOracle {
    pub fn new() -> Self {
        Self::default()
    }

    /// Laplacian variance as a sharpness measure.
    ///
    /// The Laplacian operator detects edges; blurred images have few defined
    /// edges and therefore low variance in the operator's output.
    fn laplacian_variance(gray: &GrayImage) -> f64 {
        let (width, height) = gray.dimensions();
        if width < 3 || height < 3 {
            return 0.0;
        }

        // Kernel [0, 1, 0; 1, -4, 1; 0, 1, 0] over interior pixels,
        // accumulating running sums instead of materializing the response.
        let mut sum = 0.0;
        let mut sum_squares = 0.0;
        let mut count = 0u64;

        for y in 1..height - 1 {
            for x in 1..width - 1 {
                let center = gray.get_pixel(x, y)[0] as f64;
                let top = gray.get_pixel(x, y - 1)[0] as f64;
                let bottom = gray.get_pixel(x, y + 1)[0] as f64;
                let left = gray.get_pixel(x - 1, y)[0] as f64;
                let right = gray.get_pixel(x + 1, y)[0] as f64;

                let response = top + bottom + left + right - 4.0 * center;
                sum += response;
                sum_squares += response * response;
                count += 1;
            }
        }

        if count == 0 {
            return 0.0;
        }
        let n = count as f64;
        let mean = sum / n;
        (sum_squares / n) - mean * mean
    }

    /// Contrast (standard deviation) and brightness (mean) of the luma plane.
    fn contrast_brightness(gray: &GrayImage) -> (f64, f64) {
        let mut sum = 0.0;
        let mut sum_squares = 0.0;
        let mut count = 0u64;

        for pixel in gray.pixels() {
            let value = pixel[0] as f64;
            sum += value;
            sum_squares += value * value;
            count += 1;
        }

        if count == 0 {
            return (0.0, 128.0);
        }
        let n = count as f64;
        let mean = sum / n;
        let variance = (sum_squares / n) - mean * mean;
        (variance.max(0.0).sqrt(), mean)
    }
}

impl ScoringOracle for SharpnessOracle {
    fn analyze(
        &self,
        thumbnail: &[u8],
        from_screenshot_album: bool,
    ) -> Result<OracleScore, OracleError> {
        let image = imaging::decode_bytes(thumbnail)
            .map_err(|e| OracleError::new(format!("thumbnail undecodable: {e}")))?;
        let gray = image.to_luma8();

        let sharpness = Self::laplacian_variance(&gray);
        let (contrast, brightness) = Self::contrast_brightness(&gray);

        // Each component contributes badness on a 0-100 scale.
        let blur = 100.0 * (1.0 - (sharpness / self.sharpness_ceiling).min(1.0));
        let flatness = 100.0 * (1.0 - (contrast / 60.0).min(1.0));
        let exposure = ((brightness - 128.0).abs() / 1.28).min(100.0);

        let mut final_score = 0.6 * blur + 0.25 * flatness + 0.15 * exposure;
        if from_screenshot_album {
            final_score += self.screenshot_boost;
        }

        Ok(OracleScore {
            final_score,
            details: json!({
                "sharpness": sharpness,
                "contrast": contrast,
                "brightness": brightness,
                "from_screenshot_album": from_screenshot_album,
            }),
        })
    }
}
