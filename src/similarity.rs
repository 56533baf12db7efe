use crate::record::FingerprintRecord;

/// Rotation-invariant distance: the minimum Hamming distance over all 16
/// pairings of the two records' orientation fingerprints.
///
/// Symmetric and zero for a record against itself, but a minimum over
/// sub-metrics, so there is no triangle inequality.
pub fn distance(a: &FingerprintRecord, b: &FingerprintRecord) -> u32 {
    let mut best = u32::MAX;
    for ha in a.hashes.all() {
        for hb in b.hashes.all() {
            best = best.min(ha.hamming(hb));
            if best == 0 {
                return 0;
            }
        }
    }
    best
}

/// A second opinion on a borderline pair, scored in -1..1 where 1 means
/// identical.
pub trait PairRefiner: Sync {
    fn similarity(&self, a: &FingerprintRecord, b: &FingerprintRecord) -> f64;
}

#[cfg(feature = "ssim")]
pub use structural::{SSIM_SIZE, StructuralSimilarity, ssim};

#[cfg(feature = "ssim")]
mod structural {
    use super::PairRefiner;
    use crate::record::FingerprintRecord;
    use crate::source::ImageSource;
    use image::GrayImage;
    use std::path::Path;

    /// Side length both images are resampled to before comparison.
    pub const SSIM_SIZE: u32 = 256;

    const WINDOW: u32 = 8;
    const STRIDE: u32 = 4;
    const C1: f64 = (0.01 * 255.0) * (0.01 * 255.0);
    const C2: f64 = (0.03 * 255.0) * (0.03 * 255.0);

    /// Mean SSIM over 8x8 windows. Both images must share dimensions; a
    /// mismatch scores 0.
    pub fn ssim(a: &GrayImage, b: &GrayImage) -> f64 {
        if a.dimensions() != b.dimensions() {
            return 0.0;
        }
        let (width, height) = a.dimensions();
        if width < WINDOW || height < WINDOW {
            return window_ssim(a, b, 0, 0, width, height);
        }

        let mut sum = 0.0;
        let mut count = 0usize;
        let mut y = 0;
        while y + WINDOW <= height {
            let mut x = 0;
            while x + WINDOW <= width {
                sum += window_ssim(a, b, x, y, WINDOW, WINDOW);
                count += 1;
                x += STRIDE;
            }
            y += STRIDE;
        }

        if count > 0 { sum / count as f64 } else { 0.0 }
    }

    fn window_ssim(a: &GrayImage, b: &GrayImage, x0: u32, y0: u32, w: u32, h: u32) -> f64 {
        let n = (w * h) as f64;
        if n == 0.0 {
            return 0.0;
        }

        let mut sum_a = 0.0;
        let mut sum_b = 0.0;
        for y in y0..y0 + h {
            for x in x0..x0 + w {
                sum_a += a.get_pixel(x, y)[0] as f64;
                sum_b += b.get_pixel(x, y)[0] as f64;
            }
        }
        let mean_a = sum_a / n;
        let mean_b = sum_b / n;

        let mut var_a = 0.0;
        let mut var_b = 0.0;
        let mut covar = 0.0;
        for y in y0..y0 + h {
            for x in x0..x0 + w {
                let da = a.get_pixel(x, y)[0] as f64 - mean_a;
                let db = b.get_pixel(x, y)[0] as f64 - mean_b;
                var_a += da * da;
                var_b += db * db;
                covar += da * db;
            }
        }
        var_a /= n;
        var_b /= n;
        covar /= n;

        let numerator = (2.0 * mean_a * mean_b + C1) * (2.0 * covar + C2);
        let denominator = (mean_a * mean_a + mean_b * mean_b + C1) * (var_a + var_b + C2);
        numerator / denominator
    }

    /// Compares decoded pixels through an [`ImageSource`].
    pub struct StructuralSimilarity<S> {
        source: S,
    }

    impl<S: ImageSource> StructuralSimilarity<S> {
        pub fn new(source: S) -> Self {
            Self { source }
        }

        fn load(&self, record: &FingerprintRecord) -> Option<GrayImage> {
            match self.source.grayscale(Path::new(&record.path), SSIM_SIZE) {
                Ok(img) => Some(img),
                Err(e) => {
                    log::warn!("SSIM computation failed for {}: {}", record.path, e);
                    None
                }
            }
        }
    }

    impl<S: ImageSource> PairRefiner for StructuralSimilarity<S> {
        fn similarity(&self, a: &FingerprintRecord, b: &FingerprintRecord) -> f64 {
            match (self.load(a), self.load(b)) {
                (Some(img_a), Some(img_b)) => ssim(&img_a, &img_b),
                _ => 0.0,
            }
        }
    }
}
