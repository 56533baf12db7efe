use crate::error::SourceError;
use crate::exif;
use crate::record::{Fingerprint, FingerprintRecord, OrientationHashes};
use image::imageops::FilterType;
use image::{DynamicImage, GrayImage, ImageReader};
use image_hasher::{HashAlg, Hasher, HasherConfig};
use std::fs;
use std::path::Path;

/// Where decoded pixels come from.
///
/// Every failure is per image; callers skip the image and carry on.
pub trait ImageSource: Send + Sync {
    /// Describe the image at `path` and fingerprint it in all four
    /// orientations.
    fn fingerprint(&self, path: &Path) -> Result<FingerprintRecord, SourceError>;

    /// Decode the image as a `size` x `size` grayscale raster.
    fn grayscale(&self, path: &Path, size: u32) -> Result<GrayImage, SourceError>;
}

impl<S: ImageSource + ?Sized> ImageSource for &S {
    fn fingerprint(&self, path: &Path) -> Result<FingerprintRecord, SourceError> {
        (**self).fingerprint(path)
    }

    fn grayscale(&self, path: &Path, size: u32) -> Result<GrayImage, SourceError> {
        (**self).grayscale(path, size)
    }
}

/// Reads images from the local file system and hashes them with a DCT mean
/// hash (pHash).
pub struct FsImageSource {
    hash_size: u32,
    min_resolution: u32,
    hasher: Hasher,
}

impl FsImageSource {
    pub fn new(hash_size: u32, min_resolution: u32) -> Self {
        let hasher = HasherConfig::new()
            .hash_alg(HashAlg::Mean)
            .preproc_dct()
            .hash_size(hash_size, hash_size)
            .to_hasher();

        Self {
            hash_size,
            min_resolution,
            hasher,
        }
    }

    fn hash(&self, img: &DynamicImage) -> Result<Fingerprint, SourceError> {
        let hash = self.hasher.hash_image(img);
        let bits = hash.as_bytes();
        let expected = (self.hash_size * self.hash_size) as usize / 8;
        if bits.len() != expected {
            return Err(SourceError::Hashing {
                message: format!("expected {} hash bytes, got {}", expected, bits.len()),
            });
        }
        Ok(Fingerprint::from_bytes(bits))
    }

    fn orientation_hashes(&self, img: &DynamicImage) -> Result<OrientationHashes, SourceError> {
        Ok(OrientationHashes {
            rot0: self.hash(img)?,
            rot90: self.hash(&img.rotate90())?,
            rot180: self.hash(&img.rotate180())?,
            rot270: self.hash(&img.rotate270())?,
        })
    }
}

impl ImageSource for FsImageSource {
    fn fingerprint(&self, path: &Path) -> Result<FingerprintRecord, SourceError> {
        let file_size = fs::metadata(path)?.len();

        let reader = ImageReader::open(path)?.with_guessed_format()?;
        let format = reader
            .format()
            .map(|f| format!("{:?}", f).to_uppercase())
            .unwrap_or_else(|| "UNKNOWN".to_string());
        let img = reader.decode()?;

        let (width, height) = (img.width(), img.height());
        if width.min(height) < self.min_resolution {
            return Err(SourceError::BelowMinResolution {
                width,
                height,
                min: self.min_resolution,
            });
        }

        let bit_depth = Some(img.color().bits_per_pixel());
        let hashes = self.orientation_hashes(&img)?;

        Ok(FingerprintRecord::new(
            path.to_string_lossy(),
            width,
            height,
            file_size,
            format,
            hashes,
        )
        .with_bit_depth(bit_depth)
        .with_exif(exif::has_exif(path)))
    }

    fn grayscale(&self, path: &Path, size: u32) -> Result<GrayImage, SourceError> {
        let img = ImageReader::open(path)?.with_guessed_format()?.decode()?;
        Ok(img.resize_exact(size, size, FilterType::Triangle).to_luma8())
    }
}
