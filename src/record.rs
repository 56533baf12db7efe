use crate::error::FingerprintParseError;
use serde::{Deserialize, Serialize};
use std::fmt;

/// Formats treated as lossless by the quality scorer.
pub const LOSSLESS_FORMATS: [&str; 4] = ["PNG", "TIFF", "BMP", "WEBP"];

/// A packed perceptual hash of `hash_size * hash_size` bits.
///
/// Serialized as a lowercase hex string.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(try_from = "String", into = "String")]
pub struct Fingerprint {
    bits: Vec<u8>,
}

impl Fingerprint {
    pub fn from_bytes(bits: impl Into<Vec<u8>>) -> Self {
        Self { bits: bits.into() }
    }

    pub fn from_u64(value: u64) -> Self {
        Self::from_bytes(value.to_be_bytes())
    }

    pub fn from_hex(hex: &str) -> Result<Self, FingerprintParseError> {
        let hex = hex.trim();
        if hex.len() % 2 != 0 {
            return Err(FingerprintParseError::OddLength(hex.len()));
        }
        // from_str_radix alone would accept a leading sign.
        if !hex.bytes().all(|b| b.is_ascii_hexdigit()) {
            return Err(FingerprintParseError::InvalidDigit(hex.to_string()));
        }

        let bits = (0..hex.len())
            .step_by(2)
            .map(|i| {
                hex.get(i..i + 2)
                    .and_then(|pair| u8::from_str_radix(pair, 16).ok())
                    .ok_or_else(|| FingerprintParseError::InvalidDigit(hex.to_string()))
            })
            .collect::<Result<Vec<u8>, _>>()?;

        Ok(Self { bits })
    }

    pub fn to_hex(&self) -> String {
        self.bits.iter().map(|b| format!("{:02x}", b)).collect()
    }

    pub fn as_bytes(&self) -> &[u8] {
        &self.bits
    }

    pub fn bit_len(&self) -> usize {
        self.bits.len() * 8
    }

    /// Number of differing bits. Fingerprints of unequal width are compared
    /// over their common prefix, with every extra byte counted as fully
    /// different.
    pub fn hamming(&self, other: &Fingerprint) -> u32 {
        let common: u32 = self
            .bits
            .iter()
            .zip(other.bits.iter())
            .map(|(a, b)| (a ^ b).count_ones())
            .sum();
        let extra = self.bits.len().abs_diff(other.bits.len()) as u32 * 8;
        common + extra
    }
}

impl fmt::Display for Fingerprint {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.to_hex())
    }
}

impl TryFrom<String> for Fingerprint {
    type Error = FingerprintParseError;

    fn try_from(value: String) -> Result<Self, Self::Error> {
        Self::from_hex(&value)
    }
}

impl From<Fingerprint> for String {
    fn from(value: Fingerprint) -> Self {
        value.to_hex()
    }
}

/// Fingerprints of an image in each of its four canonical orientations.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct OrientationHashes {
    pub rot0: Fingerprint,
    pub rot90: Fingerprint,
    pub rot180: Fingerprint,
    pub rot270: Fingerprint,
}

impl OrientationHashes {
    pub fn all(&self) -> [&Fingerprint; 4] {
        [&self.rot0, &self.rot90, &self.rot180, &self.rot270]
    }

    /// All four orientations set to the same fingerprint.
    pub fn uniform(hash: Fingerprint) -> Self {
        Self {
            rot0: hash.clone(),
            rot90: hash.clone(),
            rot180: hash.clone(),
            rot270: hash,
        }
    }
}

/// Everything the engine knows about one image.
///
/// Only `quality_score`, `group_id` and `is_keeper` change after the record
/// is built; they are written by the scorer once per run.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct FingerprintRecord {
    pub path: String,
    pub width: u32,
    pub height: u32,
    pub file_size: u64,
    pub format: String,
    pub bit_depth: Option<u16>,
    pub has_exif: bool,
    pub is_lossless: bool,
    pub hashes: OrientationHashes,
    pub quality_score: f64,
    pub group_id: Option<usize>,
    pub is_keeper: bool,
}

impl FingerprintRecord {
    pub fn new(
        path: impl Into<String>,
        width: u32,
        height: u32,
        file_size: u64,
        format: impl Into<String>,
        hashes: OrientationHashes,
    ) -> Self {
        let format = format.into().to_uppercase();
        let is_lossless = is_lossless_format(&format);
        Self {
            path: path.into(),
            width,
            height,
            file_size,
            format,
            bit_depth: None,
            has_exif: false,
            is_lossless,
            hashes,
            quality_score: 0.0,
            group_id: None,
            is_keeper: false,
        }
    }

    pub fn with_bit_depth(mut self, bit_depth: Option<u16>) -> Self {
        self.bit_depth = bit_depth;
        self
    }

    pub fn with_exif(mut self, has_exif: bool) -> Self {
        self.has_exif = has_exif;
        self
    }

    pub fn aspect_ratio(&self) -> f64 {
        if self.height == 0 {
            0.0
        } else {
            self.width as f64 / self.height as f64
        }
    }

    pub fn resolution(&self) -> u64 {
        self.width as u64 * self.height as u64
    }

    /// Reset the fields written by the scorer.
    pub fn clear_derived(&mut self) {
        self.quality_score = 0.0;
        self.group_id = None;
        self.is_keeper = false;
    }
}

pub fn is_lossless_format(format: &str) -> bool {
    let upper = format.to_uppercase();
    LOSSLESS_FORMATS.contains(&upper.as_str())
}
