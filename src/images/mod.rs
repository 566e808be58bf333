//! Image collection with perceptual deduplication.
//!
//! Downloaded images are keyed by an 8x8 average-hash signature so that the
//! same artwork served at different sizes or compression levels collapses to
//! one stored copy. Bytes that do not decode as an image fall back to a
//! content hash.

use image::imageops::FilterType;
use reqwest::blocking::Client;
use sha2::{Digest, Sha256};
use std::collections::HashSet;
use std::time::Duration;
use tracing::{debug, warn};

const HASH_SIZE: u32 = 8;

/// Perceptual signature for image bytes. Average hash over an 8x8 grayscale
/// thumbnail; sha256 of the raw bytes when decoding fails.
pub fn signature_for(bytes: &[u8]) -> String {
    match image::load_from_memory(bytes) {
        Ok(img) => {
            let thumb = img
                .resize_exact(HASH_SIZE, HASH_SIZE, FilterType::Triangle)
                .to_luma8();
            let pixels: Vec<u64> = thumb.pixels().map(|p| p.0[0] as u64).collect();
            let mean = pixels.iter().sum::<u64>() / pixels.len() as u64;
            let mut hash: u64 = 0;
            for (i, &pixel) in pixels.iter().enumerate() {
                if pixel > mean {
                    hash |= 1 << i;
                }
            }
            format!("{:016x}", hash)
        }
        Err(_) => {
            let digest = Sha256::digest(bytes);
            format!("sha256:{:x}", digest)
        }
    }
}

/// A downloaded, deduplicated image ready for persistence.
#[derive(Debug, Clone)]
pub struct CollectedImage {
    pub url: String,
    pub signature: String,
    pub bytes: Vec<u8>,
}

pub struct ImageCollector {
    client: Client,
    max_images: usize,
}

impl ImageCollector {
    pub fn new(max_images: usize) -> Self {
        let client = Client::builder()
            .timeout(Duration::from_secs(30))
            .build()
            .unwrap_or_default();
        Self { client, max_images }
    }

    /// Download the given urls, drop perceptual duplicates and cap the result
    /// at the configured maximum. Individual download failures are logged and
    /// skipped; this never fails as a whole.
    pub fn collect(&self, urls: &[String]) -> Vec<CollectedImage> {
        let mut seen: HashSet<String> = HashSet::new();
        let mut collected = Vec::new();

        for url in urls {
            if collected.len() >= self.max_images {
                break;
            }
            let bytes = match self.download(url) {
                Ok(bytes) => bytes,
                Err(e) => {
                    warn!("Failed to download image {}: {:#}", url, e);
                    continue;
                }
            };
            if bytes.is_empty() {
                continue;
            }
            let signature = signature_for(&bytes);
            if !seen.insert(signature.clone()) {
                debug!("Skipping duplicate image {}", url);
                continue;
            }
            collected.push(CollectedImage {
                url: url.clone(),
                signature,
                bytes,
            });
        }

        collected
    }

    fn download(&self, url: &str) -> anyhow::Result<Vec<u8>> {
        let response = self.client.get(url).send()?;
        if !response.status().is_success() {
            anyhow::bail!("status {}", response.status());
        }
        Ok(response.bytes()?.to_vec())
    }

    /// Deduplicate already-downloaded images without any network access.
    pub fn dedup(&self, images: Vec<CollectedImage>) -> Vec<CollectedImage> {
        let mut seen: HashSet<String> = HashSet::new();
        images
            .into_iter()
            .filter(|img| seen.insert(img.signature.clone()))
            .take(self.max_images)
            .collect()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use image::{ImageFormat, RgbImage};
    use std::io::Cursor;

    fn png_bytes(width: u32, height: u32, pixel: [u8; 3]) -> Vec<u8> {
        let img = RgbImage::from_pixel(width, height, image::Rgb(pixel));
        let mut bytes = Vec::new();
        img.write_to(&mut Cursor::new(&mut bytes), ImageFormat::Png)
            .unwrap();
        bytes
    }

    fn gradient_png(width: u32, height: u32) -> Vec<u8> {
        let img = RgbImage::from_fn(width, height, |x, _| {
            let v = (x * 255 / width) as u8;
            image::Rgb([v, v, v])
        });
        let mut bytes = Vec::new();
        img.write_to(&mut Cursor::new(&mut bytes), ImageFormat::Png)
            .unwrap();
        bytes
    }

    #[test]
    fn test_same_image_different_sizes_share_signature() {
        let small = gradient_png(64, 64);
        let large = gradient_png(256, 256);
        assert_eq!(signature_for(&small), signature_for(&large));
    }

    #[test]
    fn test_different_images_differ() {
        let gradient = gradient_png(64, 64);
        let inverted: Vec<u8> = {
            let img = RgbImage::from_fn(64, 64, |x, _| {
                let v = 255 - (x * 255 / 64) as u8;
                image::Rgb([v, v, v])
            });
            let mut bytes = Vec::new();
            img.write_to(&mut Cursor::new(&mut bytes), ImageFormat::Png)
                .unwrap();
            bytes
        };
        assert_ne!(signature_for(&gradient), signature_for(&inverted));
    }

    #[test]
    fn test_undecodable_bytes_fall_back_to_content_hash() {
        let sig_a = signature_for(b"not an image");
        let sig_b = signature_for(b"not an image");
        let sig_c = signature_for(b"different bytes");
        assert!(sig_a.starts_with("sha256:"));
        assert_eq!(sig_a, sig_b);
        assert_ne!(sig_a, sig_c);
    }

    #[test]
    fn test_dedup_caps_at_max() {
        let collector = ImageCollector::new(2);
        let images: Vec<CollectedImage> = (0..4)
            .map(|i| CollectedImage {
                url: format!("http://example.com/{}", i),
                signature: format!("sig{}", i),
                bytes: png_bytes(8, 8, [i as u8 * 60, 0, 0]),
            })
            .collect();
        assert_eq!(collector.dedup(images).len(), 2);
    }

    #[test]
    fn test_dedup_drops_equal_signatures() {
        let collector = ImageCollector::new(10);
        let images = vec![
            CollectedImage {
                url: "a".into(),
                signature: "same".into(),
                bytes: vec![1],
            },
            CollectedImage {
                url: "b".into(),
                signature: "same".into(),
                bytes: vec![2],
            },
        ];
        let deduped = collector.dedup(images);
        assert_eq!(deduped.len(), 1);
        assert_eq!(deduped[0].url, "a");
    }
}
