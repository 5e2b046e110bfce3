//! Content-addressed, pipeline-versioned cache of transcoded card artifacts.
//!
//! Each artifact's filename is derived from `sha256(source bytes) ‖
//! transform_spec ‖ pipeline_version`, so a change to the crop/resize/encode
//! parameters invalidates old artifacts by construction rather than
//! requiring an explicit cache flush. Writes are atomic: build to a temp
//! file in the same directory, then rename, so a reader never observes a
//! partially-written artifact.

use crate::error::PipelineError;
use crate::loader::SourceRef;
use dashmap::DashMap;
use image::GenericImageView;
use std::path::Path;
use std::path::PathBuf;
use std::sync::Arc;
use talespin_core::CardFormat;
use talespin_core::Config;
use tokio::sync::Mutex;

/// Bumped whenever the crop/resize/encode algorithm changes in a way that
/// should invalidate every previously-cached artifact.
pub const PIPELINE_VERSION: u32 = 1;

#[derive(Debug, Clone, Copy)]
pub struct TransformSpec {
    pub aspect: (u32, u32),
    pub long_side: u32,
    pub format: CardFormat,
    pub pipeline_version: u32,
}

impl TransformSpec {
    pub fn from_config(config: &Config) -> Self {
        Self {
            aspect: config.card_aspect_ratio,
            long_side: config.card_long_side,
            format: config.card_format,
            pipeline_version: PIPELINE_VERSION,
        }
    }

    /// Compact tag folded into the cache filename.
    fn tag(&self) -> String {
        format!(
            "{}x{}-{}-v{}",
            self.aspect.0,
            self.aspect.1,
            self.format.tag(),
            self.pipeline_version
        )
    }

    /// Target (width, height) in pixels: the long side is fixed by config,
    /// the short side follows from the aspect ratio.
    fn target_dimensions(&self) -> (u32, u32) {
        let (aw, ah) = self.aspect;
        if aw >= ah {
            let w = self.long_side;
            let h = (w as u64 * ah as u64 / aw as u64).max(1) as u32;
            (w, h)
        } else {
            let h = self.long_side;
            let w = (h as u64 * aw as u64 / ah as u64).max(1) as u32;
            (w, h)
        }
    }
}

fn cache_key(hash: &[u8; 32], spec: &TransformSpec) -> String {
    let hex: String = hash.iter().map(|b| format!("{b:02x}")).collect();
    format!("{}_{}.{}", hex, spec.tag(), spec.format.extension())
}

/// At-most-one-build-per-fingerprint, shared disk cache of card artifacts.
pub struct CardCache {
    dir: PathBuf,
    building: DashMap<String, Arc<Mutex<()>>>,
}

impl CardCache {
    pub fn new(dir: PathBuf) -> Result<Self, PipelineError> {
        std::fs::create_dir_all(&dir).map_err(|e| PipelineError::io(&dir, e))?;
        Ok(Self {
            dir,
            building: DashMap::new(),
        })
    }

    /// Ensures a card artifact exists for `source` under `spec`, building it
    /// if absent (or if present-but-corrupt and validation is enabled).
    /// Returns the artifact's path.
    pub async fn ensure(
        &self,
        source: &SourceRef,
        spec: &TransformSpec,
        validate: bool,
    ) -> Result<PathBuf, PipelineError> {
        let hash = source.content_hash().await?;
        let key = cache_key(&hash, spec);
        let path = self.dir.join(&key);

        let lock = self
            .building
            .entry(key.clone())
            .or_insert_with(|| Arc::new(Mutex::new(())))
            .clone();
        let _guard = lock.lock().await;

        if path.exists() {
            if !validate || probe_valid(&path, spec).await {
                return Ok(path);
            }
            log::warn!("cache artifact {key} failed validation, rebuilding");
            let _ = tokio::fs::remove_file(&path).await;
        }

        let built = build_artifact(source.path.clone(), *spec).await?;
        atomic_write(&path, &built).await?;
        Ok(path)
    }
}

async fn probe_valid(path: &Path, spec: &TransformSpec) -> bool {
    let path = path.to_path_buf();
    let spec = *spec;
    tokio::task::spawn_blocking(move || {
        let Ok(img) = image::open(&path) else {
            return false;
        };
        let (w, h) = img.dimensions();
        let (tw, th) = spec.target_dimensions();
        w == tw && h == th
    })
    .await
    .unwrap_or(false)
}

/// Decodes, center-crops to the target aspect ratio, resizes, and encodes a
/// source image. Runs on a blocking thread since decode/encode are CPU-bound.
async fn build_artifact(path: PathBuf, spec: TransformSpec) -> Result<Vec<u8>, PipelineError> {
    tokio::task::spawn_blocking(move || {
        let img = image::open(&path).map_err(|e| PipelineError::Decode {
            path: path.clone(),
            reason: e.to_string(),
        })?;
        let cropped = center_crop(img, spec.aspect);
        let (tw, th) = spec.target_dimensions();
        let resized = cropped.resize_exact(tw, th, image::imageops::FilterType::Lanczos3);
        encode(&resized, spec.format)
    })
    .await
    .map_err(|e| PipelineError::Encode(e.to_string()))?
}

fn center_crop(img: image::DynamicImage, aspect: (u32, u32)) -> image::DynamicImage {
    let (w, h) = img.dimensions();
    let (aw, ah) = aspect;
    let target_h_for_w = (w as u64 * ah as u64 / aw as u64) as u32;
    let (crop_w, crop_h) = if target_h_for_w <= h {
        (w, target_h_for_w.max(1))
    } else {
        let target_w_for_h = (h as u64 * aw as u64 / ah as u64) as u32;
        (target_w_for_h.max(1).min(w), h)
    };
    let x = (w - crop_w) / 2;
    let y = (h - crop_h) / 2;
    img.crop_imm(x, y, crop_w, crop_h)
}

fn encode(img: &image::DynamicImage, format: CardFormat) -> Result<Vec<u8>, PipelineError> {
    let mut buf = Vec::new();
    let mut cursor = std::io::Cursor::new(&mut buf);
    match format {
        CardFormat::Avif { quality, speed } => {
            let encoder = image::codecs::avif::AvifEncoder::new_with_speed_quality(
                &mut cursor,
                speed,
                quality,
            );
            img.write_with_encoder(encoder)
                .map_err(|e| PipelineError::Encode(e.to_string()))?;
        }
        CardFormat::Jpeg { quality } => {
            let encoder = image::codecs::jpeg::JpegEncoder::new_with_quality(&mut cursor, quality);
            img.write_with_encoder(encoder)
                .map_err(|e| PipelineError::Encode(e.to_string()))?;
        }
    }
    Ok(buf)
}

async fn atomic_write(dest: &Path, bytes: &[u8]) -> Result<(), PipelineError> {
    let dir = dest.parent().unwrap_or_else(|| Path::new("."));
    let mut tmp = tempfile::NamedTempFile::new_in(dir).map_err(|e| PipelineError::io(dir, e))?;
    use std::io::Write;
    tmp.write_all(bytes).map_err(|e| PipelineError::io(dest, e))?;
    tmp.flush().map_err(|e| PipelineError::io(dest, e))?;
    tmp.persist(dest)
        .map_err(|e| PipelineError::io(dest, e.error))?;
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn cache_key_changes_with_pipeline_version() {
        let hash = [1u8; 32];
        let spec_v1 = TransformSpec {
            aspect: (2, 3),
            long_side: 1536,
            format: CardFormat::Avif {
                quality: 80,
                speed: 4,
            },
            pipeline_version: 1,
        };
        let mut spec_v2 = spec_v1;
        spec_v2.pipeline_version = 2;
        assert_ne!(cache_key(&hash, &spec_v1), cache_key(&hash, &spec_v2));
    }

    #[test]
    fn target_dimensions_respect_long_side_and_ratio() {
        let spec = TransformSpec {
            aspect: (2, 3),
            long_side: 1536,
            format: CardFormat::Jpeg { quality: 90 },
            pipeline_version: 1,
        };
        let (w, h) = spec.target_dimensions();
        assert_eq!(h, 1536);
        assert_eq!(w, 1024);
    }

    #[test]
    fn center_crop_preserves_target_ratio() {
        let img = image::DynamicImage::new_rgb8(400, 300);
        let cropped = center_crop(img, (2, 3));
        let (w, h) = cropped.dimensions();
        // Width-constrained source (400x300, ratio 4:3) crops down to 2:3.
        assert_eq!(w * 3, h * 2);
    }
}
