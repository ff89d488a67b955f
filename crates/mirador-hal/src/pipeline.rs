//! [`ImagePipeline`] – grab, downsample, compress, persist.
//!
//! Every acquisition follows the same steps regardless of source:
//!
//! 1. **Grab** – one frame from the session camera or one screenshot.
//! 2. **Preview** – hand the raw frame to the configured [`Preview`].
//! 3. **Resize** – exact resize to the configured target resolution so the
//!    payload sent to the reasoning model has a bounded size.
//! 4. **Encode** – JPEG at a fixed quality.
//! 5. **Persist** – write `{prefix}_{unix_timestamp}.jpg` under the images
//!    directory.  This step is best-effort: a write failure is logged and the
//!    capture is still returned, just without a path.
//!
//! A failed grab never fails the caller; it is reported as
//! [`Acquisition::Unavailable`] so the agent loop can fall back to a canned
//! reply.

use std::fs;
use std::path::{Path, PathBuf};

use chrono::{DateTime, Utc};
use image::codecs::jpeg::JpegEncoder;
use image::imageops::FilterType;
use image::{DynamicImage, RgbImage};
use mirador_types::{CapturedImage, MiradorError, RawImage, SourceKind};
use tracing::{debug, info, instrument, warn};

use crate::camera::Camera;
use crate::preview::{NoPreview, Preview};
use crate::screen::ScreenCapture;

// ─────────────────────────────────────────────────────────────────────────────
// Configuration
// ─────────────────────────────────────────────────────────────────────────────

/// Output parameters shared by every capture.
#[derive(Debug, Clone, PartialEq)]
pub struct PipelineConfig {
    /// Directory captures are written to; created on first write.
    pub images_dir: PathBuf,
    pub target_width: u32,
    pub target_height: u32,
    /// JPEG quality, 1–100.
    pub jpeg_quality: u8,
}

impl Default for PipelineConfig {
    fn default() -> Self {
        Self {
            images_dir: PathBuf::from("images"),
            target_width: 640,
            target_height: 360,
            jpeg_quality: 75,
        }
    }
}

// ─────────────────────────────────────────────────────────────────────────────
// Acquisition result
// ─────────────────────────────────────────────────────────────────────────────

/// Outcome of [`ImagePipeline::acquire`].
#[derive(Debug)]
pub enum Acquisition {
    Captured(CapturedImage),
    Unavailable {
        source_kind: SourceKind,
        reason: String,
    },
}

// ─────────────────────────────────────────────────────────────────────────────
// ImagePipeline
// ─────────────────────────────────────────────────────────────────────────────

/// Owns the session's capture devices and turns raw frames into
/// [`CapturedImage`]s.
pub struct ImagePipeline {
    config: PipelineConfig,
    /// `None` when no camera could be opened at session start.
    camera: Option<Box<dyn Camera>>,
    screen: Box<dyn ScreenCapture>,
    preview: Box<dyn Preview>,
}

impl ImagePipeline {
    pub fn new(
        config: PipelineConfig,
        camera: Option<Box<dyn Camera>>,
        screen: Box<dyn ScreenCapture>,
    ) -> Self {
        Self {
            config,
            camera,
            screen,
            preview: Box::new(NoPreview),
        }
    }

    /// Replace the default no-op preview.
    pub fn with_preview(mut self, preview: Box<dyn Preview>) -> Self {
        self.preview = preview;
        self
    }

    pub fn config(&self) -> &PipelineConfig {
        &self.config
    }

    pub fn has_camera(&self) -> bool {
        self.camera.is_some()
    }

    /// Acquire one processed frame from `source`.
    #[instrument(skip(self))]
    pub fn acquire(&mut self, source: SourceKind) -> Acquisition {
        let raw = match self.grab(source) {
            Ok(raw) => raw,
            Err(e) => {
                warn!(source = %source, error = %e, "capture unavailable");
                return Acquisition::Unavailable {
                    source_kind: source,
                    reason: e.to_string(),
                };
            }
        };
        debug!(source = %source, width = raw.width(), height = raw.height(), "frame acquired");

        self.preview.show(&raw, source);

        let created_at = Utc::now();
        let (pixels, encoded) = match compress(
            &raw,
            self.config.target_width,
            self.config.target_height,
            self.config.jpeg_quality,
        ) {
            Ok(out) => out,
            Err(e) => {
                warn!(source = %source, error = %e, "frame could not be encoded");
                return Acquisition::Unavailable {
                    source_kind: source,
                    reason: e.to_string(),
                };
            }
        };

        let persisted_path = match persist(&encoded, &self.config.images_dir, source, created_at) {
            Ok(path) => {
                info!(path = %path.display(), bytes = encoded.len(), "capture saved");
                Some(path)
            }
            Err(e) => {
                warn!(error = %e, "capture not persisted; continuing with in-memory image");
                None
            }
        };

        Acquisition::Captured(CapturedImage {
            pixels,
            encoded,
            source_kind: source,
            persisted_path,
            created_at,
        })
    }

    fn grab(&mut self, source: SourceKind) -> Result<RawImage, MiradorError> {
        match source {
            SourceKind::Camera => match self.camera.as_mut() {
                Some(cam) => cam.capture(),
                None => Err(MiradorError::CaptureUnavailable {
                    source_kind: SourceKind::Camera,
                    details: "no camera opened for this session".to_string(),
                }),
            },
            SourceKind::Screen => self.screen.capture(),
        }
    }
}

// ─────────────────────────────────────────────────────────────────────────────
// Codec helpers
// ─────────────────────────────────────────────────────────────────────────────

/// Decode any supported image container (PNG, JPEG) into packed RGB8.
pub fn decode_rgb8(bytes: &[u8]) -> Result<RawImage, MiradorError> {
    let rgb = image::load_from_memory(bytes)
        .map_err(|e| MiradorError::Encoding(format!("failed to decode frame: {e}")))?
        .to_rgb8();
    let (width, height) = rgb.dimensions();
    RawImage::from_rgb8(width, height, rgb.into_raw())
}

/// Resize `raw` to exactly `width`×`height` and JPEG-encode it at `quality`.
///
/// Returns the resized frame together with the encoded bytes.
pub fn compress(
    raw: &RawImage,
    width: u32,
    height: u32,
    quality: u8,
) -> Result<(RawImage, Vec<u8>), MiradorError> {
    let buffer = RgbImage::from_raw(raw.width(), raw.height(), raw.pixels().to_vec())
        .ok_or_else(|| MiradorError::Encoding("frame buffer size mismatch".to_string()))?;
    let resized = DynamicImage::ImageRgb8(buffer)
        .resize_exact(width, height, FilterType::Triangle)
        .to_rgb8();

    let mut encoded = Vec::new();
    JpegEncoder::new_with_quality(&mut encoded, quality.clamp(1, 100))
        .encode_image(&resized)
        .map_err(|e| MiradorError::Encoding(format!("JPEG encode failed: {e}")))?;

    let (w, h) = resized.dimensions();
    let pixels = RawImage::from_rgb8(w, h, resized.into_raw())?;
    Ok((pixels, encoded))
}

/// `{prefix}_{unix_timestamp}.jpg`
pub fn capture_file_name(source: SourceKind, at: DateTime<Utc>) -> String {
    format!("{}_{}.jpg", source.prefix(), at.timestamp())
}

/// Write `bytes` to `dir/{prefix}_{unix_timestamp}.jpg`, creating `dir` first.
pub fn persist(
    bytes: &[u8],
    dir: &Path,
    source: SourceKind,
    at: DateTime<Utc>,
) -> Result<PathBuf, MiradorError> {
    fs::create_dir_all(dir).map_err(|e| {
        MiradorError::Persistence(format!("failed to create {}: {e}", dir.display()))
    })?;
    let path = dir.join(capture_file_name(source, at));
    fs::write(&path, bytes).map_err(|e| {
        MiradorError::Persistence(format!("failed to write {}: {e}", path.display()))
    })?;
    Ok(path)
}
