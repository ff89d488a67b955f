//! `mirador-types` – shared vocabulary for the Mirador workspace.
//!
//! Intents, conversation turns, captured images, token-usage records, and the
//! common [`MiradorError`] type.

use std::fmt;
use std::path::PathBuf;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use thiserror::Error;

/// The classified category of a single user turn.
///
/// Serialized with the wire labels the classification model is asked to emit
/// (`CHAT`, `CAMERA`, `SCREENSHOT`, `STOP`).
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum Intent {
    #[serde(rename = "CHAT")]
    Chat,
    #[serde(rename = "CAMERA")]
    CaptureCamera,
    #[serde(rename = "SCREENSHOT")]
    CaptureScreen,
    #[serde(rename = "STOP")]
    Stop,
}

impl Intent {
    /// Scan order used when reducing a free-text model reply to a label.
    /// The first label found in the reply wins.
    pub const PRIORITY: [Intent; 4] = [
        Intent::Chat,
        Intent::CaptureCamera,
        Intent::CaptureScreen,
        Intent::Stop,
    ];

    /// The literal token the classification model is asked to emit.
    pub fn label(self) -> &'static str {
        match self {
            Intent::Chat => "CHAT",
            Intent::CaptureCamera => "CAMERA",
            Intent::CaptureScreen => "SCREENSHOT",
            Intent::Stop => "STOP",
        }
    }

    /// The capture source this intent dispatches to, if any.
    pub fn source_kind(self) -> Option<SourceKind> {
        match self {
            Intent::CaptureCamera => Some(SourceKind::Camera),
            Intent::CaptureScreen => Some(SourceKind::Screen),
            Intent::Chat | Intent::Stop => None,
        }
    }
}

impl fmt::Display for Intent {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.label())
    }
}

/// Who produced a [`Turn`].
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum Speaker {
    User,
    Agent,
}

impl fmt::Display for Speaker {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Speaker::User => f.write_str("User"),
            Speaker::Agent => f.write_str("Agent"),
        }
    }
}

/// One entry of the conversation log.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Turn {
    pub speaker: Speaker,
    pub text: String,
}

impl Turn {
    pub fn user(text: impl Into<String>) -> Self {
        Self {
            speaker: Speaker::User,
            text: text.into(),
        }
    }

    pub fn agent(text: impl Into<String>) -> Self {
        Self {
            speaker: Speaker::Agent,
            text: text.into(),
        }
    }
}

impl fmt::Display for Turn {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}: {}", self.speaker, self.text)
    }
}

/// Which device a capture came from.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum SourceKind {
    Camera,
    Screen,
}

impl SourceKind {
    /// File-name prefix used when persisting captures from this source.
    pub fn prefix(self) -> &'static str {
        match self {
            SourceKind::Camera => "camera",
            SourceKind::Screen => "screen",
        }
    }
}

impl fmt::Display for SourceKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.prefix())
    }
}

/// A decoded, packed RGB8 frame.
///
/// This is the only pixel representation shared between capture drivers, the
/// compression pipeline, and the model clients.
#[derive(Clone, PartialEq, Eq)]
pub struct RawImage {
    width: u32,
    height: u32,
    pixels: Vec<u8>,
}

impl RawImage {
    /// Wrap a packed RGB8 buffer.
    ///
    /// # Errors
    ///
    /// Returns [`MiradorError::Encoding`] if the buffer length is not
    /// `width * height * 3` or either dimension is zero.
    pub fn from_rgb8(width: u32, height: u32, pixels: Vec<u8>) -> Result<Self, MiradorError> {
        let expected = width as usize * height as usize * 3;
        if width == 0 || height == 0 || pixels.len() != expected {
            return Err(MiradorError::Encoding(format!(
                "RGB8 buffer of {} bytes does not match {width}x{height}",
                pixels.len()
            )));
        }
        Ok(Self {
            width,
            height,
            pixels,
        })
    }

    pub fn width(&self) -> u32 {
        self.width
    }

    pub fn height(&self) -> u32 {
        self.height
    }

    pub fn pixels(&self) -> &[u8] {
        &self.pixels
    }

    /// Wrap a packed RGBA8 buffer, dropping the alpha channel.
    ///
    /// # Errors
    ///
    /// Returns [`MiradorError::Encoding`] if the buffer length is not
    /// `width * height * 4` or either dimension is zero.
    pub fn from_rgba8(width: u32, height: u32, rgba: &[u8]) -> Result<Self, MiradorError> {
        if rgba.len() != width as usize * height as usize * 4 {
            return Err(MiradorError::Encoding(format!(
                "RGBA8 buffer of {} bytes does not match {width}x{height}",
                rgba.len()
            )));
        }
        let pixels = rgba
            .chunks_exact(4)
            .flat_map(|px| [px[0], px[1], px[2]])
            .collect();
        Self::from_rgb8(width, height, pixels)
    }
}

impl fmt::Debug for RawImage {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("RawImage")
            .field("width", &self.width)
            .field("height", &self.height)
            .field("bytes", &self.pixels.len())
            .finish()
    }
}

/// A frame that went through the capture pipeline: resized, compressed, and
/// (best-effort) written to disk.
#[derive(Debug, Clone)]
pub struct CapturedImage {
    /// The resized frame.
    pub pixels: RawImage,
    /// JPEG bytes sent to the reasoning model.
    pub encoded: Vec<u8>,
    pub source_kind: SourceKind,
    /// `None` when persisting the capture failed.
    pub persisted_path: Option<PathBuf>,
    pub created_at: DateTime<Utc>,
}

impl CapturedImage {
    pub const MIME_TYPE: &'static str = "image/jpeg";

    /// Drop the pixel buffers and keep only the on-disk reference.
    pub fn release(self) -> Option<PathBuf> {
        self.persisted_path
    }
}

/// One line of the token-usage log.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TokenUsageRecord {
    pub timestamp: DateTime<Utc>,
    pub action: String,
    pub input_tokens_est: usize,
    pub output_tokens_est: usize,
    pub total_tokens_est: usize,
}

/// Errors shared by the capture, pipeline, and configuration layers.
#[derive(Error, Debug)]
pub enum MiradorError {
    #[error("{source_kind} capture unavailable: {details}")]
    CaptureUnavailable {
        source_kind: SourceKind,
        details: String,
    },

    #[error("Image encoding error: {0}")]
    Encoding(String),

    #[error("Persistence error: {0}")]
    Persistence(String),

    #[error("Invalid configuration: {0}")]
    InvalidConfig(String),
}
