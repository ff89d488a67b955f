//! In-process simulated devices for tests and headless runs.
//!
//! Both drivers return a solid-colour frame and count how many times they
//! were asked for one.  Disconnected / failing variants model hardware that
//! is present in the configuration but never produces a frame.
//!
//! # Example
//!
//! ```rust
//! use mirador_hal::camera::Camera;
//! use mirador_hal::sim::SimCamera;
//!
//! let mut cam = SimCamera::new("front");
//! let frame = cam.capture().expect("sim camera always succeeds");
//! assert_eq!(frame.width(), 1280);
//! ```

use std::sync::Arc;
use std::sync::atomic::{AtomicUsize, Ordering};

use mirador_types::{MiradorError, RawImage, SourceKind};

use crate::camera::Camera;
use crate::screen::ScreenCapture;

const SIM_WIDTH: u32 = 1280;
const SIM_HEIGHT: u32 = 720;

fn solid_frame(width: u32, height: u32, rgb: [u8; 3]) -> Result<RawImage, MiradorError> {
    let pixels = rgb
        .iter()
        .copied()
        .cycle()
        .take(width as usize * height as usize * 3)
        .collect();
    RawImage::from_rgb8(width, height, pixels)
}

// ────────────────────────────────────────────────────────────────────────────
// Camera
// ────────────────────────────────────────────────────────────────────────────

/// A simulated camera.
pub struct SimCamera {
    id: String,
    width: u32,
    height: u32,
    connected: bool,
    captures: Arc<AtomicUsize>,
}

impl SimCamera {
    /// A connected 1280×720 camera.
    pub fn new(id: impl Into<String>) -> Box<Self> {
        Box::new(Self {
            id: id.into(),
            width: SIM_WIDTH,
            height: SIM_HEIGHT,
            connected: true,
            captures: Arc::new(AtomicUsize::new(0)),
        })
    }

    /// A camera whose every read fails.
    pub fn disconnected(id: impl Into<String>) -> Box<Self> {
        let mut cam = Self::new(id);
        cam.connected = false;
        cam
    }

    pub fn with_size(mut self: Box<Self>, width: u32, height: u32) -> Box<Self> {
        self.width = width;
        self.height = height;
        self
    }

    /// Shared counter of capture attempts, usable after the camera has been
    /// moved into a pipeline.
    pub fn capture_counter(&self) -> Arc<AtomicUsize> {
        Arc::clone(&self.captures)
    }
}

impl Camera for SimCamera {
    fn id(&self) -> &str {
        &self.id
    }

    fn capture(&mut self) -> Result<RawImage, MiradorError> {
        self.captures.fetch_add(1, Ordering::SeqCst);
        if !self.connected {
            return Err(MiradorError::CaptureUnavailable {
                source_kind: SourceKind::Camera,
                details: format!("sim camera {} is disconnected", self.id),
            });
        }
        solid_frame(self.width, self.height, [32, 96, 160])
    }
}

// ────────────────────────────────────────────────────────────────────────────
// Screen
// ────────────────────────────────────────────────────────────────────────────

/// A simulated display.
pub struct SimScreen {
    width: u32,
    height: u32,
    failing: bool,
}

impl SimScreen {
    /// A 1920×1080 display.
    pub fn new() -> Box<Self> {
        Box::new(Self {
            width: 1920,
            height: 1080,
            failing: false,
        })
    }

    /// A display whose capture command always fails.
    pub fn failing() -> Box<Self> {
        Box::new(Self {
            width: 1920,
            height: 1080,
            failing: true,
        })
    }
}

impl ScreenCapture for SimScreen {
    fn capture(&self) -> Result<RawImage, MiradorError> {
        if self.failing {
            return Err(MiradorError::CaptureUnavailable {
                source_kind: SourceKind::Screen,
                details: "sim screen capture failed".to_string(),
            });
        }
        solid_frame(self.width, self.height, [240, 240, 240])
    }
}
