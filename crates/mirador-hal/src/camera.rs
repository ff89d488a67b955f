//! Generic `Camera` trait and the `ffmpeg`-backed device driver.

use std::path::{Path, PathBuf};
use std::process::Command;
use std::time::Duration;

use mirador_types::{MiradorError, RawImage, SourceKind};
use tracing::{debug, info};

use crate::pipeline::decode_rgb8;
use crate::process::{DEFAULT_CAPTURE_TIMEOUT, output_with_timeout};

/// A camera or image-capture device.
///
/// A handle is opened once per session and queried for one frame per turn.
pub trait Camera: Send {
    /// Stable identifier for this camera, e.g. `"/dev/video0"`.
    fn id(&self) -> &str;

    /// Capture and return the next available frame.
    ///
    /// # Errors
    ///
    /// Returns [`MiradorError::CaptureUnavailable`] if no frame could be
    /// read (device disconnected, busy, or the grab command failed).
    fn capture(&mut self) -> Result<RawImage, MiradorError>;
}

#[cfg(target_os = "macos")]
const FFMPEG_INPUT_FORMAT: &str = "avfoundation";
#[cfg(not(target_os = "macos"))]
const FFMPEG_INPUT_FORMAT: &str = "v4l2";

/// Grabs single PNG frames from a video device by shelling out to `ffmpeg`.
pub struct CommandCamera {
    id: String,
    device: PathBuf,
    timeout: Duration,
}

impl CommandCamera {
    /// Open the camera at `device` (e.g. `/dev/video0`, or `0` on macOS).
    ///
    /// The returned handle owns the device for the session, but no OS handle
    /// stays open between turns: every [`Camera::capture`] spawns a fresh
    /// `ffmpeg` that opens the device, grabs one frame and exits. Opening
    /// only checks that the device node exists.
    ///
    /// # Errors
    ///
    /// On Linux, returns [`MiradorError::CaptureUnavailable`] when the device
    /// node does not exist.
    pub fn open(device: impl Into<PathBuf>) -> Result<Self, MiradorError> {
        let device = device.into();
        if cfg!(target_os = "linux") && !device.exists() {
            return Err(unavailable(format!(
                "device {} not found",
                device.display()
            )));
        }
        info!(device = %device.display(), "camera opened");
        Ok(Self {
            id: device.display().to_string(),
            device,
            timeout: DEFAULT_CAPTURE_TIMEOUT,
        })
    }

    /// Kill a grab that has not finished after `timeout`.
    pub fn with_timeout(mut self, timeout: Duration) -> Self {
        self.timeout = timeout;
        self
    }

    pub fn device(&self) -> &Path {
        &self.device
    }
}

impl Camera for CommandCamera {
    fn id(&self) -> &str {
        &self.id
    }

    fn capture(&mut self) -> Result<RawImage, MiradorError> {
        let mut cmd = Command::new("ffmpeg");
        cmd.args(["-loglevel", "error", "-f", FFMPEG_INPUT_FORMAT, "-i"])
            .arg(&self.device)
            .args(["-frames:v", "1", "-f", "image2pipe", "-vcodec", "png", "-"]);
        let output = output_with_timeout(&mut cmd, self.timeout)
            .map_err(|e| unavailable(format!("failed to run ffmpeg: {e}")))?;

        if !output.status.success() || output.stdout.is_empty() {
            return Err(unavailable(format!(
                "ffmpeg exited with {}: {}",
                output.status,
                String::from_utf8_lossy(&output.stderr).trim()
            )));
        }

        debug!(camera = %self.id, bytes = output.stdout.len(), "frame grabbed");
        decode_rgb8(&output.stdout)
    }
}

impl Drop for CommandCamera {
    fn drop(&mut self) {
        debug!(camera = %self.id, "camera released");
    }
}

fn unavailable(details: String) -> MiradorError {
    MiradorError::CaptureUnavailable {
        source_kind: SourceKind::Camera,
        details,
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    struct MockCamera {
        id: String,
    }

    impl Camera for MockCamera {
        fn id(&self) -> &str {
            &self.id
        }

        fn capture(&mut self) -> Result<RawImage, MiradorError> {
            RawImage::from_rgb8(2, 2, vec![0u8; 2 * 2 * 3])
        }
    }

    #[test]
    fn mock_camera_capture() {
        let mut cam = MockCamera {
            id: "front".to_string(),
        };
        assert_eq!(cam.id(), "front");
        let frame = cam.capture().unwrap();
        assert_eq!(frame.width(), 2);
        assert_eq!(frame.height(), 2);
        assert_eq!(frame.pixels().len(), 12);
    }

    #[cfg(target_os = "linux")]
    #[test]
    fn open_missing_device_is_unavailable() {
        let result = CommandCamera::open("/dev/does-not-exist-mirador");
        assert!(matches!(
            result,
            Err(MiradorError::CaptureUnavailable {
                source_kind: SourceKind::Camera,
                ..
            })
        ));
    }

    #[cfg(target_os = "linux")]
    #[test]
    fn with_timeout_overrides_default() {
        let cam = CommandCamera::open("/dev/null")
            .unwrap()
            .with_timeout(Duration::from_millis(250));
        assert_eq!(cam.timeout, Duration::from_millis(250));
        assert_eq!(cam.device(), Path::new("/dev/null"));
    }
}
