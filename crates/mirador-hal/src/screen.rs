//! One-shot screen capture.

use std::fs;
use std::process::Command;
use std::time::Duration;

use mirador_types::{MiradorError, RawImage, SourceKind};
use tracing::debug;
use uuid::Uuid;

use crate::pipeline::decode_rgb8;
use crate::process::{DEFAULT_CAPTURE_TIMEOUT, output_with_timeout};

/// Placeholder substituted with the temporary output path in command args.
pub const PATH_PLACEHOLDER: &str = "{path}";

/// A stateless full-screen capture.
pub trait ScreenCapture: Send {
    /// Capture the whole screen.
    ///
    /// # Errors
    ///
    /// Returns [`MiradorError::CaptureUnavailable`] when the OS capture
    /// command fails or produces no image.
    fn capture(&self) -> Result<RawImage, MiradorError>;
}

/// Runs an external screenshot tool that writes a PNG to a temporary file.
///
/// Every argument containing [`PATH_PLACEHOLDER`] has it replaced with the
/// temporary path before the command runs. A tool still running after the
/// configured timeout is killed and the capture reported unavailable.
#[derive(Debug, Clone)]
pub struct CommandScreen {
    program: String,
    args: Vec<String>,
    timeout: Duration,
}

impl CommandScreen {
    pub fn new(program: impl Into<String>, args: Vec<String>) -> Self {
        Self {
            program: program.into(),
            args,
            timeout: DEFAULT_CAPTURE_TIMEOUT,
        }
    }

    pub fn with_timeout(mut self, timeout: Duration) -> Self {
        self.timeout = timeout;
        self
    }

    /// `screencapture` on macOS, ImageMagick `import` elsewhere.
    ///
    /// Used when the crate is built without `native-screen` and no command
    /// override is configured.
    pub fn platform_default() -> Self {
        if cfg!(target_os = "macos") {
            Self::new(
                "screencapture",
                vec!["-x".into(), "-t".into(), "png".into(), PATH_PLACEHOLDER.into()],
            )
        } else {
            Self::new(
                "import",
                vec![
                    "-window".into(),
                    "root".into(),
                    format!("png:{PATH_PLACEHOLDER}"),
                ],
            )
        }
    }
}

impl ScreenCapture for CommandScreen {
    fn capture(&self) -> Result<RawImage, MiradorError> {
        let path = std::env::temp_dir().join(format!("mirador_screen_{}.png", Uuid::new_v4()));
        let path_str = path.to_string_lossy();
        let args: Vec<String> = self
            .args
            .iter()
            .map(|a| a.replace(PATH_PLACEHOLDER, &path_str))
            .collect();

        let output = output_with_timeout(Command::new(&self.program).args(&args), self.timeout)
            .map_err(|e| {
                let _ = fs::remove_file(&path);
                unavailable(format!("failed to run {}: {e}", self.program))
            })?;

        if !output.status.success() {
            let _ = fs::remove_file(&path);
            return Err(unavailable(format!(
                "{} exited with {}: {}",
                self.program,
                output.status,
                String::from_utf8_lossy(&output.stderr).trim()
            )));
        }

        let bytes = fs::read(&path);
        let _ = fs::remove_file(&path);
        let bytes = bytes.map_err(|e| unavailable(format!("no screenshot written: {e}")))?;

        debug!(program = %self.program, bytes = bytes.len(), "screen captured");
        decode_rgb8(&bytes)
    }
}

/// Captures the primary display in-process through the `screenshots` crate.
#[cfg(feature = "native-screen")]
#[derive(Debug, Default, Clone, Copy)]
pub struct NativeScreen;

#[cfg(feature = "native-screen")]
impl NativeScreen {
    pub fn new() -> Self {
        Self
    }
}

#[cfg(feature = "native-screen")]
impl ScreenCapture for NativeScreen {
    fn capture(&self) -> Result<RawImage, MiradorError> {
        let screen = screenshots::Screen::from_point(0, 0)
            .map_err(|e| unavailable(format!("no display found: {e}")))?;
        let frame = screen
            .capture()
            .map_err(|e| unavailable(format!("display capture failed: {e}")))?;
        let (width, height) = (frame.width(), frame.height());
        debug!(width, height, "screen captured natively");
        RawImage::from_rgba8(width, height, &frame.into_raw())
    }
}

fn unavailable(details: String) -> MiradorError {
    MiradorError::CaptureUnavailable {
        source_kind: SourceKind::Screen,
        details,
    }
}
