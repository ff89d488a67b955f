//! `mirador-hal` – capture devices and the image pipeline.
//!
//! # Modules
//!
//! - [`camera`] – the [`Camera`][camera::Camera] trait and
//!   [`CommandCamera`][camera::CommandCamera], a session-scoped handle that
//!   grabs single frames from a V4L2 / AVFoundation device through `ffmpeg`.
//! - [`screen`] – the [`ScreenCapture`][screen::ScreenCapture] trait and
//!   [`CommandScreen`][screen::CommandScreen], a one-shot OS screenshot tool
//!   run under a deadline. With the `native-screen` feature, `NativeScreen`
//!   captures the primary display in-process.
//! - [`preview`] – the cosmetic [`Preview`][preview::Preview] hook invoked
//!   after every successful grab.
//! - [`pipeline`] – [`ImagePipeline`][pipeline::ImagePipeline]: grab, resize,
//!   JPEG-encode, and persist a frame, degrading to
//!   [`Acquisition::Unavailable`][pipeline::Acquisition::Unavailable] instead
//!   of failing the turn.
//! - [`sim`] – in-process stub devices for tests and headless runs.

pub mod camera;
pub mod pipeline;
pub mod preview;
mod process;
pub mod screen;
pub mod sim;

pub use camera::{Camera, CommandCamera};
pub use pipeline::{Acquisition, ImagePipeline, PipelineConfig};
pub use preview::{NoPreview, Preview};
pub use process::DEFAULT_CAPTURE_TIMEOUT;
#[cfg(feature = "native-screen")]
pub use screen::NativeScreen;
pub use screen::{CommandScreen, ScreenCapture};
