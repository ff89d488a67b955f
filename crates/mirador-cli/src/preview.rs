//! Terminal stand-in for a capture preview window.

use std::time::Duration;

use colored::Colorize;
use mirador_hal::Preview;
use mirador_types::{RawImage, SourceKind};

/// Prints a one-line notice per grab and holds it for `linger`.
pub struct TerminalPreview {
    linger: Duration,
}

impl TerminalPreview {
    pub fn new(linger: Duration) -> Self {
        Self { linger }
    }
}

impl Preview for TerminalPreview {
    fn show(&mut self, frame: &RawImage, source: SourceKind) {
        println!(
            "  {} {} frame {}x{}",
            "[preview]".dimmed(),
            source,
            frame.width(),
            frame.height()
        );
        std::thread::sleep(self.linger);
    }
}
