//! Cosmetic capture preview hook.

use mirador_types::{RawImage, SourceKind};

/// Shown once per successful grab, before compression.
///
/// Implementations must return within a fixed, short duration; the pipeline
/// does not continue until `show` returns.
pub trait Preview: Send {
    fn show(&mut self, frame: &RawImage, source: SourceKind);
}

/// Headless deployments: no preview at all.
#[derive(Debug, Default, Clone, Copy)]
pub struct NoPreview;

impl Preview for NoPreview {
    fn show(&mut self, _frame: &RawImage, _source: SourceKind) {}
}
