//! Append-only token usage log.
//!
//! Token counts are rough estimates (one token per four characters) since the
//! model servers do not report usage consistently.  Each model call appends
//! one JSON object per line:
//!
//! ```text
//! {"timestamp":"2026-01-01T12:00:00Z","action":"CHAT","input_tokens_est":42,"output_tokens_est":9,"total_tokens_est":51}
//! ```

use std::fs::{self, OpenOptions};
use std::io::Write;
use std::path::{Path, PathBuf};

use chrono::Utc;
use mirador_types::TokenUsageRecord;
use thiserror::Error;

/// Errors that can arise when writing the usage log.
#[derive(Error, Debug)]
pub enum UsageLogError {
    #[error("I/O error on {path}: {source}")]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },
    #[error("Serialization error: {0}")]
    Serialization(#[from] serde_json::Error),
}

/// Estimate the token count of `text`: zero for empty text, otherwise at
/// least one.
pub fn estimate_tokens(text: &str) -> usize {
    if text.is_empty() {
        return 0;
    }
    (text.chars().count() / 4).max(1)
}

/// Handle to an NDJSON usage log.  Cheap to clone; the file is opened per
/// record.
#[derive(Debug, Clone)]
pub struct TokenUsageLog {
    path: PathBuf,
}

impl TokenUsageLog {
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self { path: path.into() }
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    /// Estimate usage for one model call and append it to the log.
    pub fn record(
        &self,
        action: &str,
        prompt: &str,
        reply: &str,
    ) -> Result<TokenUsageRecord, UsageLogError> {
        let input_tokens_est = estimate_tokens(prompt);
        let output_tokens_est = estimate_tokens(reply);
        let record = TokenUsageRecord {
            timestamp: Utc::now(),
            action: action.to_string(),
            input_tokens_est,
            output_tokens_est,
            total_tokens_est: input_tokens_est + output_tokens_est,
        };
        self.append(&record)?;
        Ok(record)
    }

    fn append(&self, record: &TokenUsageRecord) -> Result<(), UsageLogError> {
        let mut line = serde_json::to_string(record)?;
        line.push('\n');

        let io_err = |source| UsageLogError::Io {
            path: self.path.clone(),
            source,
        };
        if let Some(parent) = self.path.parent().filter(|p| !p.as_os_str().is_empty()) {
            fs::create_dir_all(parent).map_err(io_err)?;
        }
        OpenOptions::new()
            .create(true)
            .append(true)
            .open(&self.path)
            .and_then(|mut f| f.write_all(line.as_bytes()))
            .map_err(io_err)
    }
}
