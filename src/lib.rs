//! # webpgen
//!
//! On-demand WebP variant generation for media libraries.
//!
//! The core is the [`Convertor`]: given a located image (or a srcset list of
//! them), it derives the WebP counterpart path, encodes only when the target
//! is missing or stale, and hands back the converted image with its rewritten
//! srcset. A batch [`Warmer`] walks a media root and pre-generates variants
//! in parallel so serving paths never pay the encode cost.

pub mod config;
pub mod converter;
pub mod core;
pub mod error;
pub mod image;
pub mod progress;
pub mod srcset;
pub mod stats;
pub mod utils;
pub mod warm;

// Re-export commonly used types
pub use config::Config;
pub use converter::{EncodeError, Encoder, WebpEncoder};
pub use core::Convertor;
pub use error::{ConvertorError, Result};
pub use image::{Image, ImageFactory, TargetImageFactory};
pub use progress::ProgressReporter;
pub use stats::WarmStats;
pub use warm::Warmer;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::path::PathBuf;
use std::time::Duration;

/// Compression modes for WebP conversion
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Deserialize, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum CompressionMode {
    /// Lossless compression (larger files but perfect quality)
    #[default]
    Lossless,
    /// Lossy compression (smaller files with slight quality loss)
    Lossy,
    /// Auto mode (choose per image based on source format and size)
    Auto,
}

/// Summary of a warm run
#[derive(Debug, Serialize, Deserialize, Clone)]
pub struct WarmReport {
    pub start_time: DateTime<Utc>,
    pub end_time: DateTime<Utc>,
    pub duration: Duration,
    pub root: PathBuf,
    pub scanned_files: u64,
    pub converted_files: u64,
    pub skipped_files: u64,
    pub failed_files: u64,
    pub original_size: u64,
    pub converted_size: u64,
    pub compression_ratio: f64,
    pub thread_count: usize,
    pub quality: u8,
    pub mode: String,
    pub errors: Vec<String>,
}

/// Write a warm-run report as pretty-printed JSON
pub fn generate_report(report: &WarmReport) -> anyhow::Result<()> {
    let json = serde_json::to_string_pretty(report)?;
    let report_path = "webpgen_report.json";
    std::fs::write(report_path, json)?;
    println!("Report saved to: {report_path}");
    Ok(())
}
