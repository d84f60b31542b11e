use anyhow::{Context, Result};
use chrono::Utc;
use rayon::prelude::*;
use std::path::PathBuf;
use std::sync::atomic::Ordering;
use std::time::Instant;
use walkdir::WalkDir;

use crate::config::Config;
use crate::core::{is_convertible_mimetype, Convertor};
use crate::error::ConvertorError;
use crate::progress::ProgressReporter;
use crate::stats::WarmStats;
use crate::utils;
use crate::WarmReport;

/// Batch engine that walks the media root and pre-generates WebP variants,
/// so on-demand requests later find fresh targets and skip the encoder.
pub struct Warmer {
    config: Config,
    convertor: Convertor,
    stats: WarmStats,
    threads: Option<usize>,
}

impl Warmer {
    pub fn new(config: Config) -> Self {
        Self {
            convertor: Convertor::new(config.clone()),
            config,
            stats: WarmStats::new(),
            threads: None,
        }
    }

    pub fn with_threads(mut self, threads: Option<usize>) -> Self {
        self.threads = threads;
        self
    }

    /// Run the complete warm pass
    pub fn run(&self) -> Result<WarmReport> {
        self.run_with_progress(None)
    }

    /// Run the warm pass with progress reporting
    pub fn run_with_progress(
        &self,
        progress_reporter: Option<Box<dyn ProgressReporter>>,
    ) -> Result<WarmReport> {
        let start_time = Instant::now();
        let start_time_utc = Utc::now();

        // A warm run exists to create files; read-only mode has nothing to do.
        if !self.config.enabled || !self.config.allow_image_creation {
            return Err(ConvertorError::NotEnabled.into());
        }

        // Setup thread pool (only if not already initialized)
        if let Some(threads) = self.threads {
            if rayon::ThreadPoolBuilder::new()
                .num_threads(threads)
                .build_global()
                .is_err()
            {
                log::debug!("thread pool already initialized, using existing configuration");
            }
        }

        let files = self.scan_convertible_files()?;

        if let Some(reporter) = &progress_reporter {
            reporter.set_total_files(files.len());
            reporter.start_run();
        }

        self.convert_files(&files, &progress_reporter);

        if let Some(reporter) = &progress_reporter {
            reporter.finish_run();
        }

        let duration = start_time.elapsed();

        Ok(WarmReport {
            start_time: start_time_utc,
            end_time: Utc::now(),
            duration,
            root: self.config.root.clone(),
            scanned_files: files.len() as u64,
            converted_files: self.stats.converted_count.load(Ordering::Relaxed),
            skipped_files: self.stats.skipped_count.load(Ordering::Relaxed),
            failed_files: self.stats.failed_count.load(Ordering::Relaxed),
            original_size: self.stats.original_size.load(Ordering::Relaxed),
            converted_size: self.stats.converted_size.load(Ordering::Relaxed),
            compression_ratio: self.stats.compression_ratio(),
            thread_count: rayon::current_num_threads(),
            quality: self.config.quality,
            mode: format!("{:?}", self.config.mode),
            errors: self.stats.errors(),
        })
    }

    /// Walk the media root and keep files whose sniffed mimetype is
    /// convertible. Derived `.webp` files sniff as `image/webp` and drop out
    /// here, so a warm run never feeds its own output back in.
    fn scan_convertible_files(&self) -> Result<Vec<PathBuf>> {
        let mut files = Vec::new();

        for entry in WalkDir::new(&self.config.root).follow_links(false) {
            let entry = entry.context("failed to read directory entry")?;
            let path = entry.path();

            if !path.is_file() {
                continue;
            }

            let convertible = utils::detect_mimetype(path)
                .map(is_convertible_mimetype)
                .unwrap_or(false);
            if !convertible {
                continue;
            }

            files.push(path.to_path_buf());
        }

        Ok(files)
    }

    fn convert_files(
        &self,
        files: &[PathBuf],
        progress_reporter: &Option<Box<dyn ProgressReporter>>,
    ) {
        files.par_iter().for_each(|path| {
            let image = self.convertor.images().create_from_path(path);
            let target = self.convertor.target_for(&image);

            if !utils::needs_conversion(image.path(), target.path()) {
                self.stats.record_skip();
            } else {
                match self.convertor.convert_image(&image) {
                    Ok(converted) => {
                        let original_size = file_size(image.path());
                        let converted_size = file_size(converted.path());
                        self.stats.record_conversion(original_size, converted_size);

                        if let Some(reporter) = progress_reporter {
                            reporter.report_success(
                                &image.path().display().to_string(),
                                original_size,
                                converted_size,
                            );
                        }
                    }
                    Err(e) => {
                        self.stats
                            .record_error(path.display().to_string(), e.to_string());
                        log::error!("failed to convert {}: {e}", path.display());

                        if let Some(reporter) = progress_reporter {
                            reporter.report_error(&path.display().to_string(), &e.to_string());
                        }
                    }
                }
            }

            if let Some(reporter) = progress_reporter {
                reporter.update_progress(
                    (self.stats.converted_count.load(Ordering::Relaxed)
                        + self.stats.skipped_count.load(Ordering::Relaxed))
                        as usize,
                    self.stats.failed_count.load(Ordering::Relaxed) as usize,
                );
            }
        });
    }

    pub fn stats(&self) -> &WarmStats {
        &self.stats
    }
}

fn file_size(path: &std::path::Path) -> u64 {
    std::fs::metadata(path).map(|meta| meta.len()).unwrap_or(0)
}
