use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::{Arc, Mutex};

/// Shared counters for a warm run. Cloning is cheap; all clones update the
/// same underlying counters, so rayon workers can record concurrently.
#[derive(Debug, Clone)]
pub struct WarmStats {
    pub converted_count: Arc<AtomicU64>,
    pub skipped_count: Arc<AtomicU64>,
    pub failed_count: Arc<AtomicU64>,
    pub original_size: Arc<AtomicU64>,
    pub converted_size: Arc<AtomicU64>,
    errors: Arc<Mutex<Vec<ErrorRecord>>>,
}

#[derive(Debug, Clone)]
pub struct ErrorRecord {
    pub file_path: String,
    pub error_message: String,
}

impl WarmStats {
    pub fn new() -> Self {
        Self {
            converted_count: Arc::new(AtomicU64::new(0)),
            skipped_count: Arc::new(AtomicU64::new(0)),
            failed_count: Arc::new(AtomicU64::new(0)),
            original_size: Arc::new(AtomicU64::new(0)),
            converted_size: Arc::new(AtomicU64::new(0)),
            errors: Arc::new(Mutex::new(Vec::new())),
        }
    }

    pub fn record_conversion(&self, original_size: u64, converted_size: u64) {
        self.converted_count.fetch_add(1, Ordering::Relaxed);
        self.original_size.fetch_add(original_size, Ordering::Relaxed);
        self.converted_size.fetch_add(converted_size, Ordering::Relaxed);
    }

    pub fn record_skip(&self) {
        self.skipped_count.fetch_add(1, Ordering::Relaxed);
    }

    pub fn record_error(&self, file_path: String, error: String) {
        self.failed_count.fetch_add(1, Ordering::Relaxed);
        if let Ok(mut errors) = self.errors.lock() {
            errors.push(ErrorRecord {
                file_path,
                error_message: error,
            });
        }
    }

    /// Converted bytes per original byte; 0.0 until something converts.
    pub fn compression_ratio(&self) -> f64 {
        let original = self.original_size.load(Ordering::Relaxed) as f64;
        let converted = self.converted_size.load(Ordering::Relaxed) as f64;

        if original > 0.0 {
            converted / original
        } else {
            0.0
        }
    }

    pub fn space_saved(&self) -> u64 {
        let original = self.original_size.load(Ordering::Relaxed);
        let converted = self.converted_size.load(Ordering::Relaxed);
        original.saturating_sub(converted)
    }

    pub fn errors(&self) -> Vec<String> {
        self.errors
            .lock()
            .map(|errors| {
                errors
                    .iter()
                    .map(|e| format!("{}: {}", e.file_path, e.error_message))
                    .collect()
            })
            .unwrap_or_default()
    }

    pub fn total_files(&self) -> u64 {
        self.converted_count.load(Ordering::Relaxed)
            + self.skipped_count.load(Ordering::Relaxed)
            + self.failed_count.load(Ordering::Relaxed)
    }
}

impl Default for WarmStats {
    fn default() -> Self {
        Self::new()
    }
}
