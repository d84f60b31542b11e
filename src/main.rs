use anyhow::Result;
use clap::{CommandFactory, Parser, ValueEnum};
use std::path::PathBuf;

use webpgen::{
    generate_report, CompressionMode, Config, Convertor, Warmer, WarmReport,
};

use webpgen::progress::ConsoleProgressReporter;

/// webpgen - WebP variant generator for media libraries
///
/// Converts a single image on demand or warms a whole media root in parallel
#[derive(Parser)]
#[command(name = "webpgen")]
#[command(about = "webpgen - WebP variant generator")]
#[command(version = env!("CARGO_PKG_VERSION"))]
#[command(long_about = r#"
webpgen derives WebP counterparts for JPEG and PNG images.

Point it at a single image to convert just that file, or at a directory to
warm every convertible image under it. Targets that are already fresh are
skipped, so repeated runs only pay for what changed.
"#)]
pub struct Args {
    /// Image file to convert, or directory to warm
    #[arg(short, long, value_name = "PATH")]
    pub input: PathBuf,

    /// srcset list to rewrite alongside the input image
    #[arg(long, value_name = "LIST")]
    pub srcset: Option<String>,

    /// Media root that URLs resolve against (defaults to the input directory)
    #[arg(long, value_name = "DIR")]
    pub root: Option<PathBuf>,

    /// Public URL prefix stripped during URL resolution
    #[arg(long, value_name = "URL")]
    pub base_url: Option<String>,

    /// Subdirectory (next to each source) for derived files
    #[arg(long, value_name = "DIR")]
    pub target_dir: Option<String>,

    /// WebP compression quality (0-100)
    #[arg(short, long, value_name = "QUALITY")]
    pub quality: Option<u8>,

    /// Compression mode
    #[arg(short, long, value_enum)]
    pub mode: Option<CompressionModeArg>,

    /// Number of parallel threads for warm runs (defaults to CPU core count)
    #[arg(short, long, value_name = "NUM")]
    pub threads: Option<usize>,

    /// Serve existing variants only, never create new files
    #[arg(long)]
    pub no_create: bool,

    /// Turn the feature flag off (every conversion fails with NotEnabled)
    #[arg(long)]
    pub disabled: bool,

    /// Configuration file path
    #[arg(short, long, value_name = "FILE")]
    pub config: Option<PathBuf>,

    /// Verbose output mode
    #[arg(short, long)]
    pub verbose: bool,

    /// Quiet mode (results only)
    #[arg(long, conflicts_with = "verbose")]
    pub quiet: bool,

    /// Generate a JSON report after a warm run
    #[arg(long)]
    pub report: bool,
}

#[derive(Debug, Clone, ValueEnum)]
pub enum CompressionModeArg {
    /// Lossless compression (larger files but perfect quality)
    Lossless,
    /// Lossy compression (smaller files with slight quality loss)
    Lossy,
    /// Auto mode (choose per image based on source format and size)
    Auto,
}

impl From<CompressionModeArg> for CompressionMode {
    fn from(mode: CompressionModeArg) -> Self {
        match mode {
            CompressionModeArg::Lossless => CompressionMode::Lossless,
            CompressionModeArg::Lossy => CompressionMode::Lossy,
            CompressionModeArg::Auto => CompressionMode::Auto,
        }
    }
}

fn main() -> Result<()> {
    if std::env::args().len() == 1 {
        Args::command().print_help()?;
        println!();
        std::process::exit(0);
    }

    let args = Args::parse();

    // Initialize logging
    if args.verbose {
        env_logger::Builder::from_default_env()
            .filter_level(log::LevelFilter::Debug)
            .init();
    } else if !args.quiet {
        env_logger::Builder::from_default_env()
            .filter_level(log::LevelFilter::Info)
            .init();
    }

    let config = build_config(&args)?;

    if args.input.is_dir() {
        warm_directory(&args, config)
    } else {
        convert_single(&args, config)
    }
}

/// Load the config file (explicit path, or the default location) and fold
/// the command-line overrides on top.
fn build_config(args: &Args) -> Result<Config> {
    let mut config = match &args.config {
        Some(path) => Config::load(path)?,
        None => Config::load_or_default()?,
    };

    config = config.with_root(args.root.clone().unwrap_or_else(|| {
        if args.input.is_dir() {
            args.input.clone()
        } else {
            args.input
                .parent()
                .map(PathBuf::from)
                .unwrap_or_else(|| PathBuf::from("."))
        }
    }));

    if let Some(base_url) = &args.base_url {
        config = config.with_base_url(base_url.clone());
    }
    if let Some(target_dir) = &args.target_dir {
        config = config.with_target_dir(target_dir.clone());
    }
    if let Some(quality) = args.quality {
        config = config.with_quality(quality);
    }
    if let Some(mode) = &args.mode {
        config = config.with_mode(mode.clone().into());
    }
    if args.no_create {
        config = config.with_image_creation(false);
    }
    if args.disabled {
        config = config.with_enabled(false);
    }

    config.validate()?;
    Ok(config)
}

fn convert_single(args: &Args, config: Config) -> Result<()> {
    let convertor = Convertor::new(config);
    let mut image = convertor.images().create_from_path(&args.input);
    if let Some(srcset) = &args.srcset {
        image = image.with_srcset(srcset.clone());
    }

    let target = convertor.convert_image(&image)?;

    if !args.quiet {
        println!("{} -> {}", args.input.display(), target.path().display());
        println!("url: {}", target.url());
        if let Some(srcset) = target.srcset() {
            println!("srcset: {srcset}");
        }
    }

    Ok(())
}

fn warm_directory(args: &Args, config: Config) -> Result<()> {
    let warmer = Warmer::new(config).with_threads(args.threads);

    let progress_reporter = if !args.quiet {
        Some(Box::new(ConsoleProgressReporter::new()) as Box<dyn webpgen::ProgressReporter>)
    } else {
        None
    };

    let report = warmer.run_with_progress(progress_reporter)?;

    if args.report {
        generate_report(&report)?;
    }

    if !args.quiet {
        print_results_summary(&report);
    }

    Ok(())
}

fn print_results_summary(report: &WarmReport) {
    use humansize::{format_size, DECIMAL};

    println!("\nWarm run completed");
    println!("  Converted: {} files", report.converted_files);
    if report.skipped_files > 0 {
        println!("  Skipped: {} files (already fresh)", report.skipped_files);
    }
    if report.failed_files > 0 {
        println!("  Failed: {} files", report.failed_files);
    }

    if report.original_size > 0 {
        println!("\nSpace:");
        println!(
            "  Original size: {}",
            format_size(report.original_size, DECIMAL)
        );
        println!(
            "  Converted size: {}",
            format_size(report.converted_size, DECIMAL)
        );
        println!(
            "  Saved: {:.1}%",
            (1.0 - report.compression_ratio) * 100.0
        );
    }

    println!("\nPerformance:");
    println!("  Duration: {:.1}s", report.duration.as_secs_f64());
    println!("  Threads used: {}", report.thread_count);

    if !report.errors.is_empty() && report.errors.len() <= 5 {
        println!("\nErrors:");
        for error in &report.errors {
            println!("  - {error}");
        }
    } else if report.errors.len() > 5 {
        println!(
            "\n{} errors occurred (use --report for full details)",
            report.errors.len()
        );
    }
}
