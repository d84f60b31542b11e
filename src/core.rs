use std::path::Path;

use crate::config::Config;
use crate::converter::{EncodeError, Encoder, WebpEncoder};
use crate::error::{ConvertorError, Result};
use crate::image::{Image, ImageFactory, TargetImageFactory};
use crate::srcset::{self, SrcSetEntry};
use crate::utils;

/// Mimetypes eligible for conversion. `image/jpg` is non-standard but still
/// arrives from legacy upstream metadata.
const CONVERTIBLE_MIMETYPES: &[&str] = &["image/jpeg", "image/jpg", "image/png"];

const TARGET_FORMAT: &str = "webp";

/// Whether a mimetype is eligible for WebP conversion.
pub fn is_convertible_mimetype(mimetype: &str) -> bool {
    CONVERTIBLE_MIMETYPES.contains(&mimetype)
}

/// On-demand image variant converter.
///
/// Validates that conversion applies, derives the target path, invokes the
/// encoder only when the target is missing or stale, and rewrites srcset
/// lists entry by entry. One conversion request at a time; concurrent
/// requests for the same source may both encode and race benignly on the
/// target path (last write wins).
pub struct Convertor {
    config: Config,
    encoder: Box<dyn Encoder>,
    images: ImageFactory,
    targets: TargetImageFactory,
}

impl Convertor {
    /// Create a convertor backed by the production WebP encoder.
    pub fn new(config: Config) -> Self {
        let encoder = Box::new(WebpEncoder::from_config(&config));
        Self::with_encoder(config, encoder)
    }

    /// Create a convertor with a caller-supplied encoder.
    pub fn with_encoder(config: Config, encoder: Box<dyn Encoder>) -> Self {
        let images = ImageFactory::from_config(&config);
        let targets = TargetImageFactory::from_config(&config);
        Self {
            config,
            encoder,
            images,
            targets,
        }
    }

    pub fn images(&self) -> &ImageFactory {
        &self.images
    }

    /// Derive the WebP counterpart of an image without converting it.
    pub fn target_for(&self, image: &Image) -> Image {
        self.targets.create(image, TARGET_FORMAT)
    }

    /// Convert an image to its WebP counterpart.
    ///
    /// Fails fast on the feature flag and the mimetype gate before touching
    /// the filesystem. A soft-rejected encode is still a success when a
    /// previously generated target file satisfies the request.
    pub fn convert_image(&self, image: &Image) -> Result<Image> {
        if !self.config.enabled {
            return Err(ConvertorError::NotEnabled);
        }

        if !is_convertible_mimetype(image.mimetype()) {
            return Err(ConvertorError::UnsupportedMimetype(
                image.mimetype().to_string(),
            ));
        }

        let target = self.targets.create(image, TARGET_FORMAT);
        let converted = self.convert_if_needed(image.path(), target.path())?;

        if !converted && !utils::file_exists(target.path()) {
            return Err(ConvertorError::ConversionMissing(
                target.path().to_path_buf(),
            ));
        }

        let rewritten = self.convert_srcset(image)?;
        if rewritten.is_empty() {
            Ok(target)
        } else {
            Ok(target.with_srcset(rewritten))
        }
    }

    /// Run the encoder for `source` unless the target is already fresh.
    ///
    /// Returns `false` when the encoder soft-rejects the input; the caller
    /// decides whether an existing file still satisfies the request. Hard
    /// encoder failures propagate as [`ConvertorError::ConversionFailed`].
    pub fn convert_if_needed(&self, source: &Path, target: &Path) -> Result<bool> {
        if !utils::file_exists(source) {
            return Err(ConvertorError::SourceMissing(source.to_path_buf()));
        }

        if !utils::needs_conversion(source, target) {
            log::debug!("target {} is fresh, skipping encode", target.display());
            return Ok(true);
        }

        // Re-checked here: read-only mode serves existing variants but never
        // creates new ones.
        if !self.config.enabled || !self.config.allow_image_creation {
            return Err(ConvertorError::NotEnabled);
        }

        match self.encoder.encode(source, target) {
            Ok(()) => {
                log::info!("converted {} -> {}", source.display(), target.display());
                Ok(true)
            }
            Err(EncodeError::Rejected(reason)) => {
                log::debug!("encoder rejected {}: {reason}", source.display());
                Ok(false)
            }
            Err(EncodeError::Failed(message)) => Err(ConvertorError::ConversionFailed {
                target: target.to_path_buf(),
                message,
            }),
        }
    }

    /// Rewrite an image's srcset list; empty string when it has none.
    pub fn convert_srcset(&self, image: &Image) -> Result<String> {
        match image.srcset() {
            Some(value) => self.rewrite_srcset(value),
            None => Ok(String::new()),
        }
    }

    /// Rewrite a raw srcset list, converting every referenced URL.
    pub fn rewrite_srcset(&self, value: &str) -> Result<String> {
        let entries = srcset::parse(value);
        let mut rewritten = Vec::with_capacity(entries.len());

        for entry in entries {
            let source = self.images.create_from_url(&entry.url);
            let target = self.targets.create(&source, TARGET_FORMAT);
            let converted = self.convert_if_needed(source.path(), target.path())?;

            if !converted && !utils::file_exists(target.path()) {
                return Err(ConvertorError::ConversionMissing(
                    target.path().to_path_buf(),
                ));
            }

            rewritten.push(SrcSetEntry::new(target.url(), entry.descriptor));
        }

        Ok(srcset::render(&rewritten))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::fs::File;
    use std::path::PathBuf;
    use std::sync::atomic::{AtomicUsize, Ordering};
    use std::sync::Arc;
    use std::time::{Duration, SystemTime};

    #[derive(Clone, Copy)]
    enum MockBehavior {
        Succeed,
        Reject,
        Fail,
    }

    /// Encoder double that records calls and writes a placeholder target on
    /// success, so freshness checks behave like the real thing.
    struct MockEncoder {
        behavior: MockBehavior,
        calls: Arc<AtomicUsize>,
    }

    impl MockEncoder {
        fn new(behavior: MockBehavior) -> (Self, Arc<AtomicUsize>) {
            let calls = Arc::new(AtomicUsize::new(0));
            (
                Self {
                    behavior,
                    calls: calls.clone(),
                },
                calls,
            )
        }
    }

    impl Encoder for MockEncoder {
        fn encode(&self, _source: &Path, target: &Path) -> std::result::Result<(), EncodeError> {
            self.calls.fetch_add(1, Ordering::SeqCst);
            match self.behavior {
                MockBehavior::Succeed => {
                    std::fs::write(target, b"webp").unwrap();
                    Ok(())
                }
                MockBehavior::Reject => Err(EncodeError::Rejected("not an image".to_string())),
                MockBehavior::Fail => Err(EncodeError::Failed("encoder exploded".to_string())),
            }
        }
    }

    fn convertor_in(
        root: &Path,
        behavior: MockBehavior,
        config: Config,
    ) -> (Convertor, Arc<AtomicUsize>) {
        let (encoder, calls) = MockEncoder::new(behavior);
        let convertor = Convertor::with_encoder(config.with_root(root), Box::new(encoder));
        (convertor, calls)
    }

    fn seed_file(path: &Path, age: Duration) {
        std::fs::write(path, b"bytes").unwrap();
        File::options()
            .write(true)
            .open(path)
            .unwrap()
            .set_modified(SystemTime::now() - age)
            .unwrap();
    }

    fn jpeg_image(root: &Path, name: &str) -> Image {
        Image::new(root.join(name), format!("/{name}"), "image/jpeg")
    }

    #[test]
    fn unsupported_mimetype_fails_without_encoder_call() {
        let dir = tempfile::tempdir().unwrap();
        let (convertor, calls) = convertor_in(dir.path(), MockBehavior::Succeed, Config::default());

        let image = Image::new(dir.path().join("anim.gif"), "/anim.gif", "image/gif");
        let err = convertor.convert_image(&image).unwrap_err();

        assert!(matches!(err, ConvertorError::UnsupportedMimetype(m) if m == "image/gif"));
        assert_eq!(calls.load(Ordering::SeqCst), 0);
    }

    #[test]
    fn disabled_feature_fails_regardless_of_input() {
        let dir = tempfile::tempdir().unwrap();
        let config = Config::default().with_enabled(false);
        let (convertor, calls) = convertor_in(dir.path(), MockBehavior::Succeed, config);

        // Path does not even exist; the flag is checked first.
        let image = jpeg_image(dir.path(), "a.jpg");
        let err = convertor.convert_image(&image).unwrap_err();

        assert!(matches!(err, ConvertorError::NotEnabled));
        assert_eq!(calls.load(Ordering::SeqCst), 0);
    }

    #[test]
    fn missing_source_fails_before_encoder() {
        let dir = tempfile::tempdir().unwrap();
        let (convertor, calls) = convertor_in(dir.path(), MockBehavior::Succeed, Config::default());

        let source = dir.path().join("ghost.jpg");
        let err = convertor
            .convert_if_needed(&source, &dir.path().join("ghost.webp"))
            .unwrap_err();

        assert!(matches!(err, ConvertorError::SourceMissing(p) if p == source));
        assert_eq!(calls.load(Ordering::SeqCst), 0);
    }

    #[test]
    fn repeated_conversion_encodes_at_most_once() {
        let dir = tempfile::tempdir().unwrap();
        let (convertor, calls) = convertor_in(dir.path(), MockBehavior::Succeed, Config::default());

        let source = dir.path().join("a.jpg");
        let target = dir.path().join("a.webp");
        seed_file(&source, Duration::from_secs(60));

        assert!(convertor.convert_if_needed(&source, &target).unwrap());
        assert!(convertor.convert_if_needed(&source, &target).unwrap());
        assert_eq!(calls.load(Ordering::SeqCst), 1);
    }

    #[test]
    fn soft_reject_with_preseeded_target_succeeds() {
        let dir = tempfile::tempdir().unwrap();
        let (convertor, calls) = convertor_in(dir.path(), MockBehavior::Reject, Config::default());

        let image = jpeg_image(dir.path(), "a.jpg");
        seed_file(image.path(), Duration::ZERO);
        // Stale pre-seeded target: conversion is attempted, rejected, and the
        // existing file still satisfies the request.
        seed_file(&dir.path().join("a.webp"), Duration::from_secs(120));

        let target = convertor.convert_image(&image).unwrap();
        assert_eq!(target.path(), dir.path().join("a.webp"));
        assert_eq!(target.url(), "/a.webp");
        assert_eq!(calls.load(Ordering::SeqCst), 1);
    }

    #[test]
    fn soft_reject_without_target_names_the_missing_path() {
        let dir = tempfile::tempdir().unwrap();
        let (convertor, _) = convertor_in(dir.path(), MockBehavior::Reject, Config::default());

        let image = jpeg_image(dir.path(), "a.jpg");
        seed_file(image.path(), Duration::ZERO);

        let err = convertor.convert_image(&image).unwrap_err();
        let expected = dir.path().join("a.webp");
        assert!(matches!(&err, ConvertorError::ConversionMissing(p) if *p == expected));
        assert!(err.to_string().contains(&expected.display().to_string()));
    }

    #[test]
    fn hard_failure_propagates_with_target_path() {
        let dir = tempfile::tempdir().unwrap();
        let (convertor, _) = convertor_in(dir.path(), MockBehavior::Fail, Config::default());

        let image = jpeg_image(dir.path(), "a.jpg");
        seed_file(image.path(), Duration::ZERO);

        let err = convertor.convert_image(&image).unwrap_err();
        match err {
            ConvertorError::ConversionFailed { target, message } => {
                assert_eq!(target, dir.path().join("a.webp"));
                assert_eq!(message, "encoder exploded");
            }
            other => panic!("expected ConversionFailed, got {other:?}"),
        }
    }

    #[test]
    fn read_only_mode_serves_fresh_target_without_encoding() {
        let dir = tempfile::tempdir().unwrap();
        let config = Config::default().with_image_creation(false);
        let (convertor, calls) = convertor_in(dir.path(), MockBehavior::Succeed, config);

        let source = dir.path().join("a.jpg");
        let target = dir.path().join("a.webp");
        seed_file(&source, Duration::from_secs(60));
        seed_file(&target, Duration::ZERO);

        assert!(convertor.convert_if_needed(&source, &target).unwrap());
        assert_eq!(calls.load(Ordering::SeqCst), 0);
    }

    #[test]
    fn read_only_mode_refuses_to_create_new_targets() {
        let dir = tempfile::tempdir().unwrap();
        let config = Config::default().with_image_creation(false);
        let (convertor, calls) = convertor_in(dir.path(), MockBehavior::Succeed, config);

        let source = dir.path().join("a.jpg");
        seed_file(&source, Duration::ZERO);

        let err = convertor
            .convert_if_needed(&source, &dir.path().join("a.webp"))
            .unwrap_err();
        assert!(matches!(err, ConvertorError::NotEnabled));
        assert_eq!(calls.load(Ordering::SeqCst), 0);
    }

    #[test]
    fn srcset_round_trip_rewrites_urls_and_keeps_descriptors() {
        let dir = tempfile::tempdir().unwrap();
        let (convertor, _) = convertor_in(dir.path(), MockBehavior::Succeed, Config::default());

        seed_file(&dir.path().join("a.jpg"), Duration::ZERO);
        seed_file(&dir.path().join("b.jpg"), Duration::ZERO);

        let image = jpeg_image(dir.path(), "a.jpg").with_srcset("/a.jpg 1x, /b.jpg 2x");
        let target = convertor.convert_image(&image).unwrap();

        assert_eq!(target.srcset(), Some("/a.webp 1x, /b.webp 2x"));
        assert!(dir.path().join("b.webp").exists());
    }

    #[test]
    fn srcset_missing_descriptor_keeps_trailing_space() {
        let dir = tempfile::tempdir().unwrap();
        let (convertor, _) = convertor_in(dir.path(), MockBehavior::Succeed, Config::default());

        seed_file(&dir.path().join("a.jpg"), Duration::ZERO);
        let rewritten = convertor.rewrite_srcset("/a.jpg").unwrap();
        assert_eq!(rewritten, "/a.webp ");
    }

    #[test]
    fn srcset_entry_with_missing_source_fails() {
        let dir = tempfile::tempdir().unwrap();
        let (convertor, _) = convertor_in(dir.path(), MockBehavior::Succeed, Config::default());

        let err = convertor.rewrite_srcset("/ghost.jpg 2x").unwrap_err();
        assert!(matches!(err, ConvertorError::SourceMissing(_)));
    }

    #[test]
    fn image_without_srcset_converts_to_target_without_one() {
        let dir = tempfile::tempdir().unwrap();
        let (convertor, _) = convertor_in(dir.path(), MockBehavior::Succeed, Config::default());

        let image = jpeg_image(dir.path(), "a.jpg");
        seed_file(image.path(), Duration::ZERO);

        let target = convertor.convert_image(&image).unwrap();
        assert_eq!(target.srcset(), None);
        assert_eq!(target.mimetype(), "image/webp");
    }

    #[test]
    fn real_encoder_converts_image_and_srcset_end_to_end() {
        let dir = tempfile::tempdir().unwrap();
        for name in ["a.png", "b.png"] {
            let mut img = image::RgbaImage::new(6, 6);
            for pixel in img.pixels_mut() {
                *pixel = image::Rgba([30, 60, 90, 255]);
            }
            img.save(dir.path().join(name)).unwrap();
        }

        let convertor = Convertor::new(Config::default().with_root(dir.path()));
        let image = convertor
            .images()
            .create_from_path(&dir.path().join("a.png"))
            .with_srcset("/a.png 1x, /b.png 2x");

        let target = convertor.convert_image(&image).unwrap();
        assert_eq!(utils::detect_mimetype(target.path()), Some("image/webp"));
        assert_eq!(target.srcset(), Some("/a.webp 1x, /b.webp 2x"));
        assert!(dir.path().join("b.webp").exists());
    }

    #[test]
    fn target_dir_config_routes_derived_files() {
        let dir = tempfile::tempdir().unwrap();
        let config = Config::default().with_target_dir("variants");
        let (convertor, _) = convertor_in(dir.path(), MockBehavior::Succeed, config);

        let image = jpeg_image(dir.path(), "a.jpg");
        seed_file(image.path(), Duration::ZERO);
        std::fs::create_dir_all(dir.path().join("variants")).unwrap();

        let target = convertor.convert_image(&image).unwrap();
        let expected: PathBuf = dir.path().join("variants").join("a.webp");
        assert_eq!(target.path(), expected);
        assert!(expected.exists());
    }
}
