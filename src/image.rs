//! Image value types and the factories that locate and derive them.

use std::path::{Path, PathBuf};

use crate::config::Config;
use crate::utils;

/// A located image resource: filesystem path, public URL, mimetype and an
/// optional srcset list. Immutable once constructed.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Image {
    path: PathBuf,
    url: String,
    mimetype: String,
    srcset: Option<String>,
}

impl Image {
    pub fn new(path: impl Into<PathBuf>, url: impl Into<String>, mimetype: impl Into<String>) -> Self {
        Self {
            path: path.into(),
            url: url.into(),
            mimetype: mimetype.into(),
            srcset: None,
        }
    }

    /// Attach a srcset list, consuming self (images stay immutable in place).
    pub fn with_srcset(mut self, srcset: impl Into<String>) -> Self {
        self.srcset = Some(srcset.into());
        self
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    pub fn url(&self) -> &str {
        &self.url
    }

    pub fn mimetype(&self) -> &str {
        &self.mimetype
    }

    pub fn srcset(&self) -> Option<&str> {
        self.srcset.as_deref()
    }
}

/// Resolves paths and URLs into located [`Image`] values.
///
/// URL resolution strips the configured base URL (or a leading slash) and
/// joins the remainder onto the media root; the mimetype comes from header
/// sniffing with an extension fallback.
#[derive(Debug, Clone)]
pub struct ImageFactory {
    root: PathBuf,
    base_url: Option<String>,
}

impl ImageFactory {
    pub fn new(root: impl Into<PathBuf>, base_url: Option<String>) -> Self {
        Self {
            root: root.into(),
            base_url,
        }
    }

    pub fn from_config(config: &Config) -> Self {
        Self::new(config.root.clone(), config.base_url.clone())
    }

    /// Locate an image by filesystem path, deriving its public URL from the
    /// path's position under the media root.
    pub fn create_from_path(&self, path: &Path) -> Image {
        let relative = path
            .strip_prefix(&self.root)
            .map(|rel| rel.to_string_lossy().replace('\\', "/"))
            .unwrap_or_else(|_| {
                path.file_name()
                    .map(|name| name.to_string_lossy().into_owned())
                    .unwrap_or_default()
            });

        let url = match &self.base_url {
            Some(base) => format!("{}/{}", base.trim_end_matches('/'), relative),
            None => format!("/{relative}"),
        };

        Image::new(path, url, self.mimetype_for(path))
    }

    /// Resolve a public URL back to a located image.
    pub fn create_from_url(&self, url: &str) -> Image {
        let relative = self
            .base_url
            .as_deref()
            .and_then(|base| url.strip_prefix(base))
            .unwrap_or(url)
            .trim_start_matches('/');

        let path = self.root.join(relative);
        let mimetype = self.mimetype_for(&path);
        Image::new(path, url, mimetype)
    }

    fn mimetype_for(&self, path: &Path) -> String {
        utils::detect_mimetype(path)
            .unwrap_or("application/octet-stream")
            .to_string()
    }
}

/// Derives the converted counterpart of an image for a target format.
///
/// Derivation is deterministic: the extension is substituted in both path
/// and URL, and an optional subdirectory places the variant next to (rather
/// than on top of) its source.
#[derive(Debug, Clone)]
pub struct TargetImageFactory {
    target_dir: Option<String>,
}

impl TargetImageFactory {
    pub fn new(target_dir: Option<String>) -> Self {
        Self { target_dir }
    }

    pub fn from_config(config: &Config) -> Self {
        Self::new(config.target_dir.clone())
    }

    pub fn create(&self, image: &Image, format: &str) -> Image {
        let path = self.derive_path(image.path(), format);
        let url = self.derive_url(image.url(), format);
        Image::new(path, url, format!("image/{format}"))
    }

    fn derive_path(&self, source: &Path, format: &str) -> PathBuf {
        let with_extension = source.with_extension(format);
        match (&self.target_dir, with_extension.file_name()) {
            (Some(dir), Some(file_name)) => {
                let parent = with_extension.parent().unwrap_or(Path::new(""));
                parent.join(dir).join(file_name)
            }
            _ => with_extension,
        }
    }

    fn derive_url(&self, source: &str, format: &str) -> String {
        let (dir, file) = match source.rsplit_once('/') {
            Some((dir, file)) => (Some(dir), file),
            None => (None, source),
        };

        let converted = match file.rsplit_once('.') {
            Some((stem, _)) => format!("{stem}.{format}"),
            None => format!("{file}.{format}"),
        };

        match (dir, &self.target_dir) {
            (Some(dir), Some(sub)) => format!("{dir}/{sub}/{converted}"),
            (Some(dir), None) => format!("{dir}/{converted}"),
            (None, Some(sub)) => format!("{sub}/{converted}"),
            (None, None) => converted,
        }
    }
}
