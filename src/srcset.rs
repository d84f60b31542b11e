//! Parsing and rebuilding of `srcset` attribute lists.
//!
//! The tokenization is deliberately literal-minded: entries split on `,`,
//! URL and descriptor split on whitespace, and only the first two tokens of
//! an entry are kept. A missing descriptor and the literal descriptor `0`
//! both render as empty, and an empty descriptor still leaves its trailing
//! space before the `", "` separator. These quirks match the behavior this
//! rewriter replaces; downstream consumers tolerate the extra space.

/// One `(url, descriptor)` pair out of a srcset list.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SrcSetEntry {
    pub url: String,
    /// Size or density hint (`2x`, `800w`); `None` when the entry had none.
    pub descriptor: Option<String>,
}

impl SrcSetEntry {
    pub fn new(url: impl Into<String>, descriptor: Option<String>) -> Self {
        Self {
            url: url.into(),
            descriptor,
        }
    }

    /// Descriptor as rendered: empty for `None` and for the falsy literal `0`.
    pub fn rendered_descriptor(&self) -> &str {
        match self.descriptor.as_deref() {
            Some("0") | None => "",
            Some(descriptor) => descriptor,
        }
    }
}

/// Split a srcset list into entries. Blank entries are skipped.
pub fn parse(srcset: &str) -> Vec<SrcSetEntry> {
    srcset
        .split(',')
        .filter_map(|raw| {
            let mut pieces = raw.trim().split_whitespace();
            let url = pieces.next()?;
            let descriptor = pieces.next().map(str::to_string);
            Some(SrcSetEntry::new(url, descriptor))
        })
        .collect()
}

/// Rebuild a srcset string; every entry carries the space before its
/// descriptor even when the descriptor renders empty.
pub fn render(entries: &[SrcSetEntry]) -> String {
    entries
        .iter()
        .map(|entry| format!("{} {}", entry.url, entry.rendered_descriptor()))
        .collect::<Vec<_>>()
        .join(", ")
}
