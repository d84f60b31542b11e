use std::fs::File;
use std::io::Read;
use std::path::Path;
use std::time::SystemTime;

/// Magic number signatures, keyed by the mimetype they identify
const MIME_SIGNATURES: &[(&str, &[&[u8]])] = &[
    ("image/jpeg", &[&[0xFF, 0xD8]]),
    (
        "image/png",
        &[&[0x89, 0x50, 0x4E, 0x47, 0x0D, 0x0A, 0x1A, 0x0A]],
    ),
    ("image/gif", &[b"GIF87a", b"GIF89a"]),
    ("image/bmp", &[b"BM"]),
    (
        "image/tiff",
        &[&[0x49, 0x49, 0x2A, 0x00], &[0x4D, 0x4D, 0x00, 0x2A]],
    ),
    ("image/webp", &[]), // RIFF container, needs special handling
];

/// Longest header any signature needs (RIFF....WEBP)
const HEADER_LEN: usize = 12;

pub fn file_exists(path: &Path) -> bool {
    path.exists()
}

/// Whether the target is absent or older than its source.
///
/// Equal or newer target mtime means the prior conversion still stands;
/// unreadable metadata counts as stale so the encoder gets another chance.
pub fn needs_conversion(source: &Path, target: &Path) -> bool {
    if !target.exists() {
        return true;
    }

    match (modified_time(source), modified_time(target)) {
        (Some(source_mtime), Some(target_mtime)) => target_mtime < source_mtime,
        _ => true,
    }
}

fn modified_time(path: &Path) -> Option<SystemTime> {
    std::fs::metadata(path).and_then(|meta| meta.modified()).ok()
}

/// Sniff a file's mimetype from its magic bytes, falling back to the
/// extension when the header is unreadable or unrecognized.
pub fn detect_mimetype(path: &Path) -> Option<&'static str> {
    match sniff_header(path) {
        Some(mimetype) => Some(mimetype),
        None => {
            let fallback = mimetype_from_extension(path);
            if fallback.is_some() {
                log::debug!(
                    "header sniff failed for {}, using extension fallback",
                    path.display()
                );
            }
            fallback
        }
    }
}

fn sniff_header(path: &Path) -> Option<&'static str> {
    let mut file = File::open(path).ok()?;
    let mut header = [0u8; HEADER_LEN];
    let bytes_read = file.read(&mut header).ok()?;
    sniff_bytes(&header[..bytes_read])
}

/// Match raw header bytes against the signature table.
pub fn sniff_bytes(header: &[u8]) -> Option<&'static str> {
    if header.len() >= HEADER_LEN && &header[0..4] == b"RIFF" && &header[8..12] == b"WEBP" {
        return Some("image/webp");
    }

    MIME_SIGNATURES
        .iter()
        .find(|(_, signatures)| {
            signatures
                .iter()
                .any(|sig| header.len() >= sig.len() && &header[..sig.len()] == *sig)
        })
        .map(|(mimetype, _)| *mimetype)
}

/// Map a file extension to a mimetype.
///
/// Both `jpg` and `jpeg` report as `image/jpeg`; the historical
/// `image/jpg` spelling only ever arrives from upstream metadata.
pub fn mimetype_from_extension(path: &Path) -> Option<&'static str> {
    let extension = path.extension().and_then(|ext| ext.to_str())?;
    match extension.to_lowercase().as_str() {
        "jpg" | "jpeg" => Some("image/jpeg"),
        "png" => Some("image/png"),
        "gif" => Some("image/gif"),
        "bmp" => Some("image/bmp"),
        "tif" | "tiff" => Some("image/tiff"),
        "webp" => Some("image/webp"),
        _ => None,
    }
}
