//! Identifier and URL helpers shared across crates.

use url::Url;
use uuid::Uuid;

/// Extension of rendered clip artifacts.
pub const CLIP_EXTENSION: &str = "gif";

/// Generate a globally unique clip identifier (`<uuid>.gif`).
pub fn new_clip_identifier() -> String {
    format!("{}.{}", Uuid::new_v4(), CLIP_EXTENSION)
}

/// Check that `identifier` is a bare `<uuid>.gif` file name.
///
/// Anything else (path separators, `..`, other extensions) is rejected so
/// identifiers can be joined onto an artifact directory safely.
pub fn is_clip_identifier(identifier: &str) -> bool {
    match identifier.rsplit_once('.') {
        Some((stem, ext)) => ext == CLIP_EXTENSION && Uuid::parse_str(stem).is_ok() && stem.len() == 36,
        None => false,
    }
}

/// Whether `reference` is an http(s) URL that can be handed to yt-dlp.
pub fn is_remote_reference(reference: &str) -> bool {
    match Url::parse(reference.trim()) {
        Ok(url) => matches!(url.scheme(), "http" | "https") && url.host_str().is_some(),
        Err(_) => false,
    }
}
