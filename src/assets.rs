//! Static asset upload.
//!
//! Every file below the configured assets directory is stored in the assets
//! bucket under `assets/<relative path>`, the prefix the CDN forwards to
//! the bucket origin. Hidden files and files matching an `ignore` pattern
//! are left out.

use std::path::{Path, PathBuf};

use crate::control_plane::ArtifactStore;
use crate::error::{Error, Result};

/// Key prefix of every uploaded asset.
pub const ASSETS_KEY_PREFIX: &str = "assets";

const DEFAULT_CONTENT_TYPE: &str = "application/octet-stream";

const CONTENT_TYPES: [(&str, &str); 26] = [
    ("html", "text/html"),
    ("htm", "text/html"),
    ("css", "text/css"),
    ("js", "application/javascript"),
    ("mjs", "application/javascript"),
    ("json", "application/json"),
    ("map", "application/json"),
    ("txt", "text/plain"),
    ("xml", "application/xml"),
    ("csv", "text/csv"),
    ("svg", "image/svg+xml"),
    ("png", "image/png"),
    ("jpg", "image/jpeg"),
    ("jpeg", "image/jpeg"),
    ("gif", "image/gif"),
    ("webp", "image/webp"),
    ("ico", "image/x-icon"),
    ("woff", "font/woff"),
    ("woff2", "font/woff2"),
    ("ttf", "font/ttf"),
    ("otf", "font/otf"),
    ("pdf", "application/pdf"),
    ("mp4", "video/mp4"),
    ("webm", "video/webm"),
    ("mp3", "audio/mpeg"),
    ("wasm", "application/wasm"),
];

/// One file to upload.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Asset {
    pub path: PathBuf,
    pub key: String,
    pub content_type: &'static str,
}

/// Content type served for `path`, by extension.
pub fn content_type(path: &Path) -> &'static str {
    let Some(extension) = path.extension().and_then(|e| e.to_str()) else {
        return DEFAULT_CONTENT_TYPE;
    };
    let extension = extension.to_ascii_lowercase();
    CONTENT_TYPES
        .iter()
        .find(|(known, _)| *known == extension)
        .map(|(_, content_type)| *content_type)
        .unwrap_or(DEFAULT_CONTENT_TYPE)
}

/// List the files below `dir`, sorted by key.
pub fn collect(dir: &Path, ignore: &[String]) -> Result<Vec<Asset>> {
    if !dir.is_dir() {
        return Err(Error::ConfigValidation {
            function: None,
            message: format!("assets directory '{}' does not exist", dir.display()),
            hint: Some(
                "Create it, point assets-dir at your assets, or set 'assets-dir: false'".to_string(),
            ),
        });
    }

    let patterns = ignore
        .iter()
        .map(|pattern| {
            glob::Pattern::new(pattern).map_err(|e| Error::ConfigValidation {
                function: None,
                message: format!("invalid ignore pattern '{}': {}", pattern, e),
                hint: None,
            })
        })
        .collect::<Result<Vec<_>>>()?;

    let mut assets = Vec::new();
    for entry in walkdir::WalkDir::new(dir)
        .into_iter()
        .filter_entry(|e| e.depth() == 0 || !e.file_name().to_string_lossy().starts_with('.'))
    {
        let entry = entry.map_err(std::io::Error::from)?;
        if !entry.file_type().is_file() {
            continue;
        }

        let Ok(relative) = entry.path().strip_prefix(dir) else {
            continue;
        };
        let relative = relative
            .components()
            .map(|component| component.as_os_str().to_string_lossy())
            .collect::<Vec<_>>()
            .join("/");
        if patterns.iter().any(|pattern| pattern.matches(&relative)) {
            log::debug!("Ignoring asset {}", relative);
            continue;
        }

        assets.push(Asset {
            content_type: content_type(entry.path()),
            key: format!("{}/{}", ASSETS_KEY_PREFIX, relative),
            path: entry.into_path(),
        });
    }
    assets.sort_by(|a, b| a.key.cmp(&b.key));
    Ok(assets)
}

/// Upload `assets` to `bucket` one by one, calling `on_upload` after each.
pub fn upload<S: ArtifactStore + ?Sized>(
    store: &S,
    bucket: &str,
    assets: &[Asset],
    mut on_upload: impl FnMut(&Asset),
) -> Result<()> {
    for asset in assets {
        let body = std::fs::read(&asset.path)?;
        log::debug!("Uploading {} ({})", asset.key, asset.content_type);
        store.put_asset(bucket, &asset.key, &body, asset.content_type)?;
        on_upload(asset);
    }
    Ok(())
}
