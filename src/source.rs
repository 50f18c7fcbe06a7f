use std::path::{Path, PathBuf};
use std::sync::Arc;

use anyhow::Context as _;

use crate::{
    assets::{Asset, AssetKind, DocumentRef, Layer, LayerEntry, RasterImage, SvgImage},
    error::{CardpressError, CardpressResult},
};

/// Which asset kinds a resolve accepts.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum SourceFilter {
    All,
    /// Excludes document sources; used when the output canvas is raster.
    Rasterizable,
}

impl SourceFilter {
    pub fn accepts(self, kind: AssetKind) -> bool {
        match self {
            SourceFilter::All => true,
            SourceFilter::Rasterizable => kind != AssetKind::Document,
        }
    }
}

/// A directory entry that failed to load during a best-effort scan.
#[derive(Clone, Debug)]
pub struct SkippedSource {
    pub path: PathBuf,
    pub reason: String,
}

#[derive(Clone, Debug)]
pub struct ResolvedLayer {
    pub layer: Layer,
    pub skipped: Vec<SkippedSource>,
}

/// Map a lowercased extension to the asset kind it decodes as.
pub fn kind_for_extension(ext: &str) -> Option<AssetKind> {
    match ext {
        "png" | "jpg" | "jpeg" | "bmp" | "gif" => Some(AssetKind::Raster),
        "pdf" => Some(AssetKind::Document),
        "svg" => Some(AssetKind::Svg),
        _ => None,
    }
}

/// Resolve a file or directory location into a layer.
///
/// A single file decodes strictly: any failure aborts the resolve. A
/// directory scan is best-effort: entries that fail to decode are logged
/// and returned as diagnostics while the rest of the layer loads.
/// `replicate` repeats a single-file entry and is ignored for directories.
#[tracing::instrument(skip(filter))]
pub fn resolve_layer(
    location: &Path,
    filter: SourceFilter,
    replicate: usize,
) -> CardpressResult<ResolvedLayer> {
    if replicate == 0 {
        return Err(CardpressError::validation("replicate must be at least 1"));
    }

    if location.is_file() {
        let entry = load_entry(location, filter)?;
        return Ok(ResolvedLayer {
            layer: Layer::replicated(entry, replicate),
            skipped: Vec::new(),
        });
    }

    if !location.is_dir() {
        return Err(CardpressError::invalid_location(format!(
            "'{}' is neither a file nor a directory",
            location.display()
        )));
    }

    let mut files: Vec<(String, PathBuf)> = Vec::new();
    let dir = std::fs::read_dir(location)
        .with_context(|| format!("read directory '{}'", location.display()))?;
    for entry in dir {
        let entry = entry.with_context(|| format!("read directory '{}'", location.display()))?;
        let path = entry.path();
        if !path.is_file() {
            continue;
        }
        let Some(kind) = extension_kind(&path) else {
            continue;
        };
        if !filter.accepts(kind) {
            continue;
        }
        files.push((entry.file_name().to_string_lossy().into_owned(), path));
    }
    // Scan order follows the filesystem; sort so counters and filenames come
    // out the same on every run.
    files.sort_by(|a, b| a.0.cmp(&b.0));

    let mut entries = Vec::with_capacity(files.len());
    let mut skipped = Vec::new();
    for (_, path) in files {
        match load_entry(&path, filter) {
            Ok(entry) => entries.push(entry),
            Err(e) => {
                tracing::warn!("skipping '{}': {e}", path.display());
                skipped.push(SkippedSource {
                    path,
                    reason: e.to_string(),
                });
            }
        }
    }

    Ok(ResolvedLayer {
        layer: Layer::new(entries),
        skipped,
    })
}

fn extension_kind(path: &Path) -> Option<AssetKind> {
    let ext = path.extension()?.to_string_lossy().to_lowercase();
    kind_for_extension(&ext)
}

fn load_entry(path: &Path, filter: SourceFilter) -> CardpressResult<LayerEntry> {
    let Some(kind) = extension_kind(path) else {
        return Err(CardpressError::validation(format!(
            "unsupported asset type '{}'",
            path.display()
        )));
    };
    if !filter.accepts(kind) {
        return Err(CardpressError::precondition(format!(
            "document source '{}' cannot feed raster output",
            path.display()
        )));
    }

    let name = path
        .file_stem()
        .map(|s| s.to_string_lossy().into_owned())
        .unwrap_or_default();

    let asset = match kind {
        AssetKind::Raster => {
            let bytes =
                std::fs::read(path).with_context(|| format!("read '{}'", path.display()))?;
            Asset::Raster(decode_raster(&bytes)?)
        }
        AssetKind::Svg => {
            let bytes =
                std::fs::read(path).with_context(|| format!("read '{}'", path.display()))?;
            Asset::Svg(parse_svg(&bytes)?)
        }
        AssetKind::Document => Asset::Document(DocumentRef {
            path: path.to_path_buf(),
        }),
    };

    Ok(LayerEntry { name, asset })
}

/// Decode an encoded raster image into straight-alpha RGBA8.
pub fn decode_raster(bytes: &[u8]) -> CardpressResult<RasterImage> {
    let dyn_img = image::load_from_memory(bytes).context("decode image from memory")?;
    let rgba = dyn_img.to_rgba8();
    let (width, height) = rgba.dimensions();

    Ok(RasterImage {
        width,
        height,
        rgba8: Arc::new(rgba.into_raw()),
    })
}

pub fn parse_svg(bytes: &[u8]) -> CardpressResult<SvgImage> {
    let opts = usvg::Options::default();
    let tree = usvg::Tree::from_data(bytes, &opts).context("parse svg tree")?;
    Ok(SvgImage {
        tree: Arc::new(tree),
    })
}
