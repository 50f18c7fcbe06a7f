use std::path::PathBuf;
use std::sync::Arc;

#[derive(Clone, Debug)]
pub struct RasterImage {
    pub width: u32,
    pub height: u32,
    /// Straight-alpha RGBA8, row-major, tightly packed.
    pub rgba8: Arc<Vec<u8>>,
}

/// A single-page vector document, referenced by path.
///
/// Documents are never decoded at resolve time; every open happens while
/// compositing, so a corrupt file surfaces as a composite-time failure of
/// the combinations that use it.
#[derive(Clone, Debug)]
pub struct DocumentRef {
    pub path: PathBuf,
}

#[derive(Clone, Debug)]
pub struct SvgImage {
    pub tree: Arc<usvg::Tree>,
}

/// One loadable asset in a layer.
#[derive(Clone, Debug)]
pub enum Asset {
    Raster(RasterImage),
    Document(DocumentRef),
    Svg(SvgImage),
}

impl Asset {
    pub fn kind(&self) -> AssetKind {
        match self {
            Asset::Raster(_) => AssetKind::Raster,
            Asset::Document(_) => AssetKind::Document,
            Asset::Svg(_) => AssetKind::Svg,
        }
    }
}

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum AssetKind {
    Raster,
    Document,
    Svg,
}

/// An asset paired with the display name its output filenames derive from.
#[derive(Clone, Debug)]
pub struct LayerEntry {
    /// File stem of the source, without extension.
    pub name: String,
    pub asset: Asset,
}

/// An ordered sequence of assets occupying one stacking position.
#[derive(Clone, Debug, Default)]
pub struct Layer {
    pub entries: Vec<LayerEntry>,
}

impl Layer {
    pub fn new(entries: Vec<LayerEntry>) -> Self {
        Self { entries }
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    /// Repeat a single entry `count` times.
    ///
    /// Clones share the underlying pixel/tree storage, so replication is a
    /// set of read-only views rather than copies.
    pub fn replicated(entry: LayerEntry, count: usize) -> Self {
        Self {
            entries: vec![entry; count],
        }
    }
}
