use std::fs::File;
use std::io::BufReader;
use std::path::{Path, PathBuf};

use crate::{
    core::PageSize,
    error::{CardpressError, CardpressResult},
};

/// How layer cardinalities combine into output artifacts.
#[derive(Clone, Copy, Debug, PartialEq, Eq, serde::Serialize, serde::Deserialize)]
pub enum Mode {
    /// Cartesian product of 2 or 3 layers, first layer outermost.
    Combine,
    /// Index-for-index zip of exactly 2 equal-cardinality layers.
    Pair,
}

#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, serde::Serialize, serde::Deserialize)]
pub enum OutputFormat {
    /// Single-page PDF per combination.
    #[default]
    Pdf,
    /// Flat RGBA PNG per combination; document layers are rejected.
    Png,
}

impl OutputFormat {
    pub fn extension(self) -> &'static str {
        match self {
            OutputFormat::Pdf => "pdf",
            OutputFormat::Png => "png",
        }
    }
}

/// How an asset is placed on the output canvas.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, serde::Serialize, serde::Deserialize)]
pub enum FitPolicy {
    /// Scale to cover the full canvas, ignoring aspect ratio.
    #[default]
    Stretch,
    /// Keep the asset's natural size, anchored at the canvas top-left.
    Native,
}

/// Where output dimensions come from.
#[derive(Clone, Copy, Debug, Default, PartialEq, serde::Serialize, serde::Deserialize)]
pub enum DimensionPolicy {
    /// Explicit dimensions in output units.
    Fixed { width: f64, height: f64 },
    /// First asset of each combination.
    #[default]
    FirstLayer,
    /// First document asset of each combination.
    FirstVector,
}

/// Alpha boost applied to one raster layer before compositing.
#[derive(Clone, Copy, Debug, PartialEq, serde::Serialize, serde::Deserialize)]
pub struct OpacityBoost {
    /// 0-based layer index the boost applies to.
    pub layer: usize,
    #[serde(default = "default_boost_factor")]
    pub factor: f32,
}

pub fn default_boost_factor() -> f32 {
    1.2
}

/// One layer of a batch run: a file or directory plus resolve options.
#[derive(Clone, Debug, serde::Serialize, serde::Deserialize)]
pub struct LayerSource {
    pub location: PathBuf,
    /// Repeat count for single-file locations. Ignored for directories.
    #[serde(default = "default_replicate")]
    pub replicate: usize,
}

fn default_replicate() -> usize {
    1
}

/// A complete batch run description, loadable from JSON.
#[derive(Clone, Debug, serde::Serialize, serde::Deserialize)]
pub struct RunConfig {
    pub mode: Mode,
    pub layers: Vec<LayerSource>,
    pub out_dir: PathBuf,
    #[serde(default)]
    pub format: OutputFormat,
    #[serde(default)]
    pub dimensions: DimensionPolicy,
    #[serde(default)]
    pub fit: FitPolicy,
    #[serde(default)]
    pub opacity_boost: Option<OpacityBoost>,
}

impl RunConfig {
    /// Parse a run config from JSON.
    pub fn from_reader<R: std::io::Read>(r: R) -> CardpressResult<Self> {
        let cfg: RunConfig = serde_json::from_reader(r)
            .map_err(|e| CardpressError::validation(format!("parse run config JSON: {e}")))?;
        Ok(cfg)
    }

    /// Parse a run config from a JSON file on disk.
    pub fn from_path(path: impl AsRef<Path>) -> CardpressResult<Self> {
        let path = path.as_ref();
        let f = File::open(path).map_err(|e| {
            CardpressError::validation(format!("open run config JSON '{}': {e}", path.display()))
        })?;
        let r = BufReader::new(f);
        Self::from_reader(r)
    }

    /// Check mode arity and per-layer options before any filesystem work.
    pub fn validate(&self) -> CardpressResult<()> {
        match self.mode {
            Mode::Pair => {
                if self.layers.len() != 2 {
                    return Err(CardpressError::validation(format!(
                        "pairing mode needs exactly 2 layers, got {}",
                        self.layers.len()
                    )));
                }
            }
            Mode::Combine => {
                if !(2..=3).contains(&self.layers.len()) {
                    return Err(CardpressError::validation(format!(
                        "combination mode supports 2 or 3 layers, got {}",
                        self.layers.len()
                    )));
                }
                if let Some(src) = self.layers.iter().find(|l| l.replicate != 1) {
                    return Err(CardpressError::validation(format!(
                        "replicate is only honored in pairing mode (layer '{}')",
                        src.location.display()
                    )));
                }
            }
        }

        for src in &self.layers {
            if src.replicate == 0 {
                return Err(CardpressError::validation(format!(
                    "replicate must be at least 1 (layer '{}')",
                    src.location.display()
                )));
            }
        }

        if let DimensionPolicy::Fixed { width, height } = self.dimensions {
            PageSize::new(width, height)?;
        }

        if let Some(boost) = self.opacity_boost {
            if boost.layer >= self.layers.len() {
                return Err(CardpressError::validation(format!(
                    "opacity boost targets layer {} but only {} layers are configured",
                    boost.layer,
                    self.layers.len()
                )));
            }
            if !boost.factor.is_finite() || boost.factor <= 0.0 {
                return Err(CardpressError::validation(format!(
                    "opacity boost factor must be finite and positive, got {}",
                    boost.factor
                )));
            }
        }

        Ok(())
    }
}
