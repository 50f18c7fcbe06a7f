#![forbid(unsafe_code)]

//! Batch layer composition for print-card production.
//!
//! Layers of heterogeneous assets (raster images, single-page PDFs, SVG
//! overlays) are resolved from files or directories, paired or combined
//! into a Cartesian product, and composited bottom-to-top into one output
//! document per combination with deterministic file names. The driver is
//! session-oriented: [`BatchSession::new`] resolves and validates
//! everything up front, then [`BatchSession::step`] produces one artifact
//! at a time.

pub mod assets;
pub mod blank;
pub mod compose;
pub mod convert;
pub mod core;
pub mod dimension;
pub mod driver;
pub mod error;
pub mod filename;
pub mod model;
pub mod opacity;
pub mod paths;
pub mod pdf;
pub mod raster;
pub mod source;

pub use assets::{Asset, AssetKind, DocumentRef, Layer, LayerEntry, RasterImage, SvgImage};
pub use core::{PageSize, inches_to_points};
pub use driver::{BatchSession, RunReport, StepFailure, StepOutcome, StepStatus};
pub use error::{CardpressError, CardpressResult};
pub use model::{
    DimensionPolicy, FitPolicy, LayerSource, Mode, OpacityBoost, OutputFormat, RunConfig,
};
pub use source::{ResolvedLayer, SkippedSource, SourceFilter};
