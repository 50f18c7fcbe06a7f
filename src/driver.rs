use std::path::PathBuf;

use anyhow::Context as _;

use crate::{
    assets::{Asset, Layer, LayerEntry},
    compose, dimension,
    error::{CardpressError, CardpressResult},
    filename,
    model::{DimensionPolicy, FitPolicy, Mode, OutputFormat, RunConfig},
    opacity,
    source::{self, SkippedSource, SourceFilter},
};

/// What happened to one combination.
#[derive(Clone, Debug)]
pub enum StepStatus {
    Written(PathBuf),
    Failed(String),
}

/// Progress record for one driver step.
#[derive(Clone, Debug)]
pub struct StepOutcome {
    /// 1-based position in the run.
    pub counter: usize,
    pub total: usize,
    pub file_name: String,
    pub status: StepStatus,
}

/// A combination that failed to composite; the run continued without it.
#[derive(Clone, Debug)]
pub struct StepFailure {
    pub counter: usize,
    pub file_name: String,
    pub reason: String,
}

/// End-of-run accounting.
#[derive(Clone, Debug, Default)]
pub struct RunReport {
    pub produced: Vec<PathBuf>,
    pub failed: Vec<StepFailure>,
    /// Directory entries that failed to load while resolving layers.
    pub skipped_sources: Vec<SkippedSource>,
}

/// Session-oriented batch driver.
///
/// Construction resolves every layer, checks preconditions, and creates
/// the output directory; `step` then composites one combination at a time
/// so callers can report progress between artifacts.
pub struct BatchSession {
    mode: Mode,
    format: OutputFormat,
    fit: FitPolicy,
    dimensions: DimensionPolicy,
    out_dir: PathBuf,
    layers: Vec<Layer>,
    counts: Vec<usize>,
    total: usize,
    cursor: usize,
    report: RunReport,
}

impl BatchSession {
    pub fn new(config: &RunConfig) -> CardpressResult<Self> {
        config.validate()?;

        let filter = match config.format {
            OutputFormat::Pdf => SourceFilter::All,
            OutputFormat::Png => SourceFilter::Rasterizable,
        };

        let mut layers: Vec<(PathBuf, Layer)> = Vec::with_capacity(config.layers.len());
        let mut skipped_sources = Vec::new();
        for src in &config.layers {
            let resolved = source::resolve_layer(&src.location, filter, src.replicate)?;
            skipped_sources.extend(resolved.skipped);
            layers.push((src.location.clone(), resolved.layer));
        }

        // Pairing: a single-entry layer stretches to its partner's length.
        if config.mode == Mode::Pair {
            let (len0, len1) = (layers[0].1.len(), layers[1].1.len());
            if len0 == 1 && len1 > 1 {
                let entry = layers[0].1.entries[0].clone();
                layers[0].1 = Layer::replicated(entry, len1);
            } else if len1 == 1 && len0 > 1 {
                let entry = layers[1].1.entries[0].clone();
                layers[1].1 = Layer::replicated(entry, len0);
            }
            if layers[0].1.len() != layers[1].1.len() {
                return Err(CardpressError::precondition(format!(
                    "pairing layers must match in length, got {} and {}",
                    layers[0].1.len(),
                    layers[1].1.len()
                )));
            }
        }

        for (location, layer) in &layers {
            if layer.is_empty() {
                return Err(CardpressError::precondition(format!(
                    "layer '{}' resolved to no assets",
                    location.display()
                )));
            }
        }

        // The boost bakes into the targeted layer's pixels up front, so
        // stepping never mutates assets.
        if let Some(boost) = config.opacity_boost {
            let (location, layer) = &mut layers[boost.layer];
            for entry in &mut layer.entries {
                match &entry.asset {
                    Asset::Raster(img) => {
                        entry.asset = Asset::Raster(opacity::boost_alpha(img, boost.factor)?);
                    }
                    _ => {
                        return Err(CardpressError::precondition(format!(
                            "opacity boost targets layer '{}' but '{}' is not a raster image",
                            location.display(),
                            entry.name
                        )));
                    }
                }
            }
        }

        let counts: Vec<usize> = layers.iter().map(|(_, layer)| layer.len()).collect();
        let total = match config.mode {
            Mode::Pair => counts[0],
            Mode::Combine => counts.iter().product(),
        };

        std::fs::create_dir_all(&config.out_dir).with_context(|| {
            format!("create output directory '{}'", config.out_dir.display())
        })?;

        Ok(Self {
            mode: config.mode,
            format: config.format,
            fit: config.fit,
            dimensions: config.dimensions,
            out_dir: config.out_dir.clone(),
            layers: layers.into_iter().map(|(_, layer)| layer).collect(),
            counts,
            total,
            cursor: 0,
            report: RunReport {
                skipped_sources,
                ..RunReport::default()
            },
        })
    }

    /// Number of combinations this run will attempt.
    pub fn total(&self) -> usize {
        self.total
    }

    pub fn report(&self) -> &RunReport {
        &self.report
    }

    /// Composite the next combination. Returns `None` when exhausted.
    ///
    /// A failed composite comes back as a `Failed` outcome with its counter
    /// value consumed, and the run keeps going; that covers a dimension
    /// reference document that will not open. Policy-level dimension
    /// failures (nothing to inherit from) abort the whole run.
    pub fn step(&mut self) -> CardpressResult<Option<StepOutcome>> {
        if self.cursor >= self.total {
            return Ok(None);
        }
        let index = self.cursor;
        self.cursor += 1;
        let counter = index + 1;

        let indices = match self.mode {
            Mode::Pair => vec![index; self.layers.len()],
            Mode::Combine => combination_indices(index, &self.counts),
        };
        let entries: Vec<&LayerEntry> = self
            .layers
            .iter()
            .zip(&indices)
            .map(|(layer, &i)| &layer.entries[i])
            .collect();

        let ext = self.format.extension();
        let file_name = match self.mode {
            Mode::Pair => filename::pair_file_name(&entries[0].name, &entries[1].name, ext),
            Mode::Combine => {
                let names: Vec<&str> = entries.iter().map(|e| e.name.as_str()).collect();
                filename::combine_file_name(&names, counter, ext)
            }
        };
        let out_path = self.out_dir.join(&file_name);

        let result = match dimension::resolve(&entries, &self.dimensions) {
            Err(err @ (CardpressError::Dimension(_) | CardpressError::Precondition(_))) => {
                return Err(err);
            }
            Err(err) => Err(err),
            Ok(size) => match self.format {
                OutputFormat::Pdf => compose::compose_pdf(&entries, size, self.fit, &out_path),
                OutputFormat::Png => compose::compose_png(&entries, size, self.fit, &out_path),
            },
        };

        let status = match result {
            Ok(()) => {
                self.report.produced.push(out_path.clone());
                StepStatus::Written(out_path)
            }
            Err(e) => {
                let reason = e.to_string();
                tracing::warn!("combination {counter}/{}: {reason}", self.total);
                self.report.failed.push(StepFailure {
                    counter,
                    file_name: file_name.clone(),
                    reason: reason.clone(),
                });
                StepStatus::Failed(reason)
            }
        };

        Ok(Some(StepOutcome {
            counter,
            total: self.total,
            file_name,
            status,
        }))
    }

    /// Drive the remaining combinations to completion.
    pub fn run(mut self) -> CardpressResult<RunReport> {
        while self.step()?.is_some() {}
        Ok(self.report)
    }

    /// Consume the session, yielding the report accumulated so far.
    pub fn finish(self) -> RunReport {
        self.report
    }
}

/// Per-layer entry indices for combination `index`, first layer outermost.
fn combination_indices(index: usize, counts: &[usize]) -> Vec<usize> {
    let mut indices = vec![0; counts.len()];
    let mut rem = index;
    for (slot, &count) in indices.iter_mut().zip(counts).rev() {
        *slot = rem % count;
        rem /= count;
    }
    indices
}
