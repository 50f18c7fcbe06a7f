use std::path::PathBuf;

use clap::{Parser, Subcommand, ValueEnum};

use cardpress::{
    BatchSession, DimensionPolicy, FitPolicy, LayerSource, Mode, OpacityBoost, OutputFormat,
    RunConfig, StepStatus, inches_to_points,
    model::default_boost_factor,
    paths::sanitize_location,
};

/// Pixel density applied to `--size-in` when the output is an image.
const DEFAULT_PNG_DPI: f64 = 300.0;

#[derive(Parser, Debug)]
#[command(name = "cardpress", version)]
struct Cli {
    #[command(subcommand)]
    cmd: Command,
}

#[derive(Subcommand, Debug)]
enum Command {
    /// Composite the Cartesian product of 2 or 3 layers.
    Combine(CombineArgs),
    /// Composite two layers index-for-index (fronts with backs).
    Pair(PairArgs),
    /// Run a batch described by a JSON config file.
    Job(JobArgs),
    /// Convert a directory of PNGs into PDFs sized like a template page.
    Convert(ConvertArgs),
    /// Write blank PDFs matching the names and page sizes of a directory.
    Blanks(BlanksArgs),
}

#[derive(Parser, Debug)]
struct CombineArgs {
    /// Layer locations (file or directory), bottom layer first.
    #[arg(num_args = 2..=3, required = true)]
    layers: Vec<String>,

    /// Output directory.
    #[arg(long)]
    out_dir: String,

    /// Output container.
    #[arg(long, value_enum, default_value_t = FormatChoice::Pdf)]
    format: FormatChoice,

    /// How assets are placed on the canvas.
    #[arg(long, value_enum, default_value_t = FitChoice::Stretch)]
    fit: FitChoice,

    /// Fixed output size `W,H` in output units (points for pdf, pixels for png).
    #[arg(long, value_parser = parse_size, conflicts_with_all = ["size_in", "first_vector"])]
    size: Option<(f64, f64)>,

    /// Fixed output size `W,H` in inches (points for pdf, pixels via
    /// `--dpi` for png).
    #[arg(long, value_parser = parse_size, conflicts_with = "first_vector")]
    size_in: Option<(f64, f64)>,

    /// Pixel density for `--size-in` with png output [default: 300].
    #[arg(long, requires = "size_in")]
    dpi: Option<f64>,

    /// Inherit dimensions from each combination's first document layer
    /// instead of its first layer.
    #[arg(long)]
    first_vector: bool,

    /// Boost the alpha channel of this layer (0-based index).
    #[arg(long)]
    boost_layer: Option<usize>,

    /// Alpha multiplier used with --boost-layer.
    #[arg(long, default_value_t = default_boost_factor(), requires = "boost_layer")]
    boost_factor: f32,
}

#[derive(Parser, Debug)]
struct PairArgs {
    /// Two layer locations (file or directory), bottom layer first. A
    /// single-file layer is repeated to match the other layer's length.
    #[arg(num_args = 2, required = true)]
    layers: Vec<String>,

    /// Output directory.
    #[arg(long)]
    out_dir: String,

    /// Output container.
    #[arg(long, value_enum, default_value_t = FormatChoice::Pdf)]
    format: FormatChoice,

    /// How assets are placed on the canvas.
    #[arg(long, value_enum, default_value_t = FitChoice::Stretch)]
    fit: FitChoice,

    /// Fixed output size `W,H` in output units (points for pdf, pixels for png).
    #[arg(long, value_parser = parse_size, conflicts_with_all = ["size_in", "first_vector"])]
    size: Option<(f64, f64)>,

    /// Fixed output size `W,H` in inches (points for pdf, pixels via
    /// `--dpi` for png).
    #[arg(long, value_parser = parse_size, conflicts_with = "first_vector")]
    size_in: Option<(f64, f64)>,

    /// Pixel density for `--size-in` with png output [default: 300].
    #[arg(long, requires = "size_in")]
    dpi: Option<f64>,

    /// Inherit dimensions from each pair's first document layer instead of
    /// its first layer.
    #[arg(long)]
    first_vector: bool,

    /// Boost the alpha channel of this layer (0-based index).
    #[arg(long)]
    boost_layer: Option<usize>,

    /// Alpha multiplier used with --boost-layer.
    #[arg(long, default_value_t = default_boost_factor(), requires = "boost_layer")]
    boost_factor: f32,
}

#[derive(Parser, Debug)]
struct JobArgs {
    /// Batch config JSON.
    #[arg(long = "in")]
    in_path: PathBuf,
}

#[derive(Parser, Debug)]
struct ConvertArgs {
    /// Directory of PNG files to convert.
    src_dir: String,

    /// PDF whose first page provides the output size.
    #[arg(long)]
    template: String,

    /// Output directory.
    #[arg(long)]
    out_dir: String,
}

#[derive(Parser, Debug)]
struct BlanksArgs {
    /// Directory of PDFs to mirror as blanks.
    src_dir: String,

    /// Output directory.
    #[arg(long)]
    out_dir: String,
}

#[derive(Clone, Copy, Debug, ValueEnum)]
enum FormatChoice {
    Pdf,
    Png,
}

#[derive(Clone, Copy, Debug, ValueEnum)]
enum FitChoice {
    Stretch,
    Native,
}

fn main() -> anyhow::Result<()> {
    let cli = Cli::parse();
    match cli.cmd {
        Command::Combine(args) => cmd_combine(args),
        Command::Pair(args) => cmd_pair(args),
        Command::Job(args) => cmd_job(args),
        Command::Convert(args) => cmd_convert(args),
        Command::Blanks(args) => cmd_blanks(args),
    }
}

fn parse_size(raw: &str) -> Result<(f64, f64), String> {
    let (w, h) = raw
        .split_once(',')
        .ok_or_else(|| format!("expected W,H, got '{raw}'"))?;
    let w: f64 = w
        .trim()
        .parse()
        .map_err(|e| format!("bad width '{w}': {e}"))?;
    let h: f64 = h
        .trim()
        .parse()
        .map_err(|e| format!("bad height '{h}': {e}"))?;
    Ok((w, h))
}

fn dimension_policy(
    size: Option<(f64, f64)>,
    size_in: Option<(f64, f64)>,
    first_vector: bool,
    format: OutputFormat,
    dpi: Option<f64>,
) -> anyhow::Result<DimensionPolicy> {
    if dpi.is_some() && format != OutputFormat::Png {
        anyhow::bail!("--dpi only applies to png output; pdf pages are always 72 points per inch");
    }
    let policy = if let Some((width, height)) = size {
        DimensionPolicy::Fixed { width, height }
    } else if let Some((w_in, h_in)) = size_in {
        match format {
            OutputFormat::Pdf => DimensionPolicy::Fixed {
                width: inches_to_points(w_in),
                height: inches_to_points(h_in),
            },
            OutputFormat::Png => {
                let dpi = dpi.unwrap_or(DEFAULT_PNG_DPI);
                DimensionPolicy::Fixed {
                    width: w_in * dpi,
                    height: h_in * dpi,
                }
            }
        }
    } else if first_vector {
        DimensionPolicy::FirstVector
    } else {
        DimensionPolicy::FirstLayer
    };
    Ok(policy)
}

fn layer_sources(raw: &[String]) -> Vec<LayerSource> {
    raw.iter()
        .map(|loc| LayerSource {
            location: sanitize_location(loc),
            replicate: 1,
        })
        .collect()
}

fn cmd_combine(args: CombineArgs) -> anyhow::Result<()> {
    let format: OutputFormat = args.format.into();
    let config = RunConfig {
        mode: Mode::Combine,
        layers: layer_sources(&args.layers),
        out_dir: sanitize_location(&args.out_dir),
        format,
        dimensions: dimension_policy(args.size, args.size_in, args.first_vector, format, args.dpi)?,
        fit: args.fit.into(),
        opacity_boost: args.boost_layer.map(|layer| OpacityBoost {
            layer,
            factor: args.boost_factor,
        }),
    };
    drive(&config)
}

fn cmd_pair(args: PairArgs) -> anyhow::Result<()> {
    let format: OutputFormat = args.format.into();
    let config = RunConfig {
        mode: Mode::Pair,
        layers: layer_sources(&args.layers),
        out_dir: sanitize_location(&args.out_dir),
        format,
        dimensions: dimension_policy(args.size, args.size_in, args.first_vector, format, args.dpi)?,
        fit: args.fit.into(),
        opacity_boost: args.boost_layer.map(|layer| OpacityBoost {
            layer,
            factor: args.boost_factor,
        }),
    };
    drive(&config)
}

fn cmd_job(args: JobArgs) -> anyhow::Result<()> {
    let config = RunConfig::from_path(&args.in_path)?;
    drive(&config)
}

fn drive(config: &RunConfig) -> anyhow::Result<()> {
    let mut session = BatchSession::new(config)?;

    for skip in &session.report().skipped_sources {
        eprintln!("warning: skipped '{}': {}", skip.path.display(), skip.reason);
    }

    let total = session.total();
    eprintln!(
        "compositing {total} combination{} into '{}'",
        if total == 1 { "" } else { "s" },
        config.out_dir.display()
    );

    while let Some(outcome) = session.step()? {
        match &outcome.status {
            StepStatus::Written(_) => {
                eprintln!("{}/{}: {}", outcome.counter, outcome.total, outcome.file_name);
            }
            StepStatus::Failed(reason) => {
                eprintln!(
                    "{}/{}: failed {} ({reason})",
                    outcome.counter, outcome.total, outcome.file_name
                );
            }
        }
    }

    let report = session.finish();
    eprintln!(
        "wrote {} file{} to '{}' ({} failed)",
        report.produced.len(),
        if report.produced.len() == 1 { "" } else { "s" },
        config.out_dir.display(),
        report.failed.len()
    );

    if !report.failed.is_empty() {
        anyhow::bail!("{} combination(s) failed to composite", report.failed.len());
    }
    Ok(())
}

fn cmd_convert(args: ConvertArgs) -> anyhow::Result<()> {
    let written = cardpress::convert::convert_pngs(
        &sanitize_location(&args.src_dir),
        &sanitize_location(&args.template),
        &sanitize_location(&args.out_dir),
    )?;
    for path in &written {
        eprintln!("wrote {}", path.display());
    }
    eprintln!("converted {} file(s)", written.len());
    Ok(())
}

fn cmd_blanks(args: BlanksArgs) -> anyhow::Result<()> {
    let written = cardpress::convert::blank_copies(
        &sanitize_location(&args.src_dir),
        &sanitize_location(&args.out_dir),
    )?;
    for path in &written {
        eprintln!("wrote {}", path.display());
    }
    eprintln!("created {} blank(s)", written.len());
    Ok(())
}

impl From<FormatChoice> for OutputFormat {
    fn from(choice: FormatChoice) -> Self {
        match choice {
            FormatChoice::Pdf => OutputFormat::Pdf,
            FormatChoice::Png => OutputFormat::Png,
        }
    }
}

impl From<FitChoice> for FitPolicy {
    fn from(choice: FitChoice) -> Self {
        match choice {
            FitChoice::Stretch => FitPolicy::Stretch,
            FitChoice::Native => FitPolicy::Native,
        }
    }
}
