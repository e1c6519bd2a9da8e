//! paper-rectify CLI: locate a reference sheet, calibrate and rectify.

use clap::{Parser, ValueEnum};
use nalgebra::Point2;
use paper_rectify::core::NativeBackend;
use paper_rectify::{detect, PaperSpec, PipelineConfig, PipelineCoordinator};
use std::path::PathBuf;

#[cfg(not(feature = "tracing"))]
use log::LevelFilter;

type CliError = Box<dyn std::error::Error>;
type CliResult<T> = Result<T, CliError>;

#[derive(Clone, Copy, Debug, ValueEnum)]
enum PaperArg {
    Letter,
    A4,
}

impl From<PaperArg> for PaperSpec {
    fn from(p: PaperArg) -> Self {
        match p {
            PaperArg::Letter => PaperSpec::LETTER,
            PaperArg::A4 => PaperSpec::A4,
        }
    }
}

#[derive(Clone, Copy, Debug)]
struct CornerArg([Point2<f64>; 4]);

fn parse_corners(raw: &str) -> Result<CornerArg, String> {
    let values = raw
        .split(',')
        .map(|s| s.trim().parse::<f64>())
        .collect::<Result<Vec<_>, _>>()
        .map_err(|e| format!("invalid coordinate: {e}"))?;
    if values.len() != 8 {
        return Err(format!("expected 8 comma-separated numbers, got {}", values.len()));
    }
    let mut pts = [Point2::origin(); 4];
    for (i, p) in pts.iter_mut().enumerate() {
        *p = Point2::new(values[2 * i], values[2 * i + 1]);
    }
    Ok(CornerArg(pts))
}

#[derive(Parser, Debug)]
#[command(name = "paper-rectify")]
#[command(about = "Find a sheet of paper in a photo, derive mm/px and rectify the view")]
#[command(version)]
struct Cli {
    /// Path to the input image.
    image: PathBuf,

    /// Reference sheet size (overrides the config file).
    #[arg(long, value_enum)]
    paper: Option<PaperArg>,

    /// JSON pipeline config; missing fields use defaults.
    #[arg(long)]
    config: Option<PathBuf>,

    /// Where to write the rectified image (format from extension).
    #[arg(long)]
    out: Option<PathBuf>,

    /// Where to write the JSON session report.
    #[arg(long)]
    report: Option<PathBuf>,

    /// Corner override `x0,y0,x1,y1,x2,y2,x3,y3` in source pixels, any order.
    #[arg(long, value_parser = parse_corners, allow_hyphen_values = true)]
    corners: Option<CornerArg>,

    /// Debug-level logging (otherwise `PAPER_RECTIFY_LOG`, default `info`).
    #[arg(long, short)]
    verbose: bool,
}

fn init_logging(verbose: bool) -> CliResult<()> {
    #[cfg(feature = "tracing")]
    {
        let _ = verbose;
        let _ = tracing_log::LogTracer::init();
        paper_rectify::core::init_tracing(false);
    }
    #[cfg(not(feature = "tracing"))]
    {
        let level = if verbose {
            LevelFilter::Debug
        } else {
            paper_rectify::core::level_from_env(LevelFilter::Info)
        };
        paper_rectify::core::init_with_level(level)
            .map_err(|e| format!("cannot install logger: {e}"))?;
    }
    Ok(())
}

fn main() -> CliResult<()> {
    let cli = Cli::parse();
    init_logging(cli.verbose)?;
    run(&cli)
}

#[cfg_attr(feature = "tracing", tracing::instrument(level = "info", skip(cli)))]
fn run(cli: &Cli) -> CliResult<()> {
    let mut config = match &cli.config {
        Some(path) => PipelineConfig::load_json(path)?,
        None => PipelineConfig::default(),
    };
    if let Some(paper) = cli.paper {
        config.paper = paper.into();
    }

    let image = detect::load_rgb(&cli.image)?;
    let mut pipe = PipelineCoordinator::new(config, NativeBackend);
    pipe.load_image(image);

    if let Some(CornerArg(corners)) = cli.corners {
        if pipe.set_corners(corners) && !pipe.on_frame() {
            log::warn!("--corners do not form a convex quad; ignored");
        }
    }

    if let (Some(path), Some(warp)) = (&cli.out, pipe.warp()) {
        detect::save_rgb(&warp.rectified, path)?;
    }

    let report = pipe.report();
    if let Some(path) = &cli.report {
        report.write_json(path)?;
    }

    let scale = report
        .calibration
        .as_ref()
        .map(|c| format!("{:.4} mm/px", c.mm_per_px))
        .unwrap_or_else(|| "uncalibrated".to_string());
    let size = report
        .warp
        .as_ref()
        .map(|w| format!("{}x{} px", w.width, w.height))
        .unwrap_or_else(|| "not rectified".to_string());
    println!("state={} scale={} output={}", report.state, scale, size);
    if let Some(msg) = &report.message {
        println!("note: {msg}");
    }
    Ok(())
}
