mod renderer;
mod shell;

use std::fs::File;
use std::path::{Path, PathBuf};
use std::sync::Mutex;

use anyhow::{Context, Result, anyhow, bail};
use serde::Deserialize;
use steplink_core::SyncConfig;
use steplink_protocol::Step;
use tracing_subscriber::EnvFilter;

use crate::shell::{Metrics, Shell};

/// Width and height of the headless layout used for `--svg`.
const SVG_SIZE: (f64, f64) = (960.0, 540.0);

/// On-disk chart: optional engine tunables plus the step list.
#[derive(Debug, Deserialize)]
struct ChartFile {
    #[serde(default)]
    config: SyncConfig,
    steps: Vec<Step>,
}

struct Args {
    chart: PathBuf,
    svg: Option<PathBuf>,
    log_file: Option<PathBuf>,
}

fn parse_args() -> Result<Args> {
    let mut chart = None;
    let mut svg = None;
    let mut log_file = None;

    let mut args = std::env::args_os().skip(1);
    while let Some(arg) = args.next() {
        match arg.to_str() {
            Some("--svg") => svg = Some(PathBuf::from(args.next().context("--svg needs a path")?)),
            Some("--log-file") => {
                log_file = Some(PathBuf::from(args.next().context("--log-file needs a path")?));
            }
            Some("-h" | "--help") => bail!("help"),
            _ if chart.is_none() => chart = Some(PathBuf::from(arg)),
            _ => bail!("unexpected argument {arg:?}"),
        }
    }
    Ok(Args {
        chart: chart.context("missing chart path")?,
        svg,
        log_file,
    })
}

/// Log to a file only; the terminal belongs to the UI.
fn init_logging(path: &Path) -> Result<()> {
    let file = File::create(path).with_context(|| format!("creating {}", path.display()))?;
    let default_level = "steplink_core=debug,steplink=debug";
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env()
                .or_else(|_| EnvFilter::try_new(default_level))
                .unwrap_or_else(|_| EnvFilter::new(default_level)),
        )
        .with_ansi(false)
        .with_writer(Mutex::new(file))
        .try_init()
        .map_err(|err| anyhow!("installing log subscriber: {err}"))
}

fn main() -> Result<()> {
    let args = match parse_args() {
        Ok(args) => args,
        Err(err) => {
            eprintln!("{err}");
            eprintln!("Usage: steplink <chart.json> [--svg out.svg] [--log-file path]");
            std::process::exit(1);
        }
    };
    if let Some(path) = &args.log_file {
        init_logging(path)?;
    }

    let data = std::fs::read_to_string(&args.chart)
        .with_context(|| format!("reading {}", args.chart.display()))?;
    let file: ChartFile = serde_json::from_str(&data).context("parsing chart")?;
    tracing::info!(steps = file.steps.len(), path = %args.chart.display(), "chart loaded");

    let mut shell = Shell::load(file.config, file.steps)?;

    if let Some(out) = &args.svg {
        let (width, height) = SVG_SIZE;
        shell.lay_out(width, Metrics::PIXELS);
        let svg = steplink_core::svg::render_svg(&shell.commands(width, height), width, height);
        std::fs::write(out, svg).with_context(|| format!("writing {}", out.display()))?;
        return Ok(());
    }

    renderer::run_tui(&mut shell)?;
    Ok(())
}
